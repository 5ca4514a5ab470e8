//! GDAL virtual raster (VRT) descriptions for raw binary files.
//!
//! Ref: https://gdal.org/drivers/raster/vrt.html#vrt-descriptions-for-raw-files

use crate::io::write_atomic;
use crate::types::{LosResult, RawRasterDescriptor};
use quick_xml::events::BytesText;
use quick_xml::Writer;
use std::path::Path;

/// Serializes [`RawRasterDescriptor`]s as VRT XML
pub struct VrtWriter;

impl VrtWriter {
    /// VRT XML with one `VRTRawRasterBand`. Output is deterministic for a given descriptor.
    pub fn to_xml(desc: &RawRasterDescriptor) -> LosResult<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        let x_size = desc.cols.to_string();
        let y_size = desc.rows.to_string();
        let geo_transform = desc
            .geo_transform
            .to_array()
            .iter()
            .map(|c| format!("{:.16e}", c))
            .collect::<Vec<_>>()
            .join(", ");
        let image_offset = desc.image_offset.to_string();
        let pixel_offset = desc.pixel_offset.to_string();
        let line_offset = desc.line_offset.to_string();
        let byte_order = desc.byte_order.to_string();

        writer
            .create_element("VRTDataset")
            .with_attribute(("rasterXSize", x_size.as_str()))
            .with_attribute(("rasterYSize", y_size.as_str()))
            .write_inner_content(|w| {
                w.create_element("SRS")
                    .write_text_content(BytesText::new(&desc.spatial_reference))?;
                w.create_element("GeoTransform")
                    .write_text_content(BytesText::new(&geo_transform))?;
                w.create_element("VRTRasterBand")
                    .with_attribute(("dataType", desc.pixel_type.gdal_name()))
                    .with_attribute(("band", "1"))
                    .with_attribute(("subClass", "VRTRawRasterBand"))
                    .write_inner_content(|band| {
                        band.create_element("SourceFilename")
                            .with_attribute(("relativeToVRT", "1"))
                            .write_text_content(BytesText::new(&desc.source_filename))?;
                        band.create_element("ImageOffset")
                            .write_text_content(BytesText::new(&image_offset))?;
                        band.create_element("PixelOffset")
                            .write_text_content(BytesText::new(&pixel_offset))?;
                        band.create_element("LineOffset")
                            .write_text_content(BytesText::new(&line_offset))?;
                        band.create_element("ByteOrder")
                            .write_text_content(BytesText::new(&byte_order))?;
                        Ok::<(), quick_xml::Error>(())
                    })?;
                Ok::<(), quick_xml::Error>(())
            })?;

        let mut xml = writer.into_inner();
        xml.push(b'\n');
        Ok(xml)
    }

    /// Write the VRT to `path`, replacing any existing file atomically
    pub fn write<P: AsRef<Path>>(desc: &RawRasterDescriptor, path: P) -> LosResult<()> {
        let xml = Self::to_xml(desc)?;
        log::debug!("Writing VRT ({} bytes) to {}", xml.len(), path.as_ref().display());
        write_atomic(path, &xml)
    }
}
