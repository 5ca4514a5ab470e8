//! I/O modules for orbit documents, timing files, reference grids and virtual rasters

pub mod orbit;
pub mod orbtiming;
pub mod grid;
pub mod vrt;
pub mod product;

pub use orbit::OrbitReader;
pub use orbtiming::{read_orbinfo, write_orbinfo, OrbTimingRecord};
pub use grid::{GdalGridSource, GridSource};
pub use vrt::VrtWriter;
pub use product::{find_orbit_file, find_unique_product, parse_orbit_filename, parse_product_name};

use crate::types::{LosError, LosResult};
use std::io::Write;
use std::path::Path;

/// Mode of files written by [`write_atomic`], matching a 022 umask
#[cfg(unix)]
const OUTPUT_FILE_MODE: u32 = 0o644;

/// Write `contents` to `path` all-or-nothing: the data goes to a temporary
/// file in the same directory which is renamed over `path` on success.
/// On unix the result is world-readable like a plain `fs::write`.
pub(crate) fn write_atomic<P: AsRef<Path>>(path: P, contents: &[u8]) -> LosResult<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(OUTPUT_FILE_MODE))?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| LosError::Io(e.error))?;
    Ok(())
}
