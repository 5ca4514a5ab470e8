use chrono::{Duration, TimeZone, Utc};
use insar_los::io::orbtiming::{read_orbinfo, FIELDS_PER_LINE};
use insar_los::{LosError, OrbitReader, OrbitWindowExtractor};
use std::fs;
use tempfile::TempDir;

fn osv(utc: &str, x: f64) -> String {
    format!(
        r#"      <OSV>
        <TAI>TAI={utc}</TAI>
        <UTC>UTC={utc}</UTC>
        <UT1>UT1={utc}</UT1>
        <Absolute_Orbit>+30639</Absolute_Orbit>
        <X unit="m">{x:.6}</X>
        <Y unit="m">-5764729.554489</Y>
        <Z unit="m">4020703.265768</Z>
        <VX unit="m/s">-2269.808392</VX>
        <VY unit="m/s">-3946.433388</VY>
        <VZ unit="m/s">-6078.542538</VZ>
        <Quality>NOMINAL</Quality>
      </OSV>
"#
    )
}

fn eof_document(records: &[String]) -> String {
    let mut doc = String::from(
        r#"<?xml version="1.0" ?>
<Earth_Explorer_File>
  <Earth_Explorer_Header>
    <Fixed_Header>
      <File_Name>S1A_OPER_AUX_POEORB_OPOD_20200123T120000_V20200102T225942_20200104T005942</File_Name>
      <File_Description>Precise Orbit Ephemerides (POE) Orbit File</File_Description>
      <Mission>Sentinel-1A</Mission>
      <File_Class>OPER</File_Class>
      <File_Type>AUX_POEORB</File_Type>
      <Validity_Period>
        <Validity_Start>UTC=2020-01-02T22:59:42</Validity_Start>
        <Validity_Stop>UTC=2020-01-04T00:59:42</Validity_Stop>
      </Validity_Period>
      <File_Version>0001</File_Version>
    </Fixed_Header>
    <Variable_Header>
      <Ref_Frame>EARTH_FIXED</Ref_Frame>
      <Time_Reference>UTC</Time_Reference>
    </Variable_Header>
  </Earth_Explorer_Header>
  <Data_Block type="xml">
"#,
    );
    doc.push_str(&format!("    <List_of_OSVs count=\"{}\">\n", records.len()));
    for record in records {
        doc.push_str(record);
    }
    doc.push_str("    </List_of_OSVs>\n  </Data_Block>\n</Earth_Explorer_File>\n");
    doc
}

#[test]
fn test_scenario_window_around_reference_epoch() {
    let _ = env_logger::builder().is_test(true).try_init();

    let doc = eof_document(&[
        osv("2020-01-03T10:00:00.000000", 1.0),
        osv("2020-01-03T10:15:00.000000", 2.0),
        osv("2020-01-03T10:45:00.000000", 3.0),
    ]);
    let dir = TempDir::new().unwrap();
    let orbit_path = dir.path().join("orbit.EOF");
    let timing_path = dir.path().join("out.orbtiming");
    fs::write(&orbit_path, doc).unwrap();

    let epoch = Utc.with_ymd_and_hms(2020, 1, 3, 10, 10, 0).unwrap();
    let window = OrbitWindowExtractor::new(Duration::minutes(30))
        .create_orbtiming_file(&orbit_path, epoch, &timing_path)
        .unwrap();
    assert_eq!(window.len(), 2);

    let text = fs::read_to_string(&timing_path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(&lines[..4], &["0", "0", "0", "2"]);
    assert_eq!(lines.len(), 6);
    assert!(lines[4].starts_with("36000.0 1.0 "));
    assert!(lines[5].starts_with("36900.0 2.0 "));
}

#[test]
fn test_count_and_field_order_invariants() {
    let records: Vec<String> = (0..12)
        .map(|i| osv(&format!("2020-01-03T17:{:02}:00.000000", i * 2), i as f64))
        .collect();
    let dir = TempDir::new().unwrap();
    let orbit_path = dir.path().join("orbit.EOF");
    let timing_path = dir.path().join("out.orbtiming");
    fs::write(&orbit_path, eof_document(&records)).unwrap();

    let epoch = Utc.with_ymd_and_hms(2020, 1, 3, 17, 10, 0).unwrap();
    OrbitWindowExtractor::default()
        .create_orbtiming_file(&orbit_path, epoch, &timing_path)
        .unwrap();

    let text = fs::read_to_string(&timing_path).unwrap();
    let data_lines: Vec<&str> = text.lines().skip(4).collect();
    assert_eq!(text.lines().nth(3), Some("12"));
    assert_eq!(data_lines.len(), 12);
    for line in data_lines {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        assert_eq!(tokens.len(), FIELDS_PER_LINE);
        assert_eq!(&tokens[7..], &["0.0", "0.0", "0.0"]);
    }

    let records = read_orbinfo(&timing_path).unwrap();
    assert_eq!(records.len(), 12);
    approx::assert_relative_eq!(records[0].time, 61200.0);
    approx::assert_relative_eq!(records[11].velocity[2], -6078.542538);
}

#[test]
fn test_records_outside_window_never_written() {
    let doc = eof_document(&[
        osv("2020-01-02T17:05:00.000000", 0.0),
        osv("2020-01-03T16:30:00.000000", 1.0),
        osv("2020-01-03T17:05:00.000000", 2.0),
        osv("2020-01-03T17:40:00.000000", 3.0),
        osv("2020-01-04T17:05:00.000000", 4.0),
    ]);
    let epoch = Utc.with_ymd_and_hms(2020, 1, 3, 17, 8, 15).unwrap();
    let window = OrbitWindowExtractor::default().extract_str(&doc, epoch).unwrap();

    assert_eq!(window.len(), 1);
    assert_eq!(window.state_vectors[0].position[0], 2.0);
    for sv in &window.state_vectors {
        let t = sv.timestamp.absolute().unwrap();
        assert!(window.min_time() <= t && t <= window.max_time());
    }
}

#[test]
fn test_empty_window_writes_zero_count() {
    let doc = eof_document(&[osv("2020-01-03T10:00:00.000000", 1.0)]);
    let dir = TempDir::new().unwrap();
    let orbit_path = dir.path().join("orbit.EOF");
    let timing_path = dir.path().join("out.orbtiming");
    fs::write(&orbit_path, doc).unwrap();

    let epoch = Utc.with_ymd_and_hms(2020, 1, 5, 10, 0, 0).unwrap();
    let window = OrbitWindowExtractor::default()
        .create_orbtiming_file(&orbit_path, epoch, &timing_path)
        .unwrap();

    assert!(window.is_empty());
    assert_eq!(fs::read_to_string(&timing_path).unwrap(), "0\n0\n0\n0\n");
}

#[test]
fn test_mismatched_markers_write_nothing() {
    let mut doc = eof_document(&[
        osv("2020-01-03T10:00:00.000000", 1.0),
        osv("2020-01-03T10:01:00.000000", 2.0),
    ]);
    doc = doc.replacen("</OSV>", "", 1);

    let dir = TempDir::new().unwrap();
    let orbit_path = dir.path().join("orbit.EOF");
    let timing_path = dir.path().join("out.orbtiming");
    fs::write(&orbit_path, doc).unwrap();

    let epoch = Utc.with_ymd_and_hms(2020, 1, 3, 10, 0, 0).unwrap();
    let result = OrbitWindowExtractor::default().create_orbtiming_file(&orbit_path, epoch, &timing_path);

    match result {
        Err(LosError::MalformedInput(msg)) => assert!(msg.contains("2 <OSV> markers but 1")),
        other => panic!("expected malformed input, got {:?}", other),
    }
    assert!(!timing_path.exists());
}

#[test]
fn test_unclosed_record_is_not_merged_into_next() {
    // marker counts balance, but record 0 runs into record 1
    let unclosed = osv("2020-01-03T10:00:00.000000", 1.0).replace("      </OSV>\n", "");
    let doubled = format!("{}      </OSV>\n", osv("2020-01-03T10:01:00.000000", 2.0));
    let doc = eof_document(&[unclosed, doubled]);

    match OrbitReader::parse_orbit(&doc) {
        Err(LosError::MalformedInput(msg)) => {
            assert!(msg.contains("record 0"), "{}", msg);
            assert!(msg.contains("not closed"), "{}", msg);
        }
        other => panic!("expected malformed input, got {:?}", other),
    }
}

#[test]
fn test_missing_field_names_record() {
    let broken = osv("2020-01-03T10:01:00.000000", 2.0).replace(r#"<VY unit="m/s">-3946.433388</VY>"#, "");
    let doc = eof_document(&[osv("2020-01-03T10:00:00.000000", 1.0), broken]);

    match OrbitReader::parse_orbit(&doc) {
        Err(LosError::MalformedInput(msg)) => {
            assert!(msg.contains("record 1"), "{}", msg);
            assert!(msg.contains("<VY unit"), "{}", msg);
        }
        other => panic!("expected malformed input, got {:?}", other),
    }
}

#[test]
fn test_failed_run_keeps_previous_timing_file() {
    let dir = TempDir::new().unwrap();
    let orbit_path = dir.path().join("orbit.EOF");
    let timing_path = dir.path().join("out.orbtiming");
    fs::write(&timing_path, "previous").unwrap();
    fs::write(&orbit_path, "<OSV>\n<UTC>UTC=garbage</UTC>\n</OSV>\n").unwrap();

    let epoch = Utc.with_ymd_and_hms(2020, 1, 3, 10, 0, 0).unwrap();
    assert!(OrbitWindowExtractor::default()
        .create_orbtiming_file(&orbit_path, epoch, &timing_path)
        .is_err());
    assert_eq!(fs::read_to_string(&timing_path).unwrap(), "previous");
}

#[test]
fn test_header_fields() {
    let doc = eof_document(&[osv("2020-01-03T10:00:00.000000", 1.0)]);
    let orbit = OrbitReader::parse_orbit(&doc).unwrap();

    assert_eq!(orbit.header.mission.as_deref(), Some("Sentinel-1A"));
    assert_eq!(
        orbit.header.validity_start,
        Some(Utc.with_ymd_and_hms(2020, 1, 2, 22, 59, 42).unwrap())
    );
    assert_eq!(
        orbit.header.validity_stop,
        Some(Utc.with_ymd_and_hms(2020, 1, 4, 0, 59, 42).unwrap())
    );
    assert!(orbit.header.file_name.unwrap().starts_with("S1A_OPER_AUX_POEORB"));
}

#[test]
fn test_document_without_header() {
    let doc = format!("<List_of_OSVs>\n{}</List_of_OSVs>\n", osv("2020-01-03T10:00:00.000000", 1.0));
    let orbit = OrbitReader::parse_orbit(&doc).unwrap();
    assert_eq!(orbit.state_vectors.len(), 1);
    assert_eq!(orbit.header, insar_los::types::EofHeader::default());
}
