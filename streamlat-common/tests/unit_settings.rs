use std::io::Write;
use streamlat_common::{ConsumerSettings, OffsetReset, ProducerSettings, StreamError};

#[test]
fn test_consumer_defaults() {
    let s = ConsumerSettings::default();
    assert_eq!(s.group_id, "mygroup");
    assert_eq!(s.offset_reset, OffsetReset::Earliest);
    assert_eq!(s.auto_commit_interval_ms, 500);
}

#[test]
fn test_producer_defaults() {
    let s = ProducerSettings::default();
    assert_eq!(s.default_stream, "/sample-stream");
    assert_eq!(s.batch_size, 100);
}

#[test]
fn test_consumer_settings_from_file_fills_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"group_id": "latency", "offset_reset": "latest"}}"#).unwrap();

    let s = ConsumerSettings::from_json_file(file.path()).unwrap();
    assert_eq!(s.group_id, "latency");
    assert_eq!(s.offset_reset, OffsetReset::Latest);
    assert_eq!(s.auto_commit_interval_ms, 500);
}

#[test]
fn test_consumer_settings_missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ConsumerSettings::from_json_file(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, StreamError::Config(_)));
}

#[test]
fn test_consumer_settings_bad_json_is_config_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ group_id: ").unwrap();
    assert!(matches!(
        ConsumerSettings::from_json_file(file.path()),
        Err(StreamError::Config(_))
    ));
}

#[test]
fn test_offset_reset_wire_names() {
    assert_eq!(OffsetReset::Earliest.as_str(), "earliest");
    assert_eq!(serde_json::to_string(&OffsetReset::Latest).unwrap(), r#""latest""#);
}
