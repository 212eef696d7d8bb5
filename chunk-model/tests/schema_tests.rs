use chunk_model::{ChunkMeta, ChunkRecord, DocOrigin, NO_HEADING_LEVEL, SCHEMA_NAME, SCHEMA_VERSION};

fn sample_record(overlap_tokens: Option<usize>) -> ChunkRecord {
    ChunkRecord {
        text: "# Title\nBody text.\n".into(),
        meta: ChunkMeta {
            schema_name: SCHEMA_NAME.into(),
            version: SCHEMA_VERSION.into(),
            start_page: 0,
            end_page: 1,
            page_count: 2,
            chunk_index: 0,
            total_chunks: 3,
            token_count: 7,
            has_major_heading: true,
            min_heading_level: 1,
            overlap_tokens,
            origin: DocOrigin {
                mimetype: "application/pdf".into(),
                binary_hash: 0xDEAD_BEEF_u64,
                filename: "sample.pdf".into(),
                uri: None,
            },
            extracted_at: "2025-01-01T00:00:00+00:00".into(),
            doc_items: Vec::new(),
            headings: Vec::new(),
            captions: None,
        },
    }
}

#[test]
fn record_serializes_with_expected_shape() {
    let record = sample_record(None);
    let json = serde_json::to_value(&record).expect("record serializes");

    assert_eq!(json["meta"]["schema_name"], SCHEMA_NAME);
    assert_eq!(json["meta"]["version"], SCHEMA_VERSION);
    assert_eq!(json["meta"]["origin"]["mimetype"], "application/pdf");
    // uri and captions are emitted as explicit nulls
    assert!(json["meta"]["origin"]["uri"].is_null());
    assert!(json["meta"]["captions"].is_null());
    // doc_items / headings stay present as empty arrays
    assert_eq!(json["meta"]["doc_items"].as_array().map(Vec::len), Some(0));
    assert_eq!(json["meta"]["headings"].as_array().map(Vec::len), Some(0));
    // overlap_tokens is omitted entirely when absent
    assert!(json["meta"].get("overlap_tokens").is_none());
}

#[test]
fn overlap_tokens_emitted_when_present() {
    let record = sample_record(Some(8));
    let json = serde_json::to_value(&record).expect("record serializes");
    assert_eq!(json["meta"]["overlap_tokens"], 8);
}

#[test]
fn round_trips_through_json() {
    let record = sample_record(Some(4));
    let json = serde_json::to_string(&record).expect("serialize");
    let back: ChunkRecord = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, record);
}

#[test]
fn soft_validation_flags_empty_text_and_bad_ranges() {
    let mut record = sample_record(None);
    assert!(record.validate_soft().is_ok());

    record.text = "   \n".into();
    assert!(record.validate_soft().is_err());

    let mut record = sample_record(None);
    record.meta.start_page = 5;
    record.meta.end_page = 2;
    assert!(record.validate_soft().is_err());
}

#[test]
fn no_heading_sentinel_is_stable() {
    assert_eq!(NO_HEADING_LEVEL, 999);
}
