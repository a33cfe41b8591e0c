use refcheck_model::{
    FileErrorCollection, FileTypeSchema, ForeignKeySpec, KeyTuple, RowError, SubmissionReport,
    SubmissionSchema,
};
use refcheck_report::{ErrorRecord, ReportError, ReportSummary, ReportWriter, read_records};

fn schema() -> SubmissionSchema {
    SubmissionSchema::new(vec![
        FileTypeSchema::new("donor", &["donor_id", "sex"]).with_primary_key(vec![0]),
        FileTypeSchema::new("specimen", &["donor_id", "specimen_id"])
            .with_primary_key(vec![1])
            .with_foreign_key(ForeignKeySpec::new("donor", vec![0]).surjective()),
        FileTypeSchema::new("biomarker", &["donor_id", "marker"])
            .with_foreign_key(ForeignKeySpec::new("donor", vec![0]).complex()),
        FileTypeSchema::new("therapy", &["donor_ref", "drug"])
            .with_foreign_key(ForeignKeySpec::new("donor", vec![0]).complex()),
    ])
    .expect("valid schema")
}

fn report() -> SubmissionReport {
    let mut donors = FileErrorCollection::new("donor.txt", "donor");
    donors.add(RowError::simple_surjection(
        "donor.txt",
        "specimen",
        KeyTuple::new(["D3"]),
        vec![0],
    ));
    let mut specimens = FileErrorCollection::new("specimen.txt", "specimen");
    specimens.add(RowError::missing_relation(
        "specimen.txt",
        4,
        "donor",
        KeyTuple::new(["D9"]),
        vec![0],
    ));
    specimens.add(RowError::duplicate(
        "specimen.txt",
        3,
        KeyTuple::new(["SP1"]),
        vec![1],
    ));
    SubmissionReport::new("PRJ", [specimens, donors])
}

fn render(report: &SubmissionReport) -> String {
    let mut writer = ReportWriter::new(Vec::new());
    let count = writer.write_report(report, &schema()).expect("write report");
    assert_eq!(count, report.error_count());
    let bytes = writer.finish().expect("finish");
    String::from_utf8(bytes).expect("utf-8 report")
}

#[test]
fn records_are_one_json_object_per_line() {
    let text = render(&report());
    insta::assert_snapshot!(text.trim_end(), @r#"
    {"file_name":"donor.txt","file_type":"donor","error_type":"SIMPLE_SURJECTION","line_number":-1,"field_names":["donor_id"],"value":["D3"],"params":{"other_file_types":["specimen"],"other_fields":["donor_id"]}}
    {"file_name":"specimen.txt","file_type":"specimen","error_type":"UNIQUENESS","line_number":3,"field_names":["specimen_id"],"value":["SP1"]}
    {"file_name":"specimen.txt","file_type":"specimen","error_type":"RELATION","line_number":4,"field_names":["donor_id"],"value":["D9"],"params":{"other_file_types":["donor"],"other_fields":["donor_id"]}}
    "#);
}

#[test]
fn complex_surjection_names_every_referencing_type() {
    let error = RowError::complex_surjection(
        "donor.txt",
        vec!["biomarker".to_string(), "therapy".to_string()],
        KeyTuple::new(["D7"]),
        vec![0],
    );
    let record = ErrorRecord::describe(&error, "donor", &schema()).expect("describe");
    assert_eq!(record.error_type, "COMPLEX_SURJECTION");
    assert_eq!(record.line_number, -2);
    let params = record.params.expect("surjection params");
    assert_eq!(params.other_file_types, vec!["biomarker", "therapy"]);
    assert_eq!(params.other_fields, vec!["donor_id", "donor_ref"]);
}

#[test]
fn one_sink_receives_several_collections() {
    let schema = schema();
    let report = report();
    let mut writer = ReportWriter::new(Vec::new());
    for collection in report.files() {
        writer
            .write_collection(collection, &schema)
            .expect("write collection");
    }
    assert_eq!(writer.written(), 3);
    let bytes = writer.finish().expect("finish");
    assert_eq!(bytes.iter().filter(|byte| **byte == b'\n').count(), 3);
}

#[test]
fn records_read_back_and_summarize() {
    let report = report();
    let text = render(&report);
    let records = read_records(text.as_bytes()).expect("read records");
    assert_eq!(records.len(), 3);
    assert_eq!(records[1].value, vec!["SP1"]);
    assert!(records[1].params.is_none());

    let from_records = ReportSummary::from_records(&records);
    assert_eq!(from_records, ReportSummary::from_report(&report));
    assert_eq!(from_records.total, 3);
    assert_eq!(from_records.by_error_type.get("RELATION"), Some(&1));
    assert_eq!(from_records.by_file.get("specimen.txt"), Some(&2));
}

#[test]
fn malformed_record_reports_its_line() {
    let text = "{\"file_name\":\"a\"}\n";
    let error = read_records(text.as_bytes()).unwrap_err();
    assert!(matches!(error, ReportError::Parse { line: 1, .. }));
}

#[test]
fn unknown_file_type_is_rejected() {
    let error = RowError::duplicate("x.txt", 2, KeyTuple::new(["X"]), vec![0]);
    let result = ErrorRecord::describe(&error, "unknown", &schema());
    assert!(matches!(result, Err(ReportError::UnknownFileType { .. })));
}
