use std::fs;
use std::io::{Read, Write};

use flate2::Compression;
use flate2::write::GzEncoder;
use refcheck_ingest::{
    AccessProtocol, FileAccess, InMemoryFileAccess, IngestError, LocalFileAccess, ParseFailure,
    ReadError, TsvReader,
};
use regex::Regex;

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_string()).collect()
}

fn collect_rows(text: &str, declared: &[&str]) -> Result<Vec<(i64, Vec<String>)>, ReadError> {
    let mut reader = TsvReader::new("donor.txt", text.as_bytes(), &fields(declared))?;
    let mut rows = Vec::new();
    while let Some(row) = reader.next_row()? {
        let values = (0..row.len())
            .map(|idx| row.get(idx).unwrap_or_default().to_string())
            .collect();
        rows.push((row.line, values));
    }
    Ok(rows)
}

fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).expect("compress");
    encoder.finish().expect("finish gzip")
}

#[test]
fn rows_carry_physical_line_numbers() {
    let rows = collect_rows("donor_id\tage\nD1\t40\nD2\t51\n", &["donor_id", "age"]).expect("rows");
    assert_eq!(
        rows,
        vec![
            (2, vec!["D1".to_string(), "40".to_string()]),
            (3, vec!["D2".to_string(), "51".to_string()]),
        ]
    );
}

#[test]
fn blank_lines_are_skipped_but_counted() {
    let rows = collect_rows("donor_id\nD1\n\nD2\r\n", &["donor_id"]).expect("rows");
    let lines: Vec<i64> = rows.iter().map(|(line, _)| *line).collect();
    assert_eq!(lines, vec![2, 4]);
}

#[test]
fn leading_blank_lines_shift_the_first_row() {
    let rows = collect_rows("donor_id\n\n\nD1\n", &["donor_id"]).expect("rows");
    assert_eq!(rows, vec![(4, vec!["D1".to_string()])]);
}

#[test]
fn field_count_failure_reports_physical_line() {
    let error = collect_rows("donor_id\tage\nD1\t40\n\n\nD2\n", &["donor_id", "age"]).unwrap_err();
    assert!(matches!(
        error,
        ReadError::Parse(ParseFailure::FieldCount { line: 5, found: 1, .. })
    ));
}

#[test]
fn last_row_without_terminator_keeps_its_line() {
    let rows = collect_rows("\u{feff}donor_id\r\nD1\r\n\r\nD2", &["donor_id"]).expect("rows");
    let lines: Vec<i64> = rows.iter().map(|(line, _)| *line).collect();
    assert_eq!(lines, vec![2, 4]);
}

#[test]
fn quotes_are_literal_values() {
    let rows = collect_rows("donor_id\tnote\nD1\t\"a\tb\n", &["donor_id", "note"]);
    // A quote does not protect the tab, so the row is three fields wide.
    assert!(matches!(
        rows,
        Err(ReadError::Parse(ParseFailure::FieldCount { found: 3, .. }))
    ));
}

#[test]
fn header_must_match_declared_fields() {
    let error = collect_rows("age\tdonor_id\nD1\t40\n", &["donor_id", "age"]).unwrap_err();
    match error {
        ReadError::Parse(ParseFailure::HeaderMismatch { found, .. }) => {
            assert_eq!(found, fields(&["age", "donor_id"]));
        }
        other => panic!("expected header mismatch, got {other}"),
    }
}

#[test]
fn byte_order_mark_is_ignored_in_header() {
    let rows = collect_rows("\u{feff}donor_id\nD1\n", &["donor_id"]).expect("rows");
    assert_eq!(rows.len(), 1);
}

#[test]
fn empty_input_has_no_header() {
    let error = collect_rows("", &["donor_id"]).unwrap_err();
    assert!(matches!(
        error,
        ReadError::Parse(ParseFailure::MissingHeader { .. })
    ));
}

#[test]
fn short_row_is_a_field_count_failure() {
    let error = collect_rows("donor_id\tage\nD1\t40\nD2\n", &["donor_id", "age"]).unwrap_err();
    match error {
        ReadError::Parse(ParseFailure::FieldCount {
            line,
            expected,
            found,
            ..
        }) => {
            assert_eq!((line, expected, found), (3, 2, 1));
        }
        other => panic!("expected field count failure, got {other}"),
    }
}

#[test]
fn local_access_lists_matching_files_sorted() {
    let dir = tempfile::tempdir().expect("temp dir");
    let project = dir.path().join("PRJ-1");
    fs::create_dir_all(&project).expect("project dir");
    fs::write(project.join("donor.b.txt"), "donor_id\n").expect("write");
    fs::write(project.join("donor.a.txt"), "donor_id\n").expect("write");
    fs::write(project.join("specimen.txt"), "specimen_id\n").expect("write");
    fs::write(project.join("donor.csv"), "donor_id\n").expect("write");

    let access = LocalFileAccess::new(dir.path());
    let pattern = Regex::new(r"^donor(\..*)?\.txt(\.gz)?$").expect("regex");
    let files = access.list("PRJ-1", &pattern).expect("list");
    let names: Vec<&str> = files.iter().map(|file| file.name.as_str()).collect();
    assert_eq!(names, vec!["donor.a.txt", "donor.b.txt"]);
}

#[test]
fn local_access_reports_missing_project() {
    let dir = tempfile::tempdir().expect("temp dir");
    let access = LocalFileAccess::new(dir.path());
    let pattern = Regex::new("^donor").expect("regex");
    let error = access.list("missing", &pattern).unwrap_err();
    assert!(matches!(error, IngestError::DirectoryNotFound { .. }));
}

#[test]
fn local_access_decompresses_gzip() {
    let dir = tempfile::tempdir().expect("temp dir");
    let project = dir.path().join("PRJ-1");
    fs::create_dir_all(&project).expect("project dir");
    fs::write(project.join("donor.txt.gz"), gzip("donor_id\nD1\n")).expect("write");

    let access = LocalFileAccess::new(dir.path());
    let pattern = Regex::new(r"^donor(\..*)?\.txt(\.gz)?$").expect("regex");
    let files = access.list("PRJ-1", &pattern).expect("list");
    assert_eq!(files.len(), 1);
    assert!(files[0].is_compressed());

    let mut text = String::new();
    access
        .open(&files[0])
        .expect("open")
        .read_to_string(&mut text)
        .expect("read");
    assert_eq!(text, "donor_id\nD1\n");
}

#[test]
fn local_access_writes_under_output_root() {
    let input = tempfile::tempdir().expect("input dir");
    let output = tempfile::tempdir().expect("output dir");
    let access =
        LocalFileAccess::new(input.path()).with_output_root(Some(output.path().to_path_buf()));

    let mut sink = access.create("PRJ-1", "key-errors.jsonl").expect("create");
    sink.writer.write_all(b"{}\n").expect("write");
    sink.writer.flush().expect("flush");

    let expected = output.path().join("PRJ-1").join("key-errors.jsonl");
    assert_eq!(sink.location, expected.display().to_string());
    assert_eq!(fs::read_to_string(expected).expect("read back"), "{}\n");
}

#[test]
fn memory_access_round_trips_contents() {
    let access = InMemoryFileAccess::new()
        .with_file("PRJ", "donor.txt", "donor_id\nD1\n")
        .with_file("PRJ", "sample.txt.gz", gzip("sample_id\nS1\n"));

    let pattern = Regex::new(r"^sample(\..*)?\.txt(\.gz)?$").expect("regex");
    let files = access.list("PRJ", &pattern).expect("list");
    let mut text = String::new();
    access
        .open(&files[0])
        .expect("open")
        .read_to_string(&mut text)
        .expect("read");
    assert_eq!(text, "sample_id\nS1\n");

    let mut sink = access.create("PRJ", "report.jsonl").expect("create");
    sink.writer.write_all(b"line\n").expect("write");
    assert_eq!(access.output("PRJ", "report.jsonl"), Some(b"line\n".to_vec()));
}

#[test]
fn protocols_parse_case_insensitively() {
    assert_eq!("FILE".parse::<AccessProtocol>().ok(), Some(AccessProtocol::File));
    assert_eq!("memory".parse::<AccessProtocol>().ok(), Some(AccessProtocol::Memory));
    assert!(matches!(
        "hdfs".parse::<AccessProtocol>(),
        Err(IngestError::UnsupportedProtocol { .. })
    ));
}
