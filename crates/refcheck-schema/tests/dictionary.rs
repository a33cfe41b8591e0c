use std::fs;
use std::sync::Arc;

use refcheck_model::SchemaError;
use refcheck_schema::{DictionaryDocument, DictionaryError, SchemaRegistry, resolve};

const DICTIONARY_JSON: &str = r#"{
  "files": [
    { "name": "sample",
      "fields": ["analyzed_sample_id", "specimen_id", "notes"],
      "primary_key": ["analyzed_sample_id"],
      "relations": [ { "other": "specimen", "fields": ["specimen_id"], "surjective": true } ] },
    { "name": "donor", "fields": ["donor_id", "sex"], "primary_key": ["donor_id"] },
    { "name": "specimen",
      "fields": ["donor_id", "specimen_id"],
      "primary_key": ["specimen_id"],
      "relations": [ { "other": "donor", "fields": ["donor_id"] } ] }
  ]
}"#;

const DICTIONARY_TOML: &str = r#"
[[files]]
name = "sample"
fields = ["analyzed_sample_id", "specimen_id", "notes"]
primary_key = ["analyzed_sample_id"]

[[files.relations]]
other = "specimen"
fields = ["specimen_id"]
surjective = true

[[files]]
name = "donor"
fields = ["donor_id", "sex"]
primary_key = ["donor_id"]

[[files]]
name = "specimen"
fields = ["donor_id", "specimen_id"]
primary_key = ["specimen_id"]

[[files.relations]]
other = "donor"
fields = ["donor_id"]
"#;

#[test]
fn json_dictionary_resolves_names_to_indices() {
    let document = DictionaryDocument::from_json_str(DICTIONARY_JSON).expect("parse json");
    let schema = resolve(&document).expect("resolve");

    let sample = schema.get("sample").expect("sample type");
    assert_eq!(sample.primary_key, vec![0]);
    assert_eq!(sample.foreign_keys[0].fields, vec![1]);
    assert!(sample.foreign_keys[0].surjection_required);
    assert!(sample.requires_surjection());
    assert_eq!(sample.pattern, "^sample(\\..*)?\\.txt(\\.gz)?$");
}

#[test]
fn json_and_toml_share_a_fingerprint() {
    let json = DictionaryDocument::from_json_str(DICTIONARY_JSON).expect("parse json");
    let toml = DictionaryDocument::from_toml_str(DICTIONARY_TOML).expect("parse toml");
    assert_eq!(json, toml);
    assert_eq!(json.fingerprint(), toml.fingerprint());
    assert_eq!(json.fingerprint().len(), 64);
}

#[test]
fn unknown_field_is_a_schema_error() {
    let text = DICTIONARY_JSON.replace(r#""fields": ["donor_id"]"#, r#""fields": ["donor"]"#);
    let document = DictionaryDocument::from_json_str(&text).expect("parse json");
    let error = resolve(&document).unwrap_err();
    assert_eq!(
        error,
        SchemaError::UnknownField {
            file_type: "specimen".to_string(),
            field: "donor".to_string(),
        }
    );
}

#[test]
fn invalid_pattern_is_a_schema_error() {
    let document = DictionaryDocument::from_json_str(
        r#"{ "files": [ { "name": "donor", "pattern": "([", "fields": ["donor_id"] } ] }"#,
    )
    .expect("parse json");
    let error = resolve(&document).unwrap_err();
    assert!(matches!(error, SchemaError::InvalidPattern { .. }));
}

#[test]
fn unknown_document_keys_are_rejected() {
    let result = DictionaryDocument::from_json_str(
        r#"{ "files": [ { "name": "donor", "fields": ["donor_id"], "primary": ["donor_id"] } ] }"#,
    );
    assert!(result.is_err());
}

#[test]
fn registry_loads_once_per_release() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("0.10a.json"), DICTIONARY_JSON).expect("write dictionary");
    fs::write(dir.path().join("0.11c.toml"), DICTIONARY_TOML).expect("write dictionary");
    let registry = SchemaRegistry::with_dictionary_root(dir.path());

    let first = registry.resolve("0.10a").expect("resolve json release");
    let second = registry.resolve("0.10a").expect("cached release");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.order(), ["donor", "specimen", "sample"]);

    let toml = registry.resolve("0.11c").expect("resolve toml release");
    assert_eq!(toml.fingerprint, first.fingerprint);
    assert_eq!(registry.releases(), vec!["0.10a", "0.11c"]);
}

#[test]
fn registry_reports_unknown_release() {
    let dir = tempfile::tempdir().expect("temp dir");
    let registry = SchemaRegistry::with_dictionary_root(dir.path());
    let error = registry.resolve("missing").unwrap_err();
    assert!(matches!(error, DictionaryError::UnknownRelease { .. }));
    assert!(registry.get("missing").is_none());
}

#[test]
fn registry_rejects_cyclic_dictionary_before_caching() {
    let document = DictionaryDocument::from_json_str(
        r#"{ "files": [
            { "name": "a", "fields": ["id", "b_id"], "primary_key": ["id"],
              "relations": [ { "other": "b", "fields": ["b_id"] } ] },
            { "name": "b", "fields": ["id", "a_id"], "primary_key": ["id"],
              "relations": [ { "other": "a", "fields": ["a_id"] } ] } ] }"#,
    )
    .expect("parse json");
    let registry = SchemaRegistry::new();
    let error = registry.register("cyclic", &document).unwrap_err();
    assert!(matches!(
        error,
        DictionaryError::Schema(SchemaError::Cycle { .. })
    ));
    assert!(registry.get("cyclic").is_none());
}
