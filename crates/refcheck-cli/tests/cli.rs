use std::fs;
use std::path::Path;
use std::sync::Arc;

use refcheck_cli::config::CliConfig;
use refcheck_cli::logging::{LogConfig, LogFormat, default_directives, init_logging};
use refcheck_cli::projects::{discover_projects, load_dictionary, run_batch};
use refcheck_executor::{ExecutorConfig, TaskState, ValidationExecutor};
use refcheck_validate::{EngineOptions, KeyValidationRequest, KeyValidationService};
use tracing::level_filters::LevelFilter;

const DICTIONARY: &str = r#"
[[files]]
name = "donor"
fields = ["donor_id", "sex"]
primary_key = ["donor_id"]

[[files]]
name = "specimen"
fields = ["specimen_id", "donor_id"]
primary_key = ["specimen_id"]
relations = [{ other = "donor", fields = ["donor_id"], surjective = true }]
"#;

fn write_project(root: &Path, project: &str, donors: &[&str]) {
    let dir = root.join(project);
    fs::create_dir_all(&dir).expect("project dir");
    let mut donor_file = String::from("donor_id\tsex\n");
    for donor in donors {
        donor_file.push_str(&format!("{donor}\tF\n"));
    }
    fs::write(dir.join("donor.txt"), donor_file).expect("donor file");
    fs::write(dir.join("specimen.txt"), "specimen_id\tdonor_id\nSP1\tDO1\n").expect("specimen");
}

#[test]
fn config_sections_are_optional() {
    let config = CliConfig::from_toml_str("").expect("empty config");
    assert_eq!(config, CliConfig::default());

    let config = CliConfig::from_toml_str(
        "[engine]\nparallel_types = false\nnot_applicable_codes = [\"-888\", \"-777\"]\n\n\
         [executor]\ncapacity = 4\n",
    )
    .expect("config");
    assert!(!config.engine.parallel_types);
    assert_eq!(config.engine.not_applicable_codes, vec!["-888", "-777"]);
    assert_eq!(
        config.engine.cancel_check_interval,
        EngineOptions::default().cancel_check_interval
    );
    assert_eq!(config.executor.capacity, 4);
    assert_eq!(config.executor.thread_name_prefix, "validation-slot");
}

#[test]
fn unknown_config_section_is_rejected() {
    assert!(CliConfig::from_toml_str("[engin]\nparallel_types = false\n").is_err());
}

#[test]
fn config_file_is_loaded_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("refcheck.toml");
    fs::write(&path, "[executor]\ncapacity = 3\n").expect("config file");

    let config = CliConfig::load_or_default(Some(&path)).expect("load");
    assert_eq!(config.executor, ExecutorConfig::default().with_capacity(3));
    assert_eq!(
        CliConfig::load_or_default(None).expect("defaults"),
        CliConfig::default()
    );
    assert!(CliConfig::load(&dir.path().join("missing.toml")).is_err());
}

#[test]
fn dictionary_release_defaults_to_file_stem() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("0.9c.toml");
    fs::write(&path, DICTIONARY).expect("dictionary");

    let (registry, resolved) = load_dictionary(&path).expect("dictionary");
    assert_eq!(resolved.release, "0.9c");
    assert_eq!(resolved.order(), ["donor", "specimen"]);
    assert!(registry.get("0.9c").is_some());
}

#[test]
fn projects_are_the_sorted_subdirectories() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_project(dir.path(), "PRJ-B", &["DO1"]);
    write_project(dir.path(), "PRJ-A", &["DO1"]);
    fs::write(dir.path().join("notes.txt"), "not a project").expect("stray file");

    assert_eq!(
        discover_projects(dir.path()).expect("projects"),
        vec!["PRJ-A", "PRJ-B"]
    );
}

#[test]
fn batch_retries_until_every_project_ran() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dictionary = dir.path().join("release.toml");
    fs::write(&dictionary, DICTIONARY).expect("dictionary");
    let input = dir.path().join("input");
    write_project(&input, "PRJ-1", &["DO1"]);
    write_project(&input, "PRJ-2", &["DO1", "DO2"]);
    write_project(&input, "PRJ-3", &["DO1"]);

    let (registry, resolved) = load_dictionary(&dictionary).expect("dictionary");
    let service = Arc::new(KeyValidationService::new(registry));
    let executor =
        ValidationExecutor::new(&ExecutorConfig::default().with_capacity(1)).expect("executor");
    let requests = ["PRJ-1", "PRJ-2", "PRJ-3"]
        .into_iter()
        .map(|project| KeyValidationRequest::new(resolved.release.clone(), project, &input))
        .collect();

    let results = run_batch(&executor, &service, requests).expect("batch");
    let summary: Vec<(&str, TaskState, bool)> = results
        .iter()
        .map(|(project, outcome)| {
            (
                project.as_str(),
                outcome.state(),
                outcome.completed().is_some_and(|run| run.key_valid),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("PRJ-1", TaskState::Completed, true),
            ("PRJ-2", TaskState::Completed, false),
            ("PRJ-3", TaskState::Completed, true),
        ]
    );
    assert!(input.join("PRJ-2").join("key-errors.jsonl").exists());
}

#[test]
fn default_directives_cover_workspace_crates() {
    let directives = default_directives(LevelFilter::DEBUG);
    assert!(directives.starts_with("warn,"));
    assert!(directives.contains("refcheck_validate=debug"));
    assert!(directives.contains("refcheck_executor=debug"));
}

#[test]
fn log_file_receives_events() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("refcheck.log");
    let mut config = LogConfig::default()
        .with_level_filter(LevelFilter::INFO)
        .with_format(LogFormat::Compact)
        .with_log_file(Some(path.clone()));
    config.use_env_filter = false;
    config.with_ansi = false;
    init_logging(&config).expect("logging");

    tracing::info!(target: "refcheck_cli", project = "PRJ-1", "batch validation started");
    tracing::debug!(target: "refcheck_cli", "filtered out");

    let written = fs::read_to_string(&path).expect("log file");
    assert!(written.contains("batch validation started"), "{written}");
    assert!(written.contains("project=\"PRJ-1\""), "{written}");
    assert!(!written.contains("filtered out"));
}
