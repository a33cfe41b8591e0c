use std::sync::Arc;

use anyhow::{Context, Result, bail};
use comfy_table::Table;
use tracing::info;

use refcheck_cli::config::CliConfig;
use refcheck_cli::projects::{discover_projects, load_dictionary, run_batch};
use refcheck_core::CancellationToken;
use refcheck_executor::{Outcome, ValidationExecutor};
use refcheck_validate::{KeyValidationOutcome, KeyValidationRequest, KeyValidationService};

use crate::cli::{BatchArgs, DictionaryArg, PathArgs, ValidateArgs};
use crate::summary::apply_table_style;

pub fn run_validate(args: &ValidateArgs, config: &CliConfig) -> Result<KeyValidationOutcome> {
    let (registry, resolved) = load_dictionary(&args.dictionary.dictionary)?;
    let mut options = config.engine.clone();
    if args.sequential {
        options = options.with_parallel_types(false);
    }
    let service = KeyValidationService::new(registry).with_options(options);

    let mut request =
        KeyValidationRequest::new(resolved.release.clone(), &args.project, &args.input_root);
    if let Some(output_root) = &args.output_root {
        request = request.with_output_root(output_root);
    }
    service
        .invoke(&request, &CancellationToken::new())
        .with_context(|| format!("validate project {}", args.project))
}

pub fn run_batch_command(args: &BatchArgs, config: &CliConfig) -> Result<Vec<(String, Outcome)>> {
    let (registry, resolved) = load_dictionary(&args.dictionary.dictionary)?;
    let projects = if args.projects.is_empty() {
        discover_projects(&args.input_root)?
    } else {
        args.projects.clone()
    };
    if projects.is_empty() {
        bail!("no projects found under {}", args.input_root.display());
    }

    let mut executor_config = config.executor.clone();
    if let Some(capacity) = args.capacity {
        executor_config = executor_config.with_capacity(capacity);
    }
    let executor = ValidationExecutor::new(&executor_config).context("start executor")?;
    let service =
        Arc::new(KeyValidationService::new(registry).with_options(config.engine.clone()));

    let requests = projects
        .iter()
        .map(|project| {
            let request =
                KeyValidationRequest::new(resolved.release.clone(), project, &args.input_root);
            match &args.output_root {
                Some(output_root) => request.with_output_root(output_root),
                None => request,
            }
        })
        .collect();
    info!(
        projects = projects.len(),
        capacity = executor.capacity(),
        "batch validation started"
    );
    let results = run_batch(&executor, &service, requests)?;
    executor.stop();
    Ok(results)
}

pub fn run_order(args: &DictionaryArg) -> Result<()> {
    let (_, resolved) = load_dictionary(&args.dictionary)?;
    let mut table = Table::new();
    table.set_header(vec!["#", "File type", "Depends on", "Primary key"]);
    apply_table_style(&mut table);
    for (position, name) in resolved.order().iter().enumerate() {
        let file_type = resolved.schema.require(name)?;
        table.add_row(vec![
            (position + 1).to_string(),
            name.clone(),
            resolved.graph.parents(name).join(", "),
            file_type.primary_key_names().join(", "),
        ]);
    }
    println!("Release: {}", resolved.release);
    println!("{table}");
    Ok(())
}

pub fn run_path(args: &PathArgs) -> Result<()> {
    let (_, resolved) = load_dictionary(&args.dictionary.dictionary)?;
    for name in [&args.from, &args.to] {
        resolved.schema.require(name)?;
    }
    if args.from == args.to {
        println!("{}", args.from);
        return Ok(());
    }
    let edges = resolved.graph.shortest_path(&args.from, &args.to);
    if edges.is_empty() {
        bail!("no relation path from {} to {}", args.from, args.to);
    }

    let mut table = Table::new();
    table.set_header(vec!["From", "To", "Fields"]);
    apply_table_style(&mut table);
    for edge in &edges {
        let fields = resolved
            .schema
            .get(&edge.child)
            .map(|child| child.field_names(&edge.fields).join(", "))
            .unwrap_or_default();
        table.add_row(vec![edge.child.clone(), edge.parent.clone(), fields]);
    }
    println!("{table}");
    Ok(())
}
