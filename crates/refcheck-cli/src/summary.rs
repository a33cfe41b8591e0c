use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use refcheck_executor::{Outcome, TaskState};
use refcheck_validate::KeyValidationOutcome;

const CODES: [&str; 4] = [
    "UNIQUENESS",
    "RELATION",
    "SIMPLE_SURJECTION",
    "COMPLEX_SURJECTION",
];

pub fn print_outcome(outcome: &KeyValidationOutcome) {
    println!("Project: {}", outcome.project_key);
    println!("Report: {}", outcome.report_location);
    println!(
        "Files: {}  Rows: {}  Duration: {} ms",
        outcome.stats.files, outcome.stats.rows, outcome.stats.duration_ms
    );

    let mut table = Table::new();
    let mut header = vec![header_cell("File"), header_cell("Type")];
    header.extend(CODES.iter().map(|code| header_cell(code)));
    table.set_header(header);
    apply_summary_table_style(&mut table);
    for column in 2..2 + CODES.len() {
        align_column(&mut table, column, CellAlignment::Right);
    }

    let mut totals = [0usize; CODES.len()];
    for collection in outcome.report.files() {
        let mut row = vec![
            Cell::new(&collection.file_name),
            dim_cell(&collection.file_type),
        ];
        for (slot, code) in CODES.iter().enumerate() {
            let count = collection.count_by_code(code);
            totals[slot] += count;
            row.push(count_cell(count));
        }
        table.add_row(row);
    }
    let mut total_row = vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        dim_cell("-"),
    ];
    total_row.extend(totals.iter().map(|count| count_cell(*count)));
    table.add_row(total_row);
    println!("{table}");

    if outcome.key_valid {
        println!("Submission is key-valid.");
    } else {
        println!(
            "Submission is NOT key-valid: {} violation(s).",
            outcome.report.error_count()
        );
    }
}

pub fn print_batch(results: &[(String, Outcome)]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Project"),
        header_cell("State"),
        header_cell("Violations"),
        header_cell("Report / cause"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);

    for (project, outcome) in results {
        let (violations, detail) = match outcome {
            Outcome::Completed(run) => (
                count_cell(run.report.error_count()),
                Cell::new(&run.report_location),
            ),
            Outcome::Failed(failure) => (dim_cell("-"), Cell::new(failure).fg(Color::Red)),
            Outcome::Cancelled => (dim_cell("-"), dim_cell("cancelled")),
        };
        table.add_row(vec![
            Cell::new(project),
            state_cell(outcome),
            violations,
            detail,
        ]);
    }
    println!("{table}");
}

/// True when every project completed and is key-valid.
pub fn batch_is_key_valid(results: &[(String, Outcome)]) -> bool {
    results
        .iter()
        .all(|(_, outcome)| outcome.completed().is_some_and(|run| run.key_valid))
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn state_cell(outcome: &Outcome) -> Cell {
    let state = outcome.state();
    let color = match state {
        TaskState::Completed if outcome.completed().is_some_and(|run| run.key_valid) => {
            Color::Green
        }
        TaskState::Completed => Color::Yellow,
        TaskState::Failed => Color::Red,
        _ => Color::DarkGrey,
    };
    Cell::new(state).fg(color)
}

fn count_cell(count: usize) -> Cell {
    if count > 0 {
        Cell::new(count).fg(Color::Red).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
