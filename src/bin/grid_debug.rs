// Grid pipeline debug binary - runs reconcile, resolve and width estimation
// for one table and prints the result.
// Run with: cargo run --bin grid_debug -- <schema.json> <table> [view.json] [rows.json]

use anyhow::{anyhow, Context, Result};
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use std::fs;

use sql_grid::config::config::Config;
use sql_grid::data::column_config::ColumnRole;
use sql_grid::data::config_store::{InMemoryConfigStore, PersistedView, ViewKey};
use sql_grid::data::row_source::MemoryRowSource;
use sql_grid::data::schema::SchemaView;
use sql_grid::ui::grid_view::GridView;
use sql_grid::utils::logging::init_tracing;

const AVAILABLE_WIDTH: u32 = 1200;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        return Err(anyhow!(
            "usage: grid_debug <schema.json> <table> [view.json] [rows.json]"
        ));
    }

    let log_buffer = init_tracing("debug");
    let config = Config::load().unwrap_or_default();

    let schema_json =
        fs::read_to_string(&args[0]).with_context(|| format!("reading schema {}", args[0]))?;
    let schema = SchemaView::from_json(&schema_json)?;
    let key = ViewKey::new(args[1].as_str(), "debug");

    let mut store = InMemoryConfigStore::new();
    if let Some(path) = args.get(2) {
        let json = fs::read_to_string(path).with_context(|| format!("reading view {}", path))?;
        let stored: PersistedView = serde_json::from_str(&json)?;
        store = store.with_view(key.clone(), stored);
    }

    println!("=== Grid Pipeline Debug ===");
    println!("Table: {}", key.table);

    let mut view = GridView::mount(schema, key, store, &config, AVAILABLE_WIDTH)?;

    if let Some(path) = args.get(3) {
        let json = fs::read_to_string(path).with_context(|| format!("reading rows {}", path))?;
        let source = MemoryRowSource::from_json(&json)?;
        let sampled = view.load_sample_rows(&source).await?;
        println!("Sampled {} rows for width estimation", sampled);
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        ["#", "Column", "Role", "Type", "Shown", "Width", "Nested"]
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
    );

    for (idx, column) in view.resolved_columns().iter().enumerate() {
        let role = match column.config.role() {
            ColumnRole::Plain => "plain",
            ColumnRole::Nested => "nested",
            ColumnRole::Computed => "computed",
            ColumnRole::WrappedColumn => "wrapped",
        };
        let nested = column
            .nested_table
            .as_ref()
            .map(|t| {
                let subs: Vec<&str> = column.visible_nested_columns().map(|c| c.key()).collect();
                format!("{} [{}]", t, subs.join(", "))
            })
            .unwrap_or_default();

        table.add_row(vec![
            idx.to_string(),
            column.key().to_string(),
            role.to_string(),
            column
                .output_type
                .as_ref()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string()),
            column.is_visible().to_string(),
            column
                .width()
                .map(|w| format!("{}px", w))
                .unwrap_or_else(|| "-".to_string()),
            nested,
        ]);
    }
    println!("{table}");

    let sort = view.sort();
    if sort.is_empty() {
        println!("Sort: none");
    } else {
        let parts: Vec<String> = sort
            .iter()
            .map(|s| format!("{} {}", s.key, if s.asc { "asc" } else { "desc" }))
            .collect();
        println!("Sort: {}", parts.join(", "));
    }

    for mismatch in view.schema_mismatches() {
        println!("Dropped: {}", mismatch);
    }

    let debug_info = view.width_debug_info();
    if !debug_info.is_empty() {
        let mut widths = Table::new();
        widths.set_header(vec!["Column", "Max chars", "Width", "Samples"]);
        for (name, max_chars, width, samples) in debug_info {
            widths.add_row(vec![
                name.clone(),
                max_chars.to_string(),
                width.to_string(),
                samples.to_string(),
            ]);
        }
        println!("\nWidth estimation:\n{widths}");
    }

    println!("\nRecent log entries:");
    for entry in log_buffer.get_recent(20) {
        println!("  {}", entry.format_for_display());
    }

    Ok(())
}
