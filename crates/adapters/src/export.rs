use std::fs;
use std::path::Path;

use askdb_core::selection_tree::Group;
use askdb_core::tabular::TablePipeline;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write export file at {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize JSON export: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes every filtered row in the current sort order, not only the visible
/// page. Returns the number of rows written.
pub fn export_view_to_csv(path: &Path, pipeline: &TablePipeline) -> Result<usize, ExportError> {
    let headers = pipeline.headers();
    let mut content = String::new();
    content.push_str(
        &headers
            .iter()
            .map(|header| csv_escape(header))
            .collect::<Vec<_>>()
            .join(","),
    );
    content.push('\n');

    let mut written = 0;
    for record in pipeline.ordered_records() {
        let values = headers
            .iter()
            .map(|header| {
                record
                    .get(header)
                    .map(|value| csv_escape(&value.to_string()))
                    .unwrap_or_default()
            })
            .collect::<Vec<_>>();
        content.push_str(&values.join(","));
        content.push('\n');
        written += 1;
    }

    write_file(path, content)?;
    info!(path = %path.display(), rows = written, "exported table as csv");
    Ok(written)
}

/// Like [`export_view_to_csv`], as an array of objects. Missing fields are
/// written as `null`.
pub fn export_view_to_json(path: &Path, pipeline: &TablePipeline) -> Result<usize, ExportError> {
    let headers = pipeline.headers();
    let mut records = Vec::with_capacity(pipeline.filtered_count());
    for record in pipeline.ordered_records() {
        let mut object = Map::with_capacity(headers.len());
        for header in headers {
            let value = match record.get(header) {
                Some(cell) => serde_json::to_value(cell)?,
                None => Value::Null,
            };
            object.insert(header.clone(), value);
        }
        records.push(Value::Object(object));
    }

    let payload = serde_json::to_string_pretty(&records)?;
    write_file(path, payload)?;
    info!(path = %path.display(), rows = records.len(), "exported table as json");
    Ok(records.len())
}

/// Dumps a committed selection so it can be inspected or diffed.
pub fn export_selection_to_json(path: &Path, groups: &[Group]) -> Result<(), ExportError> {
    let payload = serde_json::to_string_pretty(groups)?;
    write_file(path, payload)
}

fn write_file(path: &Path, content: String) -> Result<(), ExportError> {
    fs::write(path, content).map_err(|source| ExportError::Write {
        path: path.display().to_string(),
        source,
    })
}

fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
