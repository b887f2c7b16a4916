use ragkit_core::KnowledgeBundle;
use serde_json::Value;

use crate::{markdown, python, ExtractContext};

fn cell_source(cell: &Value) -> String {
    match cell.get("source") {
        Some(Value::Array(parts)) => parts.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

/// Code cells go through the Python rules and markdown cells through the prose
/// rules; items are attributed to `<path>:cell_<n>`. Unparseable notebooks are
/// treated as prose.
pub(crate) fn extract(ctx: &ExtractContext<'_>, content: &str, file: &str, out: &mut KnowledgeBundle) {
    let cells = match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(notebook)) => match notebook.get("cells") {
            Some(Value::Array(cells)) => cells.clone(),
            _ => Vec::new(),
        },
        Ok(_) | Err(_) => {
            tracing::debug!(file, "notebook is not valid JSON, extracting as prose");
            markdown::extract(ctx, content, file, out);
            return;
        }
    };

    for (idx, cell) in cells.iter().enumerate() {
        let cell_file = format!("{file}:cell_{idx}");
        let source = cell_source(cell);
        match cell.get("cell_type").and_then(Value::as_str) {
            Some("code") => python::extract(ctx, &source, &cell_file, out),
            Some("markdown") => markdown::extract(ctx, &source, &cell_file, out),
            _ => {}
        }
    }
}
