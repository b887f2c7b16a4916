//! Structured key/value extraction with indentation-derived dotted paths.

use ragkit_core::{Configuration, KnowledgeBundle, KnowledgeItem, Variable, VariableKind};

use crate::classify::yaml_config_class;
use crate::markdown;
use crate::references::find_references;
use crate::ExtractContext;

/// Split at the first mapping indicator: a colon followed by space or end of line.
fn mapping_entry(line: &str) -> Option<(&str, &str)> {
    let bytes = line.as_bytes();
    let at = (0..bytes.len()).find(|&i| {
        bytes[i] == b':' && bytes.get(i + 1).map_or(true, |b| b.is_ascii_whitespace())
    })?;
    let key = line[..at].trim().trim_start_matches("- ").trim();
    let key = key.trim_matches(|c| c == '"' || c == '\'');
    if key.starts_with('-') || !key.chars().any(char::is_alphanumeric) {
        return None;
    }
    Some((key, line[at + 1..].trim()))
}

fn indent_of(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

/// Extract mapping entries, or scan the file as prose when it has none.
pub(crate) fn extract(ctx: &ExtractContext<'_>, content: &str, file: &str, out: &mut KnowledgeBundle) {
    let mut structured = KnowledgeBundle::default();
    if extract_mappings(content, file, &mut structured) {
        out.append(structured);
    } else {
        tracing::debug!(file, "no mapping entries, extracting as prose");
        markdown::extract(ctx, content, file, out);
    }
}

/// Returns whether any mapping entry was recognised.
fn extract_mappings(content: &str, file: &str, out: &mut KnowledgeBundle) -> bool {
    let mut path: Vec<String> = Vec::new();
    let mut found = false;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        for reference in find_references(line, file, i) {
            out.push(KnowledgeItem::CrossReference(reference));
        }

        let Some((key, value)) = mapping_entry(trimmed) else {
            continue;
        };
        found = true;

        // A list item's key sits one level deeper than its dash.
        let mut level = indent_of(line) / 2;
        if trimmed.starts_with("- ") {
            level += 1;
        }
        path.truncate(level);
        let scope = (!path.is_empty()).then(|| path.join("."));
        path.push(key.to_string());
        let full_key = path.join(".");

        out.push(KnowledgeItem::Configuration(Configuration {
            key: Some(full_key),
            value: (!value.is_empty()).then(|| value.to_string()),
            content: trimmed.to_string(),
            classification: yaml_config_class(key),
            line: i,
            section: None,
            file: file.to_string(),
        }));

        if !value.is_empty() && !value.starts_with('[') && !value.starts_with('{') {
            out.push(KnowledgeItem::Variable(Variable {
                name: key.to_string(),
                value: value.to_string(),
                line: i,
                scope,
                kind: VariableKind::Setting,
                file: file.to_string(),
            }));
        }
    }
    found
}
