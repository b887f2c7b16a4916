use ragkit_core::{
    Command, CommandClass, CommandSource, KnowledgeBundle, KnowledgeItem, Variable, VariableKind,
};

use crate::references::find_references;
use crate::ExtractContext;

const CONTROL_KEYWORDS: &[&str] = &["if ", "for ", "while "];

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `NAME=value` or `export NAME=value`; comparisons (` = `) are not assignments.
fn assignment(line: &str) -> Option<(&str, &str)> {
    if line.contains(" = ") {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (name, value) = line.split_once('=')?;
    is_identifier(name).then_some((name, value))
}

pub(crate) fn extract(_ctx: &ExtractContext<'_>, content: &str, file: &str, out: &mut KnowledgeBundle) {
    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if !CONTROL_KEYWORDS.iter().any(|kw| trimmed.starts_with(kw)) {
            out.push(KnowledgeItem::Command(Command {
                text: trimmed.to_string(),
                classification: CommandClass::classify(trimmed),
                line: i,
                source: CommandSource::Script,
                file: file.to_string(),
            }));
        }

        if let Some((name, value)) = assignment(trimmed) {
            out.push(KnowledgeItem::Variable(Variable {
                name: name.to_string(),
                value: value.to_string(),
                line: i,
                scope: None,
                kind: VariableKind::Assignment,
                file: file.to_string(),
            }));
        }

        for reference in find_references(line, file, i) {
            out.push(KnowledgeItem::CrossReference(reference));
        }
    }
}
