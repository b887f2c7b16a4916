use std::sync::LazyLock;

use regex::Regex;

use ragkit_core::{Dependency, FunctionDecl, KnowledgeBundle, KnowledgeItem, Variable, VariableKind};

use crate::references::find_references;
use crate::ExtractContext;

static FUNCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"function\s*\*?\s+(\w+)\s*\(([^)]*)\)?").unwrap());
static DECLARATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:export\s+)?(let|const|var)\s+(\w+)(?:\s*=\s*(.*))?").unwrap());

pub(crate) fn extract(_ctx: &ExtractContext<'_>, content: &str, file: &str, out: &mut KnowledgeBundle) {
    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }

        if let Some(caps) = FUNCTION_RE.captures(trimmed) {
            out.push(KnowledgeItem::Function(FunctionDecl {
                name: caps[1].to_string(),
                params: caps[2].trim().to_string(),
                line: i,
                enclosing_class: None,
                file: file.to_string(),
            }));
        }

        if let Some(caps) = DECLARATION_RE.captures(trimmed) {
            let value = caps
                .get(3)
                .map(|m| m.as_str().trim().trim_end_matches(';').to_string())
                .unwrap_or_default();
            out.push(KnowledgeItem::Variable(Variable {
                name: caps[2].to_string(),
                value,
                line: i,
                scope: Some(caps[1].to_string()),
                kind: VariableKind::Assignment,
                file: file.to_string(),
            }));
        }

        if trimmed.starts_with("import ") || trimmed.contains("require(") {
            out.push(KnowledgeItem::Dependency(Dependency {
                content: trimmed.to_string(),
                line: i,
                section: None,
                file: file.to_string(),
            }));
        }

        for reference in find_references(line, file, i) {
            out.push(KnowledgeItem::CrossReference(reference));
        }
    }
}
