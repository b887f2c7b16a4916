//! Declaration-line extraction for Python: classes, functions, imports, assignments.
//!
//! Nesting comes from an indentation stack, not a parser.

use std::sync::LazyLock;

use regex::Regex;

use ragkit_core::{
    Concept, ConceptKind, Dependency, FunctionDecl, KnowledgeBundle, KnowledgeItem, Variable,
    VariableKind,
};

use crate::references::find_references;
use crate::ExtractContext;

static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^class\s+(\w+)").unwrap());
static DEF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:async\s+)?def\s+(\w+)\s*\(([^)]*)\)?").unwrap());
static ASSIGN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)\s*(?::\s*[^=]+)?=\s*([^=].*)$").unwrap());

#[derive(Debug)]
enum Frame {
    Class(String),
    Function(String),
}

struct Scope {
    indent: usize,
    frame: Frame,
}

/// Docstring state carried across lines.
#[derive(Default)]
struct Docstring {
    delimiter: Option<&'static str>,
}

impl Docstring {
    /// Returns `true` if the line belongs to a docstring and should be skipped.
    fn consume(&mut self, trimmed: &str) -> bool {
        if let Some(delim) = self.delimiter {
            if trimmed.contains(delim) {
                self.delimiter = None;
            }
            return true;
        }
        for delim in ["\"\"\"", "'''"] {
            let count = trimmed.matches(delim).count();
            if count == 0 {
                continue;
            }
            // Opening on its own line, or as the value of an assignment, starts a block.
            if count % 2 == 1 {
                self.delimiter = Some(delim);
            }
            return trimmed.starts_with(delim) || count % 2 == 1;
        }
        false
    }
}

fn indent_of(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

pub(crate) fn extract(_ctx: &ExtractContext<'_>, content: &str, file: &str, out: &mut KnowledgeBundle) {
    let mut docstring = Docstring::default();
    let mut stack: Vec<Scope> = Vec::new();

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if docstring.consume(trimmed) {
            continue;
        }
        if trimmed.starts_with('#') {
            continue;
        }

        let indent = indent_of(line);
        while stack.last().is_some_and(|s| s.indent >= indent) {
            stack.pop();
        }

        for reference in find_references(line, file, i) {
            out.push(KnowledgeItem::CrossReference(reference));
        }

        if let Some(caps) = CLASS_RE.captures(trimmed) {
            let name = caps[1].to_string();
            out.push(KnowledgeItem::Concept(Concept {
                name: format!("Class: {name}"),
                heading_level: 0,
                line: i,
                section: None,
                kind: ConceptKind::Class,
                file: file.to_string(),
            }));
            stack.push(Scope {
                indent,
                frame: Frame::Class(name),
            });
            continue;
        }

        if let Some(caps) = DEF_RE.captures(trimmed) {
            let name = caps[1].to_string();
            let enclosing_class = stack.iter().rev().find_map(|s| match &s.frame {
                Frame::Class(c) => Some(c.clone()),
                Frame::Function(_) => None,
            });
            out.push(KnowledgeItem::Function(FunctionDecl {
                name: name.clone(),
                params: caps[2].trim().to_string(),
                line: i,
                enclosing_class,
                file: file.to_string(),
            }));
            stack.push(Scope {
                indent,
                frame: Frame::Function(name),
            });
            continue;
        }

        if trimmed.starts_with("import ") || trimmed.starts_with("from ") {
            out.push(KnowledgeItem::Dependency(Dependency {
                content: trimmed.to_string(),
                line: i,
                section: None,
                file: file.to_string(),
            }));
            continue;
        }

        if let Some(caps) = ASSIGN_RE.captures(trimmed) {
            let scope = stack.last().map(|s| match &s.frame {
                Frame::Class(name) | Frame::Function(name) => name.clone(),
            });
            out.push(KnowledgeItem::Variable(Variable {
                name: caps[1].to_string(),
                value: caps[2].trim().to_string(),
                line: i,
                scope,
                kind: VariableKind::Assignment,
                file: file.to_string(),
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn run(content: &str) -> KnowledgeBundle {
        let keywords = BTreeSet::new();
        let ctx = ExtractContext {
            keywords: &keywords,
        };
        let mut out = KnowledgeBundle::default();
        extract(&ctx, content, "train.py", &mut out);
        out
    }

    const SAMPLE: &str = r#"import os
from sklearn.ensemble import RandomForestClassifier

MODEL_PATH = "models/rf.pkl"


class Trainer:
    """Trains the model."""

    def __init__(self, data, epochs=10):
        self.data = data
        retries = 3

    async def fit(self):
        pass


def load(path):
    '''
    def fake(): not code
    '''
    cache = {}
    return cache
"#;

    #[test]
    fn classes_become_concepts() {
        let out = run(SAMPLE);
        assert_eq!(out.concepts.len(), 1);
        assert_eq!(out.concepts[0].name, "Class: Trainer");
        assert_eq!(out.concepts[0].kind, ConceptKind::Class);
        assert_eq!(out.concepts[0].line, 6);
    }

    #[test]
    fn functions_track_enclosing_class() {
        let out = run(SAMPLE);
        let fns: Vec<_> = out
            .functions
            .iter()
            .map(|f| (f.name.as_str(), f.enclosing_class.as_deref()))
            .collect();
        assert_eq!(
            fns,
            vec![
                ("__init__", Some("Trainer")),
                ("fit", Some("Trainer")),
                ("load", None)
            ]
        );
        assert_eq!(out.functions[0].params, "self, data, epochs=10");
    }

    #[test]
    fn single_line_docstring_does_not_swallow_code() {
        let out = run(SAMPLE);
        // __init__ follows a one-line docstring and must still be found
        assert!(out.functions.iter().any(|f| f.name == "__init__"));
        assert!(!out.functions.iter().any(|f| f.name == "fake"));
    }

    #[test]
    fn imports_and_assignments() {
        let out = run(SAMPLE);
        assert_eq!(out.dependencies.len(), 2);
        let vars: Vec<_> = out
            .variables
            .iter()
            .map(|v| (v.name.as_str(), v.scope.as_deref()))
            .collect();
        assert_eq!(
            vars,
            vec![
                ("MODEL_PATH", None),
                ("retries", Some("__init__")),
                ("cache", Some("load"))
            ]
        );
        assert_eq!(out.cross_references.len(), 0);
    }

    #[test]
    fn comparisons_are_not_assignments() {
        let out = run("if x == 3:\n    y = 4\n");
        assert_eq!(out.variables.len(), 1);
        assert_eq!(out.variables[0].name, "y");
    }

    #[test]
    fn unbalanced_input_is_tolerated() {
        let out = run("def broken(a,\n    b):\n\"\"\"never closed\nclass Hidden:\n");
        assert_eq!(out.functions.len(), 1);
        assert_eq!(out.functions[0].name, "broken");
        assert!(out.concepts.is_empty());
    }
}
