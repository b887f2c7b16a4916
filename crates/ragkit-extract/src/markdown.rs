//! Prose extraction for markup (and the fallback for anything unparseable).

use ragkit_core::{
    CodeBlock, Command, CommandClass, CommandSource, Concept, ConceptKind, Configuration,
    Dependency, KnowledgeBundle, KnowledgeItem, TroubleshootingEntry,
};

use crate::classify::{
    is_dependency_line, is_shell_language, prose_config_class, split_key_value,
    troubleshooting_class,
};
use crate::references::find_references;
use crate::ExtractContext;

const FENCE: &str = "```";
const MAX_HEADING_LEVEL: usize = 6;

struct OpenFence {
    language: String,
    line: usize,
}

pub(crate) fn extract(ctx: &ExtractContext<'_>, content: &str, file: &str, out: &mut KnowledgeBundle) {
    let lines: Vec<&str> = content.lines().collect();
    let mut section: Option<String> = None;
    let mut fence: Option<OpenFence> = None;
    let mut body: Vec<&str> = Vec::new();

    for (i, line) in lines.iter().copied().enumerate() {
        if let Some(rest) = line.trim_start().strip_prefix(FENCE) {
            match fence.take() {
                None => {
                    fence = Some(OpenFence {
                        language: rest.trim().to_string(),
                        line: i,
                    });
                    body.clear();
                }
                Some(open) => emit_block(&open, &body, file, out),
            }
            continue;
        }
        if fence.is_some() {
            body.push(line);
            continue;
        }
        prose_line(ctx, line, i, file, &mut section, out);
    }

    // An unterminated fence is not code: scan what it swallowed as prose.
    if let Some(open) = fence {
        for (offset, line) in lines[open.line..].iter().enumerate() {
            prose_line(ctx, line, open.line + offset, file, &mut section, out);
        }
    }
}

fn emit_block(open: &OpenFence, body: &[&str], file: &str, out: &mut KnowledgeBundle) {
    if body.iter().all(|l| l.trim().is_empty()) {
        return;
    }
    let start_line = open.line + 1;
    out.push(KnowledgeItem::CodeBlock(CodeBlock {
        language: open.language.clone(),
        content: body.join("\n"),
        start_line,
        file: file.to_string(),
    }));

    if !is_shell_language(&open.language) {
        return;
    }
    for (offset, line) in body.iter().enumerate() {
        let text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        out.push(KnowledgeItem::Command(Command {
            text: text.to_string(),
            classification: CommandClass::classify(text),
            line: start_line + offset,
            source: CommandSource::CodeBlock,
            file: file.to_string(),
        }));
    }
}

fn heading(line: &str) -> Option<(usize, &str)> {
    if !line.starts_with('#') {
        return None;
    }
    let level = line.chars().take_while(|c| *c == '#').count();
    let name = line.trim_matches('#').trim();
    (level <= MAX_HEADING_LEVEL && !name.is_empty()).then_some((level, name))
}

fn prose_line(
    ctx: &ExtractContext<'_>,
    line: &str,
    i: usize,
    file: &str,
    section: &mut Option<String>,
    out: &mut KnowledgeBundle,
) {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return;
    }

    if let Some((level, name)) = heading(line) {
        out.push(KnowledgeItem::Concept(Concept {
            name: name.to_string(),
            heading_level: level,
            line: i,
            section: section.clone(),
            kind: ConceptKind::Heading,
            file: file.to_string(),
        }));
        *section = Some(name.to_string());
    }

    if !trimmed.starts_with('#') {
        if let Some((key, value)) = split_key_value(trimmed) {
            let key = key.trim_matches(|c: char| matches!(c, '-' | '*' | '`' | '>' | ' '));
            if let Some(classification) = prose_config_class(key, ctx.keywords) {
                out.push(KnowledgeItem::Configuration(Configuration {
                    key: Some(key.to_string()),
                    value: (!value.is_empty()).then(|| value.to_string()),
                    content: trimmed.to_string(),
                    classification,
                    line: i,
                    section: section.clone(),
                    file: file.to_string(),
                }));
            }
        }
    }

    if let Some(classification) = troubleshooting_class(trimmed) {
        out.push(KnowledgeItem::Troubleshooting(TroubleshootingEntry {
            content: trimmed.to_string(),
            classification,
            line: i,
            section: section.clone(),
            file: file.to_string(),
        }));
    }

    for reference in find_references(line, file, i) {
        out.push(KnowledgeItem::CrossReference(reference));
    }

    if is_dependency_line(trimmed) {
        out.push(KnowledgeItem::Dependency(Dependency {
            content: trimmed.to_string(),
            line: i,
            section: section.clone(),
            file: file.to_string(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use ragkit_core::{ConfigClass, TroubleKind};

    use super::*;

    fn run(content: &str) -> KnowledgeBundle {
        let keywords = BTreeSet::new();
        let ctx = ExtractContext {
            keywords: &keywords,
        };
        let mut out = KnowledgeBundle::default();
        extract(&ctx, content, "docs/guide.md", &mut out);
        out
    }

    #[test]
    fn headings_become_concepts_with_sections() {
        let out = run("# Harbor Registry Setup\ntext\n## Install ##\n#\n");
        assert_eq!(out.concepts.len(), 2);
        assert_eq!(out.concepts[0].name, "Harbor Registry Setup");
        assert_eq!(out.concepts[0].heading_level, 1);
        assert_eq!(out.concepts[0].line, 0);
        assert_eq!(out.concepts[0].section, None);
        assert_eq!(out.concepts[1].name, "Install");
        assert_eq!(out.concepts[1].heading_level, 2);
        assert_eq!(out.concepts[1].section.as_deref(), Some("Harbor Registry Setup"));
    }

    #[test]
    fn shell_block_yields_block_and_commands() {
        let out = run("# Ops\n```bash\n# list pods\nkubectl get pods\n\ndocker ps\n```\n");
        assert_eq!(out.code_blocks.len(), 1);
        assert_eq!(out.code_blocks[0].language, "bash");
        assert_eq!(out.code_blocks[0].start_line, 2);
        assert_eq!(out.commands.len(), 2);
        assert_eq!(out.commands[0].text, "kubectl get pods");
        assert_eq!(out.commands[0].line, 3);
        assert_eq!(out.commands[0].classification, CommandClass::Kubernetes);
        assert_eq!(out.commands[1].line, 5);
        assert_eq!(out.commands[1].classification, CommandClass::Docker);
    }

    #[test]
    fn non_shell_block_has_no_commands() {
        let out = run("```yaml\nimage: nginx\n```\n");
        assert_eq!(out.code_blocks.len(), 1);
        assert!(out.commands.is_empty());
        // block content is not scanned as prose
        assert!(out.configurations.is_empty());
    }

    #[test]
    fn empty_block_is_dropped() {
        let out = run("```bash\n\n```\n");
        assert!(out.code_blocks.is_empty());
        assert!(out.commands.is_empty());
    }

    #[test]
    fn unterminated_fence_is_rescanned_as_prose() {
        let out = run("intro\n```bash\n## Lost Heading\nkubectl get pods\n");
        assert!(out.code_blocks.is_empty());
        assert!(out.commands.is_empty());
        assert_eq!(out.concepts.len(), 1);
        assert_eq!(out.concepts[0].name, "Lost Heading");
        assert_eq!(out.concepts[0].line, 2);
    }

    #[test]
    fn prose_configuration_lines() {
        let out = run("## Net\n- Namespace: harbor\n**Port**: 443\nDescription: tip\n");
        assert_eq!(out.configurations.len(), 2);
        assert_eq!(out.configurations[0].key.as_deref(), Some("Namespace"));
        assert_eq!(out.configurations[0].value.as_deref(), Some("harbor"));
        assert_eq!(out.configurations[0].classification, ConfigClass::Namespace);
        assert_eq!(out.configurations[0].section.as_deref(), Some("Net"));
        assert_eq!(out.configurations[1].classification, ConfigClass::Network);
    }

    #[test]
    fn troubleshooting_and_dependencies() {
        let out = run("Pull failed with error\nFix: re-login\nKnown issue\nHarbor requires Docker\n");
        let kinds: Vec<_> = out.troubleshooting.iter().map(|t| t.classification).collect();
        assert_eq!(
            kinds,
            vec![TroubleKind::Error, TroubleKind::Solution, TroubleKind::Issue]
        );
        assert_eq!(out.dependencies.len(), 1);
        assert_eq!(out.dependencies[0].line, 3);
    }

    #[test]
    fn cross_references_from_prose() {
        let out = run("See [install](install.md) and values.yaml\n");
        let targets: Vec<_> = out
            .cross_references
            .iter()
            .map(|r| r.target_path.as_str())
            .collect();
        assert_eq!(targets, vec!["install.md", "values.yaml"]);
        assert_eq!(out.cross_references[0].source_path, "docs/guide.md");
    }
}
