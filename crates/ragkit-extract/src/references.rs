use std::sync::LazyLock;

use regex::Regex;

use ragkit_core::CrossReference;

static FILE_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9_\-./]+\.(?:md|ya?ml|sh|py|json)\b").unwrap()
});

/// Every file-path-shaped substring of `line`, as cross-references from `source`.
pub(crate) fn find_references(line: &str, source: &str, line_no: usize) -> Vec<CrossReference> {
    FILE_REF_RE
        .find_iter(line)
        .map(|m| m.as_str())
        .map(|target| CrossReference {
            target_path: target.to_string(),
            source_path: source.to_string(),
            context: line.trim().to_string(),
            line: line_no,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(line: &str) -> Vec<String> {
        find_references(line, "README.md", 4)
            .into_iter()
            .map(|r| r.target_path)
            .collect()
    }

    #[test]
    fn finds_each_extension() {
        assert_eq!(
            targets("See docs/install.md and values.yaml, run scripts/setup.sh"),
            vec!["docs/install.md", "values.yaml", "scripts/setup.sh"]
        );
        assert_eq!(targets("python tools/gen.py > out.json"), vec!["tools/gen.py", "out.json"]);
        assert_eq!(targets("inventory/hosts.yml"), vec!["inventory/hosts.yml"]);
    }

    #[test]
    fn ignores_longer_extensions() {
        assert!(targets("open notes.python or page.mdx").is_empty());
    }

    #[test]
    fn keeps_relative_prefixes() {
        assert_eq!(targets("see ./guide.md"), vec!["./guide.md"]);
        assert_eq!(targets("see ../top.md"), vec!["../top.md"]);
        assert_eq!(targets("edit .gitlab-ci.yml"), vec![".gitlab-ci.yml"]);
    }

    #[test]
    fn records_source_and_context() {
        let refs = find_references("  Read setup.md first  ", "docs/a.md", 9);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].source_path, "docs/a.md");
        assert_eq!(refs[0].context, "Read setup.md first");
        assert_eq!(refs[0].line, 9);
    }
}
