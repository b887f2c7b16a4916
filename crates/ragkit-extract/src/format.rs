use std::path::Path;

use ragkit_core::KnowledgeBundle;

use crate::{javascript, markdown, notebook, python, shell, yaml, ExtractContext};

/// Signature shared by every per-format extractor.
pub type ExtractFn = fn(&ExtractContext<'_>, &str, &str, &mut KnowledgeBundle);

/// Source format, detected from the file extension.
///
/// # Examples
///
/// ```
/// use ragkit_extract::Format;
/// use std::path::Path;
///
/// assert_eq!(Format::from_path(Path::new("docs/setup.md")), Format::Markdown);
/// assert_eq!(Format::from_path(Path::new("values.YAML")), Format::Yaml);
/// assert_eq!(Format::from_path(Path::new("run.bash")), Format::Shell);
/// assert_eq!(Format::from_path(Path::new("Makefile")), Format::Other);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Markdown,
    Yaml,
    Python,
    Shell,
    JavaScript,
    Notebook,
    Pdf,
    /// Unrecognized extension, extracted as plain prose.
    Other,
}

impl Format {
    /// Detect the format from a file extension string (without the dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "md" | "markdown" | "rst" | "txt" => Format::Markdown,
            "yml" | "yaml" => Format::Yaml,
            "py" => Format::Python,
            "sh" | "bash" => Format::Shell,
            "js" | "mjs" | "cjs" | "jsx" => Format::JavaScript,
            "ipynb" => Format::Notebook,
            "pdf" => Format::Pdf,
            _ => Format::Other,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map_or(Format::Other, Format::from_extension)
    }

    /// Formats whose bytes must go through an external text extractor first.
    pub fn is_binary(self) -> bool {
        matches!(self, Format::Pdf)
    }

    /// The extractor for this format. PDF text and unknown formats are prose.
    pub(crate) fn extractor(self) -> ExtractFn {
        match self {
            Format::Markdown | Format::Pdf | Format::Other => markdown::extract,
            Format::Yaml => yaml::extract,
            Format::Python => python::extract,
            Format::Shell => shell::extract,
            Format::JavaScript => javascript::extract,
            Format::Notebook => notebook::extract,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_table() {
        assert_eq!(Format::from_extension("rst"), Format::Markdown);
        assert_eq!(Format::from_extension("txt"), Format::Markdown);
        assert_eq!(Format::from_extension("py"), Format::Python);
        assert_eq!(Format::from_extension("mjs"), Format::JavaScript);
        assert_eq!(Format::from_extension("ipynb"), Format::Notebook);
        assert_eq!(Format::from_extension("PDF"), Format::Pdf);
        assert_eq!(Format::from_extension("toml"), Format::Other);
    }

    #[test]
    fn only_pdf_is_binary() {
        assert!(Format::Pdf.is_binary());
        assert!(!Format::Markdown.is_binary());
        assert!(!Format::Other.is_binary());
    }

    #[test]
    fn missing_extension_is_other() {
        assert_eq!(Format::from_path(Path::new("LICENSE")), Format::Other);
    }
}
