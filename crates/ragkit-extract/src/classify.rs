//! Keyword tables that type extracted lines.
//!
//! These are literal lookups, not a grammar. Tests pin the exact boundaries.

use std::collections::BTreeSet;

use ragkit_core::{ConfigClass, TroubleKind};

/// Keys that mark a prose `key: value` line as configuration, in match order.
const PROSE_CONFIG_KEYS: &[(&str, ConfigClass)] = &[
    ("namespace", ConfigClass::Namespace),
    ("image", ConfigClass::ContainerImage),
    ("port", ConfigClass::Network),
    ("ip", ConfigClass::Network),
    ("loadbalancer", ConfigClass::Network),
    ("enabled", ConfigClass::General),
    ("url", ConfigClass::General),
];

const FAILURE_WORDS: &[&str] = &["error", "failed", "failure"];
const REMEDY_WORDS: &[&str] = &["fix", "solution", "resolved", "workaround"];
const NEUTRAL_WORDS: &[&str] = &["issue", "problem"];

const DEPENDENCY_PHRASES: &[&str] = &["requires", "depends on", "prerequisite", "needs"];

const SHELL_LANGUAGES: &[&str] = &["bash", "sh", "shell"];

/// Split a `key: value` line at its first colon.
///
/// Returns `None` when there is no colon or the key is empty.
pub(crate) fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

fn key_tokens(key: &str) -> impl Iterator<Item = String> + '_ {
    key.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Classify the key of a prose `key: value` line.
///
/// Short keywords (`ip`, `url`) must be a whole token of the key; longer ones
/// may appear inside a token (`imagePullPolicy`, `nodeport`). Keys named in the
/// project's keyword list are [`ConfigClass::Project`].
pub(crate) fn prose_config_class(key: &str, project_keywords: &BTreeSet<String>) -> Option<ConfigClass> {
    let tokens: Vec<String> = key_tokens(key).collect();
    let builtin = PROSE_CONFIG_KEYS.iter().find(|(kw, _)| {
        tokens
            .iter()
            .any(|t| t == kw || (kw.len() >= 4 && t.contains(kw)))
    });
    if let Some((_, class)) = builtin {
        return Some(*class);
    }
    let lower = key.to_lowercase();
    if project_keywords.contains(&lower) || tokens.iter().any(|t| project_keywords.contains(t)) {
        return Some(ConfigClass::Project);
    }
    None
}

/// Classify a structured-data key by its last path component.
pub(crate) fn yaml_config_class(key: &str) -> ConfigClass {
    let lower = key.to_lowercase();
    if lower.contains("namespace") {
        ConfigClass::KubernetesNamespace
    } else if lower.contains("image") {
        ConfigClass::ContainerImage
    } else if lower.contains("port") {
        ConfigClass::NetworkPort
    } else if lower.contains("enabled") {
        ConfigClass::FeatureToggle
    } else {
        ConfigClass::YamlConfig
    }
}

fn lexicon_hits(words: &[String], lexicon: &[&str]) -> usize {
    lexicon
        .iter()
        .filter(|lex| words.iter().any(|w| w.starts_with(*lex)))
        .count()
}

/// Classify a line as troubleshooting, or `None` if no lexicon word appears.
///
/// Words match by prefix so `errors` and `fixed` count while `prefix` does not.
/// A non-zero tie between failure and remedy words is an error.
pub(crate) fn troubleshooting_class(line: &str) -> Option<TroubleKind> {
    let words: Vec<String> = line
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    let failure = lexicon_hits(&words, FAILURE_WORDS);
    let remedy = lexicon_hits(&words, REMEDY_WORDS);
    let neutral = lexicon_hits(&words, NEUTRAL_WORDS);
    match (failure, remedy) {
        (0, 0) if neutral == 0 => None,
        (0, 0) => Some(TroubleKind::Issue),
        (f, r) if f >= r => Some(TroubleKind::Error),
        _ => Some(TroubleKind::Solution),
    }
}

pub(crate) fn is_dependency_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    DEPENDENCY_PHRASES.iter().any(|p| lower.contains(p))
}

/// Whether a fence language tag denotes a shell dialect.
pub(crate) fn is_shell_language(lang: &str) -> bool {
    let tag = lang.split_whitespace().next().unwrap_or("").to_lowercase();
    SHELL_LANGUAGES.contains(&tag.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_keywords() -> BTreeSet<String> {
        BTreeSet::new()
    }

    #[test]
    fn prose_config_keys() {
        let kw = no_keywords();
        assert_eq!(prose_config_class("namespace", &kw), Some(ConfigClass::Namespace));
        assert_eq!(prose_config_class("Harbor image", &kw), Some(ConfigClass::ContainerImage));
        assert_eq!(prose_config_class("nodePort", &kw), Some(ConfigClass::Network));
        assert_eq!(prose_config_class("Ingress IP", &kw), Some(ConfigClass::Network));
        assert_eq!(prose_config_class("Harbor URL", &kw), Some(ConfigClass::General));
        assert_eq!(prose_config_class("metrics_enabled", &kw), Some(ConfigClass::General));
    }

    #[test]
    fn short_keywords_need_whole_tokens() {
        let kw = no_keywords();
        assert_eq!(prose_config_class("description", &kw), None);
        assert_eq!(prose_config_class("Tip", &kw), None);
        assert_eq!(prose_config_class("curl", &kw), None);
    }

    #[test]
    fn project_keywords_mark_config() {
        let kw: BTreeSet<String> = ["harbor".to_string()].into_iter().collect();
        assert_eq!(prose_config_class("Harbor", &kw), Some(ConfigClass::Project));
        assert_eq!(prose_config_class("Note", &kw), None);
    }

    #[test]
    fn yaml_keys() {
        assert_eq!(yaml_config_class("namespace"), ConfigClass::KubernetesNamespace);
        assert_eq!(yaml_config_class("imageTag"), ConfigClass::ContainerImage);
        assert_eq!(yaml_config_class("containerPort"), ConfigClass::NetworkPort);
        assert_eq!(yaml_config_class("tls_enabled"), ConfigClass::FeatureToggle);
        assert_eq!(yaml_config_class("replicas"), ConfigClass::YamlConfig);
    }

    #[test]
    fn troubleshooting_boundaries() {
        assert_eq!(troubleshooting_class("Build failed with errors"), Some(TroubleKind::Error));
        assert_eq!(troubleshooting_class("Solution: restart it"), Some(TroubleKind::Solution));
        assert_eq!(troubleshooting_class("Known issue with DNS"), Some(TroubleKind::Issue));
        assert_eq!(troubleshooting_class("This error is fixed"), Some(TroubleKind::Error));
        assert_eq!(
            troubleshooting_class("Fix and workaround for the error"),
            Some(TroubleKind::Solution)
        );
        assert_eq!(troubleshooting_class("Set the prefix value"), None);
        assert_eq!(troubleshooting_class("All good"), None);
    }

    #[test]
    fn dependency_and_shell_tags() {
        assert!(is_dependency_line("This role requires Docker"));
        assert!(is_dependency_line("Harbor depends on PostgreSQL"));
        assert!(!is_dependency_line("plain text"));
        assert!(is_shell_language("bash"));
        assert!(is_shell_language("SH title=x"));
        assert!(!is_shell_language("yaml"));
        assert!(!is_shell_language(""));
    }

    #[test]
    fn key_value_split() {
        assert_eq!(split_key_value("port: 8080"), Some(("port", "8080")));
        assert_eq!(split_key_value(": nothing"), None);
        assert_eq!(split_key_value("no colon"), None);
    }
}
