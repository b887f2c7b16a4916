//! Query expansion through a fixed infrastructure vocabulary.

use std::collections::BTreeSet;

/// Domain term and its known aliases. Lookups go both ways.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("persistence", &["persistent", "pvc", "persistentvolumeclaim", "storage", "volume"]),
    ("storage", &["persistent", "pvc", "persistentvolumeclaim", "persistence", "volume"]),
    ("harbor", &["registry", "docker_registry", "container_registry", "image_registry"]),
    ("registry", &["harbor", "docker_registry", "container_registry"]),
    ("loadbalancer", &["lb", "load_balancer", "metallb", "service"]),
    ("kubernetes", &["k8s", "kubectl", "kube"]),
    ("ansible", &["playbook", "role", "task"]),
    ("monitoring", &["prometheus", "grafana", "metrics", "observability"]),
    ("security", &["tls", "ssl", "certificate", "cert", "secret"]),
    ("deployment", &["deploy", "rollout", "install", "setup"]),
];

/// Lower-case and split `query` on whitespace, then add every synonym of
/// every term. A term that is itself an alias pulls in its domain term and
/// that term's other aliases.
///
/// # Examples
///
/// ```
/// use ragkit_search::expand_query;
///
/// let terms = expand_query("K8S pods");
/// assert!(terms.contains("k8s"));
/// assert!(terms.contains("kubernetes"));
/// assert!(terms.contains("kubectl"));
/// assert!(terms.contains("pods"));
/// ```
pub fn expand_query(query: &str) -> BTreeSet<String> {
    let lowered = query.to_lowercase();
    let terms: Vec<&str> = lowered.split_whitespace().collect();
    let mut expanded: BTreeSet<String> = terms.iter().map(|t| t.to_string()).collect();

    for term in &terms {
        for (key, aliases) in SYNONYMS {
            if key == term {
                expanded.extend(aliases.iter().map(|a| a.to_string()));
            }
            if aliases.contains(term) {
                expanded.insert(key.to_string());
                expanded.extend(aliases.iter().map(|a| a.to_string()));
            }
        }
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_term_expands_to_aliases() {
        let terms = expand_query("Storage");
        for t in ["storage", "pvc", "persistentvolumeclaim", "persistence", "volume"] {
            assert!(terms.contains(t), "missing {t}");
        }
    }

    #[test]
    fn alias_pulls_in_every_owner() {
        // "registry" is a domain term and an alias of "harbor"
        let terms = expand_query("registry");
        assert!(terms.contains("harbor"));
        assert!(terms.contains("image_registry"));
        assert!(terms.contains("container_registry"));
    }

    #[test]
    fn unknown_terms_stay_as_is() {
        let terms = expand_query("  mlflow   tracking ");
        assert_eq!(terms.into_iter().collect::<Vec<_>>(), vec!["mlflow", "tracking"]);
        assert!(expand_query("   ").is_empty());
    }
}
