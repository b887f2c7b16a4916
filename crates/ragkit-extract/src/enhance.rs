//! Repository-type passes that run after the generic extractor.
//!
//! Each rule only appends items; nothing the generic pass produced is touched.

use std::sync::LazyLock;

use regex::Regex;

use ragkit_core::{
    Concept, ConceptKind, ConfigClass, Configuration, KnowledgeBundle, KnowledgeItem, RepoType,
    Variable, VariableKind,
};

type Rule = fn(&str, usize, &str, &mut KnowledgeBundle);

static TEMPLATE_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^}]+?)\s*\}\}").unwrap());
static EXPORT_DEFAULT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"export\s+default\s+(?:async\s+)?(?:function|class|const)?\s*(\w+)").unwrap()
});

const STORAGE_WORDS: &[&str] = &[
    "persistentvolumeclaim",
    "pvc",
    "storage:",
    "storageclass",
    "volumeclaim",
    "persistent",
];
const REGISTRY_WORDS: &[&str] = &["harbor", "registry", "docker_registry", "container_registry"];
const MLOPS_SERVICES: &[&str] = &["mlflow", "seldon", "istio", "prometheus"];
const ENDPOINT_WORDS: &[&str] = &["loadbalancer_ip", "nodeport"];

const TRAINING_PATTERNS: &[&str] = &["fit(", "train(", "model.fit", ".train"];
const FEATURE_PATTERNS: &[&str] = &["transform(", "fit_transform(", "feature"];
const EVALUATION_PATTERNS: &[&str] = &["score(", "accuracy", "precision", "recall", "f1"];
const MODEL_CONFIG_WORDS: &[&str] = &["model_config", "hyperparameters", "training_config"];
const ROUTE_DECORATORS: &[&str] = &["@app.route", "@api.route", "@router."];
const ROUTE_CALLS: &[&str] = &[
    "app.get(",
    "app.post(",
    "app.put(",
    "app.delete(",
    "router.get(",
    "router.post(",
    "router.put(",
    "router.delete(",
];

const MLOPS_RULES: &[Rule] = &[
    resource_headers,
    ansible_tasks,
    infra_services,
    template_variables,
    service_endpoints,
];
const KUBERNETES_RULES: &[Rule] = &[resource_headers, service_endpoints];
const ANSIBLE_RULES: &[Rule] = &[ansible_tasks, template_variables];
const ML_MODEL_RULES: &[Rule] = &[ml_patterns, route_decorators, model_configs];
const WEB_APP_RULES: &[Rule] = &[components, route_calls];

/// The rule set for a repository type, in application order.
pub(crate) fn rules_for(repo_type: &RepoType) -> &'static [Rule] {
    match repo_type {
        RepoType::MlopsPlatform => MLOPS_RULES,
        RepoType::Kubernetes => KUBERNETES_RULES,
        RepoType::Ansible => ANSIBLE_RULES,
        RepoType::MlModel => ML_MODEL_RULES,
        RepoType::WebApp => WEB_APP_RULES,
        _ => &[],
    }
}

/// Run every rule for `repo_type` over `content`, appending to `out`.
pub(crate) fn enhance(repo_type: &RepoType, content: &str, file: &str, out: &mut KnowledgeBundle) {
    let rules = rules_for(repo_type);
    if rules.is_empty() {
        return;
    }
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        for rule in rules {
            rule(line, i, file, out);
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn config(out: &mut KnowledgeBundle, line: &str, i: usize, file: &str, classification: ConfigClass) {
    out.push(KnowledgeItem::Configuration(Configuration {
        key: None,
        value: None,
        content: line.trim().to_string(),
        classification,
        line: i,
        section: None,
        file: file.to_string(),
    }));
}

fn concept(out: &mut KnowledgeBundle, name: String, i: usize, file: &str, kind: ConceptKind) {
    out.push(KnowledgeItem::Concept(Concept {
        name,
        heading_level: 0,
        line: i,
        section: None,
        kind,
        file: file.to_string(),
    }));
}

fn resource_headers(line: &str, i: usize, file: &str, out: &mut KnowledgeBundle) {
    let lower = line.trim().to_lowercase();
    if lower.starts_with("apiversion:") || lower.starts_with("kind:") {
        config(out, line, i, file, ConfigClass::KubernetesResource);
    }
}

fn ansible_tasks(line: &str, i: usize, file: &str, out: &mut KnowledgeBundle) {
    if let Some(name) = line.trim().strip_prefix("- name:") {
        let name = name.trim().trim_matches(|c| c == '"' || c == '\'');
        if !name.is_empty() {
            concept(out, format!("Ansible Task: {name}"), i, file, ConceptKind::AnsibleTask);
        }
    }
}

/// Storage, registry, then other platform services; a line gets at most one.
fn infra_services(line: &str, i: usize, file: &str, out: &mut KnowledgeBundle) {
    let trimmed = line.trim();
    if trimmed.starts_with('#') || trimmed.starts_with("- name:") || !trimmed.contains(':') {
        return;
    }
    let lower = trimmed.to_lowercase();
    let class = if contains_any(&lower, STORAGE_WORDS) {
        ConfigClass::Storage
    } else if contains_any(&lower, REGISTRY_WORDS) {
        ConfigClass::Registry
    } else if contains_any(&lower, MLOPS_SERVICES) {
        ConfigClass::MlopsService
    } else {
        return;
    };
    config(out, line, i, file, class);
}

fn template_variables(line: &str, i: usize, file: &str, out: &mut KnowledgeBundle) {
    for caps in TEMPLATE_VAR_RE.captures_iter(line) {
        out.push(KnowledgeItem::Variable(Variable {
            name: caps[1].trim().to_string(),
            value: line.trim().to_string(),
            line: i,
            scope: None,
            kind: VariableKind::Template,
            file: file.to_string(),
        }));
    }
}

fn service_endpoints(line: &str, i: usize, file: &str, out: &mut KnowledgeBundle) {
    if contains_any(&line.to_lowercase(), ENDPOINT_WORDS) {
        config(out, line, i, file, ConfigClass::ServiceEndpoint);
    }
}

fn ml_patterns(line: &str, i: usize, file: &str, out: &mut KnowledgeBundle) {
    let lower = line.to_lowercase();
    let patterns: [(&[&str], &str); 3] = [
        (TRAINING_PATTERNS, "Model Training"),
        (FEATURE_PATTERNS, "Feature Engineering"),
        (EVALUATION_PATTERNS, "Model Evaluation"),
    ];
    for (needles, name) in patterns {
        if contains_any(&lower, needles) {
            concept(out, name.to_string(), i, file, ConceptKind::MlPattern);
        }
    }
}

fn route_decorators(line: &str, i: usize, file: &str, out: &mut KnowledgeBundle) {
    let trimmed = line.trim();
    if contains_any(trimmed, ROUTE_DECORATORS) {
        concept(out, format!("API Endpoint: {trimmed}"), i, file, ConceptKind::Endpoint);
    }
}

fn model_configs(line: &str, i: usize, file: &str, out: &mut KnowledgeBundle) {
    if contains_any(&line.to_lowercase(), MODEL_CONFIG_WORDS) {
        config(out, line, i, file, ConfigClass::ModelConfig);
    }
}

fn components(line: &str, i: usize, file: &str, out: &mut KnowledgeBundle) {
    if !line.contains("export default") {
        return;
    }
    if !contains_any(line, &["Component", "function", "const", "class"]) {
        return;
    }
    let name = EXPORT_DEFAULT_RE
        .captures(line)
        .map_or_else(|| line.trim().to_string(), |caps| caps[1].to_string());
    concept(out, format!("Component: {name}"), i, file, ConceptKind::Component);
}

fn route_calls(line: &str, i: usize, file: &str, out: &mut KnowledgeBundle) {
    let trimmed = line.trim();
    if contains_any(trimmed, ROUTE_CALLS) {
        concept(out, format!("API Route: {trimmed}"), i, file, ConceptKind::Endpoint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(repo_type: RepoType, content: &str) -> KnowledgeBundle {
        let mut out = KnowledgeBundle::default();
        enhance(&repo_type, content, "x", &mut out);
        out
    }

    fn config_classes(out: &KnowledgeBundle) -> Vec<ConfigClass> {
        out.configurations.iter().map(|c| c.classification).collect()
    }

    #[test]
    fn mlops_rules() {
        let content = "apiVersion: v1\nkind: PersistentVolumeClaim\n- name: Install Harbor\n  \
                       harbor_url: https://harbor.local\n  image: \"{{ registry_host }}/app\"\n  \
                       nodePort: 30080\n# prometheus: disabled\n";
        let out = run(RepoType::MlopsPlatform, content);
        assert_eq!(
            config_classes(&out),
            vec![
                ConfigClass::KubernetesResource,
                ConfigClass::KubernetesResource,
                ConfigClass::Storage,
                ConfigClass::Registry,
                ConfigClass::Registry,
                ConfigClass::ServiceEndpoint,
            ]
        );
        assert_eq!(out.concepts.len(), 1);
        assert_eq!(out.concepts[0].name, "Ansible Task: Install Harbor");
        assert_eq!(out.variables.len(), 1);
        assert_eq!(out.variables[0].name, "registry_host");
        assert_eq!(out.variables[0].kind, VariableKind::Template);
    }

    #[test]
    fn kubernetes_only_gets_resource_rules() {
        let out = run(RepoType::Kubernetes, "kind: Service\n- name: task\n");
        assert_eq!(config_classes(&out), vec![ConfigClass::KubernetesResource]);
        assert!(out.concepts.is_empty());
    }

    #[test]
    fn ml_model_rules() {
        let content = "clf.fit(X, y)\nacc = accuracy_score(y, p)\n@app.route('/predict')\nhyperparameters = {}\n";
        let out = run(RepoType::MlModel, content);
        let names: Vec<_> = out.concepts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Model Training",
                "Model Evaluation",
                "API Endpoint: @app.route('/predict')"
            ]
        );
        assert_eq!(config_classes(&out), vec![ConfigClass::ModelConfig]);
    }

    #[test]
    fn web_app_rules() {
        let content = "export default function Dashboard() {\napp.get('/api/users', handler);\n";
        let out = run(RepoType::WebApp, content);
        let names: Vec<_> = out.concepts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Component: Dashboard", "API Route: app.get('/api/users', handler);"]
        );
    }

    #[test]
    fn generic_has_no_rules() {
        assert!(run(RepoType::Generic, "kind: Pod\nclf.fit()\n").is_empty());
        assert!(run(RepoType::Other("rust".into()), "kind: Pod\n").is_empty());
    }
}
