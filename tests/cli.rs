use std::path::Path;
use std::process::{Command, Output};

fn ragkit(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ragkit"))
        .args(args)
        .current_dir(dir)
        .env_remove("RAGKIT_EMBEDDING_API_KEY")
        .env_remove("VOYAGE_API_KEY")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn assert_ok(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "{what} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("docs")).unwrap();
    std::fs::write(
        dir.path().join("docs/harbor.md"),
        "# Harbor Registry Setup\n\n```bash\nkubectl get pods\n```\n\nSee setup.md\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("docs/setup.md"), "# Setup\nnamespace: harbor\n").unwrap();
    dir
}

#[test]
fn init_writes_a_loadable_config() {
    let dir = tempfile::tempdir().unwrap();
    assert_ok(&ragkit(dir.path(), &["init"]), "ragkit init");

    let content = std::fs::read_to_string(dir.path().join(".ragkit/config.json")).unwrap();
    let config = ragkit_core::ProjectConfig::from_json(&content).unwrap();
    assert_eq!(config, ragkit_core::ProjectConfig::default());
    assert!(dir.path().join(".ragkit/.gitignore").is_file());
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    assert_ok(&ragkit(dir.path(), &["init"]), "first init");
    let output = ragkit(dir.path(), &["init"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("already exists"));
}

#[test]
fn uninitialized_project_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = ragkit(dir.path(), &["index"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not initialized"));
}

#[test]
fn index_then_search_as_json() {
    let dir = project();
    assert_ok(&ragkit(dir.path(), &["init"]), "ragkit init");

    let output = ragkit(dir.path(), &["--format", "json", "index"]);
    assert_ok(&output, "ragkit index");
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["processed"], 2);
    assert_eq!(report["stats"]["totalDocuments"], 2);

    let output = ragkit(dir.path(), &["--format", "json", "search", "kubectl"]);
    assert_ok(&output, "ragkit search");
    let results: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let commands = results["command"].as_array().unwrap();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0]["classification"], "kubernetes");
    assert_eq!(commands[0]["file"], "docs/harbor.md");
    assert_eq!(results["semanticUsed"], false);
}

#[test]
fn context_lists_related_files_and_rejects_unknown_paths() {
    let dir = project();
    assert_ok(&ragkit(dir.path(), &["init"]), "ragkit init");
    assert_ok(&ragkit(dir.path(), &["index"]), "ragkit index");

    let output = ragkit(dir.path(), &["--format", "json", "context", "docs/setup.md"]);
    assert_ok(&output, "ragkit context");
    let context: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(context["fileInfo"]["fileType"], "markdown");
    assert_eq!(context["relatedFiles"], serde_json::json!(["docs/harbor.md"]));

    let output = ragkit(dir.path(), &["context", "docs/missing.md"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not indexed"));
}

#[test]
fn search_before_index_points_at_index_command() {
    let dir = project();
    assert_ok(&ragkit(dir.path(), &["init"]), "ragkit init");
    let output = ragkit(dir.path(), &["search", "harbor"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no index found"));
}

#[test]
fn stats_reports_disabled_embeddings() {
    let dir = project();
    assert_ok(&ragkit(dir.path(), &["init"]), "ragkit init");
    assert_ok(&ragkit(dir.path(), &["index"]), "ragkit index");

    let output = ragkit(dir.path(), &["--format", "json", "stats"]);
    assert_ok(&output, "ragkit stats");
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["index"]["totalDocuments"], 2);
    assert_eq!(stats["embeddings"]["available"], false);
}
