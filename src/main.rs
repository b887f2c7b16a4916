use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use miette::{IntoDiagnostic, Result, WrapErr};
use tracing_subscriber::EnvFilter;

use ragkit_core::{Index, IndexStats, OutputFormat, ProjectConfig, ProjectPaths, Settings};
use ragkit_index::{file_context, FileContext, IndexReport, IndexStore, Indexer};
use ragkit_search::{Category, Match, SearchEngine, SearchOptions, SearchResults};
use ragkit_semantic::{EmbeddingClient, EmbeddingProvider, ProviderStats};

#[derive(Parser)]
#[command(
    name = "ragkit",
    version,
    about = "Index project documentation and search it",
    long_about = "ragkit extracts concepts, commands, configuration and troubleshooting notes\n\
                   from a project's docs, scripts and manifests, and answers keyword and\n\
                   semantic queries over them.\n\n\
                   Examples:\n  \
                     ragkit init                       Create .ragkit/config.json\n  \
                     ragkit index                      Index changed files\n  \
                     ragkit search 'harbor registry'   Hybrid search\n  \
                     ragkit context docs/setup.md      Everything known about one file\n  \
                     ragkit stats                      Index and embedding statistics"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Project root (default: current directory)
    #[arg(long, global = true, default_value = ".")]
    path: PathBuf,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable listings (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable debug logging on stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Create a generic project configuration
    #[command(long_about = "Create a generic project configuration.\n\n\
        Writes .ragkit/config.json with the default file patterns and exclusions,\n\
        and a .gitignore that keeps the index and embedding cache out of git.\n\
        Fails if the configuration already exists.")]
    Init,
    /// Index the project's documentation
    #[command(long_about = "Index the project's documentation.\n\n\
        Only files whose content changed since the last run are re-extracted.\n\
        Embeddings are refreshed when semantic search is enabled and a provider\n\
        is configured.\n\n\
        Examples:\n  ragkit index\n  ragkit index --force")]
    Index {
        /// Re-extract every file, ignoring content hashes
        #[arg(long)]
        force: bool,
    },
    /// Search the index
    #[command(long_about = "Search the index.\n\n\
        Matches concepts, commands, configuration and troubleshooting entries by\n\
        keyword and synonym, boosted by embedding similarity when available.\n\n\
        Examples:\n  ragkit search harbor\n  ragkit search 'kubectl' --category command\n  ragkit search storage --limit 5 --no-semantic")]
    Search {
        /// Search query
        query: String,

        /// Maximum results per category (default: 10)
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Only fill this category (concept, command, configuration, troubleshooting, semantic)
        #[arg(long)]
        category: Option<Category>,

        /// Rank by keywords only
        #[arg(long)]
        no_semantic: bool,
    },
    /// Show everything the index knows about one file
    Context {
        /// Project-relative path of an indexed file
        file: String,
    },
    /// Show index and embedding statistics
    Stats,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

const STATE_GITIGNORE: &str = "index.json\nembeddings/\n";

/// Configuration and settings of an initialized project.
struct Project {
    paths: ProjectPaths,
    config: ProjectConfig,
    settings: Settings,
}

impl Project {
    fn open(root: &Path) -> Result<Self> {
        let paths = ProjectPaths::new(root);
        let config = ProjectConfig::load(&paths.config_file())?;
        let settings = Settings::load(&paths.settings_file())?;
        tracing::debug!(root = %root.display(), repo_type = %config.repo_type, "project loaded");
        Ok(Self {
            paths,
            config,
            settings,
        })
    }

    fn provider(&self, enabled: bool) -> EmbeddingProvider<EmbeddingClient> {
        if enabled {
            EmbeddingProvider::from_settings(&self.settings.embedding, &self.paths.embeddings_dir())
        } else {
            EmbeddingProvider::disabled()
        }
    }

    fn load_index(&self) -> Result<Index> {
        let store = IndexStore::new(self.paths.index_file());
        if !store.exists() {
            miette::bail!(miette::miette!(
                help = "run `ragkit index` first",
                "no index found at {}",
                store.path().display()
            ));
        }
        Ok(store.load()?)
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn run_init(root: &Path, format: OutputFormat) -> Result<()> {
    let paths = ProjectPaths::new(root);
    let config_file = paths.config_file();
    if config_file.exists() {
        miette::bail!(miette::miette!(
            help = "edit the existing file or delete it to start over",
            "{} already exists",
            config_file.display()
        ));
    }
    std::fs::create_dir_all(paths.state_dir())
        .into_diagnostic()
        .wrap_err_with(|| format!("creating {}", paths.state_dir().display()))?;

    let config = ProjectConfig::default();
    let mut json = serde_json::to_string_pretty(&config).into_diagnostic()?;
    json.push('\n');
    std::fs::write(&config_file, json).into_diagnostic()?;
    std::fs::write(paths.state_dir().join(".gitignore"), STATE_GITIGNORE).into_diagnostic()?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "config": config_file.display().to_string(),
        }))?,
        _ => println!("Created {} with default configuration", config_file.display()),
    }
    Ok(())
}

async fn run_index(project: Project, force: bool, format: OutputFormat) -> Result<()> {
    let provider = Arc::new(project.provider(project.config.semantic_search.enabled));
    let indexer = Indexer::new(
        project.paths,
        project.config,
        project.settings.indexing,
        provider,
    );

    let spinner = if std::io::stderr().is_terminal() {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_style(
            indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
                .into_diagnostic()?,
        );
        pb.set_message(if force { "Re-indexing all files..." } else { "Indexing..." });
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let report = indexer.run(force).await.inspect_err(|_e| {
        if let Some(pb) = &spinner {
            pb.finish_with_message("Failed");
        }
    })?;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Markdown => print_report_markdown(&report),
        OutputFormat::Text => print_report_text(&report),
    }
    Ok(())
}

fn print_report_text(report: &IndexReport) {
    println!(
        "Indexed {} of {} files ({} unchanged, {} removed)",
        report.processed, report.total_candidates, report.unchanged, report.removed
    );
    if report.degraded > 0 {
        println!("Degraded: {} (metadata only)", report.degraded);
    }
    if report.embedded > 0 || report.embedding_failures > 0 {
        println!(
            "Embeddings: {} computed, {} failed",
            report.embedded, report.embedding_failures
        );
    }
    if !report.failed.is_empty() {
        println!("Failed:");
        for f in &report.failed {
            println!("  {}: {}", f.path, f.reason);
        }
    }
    println!();
    print_stats_text(&report.stats);
}

fn print_report_markdown(report: &IndexReport) {
    println!("# Index Run\n");
    println!("| Metric | Value |");
    println!("|--------|-------|");
    println!("| Processed | {} |", report.processed);
    println!("| Candidates | {} |", report.total_candidates);
    println!("| Unchanged | {} |", report.unchanged);
    println!("| Removed | {} |", report.removed);
    println!("| Degraded | {} |", report.degraded);
    println!("| Embedded | {} |", report.embedded);
    println!("| Embedding failures | {} |", report.embedding_failures);
    if !report.failed.is_empty() {
        println!("\n## Failed Files\n");
        for f in &report.failed {
            println!("- `{}`: {}", f.path, f.reason);
        }
    }
    println!();
    print_stats_markdown(&report.stats);
}

fn print_stats_text(stats: &IndexStats) {
    println!("Documents:        {}", stats.total_documents);
    println!("Concepts:         {}", stats.total_concepts);
    println!("Commands:         {}", stats.total_commands);
    println!("Configurations:   {}", stats.total_configurations);
    println!("Troubleshooting:  {}", stats.total_troubleshooting);
    println!("Graph:            {} nodes, {} edges", stats.graph_nodes, stats.graph_edges);
    println!("Repository type:  {}", stats.repo_type);
    match stats.last_updated {
        Some(at) => println!("Last updated:     {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Last updated:     never"),
    }
}

fn print_stats_markdown(stats: &IndexStats) {
    println!("## Index Statistics\n");
    println!("| Metric | Value |");
    println!("|--------|-------|");
    println!("| Documents | {} |", stats.total_documents);
    println!("| Concepts | {} |", stats.total_concepts);
    println!("| Commands | {} |", stats.total_commands);
    println!("| Configurations | {} |", stats.total_configurations);
    println!("| Troubleshooting | {} |", stats.total_troubleshooting);
    println!("| Graph nodes | {} |", stats.graph_nodes);
    println!("| Graph edges | {} |", stats.graph_edges);
    println!("| Repository type | {} |", stats.repo_type);
    if let Some(at) = stats.last_updated {
        println!("| Last updated | {} |", at.to_rfc3339());
    }
}

async fn run_search(
    project: Project,
    query: &str,
    limit: usize,
    category: Option<Category>,
    no_semantic: bool,
    format: OutputFormat,
) -> Result<()> {
    let index = project.load_index()?;
    let use_semantic = project.config.semantic_search.enabled && !no_semantic;
    let provider = project.provider(use_semantic);
    let engine = SearchEngine::new(
        &index,
        project.settings.search.clone(),
        project.config.semantic_search.similarity_threshold,
    );
    let options = SearchOptions {
        use_semantic,
        category,
    };
    let results = engine.search(query, limit, &options, &provider).await;

    match format {
        OutputFormat::Json => print_json(&results)?,
        OutputFormat::Markdown => print_results_markdown(&results),
        OutputFormat::Text => print_results_text(&results),
    }
    Ok(())
}

fn sections(results: &SearchResults) -> [(&'static str, &[Match]); 4] {
    [
        ("Concepts", results.concept.as_slice()),
        ("Commands", results.command.as_slice()),
        ("Configuration", results.configuration.as_slice()),
        ("Troubleshooting", results.troubleshooting.as_slice()),
    ]
}

fn print_results_text(results: &SearchResults) {
    if results.is_empty() {
        println!("No results for \"{}\".", results.query);
        return;
    }
    let mode = if results.semantic_used {
        "keyword + semantic"
    } else {
        "keyword"
    };
    println!("{} results for \"{}\" ({mode})", results.total(), results.query);

    for (title, matches) in sections(results) {
        if matches.is_empty() {
            continue;
        }
        println!("\n{title}:");
        for m in matches {
            let class = m
                .classification
                .as_deref()
                .map(|c| format!(" [{c}]"))
                .unwrap_or_default();
            println!("  {:>3}  {}:{}  {}{class}", m.score, m.file, m.line + 1, m.text);
        }
    }
    if !results.semantic.is_empty() {
        println!("\nSemantically similar files:");
        for s in &results.semantic {
            println!("  {:>3}  {}  ({:.3})", s.score, s.file, s.similarity);
        }
    }
}

fn print_results_markdown(results: &SearchResults) {
    println!("# Search: {}\n", results.query);
    if results.is_empty() {
        println!("No results.");
        return;
    }
    for (title, matches) in sections(results) {
        if matches.is_empty() {
            continue;
        }
        println!("## {title}\n");
        println!("| Score | Location | Match |");
        println!("|-------|----------|-------|");
        for m in matches {
            println!(
                "| {} | `{}:{}` | {} |",
                m.score,
                m.file,
                m.line + 1,
                m.text.replace('|', "\\|")
            );
        }
        println!();
    }
    if !results.semantic.is_empty() {
        println!("## Semantic\n");
        for s in &results.semantic {
            println!("- `{}` (similarity {:.3}, score {})", s.file, s.similarity, s.score);
        }
    }
}

fn run_context(project: Project, file: &str, format: OutputFormat) -> Result<()> {
    let index = project.load_index()?;
    let context = file_context(&index, file)?;
    match format {
        OutputFormat::Json => print_json(&context)?,
        OutputFormat::Markdown => print_context_markdown(&context),
        OutputFormat::Text => print_context_text(&context),
    }
    Ok(())
}

fn print_context_text(ctx: &FileContext) {
    let info = &ctx.file_info;
    println!("{}", ctx.path);
    println!("  type:          {}", info.file_type);
    println!("  size:          {} bytes, {} lines", info.size, info.lines);
    if let Some(pages) = info.pages {
        println!("  pages:         {pages}");
    }
    println!("  last indexed:  {}", info.last_indexed.format("%Y-%m-%d %H:%M:%S UTC"));

    let k = &ctx.knowledge;
    if !k.concepts.is_empty() {
        println!("\nConcepts:");
        for c in &k.concepts {
            println!("  {:>4}  {}", c.line + 1, c.name);
        }
    }
    if !k.commands.is_empty() {
        println!("\nCommands:");
        for c in &k.commands {
            println!("  {:>4}  {} [{}]", c.line + 1, c.text, c.classification);
        }
    }
    if !k.configurations.is_empty() {
        println!("\nConfiguration:");
        for c in &k.configurations {
            println!("  {:>4}  {} [{}]", c.line + 1, c.content, c.classification);
        }
    }
    if !k.troubleshooting.is_empty() {
        println!("\nTroubleshooting:");
        for t in &k.troubleshooting {
            println!("  {:>4}  {} [{}]", t.line + 1, t.content, t.classification);
        }
    }
    println!(
        "\nAlso: {} dependencies, {} code blocks, {} functions, {} variables",
        k.dependencies.len(),
        k.code_blocks.len(),
        k.functions.len(),
        k.variables.len()
    );
    if !ctx.related_files.is_empty() {
        println!("\nRelated files:");
        for f in &ctx.related_files {
            println!("  {f}");
        }
    }
}

fn print_context_markdown(ctx: &FileContext) {
    let info = &ctx.file_info;
    println!("# `{}`\n", ctx.path);
    println!(
        "**Type:** {} | **Size:** {} bytes | **Lines:** {}\n",
        info.file_type, info.size, info.lines
    );
    let k = &ctx.knowledge;
    if !k.concepts.is_empty() {
        println!("## Concepts\n");
        for c in &k.concepts {
            println!("- {} (line {})", c.name, c.line + 1);
        }
        println!();
    }
    if !k.commands.is_empty() {
        println!("## Commands\n");
        for c in &k.commands {
            println!("- `{}` ({})", c.text, c.classification);
        }
        println!();
    }
    if !ctx.related_files.is_empty() {
        println!("## Related Files\n");
        for f in &ctx.related_files {
            println!("- `{f}`");
        }
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsOutput<'a> {
    index: &'a IndexStats,
    embeddings: ProviderStats,
}

fn run_stats(project: Project, format: OutputFormat) -> Result<()> {
    let index = project.load_index()?;
    let provider = project.provider(project.config.semantic_search.enabled);
    let out = StatsOutput {
        index: &index.stats,
        embeddings: provider.stats(),
    };
    match format {
        OutputFormat::Json => print_json(&out)?,
        OutputFormat::Markdown => {
            print_stats_markdown(out.index);
            println!("\n## Embeddings\n");
            println!("- Available: {}", out.embeddings.available);
            if let Some(model) = &out.embeddings.model_id {
                println!("- Model: `{model}`");
            }
            println!("- Cached documents: {}", out.embeddings.cached_documents);
        }
        OutputFormat::Text => {
            print_stats_text(out.index);
            let model = out.embeddings.model_id.as_deref().unwrap_or("unavailable");
            println!(
                "Embeddings:       {model} ({} cached)",
                out.embeddings.cached_documents
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Init => run_init(&cli.path, cli.format)?,
        Command::Index { force } => run_index(Project::open(&cli.path)?, force, cli.format).await?,
        Command::Search {
            ref query,
            limit,
            category,
            no_semantic,
        } => {
            run_search(
                Project::open(&cli.path)?,
                query,
                limit,
                category,
                no_semantic,
                cli.format,
            )
            .await?
        }
        Command::Context { ref file } => run_context(Project::open(&cli.path)?, file, cli.format)?,
        Command::Stats => run_stats(Project::open(&cli.path)?, cli.format)?,
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "ragkit", &mut std::io::stdout());
        }
    }

    Ok(())
}
