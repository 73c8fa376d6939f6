//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use pagenotfound_core::{
    ContentLastChanceFinder, PageNotFoundFinder, PageNotFoundService, PublishedRequestBuilder,
    SiteSnapshot,
};
use pagenotfound_shared::{AppConfig, NodeKey, ResolverConfig, init_config, load_config};
use pagenotfound_storage::NotFoundPageStore;
use tracing::info;
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// PageNotFound — custom 404 pages for content-managed sites.
#[derive(Parser)]
#[command(
    name = "pagenotfound",
    version,
    about = "Resolve custom 404 pages and manage the editorial 404 mapping.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run last-chance 404 resolution for a URL against a site snapshot.
    Resolve {
        /// Request URL that found no page.
        url: String,

        /// Site snapshot (TOML) describing sections and the content tree.
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Request culture, e.g. en-US.
        #[arg(short, long)]
        culture: Option<String>,

        /// Read the 404 mapping from this database instead of the snapshot.
        #[arg(long)]
        db: Option<PathBuf>,

        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Manage the editorial 404 mapping.
    Pages {
        /// Mapping database (defaults to the configured storage path).
        #[arg(long, global = true)]
        db: Option<PathBuf>,

        #[command(subcommand)]
        action: PagesAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Mapping subcommands. Nodes are UUID keys or integer ids.
#[derive(Subcommand)]
pub(crate) enum PagesAction {
    /// Show `target` for missing URLs below `node`.
    Set { node: String, target: String },
    /// Remove the mapping for `node`.
    Remove { node: String },
    /// Remove every mapping pointing at `target`.
    Prune { target: String },
    /// List all mappings.
    List,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "pagenotfound=info",
        1 => "pagenotfound=debug",
        _ => "pagenotfound=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Resolve {
            url,
            snapshot,
            culture,
            db,
            json,
        } => cmd_resolve(&url, &snapshot, culture, db.as_deref(), json).await,
        Command::Pages { db, action } => {
            let store = open_store(db.as_deref()).await?;
            match action {
                PagesAction::Set { node, target } => cmd_pages_set(&store, &node, &target).await,
                PagesAction::Remove { node } => cmd_pages_remove(&store, &node).await,
                PagesAction::Prune { target } => cmd_pages_prune(&store, &target).await,
                PagesAction::List => cmd_pages_list(&store).await,
            }
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Parse a node argument: a UUID key, or an integer id mapped the same way
/// snapshots derive keys for nodes without one.
pub(crate) fn parse_node_key(raw: &str) -> Result<NodeKey> {
    if let Ok(id) = raw.parse::<i32>() {
        return Ok(NodeKey::from_id(id));
    }
    raw.parse()
        .map_err(|e| eyre!("invalid node '{raw}': expected a UUID or integer id ({e})"))
}

async fn open_store(db: Option<&Path>) -> Result<NotFoundPageStore> {
    let path = match db {
        Some(p) => p.to_path_buf(),
        None => load_config()?.storage.resolved_database_path()?,
    };
    info!(path = %path.display(), "opening 404 mapping database");
    Ok(NotFoundPageStore::open(&path).await?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_resolve(
    url: &str,
    snapshot_path: &Path,
    culture: Option<String>,
    db: Option<&Path>,
    json: bool,
) -> Result<()> {
    let config = load_config()?;
    let resolver_config = ResolverConfig::from(&config);

    let uri = Url::parse(url).map_err(|e| eyre!("invalid URL '{url}': {e}"))?;
    let snapshot = SiteSnapshot::load(snapshot_path)?;

    let service = PageNotFoundService::new(snapshot.clone())
        .with_max_walk_depth(resolver_config.max_walk_depth);
    match db {
        Some(path) => {
            let store = NotFoundPageStore::open_readonly(path).await?;
            service.refresh(store.list_not_found_pages().await?);
        }
        None => service.refresh(snapshot.not_found_entries()),
    }

    let finder = PageNotFoundFinder::new(
        snapshot.clone(),
        snapshot.clone(),
        snapshot.clone(),
        snapshot,
        service,
    )
    .with_config(resolver_config);

    let mut request = PublishedRequestBuilder::new(uri);
    if let Some(culture) = culture {
        request = request.with_culture(culture);
    }

    let handled = finder.try_find_content(&mut request).await;

    if json {
        let outcome = serde_json::json!({
            "handled": handled,
            "status": request.response_status(),
            "content": request.published_content(),
        });
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!();
    if !handled {
        println!("  Declined (reserved path)");
    } else {
        println!("  Status:  {}", request.response_status().unwrap_or_default());
        match request.published_content() {
            Some(content) => {
                println!("  Content: {} (id {})", content.name, content.id);
                println!("  Key:     {}", content.key);
            }
            None => println!("  Content: none (plain 404)"),
        }
    }
    println!();

    Ok(())
}

async fn cmd_pages_set(store: &NotFoundPageStore, node: &str, target: &str) -> Result<()> {
    let node = parse_node_key(node)?;
    let target = parse_node_key(target)?;
    store.set_not_found_page(node, target).await?;
    println!("{node} -> {target}");
    Ok(())
}

async fn cmd_pages_remove(store: &NotFoundPageStore, node: &str) -> Result<()> {
    let node = parse_node_key(node)?;
    if store.remove_not_found_page(node).await? {
        println!("removed mapping for {node}");
    } else {
        println!("no mapping for {node}");
    }
    Ok(())
}

async fn cmd_pages_prune(store: &NotFoundPageStore, target: &str) -> Result<()> {
    let target = parse_node_key(target)?;
    let removed = store.remove_mappings_to(target).await?;
    println!("removed {removed} mapping(s) pointing at {target}");
    Ok(())
}

async fn cmd_pages_list(store: &NotFoundPageStore) -> Result<()> {
    let entries = store.list_not_found_pages().await?;
    if entries.is_empty() {
        println!("no 404 mappings");
        return Ok(());
    }
    for entry in entries {
        println!(
            "{} -> {}  (updated {})",
            entry.node_key,
            entry.not_found_key,
            entry.updated_at.to_rfc3339()
        );
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_argument_accepts_ids_and_uuids() {
        assert_eq!(parse_node_key("10").unwrap(), NodeKey::from_id(10));
        let key = NodeKey::from_id(77);
        assert_eq!(parse_node_key(&key.to_string()).unwrap(), key);
        assert!(parse_node_key("not-a-node").is_err());
    }

    #[test]
    fn parses_resolve_command() {
        let cli = Cli::try_parse_from([
            "pagenotfound",
            "-vv",
            "resolve",
            "https://example.com/missing",
            "--snapshot",
            "site.toml",
            "--culture",
            "en-US",
            "--json",
        ])
        .expect("parse");
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Resolve {
                url,
                snapshot,
                culture,
                db,
                json,
            } => {
                assert_eq!(url, "https://example.com/missing");
                assert_eq!(snapshot, PathBuf::from("site.toml"));
                assert_eq!(culture.as_deref(), Some("en-US"));
                assert!(db.is_none());
                assert!(json);
            }
            _ => panic!("expected resolve"),
        }
    }

    #[test]
    fn parses_pages_db_after_subcommand() {
        let cli = Cli::try_parse_from(["pagenotfound", "pages", "set", "10", "99", "--db", "x.db"])
            .expect("parse");
        match cli.command {
            Command::Pages {
                db: Some(db),
                action: PagesAction::Set { node, target },
            } => {
                assert_eq!(db, PathBuf::from("x.db"));
                assert_eq!((node.as_str(), target.as_str()), ("10", "99"));
            }
            _ => panic!("expected pages set with --db"),
        }
    }
}
