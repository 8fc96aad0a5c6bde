use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use pkgcache::store::ManifestStore;
use pkgcache::{load_config, validate_pair, Cache, CacheConfig, Error};

#[derive(Parser)]
#[command(name = "pkgcache", version, about = "Mirror product packages and serve rewritten manifests")]
struct Cli {
    /// YAML or JSON configuration file
    #[arg(short, long, env = "PKGCACHE_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Overrides {
    #[arg(long, env = "PKGCACHE_METADATA_DIR", global = true)]
    metadata_dir: Option<PathBuf>,
    #[arg(long, env = "PKGCACHE_PACKAGE_DIR", global = true)]
    package_dir: Option<PathBuf>,
    #[arg(long, env = "PKGCACHE_SYNC_MIN_VERSION", global = true)]
    sync_min_version: Option<String>,
    #[arg(long, env = "PKGCACHE_MIRROR_HOST", global = true)]
    mirror_host: Option<String>,
    #[arg(long, env = "PKGCACHE_MIRROR_PROTOCOL", global = true)]
    mirror_protocol: Option<String>,
    #[arg(long, env = "PKGCACHE_MIRROR_PORT", global = true)]
    mirror_port: Option<u16>,
}

#[derive(Args)]
struct Pair {
    #[arg(long)]
    project: String,
    #[arg(long)]
    channel: String,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch manifests, mirror packages and write rewritten manifests
    Update,
    /// Print the stored manifest for a project and channel
    Manifest(Pair),
    /// Print the run_data timestamp of the stored manifest
    LastModified(Pair),
    /// Print where the manifest for a project and channel is stored
    Path(Pair),
    /// Load and validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ Error::MissingManifest { .. }) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> pkgcache::Result<()> {
    let config = resolve_config(cli.config.as_deref(), cli.overrides)?;

    match cli.command {
        Command::Validate => {
            pkgcache::validate_config(&config)?;
            println!("metadata_dir: {}", config.metadata_dir.display());
            println!("package_dir: {}", config.package_dir.display());
            println!(
                "sync: {} x {}",
                config.sync_projects.join(","),
                config.sync_channels.join(",")
            );
            println!(
                "min_version: {}",
                config.sync_min_version.as_deref().unwrap_or("(all)")
            );
            match config.mirror_target() {
                Some(t) => println!("mirror: {}://{}:{}", t.protocol, t.host, t.port),
                None => println!("mirror: (upstream URLs kept)"),
            }
        }
        Command::Update => {
            let cache = Cache::from_config(config)?;
            cache.update().await?;
        }
        Command::Manifest(pair) => {
            let cache = Cache::from_config(config)?;
            let manifest = cache.manifest_for(&pair.project, &pair.channel)?;
            print!("{}", manifest.to_json_pretty()?);
        }
        Command::LastModified(pair) => {
            let cache = Cache::from_config(config)?;
            println!("{}", cache.last_modified_for(&pair.project, &pair.channel)?);
        }
        Command::Path(pair) => {
            validate_pair(&pair.project, &pair.channel)?;
            let store = ManifestStore::new(config.metadata_dir);
            println!("{}", store.path(&pair.project, &pair.channel).display());
        }
    }

    Ok(())
}

fn resolve_config(path: Option<&std::path::Path>, o: Overrides) -> pkgcache::Result<CacheConfig> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => CacheConfig::default(),
    };

    if let Some(v) = o.metadata_dir {
        config.metadata_dir = v;
    }
    if let Some(v) = o.package_dir {
        config.package_dir = v;
    }
    if let Some(v) = o.sync_min_version {
        config.sync_min_version = Some(v);
    }
    if let Some(v) = o.mirror_host {
        config.mirror_host = Some(v);
    }
    if let Some(v) = o.mirror_protocol {
        config.mirror_protocol = v;
    }
    if let Some(v) = o.mirror_port {
        config.mirror_port = v;
    }

    Ok(config)
}
