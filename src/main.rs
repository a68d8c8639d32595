use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use clap::Parser;
use snapwarden::{
    config::{StoreConfig, WardenConfig},
    observability::init_tracing,
    retention::{RunOptions, run_retention},
    snapshots::{MemorySnapshotStore, SnapshotStore},
};

/// CLI arguments for snapwarden
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Daily RDS snapshots with tiered weekly retention",
    long_about = None
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "snapwarden.toml")]
    config: PathBuf,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Take today's snapshots and delete outdated ones (default)
    Run {
        /// Evaluate as of this RFC 3339 time instead of now
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
    /// Report what a run would do without creating or deleting anything
    Plan {
        /// Evaluate as of this RFC 3339 time instead of now
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
    /// Initialize a new configuration file
    Init {
        /// Path to create the config file (defaults to --config)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Show enabled compile-time features
    Features,
}

/// Default configuration written by `snapwarden init`.
fn default_config_toml() -> String {
    let template = r#"# snapwarden configuration

# Regions whose available RDS instances are backed up daily.
regions = ["eu-west-1"]

[store]
type = "rds"
# endpoint_url = "${RDS_ENDPOINT_URL}"

[retention]
horizon_weeks = 16
min_current_week_snapshots = 4
week_starts_on = "sun"
max_concurrent_regions = 2

[[retention.weeks]]
offset = 0
keep = ["mon", "wed", "fri", "sat"]

[[retention.weeks]]
offset = 1
keep = ["mon", "fri"]

[[retention.weeks]]
offset = 2
keep = ["mon"]

[retention.safety]
dry_run = false

[creation]
additional_tags = [{ key = "created_by", value = "snapwarden" }]

[observability.logging]
level = "info"
format = "compact"
"#;

    if cfg!(feature = "store-rds") {
        template.to_string()
    } else {
        template.replace("type = \"rds\"", "type = \"memory\"")
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::Init { output, force }) => {
            run_init(output.unwrap_or(args.config), force);
        }
        Some(Command::Features) => {
            run_features();
        }
        Some(Command::Plan { now }) => {
            run(&args.config, now, true).await;
        }
        Some(Command::Run { now }) => {
            run(&args.config, now, false).await;
        }
        None => {
            run(&args.config, None, false).await;
        }
    }
}

/// Create a default configuration file.
fn run_init(output_path: PathBuf, force: bool) {
    if output_path.exists() && !force {
        eprintln!(
            "Config file already exists: {}\nUse --force to overwrite.",
            output_path.display()
        );
        std::process::exit(1);
    }

    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        eprintln!("Failed to create directory {}: {}", parent.display(), e);
        std::process::exit(1);
    }

    if let Err(e) = std::fs::write(&output_path, default_config_toml()) {
        eprintln!("Failed to write config file: {}", e);
        std::process::exit(1);
    }

    println!("Created config file: {}", output_path.display());
    println!();
    println!("To preview a run without touching any snapshot:");
    println!("  snapwarden plan --config {}", output_path.display());
}

fn run_features() {
    let version = env!("CARGO_PKG_VERSION");

    let features: &[(&str, &str, bool)] = &[
        ("cli", "Execution", cfg!(feature = "cli")),
        ("aws-sdk", "Cloud SDKs", cfg!(feature = "aws-sdk")),
        ("store-rds", "Snapshot stores", cfg!(feature = "store-rds")),
    ];

    let profile = if cfg!(feature = "full") {
        "full"
    } else if cfg!(feature = "tiny") {
        "tiny"
    } else {
        "custom"
    };

    println!("snapwarden v{version}\n");
    println!("Build profile: {profile}");
    match profile {
        "full" => println!("  (full = cli + store-rds)\n"),
        "tiny" => println!("  (tiny = cli with the in-memory store only)\n"),
        _ => println!(),
    }

    println!("Compile-time features:");

    let mut current_group = "";
    for &(name, group, enabled) in features {
        if group != current_group {
            if !current_group.is_empty() {
                println!();
            }
            println!("  {group}:");
            current_group = group;
        }
        let status = if enabled { "enabled" } else { "disabled" };
        println!("    {name:<32} {status}");
    }
}

async fn build_store(config: &StoreConfig) -> Arc<dyn SnapshotStore> {
    match config {
        StoreConfig::Memory => {
            tracing::warn!(
                "Using the in-memory snapshot store. It starts empty, so this run will \
                 neither create nor delete anything."
            );
            Arc::new(MemorySnapshotStore::new())
        }
        #[cfg(feature = "store-rds")]
        StoreConfig::Rds(rds) => {
            use snapwarden::snapshots::{RdsSnapshotStore, RdsStoreConfig};

            tracing::info!(endpoint_url = ?rds.endpoint_url, "Using RDS snapshot store");
            Arc::new(RdsSnapshotStore::new(RdsStoreConfig::from(rds)).await)
        }
    }
}

/// Run retention once and print the report as JSON on stdout.
async fn run(config_path: &Path, now: Option<DateTime<Utc>>, plan_only: bool) {
    let config = match WardenConfig::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_tracing(&config.observability) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    tracing::info!(
        config = %config_path.display(),
        version = env!("CARGO_PKG_VERSION"),
        "Starting snapwarden"
    );

    let store = build_store(&config.store).await;
    let options = RunOptions::new(now.unwrap_or_else(Utc::now)).dry_run(plan_only);
    let report = run_retention(store.as_ref(), &config, options).await;

    if report.has_failures() {
        tracing::warn!(
            failures = report.failures.len(),
            "Run finished with failures; see the report for details"
        );
    }

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Failed to serialize run report: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = WardenConfig::from_str(&default_config_toml()).unwrap();
        assert_eq!(config.regions, vec!["eu-west-1"]);
        assert_eq!(config.retention.horizon_weeks, 16);
        assert_eq!(config.retention.weeks.len(), 3);
        assert!(!config.retention.safety.dry_run);
        #[cfg(feature = "store-rds")]
        assert!(!config.store.is_memory());
        #[cfg(not(feature = "store-rds"))]
        assert!(config.store.is_memory());
    }

    #[test]
    fn test_default_command_is_run() {
        let args = Args::try_parse_from(["snapwarden"]).unwrap();
        assert!(args.command.is_none());
        assert_eq!(args.config, PathBuf::from("snapwarden.toml"));
    }

    #[test]
    fn test_plan_with_now() {
        let args = Args::try_parse_from([
            "snapwarden",
            "plan",
            "--now",
            "2024-01-15T10:00:00Z",
            "-c",
            "/etc/snapwarden.toml",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("/etc/snapwarden.toml"));
        match args.command {
            Some(Command::Plan { now }) => {
                assert_eq!(now, Some(Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_now_rejected() {
        assert!(Args::try_parse_from(["snapwarden", "run", "--now", "yesterday"]).is_err());
    }

    #[test]
    fn test_init_writes_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("snapwarden.toml");

        run_init(path.clone(), false);

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, default_config_toml());
        assert!(WardenConfig::from_file(&path).is_ok());
    }
}
