#![forbid(unsafe_code)]

mod cmd;
mod digitalocean;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use digitalocean::DigitalOceanClient;
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use trawler_core::config::{self, Overrides, TOKEN_ENV, TrawlerConfig};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "trawler: DigitalOcean snapshot retention",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Output format (overrides --json and the FORMAT env var).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// DigitalOcean API token.
    #[arg(long, global = true, env = "DIGITALOCEAN_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// API base URL.
    #[arg(long, global = true, env = "TRAWLER_API_URL")]
    api_url: Option<String>,

    /// Config file (default: <config dir>/trawler/config.toml).
    #[arg(long, global = true, env = "TRAWLER_CONFIG")]
    config: Option<PathBuf>,

    /// Report what would change without creating or deleting anything.
    #[arg(long, global = true)]
    dry: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, self.json)
    }

    fn load_config(&self) -> anyhow::Result<TrawlerConfig> {
        let base = match self.config {
            Some(ref path) => config::load_config(path)?,
            None => config::load_user_config()?,
        };
        let overrides = Overrides {
            token: self.token.clone(),
            base_url: self.api_url.clone(),
        };
        Ok(base.with_overrides(overrides, env::var(TOKEN_ENV).ok()))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Read",
        about = "List droplets and volumes",
        long_about = "List every droplet and block storage volume visible to the API token.",
        after_help = "EXAMPLES:\n    # List resources\n    trawler list-resources\n\n    # Emit machine-readable output\n    trawler list-resources --json"
    )]
    ListResources,

    #[command(
        next_help_heading = "Read",
        about = "List snapshots",
        long_about = "List all snapshots, or only those taken of one droplet or volume, oldest first.",
        after_help = "EXAMPLES:\n    # List every snapshot\n    trawler list-snapshots\n\n    # Only snapshots of one volume\n    trawler list-snapshots 506f78a4-e098-11e5-ad9f-000f53306ae1"
    )]
    ListSnapshots(cmd::snapshots::ListSnapshotsArgs),

    #[command(
        next_help_heading = "Write",
        about = "Snapshot a volume",
        long_about = "Take a snapshot of a block storage volume. Without a name the snapshot is called <volume-name>-<unix-seconds>.",
        after_help = "EXAMPLES:\n    # Snapshot with the default name\n    trawler snapshot-volume 506f78a4-e098-11e5-ad9f-000f53306ae1\n\n    # Snapshot with an explicit name\n    trawler snapshot-volume 506f78a4-e098-11e5-ad9f-000f53306ae1 before-upgrade"
    )]
    SnapshotVolume(cmd::snapshot_volume::SnapshotVolumeArgs),

    #[command(
        next_help_heading = "Write",
        about = "Delete one snapshot",
        long_about = "Delete a single snapshot by id.",
        after_help = "EXAMPLES:\n    # Delete a snapshot\n    trawler delete-snapshot 7938206\n\n    # Show what would be deleted\n    trawler delete-snapshot 7938206 --dry"
    )]
    DeleteSnapshot(cmd::delete::DeleteSnapshotArgs),

    #[command(
        next_help_heading = "Write",
        about = "Prune snapshots by retention policy",
        long_about = "Keep the snapshots a retention policy selects and delete the rest.\n\nA policy is a sequence of <count><unit> rules: r = most recent, d = daily, w = weekly (Monday start), m = monthly, y = yearly. A snapshot survives if any rule keeps it. An empty policy means 1r and a bare number N means Nr.",
        after_help = "EXAMPLES:\n    # Keep the newest 3 plus one per week for 2 weeks\n    trawler cleanup 3164444 3r2w\n\n    # Preview a long-term policy\n    trawler cleanup 3164444 7d4w12m5y --dry\n\n    # Emit machine-readable output\n    trawler cleanup 3164444 3r --dry --json"
    )]
    Cleanup(cmd::cleanup::CleanupArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Generate shell completion scripts",
        long_about = "Generate shell completion scripts for supported shells.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    trawler completions bash\n\n    # Generate zsh completions\n    trawler completions zsh"
    )]
    Completions {
        /// Target shell for completion script generation.
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("TRAWLER_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "trawler=debug,info"
        } else {
            "trawler=info,warn"
        })
    });

    let format = env::var("TRAWLER_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: &Cli, output: OutputMode) -> anyhow::Result<()> {
    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "trawler", &mut std::io::stdout());
        return Ok(());
    }

    let config = cli.load_config()?;
    debug!(base_url = %config.api.base_url, dry = cli.dry, "configuration loaded");

    // Reject a bad policy before the client (and the token) are needed.
    if let Commands::Cleanup(ref args) = cli.command {
        let policy = args
            .policy
            .as_deref()
            .unwrap_or(&config.cleanup.default_policy);
        trawler_core::parse_policy(policy)?;
    }

    let client = DigitalOceanClient::new(&config.api)?;
    let result = match cli.command {
        Commands::ListResources => cmd::resources::run_list_resources(&client, output),
        Commands::ListSnapshots(ref args) => {
            cmd::snapshots::run_list_snapshots(args, &client, output)
        }
        Commands::SnapshotVolume(ref args) => cmd::snapshot_volume::run_snapshot_volume(
            args,
            &client,
            &chrono::Utc::now(),
            cli.dry,
            output,
        ),
        Commands::DeleteSnapshot(ref args) => {
            cmd::delete::run_delete_snapshot(args, &client, cli.dry, output)
        }
        Commands::Cleanup(ref args) => cmd::cleanup::run_cleanup(
            args,
            &config.cleanup.default_policy,
            &client,
            &chrono::Local::now(),
            cli.dry,
            output,
        ),
        Commands::Completions { .. } => Ok(()),
    };
    debug!(requests = client.request_count(), "api requests issued");
    result
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output = cli.output_mode();
    match run(&cli, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let error = CliError::from_anyhow(&err);
            if render_error(output, &error).is_err() {
                eprintln!("Error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_parses_resource_and_policy() {
        let cli = Cli::parse_from(["trawler", "cleanup", "3164444", "3r2w"]);
        match cli.command {
            Commands::Cleanup(ref args) => {
                assert_eq!(args.resource_id, "3164444");
                assert_eq!(args.policy.as_deref(), Some("3r2w"));
            }
            ref other => panic!("unexpected command: {other:?}"),
        }
        assert!(!cli.dry);
    }

    #[test]
    fn policy_is_optional() {
        let cli = Cli::parse_from(["trawler", "cleanup", "3164444"]);
        assert!(matches!(
            cli.command,
            Commands::Cleanup(cmd::cleanup::CleanupArgs { policy: None, .. })
        ));
    }

    #[test]
    fn dry_flag_parses_after_subcommand() {
        let cli = Cli::parse_from(["trawler", "delete-snapshot", "7938206", "--dry"]);
        assert!(cli.dry);
    }

    #[test]
    fn json_flag_sets_output_mode() {
        let cli = Cli::parse_from(["trawler", "list-snapshots", "--json"]);
        assert!(cli.output_mode().is_json());
    }

    #[test]
    fn format_flag_wins_over_json() {
        let cli = Cli::parse_from(["trawler", "--json", "--format", "text", "list-resources"]);
        assert_eq!(cli.output_mode(), OutputMode::Text);
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[api]\ntoken = \"from-file\"\nbase_url = \"http://file\"\n",
        )
        .expect("write config");

        let cli = Cli::parse_from([
            "trawler",
            "--config",
            path.to_str().expect("utf8 path"),
            "--token",
            "from-flag",
            "--api-url",
            "http://flag/",
            "list-resources",
        ]);
        let config = cli.load_config().expect("config");
        assert_eq!(config.api.token.as_deref(), Some("from-flag"));
        assert_eq!(config.api.base_url, "http://flag");
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
