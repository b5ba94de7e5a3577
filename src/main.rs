use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

/// modbuild - declarative dependency and publish policy for game mods
#[derive(Parser)]
#[command(name = "modbuild")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate modbuild.toml without resolving anything
    Check,

    /// Show feature toggle selections and the active dependency set
    Deps {
        /// Override a toggle for this run (e.g., --set testThaumcraft=true)
        #[arg(long = "set", value_name = "NAME=BOOL")]
        overrides: Vec<String>,

        /// Only list dependencies with this scope (e.g., compile-only)
        #[arg(long)]
        scope: Option<String>,
    },

    /// Show which repository serves a coordinate
    Route {
        /// Coordinate (e.g., curse:thaumcraft-223628:2227552)
        coordinate: String,
    },

    /// Resolve the active dependency set and write modbuild.lock
    Resolve {
        #[arg(long = "set", value_name = "NAME=BOOL")]
        overrides: Vec<String>,

        /// Parallel fetch workers (defaults to resolver.jobs)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Fail instead of changing modbuild.lock
        #[arg(long)]
        frozen: bool,
    },

    /// Resolve, stage resources and write publish manifests
    Build {
        #[arg(long = "set", value_name = "NAME=BOOL")]
        overrides: Vec<String>,

        /// Primary build output (defaults to build/libs/<id>-<version>.jar)
        #[arg(long)]
        artifact: Option<String>,

        /// Output directory (defaults to output.staging_dir / output.manifest_dir)
        #[arg(short, long)]
        out: Option<String>,

        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Resolve and print the publish manifests as JSON
    Plan {
        #[arg(long = "set", value_name = "NAME=BOOL")]
        overrides: Vec<String>,

        #[arg(long)]
        artifact: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., resolver.jobs)
        key: String,
        /// Configuration value
        value: String,
    },
}

/// Diagnostics go to stderr; `MODBUILD_LOG` takes precedence over `-v`
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("MODBUILD_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("modbuild={}", default_level)));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Check => commands::check::run(),
        Commands::Deps { overrides, scope } => commands::deps::run(overrides, scope),
        Commands::Route { coordinate } => commands::route::run(coordinate),
        Commands::Resolve {
            overrides,
            jobs,
            frozen,
        } => commands::resolve::run(overrides, jobs, frozen),
        Commands::Build {
            overrides,
            artifact,
            out,
            jobs,
        } => commands::build::run(overrides, artifact, out, jobs),
        Commands::Plan {
            overrides,
            artifact,
        } => commands::plan::run(overrides, artifact),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::run_show(),
            ConfigAction::Set { key, value } => commands::config::run_set(&key, &value),
        },
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "modbuild", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
