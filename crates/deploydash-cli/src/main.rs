mod cmd;
mod settings;

use clap::{Parser, Subcommand};
use settings::GlobalArgs;

#[derive(Parser)]
#[command(
    name = "deploydash",
    about = "Operator dashboard: run deploy/stop/restart scripts, pick a branch, tail logs",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the dashboard
    Serve {
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0", env = "DEPLOYDASH_HOST")]
        host: String,
        /// Port to listen on (0 = OS-assigned)
        #[arg(long, default_value = "8501", env = "DEPLOYDASH_PORT")]
        port: u16,
        /// Open a browser once listening
        #[arg(long)]
        open: bool,
    },

    /// Refresh the deploy tooling from its repository
    Update,

    /// Validate the auth config and exit
    CheckConfig,

    /// List the repository's branches as the dashboard would
    Branches,
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let settings = settings::resolve(&cli.global);

    let result = match cli.command {
        Commands::Serve { host, port, open } => cmd::serve::run(settings, &host, port, open),
        Commands::Update => cmd::update::run(&settings, cli.json),
        Commands::CheckConfig => cmd::check_config::run(&settings, cli.json),
        Commands::Branches => cmd::branches::run(&settings, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
