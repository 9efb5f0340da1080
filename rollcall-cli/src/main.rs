mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::handlers;

#[derive(Parser)]
#[command(name = "rollcall")]
#[command(version = "0.1.0")]
#[command(about = "Posts a daily attendance poll to a Telegram chat and answers /getid and /poll")]
#[command(
    help_template = "{name} - {version}\n{about}\n\n{usage-heading}\n  {usage}\n\n{all-args}{options}\n"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot until Ctrl+C or SIGTERM
    ///
    /// BOT_TOKEN must be set in the environment. CHAT_ID and TOPIC_ID override
    /// the destination from the config file.
    ///
    /// Examples:
    ///   BOT_TOKEN=... CHAT_ID=-1001234567890 rollcall serve
    ///   rollcall serve --config ./rollcall.toml --log-level debug
    Serve {
        /// Path to configuration file (default: XDG config dir)
        #[arg(long)]
        config: Option<String>,

        /// Override the configured log level (error, warn, info, debug, trace)
        #[arg(long)]
        log_level: Option<String>,

        /// Do not send the health-check poll on startup
        #[arg(long)]
        skip_startup_poll: bool,
    },

    /// Write a configuration file with the default values
    Config {
        /// Create the configuration file
        #[arg(long)]
        init: bool,

        /// Path to configuration file
        #[arg(long, default_value = "~/.config/rollcall/config.toml")]
        config_file: String,
    },

    /// Print the next scheduled poll times
    Schedule {
        /// Path to configuration file (default: XDG config dir)
        #[arg(long)]
        config: Option<String>,

        /// Number of upcoming fire times to show
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            log_level,
            skip_startup_poll,
        } => {
            handlers::handle_serve(config, log_level, skip_startup_poll).await?;
        }
        Commands::Config { init, config_file } => {
            if init {
                handlers::handle_config_init(config_file).await?;
            } else {
                println!("Config command requires --init flag");
                println!("Usage: rollcall config --init [--config-file PATH]");
            }
        }
        Commands::Schedule { config, count } => {
            handlers::handle_schedule(config, count).await?;
        }
    }

    Ok(())
}
