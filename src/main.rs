use anyhow::Result;
use clap::{Parser, Subcommand};

use verity::analytics::charts::{LabelFilter, RiskFilter};
use verity::api::types::PredictionRequest;
use verity::cli::{self, Context, OutputFormat};
use verity::{config, logging};

#[derive(Debug, Parser)]
#[command(name = "verity")]
#[command(about = "Client for the fake-news classification API")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Log in and store the session locally
    Login {
        username: String,
        /// Password (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account, then log in
    Register {
        username: String,
        #[arg(long)]
        password: Option<String>,
        /// Password confirmation (prompted when omitted)
        #[arg(long)]
        confirm: Option<String>,
    },
    /// End the session (always clears local state)
    Logout,
    /// Show the logged-in user
    Whoami {
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Analyze one statement
    Predict {
        #[arg(long)]
        statement: String,
        #[arg(long, default_value = "")]
        speaker: String,
        /// Full text of the article or post
        #[arg(long, default_value = "")]
        content: String,
        /// Sources, separated by `;`, `,` or newlines
        #[arg(long, default_value = "")]
        sources: String,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// List past predictions
    History {
        #[arg(long, default_value = "20")]
        limit: usize,
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Summary statistics over prediction history
    Stats {
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Confidence over time, filtered and subsampled
    Timeline {
        /// all, real, fake
        #[arg(long, default_value = "all")]
        label: LabelFilter,
        /// all, low, medium, high
        #[arg(long, default_value = "all")]
        risk: RiskFilter,
        /// Maximum points to show (0 = no limit)
        #[arg(long)]
        max_points: Option<usize>,
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Predictions broken down by label, risk and source type
    Hierarchy {
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Mean confidence by day of week and hour of day
    Heatmap {
        /// Bucket in UTC instead of local time
        #[arg(long)]
        utc: bool,
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Admin-only commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
    /// Refresh history periodically and print a summary line
    Watch {
        /// Seconds between refreshes (default from config)
        #[arg(long)]
        interval: Option<u64>,
        /// Stop after this many refreshes
        #[arg(long)]
        count: Option<usize>,
    },
    /// Show recent local activity
    Activity {
        #[arg(long, default_value = "20")]
        limit: usize,
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Check API reachability and local state
    Health,
    /// Serve the local web dashboard
    Web {
        /// Bind address (default from config)
        #[arg(long)]
        addr: Option<String>,
        /// Don't open a browser
        #[arg(long)]
        no_open: bool,
    },
    /// Show or edit configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Debug, Subcommand)]
enum AdminCommands {
    /// Server-side model performance statistics
    Performance {
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Delete one history record
    Delete {
        id: i64,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write the default config to ~/.verity/config.toml
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Set a dotted key, e.g. `api.base_url`
    Set { key: String, value: String },
    /// Restore the default config file
    Reset,
}

fn fmt(s: &str) -> OutputFormat {
    OutputFormat::from_str_opt(Some(s))
}

fn main() -> Result<()> {
    let app = App::parse();

    // Config commands must work even when the stored session is unusable.
    if let Commands::Config { command } = &app.command {
        return match command {
            ConfigCommands::Show => cli::run_config_show(),
            ConfigCommands::Init { force } => cli::run_config_init(*force),
            ConfigCommands::Set { key, value } => cli::run_config_set(key, value),
            ConfigCommands::Reset => cli::run_config_reset(),
        };
    }

    let config = config::load();
    logging::init(&config.logging.level);
    let mut ctx = Context::load(config)?;

    match app.command {
        Commands::Login { username, password } => cli::run_login(&mut ctx, &username, password),
        Commands::Register {
            username,
            password,
            confirm,
        } => cli::run_register(&mut ctx, &username, password, confirm),
        Commands::Logout => cli::run_logout(&mut ctx),
        Commands::Whoami { format } => cli::run_whoami(&ctx, fmt(&format)),
        Commands::Predict {
            statement,
            speaker,
            content,
            sources,
            format,
        } => {
            let request = PredictionRequest {
                speaker,
                statement,
                full_text: content,
                sources,
            };
            cli::run_predict(&mut ctx, &request, fmt(&format))
        }
        Commands::History { limit, format } => cli::run_history(&mut ctx, limit, fmt(&format)),
        Commands::Stats { format } => cli::run_stats(&mut ctx, fmt(&format)),
        Commands::Timeline {
            label,
            risk,
            max_points,
            format,
        } => cli::run_timeline(&mut ctx, label, risk, max_points, fmt(&format)),
        Commands::Hierarchy { format } => cli::run_hierarchy(&mut ctx, fmt(&format)),
        Commands::Heatmap { utc, format } => cli::run_heatmap(&mut ctx, utc, fmt(&format)),
        Commands::Admin { command } => match command {
            AdminCommands::Performance { format } => {
                cli::run_admin_performance(&mut ctx, fmt(&format))
            }
            AdminCommands::Delete { id, yes } => cli::run_admin_delete(&mut ctx, id, yes),
        },
        Commands::Watch { interval, count } => cli::run_watch(&mut ctx, interval, count),
        Commands::Activity { limit, format } => cli::run_activity(&ctx, limit, fmt(&format)),
        Commands::Health => cli::run_health(&ctx),
        Commands::Web { addr, no_open } => cli::run_web(ctx, addr, !no_open),
        Commands::Config { .. } => Ok(()),
    }
}
