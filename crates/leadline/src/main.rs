// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Leadline - lead dispatch and matching engine.
//!
//! This is the binary entry point: an admin CLI over the dispatch engine.

mod commands;
mod doctor;
mod import;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use leadline_config::model::LeadlineConfig;
use leadline_core::LeadlineError;
use leadline_dispatch::Dispatcher;
use leadline_storage::SqliteStorage;

/// Leadline - lead dispatch and matching engine.
#[derive(Parser, Debug)]
#[command(name = "leadline", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output.
    #[arg(long, global = true)]
    plain: bool,

    /// Print structured JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect or update the matching configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
    /// Submit a lead from a JSON file (`-` for stdin) and dispatch it.
    Submit { file: PathBuf },
    /// Dispatch an existing lead.
    Dispatch {
        lead_id: String,
        /// Hints as a JSON object (service_name, city, postal_code, ...).
        #[arg(long)]
        hints: Option<String>,
    },
    /// Dispatch the lead of an assignment again.
    Replay { assignment_id: String },
    /// Move an assignment to another provider.
    Reassign {
        assignment_id: String,
        provider_id: String,
        #[arg(long)]
        actor: Option<String>,
    },
    /// Record a provider action on a lead.
    Action {
        lead_id: String,
        provider_id: String,
        #[arg(value_enum)]
        kind: ActionKind,
        /// Quote amount.
        #[arg(long, required_if_eq("kind", "quote"))]
        amount: Option<f64>,
        /// Quote validity in days.
        #[arg(long)]
        valid_days: Option<u32>,
        /// Decline reason.
        #[arg(long)]
        reason: Option<String>,
    },
    /// Accept a provider's quote on behalf of the client.
    Accept {
        lead_id: String,
        provider_id: String,
        #[arg(long)]
        actor: Option<String>,
    },
    /// Refuse a provider's quote on behalf of the client.
    Refuse {
        lead_id: String,
        provider_id: String,
        #[arg(long)]
        actor: Option<String>,
    },
    /// Mark an accepted lead as completed.
    Complete {
        lead_id: String,
        #[arg(long)]
        actor: Option<String>,
    },
    /// Show a lead's event timeline.
    Timeline { lead_id: String },
    /// Show assignment counts by status.
    Stats,
    /// Expire stale leads and reassign stale pending assignments.
    Sweep {
        /// Only run the expiry sweep.
        #[arg(long, conflicts_with = "reassign_only")]
        expire_only: bool,
        /// Only run the auto-reassign sweep.
        #[arg(long)]
        reassign_only: bool,
    },
    /// Load providers from a CSV file into the directory.
    ImportProviders { file: PathBuf },
    /// Run diagnostic checks.
    Doctor {
        /// Also run the slower integrity checks.
        #[arg(long)]
        deep: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the effective matching configuration.
    Show,
    /// Apply a JSON patch, e.g. '{"geo_radius_km": 30}'.
    Set {
        patch: String,
        #[arg(long)]
        actor: Option<String>,
    },
    /// Show recent configuration changes.
    History {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ActionKind {
    View,
    Quote,
    Decline,
}

/// Output switches shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    pub color: bool,
}

/// Everything a command needs once storage is open.
pub struct Context {
    pub config: LeadlineConfig,
    pub storage: Arc<SqliteStorage>,
    pub dispatcher: Arc<Dispatcher>,
    pub out: Output,
}

impl Context {
    async fn open(config: LeadlineConfig, out: Output) -> Result<Self, LeadlineError> {
        let storage = Arc::new(SqliteStorage::open(config.storage.clone()).await?);
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&storage),
            config.dispatch.source_table.clone(),
        ));
        Ok(Self {
            config,
            storage,
            dispatcher,
            out,
        })
    }

    /// The actor recorded for admin operations without `--actor`.
    pub fn actor(&self, explicit: Option<String>) -> String {
        explicit.unwrap_or_else(|| self.config.dispatch.admin_actor.clone())
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => leadline_config::load_and_validate_path(path),
        None => leadline_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            leadline_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.service.log_level);
    leadline_dispatch::recording::register_metrics();

    let out = Output {
        json: cli.json,
        color: !cli.plain && std::io::IsTerminal::is_terminal(&std::io::stdout()),
    };

    let Some(command) = cli.command else {
        println!("leadline: use --help for available commands");
        return;
    };

    if let Commands::Doctor { deep } = command {
        doctor::run_doctor(&config, cli.config.as_deref(), deep, out.color).await;
        return;
    }

    let ctx = match Context::open(config, out).await {
        Ok(ctx) => ctx,
        Err(e) => exit_with(&e, out.color),
    };
    if let Err(e) = run(&ctx, command).await {
        exit_with(&e, out.color);
    }
    if let Err(e) = leadline_core::StorageAdapter::close(ctx.storage.as_ref()).await {
        tracing::warn!(error = %e, "failed to close storage cleanly");
    }
}

async fn run(ctx: &Context, command: Commands) -> Result<(), LeadlineError> {
    match command {
        Commands::Config { action } => match action {
            ConfigCommand::Show => commands::config_show(ctx).await,
            ConfigCommand::Set { patch, actor } => {
                commands::config_set(ctx, &patch, &ctx.actor(actor)).await
            }
            ConfigCommand::History { limit } => commands::config_history(ctx, limit).await,
        },
        Commands::Submit { file } => commands::submit(ctx, &file).await,
        Commands::Dispatch { lead_id, hints } => {
            commands::dispatch(ctx, &lead_id, hints.as_deref()).await
        }
        Commands::Replay { assignment_id } => commands::replay(ctx, &assignment_id).await,
        Commands::Reassign {
            assignment_id,
            provider_id,
            actor,
        } => commands::reassign(ctx, &assignment_id, &provider_id, &ctx.actor(actor)).await,
        Commands::Action {
            lead_id,
            provider_id,
            kind,
            amount,
            valid_days,
            reason,
        } => {
            let action = match kind {
                ActionKind::View => leadline_dispatch::ProviderAction::View,
                ActionKind::Quote => leadline_dispatch::ProviderAction::Quote {
                    amount: amount.ok_or_else(|| {
                        LeadlineError::invalid_field("amount", "required for a quote")
                    })?,
                    valid_days,
                },
                ActionKind::Decline => leadline_dispatch::ProviderAction::Decline { reason },
            };
            commands::provider_action(ctx, &lead_id, &provider_id, action).await
        }
        Commands::Accept {
            lead_id,
            provider_id,
            actor,
        } => {
            commands::client_decision(
                ctx,
                &lead_id,
                &provider_id,
                leadline_dispatch::ClientDecision::Accept,
                &ctx.actor(actor),
            )
            .await
        }
        Commands::Refuse {
            lead_id,
            provider_id,
            actor,
        } => {
            commands::client_decision(
                ctx,
                &lead_id,
                &provider_id,
                leadline_dispatch::ClientDecision::Refuse,
                &ctx.actor(actor),
            )
            .await
        }
        Commands::Complete { lead_id, actor } => {
            commands::complete(ctx, &lead_id, &ctx.actor(actor)).await
        }
        Commands::Timeline { lead_id } => commands::timeline(ctx, &lead_id).await,
        Commands::Stats => commands::stats(ctx).await,
        Commands::Sweep {
            expire_only,
            reassign_only,
        } => commands::sweep(ctx, !reassign_only, !expire_only).await,
        Commands::ImportProviders { file } => import::run_import(ctx, &file).await,
        // Runs before storage is opened.
        Commands::Doctor { .. } => Ok(()),
    }
}

fn exit_with(error: &LeadlineError, color: bool) -> ! {
    if color {
        use colored::Colorize;
        eprintln!("{} {error}", "error:".red().bold());
    } else {
        eprintln!("error: {error}");
    }
    std::process::exit(1);
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("leadline={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_quote_action() {
        let cli = Cli::try_parse_from([
            "leadline", "action", "lead-1", "p-1", "quote", "--amount", "120.5",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Action { kind, amount, .. }) => {
                assert_eq!(kind, ActionKind::Quote);
                assert_eq!(amount, Some(120.5));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn quote_without_amount_is_rejected() {
        assert!(Cli::try_parse_from(["leadline", "action", "lead-1", "p-1", "quote"]).is_err());
    }

    #[test]
    fn sweep_flags_conflict() {
        assert!(
            Cli::try_parse_from(["leadline", "sweep", "--expire-only", "--reassign-only"]).is_err()
        );
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from(["leadline", "stats", "--json", "--plain"]).unwrap();
        assert!(cli.json && cli.plain);
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = leadline_config::load_and_validate_str("").expect("defaults are valid");
        assert_eq!(config.dispatch.source_table, "leads");
    }
}
