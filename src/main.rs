//! remedy - automated test-failure remediation
//!
//! Clones a repository, runs its tests in a sandbox, applies deterministic
//! fixes for recognised failure categories and pushes them on a dedicated
//! branch.

use clap::{Parser, Subcommand};
use colored::Colorize;
use remedy::config::{Settings, DEFAULT_CONFIG_FILE};
use remedy::fix::FixStatus;
use remedy::r#loop::{is_usable_name, Coordinator, RunRequest};
use remedy::report::{ReportStore, RunResult};
use remedy::server::{self, AppState};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "remedy")]
#[command(version)]
#[command(about = "Clone, test, auto-fix and push: bounded CI remediation", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, env = "REMEDY_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

fn non_blank(value: &str) -> Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("must not be blank".to_string());
    }
    Ok(value.to_string())
}

/// Team and leader names end up in the branch name, so they need at least
/// one letter or digit.
fn branch_component(value: &str) -> Result<String, String> {
    let value = non_blank(value)?;
    if !is_usable_name(&value) {
        return Err("must contain at least one letter or digit".to_string());
    }
    Ok(value)
}

#[derive(Subcommand)]
enum Commands {
    /// Run the remediation loop against a repository
    Run {
        /// Repository to clone (HTTPS)
        #[arg(long, value_parser = non_blank)]
        repo_url: String,

        /// Team name
        #[arg(long, value_parser = branch_component)]
        team: String,

        /// Team leader name
        #[arg(long, value_parser = branch_component)]
        leader: String,

        /// Maximum test iterations (overrides loop.max_retry)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        max_retry: Option<u32>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the last persisted report
    Results {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP API
    Serve {
        /// Address to bind (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides server.port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Validate the configuration file
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "remedy=debug,info"
    } else {
        "remedy=info,warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let settings = match Settings::load(&cli.config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(e.exit_code());
        }
    };

    match cli.command {
        Commands::Run {
            repo_url,
            team,
            leader,
            max_retry,
            json,
        } => {
            let coordinator = Coordinator::from_settings(settings)?;
            let mut request = RunRequest::new(repo_url, team, leader);
            request.max_retry = max_retry;

            let result = coordinator.run(request).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_summary(&result);
            }

            if !result.passed() {
                std::process::exit(1);
            }
        }

        Commands::Results { json } => {
            let result = ReportStore::new(&settings.paths.results_path).load_last();
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_summary(&result);
            }
        }

        Commands::Serve { host, port } => {
            let mut server_config = settings.server.clone();
            if let Some(host) = host {
                server_config.host = host;
            }
            if let Some(port) = port {
                server_config.port = port;
            }

            let coordinator = Arc::new(Coordinator::from_settings(settings)?);
            println!(
                "{} Listening on http://{}:{}",
                "remedy".cyan().bold(),
                server_config.host,
                server_config.port
            );
            server::serve(&server_config, AppState::new(coordinator)).await?;
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", toml::to_string_pretty(&settings)?);
            }
            ConfigAction::Validate => {
                println!(
                    "{} Configuration is valid ({})",
                    "OK".green().bold(),
                    cli.config.display()
                );
            }
        },
    }

    Ok(())
}

fn print_summary(result: &RunResult) {
    let status = if result.passed() {
        result.final_status.to_string().green().bold()
    } else {
        result.final_status.to_string().red().bold()
    };

    println!("{}", "Remediation Report".cyan().bold());
    println!("{}", "─".repeat(40));
    if !result.repo_url.is_empty() {
        println!("Repository:     {}", result.repo_url);
        println!("Team / Leader:  {} / {}", result.team_name, result.leader_name);
    }
    println!("Branch:         {}", result.branch_name);
    println!("Status:         {}", status);
    if let Some(reason) = result.stop_reason {
        println!("Stop reason:    {}", reason);
    }
    if let Some(message) = &result.error_message {
        println!("Error:          {}", message.red());
    }
    println!("Failures:       {}", result.total_failures);
    println!(
        "Fixes applied:  {} ({} commit(s))",
        result.fixes_applied, result.commit_count
    );
    println!("Time:           {:.3}s", result.time_taken_seconds);
    println!(
        "Score:          {} (base {} + bonus {} - penalty {})",
        result.score.final_score.to_string().bold(),
        result.score.base,
        result.score.speed_bonus,
        result.score.penalty
    );

    if !result.fixes.is_empty() {
        println!();
        println!("{}", "Fixes".bold());
        for fix in &result.fixes {
            let mark = match fix.status {
                FixStatus::Fixed => "✓".green(),
                FixStatus::Failed => "✗".red(),
            };
            println!("  {} {}", mark, fix.commit_message);
        }
    }
}
