//! Callq CLI - Command-line interface for the callq queue position service

mod stress;

use anyhow::{Context, Result};
use callq_sdk::{QueueClient, SdkError, SummaryEvent};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::time::Duration;
use tabled::{Table, Tabled};

const DEFAULT_URL: &str = "http://127.0.0.1:8000";

#[derive(Parser)]
#[command(name = "callq-cli")]
#[command(about = "Callq queue position service CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Service base URL
    #[arg(long, env = "CALLQ_URL", default_value = DEFAULT_URL)]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Put a caller at the back of a queue
    Join {
        phone_number: String,
        queue_name: String,
    },

    /// Remove a caller from a queue
    Leave {
        phone_number: String,
        queue_name: String,
    },

    /// Show a caller's current position
    Position {
        phone_number: String,
        queue_name: String,
    },

    /// Show the latest per-queue caller counts
    Summary,

    /// Follow the live summary feed until Ctrl+C
    Watch {
        /// Seconds to wait before reconnecting after the stream drops
        #[arg(long, default_value = "3")]
        reconnect_secs: u64,
    },

    /// Simulate concurrent callers joining and leaving queues
    Stress {
        /// Queues to spread callers over
        #[arg(
            short,
            long,
            value_delimiter = ',',
            default_value = "Sales_HighVolume,Support_Tier1,Billing_Inquiries"
        )]
        queues: Vec<String>,

        /// Simulated callers acting at once
        #[arg(short, long, default_value = "15")]
        callers: usize,

        /// Test duration in seconds
        #[arg(short, long, default_value = "120")]
        duration_secs: u64,

        /// Probability that an action is a join (otherwise a leave)
        #[arg(long, default_value = "0.7")]
        add_chance: f64,
    },
}

#[derive(Tabled)]
struct SummaryRow {
    queue: String,
    callers: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = QueueClient::new(&cli.url)?;

    match cli.command {
        Commands::Join {
            phone_number,
            queue_name,
        } => match client.join(&phone_number, &queue_name).await {
            Ok(joined) => println!(
                "{}",
                format!(
                    "✓ {} joined {} at position {}",
                    phone_number, queue_name, joined.position
                )
                .green()
                .bold()
            ),
            Err(e) => report_failure(e)?,
        },

        Commands::Leave {
            phone_number,
            queue_name,
        } => match client.leave(&phone_number, &queue_name).await {
            Ok(()) => println!(
                "{}",
                format!("✓ {} left {}", phone_number, queue_name)
                    .green()
                    .bold()
            ),
            Err(e) => report_failure(e)?,
        },

        Commands::Position {
            phone_number,
            queue_name,
        } => match client.position(&phone_number, &queue_name).await? {
            Some(position) => println!(
                "  {} {} is #{} in {}",
                "•".bold(),
                phone_number,
                position.to_string().cyan().bold(),
                queue_name
            ),
            None => println!(
                "{}",
                format!("{} is not in {}", phone_number, queue_name).yellow()
            ),
        },

        Commands::Summary => {
            let summary = client
                .summary()
                .await
                .context("Failed to fetch summary")?;

            if summary.is_empty() {
                println!("{}", "No callers waiting".yellow());
            } else {
                let rows: Vec<SummaryRow> = summary
                    .into_iter()
                    .map(|(queue, callers)| SummaryRow { queue, callers })
                    .collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Watch { reconnect_secs } => {
            tokio::select! {
                _ = watch(&client, Duration::from_secs(reconnect_secs)) => {}
                _ = tokio::signal::ctrl_c() => println!(),
            }
        }

        Commands::Stress {
            queues,
            callers,
            duration_secs,
            add_chance,
        } => {
            let config = stress::StressConfig {
                queues,
                callers,
                duration: Duration::from_secs(duration_secs),
                add_chance,
            };
            stress::run(client, config).await?;
        }
    }

    Ok(())
}

/// Client errors (409/404/400) are printed; anything else aborts the CLI
fn report_failure(err: SdkError) -> Result<()> {
    match err {
        SdkError::Api {
            status, message, ..
        } if status < 500 => {
            println!("{} {}", "✗".red(), message);
            Ok(())
        }
        other => Err(other.into()),
    }
}

async fn watch(client: &QueueClient, reconnect: Duration) {
    loop {
        println!("{}", "Connecting...".cyan());

        match client.watch_summary().await {
            Ok(mut feed) => {
                println!("{}", "Connected".green().bold());
                while let Some(event) = feed.next_event().await {
                    match event {
                        Ok(SummaryEvent::Counts(counts)) => {
                            let line = counts
                                .iter()
                                .map(|(queue, count)| format!("{}={}", queue, count))
                                .collect::<Vec<_>>()
                                .join("  ");
                            if line.is_empty() {
                                println!("  {}", "(no callers)".dimmed());
                            } else {
                                println!("  {}", line);
                            }
                        }
                        Ok(SummaryEvent::Error { error }) => {
                            println!("  {} {}", "aggregation error:".red(), error);
                        }
                        Err(e) => {
                            println!("  {} {}", "stream error:".red(), e);
                            break;
                        }
                    }
                }
                println!("{}", "Disconnected".yellow());
            }
            Err(e) => println!("{} {}", "Error:".red().bold(), e),
        }

        tokio::time::sleep(reconnect).await;
    }
}
