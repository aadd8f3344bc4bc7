//! Load generator: N simulated callers joining and leaving random queues

use anyhow::{bail, Result};
use callq_sdk::QueueClient;
use colored::Colorize;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tabled::{Table, Tabled};
use tokio::sync::Mutex;

const MIN_PAUSE_MS: u64 = 100;
const MAX_PAUSE_MS: u64 = 500;

pub struct StressConfig {
    pub queues: Vec<String>,
    pub callers: usize,
    pub duration: Duration,
    pub add_chance: f64,
}

#[derive(Default)]
struct Counters {
    joined: AtomicU64,
    join_failed: AtomicU64,
    left: AtomicU64,
    leave_failed: AtomicU64,
    idle: AtomicU64,
}

#[derive(Tabled)]
struct OutcomeRow {
    outcome: &'static str,
    count: u64,
}

/// Callers this run has put into each queue, oldest first
type ActiveCallers = Arc<Mutex<HashMap<String, VecDeque<String>>>>;

pub async fn run(client: QueueClient, config: StressConfig) -> Result<()> {
    if config.queues.is_empty() {
        bail!("At least one queue is required");
    }
    if !(0.0..=1.0).contains(&config.add_chance) {
        bail!("--add-chance must be between 0 and 1");
    }

    println!(
        "{}",
        format!(
            "--- Stress test: {} callers for {}s ---",
            config.callers,
            config.duration.as_secs()
        )
        .cyan()
        .bold()
    );
    println!("  {} {}", "Target:".bold(), client.base_url());
    println!("  {} {}", "Queues:".bold(), config.queues.join(", "));

    let counters = Arc::new(Counters::default());
    let active: ActiveCallers = Arc::new(Mutex::new(HashMap::new()));
    let queues = Arc::new(config.queues);

    let workers: Vec<_> = (0..config.callers)
        .map(|_| {
            tokio::spawn(simulate_caller(
                client.clone(),
                Arc::clone(&queues),
                config.add_chance,
                Arc::clone(&active),
                Arc::clone(&counters),
            ))
        })
        .collect();

    tokio::select! {
        _ = tokio::time::sleep(config.duration) => {}
        _ = tokio::signal::ctrl_c() => println!("\n[*] Simulation stopped by user."),
    }

    for worker in &workers {
        worker.abort();
    }
    for worker in workers {
        let _ = worker.await;
    }

    let rows = vec![
        OutcomeRow {
            outcome: "joined",
            count: counters.joined.load(Ordering::Relaxed),
        },
        OutcomeRow {
            outcome: "join failed",
            count: counters.join_failed.load(Ordering::Relaxed),
        },
        OutcomeRow {
            outcome: "left",
            count: counters.left.load(Ordering::Relaxed),
        },
        OutcomeRow {
            outcome: "leave failed",
            count: counters.leave_failed.load(Ordering::Relaxed),
        },
        OutcomeRow {
            outcome: "nothing to remove",
            count: counters.idle.load(Ordering::Relaxed),
        },
    ];

    println!();
    println!("{}", "--- Stress test finished ---".cyan().bold());
    println!("{}", Table::new(rows));
    Ok(())
}

async fn simulate_caller(
    client: QueueClient,
    queues: Arc<Vec<String>>,
    add_chance: f64,
    active: ActiveCallers,
    counters: Arc<Counters>,
) {
    let mut rng = StdRng::from_entropy();

    loop {
        let queue = &queues[rng.gen_range(0..queues.len())];

        if rng.gen_bool(add_chance) {
            let phone = format!(
                "555-{}-{}",
                rng.gen_range(1000..=9999),
                rng.gen_range(1000..=9999)
            );
            match client.join(&phone, queue).await {
                Ok(joined) => {
                    println!(
                        "{} {} joined {} at #{}",
                        "[+]".green(),
                        phone,
                        queue,
                        joined.position
                    );
                    active
                        .lock()
                        .await
                        .entry(queue.clone())
                        .or_default()
                        .push_back(phone);
                    counters.joined.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    println!("{} join failed: {}", "[!]".red(), e);
                    counters.join_failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        } else {
            let next = active
                .lock()
                .await
                .get_mut(queue)
                .and_then(|callers| callers.pop_front());

            match next {
                Some(phone) => match client.leave(&phone, queue).await {
                    Ok(()) => {
                        println!("{} {} left {}", "[-]".yellow(), phone, queue);
                        counters.left.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        println!("{} leave failed: {}", "[!]".red(), e);
                        counters.leave_failed.fetch_add(1, Ordering::Relaxed);
                    }
                },
                None => {
                    counters.idle.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        let pause = rng.gen_range(MIN_PAUSE_MS..=MAX_PAUSE_MS);
        tokio::time::sleep(Duration::from_millis(pause)).await;
    }
}
