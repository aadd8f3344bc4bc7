//! Callq SDK - Rust Client Library
//!
//! Client for the callq HTTP API and its live summary feed.
//!
//! # Example
//!
//! ```no_run
//! use callq_sdk::{QueueClient, SummaryEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = QueueClient::new("http://127.0.0.1:8000")?;
//!
//!     let joined = client.join("555-1111", "Sales").await?;
//!     println!("Position in Sales: {}", joined.position);
//!
//!     let mut feed = client.watch_summary().await?;
//!     while let Some(event) = feed.next_event().await {
//!         match event? {
//!             SummaryEvent::Counts(counts) => println!("{:?}", counts),
//!             SummaryEvent::Error { error } => eprintln!("tick failed: {}", error),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod sse;
mod types;

pub use client::{QueueClient, SummaryStream};
pub use error::{Result, SdkError};
pub use types::{HealthResponse, JoinResponse, PositionResponse, Summary, SummaryEvent};
