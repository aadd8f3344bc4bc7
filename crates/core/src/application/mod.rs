// Application Layer - Use Cases and Background Loops

pub mod aggregation;
pub mod broadcast;
pub mod constants;
pub mod publisher;
pub mod queue_service;
pub mod shutdown;

// Re-exports
pub use aggregation::AggregationCache;
pub use broadcast::{BroadcastHub, ChannelState, DeliveryReport, Subscription};
pub use publisher::{PublisherConfig, PublisherHandle, SummaryPublisher, TickOutcome};
pub use queue_service::{LeaveOutcome, QueueService};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
