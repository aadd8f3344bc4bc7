// Summary Publisher - periodic aggregation + broadcast loop

use crate::application::aggregation::AggregationCache;
use crate::application::broadcast::{BroadcastHub, DeliveryReport};
use crate::application::constants::{
    DEFAULT_TICK_INTERVAL, MIN_TICK_INTERVAL, PUBLISHER_STOP_TIMEOUT,
};
use crate::application::shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
use crate::domain::{AggregationSnapshot, SummaryMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub tick_interval: Duration,
    /// Skip pushes whose snapshot equals the last one pushed
    pub only_on_change: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            only_on_change: false,
        }
    }
}

/// What one tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Published(DeliveryReport),
    Unchanged,
    /// Store read failed; the error indicator was pushed instead
    Failed(DeliveryReport),
}

/// Owns the tick loop: refresh the cache, push the result to the hub.
pub struct SummaryPublisher {
    cache: Arc<AggregationCache>,
    hub: BroadcastHub,
    config: PublisherConfig,
    last_pushed: Option<AggregationSnapshot>,
}

impl SummaryPublisher {
    pub fn new(
        cache: Arc<AggregationCache>,
        hub: BroadcastHub,
        mut config: PublisherConfig,
    ) -> Self {
        if config.tick_interval < MIN_TICK_INTERVAL {
            warn!(
                requested_ms = config.tick_interval.as_millis() as u64,
                floor_ms = MIN_TICK_INTERVAL.as_millis() as u64,
                "Tick interval too small, clamping"
            );
            config.tick_interval = MIN_TICK_INTERVAL;
        }

        Self {
            cache,
            hub,
            config,
            last_pushed: None,
        }
    }

    /// Spawn the loop; the returned handle stops it
    pub fn start(self) -> PublisherHandle {
        let (shutdown, token) = shutdown_channel();
        let task = tokio::spawn(self.run(token));
        PublisherHandle { shutdown, task }
    }

    /// Tick until shutdown. A failed tick is logged and never ends the loop.
    pub async fn run(mut self, mut shutdown: ShutdownToken) {
        info!(
            tick_ms = self.config.tick_interval.as_millis() as u64,
            only_on_change = self.config.only_on_change,
            tracked_queues = self.cache.tracked_queues().len(),
            "Summary publisher started"
        );

        let mut tick = interval(self.config.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = shutdown.wait() => break,
            }

            self.tick_once().await;
        }

        info!("Summary publisher stopped");
    }

    /// Run a single refresh + broadcast cycle
    pub async fn tick_once(&mut self) -> TickOutcome {
        match self.cache.refresh().await {
            Ok(snapshot) => {
                if self.config.only_on_change && self.last_pushed.as_ref() == Some(&snapshot) {
                    return TickOutcome::Unchanged;
                }

                let report = self.hub.publish(&SummaryMessage::Snapshot(snapshot.clone()));
                debug!(
                    queues = snapshot.len(),
                    callers = snapshot.total(),
                    delivered = report.delivered,
                    skipped = report.skipped,
                    closed = report.closed,
                    "Summary pushed"
                );
                self.last_pushed = Some(snapshot);
                TickOutcome::Published(report)
            }
            Err(e) => {
                warn!(error = %e, "Aggregation tick failed, pushing error indicator");
                // Force the next good snapshot out even if unchanged
                self.last_pushed = None;
                let report = self.hub.publish(&SummaryMessage::Error {
                    error: e.to_string(),
                });
                TickOutcome::Failed(report)
            }
        }
    }
}

/// Running publisher
pub struct PublisherHandle {
    shutdown: ShutdownSender,
    task: JoinHandle<()>,
}

impl PublisherHandle {
    /// Request stop and wait for the loop to exit
    pub async fn stop(self) {
        self.shutdown.shutdown();
        match tokio::time::timeout(PUBLISHER_STOP_TIMEOUT, self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Summary publisher task failed"),
            Err(_) => warn!("Summary publisher did not stop in time"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::QueueService;
    use crate::domain::{PhoneNumber, QueueName};
    use crate::port::queue_repository::mocks::InMemoryQueueRepository;
    use futures::StreamExt;

    struct Fixture {
        service: QueueService,
        repo: InMemoryQueueRepository,
        hub: BroadcastHub,
        cache: Arc<AggregationCache>,
    }

    fn fixture() -> Fixture {
        let repo = InMemoryQueueRepository::new();
        let service = QueueService::new(Arc::new(repo.clone()), Arc::new(repo.clone()));
        let cache = Arc::new(AggregationCache::new(Arc::new(repo.clone()), vec![]));
        Fixture {
            service,
            repo,
            hub: BroadcastHub::new(8),
            cache,
        }
    }

    async fn join(service: &QueueService, phone: &str, queue: &str) {
        service
            .join(
                &PhoneNumber::parse(phone).unwrap(),
                &QueueName::parse(queue).unwrap(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_snapshot_follows_joins_and_leaves() {
        let f = fixture();
        let mut publisher =
            SummaryPublisher::new(f.cache.clone(), f.hub.clone(), PublisherConfig::default());
        let mut sub = f.hub.subscribe();
        assert!(futures::poll!(sub.next()).is_pending());

        for phone in ["1", "2", "3"] {
            join(&f.service, phone, "Sales").await;
        }
        join(&f.service, "4", "Support").await;

        publisher.tick_once().await;
        let expected: AggregationSnapshot = [("Sales".to_string(), 3), ("Support".to_string(), 1)]
            .into_iter()
            .collect();
        assert_eq!(sub.next().await, Some(SummaryMessage::Snapshot(expected)));

        f.service
            .leave(
                &PhoneNumber::parse("2").unwrap(),
                &QueueName::parse("Sales").unwrap(),
            )
            .await
            .unwrap();

        publisher.tick_once().await;
        let expected: AggregationSnapshot = [("Sales".to_string(), 2), ("Support".to_string(), 1)]
            .into_iter()
            .collect();
        assert_eq!(sub.next().await, Some(SummaryMessage::Snapshot(expected)));
    }

    #[tokio::test]
    async fn test_failed_tick_pushes_error_and_recovers() {
        let f = fixture();
        let mut publisher =
            SummaryPublisher::new(f.cache.clone(), f.hub.clone(), PublisherConfig::default());
        let mut sub = f.hub.subscribe();
        assert!(futures::poll!(sub.next()).is_pending());

        f.repo.set_fail_reads(true);
        assert!(matches!(publisher.tick_once().await, TickOutcome::Failed(_)));
        assert!(sub.next().await.unwrap().is_error());
        assert_eq!(sub.state(), crate::application::ChannelState::Open);

        f.repo.set_fail_reads(false);
        assert!(matches!(publisher.tick_once().await, TickOutcome::Published(_)));
        assert_eq!(
            sub.next().await,
            Some(SummaryMessage::Snapshot(AggregationSnapshot::new()))
        );
    }

    #[tokio::test]
    async fn test_only_on_change_skips_identical_snapshots() {
        let f = fixture();
        let config = PublisherConfig {
            only_on_change: true,
            ..Default::default()
        };
        let mut publisher = SummaryPublisher::new(f.cache.clone(), f.hub.clone(), config);

        join(&f.service, "1", "Sales").await;
        assert!(matches!(publisher.tick_once().await, TickOutcome::Published(_)));
        assert_eq!(publisher.tick_once().await, TickOutcome::Unchanged);

        join(&f.service, "2", "Sales").await;
        assert!(matches!(publisher.tick_once().await, TickOutcome::Published(_)));
    }

    #[tokio::test]
    async fn test_disconnect_does_not_stall_others() {
        let f = fixture();
        let mut publisher =
            SummaryPublisher::new(f.cache.clone(), f.hub.clone(), PublisherConfig::default());
        let mut stay = f.hub.subscribe();
        let mut leave = f.hub.subscribe();
        assert!(futures::poll!(stay.next()).is_pending());
        assert!(futures::poll!(leave.next()).is_pending());

        publisher.tick_once().await;
        drop(leave);

        join(&f.service, "1", "Sales").await;
        match publisher.tick_once().await {
            TickOutcome::Published(report) => assert_eq!(report.delivered, 1),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(stay.next().await.is_some());
        let expected: AggregationSnapshot = [("Sales".to_string(), 1)].into_iter().collect();
        assert_eq!(stay.next().await, Some(SummaryMessage::Snapshot(expected)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_started_loop_ticks_and_stops() {
        let f = fixture();
        let config = PublisherConfig {
            tick_interval: Duration::from_millis(200),
            only_on_change: false,
        };
        let handle = SummaryPublisher::new(f.cache.clone(), f.hub.clone(), config).start();
        let mut sub = f.hub.subscribe();
        assert!(futures::poll!(sub.next()).is_pending());

        tokio::time::sleep(Duration::from_millis(450)).await;
        assert!(sub.next().await.is_some());
        assert!(f.cache.latest().await.is_some());

        handle.stop().await;
    }
}
