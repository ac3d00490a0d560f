use alloy_primitives::Address;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::dedup::Deduplicator;
use crate::fanout::{DeliveryReport, NotificationFanout};
use crate::ingestor::EventIngestor;
use crate::metadata::MetadataEnricher;
use crate::monitor::{MarketCapMonitor, MonitorReport};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockReport {
    /// The range scanned, if the signal led to a successful scan.
    pub range: Option<(u64, u64)>,
    pub fetch_failed: bool,
    pub malformed: usize,
    pub duplicates: usize,
    pub announced: Vec<(Address, DeliveryReport)>,
}

/// Single logical worker. Block signals and market-cap ticks are handled one
/// at a time, each to completion, so the cursor, the dedup set and the
/// monitor's throttle are only ever touched from here.
pub struct Pipeline {
    ingestor: EventIngestor,
    dedup: Deduplicator,
    enricher: MetadataEnricher,
    fanout: Arc<NotificationFanout>,
    monitor: MarketCapMonitor,
}

impl Pipeline {
    pub fn new(
        ingestor: EventIngestor,
        enricher: MetadataEnricher,
        fanout: Arc<NotificationFanout>,
        monitor: MarketCapMonitor,
    ) -> Self {
        Self {
            ingestor,
            dedup: Deduplicator::new(),
            enricher,
            fanout,
            monitor,
        }
    }

    pub fn dedup(&self) -> &Deduplicator {
        &self.dedup
    }

    pub fn cursor(&self) -> Option<u64> {
        self.ingestor.cursor()
    }

    pub async fn handle_block(&mut self, height: u64) -> BlockReport {
        let start = Instant::now();
        let mut report = BlockReport::default();

        let range = match self.ingestor.on_new_height(height).await {
            Ok(Some(range)) => range,
            Ok(None) => return report,
            Err(_) => {
                report.fetch_failed = true;
                return report;
            }
        };
        report.range = Some((range.from_block, range.to_block));
        report.malformed = range.malformed;

        // Log order; the key is recorded before any delivery is attempted.
        for event in range.events {
            if !self.dedup.record(event.dedup_key()) {
                debug!(
                    "Skipping already seen deployment {:?} ({})",
                    event.token, event.dev_buy
                );
                report.duplicates += 1;
                continue;
            }

            let metadata = self.enricher.enrich(event.token).await;
            let delivery = self.fanout.announce(&event, &metadata).await;
            report.announced.push((event.token, delivery));
        }

        if !report.announced.is_empty() || report.duplicates > 0 {
            info!(
                "Processed blocks {} to {} in {:?}: {} announced, {} duplicates",
                range.from_block,
                range.to_block,
                start.elapsed(),
                report.announced.len(),
                report.duplicates
            );
        }
        report
    }

    /// `scheduled` is the instant the ticker fired for, not when it was polled.
    pub async fn handle_timer(&mut self, scheduled: Instant) -> Option<MonitorReport> {
        self.monitor.tick_at(scheduled).await
    }

    /// Runs until `shutdown` resolves or the height feed closes. In-flight work
    /// is not drained beyond the handler already running.
    pub async fn run(
        mut self,
        mut heights: mpsc::Receiver<u64>,
        market_cap_interval: Duration,
        shutdown: impl Future<Output = ()>,
    ) {
        let mut ticker = interval(market_cap_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping pipeline");
                    break;
                }
                height = heights.recv() => match height {
                    Some(height) => {
                        let report = self.handle_block(height).await;
                        if report.fetch_failed {
                            warn!("Block {} not scanned yet, will retry on next signal", height);
                        }
                    }
                    None => {
                        info!("Block feed closed, stopping pipeline");
                        break;
                    }
                },
                scheduled = ticker.tick() => {
                    self.handle_timer(scheduled).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainReader, TextField};
    use crate::fanout::DeliveryOutcome;
    use crate::monitor::MonitorSettings;
    use crate::registry::{AlertRegistry, SubscriberId, SubscriberRegistry};
    use crate::test_utils::{FakeChain, RecordingNotifier, deployment_log};
    use alloy_primitives::{U256, address};

    const TOKEN: Address = address!("0x00000000000000000000000000000000000000aa");
    const REFERENCE: Address = address!("0x000000000000000000000000000000000000eeee");

    fn pipeline(chain: &Arc<FakeChain>, notifier: &Arc<RecordingNotifier>) -> Pipeline {
        let reader: Arc<dyn ChainReader> = chain.clone();
        let fanout = Arc::new(NotificationFanout::new(
            SubscriberRegistry::new(),
            AlertRegistry::new(),
            notifier.clone(),
            Duration::from_secs(5),
        ));
        Pipeline::new(
            EventIngestor::new(reader.clone(), Duration::from_secs(5)),
            MetadataEnricher::new(reader.clone(), Duration::from_secs(5)),
            fanout.clone(),
            MarketCapMonitor::new(
                reader,
                fanout,
                MonitorSettings {
                    reference_asset: REFERENCE,
                    interval: Duration::from_secs(300),
                    max_in_flight: 4,
                    read_timeout: Duration::from_secs(5),
                },
            ),
        )
    }

    #[tokio::test]
    async fn overlapping_ranges_never_redeliver() {
        let chain = Arc::new(FakeChain::new().with_full_metadata(TOKEN));
        let notifier = Arc::new(RecordingNotifier::new());
        let mut pipeline = pipeline(&chain, &notifier);
        pipeline.fanout.subscribers().opt_in(SubscriberId(1));

        let log = deployment_log(TOKEN, U256::from(42u64), 100);
        chain.push_logs(Ok(vec![log.clone()]));
        chain.push_logs(Ok(vec![log]));

        let first = pipeline.handle_block(100).await;
        let second = pipeline.handle_block(101).await;

        assert_eq!(first.announced.len(), 1);
        assert_eq!(second.announced.len(), 0);
        assert_eq!(second.duplicates, 1);
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn failed_delivery_is_not_retried() {
        let chain = Arc::new(FakeChain::new());
        let notifier = Arc::new(RecordingNotifier::new().failing_for(SubscriberId(1)));
        let mut pipeline = pipeline(&chain, &notifier);
        pipeline.fanout.subscribers().opt_in(SubscriberId(1));

        let log = deployment_log(TOKEN, U256::from(42u64), 100);
        chain.push_logs(Ok(vec![log.clone()]));
        chain.push_logs(Ok(vec![log]));

        let first = pipeline.handle_block(100).await;
        let (_, delivery) = &first.announced[0];
        assert!(matches!(
            delivery.outcome_for(SubscriberId(1)),
            Some(DeliveryOutcome::Failed(_))
        ));

        let second = pipeline.handle_block(101).await;
        assert_eq!(second.duplicates, 1);
        assert_eq!(pipeline.cursor(), Some(101));
    }

    #[tokio::test]
    async fn fetch_failure_keeps_cursor_and_dedup_set() {
        let chain = Arc::new(FakeChain::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let mut pipeline = pipeline(&chain, &notifier);

        chain.push_logs(Ok(vec![deployment_log(TOKEN, U256::from(1u64), 100)]));
        pipeline.handle_block(100).await;

        chain.push_logs(Err("timeout"));
        let report = pipeline.handle_block(105).await;

        assert!(report.fetch_failed);
        assert_eq!(pipeline.cursor(), Some(100));
        assert_eq!(pipeline.dedup().len(), 1);
    }

    #[tokio::test]
    async fn partial_metadata_still_announces() {
        let chain = Arc::new(
            FakeChain::new()
                .with_full_metadata(TOKEN)
                .failing_text(TOKEN, TextField::Twitter),
        );
        let notifier = Arc::new(RecordingNotifier::new());
        let mut pipeline = pipeline(&chain, &notifier);
        pipeline.fanout.subscribers().opt_in(SubscriberId(1));
        chain.push_logs(Ok(vec![deployment_log(TOKEN, U256::from(1u64), 100)]));

        pipeline.handle_block(100).await;

        let sent = notifier.sent();
        assert!(sent[0].1.contains("Symbol: PEPE"));
        assert!(sent[0].1.contains("Website: https://pepe.example"));
        assert!(sent[0].1.contains("Twitter: unset"));
    }

    #[tokio::test(start_paused = true)]
    async fn run_checks_market_caps_every_interval() {
        let chain = Arc::new(FakeChain::new().with_supply(TOKEN, U256::from(1u64)));
        let notifier = Arc::new(RecordingNotifier::new());
        let pipeline = pipeline(&chain, &notifier);
        pipeline.fanout.alerts().enroll(TOKEN, SubscriberId(1));
        let (_tx, rx) = mpsc::channel(4);

        let every = Duration::from_secs(300);
        pipeline
            .run(rx, every, tokio::time::sleep(every * 2 + Duration::from_secs(1)))
            .await;

        // Ticks at 0, 300s and 600s.
        assert_eq!(chain.supply_reads(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_when_feed_closes() {
        let chain = Arc::new(FakeChain::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let pipeline = pipeline(&chain, &notifier);
        let (tx, rx) = mpsc::channel(4);

        tx.send(100).await.unwrap();
        tx.send(101).await.unwrap();
        drop(tx);

        pipeline
            .run(rx, Duration::from_secs(300), std::future::pending())
            .await;

        assert_eq!(chain.log_queries(), vec![(100, 100), (101, 101)]);
    }
}
