use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::chain::ChainReader;

/// Polls the chain head and forwards each newly observed height. Stops when
/// the receiving side is gone.
pub async fn run_block_feed(
    chain: Arc<dyn ChainReader>,
    poll_interval: Duration,
    heights: mpsc::Sender<u64>,
) {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_sent = None;

    loop {
        ticker.tick().await;

        let height = match chain.latest_block().await {
            Ok(height) => height,
            Err(e) => {
                warn!("Failed to poll latest block: {}", e);
                continue;
            }
        };

        if last_sent == Some(height) {
            continue;
        }

        debug!("New head {}", height);
        if heights.send(height).await.is_err() {
            info!("Block height receiver closed, stopping feed");
            return;
        }
        last_sent = Some(height);
    }
}
