use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::chain::{ChainReader, read_with_timeout};
use crate::events::{DeploymentEvent, decode_deployment_event};

/// One successfully scanned block range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedRange {
    pub from_block: u64,
    pub to_block: u64,
    pub events: Vec<DeploymentEvent>,
    /// Logs in the range that did not decode and were dropped.
    pub malformed: usize,
}

/// Blocks one request timeout is expected to cover.
pub const DEFAULT_BLOCKS_PER_REQUEST: u64 = 1_000;

/// Cap on how many times consecutive failures double the query budget.
const MAX_BUDGET_DOUBLINGS: u32 = 6;

/// Turns block-height signals into scanned ranges of deployment events.
///
/// The cursor is the last fully scanned height. It starts one below the first
/// height seen, so nothing before startup is ever scanned, and it only moves
/// after the whole range `[cursor + 1, height]` was fetched in one query. A
/// failed query leaves it in place and the next signal covers the widened range.
///
/// A query may be served as several sequential requests, so its time budget
/// is one request timeout per `blocks_per_request` blocks, doubled for every
/// consecutive failure.
pub struct EventIngestor {
    chain: Arc<dyn ChainReader>,
    cursor: Option<u64>,
    query_timeout: Duration,
    blocks_per_request: u64,
    consecutive_failures: u32,
}

impl EventIngestor {
    pub fn new(chain: Arc<dyn ChainReader>, query_timeout: Duration) -> Self {
        Self {
            chain,
            cursor: None,
            query_timeout,
            blocks_per_request: DEFAULT_BLOCKS_PER_REQUEST,
            consecutive_failures: 0,
        }
    }

    pub fn with_blocks_per_request(mut self, blocks: u64) -> Self {
        self.blocks_per_request = blocks.max(1);
        self
    }

    /// Time allowed for the query over `[from_block, to_block]`.
    pub fn query_budget(&self, from_block: u64, to_block: u64) -> Duration {
        let span = to_block.saturating_sub(from_block).saturating_add(1);
        let requests = span.div_ceil(self.blocks_per_request).max(1);
        let doublings = self.consecutive_failures.min(MAX_BUDGET_DOUBLINGS);
        self.query_timeout
            .saturating_mul(u32::try_from(requests).unwrap_or(u32::MAX))
            .saturating_mul(1 << doublings)
    }

    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    /// Returns `Ok(None)` when there is nothing new to scan.
    pub async fn on_new_height(&mut self, height: u64) -> Result<Option<ScannedRange>> {
        let cursor = *self.cursor.get_or_insert_with(|| {
            info!("First block signal at height {}, starting without backfill", height);
            height.saturating_sub(1)
        });

        let from_block = cursor + 1;
        if height < from_block {
            debug!("Height {} already scanned (cursor {}), skipping", height, cursor);
            return Ok(None);
        }

        let budget = self.query_budget(from_block, height);
        let logs = match read_with_timeout(budget, self.chain.deployment_logs(from_block, height))
            .await
        {
            Ok(logs) => logs,
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                warn!(
                    "Log query for blocks {} to {} failed, cursor stays at {}: {}",
                    from_block, height, cursor, e
                );
                return Err(e);
            }
        };

        self.cursor = Some(height);
        self.consecutive_failures = 0;

        let mut events = Vec::with_capacity(logs.len());
        let mut malformed = 0;
        for log in &logs {
            match decode_deployment_event(log, from_block, height) {
                Ok(event) => events.push(event),
                Err(e) => {
                    malformed += 1;
                    warn!("Failed to decode deployment event: {}", e);
                }
            }
        }

        info!(
            "Scanned blocks {} to {}: {} deployments, {} malformed logs",
            from_block,
            height,
            events.len(),
            malformed
        );

        Ok(Some(ScannedRange {
            from_block,
            to_block: height,
            events,
            malformed,
        }))
    }
}
