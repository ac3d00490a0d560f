use alloy_primitives::utils::format_units;
use alloy_primitives::{Address, U256};
use futures::stream::{self, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::chain::{ChainReader, read_with_timeout};
use crate::fanout::{AlertRecipient, DeliveryReport, NotificationFanout};

/// Used when a token's decimals cannot be read.
const FALLBACK_DECIMALS: u8 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    PoolLookupFailed,
    NoPool,
    PoolReadFailed,
    ReferenceNotInPool,
    ZeroReserve,
    SupplyUnavailable,
    Unpriceable,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::PoolLookupFailed => "pool lookup failed",
            SkipReason::NoPool => "no pool against the reference asset",
            SkipReason::PoolReadFailed => "pool read failed",
            SkipReason::ReferenceNotInPool => "reference asset in neither pool slot",
            SkipReason::ZeroReserve => "pool has a zero reserve",
            SkipReason::SupplyUnavailable => "total supply unavailable",
            SkipReason::Unpriceable => "values out of range",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenCheck {
    Alerted {
        market_cap_usd: f64,
        report: DeliveryReport,
    },
    BelowThreshold {
        market_cap_usd: f64,
    },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorReport {
    pub checks: Vec<(Address, TokenCheck)>,
}

impl MonitorReport {
    pub fn check_for(&self, token: Address) -> Option<&TokenCheck> {
        self.checks
            .iter()
            .find(|(checked, _)| *checked == token)
            .map(|(_, check)| check)
    }

    pub fn alerts_delivered(&self) -> usize {
        self.checks
            .iter()
            .map(|(_, check)| match check {
                TokenCheck::Alerted { report, .. } => report.delivered(),
                _ => 0,
            })
            .sum()
    }

    pub fn skipped(&self) -> usize {
        self.checks
            .iter()
            .filter(|(_, check)| matches!(check, TokenCheck::Skipped(_)))
            .count()
    }
}

pub struct MonitorSettings {
    pub reference_asset: Address,
    pub interval: Duration,
    pub max_in_flight: usize,
    pub read_timeout: Duration,
}

/// Recomputes market caps for every watched token and alerts subscribers at
/// or above their threshold.
///
/// Price is the pool's reference reserve over its token reserve, with the
/// reference asset taken as exactly 1 USD. There is no cooldown: a token that
/// stays above a threshold alerts that subscriber on every check.
pub struct MarketCapMonitor {
    chain: Arc<dyn ChainReader>,
    fanout: Arc<NotificationFanout>,
    settings: MonitorSettings,
    last_check: Option<Instant>,
}

impl MarketCapMonitor {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        fanout: Arc<NotificationFanout>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            chain,
            fanout,
            settings,
            last_check: None,
        }
    }

    /// Runs a check unless one already ran within the interval.
    pub async fn tick(&mut self) -> Option<MonitorReport> {
        self.tick_at(Instant::now()).await
    }

    /// Like [`tick`](Self::tick), with `now` taken as the time of the tick.
    /// Driven by a ticker, `now` is its scheduled instant so a late wakeup
    /// does not push the next cycle out of the interval.
    pub async fn tick_at(&mut self, now: Instant) -> Option<MonitorReport> {
        if let Some(last) = self.last_check {
            if now.duration_since(last) < self.settings.interval {
                debug!("Market cap check skipped, last run {:?} ago", now - last);
                return None;
            }
        }
        self.last_check = Some(now);
        Some(self.check_all().await)
    }

    pub async fn check_all(&self) -> MonitorReport {
        let tokens = self.fanout.alerts().watched_tokens();
        let started = Instant::now();

        let checks: Vec<(Address, TokenCheck)> = stream::iter(tokens)
            .map(|token| async move { (token, self.check_token(token).await) })
            .buffer_unordered(self.settings.max_in_flight.max(1))
            .collect()
            .await;

        let report = MonitorReport { checks };
        info!(
            "Market cap check over {} tokens in {:?}: {} alerts delivered, {} skipped",
            report.checks.len(),
            started.elapsed(),
            report.alerts_delivered(),
            report.skipped()
        );
        report
    }

    async fn check_token(&self, token: Address) -> TokenCheck {
        let market_cap_usd = match self.market_cap(token).await {
            Ok(market_cap) => market_cap,
            Err(reason) => {
                debug!("Skipping token {:?} this cycle: {}", token, reason);
                return TokenCheck::Skipped(reason);
            }
        };

        let recipients = self.recipients(token, market_cap_usd);
        if recipients.is_empty() {
            return TokenCheck::BelowThreshold { market_cap_usd };
        }

        info!(
            "Token {:?} market cap ${:.2} crossed {} threshold(s)",
            token,
            market_cap_usd,
            recipients.len()
        );
        let report = self.fanout.alert(token, market_cap_usd, &recipients).await;
        TokenCheck::Alerted {
            market_cap_usd,
            report,
        }
    }

    fn recipients(&self, token: Address, market_cap_usd: f64) -> Vec<AlertRecipient> {
        let subscribers = self.fanout.subscribers();
        self.fanout
            .alerts()
            .subscribers_of(token)
            .into_iter()
            .filter_map(|id| {
                let prefs = subscribers.preferences(id)?;
                let threshold_usd = prefs.market_cap_threshold?;
                (market_cap_usd >= threshold_usd as f64).then_some(AlertRecipient {
                    id,
                    language: prefs.language,
                    threshold_usd,
                })
            })
            .collect()
    }

    async fn market_cap(&self, token: Address) -> Result<f64, SkipReason> {
        let limit = self.settings.read_timeout;
        let (supply, decimals, price) = tokio::join!(
            read_with_timeout(limit, self.chain.total_supply(token)),
            read_with_timeout(limit, self.chain.decimals(token)),
            self.price(token),
        );

        let price = price?;
        let supply = supply.map_err(|e| {
            warn!("Failed to fetch total supply for token {:?}: {}", token, e);
            SkipReason::SupplyUnavailable
        })?;
        let decimals = decimals.unwrap_or_else(|e| {
            warn!(
                "Failed to fetch decimals for token {:?}, assuming {}: {}",
                token, FALLBACK_DECIMALS, e
            );
            FALLBACK_DECIMALS
        });

        let supply = to_f64(supply, decimals).ok_or(SkipReason::Unpriceable)?;
        Ok(supply * price)
    }

    async fn price(&self, token: Address) -> Result<f64, SkipReason> {
        let limit = self.settings.read_timeout;
        let pool = read_with_timeout(
            limit,
            self.chain.pool_for(token, self.settings.reference_asset),
        )
        .await
        .map_err(|e| {
            warn!("Failed to look up pool for token {:?}: {}", token, e);
            SkipReason::PoolLookupFailed
        })?
        .ok_or(SkipReason::NoPool)?;

        let (slots, reserves) = tokio::join!(
            read_with_timeout(limit, self.chain.pool_tokens(pool)),
            read_with_timeout(limit, self.chain.pool_reserves(pool)),
        );
        let ((token0, token1), (reserve0, reserve1)) =
            slots.and_then(|slots| reserves.map(|reserves| (slots, reserves))).map_err(|e| {
                warn!("Failed to read pool {:?} for token {:?}: {}", pool, token, e);
                SkipReason::PoolReadFailed
            })?;

        pool_price(
            self.settings.reference_asset,
            (token0, token1),
            (reserve0, reserve1),
        )
    }
}

/// Reference asset per token, from a pool's two slots and reserves. Address
/// equality compares raw bytes, so checksum casing never matters.
pub fn pool_price(
    reference_asset: Address,
    (token0, token1): (Address, Address),
    (reserve0, reserve1): (U256, U256),
) -> Result<f64, SkipReason> {
    let (reference_reserve, token_reserve) = if token0 == reference_asset {
        (reserve0, reserve1)
    } else if token1 == reference_asset {
        (reserve1, reserve0)
    } else {
        return Err(SkipReason::ReferenceNotInPool);
    };

    if reference_reserve.is_zero() || token_reserve.is_zero() {
        return Err(SkipReason::ZeroReserve);
    }

    let reference_reserve = to_f64(reference_reserve, 0).ok_or(SkipReason::Unpriceable)?;
    let token_reserve = to_f64(token_reserve, 0).ok_or(SkipReason::Unpriceable)?;
    Ok(reference_reserve / token_reserve)
}

fn to_f64(value: U256, decimals: u8) -> Option<f64> {
    format_units(value, decimals).ok()?.parse().ok()
}
