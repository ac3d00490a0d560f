use alloy_primitives::Address;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::events::DeploymentEvent;
use crate::messages::{render_deployment, render_market_cap_alert};
use crate::metadata::TokenMetadata;
use crate::registry::{AlertRegistry, Language, SubscriberId, SubscriberRegistry};

/// Outbound channel to one subscriber. Failures are reported, never retried.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: SubscriberId, text: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Skipped by the subscriber's media-link filter.
    Filtered,
    Failed(String),
    TimedOut,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub outcomes: Vec<(SubscriberId, DeliveryOutcome)>,
}

impl DeliveryReport {
    pub fn delivered(&self) -> usize {
        self.count(|outcome| matches!(outcome, DeliveryOutcome::Delivered))
    }

    pub fn filtered(&self) -> usize {
        self.count(|outcome| matches!(outcome, DeliveryOutcome::Filtered))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| {
            matches!(
                outcome,
                DeliveryOutcome::Failed(_) | DeliveryOutcome::TimedOut
            )
        })
    }

    pub fn outcome_for(&self, id: SubscriberId) -> Option<&DeliveryOutcome> {
        self.outcomes
            .iter()
            .find(|(subscriber, _)| *subscriber == id)
            .map(|(_, outcome)| outcome)
    }

    fn count(&self, predicate: impl Fn(&DeliveryOutcome) -> bool) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| predicate(outcome))
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertRecipient {
    pub id: SubscriberId,
    pub language: Language,
    pub threshold_usd: u64,
}

pub struct NotificationFanout {
    subscribers: SubscriberRegistry,
    alerts: AlertRegistry,
    notifier: Arc<dyn Notifier>,
    send_timeout: Duration,
}

impl NotificationFanout {
    pub fn new(
        subscribers: SubscriberRegistry,
        alerts: AlertRegistry,
        notifier: Arc<dyn Notifier>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            subscribers,
            alerts,
            notifier,
            send_timeout,
        }
    }

    pub fn subscribers(&self) -> &SubscriberRegistry {
        &self.subscribers
    }

    pub fn alerts(&self) -> &AlertRegistry {
        &self.alerts
    }

    /// Announces a deployment to every current subscriber. Subscribers with a
    /// market-cap threshold who are shown the token get enrolled for alerts on it.
    pub async fn announce(
        &self,
        event: &DeploymentEvent,
        metadata: &TokenMetadata,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let mut sends = Vec::new();

        for (id, prefs) in self.subscribers.snapshot() {
            if prefs.require_media_link && !metadata.has_media_link() {
                report.outcomes.push((id, DeliveryOutcome::Filtered));
                continue;
            }

            if prefs.market_cap_threshold.is_some() {
                self.alerts.enroll(event.token, id);
            }

            let text = render_deployment(prefs.language, event, metadata);
            sends.push(async move { (id, self.deliver(id, text).await) });
        }

        report.outcomes.extend(join_all(sends).await);

        info!(
            "Announced token {:?}: {} delivered, {} filtered, {} failed",
            event.token,
            report.delivered(),
            report.filtered(),
            report.failed()
        );
        report
    }

    pub async fn alert(
        &self,
        token: Address,
        market_cap_usd: f64,
        recipients: &[AlertRecipient],
    ) -> DeliveryReport {
        let sends = recipients.iter().map(|recipient| async move {
            let text = render_market_cap_alert(
                recipient.language,
                token,
                market_cap_usd,
                recipient.threshold_usd,
            );
            (recipient.id, self.deliver(recipient.id, text).await)
        });

        DeliveryReport {
            outcomes: join_all(sends).await,
        }
    }

    /// Opts the subscriber out and drops every alert enrolment it held.
    pub fn remove_subscriber(&self, id: SubscriberId) -> bool {
        self.alerts.clear_all(id);
        self.subscribers.opt_out(id)
    }

    /// Clears the threshold; without one the subscriber can no longer be alerted.
    pub fn clear_threshold(&self, id: SubscriberId) {
        self.subscribers.clear_threshold(id);
        self.alerts.clear_all(id);
    }

    async fn deliver(&self, id: SubscriberId, text: String) -> DeliveryOutcome {
        match timeout(self.send_timeout, self.notifier.send(id, &text)).await {
            Ok(Ok(())) => DeliveryOutcome::Delivered,
            Ok(Err(e)) => {
                warn!("Failed to notify subscriber {}: {}", id, e);
                DeliveryOutcome::Failed(e.to_string())
            }
            Err(_) => {
                warn!(
                    "Notification to subscriber {} timed out after {} seconds",
                    id,
                    self.send_timeout.as_secs()
                );
                DeliveryOutcome::TimedOut
            }
        }
    }
}
