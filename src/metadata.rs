use alloy_primitives::Address;
use anyhow::Result;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::chain::{ChainReader, TextField, read_with_timeout};

/// Descriptive fields of a launched token. `None` is the "unset" sentinel:
/// the field could not be read, or the token reported an empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenMetadata {
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub telegram: Option<String>,
    pub twitter: Option<String>,
}

impl TokenMetadata {
    pub fn has_media_link(&self) -> bool {
        self.website.is_some() || self.telegram.is_some() || self.twitter.is_some()
    }
}

pub struct MetadataEnricher {
    chain: Arc<dyn ChainReader>,
    call_timeout: Duration,
}

impl MetadataEnricher {
    pub fn new(chain: Arc<dyn ChainReader>, call_timeout: Duration) -> Self {
        Self {
            chain,
            call_timeout,
        }
    }

    /// Reads all six fields concurrently. Never fails; each field degrades on its own.
    pub async fn enrich(&self, token: Address) -> TokenMetadata {
        let (symbol, decimals, description, website, telegram, twitter) = tokio::join!(
            self.text(token, TextField::Symbol),
            self.field(token, "decimals", self.chain.decimals(token)),
            self.text(token, TextField::Description),
            self.text(token, TextField::Website),
            self.text(token, TextField::Telegram),
            self.text(token, TextField::Twitter),
        );

        TokenMetadata {
            symbol,
            decimals,
            description,
            website,
            telegram,
            twitter,
        }
    }

    async fn text(&self, token: Address, field: TextField) -> Option<String> {
        self.field(token, field, self.chain.text_field(token, field))
            .await
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    async fn field<T: Display>(
        &self,
        token: Address,
        name: impl Display,
        read: impl Future<Output = Result<T>>,
    ) -> Option<T> {
        match read_with_timeout(self.call_timeout, read).await {
            Ok(value) => {
                debug!("Token {:?} {}: {}", token, name, value);
                Some(value)
            }
            Err(e) => {
                warn!("Failed to fetch {} for token {:?}: {}", name, token, e);
                None
            }
        }
    }
}
