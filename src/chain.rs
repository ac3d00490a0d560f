use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use alloy_primitives::{Address, U256};
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::time::timeout;

use crate::events::{
    TokenDeployed, decimalsCall, descriptionCall, getPairCall, getReservesCall, symbolCall,
    telegramCall, token0Call, token1Call, totalSupplyCall, twitterCall, websiteCall,
};
use crate::rpc::RpcClient;

/// String getters a launched token exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    Symbol,
    Description,
    Website,
    Telegram,
    Twitter,
}

impl fmt::Display for TextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TextField::Symbol => "symbol",
            TextField::Description => "description",
            TextField::Website => "website",
            TextField::Telegram => "telegram",
            TextField::Twitter => "twitter",
        };
        f.write_str(name)
    }
}

/// Every chain read the pipeline performs goes through this trait.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn latest_block(&self) -> Result<u64>;

    /// Factory deployment logs in `[from_block, to_block]`, in log order.
    async fn deployment_logs(&self, from_block: u64, to_block: u64) -> Result<Vec<Log>>;

    async fn text_field(&self, token: Address, field: TextField) -> Result<String>;

    async fn decimals(&self, token: Address) -> Result<u8>;

    async fn total_supply(&self, token: Address) -> Result<U256>;

    /// Pool pairing `token` with `quote`, if one exists.
    async fn pool_for(&self, token: Address, quote: Address) -> Result<Option<Address>>;

    /// The pool's (token0, token1) slot addresses.
    async fn pool_tokens(&self, pool: Address) -> Result<(Address, Address)>;

    /// The pool's (reserve0, reserve1).
    async fn pool_reserves(&self, pool: Address) -> Result<(U256, U256)>;
}

pub struct RpcChainReader {
    client: RpcClient,
    factory: Address,
    dex_factory: Address,
}

impl RpcChainReader {
    pub fn new(client: RpcClient, factory: Address, dex_factory: Address) -> Self {
        Self {
            client,
            factory,
            dex_factory,
        }
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn latest_block(&self) -> Result<u64> {
        self.client.get_latest_block().await
    }

    async fn deployment_logs(&self, from_block: u64, to_block: u64) -> Result<Vec<Log>> {
        self.client
            .get_logs(from_block, to_block, self.factory, TokenDeployed::SIGNATURE_HASH)
            .await
    }

    async fn text_field(&self, token: Address, field: TextField) -> Result<String> {
        match field {
            TextField::Symbol => self.client.call_contract(token, symbolCall {}).await,
            TextField::Description => self.client.call_contract(token, descriptionCall {}).await,
            TextField::Website => self.client.call_contract(token, websiteCall {}).await,
            TextField::Telegram => self.client.call_contract(token, telegramCall {}).await,
            TextField::Twitter => self.client.call_contract(token, twitterCall {}).await,
        }
    }

    async fn decimals(&self, token: Address) -> Result<u8> {
        self.client.call_contract(token, decimalsCall {}).await
    }

    async fn total_supply(&self, token: Address) -> Result<U256> {
        self.client.call_contract(token, totalSupplyCall {}).await
    }

    async fn pool_for(&self, token: Address, quote: Address) -> Result<Option<Address>> {
        let pair = self
            .client
            .call_contract(
                self.dex_factory,
                getPairCall {
                    tokenA: token,
                    tokenB: quote,
                },
            )
            .await?;
        Ok((pair != Address::ZERO).then_some(pair))
    }

    async fn pool_tokens(&self, pool: Address) -> Result<(Address, Address)> {
        let (token0, token1) = tokio::try_join!(
            self.client.call_contract(pool, token0Call {}),
            self.client.call_contract(pool, token1Call {}),
        )?;
        Ok((token0, token1))
    }

    async fn pool_reserves(&self, pool: Address) -> Result<(U256, U256)> {
        let reserves = self.client.call_contract(pool, getReservesCall {}).await?;
        Ok((
            U256::from(reserves.reserve0.to::<u128>()),
            U256::from(reserves.reserve1.to::<u128>()),
        ))
    }
}

/// Bounds a chain read by `limit`, folding an elapsed timeout into the error.
pub async fn read_with_timeout<T>(
    limit: Duration,
    read: impl Future<Output = Result<T>>,
) -> Result<T> {
    match timeout(limit, read).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "Chain read timed out after {} ms",
            limit.as_millis()
        )),
    }
}
