use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use alloy_primitives::{Address, U256};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::chain::{ChainReader, TextField};
use crate::events::TokenDeployed;
use crate::fanout::Notifier;
use crate::registry::SubscriberId;

pub fn deployment_log(token: Address, dev_buy: U256, block_number: u64) -> Log {
    let data = TokenDeployed {
        token,
        devBuyAmount: dev_buy,
    }
    .encode_log_data();
    Log {
        inner: alloy_primitives::Log {
            address: Address::ZERO,
            data,
        },
        block_number: Some(block_number),
        ..Default::default()
    }
}

/// Scripted chain. Head polls and log queries pop scripted responses in order;
/// an exhausted log script yields empty batches. Unconfigured reads fail.
#[derive(Default)]
pub struct FakeChain {
    heads: Mutex<VecDeque<u64>>,
    scripted_logs: Mutex<VecDeque<Result<Vec<Log>, String>>>,
    log_queries: Mutex<Vec<(u64, u64)>>,
    log_latency: Option<(Duration, u64)>,
    texts: HashMap<(Address, TextField), String>,
    failing_texts: HashSet<(Address, TextField)>,
    decimals: HashMap<Address, u8>,
    hanging_decimals: HashSet<Address>,
    supplies: HashMap<Address, U256>,
    supply_reads: AtomicUsize,
    supply_latency: Duration,
    supply_in_flight: AtomicUsize,
    peak_supply_in_flight: AtomicUsize,
    pools: HashMap<Address, Address>,
    pool_tokens: HashMap<Address, (Address, Address)>,
    reserves: HashMap<Address, (U256, U256)>,
    hanging_reserves: HashSet<Address>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_heads(self, heads: &[u64]) -> Self {
        self.heads.lock().unwrap().extend(heads);
        self
    }

    /// Log queries take `latency` per started `blocks` blocks of range.
    pub fn with_log_latency(mut self, latency: Duration, blocks: u64) -> Self {
        self.log_latency = Some((latency, blocks));
        self
    }

    pub fn with_text(mut self, token: Address, field: TextField, value: &str) -> Self {
        self.texts.insert((token, field), value.to_string());
        self
    }

    pub fn with_full_metadata(self, token: Address) -> Self {
        self.with_text(token, TextField::Symbol, "PEPE")
            .with_text(token, TextField::Description, "a frog")
            .with_text(token, TextField::Website, "https://pepe.example")
            .with_text(token, TextField::Telegram, "pepe_chat")
            .with_text(token, TextField::Twitter, "pepe_x")
            .with_decimals(token, 18)
    }

    pub fn failing_text(mut self, token: Address, field: TextField) -> Self {
        self.failing_texts.insert((token, field));
        self
    }

    pub fn with_decimals(mut self, token: Address, decimals: u8) -> Self {
        self.decimals.insert(token, decimals);
        self
    }

    pub fn hanging_decimals(mut self, token: Address) -> Self {
        self.hanging_decimals.insert(token);
        self
    }

    pub fn with_supply(mut self, token: Address, supply: U256) -> Self {
        self.supplies.insert(token, supply);
        self
    }

    pub fn with_supply_latency(mut self, latency: Duration) -> Self {
        self.supply_latency = latency;
        self
    }

    pub fn with_pool(
        mut self,
        token: Address,
        pool: Address,
        slots: (Address, Address),
        reserves: (U256, U256),
    ) -> Self {
        self.pools.insert(token, pool);
        self.pool_tokens.insert(pool, slots);
        self.reserves.insert(pool, reserves);
        self
    }

    pub fn hanging_reserves(mut self, pool: Address) -> Self {
        self.hanging_reserves.insert(pool);
        self
    }

    pub fn push_logs(&self, response: Result<Vec<Log>, &str>) {
        self.scripted_logs
            .lock()
            .unwrap()
            .push_back(response.map_err(str::to_string));
    }

    pub fn log_queries(&self) -> Vec<(u64, u64)> {
        self.log_queries.lock().unwrap().clone()
    }

    pub fn supply_reads(&self) -> usize {
        self.supply_reads.load(Ordering::SeqCst)
    }

    /// Most total supply reads ever running at the same time.
    pub fn peak_supply_in_flight(&self) -> usize {
        self.peak_supply_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn latest_block(&self) -> Result<u64> {
        let next = self.heads.lock().unwrap().pop_front();
        next.ok_or_else(|| anyhow::anyhow!("no head available"))
    }

    async fn deployment_logs(&self, from_block: u64, to_block: u64) -> Result<Vec<Log>> {
        self.log_queries.lock().unwrap().push((from_block, to_block));
        if let Some((latency, blocks)) = self.log_latency {
            let requests = (to_block - from_block + 1).div_ceil(blocks);
            tokio::time::sleep(latency * requests as u32).await;
        }
        let next = self.scripted_logs.lock().unwrap().pop_front();
        match next {
            Some(Ok(logs)) => Ok(logs),
            Some(Err(e)) => Err(anyhow::anyhow!(e)),
            None => Ok(Vec::new()),
        }
    }

    async fn text_field(&self, token: Address, field: TextField) -> Result<String> {
        if self.failing_texts.contains(&(token, field)) {
            anyhow::bail!("execution reverted");
        }
        self.texts
            .get(&(token, field))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("execution reverted"))
    }

    async fn decimals(&self, token: Address) -> Result<u8> {
        if self.hanging_decimals.contains(&token) {
            std::future::pending::<()>().await;
        }
        self.decimals
            .get(&token)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("execution reverted"))
    }

    async fn total_supply(&self, token: Address) -> Result<U256> {
        self.supply_reads.fetch_add(1, Ordering::SeqCst);
        let running = self.supply_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_supply_in_flight.fetch_max(running, Ordering::SeqCst);
        tokio::time::sleep(self.supply_latency).await;
        self.supply_in_flight.fetch_sub(1, Ordering::SeqCst);
        self.supplies
            .get(&token)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("execution reverted"))
    }

    async fn pool_for(&self, token: Address, _quote: Address) -> Result<Option<Address>> {
        Ok(self.pools.get(&token).copied())
    }

    async fn pool_tokens(&self, pool: Address) -> Result<(Address, Address)> {
        self.pool_tokens
            .get(&pool)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("unknown pool"))
    }

    async fn pool_reserves(&self, pool: Address) -> Result<(U256, U256)> {
        if self.hanging_reserves.contains(&pool) {
            std::future::pending::<()>().await;
        }
        self.reserves
            .get(&pool)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("unknown pool"))
    }
}

/// Records every delivered message; configured subscribers fail or never answer.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(SubscriberId, String)>>,
    failing: HashSet<SubscriberId>,
    hanging: HashSet<SubscriberId>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, id: SubscriberId) -> Self {
        self.failing.insert(id);
        self
    }

    pub fn hanging_for(mut self, id: SubscriberId) -> Self {
        self.hanging.insert(id);
        self
    }

    pub fn sent(&self) -> Vec<(SubscriberId, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, to: SubscriberId, text: &str) -> Result<()> {
        if self.hanging.contains(&to) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(&to) {
            anyhow::bail!("chat {} not found", to);
        }
        self.sent.lock().unwrap().push((to, text.to_string()));
        Ok(())
    }
}
