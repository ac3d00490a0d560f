use alloy::network::TransactionBuilder;
use alloy::providers::fillers::FillProvider;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log, TransactionRequest};
use alloy::sol_types::SolCall;
use alloy_primitives::{Address, B256};
use anyhow::Result;
use regex::Regex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, info, warn};

type AlloyFullProvider = FillProvider<
    alloy::providers::fillers::JoinFill<
        alloy::providers::Identity,
        alloy::providers::fillers::JoinFill<
            alloy::providers::fillers::GasFiller,
            alloy::providers::fillers::JoinFill<
                alloy::providers::fillers::BlobGasFiller,
                alloy::providers::fillers::JoinFill<
                    alloy::providers::fillers::NonceFiller,
                    alloy::providers::fillers::ChainIdFiller,
                >,
            >,
        >,
    >,
    alloy::providers::RootProvider,
>;

/// Pool of HTTP providers. Errors and timeouts rotate to the next endpoint so
/// the following request goes elsewhere.
#[derive(Clone)]
pub struct RpcClient {
    providers: Vec<AlloyFullProvider>,
    urls: Vec<String>,
    current_provider: Arc<AtomicUsize>,
    request_timeout: Duration,
    max_retries: usize,
}

impl RpcClient {
    pub fn new(rpc_urls: &[String], request_timeout: Duration) -> Result<Self> {
        if rpc_urls.is_empty() {
            return Err(anyhow::anyhow!("At least one RPC URL must be provided"));
        }

        let mut providers = Vec::new();
        for url in rpc_urls {
            let parsed_url = url
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid RPC URL: {}", url))?;
            let provider: AlloyFullProvider = ProviderBuilder::new().connect_http(parsed_url);
            providers.push(provider);
        }

        Ok(RpcClient {
            providers,
            urls: rpc_urls.to_vec(),
            current_provider: Arc::new(AtomicUsize::new(0)),
            request_timeout,
            max_retries: 5,
        })
    }

    fn get_provider(&self) -> &AlloyFullProvider {
        let index = self.current_provider.load(Ordering::Relaxed) % self.providers.len();
        &self.providers[index]
    }

    pub fn get_current_url(&self) -> &str {
        let index = self.current_provider.load(Ordering::Relaxed) % self.urls.len();
        &self.urls[index]
    }

    pub fn rotate_provider(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.providers.len();
        self.current_provider.store(next, Ordering::Relaxed);

        if self.providers.len() > 1 {
            debug!("Rotating to RPC provider #{}", next);
        }
    }

    fn get_retry_strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(100)
            .factor(2)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.max_retries)
    }

    fn handle_error(&self, error_str: &str) {
        let current_url = self.get_current_url();
        warn!(
            "RPC error on {}: {}, rotating provider",
            current_url, error_str
        );
        self.rotate_provider();
    }

    /// A revert is the contract's answer; the endpoint served it fine.
    fn handle_call_error(&self, to: Address, error_str: &str) {
        if is_contract_revert(error_str) {
            debug!("Call to {:?} reverted: {}", to, error_str);
        } else {
            self.handle_error(error_str);
        }
    }

    fn handle_timeout(&self) -> anyhow::Error {
        let current_url = self.get_current_url();
        warn!(
            "Request timeout after {} seconds on {}, rotating provider",
            self.request_timeout.as_secs(),
            current_url
        );
        self.rotate_provider();
        anyhow::anyhow!(
            "Request timeout after {} seconds",
            self.request_timeout.as_secs()
        )
    }

    /// Head height, retried with exponential backoff.
    pub async fn get_latest_block(&self) -> Result<u64> {
        let client = self.clone();
        Retry::spawn(self.get_retry_strategy(), move || {
            let client = client.clone();
            async move {
                let provider = client.get_provider();
                match timeout(client.request_timeout, provider.get_block_number()).await {
                    Ok(Ok(block_number)) => Ok(block_number),
                    Ok(Err(e)) => {
                        let error_str = e.to_string();
                        client.handle_error(&error_str);
                        Err(anyhow::anyhow!("{}", e))
                    }
                    Err(_) => Err(client.handle_timeout()),
                }
            }
        })
        .await
    }

    /// Single `eth_call` decoded as `C`. No retry: callers degrade on failure.
    pub async fn call_contract<C: SolCall>(&self, to: Address, call: C) -> Result<C::Return> {
        let request = TransactionRequest::default()
            .with_to(to)
            .with_input(call.abi_encode());
        let provider = self.get_provider();

        match timeout(self.request_timeout, provider.call(request)).await {
            Ok(Ok(output)) => Ok(C::abi_decode_returns(&output)?),
            Ok(Err(e)) => {
                self.handle_call_error(to, &e.to_string());
                Err(anyhow::anyhow!("{}", e))
            }
            Err(_) => Err(self.handle_timeout()),
        }
    }

    async fn get_logs_internal(
        &self,
        from_block: u64,
        to_block: u64,
        contract_address: Address,
        topic0: B256,
    ) -> Result<Vec<Log>> {
        let provider = self.get_provider();
        let filter = Filter::new()
            .address(contract_address)
            .event_signature(topic0)
            .from_block(from_block)
            .to_block(to_block);

        match timeout(self.request_timeout, provider.get_logs(&filter)).await {
            Ok(Ok(logs)) => Ok(logs),
            Ok(Err(e)) => {
                let error_str = e.to_string();
                // A result-size limit is the endpoint asking for a smaller
                // range, not a faulty endpoint.
                if error_str.contains("exceeds max results") {
                    debug!(
                        "Max results exceeded for blocks {}-{}, will split range",
                        from_block, to_block
                    );
                } else {
                    self.handle_error(&error_str);
                }
                Err(anyhow::anyhow!("{}", e))
            }
            Err(_) => Err(self.handle_timeout()),
        }
    }

    fn parse_max_results_error(error_str: &str) -> Option<(u64, u64)> {
        let re = Regex::new(r"retry with the range (\d+)-(\d+)").ok()?;
        let captures = re.captures(error_str)?;

        let from = captures.get(1)?.as_str().parse().ok()?;
        let to = captures.get(2)?.as_str().parse().ok()?;

        Some((from, to))
    }

    /// All logs in `[from_block, to_block]`. Follows the endpoint's suggested
    /// split when the range is too large; any other failure fails the whole
    /// range so the caller never sees a partially scanned range.
    pub async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        contract_address: Address,
        topic0: B256,
    ) -> Result<Vec<Log>> {
        let mut all_logs = Vec::new();
        let mut current_from = from_block;

        while current_from <= to_block {
            match self
                .get_logs_internal(current_from, to_block, contract_address, topic0)
                .await
            {
                Ok(logs) => {
                    all_logs.extend(logs);
                    break;
                }
                Err(e) => {
                    let error_str = e.to_string();
                    let suggestion = if error_str.contains("exceeds max results") {
                        Self::parse_max_results_error(&error_str)
                    } else {
                        None
                    };

                    match suggestion {
                        Some((suggested_from, suggested_to))
                            if suggested_from == current_from && suggested_to < to_block =>
                        {
                            info!(
                                "Hit max results limit for blocks {}-{}, splitting at block {}",
                                current_from, to_block, suggested_to
                            );

                            let logs = self
                                .get_logs_internal(
                                    suggested_from,
                                    suggested_to,
                                    contract_address,
                                    topic0,
                                )
                                .await?;

                            all_logs.extend(logs);
                            current_from = suggested_to + 1;
                        }
                        _ => return Err(e),
                    }
                }
            }
        }

        Ok(all_logs)
    }
}

fn is_contract_revert(error_str: &str) -> bool {
    error_str.contains("execution reverted")
}
