use alloy_primitives::Address;
use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub json_rpc_urls: Vec<String>,
    pub factory_address: Address,
    pub reference_asset: Address,
    pub dex_factory_address: Address,
    pub telegram_bot_token: String,
    pub market_cap_interval: Duration,
    pub block_poll_interval: Duration,
    pub request_timeout: Duration,
    pub send_timeout: Duration,
    pub max_in_flight_queries: usize,
    pub log_blocks_per_request: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let json_rpc_urls = parse_rpc_urls(
            &std::env::var("JSON_RPC_URLS").context("JSON_RPC_URLS must be set in .env")?,
        )?;

        let factory_address = address_var("FACTORY_ADDRESS")?;
        let reference_asset = address_var("REFERENCE_ASSET_ADDRESS")?;
        let dex_factory_address = address_var("DEX_FACTORY_ADDRESS")?;

        let telegram_bot_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .context("TELEGRAM_BOT_TOKEN must be set in .env")?;

        let max_in_flight_queries = number_var("MAX_IN_FLIGHT_QUERIES", 8)? as usize;
        if max_in_flight_queries == 0 {
            anyhow::bail!("MAX_IN_FLIGHT_QUERIES must be at least 1");
        }

        let log_blocks_per_request = number_var("LOG_BLOCKS_PER_REQUEST", 1_000)?;
        if log_blocks_per_request == 0 {
            anyhow::bail!("LOG_BLOCKS_PER_REQUEST must be at least 1");
        }

        Ok(Config {
            json_rpc_urls,
            factory_address,
            reference_asset,
            dex_factory_address,
            telegram_bot_token,
            market_cap_interval: Duration::from_secs(number_var("MARKET_CAP_INTERVAL_SECS", 300)?),
            block_poll_interval: Duration::from_secs(number_var("BLOCK_POLL_INTERVAL_SECS", 3)?),
            request_timeout: Duration::from_secs(number_var("REQUEST_TIMEOUT_SECS", 10)?),
            send_timeout: Duration::from_secs(number_var("SEND_TIMEOUT_SECS", 10)?),
            max_in_flight_queries,
            log_blocks_per_request,
        })
    }
}

fn address_var(name: &str) -> Result<Address> {
    let raw = std::env::var(name).with_context(|| format!("{name} must be set in .env"))?;
    Address::from_str(raw.trim()).with_context(|| format!("Invalid {name} format"))
}

fn number_var(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a non-negative integer")),
        Err(_) => Ok(default),
    }
}

fn parse_rpc_urls(raw: &str) -> Result<Vec<String>> {
    let urls: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect();

    if urls.is_empty() {
        anyhow::bail!("JSON_RPC_URLS must contain at least one URL");
    }
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_urls_are_split_and_trimmed() {
        let urls = parse_rpc_urls(" https://a.example ,https://b.example,, ").unwrap();
        assert_eq!(urls, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn empty_rpc_url_list_is_rejected() {
        assert!(parse_rpc_urls(" , ").is_err());
    }
}
