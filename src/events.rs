use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::SolEvent;
use alloy_primitives::{Address, U256};

use crate::dedup::DedupKey;

sol! {
    event TokenDeployed(address indexed token, uint256 devBuyAmount);

    function symbol() external view returns (string);
    function decimals() external view returns (uint8);
    function totalSupply() external view returns (uint256);
    function description() external view returns (string);
    function website() external view returns (string);
    function telegram() external view returns (string);
    function twitter() external view returns (string);

    function token0() external view returns (address);
    function token1() external view returns (address);
    function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);

    function getPair(address tokenA, address tokenB) external view returns (address pair);
}

/// A factory deployment decoded from one log, tagged with the range it was scanned in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentEvent {
    pub token: Address,
    pub dev_buy: U256,
    pub block_number: Option<u64>,
    pub from_block: u64,
    pub to_block: u64,
}

impl DeploymentEvent {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            token: self.token,
            amount: self.dev_buy,
        }
    }
}

pub fn decode_deployment_event(
    log: &Log,
    from_block: u64,
    to_block: u64,
) -> anyhow::Result<DeploymentEvent> {
    let log_data = log.data();
    let decoded = TokenDeployed::decode_raw_log(log.topics(), &log_data.data)?;
    Ok(DeploymentEvent {
        token: decoded.token,
        dev_buy: decoded.devBuyAmount,
        block_number: log.block_number,
        from_block,
        to_block,
    })
}
