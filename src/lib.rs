pub mod chain;
pub mod config;
pub mod dedup;
pub mod events;
pub mod fanout;
pub mod feed;
pub mod ingestor;
pub mod messages;
pub mod metadata;
pub mod monitor;
pub mod pipeline;
pub mod registry;
pub mod rpc;
pub mod telegram;

#[cfg(test)]
pub(crate) mod test_utils;
