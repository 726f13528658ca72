pub mod banner;
pub mod cache;
pub mod config;
pub mod fetcher;
pub mod ledger;
pub mod metrics;
pub mod observability;
pub mod roster;
pub mod runescape;
pub mod snapshot;
pub mod stats;
pub mod subject;
pub mod types;
pub mod xp_table;
