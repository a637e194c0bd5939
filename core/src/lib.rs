//! scamdesk-core: scam report desk for a community chat bot.
//!
//! Reporters file scam reports through a step-by-step conversation, admins
//! verify them, and verified reports about the same bad actor are folded
//! into one persistent profile. Anyone can search stored profiles and
//! pending reports, enriched by live reputation lookups.

pub mod aggregator;
pub mod archiver;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod lookup;
pub mod notify;
pub mod profile;
pub mod rate_limiter;
pub mod report;
pub mod store;
pub mod transport;
pub mod types;
pub mod workflow;
