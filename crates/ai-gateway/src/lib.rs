mod client;
mod error;
mod reports;

pub use client::{Client, Config, ConfigBuilder, Expect, RetryPolicy, Stats, consts};
pub use error::GatewayError;
pub use reports::ReportClient;
pub use roleplay_types as types;
