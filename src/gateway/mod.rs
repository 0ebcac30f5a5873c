pub mod client;
pub mod types;

pub use client::{CreatedTransaction, GatewayClient, GatewayError, GatewayResult};
