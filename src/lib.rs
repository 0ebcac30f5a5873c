pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod middleware;
pub mod orders;
pub mod services;
