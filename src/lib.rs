pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod relay;
pub mod schemas;
pub mod server;
pub mod translate;

pub use client::UpstreamClient;
pub use config::ProxyConfig;
pub use error::{ProxyError, Result};
pub use logging::SharedLogger;
pub use server::{build_router, ApiKey, AppState};
