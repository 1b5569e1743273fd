pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod translate;

pub use config::{GatewayConfig, Secrets};
pub use error::{GatewayError, Result};
pub use logging::SharedLogger;
pub use server::{build_router, AppState};
