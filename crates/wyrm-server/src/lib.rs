pub mod config;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod observability;
pub mod server;

pub use config::{AppConfig, LoggingConfig, ProxyAuthConfig, ServerConfig};
pub use identity::ProxyHeaderUsers;
pub use observability::{apply_logging_level, init_tracing};
pub use server::{ServerBuilder, WyrmServer, build_app};
