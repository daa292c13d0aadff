pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod state;

pub use config::AppConfig;
pub use error::ApiError;
pub use server::{ServerBuilder, build_app};
pub use state::AppState;
