pub mod config;
pub mod models;
pub mod nse_client;

// Re-exports for convenience
pub use models::{ContractInfo, OptionChain, OptionData, OptionDetail};
pub use nse_client::NseClient;
