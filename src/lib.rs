pub mod api_server_axum;
pub mod app_config;
pub mod error;
pub mod logging;
pub mod models;
pub mod nse;
pub mod oi;
pub mod source;

// Re-exports for convenience
pub use app_config::{Mode, TrackerConfig};
pub use error::TrackerError;
pub use models::{ChangeResult, Grid, GridCell, Instrument, OiChange, Sample, Side, WindowChange};
pub use oi::{GridHandle, Orchestrator};
pub use source::DataSource;
