pub mod expiry;
pub mod orchestrator;
pub mod processor;
pub mod rules;
pub mod store;
pub mod strikes;

// Re-exports (public API)
pub use expiry::select_expiry;
pub use orchestrator::{band_instruments, GridHandle, Orchestrator};
pub use processor::{calculate_changes, calculate_oi_change, calculate_window_change};
pub use rules::{is_alert, is_breached, run_rules, RulesOutput, Thresholds};
pub use store::{AppendOutcome, OiStore, Series};
pub use strikes::{find_atm, moneyness, select_band};
