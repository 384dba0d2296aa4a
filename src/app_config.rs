use crate::error::TrackerError;
use crate::oi::rules::Thresholds;
use crate::oi::store::DEFAULT_RETENTION_HOURS;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::time::Duration;

// -----------------------------------------------
// DEFAULTS
// -----------------------------------------------
pub const DEFAULT_UNDERLYING: &str = "NIFTY";
pub const DEFAULT_STRIKES_EACH_SIDE: usize = 5;
pub const MAX_STRIKES_EACH_SIDE: usize = 50;
pub const DEFAULT_WINDOWS: &str = "5,10,15,30";
pub const DEFAULT_THRESHOLDS: &str = "5:8,10:10,15:15,30:25";
pub const DEFAULT_REFRESH_SECS: u64 = 60;
pub const DEFAULT_MAX_CONCURRENT: usize = 10;
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_LOG_DIR: &str = "./logs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Background tracker plus HTTP server
    Server,
    /// One cycle, grid printed as JSON
    Once,
}

/// Application configuration, read once at startup
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub mode: Mode,
    pub underlying: String,
    pub expiry: Option<NaiveDate>,
    pub strikes_each_side: usize,
    pub windows: Vec<u32>,
    pub thresholds: Thresholds,
    pub refresh_interval: Duration,
    pub retention: chrono::Duration,
    pub max_concurrent: usize,
    pub port: u16,
    pub log_dir: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Server,
            underlying: DEFAULT_UNDERLYING.to_string(),
            expiry: None,
            strikes_each_side: DEFAULT_STRIKES_EACH_SIDE,
            windows: vec![5, 10, 15, 30],
            thresholds: Thresholds::default(),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_SECS),
            retention: chrono::Duration::hours(DEFAULT_RETENTION_HOURS),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            port: DEFAULT_PORT,
            log_dir: DEFAULT_LOG_DIR.to_string(),
        }
    }
}

impl TrackerConfig {
    /// Create new configuration from environment variables
    pub fn from_env() -> Result<Self, TrackerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup (env, map in tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TrackerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let mode = match get("OI_MODE", "server").as_str() {
            "server" => Mode::Server,
            "once" => Mode::Once,
            other => {
                return Err(TrackerError::Configuration(format!(
                    "invalid OI_MODE '{}', use 'server' or 'once'",
                    other
                )));
            }
        };

        let expiry = match lookup("OI_EXPIRY") {
            Some(raw) if !raw.trim().is_empty() => Some(
                NaiveDate::parse_from_str(raw.trim(), "%d-%b-%Y").map_err(|e| {
                    TrackerError::Configuration(format!("invalid OI_EXPIRY '{}': {}", raw, e))
                })?,
            ),
            _ => None,
        };

        let config = Self {
            mode,
            underlying: get("OI_UNDERLYING", DEFAULT_UNDERLYING),
            expiry,
            strikes_each_side: parse_number("OI_STRIKES_EACH_SIDE", &get("OI_STRIKES_EACH_SIDE", "5"))?,
            windows: parse_windows(&get("OI_WINDOWS", DEFAULT_WINDOWS))?,
            thresholds: parse_thresholds(&get("OI_THRESHOLDS", DEFAULT_THRESHOLDS))?,
            refresh_interval: Duration::from_secs(parse_number(
                "OI_REFRESH_SECS",
                &get("OI_REFRESH_SECS", "60"),
            )?),
            retention: parse_retention(&get("OI_RETENTION_HOURS", "48"))?,
            max_concurrent: parse_number::<usize>("OI_MAX_CONCURRENT", &get("OI_MAX_CONCURRENT", "10"))?
                .clamp(1, 50),
            port: parse_number("OI_PORT", &get("OI_PORT", "3001"))?,
            log_dir: get("OI_LOG_DIR", DEFAULT_LOG_DIR),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), TrackerError> {
        let fail = |msg: String| Err(TrackerError::Configuration(msg));

        if self.underlying.trim().is_empty() {
            return fail("underlying symbol is empty".to_string());
        }
        if self.strikes_each_side > MAX_STRIKES_EACH_SIDE {
            return fail(format!(
                "OI_STRIKES_EACH_SIDE {} exceeds {}",
                self.strikes_each_side, MAX_STRIKES_EACH_SIDE
            ));
        }
        if self.windows.is_empty() {
            return fail("no lookback windows configured".to_string());
        }

        let mut seen = Vec::with_capacity(self.windows.len());
        for &window in &self.windows {
            if window == 0 {
                return fail("lookback window must be at least 1 minute".to_string());
            }
            if seen.contains(&window) {
                return fail(format!("duplicate lookback window {}", window));
            }
            seen.push(window);

            match self.thresholds.get(window) {
                Some(t) if t.is_finite() && t >= 0.0 => {}
                Some(t) => return fail(format!("invalid threshold {} for {}m window", t, window)),
                None => return fail(format!("missing threshold for {}m window", window)),
            }
        }

        if self.refresh_interval.is_zero() {
            return fail("refresh interval must be positive".to_string());
        }

        let longest = self.windows.iter().copied().max().unwrap_or(0);
        if self.retention <= chrono::Duration::minutes(i64::from(longest)) {
            return fail(format!(
                "retention of {}h does not cover the {}m window",
                self.retention.num_hours(),
                longest
            ));
        }

        Ok(())
    }
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T, TrackerError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| TrackerError::Configuration(format!("invalid {} '{}': {}", key, raw, e)))
}

fn parse_retention(raw: &str) -> Result<chrono::Duration, TrackerError> {
    let hours: i64 = parse_number("OI_RETENTION_HOURS", raw)?;
    chrono::Duration::try_hours(hours).ok_or_else(|| {
        TrackerError::Configuration(format!("OI_RETENTION_HOURS {} out of range", hours))
    })
}

/// "5,10,15,30" -> [5, 10, 15, 30]
pub fn parse_windows(raw: &str) -> Result<Vec<u32>, TrackerError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_number("OI_WINDOWS", s))
        .collect()
}

/// "5:8,10:10" -> {5: 8.0, 10: 10.0}
pub fn parse_thresholds(raw: &str) -> Result<Thresholds, TrackerError> {
    let mut map = BTreeMap::new();

    for pair in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((window, pct)) = pair.split_once(':') else {
            return Err(TrackerError::Configuration(format!(
                "invalid OI_THRESHOLDS entry '{}', expected window:percent",
                pair
            )));
        };
        map.insert(
            parse_number::<u32>("OI_THRESHOLDS", window)?,
            parse_number::<f64>("OI_THRESHOLDS", pct)?,
        );
    }

    Ok(Thresholds::new(map))
}
