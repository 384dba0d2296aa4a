use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Side {
    #[serde(rename = "CE")]
    Call,
    #[serde(rename = "PE")]
    Put,
}

impl Side {
    pub fn label(&self) -> &'static str {
        match self {
            Side::Call => "CE",
            Side::Put => "PE",
        }
    }
}

/// A single option contract
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instrument {
    pub id: String,
    pub strike: f64,
    pub side: Side,
    pub expiry: NaiveDate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub oi: u64,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, oi: u64) -> Self {
        Self { timestamp, oi }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quote {
    pub last_price: f64,
}

/// One strike of the option chain with its call/put identifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainRow {
    pub strike: f64,
    pub call: Option<String>,
    pub put: Option<String>,
}

/// Percentage OI change for one window. Serializes as a number or "unavailable".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OiChange {
    Pct(f64),
    Unavailable,
}

impl OiChange {
    pub fn is_available(&self) -> bool {
        matches!(self, OiChange::Pct(_))
    }
}

impl Serialize for OiChange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OiChange::Pct(v) => serializer.serialize_f64(*v),
            OiChange::Unavailable => serializer.serialize_str("unavailable"),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WindowChange {
    pub window: u32,
    pub change_pct: OiChange,

    /// latest OI minus past OI, present whenever a past sample was found
    pub abs_change: Option<i64>,
}

/// Changes for one instrument across every configured window
#[derive(Debug, Clone, Serialize)]
pub struct ChangeResult {
    pub instrument: Instrument,
    pub moneyness: String,
    pub latest_oi: Option<u64>,
    pub latest_at: Option<DateTime<Utc>>,
    pub changes: Vec<WindowChange>,

    /// true when this cycle's sample fetch failed and the row is carried from history
    pub stale: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GridCell {
    pub instrument: String,
    pub strike: f64,
    pub side: Side,
    pub window: u32,
    pub change_pct: OiChange,
    pub breached: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct Tally {
    pub breached: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Grid {
    pub cycle: u64,
    pub generated_at: DateTime<Utc>,
    pub underlying: String,
    pub underlying_price: f64,
    pub atm_strike: f64,
    pub expiry: NaiveDate,
    pub rows: Vec<ChangeResult>,
    pub cells: Vec<GridCell>,
    pub breached: usize,
    pub total: usize,
    pub alert: bool,
    pub calls: Tally,
    pub puts: Tally,
}
