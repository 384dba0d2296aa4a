use super::config;
use crate::models::ChainRow;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractInfo {
    #[serde(rename = "expiryDates")]
    pub expiry_dates: Vec<String>,
}

impl ContractInfo {
    /// Parsed expiry dates; entries that don't parse are dropped
    pub fn expiries(&self) -> Vec<NaiveDate> {
        self.expiry_dates
            .iter()
            .filter_map(|s| NaiveDate::parse_from_str(s.trim(), config::NSE_DATE_FORMAT).ok())
            .collect()
    }
}

/// Main response structure from NSE option chain API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionChain {
    pub records: Records,
}

/// Records section containing timestamp, underlying value, and all strike data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Records {
    pub timestamp: String,

    #[serde(rename = "underlyingValue")]
    pub underlying_value: f64,

    #[serde(default)]
    pub data: Vec<OptionData>,
}

/// Option data for each strike price
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionData {
    #[serde(rename = "strikePrice")]
    pub strike_price: Option<f64>,

    #[serde(rename = "CE")]
    pub call: Option<OptionDetail>,

    #[serde(rename = "PE")]
    pub put: Option<OptionDetail>,
}

/// Detailed option information (CE or PE)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionDetail {
    #[serde(default)]
    pub identifier: Option<String>,

    #[serde(rename = "openInterest")]
    pub open_interest: Option<f64>,
}

impl OptionChain {
    /// Snapshot time, published by NSE in exchange local time
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let naive =
            NaiveDateTime::parse_from_str(self.records.timestamp.trim(), config::NSE_TIMESTAMP_FORMAT).ok()?;
        naive
            .and_local_timezone(crate::oi::expiry::market_offset())
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn chain_rows(&self) -> Vec<ChainRow> {
        self.records
            .data
            .iter()
            .filter_map(|opt| {
                Some(ChainRow {
                    strike: opt.strike_price?,
                    call: opt.call.as_ref().and_then(|d| d.identifier.clone()),
                    put: opt.put.as_ref().and_then(|d| d.identifier.clone()),
                })
            })
            .collect()
    }

    /// Open interest of the contract with this identifier
    pub fn open_interest(&self, identifier: &str) -> Option<u64> {
        self.records
            .data
            .iter()
            .flat_map(|opt| [opt.call.as_ref(), opt.put.as_ref()])
            .flatten()
            .find(|d| d.identifier.as_deref() == Some(identifier))
            .and_then(|d| d.open_interest)
            .filter(|oi| oi.is_finite())
            .map(|oi| oi.max(0.0).round() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = r#"{
        "records": {
            "timestamp": "01-Dec-2025 10:15:00",
            "underlyingValue": 26012.5,
            "data": [
                {
                    "strikePrice": 26000,
                    "expiryDates": "02-Dec-2025",
                    "CE": { "identifier": "OPTIDXNIFTY02-12-2025CE26000.00", "openInterest": 1520.0 },
                    "PE": { "identifier": "OPTIDXNIFTY02-12-2025PE26000.00", "openInterest": 980.0 }
                },
                {
                    "strikePrice": 26050,
                    "CE": { "identifier": "OPTIDXNIFTY02-12-2025CE26050.00" }
                }
            ]
        }
    }"#;

    #[test]
    fn test_parse_option_chain() {
        let chain: OptionChain = serde_json::from_str(SAMPLE).unwrap();
        let rows = chain.chain_rows();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].strike, 26000.0);
        assert_eq!(rows[0].put.as_deref(), Some("OPTIDXNIFTY02-12-2025PE26000.00"));
        assert!(rows[1].put.is_none());
    }

    #[test]
    fn test_timestamp_is_ist() {
        let chain: OptionChain = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(
            chain.timestamp(),
            Some(Utc.with_ymd_and_hms(2025, 12, 1, 4, 45, 0).unwrap())
        );
    }

    #[test]
    fn test_open_interest_lookup() {
        let chain: OptionChain = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(chain.open_interest("OPTIDXNIFTY02-12-2025CE26000.00"), Some(1520));
        assert_eq!(chain.open_interest("OPTIDXNIFTY02-12-2025CE26050.00"), None);
        assert_eq!(chain.open_interest("UNKNOWN"), None);
    }

    #[test]
    fn test_contract_info_expiries() {
        let info = ContractInfo {
            expiry_dates: vec!["30-Dec-2025".into(), "garbage".into()],
        };
        assert_eq!(info.expiries(), vec![NaiveDate::from_ymd_opt(2025, 12, 30).unwrap()]);
    }
}
