use std::time::Duration;

// -----------------------------------------------
// NSE API ENDPOINTS
// -----------------------------------------------
pub const NSE_BASE_URL: &str = "https://www.nseindia.com";

pub fn nse_contract_info_url(base_url: &str, symbol: &str) -> String {
    format!(
        "{}/api/option-chain-contract-info?symbol={}",
        base_url,
        urlencoding::encode(symbol)
    )
}

pub fn nse_option_chain_url(base_url: &str, typ: &str, symbol: &str, expiry: &str) -> String {
    format!(
        "{}/api/option-chain-v3?type={}&symbol={}&expiry={}",
        base_url,
        typ,
        urlencoding::encode(symbol),
        urlencoding::encode(expiry)
    )
}

/// Expiry format used by every NSE endpoint, e.g. "30-Dec-2025"
pub const NSE_DATE_FORMAT: &str = "%d-%b-%Y";
pub const NSE_TIMESTAMP_FORMAT: &str = "%d-%b-%Y %H:%M:%S";

// -----------------------------------------------
// INDICES
// -----------------------------------------------
pub const NSE_INDICES: &[&str] = &["NIFTY", "BANKNIFTY", "FINNIFTY", "MIDCPNIFTY", "NIFTYNXT50"];

pub fn is_index(symbol: &str) -> bool {
    NSE_INDICES.contains(&symbol)
}

// -----------------------------------------------
// HTTP CLIENT CONFIG
// -----------------------------------------------
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                               AppleWebKit/537.36 (KHTML, like Gecko) \
                               Chrome/131.0.0.0 Safari/537.36";

pub const ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.8",
    "en-IN,en;q=0.9",
];

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

// -----------------------------------------------
// SESSION WARMUP
// -----------------------------------------------
pub const WARMUP_DELAY_MS: u64 = 200;

// -----------------------------------------------
// RETRY CONFIG
// -----------------------------------------------
pub const RETRY_BASE_DELAY_MS: u64 = 100;
pub const RETRY_FACTOR: u64 = 2;
pub const RETRY_MAX_DELAY_SECS: u64 = 3;
pub const RETRY_MAX_ATTEMPTS: usize = 3;

// -----------------------------------------------
// CHAIN SNAPSHOT
// -----------------------------------------------
// Quote and per-contract OI are read from one chain response, and the expiry list is reused
// for the same window. Must stay below the refresh interval.
pub const SNAPSHOT_TTL: Duration = Duration::from_secs(15);

// -----------------------------------------------
// HTTP HEADERS
// -----------------------------------------------
pub const HEADER_REFERER: &str = "https://www.nseindia.com/";
pub const HEADER_X_REQUESTED_WITH: &str = "XMLHttpRequest";
pub const HEADER_ACCEPT_HTML: &str = "text/html";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_are_encoded() {
        assert_eq!(
            nse_contract_info_url(NSE_BASE_URL, "M&M"),
            "https://www.nseindia.com/api/option-chain-contract-info?symbol=M%26M"
        );
        assert_eq!(
            nse_option_chain_url(NSE_BASE_URL, "Indices", "NIFTY", "30-Dec-2025"),
            "https://www.nseindia.com/api/option-chain-v3?type=Indices&symbol=NIFTY&expiry=30-Dec-2025"
        );
    }

    #[test]
    fn test_is_index() {
        assert!(is_index("BANKNIFTY"));
        assert!(!is_index("RELIANCE"));
    }
}
