use crate::models::{ChainRow, Quote, Sample};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Market data collaborator. Timeouts and retries are the implementation's business.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn get_quote(&self, underlying: &str) -> Result<Quote>;

    async fn get_option_chain(&self, underlying: &str, expiry: NaiveDate) -> Result<Vec<ChainRow>>;

    /// Most recent (timestamp, OI) point for one contract
    async fn get_oi_sample(&self, instrument_id: &str) -> Result<Sample>;

    /// Every (timestamp, OI) point the source still has for one contract, any order.
    /// Sources without intraday history serve just the latest point.
    async fn get_oi_history(&self, instrument_id: &str) -> Result<Vec<Sample>> {
        Ok(vec![self.get_oi_sample(instrument_id).await?])
    }

    async fn list_expiries(&self, underlying: &str) -> Result<Vec<NaiveDate>>;
}
