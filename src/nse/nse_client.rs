use super::config;
use super::models::{ContractInfo, OptionChain};
use crate::models::{ChainRow, Quote, Sample};
use crate::oi::expiry::select_expiry;
use crate::source::DataSource;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rand::{seq::SliceRandom, thread_rng};
use reqwest::{header, Client, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;
use tracing::{debug, warn};

/// Last option chain response, shared by quote and OI lookups
struct ChainSnapshot {
    symbol: String,
    expiry: NaiveDate,
    fetched_at: Instant,
    chain: Arc<OptionChain>,
}

impl ChainSnapshot {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < config::SNAPSHOT_TTL
    }
}

/// Contract-info expiry list, reused within one cycle
struct ExpiryListing {
    symbol: String,
    fetched_at: Instant,
    expiries: Vec<NaiveDate>,
}

// -----------------------------------------------
// CLIENT WRAPPER WITH SESSION STATE AND CHAIN SNAPSHOT
// -----------------------------------------------
pub struct NseClient {
    client: Client,
    base_url: String,
    pinned_expiry: Option<NaiveDate>,
    warmed_up: Arc<RwLock<bool>>,
    snapshot: RwLock<Option<ChainSnapshot>>,
    listing: RwLock<Option<ExpiryListing>>,
    /// Expiry each underlying's chain was last requested for
    last_expiry: RwLock<HashMap<String, NaiveDate>>,
}

impl NseClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(config::NSE_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            pinned_expiry: None,
            warmed_up: Arc::new(RwLock::new(false)),
            snapshot: RwLock::new(None),
            listing: RwLock::new(None),
            last_expiry: RwLock::new(HashMap::new()),
        })
    }

    /// Quotes come from this expiry's chain until another one is requested
    pub fn pin_expiry(mut self, expiry: Option<NaiveDate>) -> Self {
        self.pinned_expiry = expiry;
        self
    }

    /// Warmup NSE session (only once per client)
    async fn warmup_if_needed(&self) -> Result<()> {
        if *self.warmed_up.read().await {
            return Ok(());
        }

        let mut warmed = self.warmed_up.write().await;
        if !*warmed {
            let _ = self
                .client
                .get(&self.base_url)
                .header("Accept", config::HEADER_ACCEPT_HTML)
                .send()
                .await
                .context("Failed to warm up NSE session")?;

            tokio::time::sleep(Duration::from_millis(config::WARMUP_DELAY_MS)).await;
            *warmed = true;
        }

        Ok(())
    }

    /// Generic retry fetch
    async fn fetch_json(&self, url: &str) -> Result<String> {
        self.warmup_if_needed().await?;

        let backoff = ExponentialBackoff::from_millis(config::RETRY_BASE_DELAY_MS)
            .factor(config::RETRY_FACTOR)
            .max_delay(Duration::from_secs(config::RETRY_MAX_DELAY_SECS))
            .take(config::RETRY_MAX_ATTEMPTS);

        Retry::spawn(backoff, || async {
            let res = self
                .client
                .get(url)
                .header("Referer", config::HEADER_REFERER)
                .header("X-Requested-With", config::HEADER_X_REQUESTED_WITH)
                .send()
                .await
                .context("Request send failed")?;

            let status = res.status();
            debug!(url, status = status.as_u16(), "NSE response");

            if status.is_success() {
                let text = res.text().await.context("Failed to read body")?;

                let trimmed = text.trim();
                if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
                    let preview: String = text.chars().take(200).collect();
                    warn!(url, %preview, "non-JSON response");
                    anyhow::bail!("Non-JSON response: {}", preview);
                }

                Ok(text)
            } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                warn!(url, status = status.as_u16(), "retryable NSE error");
                anyhow::bail!("Retryable error: {}", status)
            } else {
                let body = res.text().await.unwrap_or_default();
                let preview: String = body.chars().take(200).collect();
                anyhow::bail!("Client error {}: {}", status, preview)
            }
        })
        .await
    }

    pub async fn fetch_contract_info(&self, symbol: &str) -> Result<ContractInfo> {
        let url = config::nse_contract_info_url(&self.base_url, symbol);
        let text = self.fetch_json(&url).await?;
        let info: ContractInfo = serde_json::from_str(&text).context("Failed to parse contract info")?;

        Ok(info)
    }

    pub async fn fetch_option_chain(&self, symbol: &str, expiry: NaiveDate) -> Result<OptionChain> {
        let typ = if config::is_index(symbol) { "Indices" } else { "Equity" };
        let expiry_str = expiry.format(config::NSE_DATE_FORMAT).to_string();

        let url = config::nse_option_chain_url(&self.base_url, typ, symbol, &expiry_str);
        let text = self.fetch_json(&url).await?;
        let chain: OptionChain = serde_json::from_str(&text).context("Failed to parse option chain")?;

        Ok(chain)
    }

    /// Chain for (symbol, expiry), reusing the snapshot while it is fresh
    async fn chain_for(&self, symbol: &str, expiry: NaiveDate) -> Result<Arc<OptionChain>> {
        {
            let snapshot = self.snapshot.read().await;
            if let Some(s) = snapshot.as_ref() {
                if s.symbol == symbol && s.expiry == expiry && s.is_fresh() {
                    return Ok(Arc::clone(&s.chain));
                }
            }
        }

        let chain = Arc::new(self.fetch_option_chain(symbol, expiry).await?);

        let mut snapshot = self.snapshot.write().await;
        *snapshot = Some(ChainSnapshot {
            symbol: symbol.to_string(),
            expiry,
            fetched_at: Instant::now(),
            chain: Arc::clone(&chain),
        });

        Ok(chain)
    }

    /// Expiry whose chain serves a quote: the one last requested while still tradable,
    /// then the pinned one, then the nearest listed.
    async fn quote_expiry(&self, symbol: &str) -> Result<NaiveDate> {
        let now = Utc::now();

        let last = self.last_expiry.read().await.get(symbol).copied();
        if let Some(expiry) = last.filter(|&e| select_expiry(&[e], &now).is_some()) {
            return Ok(expiry);
        }
        if let Some(expiry) = self.pinned_expiry {
            return Ok(expiry);
        }

        let expiries = self.list_expiries(symbol).await?;
        select_expiry(&expiries, &now).ok_or_else(|| anyhow!("No tradable expiry for {}", symbol))
    }
}

#[async_trait]
impl DataSource for NseClient {
    async fn get_quote(&self, underlying: &str) -> Result<Quote> {
        // Any fresh chain of this underlying carries its last price
        {
            let snapshot = self.snapshot.read().await;
            if let Some(s) = snapshot.as_ref() {
                if s.symbol == underlying && s.is_fresh() {
                    return Ok(Quote {
                        last_price: s.chain.records.underlying_value,
                    });
                }
            }
        }

        let expiry = self.quote_expiry(underlying).await?;
        let chain = self.chain_for(underlying, expiry).await?;

        Ok(Quote {
            last_price: chain.records.underlying_value,
        })
    }

    async fn get_option_chain(&self, underlying: &str, expiry: NaiveDate) -> Result<Vec<ChainRow>> {
        self.last_expiry
            .write()
            .await
            .insert(underlying.to_string(), expiry);

        let chain = self.chain_for(underlying, expiry).await?;
        Ok(chain.chain_rows())
    }

    async fn get_oi_sample(&self, instrument_id: &str) -> Result<Sample> {
        let snapshot = self.snapshot.read().await;
        let chain = &snapshot
            .as_ref()
            .ok_or_else(|| anyhow!("No option chain fetched yet"))?
            .chain;

        let oi = chain
            .open_interest(instrument_id)
            .ok_or_else(|| anyhow!("No open interest for {} in chain", instrument_id))?;
        let timestamp = chain
            .timestamp()
            .ok_or_else(|| anyhow!("Unparseable chain timestamp '{}'", chain.records.timestamp))?;

        Ok(Sample::new(timestamp, oi))
    }

    async fn list_expiries(&self, underlying: &str) -> Result<Vec<NaiveDate>> {
        {
            let listing = self.listing.read().await;
            if let Some(l) = listing.as_ref() {
                if l.symbol == underlying && l.fetched_at.elapsed() < config::SNAPSHOT_TTL {
                    return Ok(l.expiries.clone());
                }
            }
        }

        let info = self.fetch_contract_info(underlying).await?;
        let expiries = info.expiries();
        if expiries.is_empty() {
            anyhow::bail!("No expiry dates found for {}", underlying);
        }

        *self.listing.write().await = Some(ExpiryListing {
            symbol: underlying.to_string(),
            fetched_at: Instant::now(),
            expiries: expiries.clone(),
        });

        Ok(expiries)
    }
}

// -----------------------------------------------
// HTTP CLIENT BUILDER
// -----------------------------------------------
fn build_client() -> Result<Client> {
    let mut headers = header::HeaderMap::new();

    let lang = config::ACCEPT_LANGUAGES
        .choose(&mut thread_rng())
        .copied()
        .unwrap_or(config::ACCEPT_LANGUAGES[0]);
    headers.insert(header::ACCEPT_LANGUAGE, header::HeaderValue::from_str(lang)?);
    headers.insert(header::ACCEPT, header::HeaderValue::from_static("*/*"));

    Client::builder()
        .default_headers(headers)
        .cookie_store(true)
        .user_agent(config::USER_AGENT)
        .timeout(config::HTTP_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}
