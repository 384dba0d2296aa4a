use super::expiry::{market_offset, select_expiry};
use super::processor::{calculate_changes, unavailable_changes};
use super::rules::run_rules;
use super::store::{AppendOutcome, OiStore};
use super::strikes::{find_atm, moneyness, normalize_strikes, select_band};
use crate::app_config::TrackerConfig;
use crate::error::TrackerError;
use crate::models::{ChainRow, ChangeResult, Grid, Instrument, Sample, Side};
use crate::source::DataSource;
use arc_swap::ArcSwapOption;
use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// -----------------------------------------------
// PUBLISHED GRID
// -----------------------------------------------

/// Read side of the tracker. Cloning is cheap; readers never block the writer.
#[derive(Clone, Default)]
pub struct GridHandle {
    current: Arc<ArcSwapOption<Grid>>,
}

impl GridHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until the first cycle completes
    pub fn latest(&self) -> Option<Arc<Grid>> {
        self.current.load_full()
    }

    pub fn publish(&self, grid: Grid) -> Arc<Grid> {
        let grid = Arc::new(grid);
        self.current.store(Some(Arc::clone(&grid)));
        grid
    }
}

// -----------------------------------------------
// ORCHESTRATOR
// -----------------------------------------------

pub struct Orchestrator {
    source: Arc<dyn DataSource>,
    config: TrackerConfig,
    store: OiStore,
    handle: GridHandle,
    cycle: u64,
}

impl Orchestrator {
    pub fn new(source: Arc<dyn DataSource>, config: TrackerConfig) -> Self {
        Self {
            source,
            config,
            store: OiStore::new(),
            handle: GridHandle::new(),
            cycle: 0,
        }
    }

    pub fn handle(&self) -> GridHandle {
        self.handle.clone()
    }

    pub fn store(&self) -> &OiStore {
        &self.store
    }

    /// Run cycles every `refresh_interval` until cancelled. An in-flight cycle is dropped
    /// on cancellation and never published.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            underlying = %self.config.underlying,
            interval_secs = self.config.refresh_interval.as_secs(),
            "OI tracker started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("shutdown requested, abandoning in-flight cycle");
                    break;
                }
                result = self.run_cycle(Utc::now()) => {
                    if let Err(e) = result {
                        error!(error = %e, "cycle aborted, keeping last published grid");
                    }
                }
            }
        }

        info!("OI tracker stopped");
    }

    /// One refresh: quote -> chain -> band -> samples -> changes -> rules -> publish
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<Arc<Grid>, TrackerError> {
        let started = Instant::now();
        let underlying = self.config.underlying.clone();

        let expiry = self.resolve_expiry(&underlying, now).await?;

        // Step 1: Quote
        let quote = self
            .source
            .get_quote(&underlying)
            .await
            .map_err(|e| TrackerError::source_unavailable("quote", e))?;
        if !quote.last_price.is_finite() || quote.last_price <= 0.0 {
            return Err(TrackerError::SourceUnavailable(format!(
                "unusable last price {}",
                quote.last_price
            )));
        }

        // Step 2: Chain
        let chain = self
            .source
            .get_option_chain(&underlying, expiry)
            .await
            .map_err(|e| TrackerError::source_unavailable("option chain", e))?;

        // Step 3: ATM and band
        let strikes = normalize_strikes(chain.iter().map(|row| row.strike).collect());
        let atm = find_atm(quote.last_price, &strikes).ok_or_else(|| {
            TrackerError::SourceUnavailable(format!("empty option chain for {} {}", underlying, expiry))
        })?;
        let band = select_band(atm, &strikes, self.config.strikes_each_side);
        let instruments = band_instruments(&chain, &band, expiry);

        debug!(
            price = quote.last_price,
            atm,
            strikes = band.len(),
            contracts = instruments.len(),
            "strike band selected"
        );

        // Step 4: Samples, fetched concurrently and applied in band order
        let fetched = self.fetch_samples(instruments).await;

        let mut rows = Vec::with_capacity(fetched.len());
        for (instrument, result) in fetched {
            if let Some(row) = self.update_row(instrument, result, atm, &band) {
                rows.push(row);
            }
        }

        // Step 5: Thresholds and alert
        let rules = run_rules(&rows, &self.config.thresholds);

        // Step 6: Retention
        self.apply_retention(now, &rows);

        // Step 7: Publish
        self.cycle += 1;
        let grid = Grid {
            cycle: self.cycle,
            generated_at: now,
            underlying,
            underlying_price: quote.last_price,
            atm_strike: atm,
            expiry,
            rows,
            cells: rules.cells,
            breached: rules.breached,
            total: rules.total,
            alert: rules.alert,
            calls: rules.calls,
            puts: rules.puts,
        };

        info!(
            cycle = grid.cycle,
            atm = grid.atm_strike,
            breached = grid.breached,
            total = grid.total,
            alert = grid.alert,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cycle complete"
        );
        if grid.alert {
            warn!(
                breached = grid.breached,
                total = grid.total,
                "ALERT: more than half of OI cells breached their thresholds"
            );
        }

        Ok(self.handle.publish(grid))
    }

    async fn resolve_expiry(&self, underlying: &str, now: DateTime<Utc>) -> Result<NaiveDate, TrackerError> {
        if let Some(expiry) = self.config.expiry {
            return Ok(expiry);
        }

        let expiries = self
            .source
            .list_expiries(underlying)
            .await
            .map_err(|e| TrackerError::source_unavailable("expiry list", e))?;

        select_expiry(&expiries, &now).ok_or_else(|| TrackerError::NoExpiry(underlying.to_string()))
    }

    async fn fetch_samples(&self, instruments: Vec<Instrument>) -> Vec<(Instrument, anyhow::Result<Vec<Sample>>)> {
        let source = Arc::clone(&self.source);

        stream::iter(instruments)
            .map(|instrument| {
                let source = Arc::clone(&source);
                async move {
                    let result = source.get_oi_history(&instrument.id).await;
                    (instrument, result)
                }
            })
            .buffered(self.config.max_concurrent.max(1))
            .collect()
            .await
    }

    /// Append the fresh samples and compute the row. A failed fetch degrades the row to
    /// "unavailable" when history exists, and drops it otherwise.
    fn update_row(
        &mut self,
        instrument: Instrument,
        result: anyhow::Result<Vec<Sample>>,
        atm: f64,
        band: &[f64],
    ) -> Option<ChangeResult> {
        let label = moneyness(instrument.strike, atm, band, instrument.side);

        let result = result.and_then(|samples| {
            if samples.is_empty() {
                anyhow::bail!("source returned no OI points");
            }
            Ok(samples)
        });

        match result {
            Ok(mut samples) => {
                samples.sort_by_key(|s| s.timestamp);
                let latest = self.store.latest(&instrument.id).map(|s| s.timestamp);

                // Points older than what is stored were appended on an earlier cycle
                let mut appended = 0;
                for sample in samples.iter().filter(|s| latest.is_none_or(|l| s.timestamp >= l)) {
                    if self.store.append(&instrument, sample.timestamp, sample.oi) == AppendOutcome::Appended {
                        appended += 1;
                    }
                }
                if appended == 0 {
                    debug!(instrument = %instrument.id, "no new OI point this cycle");
                }

                let series = self.store.get(&instrument.id)?;
                let latest = series.latest().copied();

                Some(ChangeResult {
                    changes: calculate_changes(series, &self.config.windows),
                    instrument,
                    moneyness: label,
                    latest_oi: latest.map(|s| s.oi),
                    latest_at: latest.map(|s| s.timestamp),
                    stale: false,
                })
            }
            Err(e) => {
                let err = TrackerError::InstrumentDataMissing {
                    instrument: instrument.id.clone(),
                    reason: e.to_string(),
                };
                let latest = self.store.latest(&instrument.id).copied();

                match latest {
                    Some(latest) => {
                        warn!(
                            error = %err,
                            side = instrument.side.label(),
                            strike = instrument.strike,
                            "publishing row as unavailable"
                        );
                        Some(ChangeResult {
                            changes: unavailable_changes(&self.config.windows),
                            instrument,
                            moneyness: label,
                            latest_oi: Some(latest.oi),
                            latest_at: Some(latest.timestamp),
                            stale: true,
                        })
                    }
                    None => {
                        warn!(
                            error = %err,
                            side = instrument.side.label(),
                            strike = instrument.strike,
                            "skipping row with no history"
                        );
                        None
                    }
                }
            }
        }
    }

    fn apply_retention(&mut self, now: DateTime<Utc>, rows: &[ChangeResult]) {
        let today = now.with_timezone(&market_offset()).date_naive();
        let active: HashSet<String> = rows.iter().map(|r| r.instrument.id.clone()).collect();

        let pruned = self.store.prune(now, self.config.retention);
        let expired = self.store.retire_expired(today);
        let inactive = self.store.retire_inactive(&active, now, self.config.retention);

        if expired + inactive > 0 {
            info!(pruned, expired, inactive, tracked = self.store.len(), "retired OI series");
        }
    }
}

/// Call then put for each band strike, skipping sides missing from the chain
pub fn band_instruments(chain: &[ChainRow], band: &[f64], expiry: NaiveDate) -> Vec<Instrument> {
    let mut instruments = Vec::with_capacity(band.len() * 2);

    for &strike in band {
        let Some(row) = chain.iter().find(|row| row.strike == strike) else {
            continue;
        };

        for (side, id) in [(Side::Call, &row.call), (Side::Put, &row.put)] {
            if let Some(id) = id {
                instruments.push(Instrument {
                    id: id.clone(),
                    strike,
                    side,
                    expiry,
                });
            }
        }
    }

    instruments
}
