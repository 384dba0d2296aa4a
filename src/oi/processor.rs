use super::store::Series;
use crate::models::{OiChange, WindowChange};
use chrono::Duration;

/// Round to 2 decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage change from `past` to `current`; unavailable when past OI is zero
pub fn calculate_oi_change(past: u64, current: u64) -> OiChange {
    if past == 0 {
        return OiChange::Unavailable;
    }
    let pct = (current as f64 - past as f64) / past as f64 * 100.0;
    OiChange::Pct(round2(pct))
}

/// Change of the latest sample against the nearest sample at or before `latest - window`
pub fn calculate_window_change(series: &Series, window: u32) -> WindowChange {
    let unavailable = WindowChange {
        window,
        change_pct: OiChange::Unavailable,
        abs_change: None,
    };

    let Some(latest) = series.latest() else {
        return unavailable;
    };

    let target = latest.timestamp - Duration::minutes(i64::from(window));
    let Some(past) = series.nearest_at_or_before(target) else {
        return unavailable;
    };

    WindowChange {
        window,
        change_pct: calculate_oi_change(past.oi, latest.oi),
        abs_change: Some(latest.oi as i64 - past.oi as i64),
    }
}

/// Every window computed independently against the same latest sample
pub fn calculate_changes(series: &Series, windows: &[u32]) -> Vec<WindowChange> {
    windows
        .iter()
        .map(|&w| calculate_window_change(series, w))
        .collect()
}

/// Placeholder row for an instrument whose sample could not be fetched this cycle
pub fn unavailable_changes(windows: &[u32]) -> Vec<WindowChange> {
    windows
        .iter()
        .map(|&window| WindowChange {
            window,
            change_pct: OiChange::Unavailable,
            abs_change: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Instrument, Side};
    use crate::oi::store::OiStore;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    fn instrument() -> Instrument {
        Instrument {
            id: "NIFTY25DEC26000CE".to_string(),
            strike: 26000.0,
            side: Side::Call,
            expiry: NaiveDate::from_ymd_opt(2025, 12, 30).unwrap(),
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 1, 4, 0, 0).unwrap()
    }

    fn store_with(samples: &[(i64, u64)]) -> OiStore {
        let mut store = OiStore::new();
        let inst = instrument();
        for &(minutes, oi) in samples {
            store.append(&inst, t0() + Duration::minutes(minutes), oi);
        }
        store
    }

    #[test]
    fn test_ten_minute_change() {
        let store = store_with(&[(0, 1000), (10, 1200)]);
        let series = store.get(&instrument().id).unwrap();

        let change = calculate_window_change(series, 10);
        assert_eq!(change.change_pct, OiChange::Pct(20.0));
        assert_eq!(change.abs_change, Some(200));
    }

    #[test]
    fn test_zero_past_oi_is_unavailable() {
        let store = store_with(&[(0, 0), (10, 500)]);
        let series = store.get(&instrument().id).unwrap();

        let change = calculate_window_change(series, 10);
        assert_eq!(change.change_pct, OiChange::Unavailable);
        assert_eq!(change.abs_change, Some(500));
    }

    #[test]
    fn test_insufficient_history_is_unavailable() {
        let store = store_with(&[(0, 1000), (10, 1200)]);
        let series = store.get(&instrument().id).unwrap();

        let change = calculate_window_change(series, 30);
        assert_eq!(change.change_pct, OiChange::Unavailable);
        assert_eq!(change.abs_change, None);
    }

    #[test]
    fn test_uses_nearest_sample_at_or_before_target() {
        // 15m window from t=20 targets t=5; nearest at-or-before is t=3
        let store = store_with(&[(0, 900), (3, 1000), (7, 5000), (20, 900)]);
        let series = store.get(&instrument().id).unwrap();

        assert_eq!(calculate_window_change(series, 15).change_pct, OiChange::Pct(-10.0));
    }

    #[test]
    fn test_windows_are_independent() {
        let store = store_with(&[(0, 1000), (20, 1500), (25, 1200), (30, 1800)]);
        let series = store.get(&instrument().id).unwrap();

        let changes = calculate_changes(series, &[5, 10, 30]);
        assert_eq!(changes[0].change_pct, OiChange::Pct(50.0));
        assert_eq!(changes[1].change_pct, OiChange::Pct(20.0));
        assert_eq!(changes[2].change_pct, OiChange::Pct(80.0));
    }

    #[test]
    fn test_rounding_to_two_places() {
        assert_eq!(calculate_oi_change(3, 4), OiChange::Pct(33.33));
        assert_eq!(calculate_oi_change(3, 2), OiChange::Pct(-33.33));
    }

    #[test]
    fn test_idempotent_on_frozen_series() {
        let store = store_with(&[(0, 1234), (5, 1300), (10, 1111), (15, 1500)]);
        let series = store.get(&instrument().id).unwrap();

        let first = calculate_changes(series, &[5, 10, 15]);
        let second = calculate_changes(series, &[5, 10, 15]);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[test]
    fn test_empty_series() {
        let series = Series::new(instrument());
        assert_eq!(calculate_window_change(&series, 5).change_pct, OiChange::Unavailable);
    }
}
