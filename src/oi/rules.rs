use crate::models::{ChangeResult, GridCell, OiChange, Side, Tally};
use serde::Serialize;
use std::collections::BTreeMap;

/// Absolute % change thresholds per lookback window (minutes)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thresholds(BTreeMap<u32, f64>);

impl Thresholds {
    pub fn new(map: BTreeMap<u32, f64>) -> Self {
        Self(map)
    }

    pub fn get(&self, window: u32) -> Option<f64> {
        self.0.get(&window).copied()
    }

    pub fn windows(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.keys().copied()
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self(BTreeMap::from([(5, 8.0), (10, 10.0), (15, 15.0), (30, 25.0)]))
    }
}

/// Breached iff the change is available and |change| > threshold
pub fn is_breached(change: OiChange, threshold: Option<f64>) -> bool {
    match (change, threshold) {
        (OiChange::Pct(pct), Some(limit)) => pct.abs() > limit,
        _ => false,
    }
}

/// Strictly more than half of all considered cells breached
pub fn is_alert(breached: usize, total: usize) -> bool {
    total > 0 && breached * 2 > total
}

#[derive(Debug, Clone, Default)]
pub struct RulesOutput {
    pub cells: Vec<GridCell>,
    pub breached: usize,
    pub total: usize,
    pub alert: bool,
    pub calls: Tally,
    pub puts: Tally,
}

/// Flatten rows into cells, flag breaches and tally them across the whole grid
pub fn run_rules(rows: &[ChangeResult], thresholds: &Thresholds) -> RulesOutput {
    let mut out = RulesOutput::default();

    for row in rows {
        let side_tally = match row.instrument.side {
            Side::Call => &mut out.calls,
            Side::Put => &mut out.puts,
        };

        for change in &row.changes {
            let breached = is_breached(change.change_pct, thresholds.get(change.window));

            side_tally.total += 1;
            if breached {
                side_tally.breached += 1;
            }

            out.cells.push(GridCell {
                instrument: row.instrument.id.clone(),
                strike: row.instrument.strike,
                side: row.instrument.side,
                window: change.window,
                change_pct: change.change_pct,
                breached,
            });
        }
    }

    out.total = out.calls.total + out.puts.total;
    out.breached = out.calls.breached + out.puts.breached;
    out.alert = is_alert(out.breached, out.total);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Instrument, WindowChange};
    use chrono::NaiveDate;

    fn row(side: Side, changes: &[(u32, OiChange)]) -> ChangeResult {
        ChangeResult {
            instrument: Instrument {
                id: format!("X{}", side.label()),
                strike: 100.0,
                side,
                expiry: NaiveDate::from_ymd_opt(2025, 12, 30).unwrap(),
            },
            moneyness: "ATM".to_string(),
            latest_oi: Some(1),
            latest_at: None,
            changes: changes
                .iter()
                .map(|&(window, change_pct)| WindowChange {
                    window,
                    change_pct,
                    abs_change: None,
                })
                .collect(),
            stale: false,
        }
    }

    #[test]
    fn test_breach_uses_absolute_value_and_strict_greater() {
        assert!(is_breached(OiChange::Pct(-10.01), Some(10.0)));
        assert!(is_breached(OiChange::Pct(10.01), Some(10.0)));
        assert!(!is_breached(OiChange::Pct(10.0), Some(10.0)));
        assert!(!is_breached(OiChange::Unavailable, Some(0.0)));
        assert!(!is_breached(OiChange::Pct(99.0), None));
    }

    #[test]
    fn test_alert_boundary() {
        assert!(is_alert(3, 4));
        assert!(!is_alert(2, 4));
        assert!(!is_alert(0, 0));
    }

    #[test]
    fn test_three_of_four_alerts() {
        let rows = vec![
            row(Side::Call, &[(5, OiChange::Pct(9.0)), (10, OiChange::Pct(11.0))]),
            row(Side::Put, &[(5, OiChange::Pct(-9.0)), (10, OiChange::Pct(1.0))]),
        ];

        let out = run_rules(&rows, &Thresholds::default());
        assert_eq!((out.breached, out.total), (3, 4));
        assert!(out.alert);
        assert_eq!(out.calls, Tally { breached: 2, total: 2 });
        assert_eq!(out.puts, Tally { breached: 1, total: 2 });
    }

    #[test]
    fn test_two_of_four_does_not_alert() {
        let rows = vec![
            row(Side::Call, &[(5, OiChange::Pct(9.0)), (10, OiChange::Pct(11.0))]),
            row(Side::Put, &[(5, OiChange::Pct(1.0)), (10, OiChange::Pct(1.0))]),
        ];

        let out = run_rules(&rows, &Thresholds::default());
        assert_eq!((out.breached, out.total), (2, 4));
        assert!(!out.alert);
    }

    #[test]
    fn test_unavailable_cells_count_toward_total_only() {
        let rows = vec![row(
            Side::Call,
            &[
                (5, OiChange::Unavailable),
                (10, OiChange::Unavailable),
                (15, OiChange::Pct(50.0)),
            ],
        )];

        let out = run_rules(&rows, &Thresholds::default());
        assert_eq!((out.breached, out.total), (1, 3));
        assert!(!out.alert);
        assert_eq!(out.cells.len(), 3);
        assert!(out.cells[2].breached);
    }
}
