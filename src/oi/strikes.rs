use crate::models::Side;

/// Find ATM strike (closest to price, prefer floor on a tie)
pub fn find_atm(price: f64, strikes: &[f64]) -> Option<f64> {
    if !price.is_finite() {
        return None;
    }

    let mut closest: Option<f64> = None;
    let mut min_distance = f64::MAX;

    // Ascending scan with strict `<` keeps the lower strike on a tie
    for &strike in strikes {
        let distance = (strike - price).abs();
        if distance < min_distance {
            min_distance = distance;
            closest = Some(strike);
        }
    }

    closest
}

/// Select ATM ±n strikes, clipped at the ends of the list
pub fn select_band(atm: f64, strikes: &[f64], n: usize) -> Vec<f64> {
    let Some(atm_index) = strikes.iter().position(|&s| s == atm) else {
        return Vec::new();
    };

    let start = atm_index.saturating_sub(n);
    let end = atm_index.saturating_add(n).saturating_add(1).min(strikes.len());

    strikes[start..end].to_vec()
}

/// Classify a strike as "ATM", "k ITM" or "k OTM" by its distance in the band
pub fn moneyness(strike: f64, atm: f64, band: &[f64], side: Side) -> String {
    if strike == atm {
        return "ATM".to_string();
    }

    let atm_index = band.iter().position(|&s| s == atm);
    let strike_index = band.iter().position(|&s| s == strike);

    let distance = match (atm_index, strike_index) {
        (Some(a), Some(s)) => a.abs_diff(s),
        _ => 0,
    };

    // Call: below ATM = ITM. Put: above ATM = ITM
    let itm = match side {
        Side::Call => strike < atm,
        Side::Put => strike > atm,
    };

    if itm {
        format!("{} ITM", distance)
    } else {
        format!("{} OTM", distance)
    }
}

/// Sorted, de-duplicated strike list from raw chain strikes
pub fn normalize_strikes(mut strikes: Vec<f64>) -> Vec<f64> {
    strikes.retain(|s| s.is_finite());
    strikes.sort_by(|a, b| a.total_cmp(b));
    strikes.dedup();
    strikes
}
