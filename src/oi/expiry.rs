use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};

/// Exchange local time (IST, UTC+05:30)
pub fn market_offset() -> FixedOffset {
    FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()
}

/// Trading stops at 15:30 local; today's expiry is no longer tradable after that
pub fn market_close() -> NaiveTime {
    NaiveTime::from_hms_opt(15, 30, 0).unwrap()
}

/// Pick the nearest tradable expiry: skip past dates, and today's once the market has closed
pub fn select_expiry<Tz: TimeZone>(expiries: &[NaiveDate], now: &DateTime<Tz>) -> Option<NaiveDate> {
    let local = now.with_timezone(&market_offset());
    let today = local.date_naive();
    let closed = local.time() >= market_close();

    let mut sorted = expiries.to_vec();
    sorted.sort();

    sorted
        .into_iter()
        .find(|&date| date > today || (date == today && !closed))
}
