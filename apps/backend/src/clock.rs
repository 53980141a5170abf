//! Civil-date helpers.
//!
//! "Today" is the host's local calendar date, resolved once per handler and
//! passed down; day-based counters bind explicit UTC instants so the
//! database never has to know the host timezone.

use chrono::{DateTime, Days, Local, NaiveDate, TimeZone, Utc};

/// The local civil date right now.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// UTC instants covering the local civil day `[midnight, next midnight)`.
pub fn day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_midnight(day);
    let end = local_midnight(day + Days::new(1));
    (start, end)
}

/// The local civil date a UTC instant falls on.
pub fn local_date(instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&Local).date_naive()
}

fn local_midnight(day: NaiveDate) -> DateTime<Utc> {
    let naive = day.and_hms_opt(0, 0, 0).expect("midnight is always valid");
    // On a DST gap the earliest valid interpretation is taken.
    Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive).with_timezone(&Local))
        .with_timezone(&Utc)
}
