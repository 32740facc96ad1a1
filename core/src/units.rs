use chrono::NaiveDateTime;

pub const POUNDS_TO_KG: f64 = 0.453_592;

#[must_use]
pub fn pounds_to_kilograms(pounds: f64) -> f64 {
    pounds * POUNDS_TO_KG
}

/// Legacy weights are stored in the user's display unit; canonical weights are kg.
#[must_use]
pub fn normalize_weight(weight: f64, is_metric: bool) -> f64 {
    if is_metric {
        weight
    } else {
        pounds_to_kilograms(weight)
    }
}

/// Round to the nearest 0.5. Ties go to the even half-step, so 0.25 → 0.0
/// and 0.75 → 1.0, matching the values the legacy tooling stored.
#[must_use]
pub fn round_to_nearest_half(value: f64) -> f64 {
    (value * 2.0).round_ties_even() / 2.0
}

/// Normalize the planned weekly change.
///
/// The legacy value is always pounds/week. It is rounded to the nearest half
/// pound first, then halved for metric users. A true zero means "no goal" and
/// is returned as-is.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn normalize_planned_change(value: f64, is_metric: bool) -> f64 {
    if value == 0.0 {
        return value;
    }
    let rounded = round_to_nearest_half(value);
    if is_metric { rounded / 2.0 } else { rounded }
}

/// Split a local date-time into `YYYY-MM-DD` and `HH:MM:SS`.
#[must_use]
pub fn split_timestamp(timestamp: &NaiveDateTime) -> (String, String) {
    (
        timestamp.format("%Y-%m-%d").to_string(),
        timestamp.format("%H:%M:%S").to_string(),
    )
}

#[must_use]
pub fn format_date(timestamp: &NaiveDateTime) -> String {
    timestamp.format("%Y-%m-%d").to_string()
}
