use chrono::{DateTime, Utc};

use crate::models::{CanonicalMeasurement, CanonicalProfile, LegacyMeasurement, LegacyProfile};
use crate::units::{format_date, normalize_planned_change, normalize_weight, split_timestamp};
use crate::validate::{SkipReason, email_skip_reason, is_eligible_email};

/// Result of transforming one legacy profile. Skips are not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum Transformed {
    Migrated(CanonicalProfile),
    Skipped(SkipReason),
}

/// Returns why `profile` must be skipped, or `None` if it can be migrated.
///
/// Checked before the profile's measurements are fetched.
#[must_use]
pub fn skip_reason(profile: &LegacyProfile) -> Option<SkipReason> {
    email_skip_reason(profile.email.as_deref())
}

/// Convert measurements to kilograms and split their timestamps, keeping order.
#[must_use]
pub fn convert_measurements(
    measurements: &[LegacyMeasurement],
    use_metric: bool,
) -> Vec<CanonicalMeasurement> {
    measurements
        .iter()
        .map(|m| {
            let (date, time) = split_timestamp(&m.timestamp);
            CanonicalMeasurement {
                date,
                time,
                weight: normalize_weight(m.weight, use_metric),
                fat_ratio: m.fat_ratio,
            }
        })
        .collect()
}

/// A goal weight of 0 means "not set".
///
/// Goal weights are already kilograms in the legacy store, so unlike the
/// planned weekly change they are never converted.
#[must_use]
pub fn normalize_goal_weight(goal_weight: f64) -> Option<f64> {
    (goal_weight > 0.0).then_some(goal_weight)
}

/// Build the destination document for an already-validated profile.
#[must_use]
pub fn build_canonical(
    profile: &LegacyProfile,
    measurements: &[LegacyMeasurement],
    now: DateTime<Utc>,
) -> CanonicalProfile {
    debug_assert!(is_eligible_email(profile.email.as_deref()));
    let stamp = now.to_rfc3339();
    CanonicalProfile {
        email: profile.email.clone().unwrap_or_default(),
        username: profile.username.clone(),
        first_name: profile.first_name.clone(),
        use_metric: profile.use_metric,
        start_date: profile.start_date.as_ref().map(format_date),
        goal_weight: normalize_goal_weight(profile.goal_weight),
        planned_pounds_per_week: normalize_planned_change(
            profile.planned_pounds_per_week,
            profile.use_metric,
        ),
        day_start_offset: profile.day_start_offset,
        private_url_key: profile.private_url_key.clone(),
        device_type: profile.device_type.clone(),
        refresh_token: profile.refresh_token.clone(),
        measurements: convert_measurements(measurements, profile.use_metric),
        created_at: stamp.clone(),
        updated_at: stamp,
    }
}

/// Validate, then build. The orchestrator fetches measurements only after
/// `skip_reason` clears the profile, so this sees them already loaded.
#[must_use]
pub fn transform(
    profile: &LegacyProfile,
    measurements: &[LegacyMeasurement],
    now: DateTime<Utc>,
) -> Transformed {
    match skip_reason(profile) {
        Some(reason) => Transformed::Skipped(reason),
        None => Transformed::Migrated(build_canonical(profile, measurements, now)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime, TimeZone};

    fn ts(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 5, d)
            .unwrap()
            .and_hms_opt(h, 30, 0)
            .unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
    }

    fn sample_profile() -> LegacyProfile {
        LegacyProfile {
            user_id: "8e1c4c1a-0000-4000-8000-000000000001".to_string(),
            username: "erv".to_string(),
            email: Some("user@example.com".to_string()),
            first_name: "Erv".to_string(),
            use_metric: false,
            start_date: Some(ts(1, 0)),
            goal_weight: 0.0,
            planned_pounds_per_week: 1.3,
            day_start_offset: 240,
            private_url_key: "abc123".to_string(),
            device_type: Some("fitbit".to_string()),
            refresh_token: Some("refresh-token".to_string()),
        }
    }

    fn measurement(day: u32, weight: f64, fat_ratio: Option<f64>) -> LegacyMeasurement {
        LegacyMeasurement {
            user_id: sample_profile().user_id,
            timestamp: ts(day, 7),
            weight,
            fat_ratio,
        }
    }

    #[test]
    fn test_end_to_end_imperial_profile() {
        let measurements = vec![measurement(1, 150.0, None), measurement(2, 149.0, None)];
        let Transformed::Migrated(doc) = transform(&sample_profile(), &measurements, now()) else {
            panic!("expected profile to migrate");
        };

        assert_eq!(doc.email, "user@example.com");
        assert_eq!(doc.goal_weight, None);
        assert_eq!(doc.planned_pounds_per_week, 1.5);
        assert_eq!(doc.start_date.as_deref(), Some("2019-05-01"));
        assert_eq!(doc.day_start_offset, 240);
        assert_eq!(doc.measurements.len(), 2);
        assert_eq!(doc.measurements[0].date, "2019-05-01");
        assert_eq!(doc.measurements[0].time, "07:30:00");
        assert!((doc.measurements[0].weight - 68.0388).abs() < 1e-9);
        assert_eq!(doc.measurements[1].date, "2019-05-02");
        assert!((doc.measurements[1].weight - 67.585_208).abs() < 1e-9);
        assert!(doc.measurements.iter().all(|m| m.fat_ratio.is_none()));
        assert_eq!(doc.created_at, "2025-01-02T03:04:05+00:00");
        assert_eq!(doc.created_at, doc.updated_at);
    }

    #[test]
    fn test_metric_profile_keeps_weights_and_halves_planned_change() {
        let mut profile = sample_profile();
        profile.use_metric = true;
        profile.goal_weight = 72.5;
        profile.planned_pounds_per_week = 2.2;

        let measurements = vec![measurement(3, 80.4, Some(0.21))];
        let doc = build_canonical(&profile, &measurements, now());

        // Goal weight is never converted, even for imperial users
        assert_eq!(doc.goal_weight, Some(72.5));
        assert_eq!(doc.planned_pounds_per_week, 1.0);
        assert_eq!(doc.measurements[0].weight, 80.4);
        assert_eq!(doc.measurements[0].fat_ratio, Some(0.21));
    }

    #[test]
    fn test_goal_weight_not_converted_for_imperial_users() {
        let mut profile = sample_profile();
        profile.goal_weight = 70.0;
        let doc = build_canonical(&profile, &[], now());
        assert_eq!(doc.goal_weight, Some(70.0));
    }

    #[test]
    fn test_normalize_goal_weight_sentinel() {
        assert_eq!(normalize_goal_weight(0.0), None);
        assert_eq!(normalize_goal_weight(0.1), Some(0.1));
        assert_eq!(normalize_goal_weight(81.6), Some(81.6));
    }

    #[test]
    fn test_zero_planned_change_stays_zero() {
        let mut profile = sample_profile();
        profile.planned_pounds_per_week = 0.0;
        profile.use_metric = true;
        let doc = build_canonical(&profile, &[], now());
        assert_eq!(doc.planned_pounds_per_week, 0.0);
    }

    #[test]
    fn test_missing_start_date_is_none() {
        let mut profile = sample_profile();
        profile.start_date = None;
        let doc = build_canonical(&profile, &[], now());
        assert!(doc.start_date.is_none());

        let json = serde_json::to_value(&doc).unwrap();
        assert!(json["start_date"].is_null());
        assert!(json["goal_weight"].is_null());
    }

    #[test]
    fn test_measurement_order_preserved() {
        let measurements: Vec<LegacyMeasurement> = (1..=5)
            .map(|d| measurement(d, 150.0 - f64::from(d), None))
            .collect();
        let converted = convert_measurements(&measurements, false);
        let dates: Vec<&str> = converted.iter().map(|m| m.date.as_str()).collect();
        assert_eq!(
            dates,
            ["2019-05-01", "2019-05-02", "2019-05-03", "2019-05-04", "2019-05-05"]
        );
    }

    #[test]
    fn test_invalid_email_is_skipped() {
        let mut profile = sample_profile();
        profile.email = Some("not-an-email".to_string());
        assert_eq!(
            transform(&profile, &[measurement(1, 150.0, None)], now()),
            Transformed::Skipped(SkipReason::MalformedEmail)
        );

        profile.email = None;
        assert_eq!(skip_reason(&profile), Some(SkipReason::MissingEmail));
    }

    #[test]
    fn test_document_json_shape() {
        let doc = build_canonical(&sample_profile(), &[measurement(1, 150.0, Some(0.2))], now());
        let json = serde_json::to_value(&doc).unwrap();

        for key in [
            "email",
            "username",
            "first_name",
            "use_metric",
            "start_date",
            "goal_weight",
            "planned_pounds_per_week",
            "day_start_offset",
            "private_url_key",
            "device_type",
            "refresh_token",
            "measurements",
            "created_at",
            "updated_at",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
        let m = &json["measurements"][0];
        assert_eq!(m["Date"], "2019-05-01");
        assert_eq!(m["Time"], "07:30:00");
        assert_eq!(m["FatRatio"], 0.2);
        assert_eq!(json["refresh_token"], "refresh-token");
    }
}
