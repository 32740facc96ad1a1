use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// RFC 5321 path limit.
pub const MAX_EMAIL_LEN: usize = 254;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern is valid")
});

/// Why a fetched profile was left out of the migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingEmail,
    EmailTooLong,
    MalformedEmail,
}

impl SkipReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::MissingEmail => "missing_email",
            SkipReason::EmailTooLong => "email_too_long",
            SkipReason::MalformedEmail => "malformed_email",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse syntactic email check. Exotic but valid addresses may be rejected.
#[must_use]
pub fn email_skip_reason(email: Option<&str>) -> Option<SkipReason> {
    let Some(email) = email.filter(|e| !e.is_empty()) else {
        return Some(SkipReason::MissingEmail);
    };
    if email.len() > MAX_EMAIL_LEN {
        return Some(SkipReason::EmailTooLong);
    }
    if !EMAIL_RE.is_match(email) {
        return Some(SkipReason::MalformedEmail);
    }
    None
}

#[must_use]
pub fn is_eligible_email(email: Option<&str>) -> bool {
    email_skip_reason(email).is_none()
}
