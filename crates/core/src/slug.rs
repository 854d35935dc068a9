//! Run slug derivation.
//!
//! A slug correlates one dispatch with the provider run it triggers:
//!
//! ```text
//! <YYYYMMDD-HHMMSS>[-<zone>]-<name>
//! ```
//!
//! - the timestamp is taken at dispatch time, at second resolution, in the
//!   configured [`SlugZone`]
//! - `<zone>` is the lowercased zone abbreviation at dispatch time, present
//!   only for civil zones
//! - `<name>` is the run name root passed through [`sanitize_slug`]
//!
//! # Examples
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use weatherman_core::slug::{build_slug, SlugZone};
//!
//! let now = Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap();
//! assert_eq!(
//!     build_slug("  My Forecast!! ", &SlugZone::Utc, now),
//!     "20240115-093000-my-forecast"
//! );
//! ```

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::error::CoreError;

/// Maximum length of the sanitized name component.
pub const SLUG_MAX_LEN: usize = 80;

/// Name component used when sanitization leaves nothing behind.
pub const FALLBACK_SLUG_NAME: &str = "forecast";

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Reduce free text to a slug-safe token.
///
/// Lowercases the input, turns every run of characters outside `[a-z0-9]`
/// into a single `-`, drops leading and trailing separators and caps the
/// result at [`SLUG_MAX_LEN`] characters. May return an empty string; callers
/// that need a non-empty token use [`slug_name`].
pub fn sanitize_slug(input: &str) -> String {
    let mut out = String::with_capacity(input.len().min(SLUG_MAX_LEN));
    let mut pending_separator = false;

    for ch in input.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_separator && !out.is_empty() {
                out.push('-');
            }
            pending_separator = false;
            out.push(ch);
        } else {
            pending_separator = true;
        }
    }

    // Only ASCII is ever pushed, so byte truncation is char-safe.
    out.truncate(SLUG_MAX_LEN);
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// [`sanitize_slug`] with the [`FALLBACK_SLUG_NAME`] substituted for an
/// empty result.
pub fn slug_name(run_name_root: &str) -> String {
    let name = sanitize_slug(run_name_root);
    if name.is_empty() {
        FALLBACK_SLUG_NAME.to_string()
    } else {
        name
    }
}

/// Civil time zone used for the slug timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlugZone {
    /// UTC, no suffix.
    #[default]
    Utc,
    /// An IANA zone, rendered in local time with the abbreviation in effect
    /// at that instant (`mst` in winter, `mdt` in summer for Denver).
    Civil(Tz),
}

impl SlugZone {
    /// Resolve an IANA zone name such as `America/Denver`.
    pub fn civil(name: &str) -> Result<Self, CoreError> {
        let name = name.trim();
        name.parse::<Tz>()
            .map(Self::Civil)
            .map_err(|e| CoreError::Validation(format!("unknown time zone '{name}': {e}")))
    }

    /// Render `now` as the slug prefix for this zone.
    pub fn timestamp_prefix(&self, now: DateTime<Utc>) -> String {
        match self {
            Self::Utc => now.format(TIMESTAMP_FORMAT).to_string(),
            Self::Civil(tz) => {
                let local = now.with_timezone(tz);
                // Zones without a letter abbreviation render `%Z` as `+03`.
                let abbreviation: String = local
                    .format("%Z")
                    .to_string()
                    .chars()
                    .filter(char::is_ascii_alphanumeric)
                    .map(|c| c.to_ascii_lowercase())
                    .collect();
                let stamp = local.format(TIMESTAMP_FORMAT);
                if abbreviation.is_empty() {
                    stamp.to_string()
                } else {
                    format!("{stamp}-{abbreviation}")
                }
            }
        }
    }
}

/// Compose the full slug for a dispatch happening at `now`.
pub fn build_slug(run_name_root: &str, zone: &SlugZone, now: DateTime<Utc>) -> String {
    format!("{}-{}", zone.timestamp_prefix(now), slug_name(run_name_root))
}
