// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Column codecs shared by the repositories.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::error::{DbError, Result};

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
	ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(raw)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("invalid timestamp '{raw}': {e}")))
}

pub(crate) fn parse_opt_ts(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
	raw.as_deref().map(parse_ts).transpose()
}

pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid> {
	Uuid::parse_str(raw).map_err(|e| DbError::Internal(format!("invalid uuid '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn formatted_timestamps_sort_like_times(a in 0i64..4_000_000_000_000_000, b in 0i64..4_000_000_000_000_000) {
			let ta = DateTime::from_timestamp_micros(a).unwrap();
			let tb = DateTime::from_timestamp_micros(b).unwrap();
			prop_assert_eq!(format_ts(ta).cmp(&format_ts(tb)), ta.cmp(&tb));
			prop_assert_eq!(parse_ts(&format_ts(ta)).unwrap(), ta);
		}
	}
}
