//! Read-only lookups: `bitwarden_projects` and `bitwarden_secrets`.

pub mod project;
pub mod secret;

use chrono::{DateTime, SecondsFormat, Utc};
use tfbw_core::TfString;

fn timestamp(at: &DateTime<Utc>) -> TfString {
    TfString::known(at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

/// The data source `id`: the requested ids, comma-joined.
fn joined_id<'a>(ids: impl IntoIterator<Item = &'a str>) -> TfString {
    TfString::known(ids.into_iter().collect::<Vec<_>>().join(","))
}
