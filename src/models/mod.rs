pub mod enums;
pub mod user;
pub mod record;
pub mod analysis;
pub mod measurement;

pub use user::*;
pub use record::*;
pub use analysis::*;
pub use measurement::*;

use chrono::NaiveDateTime;

/// Storage format for timestamps. Fixed-width so that TEXT ordering is chronological.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Storage format for calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Current UTC time, truncated to the precision we persist.
pub fn now_utc() -> NaiveDateTime {
    let now = chrono::Utc::now().naive_utc();
    NaiveDateTime::parse_from_str(&now.format(TIMESTAMP_FORMAT).to_string(), TIMESTAMP_FORMAT)
        .unwrap_or(now)
}
