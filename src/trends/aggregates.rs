use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;
use uuid::Uuid;

use super::types::*;
use crate::config::{RECENT_LIMIT, RECENT_WINDOW_DAYS};
use crate::db::{repository, DatabaseError};
use crate::models::enums::RecordType;
use crate::models::Measurement;

/// Every measurement of the owner, most recent effective date first.
pub fn list_measurements(conn: &Connection, owner_id: &Uuid) -> Result<Vec<Measurement>, DatabaseError> {
    repository::get_measurements_for_owner(conn, owner_id)
}

/// Measurements whose name contains `query` (case-insensitive), oldest first.
/// A blank query matches nothing.
pub fn trend_by_name(
    conn: &Connection,
    owner_id: &Uuid,
    query: &str,
) -> Result<Vec<Measurement>, DatabaseError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }
    repository::get_measurements_by_name(conn, owner_id, query)
}

/// Partition by the owning record's declared type, then by normalized name.
pub fn grouped_trend(conn: &Connection, owner_id: &Uuid) -> Result<Vec<TrendGroup>, DatabaseError> {
    let rows = repository::get_measurements_with_record_type(conn, owner_id)?;
    Ok(group_rows(rows))
}

/// Rows must arrive in effective-date order. The sort is stable, so each
/// series keeps that order.
fn group_rows(mut rows: Vec<(RecordType, Measurement)>) -> Vec<TrendGroup> {
    rows.sort_by_cached_key(|(record_type, m)| (record_type.as_str(), series_key(&m.name)));

    let mut groups: Vec<TrendGroup> = Vec::new();
    let mut current_key = String::new();

    for (record_type, measurement) in rows {
        let key = series_key(&measurement.name);

        match groups.last_mut() {
            Some(group) if group.record_type == record_type => match group.series.last_mut() {
                Some(series) if key == current_key => series.points.push(measurement),
                _ => group.series.push(new_series(measurement)),
            },
            _ => groups.push(TrendGroup {
                record_type,
                series: vec![new_series(measurement)],
            }),
        }
        current_key = key;
    }
    groups
}

fn new_series(first: Measurement) -> TrendSeries {
    TrendSeries {
        name: first.name.trim().to_string(),
        points: vec![first],
    }
}

fn series_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Totals, zero-filled per-category counts and recent extractions.
/// All reads share one transaction.
pub fn summary(
    conn: &Connection,
    owner_id: &Uuid,
    now: NaiveDateTime,
) -> Result<TrendSummary, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let conn = &*tx;

    let (total, abnormal) = repository::count_measurements(conn, owner_id)?;
    let counts = repository::count_measurements_by_category(conn, owner_id)?;

    let by_category = repository::list_categories(conn)?
        .into_iter()
        .map(|info| CategoryCount {
            count: counts.get(&info.category).copied().unwrap_or(0),
            category: info.category,
            color: info.color,
        })
        .collect();

    let since = now - Duration::days(RECENT_WINDOW_DAYS);
    let recent = repository::get_measurements_extracted_since(conn, owner_id, &since, RECENT_LIMIT)?;

    let abnormal_fraction = if total == 0 {
        0.0
    } else {
        abnormal as f64 / total as f64
    };

    tx.finish()?;

    Ok(TrendSummary {
        total,
        abnormal,
        abnormal_fraction,
        by_category,
        recent,
    })
}
