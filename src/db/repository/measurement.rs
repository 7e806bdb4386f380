use std::collections::HashMap;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::record::parse_uuid;
use crate::db::DatabaseError;
use crate::models::enums::{Category, RecordType, TrendLabel};
use crate::models::{Measurement, DATE_FORMAT, TIMESTAMP_FORMAT};

const MEASUREMENT_COLUMNS: &str = "m.id, m.owner_id, m.record_id, m.name, m.category, m.value,
     m.unit, m.reference_range, m.is_abnormal, m.observed_on, m.extracted_at, m.confidence, m.trend";

/// Observation date, else the date part of the extraction timestamp.
const EFFECTIVE_DATE: &str = "COALESCE(m.observed_on, substr(m.extracted_at, 1, 10))";

pub fn insert_measurement(conn: &Connection, m: &Measurement) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO measurements (id, owner_id, record_id, name, category, value, unit,
         reference_range, is_abnormal, observed_on, extracted_at, confidence, trend)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            m.id.to_string(),
            m.owner_id.to_string(),
            m.record_id.to_string(),
            m.name,
            m.category.as_str(),
            m.value,
            m.unit,
            m.reference_range,
            m.is_abnormal as i32,
            m.observed_on.map(|d| d.format(DATE_FORMAT).to_string()),
            m.extracted_at.format(TIMESTAMP_FORMAT).to_string(),
            m.confidence,
            m.trend.as_str(),
        ],
    )?;
    Ok(())
}

pub fn delete_measurements_for_record(
    conn: &Connection,
    record_id: &Uuid,
) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM measurements WHERE record_id = ?1",
        params![record_id.to_string()],
    )?;
    Ok(deleted)
}

pub fn get_measurements_for_record(
    conn: &Connection,
    record_id: &Uuid,
) -> Result<Vec<Measurement>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MEASUREMENT_COLUMNS} FROM measurements m
         WHERE m.record_id = ?1 ORDER BY {EFFECTIVE_DATE} ASC, m.extracted_at ASC, m.id ASC"
    ))?;
    let rows = stmt.query_map(params![record_id.to_string()], measurement_row_from_rusqlite)?;
    collect_measurements(rows)
}

/// Every measurement of an owner, most recent effective date first.
pub fn get_measurements_for_owner(
    conn: &Connection,
    owner_id: &Uuid,
) -> Result<Vec<Measurement>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MEASUREMENT_COLUMNS} FROM measurements m
         WHERE m.owner_id = ?1
         ORDER BY {EFFECTIVE_DATE} DESC, m.extracted_at DESC, m.id DESC"
    ))?;
    let rows = stmt.query_map(params![owner_id.to_string()], measurement_row_from_rusqlite)?;
    collect_measurements(rows)
}

/// Measurements whose name contains `name_fragment` (case-insensitive), oldest first.
///
/// SQLite's `LOWER` and `LIKE` only fold ASCII, so names are matched after loading.
pub fn get_measurements_by_name(
    conn: &Connection,
    owner_id: &Uuid,
    name_fragment: &str,
) -> Result<Vec<Measurement>, DatabaseError> {
    let needle = name_fragment.trim().to_lowercase();
    let mut stmt = conn.prepare(&format!(
        "SELECT {MEASUREMENT_COLUMNS} FROM measurements m
         WHERE m.owner_id = ?1
         ORDER BY {EFFECTIVE_DATE} ASC, m.extracted_at ASC, m.id ASC"
    ))?;
    let rows = stmt.query_map(params![owner_id.to_string()], measurement_row_from_rusqlite)?;

    let mut matches = Vec::new();
    for row in rows {
        let measurement = measurement_from_row(row?)?;
        if measurement.name.to_lowercase().contains(&needle) {
            matches.push(measurement);
        }
    }
    Ok(matches)
}

/// Measurements paired with their record's declared type, ordered by record type
/// then effective date ascending.
pub fn get_measurements_with_record_type(
    conn: &Connection,
    owner_id: &Uuid,
) -> Result<Vec<(RecordType, Measurement)>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MEASUREMENT_COLUMNS}, r.record_type FROM measurements m
         JOIN records r ON r.id = m.record_id
         WHERE m.owner_id = ?1
         ORDER BY r.record_type ASC, {EFFECTIVE_DATE} ASC, m.extracted_at ASC, m.id ASC"
    ))?;
    let rows = stmt.query_map(params![owner_id.to_string()], |row| {
        let measurement = measurement_row_from_rusqlite(row)?;
        let record_type: String = row.get(13)?;
        Ok((record_type, measurement))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (record_type, measurement) = row?;
        out.push((
            RecordType::from_str(&record_type)?,
            measurement_from_row(measurement)?,
        ));
    }
    Ok(out)
}

/// Most recently extracted measurements of an owner, optionally excluding one record.
/// Used as trend context for the inference service.
pub fn get_recent_measurements(
    conn: &Connection,
    owner_id: &Uuid,
    exclude_record: Option<&Uuid>,
    limit: usize,
) -> Result<Vec<Measurement>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MEASUREMENT_COLUMNS} FROM measurements m
         WHERE m.owner_id = ?1 AND (?2 IS NULL OR m.record_id != ?2)
         ORDER BY m.extracted_at DESC, m.id DESC
         LIMIT ?3"
    ))?;
    let rows = stmt.query_map(
        params![
            owner_id.to_string(),
            exclude_record.map(|id| id.to_string()),
            limit as i64
        ],
        measurement_row_from_rusqlite,
    )?;
    collect_measurements(rows)
}

/// Measurements extracted at or after `since`, newest extraction first.
pub fn get_measurements_extracted_since(
    conn: &Connection,
    owner_id: &Uuid,
    since: &NaiveDateTime,
    limit: usize,
) -> Result<Vec<Measurement>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MEASUREMENT_COLUMNS} FROM measurements m
         WHERE m.owner_id = ?1 AND m.extracted_at >= ?2
         ORDER BY m.extracted_at DESC, {EFFECTIVE_DATE} DESC, m.id DESC
         LIMIT ?3"
    ))?;
    let rows = stmt.query_map(
        params![
            owner_id.to_string(),
            since.format(TIMESTAMP_FORMAT).to_string(),
            limit as i64
        ],
        measurement_row_from_rusqlite,
    )?;
    collect_measurements(rows)
}

/// Measurement count per category for an owner. Categories without rows are absent.
pub fn count_measurements_by_category(
    conn: &Connection,
    owner_id: &Uuid,
) -> Result<HashMap<Category, usize>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT category, COUNT(*) FROM measurements WHERE owner_id = ?1 GROUP BY category",
    )?;
    let rows = stmt.query_map(params![owner_id.to_string()], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts = HashMap::new();
    for row in rows {
        let (category, count) = row?;
        counts.insert(Category::from_str(&category)?, count as usize);
    }
    Ok(counts)
}

/// (total, abnormal) measurement counts for an owner.
pub fn count_measurements(conn: &Connection, owner_id: &Uuid) -> Result<(usize, usize), DatabaseError> {
    let (total, abnormal): (i64, Option<i64>) = conn.query_row(
        "SELECT COUNT(*), SUM(is_abnormal) FROM measurements WHERE owner_id = ?1",
        params![owner_id.to_string()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok((total as usize, abnormal.unwrap_or(0) as usize))
}

// Internal row type for Measurement mapping
struct MeasurementRow {
    id: String,
    owner_id: String,
    record_id: String,
    name: String,
    category: String,
    value: f64,
    unit: Option<String>,
    reference_range: Option<String>,
    is_abnormal: i32,
    observed_on: Option<String>,
    extracted_at: String,
    confidence: f64,
    trend: String,
}

fn measurement_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<MeasurementRow, rusqlite::Error> {
    Ok(MeasurementRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        record_id: row.get(2)?,
        name: row.get(3)?,
        category: row.get(4)?,
        value: row.get(5)?,
        unit: row.get(6)?,
        reference_range: row.get(7)?,
        is_abnormal: row.get(8)?,
        observed_on: row.get(9)?,
        extracted_at: row.get(10)?,
        confidence: row.get(11)?,
        trend: row.get(12)?,
    })
}

fn measurement_from_row(row: MeasurementRow) -> Result<Measurement, DatabaseError> {
    Ok(Measurement {
        id: parse_uuid(&row.id)?,
        owner_id: parse_uuid(&row.owner_id)?,
        record_id: parse_uuid(&row.record_id)?,
        name: row.name,
        category: Category::from_str(&row.category)?,
        value: row.value,
        unit: row.unit,
        reference_range: row.reference_range,
        is_abnormal: row.is_abnormal != 0,
        observed_on: row
            .observed_on
            .and_then(|d| NaiveDate::parse_from_str(&d, DATE_FORMAT).ok()),
        extracted_at: NaiveDateTime::parse_from_str(&row.extracted_at, TIMESTAMP_FORMAT)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        confidence: row.confidence,
        trend: TrendLabel::from_str(&row.trend).unwrap_or(TrendLabel::Unknown),
    })
}

fn collect_measurements<I>(rows: I) -> Result<Vec<Measurement>, DatabaseError>
where
    I: Iterator<Item = Result<MeasurementRow, rusqlite::Error>>,
{
    let mut measurements = Vec::new();
    for row in rows {
        measurements.push(measurement_from_row(row?)?);
    }
    Ok(measurements)
}
