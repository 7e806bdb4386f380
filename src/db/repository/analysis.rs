use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::record::parse_uuid;
use crate::db::DatabaseError;
use crate::models::enums::{AnalysisKind, RiskLevel};
use crate::models::{Analysis, TIMESTAMP_FORMAT};

pub fn insert_analysis(conn: &Connection, analysis: &Analysis) -> Result<(), DatabaseError> {
    let payload = serde_json::to_string(&analysis.payload)
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;
    conn.execute(
        "INSERT INTO analyses (id, record_id, owner_id, kind, summary, payload, risk_level,
         confidence, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            analysis.id.to_string(),
            analysis.record_id.to_string(),
            analysis.owner_id.to_string(),
            analysis.kind.as_str(),
            analysis.summary,
            payload,
            analysis.risk_level.as_str(),
            analysis.confidence,
            analysis.created_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn delete_analyses_for_record(
    conn: &Connection,
    record_id: &Uuid,
) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM analyses WHERE record_id = ?1",
        params![record_id.to_string()],
    )?;
    Ok(deleted)
}

/// The current analysis for a record, if one exists.
pub fn get_analysis_for_record(
    conn: &Connection,
    record_id: &Uuid,
) -> Result<Option<Analysis>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, record_id, owner_id, kind, summary, payload, risk_level, confidence, created_at
         FROM analyses WHERE record_id = ?1 ORDER BY created_at DESC LIMIT 1",
        params![record_id.to_string()],
        |row| {
            Ok(AnalysisRow {
                id: row.get(0)?,
                record_id: row.get(1)?,
                owner_id: row.get(2)?,
                kind: row.get(3)?,
                summary: row.get(4)?,
                payload: row.get(5)?,
                risk_level: row.get(6)?,
                confidence: row.get(7)?,
                created_at: row.get(8)?,
            })
        },
    );

    match result {
        Ok(row) => Ok(Some(analysis_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn count_analyses_for_record(conn: &Connection, record_id: &Uuid) -> Result<usize, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM analyses WHERE record_id = ?1",
        params![record_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

struct AnalysisRow {
    id: String,
    record_id: String,
    owner_id: String,
    kind: String,
    summary: String,
    payload: String,
    risk_level: String,
    confidence: f64,
    created_at: String,
}

fn analysis_from_row(row: AnalysisRow) -> Result<Analysis, DatabaseError> {
    Ok(Analysis {
        id: parse_uuid(&row.id)?,
        record_id: parse_uuid(&row.record_id)?,
        owner_id: parse_uuid(&row.owner_id)?,
        kind: AnalysisKind::from_str(&row.kind)?,
        summary: row.summary,
        payload: serde_json::from_str(&row.payload)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        risk_level: RiskLevel::from_str(&row.risk_level)?,
        confidence: row.confidence,
        created_at: NaiveDateTime::parse_from_str(&row.created_at, TIMESTAMP_FORMAT)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
    })
}
