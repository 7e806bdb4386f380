use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, TransactionBehavior};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::RecordType;
use crate::models::{Record, TIMESTAMP_FORMAT};

const RECORD_COLUMNS: &str = "id, owner_id, uploaded_by, file_name, content_type, storage_path,
     content_hash, record_type, raw_text, is_lab_report, analysis_completed, uploaded_at";

pub fn insert_record(conn: &Connection, record: &Record) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO records ({RECORD_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            record.id.to_string(),
            record.owner_id.to_string(),
            record.uploaded_by.to_string(),
            record.file_name,
            record.content_type,
            record.storage_path,
            record.content_hash,
            record.record_type.as_str(),
            record.raw_text,
            record.is_lab_report as i32,
            record.analysis_completed as i32,
            record.uploaded_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_record(conn: &Connection, id: &Uuid) -> Result<Option<Record>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1"))?;
    let result = stmt.query_row(params![id.to_string()], record_row_from_rusqlite);

    match result {
        Ok(row) => Ok(Some(record_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All records for an owner, newest upload first.
pub fn list_records_for_owner(
    conn: &Connection,
    owner_id: &Uuid,
) -> Result<Vec<Record>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM records WHERE owner_id = ?1 ORDER BY uploaded_at DESC"
    ))?;
    let rows = stmt.query_map(params![owner_id.to_string()], record_row_from_rusqlite)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(record_from_row(row?)?);
    }
    Ok(records)
}

pub fn set_analysis_completed(
    conn: &Connection,
    record_id: &Uuid,
    completed: bool,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE records SET analysis_completed = ?2 WHERE id = ?1",
        params![record_id.to_string(), completed as i32],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Record".into(),
            id: record_id.to_string(),
        });
    }
    Ok(())
}

/// Delete a record and everything derived from it, in one transaction.
///
/// Measurements and analyses go first so no row ever references a missing record.
pub fn delete_record_cascade(conn: &mut Connection, record_id: &Uuid) -> Result<(), DatabaseError> {
    let id = record_id.to_string();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let deleted_measurements =
        tx.execute("DELETE FROM measurements WHERE record_id = ?1", params![id])?;
    let deleted_analyses = tx.execute("DELETE FROM analyses WHERE record_id = ?1", params![id])?;
    let deleted = tx.execute("DELETE FROM records WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Record".into(),
            id,
        });
    }
    tx.commit()?;

    tracing::info!(
        record_id = %record_id,
        measurements = deleted_measurements,
        analyses = deleted_analyses,
        "Record cascade-deleted"
    );
    Ok(())
}

// Internal row type for Record mapping
struct RecordRow {
    id: String,
    owner_id: String,
    uploaded_by: String,
    file_name: String,
    content_type: String,
    storage_path: String,
    content_hash: String,
    record_type: String,
    raw_text: String,
    is_lab_report: i32,
    analysis_completed: i32,
    uploaded_at: String,
}

fn record_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<RecordRow, rusqlite::Error> {
    Ok(RecordRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        uploaded_by: row.get(2)?,
        file_name: row.get(3)?,
        content_type: row.get(4)?,
        storage_path: row.get(5)?,
        content_hash: row.get(6)?,
        record_type: row.get(7)?,
        raw_text: row.get(8)?,
        is_lab_report: row.get(9)?,
        analysis_completed: row.get(10)?,
        uploaded_at: row.get(11)?,
    })
}

fn record_from_row(row: RecordRow) -> Result<Record, DatabaseError> {
    Ok(Record {
        id: parse_uuid(&row.id)?,
        owner_id: parse_uuid(&row.owner_id)?,
        uploaded_by: parse_uuid(&row.uploaded_by)?,
        file_name: row.file_name,
        content_type: row.content_type,
        storage_path: row.storage_path,
        content_hash: row.content_hash,
        record_type: RecordType::from_str(&row.record_type)?,
        raw_text: row.raw_text,
        is_lab_report: row.is_lab_report != 0,
        analysis_completed: row.analysis_completed != 0,
        uploaded_at: NaiveDateTime::parse_from_str(&row.uploaded_at, TIMESTAMP_FORMAT)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
    })
}

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}
