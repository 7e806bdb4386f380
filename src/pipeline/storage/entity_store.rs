use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use super::normalize::normalize_measurements;
use super::types::NormalizationReport;
use super::StorageError;
use crate::config::AI_CONFIDENCE;
use crate::db::repository;
use crate::models::enums::AnalysisKind;
use crate::models::{now_utc, Analysis};
use crate::pipeline::structuring::AnalysisPayload;

/// Replace the analysis of a record, in one transaction:
/// delete the previous analysis and measurements, insert the new analysis,
/// insert its measurements, mark the record analysis-completed.
///
/// Readers see either the old rows or the new ones, never a mix. The write
/// lock is taken up front: a deferred transaction that reads first cannot be
/// upgraded once another connection has committed.
pub fn replace_analysis(
    conn: &mut Connection,
    record_id: &Uuid,
    payload: &AnalysisPayload,
) -> Result<NormalizationReport, StorageError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let record = repository::get_record(&tx, record_id)?
        .ok_or(StorageError::RecordNotFound(*record_id))?;

    let removed_measurements = repository::delete_measurements_for_record(&tx, record_id)?;
    let removed_analyses = repository::delete_analyses_for_record(&tx, record_id)?;

    let now = now_utc();
    repository::insert_analysis(
        &tx,
        &Analysis {
            id: Uuid::new_v4(),
            record_id: record.id,
            owner_id: record.owner_id,
            kind: AnalysisKind::Comprehensive,
            summary: payload.summary().to_string(),
            payload: payload.raw.clone(),
            risk_level: payload.risk_level,
            confidence: AI_CONFIDENCE,
            created_at: now,
        },
    )?;

    let (measurements, report) = normalize_measurements(&record, payload, now);
    for measurement in &measurements {
        repository::insert_measurement(&tx, measurement)?;
    }

    repository::set_analysis_completed(&tx, record_id, true)?;
    tx.commit()?;

    tracing::info!(
        record_id = %record_id,
        stored = report.stored,
        replaced_measurements = removed_measurements,
        replaced_analyses = removed_analyses,
        "Analysis stored"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::db::Database;
    use crate::models::enums::{RecordType, Role};
    use crate::models::{Record, User};
    use crate::pipeline::structuring::parse_analysis_response;

    fn setup() -> (Connection, Uuid) {
        let conn = open_memory_database().unwrap();
        let owner = add_owner(&conn);
        let record_id = add_record(&conn, owner);
        (conn, record_id)
    }

    fn add_owner(conn: &Connection) -> Uuid {
        let owner = Uuid::new_v4();
        repository::insert_user(
            conn,
            &User {
                id: owner,
                display_name: "Jean Martin".into(),
                role: Role::Patient,
                created_at: now_utc(),
            },
        )
        .unwrap();
        owner
    }

    fn add_record(conn: &Connection, owner: Uuid) -> Uuid {
        let record_id = Uuid::new_v4();
        repository::insert_record(
            conn,
            &Record {
                id: record_id,
                owner_id: owner,
                uploaded_by: owner,
                file_name: "lipids.pdf".into(),
                content_type: "application/pdf".into(),
                storage_path: "/tmp/lipids.pdf".into(),
                content_hash: "h".into(),
                record_type: RecordType::BloodTest,
                raw_text: "LDL 162".into(),
                is_lab_report: true,
                analysis_completed: false,
                uploaded_at: now_utc(),
            },
        )
        .unwrap();
        record_id
    }

    fn payload(json: &str) -> AnalysisPayload {
        parse_analysis_response(json).unwrap()
    }

    #[test]
    fn stores_analysis_and_measurements() {
        let (mut conn, record_id) = setup();
        let report = replace_analysis(
            &mut conn,
            &record_id,
            &payload(r#"{"document_summary": "Lipids", "risk_assessment": "high",
                "lab_tests": [{"name": "LDL", "value": 162}, {"name": "HDL", "value": 41}]}"#),
        )
        .unwrap();

        assert_eq!(report.stored, 2);
        let analysis = repository::get_analysis_for_record(&conn, &record_id).unwrap().unwrap();
        assert_eq!(analysis.summary, "Lipids");
        assert_eq!(analysis.confidence, AI_CONFIDENCE);
        assert_eq!(analysis.risk_level, crate::models::enums::RiskLevel::High);
        assert_eq!(repository::get_measurements_for_record(&conn, &record_id).unwrap().len(), 2);
        assert!(repository::get_record(&conn, &record_id).unwrap().unwrap().analysis_completed);
    }

    #[test]
    fn replacement_keeps_only_latest_rows() {
        let (mut conn, record_id) = setup();
        replace_analysis(
            &mut conn,
            &record_id,
            &payload(r#"{"lab_tests": [{"name": "LDL", "value": 162}, {"name": "HDL", "value": 41}]}"#),
        )
        .unwrap();
        replace_analysis(
            &mut conn,
            &record_id,
            &payload(r#"{"lab_tests": [{"name": "Triglycerides", "value": 150}]}"#),
        )
        .unwrap();

        let rows = repository::get_measurements_for_record(&conn, &record_id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Triglycerides");
        assert_eq!(repository::count_analyses_for_record(&conn, &record_id).unwrap(), 1);
    }

    #[test]
    fn missing_record_leaves_nothing_behind() {
        let (mut conn, _) = setup();
        let ghost = Uuid::new_v4();
        let result = replace_analysis(&mut conn, &ghost, &payload("{}"));
        assert!(matches!(result, Err(StorageError::RecordNotFound(id)) if id == ghost));
        assert_eq!(repository::count_analyses_for_record(&conn, &ghost).unwrap(), 0);
    }

    #[test]
    fn concurrent_replacements_on_shared_file_do_not_fail() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("medtrend.db")).unwrap();
        let records: Vec<Uuid> = {
            let conn = db.connect().unwrap();
            let owner = add_owner(&conn);
            (0..8).map(|_| add_record(&conn, owner)).collect()
        };

        let workers: Vec<_> = records
            .iter()
            .copied()
            .map(|record_id| {
                let db = db.clone();
                std::thread::spawn(move || {
                    let panel = payload(r#"{"lab_tests": [{"name": "LDL", "value": 162}, {"name": "HDL", "value": 41}]}"#);
                    let mut failures = 0;
                    for _ in 0..40 {
                        let mut conn = db.connect().unwrap();
                        if replace_analysis(&mut conn, &record_id, &panel).is_err() {
                            failures += 1;
                        }
                    }
                    failures
                })
            })
            .collect();

        let failures: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(failures, 0);

        let conn = db.connect().unwrap();
        for record_id in &records {
            assert_eq!(repository::get_measurements_for_record(&conn, record_id).unwrap().len(), 2);
            assert_eq!(repository::count_analyses_for_record(&conn, record_id).unwrap(), 1);
        }
    }
}
