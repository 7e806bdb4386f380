use chrono::NaiveDateTime;
use uuid::Uuid;

use super::types::NormalizationReport;
use crate::config::AI_CONFIDENCE;
use crate::models::enums::Category;
use crate::models::{Measurement, Record};
use crate::pipeline::structuring::{AnalysisPayload, EntryRejection, MeasurementEntry};

/// Explode an analysis into measurement rows for `record`.
///
/// Each entry stands alone: a bad entry is skipped and counted, the rest
/// still become rows. Entries without a numeric value are never stored as zero.
pub fn normalize_measurements(
    record: &Record,
    payload: &AnalysisPayload,
    extracted_at: NaiveDateTime,
) -> (Vec<Measurement>, NormalizationReport) {
    let mut report = NormalizationReport::default();
    let mut measurements = Vec::new();

    for (index, entry) in payload.measurement_entries().enumerate() {
        match MeasurementEntry::from_value(entry) {
            Ok(entry) => measurements.push(Measurement {
                id: Uuid::new_v4(),
                owner_id: record.owner_id,
                record_id: record.id,
                category: Category::classify(entry.category.as_deref(), &entry.name),
                name: entry.name,
                value: entry.value,
                unit: entry.unit,
                reference_range: entry.reference_range,
                is_abnormal: entry.is_abnormal,
                observed_on: entry.date,
                extracted_at,
                confidence: AI_CONFIDENCE,
                trend: entry.trend,
            }),
            Err(EntryRejection::NullValue) => report.skipped_null += 1,
            Err(EntryRejection::Malformed(reason)) => {
                tracing::debug!(record_id = %record.id, index, reason = %reason, "Entry skipped");
                report.skipped_malformed += 1;
            }
        }
    }

    report.stored = measurements.len();
    if report.skipped() > 0 {
        tracing::warn!(
            record_id = %record.id,
            skipped_null = report.skipped_null,
            skipped_malformed = report.skipped_malformed,
            "Some analysis entries were not stored"
        );
    }
    (measurements, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{RecordType, TrendLabel};
    use crate::pipeline::structuring::parse_analysis_response;
    use chrono::NaiveDate;

    fn record() -> Record {
        let owner = Uuid::new_v4();
        Record {
            id: Uuid::new_v4(),
            owner_id: owner,
            uploaded_by: owner,
            file_name: "panel.pdf".into(),
            content_type: "application/pdf".into(),
            storage_path: "/tmp/panel.pdf".into(),
            content_hash: "h".into(),
            record_type: RecordType::BloodTest,
            raw_text: String::new(),
            is_lab_report: true,
            analysis_completed: false,
            uploaded_at: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn mixed_entries_are_counted() {
        let payload = parse_analysis_response(
            r#"{
              "lab_tests": [
                {"name": "LDL Cholesterol", "category": "lipid panel", "value": 162, "unit": "mg/dL",
                 "is_abnormal": true, "date": "2024-04-28", "trend": "declining"},
                {"name": "HDL Cholesterol", "value": null},
                {"name": "Nitrites", "value": "negative"}
              ],
              "other_measurements": [
                {"name": "Heart rate", "value": "72"},
                {"value": 5}
              ]
            }"#,
        )
        .unwrap();
        let record = record();
        let extracted_at = record.uploaded_at;

        let (rows, report) = normalize_measurements(&record, &payload, extracted_at);

        assert_eq!(
            report,
            NormalizationReport { stored: 2, skipped_null: 1, skipped_malformed: 2 }
        );
        assert_eq!(rows[0].name, "LDL Cholesterol");
        assert_eq!(rows[0].category, Category::Lipids);
        assert_eq!(rows[0].observed_on, NaiveDate::from_ymd_opt(2024, 4, 28));
        assert_eq!(rows[0].trend, TrendLabel::Declining);
        assert_eq!(rows[0].confidence, AI_CONFIDENCE);
        assert_eq!(rows[1].category, Category::Other);
        assert_eq!(rows[1].value, 72.0);
        assert!(rows.iter().all(|m| m.owner_id == record.owner_id && m.record_id == record.id));
    }

    #[test]
    fn sub_panels_do_not_become_rows() {
        let payload = parse_analysis_response(
            r#"{"elements": [{"name": "Zinc", "value": 90}], "metals": [{"name": "Lead", "value": 1}]}"#,
        )
        .unwrap();
        let (rows, report) = normalize_measurements(&record(), &payload, record().uploaded_at);
        assert!(rows.is_empty());
        assert_eq!(report, NormalizationReport::default());
    }
}
