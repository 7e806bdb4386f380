//! Trend views over an owner's measurements.
//!
//! Read-only and owner-scoped. Every view orders points by effective date
//! (observation date, else extraction date) with ties broken on extraction
//! timestamp then id, so the flat, by-name and grouped views always agree.

mod aggregates;
mod types;

pub use aggregates::*;
pub use types::*;

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use rusqlite::Connection;
    use uuid::Uuid;

    use crate::db::open_memory_database;
    use crate::db::repository::{insert_measurement, insert_record, insert_user};
    use crate::models::enums::*;
    use crate::models::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn setup() -> (Connection, Uuid) {
        let conn = open_memory_database().unwrap();
        let owner = Uuid::new_v4();
        insert_user(&conn, &User {
            id: owner,
            display_name: "Jonas Weber".into(),
            role: Role::Patient,
            created_at: ts("2024-01-01 09:00:00"),
        })
        .unwrap();
        (conn, owner)
    }

    fn add_record(conn: &Connection, owner: Uuid, record_type: RecordType) -> Uuid {
        let id = Uuid::new_v4();
        insert_record(conn, &Record {
            id,
            owner_id: owner,
            uploaded_by: owner,
            file_name: "panel.pdf".into(),
            content_type: "application/pdf".into(),
            storage_path: format!("/files/{owner}/{id}_panel.pdf"),
            content_hash: "hash".into(),
            record_type,
            raw_text: "Glucose 5.4 mmol/L".into(),
            is_lab_report: true,
            analysis_completed: true,
            uploaded_at: ts("2024-02-01 10:00:00"),
        })
        .unwrap();
        id
    }

    fn add(
        conn: &Connection,
        owner: Uuid,
        record: Uuid,
        name: &str,
        observed_on: Option<(i32, u32, u32)>,
        extracted_at: &str,
        is_abnormal: bool,
    ) -> Uuid {
        let id = Uuid::new_v4();
        insert_measurement(conn, &Measurement {
            id,
            owner_id: owner,
            record_id: record,
            name: name.into(),
            category: Category::classify(None, name),
            value: 5.0,
            unit: None,
            reference_range: None,
            is_abnormal,
            observed_on: observed_on.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            extracted_at: ts(extracted_at),
            confidence: 0.9,
            trend: TrendLabel::Unknown,
        })
        .unwrap();
        id
    }

    /// Blood test and urinalysis records with mixed dated and undated values.
    fn populated() -> (Connection, Uuid) {
        let (conn, owner) = setup();
        let blood = add_record(&conn, owner, RecordType::BloodTest);
        let blood_later = add_record(&conn, owner, RecordType::BloodTest);
        let urine = add_record(&conn, owner, RecordType::Urinalysis);

        add(&conn, owner, blood, "Glucose", Some((2023, 11, 2)), "2024-02-01 10:00:00", false);
        add(&conn, owner, blood, "LDL Cholesterol", Some((2023, 11, 2)), "2024-02-01 10:00:00", true);
        add(&conn, owner, blood_later, " glucose ", None, "2024-03-05 08:00:00", true);
        add(&conn, owner, blood_later, "Hemoglobin", Some((2024, 3, 1)), "2024-03-05 08:00:00", false);
        add(&conn, owner, urine, "Protein", None, "2024-01-20 12:00:00", false);
        (conn, owner)
    }

    #[test]
    fn flat_listing_is_newest_first() {
        let (conn, owner) = populated();
        let all = list_measurements(&conn, &owner).unwrap();
        assert_eq!(all.len(), 5);
        let dates: Vec<_> = all.iter().map(Measurement::effective_date).collect();
        let mut sorted = dates.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(dates, sorted);
    }

    #[test]
    fn by_name_matches_substring_ascending() {
        let (conn, owner) = populated();
        let glucose = trend_by_name(&conn, &owner, "GLUC").unwrap();
        assert_eq!(glucose.len(), 2);
        assert!(glucose[0].effective_date() <= glucose[1].effective_date());
        assert_eq!(glucose[0].observed_on, NaiveDate::from_ymd_opt(2023, 11, 2));

        assert!(trend_by_name(&conn, &owner, "   ").unwrap().is_empty());
        assert!(trend_by_name(&conn, &owner, "ferritin").unwrap().is_empty());
    }

    #[test]
    fn grouped_partitions_by_record_type_then_name() {
        let (conn, owner) = populated();
        let groups = grouped_trend(&conn, &owner).unwrap();

        let types: Vec<_> = groups.iter().map(|g| g.record_type).collect();
        assert_eq!(types, [RecordType::BloodTest, RecordType::Urinalysis]);

        let blood = &groups[0];
        let names: Vec<_> = blood.series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Glucose", "Hemoglobin", "LDL Cholesterol"]);

        // Case and whitespace variants share one series
        let glucose = &blood.series[0];
        assert_eq!(glucose.points.len(), 2);
        assert!(glucose.points[0].effective_date() < glucose.points[1].effective_date());
        assert_eq!(blood.measurement_count(), 4);
    }

    #[test]
    fn accented_names_fold_case_beyond_ascii() {
        let (conn, owner) = setup();
        let record = add_record(&conn, owner, RecordType::BloodTest);
        add(&conn, owner, record, "Éosinophiles", Some((2024, 1, 10)), "2024-02-01 10:00:00", false);
        add(&conn, owner, record, "Östradiol", Some((2024, 1, 12)), "2024-02-01 10:00:00", false);
        add(&conn, owner, record, "éosinophiles", Some((2024, 2, 10)), "2024-02-15 10:00:00", true);

        let groups = grouped_trend(&conn, &owner).unwrap();
        assert_eq!(groups.len(), 1);
        let names: Vec<_> = groups[0].series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Éosinophiles", "Östradiol"]);
        let eos = &groups[0].series[0];
        assert_eq!(eos.points.len(), 2);
        assert!(eos.points[0].effective_date() < eos.points[1].effective_date());

        let hits = trend_by_name(&conn, &owner, "ÉOSIN").unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].name, "Éosinophiles");
        assert_eq!(hits[1].name, "éosinophiles");
        assert_eq!(trend_by_name(&conn, &owner, "östr").unwrap().len(), 1);
    }

    #[test]
    fn grouped_flattened_equals_flat_listing() {
        let (conn, owner) = populated();
        let flat: HashSet<Uuid> = list_measurements(&conn, &owner)
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();

        let grouped: Vec<Uuid> = grouped_trend(&conn, &owner)
            .unwrap()
            .into_iter()
            .flat_map(|g| g.series)
            .flat_map(|s| s.points)
            .map(|m| m.id)
            .collect();

        assert_eq!(grouped.len(), flat.len());
        assert_eq!(grouped.into_iter().collect::<HashSet<_>>(), flat);
    }

    #[test]
    fn views_are_owner_scoped() {
        let (conn, owner) = populated();
        let stranger = Uuid::new_v4();
        insert_user(&conn, &User {
            id: stranger,
            display_name: "Other".into(),
            role: Role::Patient,
            created_at: ts("2024-01-01 09:00:00"),
        })
        .unwrap();
        assert!(list_measurements(&conn, &stranger).unwrap().is_empty());
        assert!(grouped_trend(&conn, &stranger).unwrap().is_empty());
        assert_eq!(list_measurements(&conn, &owner).unwrap().len(), 5);
    }

    #[test]
    fn summary_zero_fills_categories() {
        let (conn, owner) = setup();
        let s = summary(&conn, &owner, ts("2024-03-10 00:00:00")).unwrap();
        assert_eq!(s.total, 0);
        assert_eq!(s.abnormal_fraction, 0.0);
        assert_eq!(s.by_category.len(), 8);
        assert!(s.by_category.iter().all(|c| c.count == 0));
        assert_eq!(s.by_category[0].category, Category::Hematology);
        assert!(s.recent.is_empty());
    }

    #[test]
    fn summary_counts_and_fraction() {
        let (conn, owner) = populated();
        let s = summary(&conn, &owner, ts("2024-03-10 00:00:00")).unwrap();
        assert_eq!(s.total, 5);
        assert_eq!(s.abnormal, 2);
        assert!((s.abnormal_fraction - 0.4).abs() < f64::EPSILON);

        let count_of = |c: Category| {
            s.by_category.iter().find(|x| x.category == c).map(|x| x.count).unwrap()
        };
        assert_eq!(count_of(Category::Lipids), 1);
        assert_eq!(count_of(Category::Hematology), 1);
        assert_eq!(count_of(Category::Thyroid), 0);
        assert_eq!(s.by_category.iter().map(|c| c.count).sum::<usize>(), 5);
    }

    #[test]
    fn summary_recent_window_and_limit() {
        let (conn, owner) = setup();
        let record = add_record(&conn, owner, RecordType::BloodTest);
        let now = ts("2024-06-30 12:00:00");

        add(&conn, owner, record, "Old Glucose", None, "2024-05-01 12:00:00", false);
        for day in 0..12 {
            let at = (now - Duration::days(day)).format("%Y-%m-%d %H:%M:%S").to_string();
            add(&conn, owner, record, &format!("TSH {day}"), None, &at, false);
        }

        let s = summary(&conn, &owner, now).unwrap();
        assert_eq!(s.total, 13);
        assert_eq!(s.recent.len(), crate::config::RECENT_LIMIT);
        assert_eq!(s.recent[0].name, "TSH 0");
        assert!(s.recent.iter().all(|m| m.name != "Old Glucose"));
    }
}
