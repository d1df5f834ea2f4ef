// Worker qualification management: grant by exam grade, grant a fresh
// qualification type, revoke from a list of workers or from everyone.

use super::{workers_with_qualification, BatchSummary, Marketplace, MarketplaceError};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

/// One graded worker from an exam report.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct GradeEntry {
    pub worker_id: String,
    pub grade: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GrantOptions {
    /// Log what would happen without calling the marketplace.
    pub dry_run: bool,
    pub notify: bool,
}

/// Read the graded workers out of a report. Accepts either a bare array or
/// an object holding the array under `results`.
pub fn grade_entries(report: &Value) -> Result<Vec<GradeEntry>, serde_json::Error> {
    let rows = match report.get("results") {
        Some(rows) => rows.clone(),
        None => report.clone(),
    };
    serde_json::from_value(rows)
}

/// Qualification score for a grade in `[0, 1]`: `ceil(grade * 100)`.
/// The product is rounded to nine decimals first so `0.9` scores 90, not 91.
pub fn qualification_value(grade: f64) -> i32 {
    let scaled = (grade * 100.0 * 1e9).round() / 1e9;
    scaled.ceil() as i32
}

/// Workers whose grade reaches `passing_grade`, with their score.
pub fn passing_workers(entries: &[GradeEntry], passing_grade: f64) -> Vec<(String, i32)> {
    entries
        .iter()
        .filter(|e| e.grade >= passing_grade)
        .map(|e| (e.worker_id.clone(), qualification_value(e.grade)))
        .collect()
}

pub fn grant_qualification<M: Marketplace + ?Sized>(
    market: &M,
    qualification: &str,
    grants: &[(String, i32)],
    opts: GrantOptions,
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for (worker, value) in grants {
        if opts.dry_run {
            info!("Dry run: {} qualified for qualification type {} with {}", worker, qualification, value);
            summary.record(worker, Ok(()));
            continue;
        }
        let result = market.associate_qualification(qualification, worker, *value, opts.notify);
        if result.is_ok() {
            info!("{} qualified for qualification type {}", worker, qualification);
        }
        summary.record(worker, result);
    }
    summary
}

/// Grant `qualification` to every worker in the report meeting the grade.
pub fn qualify_by_grade<M: Marketplace + ?Sized>(
    market: &M,
    qualification: &str,
    entries: &[GradeEntry],
    passing_grade: f64,
    opts: GrantOptions,
) -> BatchSummary {
    let grants = passing_workers(entries, passing_grade);
    info!(
        "{} of {} workers reach grade {}",
        grants.len(),
        entries.len(),
        passing_grade
    );
    grant_qualification(market, qualification, &grants, opts)
}

/// Random qualification name, ten letters long.
pub fn random_name() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .map(|c| match c.to_digit(16) {
            Some(d) => (b'a' + d as u8) as char,
            None => c,
        })
        .take(10)
        .collect()
}

/// Stands in for the id of a qualification type a dry run did not create.
pub const UNCREATED_QUALIFICATION: &str = "<new qualification>";

/// Qualification named in grant logs: the created id, or a placeholder.
pub fn grant_label(created: Option<&str>) -> &str {
    created.unwrap_or(UNCREATED_QUALIFICATION)
}

/// Create a new qualification type and grant it (value 1) to `workers`.
/// In a dry run nothing is created and no id is returned.
pub fn grant_new_qualification<M: Marketplace + ?Sized>(
    market: &M,
    workers: &[String],
    opts: GrantOptions,
) -> Result<(Option<String>, BatchSummary), MarketplaceError> {
    let created = if opts.dry_run {
        None
    } else {
        let name = random_name();
        Some(market.create_qualification_type(&name, &name)?)
    };
    let grants: Vec<(String, i32)> = workers.iter().map(|w| (w.clone(), 1)).collect();
    let summary = grant_qualification(market, grant_label(created.as_deref()), &grants, opts);
    Ok((created, summary))
}

pub fn revoke_qualification<M: Marketplace + ?Sized>(
    market: &M,
    qualification: &str,
    workers: &[String],
    dry_run: bool,
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for worker in workers {
        let result = if dry_run {
            Ok(())
        } else {
            market.disassociate_qualification(qualification, worker)
        };
        if result.is_ok() {
            info!("{} disassociates with qualification type {}", worker, qualification);
        }
        summary.record(worker, result);
    }
    summary
}

pub fn revoke_all<M: Marketplace + ?Sized>(
    market: &M,
    qualification: &str,
    dry_run: bool,
) -> Result<BatchSummary, MarketplaceError> {
    let workers = workers_with_qualification(market, qualification)?;
    Ok(revoke_qualification(market, qualification, &workers, dry_run))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn value_is_ceil_of_percent() {
        assert_eq!(qualification_value(0.9), 90);
        assert_eq!(qualification_value(0.905), 91);
        assert_eq!(qualification_value(1.0), 100);
        assert_eq!(qualification_value(0.0), 0);
        assert_eq!(qualification_value(0.57), 57);
    }

    #[test]
    fn report_rows_parse_from_array_or_results() {
        let bare = json!([{"worker_id": "W1", "grade": 0.9}]);
        let wrapped = json!({"results": [{"worker_id": "W1", "grade": 0.9}]});
        assert_eq!(grade_entries(&bare).unwrap(), grade_entries(&wrapped).unwrap());
        assert!(grade_entries(&json!({"oops": 1})).is_err());
    }

    #[test]
    fn only_passing_workers_are_kept() {
        let entries = vec![
            GradeEntry { worker_id: "W1".into(), grade: 0.9 },
            GradeEntry { worker_id: "W2".into(), grade: 0.4 },
            GradeEntry { worker_id: "W3".into(), grade: 0.8 },
        ];
        assert_eq!(
            passing_workers(&entries, 0.8),
            vec![("W1".to_string(), 90), ("W3".to_string(), 80)]
        );
    }

    #[test]
    fn grant_label_names_a_placeholder_before_creation() {
        assert_eq!(grant_label(None), "<new qualification>");
        assert_eq!(grant_label(Some("3ABC")), "3ABC");
    }

    #[test]
    fn random_name_is_ten_letters() {
        let name = random_name();
        assert_eq!(name.len(), 10);
        assert!(name.chars().all(|c| c.is_ascii_lowercase()));
    }
}
