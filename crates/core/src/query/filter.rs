use crate::domain::prediction::{FilterQuery, PredictionRecord};
use crate::error::{NotFound, Result, SnapshotError};
use crate::snapshot::SnapshotTable;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryStatistics {
    pub total_predictions: usize,
    pub correct_predictions: u64,
    /// Percentage in `0.0..=100.0`.
    pub accuracy: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub statistics: QueryStatistics,
    pub rows: Vec<PredictionRecord>,
}

/// Exact-match filter over the table plus accuracy statistics for the matches.
///
/// An empty match set is `NotFound`, so `total_predictions` is never zero.
pub fn query(table: &SnapshotTable, q: &FilterQuery) -> Result<QueryResult> {
    let mut rows = Vec::new();
    let mut correct_predictions: u64 = 0;

    for (n, record) in table.rows().iter().enumerate() {
        if !q.matches(record) {
            continue;
        }
        let flag = record.correct_flag().ok_or_else(|| {
            SnapshotError::read(
                table.path(),
                format!("data row {}: Correct value {} is not a 0/1 flag", n + 1, record.correct),
            )
        })?;
        correct_predictions += flag;
        rows.push(record.clone());
    }

    tracing::info!(
        ticker = %q.ticker,
        model = %q.model,
        month_year = %q.month_year,
        matched = rows.len(),
        "prediction query evaluated"
    );

    if rows.is_empty() {
        return Err(SnapshotError::NotFound(NotFound::NoMatchingRows(q.clone())));
    }

    let total_predictions = rows.len();
    let accuracy = correct_predictions as f64 / total_predictions as f64 * 100.0;

    Ok(QueryResult {
        statistics: QueryStatistics {
            total_predictions,
            correct_predictions,
            accuracy,
        },
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::path::PathBuf;

    fn rec(ticker: &str, model: &str, month_year: &str, index: i64, correct: Value) -> PredictionRecord {
        PredictionRecord {
            ticker: ticker.to_string(),
            model: model.to_string(),
            month_year: month_year.to_string(),
            index: json!(index),
            actual: json!(1),
            prediction: json!(1),
            prob_class_0: json!(0.3),
            prob_class_1: json!(0.7),
            correct,
        }
    }

    fn table(rows: Vec<PredictionRecord>) -> SnapshotTable {
        SnapshotTable::new(PathBuf::from("mongodb_data_test.csv"), Vec::new(), rows)
    }

    #[test]
    fn half_correct_is_fifty_percent() {
        let t = table(vec![
            rec("AAPL", "modelA", "2024-03", 0, json!(1)),
            rec("AAPL", "modelA", "2024-03", 1, json!(0)),
        ]);

        let res = query(&t, &FilterQuery::new("AAPL", "modelA", "2024-03")).unwrap();
        assert_eq!(res.statistics.total_predictions, 2);
        assert_eq!(res.statistics.correct_predictions, 1);
        assert!((res.statistics.accuracy - 50.0).abs() < 1e-9);
    }

    #[test]
    fn returns_exact_subset_in_original_order() {
        let t = table(vec![
            rec("AAPL", "modelA", "2024-03", 0, json!(1)),
            rec("MSFT", "modelA", "2024-03", 1, json!(1)),
            rec("AAPL", "modelB", "2024-03", 2, json!(0)),
            rec("AAPL", "modelA", "2024-04", 3, json!(0)),
            rec("AAPL", "modelA", "2024-03", 4, json!(0)),
            rec("AAPL", "modelA", "2024-03", 5, json!(1)),
        ]);

        let res = query(&t, &FilterQuery::new("AAPL", "modelA", "2024-03")).unwrap();
        let indices: Vec<_> = res.rows.iter().map(|r| r.index.clone()).collect();
        assert_eq!(indices, vec![json!(0), json!(4), json!(5)]);
        assert_eq!(res.statistics.correct_predictions, 2);
        assert!((res.statistics.accuracy - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn no_match_is_not_found_never_zero_total() {
        let t = table(vec![rec("AAPL", "modelA", "2024-03", 0, json!(1))]);

        let err = query(&t, &FilterQuery::new("AAPL", "modelA", "2024-04")).unwrap_err();
        assert!(err.is_no_matching_rows());

        let err = query(&table(Vec::new()), &FilterQuery::new("AAPL", "modelA", "2024-03")).unwrap_err();
        assert!(err.is_no_matching_rows());
    }

    #[test]
    fn partial_and_case_variants_do_not_match() {
        let t = table(vec![rec("AAPL", "modelA", "2024-03", 0, json!(1))]);
        for q in [
            FilterQuery::new("AAP", "modelA", "2024-03"),
            FilterQuery::new("AAPL", "ModelA", "2024-03"),
            FilterQuery::new(" AAPL", "modelA", "2024-03"),
        ] {
            assert!(query(&t, &q).unwrap_err().is_no_matching_rows());
        }
    }

    #[test]
    fn boolean_correct_values_are_summed() {
        let t = table(vec![
            rec("AAPL", "modelA", "2024-03", 0, json!(true)),
            rec("AAPL", "modelA", "2024-03", 1, json!(true)),
            rec("AAPL", "modelA", "2024-03", 2, json!(false)),
            rec("AAPL", "modelA", "2024-03", 3, json!(1.0)),
        ]);
        let res = query(&t, &FilterQuery::new("AAPL", "modelA", "2024-03")).unwrap();
        assert_eq!(res.statistics.correct_predictions, 3);
        assert!((res.statistics.accuracy - 75.0).abs() < 1e-9);
    }

    #[test]
    fn non_flag_correct_value_is_read_error() {
        let t = table(vec![rec("AAPL", "modelA", "2024-03", 0, json!("maybe"))]);
        let err = query(&t, &FilterQuery::new("AAPL", "modelA", "2024-03")).unwrap_err();
        assert!(matches!(err, SnapshotError::Read { .. }));
    }

    #[test]
    fn unmatched_bad_flags_do_not_fail_the_query() {
        let t = table(vec![
            rec("AAPL", "modelA", "2024-03", 0, json!(1)),
            rec("MSFT", "modelA", "2024-03", 1, json!("maybe")),
        ]);
        assert!(query(&t, &FilterQuery::new("AAPL", "modelA", "2024-03")).is_ok());
    }
}
