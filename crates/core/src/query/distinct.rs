use crate::snapshot::SnapshotTable;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableFilters {
    pub tickers: Vec<String>,
    pub models: Vec<String>,
    pub month_years: Vec<String>,
}

/// Sorted, de-duplicated values of each filter column across the whole table.
pub fn available_filters(table: &SnapshotTable) -> AvailableFilters {
    let mut tickers = BTreeSet::new();
    let mut models = BTreeSet::new();
    let mut month_years = BTreeSet::new();

    for r in table.rows() {
        tickers.insert(r.ticker.as_str());
        models.insert(r.model.as_str());
        month_years.insert(r.month_year.as_str());
    }

    AvailableFilters {
        tickers: tickers.into_iter().map(String::from).collect(),
        models: models.into_iter().map(String::from).collect(),
        month_years: month_years.into_iter().map(String::from).collect(),
    }
}
