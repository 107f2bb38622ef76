use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Columns every snapshot must carry, in the order they are returned to callers.
pub const REQUIRED_COLUMNS: [&str; 9] = [
    "Ticker",
    "Model",
    "Month-Year",
    "Index",
    "Actual",
    "Prediction",
    "Prob_Class_0",
    "Prob_Class_1",
    "Correct",
];

/// Exact-match filter over (ticker, model, month-year).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterQuery {
    pub ticker: String,
    pub model: String,
    /// "YYYY-MM"
    pub month_year: String,
}

impl FilterQuery {
    pub fn new(
        ticker: impl Into<String>,
        model: impl Into<String>,
        month_year: impl Into<String>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            model: model.into(),
            month_year: month_year.into(),
        }
    }

    /// Case-sensitive, no normalization.
    pub fn matches(&self, record: &PredictionRecord) -> bool {
        record.ticker == self.ticker
            && record.model == self.model
            && record.month_year == self.month_year
    }
}

/// One row of a loaded snapshot, restricted to the required columns.
///
/// The three filter keys are kept as raw strings so matching is exact. The
/// remaining cells are inferred into JSON scalars, which is how they are served.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    #[serde(rename = "Ticker")]
    pub ticker: String,
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "Month-Year")]
    pub month_year: String,
    #[serde(rename = "Index")]
    pub index: Value,
    #[serde(rename = "Actual")]
    pub actual: Value,
    #[serde(rename = "Prediction")]
    pub prediction: Value,
    #[serde(rename = "Prob_Class_0")]
    pub prob_class_0: Value,
    #[serde(rename = "Prob_Class_1")]
    pub prob_class_1: Value,
    #[serde(rename = "Correct")]
    pub correct: Value,
}

impl PredictionRecord {
    /// The `Correct` cell as a summable 0/1 flag, or `None` if it is not one.
    pub fn correct_flag(&self) -> Option<u64> {
        match &self.correct {
            Value::Bool(b) => Some(u64::from(*b)),
            Value::Number(n) => match n.as_f64() {
                Some(v) if v == 0.0 => Some(0),
                Some(v) if v == 1.0 => Some(1),
                _ => None,
            },
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(1),
                "false" | "0" => Some(0),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Infers a JSON scalar from a raw CSV cell.
pub fn infer_cell(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    match raw {
        "True" | "true" => Value::Bool(true),
        "False" | "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}
