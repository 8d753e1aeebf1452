//! Result types: the structured report and per-run statistics.

use serde::{Deserialize, Serialize};

/// Direction of a KPI relative to the previous period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

/// How urgent a strategic insight is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// One KPI card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialMetric {
    pub label: String,
    /// Pre-formatted by the provider, e.g. `"$1.2M"` or `"18.4%"`.
    pub value: String,
    pub trend: Trend,
    pub change: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// One point of the revenue / expenses / profit time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub period: String,
    pub revenue: f64,
    pub expenses: f64,
    pub profit: f64,
}

/// One slice of the expense breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseCategory {
    pub name: String,
    pub value: f64,
    pub color: String,
}

/// Current vs. previous period for one line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonPair {
    pub label: String,
    pub current: f64,
    pub previous: f64,
}

impl ComparisonPair {
    /// Relative change in percent, `None` when the previous value is zero.
    pub fn change_percent(&self) -> Option<f64> {
        if self.previous == 0.0 {
            None
        } else {
            Some((self.current - self.previous) / self.previous.abs() * 100.0)
        }
    }
}

/// A strategic recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub category: String,
    pub title: String,
    pub description: String,
    pub recommendation: String,
    pub severity: Severity,
}

/// The full analysis report returned by the provider.
///
/// Only produced by [`crate::schema::parse_response`]; every array is
/// guaranteed present (possibly empty) once a value of this type exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub summary: String,
    /// Currency symbol used in the document, e.g. `"$"`, `"¥"`, `"€"`.
    pub currency: String,
    pub metrics: Vec<FinancialMetric>,
    pub chart_data: Vec<ChartPoint>,
    pub expense_breakdown: Vec<ExpenseCategory>,
    pub comparison_data: Vec<ComparisonPair>,
    pub insights: Vec<Insight>,
    /// Expected in `[1, 10]`; the provider is trusted to respect the range.
    pub risk_rating: f64,
    pub risk_reason: String,
}

/// Which extraction path produced the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Text,
    Image,
}

/// Timing and size statistics for one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub payload_kind: Option<PayloadKind>,
    /// PDF pages read; 0 for images and plain text.
    pub pages: usize,
    /// Length of the extracted text or base64 string.
    pub payload_bytes: usize,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub extraction_duration_ms: u64,
    pub analysis_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// What the eager entry points return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub file_name: String,
    pub language: crate::Language,
    pub result: AnalysisResult,
    pub stats: AnalysisStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_low_to_high() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn comparison_change_percent() {
        let pair = ComparisonPair {
            label: "Revenue".into(),
            current: 120.0,
            previous: 100.0,
        };
        let pct = pair.change_percent().unwrap();
        assert!((pct - 20.0).abs() < 1e-9);

        let from_zero = ComparisonPair {
            previous: 0.0,
            ..pair
        };
        assert_eq!(from_zero.change_percent(), None);
    }

    #[test]
    fn metric_omits_absent_details() {
        let m = FinancialMetric {
            label: "EBITDA".into(),
            value: "$4.1M".into(),
            trend: Trend::Up,
            change: "+12%".into(),
            color: "#00f2ff".into(),
            details: None,
        };
        let json = serde_json::to_string(&m).unwrap();
        assert!(!json.contains("details"));
        assert!(json.contains("\"trend\":\"up\""));
    }
}
