//! Fixtures shared by unit tests across modules.

use serde_json::{json, Value};

/// A provider answer that satisfies every field of the response schema.
pub(crate) fn sample_response() -> Value {
    json!({
        "summary": "Revenue grew while margins held.",
        "currency": "$",
        "riskReason": "Low leverage and positive operating cash flow.",
        "riskRating": 3,
        "metrics": [
            { "label": "Net Margin", "value": "18%", "trend": "up", "change": "+2pp", "color": "#00f2ff" },
            { "label": "Current Ratio", "value": "1.9", "trend": "neutral", "change": "0", "color": "#ff00aa", "details": "Stable" }
        ],
        "chartData": [
            { "period": "Q1", "revenue": 100, "expenses": 80, "profit": 20 },
            { "period": "Q2", "revenue": 120.5, "expenses": 90, "profit": 30.5 }
        ],
        "expenseBreakdown": [
            { "name": "Payroll", "value": 60, "color": "#111" },
            { "name": "Rent", "value": 20, "color": "#222" }
        ],
        "comparisonData": [
            { "label": "Revenue", "current": 220.5, "previous": 180 }
        ],
        "insights": [
            { "category": "Cost", "title": "Trim SaaS", "description": "Licences overlap.", "recommendation": "Consolidate vendors.", "severity": "medium" }
        ]
    })
}

/// [`sample_response`] parsed into the typed report.
pub(crate) fn sample_result() -> crate::AnalysisResult {
    crate::schema::parse_response(&sample_response().to_string()).expect("fixture is valid")
}
