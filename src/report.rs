//! Derived view data for an [`AnalysisResult`] and a plain-text rendering.

use crate::output::{AnalysisResult, Severity, Trend};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};

/// Coarse reading of the risk rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskBand {
    Stable,
    Moderate,
    Critical,
}

impl RiskBand {
    /// `< 3` stable, `< 6` moderate, otherwise critical.
    pub fn from_rating(rating: f64) -> Self {
        if rating < 3.0 {
            RiskBand::Stable
        } else if rating < 6.0 {
            RiskBand::Moderate
        } else {
            RiskBand::Critical
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskBand::Stable => "STABLE",
            RiskBand::Moderate => "MODERATE",
            RiskBand::Critical => "CRITICAL",
        })
    }
}

/// `10 - riskRating`, kept within 0..=10.
pub fn health_score(rating: f64) -> f64 {
    (10.0 - rating).clamp(0.0, 10.0)
}

/// Each expense category's share of the total, in percent.
///
/// Returns all zeros when the total is not positive.
pub fn expense_shares(result: &AnalysisResult) -> Vec<(String, f64)> {
    let total: f64 = result.expense_breakdown.iter().map(|e| e.value).sum();
    result
        .expense_breakdown
        .iter()
        .map(|e| {
            let share = if total > 0.0 { e.value / total * 100.0 } else { 0.0 };
            (e.name.clone(), share)
        })
        .collect()
}

fn trend_arrow(trend: Trend) -> &'static str {
    match trend {
        Trend::Up => "▲",
        Trend::Down => "▼",
        Trend::Neutral => "■",
    }
}

/// Terminal rendering: summary, risk, metrics, series, expenses, insights.
///
/// Insights are listed most severe first.
pub fn render_text(result: &AnalysisResult) -> String {
    let mut out = String::new();
    let band = RiskBand::from_rating(result.risk_rating);

    let _ = writeln!(out, "SUMMARY");
    let _ = writeln!(out, "{}\n", result.summary.trim());

    let _ = writeln!(
        out,
        "RISK  {:.1}/10  {}  (health {:.1})",
        result.risk_rating,
        band,
        health_score(result.risk_rating)
    );
    let _ = writeln!(out, "{}\n", result.risk_reason.trim());

    if !result.metrics.is_empty() {
        let _ = writeln!(out, "KEY METRICS");
        for m in &result.metrics {
            let _ = write!(out, "  {} {}: {} ({})", trend_arrow(m.trend), m.label, m.value, m.change);
            if let Some(details) = &m.details {
                let _ = write!(out, "  {details}");
            }
            out.push('\n');
        }
        out.push('\n');
    }

    if !result.chart_data.is_empty() {
        let _ = writeln!(out, "PERFORMANCE ({})", result.currency);
        let _ = writeln!(out, "  {:<12} {:>14} {:>14} {:>14}", "Period", "Revenue", "Expenses", "Profit");
        for p in &result.chart_data {
            let _ = writeln!(
                out,
                "  {:<12} {:>14.2} {:>14.2} {:>14.2}",
                p.period, p.revenue, p.expenses, p.profit
            );
        }
        out.push('\n');
    }

    if !result.comparison_data.is_empty() {
        let _ = writeln!(out, "PERIOD OVER PERIOD");
        for c in &result.comparison_data {
            let change = c
                .change_percent()
                .map(|p| format!("{p:+.1}%"))
                .unwrap_or_else(|| "n/a".to_string());
            let _ = writeln!(
                out,
                "  {:<20} {:>14.2} → {:>14.2}  {}",
                c.label, c.previous, c.current, change
            );
        }
        out.push('\n');
    }

    if !result.expense_breakdown.is_empty() {
        let _ = writeln!(out, "EXPENSE BREAKDOWN");
        for (name, share) in expense_shares(result) {
            let _ = writeln!(out, "  {name:<20} {share:>5.1}%");
        }
        out.push('\n');
    }

    if !result.insights.is_empty() {
        let _ = writeln!(out, "INSIGHTS");
        let mut insights: Vec<_> = result.insights.iter().collect();
        insights.sort_by(|a, b| b.severity.cmp(&a.severity));
        for i in insights {
            let tag = match i.severity {
                Severity::High => "HIGH",
                Severity::Medium => "MEDIUM",
                Severity::Low => "LOW",
            };
            let _ = writeln!(out, "  [{tag}] {} ({})", i.title, i.category);
            let _ = writeln!(out, "    {}", i.description.trim());
            let _ = writeln!(out, "    → {}", i.recommendation.trim());
        }
    }

    out.trim_end().to_string() + "\n"
}
