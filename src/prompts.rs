//! Instruction text sent to the analysis provider.
//!
//! Callers can override the default via
//! [`crate::config::AnalyzerConfig::system_prompt`]; the template here is used
//! only when no override is provided. Both honour the `{language}` placeholder.

use crate::language::Language;
use serde_json::Value;

/// Placeholder replaced by [`Language::display_name`].
pub const LANGUAGE_PLACEHOLDER: &str = "{language}";

/// Inserted between the instruction and the document for text payloads.
pub const SOURCE_CONTENT_SEPARATOR: &str = "\n\nSource Content:\n";

/// Default analyst brief.
pub const DEFAULT_ANALYSIS_PROMPT: &str = r#"You are an elite CFO and Business Intelligence Architect.
Analyze the provided financial data and generate a hyper-professional business dashboard in JSON format.

IMPORTANT: All text in the response (summary, labels, titles, descriptions, recommendations, riskReason) MUST be in {language}.

Requirements for the JSON:
1. Summary: Clear, concise executive overview.
2. Metrics: 4 key KPIs (e.g., EBITDA, Net Margin, Current Ratio) with trend labels.
3. ChartData: At least 6 time-series data points (Revenue, Expenses, Profit).
4. ExpenseBreakdown: An array of 5-7 categories for a pie chart. Ensure they cover the majority of OpEx to form a complete picture.
5. ComparisonData: Key metrics (like Revenue, COGS, OpEx) comparing Current Period vs Previous Period.
6. Insights: 3-4 strategic high-impact recommendations.
7. RiskRating: Score 1-10.
8. RiskReason: A detailed paragraph explaining why this risk rating was given based on specific data points (liabilities, cash flow, margins).
9. Currency: The currency used in the document (e.g., "$", "¥", "€").

Tone: Objective, authoritative, and data-driven."#;

/// Build the instruction for `language`, from `custom` when given.
pub fn build_instruction(language: Language, custom: Option<&str>) -> String {
    custom
        .unwrap_or(DEFAULT_ANALYSIS_PROMPT)
        .replace(LANGUAGE_PLACEHOLDER, language.display_name())
}

/// Instruction followed by the separator and the extracted document text.
pub fn with_source_content(instruction: &str, content: &str) -> String {
    let mut out = String::with_capacity(instruction.len() + SOURCE_CONTENT_SEPARATOR.len() + content.len());
    out.push_str(instruction);
    out.push_str(SOURCE_CONTENT_SEPARATOR);
    out.push_str(content);
    out
}

/// System message for providers that cannot take a schema natively.
pub fn schema_instruction(schema: &Value) -> String {
    let rendered = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    format!(
        "Respond with a single JSON object and nothing else: no prose, no Markdown fences.\n\
         The object must conform to this schema (OpenAPI subset; every field listed under \
         \"required\" must be present and non-null):\n\n{rendered}"
    )
}
