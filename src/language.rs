//! Output languages the analysis can be requested in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of report languages.
///
/// Only these four codes are accepted; free-form locale strings such as
/// `en-US` or `zh_CN` are rejected by [`Language::from_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Zh,
    En,
    Ja,
    De,
}

impl Language {
    pub const ALL: [Language; 4] = [Language::Zh, Language::En, Language::Ja, Language::De];

    /// Two-letter code.
    pub fn code(self) -> &'static str {
        match self {
            Language::Zh => "zh",
            Language::En => "en",
            Language::Ja => "ja",
            Language::De => "de",
        }
    }

    /// Name used in the instruction sent to the provider.
    pub fn display_name(self) -> &'static str {
        match self {
            Language::Zh => "Chinese (Simplified)",
            Language::En => "English",
            Language::Ja => "Japanese",
            Language::De => "German",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Returned when a string is not one of the four language codes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported language '{0}' (expected one of: zh, en, ja, de)")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zh" => Ok(Language::Zh),
            "en" => Ok(Language::En),
            "ja" => Ok(Language::Ja),
            "de" => Ok(Language::De),
            _ => Err(UnknownLanguage(s.to_string())),
        }
    }
}
