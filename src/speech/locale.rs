use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical language selector exposed to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Chinese / English code-switching
    #[default]
    Mixed,
    En,
    Zh,
}

impl Language {
    /// Backend locale tag for this selector.
    ///
    /// `Mixed` uses the Chinese recognizer, which also handles embedded English.
    pub fn locale(&self) -> LocaleTag {
        match self {
            Language::En => LocaleTag::new("en-US"),
            Language::Zh | Language::Mixed => LocaleTag::new("zh-CN"),
        }
    }

    /// Human-readable name for prompts and logs
    pub fn label(&self) -> &'static str {
        match self {
            Language::Mixed => "ZH/EN Mixed",
            Language::En => "en",
            Language::Zh => "zh",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Mixed => write!(f, "mixed"),
            Language::En => write!(f, "en"),
            Language::Zh => write!(f, "zh"),
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mixed" => Ok(Language::Mixed),
            "en" => Ok(Language::En),
            "zh" => Ok(Language::Zh),
            other => Err(format!("unknown language '{}' (expected mixed, en or zh)", other)),
        }
    }
}

/// BCP-47 style locale tag handed to a speech backend (e.g. "en-US")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocaleTag(String);

impl LocaleTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocaleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
