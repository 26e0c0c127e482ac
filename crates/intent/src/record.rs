use serde::{Deserialize, Serialize};

/// What the user is asking about. Closed set; the keyword artifact keys map
/// onto these tags and unknown keys are dropped at extractor construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Cpu,
    Gpu,
    Memory,
    Storage,
    Display,
    Battery,
    Portability,
    Price,
    Comparison,
    General,
    Unclear,
}

impl Topic {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "cpu" => Some(Self::Cpu),
            "gpu" => Some(Self::Gpu),
            "memory" => Some(Self::Memory),
            "storage" => Some(Self::Storage),
            "display" => Some(Self::Display),
            "battery" => Some(Self::Battery),
            "portability" => Some(Self::Portability),
            "price" => Some(Self::Price),
            "comparison" => Some(Self::Comparison),
            "general" => Some(Self::General),
            "unclear" => Some(Self::Unclear),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
            Self::Memory => "memory",
            Self::Storage => "storage",
            Self::Display => "display",
            Self::Battery => "battery",
            Self::Portability => "portability",
            Self::Price => "price",
            Self::Comparison => "comparison",
            Self::General => "general",
            Self::Unclear => "unclear",
        }
    }

    /// The catalog field a topic reads from, when it names exactly one.
    /// Cross-cutting topics (comparison, general, unclear) return `None`.
    pub fn spec_field(&self) -> Option<&'static str> {
        match self {
            Self::Cpu => Some("cpu"),
            Self::Gpu => Some("gpu"),
            Self::Memory => Some("memory"),
            Self::Storage => Some("storage"),
            Self::Display => Some("lcd"),
            Self::Battery => Some("battery"),
            Self::Portability => Some("weight"),
            Self::Price => Some("price"),
            Self::Comparison | Self::General | Self::Unclear => None,
        }
    }
}

/// How concretely the query pins down the catalog rows it wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryShape {
    SpecificModel,
    Series,
    Unknown,
}

/// The extractor's output for a single query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    /// Catalog-confirmed model names, in order of first mention.
    pub model_names: Vec<String>,
    /// Catalog-confirmed series keys, in order of first mention. Retained
    /// even when model names are present.
    pub series_keys: Vec<String>,
    pub topic: Topic,
    pub shape: QueryShape,
}

impl Intent {
    /// Shape per the precedence rule: named models win over series, series
    /// over nothing.
    pub fn shape_for(model_names: &[String], series_keys: &[String]) -> QueryShape {
        if !model_names.is_empty() {
            QueryShape::SpecificModel
        } else if !series_keys.is_empty() {
            QueryShape::Series
        } else {
            QueryShape::Unknown
        }
    }
}
