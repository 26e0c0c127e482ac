mod artifacts;
mod filter;
mod settings;

pub use artifacts::{
    DialogueArtifacts, EntityPatterns, FunnelArtifact, OptionSpec, QuestionSpec, SCENARIOS,
    TopicKeywords, TriggerKeywords,
};
pub use filter::{MatchRule, leading_number};
pub use settings::{
    AppConfig, ArtifactSettings, CatalogSettings, DisplaySettings, FunnelSettings, LlmSection,
    RetrievalSettings, VectorSettings,
};
