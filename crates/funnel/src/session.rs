use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use lapadvisor_config::{MatchRule, OptionSpec, QuestionSpec};

/// Coarse per-session use case. Chosen once at session start from the query
/// and immutable thereafter; it only selects the question ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    Gaming,
    Business,
    Study,
    Creation,
    General,
}

impl Scenario {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "gaming" => Some(Self::Gaming),
            "business" => Some(Self::Business),
            "study" => Some(Self::Study),
            "creation" => Some(Self::Creation),
            "general" => Some(Self::General),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gaming => "gaming",
            Self::Business => "business",
            Self::Study => "study",
            Self::Creation => "creation",
            Self::General => "general",
        }
    }
}

/// The transport-facing view of one funnel question. Filters stay internal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionCard {
    pub feature_id: String,
    pub question: String,
    pub options: Vec<OptionView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionView {
    pub option_id: String,
    pub label: String,
    pub description: String,
}

impl QuestionCard {
    pub fn from_spec(feature_id: &str, spec: &QuestionSpec) -> Self {
        Self {
            feature_id: feature_id.to_string(),
            question: spec.question.clone(),
            options: spec
                .options
                .iter()
                .map(|o| OptionView {
                    option_id: o.option_id.clone(),
                    label: o.label.clone(),
                    description: o.description.clone(),
                })
                .collect(),
        }
    }
}

/// One recorded choice, kept in question order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preference {
    pub feature_id: String,
    pub question: String,
    pub option_id: String,
    pub label: String,
}

/// Everything the retrieval planner needs once the funnel completes.
#[derive(Debug, Clone)]
pub struct FunnelOutcome {
    pub session_id: String,
    pub scenario: Scenario,
    pub preferences: Vec<Preference>,
    /// Conjunction of every chosen option's filter entries.
    pub filters: Vec<(String, MatchRule)>,
    /// The original query rewritten to carry the stated preferences.
    pub enhanced_query: String,
    pub original_query: String,
}

/// Result of `start`: the session handle plus the first question.
#[derive(Debug, Clone)]
pub struct StartedSession {
    pub session_id: String,
    pub scenario: Scenario,
    pub question: QuestionCard,
    pub step_index: usize,
    pub total_steps: usize,
}

/// Result of `start_batch`: the full question list at once.
#[derive(Debug, Clone)]
pub struct BatchStart {
    pub session_id: String,
    pub scenario: Scenario,
    pub questions: Vec<QuestionCard>,
}

/// What an answer produced. `Repeat` re-emits the current question without
/// mutating the session; its note is set for validation failures and unset
/// for stale-step submissions.
#[derive(Debug, Clone)]
pub enum AnswerOutcome {
    Next { question: QuestionCard, step_index: usize, total_steps: usize },
    Repeat { question: QuestionCard, step_index: usize, total_steps: usize, note: Option<String> },
    Complete(FunnelOutcome),
}

/// Read-only progress view for transports that render progress bars.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub scenario: Scenario,
    pub step_index: usize,
    pub total_steps: usize,
    pub answers: IndexMap<String, String>,
}

#[derive(Debug, Error)]
pub enum FunnelError {
    #[error("no funnel session with id {0}")]
    SessionNotFound(String),
    #[error("funnel session {0} has expired")]
    SessionExpired(String),
    #[error("no funnel questions are configured for scenario {0}")]
    NoQuestions(&'static str),
}

/// Runtime state of one funnel session. Private to the controller: callers
/// see only ids and events so the storage can change without API impact.
#[derive(Debug)]
pub(crate) struct Session {
    pub id: String,
    pub original_query: String,
    pub scenario: Scenario,
    pub question_order: Vec<String>,
    pub step_index: usize,
    /// feature_id → option_id, insertion-ordered to match `question_order`.
    pub answers: IndexMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn is_terminal(&self) -> bool {
        self.step_index >= self.question_order.len()
    }

    pub fn current_feature(&self) -> Option<&str> {
        self.question_order.get(self.step_index).map(String::as_str)
    }
}

/// Find an option spec by id within a question.
pub(crate) fn option_by_id<'a>(spec: &'a QuestionSpec, option_id: &str) -> Option<&'a OptionSpec> {
    spec.options.iter().find(|o| o.option_id == option_id)
}
