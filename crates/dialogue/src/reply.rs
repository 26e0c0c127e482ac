use std::collections::HashMap;

use serde::Serialize;

use lapadvisor_funnel::{Preference, QuestionCard};
use lapadvisor_prompt::TableRow;

/// One user turn, as the transport hands it to the core.
#[derive(Debug, Clone)]
pub enum TurnInput {
    /// A free-text message.
    Query { text: String },
    /// A single-step funnel reply. `step` guards against stale submissions
    /// when the transport knows which question it was answering.
    FunnelAnswer {
        session_id: String,
        option_id: String,
        step: Option<usize>,
    },
    /// A one-shot funnel reply: every feature answered at once.
    FunnelBatchAnswer {
        session_id: String,
        answers: HashMap<String, String>,
    },
}

/// The canonical `{summary, table}` payload. Fallback-produced replies use
/// the exact same shape as LLM-produced ones, so consumers never branch.
#[derive(Debug, Clone, Serialize)]
pub struct DirectReply {
    pub summary: String,
    pub table: Vec<TableRow>,
}

impl DirectReply {
    pub fn prose(summary: impl Into<String>) -> Self {
        Self { summary: summary.into(), table: Vec::new() }
    }

    /// Rendering projection: every cell clipped to `width` characters. The
    /// reply itself keeps the full values.
    pub fn clipped_table(&self, width: usize) -> Vec<TableRow> {
        self.table.iter().map(|row| row.clipped(width)).collect()
    }
}

/// Error kinds a transport can receive. Everything else that goes wrong
/// after routing is absorbed into a `Direct` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SessionNotFound,
    SessionExpired,
    /// Unexpected internal failure; transports should surface a restart hint.
    Internal,
}

/// Everything `handle_turn` can produce. One turn in, one reply out; the
/// transport adapter fans a reply into wire events as it sees fit.
#[derive(Debug, Clone)]
pub enum Reply {
    Direct(DirectReply),
    /// A funnel was just opened; request the first question next.
    FunnelStart { session_id: String, message: String },
    FunnelQuestion {
        session_id: String,
        step_index: usize,
        total_steps: usize,
        question: QuestionCard,
        /// Validation note when the previous submission was rejected.
        note: Option<String>,
    },
    FunnelBatch {
        session_id: String,
        questions: Vec<QuestionCard>,
    },
    FunnelComplete {
        session_id: String,
        preferences: Vec<Preference>,
        reply: DirectReply,
    },
    Error { kind: ErrorKind, message: String },
}
