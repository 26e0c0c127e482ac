mod controller;
mod session;

pub use controller::FunnelController;
pub use session::{
    AnswerOutcome, BatchStart, FunnelError, FunnelOutcome, OptionView, Preference, QuestionCard,
    Scenario, SessionSnapshot, StartedSession,
};
