mod engine;
mod reply;
mod router;
mod shaper;

pub use engine::DialogueEngine;
pub use reply::{DirectReply, ErrorKind, Reply, TurnInput};
pub use router::RouteDecision;
