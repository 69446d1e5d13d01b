//! Conversational scheduling for Tempo.
//!
//! Turns free-text messages into meeting operations: intent
//! classification, rule and model extraction, per-user dialogue state
//! with multi-turn clarification and confirmation, and reply phrasing.

pub mod completion;
pub mod context;
pub mod dialogue;
pub mod error;
pub mod extract;
pub mod intent;
pub mod response;
pub mod session;
pub mod types;

pub use completion::{
    CompletionClient, CompletionError, CompletionRequest, HttpCompletionClient,
    UnavailableCompletionClient,
};
pub use dialogue::DialogueEngine;
pub use error::{ChatError, ExtractionError};
pub use extract::{MeetingIntent, MissingField};
pub use intent::{classify, Intent};
pub use session::{ConversationState, SessionStore, Turn, TurnRole};
pub use types::{ChatReply, MeetingRef, PendingAction, PendingKind};
