//! Conversational recommendation server.
//!
//! Ties the engine, providers, and storage together behind a
//! WebSocket transport: one connection is one conversation session,
//! driven by the orchestrator's state machine.

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod state;

pub use api::{router, AppState};
pub use config::Config;
pub use error::SessionError;
pub use events::{RecommendationItem, SessionEvent};
pub use orchestrator::{SessionDeps, SessionDriver, SessionSettings};
pub use state::{route_next, ConversationState, PendingQuestion, Phase, PhaseOutcome};
