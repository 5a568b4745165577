//! Conversation store for the answer widget.
//!
//! This module provides:
//! - Conversation state and the conversation API payloads
//! - A session cache of answered questions
//! - Inbound actions, outbound broadcasts and the publish/subscribe bus
//! - An HTTP client for the conversation and feedback endpoints
//! - The store that ties them together

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

pub use api::{ConversationApi, HttpConversationApi};
pub use cache::{QuestionCache, QuestionHistory};
pub use config::WidgetConfig;
pub use error::{ConversationError, ConversationResult, ServerError};
pub use events::{Action, Broadcast, EventBus, Subscription, SubscriptionId};
pub use store::ConversationStore;
pub use types::{
    AskQuestion, CachedAnswer, Conversation, FeedbackAction, Referrer, ReferrerKind, Suggestion,
};
