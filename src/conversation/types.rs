//! Core types for conversation state and the conversation API payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A response option or suggested question offered by the server.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    /// Identifier of the message this suggestion leads to.
    #[serde(default)]
    pub message_id: String,
    /// Display text.
    #[serde(default)]
    pub message: String,
}

impl Suggestion {
    /// Create a new suggestion.
    #[must_use]
    pub fn new(message_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            message: message.into(),
        }
    }
}

/// Live conversation state held by the store.
///
/// Also used as the payload of conversation-shaped broadcasts.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Server-assigned conversation id, empty until the conversation starts.
    pub conversation_id: String,
    /// Current server message text.
    pub message: String,
    /// Identifier of the current message.
    pub message_id: String,
    /// Response options for the current message.
    pub responses: Vec<Suggestion>,
    /// Suggested questions, unset until fetched.
    pub top_questions: Option<Vec<Suggestion>>,
}

impl Conversation {
    /// Whether the server has assigned a conversation id yet.
    #[must_use]
    pub fn is_started(&self) -> bool {
        !self.conversation_id.is_empty()
    }

    /// Replace the current message with a cached answer.
    pub fn apply_cached(&mut self, message_id: &str, answer: &CachedAnswer) {
        self.message_id = message_id.to_string();
        self.message.clone_from(&answer.message);
        self.responses.clone_from(&answer.responses);
    }

    /// Build a transient conversation from a cached answer, without top questions.
    #[must_use]
    pub fn from_cached(conversation_id: &str, message_id: &str, answer: &CachedAnswer) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            message: answer.message.clone(),
            message_id: message_id.to_string(),
            responses: answer.responses.clone(),
            top_questions: None,
        }
    }
}

/// A cached question/answer exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedAnswer {
    /// Server message text.
    pub message: String,
    /// Response options.
    pub responses: Vec<Suggestion>,
    /// When the answer was cached.
    pub cached_at: DateTime<Utc>,
}

impl CachedAnswer {
    /// Create an entry stamped with the current time.
    #[must_use]
    pub fn new(message: impl Into<String>, responses: Vec<Suggestion>) -> Self {
        Self {
            message: message.into(),
            responses,
            cached_at: Utc::now(),
        }
    }
}

/// Why a question was asked.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferrerKind {
    /// Free text typed by the user.
    #[default]
    Typed,
    /// One of the suggested top questions.
    TopQuestion,
    /// A refinement of the current answer.
    Refinement,
}

/// Referrer metadata attached to an outgoing question.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Referrer {
    /// Referrer type.
    #[serde(rename = "type")]
    pub kind: ReferrerKind,
    /// Message being refined, only set for refinements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl Referrer {
    /// Build the referrer for a question asked while `current_message_id` is displayed.
    #[must_use]
    pub fn for_question(kind: ReferrerKind, current_message_id: &str) -> Self {
        let message_id = (kind == ReferrerKind::Refinement && !current_message_id.is_empty())
            .then(|| current_message_id.to_string());
        Self { kind, message_id }
    }
}

/// Payload of an `ASK_QUESTION` action.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskQuestion {
    /// Identifier of a known message (e.g. a chosen response option).
    pub message_id: Option<String>,
    /// Free text question.
    pub message: Option<String>,
    /// Why the question was asked.
    pub referrer: Option<ReferrerKind>,
}

impl AskQuestion {
    /// Ask a free text question.
    #[must_use]
    pub fn typed(message: impl Into<String>) -> Self {
        Self {
            message_id: None,
            message: Some(message.into()),
            referrer: Some(ReferrerKind::Typed),
        }
    }

    /// Ask for a known message by id.
    #[must_use]
    pub fn by_id(message_id: impl Into<String>) -> Self {
        Self {
            message_id: Some(message_id.into()),
            message: None,
            referrer: None,
        }
    }

    /// Set the referrer.
    #[must_use]
    pub const fn with_referrer(mut self, referrer: ReferrerKind) -> Self {
        self.referrer = Some(referrer);
        self
    }

    /// Message id, treating an empty id as absent.
    #[must_use]
    pub fn effective_message_id(&self) -> Option<&str> {
        self.message_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Body of the ask request.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    /// Known message id, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Question text, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Referrer metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<Referrer>,
}

/// Server answer to a question.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPayload {
    /// Identifier of the answer message.
    pub message_id: String,
    /// Answer text.
    #[serde(default)]
    pub message: String,
    /// Response options.
    #[serde(default)]
    pub responses: Vec<Suggestion>,
}

/// Server reply to a conversation start.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedConversation {
    /// Server-assigned conversation id.
    pub conversation_id: String,
    /// Suggested questions, if the server sent them.
    #[serde(default)]
    pub top_questions: Option<Vec<Suggestion>>,
}

/// Feedback action reported to the feedback endpoint.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackAction {
    /// None of the offered refinements helped.
    NoHelpfulRefinements,
    /// The answer was not helpful.
    Unhelpful,
    /// The answer was helpful.
    Helpful,
    /// The user was sent to the forum.
    ForumRedirect,
}

impl FeedbackAction {
    /// Wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoHelpfulRefinements => "NO_HELPFUL_REFINEMENTS",
            Self::Unhelpful => "UNHELPFUL",
            Self::Helpful => "HELPFUL",
            Self::ForumRedirect => "FORUM_REDIRECT",
        }
    }
}

/// Body of a feedback request.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    /// Conversation the feedback belongs to.
    pub conversation_id: String,
    /// Message the feedback is about.
    pub message_id: String,
    /// What happened.
    pub action: FeedbackAction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refinement_referrer_carries_current_message() {
        let referrer = Referrer::for_question(ReferrerKind::Refinement, "m7");
        assert_eq!(referrer.message_id.as_deref(), Some("m7"));

        let typed = Referrer::for_question(ReferrerKind::Typed, "m7");
        assert_eq!(typed.message_id, None);
    }

    #[test]
    fn test_ask_request_json_shape() {
        let request = AskRequest {
            message_id: None,
            message: Some("how do I reset?".to_string()),
            referrer: Some(Referrer::for_question(ReferrerKind::Refinement, "m1")),
        };
        let json = serde_json::to_value(&request).unwrap_or_default();
        assert_eq!(
            json,
            serde_json::json!({
                "message": "how do I reset?",
                "referrer": { "type": "REFINEMENT", "messageId": "m1" }
            })
        );
    }

    #[test]
    fn test_empty_message_id_is_absent() {
        assert_eq!(AskQuestion::by_id("").effective_message_id(), None);
        assert_eq!(AskQuestion::by_id("m1").effective_message_id(), Some("m1"));
        assert_eq!(AskQuestion::typed("hi").effective_message_id(), None);
    }

    #[test]
    fn test_feedback_serializes_action_name() {
        let feedback = Feedback {
            conversation_id: "c1".to_string(),
            message_id: "m1".to_string(),
            action: FeedbackAction::NoHelpfulRefinements,
        };
        let json = serde_json::to_value(&feedback).unwrap_or_default();
        assert_eq!(json["action"], "NO_HELPFUL_REFINEMENTS");
        assert_eq!(json["conversationId"], "c1");
        assert_eq!(FeedbackAction::ForumRedirect.as_str(), "FORUM_REDIRECT");
    }

    #[test]
    fn test_answer_payload_defaults_missing_responses() {
        let payload: AnswerPayload =
            serde_json::from_str(r#"{"messageId":"m1","message":"hi"}"#).unwrap_or_default();
        assert_eq!(payload.message_id, "m1");
        assert!(payload.responses.is_empty());
    }
}
