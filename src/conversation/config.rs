//! Configuration for the conversation store.

use serde::{Deserialize, Serialize};
use url::Url;

use super::error::{ConversationError, ConversationResult};

/// Environment variable overriding the conversation endpoint.
pub const CONVERSATION_URL_ENV: &str = "ANSWER_WIDGET_CONVERSATION_URL";
/// Environment variable overriding the feedback endpoint.
pub const FEEDBACK_URL_ENV: &str = "ANSWER_WIDGET_FEEDBACK_URL";

const DEFAULT_CONVERSATION_URL: &str = "http://127.0.0.1:8080/api/conversation/";
const DEFAULT_FEEDBACK_URL: &str = "http://127.0.0.1:8080/api/feedback";

/// Endpoints of the remote conversation API.
///
/// `conversation_url` is used as a prefix: the conversation id is appended
/// verbatim, so it normally ends with a slash.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    /// Base URL for conversation requests.
    pub conversation_url: String,
    /// URL for feedback requests.
    pub feedback_url: String,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            conversation_url: DEFAULT_CONVERSATION_URL.to_string(),
            feedback_url: DEFAULT_FEEDBACK_URL.to_string(),
        }
    }
}

impl WidgetConfig {
    /// Create a new config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the config from the environment, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            conversation_url: std::env::var(CONVERSATION_URL_ENV)
                .unwrap_or(defaults.conversation_url),
            feedback_url: std::env::var(FEEDBACK_URL_ENV).unwrap_or(defaults.feedback_url),
        }
    }

    /// Set the conversation base URL.
    #[must_use]
    pub fn with_conversation_url(mut self, url: impl Into<String>) -> Self {
        self.conversation_url = url.into();
        self
    }

    /// Set the feedback URL.
    #[must_use]
    pub fn with_feedback_url(mut self, url: impl Into<String>) -> Self {
        self.feedback_url = url.into();
        self
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if either URL is empty or cannot be parsed.
    pub fn validate(&self) -> ConversationResult<()> {
        if self.conversation_url.is_empty() {
            return Err(ConversationError::InvalidConfig(
                "conversation_url must not be empty".to_string(),
            ));
        }
        if self.feedback_url.is_empty() {
            return Err(ConversationError::InvalidConfig(
                "feedback_url must not be empty".to_string(),
            ));
        }

        Url::parse(&self.conversation_url)?;
        Url::parse(&self.feedback_url)?;
        Ok(())
    }

    /// URL that starts a conversation.
    #[must_use]
    pub fn start_url(&self) -> String {
        self.conversation_url.clone()
    }

    /// URL that questions for `conversation_id` are posted to.
    #[must_use]
    pub fn ask_url(&self, conversation_id: &str) -> String {
        format!("{}{conversation_id}", self.conversation_url)
    }

    /// URL listing the top questions of `conversation_id`.
    #[must_use]
    pub fn top_questions_url(&self, conversation_id: &str) -> String {
        format!("{}{conversation_id}/topQuestions", self.conversation_url)
    }
}
