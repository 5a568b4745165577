//! Inbound actions, outbound broadcasts and the publish/subscribe bus.

use std::fmt;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::error::ServerError;
use super::types::{AskQuestion, Conversation, Suggestion};

/// An intent raised by the UI.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Action {
    /// Start a new conversation.
    ConversationStart,
    /// Ask a question, by text or by known message id.
    AskQuestion(AskQuestion),
    /// None of the offered refinements helped.
    NoneOfTheAboveClicked,
    /// The current answer was not helpful.
    NegativeFeedbackGiven,
    /// The current answer was helpful.
    PositiveFeedbackGiven,
    /// The user is leaving for the forum, optionally about a specific message.
    ForumButtonPressed(Option<String>),
    /// Make a cached message the current one.
    SetCurrentQuestion(String),
    /// Preview the refinements of a cached message.
    UpdateRefinementQuestions(String),
    /// Re-send the current response options.
    GetAlternativeQuestions,
    /// Fetch or re-send the suggested questions.
    GetTopQuestions,
}

impl Action {
    /// Wire name of the action.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ConversationStart => "CONVERSATION_START",
            Self::AskQuestion(_) => "ASK_QUESTION",
            Self::NoneOfTheAboveClicked => "NONE_OF_THE_ABOVE_CLICKED",
            Self::NegativeFeedbackGiven => "NEGATIVE_FEEDBACK_GIVEN",
            Self::PositiveFeedbackGiven => "POSITIVE_FEEDBACK_GIVEN",
            Self::ForumButtonPressed(_) => "FORUM_BUTTON_PRESSED",
            Self::SetCurrentQuestion(_) => "SET_CURRENT_QUESTION",
            Self::UpdateRefinementQuestions(_) => "UPDATE_REFINEMENT_QUESTIONS",
            Self::GetAlternativeQuestions => "GET_ALTERNATIVE_QUESTIONS",
            Self::GetTopQuestions => "GET_TOP_QUESTIONS",
        }
    }
}

/// A state change published for the UI.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Broadcast {
    /// The conversation was started.
    ConversationStarted(Conversation),
    /// Suggested questions are available.
    TopQuestions(Vec<Suggestion>),
    /// A question is being asked.
    AskingQuestion,
    /// An answer is available.
    AnswerReceived(Conversation),
    /// Response options for the current answer.
    AlternativeQuestion(Conversation),
    /// A server call failed.
    ServerError(ServerError),
    /// "None of the above" was acknowledged.
    NoneOfTheAboveClicked,
    /// Negative feedback was acknowledged.
    NegativeFeedbackReceived,
    /// Positive feedback was acknowledged.
    PositiveFeedbackReceived,
    /// Refinements of a cached message, outside the live state.
    UpdateRefinementQuestions(Conversation),
}

impl Broadcast {
    /// Wire name of the broadcast.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ConversationStarted(_) => "CONVERSATION_STARTED_BROADCAST",
            Self::TopQuestions(_) => "TOP_QUESTIONS_BROADCAST",
            Self::AskingQuestion => "ASKING_QUESTION_BROADCAST",
            Self::AnswerReceived(_) => "ANSWER_RECEIVED_BROADCAST",
            Self::AlternativeQuestion(_) => "ALTERNATIVE_QUESTION_BROADCAST",
            Self::ServerError(_) => "SERVER_ERROR_BROADCAST",
            Self::NoneOfTheAboveClicked => "NONE_OF_THE_ABOVE_CLICKED_BROADCAST",
            Self::NegativeFeedbackReceived => "NEGATIVE_FEEDBACK_RECEIVED_BROADCAST",
            Self::PositiveFeedbackReceived => "POSITIVE_FEEDBACK_RECEIVED_BROADCAST",
            Self::UpdateRefinementQuestions(_) => "UPDATE_REFINEMENT_QUESTIONS_BROADCAST",
        }
    }
}

impl fmt::Display for Broadcast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifier of a bus subscription.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receiving end of a bus subscription.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<Broadcast>,
}

impl Subscription {
    /// Identifier to pass to [`EventBus::unsubscribe`].
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next broadcast. Returns `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<Broadcast> {
        self.rx.recv().await
    }

    /// Take the next broadcast if one is already queued.
    pub fn try_recv(&mut self) -> Option<Broadcast> {
        self.rx.try_recv().ok()
    }

    /// Take every queued broadcast.
    pub fn drain(&mut self) -> Vec<Broadcast> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

/// Publish/subscribe bus for broadcasts.
///
/// Each subscriber has its own unbounded queue: publishing never blocks,
/// never drops, and every subscriber sees broadcasts in publish order.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: DashMap<SubscriptionId, mpsc::UnboundedSender<Broadcast>>,
}

impl EventBus {
    /// Create a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriptionId::new();
        self.subscribers.insert(id, tx);
        tracing::debug!(%id, "Subscriber registered");
        Subscription { id, rx }
    }

    /// Remove a subscriber. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    /// Remove every subscriber.
    pub fn unsubscribe_all(&self) {
        self.subscribers.clear();
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver a broadcast to every current subscriber.
    ///
    /// Subscribers whose receiver was dropped are pruned.
    pub fn publish(&self, broadcast: &Broadcast) {
        tracing::debug!(broadcast = broadcast.name(), "Publishing");
        self.subscribers.retain(|_, tx| tx.send(broadcast.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_receives_in_order() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(&Broadcast::AskingQuestion);
        bus.publish(&Broadcast::PositiveFeedbackReceived);

        let expected = vec![Broadcast::AskingQuestion, Broadcast::PositiveFeedbackReceived];
        assert_eq!(first.drain(), expected);
        assert_eq!(second.drain(), expected);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let mut kept = bus.subscribe();
        let mut gone = bus.subscribe();

        assert!(bus.unsubscribe(gone.id()));
        assert!(!bus.unsubscribe(gone.id()));
        bus.publish(&Broadcast::AskingQuestion);

        assert_eq!(kept.drain(), vec![Broadcast::AskingQuestion]);
        assert!(gone.try_recv().is_none());
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let bus = EventBus::new();
        let dropped = bus.subscribe();
        let _kept = bus.subscribe();
        drop(dropped);

        bus.publish(&Broadcast::AskingQuestion);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_all_closes_receivers() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        bus.publish(&Broadcast::NoneOfTheAboveClicked);
        bus.unsubscribe_all();

        assert_eq!(sub.recv().await, Some(Broadcast::NoneOfTheAboveClicked));
        assert_eq!(sub.recv().await, None);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_names() {
        assert_eq!(Action::GetTopQuestions.name(), "GET_TOP_QUESTIONS");
        assert_eq!(
            Broadcast::UpdateRefinementQuestions(Conversation::default()).to_string(),
            "UPDATE_REFINEMENT_QUESTIONS_BROADCAST"
        );
    }
}
