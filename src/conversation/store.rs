//! Conversation store: reacts to UI actions, calls the API, caches answers
//! and publishes broadcasts.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::api::{ConversationApi, HttpConversationApi};
use super::cache::{QuestionCache, QuestionHistory};
use super::config::WidgetConfig;
use super::error::{ConversationError, ConversationResult, ServerError};
use super::events::{Action, Broadcast, EventBus, Subscription};
use super::types::{
    AnswerPayload, AskQuestion, AskRequest, CachedAnswer, Conversation, Feedback, FeedbackAction,
    Referrer,
};

struct StoreInner {
    api: Arc<dyn ConversationApi>,
    state: Mutex<Conversation>,
    cache: QuestionCache,
    history: QuestionHistory,
    bus: EventBus,
    shutdown: watch::Sender<bool>,
}

impl StoreInner {
    fn state(&self) -> MutexGuard<'_, Conversation> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn report(&self, context: &'static str, err: &ConversationError) {
        warn!(context, error = %err, "Conversation API call failed");
        self.bus.publish(&Broadcast::ServerError(ServerError::from(err)));
    }

    fn publish_answer(&self, conversation: Conversation) {
        self.bus.publish(&Broadcast::AnswerReceived(conversation.clone()));
        self.bus.publish(&Broadcast::AlternativeQuestion(conversation));
    }

    /// Cache a fresh answer, record it and make it current. Returns the new state.
    fn accept_answer(&self, answer: AnswerPayload) -> Conversation {
        self.cache.insert(&answer.message_id, &answer.message, &answer.responses);
        self.history.push(&answer.message_id);

        let mut state = self.state();
        state.message_id = answer.message_id;
        state.message = answer.message;
        state.responses = answer.responses;
        state.clone()
    }
}

/// Client-side conversation state for the answer widget.
///
/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct ConversationStore {
    inner: Arc<StoreInner>,
}

impl ConversationStore {
    /// Create a store backed by `api`.
    #[must_use]
    pub fn new(api: Arc<dyn ConversationApi>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                api,
                state: Mutex::new(Conversation::default()),
                cache: QuestionCache::new(),
                history: QuestionHistory::new(),
                bus: EventBus::new(),
                shutdown: watch::Sender::new(false),
            }),
        }
    }

    /// Create a store talking HTTP to the configured endpoints.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or the HTTP client cannot be created.
    pub fn from_config(config: WidgetConfig) -> ConversationResult<Self> {
        let api = HttpConversationApi::new(config)?;
        Ok(Self::new(Arc::new(api)))
    }

    /// Subscribe to broadcasts.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.inner.bus.subscribe()
    }

    /// The broadcast bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Snapshot of the live conversation.
    #[must_use]
    pub fn conversation(&self) -> Conversation {
        self.inner.state().clone()
    }

    /// Cached answer for `message_id`, if any.
    #[must_use]
    pub fn cached_answer(&self, message_id: &str) -> Option<CachedAnswer> {
        self.inner.cache.get(message_id)
    }

    /// Answered message ids, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.inner.history.snapshot()
    }

    /// Handle an action.
    ///
    /// Synchronous effects (state changes, immediate broadcasts) have happened
    /// when this returns. Network work runs on a detached task whose handle is
    /// returned; awaiting it is optional.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime and the action needs the network.
    pub fn dispatch(&self, action: Action) -> Option<JoinHandle<()>> {
        debug!(action = action.name(), "Dispatching action");
        match action {
            Action::ConversationStart => Some(self.start_conversation()),
            Action::AskQuestion(question) => self.ask_question(question),
            Action::NoneOfTheAboveClicked => Some(self.none_of_the_above_clicked()),
            Action::NegativeFeedbackGiven => Some(self.negative_feedback_given()),
            Action::PositiveFeedbackGiven => Some(self.positive_feedback_given()),
            Action::ForumButtonPressed(message_id) => Some(self.forum_button_pressed(message_id)),
            Action::SetCurrentQuestion(message_id) => {
                self.set_current_question(&message_id);
                None
            }
            Action::UpdateRefinementQuestions(message_id) => {
                self.update_refinement_questions(&message_id);
                None
            }
            Action::GetAlternativeQuestions => {
                self.get_alternative_questions();
                None
            }
            Action::GetTopQuestions => self.get_top_questions(),
        }
    }

    /// Start a conversation with the server.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn start_conversation(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            match inner.api.start_conversation().await {
                Ok(started) => {
                    let conversation = {
                        let mut state = inner.state();
                        state.conversation_id = started.conversation_id;
                        state.top_questions = started.top_questions;
                        state.clone()
                    };
                    info!(
                        conversation_id = %conversation.conversation_id,
                        "Conversation started"
                    );
                    let top_questions = conversation.top_questions.clone().unwrap_or_default();
                    inner.bus.publish(&Broadcast::ConversationStarted(conversation));
                    inner.bus.publish(&Broadcast::TopQuestions(top_questions));
                }
                Err(err) => inner.report("start_conversation", &err),
            }
        })
    }

    /// Ask a question.
    ///
    /// A cached `message_id` is replayed immediately and returns `None`;
    /// otherwise the question is posted and the task handle returned.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime and the answer is not cached.
    pub fn ask_question(&self, question: AskQuestion) -> Option<JoinHandle<()>> {
        self.inner.bus.publish(&Broadcast::AskingQuestion);

        let hit = question
            .effective_message_id()
            .and_then(|id| self.inner.cache.get(id).map(|cached| (id, cached)));
        if let Some((message_id, cached)) = hit {
            debug!(message_id, cached_at = %cached.cached_at, "Cache hit for question");
            let conversation = {
                let mut state = self.inner.state();
                state.apply_cached(message_id, &cached);
                state.clone()
            };
            self.inner.publish_answer(conversation);
            return None;
        }

        let (conversation_id, request) = {
            let state = self.inner.state();
            let request = AskRequest {
                message_id: question.effective_message_id().map(str::to_string),
                message: question.message,
                referrer: question
                    .referrer
                    .map(|kind| Referrer::for_question(kind, &state.message_id)),
            };
            (state.conversation_id.clone(), request)
        };

        let inner = Arc::clone(&self.inner);
        Some(tokio::spawn(async move {
            match inner.api.ask_question(&conversation_id, &request).await {
                Ok(answer) => {
                    debug!(message_id = %answer.message_id, "Answer received");
                    let conversation = inner.accept_answer(answer);
                    inner.publish_answer(conversation);
                }
                Err(err) => inner.report("ask_question", &err),
            }
        }))
    }

    /// Acknowledge "none of the above" and report it.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime, as do the other feedback handlers.
    pub fn none_of_the_above_clicked(&self) -> JoinHandle<()> {
        self.inner.bus.publish(&Broadcast::NoneOfTheAboveClicked);
        self.spawn_feedback(FeedbackAction::NoHelpfulRefinements, None)
    }

    /// Acknowledge negative feedback and report it.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn negative_feedback_given(&self) -> JoinHandle<()> {
        self.inner.bus.publish(&Broadcast::NegativeFeedbackReceived);
        self.spawn_feedback(FeedbackAction::Unhelpful, None)
    }

    /// Acknowledge positive feedback and report it.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn positive_feedback_given(&self) -> JoinHandle<()> {
        self.inner.bus.publish(&Broadcast::PositiveFeedbackReceived);
        self.spawn_feedback(FeedbackAction::Helpful, None)
    }

    /// Report a forum redirect for `message_id`, or the current message.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn forum_button_pressed(&self, message_id: Option<String>) -> JoinHandle<()> {
        self.spawn_feedback(FeedbackAction::ForumRedirect, message_id)
    }

    /// Make a cached message current. Unknown ids are ignored.
    pub fn set_current_question(&self, message_id: &str) {
        let Some(cached) = self.inner.cache.get(message_id) else {
            debug!(message_id, "Not cached, current question unchanged");
            return;
        };
        self.inner.state().apply_cached(message_id, &cached);
    }

    /// Broadcast the refinements of a cached message without touching the live state.
    pub fn update_refinement_questions(&self, message_id: &str) {
        let Some(cached) = self.inner.cache.get(message_id) else {
            debug!(message_id, "Not cached, no refinements to show");
            return;
        };
        let conversation_id = self.inner.state().conversation_id.clone();
        let preview = Conversation::from_cached(&conversation_id, message_id, &cached);
        self.inner.bus.publish(&Broadcast::UpdateRefinementQuestions(preview));
    }

    /// Re-send the current response options.
    pub fn get_alternative_questions(&self) {
        let conversation = self.conversation();
        self.inner.bus.publish(&Broadcast::AlternativeQuestion(conversation));
    }

    /// Broadcast the suggested questions, fetching them first if needed.
    ///
    /// Returns the fetch task when a network call was made.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime and a fetch is needed.
    pub fn get_top_questions(&self) -> Option<JoinHandle<()>> {
        let (conversation_id, existing) = {
            let state = self.inner.state();
            (state.conversation_id.clone(), state.top_questions.clone())
        };

        if let Some(top_questions) = existing {
            self.inner.bus.publish(&Broadcast::TopQuestions(top_questions));
            return None;
        }
        if conversation_id.is_empty() {
            debug!("No conversation yet, top questions unavailable");
            return None;
        }

        let inner = Arc::clone(&self.inner);
        Some(tokio::spawn(async move {
            match inner.api.top_questions(&conversation_id).await {
                Ok(top_questions) => {
                    inner.state().top_questions = Some(top_questions.clone());
                    inner.bus.publish(&Broadcast::TopQuestions(top_questions));
                }
                Err(err) => inner.report("top_questions", &err),
            }
        }))
    }

    /// Feed actions from a channel into the store until shutdown.
    ///
    /// Returns the sending half and the handle of the listening task. The task
    /// ends once every sender is dropped or the store shuts down; either way,
    /// actions already queued are still dispatched and the listener waits for
    /// the network work they started.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn listen(&self) -> (mpsc::UnboundedSender<Action>, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Action>();
        let stopped = wait_for_shutdown(self.inner.shutdown.subscribe());
        let store = self.clone();
        let handle = tokio::spawn(async move {
            tokio::pin!(stopped);
            let mut tasks: Vec<JoinHandle<()>> = Vec::new();
            loop {
                tokio::select! {
                    biased;
                    action = rx.recv() => {
                        let Some(action) = action else { break };
                        tasks.retain(|task| !task.is_finished());
                        tasks.extend(store.dispatch(action));
                    }
                    () = &mut stopped => break,
                }
            }

            rx.close();
            while let Some(action) = rx.recv().await {
                tasks.extend(store.dispatch(action));
            }
            debug!(pending = tasks.len(), "Action listener draining");
            for task in tasks {
                if let Err(err) = task.await {
                    warn!(error = %err, "Action task failed");
                }
            }
            debug!("Action listener stopped");
        });
        (tx, handle)
    }

    /// End the session: listeners dispatch what is already queued and stop,
    /// and every subscriber is dropped.
    pub fn shutdown(&self) {
        info!(
            cached = self.inner.cache.len(),
            subscribers = self.inner.bus.subscriber_count(),
            "Shutting down conversation store"
        );
        self.inner.shutdown.send_replace(true);
        self.inner.bus.unsubscribe_all();
    }

    fn spawn_feedback(&self, action: FeedbackAction, message_id: Option<String>) -> JoinHandle<()> {
        let feedback = {
            let state = self.inner.state();
            Feedback {
                conversation_id: state.conversation_id.clone(),
                message_id: message_id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| state.message_id.clone()),
                action,
            }
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            debug!(action = action.as_str(), "Sending feedback");
            if let Err(err) = inner.api.send_feedback(&feedback).await {
                inner.report("send_feedback", &err);
            }
        })
    }
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    // A closed channel means the store is gone, which also ends listening.
    let _ = rx.wait_for(|stopped| *stopped).await;
}
