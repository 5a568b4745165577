//! Mock conversation API for store tests.
//!
//! Results are queued per endpoint; every call is recorded.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::api::ConversationApi;
use super::error::{ConversationError, ConversationResult};
use super::types::{AnswerPayload, AskRequest, Feedback, StartedConversation, Suggestion};

type Queue<T> = Mutex<VecDeque<ConversationResult<T>>>;

/// A call received by the mock.
#[derive(Clone, Debug)]
pub enum ApiCall {
    Start,
    Ask {
        conversation_id: String,
        request: AskRequest,
    },
    TopQuestions(String),
    Feedback(Feedback),
}

#[derive(Default)]
pub struct MockConversationApi {
    starts: Queue<StartedConversation>,
    answers: Queue<AnswerPayload>,
    top_questions: Queue<Vec<Suggestion>>,
    feedback: Queue<()>,
    feedback_gate: Mutex<Option<Arc<Notify>>>,
    calls: Mutex<Vec<ApiCall>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockConversationApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_start(&self, result: ConversationResult<StartedConversation>) {
        lock(&self.starts).push_back(result);
    }

    pub fn queue_answer(&self, result: ConversationResult<AnswerPayload>) {
        lock(&self.answers).push_back(result);
    }

    pub fn queue_top_questions(&self, result: ConversationResult<Vec<Suggestion>>) {
        lock(&self.top_questions).push_back(result);
    }

    pub fn queue_feedback(&self, result: ConversationResult<()>) {
        lock(&self.feedback).push_back(result);
    }

    /// Make feedback calls wait until the returned gate is notified, once per call.
    pub fn hold_feedback(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *lock(&self.feedback_gate) = Some(Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        lock(&self.calls).clone()
    }

    fn record(&self, call: ApiCall) {
        lock(&self.calls).push(call);
    }

    fn next<T>(queue: &Queue<T>, what: &str) -> ConversationResult<T> {
        let missing = || ConversationError::HttpClient(format!("no mock {what} queued"));
        lock(queue).pop_front().unwrap_or_else(|| Err(missing()))
    }
}

#[async_trait]
impl ConversationApi for MockConversationApi {
    async fn start_conversation(&self) -> ConversationResult<StartedConversation> {
        self.record(ApiCall::Start);
        Self::next(&self.starts, "start")
    }

    async fn ask_question(
        &self,
        conversation_id: &str,
        request: &AskRequest,
    ) -> ConversationResult<AnswerPayload> {
        self.record(ApiCall::Ask {
            conversation_id: conversation_id.to_string(),
            request: request.clone(),
        });
        Self::next(&self.answers, "answer")
    }

    async fn top_questions(&self, conversation_id: &str) -> ConversationResult<Vec<Suggestion>> {
        self.record(ApiCall::TopQuestions(conversation_id.to_string()));
        Self::next(&self.top_questions, "top questions")
    }

    async fn send_feedback(&self, feedback: &Feedback) -> ConversationResult<()> {
        self.record(ApiCall::Feedback(feedback.clone()));
        let gate = lock(&self.feedback_gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        lock(&self.feedback).pop_front().unwrap_or(Ok(()))
    }
}
