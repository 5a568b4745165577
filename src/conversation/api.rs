//! Client for the remote conversation and feedback API.

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;

use super::config::WidgetConfig;
use super::error::{ConversationError, ConversationResult};
use super::types::{AnswerPayload, AskRequest, Feedback, StartedConversation, Suggestion};

/// Remote conversation API used by the store.
#[async_trait]
pub trait ConversationApi: Send + Sync {
    /// Start a conversation.
    ///
    /// # Errors
    /// Returns an error on transport failure, a non-200 status or an undecodable body.
    async fn start_conversation(&self) -> ConversationResult<StartedConversation>;

    /// Ask a question within a conversation.
    ///
    /// # Errors
    /// Same failure modes as [`ConversationApi::start_conversation`].
    async fn ask_question(
        &self,
        conversation_id: &str,
        request: &AskRequest,
    ) -> ConversationResult<AnswerPayload>;

    /// Fetch the suggested questions of a conversation.
    ///
    /// # Errors
    /// Same failure modes as [`ConversationApi::start_conversation`].
    async fn top_questions(&self, conversation_id: &str) -> ConversationResult<Vec<Suggestion>>;

    /// Report feedback.
    ///
    /// # Errors
    /// Returns an error on transport failure or a status outside 2xx.
    async fn send_feedback(&self, feedback: &Feedback) -> ConversationResult<()>;
}

/// `reqwest` implementation of [`ConversationApi`].
#[derive(Clone, Debug)]
pub struct HttpConversationApi {
    config: WidgetConfig,
    client: reqwest::Client,
}

impl HttpConversationApi {
    /// Create a client for the configured endpoints.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or the HTTP client cannot be created.
    pub fn new(config: WidgetConfig) -> ConversationResult<Self> {
        config.validate()?;
        let client = Self::build_client()?;
        Ok(Self { config, client })
    }

    /// Endpoints this client talks to.
    #[must_use]
    pub const fn config(&self) -> &WidgetConfig {
        &self.config
    }

    fn build_client() -> ConversationResult<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        reqwest::Client::builder()
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| ConversationError::HttpClient(e.to_string()))
    }

    /// Read a JSON body from a response that must be exactly 200.
    async fn read_content<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> ConversationResult<T> {
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ConversationError::from_status(status));
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl ConversationApi for HttpConversationApi {
    async fn start_conversation(&self) -> ConversationResult<StartedConversation> {
        let response = self.client.post(self.config.start_url()).send().await?;
        Self::read_content(response).await
    }

    async fn ask_question(
        &self,
        conversation_id: &str,
        request: &AskRequest,
    ) -> ConversationResult<AnswerPayload> {
        let response = self
            .client
            .post(self.config.ask_url(conversation_id))
            .json(request)
            .send()
            .await?;
        Self::read_content(response).await
    }

    async fn top_questions(&self, conversation_id: &str) -> ConversationResult<Vec<Suggestion>> {
        let response = self
            .client
            .get(self.config.top_questions_url(conversation_id))
            .send()
            .await?;
        Self::read_content(response).await
    }

    async fn send_feedback(&self, feedback: &Feedback) -> ConversationResult<()> {
        let response = self
            .client
            .post(self.config.feedback_url.as_str())
            .json(feedback)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConversationError::from_status(status));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::literal_string_with_formatting_args
)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, State};
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{Value, json};

    use super::*;
    use crate::conversation::types::{FeedbackAction, Referrer, ReferrerKind};

    #[derive(Clone, Default)]
    struct FakeServer {
        bodies: Arc<Mutex<Vec<(String, Value)>>>,
    }

    impl FakeServer {
        fn record(&self, route: &str, body: Value) {
            self.bodies.lock().unwrap().push((route.to_string(), body));
        }

        fn recorded(&self) -> Vec<(String, Value)> {
            self.bodies.lock().unwrap().clone()
        }
    }

    async fn start(State(server): State<FakeServer>) -> Json<Value> {
        server.record("start", Value::Null);
        Json(json!({
            "conversationId": "c1",
            "topQuestions": [{ "messageId": "t1", "message": "How do I log in?" }]
        }))
    }

    async fn ask(
        State(server): State<FakeServer>,
        Path(conversation_id): Path<String>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        server.record(&format!("ask:{conversation_id}"), body);
        Json(json!({
            "messageId": "m1",
            "message": "hi",
            "responses": [{ "messageId": "m2", "message": "More" }]
        }))
    }

    async fn top(Path(conversation_id): Path<String>) -> Json<Value> {
        Json(json!([{ "messageId": format!("{conversation_id}-t1"), "message": "Top" }]))
    }

    async fn feedback(State(server): State<FakeServer>, Json(body): Json<Value>) -> AxumStatus {
        server.record("feedback", body);
        AxumStatus::NO_CONTENT
    }

    async fn start_created() -> (AxumStatus, Json<Value>) {
        (AxumStatus::CREATED, Json(json!({ "conversationId": "c1" })))
    }

    async fn feedback_failing() -> AxumStatus {
        AxumStatus::INTERNAL_SERVER_ERROR
    }

    fn config_for(base: &str) -> WidgetConfig {
        WidgetConfig::new()
            .with_conversation_url(format!("{base}/conversation/"))
            .with_feedback_url(format!("{base}/feedback"))
    }

    fn feedback_for(action: FeedbackAction) -> Feedback {
        Feedback {
            conversation_id: "c1".to_string(),
            message_id: "m1".to_string(),
            action,
        }
    }

    async fn spawn_server(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    async fn healthy_api() -> (HttpConversationApi, FakeServer) {
        let server = FakeServer::default();
        let app = Router::new()
            .route("/conversation/", post(start))
            .route("/conversation/{id}", post(ask))
            .route("/conversation/{id}/topQuestions", get(top))
            .route("/feedback", post(feedback))
            .with_state(server.clone());
        let base = spawn_server(app).await;
        (HttpConversationApi::new(config_for(&base)).unwrap(), server)
    }

    #[tokio::test]
    async fn test_start_conversation() {
        let (api, _server) = healthy_api().await;
        let started = api.start_conversation().await.unwrap();
        assert_eq!(started.conversation_id, "c1");
        assert_eq!(
            started.top_questions,
            Some(vec![Suggestion::new("t1", "How do I log in?")])
        );
    }

    #[tokio::test]
    async fn test_ask_question_posts_to_conversation() {
        let (api, server) = healthy_api().await;
        let request = AskRequest {
            message_id: None,
            message: Some("reset password".to_string()),
            referrer: Some(Referrer::for_question(ReferrerKind::Refinement, "m0")),
        };

        let answer = api.ask_question("c1", &request).await.unwrap();
        assert_eq!(answer.message_id, "m1");
        assert_eq!(answer.responses, vec![Suggestion::new("m2", "More")]);

        let recorded = server.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, "ask:c1");
        assert_eq!(recorded[0].1["referrer"]["type"], "REFINEMENT");
        assert_eq!(recorded[0].1["referrer"]["messageId"], "m0");
    }

    #[tokio::test]
    async fn test_top_questions_uses_conversation_path() {
        let (api, _server) = healthy_api().await;
        let top = api.top_questions("c1").await.unwrap();
        assert_eq!(top, vec![Suggestion::new("c1-t1", "Top")]);
    }

    #[tokio::test]
    async fn test_feedback_accepts_any_2xx() {
        let (api, server) = healthy_api().await;
        let feedback = feedback_for(FeedbackAction::Helpful);
        assert!(api.send_feedback(&feedback).await.is_ok());

        let recorded = server.recorded();
        assert_eq!(
            recorded[0].1,
            json!({ "conversationId": "c1", "messageId": "m1", "action": "HELPFUL" })
        );
    }

    #[tokio::test]
    async fn test_content_calls_require_exactly_200() {
        let app = Router::new().route("/conversation/", post(start_created));
        let base = spawn_server(app).await;
        let api = HttpConversationApi::new(config_for(&base)).unwrap();

        let err = api.start_conversation().await.unwrap_err();
        assert!(matches!(err, ConversationError::Status { status: 201, .. }));
    }

    #[tokio::test]
    async fn test_feedback_rejects_server_error() {
        let app = Router::new().route("/feedback", post(feedback_failing));
        let base = spawn_server(app).await;
        let api = HttpConversationApi::new(config_for(&base)).unwrap();

        let feedback = feedback_for(FeedbackAction::Unhelpful);
        let err = api.send_feedback(&feedback).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "server returned 500: Internal Server Error"
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let base = format!("http://{addr}");
        let api = HttpConversationApi::new(config_for(&base)).unwrap();

        let err = api.start_conversation().await.unwrap_err();
        assert!(matches!(err, ConversationError::Transport(_)));
    }
}
