//! End-to-end route tests
//!
//! Exercises /health, /login, and /chat through warp's test harness with a
//! scripted mock LLM provider, covering authentication, validation, both
//! guardrails, provenance labels, and the monitored flag.
//!
//! Credential environment variables are uniquely named per test so the
//! tests stay independent under parallel execution.

use chatguard::agent::{AgentSettings, ChatAgent};
use chatguard::auth::TokenStore;
use chatguard::config::ServiceConfig;
use chatguard::guardrails::{ReadingTimeGuardrail, TopicGuardrail};
use chatguard::llm::provider::LlmProvider;
use chatguard::server::{routes, AppState, ChatResponse, LoginResponse};
use chatguard::testing::MockLlmProvider;
use chatguard::tools::ToolRegistry;
use chatguard::trace::TraceClient;
use serde_json::json;
use std::sync::Arc;

fn test_service_config(username_env: &str, password_env: &str) -> ServiceConfig {
    let toml_content = format!(
        r#"
[auth]
username_env = "{username_env}"
password_env = "{password_env}"

[llm]
provider = "openai"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
system_prompt = "You are a course assistant."
"#
    );

    toml::from_str(&toml_content).unwrap()
}

struct StateBuilder {
    config: ServiceConfig,
    provider: Option<Arc<dyn LlmProvider>>,
    trace: TraceClient,
}

impl StateBuilder {
    fn new(username_env: &str, password_env: &str) -> Self {
        Self {
            config: test_service_config(username_env, password_env),
            provider: None,
            trace: TraceClient::disabled(),
        }
    }

    fn with_provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    fn with_trace(mut self, trace: TraceClient) -> Self {
        self.trace = trace;
        self
    }

    fn build(self) -> Arc<AppState> {
        let agent = ChatAgent::new(
            self.provider.clone(),
            Arc::new(ToolRegistry::new()),
            AgentSettings {
                model: self.config.llm.model.clone(),
                system_prompt: self.config.llm.system_prompt.clone(),
                temperature: None,
                max_tokens: None,
            },
        );

        let topic_guard = TopicGuardrail::new(
            self.provider,
            self.config.llm.model.clone(),
            &self.config.guardrails,
        );
        let reading_guard = ReadingTimeGuardrail::new(&self.config.guardrails);

        Arc::new(AppState {
            config: self.config,
            tokens: TokenStore::new(),
            agent,
            topic_guard,
            reading_guard,
            trace: self.trace,
        })
    }
}

async fn issue_token(state: &Arc<AppState>, username: &str) -> String {
    state.tokens.issue(username).await
}

#[tokio::test]
async fn test_health_endpoint() {
    let state = StateBuilder::new("ROUTE_USER_HEALTH", "ROUTE_PASS_HEALTH").build();
    let api = routes(state);

    let response = warp::test::request()
        .method("GET")
        .path("/health")
        .reply(&api)
        .await;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_login_issues_token() {
    std::env::set_var("ROUTE_USER_LOGIN_OK", "student");
    std::env::set_var("ROUTE_PASS_LOGIN_OK", "hunter2");

    let state = StateBuilder::new("ROUTE_USER_LOGIN_OK", "ROUTE_PASS_LOGIN_OK").build();
    let api = routes(state.clone());

    let response = warp::test::request()
        .method("POST")
        .path("/login")
        .json(&json!({"username": "student", "password": "hunter2"}))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 200);
    let body: LoginResponse = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body.message, "Welcome back, student!");
    assert!(body.token.starts_with("token-"));
    assert!(body.token.ends_with("-student"));

    assert_eq!(state.tokens.verify(&body.token).await.as_deref(), Some("student"));
}

#[tokio::test]
async fn test_login_rejects_wrong_password() {
    std::env::set_var("ROUTE_USER_LOGIN_BAD", "student");
    std::env::set_var("ROUTE_PASS_LOGIN_BAD", "hunter2");

    let state = StateBuilder::new("ROUTE_USER_LOGIN_BAD", "ROUTE_PASS_LOGIN_BAD").build();
    let api = routes(state);

    let response = warp::test::request()
        .method("POST")
        .path("/login")
        .json(&json!({"username": "student", "password": "wrong"}))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 401);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["detail"], "Unauthorized: Invalid username or password");
}

#[tokio::test]
async fn test_login_without_configured_credentials_is_server_error() {
    std::env::remove_var("ROUTE_USER_LOGIN_UNSET");
    std::env::remove_var("ROUTE_PASS_LOGIN_UNSET");

    let state = StateBuilder::new("ROUTE_USER_LOGIN_UNSET", "ROUTE_PASS_LOGIN_UNSET").build();
    let api = routes(state);

    let response = warp::test::request()
        .method("POST")
        .path("/login")
        .json(&json!({"username": "student", "password": "hunter2"}))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 500);
}

#[tokio::test]
async fn test_chat_requires_token() {
    let state = StateBuilder::new("ROUTE_USER_NOTOKEN", "ROUTE_PASS_NOTOKEN").build();
    let api = routes(state);

    let response = warp::test::request()
        .method("POST")
        .path("/chat")
        .json(&json!({"message": "hello"}))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 401);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(
        body["detail"],
        "Unauthorized: Missing or invalid authentication token"
    );
}

#[tokio::test]
async fn test_chat_rejects_unknown_token() {
    let state = StateBuilder::new("ROUTE_USER_BADTOKEN", "ROUTE_PASS_BADTOKEN").build();
    let api = routes(state);

    let response = warp::test::request()
        .method("POST")
        .path("/chat")
        .header("x-auth-token", "token-forged-someone")
        .json(&json!({"message": "hello"}))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_chat_rejects_empty_message() {
    let state = StateBuilder::new("ROUTE_USER_EMPTY", "ROUTE_PASS_EMPTY").build();
    let token = issue_token(&state, "student").await;
    let api = routes(state);

    let response = warp::test::request()
        .method("POST")
        .path("/chat")
        .header("x-auth-token", &token)
        .json(&json!({"message": "   "}))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["detail"], "Invalid input: message cannot be empty");
}

#[tokio::test]
async fn test_chat_offline_falls_back_to_rule_based() {
    let state = StateBuilder::new("ROUTE_USER_OFFLINE", "ROUTE_PASS_OFFLINE").build();
    let token = issue_token(&state, "student").await;
    let api = routes(state);

    let response = warp::test::request()
        .method("POST")
        .path("/chat")
        .header("x-auth-token", &token)
        .json(&json!({"message": "How do I deploy my app?"}))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 200);
    let body: ChatResponse = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body.source, "rule-based");
    assert!(!body.monitored);
    assert!(!body.reply.is_empty());
}

#[tokio::test]
async fn test_chat_agent_reply_carries_model_provenance() {
    let provider = Arc::new(MockLlmProvider::with_responses(vec![
        MockLlmProvider::text_response("{\"topic\": \"programming\"}"),
        MockLlmProvider::text_response("Use cargo build --release."),
    ]));

    let state = StateBuilder::new("ROUTE_USER_AGENT", "ROUTE_PASS_AGENT")
        .with_provider(provider)
        .build();
    let token = issue_token(&state, "student").await;
    let api = routes(state);

    let response = warp::test::request()
        .method("POST")
        .path("/chat")
        .header("x-auth-token", &token)
        .json(&json!({"message": "How do I build a release binary?", "session_id": "sess-7"}))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 200);
    let body: ChatResponse = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body.reply, "Use cargo build --release.");
    assert_eq!(body.source, "agent:gpt-4o-mini");
    assert_eq!(body.session_id, "sess-7");
}

#[tokio::test]
async fn test_chat_mints_session_id_when_absent() {
    let state = StateBuilder::new("ROUTE_USER_SESSION", "ROUTE_PASS_SESSION").build();
    let token = issue_token(&state, "student").await;
    let api = routes(state);

    let response = warp::test::request()
        .method("POST")
        .path("/chat")
        .header("x-auth-token", &token)
        .json(&json!({"message": "hello"}))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 200);
    let body: ChatResponse = serde_json::from_slice(response.body()).unwrap();
    assert!(uuid::Uuid::parse_str(&body.session_id).is_ok());
}

#[tokio::test]
async fn test_chat_off_topic_message_is_blocked() {
    let provider = Arc::new(MockLlmProvider::single_response("{\"topic\": \"politics\"}"));

    let state = StateBuilder::new("ROUTE_USER_TOPIC", "ROUTE_PASS_TOPIC")
        .with_provider(provider.clone())
        .build();
    let token = issue_token(&state, "student").await;
    let api = routes(state);

    let response = warp::test::request()
        .method("POST")
        .path("/chat")
        .header("x-auth-token", &token)
        .json(&json!({"message": "Who should win the election?"}))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 200);
    let body: ChatResponse = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body.source, "guardrail:topic");
    assert!(!body.monitored);
    assert!(body.reply.contains("web frameworks"));

    // The agent must never run for a blocked message
    let requests = provider.recorded_requests().await;
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn test_chat_long_reply_is_blocked_by_reading_time() {
    let long_reply = "word ".repeat(60).trim_end().to_string();
    let provider = Arc::new(MockLlmProvider::with_responses(vec![
        MockLlmProvider::text_response("{\"topic\": \"deployment\"}"),
        MockLlmProvider::text_response(&long_reply),
    ]));

    let state = StateBuilder::new("ROUTE_USER_READING", "ROUTE_PASS_READING")
        .with_provider(provider)
        .build();
    let token = issue_token(&state, "student").await;
    let api = routes(state);

    let response = warp::test::request()
        .method("POST")
        .path("/chat")
        .header("x-auth-token", &token)
        .json(&json!({"message": "Explain deployment in detail"}))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 200);
    let body: ChatResponse = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body.source, "guardrail:reading_time");
    assert!(body.reply.contains("15 seconds"));
    assert!(!body.reply.contains("word word"));
}

#[tokio::test]
async fn test_chat_classifier_failure_fails_open() {
    // Provider errors on every call: the topic guardrail passes the
    // message through and the agent falls back to a rule-based reply
    let provider = Arc::new(MockLlmProvider::with_failure());

    let state = StateBuilder::new("ROUTE_USER_FAILOPEN", "ROUTE_PASS_FAILOPEN")
        .with_provider(provider)
        .build();
    let token = issue_token(&state, "student").await;
    let api = routes(state);

    let response = warp::test::request()
        .method("POST")
        .path("/chat")
        .header("x-auth-token", &token)
        .json(&json!({"message": "How do I deploy?"}))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 200);
    let body: ChatResponse = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body.source, "rule-based");
}

#[tokio::test]
async fn test_chat_reports_monitored_with_healthy_trace_backend() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/public/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/public/ingestion"))
        .respond_with(ResponseTemplate::new(207))
        .mount(&mock_server)
        .await;

    std::env::set_var("ROUTE_TRACE_PK", "pk-test");
    std::env::set_var("ROUTE_TRACE_SK", "sk-test");

    let trace_section = chatguard::config::TraceSection {
        public_key_env: "ROUTE_TRACE_PK".to_string(),
        secret_key_env: "ROUTE_TRACE_SK".to_string(),
        host: mock_server.uri(),
        environment: "test".to_string(),
    };

    let state = StateBuilder::new("ROUTE_USER_MONITORED", "ROUTE_PASS_MONITORED")
        .with_trace(TraceClient::new(Some(&trace_section)))
        .build();
    let token = issue_token(&state, "student").await;
    let api = routes(state);

    let response = warp::test::request()
        .method("POST")
        .path("/chat")
        .header("x-auth-token", &token)
        .json(&json!({"message": "hello"}))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 200);
    let body: ChatResponse = serde_json::from_slice(response.body()).unwrap();
    assert!(body.monitored);
}

#[tokio::test]
async fn test_unknown_route_returns_json_detail() {
    let state = StateBuilder::new("ROUTE_USER_404", "ROUTE_PASS_404").build();
    let api = routes(state);

    let response = warp::test::request()
        .method("GET")
        .path("/nope")
        .reply(&api)
        .await;

    assert_eq!(response.status(), 404);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["detail"], "Not found");
}

#[tokio::test]
async fn test_malformed_body_returns_400() {
    let state = StateBuilder::new("ROUTE_USER_BADBODY", "ROUTE_PASS_BADBODY").build();
    let token = issue_token(&state, "student").await;
    let api = routes(state);

    let response = warp::test::request()
        .method("POST")
        .path("/chat")
        .header("x-auth-token", &token)
        .header("content-type", "application/json")
        .body("{not json")
        .reply(&api)
        .await;

    assert_eq!(response.status(), 400);
}
