//! Trace exporter
//!
//! Client for a Langfuse-compatible ingestion API. Each chat turn is
//! recorded as one trace event carrying the session id, input, output, and
//! provenance. Delivery is fire-and-forget on a background task; the HTTP
//! reply never waits on the trace backend.

use crate::config::TraceSection;
use chrono::Utc;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Resolved trace credentials and endpoint
#[derive(Debug, Clone)]
struct TraceCredentials {
    public_key: String,
    secret_key: String,
    host: String,
    environment: String,
}

/// Trace exporter client; disabled when configuration or keys are missing
#[derive(Debug, Clone)]
pub struct TraceClient {
    client: reqwest::Client,
    credentials: Option<TraceCredentials>,
}

impl TraceClient {
    /// Build a client from the optional `[trace]` section, resolving key
    /// environment variables. Missing configuration disables tracing.
    pub fn new(section: Option<&TraceSection>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        let credentials = section.and_then(|section| {
            let public_key = std::env::var(&section.public_key_env).ok();
            let secret_key = std::env::var(&section.secret_key_env).ok();

            match (public_key, secret_key) {
                (Some(public_key), Some(secret_key)) => Some(TraceCredentials {
                    public_key,
                    secret_key,
                    host: section.host.trim_end_matches('/').to_string(),
                    environment: section.environment.clone(),
                }),
                _ => {
                    warn!(
                        "Trace keys not set ({}, {}), tracing disabled",
                        section.public_key_env, section.secret_key_env
                    );
                    None
                }
            }
        });

        Self {
            client,
            credentials,
        }
    }

    /// Disabled client, used when `[trace]` is absent
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Whether the client has credentials to work with
    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    /// Verify the credentials against the backend. Drives the per-request
    /// `monitored` flag; a disabled client always reports false.
    pub async fn auth_check(&self) -> bool {
        let credentials = match &self.credentials {
            Some(credentials) => credentials,
            None => return false,
        };

        let result = self
            .client
            .get(format!("{}/api/public/health", credentials.host))
            .basic_auth(&credentials.public_key, Some(&credentials.secret_key))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!("Trace backend authenticated and ready");
                true
            }
            Ok(response) => {
                warn!(status = %response.status(), "Trace backend auth check failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "Trace backend unreachable");
                false
            }
        }
    }

    /// Record one chat turn. Spawns a background task; errors are logged
    /// and dropped.
    pub fn record_chat_span(&self, session_id: &str, input: &str, output: &str, source: &str) {
        let credentials = match &self.credentials {
            Some(credentials) => credentials.clone(),
            None => return,
        };

        let client = self.client.clone();
        let batch = Self::build_ingestion_batch(&credentials, session_id, input, output, source);

        tokio::spawn(async move {
            let result = client
                .post(format!("{}/api/public/ingestion", credentials.host))
                .basic_auth(&credentials.public_key, Some(&credentials.secret_key))
                .json(&batch)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    debug!("Trace span delivered");
                }
                Ok(response) => {
                    warn!(status = %response.status(), "Trace ingestion rejected");
                }
                Err(e) => {
                    warn!(error = %e, "Trace ingestion failed");
                }
            }
        });
    }

    /// Build the ingestion batch payload (pure function)
    fn build_ingestion_batch(
        credentials: &TraceCredentials,
        session_id: &str,
        input: &str,
        output: &str,
        source: &str,
    ) -> serde_json::Value {
        let timestamp = Utc::now().to_rfc3339();

        json!({
            "batch": [
                {
                    "id": Uuid::new_v4().to_string(),
                    "type": "trace-create",
                    "timestamp": timestamp,
                    "body": {
                        "id": Uuid::new_v4().to_string(),
                        "name": "chat-agent",
                        "sessionId": session_id,
                        "environment": credentials.environment,
                        "input": input,
                        "output": output,
                        "metadata": { "source": source },
                        "timestamp": timestamp
                    }
                }
            ]
        })
    }
}
