//! Conversation gateway to the external chat-completion service.
//!
//! Builds the outbound turn sequence — one synthesized system turn carrying
//! the dataset context, then the caller's history untouched — and performs a
//! single blocking round trip to an OpenAI-style `chat/completions`
//! endpoint. Upstream failures are mapped into a small taxonomy:
//!
//! - HTTP 429 → [`GatewayError::RateLimited`] (transient, caller may retry)
//! - HTTP 402 → [`GatewayError::QuotaExhausted`] (billing exhausted)
//! - any other non-success or transport error → [`GatewayError::Upstream`]
//!   (upstream status and body are logged, never surfaced verbatim)
//! - missing credential at construction → [`GatewayError::Configuration`],
//!   before any network call is attempted
//!
//! Nothing is retried and no client-side timeout is configured beyond the
//! platform default; a failure is surfaced immediately and the caller may
//! retry manually. There is no cancellation path once a request is sent.

use reqwest::StatusCode;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::CompletionConfig;
use crate::models::ConversationTurn;

/// Instruction template for the system turn. The dataset context replaces
/// `{context}`. Treated as an opaque, swappable template by everything else.
const SYSTEM_PROMPT_TEMPLATE: &str = "\
Você é um analista de vendas sênior altamente experiente.

DADOS DA PLANILHA:
{context}

INSTRUÇÕES:
- Analise os dados de vendas fornecidos acima com profundidade
- Identifique tendências, padrões, sazonalidades e oportunidades
- Forneça insights claros, estratégicos e acionáveis
- Use linguagem simples e estruturada
- Quando solicitado, gere resumos executivos e sugestões práticas
- Destaque produtos de destaque, regiões mais lucrativas e gargalos
- Seja específico com números e percentuais quando possível
- Forneça recomendações de ações concretas para o time comercial

Responda sempre em português brasileiro de forma profissional e objetiva.";

/// Failure taxonomy for one completion round trip.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Required credential or endpoint missing; raised before any call.
    #[error("completion service not configured: {0}")]
    Configuration(String),
    /// Service reported resource exhaustion (HTTP 429). Retryable.
    #[error("completion service rate limit exceeded")]
    RateLimited,
    /// Service reported billing/credit exhaustion (HTTP 402).
    #[error("completion service credits exhausted")]
    QuotaExhausted,
    /// Any other non-success response or transport failure.
    #[error("completion service request failed: {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },
}

/// Render the system instruction with the serialized dataset context.
pub fn render_system_prompt(context: &str) -> String {
    SYSTEM_PROMPT_TEMPLATE.replace("{context}", context)
}

/// Client for the external completion service.
#[derive(Debug)]
pub struct CompletionGateway {
    client: reqwest::Client,
    config: CompletionConfig,
    api_key: String,
}

impl CompletionGateway {
    /// Build a gateway from configuration, reading the bearer credential
    /// from the configured environment variable.
    ///
    /// Fails fast with [`GatewayError::Configuration`] when the credential
    /// is absent, so a misconfigured deployment never reaches the network.
    pub fn new(config: &CompletionConfig) -> Result<Self, GatewayError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            GatewayError::Configuration(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;
        if api_key.trim().is_empty() {
            return Err(GatewayError::Configuration(format!(
                "{} environment variable is empty",
                config.api_key_env
            )));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            config: config.clone(),
            api_key,
        })
    }

    /// Forward the conversation plus dataset context and return the single
    /// completion text chosen by the service, with no post-processing.
    pub async fn respond(
        &self,
        history: &[ConversationTurn],
        context: &str,
    ) -> Result<String, GatewayError> {
        let body = json!({
            "model": self.config.model,
            "messages": build_messages(history, context),
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        let resp = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "completion request failed to send");
                GatewayError::Upstream {
                    status: None,
                    message: e.to_string(),
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(map_failure(status, &body_text));
        }

        let payload: Value = resp.json().await.map_err(|e| GatewayError::Upstream {
            status: Some(status.as_u16()),
            message: format!("invalid response body: {}", e),
        })?;

        extract_completion(&payload)
    }
}

/// Map a non-success upstream status into the error taxonomy.
///
/// The upstream body is logged for operators but never carried into the
/// caller-facing error.
fn map_failure(status: StatusCode, body: &str) -> GatewayError {
    match status.as_u16() {
        429 => {
            tracing::warn!(status = 429, "completion service rate limited");
            GatewayError::RateLimited
        }
        402 => {
            tracing::warn!(status = 402, "completion service quota exhausted");
            GatewayError::QuotaExhausted
        }
        code => {
            tracing::error!(status = code, body, "completion service error");
            GatewayError::Upstream {
                status: Some(code),
                message: format!("upstream returned status {}", code),
            }
        }
    }
}

/// Outbound turn sequence: one system turn, then the history in order —
/// never reordered, never truncated.
fn build_messages(history: &[ConversationTurn], context: &str) -> Vec<Value> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(json!({
        "role": "system",
        "content": render_system_prompt(context),
    }));
    for turn in history {
        messages.push(json!({ "role": turn.role, "content": turn.content }));
    }
    messages
}

/// Pull the first/primary choice text out of a completions response.
fn extract_completion(payload: &Value) -> Result<String, GatewayError> {
    payload
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| GatewayError::Upstream {
            status: None,
            message: "response missing choices[0].message.content".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConversationTurn;

    #[test]
    fn test_system_prompt_carries_context() {
        let prompt = render_system_prompt("Data | Produto\n2024-01-05 | Mouse");
        assert!(prompt.contains("2024-01-05 | Mouse"));
        assert!(prompt.contains("analista de vendas"));
        assert!(!prompt.contains("{context}"));
    }

    #[test]
    fn test_messages_are_system_then_history_in_order() {
        let history = vec![
            ConversationTurn::user("qual mês teve maior receita?"),
            ConversationTurn::assistant("Fevereiro."),
            ConversationTurn::user("e o menor?"),
        ];
        let messages = build_messages(&history, "ctx");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "qual mês teve maior receita?");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["content"], "e o menor?");
    }

    #[test]
    fn test_status_429_maps_to_rate_limited() {
        let err = map_failure(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, GatewayError::RateLimited));
    }

    #[test]
    fn test_status_402_maps_to_quota_exhausted() {
        let err = map_failure(StatusCode::PAYMENT_REQUIRED, "no credits");
        assert!(matches!(err, GatewayError::QuotaExhausted));
    }

    #[test]
    fn test_other_statuses_map_to_upstream() {
        for code in [400u16, 401, 403, 500, 502, 503] {
            let status = StatusCode::from_u16(code).unwrap();
            let err = map_failure(status, "boom");
            match err {
                GatewayError::Upstream { status, message } => {
                    assert_eq!(status, Some(code));
                    // The upstream body must not leak to the caller.
                    assert!(!message.contains("boom"));
                }
                other => panic!("expected Upstream for {}, got {:?}", code, other),
            }
        }
    }

    #[test]
    fn test_extract_first_choice() {
        let payload = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "Fevereiro teve a maior receita." } },
                { "message": { "role": "assistant", "content": "segunda opção" } }
            ]
        });
        let text = extract_completion(&payload).unwrap();
        assert_eq!(text, "Fevereiro teve a maior receita.");
    }

    #[test]
    fn test_extract_rejects_malformed_payload() {
        let payload = serde_json::json!({ "choices": [] });
        assert!(extract_completion(&payload).is_err());
    }

    #[test]
    fn test_missing_credential_is_configuration_error() {
        let config = CompletionConfig {
            api_key_env: "TECNOBOT_TEST_KEY_THAT_DOES_NOT_EXIST".to_string(),
            ..CompletionConfig::default()
        };
        let err = CompletionGateway::new(&config).unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));
    }
}
