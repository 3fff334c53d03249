//! Provider adapters: one per backend family, each translating that
//! backend's raw stream chunks into normalized [`StreamEvent`]s.

pub mod block;
pub mod delta;
pub mod http;

pub use block::BlockAdapter;
pub use delta::DeltaAdapter;

use std::str::FromStr;

use async_trait::async_trait;
use bon::Builder;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::config::ParleyConfig;
use crate::conversation::TransportMessage;
use crate::error::{ParleyError, Result};
use crate::types::StreamEvent;

/// Lazy sequence of normalized events, produced as network data arrives.
pub type EventStream = BoxStream<'static, Result<StreamEvent>>;

/// A request sent to a backend.
#[derive(Debug, Clone, Default)]
pub struct AdapterRequest {
    /// Full transcript in transport form (system message first).
    pub messages: Vec<TransportMessage>,
    /// Registered tool schemas, passed through unmodified.
    pub tools: Vec<ToolSchema>,
    pub parameters: ModelParameters,
}

/// Tool schema sent to the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON-Schema-like parameter object.
    pub parameters: serde_json::Value,
}

/// Backend-specific call parameters.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default)]
pub struct ModelParameters {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub stop_sequences: Option<Vec<String>>,
    /// Raw body overrides applied last: a `Null` value removes the key.
    #[builder(default)]
    #[serde(default)]
    pub overrides: Vec<(String, serde_json::Value)>,
}

/// Core trait implemented by all adapters.
#[async_trait]
pub trait ChatAdapter: Send + Sync {
    /// Backend family name (e.g., "openai", "anthropic").
    fn backend_name(&self) -> &str;

    /// The model this adapter instance serves.
    fn model_id(&self) -> &str;

    /// Open a streaming round. The returned sequence must not buffer the
    /// whole response; events already yielded before a failure stand.
    async fn stream(&self, request: &AdapterRequest) -> Result<EventStream>;
}

/// Closed set of supported backends, selected once at session setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Chunked incremental-field wire format (OpenAI-compatible).
    OpenAiCompatible { model: String },
    /// Explicit begin/delta/end block wire format (Anthropic-compatible).
    AnthropicCompatible { model: String },
}

impl FromStr for Backend {
    type Err = ParleyError;

    /// Parse `"openai:MODEL"` or `"anthropic:MODEL"`.
    fn from_str(s: &str) -> Result<Self> {
        let (family, model) = s.split_once(':').ok_or_else(|| {
            ParleyError::Configuration(format!("expected 'family:model', got '{s}'"))
        })?;
        match family {
            "openai" => Ok(Self::OpenAiCompatible {
                model: model.to_string(),
            }),
            "anthropic" => Ok(Self::AnthropicCompatible {
                model: model.to_string(),
            }),
            other => Err(ParleyError::Configuration(format!(
                "unknown backend family '{other}'"
            ))),
        }
    }
}

/// Create the adapter for a backend, using the provided config.
pub fn create_adapter(backend: &Backend, config: &ParleyConfig) -> Result<Box<dyn ChatAdapter>> {
    match backend {
        Backend::OpenAiCompatible { model } => {
            let api_key = config
                .get_api_key("openai")
                .ok_or_else(|| ParleyError::Authentication("Missing OPENAI_API_KEY".into()))?;
            Ok(Box::new(DeltaAdapter::new(
                model.clone(),
                api_key,
                config.get_base_url("openai"),
            )))
        }
        Backend::AnthropicCompatible { model } => {
            let api_key = config
                .get_api_key("anthropic")
                .ok_or_else(|| ParleyError::Authentication("Missing ANTHROPIC_API_KEY".into()))?;
            Ok(Box::new(BlockAdapter::new(
                model.clone(),
                api_key,
                config.get_base_url("anthropic"),
            )))
        }
    }
}

/// Apply raw body overrides; a `Null` value removes the key.
pub(crate) fn apply_overrides(
    body: &mut serde_json::Value,
    overrides: &[(String, serde_json::Value)],
) {
    let Some(obj) = body.as_object_mut() else {
        return;
    };
    for (key, value) in overrides {
        if value.is_null() {
            obj.remove(key);
        } else {
            obj.insert(key.clone(), value.clone());
        }
    }
}
