//! Delta-style adapter: chunked incremental fields (OpenAI-compatible
//! chat-completions wire shape).

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tracing::debug;

use crate::conversation::TransportMessage;
use crate::error::{ParleyError, Result};
use crate::types::{
    ContentPart, FinishReason, MessageContent, Role, StreamEvent, ToolCallFragment,
};

use super::http::{request_headers, shared_client, AuthScheme, SseLineBuffer};
use super::{AdapterRequest, ChatAdapter, EventStream};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct DeltaAdapter {
    model: String,
    api_key: String,
    base_url: String,
}

impl DeltaAdapter {
    pub fn new(model: impl Into<String>, api_key: String, base_url: Option<String>) -> Self {
        Self {
            model: model.into(),
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    fn build_request_body(&self, request: &AdapterRequest) -> serde_json::Value {
        let messages = request
            .messages
            .iter()
            .map(message_to_wire)
            .collect::<Vec<_>>();

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        });

        let obj = body.as_object_mut().expect("body is an object");

        if let Some(max) = request.parameters.max_tokens {
            obj.insert("max_tokens".into(), max.into());
        }
        if let Some(temp) = request.parameters.temperature {
            obj.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = request.parameters.top_p {
            obj.insert("top_p".into(), top_p.into());
        }
        if let Some(ref stops) = request.parameters.stop_sequences {
            obj.insert("stop".into(), serde_json::json!(stops));
        }

        if !request.tools.is_empty() {
            let tool_defs: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            obj.insert("tools".into(), tool_defs.into());
        }

        super::apply_overrides(&mut body, &request.parameters.overrides);
        body
    }
}

#[async_trait]
impl ChatAdapter for DeltaAdapter {
    fn backend_name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn stream(&self, request: &AdapterRequest) -> Result<EventStream> {
        let body = self.build_request_body(request);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %self.model, "delta adapter stream");

        let resp = shared_client()
            .post(&url)
            .headers(request_headers(&self.api_key, AuthScheme::Bearer))
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(super::http::status_to_error(status, &body_text));
        }

        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut lines = SseLineBuffer::new();
            futures::pin_mut!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(ParleyError::from(e));
                        break;
                    }
                };

                for data in lines.push(&chunk) {
                    // unparseable payloads are skipped, not fatal
                    if let Ok(parsed) = serde_json::from_str::<DeltaChunk>(&data) {
                        for event in events_from_chunk(parsed) {
                            yield Ok(event);
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Translate one chunk into normalized events.
///
/// Each delta is classified independently; there is no sticky
/// reasoning-vs-content state, so backends that interleave both within a
/// stream lose nothing. Order within a chunk: reasoning, content, tool
/// fragments, finish.
fn events_from_chunk(chunk: DeltaChunk) -> Vec<StreamEvent> {
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Vec::new();
    };

    let mut events = Vec::new();

    if let Some(reasoning) = choice.delta.reasoning_content {
        if !reasoning.is_empty() {
            events.push(StreamEvent::reasoning(reasoning));
        }
    }
    if let Some(content) = choice.delta.content {
        if !content.is_empty() {
            events.push(StreamEvent::content(content));
        }
    }
    for tc in choice.delta.tool_calls.unwrap_or_default() {
        let function = tc.function.unwrap_or_default();
        events.push(StreamEvent::ToolCallFragment(ToolCallFragment {
            index: tc.index,
            id: tc.id.filter(|id| !id.is_empty()),
            name: function.name.filter(|n| !n.is_empty()),
            arguments_delta: function.arguments,
        }));
    }
    if let Some(reason) = choice.finish_reason.filter(|r| !r.is_empty()) {
        events.push(StreamEvent::Finish {
            reason: parse_finish_reason(&reason),
        });
    }

    events
}

fn parse_finish_reason(s: &str) -> FinishReason {
    match s {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "tool_calls" => FinishReason::ToolCalls,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Other,
    }
}

fn message_to_wire(msg: &TransportMessage) -> serde_json::Value {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    if msg.role == Role::Tool {
        return serde_json::json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id,
            "content": content_text(msg),
        });
    }

    if let Some(ref tool_calls) = msg.tool_calls {
        let tc_json: Vec<serde_json::Value> = tool_calls
            .iter()
            .map(|tc| {
                serde_json::json!({
                    "id": tc.id,
                    "type": "function",
                    "function": {
                        "name": tc.name,
                        "arguments": tc.arguments,
                    }
                })
            })
            .collect();
        let text = content_text(msg);
        return serde_json::json!({
            "role": role,
            "content": if text.is_empty() { serde_json::Value::Null } else { text.into() },
            "tool_calls": tc_json,
        });
    }

    match &msg.content {
        Some(MessageContent::Text(text)) => serde_json::json!({ "role": role, "content": text }),
        Some(MessageContent::Parts(parts)) => {
            let wire_parts: Vec<serde_json::Value> = parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => serde_json::json!({
                        "type": "text",
                        "text": text,
                    }),
                    ContentPart::Image(img) => serde_json::json!({
                        "type": "image_url",
                        "image_url": {
                            "url": format!("data:{};base64,{}", img.mime_type, img.data),
                        }
                    }),
                })
                .collect();
            serde_json::json!({ "role": role, "content": wire_parts })
        }
        None => serde_json::json!({ "role": role, "content": serde_json::Value::Null }),
    }
}

fn content_text(msg: &TransportMessage) -> String {
    match &msg.content {
        Some(MessageContent::Text(t)) => t.clone(),
        Some(MessageContent::Parts(parts)) => parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(""),
        None => String::new(),
    }
}

// Wire chunk types (internal)

#[derive(Deserialize)]
struct DeltaChunk {
    #[serde(default)]
    choices: Vec<DeltaChoice>,
}

#[derive(Deserialize)]
struct DeltaChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default, alias = "reasoning")]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChunkToolCall>>,
}

#[derive(Deserialize)]
struct ChunkToolCall {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<ChunkFunction>,
}

#[derive(Deserialize, Default)]
struct ChunkFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{ModelParameters, ToolSchema};
    use crate::types::ToolCall;

    fn chunk(json: &str) -> DeltaChunk {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn reasoning_and_content_in_one_chunk_yield_two_events() {
        let events = events_from_chunk(chunk(
            r#"{"choices":[{"delta":{"reasoning_content":"hmm","content":"hi"}}]}"#,
        ));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], StreamEvent::reasoning("hmm"));
        assert_eq!(events[1], StreamEvent::content("hi"));
    }

    #[test]
    fn reasoning_after_content_is_not_mode_locked() {
        // later chunks still classify reasoning deltas as reasoning
        let events = events_from_chunk(chunk(
            r#"{"choices":[{"delta":{"reasoning_content":"still thinking"}}]}"#,
        ));
        assert_eq!(events, vec![StreamEvent::reasoning("still thinking")]);
    }

    #[test]
    fn reasoning_field_alias() {
        let events =
            events_from_chunk(chunk(r#"{"choices":[{"delta":{"reasoning":"alt field"}}]}"#));
        assert_eq!(events, vec![StreamEvent::reasoning("alt field")]);
    }

    #[test]
    fn tool_call_delta_maps_to_fragment() {
        let events = events_from_chunk(chunk(
            r#"{"choices":[{"delta":{"tool_calls":[
                {"index":1,"id":"call_9","function":{"name":"read_file","arguments":"{\"pa"}}
            ]}}]}"#,
        ));
        assert_eq!(
            events,
            vec![StreamEvent::ToolCallFragment(ToolCallFragment {
                index: 1,
                id: Some("call_9".into()),
                name: Some("read_file".into()),
                arguments_delta: Some("{\"pa".into()),
            })],
        );
    }

    #[test]
    fn finish_reason_yields_terminal_event() {
        let events =
            events_from_chunk(chunk(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#));
        assert_eq!(
            events,
            vec![StreamEvent::Finish {
                reason: FinishReason::Stop
            }],
        );
    }

    #[test]
    fn empty_delta_yields_nothing() {
        assert!(events_from_chunk(chunk(r#"{"choices":[{"delta":{}}]}"#)).is_empty());
        assert!(events_from_chunk(chunk(r#"{"choices":[]}"#)).is_empty());
    }

    fn adapter() -> DeltaAdapter {
        DeltaAdapter::new("gpt-4o", "test-key".to_string(), None)
    }

    #[test]
    fn request_body_includes_tools_and_parameters() {
        let request = AdapterRequest {
            messages: vec![TransportMessage {
                role: Role::User,
                content: Some(MessageContent::Text("hello".into())),
                tool_calls: None,
                tool_call_id: None,
            }],
            tools: vec![ToolSchema {
                name: "read_file".into(),
                description: "Read a file".into(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
            }],
            parameters: ModelParameters {
                max_tokens: Some(1024),
                temperature: Some(0.2),
                ..Default::default()
            },
        };
        let body = adapter().build_request_body(&request);
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "read_file");
        assert_eq!(body["messages"][0]["content"], "hello");
    }

    #[test]
    fn assistant_with_only_tool_calls_has_null_content() {
        let request = AdapterRequest {
            messages: vec![TransportMessage {
                role: Role::Assistant,
                content: None,
                tool_calls: Some(vec![ToolCall {
                    id: "call_1".into(),
                    name: "list_dir".into(),
                    arguments: "{\"path\":\".\"}".into(),
                    index: 0,
                }]),
                tool_call_id: None,
            }],
            tools: Vec::new(),
            parameters: ModelParameters::default(),
        };
        let body = adapter().build_request_body(&request);
        let msg = &body["messages"][0];
        assert!(msg["content"].is_null());
        assert_eq!(msg["tool_calls"][0]["function"]["name"], "list_dir");
        assert_eq!(
            msg["tool_calls"][0]["function"]["arguments"],
            "{\"path\":\".\"}",
        );
    }

    #[test]
    fn tool_message_carries_call_id() {
        let request = AdapterRequest {
            messages: vec![TransportMessage {
                role: Role::Tool,
                content: Some(MessageContent::Text("ok".into())),
                tool_calls: None,
                tool_call_id: Some("call_1".into()),
            }],
            tools: Vec::new(),
            parameters: ModelParameters::default(),
        };
        let body = adapter().build_request_body(&request);
        assert_eq!(body["messages"][0]["role"], "tool");
        assert_eq!(body["messages"][0]["tool_call_id"], "call_1");
        assert_eq!(body["messages"][0]["content"], "ok");
    }

    #[test]
    fn image_parts_become_data_urls() {
        let request = AdapterRequest {
            messages: vec![TransportMessage {
                role: Role::User,
                content: Some(MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: "look".into(),
                    },
                    ContentPart::Image(crate::types::ImageContent {
                        data: "aGk=".into(),
                        mime_type: "image/png".into(),
                    }),
                ])),
                tool_calls: None,
                tool_call_id: None,
            }],
            tools: Vec::new(),
            parameters: ModelParameters::default(),
        };
        let body = adapter().build_request_body(&request);
        let parts = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(
            parts[1]["image_url"]["url"],
            "data:image/png;base64,aGk=",
        );
    }

    #[test]
    fn overrides_win_over_parameters() {
        let request = AdapterRequest {
            messages: Vec::new(),
            tools: Vec::new(),
            parameters: ModelParameters {
                temperature: Some(0.9),
                overrides: vec![
                    ("temperature".to_string(), serde_json::Value::Null),
                    ("seed".to_string(), serde_json::json!(42)),
                ],
                ..Default::default()
            },
        };
        let body = adapter().build_request_body(&request);
        assert!(body.get("temperature").is_none());
        assert_eq!(body["seed"], 42);
    }
}
