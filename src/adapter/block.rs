//! Block-style adapter: explicit begin/delta/end block events
//! (Anthropic-compatible messages wire shape).

use async_trait::async_trait;
use futures::StreamExt;
use tracing::debug;

use crate::conversation::TransportMessage;
use crate::error::{ParleyError, Result};
use crate::types::{
    ContentPart, FinishReason, MessageContent, Role, StreamEvent, ToolCallFragment,
};

use super::http::{request_headers, shared_client, AuthScheme, SseLineBuffer};
use super::{AdapterRequest, ChatAdapter, EventStream};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

pub struct BlockAdapter {
    model: String,
    api_key: String,
    base_url: String,
}

impl BlockAdapter {
    pub fn new(model: impl Into<String>, api_key: String, base_url: Option<String>) -> Self {
        Self {
            model: model.into(),
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    fn build_request_body(&self, request: &AdapterRequest) -> serde_json::Value {
        let mut system_parts = Vec::new();
        let mut messages = Vec::new();

        for msg in &request.messages {
            match msg.role {
                Role::System => {
                    system_parts.push(text_of(msg));
                }
                Role::User => {
                    messages.push(serde_json::json!({
                        "role": "user",
                        "content": user_content(msg),
                    }));
                }
                Role::Assistant => {
                    let mut content: Vec<serde_json::Value> = Vec::new();
                    let text = text_of(msg);
                    if !text.is_empty() {
                        content.push(serde_json::json!({"type": "text", "text": text}));
                    }
                    for tc in msg.tool_calls.iter().flatten() {
                        // Arguments were accumulated as a raw string; the wire
                        // wants a structured input object.
                        let input = serde_json::from_str(&tc.arguments)
                            .unwrap_or(serde_json::Value::String(tc.arguments.clone()));
                        content.push(serde_json::json!({
                            "type": "tool_use",
                            "id": tc.id,
                            "name": tc.name,
                            "input": input,
                        }));
                    }
                    if !content.is_empty() {
                        messages.push(serde_json::json!({
                            "role": "assistant",
                            "content": content,
                        }));
                    }
                }
                Role::Tool => {
                    messages.push(serde_json::json!({
                        "role": "user",
                        "content": [{
                            "type": "tool_result",
                            "tool_use_id": msg.tool_call_id,
                            "content": text_of(msg),
                        }],
                    }));
                }
            }
        }

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": request.parameters.max_tokens.unwrap_or(4096),
            "stream": true,
        });

        let obj = body.as_object_mut().expect("body is an object");

        if !system_parts.is_empty() {
            obj.insert("system".into(), system_parts.join("\n").into());
        }
        if let Some(temp) = request.parameters.temperature {
            obj.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = request.parameters.top_p {
            obj.insert("top_p".into(), top_p.into());
        }
        if let Some(ref stops) = request.parameters.stop_sequences {
            obj.insert("stop_sequences".into(), serde_json::json!(stops));
        }

        if !request.tools.is_empty() {
            let tool_defs: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
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
impl ChatAdapter for BlockAdapter {
    fn backend_name(&self) -> &str {
        "anthropic"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn stream(&self, request: &AdapterRequest) -> Result<EventStream> {
        let body = self.build_request_body(request);
        let url = format!("{}/messages", self.base_url);

        debug!(model = %self.model, "block adapter stream");

        let resp = shared_client()
            .post(&url)
            .headers(request_headers(
                &self.api_key,
                AuthScheme::VersionedKey {
                    version: API_VERSION,
                },
            ))
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
            let mut state = BlockStreamState::default();
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
                    if let Ok(event) = serde_json::from_str::<serde_json::Value>(&data) {
                        if event.get("type").and_then(|t| t.as_str()) == Some("error") {
                            let message = event
                                .get("error")
                                .and_then(|e| e.get("message"))
                                .and_then(|m| m.as_str())
                                .unwrap_or("stream error");
                            yield Err(ParleyError::adapter(message));
                            continue;
                        }
                        for out in state.handle(&event) {
                            yield Ok(out);
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Per-stream translation state.
///
/// Tracks the open content block and de-duplicates the terminal stop
/// signal: the end-of-stream framing is redundant by design (a stop reason
/// arrives via the message-level delta and again at message stop) and the
/// adapter, not the caller, owns the de-duplication.
#[derive(Debug, Default)]
struct BlockStreamState {
    open_tool: Option<OpenTool>,
    next_tool_index: u32,
    saw_tool_use: bool,
    finished: bool,
}

#[derive(Debug)]
struct OpenTool {
    index: u32,
    id: String,
    name: String,
}

impl BlockStreamState {
    fn handle(&mut self, event: &serde_json::Value) -> Vec<StreamEvent> {
        let event_type = event.get("type").and_then(|t| t.as_str()).unwrap_or("");
        let mut out = Vec::new();

        match event_type {
            "content_block_start" => {
                let Some(block) = event.get("content_block") else {
                    return out;
                };
                match block.get("type").and_then(|t| t.as_str()).unwrap_or("") {
                    "text" => {
                        if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                            if !text.is_empty() {
                                out.push(StreamEvent::content(text));
                            }
                        }
                    }
                    "thinking" => {
                        if let Some(thinking) = block.get("thinking").and_then(|t| t.as_str()) {
                            if !thinking.is_empty() {
                                out.push(StreamEvent::reasoning(thinking));
                            }
                        }
                    }
                    "tool_use" => {
                        let index = self.next_tool_index;
                        self.next_tool_index += 1;
                        self.saw_tool_use = true;
                        let id = block
                            .get("id")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string();
                        let name = block
                            .get("name")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string();
                        // Emit id and name immediately, before any argument
                        // bytes, so the id survives an empty-input call.
                        out.push(StreamEvent::ToolCallFragment(ToolCallFragment::opening(
                            index,
                            id.clone(),
                            name.clone(),
                        )));
                        self.open_tool = Some(OpenTool { index, id, name });
                    }
                    _ => {}
                }
            }
            "content_block_delta" => {
                let Some(delta) = event.get("delta") else {
                    return out;
                };
                match delta.get("type").and_then(|t| t.as_str()).unwrap_or("") {
                    "text_delta" => {
                        if let Some(text) = delta.get("text").and_then(|t| t.as_str()) {
                            out.push(StreamEvent::content(text));
                        }
                    }
                    "thinking_delta" => {
                        if let Some(thinking) = delta.get("thinking").and_then(|t| t.as_str()) {
                            out.push(StreamEvent::reasoning(thinking));
                        }
                    }
                    "input_json_delta" => {
                        if let Some(tool) = &self.open_tool {
                            if let Some(json) = delta.get("partial_json").and_then(|t| t.as_str())
                            {
                                out.push(StreamEvent::ToolCallFragment(
                                    ToolCallFragment::arguments(tool.index, json),
                                ));
                            }
                        }
                    }
                    _ => {}
                }
            }
            "content_block_stop" => {
                // Re-emit id and name (never the argument bytes) so a
                // consumer that only reacts on stop still observes the call.
                if let Some(tool) = self.open_tool.take() {
                    out.push(StreamEvent::ToolCallFragment(ToolCallFragment::opening(
                        tool.index, tool.id, tool.name,
                    )));
                }
            }
            "message_delta" => {
                let stop = event
                    .get("delta")
                    .and_then(|d| d.get("stop_reason"))
                    .and_then(|s| s.as_str());
                if let Some(stop) = stop {
                    if !stop.is_empty() && !self.finished {
                        self.finished = true;
                        out.push(StreamEvent::Finish {
                            reason: parse_stop_reason(stop),
                        });
                    }
                }
            }
            "message_stop" => {
                if !self.finished {
                    self.finished = true;
                    out.push(StreamEvent::Finish {
                        reason: if self.saw_tool_use {
                            FinishReason::ToolCalls
                        } else {
                            FinishReason::Stop
                        },
                    });
                }
            }
            _ => {} // message_start, ping
        }

        out
    }
}

fn parse_stop_reason(s: &str) -> FinishReason {
    match s {
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::ToolCalls,
        _ => FinishReason::Other,
    }
}

fn text_of(msg: &TransportMessage) -> String {
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

fn user_content(msg: &TransportMessage) -> serde_json::Value {
    match &msg.content {
        Some(MessageContent::Text(text)) => serde_json::Value::String(text.clone()),
        Some(MessageContent::Parts(parts)) => {
            let content: Vec<serde_json::Value> = parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => serde_json::json!({
                        "type": "text",
                        "text": text,
                    }),
                    ContentPart::Image(img) => serde_json::json!({
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": img.mime_type,
                            "data": img.data,
                        }
                    }),
                })
                .collect();
            serde_json::json!(content)
        }
        None => serde_json::Value::String(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{ModelParameters, ToolSchema};
    use crate::types::ToolCall;

    fn ev(json: &str) -> serde_json::Value {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn tool_use_start_emits_early_id_fragment() {
        let mut state = BlockStreamState::default();
        let out = state.handle(&ev(
            r#"{"type":"content_block_start","content_block":{"type":"tool_use","id":"toolu_1","name":"list_dir"}}"#,
        ));
        assert_eq!(
            out,
            vec![StreamEvent::ToolCallFragment(ToolCallFragment::opening(
                0, "toolu_1", "list_dir",
            ))],
        );
    }

    #[test]
    fn partial_json_maps_to_arguments_only_fragment() {
        let mut state = BlockStreamState::default();
        state.handle(&ev(
            r#"{"type":"content_block_start","content_block":{"type":"tool_use","id":"toolu_1","name":"list_dir"}}"#,
        ));
        let out = state.handle(&ev(
            r#"{"type":"content_block_delta","delta":{"type":"input_json_delta","partial_json":"{\"path\":"}}"#,
        ));
        assert_eq!(
            out,
            vec![StreamEvent::ToolCallFragment(ToolCallFragment::arguments(
                0, "{\"path\":",
            ))],
        );
    }

    #[test]
    fn block_stop_re_emits_id_and_name_without_arguments() {
        let mut state = BlockStreamState::default();
        state.handle(&ev(
            r#"{"type":"content_block_start","content_block":{"type":"tool_use","id":"toolu_1","name":"list_dir"}}"#,
        ));
        state.handle(&ev(
            r#"{"type":"content_block_delta","delta":{"type":"input_json_delta","partial_json":"{}"}}"#,
        ));
        let out = state.handle(&ev(r#"{"type":"content_block_stop"}"#));
        assert_eq!(
            out,
            vec![StreamEvent::ToolCallFragment(ToolCallFragment::opening(
                0, "toolu_1", "list_dir",
            ))],
        );
        // stop consumed the open block; a stray second stop is inert
        assert!(state.handle(&ev(r#"{"type":"content_block_stop"}"#)).is_empty());
    }

    #[test]
    fn message_delta_then_message_stop_emits_one_finish() {
        let mut state = BlockStreamState::default();
        let first = state.handle(&ev(
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"}}"#,
        ));
        assert_eq!(
            first,
            vec![StreamEvent::Finish {
                reason: FinishReason::Stop
            }],
        );
        let second = state.handle(&ev(r#"{"type":"message_stop"}"#));
        assert!(second.is_empty());
    }

    #[test]
    fn message_stop_alone_emits_the_sole_finish() {
        let mut state = BlockStreamState::default();
        let out = state.handle(&ev(r#"{"type":"message_stop"}"#));
        assert_eq!(
            out,
            vec![StreamEvent::Finish {
                reason: FinishReason::Stop
            }],
        );
    }

    #[test]
    fn thinking_blocks_map_to_reasoning() {
        let mut state = BlockStreamState::default();
        state.handle(&ev(
            r#"{"type":"content_block_start","content_block":{"type":"thinking","thinking":""}}"#,
        ));
        let out = state.handle(&ev(
            r#"{"type":"content_block_delta","delta":{"type":"thinking_delta","thinking":"let me see"}}"#,
        ));
        assert_eq!(out, vec![StreamEvent::reasoning("let me see")]);
    }

    #[test]
    fn second_tool_block_gets_next_index() {
        let mut state = BlockStreamState::default();
        state.handle(&ev(
            r#"{"type":"content_block_start","content_block":{"type":"tool_use","id":"a","name":"one"}}"#,
        ));
        state.handle(&ev(r#"{"type":"content_block_stop"}"#));
        let out = state.handle(&ev(
            r#"{"type":"content_block_start","content_block":{"type":"tool_use","id":"b","name":"two"}}"#,
        ));
        assert_eq!(
            out,
            vec![StreamEvent::ToolCallFragment(ToolCallFragment::opening(
                1, "b", "two",
            ))],
        );
    }

    fn adapter() -> BlockAdapter {
        BlockAdapter::new("claude-sonnet-4", "test-key".to_string(), None)
    }

    #[test]
    fn system_message_is_lifted_out_of_the_transcript() {
        let request = AdapterRequest {
            messages: vec![
                TransportMessage {
                    role: Role::System,
                    content: Some(MessageContent::Text("be brief".into())),
                    tool_calls: None,
                    tool_call_id: None,
                },
                TransportMessage {
                    role: Role::User,
                    content: Some(MessageContent::Text("hello".into())),
                    tool_calls: None,
                    tool_call_id: None,
                },
            ],
            tools: Vec::new(),
            parameters: ModelParameters::default(),
        };
        let body = adapter().build_request_body(&request);
        assert_eq!(body["system"], "be brief");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn tool_results_become_user_tool_result_blocks() {
        let request = AdapterRequest {
            messages: vec![TransportMessage {
                role: Role::Tool,
                content: Some(MessageContent::Text("file contents".into())),
                tool_calls: None,
                tool_call_id: Some("toolu_1".into()),
            }],
            tools: Vec::new(),
            parameters: ModelParameters::default(),
        };
        let body = adapter().build_request_body(&request);
        let block = &body["messages"][0]["content"][0];
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(block["type"], "tool_result");
        assert_eq!(block["tool_use_id"], "toolu_1");
        assert_eq!(block["content"], "file contents");
    }

    #[test]
    fn assistant_tool_calls_become_tool_use_blocks() {
        let request = AdapterRequest {
            messages: vec![TransportMessage {
                role: Role::Assistant,
                content: None,
                tool_calls: Some(vec![ToolCall {
                    id: "toolu_1".into(),
                    name: "read_file".into(),
                    arguments: r#"{"path":"a.txt"}"#.into(),
                    index: 0,
                }]),
                tool_call_id: None,
            }],
            tools: Vec::new(),
            parameters: ModelParameters::default(),
        };
        let body = adapter().build_request_body(&request);
        let block = &body["messages"][0]["content"][0];
        assert_eq!(block["type"], "tool_use");
        assert_eq!(block["input"]["path"], "a.txt");
    }

    #[test]
    fn tool_schemas_use_input_schema_key() {
        let request = AdapterRequest {
            messages: Vec::new(),
            tools: vec![ToolSchema {
                name: "query".into(),
                description: "Run a query".into(),
                parameters: serde_json::json!({"type": "object"}),
            }],
            parameters: ModelParameters::default(),
        };
        let body = adapter().build_request_body(&request);
        assert_eq!(body["tools"][0]["name"], "query");
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
        assert_eq!(body["max_tokens"], 4096);
    }
}
