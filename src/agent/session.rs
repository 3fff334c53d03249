//! The turn loop: stream, accumulate, execute tools, repeat.

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::accumulator::ToolCallAccumulator;
use crate::adapter::{AdapterRequest, ChatAdapter, ModelParameters};
use crate::conversation::Conversation;
use crate::error::Result;
use crate::persistence::{ConversationSink, NullSink};
use crate::tools::{self, ToolExecutionContext, ToolRegistry};
use crate::types::{ContentPart, FinishReason, StreamEvent, ToolCall};

use super::events::{SessionEventEmitter, SessionEventPayload, SessionEventSink};

/// Where the session currently is in its turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Idle, ready for the next user message.
    AwaitingUser,
    /// A streaming round is in flight.
    Streaming,
    /// Drained tool calls are being executed.
    ExecutingTools,
}

/// What a completed turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Assistant text from the final streaming round.
    pub text: String,
    /// Reasoning from the final streaming round, if any.
    pub reasoning: Option<String>,
    /// Number of streaming rounds the turn took.
    pub rounds: u32,
    /// Finish reason reported by the final round.
    pub finish: Option<FinishReason>,
    /// True when the turn was canceled before completing.
    pub canceled: bool,
}

/// One conversational session: a conversation, an adapter, and a tool set.
///
/// Turns run to completion one at a time; the session owns its conversation
/// and is the only writer to it.
pub struct AgentSession {
    session_id: Uuid,
    adapter: Box<dyn ChatAdapter>,
    conversation: Conversation,
    registry: ToolRegistry,
    parameters: ModelParameters,
    sink: Arc<dyn ConversationSink>,
    event_sink: Option<SessionEventSink>,
    state: TurnState,
    persist_cursor: usize,
}

impl AgentSession {
    pub fn new(adapter: Box<dyn ChatAdapter>, system_prompt: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            adapter,
            conversation: Conversation::new(system_prompt),
            registry: ToolRegistry::new(),
            parameters: ModelParameters::default(),
            sink: Arc::new(NullSink),
            event_sink: None,
            state: TurnState::AwaitingUser,
            persist_cursor: 0,
        }
    }

    pub fn with_tools(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_parameters(mut self, parameters: ModelParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_persistence(mut self, sink: Arc<dyn ConversationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_event_sink(mut self, sink: SessionEventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Run one full turn from a plain-text user message.
    pub async fn run_turn(&mut self, text: impl Into<String>) -> Result<TurnOutcome> {
        self.conversation.append_user(text);
        self.run_committed_turn(CancellationToken::new()).await
    }

    /// Run one full turn from a multimodal user message.
    pub async fn run_turn_parts(&mut self, parts: Vec<ContentPart>) -> Result<TurnOutcome> {
        self.conversation.append_user_parts(parts);
        self.run_committed_turn(CancellationToken::new()).await
    }

    /// Run one full turn with external cancellation.
    ///
    /// Cancellation mid-stream discards the partial assistant output
    /// wholesale; messages already committed (the user message, completed
    /// rounds) remain.
    pub async fn run_turn_with_cancel(
        &mut self,
        text: impl Into<String>,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome> {
        self.conversation.append_user(text);
        self.run_committed_turn(cancel).await
    }

    async fn run_committed_turn(&mut self, cancel: CancellationToken) -> Result<TurnOutcome> {
        let emitter = SessionEventEmitter::new(self.session_id, self.event_sink.clone());
        emitter.emit(SessionEventPayload::TurnStarted);
        self.flush_persistence(&emitter).await;

        let mut rounds: u32 = 0;

        loop {
            self.state = TurnState::Streaming;
            rounds += 1;

            let request = AdapterRequest {
                messages: self.conversation.to_transport(),
                tools: self.registry.schemas(),
                parameters: self.parameters.clone(),
            };

            debug!(
                session_id = %self.session_id,
                round = rounds,
                backend = self.adapter.backend_name(),
                model = self.adapter.model_id(),
                "streaming round start"
            );

            let stream = match self.adapter.stream(&request).await {
                Ok(stream) => stream,
                Err(err) => {
                    emitter.emit(SessionEventPayload::TurnFailed {
                        error: err.to_string(),
                    });
                    self.state = TurnState::AwaitingUser;
                    return Err(err);
                }
            };

            let round = match self.consume_round(stream, &cancel, &emitter).await {
                RoundEnd::Canceled => {
                    emitter.emit(SessionEventPayload::TurnCanceled);
                    self.state = TurnState::AwaitingUser;
                    return Ok(TurnOutcome {
                        text: String::new(),
                        reasoning: None,
                        rounds,
                        finish: None,
                        canceled: true,
                    });
                }
                RoundEnd::Failed(err) => {
                    emitter.emit(SessionEventPayload::TurnFailed {
                        error: err.to_string(),
                    });
                    self.state = TurnState::AwaitingUser;
                    return Err(err);
                }
                RoundEnd::Done(round) => round,
            };

            for malformed in &round.malformed {
                warn!(
                    session_id = %self.session_id,
                    index = malformed.index,
                    "tool call never received a name, skipping"
                );
                emitter.emit(SessionEventPayload::Error {
                    kind: "malformed_tool_call".to_string(),
                    message: format!("tool call at index {} has no name", malformed.index),
                });
            }

            self.conversation.append_assistant(
                Some(round.text.clone()),
                round.reasoning.clone(),
                Some(round.calls.clone()),
            );
            self.flush_persistence(&emitter).await;

            if round.calls.is_empty() {
                emitter.emit(SessionEventPayload::TurnCompleted);
                self.state = TurnState::AwaitingUser;
                return Ok(TurnOutcome {
                    text: round.text,
                    reasoning: round.reasoning,
                    rounds,
                    finish: round.finish,
                    canceled: false,
                });
            }

            self.state = TurnState::ExecutingTools;
            for call in &round.calls {
                if cancel.is_cancelled() {
                    emitter.emit(SessionEventPayload::TurnCanceled);
                    self.state = TurnState::AwaitingUser;
                    return Ok(TurnOutcome {
                        text: round.text,
                        reasoning: round.reasoning,
                        rounds,
                        finish: round.finish,
                        canceled: true,
                    });
                }
                self.execute_call(call, &emitter).await;
                self.flush_persistence(&emitter).await;
            }
        }
    }

    async fn consume_round(
        &mut self,
        mut stream: crate::adapter::EventStream,
        cancel: &CancellationToken,
        emitter: &SessionEventEmitter,
    ) -> RoundEnd {
        let mut accumulator = ToolCallAccumulator::new();
        let mut text = String::new();
        let mut reasoning = String::new();
        let mut finish = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return RoundEnd::Canceled;
                }
                event = stream.next() => {
                    let Some(event) = event else { break; };
                    match event {
                        Ok(StreamEvent::Content { text: delta }) => {
                            text.push_str(&delta);
                            emitter.emit(SessionEventPayload::AssistantDelta { text: delta });
                        }
                        Ok(StreamEvent::Reasoning { text: delta }) => {
                            reasoning.push_str(&delta);
                            emitter.emit(SessionEventPayload::ReasoningDelta { text: delta });
                        }
                        Ok(StreamEvent::ToolCallFragment(fragment)) => {
                            let index = fragment.index;
                            if let Some(name) = accumulator.push(&fragment) {
                                emitter.emit(SessionEventPayload::ToolCallDetected { index, name });
                            }
                        }
                        Ok(StreamEvent::Finish { reason }) => {
                            // Adapters de-duplicate, but a repeat is harmless.
                            finish.get_or_insert(reason);
                        }
                        Err(err) => {
                            return RoundEnd::Failed(err);
                        }
                    }
                }
            }
        }

        let drained = accumulator.drain();
        RoundEnd::Done(RoundResult {
            text,
            reasoning: (!reasoning.is_empty()).then_some(reasoning),
            finish,
            calls: drained.calls,
            malformed: drained
                .malformed
                .into_iter()
                .map(|m| MalformedCall { index: m.index })
                .collect(),
        })
    }

    /// Execute one well-formed tool call and commit its result message.
    ///
    /// Argument parse failures and unknown tool names are reported and
    /// skipped without a result message; errors from the tool body become
    /// the result message's content.
    async fn execute_call(&mut self, call: &ToolCall, emitter: &SessionEventEmitter) {
        let args = match tools::parse_arguments(&call.name, &call.arguments) {
            Ok(args) => args,
            Err(err) => {
                warn!(
                    session_id = %self.session_id,
                    tool = %call.name,
                    %err,
                    "tool arguments rejected, skipping call"
                );
                emitter.emit(SessionEventPayload::Error {
                    kind: err.kind().to_string(),
                    message: err.to_string(),
                });
                return;
            }
        };

        let Some(tool) = self.registry.get(&call.name).cloned() else {
            let err = crate::error::ParleyError::UnknownTool(call.name.clone());
            warn!(
                session_id = %self.session_id,
                tool = %call.name,
                "model called an unregistered tool, skipping call"
            );
            emitter.emit(SessionEventPayload::Error {
                kind: err.kind().to_string(),
                message: err.to_string(),
            });
            return;
        };

        emitter.emit(SessionEventPayload::ToolCallStarted {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: args.clone(),
        });

        let ctx = ToolExecutionContext::default();
        let (content, is_error) = match tool.execute(&args, &ctx).await {
            Ok(output) => (output, false),
            Err(err) => (format!("Error: {err}"), true),
        };

        emitter.emit(SessionEventPayload::ToolResult {
            id: call.id.clone(),
            name: call.name.clone(),
            content: content.clone(),
            is_error,
        });

        self.conversation.append_tool(call.id.clone(), content);
    }

    /// Push every not-yet-persisted message to the sink.
    ///
    /// Sink failures are reported as events and logged; they never fail
    /// the turn, and the cursor advances regardless.
    async fn flush_persistence(&mut self, emitter: &SessionEventEmitter) {
        while self.persist_cursor < self.conversation.len() {
            let message = &self.conversation.messages()[self.persist_cursor];
            if let Err(err) = self.sink.persist(message).await {
                warn!(session_id = %self.session_id, %err, "persistence sink failed");
                emitter.emit(SessionEventPayload::Error {
                    kind: "persistence".to_string(),
                    message: err.to_string(),
                });
            }
            self.persist_cursor += 1;
        }
    }
}

enum RoundEnd {
    Done(RoundResult),
    Canceled,
    Failed(crate::error::ParleyError),
}

struct RoundResult {
    text: String,
    reasoning: Option<String>,
    finish: Option<FinishReason>,
    calls: Vec<ToolCall>,
    malformed: Vec<MalformedCall>,
}

struct MalformedCall {
    index: u32,
}
