//! Tests for conversation state and its transport projection.

use parley::conversation::Conversation;
use parley::types::{MessageContent, Role, ToolCall};
use pretty_assertions::assert_eq;

#[test]
fn starts_with_only_the_system_message() {
    let convo = Conversation::new("be helpful");
    assert_eq!(convo.len(), 1);
    assert_eq!(convo.messages()[0].role, Role::System);
    assert_eq!(convo.system_prompt(), "be helpful");
}

#[test]
fn assistant_normalization_keeps_the_content_invariant() {
    let mut convo = Conversation::new("s");

    // no text and no calls: content stays present as empty text, so replay
    // never sends a null-content assistant message
    convo.append_assistant(Some(String::new()), Some(String::new()), Some(Vec::new()));
    let msg = convo.last_message().unwrap();
    assert_eq!(msg.content, Some(MessageContent::Text(String::new())));
    assert!(msg.reasoning.is_none());
    assert!(msg.tool_calls.is_none());

    // calls and no text: content is None
    convo.append_assistant(
        Some(String::new()),
        None,
        Some(vec![ToolCall {
            id: "c1".into(),
            name: "t".into(),
            arguments: "{}".into(),
            index: 0,
        }]),
    );
    let msg = convo.last_message().unwrap();
    assert!(msg.content.is_none());
    assert!(msg.tool_calls.is_some());
}

#[test]
fn timestamps_never_decrease() {
    let mut convo = Conversation::new("s");
    convo.append_user("a");
    convo.append_assistant(Some("b".into()), None, None);
    convo.append_user("c");
    let stamps: Vec<_> = convo.messages().iter().map(|m| m.timestamp).collect();
    for pair in stamps.windows(2) {
        assert!(pair[0] <= pair[1]);
    }
}

#[test]
fn transport_projection_is_pure_and_strips_reasoning() {
    let mut convo = Conversation::new("s");
    convo.append_user("question");
    convo.append_assistant(
        Some("answer".into()),
        Some("hidden chain of thought".into()),
        Some(vec![ToolCall {
            id: "c1".into(),
            name: "t".into(),
            arguments: "{}".into(),
            index: 0,
        }]),
    );
    convo.append_tool("c1", "result");

    let before: Vec<_> = convo.messages().to_vec();
    let first = convo.to_transport();
    let second = convo.to_transport();

    // repeated projections are identical and never mutate the log
    assert_eq!(first, second);
    assert_eq!(convo.messages(), before.as_slice());

    assert_eq!(first.len(), 4);
    assert_eq!(first[1].role, Role::User);
    assert_eq!(first[2].role, Role::Assistant);
    assert_eq!(
        first[2].content,
        Some(MessageContent::Text("answer".into()))
    );
    assert_eq!(first[3].tool_call_id.as_deref(), Some("c1"));

    // reasoning exists in the log but nowhere in the projection
    assert!(convo.messages()[2].reasoning.is_some());
    let serialized = serde_json::to_string(&first).unwrap();
    assert!(!serialized.contains("hidden chain of thought"));
}

#[test]
fn projection_preserves_order() {
    let mut convo = Conversation::new("s");
    convo.append_user("one");
    convo.append_assistant(Some("two".into()), None, None);
    convo.append_user("three");
    let roles: Vec<_> = convo.to_transport().into_iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::System, Role::User, Role::Assistant, Role::User],
    );
}
