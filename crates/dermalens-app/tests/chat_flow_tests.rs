//! Integration tests for the follow-up chat flow.

mod common;

use common::Reply;
use dermalens_app::AppError;
use dermalens_diagnosis_contract::{CHAT_FALLBACK_REPLY, ChatRole};
use dermalens_service::ServiceError;
use dermalens_ui::{CHAT_GREETING, UiError};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn chat_flow_tests_sends_prior_turns_in_order() {
    let (mut flow, transport) = common::chat_flow([Reply::Text("Yes, SPF 30 daily.".into())]);

    let reply = flow
        .send("Do I need sunscreen indoors?", &CancellationToken::new())
        .await
        .expect("chat should succeed");

    assert_eq!(reply.text, "Yes, SPF 30 daily.");
    let roles: Vec<ChatRole> = flow
        .transcript()
        .messages()
        .iter()
        .map(|message| message.role)
        .collect();
    assert_eq!(roles, vec![ChatRole::Model, ChatRole::User, ChatRole::Model]);
    assert!(!flow.transcript().awaiting_reply());

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    let contents = &requests[0].contents;
    assert_eq!(contents.len(), 2);
    assert_eq!(contents[0].role.as_deref(), Some("model"));
    assert_eq!(contents[0].parts[0].text.as_deref(), Some(CHAT_GREETING));
    assert_eq!(contents[1].role.as_deref(), Some("user"));
}

#[tokio::test]
async fn chat_flow_tests_failure_keeps_message_and_accepts_next() {
    let (mut flow, transport) = common::chat_flow([
        Reply::Fail("connection reset".into()),
        Reply::Empty,
    ]);

    let error = flow
        .send("Is retinol safe?", &CancellationToken::new())
        .await
        .expect_err("first call fails");
    assert!(matches!(error, AppError::Service(ServiceError::Transport(_))));
    assert_eq!(flow.transcript().messages().len(), 2);
    assert!(!flow.transcript().awaiting_reply());

    let reply = flow
        .send("Is retinol safe?", &CancellationToken::new())
        .await
        .expect("second call succeeds");
    assert_eq!(reply.text, CHAT_FALLBACK_REPLY);
    assert_eq!(flow.transcript().messages().len(), 4);
    assert_eq!(transport.requests()[1].contents.len(), 3);
}

#[tokio::test]
async fn chat_flow_tests_blank_message_never_reaches_service() {
    let (mut flow, transport) = common::chat_flow(Vec::<Reply>::new());

    let error = flow
        .send("   ", &CancellationToken::new())
        .await
        .expect_err("blank message rejected");

    assert!(matches!(error, AppError::Ui(UiError::EmptyMessage)));
    assert!(transport.requests().is_empty());
    assert_eq!(flow.transcript().messages().len(), 1);
}
