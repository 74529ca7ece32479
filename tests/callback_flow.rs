mod common;

use brainlink_demo::callback::{CallbackHandler, CallbackOutcome, CallbackParams};
use common::FakeConnection;

#[tokio::test]
async fn exchanges_once_with_exact_values() {
    let fake = FakeConnection::disconnected();
    let handler = CallbackHandler::new(fake.clone());

    let params = CallbackParams::from_query(Some("code=abc&state=xyz"));
    let outcome = handler.on_page_load(&params).await;

    assert_eq!(outcome, CallbackOutcome::Exchanged { accepted: true });
    assert_eq!(fake.exchanges(), vec![("abc".to_string(), "xyz".to_string())]);
    assert_eq!(fake.initialize_calls(), 1);
}

#[tokio::test]
async fn missing_state_skips_exchange() {
    let fake = FakeConnection::disconnected();
    let handler = CallbackHandler::new(fake.clone());

    let outcome = handler
        .on_page_load(&CallbackParams::from_query(Some("code=abc")))
        .await;

    assert_eq!(outcome, CallbackOutcome::Skipped);
    assert!(fake.exchanges().is_empty());
}

#[tokio::test]
async fn missing_code_skips_exchange() {
    let fake = FakeConnection::disconnected();
    let handler = CallbackHandler::new(fake.clone());

    let outcome = handler
        .on_page_load(&CallbackParams::new("", "xyz"))
        .await;

    assert_eq!(outcome, CallbackOutcome::Skipped);
    assert!(fake.exchanges().is_empty());
}

#[tokio::test]
async fn plain_page_load_only_initializes() {
    let fake = FakeConnection::disconnected();
    let handler = CallbackHandler::new(fake.clone());

    handler.on_page_load(&CallbackParams::from_query(None)).await;
    handler.on_page_load(&CallbackParams::from_query(Some(""))).await;

    assert!(fake.exchanges().is_empty());
    assert_eq!(fake.initialize_calls(), 2);
}
