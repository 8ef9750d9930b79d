use crate::providers::{ScriptedItem, ScriptedProvider};
use crate::{Provider, ProviderRequest, RawEvent};
use flourish_core::ProviderCause;
use futures::StreamExt;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_scripted_rounds_replay_in_order() {
    let provider = ScriptedProvider::new()
        .with_round([RawEvent::text("one"), RawEvent::finish("stop")])
        .with_round([RawEvent::text("two"), RawEvent::finish("stop")]);

    let first: Vec<_> = provider
        .stream(ProviderRequest::new("m"))
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].as_ref().unwrap(), &RawEvent::text("one"));

    let mut second = provider.stream(ProviderRequest::new("m")).await.unwrap();
    assert_eq!(second.next().await.unwrap().unwrap(), RawEvent::text("two"));

    assert_eq!(provider.requests().len(), 2);
    assert_eq!(provider.remaining_rounds(), 0);
}

#[tokio::test]
async fn test_scripted_accepts_raw_json() {
    let provider = ScriptedProvider::new().with_round([json!({"type": "mystery"})]);
    let events: Vec<_> = provider
        .stream(ProviderRequest::new("m"))
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(events[0].as_ref().unwrap().kind(), Some("mystery"));
}

#[tokio::test]
async fn test_scripted_failure_ends_stream() {
    let provider = ScriptedProvider::new().with_round(vec![
        ScriptedItem::Event(RawEvent::text("partial")),
        ScriptedItem::Fail {
            cause: ProviderCause::Network,
            message: "connection reset".to_string(),
        },
        ScriptedItem::Event(RawEvent::text("never")),
    ]);

    let events: Vec<_> = provider
        .stream(ProviderRequest::new("m"))
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].as_ref().unwrap_err().cause(), ProviderCause::Network);
}

#[tokio::test]
async fn test_scripted_hang_never_yields() {
    let provider = ScriptedProvider::new().with_round(vec![ScriptedItem::Hang]);
    let mut stream = provider.stream(ProviderRequest::new("m")).await.unwrap();
    let next = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
    assert!(next.is_err());
}

#[tokio::test]
async fn test_exhausted_script_is_error() {
    let provider = ScriptedProvider::new();
    let result = provider.stream(ProviderRequest::new("m")).await;
    assert!(result.is_err());
}
