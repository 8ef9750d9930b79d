use crate::providers::openai::OpenAIConfig;
use crate::{Message, OpenAIProvider, Provider, ProviderRequest, RawEvent};
use flourish_core::ProviderCause;
use futures::StreamExt;
use serde_json::json;

fn sse(chunks: &[serde_json::Value]) -> String {
    let mut body = String::new();
    for chunk in chunks {
        body.push_str(&format!("data: {}\n\n", chunk));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn provider(server: &mockito::Server) -> OpenAIProvider {
    OpenAIProvider::new(OpenAIConfig::new("test-key").with_base_url(server.url())).unwrap()
}

#[tokio::test]
async fn test_openai_stream_end_to_end() -> anyhow::Result<()> {
    let mut server = mockito::Server::new_async().await;
    let body = sse(&[
        json!({"choices": [{"index": 0, "delta": {"content": "Hi "}}]}),
        json!({"choices": [{"index": 0, "delta": {"content": "there"}}]}),
        json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]}),
    ]);
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let request = ProviderRequest::new("gpt-4o-mini").with_message(Message::user("hello"));
    let events: Vec<RawEvent> = provider(&server)
        .stream(request)
        .await?
        .map(|e| e.unwrap())
        .collect()
        .await;

    assert_eq!(events, vec![RawEvent::text("Hi there"), RawEvent::finish("stop")]);
    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_openai_auth_failure_maps_cause() -> anyhow::Result<()> {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_body(r#"{"error":{"message":"Incorrect API key"}}"#)
        .create_async()
        .await;

    let mut stream = provider(&server).stream(ProviderRequest::new("m")).await?;
    let err = stream.next().await.unwrap().unwrap_err();
    assert_eq!(err.cause(), ProviderCause::Auth);
    assert!(err.to_string().contains("Incorrect API key"));
    assert!(stream.next().await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_openai_rate_limit_maps_cause() -> anyhow::Result<()> {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_body("slow down")
        .create_async()
        .await;

    let mut stream = provider(&server).stream(ProviderRequest::new("m")).await?;
    let err = stream.next().await.unwrap().unwrap_err();
    assert_eq!(err.cause(), ProviderCause::RateLimit);
    Ok(())
}

#[tokio::test]
async fn test_openai_stream_cut_off_before_finish_is_error() -> anyhow::Result<()> {
    let mut server = mockito::Server::new_async().await;
    let body = format!(
        "data: {}\n\n",
        json!({"choices": [{"index": 0, "delta": {"content": "partial"}}]})
    );
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let events: Vec<_> = provider(&server)
        .stream(ProviderRequest::new("m"))
        .await?
        .collect()
        .await;

    let err = events.last().unwrap().as_ref().unwrap_err();
    assert_eq!(err.cause(), ProviderCause::Network);
    assert!(events.iter().all(|e| !matches!(e, Ok(raw) if *raw == RawEvent::finish("stop"))));
    Ok(())
}

#[tokio::test]
async fn test_openai_done_without_finish_reason_completes() -> anyhow::Result<()> {
    let mut server = mockito::Server::new_async().await;
    let body = sse(&[json!({"choices": [{"index": 0, "delta": {"content": "ok"}}]})]);
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let events: Vec<RawEvent> = provider(&server)
        .stream(ProviderRequest::new("m"))
        .await?
        .map(|e| e.unwrap())
        .collect()
        .await;

    assert_eq!(events, vec![RawEvent::text("ok"), RawEvent::finish("stop")]);
    Ok(())
}
