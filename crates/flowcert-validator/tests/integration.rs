//! Engine scenarios, including real HTTP hooks against an in-process server.

use std::time::{Duration, Instant};

use serde_json::{json, Map, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use flowcert_types::FlowError;
use flowcert_validator::{Decision, EngineConfig, ReqwestTransport, ValidatorEngine};

fn vars(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap()
}

fn engine(config: Value) -> ValidatorEngine {
    ValidatorEngine::new(EngineConfig::from_value(config).unwrap()).unwrap()
}

/// Serve `responses.len()` connections, one canned HTTP response each, and
/// return the base URL.
async fn serve(responses: Vec<(u16, &'static str)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            // Read headers, then as much body as Content-Length announces.
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            let reply = format!(
                "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn tags_classify_yes_and_default() {
    let e = engine(json!({
        "routes": [{"go": "yes", "modes": {"tags": [
            {"field": "answer", "match": ["sim", "yes"], "strategy": "contains"}
        ]}}],
        "default_output": "no"
    }));
    let yes = e.evaluate(&vars(json!({"answer": "Sim, pode ser"}))).await.unwrap();
    assert_eq!(yes.output(), "yes");
    assert!(yes.is_match());

    let no = e.evaluate(&vars(json!({"answer": "não"}))).await.unwrap();
    assert_eq!(no, Decision::Exhausted { output: "no".into() });
}

#[tokio::test]
async fn pathological_regex_returns_within_bound() {
    let e = engine(json!({
        "routes": [{"go": "matched", "modes": {"regex": [{"pattern": "^(a+)+$"}]}}],
        "default_output": "no"
    }))
    .with_regex_timeout(Duration::from_secs(2));
    let adversarial = format!("{}!", "a".repeat(50_000));

    let started = Instant::now();
    let result = e.evaluate_value(&adversarial).await;
    assert!(started.elapsed() <= Duration::from_millis(2500));
    match result {
        Ok(decision) => assert_eq!(decision.output(), "no"),
        Err(err) => assert!(matches!(err, FlowError::RegexTimeout { .. })),
    }
}

#[tokio::test]
async fn hook_over_http_with_route_override() {
    let base = serve(vec![(200, r#"{"valid": true, "message": "known customer", "route": "vip"}"#)]).await;
    let e = engine(json!({
        "routes": [{"go": "customer", "modes": {"hook": {"url": format!("{base}/check")}}}],
        "default_output": "unknown"
    }))
    .with_transport(ReqwestTransport::new());

    let d = e.evaluate(&vars(json!({"cpf": "12345678900"}))).await.unwrap();
    assert_eq!(
        d,
        Decision::Matched {
            route: 0,
            output: "vip".into(),
            message: Some("known customer".into())
        }
    );
}

#[tokio::test]
async fn invalid_hook_reply_falls_through() {
    let base = serve(vec![(200, r#"{"valid": false}"#)]).await;
    let e = engine(json!({
        "routes": [
            {"go": "customer", "modes": {"hook": {"url": format!("{base}/check")}}},
            {"go": "guest"}
        ]
    }));
    assert_eq!(e.evaluate_value("x").await.unwrap().output(), "guest");
}

#[tokio::test]
async fn hook_http_error_is_not_a_non_match() {
    let base = serve(vec![(500, r#"{"error": "boom"}"#)]).await;
    let e = engine(json!({
        "routes": [
            {"go": "customer", "modes": {"hook": {"url": format!("{base}/check")}}},
            {"go": "guest"}
        ]
    }));
    let err = e.evaluate_value("x").await.unwrap_err();
    assert!(matches!(err, FlowError::Hook { status: 500, .. }));
    assert!(err.is_infrastructure());
}

#[tokio::test]
async fn cached_hook_is_called_once() {
    // The server answers a single connection; a second network call would fail.
    let base = serve(vec![(200, r#"{"valid": true}"#)]).await;
    let e = engine(json!({
        "routes": [{"go": "ok", "modes": {"hook": {"url": format!("{base}/check"), "cache_ttl_seconds": 300}}}]
    }));
    assert_eq!(e.evaluate_value("a").await.unwrap().output(), "ok");
    assert_eq!(e.evaluate_value("b").await.unwrap().output(), "ok");
    assert_eq!(e.hook_client().cached_urls().await, 1);
}

#[tokio::test]
async fn unreachable_hook_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let e = engine(json!({
        "routes": [{"go": "ok", "modes": {"hook": {"url": format!("http://{addr}/check"), "timeout_ms": 1000}}}]
    }));
    let err = e.evaluate_value("a").await.unwrap_err();
    assert!(err.is_infrastructure(), "{err}");
}

#[tokio::test]
async fn mixed_modes_in_order() {
    let e = ValidatorEngine::from_json(
        r#"{
            "normalize": {"trim": true, "collapse_whitespace": true, "lowercase": true, "strip_accents": true},
            "routes": [
                {"go": "cancel", "modes": {"tags": [{"match": ["cancelar"], "strategy": "fuzzy", "threshold": 0.8}]}},
                {"go": "email", "modes": {"regex": [{"pattern": "^[^@\\s]+@[^@\\s]+\\.[a-z]+$"}]}},
                {"go": "vip", "modes": {"rules": {"logic": "or", "conditions": [
                    {"field": "plan", "op": "in", "value": ["gold", "platinum"]},
                    {"field": "spend", "op": ">", "value": 1000}
                ]}}}
            ],
            "default_output": "other"
        }"#,
    )
    .unwrap();

    assert_eq!(e.evaluate_value("  Quero CANCELR  ").await.unwrap().output(), "cancel");
    assert_eq!(e.evaluate_value("Maria@Example.com").await.unwrap().output(), "email");
    let vip = vars(json!({"value": "oi", "plan": "free", "spend": 1500}));
    assert_eq!(e.evaluate(&vip).await.unwrap().output(), "vip");
    let plain = vars(json!({"value": "oi", "plan": "free", "spend": 10}));
    assert_eq!(e.evaluate(&plain).await.unwrap().output(), "other");
}
