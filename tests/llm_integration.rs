//! LLM client integration tests.
//!
//! Tests the `OpenAI` client against a one-shot local HTTP server and the
//! resilience wrapper against scripted providers:
//! - Request shape and bearer authentication
//! - Error categorization (retryable vs. permanent)
//! - Retry and circuit breaker behavior
//!
//! These tests do NOT require actual API keys or network access.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use secrecy::SecretString;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread::{self, JoinHandle};
use znanium::config::LlmConfig;
use znanium::llm::{LlmResilienceConfig, OpenAiClient, ResilientLlmProvider, build_provider};
use znanium::{Error, LlmProvider};

// ============================================================================
// Mock HTTP server
// ============================================================================

/// Accepts one connection, answers with `status` and `body`, and returns the
/// raw request it received.
fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = format!("http://{}/v1", listener.local_addr().unwrap());

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let request = read_request(&mut stream);
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();
        request
    });

    (endpoint, handle)
}

fn read_request(stream: &mut impl Read) -> String {
    let mut data = Vec::new();
    let mut chunk = [0_u8; 4096];
    loop {
        let read = stream.read(&mut chunk).unwrap();
        if read == 0 {
            break;
        }
        data.extend_from_slice(&chunk[..read]);

        let text = String::from_utf8_lossy(&data);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if data.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&data).into_owned()
}

const COMPLETION: &str =
    r#"{"choices":[{"message":{"role":"assistant","content":"Work/Projects"}}]}"#;

// ============================================================================
// OpenAI client
// ============================================================================

#[test]
fn test_openai_sends_bearer_and_messages() {
    let (endpoint, server) = serve_once("200 OK", COMPLETION);
    let client = OpenAiClient::new()
        .with_api_key("sk-test-key")
        .with_endpoint(&endpoint)
        .with_model("gpt-4o-mini");

    let text = client
        .complete_with_system("You are terse.", "Where is the plan?")
        .unwrap();
    assert_eq!(text, "Work/Projects");

    let request = server.join().unwrap();
    assert!(request.starts_with("POST /v1/chat/completions "));
    assert!(request.to_lowercase().contains("authorization: bearer sk-test-key"));
    assert!(request.contains(r#""model":"gpt-4o-mini""#));
    assert!(request.contains(r#""role":"system""#));
    assert!(request.contains(r#""content":"Where is the plan?""#));
    assert!(request.contains(r#""max_tokens":500"#));
}

#[test]
fn test_openai_reasoning_models_use_completion_tokens() {
    let (endpoint, server) = serve_once("200 OK", COMPLETION);
    let client = OpenAiClient::new()
        .with_api_key("sk-test-key")
        .with_endpoint(&endpoint)
        .with_model("o3-mini");

    client.complete("hello").unwrap();

    let request = server.join().unwrap();
    assert!(request.contains(r#""max_completion_tokens":500"#));
    assert!(!request.contains("temperature"));
}

#[test]
fn test_openai_server_error_is_retryable() {
    let (endpoint, server) = serve_once("503 Service Unavailable", r#"{"error":"busy"}"#);
    let client = OpenAiClient::new()
        .with_api_key("sk-test-key")
        .with_endpoint(&endpoint);

    let err = client.complete("hello").unwrap_err();
    server.join().unwrap();

    assert!(err.is_retryable(), "{err}");
    assert!(err.to_string().contains("503"));
}

#[test]
fn test_openai_auth_error_is_permanent() {
    let (endpoint, server) = serve_once("401 Unauthorized", r#"{"error":"bad key"}"#);
    let client = OpenAiClient::new()
        .with_api_key("sk-wrong")
        .with_endpoint(&endpoint);

    let err = client.complete("hello").unwrap_err();
    server.join().unwrap();

    assert!(matches!(err, Error::Upstream { retryable: false, .. }), "{err}");
}

#[test]
fn test_openai_empty_choices_is_an_error() {
    let (endpoint, server) = serve_once("200 OK", r#"{"choices":[]}"#);
    let client = OpenAiClient::new()
        .with_api_key("sk-test-key")
        .with_endpoint(&endpoint);

    let err = client.complete("hello").unwrap_err();
    server.join().unwrap();

    assert!(err.to_string().contains("no choices"));
}

#[test]
fn test_openai_without_key_fails_before_sending() {
    let err = OpenAiClient::new()
        .with_endpoint("http://127.0.0.1:9")
        .complete("hello")
        .unwrap_err();

    assert!(matches!(err, Error::Upstream { retryable: false, .. }));
    assert!(err.to_string().contains("OPENAI_TOKEN"));
}

#[test]
fn test_build_provider_uses_configured_endpoint() {
    let (endpoint, server) = serve_once("200 OK", COMPLETION);
    let config = LlmConfig {
        base_url: Some(format!("{endpoint}/")),
        api_key: Some(SecretString::from("sk-test-key".to_string())),
        ..LlmConfig::default()
    };

    let provider = build_provider(&config);
    assert_eq!(provider.name(), "openai");
    assert_eq!(provider.complete("hello").unwrap(), "Work/Projects");
    server.join().unwrap();
}

// ============================================================================
// Resilience
// ============================================================================

/// Fails the first `failures` calls with the given retryability.
struct Flaky {
    failures: u32,
    retryable: bool,
    calls: AtomicU32,
    prompts: Mutex<Vec<String>>,
}

impl Flaky {
    fn new(failures: u32, retryable: bool) -> Self {
        Self {
            failures,
            retryable,
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmProvider for Flaky {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn complete(&self, prompt: &str) -> znanium::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(Error::Upstream {
                provider: "flaky".to_string(),
                cause: format!("failure {call}"),
                retryable: self.retryable,
            })
        } else {
            Ok("ok".to_string())
        }
    }
}

fn resilience(max_retries: u32, threshold: u32) -> LlmResilienceConfig {
    LlmResilienceConfig {
        max_retries,
        retry_backoff_ms: 0,
        breaker_failure_threshold: threshold,
        breaker_reset_timeout_ms: 60_000,
        breaker_half_open_max_calls: 1,
    }
}

#[test]
fn test_retryable_failure_is_retried() {
    let provider = ResilientLlmProvider::new(Flaky::new(1, true), resilience(1, 5));

    assert_eq!(provider.complete("hi").unwrap(), "ok");
    assert_eq!(provider.inner().calls(), 2);
}

#[test]
fn test_permanent_failure_is_not_retried() {
    let provider = ResilientLlmProvider::new(Flaky::new(1, false), resilience(3, 5));

    assert!(provider.complete("hi").is_err());
    assert_eq!(provider.inner().calls(), 1);
}

#[test]
fn test_retries_are_bounded() {
    let provider = ResilientLlmProvider::new(Flaky::new(10, true), resilience(2, 10));

    assert!(provider.complete("hi").is_err());
    assert_eq!(provider.inner().calls(), 3);
}

#[test]
fn test_open_circuit_short_circuits_calls() {
    let provider = ResilientLlmProvider::new(Flaky::new(10, false), resilience(0, 2));

    assert!(provider.complete("one").is_err());
    assert!(provider.complete("two").is_err());

    let err = provider.complete("three").unwrap_err();
    assert!(err.to_string().contains("circuit breaker open"), "{err}");
    assert_eq!(provider.inner().calls(), 2);
    assert_eq!(provider.inner().prompts.lock().unwrap().len(), 2);
}

#[test]
fn test_success_resets_failure_count() {
    let provider = ResilientLlmProvider::new(Flaky::new(1, false), resilience(0, 2));

    assert!(provider.complete("fail").is_err());
    assert_eq!(provider.complete("pass").unwrap(), "ok");
    assert_eq!(provider.complete("pass again").unwrap(), "ok");
    assert_eq!(provider.inner().calls(), 3);
}
