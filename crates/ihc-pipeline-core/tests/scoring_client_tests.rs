use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use ihc_pipeline_core::scoring::wire::{FlattenedJourneyRecord, RedistributionParameter};
use ihc_pipeline_core::scoring::{HttpScoringClient, ScoringClient, ScoringRequest};
use ihc_pipeline_core::{Error, ScoringConfig};

struct CapturedRequest {
    request_line: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl CapturedRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Serve exactly one HTTP request with the given status and body.
fn serve_once(status: u16, body: impl Into<String>) -> (String, JoinHandle<CapturedRequest>) {
    let body: String = body.into();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();

        let mut headers = Vec::new();
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((k, v)) = line.split_once(':') {
                headers.push((k.trim().to_string(), v.trim().to_string()));
            }
        }

        let length: usize = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(0);
        let mut buf = vec![0u8; length];
        reader.read_exact(&mut buf).unwrap();

        let mut stream = stream;
        write!(
            stream,
            "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
        .unwrap();
        stream.flush().unwrap();

        CapturedRequest {
            request_line: request_line.trim_end().to_string(),
            headers,
            body: String::from_utf8(buf).unwrap(),
        }
    });

    (format!("http://{}/v1/compute_ihc", addr), handle)
}

fn client_for(url: &str) -> HttpScoringClient {
    HttpScoringClient::new(ScoringConfig {
        api_url: url.to_string(),
        api_token: "secret-token".to_string(),
        conv_type_id: "purchase".to_string(),
        batch_size: 100,
    })
    .unwrap()
}

fn sample_request() -> ScoringRequest {
    ScoringRequest {
        customer_journeys: vec![FlattenedJourneyRecord {
            conversion_id: "c1".to_string(),
            session_id: "s1".to_string(),
            timestamp: "2023-09-01 09:00:00".to_string(),
            channel_label: "Search".to_string(),
            holder_engagement: 0,
            closer_engagement: 1,
            conversion: 0,
            impression_interaction: 0,
        }],
        redistribution_parameter: RedistributionParameter::default(),
    }
}

#[test]
fn test_posts_batch_with_api_key_and_conversion_type() {
    let (url, server) = serve_once(
        200,
        r#"{"value":[{"conversion_id":"c1","sessions":[{"session_id":"s1","ihc":1.0}]}]}"#,
    );

    let response = client_for(&url).score_batch(&sample_request()).unwrap();
    let captured = server.join().unwrap();

    assert_eq!(
        captured.request_line,
        "POST /v1/compute_ihc?conv_type_id=purchase HTTP/1.1"
    );
    assert_eq!(captured.header("x-api-key"), Some("secret-token"));
    assert!(captured
        .header("content-type")
        .unwrap()
        .starts_with("application/json"));

    let sent: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
    assert_eq!(sent["customer_journeys"][0]["session_id"], "s1");
    assert_eq!(sent["customer_journeys"][0]["closer_engagement"], 1);
    assert_eq!(
        sent["redistribution_parameter"]["closer"]["direction"],
        "later_sessions_only"
    );

    let value = response.value.unwrap();
    assert_eq!(value[0].sessions[0].ihc, 1.0);
}

#[test]
fn test_application_error_in_success_body_is_returned() {
    let (url, server) = serve_once(
        200,
        r#"{"statusCode":400,"partialFailureErrors":[{"conversion_id":"c1"}]}"#,
    );

    let response = client_for(&url).score_batch(&sample_request()).unwrap();
    server.join().unwrap();

    assert_eq!(response.status_code, Some(serde_json::json!(400)));
    assert!(response.application_error().is_some());
}

#[test]
fn test_string_status_code_is_an_application_error() {
    let (url, server) = serve_once(200, r#"{"statusCode":"400","message":"bad"}"#);

    let response = client_for(&url).score_batch(&sample_request()).unwrap();
    server.join().unwrap();

    assert!(response.value.is_none());
    assert!(response.application_error().is_some());
}

#[test]
fn test_large_response_body_is_decoded() {
    // Well past ureq's 10 MB `into_string` ceiling.
    let sessions: Vec<String> = (0..320_000)
        .map(|i| format!(r#"{{"session_id":"s{:07}","ihc":0.0}}"#, i))
        .collect();
    let body = format!(
        r#"{{"value":[{{"conversion_id":"c1","sessions":[{}]}}]}}"#,
        sessions.join(",")
    );
    assert!(body.len() > 10 * 1024 * 1024);

    let (url, server) = serve_once(200, body);
    let response = client_for(&url).score_batch(&sample_request()).unwrap();
    server.join().unwrap();

    let value = response.value.unwrap();
    assert_eq!(value[0].sessions.len(), 320_000);
    assert_eq!(value[0].sessions[319_999].session_id.as_deref(), Some("s0319999"));
}

#[test]
fn test_non_success_status_is_an_error() {
    let (url, server) = serve_once(503, r#"{"message":"unavailable"}"#);

    let err = client_for(&url).score_batch(&sample_request()).unwrap_err();
    server.join().unwrap();

    match err {
        Error::HttpStatus { status, body } => {
            assert_eq!(status, 503);
            assert!(body.contains("unavailable"));
        }
        other => panic!("expected HttpStatus, got {:?}", other),
    }
}

#[test]
fn test_connection_failure_is_a_transport_error() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let url = format!("http://{}/v1/compute_ihc", addr);

    let err = client_for(&url).score_batch(&sample_request()).unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}

#[test]
fn test_zero_batch_size_is_rejected() {
    let result = HttpScoringClient::new(ScoringConfig {
        api_url: "http://127.0.0.1:1/".to_string(),
        api_token: "t".to_string(),
        conv_type_id: "default".to_string(),
        batch_size: 0,
    });
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}
