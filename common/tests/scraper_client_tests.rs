// Integration tests for the discovery engine HTTP client

use std::time::Duration;

use common::config::ScraperConfig;
use common::errors::ScraperError;
use common::models::FilterParams;
use common::poll::PollConfig;
use common::scraper::{wait_for_terminal, HttpScraperClient, JobRequest, RemoteState, ScraperClient};
use wiremock::matchers::{body_json_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(base_url: &str) -> ScraperConfig {
    ScraperConfig {
        base_url: base_url.to_string(),
        connect_timeout_seconds: 2,
        job_timeout_seconds: 10,
        poll_interval_seconds: 1,
        max_concurrent_jobs: 5,
        max_results: 50,
    }
}

fn test_request() -> JobRequest {
    JobRequest {
        source: "vestnik".to_string(),
        keywords: vec!["software".to_string(), "vyvoj".to_string()],
        max_results: 50,
        filters: FilterParams::default(),
    }
}

#[tokio::test]
async fn test_health_check_ok() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpScraperClient::new(&test_config(&server.uri())).unwrap();
    assert!(client.health_check().await.is_ok());
}

#[tokio::test]
async fn test_health_check_failure_maps_to_connectivity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = HttpScraperClient::new(&test_config(&server.uri())).unwrap();
    let err = client.health_check().await.unwrap_err();
    assert!(matches!(err, ScraperError::Connectivity(_)));
}

#[tokio::test]
async fn test_submit_job_returns_remote_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/jobs"))
        .and(body_json_string(
            r#"{"source":"vestnik","keywords":["software","vyvoj"],"maxResults":50}"#,
        ))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(serde_json::json!({"jobId": "rj-42"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpScraperClient::new(&test_config(&server.uri())).unwrap();
    let job_id = client.submit_job(&test_request()).await.unwrap();
    assert_eq!(job_id, "rj-42");
}

#[tokio::test]
async fn test_submit_job_includes_filters_when_present() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/jobs"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(serde_json::json!({"jobId": "rj-43"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpScraperClient::new(&test_config(&server.uri())).unwrap();
    let mut request = test_request();
    request.filters.location = Some("Praha".to_string());
    request.filters.min_estimated_value = Some(100_000.0);
    client.submit_job(&request).await.unwrap();

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["filters"]["location"], "Praha");
    assert_eq!(body["filters"]["min_estimated_value"], 100_000.0);
}

#[tokio::test]
async fn test_submit_rejection_carries_reason() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/jobs"))
        .respond_with(ResponseTemplate::new(422).set_body_string("unknown source"))
        .mount(&server)
        .await;

    let client = HttpScraperClient::new(&test_config(&server.uri())).unwrap();
    let err = client.submit_job(&test_request()).await.unwrap_err();
    match err {
        ScraperError::SubmissionRejected { source_name, reason } => {
            assert_eq!(source_name, "vestnik");
            assert_eq!(reason, "unknown source");
        }
        other => panic!("Unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_job_status_deserializes_camel_case() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/rj-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "succeeded",
            "resultsCount": 7
        })))
        .mount(&server)
        .await;

    let client = HttpScraperClient::new(&test_config(&server.uri())).unwrap();
    let status = client.job_status("rj-42").await.unwrap();
    assert_eq!(status.status, RemoteState::Succeeded);
    assert_eq!(status.results_count, Some(7));
    assert!(status.error.is_none());
}

#[tokio::test]
async fn test_fetch_results_parses_candidates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/rj-42/results"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "tender_id": "T-1",
                "title": "IT system maintenance",
                "source": "vestnik",
                "relevance_score": 0.9
            },
            {
                "title": "Office supplies",
                "source": "vestnik"
            }
        ])))
        .mount(&server)
        .await;

    let client = HttpScraperClient::new(&test_config(&server.uri())).unwrap();
    let candidates = client.fetch_results("rj-42").await.unwrap();
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].tender_id.as_deref(), Some("T-1"));
    assert_eq!(candidates[1].tender_id, None);
    assert_eq!(candidates[1].relevance_score, 0.0);
}

#[tokio::test]
async fn test_malformed_results_map_to_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/rj-42/results"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = HttpScraperClient::new(&test_config(&server.uri())).unwrap();
    let err = client.fetch_results("rj-42").await.unwrap_err();
    assert!(matches!(err, ScraperError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_wait_for_terminal_polls_until_succeeded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/rj-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "running"
        })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobs/rj-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "succeeded",
            "resultsCount": 3
        })))
        .mount(&server)
        .await;

    let client = HttpScraperClient::new(&test_config(&server.uri())).unwrap();
    let poll = PollConfig {
        interval: Duration::from_millis(20),
        max_wait: Duration::from_secs(5),
    };
    let status = wait_for_terminal(&client, "rj-42", &poll).await.unwrap();
    assert_eq!(status.status, RemoteState::Succeeded);
}

#[tokio::test]
async fn test_wait_for_terminal_times_out_on_stuck_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/rj-stuck"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "running"
        })))
        .mount(&server)
        .await;

    let client = HttpScraperClient::new(&test_config(&server.uri())).unwrap();
    let poll = PollConfig {
        interval: Duration::from_millis(20),
        max_wait: Duration::from_millis(100),
    };
    let err = wait_for_terminal(&client, "rj-stuck", &poll)
        .await
        .unwrap_err();
    match err {
        ScraperError::Timeout { job_id, .. } => assert_eq!(job_id, "rj-stuck"),
        other => panic!("Unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_job_reports_error_detail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/rj-bad"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "failed",
            "error": "source blocked the crawler"
        })))
        .mount(&server)
        .await;

    let client = HttpScraperClient::new(&test_config(&server.uri())).unwrap();
    let poll = PollConfig {
        interval: Duration::from_millis(20),
        max_wait: Duration::from_secs(5),
    };
    let status = wait_for_terminal(&client, "rj-bad", &poll).await.unwrap();
    assert_eq!(status.status, RemoteState::Failed);
    assert_eq!(status.error.as_deref(), Some("source blocked the crawler"));
}
