//! Integration tests using wiremock to simulate the Apify API.

use apify_client::{
    ApifyClient, DatasetFormat, DatasetItemsOptions, Error, ErrorKind, ListOptions,
    OptionOverrides, ResponseBody,
};
use http::Method;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn client_for(server: &MockServer) -> ApifyClient {
    ApifyClient::builder()
        .base_url(server.uri())
        .unwrap()
        .token("test-token")
        .max_retries(3)
        .min_delay_between_retries(Duration::from_millis(10))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_get_actor_not_found_resolves_to_none() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/acts/x"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"error": {"type": "not-found", "message": "x"}})),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let actor = client.requester().unwrap().get_actor("x").await.unwrap();

    assert!(actor.is_none());
    let stats = client.stats();
    assert_eq!(stats.calls, 1);
    assert_eq!(stats.requests, 1);
    assert!(stats.rate_limit_errors.is_empty());
}

#[tokio::test]
async fn test_rate_limited_create_recovers() {
    init_tracing();
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    // First two requests are rate limited, third succeeds
    Mock::given(method("POST"))
        .and(path("/v2/acts"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                ResponseTemplate::new(429).set_body_json(
                    json!({"error": {"type": "rate-limit-exceeded", "message": "Slow down"}}),
                )
            } else {
                ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "abc"}}))
            }
        })
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let actor = client
        .requester()
        .unwrap()
        .create_actor(&json!({"name": "my-actor"}))
        .await
        .unwrap();

    assert_eq!(actor, json!({"id": "abc"}));
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);

    let stats = client.stats();
    assert_eq!(stats.calls, 1);
    assert_eq!(stats.requests, 3);
    assert_eq!(stats.rate_limit_errors, vec![1, 1]);
}

#[tokio::test]
async fn test_list_query_parameters_in_order() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/acts"))
        .and(query_param("limit", "5"))
        .and(query_param("offset", "3"))
        .and(query_param("desc", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"total": 7, "offset": 3, "count": 1, "limit": 5, "items": [{"id": "a"}]}
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let actors = client
        .requester()
        .unwrap()
        .list_actors(&ListOptions {
            limit: Some(5),
            offset: Some(3),
            desc: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(actors.total, 7);
    assert_eq!(actors.limit, Some(5));
    assert_eq!(actors.items, vec![json!({"id": "a"})]);

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].url.query(),
        Some("limit=5&offset=3&desc=1&token=test-token")
    );
}

#[tokio::test]
async fn test_list_items_reads_pagination_headers() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/datasets/ds1/items"))
        .and(query_param("format", "json"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-apify-pagination-total", "10")
                .insert_header("x-apify-pagination-offset", "2")
                .insert_header("x-apify-pagination-count", "3")
                .set_body_json(json!([{"n": 1}, {"n": 2}, {"n": 3}])),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let items = client
        .requester()
        .unwrap()
        .list_items(
            "ds1",
            &DatasetItemsOptions {
                offset: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(items.total, 10);
    assert_eq!(items.offset, 2);
    assert_eq!(items.count, 3);
    assert_eq!(items.limit, None);
    assert_eq!(items.items.len(), 3);
}

#[tokio::test]
async fn test_http_error_4xx_is_terminal() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/acts"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"type": "invalid-input", "message": "Name is required"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client
        .requester()
        .unwrap()
        .create_actor(&json!({}))
        .await;

    match result {
        Err(Error::Api {
            error_type,
            message,
            details,
            ..
        }) => {
            assert_eq!(error_type, "invalid-input");
            assert_eq!(message, "Name is required");
            assert_eq!(details.status_code, Some(400));
            assert_eq!(details.attempt, Some(1));
            assert_eq!(details.method, Some(Method::POST));
            assert!(details.has_body);
            // the token never ends up in error context
            assert!(!details.url.unwrap_or_default().contains("test-token"));
        }
        other => panic!("Expected Api error, got {:?}", other),
    }
    assert_eq!(client.stats().requests, 1);
}

#[tokio::test]
async fn test_retry_on_5xx() {
    init_tracing();
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    Mock::given(method("GET"))
        .and(path("/v2/acts/abc"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                ResponseTemplate::new(503).set_body_string("Service unavailable")
            } else {
                ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "abc"}}))
            }
        })
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let actor = client
        .requester()
        .unwrap()
        .get_actor("abc")
        .await
        .unwrap();

    assert_eq!(actor, Some(json!({"id": "abc"})));
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    assert_eq!(client.stats().requests, 3);
    // 5xx responses are not rate limits
    assert!(client.stats().rate_limit_errors.is_empty());
}

#[tokio::test]
async fn test_max_retries_exceeded() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/acts/abc"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"type": "internal-error", "message": "Oops"}
        })))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client
        .requester_with(&OptionOverrides::new().max_retries(2))
        .unwrap()
        .get_actor("abc")
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, Error::MaxRetriesExceeded { attempts: 3, .. }));
    assert_eq!(err.kind(), ErrorKind::RequestFailed);
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.error_type(), Some("internal-error"));
    assert_eq!(err.details().and_then(|d| d.attempt), Some(3));
}

#[tokio::test]
async fn test_malformed_json_is_retried() {
    init_tracing();
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    Mock::given(method("GET"))
        .and(path("/v2/users/me"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count == 0 {
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/json")
                    .set_body_string("{\"data\": ")
            } else {
                ResponseTemplate::new(200).set_body_json(json!({"data": {"username": "me"}}))
            }
        })
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let user = client.requester().unwrap().get_user(None).await.unwrap();

    assert_eq!(user, Some(json!({"username": "me"})));
    assert_eq!(attempt_count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_token_user_agent_and_gzip_are_sent() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/users/me"))
        .and(query_param("token", "test-token"))
        .and(header_exists("user-agent"))
        .and(header("accept-encoding", "gzip"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "u1"}})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client.requester().unwrap().get_user(None).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    let user_agent = requests[0]
        .headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(user_agent.starts_with("ApifyClient/"));
}

#[tokio::test]
async fn test_date_fields_are_normalized() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/acts/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": "abc",
                "createdAt": "2024-01-02T03:04:05Z",
                "stats": {"lastRunStartedAt": "2024-01-02"},
                "description": "2024-01-02T03:04:05Z"
            }
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let actor = client
        .requester()
        .unwrap()
        .get_actor("abc")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(actor["createdAt"], "2024-01-02T03:04:05.000Z");
    assert_eq!(actor["stats"]["lastRunStartedAt"], "2024-01-02T00:00:00.000Z");
    assert_eq!(actor["description"], "2024-01-02T03:04:05Z");
}

#[tokio::test]
async fn test_get_record_decodes_by_content_type() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/key-value-stores/store1/records/OUTPUT"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("hello world".as_bytes().to_vec(), "text/plain; charset=utf-8"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/key-value-stores/store1/records/MISSING"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"type": "record-not-found", "message": "Record was not found"}
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let api = client.requester().unwrap();

    let record = api.get_record("store1", "OUTPUT").await.unwrap().unwrap();
    assert_eq!(record.key, "OUTPUT");
    assert_eq!(record.value, ResponseBody::Text("hello world".to_string()));
    assert_eq!(
        record.content_type.as_deref(),
        Some("text/plain; charset=utf-8")
    );

    assert!(api.get_record("store1", "MISSING").await.unwrap().is_none());
}

#[tokio::test]
async fn test_set_record_sends_raw_body() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v2/key-value-stores/store1/records/INPUT"))
        .and(header("content-type", "text/csv"))
        .and(body_string("a,b\n1,2\n"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client
        .requester()
        .unwrap()
        .set_record("store1", "INPUT", b"a,b\n1,2\n".to_vec(), "text/csv")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_download_items_csv_defaults_bom() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/datasets/ds1/items"))
        .and(query_param("format", "csv"))
        .and(query_param("bom", "1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("n\n1\n".as_bytes().to_vec(), "text/csv"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let body = client
        .requester()
        .unwrap()
        .download_items("ds1", DatasetFormat::Csv, &DatasetItemsOptions::default())
        .await
        .unwrap();

    assert_eq!(body.as_text(), Some("n\n1\n"));
}

#[tokio::test]
async fn test_get_log_returns_text() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/logs/run1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("line 1\nline 2\n".as_bytes().to_vec(), "text/plain"),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let api = client.requester().unwrap();

    assert_eq!(
        api.get_log("run1").await.unwrap().as_deref(),
        Some("line 1\nline 2\n")
    );
    assert!(api.get_log("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn test_invalid_options_issue_no_requests() {
    init_tracing();
    let mock_server = MockServer::start().await;
    let client = client_for(&mock_server);

    let err = client
        .invoke(&OptionOverrides::new().base_url(""), |api| async move {
            api.get_actor("abc").await
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);

    let err = client
        .requester()
        .unwrap()
        .get_actor("")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);

    let stats = client.stats();
    assert_eq!(stats.calls, 0);
    assert_eq!(stats.requests, 0);
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invoke_with_per_call_token() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/acts/apify~hello-world/runs"))
        .and(query_param("token", "other-token"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "run1"}})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let run = client
        .invoke(&OptionOverrides::new().token("other-token"), |api| async move {
            let call = api.request(Method::POST, "/v2/acts/apify~hello-world/runs");
            Ok(api.execute(call).await?.into_data())
        })
        .await
        .unwrap();

    assert_eq!(run["id"], "run1");
    // the client default is unchanged
    assert_eq!(client.options().token.as_deref(), Some("test-token"));
}

#[tokio::test]
async fn test_cancellation_aborts_call() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/acts/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(10))
                .set_body_json(json!({"data": {}})),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let api = client.requester().unwrap();
    let token = CancellationToken::new();
    let call = api
        .request(Method::GET, "/v2/acts/slow")
        .with_cancel(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let started = std::time::Instant::now();
    let err = api.execute(call).await.unwrap_err();
    canceller.await.unwrap();

    assert!(err.is_cancelled());
    assert!(matches!(err, Error::Cancelled { attempt: 1, .. }));
    let details = err.details().unwrap();
    assert_eq!(details.attempt, Some(1));
    assert_eq!(details.method, Some(Method::GET));
    assert!(details.url.as_deref().unwrap().ends_with("/v2/acts/slow"));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_timeout_is_retried_then_fails() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/acts/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(500))
                .set_body_json(json!({"data": {}})),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client
        .requester_with(
            &OptionOverrides::new()
                .max_retries(1)
                .timeout(Duration::from_millis(50)),
        )
        .unwrap()
        .get_actor("slow")
        .await;

    match result {
        Err(Error::MaxRetriesExceeded {
            attempts,
            last_error,
        }) => {
            assert_eq!(attempts, 2);
            assert!(matches!(*last_error, Error::Timeout { .. }));
        }
        other => panic!("Expected MaxRetriesExceeded, got {:?}", other),
    }
}

#[tokio::test]
async fn test_exponential_backoff() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/acts/abc"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&mock_server)
        .await;

    let client = ApifyClient::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .max_retries(2)
        .min_delay_between_retries(Duration::from_millis(50))
        .build()
        .unwrap();

    let started = std::time::Instant::now();
    let result = client.requester().unwrap().get_actor("abc").await;
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(Error::MaxRetriesExceeded { attempts: 3, .. })));
    // 50ms + 100ms
    assert!(elapsed >= Duration::from_millis(150));
}

async fn status_outcome(status: u16, max_retries: usize) -> (apify_client::Result<()>, u64) {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/v2/acts/abc"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client
        .requester_with(&OptionOverrides::new().max_retries(max_retries))
        .unwrap()
        .delete_actor("abc")
        .await;
    (result, client.stats().requests)
}

#[tokio::test]
async fn test_status_boundaries_over_the_wire() {
    init_tracing();

    let (result, requests) = status_outcome(300, 2).await;
    assert_eq!(result.unwrap_err().status(), Some(300));
    assert_eq!(requests, 1);

    let (result, requests) = status_outcome(499, 2).await;
    assert_eq!(result.unwrap_err().status(), Some(499));
    assert_eq!(requests, 1);

    let (result, requests) = status_outcome(500, 2).await;
    let err = result.unwrap_err();
    assert!(matches!(err, Error::MaxRetriesExceeded { attempts: 3, .. }));
    assert_eq!(err.status(), Some(500));
    assert_eq!(requests, 3);

    let (result, requests) = status_outcome(299, 2).await;
    assert!(result.is_ok());
    assert_eq!(requests, 1);
}

#[tokio::test]
async fn test_redirects_are_not_followed() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/acts/x"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/elsewhere"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/elsewhere"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "redirected"}})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .requester()
        .unwrap()
        .get_actor("x")
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(302));
    assert_eq!(err.kind(), ErrorKind::RequestFailed);
    assert_eq!(client.stats().requests, 1);
}

#[tokio::test]
async fn test_lowercase_method_is_normalized() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/acts"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "abc"}})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let api = client.requester().unwrap();
    let call = api.request(Method::from_bytes(b"post").unwrap(), "/v2/acts");
    let data = api.execute(call).await.unwrap().into_data();

    assert_eq!(data["id"], "abc");
}

#[tokio::test]
async fn test_path_segments_are_percent_encoded() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/key-value-stores/store1/records/a%2Fb%20c"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let record = client
        .requester()
        .unwrap()
        .get_record("store1", "a/b c")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(record.key, "a/b c");
    assert_eq!(record.value.as_json(), Some(&json!({"ok": true})));
}
