#![allow(clippy::unwrap_used)]
// Integration tests for `Dispatcher` using wiremock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use futures_util::future::{BoxFuture, join_all};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use qualys_api::{
    BearerCredential, CallRequest, Credential, Diagnostic, Dispatcher, Error, ErrorTag,
    MemorySink, PlatformProfile, Sleeper,
};

// ── Helpers ─────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        self.slept.lock().unwrap().push(duration);
        Box::pin(async {})
    }
}

struct Harness {
    server: MockServer,
    dispatcher: Dispatcher,
    sleeper: Arc<RecordingSleeper>,
    sink: Arc<MemorySink>,
}

async fn setup() -> Harness {
    let server = MockServer::start().await;
    let sleeper = Arc::new(RecordingSleeper::default());
    let sink = Arc::new(MemorySink::new());
    let dispatcher = Dispatcher::with_client(reqwest::Client::new())
        .with_sleeper(sleeper.clone())
        .with_sink(sink.clone());
    Harness {
        server,
        dispatcher,
        sleeper,
        sink,
    }
}

fn profile(server: &MockServer) -> PlatformProfile {
    PlatformProfile::single_origin(&server.uri()).unwrap()
}

fn basic(server: &MockServer, username: &str, password: &str) -> Credential {
    Credential::basic(username, password, profile(server))
}

fn stale_bearer(server: &MockServer) -> Credential {
    BearerCredential::from_token(
        "bob",
        SecretString::from("s3cr".to_owned()),
        profile(server),
        SecretString::from("old-token".to_owned()),
        Utc::now() - TimeDelta::minutes(4 * 60 + 1),
    )
    .into()
}

fn fresh_bearer(server: &MockServer) -> Credential {
    BearerCredential::from_token(
        "bob",
        SecretString::from("s3cr".to_owned()),
        profile(server),
        SecretString::from("live-token".to_owned()),
        Utc::now(),
    )
    .into()
}

// ── Authentication ──────────────────────────────────────────────────

#[tokio::test]
async fn test_basic_auth_header_and_requested_with() {
    let h = setup().await;

    Mock::given(method("GET"))
        .and(path("/msp/about.php"))
        .and(header("authorization", "Basic YWxpY2U6cHc="))
        .and(header("x-requested-with", "qualys-api"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-RateLimit-Remaining", "290")
                .insert_header("X-RateLimit-Limit", "300")
                .set_body_string("<ABOUT><API-VERSION>2.0</API-VERSION></ABOUT>"),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let credential = basic(&h.server, "alice", "pw");
    let response = h
        .dispatcher
        .dispatch(&credential, CallRequest::new("auth", "about"))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    let view = response.rate_limit();
    assert_eq!(view.remaining, Some(290));
    assert_eq!(view.limit, Some(300));
}

#[tokio::test]
async fn test_probe_records_rate_limit_on_credential() {
    let h = setup().await;

    Mock::given(method("GET"))
        .and(path("/msp/about.php"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-RateLimit-Remaining", "120")
                .insert_header("X-Concurrency-Limit-Limit", "2")
                .set_body_string("<ABOUT/>"),
        )
        .mount(&h.server)
        .await;

    let credential = basic(&h.server, "alice", "pw");
    let view = h.dispatcher.probe(&credential).await.unwrap();
    assert_eq!(view.concurrency_limit, Some(2));

    let Credential::Basic(basic) = &credential else {
        panic!("expected a basic credential");
    };
    assert_eq!(basic.rate_limit().unwrap().remaining, Some(120));
}

#[tokio::test]
async fn test_token_issue_posts_form_and_keeps_body_as_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string(
            "username=bob&password=s3cr&token=true&permissions=true",
        ))
        .respond_with(ResponseTemplate::new(201).set_body_string("eyJhbGciOi"))
        .expect(1)
        .mount(&server)
        .await;

    let before = Utc::now();
    let bearer = BearerCredential::issue(
        &reqwest::Client::new(),
        "bob",
        SecretString::from("s3cr".to_owned()),
        profile(&server),
    )
    .await
    .unwrap();

    assert_eq!(bearer.token().await.expose_secret(), "eyJhbGciOi");
    assert!(bearer.issued_at().await >= before);
    assert!(bearer.is_fresh().await);
}

#[tokio::test]
async fn test_token_issue_failure_is_authentication_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
        .mount(&server)
        .await;

    let result = BearerCredential::issue(
        &reqwest::Client::new(),
        "bob",
        SecretString::from("wrong".to_owned()),
        profile(&server),
    )
    .await;

    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_stale_token_refreshed_before_request() {
    let h = setup().await;

    Mock::given(method("POST"))
        .and(path("/auth"))
        .respond_with(ResponseTemplate::new(200).set_body_string("new-token"))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/am/v1/asset/7"))
        .and(header("authorization", "Bearer new-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "assetId": 7 })))
        .expect(1)
        .mount(&h.server)
        .await;

    let credential = stale_bearer(&h.server);
    let response = h
        .dispatcher
        .dispatch(
            &credential,
            CallRequest::new("gav", "get_asset").path("placeholder", "7"),
        )
        .await
        .unwrap();

    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["assetId"], 7);
    assert!(
        h.sink
            .events()
            .iter()
            .any(|d| matches!(d, Diagnostic::TokenRefreshed { .. }))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_dispatch_refreshes_token_once() {
    let h = setup().await;

    Mock::given(method("POST"))
        .and(path("/auth"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("new-token")
                .set_delay(Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/am/v1/asset/1"))
        .and(header("authorization", "Bearer new-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(8)
        .mount(&h.server)
        .await;

    let credential = stale_bearer(&h.server);
    let calls = (0..8).map(|_| {
        h.dispatcher.dispatch(
            &credential,
            CallRequest::new("gav", "get_asset").path("placeholder", "1"),
        )
    });
    for result in join_all(calls).await {
        result.unwrap();
    }
}

#[tokio::test]
async fn test_unauthorized_maps_to_authentication() {
    let h = setup().await;

    Mock::given(method("GET"))
        .and(path("/msp/about.php"))
        .respond_with(ResponseTemplate::new(401).set_body_string(
            "<SIMPLE_RETURN><RESPONSE><TEXT>Bad Login/Password</TEXT></RESPONSE></SIMPLE_RETURN>",
        ))
        .mount(&h.server)
        .await;

    let credential = basic(&h.server, "alice", "nope");
    let result = h
        .dispatcher
        .dispatch(&credential, CallRequest::new("auth", "about"))
        .await;

    match result {
        Err(Error::Authentication { message }) => assert_eq!(message, "Bad Login/Password"),
        other => panic!("expected Authentication error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_flavor_mismatch_sends_nothing() {
    let h = setup().await;

    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let credential = basic(&h.server, "alice", "pw");
    let result = h
        .dispatcher
        .dispatch(
            &credential,
            CallRequest::new("gav", "get_asset").path("placeholder", "1"),
        )
        .await;
    assert!(
        matches!(result, Err(Error::AuthFlavorMismatch { .. })),
        "expected AuthFlavorMismatch, got: {result:?}"
    );

    let bearer = fresh_bearer(&h.server);
    let result = h
        .dispatcher
        .dispatch(&bearer, CallRequest::new("auth", "about"))
        .await;
    assert!(matches!(result, Err(Error::AuthFlavorMismatch { .. })));
}

// ── Rate limiting ───────────────────────────────────────────────────

#[tokio::test]
async fn test_429_waits_advertised_seconds_plus_margin() {
    let h = setup().await;

    Mock::given(method("GET"))
        .and(path("/msp/about.php"))
        .respond_with(ResponseTemplate::new(429).insert_header("X-RateLimit-ToWait-Sec", "5"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/msp/about.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<ABOUT/>"))
        .expect(1)
        .mount(&h.server)
        .await;

    let credential = basic(&h.server, "alice", "pw");
    h.dispatcher
        .dispatch(&credential, CallRequest::new("auth", "about"))
        .await
        .unwrap();

    assert_eq!(h.sleeper.slept(), vec![Duration::from_secs(8)]);
    assert!(h.sink.events().iter().any(|d| matches!(
        d,
        Diagnostic::RateLimitSleep { seconds: 8, .. }
    )));
}

#[tokio::test]
async fn test_exhausted_budget_retries_identical_request() {
    let h = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/fo/scan/"))
        .and(query_param("action", "list"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-RateLimit-Remaining", "0")
                .insert_header("X-RateLimit-ToWait-Sec", "7")
                .set_body_string("<SCAN_LIST_OUTPUT/>"),
        )
        .up_to_n_times(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/fo/scan/"))
        .and(query_param("action", "list"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-RateLimit-Remaining", "299")
                .set_body_string("<SCAN_LIST_OUTPUT><RESPONSE/></SCAN_LIST_OUTPUT>"),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let credential = basic(&h.server, "alice", "pw");
    let response = h
        .dispatcher
        .dispatch(
            &credential,
            CallRequest::new("vmdr", "get_scan_list").param("action", "list"),
        )
        .await
        .unwrap();

    assert_eq!(response.rate_limit().remaining, Some(299));
    assert_eq!(h.sleeper.slept(), vec![Duration::from_secs(10)]);
}

#[tokio::test]
async fn test_missing_wait_header_uses_default_window() {
    let h = setup().await;

    Mock::given(method("GET"))
        .and(path("/msp/about.php"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/msp/about.php"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&h.server)
        .await;

    let credential = basic(&h.server, "alice", "pw");
    h.dispatcher
        .dispatch(&credential, CallRequest::new("auth", "about"))
        .await
        .unwrap();

    assert_eq!(h.sleeper.slept(), vec![Duration::from_secs(3601)]);
}

#[tokio::test]
async fn test_wait_past_deadline_is_timeout() {
    let h = setup().await;

    Mock::given(method("GET"))
        .and(path("/msp/about.php"))
        .respond_with(ResponseTemplate::new(429).insert_header("X-RateLimit-ToWait-Sec", "600"))
        .expect(1)
        .mount(&h.server)
        .await;

    let credential = basic(&h.server, "alice", "pw");
    let result = h
        .dispatcher
        .dispatch(
            &credential,
            CallRequest::new("auth", "about").timeout(Duration::from_secs(30)),
        )
        .await;

    assert!(
        matches!(result, Err(Error::Timeout { .. })),
        "expected Timeout, got: {result:?}"
    );
    assert!(h.sleeper.slept().is_empty());
}

const HUGE_WAIT: &str = "18446744073709551615";

#[tokio::test]
async fn test_huge_wait_header_with_deadline_is_timeout() {
    let h = setup().await;

    Mock::given(method("GET"))
        .and(path("/msp/about.php"))
        .respond_with(
            ResponseTemplate::new(429).insert_header("X-RateLimit-ToWait-Sec", HUGE_WAIT),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let credential = basic(&h.server, "alice", "pw");
    let result = h
        .dispatcher
        .dispatch(
            &credential,
            CallRequest::new("auth", "about").timeout(Duration::from_secs(30)),
        )
        .await;

    assert!(
        matches!(result, Err(Error::Timeout { .. })),
        "expected Timeout, got: {result:?}"
    );
    assert!(h.sleeper.slept().is_empty());
}

#[tokio::test]
async fn test_huge_wait_header_saturates_sleep() {
    let h = setup().await;

    Mock::given(method("GET"))
        .and(path("/msp/about.php"))
        .respond_with(
            ResponseTemplate::new(429).insert_header("X-RateLimit-ToWait-Sec", HUGE_WAIT),
        )
        .up_to_n_times(2)
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/msp/about.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<ABOUT/>"))
        .expect(1)
        .mount(&h.server)
        .await;

    let credential = basic(&h.server, "alice", "pw");
    h.dispatcher
        .dispatch(&credential, CallRequest::new("auth", "about"))
        .await
        .unwrap();

    assert_eq!(h.sleeper.slept(), vec![Duration::MAX, Duration::MAX]);
}

#[tokio::test]
async fn test_low_budget_warns() {
    let h = setup().await;

    Mock::given(method("GET"))
        .and(path("/msp/about.php"))
        .respond_with(ResponseTemplate::new(200).insert_header("X-RateLimit-Remaining", "3"))
        .mount(&h.server)
        .await;

    let credential = basic(&h.server, "alice", "pw");
    h.dispatcher
        .dispatch(&credential, CallRequest::new("auth", "about"))
        .await
        .unwrap();

    let events = h.sink.events();
    assert!(events.iter().any(|d| matches!(
        d,
        Diagnostic::RateLimitApproaching { remaining: 3, .. }
    )));
    assert!(events.iter().all(|d| !matches!(d, Diagnostic::RateLimitSleep { .. })));
}

// ── URLs and bodies ─────────────────────────────────────────────────

#[tokio::test]
async fn test_path_placeholder_expansion() {
    let h = setup().await;

    Mock::given(method("GET"))
        .and(path("/qps/rest/2.0/get/am/user/42"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<ServiceResponse><responseCode>SUCCESS</responseCode></ServiceResponse>",
        ))
        .expect(1)
        .mount(&h.server)
        .await;

    let credential = basic(&h.server, "alice", "pw");
    h.dispatcher
        .dispatch(
            &credential,
            CallRequest::new("users", "get_user").path("placeholder", "42"),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_qps_xml_body_sent_verbatim() {
    let h = setup().await;
    let xml = "<ServiceRequest><filters><Criteria field=\"name\" operator=\"EQUALS\">prod</Criteria></filters></ServiceRequest>";

    Mock::given(method("POST"))
        .and(path("/qps/rest/2.0/search/am/tag"))
        .and(header("content-type", "text/xml"))
        .and(body_string(xml))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<ServiceResponse><responseCode>SUCCESS</responseCode><count>0</count></ServiceResponse>",
        ))
        .expect(1)
        .mount(&h.server)
        .await;

    let credential = basic(&h.server, "alice", "pw");
    h.dispatcher
        .dispatch(
            &credential,
            CallRequest::new("tagging", "search_tags").xml_body(xml),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_post_form_body_is_normalized() {
    let h = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/fo/scan/"))
        .and(query_param("action", "launch"))
        .and(body_string("scan_title=weekly&ip=10.0.0.1%2C10.0.0.2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<SIMPLE_RETURN/>"))
        .expect(1)
        .mount(&h.server)
        .await;

    let credential = basic(&h.server, "alice", "pw");
    h.dispatcher
        .dispatch(
            &credential,
            CallRequest::new("vmdr", "launch_scan")
                .param("action", "launch")
                .body("scan_title", "weekly")
                .body("ip", vec!["10.0.0.1", "10.0.0.2"]),
        )
        .await
        .unwrap();
}

// ── Error decoding ──────────────────────────────────────────────────

#[tokio::test]
async fn test_vendor_simple_error_decoded() {
    let h = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/fo/scan/"))
        .respond_with(ResponseTemplate::new(400).set_body_string(
            "<SIMPLE_RETURN><RESPONSE><TEXT>Invalid user</TEXT></RESPONSE></SIMPLE_RETURN>",
        ))
        .mount(&h.server)
        .await;

    let credential = basic(&h.server, "alice", "pw");
    let result = h
        .dispatcher
        .dispatch(
            &credential,
            CallRequest::new("vmdr", "get_scan_list").param("action", "list"),
        )
        .await;

    match result {
        Err(Error::Api {
            status,
            message,
            tag,
        }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "Invalid user");
            assert_eq!(tag, ErrorTag::VendorSimple);
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_html_error_decoded() {
    let h = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/fo/scan/"))
        .respond_with(ResponseTemplate::new(503).set_body_string(
            "<html><body><h1>Service Unavailable</h1><p>Try later</p></body></html>",
        ))
        .mount(&h.server)
        .await;

    let credential = basic(&h.server, "alice", "pw");
    let err = h
        .dispatcher
        .dispatch(&credential, CallRequest::new("vmdr", "get_scan_list"))
        .await
        .unwrap_err();

    assert_eq!(err.tag(), Some(ErrorTag::Html));
    assert!(err.to_string().contains("Service Unavailable"));
}

#[tokio::test]
async fn test_raw_error_endpoint_returns_response() {
    let h = setup().await;

    Mock::given(method("GET"))
        .and(path("/pm/v1/deploymentjob/abc"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "message": "Job not found" })),
        )
        .mount(&h.server)
        .await;

    let credential = fresh_bearer(&h.server);
    let response = h
        .dispatcher
        .dispatch(
            &credential,
            CallRequest::new("pm", "get_job").path("placeholder", "abc"),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 404);
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["message"], "Job not found");
}

#[tokio::test]
async fn test_conflict_is_carried_as_data() {
    let h = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/fo/scan/"))
        .respond_with(ResponseTemplate::new(409).set_body_string(
            "<SIMPLE_RETURN><RESPONSE><TEXT>This scan cannot be run again until the previous run finishes</TEXT></RESPONSE></SIMPLE_RETURN>",
        ))
        .mount(&h.server)
        .await;

    let credential = basic(&h.server, "alice", "pw");
    let response = h
        .dispatcher
        .dispatch(
            &credential,
            CallRequest::new("vmdr", "launch_scan").param("action", "launch"),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 409);
    assert!(response.transient_conflict().is_some());
    let err = response.into_result().unwrap_err();
    assert!(err.is_transient());
    assert!(matches!(err, Error::TransientConflict { .. }));
}

#[tokio::test]
async fn test_unknown_endpoint_rejected_before_send() {
    let h = setup().await;
    let credential = basic(&h.server, "alice", "pw");

    let result = h
        .dispatcher
        .dispatch(&credential, CallRequest::new("vmdr", "no_such_call"))
        .await;
    assert!(matches!(result, Err(Error::UnknownEndpoint { .. })));

    let result = h
        .dispatcher
        .dispatch(&credential, CallRequest::new("nope", "about"))
        .await;
    assert!(matches!(result, Err(Error::UnknownModule { .. })));
}
