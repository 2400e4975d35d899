#![allow(clippy::unwrap_used)]
// Integration tests for the pagination drivers and the details pool.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{
    body_partial_json, body_string, body_string_contains, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

use qualys_api::{
    BearerCredential, CallRequest, Credential, Diagnostic, Dispatcher, Error, FnMaterializer,
    JsonListMaterializer, MemorySink, PageOptions, PlatformProfile, XmlListMaterializer,
    fetch_details, paginate,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn dispatcher(sink: Arc<MemorySink>) -> Dispatcher {
    Dispatcher::with_client(reqwest::Client::new()).with_sink(sink)
}

fn profile(server: &MockServer) -> PlatformProfile {
    PlatformProfile::single_origin(&server.uri()).unwrap()
}

fn basic(server: &MockServer) -> Credential {
    Credential::basic("alice", "pw", profile(server))
}

fn bearer(server: &MockServer) -> Credential {
    BearerCredential::from_token(
        "bob",
        SecretString::from("s3cr".to_owned()),
        profile(server),
        SecretString::from("live-token".to_owned()),
        Utc::now(),
    )
    .into()
}

fn assets(ids: &[u64]) -> Value {
    json!({
        "responseCode": "SUCCESS",
        "count": ids.len(),
        "assetListData": {
            "asset": ids.iter().map(|id| json!({ "assetId": id })).collect::<Vec<_>>()
        }
    })
}

fn asset_materializer() -> JsonListMaterializer<Value> {
    JsonListMaterializer::new("/assetListData/asset").with_id_field("/assetId")
}

fn asset_ids(records: &[Value]) -> Vec<u64> {
    records
        .iter()
        .map(|r| r["assetId"].as_u64().unwrap())
        .collect()
}

async fn mount_asset_page(server: &MockServer, after: Option<&str>, ids: &[u64]) {
    let builder = Mock::given(method("POST")).and(path("/am/v1/assets/host/list"));
    let response = ResponseTemplate::new(200).set_body_json(assets(ids));
    let mock = match after {
        Some(cursor) => builder
            .and(query_param("lastSeenAssetId", cursor))
            .respond_with(response)
            .with_priority(1),
        None => builder.respond_with(response).with_priority(5),
    };
    mock.expect(1).mount(server).await;
}

// ── Last id ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_last_id_ends_on_short_page_at_default_size() {
    let server = MockServer::start().await;
    let first: Vec<u64> = (1..=100).collect();
    let second: Vec<u64> = (101..=200).collect();
    let third: Vec<u64> = (201..=237).collect();
    mount_asset_page(&server, None, &first).await;
    mount_asset_page(&server, Some("100"), &second).await;
    mount_asset_page(&server, Some("200"), &third).await;

    let sink = Arc::new(MemorySink::new());
    let records = paginate(
        &dispatcher(sink.clone()),
        &bearer(&server),
        CallRequest::new("gav", "get_all_assets"),
        &PageOptions::default(),
        &asset_materializer(),
    )
    .await
    .unwrap();

    assert_eq!(asset_ids(&records), (1..=237).collect::<Vec<u64>>());
    let pages = sink
        .events()
        .iter()
        .filter(|d| matches!(d, Diagnostic::PageRetrieved { .. }))
        .count();
    assert_eq!(pages, 3);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    assert!(
        requests
            .iter()
            .all(|r| r.url.query_pairs().any(|(k, v)| k == "pageSize" && v == "100"))
    );
}

#[tokio::test]
async fn test_last_id_stops_on_empty_page() {
    let server = MockServer::start().await;
    mount_asset_page(&server, None, &[1, 2]).await;
    mount_asset_page(&server, Some("2"), &[]).await;

    let records = paginate(
        &dispatcher(Arc::new(MemorySink::new())),
        &bearer(&server),
        CallRequest::new("gav", "get_all_assets"),
        &PageOptions::default().page_size(2),
        &asset_materializer(),
    )
    .await
    .unwrap();

    assert_eq!(asset_ids(&records), vec![1, 2]);
}

#[tokio::test]
async fn test_last_id_stops_on_short_page() {
    let server = MockServer::start().await;
    mount_asset_page(&server, None, &[1, 2, 3]).await;
    mount_asset_page(&server, Some("3"), &[4, 5, 6]).await;
    mount_asset_page(&server, Some("6"), &[7]).await;

    let records = paginate(
        &dispatcher(Arc::new(MemorySink::new())),
        &bearer(&server),
        CallRequest::new("gav", "get_all_assets"),
        &PageOptions::default().page_size(3),
        &asset_materializer(),
    )
    .await
    .unwrap();

    assert_eq!(asset_ids(&records), vec![1, 2, 3, 4, 5, 6, 7]);
    let requests = server.received_requests().await.unwrap();
    assert!(
        requests
            .iter()
            .all(|r| r.url.query_pairs().any(|(k, v)| k == "pageSize" && v == "3"))
    );
}

#[tokio::test]
async fn test_last_id_prefers_envelope_cursor_and_has_more() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/am/v1/assets/host/filter/list"))
        .and(query_param("lastSeenAssetId", "900"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hasMore": 0,
            "assetListData": { "asset": [{ "assetId": 901 }] }
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/am/v1/assets/host/filter/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hasMore": 1,
            "lastSeenAssetId": 900,
            "assetListData": { "asset": [{ "assetId": 10 }, { "assetId": 20 }] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let records = paginate(
        &dispatcher(Arc::new(MemorySink::new())),
        &bearer(&server),
        CallRequest::new("gav", "query_assets"),
        &PageOptions::default(),
        &asset_materializer(),
    )
    .await
    .unwrap();

    assert_eq!(asset_ids(&records), vec![10, 20, 901]);
}

// ── Page number ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_offset_walks_numbered_pages() {
    let server = MockServer::start().await;

    for (page, body) in [
        ("1", json!({ "data": [{ "imageId": "a" }, { "imageId": "b" }] })),
        ("2", json!({ "data": [{ "imageId": "c" }] })),
        ("3", json!({ "data": [] })),
    ] {
        Mock::given(method("GET"))
            .and(path("/csapi/v1.3/images"))
            .and(query_param("pageNumber", page))
            .and(query_param("pageSize", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;
    }

    let records: Vec<Value> = paginate(
        &dispatcher(Arc::new(MemorySink::new())),
        &bearer(&server),
        CallRequest::new("cs", "list_images"),
        &PageOptions::default().page_size(2),
        &JsonListMaterializer::new("/data"),
    )
    .await
    .unwrap();

    let ids: Vec<&str> = records
        .iter()
        .map(|r| r["imageId"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_empty_body_ends_body_paged_listing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pm/v1/assets"))
        .and(body_partial_json(json!({ "pageNumber": 0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "asset-1" },
            { "id": "asset-2" }
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/pm/v1/assets"))
        .and(body_partial_json(json!({ "pageNumber": 1 })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let records: Vec<Value> = paginate(
        &dispatcher(Arc::new(MemorySink::new())),
        &bearer(&server),
        CallRequest::new("pm", "list_assets").body("query", "os:Windows"),
        &PageOptions::default(),
        &JsonListMaterializer::new(""),
    )
    .await
    .unwrap();

    assert_eq!(records.len(), 2);
}

// ── QPS hasMoreRecords ──────────────────────────────────────────────

#[tokio::test]
async fn test_has_more_appends_id_criterion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/qps/rest/2.0/search/am/tag"))
        .and(body_string(
            "<ServiceRequest><preferences><limitResults>2</limitResults></preferences></ServiceRequest>",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<ServiceResponse><responseCode>SUCCESS</responseCode><count>2</count>\
             <hasMoreRecords>true</hasMoreRecords><lastId>20</lastId>\
             <data><Tag><id>10</id><name>prod</name></Tag><Tag><id>20</id><name>dev</name></Tag></data>\
             </ServiceResponse>",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/qps/rest/2.0/search/am/tag"))
        .and(body_string_contains(
            r#"<Criteria field="id" operator="GREATER">20</Criteria>"#,
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<ServiceResponse><responseCode>SUCCESS</responseCode><count>1</count>\
             <hasMoreRecords>false</hasMoreRecords>\
             <data><Tag><id>30</id><name>qa</name></Tag></data>\
             </ServiceResponse>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let records: Vec<Value> = paginate(
        &dispatcher(Arc::new(MemorySink::new())),
        &basic(&server),
        CallRequest::new("tagging", "search_tags"),
        &PageOptions::default().page_size(2),
        &XmlListMaterializer::new("ServiceResponse/data/Tag"),
    )
    .await
    .unwrap();

    let names: Vec<&str> = records
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["prod", "dev", "qa"]);
}

// ── Next link ───────────────────────────────────────────────────────

fn host_page(ids: &[u32], next_id_min: Option<u32>) -> String {
    let hosts: String = ids
        .iter()
        .map(|id| format!("<HOST><ID>{id}</ID></HOST>"))
        .collect();
    let warning = next_id_min.map_or_else(String::new, |min| {
        format!(
            "<WARNING><CODE>1980</CODE><TEXT>1000 record limit exceeded</TEXT>\
             <URL>https://qualysapi.qualys.com/api/2.0/fo/asset/host/?action=list&amp;truncation_limit=2&amp;id_min={min}</URL></WARNING>"
        )
    });
    format!(
        "<HOST_LIST_OUTPUT><RESPONSE><DATETIME>2026-01-01T00:00:00Z</DATETIME>\
         <HOST_LIST>{hosts}</HOST_LIST>{warning}</RESPONSE></HOST_LIST_OUTPUT>"
    )
}

fn host_materializer() -> XmlListMaterializer<Value> {
    XmlListMaterializer::new("HOST_LIST_OUTPUT/RESPONSE/HOST_LIST/HOST").with_id_field("ID")
}

#[tokio::test]
async fn test_next_link_follows_warning_url() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/fo/asset/host/"))
        .and(query_param("id_min", "103"))
        .respond_with(ResponseTemplate::new(200).set_body_string(host_page(&[103], None)))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/fo/asset/host/"))
        .and(query_param("action", "list"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(host_page(&[101, 102], Some(103))),
        )
        .with_priority(5)
        .expect(1)
        .mount(&server)
        .await;

    let records = paginate(
        &dispatcher(Arc::new(MemorySink::new())),
        &basic(&server),
        CallRequest::new("vmdr", "get_host_list").param("action", "list"),
        &PageOptions::default(),
        &host_materializer(),
    )
    .await
    .unwrap();

    let ids: Vec<&str> = records.iter().map(|r| r["ID"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["101", "102", "103"]);

    let requests = server.received_requests().await.unwrap();
    assert!(
        requests[1]
            .url
            .query_pairs()
            .any(|(k, v)| k == "truncation_limit" && v == "2")
    );
}

#[tokio::test]
async fn test_repeated_next_link_stops() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/fo/asset/host/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(host_page(&[101], Some(101))),
        )
        .expect(2)
        .mount(&server)
        .await;

    let records = paginate(
        &dispatcher(Arc::new(MemorySink::new())),
        &basic(&server),
        CallRequest::new("vmdr", "get_host_list").param("action", "list"),
        &PageOptions::default(),
        &host_materializer(),
    )
    .await
    .unwrap();

    // Duplicates across pages are kept.
    assert_eq!(records.len(), 2);
}

// ── Caller controls ─────────────────────────────────────────────────

#[tokio::test]
async fn test_max_pages_caps_requests() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/fo/asset/host/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(host_page(&[1, 2], Some(3))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let records = paginate(
        &dispatcher(Arc::new(MemorySink::new())),
        &basic(&server),
        CallRequest::new("vmdr", "get_host_list").param("action", "list"),
        &PageOptions::default().max_pages(1),
        &host_materializer(),
    )
    .await
    .unwrap();

    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn test_cancelled_token_returns_partial_results() {
    let server = MockServer::start().await;

    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let records = paginate(
        &dispatcher(Arc::new(MemorySink::new())),
        &basic(&server),
        CallRequest::new("vmdr", "get_host_list").param("action", "list"),
        &PageOptions::default().cancel(cancel),
        &host_materializer(),
    )
    .await
    .unwrap();

    assert!(records.is_empty());
}

#[tokio::test]
async fn test_unpaginated_endpoint_dispatches_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/csapi/v1.3/images/sha256:abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "imageId": "abc" })))
        .expect(1)
        .mount(&server)
        .await;

    let records: Vec<Value> = paginate(
        &dispatcher(Arc::new(MemorySink::new())),
        &bearer(&server),
        CallRequest::new("cs", "get_image").path("placeholder", "sha256:abc"),
        &PageOptions::default(),
        &JsonListMaterializer::new(""),
    )
    .await
    .unwrap();

    assert_eq!(records, vec![json!({ "imageId": "abc" })]);
}

// ── Details pool ────────────────────────────────────────────────────

fn asset_by_id() -> FnMaterializer<u64> {
    FnMaterializer::new(|response| {
        let body: Value = response.json()?;
        Ok(body["assetId"].as_u64().into_iter().collect())
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_details_pool_preserves_input_order() {
    let server = MockServer::start().await;

    for id in 1..=6_u64 {
        // Early ids answer slowest so completion order differs from input order.
        Mock::given(method("GET"))
            .and(path(format!("/am/v1/asset/{id}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "assetId": id }))
                    .set_delay(Duration::from_millis(60 - id * 10)),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let records = fetch_details(
        Arc::new(dispatcher(Arc::new(MemorySink::new()))),
        Arc::new(bearer(&server)),
        (1..=6).map(|id: u32| id.to_string()),
        3,
        |id| CallRequest::new("gav", "get_asset").path("placeholder", id),
        Arc::new(asset_by_id()),
    )
    .await
    .unwrap();

    assert_eq!(records, vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn test_details_pool_surfaces_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/am/v1/asset/2"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "responseCode": "FAILED",
            "errorMessage": "backend unavailable"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/am/v1/asset/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "assetId": 1 })))
        .mount(&server)
        .await;

    let result = fetch_details(
        Arc::new(dispatcher(Arc::new(MemorySink::new()))),
        Arc::new(bearer(&server)),
        ["1".to_owned(), "2".to_owned()],
        1,
        |id| CallRequest::new("gav", "get_asset").path("placeholder", id),
        Arc::new(asset_by_id()),
    )
    .await;

    match result {
        Err(Error::Api { status, message, .. }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "backend unavailable");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}
