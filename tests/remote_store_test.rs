use std::time::{Duration, Instant};

use club_roster::error::AppError;
use club_roster::store::{
    self, HttpTableClient, RemoteRosterStore, RemoteStoreConfig, RosterStore, StoreConfig,
    TableClient,
};
use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, token: Option<&str>) -> HttpTableClient {
    HttpTableClient::new(RemoteStoreConfig {
        api_token: token.map(str::to_string),
        ..RemoteStoreConfig::new(server.uri())
    })
    .unwrap()
}

fn semester_row(id: i64, key: &str, year: i32, term: &str, date: &str) -> Value {
    json!({
        "id": id,
        "semester_key": key,
        "academic_year": year,
        "term": term,
        "last_updated": "2026-03-01T08:00:00+00:00",
        "source_date": date,
    })
}

#[tokio::test]
async fn test_missing_table_reads_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tables/clubs"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let rows = client(&server, None).read_table("clubs").await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_read_and_write_table() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tables/students"))
        .and(header("Authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rows": [{ "id": 1, "student_name": "王小明" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/tables/students"))
        .and(header("Authorization", "Bearer tok"))
        .and(body_json(json!({ "rows": [{ "id": 2 }] })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let tables = client(&server, Some("tok"));
    let rows = tables.read_table("students").await.unwrap();
    assert_eq!(rows, vec![json!({ "id": 1, "student_name": "王小明" })]);

    tables
        .write_table("students", vec![json!({ "id": 2 })])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_server_error_is_store_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("quota exceeded"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let tables = client(&server, None);
    assert!(matches!(
        tables.read_table("semesters").await,
        Err(AppError::StoreUnavailable(msg)) if msg.contains("quota exceeded")
    ));
    assert!(matches!(
        tables.write_table("semesters", Vec::new()).await,
        Err(AppError::StoreUnavailable(_))
    ));
}

#[tokio::test]
async fn test_unparseable_table_is_store_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tables/semesters"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    assert!(matches!(
        client(&server, None).read_table("semesters").await,
        Err(AppError::StoreUnavailable(_))
    ));
}

#[tokio::test]
async fn test_new_semester_appends_after_existing_ids() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tables/semesters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rows": [semester_row(3, "114下", 114, "下", "2026/3/1")]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/tables/semesters"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = RemoteRosterStore::new(client(&server, None));

    // existing key: no write
    assert_eq!(store.get_or_create_semester("2026/4/20").await.unwrap(), 3);

    let id = store.get_or_create_semester("2026/9/1").await.unwrap();
    assert_eq!(id, 4);

    let requests = server.received_requests().await.unwrap();
    let put = requests
        .iter()
        .find(|r| r.url.path() == "/tables/semesters" && !r.body.is_empty())
        .unwrap();
    let body: Value = serde_json::from_slice(&put.body).unwrap();
    let rows = body["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["semester_key"], "114下");
    assert_eq!(rows[1]["id"], 4);
    assert_eq!(rows[1]["semester_key"], "115上");
    assert_eq!(rows[1]["term"], "上");
    assert_eq!(rows[1]["source_date"], "2026/9/1");
}

#[tokio::test]
async fn test_open_selects_reachable_remote() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tables/semesters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "rows": [] })))
        .expect(1..)
        .mount(&server)
        .await;

    let store = store::open(&StoreConfig {
        database_url: "sqlite::memory:".to_string(),
        remote: Some(RemoteStoreConfig::new(server.uri())),
    })
    .await
    .unwrap();

    assert_eq!(store.backend(), "remote");
    assert!(store.list_semesters().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_open_falls_back_when_remote_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = store::open(&StoreConfig {
        database_url: "sqlite::memory:".to_string(),
        remote: Some(RemoteStoreConfig::new(server.uri())),
    })
    .await
    .unwrap();

    assert_eq!(store.backend(), "sqlite");
    let id = store.get_or_create_semester("2026/3/1").await.unwrap();
    assert_eq!(store.list_semesters().await.unwrap()[0].id, id);
}

#[tokio::test]
async fn test_open_falls_back_when_remote_hangs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "rows": [] }))
                .set_delay(Duration::from_secs(60)),
        )
        .mount(&server)
        .await;

    let started = Instant::now();
    let store = store::open(&StoreConfig {
        database_url: "sqlite::memory:".to_string(),
        remote: Some(RemoteStoreConfig {
            timeout_secs: 1,
            ..RemoteStoreConfig::new(server.uri())
        }),
    })
    .await
    .unwrap();

    assert_eq!(store.backend(), "sqlite");
    assert!(started.elapsed() < Duration::from_secs(30));
}
