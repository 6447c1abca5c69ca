use pagewise_http::{HttpClient, HttpError, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize)]
struct Echo {
    ok: bool,
}

fn absolute(server: &MockServer, p: &str) -> String {
    format!("{}{}", server.uri(), p)
}

#[tokio::test]
async fn get_bytes_returns_body_and_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<h1>Hi</h1>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let client = HttpClient::unanchored().unwrap();
    let resp = client
        .get_bytes(&absolute(&server, "/page"))
        .await
        .expect("page fetch");

    assert_eq!(resp.status.as_u16(), 200);
    assert_eq!(resp.body, b"<h1>Hi</h1>");
    assert_eq!(
        resp.content_type.as_deref(),
        Some("text/html; charset=utf-8")
    );
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
        .mount(&server)
        .await;

    let client = HttpClient::unanchored().unwrap().with_retries(2);
    let resp = client
        .get_bytes(&absolute(&server, "/flaky"))
        .await
        .expect("second attempt succeeds");
    assert_eq!(resp.body, b"recovered");
}

#[tokio::test]
async fn huge_retry_after_is_clamped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(503).insert_header("retry-after", "86400"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ready"))
        .mount(&server)
        .await;

    let client = HttpClient::unanchored()
        .unwrap()
        .with_retries(1)
        .with_max_retry_after(Duration::from_millis(50));
    let resp = tokio::time::timeout(
        Duration::from_secs(5),
        client.get_bytes(&absolute(&server, "/busy")),
    )
    .await
    .expect("retry sleep is bounded")
    .expect("retry succeeds");
    assert_eq!(resp.body, b"ready");
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::unanchored().unwrap().with_retries(3);
    let err = client
        .get_bytes(&absolute(&server, "/missing"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HttpError::Api { status: StatusCode::NOT_FOUND, ref message, .. } if message == "nope"
    ));
}

#[tokio::test]
async fn post_json_sends_bearer_and_decodes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/echo"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_json(serde_json::json!({"q": "ping"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&server)
        .await;

    let client = HttpClient::new(&format!("{}/v1/", server.uri())).unwrap();
    let echo: Echo = client
        .post_json("echo", Some(" sk-test "), &serde_json::json!({"q": "ping"}))
        .await
        .expect("echo");
    assert!(echo.ok);
}

#[tokio::test]
async fn undecodable_json_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/items"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = HttpClient::new(&format!("{}/v1/", server.uri())).unwrap();
    let err = client
        .post_json::<_, Echo>("items", None, &serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Decode(_, ref snippet) if snippet == "not json"));
}
