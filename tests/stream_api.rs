use chrono::NaiveDate;
use serde_json::json;
use wiremock::matchers::{basic_auth, body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use resfetch::client::{ClientError, StreamClient};
use resfetch::config::{Config, Method};
use resfetch::model::ReservationStatus;

fn client_for(server: &MockServer) -> StreamClient {
    let cfg = Config {
        api_url: server.uri(),
        app_id: "app-1".to_string(),
        username: "user".to_string(),
        password: "secret".to_string(),
        method: Method::Poll,
        page_size: 10,
        statuses: Vec::new(),
        start_date: None,
        end_date: None,
        output_dir: "./output".to_string(),
        acknowledge: false,
    };
    StreamClient::from_config(&cfg).unwrap()
}

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[tokio::test]
async fn poll_clamps_the_requested_page_size() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stream/app-1/poll"))
        .and(query_param("num_of_messages", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stream/app-1/poll"))
        .and(query_param("num_of_messages", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stream/app-1/poll"))
        .and(query_param("num_of_messages", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.poll(15).await.unwrap();
    client.poll(0).await.unwrap();
    client.poll(7).await.unwrap();
}

#[tokio::test]
async fn poll_returns_messages_in_receipt_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stream/app-1/poll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [
                {"receipt_handle": "rh-1", "payload": {"guest": "Ada"}},
                {"receipt_handle": "rh-2", "payload": {"guest": "Grace"}},
            ]
        })))
        .mount(&server)
        .await;

    let messages = client_for(&server).poll(10).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].receipt_handle, "rh-1");
    assert_eq!(messages[1].payload["guest"], "Grace");
}

#[tokio::test]
async fn poll_treats_404_as_empty_queue() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stream/app-1/poll"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let messages = client_for(&server).poll(10).await.unwrap();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn poll_treats_empty_result_as_empty_queue() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stream/app-1/poll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .mount(&server)
        .await;

    let messages = client_for(&server).poll(10).await.unwrap();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn poll_maps_429_to_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stream/app-1/poll"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let err = client_for(&server).poll(10).await.unwrap_err();
    assert!(matches!(err, ClientError::RateLimited));
}

#[tokio::test]
async fn poll_surfaces_status_and_body_on_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stream/app-1/poll"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = client_for(&server).poll(10).await.unwrap_err();
    match err {
        ClientError::Upstream { status, body } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected Upstream, got {other:?}"),
    }
}

#[tokio::test]
async fn resend_sends_date_and_status_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stream/app-1/resend"))
        .and(query_param("date", "2025-10-12"))
        .and(query_param("status", "IN_HOUSE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "queued"})))
        .expect(1)
        .mount(&server)
        .await;

    let response = client_for(&server)
        .resend_messages(d("2025-10-12"), ReservationStatus::IN_HOUSE)
        .await
        .unwrap();
    assert_eq!(response["status"], "queued");
}

#[tokio::test]
async fn resend_maps_403_to_feature_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stream/app-1/resend"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .resend_messages(d("2025-10-12"), ReservationStatus::BOOKED)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::FeatureDisabled));
    assert!(err.to_string().contains("not enabled"));
}

#[tokio::test]
async fn resend_keeps_non_json_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stream/app-1/resend"))
        .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
        .mount(&server)
        .await;

    let response = client_for(&server)
        .resend_messages(d("2025-10-12"), ReservationStatus::ARRIVALS)
        .await
        .unwrap();
    assert_eq!(response, serde_json::Value::String("accepted".into()));
}

#[tokio::test]
async fn acknowledge_posts_the_receipt_handle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/stream/app-1/ack"))
        .and(body_json(json!({"receipt_handle": "rh-9"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
        .expect(1)
        .mount(&server)
        .await;

    let response = client_for(&server).acknowledge("rh-9").await.unwrap();
    assert_eq!(response["acknowledged"], true);
}

#[tokio::test]
async fn every_request_carries_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stream/app-1/poll"))
        .and(basic_auth("user", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server).poll(10).await.unwrap();
}
