//! HttpGateway against a local wiremock server.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use turnstile_payments::config::GatewaySettings;
use turnstile_payments::gateway::SessionRequest;
use turnstile_payments::{ChargeStatus, GatewayError, HttpGateway, PaymentGateway};

fn gateway(server: &MockServer) -> HttpGateway {
    HttpGateway::new(&GatewaySettings {
        base_url: server.uri(),
        secret_key: Some("sk_test_wire".to_string()),
        callback_url: Some("https://tickets.example.com/return".to_string()),
        request_timeout_secs: 2,
        max_retry_elapsed_secs: 2,
        initial_backoff_ms: 10,
        max_backoff_secs: 1,
        ..GatewaySettings::default()
    })
    .unwrap()
}

fn session_request() -> SessionRequest {
    SessionRequest {
        reference: "order-1".to_string(),
        amount_cents: 36_108,
        currency: "INR".to_string(),
        email: "buyer@example.com".to_string(),
        metadata: json!({ "orderId": "order-1" }),
    }
}

#[tokio::test]
async fn initialize_sends_reference_and_amount() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transaction/initialize"))
        .and(header("authorization", "Bearer sk_test_wire"))
        .and(body_partial_json(json!({
            "reference": "order-1",
            "amount": 36108,
            "email": "buyer@example.com",
            "callback_url": "https://tickets.example.com/return"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "message": "Authorization URL created",
            "data": {
                "authorization_url": "https://checkout.example.test/abc",
                "access_code": "abc",
                "reference": "order-1"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = gateway(&server).initialize_session(&session_request()).await.unwrap();
    assert_eq!(session.authorization_url, "https://checkout.example.test/abc");
    assert_eq!(session.reference, "order-1");
}

#[tokio::test]
async fn verify_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transaction/verify/order-1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/transaction/verify/order-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "message": "Verification successful",
            "data": {
                "status": "success",
                "reference": "order-1",
                "amount": 36108,
                "currency": "INR"
            }
        })))
        .mount(&server)
        .await;

    let charge = gateway(&server).verify_charge("order-1").await.unwrap();
    assert_eq!(charge.status, ChargeStatus::Success);
    assert_eq!(charge.amount_cents, 36_108);
}

#[tokio::test]
async fn unknown_reference_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transaction/verify/missing"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "status": false,
            "message": "Transaction reference not found"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = gateway(&server).verify_charge("missing").await.unwrap_err();
    assert!(matches!(err, GatewayError::UnknownReference(_)));
}

#[tokio::test]
async fn bad_credentials_are_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transaction/verify/order-1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "status": false,
            "message": "Invalid key"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = gateway(&server).verify_charge("order-1").await.unwrap_err();
    assert!(matches!(err, GatewayError::Unauthorized));
}

#[tokio::test]
async fn refund_is_sent_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/refund"))
        .and(body_partial_json(json!({ "transaction": "order-1", "amount": 36108 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "message": "Refund has been queued for processing",
            "data": { "amount": 36108, "status": "pending" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let refund = gateway(&server).refund("order-1", 36_108).await.unwrap();
    assert_eq!(refund.amount_cents, 36_108);
}

#[tokio::test]
async fn envelope_status_false_is_a_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transaction/initialize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": false,
            "message": "Duplicate Transaction Reference"
        })))
        .mount(&server)
        .await;

    let err = gateway(&server).initialize_session(&session_request()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Rejected { status: 200, .. }));
    assert!(!err.is_retryable());
}
