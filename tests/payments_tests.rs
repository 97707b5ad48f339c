use creative_proxy::{
    config::Config,
    payments::signature,
    server::{AppState, create_app},
};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use reqwest::Client;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const WEBHOOK_SECRET: &str = "whsec_test_secret";

fn stripe_config(api_base: &str, secret_key: Option<&str>, webhook_secret: Option<&str>) -> Config {
    let mut config = Config::default();
    config.stripe.api_base = Some(api_base.to_string());
    config.stripe.secret_key = secret_key.map(str::to_string);
    config.stripe.webhook_secret = webhook_secret.map(str::to_string);
    config
}

fn app_for(config: Config) -> Router {
    create_app(AppState::with_client(config, Client::new()))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn checkout_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/payments/checkout")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn webhook_request(payload: &str, signature_header: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/payments/webhook")
        .header("content-type", "application/json");
    if let Some(value) = signature_header {
        builder = builder.header("Stripe-Signature", value);
    }
    builder.body(Body::from(payload.to_string())).unwrap()
}

fn valid_checkout() -> Value {
    json!({
        "priceId": "price_pro_monthly",
        "userId": "user-42",
        "customerEmail": "artist@example.com",
        "successUrl": "https://app.example.com/billing/success",
        "cancelUrl": "https://app.example.com/billing/cancel"
    })
}

#[tokio::test]
async fn test_checkout_creates_session() {
    let stripe = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .and(header("authorization", "Bearer sk_test_123"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("price_pro_monthly"))
        .and(body_string_contains("client_reference_id=user-42"))
        .and(body_string_contains("mode=payment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_abc",
            "object": "checkout.session",
            "url": "https://checkout.stripe.com/c/pay/cs_test_abc"
        })))
        .expect(1)
        .mount(&stripe)
        .await;

    let app = app_for(stripe_config(&stripe.uri(), Some("sk_test_123"), None));
    let (status, body) = send(app, checkout_request(valid_checkout())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "success": true,
            "sessionId": "cs_test_abc",
            "url": "https://checkout.stripe.com/c/pay/cs_test_abc"
        })
    );
}

#[tokio::test]
async fn test_checkout_without_secret_key_is_500() {
    let stripe = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&stripe)
        .await;

    let app = app_for(stripe_config(&stripe.uri(), None, None));
    let (status, body) = send(app, checkout_request(valid_checkout())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["type"], "config_error");
    assert!(body["error"]["message"].as_str().unwrap().contains("STRIPE_SECRET_KEY"));
}

#[tokio::test]
async fn test_checkout_validation_precedes_credentials() {
    let app = app_for(Config::default());
    let (status, body) = send(app, checkout_request(json!({"successUrl": "https://a", "cancelUrl": "https://b"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "priceId is required");
}

#[tokio::test]
async fn test_checkout_maps_stripe_errors() {
    let stripe = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"type": "invalid_request_error", "message": "Invalid API Key provided"}
        })))
        .mount(&stripe)
        .await;

    let app = app_for(stripe_config(&stripe.uri(), Some("sk_test_bad"), None));
    let (status, body) = send(app, checkout_request(valid_checkout())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Invalid Stripe API key");
    assert_eq!(body["error"]["details"]["error"]["message"], "Invalid API Key provided");
}

#[tokio::test]
async fn test_webhook_without_secret_is_noop() {
    let app = app_for(Config::default());
    let (status, body) = send(app, webhook_request(r#"{"id":"evt_1","type":"checkout.session.completed"}"#, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"received": true, "verified": false}));
}

#[tokio::test]
async fn test_webhook_with_valid_signature() {
    let payload = r#"{"id":"evt_1","type":"checkout.session.completed","livemode":false,"data":{"object":{"id":"cs_test_abc"}}}"#;
    let timestamp = chrono::Utc::now().timestamp();
    let header = format!("t={},v1={}", timestamp, signature::sign(WEBHOOK_SECRET, timestamp, payload.as_bytes()).unwrap());

    let app = app_for(stripe_config("https://api.stripe.com", None, Some(WEBHOOK_SECRET)));
    let (status, body) = send(app, webhook_request(payload, Some(header))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"received": true, "verified": true, "type": "checkout.session.completed"})
    );
}

#[tokio::test]
async fn test_webhook_rejects_bad_signatures() {
    let payload = r#"{"id":"evt_1","type":"invoice.paid"}"#;
    let now = chrono::Utc::now().timestamp();
    let app = app_for(stripe_config("https://api.stripe.com", None, Some(WEBHOOK_SECRET)));

    // Missing header
    let (status, body) = send(app.clone(), webhook_request(payload, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("Missing Stripe-Signature"));

    // Wrong secret
    let forged = format!("t={},v1={}", now, signature::sign("whsec_other", now, payload.as_bytes()).unwrap());
    let (status, _) = send(app.clone(), webhook_request(payload, Some(forged))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Replayed outside the tolerance window
    let old = now - 600;
    let stale = format!("t={},v1={}", old, signature::sign(WEBHOOK_SECRET, old, payload.as_bytes()).unwrap());
    let (status, body) = send(app, webhook_request(payload, Some(stale))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("tolerance"));
}
