//! HTTP-level tests for the content API client and the EmailJS relay

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use rbe_client::{
    ClientError, ContactTemplateParams, EmailJsClient, PaymentMethod, RegistrationRequest,
    SiteClient,
};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(server: &MockServer) -> SiteClient {
    SiteClient::new(&server.uri()).unwrap()
}

#[tokio::test]
async fn list_events_decodes_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/public/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "halloween2025",
                "title": "RétroWouh ! Halloween",
                "date": "2025-10-31T00:00:00.000Z",
                "time": "20:00",
                "adultPrice": 15,
                "childPrice": 8,
                "status": "PUBLISHED",
                "extras": "{\"isVisible\":true}"
            }
        ])))
        .mount(&server)
        .await;

    let events = client_for(&server).await.list_events().await.unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].adult_price, Some(15.0));
    assert_eq!(events[0].status.as_deref(), Some("PUBLISHED"));
}

#[tokio::test]
async fn null_list_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/public/flashes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(null)))
        .mount(&server)
        .await;

    let flashes = client_for(&server).await.list_flashes().await.unwrap();
    assert!(flashes.is_empty());
}

#[tokio::test]
async fn missing_event_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/public/events/nope"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let error = client_for(&server).await.get_event("nope").await.unwrap_err();
    assert!(matches!(error, ClientError::NotFound(_)));
    assert!(!error.is_unavailable());
}

#[tokio::test]
async fn server_error_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/public/vehicles"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let error = client_for(&server).await.list_vehicles().await.unwrap_err();
    assert!(error.is_unavailable());
    match error {
        ClientError::Api { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "maintenance");
        },
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/public/changelog"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let error = client_for(&server).await.changelog().await.unwrap_err();
    assert!(matches!(error, ClientError::Decode(_)));
    assert!(error.is_unavailable());
}

#[tokio::test]
async fn rejected_request_is_not_an_outage() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/public/events/sortie"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let error = client_for(&server).await.get_event("sortie").await.unwrap_err();
    assert_eq!(error.status(), Some(403));
    assert!(!error.is_unavailable());
}

#[tokio::test]
async fn unreachable_api_is_reported_as_such() {
    // Nothing listens on port 9 (discard) in the test environment
    let client = SiteClient::new("http://127.0.0.1:9").unwrap();

    let error = client.list_events().await.unwrap_err();
    assert!(error.is_unreachable());
    assert_eq!(error.status(), None);
}

#[tokio::test]
async fn create_registration_posts_camel_case_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/registrations"))
        .and(body_json(json!({
            "eventId": "halloween2025",
            "participantName": "Jeanne Martin",
            "participantEmail": "jeanne@example.fr",
            "adultTickets": 2,
            "childTickets": 1,
            "paymentMethod": "helloasso"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "registrationId": 77,
            "helloAssoUrl": "https://www.helloasso.com/checkout/77"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let receipt = client_for(&server)
        .await
        .create_registration(&RegistrationRequest {
            event_id: "halloween2025".into(),
            participant_name: "Jeanne Martin".into(),
            participant_email: "jeanne@example.fr".into(),
            adult_tickets: 2,
            child_tickets: 1,
            payment_method: PaymentMethod::HelloAsso,
        })
        .await
        .unwrap();

    assert_eq!(receipt.registration_id, "77");
    assert_eq!(
        receipt.hello_asso_url.as_deref(),
        Some("https://www.helloasso.com/checkout/77")
    );
}

#[tokio::test]
async fn registration_status_decodes_ticket_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/registrations/77/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 77,
            "status": "VALIDATED",
            "ticketSent": true,
            "validationCode": "RBE-77",
            "qrCode": "RBE-77|halloween2025"
        })))
        .mount(&server)
        .await;

    let status = client_for(&server)
        .await
        .registration_status("77")
        .await
        .unwrap();

    assert!(status.is_ticket_issued());
    assert_eq!(status.validation_code.as_deref(), Some("RBE-77"));
}

#[tokio::test]
async fn subscribe_reports_duplicates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/newsletter/subscribe"))
        .and(body_json(json!({"email": "membre@example.fr"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"duplicated": true})))
        .mount(&server)
        .await;

    let response = client_for(&server)
        .await
        .subscribe("membre@example.fr")
        .await
        .unwrap();
    assert!(response.duplicated);
}

#[tokio::test]
async fn subscribe_with_empty_body_is_fresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/newsletter/subscribe"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let response = client_for(&server)
        .await
        .subscribe("nouveau@example.fr")
        .await
        .unwrap();
    assert!(!response.duplicated);
}

#[tokio::test]
async fn subscriber_management_round() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/newsletter"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "email": "a@rbe.fr", "status": "CONFIRMED", "createdAt": "2025-01-02T10:00:00Z"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/newsletter"))
        .and(body_json(json!({"email": "b@rbe.fr"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/newsletter/1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let subscribers = client.list_subscribers().await.unwrap();
    assert_eq!(subscribers[0].id, "1");

    client.add_subscriber("b@rbe.fr").await.unwrap();
    client.delete_subscriber("1").await.unwrap();
}

#[tokio::test]
async fn emailjs_posts_service_template_and_params() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1.0/email/send"))
        .and(body_json(json!({
            "service_id": "service_rbe",
            "template_id": "template_contact",
            "user_id": "public_key",
            "template_params": {
                "from_name": "Jeanne",
                "from_email": "jeanne@example.fr",
                "subject": "Visite",
                "message": "Bonjour",
                "to_email": "association.rbe@gmail.com",
                "reply_to": "jeanne@example.fr"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;

    let mailer = EmailJsClient::new(
        "service_rbe".into(),
        "template_contact".into(),
        "public_key".into(),
    )
    .with_endpoint(format!("{}/api/v1.0/email/send", server.uri()));

    mailer
        .send(&ContactTemplateParams {
            from_name: "Jeanne".into(),
            from_email: "jeanne@example.fr".into(),
            subject: "Visite".into(),
            message: "Bonjour".into(),
            to_email: "association.rbe@gmail.com".into(),
            reply_to: "jeanne@example.fr".into(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn emailjs_rejection_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("The user_id parameter is required"))
        .mount(&server)
        .await;

    let mailer = EmailJsClient::new(String::new(), String::new(), String::new())
        .with_endpoint(server.uri());

    let result = mailer
        .send(&ContactTemplateParams {
            from_name: "x".into(),
            from_email: "x@y.z".into(),
            subject: "s".into(),
            message: "m".into(),
            to_email: "t@y.z".into(),
            reply_to: "x@y.z".into(),
        })
        .await;

    assert!(matches!(result, Err(ClientError::Api { status: 400, .. })));
}
