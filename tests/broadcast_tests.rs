use std::time::Duration;

use anc_notify_service::{
    clients::{
        auth::SharedAccessToken,
        qontak::{BROADCAST_DIRECT_PATH, FILE_UPLOAD_PATH, QontakClient},
    },
    models::{
        broadcast::{BroadcastRequest, Parameters},
        outcome::{DispatchOutcome, ProviderOutcome},
    },
};
use anyhow::Result;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

use crate::support::{broadcast_success_body, provider_client, rejection_body, upload_success_body};

/// Test: A success envelope marks the broadcast delivered
#[tokio::test]
async fn test_success_envelope_is_delivered() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(BROADCAST_DIRECT_PATH))
        .and(header("Authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "to_number": "6281234567890",
            "message_template_id": "tpl-join",
            "channel_integration_id": "channel-1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(broadcast_success_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = provider_client(&server)?;
    let outcome = client.send_broadcast(&sample_request()).await;

    assert_eq!(outcome, DispatchOutcome::Delivered);

    Ok(())
}

/// Test: An error envelope on a 2xx reply is a rejection, not a delivery
#[tokio::test]
async fn test_error_envelope_on_ok_status_is_rejected() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(BROADCAST_DIRECT_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(rejection_body(40001, "Invalid phone number")),
        )
        .mount(&server)
        .await;

    let client = provider_client(&server)?;
    let outcome = client.send_broadcast(&sample_request()).await;

    match outcome {
        DispatchOutcome::Rejected(error) => {
            assert_eq!(error.code, Some(40001));
            assert_eq!(error.messages.len(), 1);
        }
        other => panic!("Expected rejection, got {}", other),
    }

    Ok(())
}

/// Test: A structured 401 reply is a rejection
#[tokio::test]
async fn test_unauthorized_reply_is_rejected() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(BROADCAST_DIRECT_PATH))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(rejection_body(401, "Token expired")),
        )
        .mount(&server)
        .await;

    let client = provider_client(&server)?;
    let outcome = client.send_broadcast(&sample_request()).await;

    match outcome {
        DispatchOutcome::Rejected(error) => assert_eq!(error.code, Some(401)),
        other => panic!("Expected rejection, got {}", other),
    }

    Ok(())
}

/// Test: A structured 422 reply is a rejection
#[tokio::test]
async fn test_unprocessable_reply_is_rejected() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(BROADCAST_DIRECT_PATH))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(rejection_body(422, "Template not found")),
        )
        .mount(&server)
        .await;

    let client = provider_client(&server)?;
    let outcome = client.send_broadcast(&sample_request()).await;

    match outcome {
        DispatchOutcome::Rejected(error) => assert_eq!(error.code, Some(422)),
        other => panic!("Expected rejection, got {}", other),
    }

    Ok(())
}

/// Test: Unexpected statuses leave the delivery outcome unknown
#[tokio::test]
async fn test_server_error_status_is_unknown() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(BROADCAST_DIRECT_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let client = provider_client(&server)?;
    let outcome = client.send_broadcast(&sample_request()).await;

    match outcome {
        DispatchOutcome::Unknown(reason) => {
            assert!(reason.contains("Unexpected status 500"), "reason: {}", reason);
        }
        other => panic!("Expected unknown outcome, got {}", other),
    }

    Ok(())
}

/// Test: An unparseable 2xx body leaves the delivery outcome unknown
#[tokio::test]
async fn test_unparseable_success_body_is_unknown() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(BROADCAST_DIRECT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let client = provider_client(&server)?;
    let outcome = client.send_broadcast(&sample_request()).await;

    match outcome {
        DispatchOutcome::Unknown(reason) => {
            assert!(reason.contains("Unparseable"), "reason: {}", reason);
        }
        other => panic!("Expected unknown outcome, got {}", other),
    }

    Ok(())
}

/// Test: An empty 2xx body leaves the delivery outcome unknown
#[tokio::test]
async fn test_empty_success_body_is_unknown() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(BROADCAST_DIRECT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = provider_client(&server)?;
    let outcome = client.send_broadcast(&sample_request()).await;

    assert!(
        matches!(outcome, DispatchOutcome::Unknown(_)),
        "Expected unknown outcome, got {}",
        outcome
    );

    Ok(())
}

/// Test: A timed-out request leaves the delivery outcome unknown
#[tokio::test]
async fn test_timeout_is_unknown() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(BROADCAST_DIRECT_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(broadcast_success_body())
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    let token = SharedAccessToken::new();
    token.set("test-token".to_string());
    let client = QontakClient::new(server.uri(), Duration::from_millis(200), token)?;

    let outcome = client.send_broadcast(&sample_request()).await;

    match outcome {
        DispatchOutcome::Unknown(reason) => {
            assert!(reason.contains("timed out"), "reason: {}", reason);
        }
        other => panic!("Expected unknown outcome, got {}", other),
    }

    Ok(())
}

/// Test: A successful upload returns the hosted file reference
#[tokio::test]
async fn test_upload_success_returns_hosted_url() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FILE_UPLOAD_PATH))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(upload_success_body("https://cdn.test/gap-care.png")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = provider_client(&server)?;
    let outcome = client.upload_file("gap-care.png", vec![137, 80, 78, 71]).await;

    match outcome {
        ProviderOutcome::Success(Some(file)) => {
            assert_eq!(file.url, "https://cdn.test/gap-care.png");
        }
        ProviderOutcome::Success(None) => panic!("Upload reply carried no file"),
        ProviderOutcome::Rejected(error) => panic!("Upload rejected: {}", error),
        ProviderOutcome::Unknown(reason) => panic!("Upload outcome unknown: {}", reason),
    }

    Ok(())
}

/// Test: Uploads share the rejection classification of broadcasts
#[tokio::test]
async fn test_upload_rejection_is_surfaced() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FILE_UPLOAD_PATH))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(rejection_body(422, "File too large")),
        )
        .mount(&server)
        .await;

    let client = provider_client(&server)?;
    let outcome = client.upload_file("gap-care.png", vec![0u8; 16]).await;

    assert!(
        matches!(outcome, ProviderOutcome::Rejected(_)),
        "Expected upload rejection"
    );

    Ok(())
}

fn sample_request() -> BroadcastRequest {
    let mut parameters = Parameters::default();
    parameters.push_body("full_name", "Siti Rahayu");
    parameters.push_body("dho", "Dinas Kesehatan Kota Test");

    BroadcastRequest {
        to_name: "Siti Rahayu".to_string(),
        to_number: "6281234567890".to_string(),
        message_template_id: "tpl-join".to_string(),
        channel_integration_id: "channel-1".to_string(),
        parameters,
    }
}
