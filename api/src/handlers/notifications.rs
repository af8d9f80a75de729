use axum::extract::State;
use axum::response::IntoResponse;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use common::errors::NotificationError;
use common::report;

use super::{ErrorResponse, SuccessResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TestNotificationRequest {
    pub recipient: String,
}

#[derive(Debug, Serialize)]
pub struct TestNotificationResult {
    pub recipient: String,
    pub status: &'static str,
}

/// Send a plain test email to verify the SMTP configuration
#[tracing::instrument(skip(state, request), fields(recipient = %request.recipient))]
pub async fn send_test_notification(
    State(state): State<AppState>,
    axum::Json(request): axum::Json<TestNotificationRequest>,
) -> impl IntoResponse {
    let message = report::test_message(Utc::now());
    let recipients = vec![request.recipient.clone()];

    match state.mailer.send(&recipients, &message).await {
        Ok(()) => SuccessResponse::new(TestNotificationResult {
            recipient: request.recipient,
            status: "sent",
        })
        .into_response(),
        Err(NotificationError::InvalidAddress(addr)) => {
            ErrorResponse::new("validation_error", format!("Invalid address: {}", addr))
                .into_response()
        }
        Err(NotificationError::NoRecipients) => {
            ErrorResponse::new("validation_error", "No recipients given").into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Test notification failed");
            ErrorResponse::new("service_unavailable", "Mail transport unavailable")
                .into_response()
        }
    }
}
