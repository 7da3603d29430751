use axum::http::StatusCode;
use axum::response::IntoResponse;
use darshan_api::error::AppError;
use darshan_api::middleware::auth::{has_permission, AdminClaims, PilgrimClaims};
use darshan_booking::BookingError;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

#[tokio::test]
async fn error_responses_carry_kind_and_message() {
    let response = AppError::SlotFull.into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let bytes = axum::body::to_bytes(response.into_body(), 1024)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["kind"], "SLOT_FULL");
    assert!(body["error"].as_str().unwrap().contains("fully booked"));
}

#[tokio::test]
async fn booking_errors_surface_as_structured_json() {
    let response =
        AppError::from(BookingError::InvalidRequest("party_size must be at least 1".into()))
            .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = axum::body::to_bytes(response.into_body(), 1024)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["kind"], "INVALID_REQUEST");
    assert_eq!(body["error"], "party_size must be at least 1");
}

#[tokio::test]
async fn internal_errors_do_not_leak_details() {
    let response = AppError::Internal(anyhow::anyhow!("connection refused to 10.0.0.5"))
        .into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = axum::body::to_bytes(response.into_body(), 1024)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "Internal Server Error");
}

#[test]
fn pilgrim_claims_round_trip_through_jwt() {
    let secret = b"test-secret";
    let claims = PilgrimClaims {
        sub: "guest-42".to_string(),
        role: "PILGRIM".to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .unwrap();

    let decoded = decode::<PilgrimClaims>(
        &token,
        &DecodingKey::from_secret(secret),
        &Validation::default(),
    )
    .unwrap();

    assert_eq!(decoded.claims.sub, "guest-42");
    assert_eq!(decoded.claims.role, "PILGRIM");
}

#[test]
fn admin_permissions_are_membership_checks() {
    let claims = AdminClaims {
        sub: "admin-1".to_string(),
        role: "ADMIN".to_string(),
        permissions: vec!["temples:write".to_string()],
        exp: 0,
    };
    assert!(has_permission(&claims, "temples:write"));
    assert!(!has_permission(&claims, "bookings:write"));
}
