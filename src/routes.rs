//! HTTP router.
//!
//! Routes are split into two groups that are merged into one router:
//! - public: pages, health, Stripe webhook, sign-up/login flows and catalog
//!   reads
//! - authenticated: everything else, behind `auth_middleware`
//!
//! The same path may appear in both groups with different methods
//! (`GET /bills` is public, `POST /bills` is not).

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, patch, post},
};
use tower_http::trace::TraceLayer;

use crate::{handlers, middleware::auth::auth_middleware, state::AppState};

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(handlers::pages::root))
        .route("/health", get(handlers::health::health_check))
        .route("/payment-success", get(handlers::pages::payment_success))
        .route("/payment-cancel", get(handlers::pages::payment_cancel))
        .route("/stripe-webhook", post(handlers::webhooks::stripe_webhook))
        // Account flows
        .route("/users/register", post(handlers::users::register))
        .route("/users/verify-email", post(handlers::users::verify_email))
        .route("/users/login", post(handlers::users::login))
        .route(
            "/users/request-password-reset",
            post(handlers::users::request_password_reset),
        )
        .route(
            "/users/reset-password",
            post(handlers::users::reset_password),
        )
        // Catalog reads
        .route("/bills", get(handlers::bills::list_bills))
        .route("/bills/{id}", get(handlers::bills::get_bill))
        .route("/politicians", get(handlers::politicians::list_politicians))
        .route(
            "/politicians/{id}",
            get(handlers::politicians::get_politician),
        );

    let authenticated_routes = Router::new()
        // Users
        .route("/users/logout", post(handlers::users::logout))
        .route(
            "/users/me",
            get(handlers::users::get_me).patch(handlers::users::update_me),
        )
        .route("/users", get(handlers::users::list_users))
        .route("/users/{id}", patch(handlers::users::update_user))
        // Catalog writes
        .route("/bills", post(handlers::bills::create_bill))
        .route(
            "/bills/{id}",
            patch(handlers::bills::update_bill)
                .delete(handlers::bills::delete_bill),
        )
        .route(
            "/politicians",
            post(handlers::politicians::create_politician),
        )
        .route(
            "/politicians/{id}",
            patch(handlers::politicians::update_politician)
                .delete(handlers::politicians::delete_politician),
        )
        .route(
            "/global-return-address",
            get(handlers::return_address::get_return_address)
                .post(handlers::return_address::create_return_address)
                .patch(handlers::return_address::update_return_address)
                .delete(handlers::return_address::delete_return_address),
        )
        // Letters
        .route(
            "/letter-requests",
            get(handlers::letter_requests::list_letter_requests)
                .post(handlers::letter_requests::create_letter_request),
        )
        .route(
            "/letter-requests/{id}",
            get(handlers::letter_requests::get_letter_request)
                .patch(handlers::letter_requests::update_letter_request)
                .delete(handlers::letter_requests::delete_letter_request),
        )
        .route(
            "/letter-requests/{id}/draft",
            post(handlers::letter_requests::draft_letter_request),
        )
        .route(
            "/letter-requests/{id}/pay",
            post(handlers::letter_requests::pay_for_letter),
        )
        .route(
            "/letter-requests/{id}/mail",
            post(handlers::letter_requests::mail_letter_request),
        )
        .route(
            "/letter-requests/{id}/mailing-transactions",
            get(handlers::letter_requests::list_mailing_transactions),
        )
        // Print queue
        .route(
            "/queued-letters",
            get(handlers::queued_letters::list_queued_letters)
                .post(handlers::queued_letters::create_queued_letter)
                .delete(handlers::queued_letters::clear_queue),
        )
        .route(
            "/queued-letters/{id}",
            get(handlers::queued_letters::get_queued_letter)
                .patch(handlers::queued_letters::update_queued_letter)
                .delete(handlers::queued_letters::delete_queued_letter),
        )
        .route(
            "/queued-letters/{id}/pdf",
            get(handlers::queued_letters::queued_letter_pdf),
        )
        .route(
            "/queued-letters/{id}/print",
            post(handlers::queued_letters::print_queued_letter),
        )
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::tests::test_config,
        error::IntegrationError,
        services::{
            drafting_service::LetterDrafter,
            email_service::EmailSender,
            mailing_service::{MailCarrier, OutboundLetter},
            payment_service::{CheckoutRequest, CheckoutSession, PaymentGateway},
            printing_service::PrintSpooler,
        },
        state::Integrations,
    };

    struct Offline;

    fn offline() -> IntegrationError {
        IntegrationError::InvalidResponse {
            service: "test",
            message: "offline".to_string(),
        }
    }

    #[async_trait]
    impl PaymentGateway for Offline {
        async fn create_checkout_session(
            &self,
            _request: &CheckoutRequest,
        ) -> Result<CheckoutSession, IntegrationError> {
            Err(offline())
        }
    }

    #[async_trait]
    impl MailCarrier for Offline {
        async fn send_letter(&self, _letter: &OutboundLetter) -> Result<Value, IntegrationError> {
            Err(offline())
        }
    }

    #[async_trait]
    impl LetterDrafter for Offline {
        async fn draft(&self, _prompt: &str) -> Result<String, IntegrationError> {
            Err(offline())
        }
    }

    #[async_trait]
    impl EmailSender for Offline {
        async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), IntegrationError> {
            Ok(())
        }
    }

    #[async_trait]
    impl PrintSpooler for Offline {
        async fn render_pdf(&self, _html: &str) -> Result<Vec<u8>, IntegrationError> {
            Err(offline())
        }

        async fn print_pdf(
            &self,
            _pdf: &[u8],
            _printer: &str,
            _title: &str,
        ) -> Result<String, IntegrationError> {
            Err(offline())
        }
    }

    fn test_router() -> Router {
        let config = test_config();
        // Never connects unless a handler touches the database.
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        let offline = Arc::new(Offline);
        let integrations = Integrations {
            payments: offline.clone(),
            carrier: offline.clone(),
            drafter: offline.clone(),
            email: offline.clone(),
            spooler: offline,
        };

        build_router(AppState::new(pool, config, integrations))
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn root_greets() {
        let response = test_router()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Hello from LetterLobby!");
    }

    #[tokio::test]
    async fn payment_success_page_names_the_letter() {
        let id = uuid::Uuid::new_v4();
        let response = test_router()
            .oneshot(
                Request::get(format!("/payment-success?letter_id={id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(
            body["message"],
            format!("Payment succeeded for letter_id: {id}")
        );
    }

    #[tokio::test]
    async fn payment_cancel_requires_letter_id() {
        let response = test_router()
            .oneshot(Request::get("/payment-cancel").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        for (method, uri) in [
            ("GET", "/letter-requests"),
            ("GET", "/users/me"),
            ("POST", "/bills"),
            ("DELETE", "/queued-letters"),
            ("GET", "/global-return-address"),
        ] {
            let response = test_router()
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri(uri)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn malformed_authorization_header_is_rejected() {
        let response = test_router()
            .oneshot(
                Request::get("/letter-requests")
                    .header("Authorization", "Basic abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn webhook_rejects_missing_signature() {
        let response = test_router()
            .oneshot(
                Request::post("/stripe-webhook")
                    .body(Body::from(r#"{"id":"evt_1","type":"ping","data":{"object":{}}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["message"], "Invalid signature");
    }

    #[tokio::test]
    async fn webhook_rejects_forged_signature() {
        let now = chrono::Utc::now().timestamp();
        let response = test_router()
            .oneshot(
                Request::post("/stripe-webhook")
                    .header("Stripe-Signature", format!("t={now},v1=deadbeef"))
                    .body(Body::from(r#"{"id":"evt_1","type":"ping","data":{"object":{}}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_acknowledges_unrelated_events() {
        let payload = r#"{"id":"evt_1","type":"customer.created","data":{"object":{}}}"#;
        let now = chrono::Utc::now().timestamp();
        let signature = crate::services::webhook_service::sign_payload(
            "whsec_test",
            now,
            payload.as_bytes(),
        )
        .unwrap();

        let response = test_router()
            .oneshot(
                Request::post("/stripe-webhook")
                    .header("Stripe-Signature", format!("t={now},v1={signature}"))
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "success");
    }
}
