//! In-process app with recording provider doubles, for handler tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use serde_json::Value;
use tower::ServiceExt;

use hope_db::Database;
use hope_types::models::{Campaign, CampaignStatus};

use crate::analytics::{AnalyticsEvent, AnalyticsSink};
use crate::auth::create_token;
use crate::mailer::{Mailer, MailerError};
use crate::payments::{CheckoutSession, CheckoutSessionRequest, PaymentsError, PaymentsProvider};
use crate::state::{AppState, AppStateInner, Settings};

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const WEBHOOK_SECRET: &str = "whsec_test";

#[derive(Default)]
pub struct RecordingPayments {
    pub fail: AtomicBool,
    checkouts: Mutex<Vec<CheckoutSessionRequest>>,
    pauses: Mutex<Vec<(String, Option<i64>)>>,
}

impl RecordingPayments {
    pub fn checkouts(&self) -> Vec<CheckoutSessionRequest> {
        self.checkouts.lock().unwrap().clone()
    }

    pub fn pauses(&self) -> Vec<(String, Option<i64>)> {
        self.pauses.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentsProvider for RecordingPayments {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentsError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PaymentsError::Api { status: 502, message: "down".into() });
        }
        let mut checkouts = self.checkouts.lock().unwrap();
        checkouts.push(request.clone());
        let id = format!("cs_test_{}", checkouts.len());
        Ok(CheckoutSession {
            url: format!("https://checkout.stripe.test/{}", id),
            id,
        })
    }

    async fn pause_subscription(&self, subscription_id: &str, resume_at: Option<i64>) -> Result<(), PaymentsError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PaymentsError::Api { status: 502, message: "down".into() });
        }
        self.pauses.lock().unwrap().push((subscription_id.to_string(), resume_at));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAnalytics {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl RecordingAnalytics {
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name).collect()
    }

    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl AnalyticsSink for RecordingAnalytics {
    fn capture(&self, event: AnalyticsEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub fail: AtomicBool,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMailer {
    /// `(recipient, link)` pairs in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_magic_link(&self, email: &str, link: &str) -> Result<(), MailerError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MailerError::Status(503));
        }
        self.sent.lock().unwrap().push((email.to_string(), link.to_string()));
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub payments: Arc<RecordingPayments>,
    pub analytics: Arc<RecordingAnalytics>,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_settings(|_| {})
    }

    /// Like [`TestApp::new`], with the default settings adjusted by `adjust`.
    pub fn with_settings(adjust: impl FnOnce(&mut Settings)) -> Self {
        let mut settings = Settings {
            jwt_secret: "test-secret".into(),
            public_url: "https://hope.test".into(),
            admin_emails: vec![ADMIN_EMAIL.into()],
            session_ttl_days: 30,
            magic_link_ttl_minutes: 15,
            stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
            secure_cookies: false,
        };
        adjust(&mut settings);

        let payments = Arc::new(RecordingPayments::default());
        let analytics = Arc::new(RecordingAnalytics::default());
        let mailer = Arc::new(RecordingMailer::default());

        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            settings,
            payments: payments.clone(),
            analytics: analytics.clone(),
            mailer: mailer.clone(),
        });

        Self {
            router: crate::router(state.clone()),
            state,
            payments,
            analytics,
            mailer,
        }
    }

    pub async fn call(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn raw(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.call(request).await
    }

    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.raw(method, uri, token, body).await;
        (response.status(), Self::json(response).await)
    }

    pub async fn json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub fn token_for(&self, email: &str) -> String {
        let admin = self.state.settings.is_admin_email(email);
        let user = self.state.db.find_or_create_user(email, admin).unwrap();
        create_token(&self.state.settings.jwt_secret, &user, 1).unwrap()
    }

    pub fn admin_token(&self) -> String {
        self.token_for(ADMIN_EMAIL)
    }

    pub fn member_token(&self, email: &str) -> String {
        self.token_for(email)
    }

    /// Creates a campaign through the admin API and returns it.
    pub async fn campaign(&self, slug: &str, status: CampaignStatus) -> Campaign {
        let (status_code, body) = self
            .send(
                Method::POST,
                "/api/admin/campaigns",
                Some(&self.admin_token()),
                Some(serde_json::json!({
                    "patient_name": "Jane Doe",
                    "slug": slug,
                    "status": status.as_str(),
                    "patient_email": "jane@example.com",
                    "monthly_goal_cents": 100_000,
                })),
            )
            .await;
        assert_eq!(status_code, StatusCode::CREATED, "{body}");
        serde_json::from_value(body["campaign"].clone()).unwrap()
    }
}
