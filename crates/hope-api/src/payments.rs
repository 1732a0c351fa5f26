//! Recurring payments.
//!
//! [`PaymentsProvider`] is what the billing handlers call; [`StripeClient`]
//! implements it against the Stripe REST API using form-encoded requests.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentsError {
    #[error("payments provider is not configured")]
    NotConfigured,
    #[error("payments request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("payments provider returned {status}: {message}")]
    Api { status: u16, message: String },
}

/// Everything needed to open a subscription checkout for one commitment.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSessionRequest {
    pub commitment_id: String,
    pub campaign_id: String,
    pub campaign_name: String,
    pub tier: &'static str,
    pub tier_label: &'static str,
    pub amount_cents: i64,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait PaymentsProvider: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentsError>;

    /// Stops collecting payments, optionally until `resume_at` (unix seconds).
    async fn pause_subscription(
        &self,
        subscription_id: &str,
        resume_at: Option<i64>,
    ) -> Result<(), PaymentsError>;
}

/// Rejects every call. Used when no Stripe key is configured.
pub struct UnconfiguredPayments;

#[async_trait]
impl PaymentsProvider for UnconfiguredPayments {
    async fn create_checkout_session(
        &self,
        _request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentsError> {
        Err(PaymentsError::NotConfigured)
    }

    async fn pause_subscription(&self, _subscription_id: &str, _resume_at: Option<i64>) -> Result<(), PaymentsError> {
        Err(PaymentsError::NotConfigured)
    }
}

pub struct StripeClient {
    client: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl StripeClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.stripe.com";

    pub fn new(secret_key: String) -> Self {
        Self::with_base_url(secret_key, Self::DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(secret_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post_form(&self, path: &str, form: &[(String, String)]) -> Result<reqwest::Response, PaymentsError> {
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body: serde_json::Value = resp.json().await.unwrap_or_default();
        let message = body["error"]["message"]
            .as_str()
            .unwrap_or("no error message")
            .to_string();
        Err(PaymentsError::Api { status: status.as_u16(), message })
    }
}

/// Form fields for a monthly subscription checkout with inline price data.
pub fn checkout_form(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
    let mut form: Vec<(String, String)> = [
        ("mode", "subscription".to_string()),
        ("success_url", request.success_url.clone()),
        ("cancel_url", request.cancel_url.clone()),
        ("client_reference_id", request.commitment_id.clone()),
        ("line_items[0][quantity]", "1".to_string()),
        ("line_items[0][price_data][currency]", "usd".to_string()),
        ("line_items[0][price_data][unit_amount]", request.amount_cents.to_string()),
        ("line_items[0][price_data][recurring][interval]", "month".to_string()),
        (
            "line_items[0][price_data][product_data][name]",
            format!("{} support for {}", request.tier_label, request.campaign_name),
        ),
        ("metadata[commitment_id]", request.commitment_id.clone()),
        ("metadata[campaign_id]", request.campaign_id.clone()),
        ("metadata[tier]", request.tier.to_string()),
        ("subscription_data[metadata][commitment_id]", request.commitment_id.clone()),
        ("subscription_data[metadata][campaign_id]", request.campaign_id.clone()),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect();

    if let Some(email) = &request.customer_email {
        form.push(("customer_email".to_string(), email.clone()));
    }
    form
}

#[async_trait]
impl PaymentsProvider for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentsError> {
        let resp = self.post_form("/v1/checkout/sessions", &checkout_form(request)).await?;
        Ok(resp.json::<CheckoutSession>().await?)
    }

    async fn pause_subscription(&self, subscription_id: &str, resume_at: Option<i64>) -> Result<(), PaymentsError> {
        let mut form = vec![("pause_collection[behavior]".to_string(), "void".to_string())];
        if let Some(ts) = resume_at {
            form.push(("pause_collection[resumes_at]".to_string(), ts.to_string()));
        }
        self.post_form(&format!("/v1/subscriptions/{}", subscription_id), &form).await?;
        Ok(())
    }
}
