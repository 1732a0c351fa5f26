use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("mail request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("mail provider returned {0}")]
    Status(u16),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_magic_link(&self, email: &str, link: &str) -> Result<(), MailerError>;
}

/// Logs the link instead of sending it. For local development only.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_magic_link(&self, email: &str, link: &str) -> Result<(), MailerError> {
        info!(%email, "Magic link: {}", link);
        Ok(())
    }
}

/// Sends mail through the Resend HTTP API.
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

impl ResendMailer {
    const ENDPOINT: &'static str = "https://api.resend.com/emails";

    pub fn new(api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send_magic_link(&self, email: &str, link: &str) -> Result<(), MailerError> {
        let body = json!({
            "from": self.from,
            "to": [email],
            "subject": "Your Tree of Hope sign-in link",
            "text": format!(
                "Use this link to sign in to Tree of Hope:\n\n{}\n\nIt expires shortly and can only be used once.",
                link
            ),
        });

        let resp = self
            .client
            .post(Self::ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(MailerError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}
