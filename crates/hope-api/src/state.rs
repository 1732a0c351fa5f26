use std::sync::Arc;

use tracing::error;

use hope_db::Database;

use crate::analytics::AnalyticsSink;
use crate::error::ApiError;
use crate::mailer::Mailer;
use crate::payments::PaymentsProvider;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub settings: Settings,
    pub payments: Arc<dyn PaymentsProvider>,
    pub analytics: Arc<dyn AnalyticsSink>,
    pub mailer: Arc<dyn Mailer>,
}

/// Runtime settings the handlers read. Built by the server from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub jwt_secret: String,
    /// Origin of the public site, used in magic links and checkout redirects.
    pub public_url: String,
    /// Lowercased addresses that sign in with the admin role.
    pub admin_emails: Vec<String>,
    pub session_ttl_days: i64,
    pub magic_link_ttl_minutes: i64,
    pub stripe_webhook_secret: Option<String>,
    pub secure_cookies: bool,
}

impl Settings {
    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|admin| *admin == email)
    }

    /// `public_url` joined with an absolute path.
    pub fn public_link(&self, path: &str) -> String {
        format!("{}{}", self.public_url.trim_end_matches('/'), path)
    }
}

/// Runs a database closure on the blocking pool.
///
/// Join failures and query errors are logged and surface as
/// [`ApiError::Internal`].
pub async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = state.clone();
    tokio::task::spawn_blocking(move || f(&db.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(|e| {
            error!("DB error: {:#}", e);
            ApiError::Internal
        })
}
