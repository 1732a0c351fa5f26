//! Product analytics.
//!
//! Handlers record events through [`AnalyticsSink`]. Capturing never blocks a
//! request and never fails it: the PostHog sink sends in a background task and
//! only logs delivery errors.

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

/// A named event attributed to one user (or `"anonymous"`).
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsEvent {
    pub name: &'static str,
    pub distinct_id: String,
    pub properties: Map<String, Value>,
}

impl AnalyticsEvent {
    pub fn new(name: &'static str, distinct_id: impl Into<String>) -> Self {
        Self {
            name,
            distinct_id: distinct_id.into(),
            properties: Map::new(),
        }
    }

    pub fn anonymous(name: &'static str) -> Self {
        Self::new(name, "anonymous")
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}

pub trait AnalyticsSink: Send + Sync {
    fn capture(&self, event: AnalyticsEvent);
}

/// Writes events to the log. Used when no PostHog key is configured.
pub struct TracingAnalytics;

impl AnalyticsSink for TracingAnalytics {
    fn capture(&self, event: AnalyticsEvent) {
        let properties = Value::Object(event.properties);
        debug!(
            event = event.name,
            distinct_id = %event.distinct_id,
            "analytics {}",
            properties,
        );
    }
}

pub struct PostHogSink {
    client: reqwest::Client,
    api_key: String,
    capture_url: String,
}

impl PostHogSink {
    pub fn new(api_key: String, host: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            capture_url: format!("{}/capture/", host.trim_end_matches('/')),
        }
    }

    fn payload(&self, event: AnalyticsEvent) -> Value {
        json!({
            "api_key": self.api_key,
            "event": event.name,
            "distinct_id": event.distinct_id,
            "properties": event.properties,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })
    }
}

impl AnalyticsSink for PostHogSink {
    fn capture(&self, event: AnalyticsEvent) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("Dropping analytics event {}: no runtime", event.name);
            return;
        };

        let name = event.name;
        let body = self.payload(event);
        let client = self.client.clone();
        let url = self.capture_url.clone();
        runtime.spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(resp) if !resp.status().is_success() => {
                    warn!("PostHog rejected {}: {}", name, resp.status());
                }
                Ok(_) => {}
                Err(e) => warn!("PostHog capture of {} failed: {}", name, e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_key_and_properties() {
        let sink = PostHogSink::new("phc_test".into(), "https://eu.posthog.com/");
        assert_eq!(sink.capture_url, "https://eu.posthog.com/capture/");

        let event = AnalyticsEvent::new("leaf_created", "user-1").with("campaign_id", "c1");
        let body = sink.payload(event);
        assert_eq!(body["api_key"], "phc_test");
        assert_eq!(body["event"], "leaf_created");
        assert_eq!(body["distinct_id"], "user-1");
        assert_eq!(body["properties"]["campaign_id"], "c1");
    }

    #[test]
    fn tracing_sink_logs_nested_properties() {
        let event = AnalyticsEvent::anonymous("leaf_created")
            .with("campaign_id", "c1")
            .with("tags", json!(["a", "b"]));
        TracingAnalytics.capture(event);
    }
}
