//! Notification dispatcher with pluggable delivery transports.
//!
//! One polymorphic interface covers both real push delivery and the
//! persisted-record fallback used when no transport is configured; callers
//! treat them as equivalent. Every dispatch writes a durable insight record
//! regardless of transport outcome.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};
use uuid::Uuid;

use stash_core::{
    defaults, BatchDispatch, DeviceRegistration, DeviceRepository, DispatchResult, Error,
    InsightRepository, NotificationPayload, Result,
};

/// A concrete push delivery backend.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Deliver to one device registration, returning a transport message id.
    ///
    /// A revoked registration must surface as [`Error::StaleRegistration`]
    /// so the dispatcher can remove it.
    async fn deliver(
        &self,
        registration: &DeviceRegistration,
        payload: &NotificationPayload,
    ) -> Result<String>;

    /// Human-readable transport name.
    fn name(&self) -> &str;
}

/// HTTP push transport posting to a delivery gateway.
pub struct PushTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl PushTransport {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(defaults::PUSH_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            endpoint,
            api_key,
        }
    }

    /// Create from `STASH_PUSH_ENDPOINT` / `STASH_PUSH_KEY`.
    /// Returns None when no endpoint is configured (persisted-record mode).
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("STASH_PUSH_ENDPOINT").ok()?;
        if endpoint.is_empty() {
            return None;
        }
        let api_key = std::env::var("STASH_PUSH_KEY").ok();
        Some(Self::new(endpoint, api_key))
    }
}

#[async_trait]
impl NotificationTransport for PushTransport {
    async fn deliver(
        &self,
        registration: &DeviceRegistration,
        payload: &NotificationPayload,
    ) -> Result<String> {
        let body = serde_json::json!({
            "token": registration.token,
            "platform": registration.platform,
            "title": payload.title,
            "body": payload.body,
            "action": payload.action,
            "data": payload.data,
            "priority": payload.priority,
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Notification(format!("Push request failed: {e}")))?;

        let status = response.status();
        // 404/410 from the gateway mean the registration was revoked
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Err(Error::StaleRegistration(registration.token.clone()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Notification(format!(
                "Push gateway returned {status}: {body}"
            )));
        }

        let message_id = response
            .json::<JsonValue>()
            .await
            .ok()
            .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(String::from))
            .unwrap_or_else(|| stash_core::new_v7().to_string());

        Ok(message_id)
    }

    fn name(&self) -> &str {
        "push"
    }
}

/// Notification dispatcher.
pub struct NotificationDispatcher {
    devices: Arc<dyn DeviceRepository>,
    insights: Arc<dyn InsightRepository>,
    transport: Option<Arc<dyn NotificationTransport>>,
}

impl NotificationDispatcher {
    pub fn new(
        devices: Arc<dyn DeviceRepository>,
        insights: Arc<dyn InsightRepository>,
        transport: Option<Arc<dyn NotificationTransport>>,
    ) -> Self {
        match &transport {
            Some(t) => info!(
                subsystem = "notify",
                transport = t.name(),
                "Notification dispatcher using push transport"
            ),
            None => info!(
                subsystem = "notify",
                "No push transport configured; notifications persist as insight records"
            ),
        }
        Self {
            devices,
            insights,
            transport,
        }
    }

    /// Dispatch one notification to a user.
    ///
    /// Always writes the durable insight record first. With no transport
    /// configured the record itself is the delivery; with a transport, every
    /// registered device is attempted, stale registrations are removed, and
    /// one successful delivery makes the dispatch a success.
    pub async fn send(&self, user_id: Uuid, payload: &NotificationPayload) -> Result<DispatchResult> {
        let insight_id = self
            .insights
            .insert(
                user_id,
                "notification",
                &payload.title,
                &payload.body,
                payload.data.clone().unwrap_or_else(|| serde_json::json!({})),
            )
            .await?;

        let Some(transport) = &self.transport else {
            return Ok(DispatchResult::delivered(insight_id.to_string()));
        };

        let registrations = self.devices.list_for_user(user_id).await?;
        if registrations.is_empty() {
            debug!(
                subsystem = "notify",
                user_id = %user_id,
                "No delivery target for user"
            );
            return Ok(DispatchResult::undelivered("no_delivery_target"));
        }

        let mut message_id: Option<String> = None;
        for registration in &registrations {
            match transport.deliver(registration, payload).await {
                Ok(id) => {
                    message_id.get_or_insert(id);
                }
                Err(Error::StaleRegistration(token)) => {
                    // Remove so future dispatches do not repeat the failure
                    warn!(
                        subsystem = "notify",
                        user_id = %user_id,
                        token = %token,
                        "Removing stale device registration"
                    );
                    if let Err(e) = self.devices.remove(registration.id).await {
                        warn!(
                            subsystem = "notify",
                            error = %e,
                            "Failed to remove stale registration"
                        );
                    }
                }
                Err(e) => {
                    warn!(
                        subsystem = "notify",
                        user_id = %user_id,
                        transport = transport.name(),
                        error = %e,
                        "Delivery attempt failed"
                    );
                }
            }
        }

        Ok(match message_id {
            Some(id) => DispatchResult::delivered(id),
            None => DispatchResult::undelivered("delivery_failed"),
        })
    }

    /// Persist a durable calendar-event record for the external calendar
    /// sync service to consume. Keyed metadata makes re-recording the same
    /// event on a retried attempt observable to the consumer.
    pub async fn record_calendar_event(
        &self,
        user_id: Uuid,
        capture_id: Uuid,
        title: &str,
        when: Option<&str>,
    ) -> Result<Uuid> {
        self.insights
            .insert(
                user_id,
                "calendar_event",
                title,
                when.unwrap_or(""),
                serde_json::json!({ "capture_id": capture_id, "when": when }),
            )
            .await
    }

    /// Dispatch to many users, independently per recipient.
    ///
    /// One recipient's failure never aborts the others; the aggregate
    /// success/failure counts are returned.
    pub async fn send_to_many(
        &self,
        user_ids: &[Uuid],
        payload: &NotificationPayload,
    ) -> BatchDispatch {
        let mut batch = BatchDispatch::default();
        for user_id in user_ids {
            match self.send(*user_id, payload).await {
                Ok(result) if result.success => batch.sent += 1,
                Ok(_) => batch.failed += 1,
                Err(e) => {
                    warn!(
                        subsystem = "notify",
                        user_id = %user_id,
                        error = %e,
                        "Batch dispatch failed for recipient"
                    );
                    batch.failed += 1;
                }
            }
        }
        batch
    }
}
