//! Realtime notification fan-out.
//!
//! Events go through Redis pub/sub rather than an in-process connection map,
//! so any instance can deliver to a user connected to any other instance.
//! The WebSocket handler subscribes to the per-user channel; publishers
//! never learn or care who is connected.

use chrono::Utc;
use redis::AsyncCommands;
use serde_json::Value;
use uuid::Uuid;

#[derive(Clone)]
pub struct Notifier {
    redis: redis::Client,
}

impl Notifier {
    pub fn new(redis_url: &str) -> anyhow::Result<Self> {
        let redis = redis::Client::open(redis_url)?;
        Ok(Self { redis })
    }

    pub fn channel(user_id: Uuid) -> String {
        format!("notify:{}", user_id)
    }

    /// Best effort: notifications are UX, not correctness. A broker outage
    /// is logged and swallowed so it never surfaces into a payment path.
    pub async fn notify(&self, user_id: Uuid, event: &str, payload: Value) {
        let message = serde_json::json!({
            "event": event,
            "payload": payload,
            "sent_at": Utc::now(),
        })
        .to_string();

        match self.redis.get_multiplexed_async_connection().await {
            Ok(mut conn) => {
                if let Err(e) = conn.publish::<_, _, ()>(Self::channel(user_id), message).await {
                    tracing::warn!(user_id = %user_id, error = %e, "failed to publish notification");
                }
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "redis unavailable, dropping notification");
            }
        }
    }

    pub async fn subscribe(&self, user_id: Uuid) -> anyhow::Result<redis::aio::PubSub> {
        let conn = self.redis.get_async_connection().await?;
        let mut pubsub = conn.into_pubsub();
        pubsub.subscribe(Self::channel(user_id)).await?;
        Ok(pubsub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_is_scoped_per_user() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_ne!(Notifier::channel(a), Notifier::channel(b));
        assert!(Notifier::channel(a).starts_with("notify:"));
    }
}
