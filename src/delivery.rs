use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Certificate send progress of one participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Queued,
    Sent,
    Bounced,
    Failed,
    Pending,
}

impl DeliveryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryState::Queued => "queued",
            DeliveryState::Sent => "sent",
            DeliveryState::Bounced => "bounced",
            DeliveryState::Failed => "failed",
            DeliveryState::Pending => "pending",
        }
    }
}

/// Stored under `EventEye/deliveries/{event}/{participant}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStatus {
    pub status: DeliveryState,
    #[serde(default)]
    pub meta: Value,
    pub updated_at: i64,
}

/// Per-state counters shown on the dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStats {
    pub queued: usize,
    pub sent: usize,
    pub bounced: usize,
    pub failed: usize,
    pub pending: usize,
}

impl DeliveryStats {
    pub fn from_statuses(statuses: &HashMap<String, DeliveryStatus>) -> Self {
        let mut stats = DeliveryStats::default();
        for status in statuses.values() {
            match status.status {
                DeliveryState::Queued => stats.queued += 1,
                DeliveryState::Sent => stats.sent += 1,
                DeliveryState::Bounced => stats.bounced += 1,
                DeliveryState::Failed => stats.failed += 1,
                DeliveryState::Pending => stats.pending += 1,
            }
        }
        stats
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Whatsapp,
}

/// A send request pushed to `EventEye/queues/certificates/{event}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendJob {
    pub participant_id: String,
    pub channel: Channel,
    #[serde(default)]
    pub payload: Value,
    pub created_at: i64,
    pub status: DeliveryState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_count_every_state() {
        let mut statuses = HashMap::new();
        for (pid, state) in [
            ("a", DeliveryState::Sent),
            ("b", DeliveryState::Sent),
            ("c", DeliveryState::Failed),
            ("d", DeliveryState::Queued),
        ] {
            statuses.insert(
                pid.to_string(),
                DeliveryStatus {
                    status: state,
                    meta: Value::Null,
                    updated_at: 0,
                },
            );
        }

        let stats = DeliveryStats::from_statuses(&statuses);
        assert_eq!(stats.sent, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.bounced + stats.pending, 0);
    }

    #[test]
    fn state_serializes_lowercase() {
        let json = serde_json::to_string(&DeliveryState::Bounced).unwrap();
        assert_eq!(json, "\"bounced\"");
    }
}
