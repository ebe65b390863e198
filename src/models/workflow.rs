use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Webhook,
    Schedule,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum InputSource {
    Trigger,
    Previous,
    Step { index: usize },
}

impl InputSource {
    /// Parses the wire form `"trigger"`, `"previous"` or `"step:<n>"`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "trigger" => Some(InputSource::Trigger),
            "previous" => Some(InputSource::Previous),
            other => other
                .strip_prefix("step:")
                .and_then(|n| n.parse::<usize>().ok())
                .map(|index| InputSource::Step { index }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainedAction {
    pub action_kind: String,
    pub config: Value,
    pub input_source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Workflow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub trigger_kind: TriggerKind,
    pub action_kind: String,
    pub config: Value,
    /// Empty array when the workflow has no chained steps beyond the primary.
    pub action_chain: Value,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_executed_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Workflow {
    pub fn action_chain_vec(&self) -> Vec<ChainedAction> {
        serde_json::from_value(self.action_chain.clone()).unwrap_or_default()
    }

    pub fn is_due(&self, interval_minutes: i64, now: OffsetDateTime) -> bool {
        match self.last_executed_at {
            None => true,
            Some(last) => (now - last) >= time::Duration::minutes(interval_minutes),
        }
    }
}
