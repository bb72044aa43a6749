use serde::{Deserialize, Serialize};

use crate::intent::{Entities, Intent};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MemoryRole {
    User,
    Assistant,
}

/// One turn of a session's conversation, persisted append-only.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MemoryRecord {
    pub session_id: String,
    pub turn_index: u32,
    pub role: MemoryRole,
    pub content: String,
    #[serde(default)]
    pub intent: Option<Intent>,
    #[serde(default)]
    pub entities: Option<Entities>,
    #[serde(default)]
    pub sql_executed: Option<String>,
    #[serde(default)]
    pub result_summary: Option<String>,
    #[serde(default)]
    pub execution_time_ms: Option<u64>,
    pub created_at: String,
}

/// A short-lived per-session context record, e.g. "last merchant discussed".
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ActiveContextRecord {
    pub session_id: String,
    pub context_type: String,
    pub value: String,
    pub relevance_score: f32,
    pub ttl_minutes: u32,
    pub created_at: String,
}
