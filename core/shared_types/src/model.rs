use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Computation {
    pub name: String,
    pub formula: String,
    pub inputs: Value,
    pub result: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UiBlockType {
    Table,
    Text,
    Chart,
    KpiCard,
    Equation,
    PieChart,
    BarChart,
    LineChart,
    Timeline,
    Alert,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UiBlock {
    #[serde(rename = "type")]
    pub block_type: UiBlockType,
    pub title: String,
    pub data: Value,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NextDataRequest {
    pub reason: String,
    pub desired_slice: String,
}

/// The modeling engine's output: a sanitized markdown answer plus structured
/// support for rendering and follow-up.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ModelResponse {
    pub answer_markdown: String,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub computations: Vec<Computation>,
    #[serde(default)]
    pub ui_blocks: Vec<UiBlock>,
    #[serde(default)]
    pub next_data_requests: Vec<NextDataRequest>,
}
