// Result payload shapes, per job kind

use serde::{Deserialize, Serialize};

/// Result of a `mission` job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionPlan {
    pub mission_title: String,
    pub introduction: String,
    pub topics: Vec<MissionTopic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionTopic {
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub images: Vec<TopicImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicImage {
    pub title: String,
    pub href: String,
}

/// Result of an `ask` job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskAnswer {
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenUsage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_ms: Option<u64>,
}

/// Strip one generic `{"result": ...}` wrapper, if present.
///
/// Workers may store the result either bare or wrapped once; only one level
/// is ever removed.
pub fn unwrap_result_envelope(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(mut map) if map.len() == 1 && map.contains_key("result") => {
            map.remove("result").unwrap_or(serde_json::Value::Null)
        }
        other => other,
    }
}
