use serde::{Deserialize, Serialize};

/// Inbound invocation event.
///
/// The wire shape is `{"taskName": "...", "config": {...}}`. `config` stays
/// untyped here; it becomes a `Config` only after the loader has accepted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    #[serde(rename = "taskName")]
    task_name: String,

    #[serde(default)]
    config: serde_json::Value,
}

impl TaskRequest {
    /// task 名と設定 payload から request を作る
    pub fn new(task_name: impl Into<String>, config: serde_json::Value) -> Self {
        Self {
            task_name: task_name.into(),
            config,
        }
    }

    /// 要求された task 名（未検証）
    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// 設定 payload
    pub fn config(&self) -> &serde_json::Value {
        &self.config
    }
}

/// 成功時に境界を越えて返す body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_camel_case_task_name() {
        let json = r#"{ "taskName": "fetch", "config": { "providers": ["aws"] } }"#;
        let req: TaskRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.task_name(), "fetch");
        assert_eq!(req.config()["providers"][0], "aws");
    }

    #[test]
    fn request_without_config_gets_null() {
        let req: TaskRequest = serde_json::from_str(r#"{ "taskName": "policy" }"#).unwrap();
        assert!(req.config().is_null());
    }
}
