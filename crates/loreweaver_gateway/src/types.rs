use loreweaver_core::CriticReport;
use serde::{Deserialize, Serialize};

/// Inbound generation request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateSceneRequest {
    pub project_id: String,
    pub user_prompt: String,
    /// Character ids to load into tier 1 context.
    #[serde(default)]
    pub active_characters: Vec<String>,
    pub location: String,
    /// Free-text character notes used when no stored characters match.
    #[serde(default)]
    pub characters_freetext: Option<String>,
}

/// Successful generation response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateSceneResponse {
    pub status: String,
    pub scene_id: String,
    pub sequence_index: i64,
    pub scene_text: String,
    pub critic_report: CriticReport,
}

/// Error response body. `report` carries the last critic verdict when
/// generation exhausted its retries; it is null for every other failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(default)]
    pub report: Option<CriticReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_tolerates_minimal_body() {
        let json = r#"{"project_id":"p1","user_prompt":"a storm hits","location":"the docks"}"#;
        let req: GenerateSceneRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.project_id, "p1");
        assert!(req.active_characters.is_empty());
        assert!(req.characters_freetext.is_none());
    }

    #[test]
    fn error_response_serializes_null_report() {
        let body = ErrorResponse {
            message: "Project not found".to_string(),
            report: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["report"], serde_json::Value::Null);
    }
}
