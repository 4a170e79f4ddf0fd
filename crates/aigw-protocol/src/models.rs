use serde::{Deserialize, Serialize};

use crate::embeddings::ListObjectType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub object: ListObjectType,
    pub data: Vec<ModelInfo>,
}

impl ModelsResponse {
    pub fn find(&self, model_id: &str) -> Option<&ModelInfo> {
        self.data.iter().find(|model| model.id == model_id)
    }
}
