use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The six-field price analysis the model is instructed to return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AnalysisResult {
    pub product_name: String,
    pub current_price: String,
    #[serde(rename = "withoutEUPrice")]
    pub without_eu_price: String,
    pub price_increase: String,
    pub explanation: String,
    #[serde(rename = "madeInEU")]
    pub made_in_eu: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplyError {
    #[error("reply is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("reply is JSON but not an object")]
    NotAnObject,
    #[error("reply does not match the analysis shape: {0}")]
    Shape(#[source] serde_json::Error),
}

/// A validated model reply. `raw` is forwarded to the caller untouched.
#[derive(Debug, Clone)]
pub struct AnalysisReply {
    pub raw: String,
    pub result: AnalysisResult,
}

impl AnalysisReply {
    pub fn parse(raw: String) -> Result<Self, ReplyError> {
        let value: Value = serde_json::from_str(&raw).map_err(ReplyError::InvalidJson)?;
        if !value.is_object() {
            return Err(ReplyError::NotAnObject);
        }
        let result = AnalysisResult::deserialize(&value).map_err(ReplyError::Shape)?;
        Ok(Self { raw, result })
    }
}
