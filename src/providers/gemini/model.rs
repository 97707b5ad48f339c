use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{AppError, AppResult};

// Gemini image-generation wire types

#[derive(Serialize, Debug)]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
}

#[derive(Serialize, Debug)]
pub struct GeminiContent {
    pub role: String,
    pub parts: Vec<GeminiPart>,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum GeminiPart {
    Text { text: String },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InlineData {
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub data: String,
}

#[derive(Serialize, Debug)]
pub struct GenerationConfig {
    #[serde(rename = "responseModalities")]
    pub response_modalities: Vec<String>,
    #[serde(rename = "imageConfig")]
    pub image_config: ImageConfig,
}

#[derive(Serialize, Debug)]
pub struct ImageConfig {
    #[serde(rename = "aspectRatio")]
    pub aspect_ratio: String,
}

#[derive(Deserialize, Debug)]
pub struct ResponsePart {
    #[serde(default, rename = "inlineData")]
    pub inline_data: Option<InlineData>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ResponseContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<ResponseContent>,
    #[serde(default, rename = "finishReason")]
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct PromptFeedback {
    #[serde(default, rename = "blockReason")]
    pub block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum GeminiResponse {
    Candidates { candidates: Vec<GeminiCandidate> },
    Blocked {
        #[serde(rename = "promptFeedback")]
        prompt_feedback: PromptFeedback,
    },
    Unknown(Value),
}

/// Split a `data:<mime>;base64,<payload>` reference into inline data
pub fn parse_data_url(reference: &str) -> AppResult<InlineData> {
    let rest = reference
        .strip_prefix("data:")
        .ok_or_else(|| AppError::validation("Gemini references must be base64 data URLs"))?;
    let (meta, data) = rest
        .split_once(',')
        .ok_or_else(|| AppError::validation("Malformed data URL reference"))?;
    let mime_type = meta
        .strip_suffix(";base64")
        .ok_or_else(|| AppError::validation("Data URL references must be base64 encoded"))?;

    if mime_type.is_empty() || data.is_empty() {
        return Err(AppError::validation("Malformed data URL reference"));
    }

    Ok(InlineData {
        mime_type: mime_type.to_string(),
        data: data.to_string(),
    })
}

/// Collect every inline image as a data URL
pub fn extract_images(candidates: &[GeminiCandidate]) -> Vec<String> {
    candidates
        .iter()
        .filter_map(|candidate| candidate.content.as_ref())
        .flat_map(|content| content.parts.iter())
        .filter_map(|part| part.inline_data.as_ref())
        .map(|inline| format!("data:{};base64,{}", inline.mime_type, inline.data))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_data_url() {
        let inline = parse_data_url("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(inline.mime_type, "image/png");
        assert_eq!(inline.data, "iVBORw0KGgo=");

        assert!(parse_data_url("https://example.com/a.png").is_err());
        assert!(parse_data_url("data:image/png,raw").is_err());
        assert!(parse_data_url("data:;base64,").is_err());
    }

    #[test]
    fn test_extract_images_skips_text_parts() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "Here is your image"},
                    {"inlineData": {"mimeType": "image/png", "data": "AAAA"}}
                ]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();

        let GeminiResponse::Candidates { candidates } = response else {
            panic!("expected candidates");
        };
        assert_eq!(extract_images(&candidates), vec!["data:image/png;base64,AAAA".to_string()]);
    }

    #[test]
    fn test_blocked_prompt_shape() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        assert!(matches!(response, GeminiResponse::Blocked { .. }));
    }

    #[test]
    fn test_request_serialization() {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![
                    GeminiPart::Text { text: "a cat".to_string() },
                    GeminiPart::Inline {
                        inline_data: InlineData { mime_type: "image/jpeg".to_string(), data: "BBBB".to_string() },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE".to_string()],
                image_config: ImageConfig { aspect_ratio: "1:1".to_string() },
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "a cat");
        assert_eq!(value["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(value["generationConfig"]["imageConfig"]["aspectRatio"], "1:1");
    }
}
