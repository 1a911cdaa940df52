//! Gemini caption provider using the generateContent API.
//!
//! Sends image + prompt as inline base64 data and asks for a JSON answer.
//! Responses are defensively unfenced (models like to wrap JSON in
//! markdown code blocks) before parsing.

use super::provider::{
    normalize_tags, CaptionProvider, ImageInput, FALLBACK_DESCRIPTION, MAX_RANK_RESULTS,
};
use crate::error::PipelineError;
use crate::types::{Caption, ImageSummary};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANALYZE_PROMPT: &str = "用简体中文分析这张图片。返回一个JSON对象，\
包含两个字段：description（一句话描述图片内容）和 tags（恰好4个简短的中文标签）。\
只返回JSON，不要其他内容。";

/// Gemini provider.
pub struct GeminiProvider {
    endpoint: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl GeminiProvider {
    pub fn new(endpoint: &str, api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
            timeout,
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint, self.model, self.api_key
        )
    }

    async fn generate(&self, parts: Vec<Part>) -> Result<String, PipelineError> {
        let body = GenerateRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                temperature: 0.3,
                max_output_tokens: 500,
            },
        };

        let resp = self
            .client
            .post(self.url())
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Caption {
                message: format!("Gemini request failed: {e}"),
                status_code: None,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Caption {
                message: format!("Gemini HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }

        let parsed: GenerateResponse = resp.json().await.map_err(|e| PipelineError::Caption {
            message: format!("Failed to parse Gemini response: {e}"),
            status_code: None,
        })?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(PipelineError::Caption {
                message: "Gemini returned empty response".to_string(),
                status_code: None,
            });
        }
        Ok(text)
    }
}

// --- Request types ---

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

// --- Response types ---

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnalyzeAnswer {
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct RankAnswer {
    #[serde(default)]
    image_ids: Vec<u64>,
}

/// Strip markdown code fences so the body parses as bare JSON.
fn unfence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

#[async_trait]
impl CaptionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn analyze(&self, image: &ImageInput) -> Result<Caption, PipelineError> {
        let parts = vec![
            Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: image.media_type.clone(),
                    data: image.data.clone(),
                }),
            },
            Part {
                text: Some(ANALYZE_PROMPT.to_string()),
                inline_data: None,
            },
        ];

        let text = self.generate(parts).await?;
        let answer: AnalyzeAnswer =
            serde_json::from_str(unfence(&text)).map_err(|e| PipelineError::Caption {
                message: format!("Gemini answer was not the expected JSON: {e}"),
                status_code: None,
            })?;

        let description = if answer.description.trim().is_empty() {
            FALLBACK_DESCRIPTION.to_string()
        } else {
            answer.description.trim().to_string()
        };

        Ok(Caption {
            description,
            tags: normalize_tags(answer.tags),
        })
    }

    async fn rank(
        &self,
        query: &str,
        images: &[ImageSummary],
    ) -> Result<Vec<u64>, PipelineError> {
        if images.is_empty() {
            return Ok(vec![]);
        }

        let catalog = serde_json::to_string(images).map_err(|e| PipelineError::Caption {
            message: format!("Failed to serialize image summaries: {e}"),
            status_code: None,
        })?;
        let prompt = format!(
            "根据查询从下面的图片列表中选出最相关的图片（最多{}张）。\
             返回JSON对象，字段 image_ids 为按相关性排序的id数组。只返回JSON。\n\
             查询: {}\n图片列表: {}",
            MAX_RANK_RESULTS, query, catalog
        );

        let text = self
            .generate(vec![Part {
                text: Some(prompt),
                inline_data: None,
            }])
            .await?;
        let answer: RankAnswer =
            serde_json::from_str(unfence(&text)).map_err(|e| PipelineError::Caption {
                message: format!("Gemini answer was not the expected JSON: {e}"),
                status_code: None,
            })?;

        // Keep only ids that exist, best first, capped.
        let mut ids = Vec::new();
        for id in answer.image_ids {
            if images.iter().any(|img| img.id == id) && !ids.contains(&id) {
                ids.push(id);
            }
            if ids.len() == MAX_RANK_RESULTS {
                break;
            }
        }
        Ok(ids)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
