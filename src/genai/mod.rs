//! 생성 모델 모듈 - Gemini 대화/도구 호출 래퍼
//!
//! 턴 기반 대화와 선택적 함수(도구) 호출을 지원하는
//! Gemini generateContent API 래퍼입니다.
//! 호출 전에 히스토리는 항상 role/parts 시퀀스로 정규화되어야 합니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Gemini 생성 모델 이름
const GEMINI_CHAT_MODEL: &str = "gemini-1.5-flash";

/// generateContent 엔드포인트
/// source: https://ai.google.dev/gemini-api/docs
fn generate_url(model: &str) -> String {
    format!(
        "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
        model
    )
}

// ============================================================================
// Wire Types
// ============================================================================

/// 대화 턴 (wire 형식)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    /// user 역할 텍스트 턴
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part::text(text)],
        }
    }

    /// model 역할 텍스트 턴
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: "model".to_string(),
            parts: vec![Part::text(text)],
        }
    }

    /// 모델의 도구 호출 턴 (도구 결과를 돌려보낼 때 히스토리에 포함)
    pub fn model_function_call(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            role: "model".to_string(),
            parts: vec![Part {
                text: None,
                function_call: Some(FunctionCall {
                    name: name.into(),
                    args,
                }),
                function_response: None,
            }],
        }
    }

    /// 도구 실행 결과 턴
    pub fn function_response(name: impl Into<String>, result_text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part {
                text: None,
                function_call: None,
                function_response: Some(FunctionResponse {
                    name: name.into(),
                    response: serde_json::json!({ "content": result_text.into() }),
                }),
            }],
        }
    }
}

/// 턴의 단일 파트 - 텍스트, 도구 호출, 도구 결과 중 하나
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "functionCall", skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(rename = "functionResponse", skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

impl Part {
    /// 텍스트 파트 생성
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            function_call: None,
            function_response: None,
        }
    }
}

/// 모델이 요청한 함수 호출
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// 함수 실행 결과 (모델에 돌려보냄)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionResponse {
    pub name: String,
    pub response: serde_json::Value,
}

/// 도구(함수) 선언
#[derive(Debug, Clone, Serialize)]
pub struct FunctionDecl {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// 모델 응답 - 일반 텍스트 또는 도구 호출 요청
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    /// 일반 답변 텍스트
    Text(String),
    /// 도구 호출 요청 (이름 + 인자)
    ToolCall {
        name: String,
        args: serde_json::Value,
    },
}

// ============================================================================
// ChatModel Trait
// ============================================================================

/// 대화형 생성 모델 트레이트
///
/// 오케스트레이터/파이프라인에 명시적으로 주입되는 서비스 핸들입니다.
/// 전역 싱글톤이 아니므로 테스트에서 목으로 대체할 수 있습니다.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// 단발 생성 - 히스토리/도구 없이 프롬프트 하나로 텍스트 생성
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// 대화 생성 - 정규화된 히스토리 전체를 보내고 응답을 받음
    ///
    /// `tools`가 비어 있지 않으면 도구가 선언되고, 모델이 자율적으로
    /// 호출 여부를 결정합니다 (AUTO). 비어 있으면 일반 생성 모드입니다.
    async fn send(&self, history: &[Content], tools: &[FunctionDecl]) -> Result<ModelReply>;
}

// ============================================================================
// Gemini Implementation
// ============================================================================

/// Gemini generateContent 클라이언트
#[derive(Debug)]
pub struct GeminiChat {
    api_key: String,
    client: reqwest::Client,
    model: String,
}

impl GeminiChat {
    /// 새 클라이언트 생성
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            client,
            model: GEMINI_CHAT_MODEL.to_string(),
        })
    }

    /// 환경변수에서 API 키를 읽어 생성
    pub fn from_env() -> Result<Self> {
        let api_key = crate::embedding::get_api_key()?;
        Self::new(api_key)
    }

    async fn post_generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let response = self
            .client
            .post(generate_url(&self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .context("Failed to send generateContent request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            anyhow::bail!("Gemini API error ({}): {}", status, body);
        }

        serde_json::from_str(&body).context("Failed to parse generateContent response")
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDecl>>,
    #[serde(rename = "toolConfig", skip_serializing_if = "Option::is_none")]
    tool_config: Option<ToolConfig>,
}

#[derive(Debug, Serialize)]
struct ToolDecl {
    #[serde(rename = "functionDeclarations")]
    function_declarations: Vec<FunctionDecl>,
}

#[derive(Debug, Serialize)]
struct ToolConfig {
    #[serde(rename = "functionCallingConfig")]
    function_calling_config: FunctionCallingConfig,
}

#[derive(Debug, Serialize)]
struct FunctionCallingConfig {
    mode: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

/// 응답 후보를 ModelReply로 변환
///
/// functionCall 파트가 하나라도 있으면 도구 호출로 취급하고,
/// 아니면 텍스트 파트를 이어 붙입니다.
fn reply_from_response(response: GenerateResponse) -> Result<ModelReply> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Model returned no candidates"))?;

    for part in &candidate.content.parts {
        if let Some(call) = &part.function_call {
            return Ok(ModelReply::ToolCall {
                name: call.name.clone(),
                args: call.args.clone(),
            });
        }
    }

    let text: String = candidate
        .content
        .parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect::<Vec<_>>()
        .join("");

    if text.is_empty() {
        anyhow::bail!("Model returned an empty response");
    }

    Ok(ModelReply::Text(text))
}

#[async_trait]
impl ChatModel for GeminiChat {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content::user(prompt)],
            tools: None,
            tool_config: None,
        };

        let response = self.post_generate(&request).await?;

        match reply_from_response(response)? {
            ModelReply::Text(text) => Ok(text),
            ModelReply::ToolCall { name, .. } => {
                // 도구를 선언하지 않았는데 호출이 오는 경우는 프로토콜 위반
                anyhow::bail!("Unexpected tool call '{}' in plain generation", name)
            }
        }
    }

    async fn send(&self, history: &[Content], tools: &[FunctionDecl]) -> Result<ModelReply> {
        let (tools_field, tool_config) = if tools.is_empty() {
            (None, None)
        } else {
            (
                Some(vec![ToolDecl {
                    function_declarations: tools.to_vec(),
                }]),
                Some(ToolConfig {
                    function_calling_config: FunctionCallingConfig {
                        mode: "AUTO".to_string(),
                    },
                }),
            )
        };

        let request = GenerateRequest {
            contents: history.to_vec(),
            tools: tools_field,
            tool_config,
        };

        let response = self.post_generate(&request).await?;
        reply_from_response(response)
    }
}

// ============================================================================
// Tests
// ============================================================================
