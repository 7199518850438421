//! 에러 타입 정의
//!
//! 서비스 경계에서 사용하는 에러 분류입니다.
//! 내부 모듈은 anyhow를 사용하고, 오케스트레이터/파이프라인이
//! 이 분류로 변환하여 호출자에게 전달합니다.

use thiserror::Error;

/// 서비스 에러 분류
///
/// - `Extraction`: 문서에서 텍스트를 추출할 수 없음 (업로드 실패)
/// - `Embedding`/`Model`: 외부 백엔드 장애 (해당 턴 중단, 히스토리 미기록)
/// - `NotFound`: 문서 없음 또는 소유자 불일치 (404 상당)
/// - `UnknownTool`: 모델이 등록되지 않은 도구를 요청함
/// - `Storage`: 로컬 저장소 장애
#[derive(Debug, Error)]
pub enum ChatbotError {
    #[error("no text could be extracted from the document: {0}")]
    Extraction(String),

    #[error("embedding backend error: {0}")]
    Embedding(String),

    #[error("generative model error: {0}")]
    Model(String),

    #[error("document not found")]
    NotFound,

    #[error("model requested an unknown tool: {0}")]
    UnknownTool(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl ChatbotError {
    /// anyhow 에러를 Embedding 분류로 변환
    pub fn embedding(err: anyhow::Error) -> Self {
        Self::Embedding(format!("{:#}", err))
    }

    /// anyhow 에러를 Model 분류로 변환
    pub fn model(err: anyhow::Error) -> Self {
        Self::Model(format!("{:#}", err))
    }

    /// anyhow 에러를 Storage 분류로 변환
    pub fn storage(err: anyhow::Error) -> Self {
        Self::Storage(format!("{:#}", err))
    }
}

/// 서비스 결과 타입
pub type ServiceResult<T> = std::result::Result<T, ChatbotError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChatbotError::NotFound;
        assert_eq!(err.to_string(), "document not found");

        let err = ChatbotError::UnknownTool("get_weather".to_string());
        assert!(err.to_string().contains("get_weather"));
    }

    #[test]
    fn test_from_anyhow() {
        let err = ChatbotError::model(anyhow::anyhow!("backend down"));
        match err {
            ChatbotError::Model(msg) => assert!(msg.contains("backend down")),
            _ => panic!("wrong variant"),
        }
    }
}
