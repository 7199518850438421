//! 도구 레지스트리 - 닫힌 도구 집합과 디스패치
//!
//! 모델에 선언하는 도구는 여기 열거된 것이 전부입니다.
//! 모델이 목록 밖의 이름을 요청하면 조용히 무시하지 않고 실패합니다.

use serde_json::json;

use crate::error::ChatbotError;
use crate::genai::FunctionDecl;
use crate::webtool::WebTool;

/// 웹페이지 콘텐츠 도구 이름 (wire 상의 식별자)
pub const FETCH_WEBPAGE_CONTENT: &str = "fetch_webpage_content";

/// 사용 가능한 도구 (닫힌 집합)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// URL에서 웹페이지 본문 텍스트를 가져옴
    FetchWebpageContent,
}

impl ToolKind {
    /// wire 이름으로 도구 찾기
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            FETCH_WEBPAGE_CONTENT => Some(Self::FetchWebpageContent),
            _ => None,
        }
    }

    /// wire 이름
    pub fn name(&self) -> &'static str {
        match self {
            Self::FetchWebpageContent => FETCH_WEBPAGE_CONTENT,
        }
    }

    /// 모델에 전달하는 함수 선언
    pub fn declaration(&self) -> FunctionDecl {
        match self {
            Self::FetchWebpageContent => FunctionDecl {
                name: FETCH_WEBPAGE_CONTENT.to_string(),
                description:
                    "Fetches the main text content of a webpage from a given URL. \
                     Use this when the user asks about a specific webpage or link."
                        .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "url": {
                            "type": "string",
                            "description": "The full URL of the webpage to fetch"
                        }
                    },
                    "required": ["url"]
                }),
            },
        }
    }
}

/// 전체 도구 선언 목록 (모델에 광고할 때 사용)
pub fn all_declarations() -> Vec<FunctionDecl> {
    vec![ToolKind::FetchWebpageContent.declaration()]
}

/// 모델의 도구 호출을 실행
///
/// 등록되지 않은 이름이면 `ChatbotError::UnknownTool`로 실패합니다.
/// 등록된 도구의 실행 결과는 항상 텍스트이며, 도구 자체의 실패도
/// 모델이 읽을 수 있는 에러 문구로 돌아옵니다.
pub async fn dispatch(
    name: &str,
    args: &serde_json::Value,
    web: &dyn WebTool,
) -> Result<String, ChatbotError> {
    let kind = ToolKind::from_name(name)
        .ok_or_else(|| ChatbotError::UnknownTool(name.to_string()))?;

    match kind {
        ToolKind::FetchWebpageContent => {
            let url = args
                .get("url")
                .and_then(|v| v.as_str())
                .unwrap_or_default();

            if url.is_empty() {
                return Ok("No URL was provided to fetch.".to_string());
            }

            Ok(web.fetch_content(url).await)
        }
    }
}

// ============================================================================
// URL Detection
// ============================================================================

/// 웹 관련 키워드 (명시적 URL 없이도 도구를 광고할 단서)
const WEB_HINT_KEYWORDS: &[&str] = &["http", "www.", "url", "website", "link"];

/// URL 패턴 (공백/닫는 따옴표/괄호 전까지를 URL로 취급)
fn url_pattern() -> &'static regex::Regex {
    static URL_PATTERN: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    URL_PATTERN
        .get_or_init(|| regex::Regex::new(r#"https?://[^\s)"'<>]+"#).expect("Invalid URL regex"))
}

/// 메시지에서 첫 번째 명시적 URL 추출
///
/// 파싱 가능한 절대 URL만 인정합니다. `http://` 같은 빈 껍데기는
/// 명시적 URL로 취급하지 않습니다 (키워드 경로로 넘어감).
pub fn extract_first_url(message: &str) -> Option<String> {
    for m in url_pattern().find_iter(message) {
        // 문장 끝 구두점은 URL의 일부가 아님
        let candidate = m.as_str().trim_end_matches(['.', ',', '!', '?']);
        if let Ok(parsed) = url::Url::parse(candidate) {
            if parsed.host_str().is_some() {
                return Some(candidate.to_string());
            }
        }
    }

    None
}

/// 명시적 URL은 없지만 웹 콘텐츠를 암시하는 메시지인지 판단
pub fn has_web_hint(message: &str) -> bool {
    let lower = message.to_lowercase();
    WEB_HINT_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

// ============================================================================
// Tests
// ============================================================================
