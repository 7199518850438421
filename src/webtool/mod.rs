//! 웹 콘텐츠 도구 - URL을 깨끗한 본문 텍스트로 변환
//!
//! 대화 중 모델이 요청하는 웹페이지 콘텐츠를 가져옵니다.
//! 실패해도 예외 대신 사람이 읽을 수 있는 에러 문구를 반환합니다.
//! 모델이 그 텍스트를 읽고 대응하는 것이 의도된 동작입니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html};

/// 콘텐츠 최대 길이 (문자 수)
const MAX_CONTENT_LENGTH: usize = 6000;

/// 잘림 표시 문구
const TRUNCATION_MARKER: &str = "... (content truncated)";

/// 본문에 포함하지 않는 요소들
const EXCLUDED_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "form", "noscript",
];

/// 실제 브라우저 User-Agent (봇 차단 회피)
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

// ============================================================================
// WebTool Trait
// ============================================================================

/// 웹 콘텐츠 도구 트레이트
///
/// 결과는 항상 텍스트입니다. 실패 시에도 에러를 설명하는 문자열을
/// 반환하므로 호출자는 Result를 다룰 필요가 없습니다.
#[async_trait]
pub trait WebTool: Send + Sync {
    /// URL에서 본문 텍스트 추출 (실패 시 에러 설명 문자열)
    async fn fetch_content(&self, url: &str) -> String;
}

// ============================================================================
// WebPageTool
// ============================================================================

/// reqwest + scraper 기반 웹 콘텐츠 도구
pub struct WebPageTool {
    client: reqwest::Client,
}

impl WebPageTool {
    /// 새 도구 생성
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// URL 페치 + 본문 추출 (내부용, 실패 시 에러)
    async fn fetch(&self, url: &str) -> Result<String> {
        tracing::info!("Fetching webpage content: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Server returned status {}", status);
        }

        let html = response.text().await.context("Failed to read body")?;
        let text = clean_html(&html);

        if text.is_empty() {
            anyhow::bail!("No readable text content found on the page");
        }

        tracing::debug!("Fetched and cleaned {} characters from {}", text.len(), url);
        Ok(text)
    }
}

#[async_trait]
impl WebTool for WebPageTool {
    async fn fetch_content(&self, url: &str) -> String {
        match self.fetch(url).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Webpage fetch error for {}: {:#}", url, e);
                format!(
                    "Failed to fetch content from the URL. \
                     Please ensure it's a valid, accessible link. Error: {:#}",
                    e
                )
            }
        }
    }
}

// ============================================================================
// HTML Cleanup
// ============================================================================

/// HTML 문서를 깨끗한 본문 텍스트로 변환
///
/// script/style/nav/header/footer/aside/form을 제외한 body 텍스트를 모으고,
/// 연속 공백을 정리한 뒤 최대 길이로 자릅니다.
pub fn clean_html(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut raw = String::new();
    if let Ok(selector) = scraper::Selector::parse("body") {
        if let Some(body) = document.select(&selector).next() {
            collect_text(body, &mut raw);
        }
    }

    // 연속 공백 정리
    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    truncate_chars(&text, MAX_CONTENT_LENGTH)
}

/// 제외 태그를 건너뛰며 텍스트 노드 수집
fn collect_text(element: ElementRef, out: &mut String) {
    if EXCLUDED_TAGS.contains(&element.value().name()) {
        return;
    }

    for child in element.children() {
        if let Some(el) = ElementRef::wrap(child) {
            collect_text(el, out);
        } else if let Some(text) = child.value().as_text() {
            out.push(' ');
            out.push_str(text);
        }
    }
}

/// 문자 수 기준으로 자르고 잘림 표시 추가
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((offset, _)) => format!("{}{}", &text[..offset], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
