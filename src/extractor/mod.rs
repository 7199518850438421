//! 콘텐츠 추출 모듈
//!
//! 업로드된 문서 페이로드에서 텍스트를 추출합니다.
//! - PDF: pdf-extract로 페이지별 텍스트 추출
//! - 텍스트 파일: 직접 읽기

pub mod pdf;

use anyhow::{Context, Result};

// ============================================================================
// Document Kind
// ============================================================================

/// 문서 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// PDF 문서
    Pdf,
    /// 일반 텍스트 문서
    Text,
}

impl DocumentKind {
    /// 파일 이름과 매직 바이트로 종류 결정
    ///
    /// 확장자가 .pdf이거나 페이로드가 `%PDF-`로 시작하면 PDF로 취급합니다.
    pub fn detect(filename: &str, bytes: &[u8]) -> Self {
        let ext = filename
            .rsplit('.')
            .next()
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        if ext == "pdf" || bytes.starts_with(b"%PDF-") {
            DocumentKind::Pdf
        } else {
            DocumentKind::Text
        }
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// 문서 페이로드에서 텍스트 추출
///
/// 페이지별 텍스트를 줄바꿈으로 연결하여 반환합니다.
/// 추출 가능한 텍스트가 전혀 없으면 (스캔 이미지 PDF 등) 에러를 반환합니다.
pub fn extract_document_text(bytes: &[u8], kind: DocumentKind) -> Result<String> {
    let text = match kind {
        DocumentKind::Pdf => {
            let pages = pdf::extract_pages_from_bytes(bytes)?;
            pages
                .into_iter()
                .map(|(_, text)| text)
                .collect::<Vec<_>>()
                .join("\n")
        }
        DocumentKind::Text => {
            String::from_utf8(bytes.to_vec()).context("Payload is not valid UTF-8 text")?
        }
    };

    if text.trim().is_empty() {
        anyhow::bail!("No text recovered from document (scanned images only?)");
    }

    Ok(text)
}

// ============================================================================
// Tests
// ============================================================================
