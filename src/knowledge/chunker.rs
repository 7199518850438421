//! 텍스트 청킹 모듈
//!
//! 긴 문서를 임베딩에 적합한 크기의 청크로 분할합니다.
//! 문단/문장 경계를 우선하고, 인접 청크는 지정된 길이만큼 겹칩니다.
//! 같은 입력은 항상 같은 청크 시퀀스를 생성합니다 (결정적).

use anyhow::Result;

/// 기본 청크 크기 (문자 수)
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// 기본 오버랩 크기 (문자 수)
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

// ============================================================================
// TextSplitter
// ============================================================================

/// 오버랩 슬라이딩 윈도우 텍스트 분할기
///
/// 각 청크는 `chunk_size` 문자 이하이며, 인접 청크는 `overlap` 문자를
/// 공유합니다. 절단 지점은 문단 > 줄 > 문장 > 단어 경계를 우선하고
/// 경계가 없으면 문자 단위로 자릅니다. 오버랩을 제거하며 이어 붙이면
/// 원본 텍스트가 손실 없이 복원됩니다.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl TextSplitter {
    /// 새 분할기 생성
    ///
    /// `overlap`은 `chunk_size`보다 작아야 합니다.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            anyhow::bail!("chunk_size must be positive");
        }
        if overlap >= chunk_size {
            anyhow::bail!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap,
                chunk_size
            );
        }
        Ok(Self { chunk_size, overlap })
    }

    /// 기본 설정 (1000자 / 100자 오버랩)
    pub fn with_defaults() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }

    /// 청크 크기 반환
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// 텍스트를 청크로 분할
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }

        let n = text.len();
        let mut chunks = Vec::new();
        let mut start = 0usize;

        loop {
            let hard_end = advance_chars(text, start, self.chunk_size);
            if hard_end >= n {
                chunks.push(text[start..].to_string());
                break;
            }

            // 절단 지점은 오버랩보다 뒤에 있어야 다음 시작점이 전진함
            let min_cut = advance_chars(text, start, self.overlap + 1);
            let search_from = min_cut.max(advance_chars(text, start, self.chunk_size / 2));
            let cut = find_break(text, search_from, hard_end).unwrap_or(hard_end);

            chunks.push(text[start..cut].to_string());
            start = rewind_chars(text, cut, self.overlap);
        }

        chunks
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// `from` 바이트 위치에서 `count` 문자만큼 전진한 바이트 위치
fn advance_chars(text: &str, from: usize, count: usize) -> usize {
    match text[from..].char_indices().nth(count) {
        Some((offset, _)) => from + offset,
        None => text.len(),
    }
}

/// `from` 바이트 위치에서 `count` 문자만큼 후퇴한 바이트 위치
fn rewind_chars(text: &str, from: usize, count: usize) -> usize {
    let mut pos = from;
    for _ in 0..count {
        match text[..pos].chars().next_back() {
            Some(c) => pos -= c.len_utf8(),
            None => break,
        }
    }
    pos
}

/// [lo, hi) 윈도우 안에서 가장 뒤쪽의 자연 경계 직후 위치를 찾음
///
/// 우선순위: 문단(\n\n) > 줄(\n) > 문장(". ") > 단어(공백)
fn find_break(text: &str, lo: usize, hi: usize) -> Option<usize> {
    if lo >= hi {
        return None;
    }
    let window = &text[lo..hi];

    for sep in ["\n\n", "\n", ". ", " "] {
        if let Some(p) = window.rfind(sep) {
            return Some(lo + p + sep.len());
        }
    }

    None
}

// ============================================================================
// Tests
// ============================================================================
