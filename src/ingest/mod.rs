//! 인제스트 파이프라인 - 업로드, 요약, RAG 인제스트
//!
//! 업로드 시 텍스트 추출과 요약은 동기적으로 수행하고,
//! 임계치를 넘는 큰 문서는 백그라운드에서 청킹/임베딩합니다.
//! `chunked` 플래그는 모든 청크가 벡터 저장소에 기록된 뒤에만 켜집니다.

use std::path::PathBuf;
use std::sync::Arc;

use uuid::Uuid;

use crate::document::{Document, DocumentStore, NewDocument};
use crate::embedding::EmbeddingProvider;
use crate::error::{ChatbotError, ServiceResult};
use crate::extractor::{extract_document_text, DocumentKind};
use crate::genai::ChatModel;
use crate::knowledge::{ChunkEntry, TextSplitter, VectorStore};

/// RAG 인제스트 임계치 (바이트)
///
/// 이보다 큰 페이로드는 직접 컨텍스트 주입이 비실용적이므로
/// 청킹/임베딩 대상이 됩니다.
pub const SIZE_THRESHOLD_BYTES: usize = 15 * 1024 * 1024;

/// 요약 프롬프트에 넣는 본문 최대 문자 수
const SUMMARY_INPUT_LIMIT: usize = 30_000;

// ============================================================================
// IngestService
// ============================================================================

/// 인제스트 서비스
#[derive(Clone)]
pub struct IngestService {
    model: Arc<dyn ChatModel>,
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: Arc<dyn VectorStore>,
    store: Arc<DocumentStore>,
    uploads_dir: PathBuf,
    size_threshold: usize,
}

impl IngestService {
    /// 새 인제스트 서비스 생성
    pub fn new(
        model: Arc<dyn ChatModel>,
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStore>,
        store: Arc<DocumentStore>,
        uploads_dir: PathBuf,
    ) -> Self {
        Self {
            model,
            embedder,
            vectors,
            store,
            uploads_dir,
            size_threshold: SIZE_THRESHOLD_BYTES,
        }
    }

    /// 인제스트 임계치 변경
    pub fn with_size_threshold(mut self, bytes: usize) -> Self {
        self.size_threshold = bytes;
        self
    }

    /// 문서 업로드 처리
    ///
    /// 1. 텍스트 추출 (실패 시 업로드 거부)
    /// 2. 요약 생성
    /// 3. 원본 페이로드 저장 + 문서 레코드 생성 (chunked=false)
    /// 4. 임계치 초과 시 백그라운드 RAG 인제스트 시작
    pub async fn upload(
        &self,
        user_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> ServiceResult<Document> {
        let size = bytes.len();
        tracing::info!("Upload: {} ({} bytes) for user {}", filename, size, user_id);

        let kind = DocumentKind::detect(filename, &bytes);
        let text = extract_in_background(bytes.clone(), kind)
            .await
            .map_err(|e| ChatbotError::Extraction(format!("{:#}", e)))?;

        let summary = self.summarize(&text).await?;

        let storage_path = self.persist_payload(&bytes).await?;

        let doc = self
            .store
            .create(NewDocument {
                user_id: user_id.to_string(),
                filename: filename.to_string(),
                storage_path: storage_path.to_string_lossy().to_string(),
                summary: Some(summary),
            })
            .map_err(ChatbotError::storage)?;

        if size > self.size_threshold {
            tracing::info!(
                "Document {} exceeds ingest threshold, scheduling background chunking",
                doc.id
            );
            let service = self.clone();
            let doc_id = doc.id.clone();
            tokio::spawn(async move {
                if let Err(e) = service.process_document(&doc_id).await {
                    tracing::error!("Background ingest failed for {}: {}", doc_id, e);
                }
            });
        }

        Ok(doc)
    }

    /// 문서를 청킹/임베딩하고 chunked 플래그를 켭니다.
    ///
    /// 이미 인제스트된 문서에는 아무 일도 하지 않으므로
    /// 재시도와 중복 스케줄링에 안전합니다.
    pub async fn process_document(&self, doc_id: &str) -> ServiceResult<()> {
        let doc = self
            .store
            .get(doc_id)
            .map_err(ChatbotError::storage)?
            .ok_or(ChatbotError::NotFound)?;

        if doc.chunked {
            tracing::debug!("Document {} already chunked, skipping", doc_id);
            return Ok(());
        }

        let bytes = tokio::fs::read(&doc.storage_path)
            .await
            .map_err(|e| ChatbotError::Storage(format!("cannot read payload: {}", e)))?;

        let kind = DocumentKind::detect(&doc.filename, &bytes);
        let text = extract_in_background(bytes, kind)
            .await
            .map_err(|e| ChatbotError::Extraction(format!("{:#}", e)))?;

        let splitter = TextSplitter::with_defaults();
        let chunks = splitter.split(&text);
        tracing::info!("Document {} split into {} chunks", doc_id, chunks.len());

        let embeddings = self
            .embedder
            .embed_batch(&chunks)
            .await
            .map_err(ChatbotError::embedding)?;

        let entries: Vec<ChunkEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, (chunk_text, embedding))| ChunkEntry {
                chunk_id: Uuid::new_v4().to_string(),
                doc_id: doc_id.to_string(),
                chunk_index: index as i32,
                chunk_text,
                embedding,
            })
            .collect();

        self.vectors
            .insert_batch(&entries)
            .await
            .map_err(ChatbotError::storage)?;

        // 플래그 전이는 청크가 모두 내구 저장된 뒤 마지막에
        self.store
            .set_chunked(doc_id)
            .map_err(ChatbotError::storage)?;

        Ok(())
    }

    /// 문서 삭제: 벡터 → 레코드 → 페이로드 순서
    pub async fn delete(&self, user_id: &str, doc_id: &str) -> ServiceResult<()> {
        let doc = self
            .store
            .get_owned(doc_id, user_id)
            .map_err(ChatbotError::storage)?
            .ok_or(ChatbotError::NotFound)?;

        self.vectors
            .delete_by_doc_id(doc_id)
            .await
            .map_err(ChatbotError::storage)?;

        self.store.delete(doc_id).map_err(ChatbotError::storage)?;

        if let Err(e) = tokio::fs::remove_file(&doc.storage_path).await {
            // 레코드가 이미 지워졌으므로 페이로드 잔존은 치명적이지 않음
            tracing::warn!("Failed to remove payload {}: {}", doc.storage_path, e);
        }

        tracing::info!("Deleted document {}", doc_id);
        Ok(())
    }

    /// 요약 생성
    async fn summarize(&self, text: &str) -> ServiceResult<String> {
        let prompt = build_summary_prompt(text);

        let raw = self
            .model
            .generate(&prompt)
            .await
            .map_err(ChatbotError::model)?;

        Ok(parse_summary(&raw))
    }

    /// 원본 페이로드를 업로드 디렉토리에 저장
    async fn persist_payload(&self, bytes: &[u8]) -> ServiceResult<PathBuf> {
        tokio::fs::create_dir_all(&self.uploads_dir)
            .await
            .map_err(|e| ChatbotError::Storage(format!("cannot create uploads dir: {}", e)))?;

        let path = self.uploads_dir.join(Uuid::new_v4().to_string());
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ChatbotError::Storage(format!("cannot write payload: {}", e)))?;

        Ok(path)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// CPU 바운드 텍스트 추출을 블로킹 스레드에서 수행
async fn extract_in_background(bytes: Vec<u8>, kind: DocumentKind) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || extract_document_text(&bytes, kind))
        .await
        .map_err(|e| anyhow::anyhow!("extraction task panicked: {}", e))?
}

/// 요약 프롬프트 생성 (본문은 상한까지만)
fn build_summary_prompt(text: &str) -> String {
    let body: String = text.chars().take(SUMMARY_INPUT_LIMIT).collect();
    format!(
        "Summarize the following document in 3-5 sentences. \
         Respond with a single JSON object in the form {{\"summary\": \"<summary>\"}}.\n\n\
         Document:\n{}",
        body
    )
}

/// 요약 응답 파싱
///
/// `{"summary": "..."}` 형태면 summary 필드를, 아니면 원문을 그대로 사용합니다.
fn parse_summary(raw: &str) -> String {
    let trimmed = raw.trim();
    let cleaned = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(cleaned) {
        if let Some(summary) = value.get("summary").and_then(|s| s.as_str()) {
            return summary.to_string();
        }
    }

    trimmed.to_string()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use anyhow::Result;
    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::genai::{Content, FunctionDecl, ModelReply};
    use crate::knowledge::MemoryVectorStore;

    struct SummaryModel;

    #[async_trait]
    impl ChatModel for SummaryModel {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(r#"{"summary": "A short summary."}"#.to_string())
        }

        async fn send(&self, _history: &[Content], _tools: &[FunctionDecl]) -> Result<ModelReply> {
            anyhow::bail!("not used in ingest")
        }
    }

    struct CountingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }

        fn dimension(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    struct Fixture {
        _dir: TempDir,
        store: Arc<DocumentStore>,
        vectors: Arc<MemoryVectorStore>,
        service: IngestService,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let store = Arc::new(DocumentStore::open(&dir.path().join("test.db")).unwrap());
            let vectors = Arc::new(MemoryVectorStore::new());
            let service = IngestService::new(
                Arc::new(SummaryModel),
                Arc::new(CountingEmbedder),
                vectors.clone(),
                store.clone(),
                dir.path().join("uploads"),
            );
            Self {
                _dir: dir,
                store,
                vectors,
                service,
            }
        }
    }

    #[tokio::test]
    async fn test_upload_small_text_document() {
        let fx = Fixture::new();

        let doc = fx
            .service
            .upload("alice", "notes.txt", b"some meaningful notes".to_vec())
            .await
            .unwrap();

        assert_eq!(doc.summary, Some("A short summary.".to_string()));
        assert!(!doc.chunked);
        // 페이로드가 디스크에 저장됨
        assert!(std::path::Path::new(&doc.storage_path).exists());
        // 작은 문서는 인제스트되지 않음
        assert_eq!(fx.vectors.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_payload() {
        let fx = Fixture::new();

        let err = fx
            .service
            .upload("alice", "empty.txt", b"   ".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatbotError::Extraction(_)));

        // 실패한 업로드는 레코드를 남기지 않음
        assert_eq!(fx.store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_process_document_chunks_and_flags() {
        let fx = Fixture::new();

        let text = "paragraph one. ".repeat(200);
        let doc = fx
            .service
            .upload("alice", "big.txt", text.into_bytes())
            .await
            .unwrap();
        assert!(!doc.chunked);

        fx.service.process_document(&doc.id).await.unwrap();

        let loaded = fx.store.get(&doc.id).unwrap().unwrap();
        assert!(loaded.chunked);
        assert!(fx.vectors.has_embeddings(&doc.id).await.unwrap());
        let count = fx.vectors.count().await.unwrap();
        assert!(count > 1, "expected multiple chunks, got {}", count);

        // 재실행은 no-op (중복 삽입 없음)
        fx.service.process_document(&doc.id).await.unwrap();
        assert_eq!(fx.vectors.count().await.unwrap(), count);
    }

    #[tokio::test]
    async fn test_upload_past_threshold_triggers_background_ingest() {
        let fx = Fixture::new();
        let service = fx.service.clone().with_size_threshold(64);

        let text = "sentence about things. ".repeat(150);
        let doc = service
            .upload("alice", "big.txt", text.into_bytes())
            .await
            .unwrap();

        // 업로드 응답 시점에는 아직 인제스트 전
        assert!(!doc.chunked);

        // 백그라운드 작업 완료까지 대기
        let mut chunked = false;
        for _ in 0..200 {
            if fx.store.get(&doc.id).unwrap().unwrap().chunked {
                chunked = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        assert!(chunked, "background ingest did not complete");
        // 플래그가 켜졌으면 청크도 모두 저장되어 있음
        assert!(fx.vectors.has_embeddings(&doc.id).await.unwrap());
        assert!(fx.vectors.count().await.unwrap() > 1);
    }

    #[tokio::test]
    async fn test_process_missing_document() {
        let fx = Fixture::new();
        let err = fx.service.process_document("no-such-id").await.unwrap_err();
        assert!(matches!(err, ChatbotError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_removes_vectors_record_and_payload() {
        let fx = Fixture::new();

        let text = "content. ".repeat(300);
        let doc = fx
            .service
            .upload("alice", "doc.txt", text.into_bytes())
            .await
            .unwrap();
        fx.service.process_document(&doc.id).await.unwrap();

        fx.service.delete("alice", &doc.id).await.unwrap();

        assert!(fx.store.get(&doc.id).unwrap().is_none());
        assert!(!fx.vectors.has_embeddings(&doc.id).await.unwrap());
        assert!(!std::path::Path::new(&doc.storage_path).exists());
    }

    #[tokio::test]
    async fn test_delete_enforces_ownership() {
        let fx = Fixture::new();

        let doc = fx
            .service
            .upload("alice", "doc.txt", b"hello world".to_vec())
            .await
            .unwrap();

        let err = fx.service.delete("mallory", &doc.id).await.unwrap_err();
        assert!(matches!(err, ChatbotError::NotFound));
        assert!(fx.store.get(&doc.id).unwrap().is_some());
    }

    #[test]
    fn test_parse_summary_variants() {
        assert_eq!(parse_summary(r#"{"summary": "ok"}"#), "ok");
        assert_eq!(parse_summary("```json\n{\"summary\": \"ok\"}\n```"), "ok");
        assert_eq!(parse_summary("just text"), "just text");
        assert_eq!(parse_summary(r#"{"other": "x"}"#), r#"{"other": "x"}"#);
    }

    #[test]
    fn test_summary_prompt_caps_input() {
        let text = "a".repeat(SUMMARY_INPUT_LIMIT * 2);
        let prompt = build_summary_prompt(&text);
        assert!(prompt.chars().count() < SUMMARY_INPUT_LIMIT + 500);
    }
}
