//! Vector Store - 벡터 검색 트레이트 및 유틸리티
//!
//! 청크 벡터를 부모 문서 ID로 태깅하여 저장하고,
//! 문서 단위로 필터링된 최근접 이웃 검색을 제공합니다.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

/// 벡터 임베딩 차원 (Gemini text-embedding-004 기본값)
/// source: https://ai.google.dev/gemini-api/docs/embeddings
pub const EMBEDDING_DIMENSION: i32 = 768;

// ============================================================================
// Types
// ============================================================================

/// 청크 벡터 엔트리 (저장용)
#[derive(Debug, Clone)]
pub struct ChunkEntry {
    /// 청크 ID (UUID)
    pub chunk_id: String,
    /// 부모 문서 ID
    pub doc_id: String,
    /// 청크 인덱스 (0-based)
    pub chunk_index: i32,
    /// 청크 텍스트
    pub chunk_text: String,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 검색 결과
#[derive(Debug, Clone)]
pub struct ChunkHit {
    /// 부모 문서 ID
    pub doc_id: String,
    /// 청크 인덱스
    pub chunk_index: i32,
    /// 청크 텍스트
    pub chunk_text: String,
    /// 유사도 스코어 (높을수록 유사)
    pub similarity: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
///
/// 검색은 항상 `doc_id`로 스코프가 제한됩니다. 다른 문서의 인제스트가
/// 동시에 진행 중이어도 다른 문서의 청크가 결과에 섞이면 안 됩니다.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 벡터 배치 삽입
    async fn insert_batch(&self, entries: &[ChunkEntry]) -> Result<usize>;

    /// 특정 문서로 제한된 벡터 검색 (유사도 내림차순, 최대 k개)
    async fn search(&self, doc_id: &str, query_embedding: &[f32], k: usize)
        -> Result<Vec<ChunkHit>>;

    /// doc_id로 벡터 삭제
    async fn delete_by_doc_id(&self, doc_id: &str) -> Result<usize>;

    /// 전체 벡터 개수 조회
    async fn count(&self) -> Result<usize>;

    /// 특정 doc_id의 임베딩 존재 여부
    async fn has_embeddings(&self, doc_id: &str) -> Result<bool>;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 두 벡터 간의 코사인 유사도를 계산합니다.
/// 결과는 -1.0 ~ 1.0 범위입니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// MemoryVectorStore
// ============================================================================

/// 인메모리 벡터 저장소
///
/// 코사인 유사도 전수 검색을 수행합니다. 외부 저장소 없이 동작해야 하는
/// 테스트와 소규모 배포에서 사용합니다.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    entries: Mutex<HashMap<String, Vec<ChunkEntry>>>,
}

impl MemoryVectorStore {
    /// 빈 저장소 생성
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn insert_batch(&self, entries: &[ChunkEntry]) -> Result<usize> {
        let mut map = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        for entry in entries {
            map.entry(entry.doc_id.clone())
                .or_default()
                .push(entry.clone());
        }

        Ok(entries.len())
    }

    async fn search(
        &self,
        doc_id: &str,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ChunkHit>> {
        let map = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut hits: Vec<ChunkHit> = map
            .get(doc_id)
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| ChunkHit {
                        doc_id: e.doc_id.clone(),
                        chunk_index: e.chunk_index,
                        chunk_text: e.chunk_text.clone(),
                        similarity: cosine_similarity(&e.embedding, query_embedding),
                    })
                    .collect()
            })
            .unwrap_or_default();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        Ok(hits)
    }

    async fn delete_by_doc_id(&self, doc_id: &str) -> Result<usize> {
        let mut map = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        Ok(map.remove(doc_id).map(|v| v.len()).unwrap_or(0))
    }

    async fn count(&self) -> Result<usize> {
        let map = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        Ok(map.values().map(|v| v.len()).sum())
    }

    async fn has_embeddings(&self, doc_id: &str) -> Result<bool> {
        let map = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        Ok(map.get(doc_id).map(|v| !v.is_empty()).unwrap_or(false))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(doc_id: &str, index: i32, embedding: Vec<f32>) -> ChunkEntry {
        ChunkEntry {
            chunk_id: format!("{}-{}", doc_id, index),
            doc_id: doc_id.to_string(),
            chunk_index: index,
            chunk_text: format!("chunk {} of {}", index, doc_id),
            embedding,
        }
    }

    #[test]
    fn test_cosine_similarity_same() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c) - 0.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) - -1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_empty() {
        let a: Vec<f32> = vec![];
        let b: Vec<f32> = vec![];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[tokio::test]
    async fn test_memory_store_insert_and_count() {
        let store = MemoryVectorStore::new();
        assert_eq!(store.count().await.unwrap(), 0);

        let entries = vec![
            entry("doc-a", 0, vec![1.0, 0.0]),
            entry("doc-a", 1, vec![0.0, 1.0]),
        ];
        assert_eq!(store.insert_batch(&entries).await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 2);
        assert!(store.has_embeddings("doc-a").await.unwrap());
        assert!(!store.has_embeddings("doc-b").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store_search_is_doc_scoped() {
        let store = MemoryVectorStore::new();
        store
            .insert_batch(&[
                entry("doc-a", 0, vec![1.0, 0.0]),
                entry("doc-b", 0, vec![1.0, 0.0]),
                entry("doc-b", 1, vec![0.9, 0.1]),
            ])
            .await
            .unwrap();

        let hits = store.search("doc-a", &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits.iter().all(|h| h.doc_id == "doc-a"));
    }

    #[tokio::test]
    async fn test_memory_store_search_ordering_and_limit() {
        let store = MemoryVectorStore::new();
        store
            .insert_batch(&[
                entry("doc-a", 0, vec![1.0, 0.0]),
                entry("doc-a", 1, vec![0.7, 0.7]),
                entry("doc-a", 2, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = store.search("doc-a", &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_index, 0);
        assert!(hits[0].similarity >= hits[1].similarity);
    }

    #[tokio::test]
    async fn test_memory_store_delete() {
        let store = MemoryVectorStore::new();
        store
            .insert_batch(&[
                entry("doc-a", 0, vec![1.0, 0.0]),
                entry("doc-a", 1, vec![0.0, 1.0]),
                entry("doc-b", 0, vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let deleted = store.delete_by_doc_id("doc-a").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(!store.has_embeddings("doc-a").await.unwrap());
    }
}
