//! Knowledge 모듈 - RAG 청킹/벡터 검색
//!
//! - Chunker: 오버랩 슬라이딩 윈도우 텍스트 분할
//! - VectorStore: 문서 스코프 벡터 검색 트레이트 + 인메모리 구현
//! - LanceDB: 영속 벡터 저장소 (ANN)

mod chunker;
mod lance;
mod vector;

// Re-exports
pub use chunker::{TextSplitter, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use lance::LanceVectorStore;
pub use vector::{
    cosine_similarity, ChunkEntry, ChunkHit, MemoryVectorStore, VectorStore, EMBEDDING_DIMENSION,
};
