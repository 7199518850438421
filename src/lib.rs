//! docchat - PDF 문서 대화 서비스
//!
//! 문서를 업로드하면 요약을 생성하고, 문서에 대해 여러 턴 대화할 수 있습니다.
//! 대형 문서는 청킹/임베딩 후 RAG 검색으로, 소형 문서는 요약/히스토리
//! 컨텍스트로 응답하며, 메시지에 URL이 있으면 웹 콘텐츠를 가져와 활용합니다.

pub mod chat;
pub mod cli;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod genai;
pub mod ingest;
pub mod knowledge;
pub mod webtool;

// Re-exports
pub use chat::{ChatAnswer, ChatService};
pub use document::{get_data_dir, ChatTurn, Document, DocumentStore, NewDocument, Role};
pub use embedding::{get_api_key, has_api_key, EmbeddingProvider, GeminiEmbedding};
pub use error::{ChatbotError, ServiceResult};
pub use genai::{ChatModel, GeminiChat, ModelReply};
pub use ingest::{IngestService, SIZE_THRESHOLD_BYTES};
pub use knowledge::{
    ChunkEntry, ChunkHit, LanceVectorStore, MemoryVectorStore, TextSplitter, VectorStore,
};
pub use webtool::{WebPageTool, WebTool};
