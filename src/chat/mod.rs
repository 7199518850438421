//! 대화 오케스트레이터 - 문서 기반 질의응답 파이프라인
//!
//! 문서 상태와 메시지 내용에 따라 세 가지 응답 전략 중 하나를 고릅니다.
//!
//! 1. RAG: 인제스트 완료(chunked) 문서는 질의 임베딩 → 문서 스코프
//!    벡터 검색 → 검색된 청크만으로 단발 생성
//! 2. 도구 대화: 메시지에 명시적 URL이 있으면 모델 호출 전에 먼저
//!    페이지를 가져와 주입하고, URL 없이 웹 단서만 있으면 도구를
//!    선언해 모델이 호출 여부를 결정
//! 3. 일반 대화: 요약 + 최근 히스토리를 컨텍스트로 한 단발 생성
//!
//! 모든 경로의 최종 답변은 `{"answer": "..."}` JSON 계약을 따릅니다.
//! 실패한 턴은 히스토리에 기록되지 않습니다.

pub mod tools;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::document::{ChatTurn, DocumentStore, Role};
use crate::embedding::EmbeddingProvider;
use crate::error::{ChatbotError, ServiceResult};
use crate::genai::{ChatModel, Content, ModelReply};
use crate::knowledge::VectorStore;
use crate::webtool::WebTool;

/// RAG 검색 시 가져오는 청크 수
const RAG_TOP_K: usize = 5;

/// 일반 대화 프롬프트에 포함하는 최근 히스토리 엔트리 수
const PLAIN_HISTORY_WINDOW: usize = 10;

/// 한 턴에서 허용하는 최대 도구 호출 횟수
const MAX_TOOL_ROUNDS: usize = 3;

/// 검색된 청크 사이의 구분자
const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// 대화 응답
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub answer: String,
}

// ============================================================================
// ChatService
// ============================================================================

/// 대화 서비스
///
/// 모든 외부 의존성(모델, 임베딩, 벡터 저장소, 웹 도구, 문서 저장소)을
/// 생성자에서 주입받습니다.
pub struct ChatService {
    model: Arc<dyn ChatModel>,
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: Arc<dyn VectorStore>,
    web: Arc<dyn WebTool>,
    store: Arc<DocumentStore>,
}

impl ChatService {
    /// 새 대화 서비스 생성
    pub fn new(
        model: Arc<dyn ChatModel>,
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStore>,
        web: Arc<dyn WebTool>,
        store: Arc<DocumentStore>,
    ) -> Self {
        Self {
            model,
            embedder,
            vectors,
            web,
            store,
        }
    }

    /// 문서에 대한 한 턴의 대화 처리
    ///
    /// 성공 시에만 user/model 턴이 히스토리에 기록됩니다.
    pub async fn chat(
        &self,
        user_id: &str,
        doc_id: &str,
        message: &str,
    ) -> ServiceResult<ChatAnswer> {
        let doc = self
            .store
            .get_owned(doc_id, user_id)
            .map_err(ChatbotError::storage)?
            .ok_or(ChatbotError::NotFound)?;

        let raw = if doc.chunked {
            tracing::info!("Chat strategy for {}: RAG", doc_id);
            self.answer_with_rag(&doc.id, doc.summary.as_deref(), message)
                .await?
        } else if let Some(url) = tools::extract_first_url(message) {
            tracing::info!("Chat strategy for {}: forced web fetch ({})", doc_id, url);
            self.answer_with_forced_fetch(&doc.chat_history, doc.summary.as_deref(), message, &url)
                .await?
        } else if tools::has_web_hint(message) {
            tracing::info!("Chat strategy for {}: model-driven tools", doc_id);
            self.answer_with_tools(&doc.chat_history, doc.summary.as_deref(), message)
                .await?
        } else {
            tracing::info!("Chat strategy for {}: plain context", doc_id);
            self.answer_plain(&doc.chat_history, doc.summary.as_deref(), message)
                .await?
        };

        let answer = parse_answer(&raw);
        let stored_model_turn = serde_json::to_string(&ChatAnswer {
            answer: answer.clone(),
        })
        .map_err(|e| ChatbotError::Storage(e.to_string()))?;

        self.store
            .append_exchange(
                &doc.id,
                ChatTurn::user(message),
                ChatTurn::model(stored_model_turn),
            )
            .map_err(ChatbotError::storage)?;

        Ok(ChatAnswer { answer })
    }

    /// RAG 경로: 질의 임베딩 → 문서 스코프 검색 → 단발 생성
    async fn answer_with_rag(
        &self,
        doc_id: &str,
        summary: Option<&str>,
        message: &str,
    ) -> ServiceResult<String> {
        let query_embedding = self
            .embedder
            .embed(message)
            .await
            .map_err(ChatbotError::embedding)?;

        let hits = self
            .vectors
            .search(doc_id, &query_embedding, RAG_TOP_K)
            .await
            .map_err(ChatbotError::storage)?;

        tracing::debug!("RAG retrieved {} chunks for document {}", hits.len(), doc_id);

        let context = hits
            .iter()
            .map(|h| h.chunk_text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);

        let prompt = build_rag_prompt(summary, &context, message);

        self.model
            .generate(&prompt)
            .await
            .map_err(ChatbotError::model)
    }

    /// 강제 페치 경로: 모델 호출 전에 URL 콘텐츠를 가져와 메시지에 주입
    ///
    /// 도구는 선언하지 않습니다. 페치 실패도 에러 문구 텍스트로 주입되어
    /// 모델이 설명하게 됩니다.
    async fn answer_with_forced_fetch(
        &self,
        history: &[ChatTurn],
        summary: Option<&str>,
        message: &str,
        url: &str,
    ) -> ServiceResult<String> {
        let content = self.web.fetch_content(url).await;

        let mut contents = conversation_preamble(summary);
        contents.extend(project_history(history));
        contents.push(Content::user(build_forced_fetch_message(
            message, url, &content,
        )));

        match self
            .model
            .send(&contents, &[])
            .await
            .map_err(ChatbotError::model)?
        {
            ModelReply::Text(text) => Ok(text),
            ModelReply::ToolCall { name, .. } => Err(ChatbotError::Model(format!(
                "unexpected tool call '{}' without declared tools",
                name
            ))),
        }
    }

    /// 모델 주도 도구 경로: 도구를 선언하고 호출 여부를 모델에 맡김
    async fn answer_with_tools(
        &self,
        history: &[ChatTurn],
        summary: Option<&str>,
        message: &str,
    ) -> ServiceResult<String> {
        let declarations = tools::all_declarations();

        let mut contents = conversation_preamble(summary);
        contents.extend(project_history(history));
        contents.push(Content::user(with_answer_contract(message)));

        for round in 0..MAX_TOOL_ROUNDS {
            let reply = self
                .model
                .send(&contents, &declarations)
                .await
                .map_err(ChatbotError::model)?;

            match reply {
                ModelReply::Text(text) => return Ok(text),
                ModelReply::ToolCall { name, args } => {
                    tracing::info!("Tool round {}: model requested '{}'", round + 1, name);

                    let result = tools::dispatch(&name, &args, self.web.as_ref()).await?;

                    contents.push(Content::model_function_call(&name, args));
                    contents.push(Content::function_response(&name, result));
                }
            }
        }

        Err(ChatbotError::Model(format!(
            "tool call limit reached ({} rounds) without a final answer",
            MAX_TOOL_ROUNDS
        )))
    }

    /// 일반 경로: 요약 + 최근 히스토리를 담은 단발 생성
    async fn answer_plain(
        &self,
        history: &[ChatTurn],
        summary: Option<&str>,
        message: &str,
    ) -> ServiceResult<String> {
        let prompt = build_plain_prompt(summary, history, message);

        self.model
            .generate(&prompt)
            .await
            .map_err(ChatbotError::model)
    }
}

// ============================================================================
// Prompt Construction
// ============================================================================

/// 모든 경로 공통의 답변 JSON 계약 지시문
const ANSWER_CONTRACT: &str =
    r#"Respond with a single JSON object in the form {"answer": "<your answer>"}."#;

fn with_answer_contract(message: &str) -> String {
    format!("{}\n\n{}", message, ANSWER_CONTRACT)
}

/// 대화형 경로의 도입 컨텍스트 (문서 요약 주입)
fn conversation_preamble(summary: Option<&str>) -> Vec<Content> {
    let summary = summary.unwrap_or("(no summary available)");
    vec![
        Content::user(format!(
            "You are an assistant answering questions about an uploaded document.\n\
             Document summary:\n{}",
            summary
        )),
        Content::model("Understood. I will answer questions about this document."),
    ]
}

/// RAG 프롬프트: 검색된 청크만을 근거로 답하게 함
fn build_rag_prompt(summary: Option<&str>, context: &str, question: &str) -> String {
    let summary = summary.unwrap_or("(no summary available)");
    format!(
        "You are an assistant answering questions about an uploaded document.\n\
         Document summary:\n{}\n\n\
         The following excerpts were retrieved from the document. \
         Answer the question using ONLY these excerpts. \
         If the excerpts do not contain the answer, say so.\n\n\
         Excerpts:\n{}\n\n\
         Question: {}\n\n{}",
        summary, context, question, ANSWER_CONTRACT
    )
}

/// 강제 페치 메시지: 원 질문 + 가져온 웹 콘텐츠
fn build_forced_fetch_message(question: &str, url: &str, content: &str) -> String {
    format!(
        "{}\n\nContent fetched from {}:\n{}\n\n\
         Answer the question using the fetched content and the conversation so far.\n\n{}",
        question, url, content, ANSWER_CONTRACT
    )
}

/// 일반 대화 프롬프트: 요약 + 최근 히스토리 + 질문
fn build_plain_prompt(summary: Option<&str>, history: &[ChatTurn], question: &str) -> String {
    let summary = summary.unwrap_or("(no summary available)");

    let tail_start = history.len().saturating_sub(PLAIN_HISTORY_WINDOW);
    let rendered: String = history[tail_start..]
        .iter()
        .map(|turn| {
            let speaker = match turn.role {
                Role::User => "User",
                Role::Model => "Assistant",
            };
            format!("{}: {}\n", speaker, turn.text())
        })
        .collect();

    format!(
        "You are an assistant answering questions about an uploaded document.\n\
         Document summary:\n{}\n\n\
         Recent conversation:\n{}\n\
         Question: {}\n\n{}",
        summary, rendered, question, ANSWER_CONTRACT
    )
}

/// 저장된 히스토리를 wire 형식으로 변환
fn project_history(history: &[ChatTurn]) -> Vec<Content> {
    history
        .iter()
        .map(|turn| match turn.role {
            Role::User => Content::user(turn.text()),
            Role::Model => Content::model(turn.text()),
        })
        .collect()
}

// ============================================================================
// Answer Finalization
// ============================================================================

/// 마크다운 코드 펜스 제거
///
/// 모델이 ```json ... ``` 으로 감싼 응답을 자주 보내므로
/// 파싱 전에 펜스를 벗겨냅니다.
fn clean_json_string(raw: &str) -> String {
    let trimmed = raw.trim();

    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);

    let without_close = without_open.strip_suffix("```").unwrap_or(without_open);

    without_close.trim().to_string()
}

/// 모델 원문에서 최종 답변 추출
///
/// `{"answer": "..."}` 형태면 answer 필드를 꺼내고,
/// 그 외의 모든 출력은 원문 그대로를 답변으로 취급합니다.
fn parse_answer(raw: &str) -> String {
    let cleaned = clean_json_string(raw);

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&cleaned) {
        if let Some(answer) = value.get("answer").and_then(|a| a.as_str()) {
            return answer.to_string();
        }
    }

    raw.trim().to_string()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use anyhow::Result;
    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::document::NewDocument;
    use crate::genai::FunctionDecl;
    use crate::knowledge::{ChunkEntry, MemoryVectorStore};

    // ------------------------------------------------------------------
    // Mocks
    // ------------------------------------------------------------------

    #[derive(Default)]
    struct MockModel {
        replies: Mutex<VecDeque<ModelReply>>,
        generate_prompts: Mutex<Vec<String>>,
        send_tool_counts: Mutex<Vec<usize>>,
    }

    impl MockModel {
        fn with_replies(replies: Vec<ModelReply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Default::default()
            }
        }

        fn text(reply: &str) -> Self {
            Self::with_replies(vec![ModelReply::Text(reply.to_string())])
        }
    }

    #[async_trait]
    impl ChatModel for MockModel {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.generate_prompts.lock().unwrap().push(prompt.to_string());
            match self.replies.lock().unwrap().pop_front() {
                Some(ModelReply::Text(text)) => Ok(text),
                _ => anyhow::bail!("mock model exhausted"),
            }
        }

        async fn send(&self, _history: &[Content], tools: &[FunctionDecl]) -> Result<ModelReply> {
            self.send_tool_counts.lock().unwrap().push(tools.len());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("mock model exhausted"))
        }
    }

    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn dimension(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[derive(Default)]
    struct RecordingWebTool {
        fetched: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WebTool for RecordingWebTool {
        async fn fetch_content(&self, url: &str) -> String {
            self.fetched.lock().unwrap().push(url.to_string());
            format!("page text from {}", url)
        }
    }

    // ------------------------------------------------------------------
    // Fixture
    // ------------------------------------------------------------------

    struct Fixture {
        _dir: TempDir,
        store: Arc<DocumentStore>,
        vectors: Arc<MemoryVectorStore>,
        web: Arc<RecordingWebTool>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let store = Arc::new(DocumentStore::open(&dir.path().join("test.db")).unwrap());
            Self {
                _dir: dir,
                store,
                vectors: Arc::new(MemoryVectorStore::new()),
                web: Arc::new(RecordingWebTool::default()),
            }
        }

        fn service(&self, model: Arc<MockModel>) -> ChatService {
            ChatService::new(
                model,
                Arc::new(FixedEmbedder),
                self.vectors.clone(),
                self.web.clone(),
                self.store.clone(),
            )
        }

        fn create_doc(&self, user_id: &str) -> String {
            self.store
                .create(NewDocument {
                    user_id: user_id.to_string(),
                    filename: "report.pdf".to_string(),
                    storage_path: "/tmp/report.pdf".to_string(),
                    summary: Some("A quarterly report".to_string()),
                })
                .unwrap()
                .id
        }
    }

    fn chunk(doc_id: &str, index: i32, text: &str, embedding: Vec<f32>) -> ChunkEntry {
        ChunkEntry {
            chunk_id: format!("{}-{}", doc_id, index),
            doc_id: doc_id.to_string(),
            chunk_index: index,
            chunk_text: text.to_string(),
            embedding,
        }
    }

    // ------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_plain_chat_parses_json_answer() {
        let fx = Fixture::new();
        let doc_id = fx.create_doc("alice");
        let service =
            fx.service(Arc::new(MockModel::text(r#"{"answer": "It covers Q3 results."}"#)));

        let reply = service
            .chat("alice", &doc_id, "What does it cover?")
            .await
            .unwrap();
        assert_eq!(reply.answer, "It covers Q3 results.");

        // 성공한 턴은 히스토리에 기록됨
        let doc = fx.store.get(&doc_id).unwrap().unwrap();
        assert_eq!(doc.chat_history.len(), 2);
        assert_eq!(doc.chat_history[0].text(), "What does it cover?");
        assert!(doc.chat_history[1].text().contains("Q3 results"));
    }

    #[tokio::test]
    async fn test_plain_chat_raw_text_fallback() {
        let fx = Fixture::new();
        let doc_id = fx.create_doc("alice");
        let service = fx.service(Arc::new(MockModel::text("Just a plain sentence.")));

        let reply = service.chat("alice", &doc_id, "hi").await.unwrap();
        assert_eq!(reply.answer, "Just a plain sentence.");

        // 저장되는 model 턴은 항상 JSON 계약 형태
        let doc = fx.store.get(&doc_id).unwrap().unwrap();
        let stored: serde_json::Value =
            serde_json::from_str(&doc.chat_history[1].text()).unwrap();
        assert_eq!(stored["answer"], "Just a plain sentence.");
    }

    #[tokio::test]
    async fn test_plain_chat_fenced_json() {
        let fx = Fixture::new();
        let doc_id = fx.create_doc("alice");
        let service =
            fx.service(Arc::new(MockModel::text("```json\n{\"answer\": \"fenced\"}\n```")));

        let reply = service.chat("alice", &doc_id, "hi").await.unwrap();
        assert_eq!(reply.answer, "fenced");
    }

    #[tokio::test]
    async fn test_wrong_owner_is_not_found() {
        let fx = Fixture::new();
        let doc_id = fx.create_doc("alice");
        let service = fx.service(Arc::new(MockModel::text("x")));

        let err = service.chat("mallory", &doc_id, "hi").await.unwrap_err();
        assert!(matches!(err, ChatbotError::NotFound));
    }

    #[tokio::test]
    async fn test_explicit_url_forces_fetch_without_tools() {
        let fx = Fixture::new();
        let doc_id = fx.create_doc("alice");
        let model = Arc::new(MockModel::text(r#"{"answer": "The page says hello."}"#));
        let service = fx.service(model.clone());

        let reply = service
            .chat("alice", &doc_id, "Summarize https://example.com/post please")
            .await
            .unwrap();
        assert_eq!(reply.answer, "The page says hello.");

        // 모델 호출 전에 페치가 일어나고, 도구는 선언되지 않음
        assert_eq!(
            *fx.web.fetched.lock().unwrap(),
            vec!["https://example.com/post".to_string()]
        );
        assert_eq!(*model.send_tool_counts.lock().unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn test_web_hint_advertises_tools_and_runs_call() {
        let fx = Fixture::new();
        let doc_id = fx.create_doc("alice");
        let model = Arc::new(MockModel::with_replies(vec![
            ModelReply::ToolCall {
                name: tools::FETCH_WEBPAGE_CONTENT.to_string(),
                args: serde_json::json!({"url": "https://docs.example.com"}),
            },
            ModelReply::Text(r#"{"answer": "Fetched and answered."}"#.to_string()),
        ]));
        let service = fx.service(model.clone());

        let reply = service
            .chat("alice", &doc_id, "what does the website for this report say?")
            .await
            .unwrap();
        assert_eq!(reply.answer, "Fetched and answered.");
        assert_eq!(
            *fx.web.fetched.lock().unwrap(),
            vec!["https://docs.example.com".to_string()]
        );
        // 두 번의 send 모두 도구 선언 포함
        assert_eq!(*model.send_tool_counts.lock().unwrap(), vec![1, 1]);
    }

    #[tokio::test]
    async fn test_unknown_tool_fails_without_history_write() {
        let fx = Fixture::new();
        let doc_id = fx.create_doc("alice");
        let model = Arc::new(MockModel::with_replies(vec![ModelReply::ToolCall {
            name: "get_weather".to_string(),
            args: serde_json::json!({}),
        }]));
        let service = fx.service(model);

        let err = service
            .chat("alice", &doc_id, "check the website")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatbotError::UnknownTool(_)));

        // 실패한 턴은 히스토리에 남지 않음
        let doc = fx.store.get(&doc_id).unwrap().unwrap();
        assert!(doc.chat_history.is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_leaves_history_untouched() {
        let fx = Fixture::new();
        let doc_id = fx.create_doc("alice");
        // 응답 없는 목 모델은 즉시 실패
        let service = fx.service(Arc::new(MockModel::default()));

        let err = service.chat("alice", &doc_id, "hi").await.unwrap_err();
        assert!(matches!(err, ChatbotError::Model(_)));

        let doc = fx.store.get(&doc_id).unwrap().unwrap();
        assert!(doc.chat_history.is_empty());
    }

    #[tokio::test]
    async fn test_chunked_doc_uses_rag_with_doc_scoped_context() {
        let fx = Fixture::new();
        let doc_id = fx.create_doc("alice");
        let other_id = fx.create_doc("alice");

        fx.vectors
            .insert_batch(&[
                chunk(&doc_id, 0, "revenue grew 12 percent", vec![1.0, 0.0]),
                chunk(&doc_id, 1, "costs were flat", vec![0.8, 0.2]),
                chunk(&other_id, 0, "unrelated document text", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();
        fx.store.set_chunked(&doc_id).unwrap();

        let model = Arc::new(MockModel::text(r#"{"answer": "Revenue grew 12 percent."}"#));
        let service = fx.service(model.clone());

        let reply = service
            .chat("alice", &doc_id, "How did revenue do?")
            .await
            .unwrap();
        assert_eq!(reply.answer, "Revenue grew 12 percent.");
    }

    #[tokio::test]
    async fn test_rag_prompt_contains_only_own_chunks() {
        let fx = Fixture::new();
        let doc_id = fx.create_doc("alice");
        let other_id = fx.create_doc("alice");

        fx.vectors
            .insert_batch(&[
                chunk(&doc_id, 0, "revenue grew 12 percent", vec![1.0, 0.0]),
                chunk(&other_id, 0, "unrelated document text", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();
        fx.store.set_chunked(&doc_id).unwrap();

        let model = Arc::new(MockModel::text(r#"{"answer": "ok"}"#));
        let service = fx.service(model.clone());

        service.chat("alice", &doc_id, "revenue?").await.unwrap();

        let prompts = model.generate_prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("revenue grew 12 percent"));
        assert!(!prompts[0].contains("unrelated document text"));
    }

    #[test]
    fn test_build_rag_prompt_includes_context_and_summary() {
        let prompt = build_rag_prompt(
            Some("summary text"),
            "chunk one\n\n---\n\nchunk two",
            "the question",
        );
        assert!(prompt.contains("summary text"));
        assert!(prompt.contains("chunk one"));
        assert!(prompt.contains("chunk two"));
        assert!(prompt.contains("the question"));
        assert!(prompt.contains(r#"{"answer""#));
    }

    #[test]
    fn test_build_plain_prompt_windows_history() {
        let mut history = Vec::new();
        for i in 0..15 {
            history.push(ChatTurn::user(format!("q{}", i)));
        }

        let prompt = build_plain_prompt(None, &history, "latest");
        // 최근 10개만 포함
        assert!(!prompt.contains("q4\n"));
        assert!(prompt.contains("q5"));
        assert!(prompt.contains("q14"));
        assert!(prompt.contains("latest"));
    }

    #[test]
    fn test_project_history_roles() {
        let history = vec![ChatTurn::user("hi"), ChatTurn::model("hello")];
        let contents = project_history(&history);
        assert_eq!(contents[0].role, "user");
        assert_eq!(contents[1].role, "model");
    }

    #[test]
    fn test_clean_json_string_variants() {
        assert_eq!(clean_json_string("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(clean_json_string("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(clean_json_string("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(clean_json_string("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_answer_contract_and_fallback() {
        assert_eq!(parse_answer(r#"{"answer": "yes"}"#), "yes");
        assert_eq!(parse_answer("```json\n{\"answer\": \"yes\"}\n```"), "yes");
        // answer 필드가 없는 JSON은 원문 취급
        assert_eq!(parse_answer(r#"{"reply": "no"}"#), r#"{"reply": "no"}"#);
        assert_eq!(parse_answer("plain text"), "plain text");
    }
}
