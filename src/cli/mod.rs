//! CLI 모듈
//!
//! docchat CLI 명령어 정의 및 구현

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::chat::ChatService;
use crate::document::{get_data_dir, Document, DocumentStore};
use crate::embedding::{has_api_key, GeminiEmbedding};
use crate::genai::GeminiChat;
use crate::ingest::IngestService;
use crate::knowledge::LanceVectorStore;
use crate::webtool::WebPageTool;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "docchat")]
#[command(version, about = "PDF 문서 대화 서비스", long_about = None)]
pub struct Cli {
    /// 사용자 ID (문서 소유자 스코프)
    #[arg(short, long, global = true, default_value = "local")]
    pub user: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 문서 업로드 (텍스트 추출 + 요약 생성)
    Upload {
        /// 업로드할 파일 경로 (PDF 또는 텍스트)
        file: PathBuf,
    },

    /// 저장된 문서 목록
    List,

    /// 문서 상세 조회 (요약 + 대화 로그)
    Show {
        /// 문서 ID
        id: String,
    },

    /// 문서에 대해 질문
    Chat {
        /// 문서 ID
        id: String,

        /// 질문 메시지
        message: String,
    },

    /// 문서를 지금 청킹/임베딩 (백그라운드 인제스트 수동 실행)
    Ingest {
        /// 문서 ID
        id: String,
    },

    /// 문서 삭제 (벡터, 레코드, 페이로드 모두)
    Delete {
        /// 문서 ID
        id: String,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let user = cli.user;

    match cli.command {
        Commands::Upload { file } => cmd_upload(&user, &file).await,
        Commands::List => cmd_list(&user).await,
        Commands::Show { id } => cmd_show(&user, &id).await,
        Commands::Chat { id, message } => cmd_chat(&user, &id, &message).await,
        Commands::Ingest { id } => cmd_ingest(&user, &id).await,
        Commands::Delete { id } => cmd_delete(&user, &id).await,
        Commands::Status => cmd_status().await,
    }
}

// ============================================================================
// Service Construction
// ============================================================================

/// 전체 서비스 스택 조립
struct Services {
    store: Arc<DocumentStore>,
    ingest: IngestService,
    chat: ChatService,
}

async fn build_services() -> Result<Services> {
    require_api_key()?;

    let data_dir = get_data_dir();
    let store = Arc::new(DocumentStore::open_default().context("문서 저장소 열기 실패")?);

    let vectors = Arc::new(
        LanceVectorStore::open(&data_dir.join("vectors.lance"))
            .await
            .context("벡터 저장소 열기 실패")?,
    );

    let model = Arc::new(GeminiChat::from_env().context("생성 모델 초기화 실패")?);
    let embedder = Arc::new(GeminiEmbedding::from_env().context("임베딩 초기화 실패")?);
    let web = Arc::new(WebPageTool::new().context("웹 도구 초기화 실패")?);

    let ingest = IngestService::new(
        model.clone(),
        embedder.clone(),
        vectors.clone(),
        store.clone(),
        data_dir.join("uploads"),
    );

    let chat = ChatService::new(model, embedder, vectors, web, store.clone());

    Ok(Services {
        store,
        ingest,
        chat,
    })
}

fn require_api_key() -> Result<()> {
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             또는\n  \
             export GOOGLE_AI_API_KEY=your-api-key\n\n\
             API 키 발급: https://aistudio.google.com/app/apikey"
        );
    }
    Ok(())
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 업로드 명령어 (upload)
///
/// 파일에서 텍스트를 추출하고 요약을 생성한 뒤 문서를 등록합니다.
async fn cmd_upload(user: &str, file: &PathBuf) -> Result<()> {
    let services = build_services().await?;

    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();

    println!("[*] 파일 읽는 중: {}", file.display());
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("파일을 읽을 수 없습니다: {}", file.display()))?;

    println!("[*] 텍스트 추출 및 요약 생성 중...");
    let doc = services
        .ingest
        .upload(user, &filename, bytes)
        .await
        .context("업로드 실패")?;

    println!("[OK] 문서가 추가되었습니다 (ID: {})", doc.id);
    if let Some(ref summary) = doc.summary {
        println!("     요약: {}", truncate_text(summary, 200));
    }
    if !doc.chunked {
        println!("     (소형 문서: 대화 시 요약/본문 컨텍스트 사용)");
    }

    Ok(())
}

/// 목록 명령어 (list)
async fn cmd_list(user: &str) -> Result<()> {
    let store = DocumentStore::open_default().context("문서 저장소 열기 실패")?;

    let docs = store.list(user).context("문서 목록 조회 실패")?;

    if docs.is_empty() {
        println!("[!] 저장된 문서가 없습니다.");
        return Ok(());
    }

    println!("[OK] 저장된 문서 ({} 건):\n", docs.len());

    for doc in docs {
        print_document_line(&doc);
    }

    Ok(())
}

/// 상세 조회 명령어 (show)
async fn cmd_show(user: &str, id: &str) -> Result<()> {
    let store = DocumentStore::open_default().context("문서 저장소 열기 실패")?;

    let doc = store
        .get_owned(id, user)
        .context("문서 조회 실패")?
        .ok_or_else(|| anyhow::anyhow!("ID '{}'인 문서를 찾을 수 없습니다", id))?;

    println!("문서: {} ({})", doc.filename, doc.id);
    println!("업로드: {}", doc.created_at.format("%Y-%m-%d %H:%M"));
    println!("RAG 인제스트: {}", if doc.chunked { "완료" } else { "안 됨" });
    println!();
    println!("요약:");
    println!("  {}", doc.summary.as_deref().unwrap_or("-"));

    if !doc.chat_history.is_empty() {
        println!();
        println!("대화 로그 ({} 턴):", doc.chat_history.len());
        for turn in &doc.chat_history {
            let speaker = match turn.role {
                crate::document::Role::User => "나",
                crate::document::Role::Model => "봇",
            };
            println!("  [{}] {}", speaker, truncate_text(&turn.text(), 150));
        }
    }

    Ok(())
}

/// 대화 명령어 (chat)
async fn cmd_chat(user: &str, id: &str, message: &str) -> Result<()> {
    let services = build_services().await?;

    println!("[*] 질문: {}", message);

    let reply = services.chat.chat(user, id, message).await?;

    println!();
    println!("{}", reply.answer);

    Ok(())
}

/// 수동 인제스트 명령어 (ingest)
async fn cmd_ingest(user: &str, id: &str) -> Result<()> {
    let services = build_services().await?;

    // 소유자 확인 후 인제스트
    services
        .store
        .get_owned(id, user)
        .context("문서 조회 실패")?
        .ok_or_else(|| anyhow::anyhow!("ID '{}'인 문서를 찾을 수 없습니다", id))?;

    println!("[*] 청킹/임베딩 중...");
    services.ingest.process_document(id).await?;

    println!("[OK] 인제스트 완료. 이후 대화는 RAG 검색을 사용합니다.");
    Ok(())
}

/// 삭제 명령어 (delete)
async fn cmd_delete(user: &str, id: &str) -> Result<()> {
    let services = build_services().await?;

    services.ingest.delete(user, id).await?;

    println!("[OK] 문서 {} 삭제됨", id);
    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status() -> Result<()> {
    println!("docchat v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let data_dir = get_data_dir();
    println!("[*] 데이터 디렉토리: {}", data_dir.display());

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    match DocumentStore::open_default() {
        Ok(store) => match store.count() {
            Ok(count) => println!("[OK] 저장된 문서: {} 건", count),
            Err(e) => println!("[!] 문서 수 조회 실패: {}", e),
        },
        Err(e) => println!("[!] 문서 저장소 열기 실패: {}", e),
    }

    match LanceVectorStore::open(&data_dir.join("vectors.lance")).await {
        Ok(vectors) => {
            use crate::knowledge::VectorStore;
            match vectors.count().await {
                Ok(count) => println!("[OK] 벡터 인덱스: {} 청크", count),
                Err(e) => tracing::debug!("벡터 통계 조회 실패: {}", e),
            }
        }
        Err(e) => tracing::debug!("벡터 저장소 열기 실패: {}", e),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 문서 한 건 요약 출력
fn print_document_line(doc: &Document) {
    let flag = if doc.chunked { "RAG" } else { "CTX" };
    println!("  [{}] {} {}", flag, doc.id, doc.filename);
    if let Some(ref summary) = doc.summary {
        println!("        {}", truncate_text(summary, 100));
    }
    println!(
        "        {} | 대화 {} 턴",
        doc.created_at.format("%Y-%m-%d %H:%M"),
        doc.chat_history.len()
    );
    println!();
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

// ============================================================================
// Tests
// ============================================================================
