//! Document Store - rusqlite 기반 문서/대화 저장소
//!
//! 업로드된 문서 메타데이터와 대화 로그를 저장합니다.
//! 저장 위치: ~/.docchat/documents.db

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 대화 로그 소프트 상한 - 이 개수를 넘으면 가지치기
pub const HISTORY_SOFT_CAP: usize = 50;

/// 가지치기 후 유지하는 최근 엔트리 수
pub const HISTORY_RETAIN: usize = 30;

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.docchat/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".docchat")
}

// ============================================================================
// Types
// ============================================================================

/// 대화 턴 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// 턴의 텍스트 파트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnPart {
    pub text: String,
}

/// 저장되는 대화 턴: `{role, parts: [{text}]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub parts: Vec<TurnPart>,
}

impl ChatTurn {
    /// user 턴 생성
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![TurnPart { text: text.into() }],
        }
    }

    /// model 턴 생성
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![TurnPart { text: text.into() }],
        }
    }

    /// 파트 텍스트를 이어 붙여 반환
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// 저장된 문서
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub user_id: String,
    pub filename: String,
    /// 원본 페이로드 파일 경로
    pub storage_path: String,
    /// 요약 (요약 완료 전까지 None)
    pub summary: Option<String>,
    /// RAG 인제스트 완료 여부 - false에서 true로 정확히 한 번만 전이
    pub chunked: bool,
    pub chat_history: Vec<ChatTurn>,
    pub created_at: DateTime<Utc>,
}

/// 새 문서 입력용 구조체
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub user_id: String,
    pub filename: String,
    pub storage_path: String,
    pub summary: Option<String>,
}

// ============================================================================
// DocumentStore
// ============================================================================

/// Document Store - SQLite 기반 문서/대화 저장소
pub struct DocumentStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl DocumentStore {
    /// 저장소 열기 (없으면 생성)
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create database directory")?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open SQLite database")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };

        store.initialize()?;
        Ok(store)
    }

    /// 기본 위치에서 열기 (~/.docchat/documents.db)
    pub fn open_default() -> Result<Self> {
        let data_dir = get_data_dir();
        if !data_dir.exists() {
            std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;
        }

        Self::open(&data_dir.join("documents.db"))
    }

    /// DB 경로 반환
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// 스키마 초기화
    fn initialize(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                storage_path TEXT NOT NULL,
                summary TEXT,
                chunked INTEGER NOT NULL DEFAULT 0,
                chat_history TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )
        .context("Failed to create documents table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_user ON documents(user_id)",
            [],
        )
        .context("Failed to create user index")?;

        tracing::debug!("Document store initialized at {:?}", self.db_path);
        Ok(())
    }

    /// 문서 생성
    pub fn create(&self, doc: NewDocument) -> Result<Document> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        conn.execute(
            "INSERT INTO documents (id, user_id, filename, storage_path, summary, chunked, chat_history, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, '[]', ?6)",
            params![
                id,
                doc.user_id,
                doc.filename,
                doc.storage_path,
                doc.summary,
                created_at.to_rfc3339()
            ],
        )
        .context("Failed to insert document")?;

        tracing::info!("Created document: {} (id={})", doc.filename, id);

        Ok(Document {
            id,
            user_id: doc.user_id,
            filename: doc.filename,
            storage_path: doc.storage_path,
            summary: doc.summary,
            chunked: false,
            chat_history: vec![],
            created_at,
        })
    }

    /// ID로 문서 조회 (소유자 무관, 내부용)
    pub fn get(&self, id: &str) -> Result<Option<Document>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        Self::query_one(&conn, id)
    }

    /// ID + 소유자로 문서 조회
    ///
    /// 문서가 없거나 소유자가 다르면 None을 반환합니다.
    /// 소유자 불일치를 구분하지 않는 것은 의도된 동작입니다 (404 상당).
    pub fn get_owned(&self, id: &str, user_id: &str) -> Result<Option<Document>> {
        Ok(self
            .get(id)?
            .filter(|doc| doc.user_id == user_id))
    }

    /// 사용자의 문서 목록 (최신순)
    pub fn list(&self, user_id: &str) -> Result<Vec<Document>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT id, user_id, filename, storage_path, summary, chunked, chat_history, created_at
             FROM documents
             WHERE user_id = ?1
             ORDER BY created_at DESC",
        )?;

        let docs = stmt
            .query_map(params![user_id], Self::row_to_document)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read document rows")?;

        Ok(docs)
    }

    /// 문서 삭제
    pub fn delete(&self, id: &str) -> Result<bool> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let rows = conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// chunked 플래그를 true로 전이 (단조, 조건부 업데이트)
    ///
    /// 이미 true인 문서에는 아무 효과가 없으며 false를 반환합니다.
    /// 모든 청크가 벡터 저장소에 기록된 후에만 호출해야 합니다.
    pub fn set_chunked(&self, id: &str) -> Result<bool> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let rows = conn.execute(
            "UPDATE documents SET chunked = 1 WHERE id = ?1 AND chunked = 0",
            params![id],
        )?;

        if rows > 0 {
            tracing::info!("Document {} marked as chunked", id);
        }

        Ok(rows > 0)
    }

    /// 요약 갱신
    pub fn set_summary(&self, id: &str, summary: &str) -> Result<bool> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let rows = conn.execute(
            "UPDATE documents SET summary = ?2 WHERE id = ?1",
            params![id, summary],
        )?;

        Ok(rows > 0)
    }

    /// 한 교환(user 턴 + model 턴)을 대화 로그에 추가
    ///
    /// 로그가 소프트 상한을 넘으면 가장 최근 `HISTORY_RETAIN`개만 남깁니다.
    /// 읽기-수정-쓰기가 커넥션 락 안에서 일어나므로 개별 추가는 원자적입니다.
    pub fn append_exchange(&self, id: &str, user_turn: ChatTurn, model_turn: ChatTurn) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let history_json: String = conn
            .query_row(
                "SELECT chat_history FROM documents WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .context("Document not found for history append")?;

        let mut history: Vec<ChatTurn> =
            serde_json::from_str(&history_json).context("Failed to parse stored chat history")?;

        history.push(user_turn);
        history.push(model_turn);

        // 보존 정책: 상한 초과 시 최근 엔트리만 유지
        if history.len() > HISTORY_SOFT_CAP {
            let excess = history.len() - HISTORY_RETAIN;
            history.drain(..excess);
            tracing::debug!("Pruned chat history of document {} to {}", id, HISTORY_RETAIN);
        }

        let updated = serde_json::to_string(&history).context("Failed to serialize chat history")?;

        conn.execute(
            "UPDATE documents SET chat_history = ?2 WHERE id = ?1",
            params![id, updated],
        )
        .context("Failed to update chat history")?;

        Ok(())
    }

    /// 저장된 문서 수
    pub fn count(&self) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn query_one(conn: &Connection, id: &str) -> Result<Option<Document>> {
        let mut stmt = conn.prepare(
            "SELECT id, user_id, filename, storage_path, summary, chunked, chat_history, created_at
             FROM documents WHERE id = ?1",
        )?;

        // 행이 없을 때만 None. 그 외의 실패는 저장소 에러로 전파
        let doc = stmt
            .query_row(params![id], Self::row_to_document)
            .optional()
            .context("Failed to query document")?;
        Ok(doc)
    }

    fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
        let history_json: String = row.get(6)?;
        // 깨진 대화 로그를 빈 로그로 둔갑시키지 않음
        let chat_history = serde_json::from_str(&history_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Document {
            id: row.get(0)?,
            user_id: row.get(1)?,
            filename: row.get(2)?,
            storage_path: row.get(3)?,
            summary: row.get(4)?,
            chunked: row.get::<_, i64>(5)? != 0,
            chat_history,
            created_at: parse_datetime(row.get::<_, String>(7)?),
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// RFC3339 문자열을 DateTime<Utc>로 파싱
fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ============================================================================
// Tests
// ============================================================================
