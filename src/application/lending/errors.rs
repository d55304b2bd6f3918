use thiserror::Error;

use crate::ports::StoreError;

/// 貸出管理アプリケーション層のエラー
///
/// コア境界を越える失敗はすべてこの型で返す（例外は投げない）。
/// `code()`が呼び出し層向けの安定したエラーコードを与える。
#[derive(Debug, Error)]
pub enum LendingError {
    /// リクエストボディの必須キーが欠けている
    #[error("missing request body key: {0}")]
    MissingBodyKey(&'static str),

    /// 書籍登録の必須項目が欠けている
    #[error("every book field must be present and non-blank")]
    MissingFields,

    /// 削除対象のIDが欠けている
    #[error("missing book id")]
    MissingId,

    /// 検索条件が不正
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// メールアドレスに対応する利用者がいない
    #[error("no user with that email address")]
    BorrowerNotFound,

    /// IDに対応する書籍がない
    #[error("no book with that id")]
    BookNotFound,

    /// 未返却の貸出が見つからない
    #[error("no open loan for that book and borrower")]
    LoanNotFound,

    /// 貸出可能な冊数が残っていない
    #[error("no copies available")]
    OutOfStock,

    /// 権限ゲートが拒否した
    #[error("capability check denied")]
    Unauthorized,

    /// 書き込み競合が再試行の上限まで解消しなかった（一時的エラー）
    #[error("write conflict persisted across retries")]
    WriteConflict,

    /// 冊数と貸出記録の食い違いを検出した
    #[error("inventory consistency violation: {0}")]
    ConsistencyViolation(String),

    /// ストアのエラー
    #[error("store error")]
    Store(#[source] StoreError),

    /// 権限ゲートのエラー
    #[error("auth gate error")]
    AuthGateFailure(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LendingError {
    /// 呼び出し層に返す安定したエラーコード
    pub fn code(&self) -> &'static str {
        match self {
            LendingError::MissingBodyKey(_) => "MISSING_BODY_KEY",
            LendingError::MissingFields => "MISSING_FIELDS",
            LendingError::MissingId => "MISSING_ID",
            LendingError::InvalidQuery(_) => "INVALID_QUERY",
            LendingError::BorrowerNotFound => "INVALID_USER_EMAIL",
            LendingError::BookNotFound => "INVALID_BOOK_ID",
            LendingError::LoanNotFound => "LOAN_NOT_FOUND",
            LendingError::OutOfStock => "OUT_OF_STOCK",
            LendingError::Unauthorized => "UNAUTHORIZED",
            LendingError::WriteConflict => "WRITE_CONFLICT",
            LendingError::ConsistencyViolation(_) => "CONSISTENCY_VIOLATION",
            LendingError::Store(_) => "STORE_ERROR",
            LendingError::AuthGateFailure(_) => "AUTH_GATE_ERROR",
        }
    }
}

impl From<StoreError> for LendingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::WriteConflict => LendingError::WriteConflict,
            other => LendingError::Store(other),
        }
    }
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, LendingError>;
