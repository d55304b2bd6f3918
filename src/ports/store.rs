use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{Book, BookId, CopyCounts, EmailAddress, Isbn, LoanId, NewBook, OpenLoan, User, UserId};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// ストアのエラー
///
/// 競合（WriteConflict）だけは型で区別する。呼び出し側が
/// トランザクションをやり直すかどうかの判断に使うため。
#[derive(Debug, Error)]
pub enum StoreError {
    /// 条件付き書き込みが他のトランザクションに先を越された
    #[error("write conflict on a concurrently modified row")]
    WriteConflict,

    /// バックエンド固有の失敗
    #[error("storage backend failure")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        StoreError::Backend(err.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::WriteConflict)
    }
}

/// ストアトランザクションポート
///
/// 貸出1件分の複合更新（引き当て＋貸出作成、返却＋棚戻し）を
/// 全適用か全破棄かのどちらかにするための作業単位。
///
/// 契約：
/// - 読み取りは呼び出し時点のコミット済み状態を返す
/// - 書き込みは期待する事前状態を添えた条件付き更新。期待が外れた場合は
///   `StoreError::WriteConflict`（遅くともcommit時に）
/// - commitせずにdropされたトランザクションは観測可能な効果を残さない
#[async_trait]
pub trait StoreTransaction: Send {
    /// 書籍を読み込む
    async fn fetch_book(&mut self, book_id: BookId) -> StoreResult<Option<Book>>;

    /// 冊数を条件付きで書き換える
    ///
    /// 現在の冊数が`expected`と一致する場合に限り`next`へ更新する。
    /// 一致しない場合は`WriteConflict`。
    async fn update_book_counts(
        &mut self,
        book_id: BookId,
        expected: CopyCounts,
        next: CopyCounts,
    ) -> StoreResult<()>;

    /// 新しい貸出記録を追加する
    async fn insert_loan(&mut self, loan: &OpenLoan) -> StoreResult<()>;

    /// 書籍×借り手の未返却の貸出のうち、最も新しく作成されたものを返す
    async fn latest_open_loan(
        &mut self,
        book_id: BookId,
        borrower_id: UserId,
    ) -> StoreResult<Option<OpenLoan>>;

    /// 貸出を返却済みにする
    ///
    /// 対象がまだ未返却である場合に限り更新する。
    /// 既に返却済み・存在しない場合は`WriteConflict`。
    async fn mark_returned(
        &mut self,
        loan_id: LoanId,
        returned_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// トランザクションを確定する
    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

/// 永続ストアポート
///
/// Book・User・Loanの全エンティティ状態を所有する。
/// 単発の読み取りと、キー一意なget-or-createはトランザクション外でも
/// 原子的に提供する。
#[async_trait]
pub trait LendingStore: Send + Sync {
    /// 複合更新のためのトランザクションを開始する
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;

    /// メールアドレスで利用者を解決する
    async fn find_user_by_email(&self, email: &EmailAddress) -> StoreResult<Option<User>>;

    /// IDで書籍を取得する
    async fn find_book_by_id(&self, book_id: BookId) -> StoreResult<Option<Book>>;

    /// ISBNで書籍を取得する
    async fn find_book_by_isbn(&self, isbn: &Isbn) -> StoreResult<Option<Book>>;

    /// 全書籍を取得する
    async fn list_books(&self) -> StoreResult<Vec<Book>>;

    /// ISBNをキーに書籍を取得または登録する
    ///
    /// 同じISBNに対する並行呼び出しでも重複登録しない（原子的get-or-insert）。
    /// 既存の書籍が見つかった場合は内容を上書きせずそのまま返す。
    async fn get_or_create_book(&self, new_book: NewBook) -> StoreResult<Book>;

    /// 書籍を削除する
    ///
    /// 存在しなかった場合はfalseを返す。
    async fn delete_book(&self, book_id: BookId) -> StoreResult<bool>;
}
