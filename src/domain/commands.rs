use chrono::{DateTime, Utc};

use super::{BookId, EmailAddress, Isbn};

/// 貸出コマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowBook {
    pub borrower_email: EmailAddress,
    pub book_id: BookId,
    pub borrowed_at: DateTime<Utc>,
}

/// 返却コマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnBook {
    pub borrower_email: EmailAddress,
    pub book_id: BookId,
    pub returned_at: DateTime<Utc>,
}

/// 書籍登録コマンド
///
/// ISBNをキーにget-or-createされるため、同じISBNの再登録は
/// 既存のBookを返すだけで冊数は変えない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateBook {
    pub isbn: Isbn,
    pub name: String,
    pub author: String,
    pub genre: String,
    pub cover: String,
    pub total: u32,
}

/// 書籍削除コマンド
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteBook {
    pub book_id: BookId,
}
