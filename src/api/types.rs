use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::lending::LendingError;
use crate::domain::commands::{BorrowBook, CreateBook, DeleteBook, ReturnBook};
use crate::domain::{
    Book, BookId, EmailAddress, EmailAddressError, Isbn, OpenLoan, ReturnedLoan,
};

/// 書籍検索のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct GetBookQuery {
    /// 検索キーの種別（"id" または "isbn"）
    pub podle: Option<String>,
}

/// 貸出リクエスト（POST /books/loan）
///
/// キーの欠落を安定したエラーコードで返すため、
/// 全フィールドをOptionで受けて明示的に検証する。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoanRequest {
    pub borrower_email: Option<String>,
    pub book_id: Option<String>,
}

impl Default for LoanRequest {
    fn default() -> Self {
        Self {
            borrower_email: None,
            book_id: None,
        }
    }
}

/// 借り手メールアドレス項目の検証
///
/// 欠落・空白はキー欠落として弾く。形だけ不正な値は
/// 「その利用者はいない」と同じ扱いにする。
fn parse_borrower_email(raw: Option<&str>) -> Result<EmailAddress, LendingError> {
    let raw = raw.ok_or(LendingError::MissingBodyKey("borrowerEmail"))?;
    EmailAddress::parse(raw).map_err(|err| match err {
        EmailAddressError::Blank => LendingError::MissingBodyKey("borrowerEmail"),
        EmailAddressError::MissingAtSign => LendingError::BorrowerNotFound,
    })
}

/// 書籍ID項目の検証
///
/// 欠落・空白はキー欠落、UUIDとして読めない値は
/// 「その書籍はない」と同じ扱いにする。
fn parse_book_id(raw: Option<&str>) -> Result<BookId, LendingError> {
    let raw = raw
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .ok_or(LendingError::MissingBodyKey("bookId"))?;
    let uuid = Uuid::parse_str(raw).map_err(|_| LendingError::BookNotFound)?;
    Ok(BookId::from_uuid(uuid))
}

impl LoanRequest {
    pub fn to_command(&self, borrowed_at: DateTime<Utc>) -> Result<BorrowBook, LendingError> {
        Ok(BorrowBook {
            borrower_email: parse_borrower_email(self.borrower_email.as_deref())?,
            book_id: parse_book_id(self.book_id.as_deref())?,
            borrowed_at,
        })
    }
}

/// 返却リクエスト（POST /books/return）
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReturnRequest {
    pub borrower_email: Option<String>,
    pub book_id: Option<String>,
}

impl Default for ReturnRequest {
    fn default() -> Self {
        Self {
            borrower_email: None,
            book_id: None,
        }
    }
}

impl ReturnRequest {
    pub fn to_command(&self, returned_at: DateTime<Utc>) -> Result<ReturnBook, LendingError> {
        Ok(ReturnBook {
            borrower_email: parse_borrower_email(self.borrower_email.as_deref())?,
            book_id: parse_book_id(self.book_id.as_deref())?,
            returned_at,
        })
    }
}

/// 書籍登録リクエスト（POST /books/create）
#[derive(Debug, Default, Deserialize)]
pub struct CreateBookRequest {
    pub data: Option<CreateBookData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateBookData {
    pub isbn: Option<String>,
    pub name: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
    pub cover: Option<String>,
    pub total: Option<u32>,
}

impl CreateBookRequest {
    /// 項目を1つずつ確認する明示的な連言
    ///
    /// どれか1つでも欠けていれば`MissingFields`。
    /// total は 0 冊でも「存在する」扱い（値の真偽では判定しない）。
    pub fn to_command(&self) -> Result<CreateBook, LendingError> {
        let data = self.data.as_ref().ok_or(LendingError::MissingFields)?;

        let isbn = data.isbn.as_deref().ok_or(LendingError::MissingFields)?;
        let isbn = Isbn::parse(isbn).map_err(|_| LendingError::MissingFields)?;
        let name = data.name.clone().ok_or(LendingError::MissingFields)?;
        let author = data.author.clone().ok_or(LendingError::MissingFields)?;
        let genre = data.genre.clone().ok_or(LendingError::MissingFields)?;
        let cover = data.cover.clone().ok_or(LendingError::MissingFields)?;
        let total = data.total.ok_or(LendingError::MissingFields)?;

        Ok(CreateBook {
            isbn,
            name,
            author,
            genre,
            cover,
            total,
        })
    }
}

/// 書籍削除リクエスト（POST /books/delete）
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeleteBookRequest {
    pub id: Option<String>,
}

impl DeleteBookRequest {
    pub fn to_command(&self) -> Result<DeleteBook, LendingError> {
        let raw = self
            .id
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .ok_or(LendingError::MissingId)?;
        let uuid = Uuid::parse_str(raw).map_err(|_| LendingError::MissingId)?;
        Ok(DeleteBook {
            book_id: BookId::from_uuid(uuid),
        })
    }
}

/// 書籍レスポンス
#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub id: Uuid,
    pub isbn: String,
    pub name: String,
    pub author: String,
    pub genre: String,
    pub cover: String,
    pub total: u32,
    pub available: u32,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.book_id.value(),
            isbn: book.isbn.as_str().to_string(),
            name: book.name,
            author: book.author,
            genre: book.genre,
            cover: book.cover,
            total: book.counts.total(),
            available: book.counts.available(),
        }
    }
}

/// 貸出レスポンス
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanResponse {
    pub id: Uuid,
    pub book_id: Uuid,
    pub borrower_id: Uuid,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_date: Option<DateTime<Utc>>,
    pub returned: bool,
}

impl From<OpenLoan> for LoanResponse {
    fn from(loan: OpenLoan) -> Self {
        Self {
            id: loan.loan_id.value(),
            book_id: loan.book_id.value(),
            borrower_id: loan.borrower_id.value(),
            borrow_date: loan.borrowed_at,
            due_date: loan.due_date,
            returned_date: None,
            returned: false,
        }
    }
}

impl From<ReturnedLoan> for LoanResponse {
    fn from(loan: ReturnedLoan) -> Self {
        Self {
            id: loan.loan_id.value(),
            book_id: loan.book_id.value(),
            borrower_id: loan.borrower_id.value(),
            borrow_date: loan.borrowed_at,
            due_date: loan.due_date,
            returned_date: Some(loan.returned_at),
            returned: true,
        }
    }
}

/// エラーレスポンス
///
/// クライアントが機械的に扱えるのは安定したコードだけ。
/// 詳細はサーバ側のログに出す。
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>) -> Self {
        Self { error: code.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loan_request_missing_email_is_body_key_error() {
        let req = LoanRequest {
            borrower_email: None,
            book_id: Some(Uuid::new_v4().to_string()),
        };

        let err = req.to_command(Utc::now()).unwrap_err();
        assert!(matches!(err, LendingError::MissingBodyKey("borrowerEmail")));
    }

    #[test]
    fn test_loan_request_blank_book_id_is_body_key_error() {
        let req = LoanRequest {
            borrower_email: Some("reader@example.com".to_string()),
            book_id: Some("   ".to_string()),
        };

        let err = req.to_command(Utc::now()).unwrap_err();
        assert!(matches!(err, LendingError::MissingBodyKey("bookId")));
    }

    #[test]
    fn test_loan_request_malformed_book_id_reads_as_unknown_book() {
        let req = LoanRequest {
            borrower_email: Some("reader@example.com".to_string()),
            book_id: Some("not-a-uuid".to_string()),
        };

        let err = req.to_command(Utc::now()).unwrap_err();
        assert!(matches!(err, LendingError::BookNotFound));
    }

    #[test]
    fn test_create_book_request_rejects_any_missing_field() {
        let full = CreateBookData {
            isbn: Some("978-1".to_string()),
            name: Some("n".to_string()),
            author: Some("a".to_string()),
            genre: Some("g".to_string()),
            cover: Some("c".to_string()),
            total: Some(1),
        };

        // どの1項目が欠けてもMissingFieldsになる
        for drop in 0..6 {
            let mut data = CreateBookData {
                isbn: full.isbn.clone(),
                name: full.name.clone(),
                author: full.author.clone(),
                genre: full.genre.clone(),
                cover: full.cover.clone(),
                total: full.total,
            };
            match drop {
                0 => data.isbn = None,
                1 => data.name = None,
                2 => data.author = None,
                3 => data.genre = None,
                4 => data.cover = None,
                _ => data.total = None,
            }
            let req = CreateBookRequest { data: Some(data) };
            assert!(matches!(
                req.to_command().unwrap_err(),
                LendingError::MissingFields
            ));
        }
    }

    #[test]
    fn test_create_book_request_accepts_zero_total() {
        let req = CreateBookRequest {
            data: Some(CreateBookData {
                isbn: Some("978-1".to_string()),
                name: Some("n".to_string()),
                author: Some("a".to_string()),
                genre: Some("g".to_string()),
                cover: Some("c".to_string()),
                total: Some(0),
            }),
        };

        let cmd = req.to_command().unwrap();
        assert_eq!(cmd.total, 0);
    }

    #[test]
    fn test_delete_request_without_id_is_missing_id() {
        let req = DeleteBookRequest { id: None };
        assert!(matches!(
            req.to_command().unwrap_err(),
            LendingError::MissingId
        ));
    }
}
