use uuid::Uuid;

use crate::domain::commands::{CreateBook, DeleteBook};
use crate::domain::{Book, BookId, Isbn, NewBook};
use crate::ports::{PrivilegedAction, RequestContext};

use super::errors::{LendingError, Result};
use super::loan_service::ServiceDependencies;

/// 書籍の検索キーの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSelector {
    Id,
    Isbn,
}

impl BookSelector {
    /// クエリパラメータから種別を解釈する（大文字小文字は区別しない）
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "id" => Ok(BookSelector::Id),
            "isbn" => Ok(BookSelector::Isbn),
            other => Err(LendingError::InvalidQuery(format!(
                "unknown selector: {other}"
            ))),
        }
    }
}

/// 全書籍の一覧を返す
pub async fn list_books(deps: &ServiceDependencies) -> Result<Vec<Book>> {
    Ok(deps.store.list_books().await?)
}

/// 書籍をIDまたはISBNで検索する
///
/// 種別の指定は必須。見つからない場合はNone（エラーではない）。
pub async fn get_book(
    deps: &ServiceDependencies,
    selector: Option<&str>,
    key: &str,
) -> Result<Option<Book>> {
    let selector = selector
        .ok_or_else(|| LendingError::InvalidQuery("selector is required".to_string()))
        .and_then(BookSelector::parse)?;

    match selector {
        BookSelector::Id => {
            let uuid = Uuid::parse_str(key)
                .map_err(|_| LendingError::InvalidQuery(format!("malformed book id: {key}")))?;
            Ok(deps.store.find_book_by_id(BookId::from_uuid(uuid)).await?)
        }
        BookSelector::Isbn => {
            let isbn = Isbn::parse(key)
                .map_err(|_| LendingError::InvalidQuery("blank isbn".to_string()))?;
            Ok(deps.store.find_book_by_isbn(&isbn).await?)
        }
    }
}

/// 書籍を登録する
///
/// ビジネスルール：
/// - 書籍登録は特権操作（権限ゲートを通す）
/// - 全項目が埋まっていること。項目ごとに個別に確認する
/// - ISBNをキーとする原子的get-or-create。既存なら内容を変えずに返す
///
/// # 戻り値
/// 登録された、または既存のBook
pub async fn create_book(
    deps: &ServiceDependencies,
    ctx: &RequestContext,
    cmd: CreateBook,
) -> Result<Book> {
    // 1. 権限確認（ストアアクセスより前）
    super::loan_service::require_capability(deps, ctx, PrivilegedAction::CreateBook).await?;

    // 2. 全項目の確認。1項目ずつの明示的な連言で行う
    if cmd.name.trim().is_empty()
        || cmd.author.trim().is_empty()
        || cmd.genre.trim().is_empty()
        || cmd.cover.trim().is_empty()
    {
        return Err(LendingError::MissingFields);
    }

    // 3. ISBNキーのget-or-create
    let book = deps
        .store
        .get_or_create_book(NewBook {
            isbn: cmd.isbn,
            name: cmd.name,
            author: cmd.author,
            genre: cmd.genre,
            cover: cmd.cover,
            total: cmd.total,
        })
        .await?;

    Ok(book)
}

/// 書籍を削除する
///
/// 権限ゲートの対象外（意図的な非対称、DESIGN.md参照）。
/// 存在しないIDの削除も成功として扱う（冪等）。
pub async fn delete_book(deps: &ServiceDependencies, cmd: DeleteBook) -> Result<()> {
    deps.store.delete_book(cmd.book_id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_selector_parse_is_case_insensitive() {
        assert_eq!(BookSelector::parse("ISBN").unwrap(), BookSelector::Isbn);
        assert_eq!(BookSelector::parse("Id").unwrap(), BookSelector::Id);
    }

    #[test]
    fn test_book_selector_parse_rejects_unknown() {
        let err = BookSelector::parse("title").unwrap_err();
        assert!(matches!(err, LendingError::InvalidQuery(_)));
    }
}
