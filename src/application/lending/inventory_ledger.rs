use crate::domain::{Book, BookId, CopyCountError};
use crate::ports::StoreTransaction;

use super::errors::{LendingError, Result};

/// 在庫台帳：1冊を貸出に引き当てる
///
/// トランザクション内で冊数を読み、読んだ値を事前条件とする
/// 条件付き更新を積む。並行する引き当てが先に確定していれば
/// 書き込み競合になり、呼び出し側がトランザクションごとやり直す。
/// N並行の引き当てに対して成功するのはちょうどmin(N, available)件で、
/// 貸出可能数が負になることはない。
///
/// # エラー
/// - `BookNotFound`: 書籍が存在しない
/// - `OutOfStock`: 貸出可能数が0
pub async fn reserve_copy(txn: &mut dyn StoreTransaction, book_id: BookId) -> Result<Book> {
    let book = txn
        .fetch_book(book_id)
        .await?
        .ok_or(LendingError::BookNotFound)?;

    let next = match book.counts.reserve() {
        Ok(next) => next,
        Err(CopyCountError::Depleted) => return Err(LendingError::OutOfStock),
        Err(CopyCountError::ExceedsTotal) => {
            return Err(LendingError::ConsistencyViolation(format!(
                "book {} holds more available copies than its total",
                book_id
            )));
        }
    };

    txn.update_book_counts(book_id, book.counts, next).await?;

    Ok(Book {
        counts: next,
        ..book
    })
}

/// 在庫台帳：返却された1冊を棚に戻す
///
/// 引き当てと同じ条件付き更新の型。全冊が既に棚にある状態での
/// 棚戻しは、対応する引き当てなしの返却を意味するため
/// 一貫性違反として拒否する。黙ってtotalに切り詰めることはしない。
///
/// # エラー
/// - `BookNotFound`: 書籍が存在しない
/// - `ConsistencyViolation`: available == total での棚戻し
pub async fn release_copy(txn: &mut dyn StoreTransaction, book_id: BookId) -> Result<Book> {
    let book = txn
        .fetch_book(book_id)
        .await?
        .ok_or(LendingError::BookNotFound)?;

    let next = match book.counts.release() {
        Ok(next) => next,
        Err(CopyCountError::Depleted) | Err(CopyCountError::ExceedsTotal) => {
            return Err(LendingError::ConsistencyViolation(format!(
                "book {} released a copy that was never reserved",
                book_id
            )));
        }
    };

    txn.update_book_counts(book_id, book.counts, next).await?;

    Ok(Book {
        counts: next,
        ..book
    })
}
