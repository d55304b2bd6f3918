use chrono::{DateTime, Utc};

use crate::domain::{self, BookId, OpenLoan, ReturnedLoan, UserId};
use crate::ports::StoreTransaction;

use super::errors::Result;

/// 貸出登記：新しい貸出記録を作成する
///
/// ドメイン層の純粋関数でOpenLoanを生成し、挿入を積む。
/// 返却期限は貸出日時の14日後。
pub async fn create_loan(
    txn: &mut dyn StoreTransaction,
    book_id: BookId,
    borrower_id: UserId,
    borrowed_at: DateTime<Utc>,
) -> Result<OpenLoan> {
    let loan = domain::loan::open_loan(book_id, borrower_id, borrowed_at);
    txn.insert_loan(&loan).await?;
    Ok(loan)
}

/// 貸出登記：未返却の貸出を検索する
///
/// 同じ書籍×借り手の未返却貸出が複数ありうる（同じタイトルを
/// 2冊借りることは禁止されていない）。その場合は最も新しく
/// 作成されたものを返す。選択規則はDESIGN.md参照。
pub async fn find_open_loan(
    txn: &mut dyn StoreTransaction,
    book_id: BookId,
    borrower_id: UserId,
) -> Result<Option<OpenLoan>> {
    Ok(txn.latest_open_loan(book_id, borrower_id).await?)
}

/// 貸出登記：貸出を返却済みで確定する
///
/// ドメイン層の純粋関数でOpen→Returnedの遷移を行い、
/// 「まだ未返却であること」を事前条件とする条件付き更新を積む。
/// 並行する二重返却は片方が書き込み競合になり、やり直し時に
/// 未返却の貸出が見つからないため黙って二重確定されることはない。
pub async fn close_loan(
    txn: &mut dyn StoreTransaction,
    loan: OpenLoan,
    returned_at: DateTime<Utc>,
) -> Result<ReturnedLoan> {
    let returned = domain::loan::close_loan(loan, returned_at);
    txn.mark_returned(returned.loan_id, returned_at).await?;
    Ok(returned)
}
