use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::loan::Loan;
use crate::domain::{
    Book, BookId, CopyCounts, EmailAddress, Isbn, LoanId, NewBook, OpenLoan, User, UserId,
    accept_book,
};
use crate::ports::store::{
    LendingStore as LendingStoreTrait, StoreError, StoreResult,
    StoreTransaction as StoreTransactionTrait,
};

/// 貸出記録の行
///
/// seqは挿入順。「最も新しく作成された未返却の貸出」の
/// 決定的な選択に使う。
#[derive(Debug, Clone)]
struct LoanRow {
    loan: Loan,
    seq: u64,
}

#[derive(Debug, Default)]
struct State {
    books: HashMap<BookId, Book>,
    users: HashMap<UserId, User>,
    loans: HashMap<LoanId, LoanRow>,
    next_seq: u64,
}

/// LendingStoreのインメモリ実装
///
/// 全状態を1つのMutexで守る。トランザクションは書き込みを
/// 事前条件つきでステージし、commit時にロックを1回だけ取って
/// 全件を検証してから適用する。検証に失敗した書き込みが1つでも
/// あれば何も適用せずWriteConflictを返すため、貸出1件分の
/// 複合更新は全適用か全破棄のどちらかになる。
#[derive(Clone)]
pub struct LendingStore {
    state: Arc<Mutex<State>>,
}

impl LendingStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// テスト・デモ用に利用者を登録する
    ///
    /// 利用者の登録は本来このコンテキストの外にあるため、
    /// ポートではなくアダプタ固有の操作として提供する。
    pub fn seed_user(&self, email: EmailAddress) -> User {
        let user = User {
            user_id: UserId::new(),
            email,
        };
        self.lock().users.insert(user.user_id, user.clone());
        user
    }

    /// 書籍の未返却貸出数を数える（不変条件の検証用）
    pub fn open_loan_count(&self, book_id: BookId) -> usize {
        self.lock()
            .loans
            .values()
            .filter(|row| {
                matches!(&row.loan, Loan::Open(open) if open.book_id == book_id)
            })
            .count()
    }
}

impl Default for LendingStore {
    fn default() -> Self {
        Self::new()
    }
}

/// ステージされた書き込み
///
/// それぞれが期待する事前状態を運ぶ。commit時に現在の状態と
/// 突き合わせ、1つでも食い違えばトランザクション全体が競合になる。
#[derive(Debug)]
enum StagedWrite {
    BookCounts {
        book_id: BookId,
        expected: CopyCounts,
        next: CopyCounts,
    },
    InsertLoan(OpenLoan),
    MarkReturned {
        loan_id: LoanId,
        returned_at: DateTime<Utc>,
    },
}

pub struct Transaction {
    state: Arc<Mutex<State>>,
    staged: Vec<StagedWrite>,
}

impl Transaction {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

/// 1件の書き込みの事前条件を検証する
fn verify(state: &State, write: &StagedWrite) -> StoreResult<()> {
    match write {
        StagedWrite::BookCounts {
            book_id, expected, ..
        } => match state.books.get(book_id) {
            Some(book) if book.counts == *expected => Ok(()),
            _ => Err(StoreError::WriteConflict),
        },
        StagedWrite::InsertLoan(_) => Ok(()),
        StagedWrite::MarkReturned { loan_id, .. } => match state.loans.get(loan_id) {
            Some(row) if !row.loan.is_returned() => Ok(()),
            _ => Err(StoreError::WriteConflict),
        },
    }
}

/// 検証済みの書き込みを適用する
fn apply(state: &mut State, write: StagedWrite) {
    match write {
        StagedWrite::BookCounts { book_id, next, .. } => {
            if let Some(book) = state.books.get_mut(&book_id) {
                book.counts = next;
            }
        }
        StagedWrite::InsertLoan(loan) => {
            let seq = state.next_seq;
            state.next_seq += 1;
            state.loans.insert(
                loan.loan_id,
                LoanRow {
                    loan: Loan::Open(loan),
                    seq,
                },
            );
        }
        StagedWrite::MarkReturned {
            loan_id,
            returned_at,
        } => {
            if let Some(row) = state.loans.get_mut(&loan_id) {
                if let Loan::Open(open) = row.loan.clone() {
                    row.loan = Loan::Returned(crate::domain::loan::close_loan(open, returned_at));
                }
            }
        }
    }
}

#[async_trait]
impl StoreTransactionTrait for Transaction {
    /// コミット済み状態から書籍を読む
    async fn fetch_book(&mut self, book_id: BookId) -> StoreResult<Option<Book>> {
        Ok(self.lock().books.get(&book_id).cloned())
    }

    /// 冊数の条件付き更新をステージする
    ///
    /// 食い違いはこの時点でも検出して早めに競合を返すが、
    /// 最終的な判定はcommit時の再検証が行う。
    async fn update_book_counts(
        &mut self,
        book_id: BookId,
        expected: CopyCounts,
        next: CopyCounts,
    ) -> StoreResult<()> {
        let write = StagedWrite::BookCounts {
            book_id,
            expected,
            next,
        };
        verify(&self.lock(), &write)?;
        self.staged.push(write);
        Ok(())
    }

    async fn insert_loan(&mut self, loan: &OpenLoan) -> StoreResult<()> {
        self.staged.push(StagedWrite::InsertLoan(loan.clone()));
        Ok(())
    }

    /// 未返却の貸出のうち最も新しく作成されたものを返す
    async fn latest_open_loan(
        &mut self,
        book_id: BookId,
        borrower_id: UserId,
    ) -> StoreResult<Option<OpenLoan>> {
        let state = self.lock();
        let newest = state
            .loans
            .values()
            .filter_map(|row| match &row.loan {
                Loan::Open(open)
                    if open.book_id == book_id && open.borrower_id == borrower_id =>
                {
                    Some((row.seq, open))
                }
                _ => None,
            })
            .max_by_key(|(seq, _)| *seq)
            .map(|(_, open)| open.clone());
        Ok(newest)
    }

    /// 返却確定をステージする（未返却であることが事前条件）
    async fn mark_returned(
        &mut self,
        loan_id: LoanId,
        returned_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let write = StagedWrite::MarkReturned {
            loan_id,
            returned_at,
        };
        verify(&self.lock(), &write)?;
        self.staged.push(write);
        Ok(())
    }

    /// ロックを1回だけ取り、全書き込みを検証してから適用する
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        let mut state = this.state.lock().unwrap();

        for write in &this.staged {
            verify(&state, write)?;
        }
        for write in this.staged {
            apply(&mut state, write);
        }
        Ok(())
    }
}

#[async_trait]
impl LendingStoreTrait for LendingStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransactionTrait>> {
        Ok(Box::new(Transaction {
            state: self.state.clone(),
            staged: Vec::new(),
        }))
    }

    async fn find_user_by_email(&self, email: &EmailAddress) -> StoreResult<Option<User>> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|user| user.email == *email)
            .cloned())
    }

    async fn find_book_by_id(&self, book_id: BookId) -> StoreResult<Option<Book>> {
        Ok(self.lock().books.get(&book_id).cloned())
    }

    async fn find_book_by_isbn(&self, isbn: &Isbn) -> StoreResult<Option<Book>> {
        Ok(self
            .lock()
            .books
            .values()
            .find(|book| book.isbn == *isbn)
            .cloned())
    }

    async fn list_books(&self) -> StoreResult<Vec<Book>> {
        Ok(self.lock().books.values().cloned().collect())
    }

    /// ISBNキーのget-or-create
    ///
    /// ロックの中で検索と挿入を行うため、同じISBNの並行登録でも
    /// 重複しない。
    async fn get_or_create_book(&self, new_book: NewBook) -> StoreResult<Book> {
        let mut state = self.state.lock().unwrap();

        if let Some(existing) = state.books.values().find(|book| book.isbn == new_book.isbn) {
            return Ok(existing.clone());
        }

        let book = accept_book(new_book);
        state.books.insert(book.book_id, book.clone());
        Ok(book)
    }

    /// 書籍と、それを参照する貸出記録を一緒に消す
    async fn delete_book(&self, book_id: BookId) -> StoreResult<bool> {
        let mut state = self.state.lock().unwrap();
        let removed = state.books.remove(&book_id).is_some();
        if removed {
            state.loans.retain(|_, row| match &row.loan {
                Loan::Open(open) => open.book_id != book_id,
                Loan::Returned(returned) => returned.book_id != book_id,
            });
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_book(total: u32) -> NewBook {
        NewBook {
            isbn: Isbn::parse("978-4-10-109205-8").unwrap(),
            name: "Kokoro".to_string(),
            author: "Natsume Soseki".to_string(),
            genre: "Novel".to_string(),
            cover: "https://covers.example.com/kokoro.jpg".to_string(),
            total,
        }
    }

    #[tokio::test]
    async fn test_get_or_create_book_is_idempotent_by_isbn() {
        let store = LendingStore::new();

        let first = store.get_or_create_book(sample_book(3)).await.unwrap();
        let second = store.get_or_create_book(sample_book(7)).await.unwrap();

        // 2回目は既存のBookを返し、冊数も変えない
        assert_eq!(first.book_id, second.book_id);
        assert_eq!(second.counts.total(), 3);
        assert_eq!(store.list_books().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_counts_update_conflicts_at_commit() {
        let store = LendingStore::new();
        let book = store.get_or_create_book(sample_book(1)).await.unwrap();

        // 両方のトランザクションが同じ冊数を読む
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        let seen_first = first.fetch_book(book.book_id).await.unwrap().unwrap();
        let seen_second = second.fetch_book(book.book_id).await.unwrap().unwrap();

        first
            .update_book_counts(
                book.book_id,
                seen_first.counts,
                seen_first.counts.reserve().unwrap(),
            )
            .await
            .unwrap();
        second
            .update_book_counts(
                book.book_id,
                seen_second.counts,
                seen_second.counts.reserve().unwrap(),
            )
            .await
            .unwrap();

        // 先にcommitした方が勝ち、もう片方は競合になる
        first.commit().await.unwrap();
        let result = second.commit().await;
        assert!(matches!(result, Err(StoreError::WriteConflict)));

        let current = store.find_book_by_id(book.book_id).await.unwrap().unwrap();
        assert_eq!(current.counts.available(), 0);
    }

    #[tokio::test]
    async fn test_dropped_transaction_leaves_no_trace() {
        let store = LendingStore::new();
        let book = store.get_or_create_book(sample_book(2)).await.unwrap();

        {
            let mut txn = store.begin().await.unwrap();
            let seen = txn.fetch_book(book.book_id).await.unwrap().unwrap();
            txn.update_book_counts(book.book_id, seen.counts, seen.counts.reserve().unwrap())
                .await
                .unwrap();
            // commitせずにdrop
        }

        let current = store.find_book_by_id(book.book_id).await.unwrap().unwrap();
        assert_eq!(current.counts.available(), 2);
    }

    #[tokio::test]
    async fn test_latest_open_loan_prefers_newest() {
        let store = LendingStore::new();
        let book = store.get_or_create_book(sample_book(2)).await.unwrap();
        let user = store.seed_user(EmailAddress::parse("reader@example.com").unwrap());
        let now = Utc::now();

        let older = crate::domain::loan::open_loan(book.book_id, user.user_id, now);
        let newer =
            crate::domain::loan::open_loan(book.book_id, user.user_id, now + chrono::Duration::hours(1));

        let mut txn = store.begin().await.unwrap();
        txn.insert_loan(&older).await.unwrap();
        txn.insert_loan(&newer).await.unwrap();
        txn.commit().await.unwrap();

        let mut txn = store.begin().await.unwrap();
        let found = txn
            .latest_open_loan(book.book_id, user.user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.loan_id, newer.loan_id);
    }

    #[tokio::test]
    async fn test_mark_returned_conflicts_on_second_close() {
        let store = LendingStore::new();
        let book = store.get_or_create_book(sample_book(1)).await.unwrap();
        let user = store.seed_user(EmailAddress::parse("reader@example.com").unwrap());
        let now = Utc::now();

        let loan = crate::domain::loan::open_loan(book.book_id, user.user_id, now);
        let mut txn = store.begin().await.unwrap();
        txn.insert_loan(&loan).await.unwrap();
        txn.commit().await.unwrap();

        let mut txn = store.begin().await.unwrap();
        txn.mark_returned(loan.loan_id, now).await.unwrap();
        txn.commit().await.unwrap();

        let mut txn = store.begin().await.unwrap();
        let result = txn.mark_returned(loan.loan_id, now).await;
        assert!(matches!(result, Err(StoreError::WriteConflict)));
    }
}
