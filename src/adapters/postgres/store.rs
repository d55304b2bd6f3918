use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};

use crate::domain::{
    Book, BookId, CopyCounts, EmailAddress, Isbn, LoanCore, LoanId, NewBook, OpenLoan, User,
    UserId, accept_book,
};
use crate::ports::store::{
    LendingStore as LendingStoreTrait, StoreError, StoreResult,
    StoreTransaction as StoreTransactionTrait,
};

/// Run the bundled migrations against the given pool.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

fn invalid_data(message: String) -> StoreError {
    StoreError::backend(std::io::Error::new(std::io::ErrorKind::InvalidData, message))
}

/// Convert a books row into the domain entity.
///
/// Counter columns are INTEGER in the schema; the conversion re-validates
/// the bounds so a row edited behind the application's back cannot smuggle
/// an impossible counter pair into the domain.
fn map_book_row(row: &PgRow) -> StoreResult<Book> {
    let total: i32 = row.get("total");
    let available: i32 = row.get("available");

    let total: u32 = total
        .try_into()
        .map_err(|_| invalid_data(format!("negative total: {total}")))?;
    let available: u32 = available
        .try_into()
        .map_err(|_| invalid_data(format!("negative available: {available}")))?;

    let counts = CopyCounts::from_parts(total, available)
        .map_err(|_| invalid_data(format!("available {available} exceeds total {total}")))?;

    let isbn: String = row.get("isbn");
    let isbn = Isbn::parse(&isbn).map_err(|_| invalid_data("blank isbn in books row".into()))?;

    Ok(Book {
        book_id: BookId::from_uuid(row.get("book_id")),
        isbn,
        name: row.get("name"),
        author: row.get("author"),
        genre: row.get("genre"),
        cover: row.get("cover"),
        counts,
    })
}

/// Convert an open loans row into the domain entity.
fn map_open_loan_row(row: &PgRow) -> OpenLoan {
    OpenLoan {
        core: LoanCore {
            loan_id: LoanId::from_uuid(row.get("loan_id")),
            book_id: BookId::from_uuid(row.get("book_id")),
            borrower_id: UserId::from_uuid(row.get("borrower_id")),
            borrowed_at: row.get("borrowed_at"),
            due_date: row.get("due_date"),
        },
    }
}

/// PostgreSQL implementation of the lending store.
///
/// Compound borrow/return updates run inside a database transaction; the
/// book row is locked on read (`FOR UPDATE`) and every write carries its
/// expected prior state, so a writer that lost the race reports a conflict
/// instead of clobbering the counter.
pub struct LendingStore {
    pool: PgPool,
}

impl LendingStore {
    /// Create a new store backed by a PostgreSQL connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct Transaction {
    inner: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransactionTrait for Transaction {
    /// Read and lock the book row for the rest of the transaction.
    async fn fetch_book(&mut self, book_id: BookId) -> StoreResult<Option<Book>> {
        let row = sqlx::query(
            r#"
            SELECT book_id, isbn, name, author, genre, cover, total, available
            FROM books
            WHERE book_id = $1
            FOR UPDATE
            "#,
        )
        .bind(book_id.value())
        .fetch_optional(&mut *self.inner)
        .await
        .map_err(StoreError::backend)?;

        row.as_ref().map(map_book_row).transpose()
    }

    /// Compare-and-swap on the counter pair.
    ///
    /// Zero rows affected means another writer got there first (or the book
    /// vanished); the caller retries the whole transaction.
    async fn update_book_counts(
        &mut self,
        book_id: BookId,
        expected: CopyCounts,
        next: CopyCounts,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET total = $2, available = $3
            WHERE book_id = $1 AND total = $4 AND available = $5
            "#,
        )
        .bind(book_id.value())
        .bind(next.total() as i32)
        .bind(next.available() as i32)
        .bind(expected.total() as i32)
        .bind(expected.available() as i32)
        .execute(&mut *self.inner)
        .await
        .map_err(StoreError::backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::WriteConflict);
        }
        Ok(())
    }

    async fn insert_loan(&mut self, loan: &OpenLoan) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO loans (loan_id, book_id, borrower_id, borrowed_at, due_date, returned)
            VALUES ($1, $2, $3, $4, $5, FALSE)
            "#,
        )
        .bind(loan.loan_id.value())
        .bind(loan.book_id.value())
        .bind(loan.borrower_id.value())
        .bind(loan.borrowed_at)
        .bind(loan.due_date)
        .execute(&mut *self.inner)
        .await
        .map_err(StoreError::backend)?;

        Ok(())
    }

    /// Newest open loan for the (book, borrower) pair, locked so that a
    /// concurrent return of the same loan serializes behind this one.
    async fn latest_open_loan(
        &mut self,
        book_id: BookId,
        borrower_id: UserId,
    ) -> StoreResult<Option<OpenLoan>> {
        let row = sqlx::query(
            r#"
            SELECT loan_id, book_id, borrower_id, borrowed_at, due_date
            FROM loans
            WHERE book_id = $1 AND borrower_id = $2 AND returned = FALSE
            ORDER BY seq DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(book_id.value())
        .bind(borrower_id.value())
        .fetch_optional(&mut *self.inner)
        .await
        .map_err(StoreError::backend)?;

        Ok(row.as_ref().map(map_open_loan_row))
    }

    /// Close the loan, conditioned on it still being open.
    async fn mark_returned(
        &mut self,
        loan_id: LoanId,
        returned_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE loans
            SET returned = TRUE, returned_at = $2
            WHERE loan_id = $1 AND returned = FALSE
            "#,
        )
        .bind(loan_id.value())
        .bind(returned_at)
        .execute(&mut *self.inner)
        .await
        .map_err(StoreError::backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::WriteConflict);
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.inner.commit().await.map_err(StoreError::backend)
    }
}

#[async_trait]
impl LendingStoreTrait for LendingStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransactionTrait>> {
        let inner = self.pool.begin().await.map_err(StoreError::backend)?;
        Ok(Box::new(Transaction { inner }))
    }

    async fn find_user_by_email(&self, email: &EmailAddress) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, email
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        row.map(|row| {
            let email: String = row.get("email");
            let email = EmailAddress::parse(&email)
                .map_err(|_| invalid_data("malformed email in users row".into()))?;
            Ok(User {
                user_id: UserId::from_uuid(row.get("user_id")),
                email,
            })
        })
        .transpose()
    }

    async fn find_book_by_id(&self, book_id: BookId) -> StoreResult<Option<Book>> {
        let row = sqlx::query(
            r#"
            SELECT book_id, isbn, name, author, genre, cover, total, available
            FROM books
            WHERE book_id = $1
            "#,
        )
        .bind(book_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        row.as_ref().map(map_book_row).transpose()
    }

    async fn find_book_by_isbn(&self, isbn: &Isbn) -> StoreResult<Option<Book>> {
        let row = sqlx::query(
            r#"
            SELECT book_id, isbn, name, author, genre, cover, total, available
            FROM books
            WHERE isbn = $1
            "#,
        )
        .bind(isbn.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        row.as_ref().map(map_book_row).transpose()
    }

    async fn list_books(&self) -> StoreResult<Vec<Book>> {
        let rows = sqlx::query(
            r#"
            SELECT book_id, isbn, name, author, genre, cover, total, available
            FROM books
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows.iter().map(map_book_row).collect()
    }

    /// Atomic get-or-insert keyed by isbn.
    ///
    /// `ON CONFLICT DO NOTHING` makes the insert race-free; when the row
    /// already existed the follow-up select returns it untouched.
    async fn get_or_create_book(&self, new_book: NewBook) -> StoreResult<Book> {
        let isbn = new_book.isbn.clone();
        let book = accept_book(new_book);

        let inserted = sqlx::query(
            r#"
            INSERT INTO books (book_id, isbn, name, author, genre, cover, total, available)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (isbn) DO NOTHING
            RETURNING book_id, isbn, name, author, genre, cover, total, available
            "#,
        )
        .bind(book.book_id.value())
        .bind(book.isbn.as_str())
        .bind(&book.name)
        .bind(&book.author)
        .bind(&book.genre)
        .bind(&book.cover)
        .bind(book.counts.total() as i32)
        .bind(book.counts.available() as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        if let Some(row) = inserted {
            return map_book_row(&row);
        }

        // Lost the insert race (or the book predates this call): fetch the
        // existing row. A miss here means it was deleted in between, which
        // the caller treats as a transient conflict.
        self.find_book_by_isbn(&isbn)
            .await?
            .ok_or(StoreError::WriteConflict)
    }

    async fn delete_book(&self, book_id: BookId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM books WHERE book_id = $1")
            .bind(book_id.value())
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        Ok(result.rows_affected() > 0)
    }
}
