use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::commands::{BorrowBook, ReturnBook};
use crate::domain::{BookId, OpenLoan, ReturnedLoan, User, UserId};
use crate::ports::{AuthGate, Decision, LendingStore, PrivilegedAction, RequestContext, StoreTransaction};

use super::errors::{LendingError, Result};
use super::{inventory_ledger, loan_registry};

/// 複合更新1件あたりのコミット試行回数の上限
///
/// 書き込み競合はトランザクションごとやり直すが、無限には粘らない。
/// 上限到達後は一時的エラーとして呼び出し側に返す。
const MAX_COMMIT_ATTEMPTS: u32 = 5;

/// サービスの依存関係
///
/// 関数型DDDの原則に従い、データ構造として定義。
/// 振る舞い（メソッド）は持たず、純粋な関数に依存関係を渡す。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub store: Arc<dyn LendingStore>,
    pub auth_gate: Arc<dyn AuthGate>,
}

/// 権限ゲートを通すヘルパー関数
///
/// ストアに触れる前に必ず呼ばれる。Denyは`Unauthorized`として
/// その場で打ち切られ、状態には一切触れない。
pub(super) async fn require_capability(
    deps: &ServiceDependencies,
    ctx: &RequestContext,
    action: PrivilegedAction,
) -> Result<()> {
    let decision = deps
        .auth_gate
        .check_capability(ctx, action)
        .await
        .map_err(LendingError::AuthGateFailure)?;

    match decision {
        Decision::Allow => Ok(()),
        Decision::Deny => Err(LendingError::Unauthorized),
    }
}

/// 借り手をメールアドレスで解決するヘルパー関数
async fn resolve_borrower(deps: &ServiceDependencies, cmd_email: &crate::domain::EmailAddress) -> Result<User> {
    deps.store
        .find_user_by_email(cmd_email)
        .await?
        .ok_or(LendingError::BorrowerNotFound)
}

/// 1回分の貸出トランザクションの中身
///
/// 引き当て→貸出作成の順で、どちらも同じトランザクションに積まれる。
async fn borrow_within(
    txn: &mut dyn StoreTransaction,
    book_id: BookId,
    borrower_id: UserId,
    borrowed_at: DateTime<Utc>,
) -> Result<OpenLoan> {
    inventory_ledger::reserve_copy(txn, book_id).await?;
    loan_registry::create_loan(txn, book_id, borrower_id, borrowed_at).await
}

/// 1回分の返却トランザクションの中身
///
/// 検索→確定→棚戻しの順。検索もトランザクション内で行うため、
/// やり直し時には直前の並行返却が反映された状態で再評価される。
async fn return_within(
    txn: &mut dyn StoreTransaction,
    book_id: BookId,
    borrower_id: UserId,
    returned_at: DateTime<Utc>,
) -> Result<ReturnedLoan> {
    let open = loan_registry::find_open_loan(txn, book_id, borrower_id)
        .await?
        .ok_or(LendingError::LoanNotFound)?;

    let returned = loan_registry::close_loan(txn, open, returned_at).await?;
    inventory_ledger::release_copy(txn, book_id).await?;
    Ok(returned)
}

/// 書籍を貸し出す
///
/// ビジネスルール：
/// - 貸出作成は特権操作（権限ゲートを通す）
/// - 借り手と書籍が存在すること
/// - 引き当てと貸出作成は1つのトランザクション。どちらかが失敗したら
///   両方とも巻き戻り、引き当てだけ・貸出だけの状態は観測されない
///
/// 書き込み競合は上限回数までトランザクションごとやり直す。
///
/// # 引数
/// * `deps` - サービスの依存関係
/// * `ctx` - リクエスト文脈（権限判定に使う）
/// * `cmd` - 貸出コマンド
///
/// # 戻り値
/// 成功時は作成された貸出
pub async fn borrow_book(
    deps: &ServiceDependencies,
    ctx: &RequestContext,
    cmd: BorrowBook,
) -> Result<OpenLoan> {
    // 1. 権限確認（ストアアクセスより前）
    require_capability(deps, ctx, PrivilegedAction::CreateLoan).await?;

    // 2. 借り手の解決
    let borrower = resolve_borrower(deps, &cmd.borrower_email).await?;

    // 3. 書籍の存在確認
    //    引き当てがトランザクション内で再確認するが、存在しない書籍で
    //    再試行ループに入らないよう先に弾く
    deps.store
        .find_book_by_id(cmd.book_id)
        .await?
        .ok_or(LendingError::BookNotFound)?;

    // 4. 引き当て＋貸出作成を1トランザクションで確定
    let mut attempts = 0;
    loop {
        attempts += 1;
        let mut txn = deps.store.begin().await?;

        match borrow_within(&mut *txn, cmd.book_id, borrower.user_id, cmd.borrowed_at).await {
            Ok(loan) => match txn.commit().await {
                Ok(()) => return Ok(loan),
                Err(err) if err.is_conflict() && attempts < MAX_COMMIT_ATTEMPTS => continue,
                Err(err) => return Err(err.into()),
            },
            // commitされないtxnはdropで巻き戻る
            Err(LendingError::WriteConflict) if attempts < MAX_COMMIT_ATTEMPTS => continue,
            Err(err) => return Err(err),
        }
    }
}

/// 書籍を返却する
///
/// ビジネスルール：
/// - 返却は特権操作ではない（権限ゲートを通さない。DESIGN.md参照）
/// - 借り手と書籍が存在すること
/// - 未返却の貸出が存在すること
/// - 確定と棚戻しは1つのトランザクション
///
/// 同じ貸出への二重返却は、2回目が`LoanNotFound`になる。
///
/// # 引数
/// * `deps` - サービスの依存関係
/// * `cmd` - 返却コマンド
///
/// # 戻り値
/// 成功時は返却済みとなった貸出
pub async fn return_book(deps: &ServiceDependencies, cmd: ReturnBook) -> Result<ReturnedLoan> {
    // 1. 借り手の解決
    let borrower = resolve_borrower(deps, &cmd.borrower_email).await?;

    // 2. 書籍の存在確認
    deps.store
        .find_book_by_id(cmd.book_id)
        .await?
        .ok_or(LendingError::BookNotFound)?;

    // 3. 検索＋確定＋棚戻しを1トランザクションで確定
    let mut attempts = 0;
    loop {
        attempts += 1;
        let mut txn = deps.store.begin().await?;

        match return_within(&mut *txn, cmd.book_id, borrower.user_id, cmd.returned_at).await {
            Ok(returned) => match txn.commit().await {
                Ok(()) => return Ok(returned),
                Err(err) if err.is_conflict() && attempts < MAX_COMMIT_ATTEMPTS => continue,
                Err(err) => return Err(err.into()),
            },
            Err(LendingError::WriteConflict) if attempts < MAX_COMMIT_ATTEMPTS => continue,
            Err(err) => return Err(err),
        }
    }
}
