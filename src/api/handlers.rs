use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use std::sync::Arc;

use crate::application::lending::{
    ServiceDependencies, borrow_book as execute_borrow, create_book as execute_create_book,
    delete_book as execute_delete_book, get_book as execute_get_book,
    list_books as execute_list_books, return_book as execute_return,
};
use crate::domain::EmailAddress;
use crate::ports::RequestContext;

use super::{
    error::ApiError,
    types::{
        BookResponse, CreateBookRequest, DeleteBookRequest, GetBookQuery, LoanRequest,
        LoanResponse, ReturnRequest,
    },
};

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
}

/// リクエストヘッダから呼び出し元の職員の身元を取り出す
///
/// 認証そのものは前段（リバースプロキシ等）の責務で、ここでは
/// 検証済みヘッダを文脈に詰め替えるだけ。読めないヘッダは匿名扱い。
fn request_context(headers: &HeaderMap) -> RequestContext {
    headers
        .get("x-staff-email")
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| EmailAddress::parse(raw).ok())
        .map(RequestContext::staff)
        .unwrap_or_else(RequestContext::anonymous)
}

// ============================================================================
// Query handlers (GET)
// ============================================================================

/// GET /books/all - 全書籍の一覧
pub async fn list_books(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<BookResponse>>, ApiError> {
    let books = execute_list_books(&state.service_deps).await?;
    Ok(Json(books.into_iter().map(BookResponse::from).collect()))
}

/// GET /books/:key - 書籍をIDまたはISBNで検索
///
/// クエリパラメータ:
/// - podle: 検索キーの種別（"id" または "isbn"、必須）
///
/// 見つからない場合はnullを返す（404ではない）。
pub async fn get_book(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<GetBookQuery>,
) -> Result<Json<Option<BookResponse>>, ApiError> {
    let book = execute_get_book(&state.service_deps, query.podle.as_deref(), &key).await?;
    Ok(Json(book.map(BookResponse::from)))
}

// ============================================================================
// Command handlers (POST)
// ============================================================================

/// POST /books/create - 書籍を登録（特権操作）
///
/// 強制されるビジネスルール:
/// - 呼び出し元が権限ゲートを通ること
/// - 全項目が埋まっていること
/// - 同じISBNの再登録は既存のBookを返すだけ
pub async fn create_book(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateBookRequest>,
) -> Result<Json<BookResponse>, ApiError> {
    let ctx = request_context(&headers);
    let cmd = req.to_command()?;

    let book = execute_create_book(&state.service_deps, &ctx, cmd).await?;
    Ok(Json(BookResponse::from(book)))
}

/// POST /books/delete - 書籍を削除
///
/// 権限ゲートの対象外。存在しないIDでも成功として応答する。
pub async fn delete_book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteBookRequest>,
) -> Result<StatusCode, ApiError> {
    let cmd = req.to_command()?;

    execute_delete_book(&state.service_deps, cmd).await?;
    Ok(StatusCode::OK)
}

/// POST /books/loan - 書籍を貸し出す（特権操作）
///
/// 強制されるビジネスルール:
/// - 呼び出し元が権限ゲートを通ること
/// - 借り手と書籍が存在すること
/// - 貸出可能な冊数が残っていること
///
/// 引き当てと貸出記録の作成は原子的に行われる。
pub async fn loan_book(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<LoanRequest>,
) -> Result<(StatusCode, Json<LoanResponse>), ApiError> {
    let ctx = request_context(&headers);
    let cmd = req.to_command(chrono::Utc::now())?;

    let loan = execute_borrow(&state.service_deps, &ctx, cmd).await?;
    Ok((StatusCode::CREATED, Json(LoanResponse::from(loan))))
}

/// POST /books/return - 書籍を返却する
///
/// 強制されるビジネスルール:
/// - 借り手と書籍が存在すること
/// - 未返却の貸出が存在すること（二重返却は2回目が失敗する）
///
/// 返却確定と棚戻しは原子的に行われる。
pub async fn return_book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReturnRequest>,
) -> Result<StatusCode, ApiError> {
    let cmd = req.to_command(chrono::Utc::now())?;

    execute_return(&state.service_deps, cmd).await?;
    Ok(StatusCode::OK)
}
