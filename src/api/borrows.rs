//! Borrow workflow endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::borrow::{BorrowedBook, CreateBorrow, ReturnReceipt},
};

use super::{PaginatedResponse, Pagination};

/// Return response with the updated borrow record and any fine owed
#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    /// Return status
    pub status: String,
    /// Updated record plus any overdue fine
    pub receipt: ReturnReceipt,
}

/// List borrow records with pagination
#[utoipa::path(
    get,
    path = "/borrows",
    tag = "borrows",
    params(
        ("page" = Option<i64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<i64>, Query, description = "Items per page (default: 20)")
    ),
    responses(
        (status = 200, description = "List of borrow records", body = PaginatedResponse<BorrowedBook>)
    )
)]
pub async fn list_borrows(
    State(state): State<crate::AppState>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<BorrowedBook>>> {
    let page = pagination.page();
    let per_page = pagination.per_page();
    let (items, total) = state.services.borrows.list_borrows(page, per_page).await?;

    Ok(Json(PaginatedResponse {
        items,
        total,
        page,
        per_page,
    }))
}

/// Get a borrow record by ID
#[utoipa::path(
    get,
    path = "/borrows/{id}",
    tag = "borrows",
    params(
        ("id" = i32, Path, description = "Borrow record ID")
    ),
    responses(
        (status = 200, description = "Borrow record", body = BorrowedBook),
        (status = 404, description = "Borrow record not found")
    )
)]
pub async fn get_borrow(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<BorrowedBook>> {
    let borrow = state.services.borrows.get_borrow(id).await?;
    Ok(Json(borrow))
}

/// Get all borrow records for a user
#[utoipa::path(
    get,
    path = "/users/{id}/borrows",
    tag = "borrows",
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User's borrow records", body = Vec<BorrowedBook>),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_borrows(
    State(state): State<crate::AppState>,
    Path(user_id): Path<i32>,
) -> AppResult<Json<Vec<BorrowedBook>>> {
    let borrows = state.services.borrows.get_user_borrows(user_id).await?;
    Ok(Json(borrows))
}

/// Borrow a book for a user
#[utoipa::path(
    post,
    path = "/borrows",
    tag = "borrows",
    request_body = CreateBorrow,
    responses(
        (status = 201, description = "Borrow created", body = BorrowedBook),
        (status = 400, description = "No available copies, or borrow limit reached"),
        (status = 404, description = "Book or user not found")
    )
)]
pub async fn create_borrow(
    State(state): State<crate::AppState>,
    Json(borrow): Json<CreateBorrow>,
) -> AppResult<(StatusCode, Json<BorrowedBook>)> {
    let created = state.services.borrows.borrow_book(borrow).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/borrows/{id}/return",
    tag = "borrows",
    params(
        ("id" = i32, Path, description = "Borrow record ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 400, description = "Already returned"),
        (status = 404, description = "Borrow record not found")
    )
)]
pub async fn return_borrow(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ReturnResponse>> {
    let receipt = state.services.borrows.return_book(id).await?;

    Ok(Json(ReturnResponse {
        status: "returned".to_string(),
        receipt,
    }))
}

/// Promote past-due active borrows to overdue. Invoked by an external
/// scheduler; idempotent.
#[utoipa::path(
    post,
    path = "/borrows/overdue",
    tag = "borrows",
    responses(
        (status = 200, description = "Current overdue borrow records", body = Vec<BorrowedBook>)
    )
)]
pub async fn sweep_overdue(
    State(state): State<crate::AppState>,
) -> AppResult<Json<Vec<BorrowedBook>>> {
    let overdue = state.services.borrows.sweep_overdue().await?;
    Ok(Json(overdue))
}

/// Delete a borrow record. An unreturned borrow restores the book's
/// availability.
#[utoipa::path(
    delete,
    path = "/borrows/{id}",
    tag = "borrows",
    params(
        ("id" = i32, Path, description = "Borrow record ID")
    ),
    responses(
        (status = 204, description = "Borrow record deleted"),
        (status = 404, description = "Borrow record not found")
    )
)]
pub async fn delete_borrow(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.borrows.delete_borrow(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
