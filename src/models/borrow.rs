//! Borrow (loan) model and related types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Borrow record status. Stored as the `borrow_status` Postgres enum.
///
/// Transitions: `Active -> Returned`, `Active -> Overdue`,
/// `Overdue -> Returned`. `Returned` is terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "borrow_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BorrowStatus {
    Active,
    Returned,
    Overdue,
}

impl BorrowStatus {
    /// Whether the borrow is still outstanding (active or overdue)
    pub fn is_open(self) -> bool {
        !matches!(self, BorrowStatus::Returned)
    }
}

/// Borrow record from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowedBook {
    pub id: i32,
    pub book_id: i32,
    pub user_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: BorrowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create borrow request
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBorrow {
    pub book_id: i32,
    pub user_id: i32,
}

/// Result of returning a borrowed book. The fine is reported here only;
/// it is not persisted on the borrow record.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReturnReceipt {
    pub borrow: BorrowedBook,
    pub days_overdue: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fine: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&BorrowStatus::Active).unwrap(),
            r#""active""#
        );
        assert_eq!(
            serde_json::to_string(&BorrowStatus::Overdue).unwrap(),
            r#""overdue""#
        );
    }

    #[test]
    fn returned_is_the_only_closed_status() {
        assert!(BorrowStatus::Active.is_open());
        assert!(BorrowStatus::Overdue.is_open());
        assert!(!BorrowStatus::Returned.is_open());
    }
}
