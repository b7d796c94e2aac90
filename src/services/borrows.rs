//! Borrow workflow service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    config::BorrowConfig,
    error::AppResult,
    models::borrow::{BorrowedBook, CreateBorrow, ReturnReceipt},
    repository::Repository,
};

/// Fine owed for a late return: whole days past the due date times the
/// configured daily rate. None when the return is on time (or less than a
/// full day late).
fn overdue_fine(
    due_date: DateTime<Utc>,
    returned_at: DateTime<Utc>,
    daily_rate: Decimal,
) -> Option<(i64, Decimal)> {
    if returned_at <= due_date {
        return None;
    }
    let days = (returned_at - due_date).num_days();
    if days <= 0 {
        return None;
    }
    Some((days, Decimal::from(days) * daily_rate))
}

#[derive(Clone)]
pub struct BorrowsService {
    repository: Repository,
    config: BorrowConfig,
}

impl BorrowsService {
    pub fn new(repository: Repository, config: BorrowConfig) -> Self {
        Self { repository, config }
    }

    /// List borrow records
    pub async fn list_borrows(
        &self,
        page: i64,
        per_page: i64,
    ) -> AppResult<(Vec<BorrowedBook>, i64)> {
        self.repository.borrows.list(page, per_page).await
    }

    /// Get a borrow record by ID
    pub async fn get_borrow(&self, id: i32) -> AppResult<BorrowedBook> {
        self.repository.borrows.get_by_id(id).await
    }

    /// Get all borrow records for a user
    pub async fn get_user_borrows(&self, user_id: i32) -> AppResult<Vec<BorrowedBook>> {
        // Verify user exists
        self.repository.users.get_by_id(user_id).await?;
        self.repository.borrows.get_user_borrows(user_id).await
    }

    /// Borrow a book for a user
    pub async fn borrow_book(&self, borrow: CreateBorrow) -> AppResult<BorrowedBook> {
        // Verify user exists
        self.repository.users.get_by_id(borrow.user_id).await?;

        let created = self
            .repository
            .borrows
            .create(
                &borrow,
                self.config.borrow_duration_days,
                self.config.max_borrows_per_user,
            )
            .await?;

        tracing::info!(
            "Book {} borrowed by user {} until {}",
            created.book_id,
            created.user_id,
            created.due_date
        );

        Ok(created)
    }

    /// Return a borrowed book, reporting any overdue fine
    pub async fn return_book(&self, borrow_id: i32) -> AppResult<ReturnReceipt> {
        let borrow = self.repository.borrows.return_borrow(borrow_id).await?;

        let returned_at = borrow.return_date.unwrap_or_else(Utc::now);
        let late = overdue_fine(borrow.due_date, returned_at, self.config.overdue_fine_rate);

        if let Some((days, fine)) = late {
            tracing::info!(
                "Book {} returned {} day(s) late by user {}; fine: {}",
                borrow.book_id,
                days,
                borrow.user_id,
                fine
            );
        } else {
            tracing::info!(
                "Book {} returned by user {}",
                borrow.book_id,
                borrow.user_id
            );
        }

        Ok(ReturnReceipt {
            days_overdue: late.map(|(days, _)| days).unwrap_or(0),
            fine: late.map(|(_, fine)| fine),
            borrow,
        })
    }

    /// Promote past-due active borrows to overdue; returns the full
    /// current overdue set
    pub async fn sweep_overdue(&self) -> AppResult<Vec<BorrowedBook>> {
        let overdue = self.repository.borrows.sweep_overdue().await?;
        tracing::info!("Overdue sweep: {} record(s) overdue", overdue.len());
        Ok(overdue)
    }

    /// Delete a borrow record
    pub async fn delete_borrow(&self, id: i32) -> AppResult<()> {
        self.repository.borrows.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap() + Duration::days(n)
    }

    #[test]
    fn on_time_return_has_no_fine() {
        assert_eq!(overdue_fine(day(14), day(10), Decimal::new(5, 1)), None);
        assert_eq!(overdue_fine(day(14), day(14), Decimal::new(5, 1)), None);
    }

    #[test]
    fn six_days_late_costs_six_times_the_rate() {
        // due on day 14, returned on day 20
        let (days, fine) = overdue_fine(day(14), day(20), Decimal::new(5, 1)).unwrap();
        assert_eq!(days, 6);
        assert_eq!(fine, Decimal::new(30, 1)); // 3.0
    }

    #[test]
    fn less_than_a_full_day_late_is_not_fined() {
        let returned = day(14) + Duration::hours(6);
        assert_eq!(overdue_fine(day(14), returned, Decimal::new(5, 1)), None);
    }
}
