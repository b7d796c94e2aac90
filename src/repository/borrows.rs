//! Borrows repository for database operations.
//!
//! Invariant maintained here: `books.quantity` tracks copies on the shelf,
//! i.e. total copies minus unreturned borrows. Borrow creation decrements
//! it, return and unreturned-borrow deletion restore it, always inside the
//! same transaction as the borrow row change.

use chrono::{Duration, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::borrow::{BorrowedBook, CreateBorrow},
};

#[derive(Clone)]
pub struct BorrowsRepository {
    pool: Pool<Postgres>,
}

impl BorrowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get borrow record by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<BorrowedBook> {
        sqlx::query_as::<_, BorrowedBook>("SELECT * FROM borrowed_books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow record with id {} not found", id)))
    }

    /// List borrow records with pagination
    pub async fn list(&self, page: i64, per_page: i64) -> AppResult<(Vec<BorrowedBook>, i64)> {
        let offset = (page - 1) * per_page;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM borrowed_books")
            .fetch_one(&self.pool)
            .await?;

        let borrows = sqlx::query_as::<_, BorrowedBook>(
            "SELECT * FROM borrowed_books ORDER BY borrow_date DESC LIMIT $1 OFFSET $2",
        )
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((borrows, total))
    }

    /// Get all borrow records for a user, newest first
    pub async fn get_user_borrows(&self, user_id: i32) -> AppResult<Vec<BorrowedBook>> {
        let borrows = sqlx::query_as::<_, BorrowedBook>(
            "SELECT * FROM borrowed_books WHERE user_id = $1 ORDER BY borrow_date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(borrows)
    }

    /// Count unreturned borrows for a book
    pub async fn count_open_for_book(&self, book_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrowed_books WHERE book_id = $1 AND return_date IS NULL",
        )
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Create a new borrow record: checks availability and the borrow
    /// limit, inserts the row, and takes one copy off the shelf, all in
    /// one transaction.
    pub async fn create(
        &self,
        borrow: &CreateBorrow,
        duration_days: i64,
        max_borrows: i64,
    ) -> AppResult<BorrowedBook> {
        let now = Utc::now();
        let due_date = now + Duration::days(duration_days);

        let mut tx = self.pool.begin().await?;

        let quantity: i32 = sqlx::query_scalar("SELECT quantity FROM books WHERE id = $1")
            .bind(borrow.book_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Book with id {} not found", borrow.book_id))
            })?;

        if quantity <= 0 {
            return Err(AppError::Unavailable(format!(
                "No available copies of book with id {}",
                borrow.book_id
            )));
        }

        let open_borrows: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrowed_books WHERE user_id = $1 AND return_date IS NULL",
        )
        .bind(borrow.user_id)
        .fetch_one(&mut *tx)
        .await?;

        if open_borrows >= max_borrows {
            return Err(AppError::BorrowLimitExceeded(format!(
                "User with id {} has reached the borrow limit of {}",
                borrow.user_id, max_borrows
            )));
        }

        // Guarded decrement: a concurrent borrow that drained the shelf
        // between the read above and here surfaces as Unavailable, never
        // as a negative quantity.
        let updated = sqlx::query(
            "UPDATE books SET quantity = quantity - 1, updated_at = $1 WHERE id = $2 AND quantity > 0",
        )
        .bind(now)
        .bind(borrow.book_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::Unavailable(format!(
                "No available copies of book with id {}",
                borrow.book_id
            )));
        }

        let created = sqlx::query_as::<_, BorrowedBook>(
            r#"
            INSERT INTO borrowed_books
                (book_id, user_id, borrow_date, due_date, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'active', $3, $3)
            RETURNING *
            "#,
        )
        .bind(borrow.book_id)
        .bind(borrow.user_id)
        .bind(now)
        .bind(due_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(created)
    }

    /// Mark a borrow record as returned and put the copy back on the shelf
    pub async fn return_borrow(&self, id: i32) -> AppResult<BorrowedBook> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let borrow = sqlx::query_as::<_, BorrowedBook>(
            "SELECT * FROM borrowed_books WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrow record with id {} not found", id)))?;

        if !borrow.status.is_open() {
            return Err(AppError::AlreadyReturned(format!(
                "Borrow record with id {} has already been returned",
                id
            )));
        }

        let returned = sqlx::query_as::<_, BorrowedBook>(
            r#"
            UPDATE borrowed_books
            SET status = 'returned', return_date = $1, updated_at = $1
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE books SET quantity = quantity + 1, updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(borrow.book_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(returned)
    }

    /// Promote all past-due active borrows to overdue and return the full
    /// current overdue set. Running it again changes nothing.
    pub async fn sweep_overdue(&self) -> AppResult<Vec<BorrowedBook>> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE borrowed_books
            SET status = 'overdue', updated_at = $1
            WHERE status = 'active' AND due_date < $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        let overdue = sqlx::query_as::<_, BorrowedBook>(
            "SELECT * FROM borrowed_books WHERE status = 'overdue' ORDER BY due_date",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(overdue)
    }

    /// Delete a borrow record. An unreturned borrow puts its copy back on
    /// the shelf first, mirroring the return path.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let borrow = sqlx::query_as::<_, BorrowedBook>(
            "SELECT * FROM borrowed_books WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrow record with id {} not found", id)))?;

        if borrow.return_date.is_none() {
            sqlx::query("UPDATE books SET quantity = quantity + 1, updated_at = $1 WHERE id = $2")
                .bind(now)
                .bind(borrow.book_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM borrowed_books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }
}
