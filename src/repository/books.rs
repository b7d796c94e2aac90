//! Books repository for database operations.
//!
//! Owns the book↔author and book↔category link sets: on create/update the
//! requested id set fully replaces the persisted join rows inside the same
//! transaction as the book row itself.

use chrono::Utc;
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{is_unique_violation, AppError, AppResult},
    models::{
        author::Author,
        book::{Book, BookQuery, CreateBook, UpdateBook},
        category::Category,
    },
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    // =========================================================================
    // READ
    // =========================================================================

    /// Get book by ID with authors and categories loaded
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        let mut book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        book.authors = self.get_book_authors(id).await?;
        book.categories = self.get_book_categories(id).await?;

        Ok(book)
    }

    /// Load all authors for a book via the book_author_link junction table
    async fn get_book_authors(&self, book_id: i32) -> AppResult<Vec<Author>> {
        let authors = sqlx::query_as::<_, Author>(
            r#"
            SELECT a.*
            FROM book_author_link l
            JOIN authors a ON a.id = l.author_id
            WHERE l.book_id = $1
            ORDER BY a.id
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(authors)
    }

    /// Load all categories for a book via the book_category_link junction table
    async fn get_book_categories(&self, book_id: i32) -> AppResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT c.*
            FROM book_category_link l
            JOIN categories c ON c.id = l.category_id
            WHERE l.book_id = $1
            ORDER BY c.id
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    /// Check if a book with this ISBN already exists
    pub async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = if let Some(id) = exclude_id {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1 AND id != $2)")
                .bind(isbn)
                .bind(id)
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1)")
                .bind(isbn)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(exists)
    }

    // =========================================================================
    // SEARCH
    // =========================================================================

    /// Search books with optional title/author/category filters and pagination
    pub async fn search(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let page = query.page.unwrap_or(1);
        let per_page = query.per_page.unwrap_or(20);
        let offset = (page - 1) * per_page;

        let title_pattern = query.title.as_ref().map(|t| format!("%{}%", t));

        let filter = r#"
            ($1::text IS NULL OR title ILIKE $1)
            AND ($2::int IS NULL OR EXISTS (
                SELECT 1 FROM book_author_link l
                WHERE l.book_id = b.id AND l.author_id = $2
            ))
            AND ($3::int IS NULL OR EXISTS (
                SELECT 1 FROM book_category_link l
                WHERE l.book_id = b.id AND l.category_id = $3
            ))
        "#;

        let count_query = format!("SELECT COUNT(*) FROM books b WHERE {}", filter);
        let total: i64 = sqlx::query_scalar(&count_query)
            .bind(title_pattern.as_deref())
            .bind(query.author_id)
            .bind(query.category_id)
            .fetch_one(&self.pool)
            .await?;

        let select_query = format!(
            "SELECT b.* FROM books b WHERE {} ORDER BY b.title LIMIT $4 OFFSET $5",
            filter
        );
        let mut books = sqlx::query_as::<_, Book>(&select_query)
            .bind(title_pattern.as_deref())
            .bind(query.author_id)
            .bind(query.category_id)
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        for book in &mut books {
            book.authors = self.get_book_authors(book.id).await?;
            book.categories = self.get_book_categories(book.id).await?;
        }

        Ok((books, total))
    }

    // =========================================================================
    // CREATE / UPDATE
    // =========================================================================

    /// Create a book together with its author and category link sets
    pub async fn create_with_relations(&self, book: &CreateBook) -> AppResult<Book> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO books (title, publication_year, isbn, quantity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id
            "#,
        )
        .bind(&book.title)
        .bind(book.publication_year)
        .bind(&book.isbn)
        .bind(book.quantity)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Book with ISBN {} already exists", book.isbn))
            } else {
                AppError::Database(e)
            }
        })?;

        self.replace_author_links(&mut tx, id, &book.author_ids).await?;
        if let Some(ref category_ids) = book.category_ids {
            self.replace_category_links(&mut tx, id, category_ids).await?;
        }

        tx.commit().await?;

        self.get_by_id(id).await
    }

    /// Update a book, applying only the scalar fields present and resyncing
    /// whichever link sets the request carries
    pub async fn update_with_relations(&self, id: i32, book: &UpdateBook) -> AppResult<Book> {
        self.get_by_id(id).await?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE books SET
                title = COALESCE($1, title),
                publication_year = COALESCE($2, publication_year),
                isbn = COALESCE($3, isbn),
                quantity = COALESCE($4, quantity),
                updated_at = $5
            WHERE id = $6
            "#,
        )
        .bind(book.title.as_deref())
        .bind(book.publication_year)
        .bind(book.isbn.as_deref())
        .bind(book.quantity)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!(
                    "Book with ISBN {} already exists",
                    book.isbn.as_deref().unwrap_or("")
                ))
            } else {
                AppError::Database(e)
            }
        })?;

        if let Some(ref author_ids) = book.author_ids {
            self.replace_author_links(&mut tx, id, author_ids).await?;
        }
        if let Some(ref category_ids) = book.category_ids {
            self.replace_category_links(&mut tx, id, category_ids).await?;
        }

        tx.commit().await?;

        self.get_by_id(id).await
    }

    // =========================================================================
    // LINK SETS (full replace)
    // =========================================================================

    /// Replace all author links for a book: delete existing rows, verify each
    /// requested author exists, then insert the new set.
    async fn replace_author_links(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        book_id: i32,
        author_ids: &[i32],
    ) -> AppResult<()> {
        sqlx::query("DELETE FROM book_author_link WHERE book_id = $1")
            .bind(book_id)
            .execute(&mut **tx)
            .await?;

        for &author_id in author_ids {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM authors WHERE id = $1)")
                    .bind(author_id)
                    .fetch_one(&mut **tx)
                    .await?;
            if !exists {
                return Err(AppError::NotFound(format!(
                    "Author with id {} not found",
                    author_id
                )));
            }

            sqlx::query(
                r#"
                INSERT INTO book_author_link (book_id, author_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(book_id)
            .bind(author_id)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    /// Replace all category links for a book, same shape as the author set
    async fn replace_category_links(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        book_id: i32,
        category_ids: &[i32],
    ) -> AppResult<()> {
        sqlx::query("DELETE FROM book_category_link WHERE book_id = $1")
            .bind(book_id)
            .execute(&mut **tx)
            .await?;

        for &category_id in category_ids {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)")
                    .bind(category_id)
                    .fetch_one(&mut **tx)
                    .await?;
            if !exists {
                return Err(AppError::NotFound(format!(
                    "Category with id {} not found",
                    category_id
                )));
            }

            sqlx::query(
                r#"
                INSERT INTO book_category_link (book_id, category_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(book_id)
            .bind(category_id)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    // =========================================================================
    // DELETE
    // =========================================================================

    /// Delete a book. Blocked while any of its copies is still out; link
    /// rows and returned borrow history go with it.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.get_by_id(id).await?;

        let open_borrows: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrowed_books WHERE book_id = $1 AND return_date IS NULL",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        if open_borrows > 0 {
            return Err(AppError::ReferentialBlock(format!(
                "Cannot delete book with id {} because it has {} unreturned borrow(s)",
                id, open_borrows
            )));
        }

        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
