//! Book model and related types.
//!
//! A book owns its author and category link sets; both are loaded
//! separately from the join tables and replaced as whole sets on update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::author::Author;
use super::category::Category;

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub publication_year: Option<i32>,
    pub isbn: String,
    /// Copies currently on the shelf (total copies minus unreturned borrows)
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    // Relations (loaded separately)
    #[sqlx(skip)]
    #[serde(default)]
    pub authors: Vec<Author>,
    #[sqlx(skip)]
    #[serde(default)]
    pub categories: Vec<Category>,
}

fn default_quantity() -> i32 {
    1
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1))]
    pub title: String,
    pub publication_year: Option<i32>,
    #[validate(length(min = 1))]
    pub isbn: String,
    #[validate(range(min = 0))]
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default)]
    pub author_ids: Vec<i32>,
    pub category_ids: Option<Vec<i32>>,
}

/// Update book request. Absent scalar fields are left unchanged; an
/// absent `author_ids`/`category_ids` leaves that relation untouched,
/// while an empty list clears all links.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1))]
    pub title: Option<String>,
    pub publication_year: Option<i32>,
    #[validate(length(min = 1))]
    pub isbn: Option<String>,
    #[validate(range(min = 0))]
    pub quantity: Option<i32>,
    pub author_ids: Option<Vec<i32>>,
    pub category_ids: Option<Vec<i32>>,
}

/// Book query parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Substring match on title
    pub title: Option<String>,
    /// Only books linked to this author
    pub author_id: Option<i32>,
    /// Only books linked to this category
    pub category_id: Option<i32>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Availability report for a book
#[derive(Debug, Serialize, ToSchema)]
pub struct BookAvailability {
    pub book_id: i32,
    pub total_copies: i64,
    pub available_copies: i64,
    pub is_available: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_relation_ids_deserialize_as_untouched() {
        let update: UpdateBook = serde_json::from_str(r#"{"title": "Dune"}"#).unwrap();
        assert!(update.author_ids.is_none());
        assert!(update.category_ids.is_none());
    }

    #[test]
    fn empty_relation_ids_deserialize_as_clear() {
        let update: UpdateBook =
            serde_json::from_str(r#"{"author_ids": [], "category_ids": []}"#).unwrap();
        assert_eq!(update.author_ids, Some(vec![]));
        assert_eq!(update.category_ids, Some(vec![]));
    }

    #[test]
    fn create_defaults_to_one_copy_and_no_authors() {
        let create: CreateBook =
            serde_json::from_str(r#"{"title": "Dune", "isbn": "978-0441013593"}"#).unwrap();
        assert_eq!(create.quantity, 1);
        assert!(create.author_ids.is_empty());
        assert!(create.category_ids.is_none());
    }
}
