//! API integration tests
//!
//! Run against a live server with a migrated database:
//! cargo test -- --ignored

use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

/// Unique suffix so repeated runs don't trip the unique ISBN/email indexes
fn unique_suffix() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock before epoch")
        .as_nanos()
}

async fn create_author(client: &Client, last_name: &str) -> i64 {
    let response = client
        .post(format!("{}/authors", BASE_URL))
        .json(&json!({
            "first_name": "Test",
            "last_name": last_name
        }))
        .send()
        .await
        .expect("Failed to create author");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse author");
    body["id"].as_i64().expect("No author ID")
}

async fn create_book(client: &Client, quantity: i64, author_ids: &[i64]) -> i64 {
    let response = client
        .post(format!("{}/books", BASE_URL))
        .json(&json!({
            "title": "Test Book",
            "publication_year": 1999,
            "isbn": format!("isbn-{}", unique_suffix()),
            "quantity": quantity,
            "author_ids": author_ids
        }))
        .send()
        .await
        .expect("Failed to create book");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse book");
    body["id"].as_i64().expect("No book ID")
}

async fn create_user(client: &Client) -> i64 {
    let response = client
        .post(format!("{}/users", BASE_URL))
        .json(&json!({
            "first_name": "Test",
            "last_name": "Reader",
            "email": format!("reader-{}@example.com", unique_suffix())
        }))
        .send()
        .await
        .expect("Failed to create user");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse user");
    body["id"].as_i64().expect("No user ID")
}

async fn borrow(client: &Client, book_id: i64, user_id: i64) -> reqwest::Response {
    client
        .post(format!("{}/borrows", BASE_URL))
        .json(&json!({ "book_id": book_id, "user_id": user_id }))
        .send()
        .await
        .expect("Failed to send borrow request")
}

async fn available_copies(client: &Client, book_id: i64) -> i64 {
    let response = client
        .get(format!("{}/books/{}/availability", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to fetch availability");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse availability");
    body["available_copies"].as_i64().expect("No available_copies")
}

#[tokio::test]
#[ignore]
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_author_set_replacement() {
    let client = Client::new();

    let a1 = create_author(&client, "First").await;
    let a2 = create_author(&client, "Second").await;
    let a3 = create_author(&client, "Third").await;
    let book_id = create_book(&client, 1, &[a1, a2]).await;

    // Replace the set entirely
    let response = client
        .put(format!("{}/books/{}", BASE_URL, book_id))
        .json(&json!({ "author_ids": [a2, a3] }))
        .send()
        .await
        .expect("Failed to update book");
    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse book");
    let mut ids: Vec<i64> = body["authors"]
        .as_array()
        .expect("No authors array")
        .iter()
        .map(|a| a["id"].as_i64().expect("No author id"))
        .collect();
    ids.sort();
    let mut expected = vec![a2, a3];
    expected.sort();
    assert_eq!(ids, expected);

    // The empty set clears all links
    let response = client
        .put(format!("{}/books/{}", BASE_URL, book_id))
        .json(&json!({ "author_ids": [] }))
        .send()
        .await
        .expect("Failed to update book");
    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse book");
    assert_eq!(body["authors"].as_array().expect("No authors array").len(), 0);

    // A request without the field leaves the relation untouched
    let response = client
        .put(format!("{}/books/{}", BASE_URL, book_id))
        .json(&json!({ "title": "Renamed" }))
        .send()
        .await
        .expect("Failed to update book");
    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse book");
    assert_eq!(body["title"], "Renamed");
    assert_eq!(body["authors"].as_array().expect("No authors array").len(), 0);
}

#[tokio::test]
#[ignore]
async fn test_unknown_author_id_rejected() {
    let client = Client::new();

    let response = client
        .post(format!("{}/books", BASE_URL))
        .json(&json!({
            "title": "Ghost-written",
            "isbn": format!("isbn-{}", unique_suffix()),
            "author_ids": [999999999]
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 404);
}

#[tokio::test]
#[ignore]
async fn test_duplicate_isbn_conflict() {
    let client = Client::new();

    let isbn = format!("isbn-{}", unique_suffix());
    let response = client
        .post(format!("{}/books", BASE_URL))
        .json(&json!({ "title": "Original", "isbn": isbn }))
        .send()
        .await
        .expect("Failed to create book");
    assert_eq!(response.status(), 201);

    let response = client
        .post(format!("{}/books", BASE_URL))
        .json(&json!({ "title": "Copycat", "isbn": isbn }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore]
async fn test_duplicate_email_conflict() {
    let client = Client::new();

    let email = format!("dup-{}@example.com", unique_suffix());
    let response = client
        .post(format!("{}/users", BASE_URL))
        .json(&json!({ "first_name": "A", "last_name": "B", "email": email }))
        .send()
        .await
        .expect("Failed to create user");
    assert_eq!(response.status(), 201);

    let response = client
        .post(format!("{}/users", BASE_URL))
        .json(&json!({ "first_name": "C", "last_name": "D", "email": email }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore]
async fn test_borrow_unavailable_book() {
    let client = Client::new();

    let book_id = create_book(&client, 1, &[]).await;
    let user_a = create_user(&client).await;
    let user_b = create_user(&client).await;

    // First borrow takes the only copy
    let response = borrow(&client, book_id, user_a).await;
    assert_eq!(response.status(), 201);
    assert_eq!(available_copies(&client, book_id).await, 0);

    // Second borrower is turned away without any quantity change
    let response = borrow(&client, book_id, user_b).await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("Failed to parse error");
    assert_eq!(body["error"], "unavailable");
    assert_eq!(available_copies(&client, book_id).await, 0);
}

#[tokio::test]
#[ignore]
async fn test_borrow_return_round_trip() {
    let client = Client::new();

    let book_id = create_book(&client, 2, &[]).await;
    let user_id = create_user(&client).await;
    let before = available_copies(&client, book_id).await;

    let response = borrow(&client, book_id, user_id).await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse borrow");
    let borrow_id = body["id"].as_i64().expect("No borrow ID");
    assert_eq!(body["status"], "active");
    assert_eq!(available_copies(&client, book_id).await, before - 1);

    let response = client
        .post(format!("{}/borrows/{}/return", BASE_URL, borrow_id))
        .send()
        .await
        .expect("Failed to return");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse return");
    assert_eq!(body["status"], "returned");
    assert_eq!(body["receipt"]["borrow"]["status"], "returned");
    assert!(body["receipt"]["borrow"]["return_date"].is_string());
    assert_eq!(available_copies(&client, book_id).await, before);

    // A second return is rejected
    let response = client
        .post(format!("{}/borrows/{}/return", BASE_URL, borrow_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("Failed to parse error");
    assert_eq!(body["error"], "already_returned");
}

#[tokio::test]
#[ignore]
async fn test_borrow_limit() {
    let client = Client::new();

    // Default policy: 5 borrows per user
    let book_id = create_book(&client, 10, &[]).await;
    let user_id = create_user(&client).await;

    for _ in 0..5 {
        let response = borrow(&client, book_id, user_id).await;
        assert_eq!(response.status(), 201);
    }

    let before = available_copies(&client, book_id).await;
    let response = borrow(&client, book_id, user_id).await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("Failed to parse error");
    assert_eq!(body["error"], "borrow_limit_exceeded");
    assert_eq!(available_copies(&client, book_id).await, before);
}

#[tokio::test]
#[ignore]
async fn test_delete_unreturned_borrow_restores_availability() {
    let client = Client::new();

    let book_id = create_book(&client, 1, &[]).await;
    let user_id = create_user(&client).await;

    let response = borrow(&client, book_id, user_id).await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse borrow");
    let borrow_id = body["id"].as_i64().expect("No borrow ID");
    assert_eq!(available_copies(&client, book_id).await, 0);

    let response = client
        .delete(format!("{}/borrows/{}", BASE_URL, borrow_id))
        .send()
        .await
        .expect("Failed to delete borrow");
    assert_eq!(response.status(), 204);
    assert_eq!(available_copies(&client, book_id).await, 1);
}

#[tokio::test]
#[ignore]
async fn test_overdue_sweep_idempotent() {
    let client = Client::new();

    let sweep = |client: Client| async move {
        let response = client
            .post(format!("{}/borrows/overdue", BASE_URL))
            .send()
            .await
            .expect("Failed to sweep");
        assert!(response.status().is_success());
        let body: Value = response.json().await.expect("Failed to parse sweep");
        let mut ids: Vec<i64> = body
            .as_array()
            .expect("Expected array")
            .iter()
            .map(|b| b["id"].as_i64().expect("No borrow id"))
            .collect();
        ids.sort();
        ids
    };

    let first = sweep(client.clone()).await;
    let second = sweep(client).await;
    assert_eq!(first, second);
}

#[tokio::test]
#[ignore]
async fn test_referential_blocks() {
    let client = Client::new();

    let author_id = create_author(&client, "Blocked").await;
    let book_id = create_book(&client, 1, &[author_id]).await;

    // Author with a linked book cannot be deleted
    let response = client
        .delete(format!("{}/authors/{}", BASE_URL, author_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("Failed to parse error");
    assert_eq!(body["error"], "referential_block");

    // User with an unreturned borrow cannot be deleted
    let user_id = create_user(&client).await;
    let response = borrow(&client, book_id, user_id).await;
    assert_eq!(response.status(), 201);
    let borrow_id = response.json::<Value>().await.expect("Failed to parse")["id"]
        .as_i64()
        .expect("No borrow ID");

    let response = client
        .delete(format!("{}/users/{}", BASE_URL, user_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 400);

    // After the return everything unwinds in dependency order
    let response = client
        .post(format!("{}/borrows/{}/return", BASE_URL, borrow_id))
        .send()
        .await
        .expect("Failed to return");
    assert!(response.status().is_success());

    let response = client
        .delete(format!("{}/users/{}", BASE_URL, user_id))
        .send()
        .await
        .expect("Failed to delete user");
    assert_eq!(response.status(), 204);

    let response = client
        .delete(format!("{}/books/{}", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to delete book");
    assert_eq!(response.status(), 204);

    let response = client
        .delete(format!("{}/authors/{}", BASE_URL, author_id))
        .send()
        .await
        .expect("Failed to delete author");
    assert_eq!(response.status(), 204);
}
