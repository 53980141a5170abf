//! Vocabulary and kanji browse endpoint tests.
//!
//! Require PostgreSQL (DATABASE_URL); run with --test-threads=1.

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;

use common::{fixtures, TestContext};

#[tokio::test]
#[ignore = "requires database"]
async fn vocab_listing_paginates_by_id() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    for i in 0..5 {
        fixtures::insert_vocab(&ctx.db, &format!("語彙{i}"), "ごい", "vocabulary", "N5").await;
    }
    fixtures::insert_vocab(&ctx.db, "難問", "なんもん", "hard question", "N1").await;

    let response = server.get("/api/vocab?page=1&limit=3").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["total"], 6);
    assert_eq!(body["page_size"], 3);
    assert_eq!(body["items"].as_array().unwrap().len(), 3);

    // Stable id ordering across pages.
    let first_page_last = body["items"][2]["id"].as_i64().unwrap();
    let response = server.get("/api/vocab?page=2&limit=3").await;
    let body: serde_json::Value = response.json();
    assert!(body["items"][0]["id"].as_i64().unwrap() > first_page_last);

    // Level filter.
    let response = server.get("/api/vocab?level=N1").await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["word"], "難問");
}

#[tokio::test]
#[ignore = "requires database"]
async fn vocab_search_matches_word_reading_and_gloss() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    fixtures::insert_vocab(&ctx.db, "食べる", "たべる", "to eat", "N5").await;
    fixtures::insert_vocab(&ctx.db, "水", "みず", "water", "N5").await;

    for query in ["食べ", "たべ", "eat", "EAT"] {
        let response = server
            .get("/api/vocab")
            .add_query_param("search", query)
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["total"], 1, "search '{query}'");
        assert_eq!(body["items"][0]["word"], "食べる");
    }

    let response = server.get("/api/vocab?search=nothing-like-this").await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["total"], 0);
}

#[tokio::test]
#[ignore = "requires database"]
async fn vocab_detail_and_not_found() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    let id = fixtures::insert_vocab(&ctx.db, "犬", "いぬ", "dog", "N5").await;

    let response = server.get(&format!("/api/vocab/{id}")).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["word"], "犬");
    assert_eq!(body["jlpt_level"], "N5");

    let response = server.get("/api/vocab/99999").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires database"]
async fn kanji_detail_requires_a_single_character() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    fixtures::insert_kanji(&ctx.db, "日", "N5", 1).await;

    // Percent-encoded 日; axum decodes path parameters.
    let response = server.get("/api/kanji/%E6%97%A5").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["character"], "日");
    assert_eq!(body["on_yomi"][0], "ニチ");

    // 日本 is two characters.
    let response = server.get("/api/kanji/%E6%97%A5%E6%9C%AC").await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    // 月 exists in no fixture.
    let response = server.get("/api/kanji/%E6%9C%88").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires database"]
async fn listing_rejects_out_of_range_parameters() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    let response = server.get("/api/vocab?limit=0").await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let response = server.get("/api/vocab?limit=201").await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let response = server.get("/api/vocab?page=0").await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}
