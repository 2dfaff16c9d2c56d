#![cfg(feature = "inmem-store")]

// Soft-delete moderation by staff and self-service hard deletion.

use actix_web::{test, App};
use lostfound::auth::{create_jwt, Role};
use lostfound::repo::inmem::InMemRepo;
use lostfound::{config, AppState};
use serial_test::serial;
use std::sync::Arc;

fn setup_env() {
    std::env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
    let tmp = tempfile::tempdir().unwrap();
    std::env::set_var("LOSTFOUND_DATA_DIR", tmp.path().to_str().unwrap());
}

fn staff_token() -> String { create_jwt("staff-1", vec![Role::Staff]).unwrap() }
fn owner_token() -> String { create_jwt("owner-1", vec![Role::Student]).unwrap() }
fn stranger_token() -> String { create_jwt("stranger-1", vec![Role::Student]).unwrap() }

macro_rules! report_found_item {
    ($app:expr, $title:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/v1/items")
            .insert_header(("Authorization", format!("Bearer {}", staff_token())))
            .set_json(&serde_json::json!({
                "title": $title,
                "description": "desc",
                "category": "other",
                "status": "found",
                "location": "Front Desk",
                "date_lost_found": "2025-04-01"
            }))
            .to_request();
        let resp = test::call_service($app, req).await;
        assert_eq!(resp.status(), 201);
        let item: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
        item["id"].as_i64().unwrap()
    }};
}

#[actix_web::test]
#[serial]
async fn test_deactivate_and_restore_visibility() {
    setup_env();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(AppState { repo: Arc::new(InMemRepo::new()), rate_limiter: None }))
            .configure(config)
    ).await;
    let id = report_found_item!(&app, "Umbrella");

    // visible to the public at first
    let req = test::TestRequest::get().uri("/api/v1/items").to_request();
    let resp = test::call_service(&app, req).await;
    let items: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(items.as_array().unwrap().len(), 1);

    // students cannot moderate
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/admin/items/{id}/deactivate"))
        .insert_header(("Authorization", format!("Bearer {}", stranger_token())))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    // staff deactivate
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/admin/items/{id}/deactivate"))
        .insert_header(("Authorization", format!("Bearer {}", staff_token())))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    // gone from browse for everyone, staff included
    let req = test::TestRequest::get().uri("/api/v1/items").to_request();
    let resp = test::call_service(&app, req).await;
    let items: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(items.as_array().unwrap().len(), 0);
    let req = test::TestRequest::get()
        .uri("/api/v1/items")
        .insert_header(("Authorization", format!("Bearer {}", staff_token())))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let items: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(items.as_array().unwrap().len(), 0);

    // and from single fetch for the public
    let req = test::TestRequest::get().uri(&format!("/api/v1/items/{id}")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    // the moderation listing still shows it with the flag
    let req = test::TestRequest::get()
        .uri("/api/v1/admin/items?include_inactive=1")
        .insert_header(("Authorization", format!("Bearer {}", staff_token())))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let items: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let arr = items.as_array().unwrap();
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["is_active"], false);

    // without the flag it stays hidden
    let req = test::TestRequest::get()
        .uri("/api/v1/admin/items")
        .insert_header(("Authorization", format!("Bearer {}", staff_token())))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let items: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(items.as_array().unwrap().len(), 0);

    // restore brings it back
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/admin/items/{id}/restore"))
        .insert_header(("Authorization", format!("Bearer {}", staff_token())))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    let req = test::TestRequest::get().uri("/api/v1/items").to_request();
    let resp = test::call_service(&app, req).await;
    let items: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(items.as_array().unwrap().len(), 1);
}

#[actix_web::test]
#[serial]
async fn test_owner_hard_delete() {
    setup_env();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(AppState { repo: Arc::new(InMemRepo::new()), rate_limiter: None }))
            .configure(config)
    ).await;

    // owner reports a lost item
    let req = test::TestRequest::post()
        .uri("/api/v1/items")
        .insert_header(("Authorization", format!("Bearer {}", owner_token())))
        .set_json(&serde_json::json!({
            "title": "Textbook",
            "description": "Calculus II",
            "category": "books",
            "status": "lost",
            "location": "Room 101",
            "date_lost_found": "2025-04-02"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let item: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let id = item["id"].as_i64().unwrap();

    // a stranger may not delete it
    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/items/{id}"))
        .insert_header(("Authorization", format!("Bearer {}", stranger_token())))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    // deletion requires a token at all
    let req = test::TestRequest::delete().uri(&format!("/api/v1/items/{id}")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    // the owner can, and the record is gone for good
    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/items/{id}"))
        .insert_header(("Authorization", format!("Bearer {}", owner_token())))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/items/{id}"))
        .insert_header(("Authorization", format!("Bearer {}", staff_token())))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    // deleting again -> 404
    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/items/{id}"))
        .insert_header(("Authorization", format!("Bearer {}", owner_token())))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
#[serial]
async fn test_illegal_status_transition_is_conflict() {
    setup_env();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(AppState { repo: Arc::new(InMemRepo::new()), rate_limiter: None }))
            .configure(config)
    ).await;
    let id = report_found_item!(&app, "Water Bottle");

    // found -> returned is fine
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/items/{id}/status"))
        .insert_header(("Authorization", format!("Bearer {}", staff_token())))
        .set_json(&serde_json::json!({"status": "returned"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    // returned -> lost is not
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/items/{id}/status"))
        .insert_header(("Authorization", format!("Bearer {}", staff_token())))
        .set_json(&serde_json::json!({"status": "lost"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 409);
}
