#![cfg(feature = "inmem-store")]

// Visibility gating and filter behaviour through the HTTP surface.

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
fn student_token() -> String { create_jwt("student-1", vec![Role::Student]).unwrap() }

/// GET `uri` (optionally authenticated) and return the item titles in order.
macro_rules! browse_titles {
    ($app:expr, $uri:expr, $token:expr) => {{
        let token: Option<String> = $token;
        let mut req = test::TestRequest::get().uri($uri);
        if let Some(t) = token {
            req = req.insert_header(("Authorization", format!("Bearer {t}")));
        }
        let resp = test::call_service($app, req.to_request()).await;
        assert!(resp.status().is_success(), "GET {} failed: {}", $uri, resp.status());
        let items: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
        items
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["title"].as_str().unwrap().to_string())
            .collect::<Vec<String>>()
    }};
}

/// Seed one found item (staff report) and one lost item (anonymous report).
macro_rules! seed {
    ($app:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/v1/items")
            .insert_header(("Authorization", format!("Bearer {}", staff_token())))
            .set_json(&serde_json::json!({
                "title": "iPhone 13",
                "description": "Black phone",
                "category": "electronics",
                "status": "found",
                "location": "Library",
                "color": "Black",
                "date_lost_found": "2025-01-10"
            }))
            .to_request();
        assert_eq!(test::call_service($app, req).await.status(), 201);

        let req = test::TestRequest::post()
            .uri("/api/v1/items")
            .set_json(&serde_json::json!({
                "title": "Car Keys",
                "description": "Silver keys",
                "category": "keys",
                "status": "lost",
                "location": "Parking",
                "color": "Silver",
                "date_lost_found": "2025-01-12"
            }))
            .to_request();
        assert_eq!(test::call_service($app, req).await.status(), 201);
    }};
}

#[actix_web::test]
#[serial]
async fn visibility_gate_restricts_non_staff_to_found_items() {
    setup_env();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(AppState { repo: Arc::new(InMemRepo::new()), rate_limiter: None }))
            .configure(config)
    ).await;
    seed!(&app);

    // anonymous and student: found items only
    assert_eq!(browse_titles!(&app, "/api/v1/items", None), vec!["iPhone 13"]);
    assert_eq!(
        browse_titles!(&app, "/api/v1/items", Some(student_token())),
        vec!["iPhone 13"]
    );

    // staff see everything, newest first
    assert_eq!(
        browse_titles!(&app, "/api/v1/items", Some(staff_token())),
        vec!["Car Keys", "iPhone 13"]
    );
}

#[actix_web::test]
#[serial]
async fn status_filter_cannot_widen_student_visibility() {
    setup_env();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(AppState { repo: Arc::new(InMemRepo::new()), rate_limiter: None }))
            .configure(config)
    ).await;
    seed!(&app);

    // a student asking for lost items gets nothing, not other people's reports
    assert!(browse_titles!(&app, "/api/v1/items?status=lost", Some(student_token())).is_empty());

    // the same spec works for staff
    assert_eq!(
        browse_titles!(&app, "/api/v1/items?status=lost", Some(staff_token())),
        vec!["Car Keys"]
    );
}

#[actix_web::test]
#[serial]
async fn filters_compose_over_the_gated_set() {
    setup_env();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(AppState { repo: Arc::new(InMemRepo::new()), rate_limiter: None }))
            .configure(config)
    ).await;
    seed!(&app);

    // category
    assert_eq!(
        browse_titles!(&app, "/api/v1/items?category=electronics", Some(staff_token())),
        vec!["iPhone 13"]
    );

    // case-insensitive free text across fields
    assert_eq!(
        browse_titles!(&app, "/api/v1/items?q=BLACK", Some(staff_token())),
        vec!["iPhone 13"]
    );
    assert_eq!(
        browse_titles!(&app, "/api/v1/items?q=parking", Some(staff_token())),
        vec!["Car Keys"]
    );

    // inclusive date window
    assert_eq!(
        browse_titles!(&app, "/api/v1/items?date_from=2025-01-11&date_to=2025-01-13", Some(staff_token())),
        vec!["Car Keys"]
    );
    assert_eq!(
        browse_titles!(&app, "/api/v1/items?date_from=2025-01-10&date_to=2025-01-10", Some(staff_token())),
        vec!["iPhone 13"]
    );

    // unparsable bounds are ignored rather than failing the request
    assert_eq!(
        browse_titles!(&app, "/api/v1/items?date_from=garbage", Some(staff_token())),
        vec!["Car Keys", "iPhone 13"]
    );

    // "all" sentinel means unconstrained
    assert_eq!(
        browse_titles!(&app, "/api/v1/items?status=all&category=all", Some(staff_token())),
        vec!["Car Keys", "iPhone 13"]
    );
}

#[actix_web::test]
#[serial]
async fn single_item_fetch_is_gated_too() {
    setup_env();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(AppState { repo: Arc::new(InMemRepo::new()), rate_limiter: None }))
            .configure(config)
    ).await;

    // student reports their own lost item
    let req = test::TestRequest::post()
        .uri("/api/v1/items")
        .insert_header(("Authorization", format!("Bearer {}", student_token())))
        .set_json(&serde_json::json!({
            "title": "Lost Wallet",
            "description": "Brown leather",
            "category": "accessories",
            "status": "lost",
            "location": "Cafeteria",
            "date_lost_found": "2025-02-01"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let item: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let id = item["id"].as_i64().unwrap();

    // anonymous fetch of a lost item -> 404
    let req = test::TestRequest::get().uri(&format!("/api/v1/items/{id}")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    // the owner still sees it
    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/items/{id}"))
        .insert_header(("Authorization", format!("Bearer {}", student_token())))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    // so do staff
    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/items/{id}"))
        .insert_header(("Authorization", format!("Bearer {}", staff_token())))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
}
