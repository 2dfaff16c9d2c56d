#![cfg(feature = "inmem-store")]

use actix_web::{test, App};
use lostfound::auth::{create_jwt, Role};
use lostfound::repo::inmem::InMemRepo;
use lostfound::{config, AppState, SecurityHeaders};
use serial_test::serial;
use std::sync::Arc;

// Helper to ensure JWT secret present & unique temp data dir per test
fn setup_env() {
    std::env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
    let tmp = tempfile::tempdir().unwrap();
    std::env::set_var("LOSTFOUND_DATA_DIR", tmp.path().to_str().unwrap());
}

fn staff_token() -> String { create_jwt("staff-1", vec![Role::Staff]).unwrap() }
fn student_token() -> String { create_jwt("student-1", vec![Role::Student]).unwrap() }

fn app_state() -> AppState {
    AppState { repo: Arc::new(InMemRepo::new()), rate_limiter: None }
}

fn found_item_body(title: &str) -> serde_json::Value {
    serde_json::json!({
        "title": title,
        "description": "Black phone with cracked case",
        "category": "electronics",
        "status": "found",
        "location": "Library",
        "color": "Black",
        "date_lost_found": "2025-01-10"
    })
}

#[actix_web::test]
#[serial]
async fn test_report_browse_claim_flow() {
    setup_env();
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::from_env())
            .app_data(actix_web::web::Data::new(app_state()))
            .configure(config)
    ).await;

    // browse starts empty
    let req = test::TestRequest::get().uri("/api/v1/items").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let v: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(v.as_array().unwrap().len(), 0);

    // staff reports a found item
    let req = test::TestRequest::post()
        .uri("/api/v1/items")
        .insert_header(("Authorization", format!("Bearer {}", staff_token())))
        .set_json(&found_item_body("iPhone 13"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let item: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let item_id = item["id"].as_i64().unwrap();
    // found items get a default retention window
    assert!(item["expiry_date"].is_string());

    // anonymous browse sees it
    let req = test::TestRequest::get().uri("/api/v1/items").to_request();
    let resp = test::call_service(&app, req).await;
    let items: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(items.as_array().unwrap().len(), 1);

    // anonymous claim with a contact channel
    let req = test::TestRequest::post()
        .uri("/api/v1/claims")
        .set_json(&serde_json::json!({
            "item_id": item_id,
            "first_name": "Ada",
            "email": "ada@campus.edu",
            "message": "Lost it on Monday, lock screen is a cat photo"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let claim: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(claim["status"], "pending");
    assert!(claim["reference_number"].as_str().unwrap().starts_with("LF-"));
    let claim_id = claim["id"].as_i64().unwrap();

    // staff approves with notes
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/claims/{claim_id}/approve"))
        .insert_header(("Authorization", format!("Bearer {}", staff_token())))
        .set_json(&serde_json::json!({"staff_notes": "ID checked at desk"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let decided: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(decided["status"], "approved");
    assert_eq!(decided["staff_notes"], "ID checked at desk");

    // staff marks the item claimed
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/items/{item_id}/status"))
        .insert_header(("Authorization", format!("Bearer {}", staff_token())))
        .set_json(&serde_json::json!({"status": "claimed"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let updated: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(updated["status"], "claimed");

    // the audit trail saw all of it
    let req = test::TestRequest::get()
        .uri("/api/v1/admin/audit")
        .insert_header(("Authorization", format!("Bearer {}", staff_token())))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let audit: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert!(audit.as_array().unwrap().len() >= 3);
}

#[actix_web::test]
#[serial]
async fn test_anonymous_can_only_report_lost() {
    setup_env();
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::from_env())
            .app_data(actix_web::web::Data::new(app_state()))
            .configure(config)
    ).await;

    // found report without a token -> 403
    let req = test::TestRequest::post()
        .uri("/api/v1/items")
        .set_json(&found_item_body("Not Yours"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    // student token is not enough either
    let req = test::TestRequest::post()
        .uri("/api/v1/items")
        .insert_header(("Authorization", format!("Bearer {}", student_token())))
        .set_json(&found_item_body("Still Not Yours"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    // anonymous lost report is fine and flagged anonymous
    let mut body = found_item_body("Car Keys");
    body["status"] = serde_json::json!("lost");
    let req = test::TestRequest::post()
        .uri("/api/v1/items")
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let item: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(item["is_anonymous"], true);
    assert!(item["user_id"].is_null());
}

#[actix_web::test]
#[serial]
async fn test_auth_me_and_refresh() {
    setup_env();
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::from_env())
            .app_data(actix_web::web::Data::new(app_state()))
            .configure(config)
    ).await;

    let token = student_token();

    // auth/me
    let req = test::TestRequest::get()
        .uri("/api/v1/auth/me")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let me: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(me["role"], "student");
    assert_eq!(me["id"], "student-1");

    // refresh
    let req = test::TestRequest::post()
        .uri("/api/v1/auth/refresh")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let refreshed: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert!(refreshed["token"].as_str().unwrap().len() > 10);
}

#[actix_web::test]
#[serial]
async fn test_set_user_role_endpoint() {
    setup_env();
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::from_env())
            .app_data(actix_web::web::Data::new(app_state()))
            .configure(config)
    ).await;

    // students may not assign roles
    let req = test::TestRequest::post()
        .uri("/api/v1/admin/roles")
        .insert_header(("Authorization", format!("Bearer {}", student_token())))
        .set_json(&serde_json::json!({"user_id":"u-9","role":"staff"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    // staff assigns staff role
    let req = test::TestRequest::post()
        .uri("/api/v1/admin/roles")
        .insert_header(("Authorization", format!("Bearer {}", staff_token())))
        .set_json(&serde_json::json!({"user_id":"u-9","role":"staff"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    // unknown role string -> 400
    let req = test::TestRequest::post()
        .uri("/api/v1/admin/roles")
        .insert_header(("Authorization", format!("Bearer {}", staff_token())))
        .set_json(&serde_json::json!({"user_id":"u-9","role":"janitor"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    // the stored assignment overrides what the token claims
    let u9 = create_jwt("u-9", vec![Role::Student]).unwrap();
    let req = test::TestRequest::get()
        .uri("/api/v1/auth/me")
        .insert_header(("Authorization", format!("Bearer {u9}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let me: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(me["role"], "staff");
}

#[actix_web::test]
#[serial]
async fn test_stats_and_reports_endpoints() {
    setup_env();
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::from_env())
            .app_data(actix_web::web::Data::new(app_state()))
            .configure(config)
    ).await;

    // seed: one found electronics, one lost keys
    let req = test::TestRequest::post()
        .uri("/api/v1/items")
        .insert_header(("Authorization", format!("Bearer {}", staff_token())))
        .set_json(&found_item_body("iPhone 13"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    let req = test::TestRequest::post()
        .uri("/api/v1/items")
        .set_json(&serde_json::json!({
            "title": "Car Keys",
            "description": "Silver keys on a red lanyard",
            "category": "keys",
            "status": "lost",
            "location": "Parking",
            "date_lost_found": "2025-01-12"
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    // stats require staff
    let req = test::TestRequest::get().uri("/api/v1/admin/stats")
        .insert_header(("Authorization", format!("Bearer {}", student_token())))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::get().uri("/api/v1/admin/stats")
        .insert_header(("Authorization", format!("Bearer {}", staff_token())))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let stats: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(stats["total_items"], 2);
    assert_eq!(stats["lost_items"], 1);
    assert_eq!(stats["found_items"], 1);
    assert_eq!(stats["items_this_week"], 2);

    let req = test::TestRequest::get().uri("/api/v1/admin/reports")
        .insert_header(("Authorization", format!("Bearer {}", staff_token())))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let reports: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let by_category = reports["by_category"].as_array().unwrap();
    assert!(by_category.iter().any(|c| c["category"] == "electronics" && c["count"] == 1));
    assert!(by_category.iter().any(|c| c["category"] == "keys" && c["count"] == 1));
    // both items landed in the current month bucket
    assert_eq!(reports["monthly"].as_array().unwrap().len(), 1);
}
