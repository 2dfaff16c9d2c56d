use std::collections::BTreeMap;
use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{Datelike, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde_json::json;

use crate::auth::{Auth, Role};
use crate::error::ApiError;
use crate::models::*;
use crate::rate_limit::RateLimiterFacade;
use crate::repo::Repo;
use crate::search::{filter_items, FilterSpec, Viewer};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::resource("/items")
                    .route(web::get().to(browse_items))
                    .route(web::post().to(report_item)),
            )
            .service(
                web::resource("/items/{id}")
                    .route(web::get().to(get_item))
                    .route(web::patch().to(update_item))
                    .route(web::delete().to(delete_item)),
            )
            .service(web::resource("/items/{id}/status").route(web::post().to(set_item_status)))
            .service(web::resource("/my/items").route(web::get().to(my_items)))
            .service(web::resource("/my/claims").route(web::get().to(my_claims)))
            .service(web::resource("/my/claims/received").route(web::get().to(my_received_claims)))
            .service(
                web::resource("/claims")
                    .route(web::get().to(list_claims))
                    .route(web::post().to(create_claim)),
            )
            .service(web::resource("/claims/{id}/approve").route(web::post().to(approve_claim)))
            .service(web::resource("/claims/{id}/reject").route(web::post().to(reject_claim)))
            .service(
                web::resource("/matches")
                    .route(web::get().to(list_matches))
                    .route(web::post().to(create_match)),
            )
            .service(web::resource("/matches/{id}/review").route(web::post().to(review_match)))
            .service(web::resource("/auth/me").route(web::get().to(auth_me)))
            .service(web::resource("/auth/refresh").route(web::post().to(refresh_token)))
            // Staff administration endpoints
            .service(web::resource("/admin/items").route(web::get().to(admin_list_items)))
            .service(
                web::resource("/admin/items/{id}/deactivate")
                    .route(web::post().to(admin_deactivate_item)),
            )
            .service(
                web::resource("/admin/items/{id}/restore")
                    .route(web::post().to(admin_restore_item)),
            )
            .service(web::resource("/admin/storage").route(web::get().to(admin_list_storage)))
            .service(
                web::resource("/admin/storage/release-expired")
                    .route(web::post().to(admin_release_expired)),
            )
            .service(web::resource("/admin/stats").route(web::get().to(admin_stats)))
            .service(web::resource("/admin/reports").route(web::get().to(admin_reports)))
            .service(web::resource("/admin/audit").route(web::get().to(admin_audit_log)))
            .service(web::resource("/admin/roles").route(web::post().to(set_user_role))),
    );
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub rate_limiter: Option<RateLimiterFacade>,
}

// ---------------- helpers -----------------------------------------

macro_rules! ensure_staff {
    ($auth:expr) => {
        if !$auth.0.is_staff() {
            return Err(ApiError::Forbidden);
        }
    };
}

fn client_ip(req: &HttpRequest) -> String {
    req.connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string()
}

fn viewer_of(auth: &Option<Auth>) -> Viewer {
    Viewer::from_claims(auth.as_ref().map(|a| &a.0))
}

/// Best-effort audit trail; failures are logged, never surfaced.
async fn audit(
    data: &AppState,
    action: String,
    action_type: &str,
    item_id: Option<Id>,
    user_id: Option<String>,
    old_value: Option<serde_json::Value>,
    new_value: Option<serde_json::Value>,
) {
    let entry = NewAuditEntry {
        action,
        action_type: action_type.to_string(),
        item_id,
        user_id,
        old_value,
        new_value,
    };
    if let Err(e) = data.repo.record_audit(entry).await {
        log::warn!("audit record failed: {e}");
    }
}

fn claim_reference() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect::<String>()
        .to_uppercase();
    format!("LF-{suffix}")
}

// ---------------- browse / search ---------------------------------

#[derive(Debug, serde::Deserialize)]
pub struct BrowseQuery {
    pub q: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub color: Option<String>,
    pub location: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/items",
    params(
        ("q" = Option<String>, Query, description = "Free-text search over title, description, color, location, venue, container"),
        ("status" = Option<String>, Query, description = "Exact status filter (staff only sees non-found statuses)"),
        ("category" = Option<String>, Query, description = "Exact category filter"),
        ("color" = Option<String>, Query, description = "Color substring filter"),
        ("location" = Option<String>, Query, description = "Location/venue substring filter"),
        ("date_from" = Option<String>, Query, description = "Inclusive lower bound (YYYY-MM-DD)"),
        ("date_to" = Option<String>, Query, description = "Inclusive upper bound (YYYY-MM-DD)")
    ),
    responses(
        (status = 200, description = "Matching items, newest first", body = [Item])
    )
)]
pub async fn browse_items(
    auth: Option<Auth>,
    data: web::Data<AppState>,
    query: web::Query<BrowseQuery>,
) -> Result<HttpResponse, ApiError> {
    let viewer = viewer_of(&auth);
    let spec = FilterSpec::parse(
        query.q.as_deref(),
        query.status.as_deref(),
        query.category.as_deref(),
        query.color.as_deref(),
        query.location.as_deref(),
        query.date_from.as_deref(),
        query.date_to.as_deref(),
    );
    let items = data.repo.list_items(false).await?;
    let matched = filter_items(&items, &spec, viewer);
    Ok(HttpResponse::Ok().json(matched))
}

#[utoipa::path(
    get,
    path = "/api/v1/items/{id}",
    params(("id" = Id, Path, description = "Item id")),
    responses(
        (status = 200, description = "Item", body = Item),
        (status = 404, description = "Item not found or not visible to caller")
    )
)]
pub async fn get_item(
    auth: Option<Auth>,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let item = data.repo.get_item(path.into_inner()).await?;
    let viewer = viewer_of(&auth);
    let is_owner = auth
        .as_ref()
        .map_or(false, |a| item.user_id.as_deref() == Some(a.0.sub.as_str()));
    // same gate as browse: inactive and non-found items stay hidden from the
    // public, with an owner carve-out for self-service views
    if !viewer.is_staff() && !is_owner {
        if !item.is_active || item.status != ItemStatus::Found {
            return Err(ApiError::NotFound);
        }
    }
    Ok(HttpResponse::Ok().json(item))
}

#[utoipa::path(
    post,
    path = "/api/v1/items",
    request_body = NewItem,
    responses(
        (status = 201, description = "Item reported", body = Item),
        (status = 400, description = "Missing required fields"),
        (status = 403, description = "Found items require a staff token"),
        (status = 429, description = "Too many reports from this address")
    )
)]
pub async fn report_item(
    req: HttpRequest,
    auth: Option<Auth>,
    data: web::Data<AppState>,
    payload: web::Json<NewItem>,
) -> Result<HttpResponse, ApiError> {
    let is_staff = auth.as_ref().map_or(false, |a| a.0.is_staff());

    if let Some(rl) = &data.rate_limiter {
        if !is_staff && !rl.allow_report(&client_ip(&req)) {
            return Err(ApiError::RateLimited);
        }
    }

    let mut new = payload.into_inner();
    if new.title.trim().is_empty() || new.description.trim().is_empty() || new.location.trim().is_empty() {
        return Err(ApiError::BadRequest);
    }
    // anyone may report a loss; everything else is a staff intake action
    if new.status != ItemStatus::Lost && !is_staff {
        return Err(ApiError::Forbidden);
    }
    // found items default to a 30-day retention window
    if new.status == ItemStatus::Found && new.expiry_date.is_none() {
        new.expiry_date = Some(new.date_lost_found + Duration::days(30));
    }

    let user_id = auth.as_ref().map(|a| a.0.sub.clone());
    let is_anonymous = user_id.is_none();
    let item = data.repo.create_item(new, user_id.clone(), is_anonymous).await?;

    metrics::increment_counter!("lostfound_items_reported_total");
    audit(
        &data,
        format!("Reported {} item '{}'", item.status, item.title),
        "create",
        Some(item.id),
        user_id,
        None,
        Some(json!({"status": item.status, "category": item.category})),
    )
    .await;

    Ok(HttpResponse::Created().json(item))
}

#[utoipa::path(
    patch,
    path = "/api/v1/items/{id}",
    request_body = UpdateItem,
    params(("id" = Id, Path, description = "Item id")),
    responses(
        (status = 200, description = "Item updated", body = Item),
        (status = 403, description = "Forbidden - staff only"),
        (status = 404, description = "Item not found")
    )
)]
pub async fn update_item(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateItem>,
) -> Result<HttpResponse, ApiError> {
    ensure_staff!(auth);
    let id = path.into_inner();
    let before = data.repo.get_item(id).await?;
    let item = data.repo.update_item(id, payload.into_inner()).await?;
    audit(
        &data,
        format!("Updated item '{}'", item.title),
        "update",
        Some(item.id),
        Some(auth.0.sub.clone()),
        Some(json!({"storage_location": before.storage_location, "expiry_date": before.expiry_date})),
        Some(json!({"storage_location": item.storage_location, "expiry_date": item.expiry_date})),
    )
    .await;
    Ok(HttpResponse::Ok().json(item))
}

#[derive(Debug, serde::Deserialize, utoipa::ToSchema)]
pub struct SetItemStatusRequest {
    pub status: ItemStatus,
}

#[utoipa::path(
    post,
    path = "/api/v1/items/{id}/status",
    request_body = SetItemStatusRequest,
    params(("id" = Id, Path, description = "Item id")),
    responses(
        (status = 200, description = "Status updated", body = Item),
        (status = 403, description = "Forbidden - staff only"),
        (status = 404, description = "Item not found"),
        (status = 409, description = "Illegal status transition")
    )
)]
pub async fn set_item_status(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<SetItemStatusRequest>,
) -> Result<HttpResponse, ApiError> {
    ensure_staff!(auth);
    let id = path.into_inner();
    let before = data.repo.get_item(id).await?;
    let item = data.repo.set_item_status(id, payload.status).await?;
    audit(
        &data,
        format!("Item '{}' status {} -> {}", item.title, before.status, item.status),
        "status_change",
        Some(item.id),
        Some(auth.0.sub.clone()),
        Some(json!({"status": before.status})),
        Some(json!({"status": item.status})),
    )
    .await;
    Ok(HttpResponse::Ok().json(item))
}

#[utoipa::path(
    delete,
    path = "/api/v1/items/{id}",
    params(("id" = Id, Path, description = "Item id")),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 403, description = "Only the reporter or staff may delete"),
        (status = 404, description = "Item not found")
    )
)]
pub async fn delete_item(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let item = data.repo.get_item(id).await?;
    let is_owner = item.user_id.as_deref() == Some(auth.0.sub.as_str());
    if !is_owner && !auth.0.is_staff() {
        return Err(ApiError::Forbidden);
    }
    data.repo.hard_delete_item(id).await?;
    audit(
        &data,
        format!("Deleted item '{}'", item.title),
        "delete",
        Some(id),
        Some(auth.0.sub.clone()),
        Some(json!({"status": item.status, "title": item.title})),
        None,
    )
    .await;
    Ok(HttpResponse::NoContent().finish())
}

// ---------------- self-service views ------------------------------

pub async fn my_items(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let items = data.repo.list_items_by_owner(&auth.0.sub).await?;
    Ok(HttpResponse::Ok().json(items))
}

pub async fn my_claims(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let claims = data.repo.list_claims_by_claimant(&auth.0.sub).await?;
    Ok(HttpResponse::Ok().json(claims))
}

pub async fn my_received_claims(
    auth: Auth,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let claims = data.repo.list_claims_received(&auth.0.sub).await?;
    Ok(HttpResponse::Ok().json(claims))
}

// ---------------- claims ------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/claims",
    request_body = NewClaim,
    responses(
        (status = 201, description = "Claim submitted", body = Claim),
        (status = 400, description = "Missing message or contact channel"),
        (status = 404, description = "Item not found"),
        (status = 429, description = "Too many claims from this address")
    )
)]
pub async fn create_claim(
    req: HttpRequest,
    auth: Option<Auth>,
    data: web::Data<AppState>,
    payload: web::Json<NewClaim>,
) -> Result<HttpResponse, ApiError> {
    let is_staff = auth.as_ref().map_or(false, |a| a.0.is_staff());
    if let Some(rl) = &data.rate_limiter {
        if !is_staff && !rl.allow_claim(&client_ip(&req)) {
            return Err(ApiError::RateLimited);
        }
    }

    let new = payload.into_inner();
    if new.message.trim().is_empty() || !new.has_contact() {
        return Err(ApiError::BadRequest);
    }

    let claimant_id = auth.as_ref().map(|a| a.0.sub.clone());
    let claim = data
        .repo
        .create_claim(new, claimant_id.clone(), claim_reference())
        .await?;

    metrics::increment_counter!("lostfound_claims_submitted_total");
    audit(
        &data,
        format!("Claim {} submitted", claim.reference_number.as_deref().unwrap_or("?")),
        "create",
        Some(claim.item_id),
        claimant_id,
        None,
        Some(json!({"claim_id": claim.id})),
    )
    .await;

    Ok(HttpResponse::Created().json(claim))
}

#[derive(Debug, serde::Deserialize)]
pub struct ClaimListQuery {
    pub item_id: Option<Id>,
}

#[utoipa::path(
    get,
    path = "/api/v1/claims",
    params(("item_id" = Option<Id>, Query, description = "Restrict to one item")),
    responses(
        (status = 200, description = "Claims, newest first", body = [Claim]),
        (status = 403, description = "Forbidden - staff only")
    )
)]
pub async fn list_claims(
    auth: Auth,
    data: web::Data<AppState>,
    query: web::Query<ClaimListQuery>,
) -> Result<HttpResponse, ApiError> {
    ensure_staff!(auth);
    let claims = data.repo.list_claims(query.item_id).await?;
    Ok(HttpResponse::Ok().json(claims))
}

#[derive(Debug, Default, serde::Deserialize, utoipa::ToSchema)]
pub struct ClaimDecision {
    pub staff_notes: Option<String>,
}

async fn decide_claim(
    auth: Auth,
    data: web::Data<AppState>,
    claim_id: Id,
    verdict: ClaimStatus,
    notes: Option<String>,
) -> Result<HttpResponse, ApiError> {
    let claim = data.repo.get_claim(claim_id).await?;
    let item = data.repo.get_item(claim.item_id).await?;
    // staff adjudicate everything; reporters adjudicate claims on their items
    let is_owner = item.user_id.as_deref() == Some(auth.0.sub.as_str());
    if !auth.0.is_staff() && !is_owner {
        return Err(ApiError::Forbidden);
    }
    let updated = data.repo.set_claim_status(claim_id, verdict, notes).await?;
    audit(
        &data,
        format!(
            "Claim {} {}",
            updated.reference_number.as_deref().unwrap_or("?"),
            updated.status
        ),
        "update",
        Some(updated.item_id),
        Some(auth.0.sub.clone()),
        Some(json!({"status": ClaimStatus::Pending})),
        Some(json!({"status": updated.status})),
    )
    .await;
    Ok(HttpResponse::Ok().json(updated))
}

#[utoipa::path(
    post,
    path = "/api/v1/claims/{id}/approve",
    request_body = ClaimDecision,
    params(("id" = Id, Path, description = "Claim id")),
    responses(
        (status = 200, description = "Claim approved", body = Claim),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Claim not found"),
        (status = 409, description = "Claim already adjudicated")
    )
)]
pub async fn approve_claim(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: Option<web::Json<ClaimDecision>>,
) -> Result<HttpResponse, ApiError> {
    let notes = payload.and_then(|p| p.into_inner().staff_notes);
    decide_claim(auth, data, path.into_inner(), ClaimStatus::Approved, notes).await
}

#[utoipa::path(
    post,
    path = "/api/v1/claims/{id}/reject",
    request_body = ClaimDecision,
    params(("id" = Id, Path, description = "Claim id")),
    responses(
        (status = 200, description = "Claim rejected", body = Claim),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Claim not found"),
        (status = 409, description = "Claim already adjudicated")
    )
)]
pub async fn reject_claim(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: Option<web::Json<ClaimDecision>>,
) -> Result<HttpResponse, ApiError> {
    let notes = payload.and_then(|p| p.into_inner().staff_notes);
    decide_claim(auth, data, path.into_inner(), ClaimStatus::Rejected, notes).await
}

// ---------------- matches -----------------------------------------

#[derive(Debug, serde::Deserialize)]
pub struct MatchListQuery {
    pub status: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/matches",
    params(("status" = Option<String>, Query, description = "pending (default), approved or rejected")),
    responses(
        (status = 200, description = "Matches, highest score first", body = [ItemMatch]),
        (status = 403, description = "Forbidden - staff only")
    )
)]
pub async fn list_matches(
    auth: Auth,
    data: web::Data<AppState>,
    query: web::Query<MatchListQuery>,
) -> Result<HttpResponse, ApiError> {
    ensure_staff!(auth);
    let status = query
        .status
        .as_deref()
        .and_then(|s| s.parse().ok())
        .unwrap_or(MatchStatus::Pending);
    let matches = data.repo.list_matches(status).await?;
    Ok(HttpResponse::Ok().json(matches))
}

#[utoipa::path(
    post,
    path = "/api/v1/matches",
    request_body = NewMatch,
    responses(
        (status = 201, description = "Match recorded", body = ItemMatch),
        (status = 400, description = "Score outside 0..=100"),
        (status = 403, description = "Forbidden - staff only"),
        (status = 404, description = "Referenced item not found")
    )
)]
pub async fn create_match(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewMatch>,
) -> Result<HttpResponse, ApiError> {
    ensure_staff!(auth);
    let new = payload.into_inner();
    if !(0.0..=100.0).contains(&new.match_score) {
        return Err(ApiError::BadRequest);
    }
    let m = data.repo.create_match(new).await?;
    Ok(HttpResponse::Created().json(m))
}

#[derive(Debug, serde::Deserialize, utoipa::ToSchema)]
pub struct MatchReviewRequest {
    pub status: MatchStatus, // approved or rejected
}

#[utoipa::path(
    post,
    path = "/api/v1/matches/{id}/review",
    request_body = MatchReviewRequest,
    params(("id" = Id, Path, description = "Match id")),
    responses(
        (status = 200, description = "Match reviewed", body = ItemMatch),
        (status = 403, description = "Forbidden - staff only"),
        (status = 404, description = "Match not found"),
        (status = 409, description = "Match already reviewed")
    )
)]
pub async fn review_match(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<MatchReviewRequest>,
) -> Result<HttpResponse, ApiError> {
    ensure_staff!(auth);
    let m = data
        .repo
        .review_match(path.into_inner(), payload.status, &auth.0.sub)
        .await?;
    Ok(HttpResponse::Ok().json(m))
}

// ---------------- staff administration ----------------------------

pub async fn admin_list_items(
    req: HttpRequest,
    auth: Auth,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    ensure_staff!(auth);
    let include_inactive = req.query_string().contains("include_inactive=1");
    let items = data.repo.list_items(include_inactive).await?;
    Ok(HttpResponse::Ok().json(items))
}

pub async fn admin_deactivate_item(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    ensure_staff!(auth);
    let id = path.into_inner();
    data.repo.deactivate_item(id).await?;
    audit(
        &data,
        format!("Deactivated item {id}"),
        "delete",
        Some(id),
        Some(auth.0.sub.clone()),
        Some(json!({"is_active": true})),
        Some(json!({"is_active": false})),
    )
    .await;
    Ok(HttpResponse::Ok().json(json!({"status": "ok"})))
}

pub async fn admin_restore_item(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    ensure_staff!(auth);
    let id = path.into_inner();
    data.repo.restore_item(id).await?;
    audit(
        &data,
        format!("Restored item {id}"),
        "update",
        Some(id),
        Some(auth.0.sub.clone()),
        Some(json!({"is_active": false})),
        Some(json!({"is_active": true})),
    )
    .await;
    Ok(HttpResponse::Ok().json(json!({"status": "ok"})))
}

/// Found items with their storage assignment, for the storage dashboard.
pub async fn admin_list_storage(
    auth: Auth,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    ensure_staff!(auth);
    let items = data.repo.list_items(false).await?;
    let stored: Vec<Item> = items
        .into_iter()
        .filter(|i| i.status == ItemStatus::Found)
        .collect();
    Ok(HttpResponse::Ok().json(stored))
}

pub async fn admin_release_expired(
    auth: Auth,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    ensure_staff!(auth);
    let today = Utc::now().date_naive();
    let released = data.repo.release_expired(today).await?;
    if released > 0 {
        audit(
            &data,
            format!("Released {released} expired items"),
            "status_change",
            None,
            Some(auth.0.sub.clone()),
            None,
            Some(json!({"released": released})),
        )
        .await;
    }
    Ok(HttpResponse::Ok().json(json!({"released": released})))
}

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct StatsResponse {
    pub total_items: usize,
    pub lost_items: usize,
    pub found_items: usize,
    pub claimed_items: usize,
    pub returned_items: usize,
    pub items_this_week: usize,
    pub total_claims: usize,
    pub pending_claims: usize,
    pub pending_matches: usize,
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/stats",
    responses(
        (status = 200, description = "Dashboard counters", body = StatsResponse),
        (status = 403, description = "Forbidden - staff only")
    )
)]
pub async fn admin_stats(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    ensure_staff!(auth);
    let items = data.repo.list_items(false).await?;
    let claims = data.repo.list_claims(None).await?;
    let pending_matches = data.repo.list_matches(MatchStatus::Pending).await?.len();

    let one_week_ago = Utc::now() - Duration::days(7);
    let count_status =
        |s: ItemStatus| items.iter().filter(|i| i.status == s).count();

    let stats = StatsResponse {
        total_items: items.len(),
        lost_items: count_status(ItemStatus::Lost),
        found_items: count_status(ItemStatus::Found),
        claimed_items: count_status(ItemStatus::Claimed),
        returned_items: count_status(ItemStatus::Returned),
        items_this_week: items.iter().filter(|i| i.created_at > one_week_ago).count(),
        total_claims: claims.len(),
        pending_claims: claims
            .iter()
            .filter(|c| c.status == ClaimStatus::Pending)
            .count(),
        pending_matches,
    };
    Ok(HttpResponse::Ok().json(stats))
}

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct MonthlyCount {
    pub month: String, // YYYY-MM
    pub items: usize,
}

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct ClaimTotals {
    pub total: usize,
    pub approved: usize,
    pub pending: usize,
    pub rejected: usize,
}

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct ReportsResponse {
    pub by_category: Vec<CategoryCount>,
    pub claims: ClaimTotals,
    pub monthly: Vec<MonthlyCount>,
    pub by_algorithm: Vec<CategoryCount>,
    pub by_verification: Vec<CategoryCount>,
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/reports",
    responses(
        (status = 200, description = "Aggregated analytics", body = ReportsResponse),
        (status = 403, description = "Forbidden - staff only")
    )
)]
pub async fn admin_reports(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    ensure_staff!(auth);
    let items = data.repo.list_items(false).await?;
    let claims = data.repo.list_claims(None).await?;

    let mut by_category: BTreeMap<&str, usize> = BTreeMap::new();
    for item in &items {
        *by_category.entry(item.category.as_str()).or_default() += 1;
    }

    let claim_totals = ClaimTotals {
        total: claims.len(),
        approved: claims.iter().filter(|c| c.status == ClaimStatus::Approved).count(),
        pending: claims.iter().filter(|c| c.status == ClaimStatus::Pending).count(),
        rejected: claims.iter().filter(|c| c.status == ClaimStatus::Rejected).count(),
    };

    // item intake over the trailing six months
    let cutoff = Utc::now() - Duration::days(183);
    let mut monthly: BTreeMap<String, usize> = BTreeMap::new();
    for item in items.iter().filter(|i| i.created_at > cutoff) {
        let key = format!("{:04}-{:02}", item.created_at.year(), item.created_at.month());
        *monthly.entry(key).or_default() += 1;
    }

    let mut by_algorithm: BTreeMap<String, usize> = BTreeMap::new();
    for status in [MatchStatus::Pending, MatchStatus::Approved, MatchStatus::Rejected] {
        for m in data.repo.list_matches(status).await? {
            let key = m.match_algorithm.unwrap_or_else(|| "unspecified".into());
            *by_algorithm.entry(key).or_default() += 1;
        }
    }

    let mut by_verification: BTreeMap<String, usize> = BTreeMap::new();
    for c in &claims {
        let key = c
            .verification_status
            .clone()
            .unwrap_or_else(|| "unverified".into());
        *by_verification.entry(key).or_default() += 1;
    }

    let resp = ReportsResponse {
        by_category: by_category
            .into_iter()
            .map(|(category, count)| CategoryCount { category: category.to_string(), count })
            .collect(),
        claims: claim_totals,
        monthly: monthly
            .into_iter()
            .map(|(month, items)| MonthlyCount { month, items })
            .collect(),
        by_algorithm: by_algorithm
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect(),
        by_verification: by_verification
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect(),
    };
    Ok(HttpResponse::Ok().json(resp))
}

#[derive(Debug, serde::Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

pub async fn admin_audit_log(
    auth: Auth,
    data: web::Data<AppState>,
    query: web::Query<AuditQuery>,
) -> Result<HttpResponse, ApiError> {
    ensure_staff!(auth);
    let limit = query.limit.unwrap_or(100).min(500);
    let entries = data.repo.list_audit(limit).await?;
    Ok(HttpResponse::Ok().json(entries))
}

// ---------------- auth & roles ------------------------------------

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct MeResponse {
    pub id: String,
    pub role: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current user info", body = MeResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn auth_me(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    // role assignments in the store override what the token carries
    let role = match data.repo.get_user_role(&auth.0.sub).await {
        Some(Role::Staff) => "staff",
        Some(Role::Student) => "student",
        None if auth.0.is_staff() => "staff",
        None => "student",
    };
    let me = MeResponse {
        id: auth.0.sub.clone(),
        role: role.to_string(),
    };
    Ok(HttpResponse::Ok().json(me))
}

pub async fn refresh_token(auth: Auth) -> Result<HttpResponse, ApiError> {
    let jwt = crate::auth::create_jwt(&auth.0.sub, auth.0.roles).map_err(|_| ApiError::Internal)?;
    Ok(HttpResponse::Ok().json(json!({ "token": jwt })))
}

#[derive(Debug, serde::Deserialize, utoipa::ToSchema)]
pub struct SetUserRoleRequest {
    pub user_id: String,
    pub role: String, // "student" or "staff"
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/roles",
    request_body = SetUserRoleRequest,
    responses(
        (status = 200, description = "Role updated"),
        (status = 400, description = "Invalid role"),
        (status = 403, description = "Forbidden - staff only")
    )
)]
pub async fn set_user_role(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<SetUserRoleRequest>,
) -> Result<HttpResponse, ApiError> {
    ensure_staff!(auth);
    let role = match payload.role.to_lowercase().as_str() {
        "student" => Role::Student,
        "staff" => Role::Staff,
        _ => return Err(ApiError::BadRequest),
    };
    data.repo.set_user_role(&payload.user_id, role).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Role updated successfully",
        "user_id": payload.user_id,
        "role": payload.role
    })))
}
