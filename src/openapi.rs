use crate::models::{
    Claim, Item, ItemCategory, ItemMatch, ItemStatus, ClaimStatus, MatchStatus, NewClaim, NewItem,
    NewMatch, UpdateItem,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::browse_items,
        crate::routes::get_item,
        crate::routes::report_item,
        crate::routes::update_item,
        crate::routes::set_item_status,
        crate::routes::delete_item,
        crate::routes::create_claim,
        crate::routes::list_claims,
        crate::routes::approve_claim,
        crate::routes::reject_claim,
        crate::routes::list_matches,
        crate::routes::create_match,
        crate::routes::review_match,
        crate::routes::admin_stats,
        crate::routes::admin_reports,
        crate::routes::auth_me,
        crate::routes::set_user_role,
    ),
    components(schemas(
        Item, NewItem, UpdateItem, ItemStatus, ItemCategory,
        Claim, NewClaim, ClaimStatus,
        ItemMatch, NewMatch, MatchStatus,
        crate::routes::SetItemStatusRequest, crate::routes::ClaimDecision,
        crate::routes::MatchReviewRequest, crate::routes::SetUserRoleRequest,
        crate::routes::StatsResponse, crate::routes::ReportsResponse,
        crate::routes::CategoryCount, crate::routes::MonthlyCount,
        crate::routes::ClaimTotals, crate::routes::MeResponse
    )),
    tags(
        (name = "items", description = "Item reporting and browse/search"),
        (name = "claims", description = "Ownership claims and adjudication"),
        (name = "matches", description = "Lost/found match review"),
    )
)]
pub struct ApiDoc;
