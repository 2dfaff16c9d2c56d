use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

// Always i64 keys, Postgres backed or in-memory
pub type Id = i64;

/// Lifecycle status of a reported item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "item_status", rename_all = "lowercase")]
pub enum ItemStatus {
    Lost,
    Found,
    Claimed,
    Returned,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Lost => "lost",
            ItemStatus::Found => "found",
            ItemStatus::Claimed => "claimed",
            ItemStatus::Returned => "returned",
        }
    }

    /// Staff edits are mostly free-form, with two exceptions: a lost report is
    /// never flipped straight to found (found items are reported fresh), and an
    /// item that reached claimed/returned cannot go back to lost.
    pub fn can_transition(self, to: ItemStatus) -> bool {
        if self == to {
            return true;
        }
        !matches!(
            (self, to),
            (ItemStatus::Lost, ItemStatus::Found)
                | (ItemStatus::Claimed, ItemStatus::Lost)
                | (ItemStatus::Returned, ItemStatus::Lost)
        )
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lost" => Ok(ItemStatus::Lost),
            "found" => Ok(ItemStatus::Found),
            "claimed" => Ok(ItemStatus::Claimed),
            "returned" => Ok(ItemStatus::Returned),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "item_category", rename_all = "lowercase")]
pub enum ItemCategory {
    Electronics,
    Clothing,
    Accessories,
    Books,
    Keys,
    Bags,
    Documents,
    Sports,
    Other,
}

impl ItemCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCategory::Electronics => "electronics",
            ItemCategory::Clothing => "clothing",
            ItemCategory::Accessories => "accessories",
            ItemCategory::Books => "books",
            ItemCategory::Keys => "keys",
            ItemCategory::Bags => "bags",
            ItemCategory::Documents => "documents",
            ItemCategory::Sports => "sports",
            ItemCategory::Other => "other",
        }
    }
}

impl std::str::FromStr for ItemCategory {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "electronics" => Ok(ItemCategory::Electronics),
            "clothing" => Ok(ItemCategory::Clothing),
            "accessories" => Ok(ItemCategory::Accessories),
            "books" => Ok(ItemCategory::Books),
            "keys" => Ok(ItemCategory::Keys),
            "bags" => Ok(ItemCategory::Bags),
            "documents" => Ok(ItemCategory::Documents),
            "sports" => Ok(ItemCategory::Sports),
            "other" => Ok(ItemCategory::Other),
            _ => Err(()),
        }
    }
}

/// A lost-or-found physical object record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Item {
    pub id: Id,
    pub title: String,
    pub description: String,
    pub category: ItemCategory,
    pub status: ItemStatus,
    pub location: String,
    pub venue: Option<String>,     // coarse site/building code
    pub container: Option<String>, // storage slot within a venue
    pub color: Option<String>,
    pub date_lost_found: NaiveDate,
    pub image_url: Option<String>,
    pub contact_info: Option<String>,
    pub identifying_details: Option<String>,
    pub storage_location: Option<String>,
    pub storage_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<NaiveDate>,
    pub is_active: bool, // soft delete marker
    pub is_anonymous: bool,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewItem {
    pub title: String,
    pub description: String,
    pub category: ItemCategory,
    pub status: ItemStatus,
    pub location: String,
    pub venue: Option<String>,
    pub container: Option<String>,
    pub color: Option<String>,
    pub date_lost_found: NaiveDate,
    pub image_url: Option<String>,
    pub contact_info: Option<String>,
    pub identifying_details: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateItem {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<ItemCategory>,
    pub location: Option<String>,
    pub venue: Option<String>,
    pub container: Option<String>,
    pub color: Option<String>,
    pub image_url: Option<String>,
    pub storage_location: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "claim_status", rename_all = "lowercase")]
pub enum ClaimStatus {
    Pending,
    Approved,
    Rejected,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Pending => "pending",
            ClaimStatus::Approved => "approved",
            ClaimStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ClaimStatus::Approved | ClaimStatus::Rejected)
    }
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An assertion of ownership against an item, pending staff adjudication.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Claim {
    pub id: Id,
    pub item_id: Id,
    pub claimant_id: Option<String>, // null for anonymous claims
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub message: String,
    pub status: ClaimStatus,
    pub verification_status: Option<String>,
    pub staff_notes: Option<String>,
    pub reference_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewClaim {
    pub item_id: Id,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub message: String,
}

impl NewClaim {
    /// At least one contact channel is required.
    pub fn has_contact(&self) -> bool {
        self.email.as_deref().map_or(false, |e| !e.trim().is_empty())
            || self.phone.as_deref().map_or(false, |p| !p.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "match_status", rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Approved,
    Rejected,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Approved => "approved",
            MatchStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for MatchStatus {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MatchStatus::Pending),
            "approved" => Ok(MatchStatus::Approved),
            "rejected" => Ok(MatchStatus::Rejected),
            _ => Err(()),
        }
    }
}

/// A scored lost/found pairing produced outside this service (manual entry or
/// an external matcher) and merely reviewed here.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct ItemMatch {
    pub id: Id,
    pub lost_item_id: Id,
    pub found_item_id: Id,
    pub match_score: f32,
    pub match_algorithm: Option<String>,
    pub status: MatchStatus,
    pub notes: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewMatch {
    pub lost_item_id: Id,
    pub found_item_id: Id,
    pub match_score: f32,
    pub match_algorithm: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: Id,
    pub action: String,
    pub action_type: String, // create | update | delete | status_change
    pub item_id: Option<Id>,
    pub user_id: Option<String>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuditEntry {
    pub action: String,
    pub action_type: String,
    pub item_id: Option<Id>,
    pub user_id: Option<String>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}
