use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{NaiveDate, Utc};

use crate::auth::Role as AuthRole;
use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("internal: {0}")] Internal(#[from] anyhow::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

use async_trait::async_trait;

#[async_trait]
pub trait ItemRepo: Send + Sync {
    /// Active items, newest first. `include_inactive` is the staff-only escape
    /// hatch for moderation views.
    async fn list_items(&self, include_inactive: bool) -> RepoResult<Vec<Item>>;
    async fn get_item(&self, id: Id) -> RepoResult<Item>;
    async fn list_items_by_owner(&self, user_id: &str) -> RepoResult<Vec<Item>>;
    async fn create_item(
        &self,
        new: NewItem,
        user_id: Option<String>,
        is_anonymous: bool,
    ) -> RepoResult<Item>;
    async fn update_item(&self, id: Id, upd: UpdateItem) -> RepoResult<Item>;
    /// Status transitions are checked against `ItemStatus::can_transition`;
    /// an illegal edge is a Conflict.
    async fn set_item_status(&self, id: Id, status: ItemStatus) -> RepoResult<Item>;
    async fn deactivate_item(&self, id: Id) -> RepoResult<()>;
    async fn restore_item(&self, id: Id) -> RepoResult<()>;
    async fn hard_delete_item(&self, id: Id) -> RepoResult<()>;
    /// Storage sweep: items past their expiry date become returned+inactive.
    /// Returns how many items were released.
    async fn release_expired(&self, today: NaiveDate) -> RepoResult<u64>;
}

#[async_trait]
pub trait ClaimRepo: Send + Sync {
    async fn create_claim(
        &self,
        new: NewClaim,
        claimant_id: Option<String>,
        reference_number: String,
    ) -> RepoResult<Claim>;
    async fn get_claim(&self, id: Id) -> RepoResult<Claim>;
    async fn list_claims(&self, item_id: Option<Id>) -> RepoResult<Vec<Claim>>;
    async fn list_claims_by_claimant(&self, user_id: &str) -> RepoResult<Vec<Claim>>;
    /// Claims filed against items owned by `owner_id`.
    async fn list_claims_received(&self, owner_id: &str) -> RepoResult<Vec<Claim>>;
    /// Pending is the only transitional state: approving or rejecting anything
    /// already terminal (or re-pending a claim) is a Conflict.
    async fn set_claim_status(
        &self,
        id: Id,
        status: ClaimStatus,
        staff_notes: Option<String>,
    ) -> RepoResult<Claim>;
}

#[async_trait]
pub trait MatchRepo: Send + Sync {
    async fn create_match(&self, new: NewMatch) -> RepoResult<ItemMatch>;
    /// Matches in the given status, highest score first.
    async fn list_matches(&self, status: MatchStatus) -> RepoResult<Vec<ItemMatch>>;
    async fn review_match(
        &self,
        id: Id,
        verdict: MatchStatus,
        reviewer: &str,
    ) -> RepoResult<ItemMatch>;
}

#[async_trait]
pub trait UserRoleRepo: Send + Sync {
    async fn get_user_role(&self, user_id: &str) -> Option<AuthRole>;
    async fn set_user_role(&self, user_id: &str, role: AuthRole) -> RepoResult<()>;
}

#[async_trait]
pub trait AuditRepo: Send + Sync {
    async fn record_audit(&self, entry: NewAuditEntry) -> RepoResult<()>;
    async fn list_audit(&self, limit: usize) -> RepoResult<Vec<AuditEntry>>;
}

pub trait Repo: ItemRepo + ClaimRepo + MatchRepo + UserRoleRepo + AuditRepo {}

impl<T> Repo for T where T: ItemRepo + ClaimRepo + MatchRepo + UserRoleRepo + AuditRepo {}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::path::{Path, PathBuf};

    const SNAPSHOT_PATH: &str = "data/state.json";

    #[derive(Default, Serialize, Deserialize)]
    struct State {
        items: HashMap<Id, Item>,
        claims: HashMap<Id, Claim>,
        matches: HashMap<Id, ItemMatch>,
        user_roles: HashMap<String, AuthRole>,
        audit: Vec<AuditEntry>,
        next_id: Id,
    }

    #[derive(Clone)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Arc<PathBuf>,
    }

    impl InMemRepo {
        fn data_dir() -> PathBuf {
            std::env::var("LOSTFOUND_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data"))
        }

        fn snapshot_path() -> PathBuf {
            if std::env::var("LOSTFOUND_DATA_DIR").is_ok() {
                let mut p = Self::data_dir();
                p.push("state.json");
                p
            } else {
                PathBuf::from(SNAPSHOT_PATH)
            }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        eprintln!("[inmem] Loaded snapshot '{}'", path.display());
                        s
                    }
                    Err(e) => {
                        eprintln!("[inmem] Failed to parse snapshot '{}': {e}. Starting empty.", path.display());
                        State::default()
                    }
                },
                Err(e) => {
                    eprintln!("[inmem] No snapshot at '{}': {e}. Starting empty.", path.display());
                    State::default()
                }
            }
        }

        fn persist(&self) {
            let path = self.snapshot_path.clone();
            if let Ok(s) = serde_json::to_vec_pretty(&*self.state.read().unwrap()) {
                if let Some(dir) = path.parent() {
                    let _ = std::fs::create_dir_all(dir);
                }
                if let Err(e) = std::fs::write(&*path, s) {
                    eprintln!("[inmem] Failed to write snapshot '{}': {e}", path.display());
                }
            }
        }

        pub fn new() -> Self {
            let snapshot_path = Self::snapshot_path();
            let state = Self::load_state_from(&snapshot_path);
            Self {
                state: Arc::new(RwLock::new(state)),
                snapshot_path: Arc::new(snapshot_path),
            }
        }

        fn next_id(state: &mut State) -> Id {
            state.next_id += 1;
            state.next_id
        }

        fn newest_first(mut v: Vec<Item>) -> Vec<Item> {
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            v
        }

        fn newest_claims_first(mut v: Vec<Claim>) -> Vec<Claim> {
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            v
        }
    }

    impl Default for InMemRepo {
        fn default() -> Self { Self::new() }
    }

    #[async_trait]
    impl ItemRepo for InMemRepo {
        async fn list_items(&self, include_inactive: bool) -> RepoResult<Vec<Item>> {
            let s = self.state.read().unwrap();
            let v: Vec<_> = s
                .items
                .values()
                .filter(|i| include_inactive || i.is_active)
                .cloned()
                .collect();
            Ok(Self::newest_first(v))
        }

        async fn get_item(&self, id: Id) -> RepoResult<Item> {
            let s = self.state.read().unwrap();
            s.items.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn list_items_by_owner(&self, user_id: &str) -> RepoResult<Vec<Item>> {
            let s = self.state.read().unwrap();
            let v: Vec<_> = s
                .items
                .values()
                .filter(|i| i.user_id.as_deref() == Some(user_id))
                .cloned()
                .collect();
            Ok(Self::newest_first(v))
        }

        async fn create_item(
            &self,
            new: NewItem,
            user_id: Option<String>,
            is_anonymous: bool,
        ) -> RepoResult<Item> {
            let mut s = self.state.write().unwrap();
            let now = Utc::now();
            let id = Self::next_id(&mut s);
            let item = Item {
                id,
                title: new.title,
                description: new.description,
                category: new.category,
                status: new.status,
                location: new.location,
                venue: new.venue,
                container: new.container,
                color: new.color,
                date_lost_found: new.date_lost_found,
                image_url: new.image_url,
                contact_info: new.contact_info,
                identifying_details: new.identifying_details,
                storage_location: None,
                storage_date: None,
                expiry_date: new.expiry_date,
                is_active: true,
                is_anonymous,
                user_id,
                created_at: now,
                updated_at: now,
            };
            s.items.insert(id, item.clone());
            drop(s);
            self.persist();
            Ok(item)
        }

        async fn update_item(&self, id: Id, upd: UpdateItem) -> RepoResult<Item> {
            let mut s = self.state.write().unwrap();
            let item = s.items.get_mut(&id).ok_or(RepoError::NotFound)?;

            if let Some(title) = upd.title { item.title = title; }
            if let Some(description) = upd.description { item.description = description; }
            if let Some(category) = upd.category { item.category = category; }
            if let Some(location) = upd.location { item.location = location; }
            if let Some(venue) = upd.venue { item.venue = Some(venue); }
            if let Some(container) = upd.container { item.container = Some(container); }
            if let Some(color) = upd.color { item.color = Some(color); }
            if let Some(image_url) = upd.image_url { item.image_url = Some(image_url); }
            if let Some(storage_location) = upd.storage_location {
                item.storage_location = Some(storage_location);
                item.storage_date = Some(Utc::now());
            }
            if let Some(expiry_date) = upd.expiry_date { item.expiry_date = Some(expiry_date); }
            item.updated_at = Utc::now();

            let updated = item.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn set_item_status(&self, id: Id, status: ItemStatus) -> RepoResult<Item> {
            let mut s = self.state.write().unwrap();
            let item = s.items.get_mut(&id).ok_or(RepoError::NotFound)?;
            if !item.status.can_transition(status) {
                return Err(RepoError::Conflict);
            }
            item.status = status;
            item.updated_at = Utc::now();
            let updated = item.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn deactivate_item(&self, id: Id) -> RepoResult<()> {
            let mut s = self.state.write().unwrap();
            let item = s.items.get_mut(&id).ok_or(RepoError::NotFound)?;
            item.is_active = false;
            item.updated_at = Utc::now();
            drop(s);
            self.persist();
            Ok(())
        }

        async fn restore_item(&self, id: Id) -> RepoResult<()> {
            let mut s = self.state.write().unwrap();
            let item = s.items.get_mut(&id).ok_or(RepoError::NotFound)?;
            item.is_active = true;
            item.updated_at = Utc::now();
            drop(s);
            self.persist();
            Ok(())
        }

        async fn hard_delete_item(&self, id: Id) -> RepoResult<()> {
            let mut s = self.state.write().unwrap();
            if s.items.remove(&id).is_none() {
                return Err(RepoError::NotFound);
            }
            // keep referential integrity with dependent records
            s.claims.retain(|_, c| c.item_id != id);
            s.matches.retain(|_, m| m.lost_item_id != id && m.found_item_id != id);
            drop(s);
            self.persist();
            Ok(())
        }

        async fn release_expired(&self, today: NaiveDate) -> RepoResult<u64> {
            let mut s = self.state.write().unwrap();
            let now = Utc::now();
            let mut released = 0u64;
            for item in s.items.values_mut() {
                if item.is_active && item.expiry_date.map_or(false, |d| d < today) {
                    item.status = ItemStatus::Returned;
                    item.is_active = false;
                    item.updated_at = now;
                    released += 1;
                }
            }
            drop(s);
            self.persist();
            Ok(released)
        }
    }

    #[async_trait]
    impl ClaimRepo for InMemRepo {
        async fn create_claim(
            &self,
            new: NewClaim,
            claimant_id: Option<String>,
            reference_number: String,
        ) -> RepoResult<Claim> {
            let mut s = self.state.write().unwrap();
            match s.items.get(&new.item_id) {
                Some(item) if item.is_active => {}
                _ => return Err(RepoError::NotFound),
            }
            let now = Utc::now();
            let id = Self::next_id(&mut s);
            let claim = Claim {
                id,
                item_id: new.item_id,
                claimant_id,
                first_name: new.first_name,
                last_name: new.last_name,
                email: new.email,
                phone: new.phone,
                message: new.message,
                status: ClaimStatus::Pending,
                verification_status: None,
                staff_notes: None,
                reference_number: Some(reference_number),
                created_at: now,
                updated_at: now,
            };
            s.claims.insert(id, claim.clone());
            drop(s);
            self.persist();
            Ok(claim)
        }

        async fn get_claim(&self, id: Id) -> RepoResult<Claim> {
            let s = self.state.read().unwrap();
            s.claims.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn list_claims(&self, item_id: Option<Id>) -> RepoResult<Vec<Claim>> {
            let s = self.state.read().unwrap();
            let v: Vec<_> = s
                .claims
                .values()
                .filter(|c| item_id.map_or(true, |id| c.item_id == id))
                .cloned()
                .collect();
            Ok(Self::newest_claims_first(v))
        }

        async fn list_claims_by_claimant(&self, user_id: &str) -> RepoResult<Vec<Claim>> {
            let s = self.state.read().unwrap();
            let v: Vec<_> = s
                .claims
                .values()
                .filter(|c| c.claimant_id.as_deref() == Some(user_id))
                .cloned()
                .collect();
            Ok(Self::newest_claims_first(v))
        }

        async fn list_claims_received(&self, owner_id: &str) -> RepoResult<Vec<Claim>> {
            let s = self.state.read().unwrap();
            let v: Vec<_> = s
                .claims
                .values()
                .filter(|c| {
                    s.items
                        .get(&c.item_id)
                        .map_or(false, |i| i.user_id.as_deref() == Some(owner_id))
                })
                .cloned()
                .collect();
            Ok(Self::newest_claims_first(v))
        }

        async fn set_claim_status(
            &self,
            id: Id,
            status: ClaimStatus,
            staff_notes: Option<String>,
        ) -> RepoResult<Claim> {
            let mut s = self.state.write().unwrap();
            let claim = s.claims.get_mut(&id).ok_or(RepoError::NotFound)?;
            if claim.status.is_terminal() || !status.is_terminal() {
                return Err(RepoError::Conflict);
            }
            claim.status = status;
            if staff_notes.is_some() {
                claim.staff_notes = staff_notes;
            }
            claim.updated_at = Utc::now();
            let updated = claim.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }
    }

    #[async_trait]
    impl MatchRepo for InMemRepo {
        async fn create_match(&self, new: NewMatch) -> RepoResult<ItemMatch> {
            let mut s = self.state.write().unwrap();
            if !s.items.contains_key(&new.lost_item_id) || !s.items.contains_key(&new.found_item_id)
            {
                return Err(RepoError::NotFound);
            }
            let now = Utc::now();
            let id = Self::next_id(&mut s);
            let m = ItemMatch {
                id,
                lost_item_id: new.lost_item_id,
                found_item_id: new.found_item_id,
                match_score: new.match_score,
                match_algorithm: new.match_algorithm,
                status: MatchStatus::Pending,
                notes: new.notes,
                reviewed_by: None,
                reviewed_at: None,
                created_at: now,
                updated_at: now,
            };
            s.matches.insert(id, m.clone());
            drop(s);
            self.persist();
            Ok(m)
        }

        async fn list_matches(&self, status: MatchStatus) -> RepoResult<Vec<ItemMatch>> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s
                .matches
                .values()
                .filter(|m| m.status == status)
                .cloned()
                .collect();
            v.sort_by(|a, b| b.match_score.partial_cmp(&a.match_score).unwrap_or(std::cmp::Ordering::Equal));
            Ok(v)
        }

        async fn review_match(
            &self,
            id: Id,
            verdict: MatchStatus,
            reviewer: &str,
        ) -> RepoResult<ItemMatch> {
            let mut s = self.state.write().unwrap();
            let m = s.matches.get_mut(&id).ok_or(RepoError::NotFound)?;
            if m.status != MatchStatus::Pending || verdict == MatchStatus::Pending {
                return Err(RepoError::Conflict);
            }
            m.status = verdict;
            m.reviewed_by = Some(reviewer.to_string());
            m.reviewed_at = Some(Utc::now());
            m.updated_at = Utc::now();
            let updated = m.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }
    }

    #[async_trait]
    impl UserRoleRepo for InMemRepo {
        async fn get_user_role(&self, user_id: &str) -> Option<AuthRole> {
            let s = self.state.read().unwrap();
            s.user_roles.get(user_id).copied()
        }

        async fn set_user_role(&self, user_id: &str, role: AuthRole) -> RepoResult<()> {
            let mut s = self.state.write().unwrap();
            s.user_roles.insert(user_id.to_string(), role);
            drop(s);
            self.persist();
            Ok(())
        }
    }

    #[async_trait]
    impl AuditRepo for InMemRepo {
        async fn record_audit(&self, entry: NewAuditEntry) -> RepoResult<()> {
            let mut s = self.state.write().unwrap();
            let id = Self::next_id(&mut s);
            s.audit.push(AuditEntry {
                id,
                action: entry.action,
                action_type: entry.action_type,
                item_id: entry.item_id,
                user_id: entry.user_id,
                old_value: entry.old_value,
                new_value: entry.new_value,
                created_at: Utc::now(),
            });
            drop(s);
            self.persist();
            Ok(())
        }

        async fn list_audit(&self, limit: usize) -> RepoResult<Vec<AuditEntry>> {
            let s = self.state.read().unwrap();
            let mut v = s.audit.clone();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            v.truncate(limit);
            Ok(v)
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::{Pool, Postgres};

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }
    }

    fn internal(e: sqlx::Error) -> RepoError {
        RepoError::Internal(anyhow::Error::from(e).context("postgres query failed"))
    }

    fn not_found_or_internal(e: sqlx::Error) -> RepoError {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            other => internal(other),
        }
    }

    #[async_trait]
    impl ItemRepo for PgRepo {
        async fn list_items(&self, include_inactive: bool) -> RepoResult<Vec<Item>> {
            let recs = sqlx::query_as::<_, Item>(
                "SELECT * FROM items WHERE ($1 OR is_active) ORDER BY created_at DESC, id DESC",
            )
            .bind(include_inactive)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
            Ok(recs)
        }

        async fn get_item(&self, id: Id) -> RepoResult<Item> {
            sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(not_found_or_internal)
        }

        async fn list_items_by_owner(&self, user_id: &str) -> RepoResult<Vec<Item>> {
            let recs = sqlx::query_as::<_, Item>(
                "SELECT * FROM items WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
            Ok(recs)
        }

        async fn create_item(
            &self,
            new: NewItem,
            user_id: Option<String>,
            is_anonymous: bool,
        ) -> RepoResult<Item> {
            let rec = sqlx::query_as::<_, Item>(
                r#"
                INSERT INTO items (
                    title, description, category, status, location, venue, container,
                    color, date_lost_found, image_url, contact_info, identifying_details,
                    expiry_date, is_active, is_anonymous, user_id, created_at, updated_at
                )
                VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,TRUE,$14,$15,now(),now())
                RETURNING *
                "#,
            )
            .bind(&new.title)
            .bind(&new.description)
            .bind(new.category)
            .bind(new.status)
            .bind(&new.location)
            .bind(&new.venue)
            .bind(&new.container)
            .bind(&new.color)
            .bind(new.date_lost_found)
            .bind(&new.image_url)
            .bind(&new.contact_info)
            .bind(&new.identifying_details)
            .bind(new.expiry_date)
            .bind(is_anonymous)
            .bind(&user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;
            Ok(rec)
        }

        async fn update_item(&self, id: Id, upd: UpdateItem) -> RepoResult<Item> {
            let rec = sqlx::query_as::<_, Item>(
                r#"
                UPDATE items SET
                    title = COALESCE($2, title),
                    description = COALESCE($3, description),
                    category = COALESCE($4, category),
                    location = COALESCE($5, location),
                    venue = COALESCE($6, venue),
                    container = COALESCE($7, container),
                    color = COALESCE($8, color),
                    image_url = COALESCE($9, image_url),
                    storage_location = COALESCE($10, storage_location),
                    storage_date = CASE WHEN $10 IS NULL THEN storage_date ELSE now() END,
                    expiry_date = COALESCE($11, expiry_date),
                    updated_at = now()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(&upd.title)
            .bind(&upd.description)
            .bind(upd.category)
            .bind(&upd.location)
            .bind(&upd.venue)
            .bind(&upd.container)
            .bind(&upd.color)
            .bind(&upd.image_url)
            .bind(&upd.storage_location)
            .bind(upd.expiry_date)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_internal)?;
            Ok(rec)
        }

        async fn set_item_status(&self, id: Id, status: ItemStatus) -> RepoResult<Item> {
            let current = self.get_item(id).await?;
            if !current.status.can_transition(status) {
                return Err(RepoError::Conflict);
            }
            sqlx::query_as::<_, Item>(
                "UPDATE items SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
            )
            .bind(id)
            .bind(status)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_internal)
        }

        async fn deactivate_item(&self, id: Id) -> RepoResult<()> {
            let res = sqlx::query("UPDATE items SET is_active = FALSE, updated_at = now() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(internal)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }

        async fn restore_item(&self, id: Id) -> RepoResult<()> {
            let res = sqlx::query("UPDATE items SET is_active = TRUE, updated_at = now() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(internal)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }

        async fn hard_delete_item(&self, id: Id) -> RepoResult<()> {
            let mut tx = self.pool.begin().await.map_err(internal)?;
            sqlx::query("DELETE FROM claims WHERE item_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(internal)?;
            sqlx::query("DELETE FROM matches WHERE lost_item_id = $1 OR found_item_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(internal)?;
            let res = sqlx::query("DELETE FROM items WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(internal)?;
            if res.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
            tx.commit().await.map_err(internal)?;
            Ok(())
        }

        async fn release_expired(&self, today: NaiveDate) -> RepoResult<u64> {
            let res = sqlx::query(
                "UPDATE items SET status = $2, is_active = FALSE, updated_at = now()
                 WHERE is_active AND expiry_date IS NOT NULL AND expiry_date < $1",
            )
            .bind(today)
            .bind(ItemStatus::Returned)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
            Ok(res.rows_affected())
        }
    }

    #[async_trait]
    impl ClaimRepo for PgRepo {
        async fn create_claim(
            &self,
            new: NewClaim,
            claimant_id: Option<String>,
            reference_number: String,
        ) -> RepoResult<Claim> {
            // item must exist and be active
            let active: bool = sqlx::query_scalar("SELECT is_active FROM items WHERE id = $1")
                .bind(new.item_id)
                .fetch_one(&self.pool)
                .await
                .map_err(not_found_or_internal)?;
            if !active {
                return Err(RepoError::NotFound);
            }
            let rec = sqlx::query_as::<_, Claim>(
                r#"
                INSERT INTO claims (
                    item_id, claimant_id, first_name, last_name, email, phone,
                    message, status, reference_number, created_at, updated_at
                )
                VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,now(),now())
                RETURNING *
                "#,
            )
            .bind(new.item_id)
            .bind(&claimant_id)
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(&new.email)
            .bind(&new.phone)
            .bind(&new.message)
            .bind(ClaimStatus::Pending)
            .bind(&reference_number)
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;
            Ok(rec)
        }

        async fn get_claim(&self, id: Id) -> RepoResult<Claim> {
            sqlx::query_as::<_, Claim>("SELECT * FROM claims WHERE id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(not_found_or_internal)
        }

        async fn list_claims(&self, item_id: Option<Id>) -> RepoResult<Vec<Claim>> {
            let recs = sqlx::query_as::<_, Claim>(
                "SELECT * FROM claims WHERE ($1::bigint IS NULL OR item_id = $1)
                 ORDER BY created_at DESC, id DESC",
            )
            .bind(item_id)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
            Ok(recs)
        }

        async fn list_claims_by_claimant(&self, user_id: &str) -> RepoResult<Vec<Claim>> {
            let recs = sqlx::query_as::<_, Claim>(
                "SELECT * FROM claims WHERE claimant_id = $1 ORDER BY created_at DESC, id DESC",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
            Ok(recs)
        }

        async fn list_claims_received(&self, owner_id: &str) -> RepoResult<Vec<Claim>> {
            let recs = sqlx::query_as::<_, Claim>(
                r#"
                SELECT c.* FROM claims c
                JOIN items i ON i.id = c.item_id
                WHERE i.user_id = $1
                ORDER BY c.created_at DESC, c.id DESC
                "#,
            )
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
            Ok(recs)
        }

        async fn set_claim_status(
            &self,
            id: Id,
            status: ClaimStatus,
            staff_notes: Option<String>,
        ) -> RepoResult<Claim> {
            let current = self.get_claim(id).await?;
            if current.status.is_terminal() || !status.is_terminal() {
                return Err(RepoError::Conflict);
            }
            sqlx::query_as::<_, Claim>(
                "UPDATE claims SET status = $2, staff_notes = COALESCE($3, staff_notes),
                 updated_at = now() WHERE id = $1 RETURNING *",
            )
            .bind(id)
            .bind(status)
            .bind(&staff_notes)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_internal)
        }
    }

    #[async_trait]
    impl MatchRepo for PgRepo {
        async fn create_match(&self, new: NewMatch) -> RepoResult<ItemMatch> {
            let both: i64 = sqlx::query_scalar("SELECT count(*) FROM items WHERE id IN ($1, $2)")
                .bind(new.lost_item_id)
                .bind(new.found_item_id)
                .fetch_one(&self.pool)
                .await
                .map_err(internal)?;
            if both != 2 {
                return Err(RepoError::NotFound);
            }
            let rec = sqlx::query_as::<_, ItemMatch>(
                r#"
                INSERT INTO matches (
                    lost_item_id, found_item_id, match_score, match_algorithm,
                    status, notes, created_at, updated_at
                )
                VALUES ($1,$2,$3,$4,$5,$6,now(),now())
                RETURNING *
                "#,
            )
            .bind(new.lost_item_id)
            .bind(new.found_item_id)
            .bind(new.match_score)
            .bind(&new.match_algorithm)
            .bind(MatchStatus::Pending)
            .bind(&new.notes)
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;
            Ok(rec)
        }

        async fn list_matches(&self, status: MatchStatus) -> RepoResult<Vec<ItemMatch>> {
            let recs = sqlx::query_as::<_, ItemMatch>(
                "SELECT * FROM matches WHERE status = $1 ORDER BY match_score DESC",
            )
            .bind(status)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
            Ok(recs)
        }

        async fn review_match(
            &self,
            id: Id,
            verdict: MatchStatus,
            reviewer: &str,
        ) -> RepoResult<ItemMatch> {
            if verdict == MatchStatus::Pending {
                return Err(RepoError::Conflict);
            }
            let rec = sqlx::query_as::<_, ItemMatch>(
                r#"
                UPDATE matches SET status = $2, reviewed_by = $3, reviewed_at = now(),
                    updated_at = now()
                WHERE id = $1 AND status = $4
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(verdict)
            .bind(reviewer)
            .bind(MatchStatus::Pending)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
            match rec {
                Some(m) => Ok(m),
                // distinguish a missing row from an already-reviewed one
                None => {
                    let exists: i64 =
                        sqlx::query_scalar("SELECT count(*) FROM matches WHERE id = $1")
                            .bind(id)
                            .fetch_one(&self.pool)
                            .await
                            .map_err(internal)?;
                    if exists == 0 { Err(RepoError::NotFound) } else { Err(RepoError::Conflict) }
                }
            }
        }
    }

    #[async_trait]
    impl UserRoleRepo for PgRepo {
        async fn get_user_role(&self, user_id: &str) -> Option<AuthRole> {
            let role: Option<String> =
                sqlx::query_scalar("SELECT role::text FROM user_roles WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_optional(&self.pool)
                    .await
                    .ok()
                    .flatten();
            match role.as_deref() {
                Some("staff") => Some(AuthRole::Staff),
                Some("student") => Some(AuthRole::Student),
                _ => None,
            }
        }

        async fn set_user_role(&self, user_id: &str, role: AuthRole) -> RepoResult<()> {
            let role_txt = match role {
                AuthRole::Staff => "staff",
                AuthRole::Student => "student",
            };
            sqlx::query(
                r#"
                INSERT INTO user_roles (user_id, role, created_at)
                VALUES ($1, $2::app_role, now())
                ON CONFLICT (user_id) DO UPDATE SET role = EXCLUDED.role
                "#,
            )
            .bind(user_id)
            .bind(role_txt)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
            Ok(())
        }
    }

    #[async_trait]
    impl AuditRepo for PgRepo {
        async fn record_audit(&self, entry: NewAuditEntry) -> RepoResult<()> {
            sqlx::query(
                r#"
                INSERT INTO audit_log (action, action_type, item_id, user_id, old_value, new_value, created_at)
                VALUES ($1,$2,$3,$4,$5,$6,now())
                "#,
            )
            .bind(&entry.action)
            .bind(&entry.action_type)
            .bind(entry.item_id)
            .bind(&entry.user_id)
            .bind(&entry.old_value)
            .bind(&entry.new_value)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
            Ok(())
        }

        async fn list_audit(&self, limit: usize) -> RepoResult<Vec<AuditEntry>> {
            let recs = sqlx::query_as::<_, AuditEntry>(
                "SELECT * FROM audit_log ORDER BY created_at DESC, id DESC LIMIT $1",
            )
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
            Ok(recs)
        }
    }
}
