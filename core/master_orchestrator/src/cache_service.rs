//! Profile Pack cache: an in-process `dashmap`-backed TTL cache keyed by
//! `(user_id, intent_class)`, with Redis as an optional distributed overlay.
//!
//! The in-process map is the primary store and is always consulted first;
//! Redis (when configured) only prevents a cold cache on process restart or
//! lets multiple orchestrator instances share pack-building cost.

use crate::redis_service;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use shared_types::ProfilePack;
use tracing::debug;

struct CacheEntry {
    pack: ProfilePack,
    expires_at: DateTime<Utc>,
}

static PROFILE_PACK_CACHE: Lazy<DashMap<String, CacheEntry>> = Lazy::new(DashMap::new);

fn cache_key(user_id: &str, intent_class: &str) -> String {
    format!("{}:{}", user_id, intent_class)
}

fn redis_key(user_id: &str, intent_class: &str) -> String {
    format!("profile_pack:{}:{}", user_id, intent_class)
}

/// Returns a cached pack for `(user_id, intent_class)` if present and not
/// expired, checking the in-process map first and falling back to Redis.
pub fn get_cached_profile_pack(user_id: &str, intent_class: &str) -> Option<ProfilePack> {
    let key = cache_key(user_id, intent_class);

    if let Some(entry) = PROFILE_PACK_CACHE.get(&key) {
        if entry.expires_at > Utc::now() {
            debug!("profile pack cache hit (in-process) for {}", key);
            return Some(entry.pack.clone());
        }
    }
    PROFILE_PACK_CACHE.remove(&key);

    if !redis_service::is_enabled() {
        return None;
    }

    match redis_service::get::<ProfilePack>(&redis_key(user_id, intent_class)) {
        Ok(Some(pack)) => {
            debug!("profile pack cache hit (redis) for {}", key);
            Some(pack)
        }
        Ok(None) => None,
        Err(e) => {
            tracing::warn!("failed to read profile pack from redis: {}", e);
            None
        }
    }
}

/// Caches `pack` for `(user_id, intent_class)` for `ttl_minutes`, writing
/// through to Redis as well when it's configured.
pub fn cache_profile_pack(user_id: &str, intent_class: &str, pack: &ProfilePack, ttl_minutes: u64) {
    let key = cache_key(user_id, intent_class);
    let expires_at = Utc::now() + chrono::Duration::minutes(ttl_minutes as i64);

    PROFILE_PACK_CACHE.insert(
        key,
        CacheEntry {
            pack: pack.clone(),
            expires_at,
        },
    );

    if redis_service::is_enabled() {
        if let Err(e) = redis_service::set_with_expiry(
            &redis_key(user_id, intent_class),
            pack,
            ttl_minutes * 60,
        ) {
            tracing::warn!("failed to write profile pack to redis: {}", e);
        }
    }
}

/// Invalidates the cached pack for `(user_id, intent_class)` in both tiers,
/// e.g. after new transactions are detected for that user.
pub fn invalidate_profile_pack(user_id: &str, intent_class: &str) {
    PROFILE_PACK_CACHE.remove(&cache_key(user_id, intent_class));
    if redis_service::is_enabled() {
        let _ = redis_service::delete(&redis_key(user_id, intent_class));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{Budgets, DerivedMetrics, ProfilePack, UserCore};

    fn empty_pack(user_id: &str) -> ProfilePack {
        ProfilePack {
            user_id: user_id.to_string(),
            user_core: UserCore::default(),
            accounts: Vec::new(),
            manual_assets: Vec::new(),
            manual_liabilities: Vec::new(),
            goals: Vec::new(),
            holdings: Vec::new(),
            budgets: Budgets::default(),
            recurring_income: Vec::new(),
            recent_transactions: Vec::new(),
            derived_metrics: DerivedMetrics::default(),
            generated_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn cache_round_trips_within_ttl() {
        let pack = empty_pack("user-1");
        cache_profile_pack("user-1", "net_worth", &pack, 60);
        let hit = get_cached_profile_pack("user-1", "net_worth");
        assert!(hit.is_some());
    }

    #[test]
    fn cache_miss_for_unknown_key() {
        assert!(get_cached_profile_pack("nobody", "net_worth").is_none());
    }

    #[test]
    fn invalidate_removes_entry() {
        let pack = empty_pack("user-2");
        cache_profile_pack("user-2", "budget_analysis", &pack, 60);
        invalidate_profile_pack("user-2", "budget_analysis");
        assert!(get_cached_profile_pack("user-2", "budget_analysis").is_none());
    }
}
