//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `prizebot_test`)
//!   `TEST_DB_PASSWORD` (default: `prizebot_test`)
//!   `TEST_DB_NAME` (default: `prizebot_test`)

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use prizebot_db::entities::giveaway::{self, GiveawayOptions, GiveawayRules, GiveawayStatus};
use prizebot_db::entities::giveaway_entry::{self, EntryMethod};
use prizebot_db::store::{
    ConditionalUpdate, GiveawayGuard, GiveawayPatch, GiveawayStore, InsertOutcome, SeaOrmStore,
};
use prizebot_db::test_utils::{TestDatabase, TestDbConfig};

fn active_giveaway(id: &str) -> giveaway::Model {
    let now = Utc::now();
    giveaway::Model {
        id: id.to_string(),
        guild_id: "guild".to_string(),
        channel_id: "chan".to_string(),
        host_id: "host".to_string(),
        title: "Integration".to_string(),
        prize: None,
        winners_count: 1,
        rules: GiveawayRules::default(),
        options: GiveawayOptions::default(),
        status: GiveawayStatus::Active,
        scheduled_at: None,
        starts_at: Some(now),
        ends_at: now - Duration::seconds(5),
        ended_at: None,
        cancelled_at: None,
        processing: false,
        processing_started_at: None,
        fair_rng_seed: None,
        winners_announced: false,
        entries_count: 0,
        last_live_update_at: None,
        announcement_message_id: None,
        created_at: now,
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_connection() {
    let config = TestDbConfig::default();
    let result = TestDatabase::with_config(config).await;
    assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_lock_acquired_once() {
    let db = TestDatabase::new().await.expect("Failed to connect");
    db.cleanup().await.unwrap();
    let store = SeaOrmStore::new(Arc::new(db.conn));

    store.insert_giveaway(active_giveaway("it-lock")).await.unwrap();

    let guard = GiveawayGuard::unlocked(GiveawayStatus::Active);
    let patch = GiveawayPatch {
        processing: Some(true),
        processing_started_at: Some(Some(Utc::now())),
        ..GiveawayPatch::default()
    };
    let (a, b) = tokio::join!(
        store.update_giveaway_if("it-lock", &guard, &patch),
        store.update_giveaway_if("it-lock", &guard, &patch),
    );

    let applied = [a.unwrap(), b.unwrap()]
        .into_iter()
        .filter(ConditionalUpdate::is_applied)
        .count();
    assert_eq!(applied, 1);
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_unique_entry_per_member() {
    let db = TestDatabase::new().await.expect("Failed to connect");
    db.cleanup().await.unwrap();
    let store = SeaOrmStore::new(Arc::new(db.conn));

    store.insert_giveaway(active_giveaway("it-entry")).await.unwrap();
    let entry = |id: &str| giveaway_entry::Model {
        id: id.to_string(),
        giveaway_id: "it-entry".to_string(),
        user_id: "alice".to_string(),
        display_name: "Alice".to_string(),
        joined_at: Utc::now(),
        method: EntryMethod::Button,
        weight: 1,
        is_bot: false,
        suspicious_alt: false,
    };

    let first = store.insert_entry(entry("e1")).await.unwrap();
    let second = store.insert_entry(entry("e2")).await.unwrap();

    assert!(matches!(first, InsertOutcome::Inserted(_)));
    assert_eq!(second, InsertOutcome::Duplicate);
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(!config.username.is_empty());
    assert!(!config.database.is_empty());
}

#[test]
fn test_database_url_format() {
    let config = TestDbConfig {
        host: "testhost".to_string(),
        port: 5432,
        username: "testuser".to_string(),
        password: "testpass".to_string(),
        database: "testdb".to_string(),
    };

    let url = config.database_url();
    assert!(url.starts_with("postgres://"));
    assert!(url.contains("testhost"));
    assert!(url.contains("testdb"));
}
