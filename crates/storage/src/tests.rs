// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests against a real Postgres instance, provisioned per
//! test by `sqlx::test` (needs `DATABASE_URL` pointing at a server; each
//! test gets its own migrated, isolated database).

use chrono::Utc;
use hangar_core::{Build, BuildId, BuildStatus, Platform};
use sqlx::PgPool;

use crate::store::BuildFilter;
use crate::MetadataStore;

fn sample_build(id: &str) -> Build {
    Build {
        id: BuildId::from_string(id),
        platform: Platform::Ios,
        status: BuildStatus::Pending,
        source_blob_path: format!("source/{id}.zip"),
        certs_blob_path: None,
        result_blob_path: None,
        assigned_worker_id: None,
        build_token: format!("tok_{id}"),
        otp: None,
        otp_expires_at: None,
        otp_consumed: false,
        vm_token: None,
        vm_token_expires_at: None,
        submitted_at: Utc::now(),
        started_at: None,
        completed_at: None,
        last_heartbeat_at: None,
        error_message: None,
        retry_parent_id: None,
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn select_oldest_pending_respects_fifo(pool: PgPool) {
    let store = MetadataStore::from_pool(pool);
    let mut b1 = sample_build("bld_1");
    let mut b2 = sample_build("bld_2");
    b1.submitted_at = Utc::now();
    b2.submitted_at = b1.submitted_at + chrono::Duration::milliseconds(10);
    store.insert_build(&b2).await.unwrap();
    store.insert_build(&b1).await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let picked = store.select_oldest_pending_for_update(&mut tx).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(picked.unwrap().id, b1.id);
}

#[sqlx::test(migrations = "./migrations")]
async fn concurrent_claims_never_see_the_same_build(pool: PgPool) {
    let store = MetadataStore::from_pool(pool.clone());
    store.insert_build(&sample_build("bld_only")).await.unwrap();

    let store_a = store.clone();
    let store_b = store.clone();
    let (a, b) = tokio::join!(
        async move {
            let mut tx = store_a.begin().await.unwrap();
            let picked = store_a.select_oldest_pending_for_update(&mut tx).await.unwrap();
            // Hold the lock briefly so the other task's SKIP LOCKED actually
            // has something to skip past.
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            tx.commit().await.unwrap();
            picked
        },
        async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            let mut tx = store_b.begin().await.unwrap();
            let picked = store_b.select_oldest_pending_for_update(&mut tx).await.unwrap();
            tx.commit().await.unwrap();
            picked
        }
    );

    let claims: Vec<_> = [a, b].into_iter().flatten().collect();
    assert_eq!(claims.len(), 1, "exactly one of the two pollers should see the build");
}

#[sqlx::test(migrations = "./migrations")]
async fn otp_is_consumable_exactly_once(pool: PgPool) {
    let store = MetadataStore::from_pool(pool);
    let mut build = sample_build("bld_otp");
    build.status = BuildStatus::Assigned;
    store.insert_build(&build).await.unwrap();

    let now = Utc::now();
    let mut tx = store.begin().await.unwrap();
    store
        .assign_to_worker(&mut tx, &build.id, &hangar_core::WorkerId::from_string("wkr_1"), now, "otp-123", now + chrono::Duration::minutes(5))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let first = store.consume_otp(&mut tx, &build.id, "otp-123", now, "vm-token-1", now + chrono::Duration::minutes(10)).await.unwrap();
    tx.commit().await.unwrap();
    assert!(first);

    let mut tx = store.begin().await.unwrap();
    let second = store.consume_otp(&mut tx, &build.id, "otp-123", now, "vm-token-2", now + chrono::Duration::minutes(10)).await.unwrap();
    tx.commit().await.unwrap();
    assert!(!second, "a second consumption of the same OTP must fail");
}

#[sqlx::test(migrations = "./migrations")]
async fn list_builds_filters_by_status_and_platform(pool: PgPool) {
    let store = MetadataStore::from_pool(pool);
    let mut android = sample_build("bld_android");
    android.platform = Platform::Android;
    store.insert_build(&sample_build("bld_ios")).await.unwrap();
    store.insert_build(&android).await.unwrap();

    let ios_only = store
        .list_builds(&BuildFilter { status: None, platform: Some(Platform::Ios), worker_id: None })
        .await
        .unwrap();
    assert_eq!(ios_only.len(), 1);
    assert_eq!(ios_only[0].id.as_str(), "bld_ios");
}

#[sqlx::test(migrations = "./migrations")]
async fn stuck_builds_include_never_heartbeated_past_grace(pool: PgPool) {
    let store = MetadataStore::from_pool(pool);
    let mut build = sample_build("bld_stuck");
    build.status = BuildStatus::Assigned;
    store.insert_build(&build).await.unwrap();
    let now = Utc::now();
    let mut tx = store.begin().await.unwrap();
    store
        .assign_to_worker(&mut tx, &build.id, &hangar_core::WorkerId::from_string("wkr_1"), now - chrono::Duration::minutes(10), "otp", now + chrono::Duration::minutes(5))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let stuck = store
        .list_stuck_builds(now - chrono::Duration::minutes(1), now - chrono::Duration::minutes(5))
        .await
        .unwrap();
    assert_eq!(stuck.len(), 1);
    assert_eq!(stuck[0].id, build.id);
}
