// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Concurrent requests for one user must not over-grant or double-apply.

use chat_relay::services::Activation;

mod common;

const CONCURRENT_REQUESTS: usize = 20;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_consumes_never_over_grant() {
    let (_, state) = common::create_test_app();

    let mut handles = vec![];
    for _ in 0..CONCURRENT_REQUESTS {
        let entitlements = state.entitlements.clone();
        handles.push(tokio::spawn(async move {
            entitlements.authorize_and_consume(7).await
        }));
    }

    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() {
            granted += 1;
        }
    }

    assert_eq!(granted, 5);
    let ent = state.entitlements.get(7).await.unwrap().unwrap();
    assert_eq!(ent.requests_used_today, 5);
    assert_eq!(ent.total_requests, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_activation_applies_once() {
    let (_, state) = common::create_test_app();

    let mut handles = vec![];
    for _ in 0..10 {
        let subscriptions = state.subscriptions.clone();
        handles.push(tokio::spawn(async move {
            subscriptions.activate(7, "basic", "charge-7").await
        }));
    }

    let mut applied = 0;
    for handle in handles {
        if let Activation::Applied(_) = handle.await.unwrap().unwrap() {
            applied += 1;
        }
    }

    assert_eq!(applied, 1);
    let ent = state.entitlements.get(7).await.unwrap().unwrap();
    assert_eq!(ent.requests_remaining, 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_paid_balance_drains_exactly() {
    let (_, state) = common::create_test_app();
    state
        .subscriptions
        .activate(8, "basic", "charge-8")
        .await
        .unwrap();

    let mut handles = vec![];
    for _ in 0..120 {
        let entitlements = state.entitlements.clone();
        handles.push(tokio::spawn(async move {
            entitlements.authorize_and_consume(8).await
        }));
    }

    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() {
            granted += 1;
        }
    }

    // 100 from the plan, then the 5 free requests of the day.
    assert_eq!(granted, 105);
    let ent = state.entitlements.get(8).await.unwrap().unwrap();
    assert_eq!(ent.requests_remaining, 0);
    assert_eq!(ent.total_requests, 105);
}
