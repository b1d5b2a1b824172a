//! Concurrent mutators against the `RocksDB` backend.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{Duration, Utc};
use credit_ledger::{Ledger, LedgerConfig, LedgerError, SubscriptionGrantOutcome};
use credit_ledger_core::{CreditRecord, GrantType, PlanTier, TransactionType, UserId};
use credit_ledger_store::{RocksStore, RocksStoreOptions, Store};
use tempfile::TempDir;

fn create_test_ledger() -> (Ledger<RocksStore>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let options = RocksStoreOptions {
        lock_timeout_ms: 5_000,
        max_lock_attempts: 10,
    };
    let store = RocksStore::open_with(temp_dir.path(), options).unwrap();
    (
        Ledger::new(Arc::new(store), LedgerConfig::default()),
        temp_dir,
    )
}

/// Run `f` on `threads` threads released together, collecting results.
fn race<T, F>(threads: usize, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(usize) -> T + Send + Sync + 'static,
{
    let barrier = Arc::new(Barrier::new(threads));
    let f = Arc::new(f);
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let barrier = Arc::clone(&barrier);
            let f = Arc::clone(&f);
            thread::spawn(move || {
                barrier.wait();
                f(i)
            })
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
fn concurrent_consumption_never_overspends() {
    let (ledger, _temp_dir) = create_test_ledger();
    let user_id = UserId::new("racer").unwrap();
    assert!(ledger.issue_daily_grant_if_due(&user_id, PlanTier::Free).unwrap());

    let results = {
        let ledger = ledger.clone();
        let user_id = user_id.clone();
        race(16, move |i| ledger.consume(&user_id, 10, &format!("job-{i}")))
    };

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(LedgerError::InsufficientCredit { .. })))
        .count();
    assert_eq!(succeeded, 10);
    assert_eq!(rejected, 6);

    assert_eq!(ledger.available_balance(&user_id).unwrap(), 0);
    let records = ledger.list_records(&user_id).unwrap();
    assert_eq!(records[0].consumed, 100);

    let history = ledger.list_transactions(&user_id, 100, 0).unwrap();
    assert_eq!(history.len(), 10);
    let mut afters: Vec<_> = history.iter().map(|tx| tx.balance_after).collect();
    afters.sort_unstable();
    assert_eq!(afters, (0..10).map(|k| k * 10).collect::<Vec<_>>());
}

#[test]
fn balance_reads_never_see_a_partial_consumption() {
    let (ledger, _temp_dir) = create_test_ledger();
    let now = Utc::now();
    let mut observed = BTreeSet::new();

    for n in 0..200 {
        let user_id = UserId::new(format!("reader-{n}")).unwrap();
        let first = CreditRecord::issued_at(
            user_id.clone(),
            GrantType::daily_free(),
            100,
            now - Duration::hours(2),
            Some(now + Duration::days(1)),
        );
        let second = CreditRecord::issued_at(
            user_id.clone(),
            GrantType::quota_pack(),
            50,
            now - Duration::hours(1),
            None,
        );
        ledger
            .store()
            .atomically(&user_id, |txn| {
                txn.put_record(&first)?;
                txn.put_record(&second)
            })
            .unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let reader = {
            let ledger = ledger.clone();
            let user_id = user_id.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut seen = BTreeSet::new();
                while !done.load(Ordering::SeqCst) {
                    seen.insert(ledger.available_balance(&user_id).unwrap());
                }
                seen
            })
        };

        ledger.consume(&user_id, 120, "spans both records").unwrap();
        done.store(true, Ordering::SeqCst);
        observed.extend(reader.join().unwrap());
    }

    assert!(
        observed.iter().all(|balance| *balance == 150 || *balance == 30),
        "observed {observed:?}"
    );
}

#[test]
fn concurrent_refunds_apply_once() {
    let (ledger, _temp_dir) = create_test_ledger();
    let user_id = UserId::new("refund-racer").unwrap();
    ledger
        .issue_subscription_grant(
            &user_id,
            "basic-monthly".parse().unwrap(),
            Utc::now() + Duration::days(30),
            500,
        )
        .unwrap();
    let consume_id = ledger.consume(&user_id, 300, "batch").unwrap();

    let results = {
        let ledger = ledger.clone();
        race(8, move |_| ledger.refund(&consume_id, "retry"))
    };

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|err| matches!(err, LedgerError::AlreadyRefunded(_))));

    assert_eq!(ledger.available_balance(&user_id).unwrap(), 1500);
    let refunds = ledger
        .list_transactions(&user_id, 100, 0)
        .unwrap()
        .into_iter()
        .filter(|tx| tx.transaction_type == TransactionType::Refund)
        .count();
    assert_eq!(refunds, 1);
}

#[test]
fn concurrent_daily_grants_issue_once() {
    let (ledger, _temp_dir) = create_test_ledger();
    let user_id = UserId::new("daily-racer").unwrap();

    let results = {
        let ledger = ledger.clone();
        let user_id = user_id.clone();
        race(8, move |_| {
            ledger
                .issue_daily_grant_if_due(&user_id, PlanTier::Free)
                .unwrap()
        })
    };

    assert_eq!(results.iter().filter(|issued| **issued).count(), 1);
    assert_eq!(ledger.list_records(&user_id).unwrap().len(), 1);
    assert_eq!(ledger.available_balance(&user_id).unwrap(), 100);
}

#[test]
fn concurrent_subscription_redelivery_grants_once() {
    let (ledger, _temp_dir) = create_test_ledger();
    let user_id = UserId::new("webhook-racer").unwrap();
    let ends = Utc::now() + Duration::days(30);

    let results = {
        let ledger = ledger.clone();
        let user_id = user_id.clone();
        race(6, move |_| {
            ledger
                .issue_subscription_grant(&user_id, "plus-monthly".parse().unwrap(), ends, 900)
                .unwrap()
        })
    };

    let issued = results
        .iter()
        .filter(|o| matches!(o, SubscriptionGrantOutcome::Issued { .. }))
        .count();
    assert_eq!(issued, 1);
    assert_eq!(ledger.available_balance(&user_id).unwrap(), 6000);
    assert_eq!(ledger.list_payments(&user_id).unwrap().len(), 1);
}

#[test]
fn users_do_not_block_each_other() {
    let (ledger, _temp_dir) = create_test_ledger();
    let users: Vec<_> = (0..8)
        .map(|i| UserId::new(format!("user-{i}")).unwrap())
        .collect();
    for user_id in &users {
        ledger.issue_daily_grant_if_due(user_id, PlanTier::Free).unwrap();
    }

    let results = {
        let ledger = ledger.clone();
        let users = users.clone();
        race(8, move |i| ledger.consume(&users[i], 60, "own balance"))
    };

    assert!(results.iter().all(Result::is_ok));
    for user_id in &users {
        assert_eq!(ledger.available_balance(user_id).unwrap(), 40);
    }
}

#[test]
fn state_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let user_id = UserId::new("durable").unwrap();

    let consume_id = {
        let store = RocksStore::open(temp_dir.path()).unwrap();
        let ledger = Ledger::new(Arc::new(store), LedgerConfig::default());
        ledger.issue_daily_grant_if_due(&user_id, PlanTier::Free).unwrap();
        ledger.consume(&user_id, 25, "before restart").unwrap()
    };

    let store = RocksStore::open(temp_dir.path()).unwrap();
    let ledger = Ledger::new(Arc::new(store), LedgerConfig::default());

    assert_eq!(ledger.available_balance(&user_id).unwrap(), 75);
    assert!(!ledger.issue_daily_grant_if_due(&user_id, PlanTier::Free).unwrap());
    assert!(ledger.store().get_transaction(&consume_id).unwrap().is_some());

    ledger.refund(&consume_id, "after restart").unwrap();
    assert!(matches!(
        ledger.refund(&consume_id, "twice"),
        Err(LedgerError::AlreadyRefunded(_))
    ));
}
