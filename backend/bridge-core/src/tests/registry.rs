// Unit tests for the reference-counted subscription registry
// Tests shared/once registration, teardown counting and scope release

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::registry::SubscriptionRegistry;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Release function that counts its invocations.
fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
    let calls = Arc::new(AtomicUsize::new(0));
    let tracked = Arc::clone(&calls);
    (calls, move || {
        tracked.fetch_add(1, Ordering::SeqCst);
    })
}

fn registry() -> SubscriptionRegistry {
    SubscriptionRegistry::new(Diagnostics::new())
}

/// **VALUE**: Shared holders keep one subscription alive until the last releases.
///
/// **WHY THIS MATTERS**: Several UI regions listen to the same event. The
/// underlying transport subscription must outlive all but the last of them,
/// and then go away exactly once.
///
/// **BUG THIS CATCHES**: Releasing on the first `release`, never releasing,
/// or invoking the stored function twice.
#[test]
fn given_three_shared_holders_when_released_in_turn_then_stored_fn_runs_once_at_zero() {
    // GIVEN: Three holders of the same key
    let registry = registry();
    let (first, first_fn) = counter();
    let (second, second_fn) = counter();
    let (third, third_fn) = counter();

    assert_eq!(registry.add_shared("status", first_fn), 1);
    assert_eq!(registry.add_shared("status", second_fn), 2);
    assert_eq!(registry.add_shared("status", third_fn), 3);

    // THEN: Redundant registrations were released immediately
    assert_eq!(second.load(Ordering::SeqCst), 1);
    assert_eq!(third.load(Ordering::SeqCst), 1);
    assert_eq!(registry.ref_count("status"), Some(3));

    // WHEN: Two holders release
    assert!(!registry.release("status"));
    assert!(!registry.release("status"));

    // THEN: Stored subscription still alive
    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(registry.ref_count("status"), Some(1));

    // WHEN: Last holder releases
    assert!(registry.release("status"));

    // THEN: Torn down exactly once, entry gone
    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert!(!registry.contains("status"));
}

#[test]
fn given_existing_key_when_add_once_then_new_fn_runs_and_count_unchanged() {
    let registry = registry();
    let (stored, stored_fn) = counter();
    let (duplicate, duplicate_fn) = counter();

    assert!(registry.add_once("watch", stored_fn));
    assert!(!registry.add_once("watch", duplicate_fn));

    assert_eq!(duplicate.load(Ordering::SeqCst), 1);
    assert_eq!(stored.load(Ordering::SeqCst), 0);
    assert_eq!(registry.ref_count("watch"), Some(1));
}

/// **VALUE**: Forced release tears down once regardless of holders.
///
/// **WHY THIS MATTERS**: Error unwinding must not leave a subscription
/// behind, even if it was shared.
///
/// **BUG THIS CATCHES**: Force release that only decrements, or a later
/// `release` that runs the function a second time.
#[test]
fn given_shared_key_when_force_released_then_fn_runs_once_and_later_release_is_reported() {
    // GIVEN: A key held twice and a diagnostics listener
    let diagnostics = Diagnostics::new();
    let mut reports = diagnostics.subscribe();
    let registry = SubscriptionRegistry::new(diagnostics);
    let (stored, stored_fn) = counter();
    let (_, redundant_fn) = counter();
    registry.add_shared("key", stored_fn);
    registry.add_shared("key", redundant_fn);

    // WHEN: Forced, then forced again, then released normally
    assert!(registry.force_release("key"));
    assert!(!registry.force_release("key"));
    assert!(!registry.release("key"));

    // THEN: One teardown, and the stray release reported
    assert_eq!(stored.load(Ordering::SeqCst), 1);
    assert!(registry.is_empty());
    assert_eq!(
        reports.try_recv().ok(),
        Some(Diagnostic::UnknownSubscriptionKey {
            key: "key".to_string()
        })
    );
}

#[test]
fn given_missing_key_when_released_then_reported_not_panicking() {
    let diagnostics = Diagnostics::new();
    let mut reports = diagnostics.subscribe();
    let registry = SubscriptionRegistry::new(diagnostics);

    assert!(!registry.release("never-added"));

    assert!(matches!(
        reports.try_recv(),
        Ok(Diagnostic::UnknownSubscriptionKey { ref key }) if key == "never-added"
    ));
}

#[test]
fn given_several_keys_when_release_all_then_each_fn_runs_once() {
    let registry = registry();
    let (a, a_fn) = counter();
    let (b, b_fn) = counter();
    registry.add_shared("a", a_fn);
    registry.add_once("b", b_fn);

    assert_eq!(registry.release_all(), 2);
    assert_eq!(registry.release_all(), 0);

    assert_eq!(a.load(Ordering::SeqCst), 1);
    assert_eq!(b.load(Ordering::SeqCst), 1);
    assert!(registry.is_empty());
}

/// **VALUE**: Dropping the owning scope releases what it still holds.
///
/// **BUG THIS CATCHES**: Subscriptions leaking past the registry's owner,
/// or a clone's drop tearing down entries while another handle is alive.
#[test]
fn given_cloned_registry_when_all_handles_dropped_then_entries_released() {
    let registry = registry();
    let clone = registry.clone();
    let (stored, stored_fn) = counter();
    registry.add_shared("scope", stored_fn);

    drop(clone);
    assert_eq!(stored.load(Ordering::SeqCst), 0);

    drop(registry);
    assert_eq!(stored.load(Ordering::SeqCst), 1);
}

/// **VALUE**: Release functions may call back into the registry.
///
/// **WHY THIS MATTERS**: Teardown of one subscription commonly releases a
/// related key. Running release functions under the lock would deadlock.
#[test]
fn given_release_fn_that_reenters_registry_when_released_then_no_deadlock() {
    let registry = registry();
    let (inner, inner_fn) = counter();
    registry.add_once("inner", inner_fn);

    let weak = registry.downgrade();
    registry.add_once("outer", move || {
        if let Some(registry) = weak.upgrade() {
            registry.release("inner");
        }
    });

    assert!(registry.release("outer"));
    assert_eq!(inner.load(Ordering::SeqCst), 1);
    assert!(registry.is_empty());
}
