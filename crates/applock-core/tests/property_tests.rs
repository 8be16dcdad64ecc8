//! Property-based tests for applock-core using proptest
//!
//! These tests verify invariants that should hold for all valid inputs.

use applock_core::{
    config::{idle_expired, lock_after_ms_from_minutes},
    credential::{hash_pin, StoredCredential},
    pin::{validate_pin, PIN_LENGTH},
    InputError,
};
use chrono::Utc;
use proptest::prelude::*;
use std::time::Duration;

// ============================================
// Strategies
// ============================================

fn arb_pin() -> impl Strategy<Value = String> {
    "[0-9]{5}"
}

fn arb_username() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_]{0,15}"
}

// ============================================
// PIN format
// ============================================

proptest! {
    #[test]
    fn prop_five_digits_accepted(pin in arb_pin()) {
        prop_assert!(validate_pin(&pin).is_ok());
    }

    #[test]
    fn prop_wrong_length_rejected(pin in "[0-9]{0,12}") {
        prop_assume!(pin.len() != PIN_LENGTH);
        prop_assert_eq!(validate_pin(&pin), Err(InputError::InvalidPinFormat));
    }

    #[test]
    fn prop_non_digit_rejected(
        prefix in "[0-9]{0,4}",
        bad in "[^0-9]",
        suffix in "[0-9]{0,4}",
    ) {
        let pin = format!("{}{}{}", prefix, bad, suffix);
        prop_assert_eq!(validate_pin(&pin), Err(InputError::InvalidPinFormat));
    }
}

// ============================================
// Credential hashing
// ============================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_credential_round_trip(
        username in arb_username(),
        pin in arb_pin(),
        other in arb_pin(),
    ) {
        let cred = StoredCredential::create(&username, &pin, Utc::now()).unwrap();
        prop_assert!(cred.matches(&username, &pin));
        prop_assert_eq!(cred.matches(&username, &other), pin == other);
        prop_assert_ne!(&cred.salted_hash, &pin);
    }

    #[test]
    fn prop_fresh_salt_per_credential(pin in arb_pin()) {
        let a = StoredCredential::create("colA", &pin, Utc::now()).unwrap();
        let b = StoredCredential::create("colA", &pin, Utc::now()).unwrap();
        prop_assert_ne!(a.salt, b.salt);
    }

    #[test]
    fn prop_hash_depends_on_pin(salt in "[0-9a-f]{32}", a in arb_pin(), b in arb_pin()) {
        prop_assume!(a != b);
        prop_assert_ne!(hash_pin(&salt, &a), hash_pin(&salt, &b));
    }
}

// ============================================
// Idle budget
// ============================================

proptest! {
    #[test]
    fn prop_budget_at_least_one_minute(minutes in any::<u64>()) {
        prop_assert!(lock_after_ms_from_minutes(minutes) >= 60_000);
    }

    #[test]
    fn prop_touch_before_deadline_keeps_unlocked(
        last in 0i64..1_000_000_000,
        budget_secs in 60u64..86_400,
        idle_ms in 0u64..60_000,
    ) {
        let budget = Duration::from_secs(budget_secs);
        let now = last + idle_ms as i64;
        prop_assert!(!idle_expired(Some(last), now, budget));
        let deadline = last + budget.as_millis() as i64;
        prop_assert!(idle_expired(Some(last), deadline, budget));
    }
}
