//! Integration tests for the GDPR user-retention rule.
//!
//! Shop redaction deletes brands unconditionally; whether the attached
//! user accounts survive depends on how they signed up and what they
//! have left.

use brandpulse_core::SignupMethod;
use brandpulse_ingest::services::redact::should_delete_user;

#[test]
fn test_orphaned_shopify_user_is_deleted() {
    assert!(should_delete_user(0, SignupMethod::Shopify));
}

#[test]
fn test_shopify_user_with_remaining_brands_survives() {
    assert!(!should_delete_user(1, SignupMethod::Shopify));
    assert!(!should_delete_user(5, SignupMethod::Shopify));
}

#[test]
fn test_email_user_survives_even_with_no_brands() {
    // An email signup owns their account independent of any store.
    assert!(!should_delete_user(0, SignupMethod::Email));
    assert!(!should_delete_user(2, SignupMethod::Email));
}

#[test]
fn test_signup_method_wire_names_match_schema() {
    assert_eq!(
        serde_json::to_value(SignupMethod::Shopify).unwrap(),
        "shopify"
    );
    assert_eq!(serde_json::to_value(SignupMethod::Email).unwrap(), "email");
}
