//! Property-based tests for reference classification.
//!
//! Classification is total and display normalisation is idempotent: a
//! normalised reference is always displayable and normalising it again is a
//! no-op.

use galleria_images::{classify, normalize_for_display, ReferenceKind, PLACEHOLDER};
use proptest::prelude::*;

/// Strategy for generating reference strings of every shape
fn reference_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        r"[ -~]{0,40}".prop_map(|s| s.to_string()),
        r"data:image/(png|jpeg);base64,[A-Za-z0-9+/]{0,20}".prop_map(|s| s.to_string()),
        r"(http|https|HTTPS)://[a-z]{0,10}(/[a-z.]{0,10})?".prop_map(|s| s.to_string()),
        r"/uploads/[a-z./]{0,20}".prop_map(|s| s.to_string()),
        r"blob:[a-z0-9/-]{0,20}".prop_map(|s| s.to_string()),
        Just(PLACEHOLDER.to_string()),
    ]
}

#[test]
fn prop_normalized_reference_is_displayable() {
    proptest!(|(reference in reference_strategy())| {
        let shown = normalize_for_display(&reference);
        prop_assert!(classify(&shown).is_displayable());
    });
}

#[test]
fn prop_normalization_is_idempotent() {
    proptest!(|(reference in reference_strategy())| {
        let once = normalize_for_display(&reference).into_owned();
        let twice = normalize_for_display(&once).into_owned();
        prop_assert_eq!(once, twice);
    });
}

#[test]
fn prop_displayable_references_pass_through() {
    proptest!(|(reference in reference_strategy())| {
        let kind = classify(&reference);
        let shown = normalize_for_display(&reference);
        if kind.is_displayable() {
            prop_assert_eq!(&*shown, reference.as_str());
        } else {
            prop_assert_eq!(&*shown, PLACEHOLDER);
        }
    });
}

#[test]
fn prop_retained_kinds_are_displayable() {
    proptest!(|(reference in reference_strategy())| {
        let kind = classify(&reference);
        if kind.is_retained() {
            prop_assert!(kind.is_displayable());
        }
        if kind == ReferenceKind::RecognizedUploadPath {
            prop_assert!(!kind.is_retained());
        }
    });
}
