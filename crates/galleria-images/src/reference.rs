//! Image reference classification.
//!
//! Every consumer that needs to know what kind of reference a `src` string is
//! goes through [`classify`] and matches on the returned [`ReferenceKind`].
//! Nothing else in the crate inspects the raw string shape.

use serde::{Serialize, Serializer};
use std::borrow::Cow;

/// Marker of a self-contained (inline, base64) image payload.
pub const SELF_CONTAINED_PREFIX: &str = "data:image/";

/// Marker of an ephemeral preview handle.
pub const EPHEMERAL_PREFIX: &str = "blob:";

/// The universally valid fallback reference.
pub const PLACEHOLDER: &str = "/placeholder.svg";

/// Path prefix used by the legacy upload endpoint.
pub const LEGACY_UPLOAD_PREFIX: &str = "/uploads/";

const EXTERNAL_SCHEMES: [&str; 2] = ["https://", "http://"];

/// Category of an image reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// Inline encoded image data
    SelfContainedData,
    /// Preview handle that only lives for the current session
    EphemeralHandle,
    /// Absolute `http`/`https` URL
    ExternalUrl,
    /// The placeholder sentinel
    Placeholder,
    /// Path produced by the legacy upload endpoint; no longer served
    RecognizedUploadPath,
    /// Anything else
    Invalid,
}

impl ReferenceKind {
    /// Whether a reference of this kind may be rendered as-is.
    pub fn is_displayable(self) -> bool {
        match self {
            ReferenceKind::SelfContainedData
            | ReferenceKind::EphemeralHandle
            | ReferenceKind::ExternalUrl
            | ReferenceKind::Placeholder => true,
            ReferenceKind::RecognizedUploadPath | ReferenceKind::Invalid => false,
        }
    }

    /// Whether the startup sweep keeps a persisted reference of this kind.
    ///
    /// Ephemeral handles never outlive the session that created them, so a
    /// persisted one is dead by the time the sweep runs.
    pub fn is_retained(self) -> bool {
        match self {
            ReferenceKind::SelfContainedData
            | ReferenceKind::ExternalUrl
            | ReferenceKind::Placeholder => true,
            ReferenceKind::EphemeralHandle
            | ReferenceKind::RecognizedUploadPath
            | ReferenceKind::Invalid => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReferenceKind::SelfContainedData => "self-contained",
            ReferenceKind::EphemeralHandle => "ephemeral",
            ReferenceKind::ExternalUrl => "external-url",
            ReferenceKind::Placeholder => "placeholder",
            ReferenceKind::RecognizedUploadPath => "legacy-upload",
            ReferenceKind::Invalid => "invalid",
        }
    }
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ReferenceKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Classify a reference string. Total: every input maps to exactly one kind.
pub fn classify(reference: &str) -> ReferenceKind {
    if starts_with_ignore_case(reference, SELF_CONTAINED_PREFIX) {
        return ReferenceKind::SelfContainedData;
    }
    if starts_with_ignore_case(reference, EPHEMERAL_PREFIX) {
        return ReferenceKind::EphemeralHandle;
    }
    if EXTERNAL_SCHEMES
        .iter()
        .any(|scheme| starts_with_ignore_case(reference, scheme) && reference.len() > scheme.len())
    {
        return ReferenceKind::ExternalUrl;
    }
    if reference == PLACEHOLDER {
        return ReferenceKind::Placeholder;
    }
    if let Some(rest) = reference.strip_prefix(LEGACY_UPLOAD_PREFIX) {
        if !rest.is_empty() && !rest.contains("..") {
            return ReferenceKind::RecognizedUploadPath;
        }
    }
    ReferenceKind::Invalid
}

/// Reference to render: the input when displayable, the placeholder otherwise.
pub fn normalize_for_display(reference: &str) -> Cow<'_, str> {
    if classify(reference).is_displayable() {
        Cow::Borrowed(reference)
    } else {
        Cow::Borrowed(PLACEHOLDER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_each_kind() {
        assert_eq!(
            classify("data:image/png;base64,iVBORw0KGgo="),
            ReferenceKind::SelfContainedData
        );
        assert_eq!(
            classify("blob:galleria/6f1c2a"),
            ReferenceKind::EphemeralHandle
        );
        assert_eq!(
            classify("https://images.example.com/a.jpg"),
            ReferenceKind::ExternalUrl
        );
        assert_eq!(classify("http://example.com/b.png"), ReferenceKind::ExternalUrl);
        assert_eq!(classify(PLACEHOLDER), ReferenceKind::Placeholder);
        assert_eq!(
            classify("/uploads/3f2e-hero.png"),
            ReferenceKind::RecognizedUploadPath
        );
    }

    #[test]
    fn test_classify_invalid() {
        assert_eq!(classify(""), ReferenceKind::Invalid);
        assert_eq!(classify("images/hero.png"), ReferenceKind::Invalid);
        assert_eq!(classify("ftp://example.com/x.png"), ReferenceKind::Invalid);
        assert_eq!(classify("https://"), ReferenceKind::Invalid);
        assert_eq!(classify("/uploads/"), ReferenceKind::Invalid);
        assert_eq!(classify("/uploads/../secret"), ReferenceKind::Invalid);
        assert_eq!(classify("data:text/html,<b>x</b>"), ReferenceKind::Invalid);
        assert_eq!(classify(" /placeholder.svg"), ReferenceKind::Invalid);
    }

    #[test]
    fn test_scheme_case_insensitive() {
        assert_eq!(classify("HTTPS://example.com/a.png"), ReferenceKind::ExternalUrl);
        assert_eq!(
            classify("DATA:IMAGE/PNG;base64,AAAA"),
            ReferenceKind::SelfContainedData
        );
    }

    #[test]
    fn test_multibyte_input_does_not_panic() {
        assert_eq!(classify("ñ"), ReferenceKind::Invalid);
        assert_eq!(classify("日本語の画像"), ReferenceKind::Invalid);
    }

    #[test]
    fn test_display_and_retention_policy() {
        assert!(ReferenceKind::EphemeralHandle.is_displayable());
        assert!(!ReferenceKind::EphemeralHandle.is_retained());
        assert!(!ReferenceKind::RecognizedUploadPath.is_displayable());
        assert!(!ReferenceKind::RecognizedUploadPath.is_retained());
        assert!(ReferenceKind::Placeholder.is_retained());
    }

    #[test]
    fn test_normalize_for_display() {
        assert_eq!(normalize_for_display("/uploads/old.png"), PLACEHOLDER);
        assert_eq!(normalize_for_display("garbage"), PLACEHOLDER);
        assert_eq!(
            normalize_for_display("https://example.com/a.png"),
            "https://example.com/a.png"
        );
    }
}
