//! Maps environment signals to a namespace identifier.
//!
//! Priority, first present signal wins:
//!
//! 1. explicit override, used verbatim
//! 2. pull-request number, formatted as `pr_<number>`
//! 3. branch name, sanitized
//! 4. `public`
//!
//! The build, the runtime, and the teardown hook all call into this module,
//! so the rules here must stay deterministic.

use crate::types::namespace::is_reserved;
use crate::types::{EnvironmentSignals, NamespaceIdentifier, Resolution, SignalKind};

/// Sanitized branch names are cut to this length, leaving headroom under the
/// 63-byte Postgres limit.
pub const MAX_SANITIZED_LEN: usize = 60;

const RESERVED_PREFIX: &str = "branch_";

/// Normalizes a free-form ref name into `[a-z0-9_]*`.
///
/// Path separators and hyphens become underscores, everything else outside
/// `[A-Za-z0-9_]` is dropped. The result may be empty.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '/' | '\\' | '-' => '_',
            c => c,
        })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .map(|c| c.to_ascii_lowercase())
        .take(MAX_SANITIZED_LEN)
        .collect()
}

/// The namespace owned by a pull request.
#[must_use]
pub fn for_pull_request(number: u64) -> NamespaceIdentifier {
    NamespaceIdentifier::new_unchecked(format!("pr_{number}"))
}

/// Resolves the namespace and reports which signal decided it.
pub fn explain(signals: &EnvironmentSignals) -> Resolution {
    if let Some(value) = signals.override_value() {
        return Resolution {
            namespace: NamespaceIdentifier::new_unchecked(value),
            source: SignalKind::Override,
        };
    }

    if let Some(number) = signals.pull_request_number() {
        return Resolution {
            namespace: for_pull_request(number),
            source: SignalKind::PullRequest,
        };
    }

    if let Some(branch) = signals.branch_value() {
        if let Some(namespace) = from_branch(branch) {
            return Resolution {
                namespace,
                source: SignalKind::Branch,
            };
        }
        tracing::warn!("Branch '{branch}' has no usable characters, using default schema");
    }

    Resolution {
        namespace: NamespaceIdentifier::default_namespace(),
        source: SignalKind::Default,
    }
}

/// Resolves the namespace for the given signals. Never fails.
pub fn resolve(signals: &EnvironmentSignals) -> NamespaceIdentifier {
    explain(signals).namespace
}

fn from_branch(branch: &str) -> Option<NamespaceIdentifier> {
    let name = sanitize(branch);
    if name.is_empty() {
        return None;
    }
    if is_reserved(&name) {
        let prefixed: String = format!("{RESERVED_PREFIX}{name}")
            .chars()
            .take(MAX_SANITIZED_LEN)
            .collect();
        return Some(NamespaceIdentifier::new_unchecked(prefixed));
    }
    Some(NamespaceIdentifier::new_unchecked(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(
        override_schema: Option<&str>,
        pull_request: Option<&str>,
        branch: Option<&str>,
    ) -> EnvironmentSignals {
        EnvironmentSignals {
            override_schema: override_schema.map(String::from),
            pull_request: pull_request.map(String::from),
            branch: branch.map(String::from),
        }
    }

    #[test]
    fn test_override_wins() {
        let s = signals(Some("public"), Some("42"), Some("feature/x"));
        let resolution = explain(&s);
        assert_eq!(resolution.namespace.as_str(), "public");
        assert_eq!(resolution.source, SignalKind::Override);
    }

    #[test]
    fn test_override_is_verbatim() {
        let s = signals(Some("Shared-Staging"), None, None);
        assert_eq!(resolve(&s).as_str(), "Shared-Staging");
    }

    #[test]
    fn test_pull_request_beats_branch() {
        let s = signals(None, Some("42"), Some("feature/x"));
        let resolution = explain(&s);
        assert_eq!(resolution.namespace.as_str(), "pr_42");
        assert_eq!(resolution.source, SignalKind::PullRequest);
    }

    #[test]
    fn test_branch_is_sanitized() {
        let s = signals(None, None, Some("Feature/Add-Auth!!"));
        assert_eq!(resolve(&s).as_str(), "feature_add_auth");
        assert_eq!(resolve(&signals(None, None, Some("feature/auth"))).as_str(), "feature_auth");
    }

    #[test]
    fn test_no_signals_is_default() {
        let resolution = explain(&EnvironmentSignals::default());
        assert_eq!(resolution.namespace.as_str(), "public");
        assert_eq!(resolution.source, SignalKind::Default);
    }

    #[test]
    fn test_unusable_branch_falls_back_to_default() {
        let s = signals(None, None, Some("!!!/@@@"));
        let resolution = explain(&s);
        assert_eq!(resolution.namespace.as_str(), "public");
        assert_eq!(resolution.source, SignalKind::Default);
    }

    #[test]
    fn test_empty_pull_request_falls_through() {
        let s = signals(Some(""), Some(""), Some("main"));
        assert_eq!(resolve(&s).as_str(), "main");
    }

    #[test]
    fn test_non_numeric_pull_request_falls_through() {
        let s = signals(None, Some("abc"), Some("main"));
        assert_eq!(resolve(&s).as_str(), "main");
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "a".repeat(100);
        assert_eq!(sanitize(&long).len(), MAX_SANITIZED_LEN);
    }

    #[test]
    fn test_sanitize_drops_non_ascii() {
        assert_eq!(sanitize("fix/ünïcode-bug"), "fix_ncode_bug");
    }

    #[test]
    fn test_reserved_branch_names_are_prefixed() {
        assert_eq!(
            resolve(&signals(None, None, Some("pg_catalog"))).as_str(),
            "branch_pg_catalog"
        );
        assert_eq!(
            resolve(&signals(None, None, Some("information-schema"))).as_str(),
            "branch_information_schema"
        );
        let long = format!("pg_{}", "x".repeat(80));
        let resolved = resolve(&signals(None, None, Some(&long)));
        assert_eq!(resolved.as_str().len(), MAX_SANITIZED_LEN);
        assert!(resolved.validate().is_ok());
    }

    #[test]
    fn test_for_pull_request_matches_resolution() {
        let s = signals(None, Some("7"), None);
        assert_eq!(resolve(&s), for_pull_request(7));
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn test_override_always_returned_unchanged(
            value in "[A-Za-z0-9_ -]{0,20}[A-Za-z0-9_]",
            pr in proptest::option::of(0u64..100_000),
            branch in proptest::option::of(".{0,30}"),
        ) {
            let signals = EnvironmentSignals {
                override_schema: Some(value.clone()),
                pull_request: pr.map(|n| n.to_string()),
                branch,
            };
            let resolved = resolve(&signals);
            prop_assert_eq!(resolved.as_str(), value.as_str());
        }

        #[test]
        fn test_pull_request_always_formatted(
            pr in 0u64..u64::MAX,
            branch in proptest::option::of(".{0,30}"),
        ) {
            let signals = EnvironmentSignals {
                override_schema: None,
                pull_request: Some(pr.to_string()),
                branch,
            };
            let resolved = resolve(&signals);
            prop_assert_eq!(resolved.as_str(), format!("pr_{pr}"));
        }

        #[test]
        fn test_disallowed_only_branch_resolves_to_default(branch in "[!@#$%^&*(). ]{1,30}") {
            let signals = EnvironmentSignals::default().with_branch(branch);
            let resolved = resolve(&signals);
            prop_assert_eq!(resolved.as_str(), "public");
        }

        #[test]
        fn test_sanitize_is_idempotent(branch in ".{0,80}") {
            let once = sanitize(&branch);
            prop_assert_eq!(sanitize(&once), once.clone());
        }

        #[test]
        fn test_resolved_branch_is_valid(branch in "[A-Za-z0-9/_-]{1,80}") {
            let signals = EnvironmentSignals::default().with_branch(branch);
            let namespace = resolve(&signals);
            prop_assert!(namespace.validate().is_ok(), "invalid: {}", namespace);
            prop_assert!(namespace.as_str().len() <= MAX_SANITIZED_LEN);
        }
    }
}
