// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Trace session metrics.
//!
//! [`SessionMetrics`] counts what the classifier did with each callable and
//! how precision scopes were used, so a session can report how much of a
//! program actually went through conversion.

use dy2static::Outcome;
use std::collections::BTreeMap;

/// Aggregate counters for one trace session.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SessionMetrics {
    /// Classification outcomes keyed by [`Outcome::label`].
    pub outcomes: BTreeMap<String, u64>,
    /// Callables rejected as unclassifiable or failed by the backend.
    pub classify_errors: u64,
    /// Precision scopes successfully entered.
    pub scopes_entered: u64,
    /// Scope entries rejected for invalid options.
    pub scopes_rejected: u64,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_outcome(&mut self, outcome: &Outcome) {
        *self.outcomes.entry(outcome.label()).or_insert(0) += 1;
    }

    pub fn record_classify_error(&mut self) {
        self.classify_errors += 1;
    }

    pub fn record_scope(&mut self, accepted: bool) {
        if accepted {
            self.scopes_entered += 1;
        } else {
            self.scopes_rejected += 1;
        }
    }

    /// Total callables seen, including failures.
    pub fn calls_seen(&self) -> u64 {
        self.outcomes.values().sum::<u64>() + self.classify_errors
    }

    /// Count for one outcome label, 0 if never seen.
    pub fn count(&self, label: &str) -> u64 {
        self.outcomes.get(label).copied().unwrap_or(0)
    }

    /// Callables actually rewritten: converted, bound, wrapped or substituted.
    pub fn rewritten(&self) -> u64 {
        self.outcomes
            .iter()
            .filter(|(label, _)| {
                label.starts_with("substituted.")
                    || matches!(
                        label.as_str(),
                        "converted" | "bound_converted" | "layer_forward_converted"
                    )
            })
            .map(|(_, n)| n)
            .sum()
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let fallbacks: u64 = self
            .outcomes
            .iter()
            .filter(|(label, _)| label.starts_with("fallback."))
            .map(|(_, n)| n)
            .sum();
        format!(
            "Trace: {} callables ({} rewritten, {} fallbacks, {} errors), \
             {} precision scopes ({} rejected)",
            self.calls_seen(),
            self.rewritten(),
            fallbacks,
            self.classify_errors,
            self.scopes_entered,
            self.scopes_rejected,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dy2static::{BuiltinSubstitute, FallbackReason};

    #[test]
    fn test_empty_metrics() {
        let m = SessionMetrics::new();
        assert_eq!(m.calls_seen(), 0);
        assert_eq!(m.rewritten(), 0);
    }

    #[test]
    fn test_record_outcomes() {
        let mut m = SessionMetrics::new();
        m.record_outcome(&Outcome::Converted);
        m.record_outcome(&Outcome::Converted);
        m.record_outcome(&Outcome::Substituted(BuiltinSubstitute::Len));
        m.record_outcome(&Outcome::Fallback(FallbackReason::Generator));
        m.record_outcome(&Outcome::OptedOut);
        m.record_classify_error();

        assert_eq!(m.count("converted"), 2);
        assert_eq!(m.count("substituted.len"), 1);
        assert_eq!(m.count("fallback.generator"), 1);
        assert_eq!(m.calls_seen(), 6);
        assert_eq!(m.rewritten(), 3);
    }

    #[test]
    fn test_summary_format() {
        let mut m = SessionMetrics::new();
        m.record_outcome(&Outcome::BoundConverted);
        m.record_outcome(&Outcome::Fallback(FallbackReason::SourceUnavailable));
        m.record_scope(true);
        m.record_scope(false);

        let s = m.summary();
        assert!(s.contains("2 callables"));
        assert!(s.contains("1 rewritten"));
        assert!(s.contains("1 fallbacks"));
        assert!(s.contains("1 precision scopes (1 rejected)"));
    }
}
