//! Eager initialization pass.

use std::cmp::Reverse;

use crate::constraint::{Marker, Verdict};
use crate::context::Context;
use crate::error::DiError;
use crate::key::BindingKey;

/// Why an eager definition was not built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A constraint rejected it
    Rejected(Marker),
    /// One of its markers has no registered constraint
    Unregistered(Marker),
    /// Neither `SINGLETON` nor `RETAIN`; nothing would keep the instance
    NotRetained,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub key: BindingKey,
    pub reason: SkipReason,
}

/// Outcome of [`Context::initialize`], in construction order.
#[derive(Debug, Default)]
pub struct EagerReport {
    pub constructed: Vec<BindingKey>,
    pub skipped: Vec<Skipped>,
    pub failed: Vec<(BindingKey, DiError)>,
}

impl EagerReport {
    /// True when nothing failed. Skips do not count as failures.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.constructed.len() + self.skipped.len() + self.failed.len()
    }
}

/// Builds the eager definitions bound directly in `scope`, highest order
/// first. Ties keep binding order. Skipped definitions stay resolvable on
/// demand.
pub(crate) fn run(scope: &Context) -> EagerReport {
    let mut eager: Vec<_> = scope
        .local()
        .nodes()
        .into_iter()
        .filter(|node| node.definition().is_eager())
        .collect();
    eager.sort_by_key(|node| Reverse(node.definition().order()));

    let constraints = scope.settings().constraints();
    let mut report = EagerReport::default();

    for node in eager {
        let key = node.key().clone();
        let definition = node.definition();

        let reason = match constraints.evaluate(definition) {
            Verdict::Pass if definition.flags().is_retained() => None,
            Verdict::Pass => Some(SkipReason::NotRetained),
            Verdict::Rejected(marker) => Some(SkipReason::Rejected(marker)),
            Verdict::Unregistered(marker) => Some(SkipReason::Unregistered(marker)),
        };
        if let Some(reason) = reason {
            tracing::debug!(key = %key, ?reason, "eager construction skipped");
            report.skipped.push(Skipped { key, reason });
            continue;
        }

        match scope.instance_for(&node) {
            Ok(_) => report.constructed.push(key),
            Err(error) => {
                tracing::warn!(key = %key, %error, "eager construction failed");
                report.failed.push((key, error));
            }
        }
    }

    tracing::debug!(
        scope = %scope.path(),
        constructed = report.constructed.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "eager pass finished"
    );
    report
}
