//! Span helpers for process and per-run context.
//!
//! # Design
//! - The process span names the command being served and the build.
//! - Every job run opens its own span keyed by tenant and run id, so process
//!   log lines emitted during a run can be correlated with the tenant log.

use tracing::Span;
use tracing::span::EnteredSpan;

use crate::init::build_sha;

/// Keeps the process span entered until dropped.
pub struct GlobalContextGuard {
    _entered: EnteredSpan,
}

impl GlobalContextGuard {
    /// Enter a `skiff` span labelled with the command and build.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        let span = tracing::info_span!("skiff", command = %command, build = %build_sha());
        Self {
            _entered: span.entered(),
        }
    }
}

/// Span covering one tenant job run.
#[must_use]
pub fn run_span(tenant: &str, run_id: &str) -> Span {
    tracing::info_span!("job_run", tenant = %tenant, run_id = %run_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_exits_span_on_drop() {
        let guard = GlobalContextGuard::new("serve");
        drop(guard);
        let span = run_span("acme", "0b7c");
        span.in_scope(|| tracing::debug!("inside run"));
    }
}
