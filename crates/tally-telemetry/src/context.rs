//! Process-wide span for the running command.

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Keeps the command span entered for the lifetime of the guard.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    /// Enter a span tagged with `command` and the recorded build SHA.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        let span: &'static Span = Box::leak(Box::new(
            tracing::info_span!("tally", command = %command, build_sha = %build_sha()),
        ));
        Self {
            _guard: span.enter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_enters_and_leaves_cleanly() {
        let guard = GlobalContextGuard::new("ls");
        drop(guard);
    }
}
