// Path: crates/syncreg/src/notifier.rs

//! Change notification for downstream cache invalidation.

use std::fmt;
use tokio::sync::broadcast;

/// Receives a callback whenever registry coverage changes.
///
/// Called after the registry lock has been released, with at least one of
/// the two flags set. Implementations must not block.
pub trait ChangeNotifier: Send + Sync {
    fn on_coverage_changed(&self, more_synchronized: bool, less_synchronized: bool);
}

/// A single coverage change, as published by [`BroadcastNotifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverageChange {
    pub more_synchronized: bool,
    pub less_synchronized: bool,
}

impl CoverageChange {
    pub const MORE: Self = Self {
        more_synchronized: true,
        less_synchronized: false,
    };
    pub const LESS: Self = Self {
        more_synchronized: false,
        less_synchronized: true,
    };
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NopNotifier;

impl ChangeNotifier for NopNotifier {
    fn on_coverage_changed(&self, _more_synchronized: bool, _less_synchronized: bool) {}
}

/// Adapts a closure into a [`ChangeNotifier`].
pub struct FnNotifier<F>(pub F);

impl<F> ChangeNotifier for FnNotifier<F>
where
    F: Fn(bool, bool) + Send + Sync,
{
    fn on_coverage_changed(&self, more_synchronized: bool, less_synchronized: bool) {
        (self.0)(more_synchronized, less_synchronized)
    }
}

impl<F> fmt::Debug for FnNotifier<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnNotifier")
    }
}

/// Publishes every change on a `tokio::sync::broadcast` channel.
///
/// Lagging receivers lose the oldest events; publishing with no receivers is
/// not an error.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<CoverageChange>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoverageChange> {
        self.tx.subscribe()
    }
}

impl ChangeNotifier for BroadcastNotifier {
    fn on_coverage_changed(&self, more_synchronized: bool, less_synchronized: bool) {
        let change = CoverageChange {
            more_synchronized,
            less_synchronized,
        };
        if self.tx.send(change).is_err() {
            tracing::trace!(target: "syncreg", ?change, "no coverage subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn fn_notifier_forwards_flags() {
        let more = Arc::new(AtomicUsize::new(0));
        let seen = more.clone();
        let notifier = FnNotifier(move |m: bool, _l: bool| {
            if m {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });
        notifier.on_coverage_changed(true, false);
        notifier.on_coverage_changed(false, true);
        assert_eq!(more.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn broadcast_delivers_to_subscribers() {
        let notifier = BroadcastNotifier::new(4);
        // no subscribers yet
        notifier.on_coverage_changed(true, false);

        let mut rx = notifier.subscribe();
        notifier.on_coverage_changed(false, true);
        notifier.on_coverage_changed(true, false);
        assert_eq!(rx.recv().await.unwrap(), CoverageChange::LESS);
        assert_eq!(rx.recv().await.unwrap(), CoverageChange::MORE);
    }
}
