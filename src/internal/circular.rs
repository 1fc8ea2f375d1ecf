//! Circular dependency detection infrastructure.

use std::cell::RefCell;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::error::{DiError, DiResult};
use crate::graph::NodeId;
use crate::internal::FastMap;

// Thread-local construction stack, one frame per component being built
thread_local! {
    static RESOLUTION_TLS: RefCell<ResolutionTls> = RefCell::new(ResolutionTls::default());
}

#[derive(Default)]
struct ResolutionTls {
    stack: Vec<(NodeId, String)>,
}

/// Guard for one frame of the thread-local construction stack.
///
/// Frames are keyed by component node rather than by binding key: a child
/// scope may legitimately bind a key that its parent also binds.
pub(crate) struct StackGuard {
    node: NodeId,
}

impl StackGuard {
    pub(crate) fn enter(node: NodeId, name: String, max_depth: usize) -> DiResult<Self> {
        RESOLUTION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();

            // Circular detection BEFORE pushing the new frame
            if let Some(pos) = tls.stack.iter().position(|(id, _)| *id == node) {
                let mut path: Vec<String> =
                    tls.stack[pos..].iter().map(|(_, n)| n.clone()).collect();
                path.push(name);
                return Err(DiError::Circular(path));
            }

            if tls.stack.len() >= max_depth {
                return Err(DiError::DepthExceeded(tls.stack.len()));
            }

            tls.stack.push((node, name));
            Ok(Self { node })
        })
    }

    /// Current depth of the construction stack on this thread.
    #[cfg(test)]
    pub(crate) fn depth() -> usize {
        RESOLUTION_TLS.with(|tls| tls.borrow().stack.len())
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        RESOLUTION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();
            if let Some((last, _)) = tls.stack.pop() {
                debug_assert_eq!(last, self.node);
            }
        });
    }
}

/// Tree-wide record of compute-once builds in flight.
///
/// The thread-local stack only sees cycles closed on one thread. When two
/// threads each build one singleton of a cycle, each ends up waiting on the
/// other's slot. Every wait is recorded here first, and a wait that would
/// close a cycle of owners and waiters fails instead of blocking.
#[derive(Default)]
pub(crate) struct BuildTracker {
    state: Mutex<Builds>,
}

#[derive(Default)]
struct Builds {
    owners: FastMap<NodeId, ThreadId>,
    waiting: FastMap<ThreadId, (NodeId, String)>,
}

impl BuildTracker {
    /// Records that this thread is about to wait for the build of `node`.
    pub(crate) fn wait(&self, node: NodeId, name: &str) -> DiResult<WaitGuard<'_>> {
        let me = thread::current().id();
        let mut builds = self.state.lock();

        let mut path = vec![name.to_string()];
        let mut next = node;
        for _ in 0..=builds.owners.len() {
            let Some(owner) = builds.owners.get(&next) else {
                break;
            };
            if *owner == me {
                path.push(name.to_string());
                return Err(DiError::Circular(path));
            }
            let Some((blocked_on, blocked_name)) = builds.waiting.get(owner) else {
                break;
            };
            path.push(blocked_name.clone());
            next = *blocked_on;
        }

        builds.waiting.insert(me, (node, name.to_string()));
        Ok(WaitGuard { tracker: self, thread: me })
    }

    /// Records that this thread is now building `node`.
    pub(crate) fn own(&self, node: NodeId) -> OwnGuard<'_> {
        let me = thread::current().id();
        let mut builds = self.state.lock();
        builds.waiting.remove(&me);
        builds.owners.insert(node, me);
        OwnGuard { tracker: self, node }
    }

    #[cfg(test)]
    fn in_flight(&self) -> (usize, usize) {
        let builds = self.state.lock();
        (builds.owners.len(), builds.waiting.len())
    }
}

pub(crate) struct WaitGuard<'a> {
    tracker: &'a BuildTracker,
    thread: ThreadId,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.tracker.state.lock().waiting.remove(&self.thread);
    }
}

pub(crate) struct OwnGuard<'a> {
    tracker: &'a BuildTracker,
    node: NodeId,
}

impl Drop for OwnGuard<'_> {
    fn drop(&mut self) {
        self.tracker.state.lock().owners.remove(&self.node);
    }
}
