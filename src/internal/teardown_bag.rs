//! Internal bag of teardown hooks.

/// Teardown hooks collected under a lock and run after it is released.
///
/// Hooks run in LIFO order so that instances built later are torn down first.
#[derive(Default)]
pub(crate) struct TeardownBag {
    hooks: Vec<Box<dyn FnOnce() + Send>>,
}

impl TeardownBag {
    pub(crate) fn push(&mut self, f: Box<dyn FnOnce() + Send>) {
        self.hooks.push(f);
    }

    /// Execute all hooks in reverse order (LIFO).
    pub(crate) fn run_all_reverse(&mut self) {
        while let Some(f) = self.hooks.pop() {
            (f)();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.len()
    }
}
