use crate::definition::{Dependencies, Dependency};

/// An externally built object whose dependency slots a scope can fill.
///
/// Injection is best-effort: a slot that cannot be resolved is handed over
/// as unavailable and the target decides what that means.
///
/// ```rust
/// use ferrous_context::{Context, Dependencies, Dependency, Implementation, Injectable};
/// use std::sync::Arc;
///
/// struct Config { name: String }
///
/// #[derive(Default)]
/// struct Handler {
///     config: Option<Arc<Config>>,
///     port: Option<Arc<u16>>,
/// }
///
/// impl Injectable for Handler {
///     fn dependencies(&self) -> Vec<Dependency> {
///         vec![Dependency::on::<Config>(), Dependency::on::<u16>()]
///     }
///
///     fn inject(&mut self, values: &Dependencies) {
///         self.config = values.get::<Config>(0);
///         self.port = values.get::<u16>(1);
///     }
/// }
///
/// let root = Context::root();
/// root.bind::<Config>(Implementation::from_fn(|_| Ok(Arc::new(Config { name: "svc".into() }))));
///
/// let mut handler = Handler::default();
/// assert_eq!(root.inject(&mut handler), 1);
/// assert_eq!(handler.config.unwrap().name, "svc");
/// assert!(handler.port.is_none());
/// ```
pub trait Injectable {
    /// Declared slots, in the order `inject` receives them.
    fn dependencies(&self) -> Vec<Dependency>;

    fn inject(&mut self, values: &Dependencies);
}
