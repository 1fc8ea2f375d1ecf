//! Error types for the context tree.

use std::fmt;

/// Resolution and construction errors
///
/// Lookups that may legitimately find nothing report an empty result
/// instead of an error; these variants cover the cases that are failures
/// of a single resolution call. None of them leave the binding tables or
/// the resolution cache in a modified state.
///
/// # Examples
///
/// ```rust
/// use ferrous_context::{Context, DiError, Resolver};
///
/// let root = Context::root();
/// match root.get_required::<String>() {
///     Err(DiError::NotFound(name)) => assert!(name.contains("String")),
///     _ => unreachable!(),
/// }
/// ```
///
/// ```rust
/// use ferrous_context::DiError;
///
/// let circular = DiError::Circular(vec!["A".into(), "B".into(), "A".into()]);
/// assert_eq!(circular.to_string(), "Circular dependency: A -> B -> A");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiError {
    /// Nothing reachable is bound to the requested key
    NotFound(String),
    /// Stored instance does not have the requested type
    TypeMismatch(&'static str),
    /// A required, non-lazy dependency is not resolvable right now
    MissingDependency {
        component: String,
        dependency: String,
    },
    /// The producer or factory failed, or the definition cannot produce at all
    Construction {
        component: String,
        reason: String,
    },
    /// Circular dependency detected (includes path)
    Circular(Vec<String>),
    /// Maximum resolution depth exceeded
    DepthExceeded(usize),
    /// A `LIMIT` definition already has its cap of live instances
    LimitExceeded {
        component: String,
        limit: usize,
    },
    /// The scope owning a located definition has been torn down
    ScopeDropped(String),
}

impl DiError {
    /// Builds a construction failure from any displayable cause.
    pub fn construction(component: impl Into<String>, reason: impl fmt::Display) -> Self {
        DiError::Construction {
            component: component.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors raised while building an instance, as opposed to lookup misses.
    pub fn is_construction_failure(&self) -> bool {
        matches!(
            self,
            DiError::MissingDependency { .. }
                | DiError::Construction { .. }
                | DiError::Circular(_)
                | DiError::DepthExceeded(_)
                | DiError::LimitExceeded { .. }
        )
    }
}

impl fmt::Display for DiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiError::NotFound(name) => write!(f, "Binding not found: {}", name),
            DiError::TypeMismatch(name) => write!(f, "Type mismatch for: {}", name),
            DiError::MissingDependency { component, dependency } => {
                write!(f, "Missing dependency {} of {}", dependency, component)
            }
            DiError::Construction { component, reason } => {
                write!(f, "Failed to construct {}: {}", component, reason)
            }
            DiError::Circular(path) => {
                write!(f, "Circular dependency: {}", path.join(" -> "))
            }
            DiError::DepthExceeded(depth) => write!(f, "Max depth {} exceeded", depth),
            DiError::LimitExceeded { component, limit } => {
                write!(f, "Instance limit {} reached for {}", limit, component)
            }
            DiError::ScopeDropped(component) => {
                write!(f, "Owning scope of {} has been torn down", component)
            }
        }
    }
}

impl std::error::Error for DiError {}

/// Result type for context operations
///
/// ```rust
/// use ferrous_context::{DiResult, DiError};
///
/// fn lookup() -> DiResult<u32> {
///     Err(DiError::NotFound("u32".to_string()))
/// }
///
/// assert!(lookup().is_err());
/// ```
pub type DiResult<T> = Result<T, DiError>;
