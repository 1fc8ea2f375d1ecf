//! Lifecycle flags and initialization strategy.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bitfield controlling how instances of a definition are built and kept.
///
/// - **SINGLETON**: one instance per owning scope, built once even under contention
/// - **RETAIN**: the built instance is stored and reused (first stored wins)
/// - **DISPOSE**: always a fresh instance, never stored; overrides the two above
/// - **LIMIT**: caps the number of live instances produced by the definition
/// - no flags: transient, a fresh instance per call
///
/// The `LIM_*` modifiers are carried along with `LIMIT` for tooling but are
/// not interpreted by the resolver.
///
/// # Examples
///
/// ```rust
/// use ferrous_context::LifecycleFlags;
///
/// let flags = LifecycleFlags::SINGLETON | LifecycleFlags::RETAIN;
/// assert!(flags.is_retained());
/// assert!(!flags.is_disposable());
///
/// let fresh = flags | LifecycleFlags::DISPOSE;
/// assert!(!fresh.is_retained());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LifecycleFlags(u32);

impl LifecycleFlags {
    pub const NONE: LifecycleFlags = LifecycleFlags(0);
    pub const SINGLETON: LifecycleFlags = LifecycleFlags(1 << 0);
    pub const LIMIT: LifecycleFlags = LifecycleFlags(1 << 1);
    pub const DISPOSE: LifecycleFlags = LifecycleFlags(1 << 2);
    pub const RETAIN: LifecycleFlags = LifecycleFlags(1 << 3);

    pub const LIM_PUSH: LifecycleFlags = LifecycleFlags(1 << 4);
    pub const LIM_DROP: LifecycleFlags = LifecycleFlags(1 << 5);
    pub const LIM_LAST: LifecycleFlags = LifecycleFlags(1 << 6);
    pub const LIM_FRONT: LifecycleFlags = LifecycleFlags(1 << 7);
    pub const LIM_REL: LifecycleFlags = LifecycleFlags(1 << 8);

    const NAMES: [(LifecycleFlags, &'static str); 9] = [
        (Self::SINGLETON, "SINGLETON"),
        (Self::LIMIT, "LIMIT"),
        (Self::DISPOSE, "DISPOSE"),
        (Self::RETAIN, "RETAIN"),
        (Self::LIM_PUSH, "LIM_PUSH"),
        (Self::LIM_DROP, "LIM_DROP"),
        (Self::LIM_LAST, "LIM_LAST"),
        (Self::LIM_FRONT, "LIM_FRONT"),
        (Self::LIM_REL, "LIM_REL"),
    ];

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Keeps only known bits.
    pub const fn from_bits_truncate(bits: u32) -> Self {
        LifecycleFlags(bits & 0x1ff)
    }

    pub const fn contains(self, other: LifecycleFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn is_singleton(self) -> bool {
        self.contains(Self::SINGLETON) && !self.is_disposable()
    }

    #[inline]
    pub fn is_disposable(self) -> bool {
        self.contains(Self::DISPOSE)
    }

    #[inline]
    pub fn is_limited(self) -> bool {
        self.contains(Self::LIMIT)
    }

    /// True when built instances end up in the instance store.
    #[inline]
    pub fn is_retained(self) -> bool {
        !self.is_disposable() && (self.contains(Self::SINGLETON) || self.contains(Self::RETAIN))
    }

    /// Names of the set bits, in bit order.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl BitOr for LifecycleFlags {
    type Output = LifecycleFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        LifecycleFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for LifecycleFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for LifecycleFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("LifecycleFlags(TRANSIENT)");
        }
        write!(f, "LifecycleFlags({})", self.names().join(" | "))
    }
}

/// When a definition is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "graph-export", derive(serde::Serialize))]
pub enum InitializationStrategy {
    /// On first use
    #[default]
    Lazy,
    /// During the scope's eager-initialization pass
    Eager,
}
