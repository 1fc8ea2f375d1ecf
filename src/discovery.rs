//! Batches of definitions handed over by a discovery source.

use crate::definition::{ComponentDefinition, FactoryDescriptor, Implementation};

/// Source of component definitions, such as a plugin scan or a static
/// registry. Called once per import.
pub trait Discovery {
    fn discover(&self) -> DefinitionBatch;
}

/// Ordered set of definitions imported into a scope in one go.
///
/// ```rust
/// use ferrous_context::{Context, DefinitionBatch, Implementation, Resolver};
/// use std::sync::Arc;
///
/// struct Clock;
/// struct Config { retries: u8 }
///
/// let mut batch = DefinitionBatch::new();
/// batch
///     .add_singleton::<Config>(Implementation::from_fn(|_| Ok(Arc::new(Config { retries: 3 }))))
///     .add_transient::<Clock>(Implementation::from_fn(|_| Ok(Arc::new(Clock))));
/// assert_eq!(batch.len(), 2);
///
/// let root = Context::root();
/// root.import(batch);
/// assert_eq!(root.get_required::<Config>().unwrap().retries, 3);
/// ```
#[derive(Debug, Default)]
pub struct DefinitionBatch {
    definitions: Vec<ComponentDefinition>,
}

impl DefinitionBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, definition: ComponentDefinition) -> &mut Self {
        self.definitions.push(definition);
        self
    }

    pub fn add_singleton<T>(&mut self, implementation: Implementation<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.add(ComponentDefinition::builder::<T>().implementation(implementation).singleton().build())
    }

    pub fn add_transient<T>(&mut self, implementation: Implementation<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.add(ComponentDefinition::builder::<T>().implementation(implementation).build())
    }

    pub fn add_factory<T>(&mut self, factory: FactoryDescriptor<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.add(ComponentDefinition::builder::<T>().factory(factory).build())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn definitions(&self) -> &[ComponentDefinition] {
        &self.definitions
    }

    pub fn into_definitions(self) -> Vec<ComponentDefinition> {
        self.definitions
    }
}

impl FromIterator<ComponentDefinition> for DefinitionBatch {
    fn from_iter<I: IntoIterator<Item = ComponentDefinition>>(iter: I) -> Self {
        Self {
            definitions: iter.into_iter().collect(),
        }
    }
}

impl Extend<ComponentDefinition> for DefinitionBatch {
    fn extend<I: IntoIterator<Item = ComponentDefinition>>(&mut self, iter: I) {
        self.definitions.extend(iter);
    }
}
