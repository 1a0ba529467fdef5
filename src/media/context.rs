//! Resolution of context references to externally owned entities.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::StoreError;

/// Trait for checking that a context entity exists.
#[async_trait]
pub trait ContextResolver: Send + Sync {
    /// Classes media may be attached to.
    fn allowed_classes(&self) -> &[String];

    /// Whether the entity `class#id` exists.
    async fn exists(&self, class: &str, id: u64) -> Result<bool, StoreError>;

    fn is_allowed(&self, class: &str) -> bool {
        self.allowed_classes().iter().any(|c| c == class)
    }
}

/// Resolver that accepts any identifier of an allowed class.
///
/// Used when the owning entities live in another system and the media server
/// has no way to look them up.
#[derive(Debug, Clone, Default)]
pub struct AllowListContexts {
    classes: Vec<String>,
}

impl AllowListContexts {
    pub fn new(classes: Vec<String>) -> Self {
        Self { classes }
    }
}

#[async_trait]
impl ContextResolver for AllowListContexts {
    fn allowed_classes(&self) -> &[String] {
        &self.classes
    }

    async fn exists(&self, class: &str, _id: u64) -> Result<bool, StoreError> {
        Ok(self.is_allowed(class))
    }
}

/// Resolver over an explicit set of known entities.
#[derive(Debug, Clone, Default)]
pub struct KnownContexts {
    classes: Vec<String>,
    entities: HashSet<(String, u64)>,
}

impl KnownContexts {
    pub fn new(classes: Vec<String>) -> Self {
        Self {
            classes,
            entities: HashSet::new(),
        }
    }

    pub fn with_entity(mut self, class: impl Into<String>, id: u64) -> Self {
        self.entities.insert((class.into(), id));
        self
    }
}

#[async_trait]
impl ContextResolver for KnownContexts {
    fn allowed_classes(&self) -> &[String] {
        &self.classes
    }

    async fn exists(&self, class: &str, id: u64) -> Result<bool, StoreError> {
        Ok(self.entities.contains(&(class.to_string(), id)))
    }
}
