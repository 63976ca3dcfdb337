use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::RegistryError;

/// Descriptive information about a registered handler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerMetadata {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
}

impl HandlerMetadata {
  pub fn new(description: impl Into<String>) -> Self {
    Self {
      description: Some(description.into()),
      category: None,
    }
  }

  pub fn with_category(mut self, category: impl Into<String>) -> Self {
    self.category = Some(category.into());
    self
  }
}

struct Entry<H: ?Sized> {
  handler: Arc<H>,
  metadata: HandlerMetadata,
}

/// Maps type names to handlers.
///
/// `H` is usually a trait object such as `dyn ActionHandler`. Some type names
/// can be reserved for behaviour the engine implements itself; those are
/// listed by [`Registry::list_types`] but can never be registered.
pub struct Registry<H: ?Sized> {
  entries: RwLock<HashMap<String, Entry<H>>>,
  reserved: HashSet<String>,
}

impl<H: ?Sized> Registry<H> {
  pub fn new() -> Self {
    Self {
      entries: RwLock::new(HashMap::new()),
      reserved: HashSet::new(),
    }
  }

  /// Create a registry where the given type names are reserved.
  pub fn with_reserved<I, S>(reserved: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      entries: RwLock::new(HashMap::new()),
      reserved: reserved.into_iter().map(Into::into).collect(),
    }
  }

  /// Register a handler. Fails if the type is already registered.
  pub fn register(
    &self,
    type_name: impl Into<String>,
    handler: Arc<H>,
    metadata: Option<HandlerMetadata>,
  ) -> Result<(), RegistryError> {
    self.insert(type_name.into(), handler, metadata, false)
  }

  /// Register a handler, optionally overwriting an existing registration.
  ///
  /// With `replace: false` this behaves exactly like [`Registry::register`].
  pub fn register_with(
    &self,
    type_name: impl Into<String>,
    handler: Arc<H>,
    metadata: Option<HandlerMetadata>,
    replace: bool,
  ) -> Result<(), RegistryError> {
    self.insert(type_name.into(), handler, metadata, replace)
  }

  fn insert(
    &self,
    type_name: String,
    handler: Arc<H>,
    metadata: Option<HandlerMetadata>,
    replace: bool,
  ) -> Result<(), RegistryError> {
    if self.reserved.contains(&type_name) {
      return Err(RegistryError::Reserved { type_name });
    }

    let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
    if entries.contains_key(&type_name) {
      if !replace {
        return Err(RegistryError::Duplicate { type_name });
      }
      warn!(type_name = %type_name, "replacing registered handler");
    } else {
      debug!(type_name = %type_name, "handler registered");
    }

    entries.insert(
      type_name,
      Entry {
        handler,
        metadata: metadata.unwrap_or_default(),
      },
    );
    Ok(())
  }

  /// Look up the handler for a type.
  pub fn get(&self, type_name: &str) -> Result<Arc<H>, RegistryError> {
    let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
    entries
      .get(type_name)
      .map(|entry| entry.handler.clone())
      .ok_or_else(|| RegistryError::NotFound {
        type_name: type_name.to_string(),
      })
  }

  pub fn metadata(&self, type_name: &str) -> Option<HandlerMetadata> {
    let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
    entries.get(type_name).map(|entry| entry.metadata.clone())
  }

  pub fn contains(&self, type_name: &str) -> bool {
    let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
    entries.contains_key(type_name)
  }

  pub fn is_reserved(&self, type_name: &str) -> bool {
    self.reserved.contains(type_name)
  }

  /// Remove a registration, returning the handler if one existed.
  pub fn unregister(&self, type_name: &str) -> Option<Arc<H>> {
    let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
    entries.remove(type_name).map(|entry| entry.handler)
  }

  /// Remove every registration. Reserved names stay reserved.
  pub fn clear(&self) {
    let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
    entries.clear();
  }

  /// All known type names, registered and reserved.
  pub fn list_types(&self) -> BTreeSet<String> {
    let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
    entries
      .keys()
      .chain(self.reserved.iter())
      .cloned()
      .collect()
  }
}

impl<H: ?Sized> Default for Registry<H> {
  fn default() -> Self {
    Self::new()
  }
}
