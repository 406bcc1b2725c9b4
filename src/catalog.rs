//! Registered remote resources, keyed by logical name.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::{LoadError, LoadResult};

/// One remote JSON document and the storage key it is cached under.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceDescriptor {
  pub key: String,
  pub url: String,
}

impl ResourceDescriptor {
  pub fn new(key: impl Into<String>, url: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      url: url.into(),
    }
  }
}

/// Immutable set of resources a loader can serve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
  resources: BTreeMap<String, ResourceDescriptor>,
  default_resource: Option<String>,
}

impl Catalog {
  pub fn new(resources: BTreeMap<String, ResourceDescriptor>) -> Self {
    Self {
      resources,
      default_resource: None,
    }
  }

  /// A catalog serving exactly one resource, which is also the default.
  pub fn single(name: impl Into<String>, descriptor: ResourceDescriptor) -> Self {
    let name = name.into();
    let mut resources = BTreeMap::new();
    resources.insert(name.clone(), descriptor);
    Self {
      resources,
      default_resource: Some(name),
    }
  }

  /// Set the resource used when a caller names none.
  pub fn with_default(mut self, name: impl Into<String>) -> Self {
    self.default_resource = Some(name.into());
    self
  }

  /// Look up a resource by logical name.
  pub fn resolve(&self, name: &str) -> LoadResult<&ResourceDescriptor> {
    self
      .resources
      .get(name)
      .ok_or_else(|| LoadError::UnknownResource(name.to_string()))
  }

  /// The resource used when none is named: the configured default, or the
  /// only registered resource.
  pub fn default_name(&self) -> Option<&str> {
    if let Some(name) = self.default_resource.as_deref() {
      return Some(name);
    }
    match self.resources.len() {
      1 => self.resources.keys().next().map(String::as_str),
      _ => None,
    }
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &ResourceDescriptor)> {
    self.resources.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn len(&self) -> usize {
    self.resources.len()
  }

  pub fn is_empty(&self) -> bool {
    self.resources.is_empty()
  }
}
