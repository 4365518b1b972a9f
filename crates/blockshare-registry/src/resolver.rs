//! Name resolution for grantee input.

use std::collections::HashMap;

use async_trait::async_trait;

use blockshare_core::{Address, DriveError, NameResolver};

/// Fixed name table, loaded from configuration.
///
/// Lookups are case-insensitive.
#[derive(Debug, Default, Clone)]
pub struct StaticNameResolver {
    names: HashMap<String, Address>,
}

impl StaticNameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, address: Address) -> Self {
        self.insert(name, address);
        self
    }

    pub fn insert(&mut self, name: &str, address: Address) {
        self.names.insert(name.to_ascii_lowercase(), address);
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<(String, Address)> for StaticNameResolver {
    fn from_iter<T: IntoIterator<Item = (String, Address)>>(iter: T) -> Self {
        let mut resolver = Self::new();
        for (name, address) in iter {
            resolver.insert(&name, address);
        }
        resolver
    }
}

#[async_trait]
impl NameResolver for StaticNameResolver {
    async fn resolve(&self, name: &str) -> Result<Option<Address>, DriveError> {
        Ok(self.names.get(&name.trim().to_ascii_lowercase()).copied())
    }
}
