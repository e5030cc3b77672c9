//! Application settings stored in the index.

use crate::index::{IndexResult, IndexStore};
use log::info;

pub struct SettingsService<'a> {
    store: &'a mut IndexStore,
}

impl<'a> SettingsService<'a> {
    pub fn new(store: &'a mut IndexStore) -> Self {
        Self { store }
    }

    /// Stores the model API key; blank input clears it.
    ///
    /// Returns whether a key is configured afterwards.
    pub fn set_api_key(&mut self, key: &str) -> IndexResult<bool> {
        let key = Some(key.trim().to_string()).filter(|key| !key.is_empty());
        let configured = key.is_some();
        if self.store.index().api_key == key {
            return Ok(configured);
        }
        self.store.mutate(|index| index.api_key = key)?;
        info!(
            "event=settings_api_key module=settings status=ok configured={}",
            configured
        );
        Ok(configured)
    }

    pub fn api_key(&self) -> Option<String> {
        self.store.index().api_key.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::SettingsService;
    use crate::index::IndexStore;

    #[test]
    fn api_key_is_trimmed_and_blank_clears() {
        let mut store = IndexStore::in_memory();
        let mut settings = SettingsService::new(&mut store);
        assert!(settings.set_api_key("  secret  ").expect("set"));
        assert_eq!(settings.api_key().as_deref(), Some("secret"));
        assert!(!settings.set_api_key(" ").expect("clear"));
        assert_eq!(settings.api_key(), None);
    }
}
