//! Loading manager - registry of named areas
//!
//! Top-level areas are registered by name. Segments below them are reached
//! with slash-separated paths: `"checkout/payment/card"` is the `card`
//! segment of the `payment` segment of the `checkout` area.

use std::collections::BTreeMap;
use std::time::Duration;

use loadstate_area::{LoadingTree, Subscription};
use loadstate_core::{
    validate_name, AreaId, ConfigPatch, LoadingConfig, LoadingError, LoadingResult,
    SetLoadingOptions, Timestamp, PATH_SEPARATOR,
};

use crate::ServiceConfig;

/// Registry of top-level loading areas
#[derive(Debug)]
pub struct LoadingManager {
    tree: LoadingTree,
    areas: BTreeMap<String, AreaId>,
    default_config: LoadingConfig,
}

impl LoadingManager {
    pub fn new() -> Self {
        Self::with_default_config(LoadingConfig::default())
    }

    /// Areas created without a config use `config`
    pub fn with_default_config(config: LoadingConfig) -> Self {
        LoadingManager {
            tree: LoadingTree::new(),
            areas: BTreeMap::new(),
            default_config: config,
        }
    }

    /// Registry with the configured areas already created
    pub fn from_config(config: &ServiceConfig) -> LoadingResult<Self> {
        let mut manager = Self::with_default_config(config.default_area);
        for (name, area) in &config.areas {
            manager.create_area(name, Some(*area))?;
        }
        Ok(manager)
    }

    // ---------------------------------------------------------------------
    // Registry
    // ---------------------------------------------------------------------

    /// Register a top-level area. The name must be usable as the first
    /// component of a path.
    pub fn create_area(&mut self, name: &str, config: Option<LoadingConfig>) -> LoadingResult<AreaId> {
        validate_name(name)?;
        if self.areas.contains_key(name) {
            return Err(LoadingError::DuplicateName(name.to_string()));
        }
        let id = self
            .tree
            .create_root(config.unwrap_or(self.default_config));
        self.areas.insert(name.to_string(), id);
        tracing::debug!(area = name, %id, "area registered");
        Ok(id)
    }

    pub fn remove_area(&mut self, name: &str) -> LoadingResult<()> {
        let id = self
            .areas
            .remove(name)
            .ok_or_else(|| LoadingError::NotFound(name.to_string()))?;
        self.tree.remove_root(id)?;
        tracing::debug!(area = name, %id, "area unregistered");
        Ok(())
    }

    /// Snapshot of the registered areas
    pub fn get_areas(&self) -> BTreeMap<String, AreaId> {
        self.areas.clone()
    }

    pub fn area(&self, name: &str) -> LoadingResult<AreaId> {
        self.areas
            .get(name)
            .copied()
            .ok_or_else(|| LoadingError::NotFound(name.to_string()))
    }

    /// Resolve a slash-separated path to an area
    pub fn resolve(&self, path: &str) -> LoadingResult<AreaId> {
        let mut parts = path.split(PATH_SEPARATOR);
        let root = parts.next().unwrap_or_default();
        let mut id = self.area(root)?;
        for part in parts {
            id = self.tree.child(id, part)?;
        }
        Ok(id)
    }

    // ---------------------------------------------------------------------
    // Facade
    // ---------------------------------------------------------------------

    pub fn get_loading_state(&self, path: &str) -> LoadingResult<bool> {
        self.tree.get_loading(self.resolve(path)?)
    }

    pub fn set_loading_state(
        &mut self,
        path: &str,
        loading: bool,
        options: SetLoadingOptions,
    ) -> LoadingResult<()> {
        let id = self.resolve(path)?;
        self.tree.set_loading(id, loading, options)
    }

    // ---------------------------------------------------------------------
    // Segments, config, subscriptions
    // ---------------------------------------------------------------------

    pub fn add_segment(
        &mut self,
        path: &str,
        name: &str,
        config: Option<LoadingConfig>,
    ) -> LoadingResult<AreaId> {
        let parent = self.resolve(path)?;
        self.tree.add_child(parent, name, config)
    }

    pub fn remove_segment(&mut self, path: &str, name: &str) -> LoadingResult<()> {
        let parent = self.resolve(path)?;
        self.tree.remove_child(parent, name)
    }

    pub fn patch_config(&mut self, path: &str, patch: ConfigPatch) -> LoadingResult<()> {
        let id = self.resolve(path)?;
        self.tree.patch_config(id, patch)
    }

    pub fn subscribe<F>(&self, path: &str, callback: F) -> LoadingResult<Subscription>
    where
        F: FnMut(bool) + Send + 'static,
    {
        let id = self.resolve(path)?;
        self.tree.on_emit(id, callback)
    }

    // ---------------------------------------------------------------------
    // Time
    // ---------------------------------------------------------------------

    pub fn now(&self) -> Timestamp {
        self.tree.now()
    }

    pub fn advance(&mut self, dt: Duration) -> usize {
        self.tree.advance(dt)
    }

    pub fn advance_to(&mut self, target: Timestamp) -> usize {
        self.tree.advance_to(target)
    }

    pub fn next_deadline(&mut self) -> Option<Timestamp> {
        self.tree.next_deadline()
    }

    pub fn tree(&self) -> &LoadingTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut LoadingTree {
        &mut self.tree
    }
}

impl Default for LoadingManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    const TEST_AREA: &str = "testArea";

    fn manager_with(config: LoadingConfig) -> LoadingManager {
        let mut manager = LoadingManager::new();
        manager.create_area(TEST_AREA, Some(config)).unwrap();
        manager
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_initial_state() {
        let manager = manager_with(LoadingConfig::new().with_min_loading_time(ms(1000)));
        assert!(!manager.get_loading_state(TEST_AREA).unwrap());
    }

    #[test]
    fn test_set_without_min_time() {
        let mut manager = manager_with(LoadingConfig::default());
        manager
            .set_loading_state(TEST_AREA, true, SetLoadingOptions::default())
            .unwrap();
        assert!(manager.get_loading_state(TEST_AREA).unwrap());
    }

    #[test]
    fn test_minimum_loading_time() {
        let mut manager = manager_with(LoadingConfig::new().with_min_loading_time(ms(1000)));

        manager
            .set_loading_state(TEST_AREA, true, SetLoadingOptions::default())
            .unwrap();
        manager
            .set_loading_state(TEST_AREA, false, SetLoadingOptions::default())
            .unwrap();
        assert!(manager.get_loading_state(TEST_AREA).unwrap());

        manager.advance(ms(1100));
        assert!(!manager.get_loading_state(TEST_AREA).unwrap());
    }

    #[test]
    fn test_force() {
        let mut manager = manager_with(
            LoadingConfig::new()
                .with_min_loading_time(ms(1000))
                .with_debounce_time(ms(300)),
        );

        manager
            .set_loading_state(TEST_AREA, true, SetLoadingOptions::default())
            .unwrap();
        manager
            .set_loading_state(TEST_AREA, false, SetLoadingOptions::forced())
            .unwrap();
        assert!(!manager.get_loading_state(TEST_AREA).unwrap());
    }

    #[test]
    fn test_duplicate_area() {
        let mut manager = manager_with(LoadingConfig::default());
        assert_eq!(
            manager.create_area(TEST_AREA, None).unwrap_err(),
            LoadingError::DuplicateName(TEST_AREA.into())
        );
    }

    #[test]
    fn test_names_must_be_addressable() {
        let mut manager = LoadingManager::new();
        assert_eq!(
            manager.create_area("checkout/v2", None).unwrap_err(),
            LoadingError::InvalidName("checkout/v2".into())
        );
        assert_eq!(
            manager.create_area("", None).unwrap_err(),
            LoadingError::InvalidName(String::new())
        );
        assert!(manager.get_areas().is_empty());

        // Every listed name resolves through the facade
        manager.create_area("checkout-v2", None).unwrap();
        manager.add_segment("checkout-v2", "card", None).unwrap();
        assert_eq!(
            manager.add_segment("checkout-v2", "card/visa", None).unwrap_err(),
            LoadingError::InvalidName("card/visa".into())
        );
        for name in manager.get_areas().keys() {
            assert!(!manager.get_loading_state(name).unwrap());
            manager
                .set_loading_state(name, true, SetLoadingOptions::default())
                .unwrap();
        }
        assert!(manager.get_loading_state("checkout-v2/card").is_ok());
    }

    #[test]
    fn test_configured_area_with_separator_is_rejected() {
        let config = ServiceConfig::default().with_area("a/b", LoadingConfig::default());
        assert_eq!(
            LoadingManager::from_config(&config).unwrap_err(),
            LoadingError::InvalidName("a/b".into())
        );
    }

    #[test]
    fn test_unknown_area() {
        let mut manager = LoadingManager::new();
        let missing = LoadingError::NotFound("ghost".into());

        assert_eq!(manager.remove_area("ghost").unwrap_err(), missing);
        assert_eq!(manager.get_loading_state("ghost").unwrap_err(), missing);
        assert_eq!(
            manager
                .set_loading_state("ghost", true, SetLoadingOptions::default())
                .unwrap_err(),
            missing
        );
    }

    #[test]
    fn test_remove_area_frees_subtree() {
        let mut manager = manager_with(LoadingConfig::new().with_debounce_time(ms(100)));
        manager.add_segment(TEST_AREA, "inner", None).unwrap();
        manager
            .set_loading_state("testArea/inner", true, SetLoadingOptions::default())
            .unwrap();
        manager
            .set_loading_state("testArea/inner", false, SetLoadingOptions::default())
            .unwrap();

        manager.remove_area(TEST_AREA).unwrap();
        assert!(manager.get_areas().is_empty());
        assert!(manager.tree().is_empty());
        assert_eq!(manager.next_deadline(), None);

        // The name is free again
        manager.create_area(TEST_AREA, None).unwrap();
    }

    #[test]
    fn test_get_areas_is_a_snapshot() {
        let mut manager = manager_with(LoadingConfig::default());
        let snapshot = manager.get_areas();
        manager.create_area("other", None).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(manager.get_areas().len(), 2);
        assert_eq!(snapshot[TEST_AREA], manager.area(TEST_AREA).unwrap());
    }

    #[test]
    fn test_default_config_applies() {
        let default = LoadingConfig::smooth();
        let mut manager = LoadingManager::with_default_config(default);
        let id = manager.create_area("page", None).unwrap();
        assert_eq!(manager.tree().config(id).unwrap(), default);
    }

    #[test]
    fn test_from_config() {
        let config = ServiceConfig::default()
            .with_area("checkout", LoadingConfig::smooth())
            .with_area("sidebar", LoadingConfig::new().with_initial_loading_state(true));
        let manager = LoadingManager::from_config(&config).unwrap();

        assert_eq!(manager.get_areas().len(), 2);
        assert!(manager.get_loading_state("sidebar").unwrap());
        assert!(!manager.get_loading_state("checkout").unwrap());
    }

    #[test]
    fn test_path_resolution() {
        let mut manager = manager_with(LoadingConfig::default());
        let payment = manager.add_segment(TEST_AREA, "payment", None).unwrap();
        let card = manager.add_segment("testArea/payment", "card", None).unwrap();

        assert_eq!(manager.resolve("testArea/payment").unwrap(), payment);
        assert_eq!(manager.resolve("testArea/payment/card").unwrap(), card);
        assert_eq!(
            manager.resolve("testArea/shipping").unwrap_err(),
            LoadingError::NotFound("shipping".into())
        );
        assert_eq!(
            manager.resolve("").unwrap_err(),
            LoadingError::NotFound(String::new())
        );
    }

    #[test]
    fn test_segments_through_paths() {
        let mut manager = manager_with(
            LoadingConfig::new()
                .with_min_loading_time(ms(100))
                .with_debounce_time(ms(50)),
        );
        manager.add_segment(TEST_AREA, "a", None).unwrap();
        manager.add_segment(TEST_AREA, "b", None).unwrap();

        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        manager
            .subscribe(TEST_AREA, move |state| sink.lock().push(state))
            .unwrap();

        manager
            .set_loading_state("testArea/a", true, SetLoadingOptions::default())
            .unwrap();
        assert!(manager.get_loading_state(TEST_AREA).unwrap());

        manager.remove_segment(TEST_AREA, "a").unwrap();
        manager.advance(ms(160));
        assert!(!manager.get_loading_state(TEST_AREA).unwrap());
        assert_eq!(*calls.lock(), vec![true, false]);

        assert_eq!(
            manager.add_segment(TEST_AREA, "b", None).unwrap_err(),
            LoadingError::DuplicateName("b".into())
        );
        assert_eq!(
            manager.remove_segment(TEST_AREA, "a").unwrap_err(),
            LoadingError::NotFound("a".into())
        );
    }

    #[test]
    fn test_patch_config_through_path() {
        let mut manager = manager_with(LoadingConfig::default());
        let inner = manager.add_segment(TEST_AREA, "inner", None).unwrap();
        manager
            .patch_config(TEST_AREA, ConfigPatch::new().min_loading_time(ms(250)))
            .unwrap();

        assert_eq!(
            manager.tree().config(inner).unwrap().min_loading_time,
            ms(250)
        );
    }
}
