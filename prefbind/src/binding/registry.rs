use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use super::item::BoundItem;
use super::set::PreferenceBindings;
use super::typed::PreferenceBinding;
use super::value::PreferenceValue;
use crate::preferences::{
    same_store, PreferenceChangeListener, PreferencesStore, StoreId, StoreSlot,
};
use crate::primitives::sync::{read, write};

struct RegistryEntry {
    store: Weak<dyn PreferencesStore>,
    bindings: Arc<PreferenceBindings>,
}

impl RegistryEntry {
    /// Whether this entry still belongs to `store` rather than to a dropped store that
    /// happened to live at the same address.
    fn belongs_to(&self, store: &Arc<dyn PreferencesStore>) -> bool {
        self.store
            .upgrade()
            .is_some_and(|alive| same_store(&alive, store))
    }
}

#[derive(Default)]
struct RegistryTable {
    entries: HashMap<StoreId, RegistryEntry>,
    app_store: Option<Weak<dyn PreferencesStore>>,
}

impl RegistryTable {
    fn lookup(&self, store: &Arc<dyn PreferencesStore>) -> Option<Arc<PreferenceBindings>> {
        self.entries
            .get(&StoreId::of(store))
            .filter(|entry| entry.belongs_to(store))
            .map(|entry| Arc::clone(&entry.bindings))
    }

    fn remembered_app_store(&self) -> Option<Arc<dyn PreferencesStore>> {
        self.app_store.as_ref().and_then(Weak::upgrade)
    }

    fn is_remembered(&self, store: &Arc<dyn PreferencesStore>) -> bool {
        self.remembered_app_store()
            .is_some_and(|remembered| same_store(&remembered, store))
    }
}

/// Outcome of comparing a lookup against the remembered application store.
enum AppStoreCheck {
    Unchanged,
    Migrated {
        bindings: Option<Arc<PreferenceBindings>>,
        retargeted: usize,
    },
}

/// Table from store identity to that store's bindings.
///
/// The registry remembers which store was last seen as the application's store. When a
/// lookup is made against the application's *current* store and that differs from the
/// remembered one, the old store's bindings are migrated: moved to the new identity,
/// re-targeted, and replayed.
///
/// Lookups run under a read lock; first sight of an app store, migration and attachment
/// take the write lock and re-check, so concurrent callers migrate a table exactly once.
pub struct PreferenceRegistry {
    app_preferences: Arc<StoreSlot>,
    table: RwLock<RegistryTable>,
    weak_self: Weak<Self>,
}

impl PreferenceRegistry {
    /// Creates a registry that follows the application store held in `app_preferences`.
    #[must_use]
    pub fn new(app_preferences: Arc<StoreSlot>) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            app_preferences,
            table: RwLock::new(RegistryTable::default()),
            weak_self: weak_self.clone(),
        })
    }

    /// Returns the bindings of `store`, creating them on first use.
    ///
    /// First use also registers one change listener on `store`. The listener forwards to
    /// the bindings of the application's *current* store, which may already be a
    /// different store than the one that fired. Attaching the current application store
    /// before any store was remembered makes it the baseline for later migrations.
    pub fn ensure_attached(&self, store: &Arc<dyn PreferencesStore>) -> Arc<PreferenceBindings> {
        if let Some(bindings) = read(&self.table).lookup(store) {
            return bindings;
        }

        let bindings = {
            let mut table = write(&self.table);
            if let Some(bindings) = table.lookup(store) {
                return bindings;
            }
            if table.remembered_app_store().is_none() && self.app_preferences.is_current(store) {
                table.app_store = Some(Arc::downgrade(store));
            }
            let bindings = Arc::new(PreferenceBindings::new());
            table.entries.insert(
                StoreId::of(store),
                RegistryEntry {
                    store: Arc::downgrade(store),
                    bindings: Arc::clone(&bindings),
                },
            );
            bindings
        };

        crate::debug!(
            "registry.attached store={:?} app_store={}",
            StoreId::of(store),
            self.app_preferences.is_current(store)
        );

        store.add_change_listener(Arc::new(ForwardToAppStore {
            registry: self.weak_self.clone(),
        }));
        bindings
    }

    /// Returns the bindings of `store`, or `None` if it was never attached.
    ///
    /// When `store` is the application's current store this also tracks store identity:
    /// the first such call remembers it, and a call after the application moved to a new
    /// store migrates the remembered store's bindings onto it. Migration re-targets every
    /// re-targetable item and then re-checks every item once, whether or not any value
    /// differs. Items are re-targeted before the migrated set becomes visible, so no
    /// caller sees the new store's set still reading the old store.
    pub fn bindings_for(&self, store: &Arc<dyn PreferencesStore>) -> Option<Arc<PreferenceBindings>> {
        let (bindings, migrated) = self.resolve(store);
        if migrated {
            if let Some(bindings) = &bindings {
                sweep(bindings);
            }
        }
        bindings
    }

    /// Runs `check_for_change` on every item bound to `store`.
    ///
    /// If the lookup migrates, this single sweep is the migration's replay.
    pub fn notify(&self, store: &Arc<dyn PreferencesStore>) {
        if let (Some(bindings), _) = self.resolve(store) {
            sweep(&bindings);
        }
    }

    /// Returns the typed binding for `key` in `store`, creating and registering it if
    /// needed. An item of another type registered under `key` is replaced.
    pub fn bind<T: PreferenceValue>(
        &self,
        key: &str,
        store: &Arc<dyn PreferencesStore>,
    ) -> Arc<PreferenceBinding<T>> {
        if let Some(existing) = self
            .bindings_for(store)
            .and_then(|bindings| bindings.get_item(key))
            .and_then(downcast_binding::<T>)
        {
            return existing;
        }

        self.ensure_attached(store).get_or_insert_with(
            key,
            |item| downcast_binding::<T>(item.clone()),
            || {
                let binding = PreferenceBinding::<T>::new(key, Arc::clone(store));
                (BoundItem::Retargetable(binding.clone()), binding)
            },
        )
    }

    /// The store last seen as the application store, if it is still alive.
    #[must_use]
    pub fn app_store(&self) -> Option<Arc<dyn PreferencesStore>> {
        read(&self.table).remembered_app_store()
    }

    /// Whether `store` is the remembered application store.
    #[must_use]
    pub fn is_app_store(&self, store: &Arc<dyn PreferencesStore>) -> bool {
        read(&self.table).is_remembered(store)
    }

    /// Number of stores with bookkeeping.
    #[must_use]
    pub fn attached_store_count(&self) -> usize {
        read(&self.table).entries.len()
    }

    /// Looks `store` up, migrating onto it if it just became the app store. Returns the
    /// bindings and whether a migration happened; migrated items are re-targeted but not
    /// yet re-checked.
    fn resolve(&self, store: &Arc<dyn PreferencesStore>) -> (Option<Arc<PreferenceBindings>>, bool) {
        {
            let table = read(&self.table);
            if !self.app_preferences.is_current(store) || table.is_remembered(store) {
                return (table.lookup(store), false);
            }
        }

        match self.check_app_store(store) {
            AppStoreCheck::Unchanged => (read(&self.table).lookup(store), false),
            AppStoreCheck::Migrated {
                bindings,
                retargeted,
            } => {
                crate::info!(
                    "registry.migrated store={:?} items={} retargeted={}",
                    StoreId::of(store),
                    bindings.as_ref().map_or(0, |bindings| bindings.len()),
                    retargeted
                );
                (bindings, true)
            }
        }
    }

    /// Slow path of [`resolve`](Self::resolve), under the write lock.
    ///
    /// The application store is re-read inside the lock so two callers racing on a fresh
    /// store cannot both decide to migrate.
    fn check_app_store(&self, store: &Arc<dyn PreferencesStore>) -> AppStoreCheck {
        let mut table = write(&self.table);
        if !self.app_preferences.is_current(store) || table.is_remembered(store) {
            return AppStoreCheck::Unchanged;
        }

        let Some(previous) = table.remembered_app_store() else {
            table.app_store = Some(Arc::downgrade(store));
            return AppStoreCheck::Unchanged;
        };

        let moved = table
            .entries
            .remove(&StoreId::of(&previous))
            .filter(|entry| entry.belongs_to(&previous))
            .map(|entry| entry.bindings);

        let new_id = StoreId::of(store);
        let existing = table
            .entries
            .remove(&new_id)
            .filter(|entry| entry.belongs_to(store))
            .map(|entry| entry.bindings);

        let bindings = match (moved, existing) {
            (Some(moved), Some(existing)) => {
                moved.absorb_missing(&existing);
                Some(moved)
            }
            (moved, existing) => moved.or(existing),
        };

        // Re-target under the table lock: the set must not be reachable from the new
        // identity while its items still read the old store
        let retargeted = bindings.as_ref().map_or(0, |bindings| {
            bindings
                .list()
                .iter()
                .filter(|item| item.replace_provider(store))
                .count()
        });

        if let Some(bindings) = &bindings {
            table.entries.insert(
                new_id,
                RegistryEntry {
                    store: Arc::downgrade(store),
                    bindings: Arc::clone(bindings),
                },
            );
        }
        table.app_store = Some(Arc::downgrade(store));

        AppStoreCheck::Migrated {
            bindings,
            retargeted,
        }
    }

    /// Entry point of the forwarding listener.
    fn app_preferences_changed(&self) {
        let current = self.app_preferences.current();
        self.notify(&current);
    }
}

impl std::fmt::Debug for PreferenceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceRegistry")
            .field("attached_stores", &self.attached_store_count())
            .field("app_preferences", &self.app_preferences)
            .finish_non_exhaustive()
    }
}

fn sweep(bindings: &PreferenceBindings) {
    for item in bindings.list() {
        item.check_for_change();
    }
}

fn downcast_binding<T: PreferenceValue>(item: BoundItem) -> Option<Arc<PreferenceBinding<T>>> {
    item.into_any().downcast::<PreferenceBinding<T>>().ok()
}

/// Change listener registered on every attached store.
///
/// Holds the registry weakly: stores own their listeners, and the registry (through its
/// bindings) owns stores.
struct ForwardToAppStore {
    registry: Weak<PreferenceRegistry>,
}

impl PreferenceChangeListener for ForwardToAppStore {
    fn on_preferences_changed(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.app_preferences_changed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::item::{PreferenceItem, RetargetablePreferenceItem};
    use crate::preferences::Preferences;
    use crate::primitives::InMemoryPreferencesBackend;
    use std::any::Any;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn new_store() -> Arc<dyn PreferencesStore> {
        Preferences::new(Arc::new(InMemoryPreferencesBackend::new()), "test".into())
    }

    fn registry_with_app_store() -> (Arc<PreferenceRegistry>, Arc<StoreSlot>, Arc<dyn PreferencesStore>) {
        let store = new_store();
        let slot = Arc::new(StoreSlot::new(Arc::clone(&store)));
        (PreferenceRegistry::new(Arc::clone(&slot)), slot, store)
    }

    /// Item that only counts calls
    struct CountingItem {
        key: String,
        checks: AtomicU32,
        retargets: AtomicU32,
    }

    impl CountingItem {
        fn new(key: &str) -> Arc<Self> {
            Arc::new(Self {
                key: key.to_string(),
                checks: AtomicU32::new(0),
                retargets: AtomicU32::new(0),
            })
        }
    }

    impl PreferenceItem for CountingItem {
        fn key(&self) -> &str {
            &self.key
        }

        fn check_for_change(&self) {
            self.checks.fetch_add(1, Ordering::SeqCst);
        }

        fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    impl RetargetablePreferenceItem for CountingItem {
        fn replace_provider(&self, _store: Arc<dyn PreferencesStore>) {
            self.retargets.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_ensure_attached_is_idempotent() {
        let (registry, _slot, store) = registry_with_app_store();

        let first = registry.ensure_attached(&store);
        let second = registry.ensure_attached(&store);
        let looked_up = registry.bindings_for(&store).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &looked_up));
        assert_eq!(store.change_listeners().len(), 1);
        assert_eq!(registry.attached_store_count(), 1);
    }

    #[test]
    fn test_unattached_store_is_not_found_and_not_created() {
        let (registry, _slot, _store) = registry_with_app_store();
        let throwaway = new_store();

        assert!(registry.bindings_for(&throwaway).is_none());
        assert_eq!(registry.attached_store_count(), 0);
        assert!(throwaway.change_listeners().is_empty());
    }

    #[test]
    fn test_first_lookup_remembers_app_store() {
        let (registry, _slot, store) = registry_with_app_store();
        assert!(registry.app_store().is_none());

        assert!(registry.bindings_for(&store).is_none());
        assert!(registry.is_app_store(&store));
    }

    #[test]
    fn test_attaching_app_store_remembers_it() {
        let (registry, slot, old_store) = registry_with_app_store();
        let item = CountingItem::new("x");
        registry
            .ensure_attached(&old_store)
            .set_item(BoundItem::Retargetable(item.clone()));
        assert!(registry.is_app_store(&old_store));

        let new_store = new_store();
        slot.replace(Arc::clone(&new_store));
        let migrated = registry.bindings_for(&new_store).unwrap();

        assert!(migrated.get_item("x").is_some());
        assert_eq!(item.retargets.load(Ordering::SeqCst), 1);
        assert!(registry.bindings_for(&old_store).is_none());
    }

    #[test]
    fn test_non_app_store_lookup_does_not_change_remembered_store() {
        let (registry, _slot, store) = registry_with_app_store();
        let other = new_store();
        registry.ensure_attached(&other);
        assert!(registry.app_store().is_none());
        registry.bindings_for(&store);

        assert!(registry.bindings_for(&other).is_some());
        assert!(registry.is_app_store(&store));
        assert!(!registry.is_app_store(&other));
    }

    #[test]
    fn test_migration_moves_set_and_runs_once() {
        let (registry, slot, old_store) = registry_with_app_store();
        let bindings = registry.ensure_attached(&old_store);
        let item = CountingItem::new("x");
        bindings.set_item(BoundItem::Retargetable(item.clone()));
        registry.bindings_for(&old_store);

        let new_store = new_store();
        slot.replace(Arc::clone(&new_store));

        let migrated = registry.bindings_for(&new_store).unwrap();
        let again = registry.bindings_for(&new_store).unwrap();

        assert!(Arc::ptr_eq(&migrated, &bindings));
        assert!(Arc::ptr_eq(&again, &bindings));
        assert_eq!(item.retargets.load(Ordering::SeqCst), 1);
        assert_eq!(item.checks.load(Ordering::SeqCst), 1);
        assert!(registry.is_app_store(&new_store));
        assert!(registry.bindings_for(&old_store).is_none());
    }

    #[test]
    fn test_fixed_items_are_replayed_but_not_retargeted() {
        let (registry, slot, old_store) = registry_with_app_store();
        let bindings = registry.ensure_attached(&old_store);
        let fixed = CountingItem::new("pinned");
        bindings.set_item(BoundItem::Fixed(fixed.clone()));
        registry.bindings_for(&old_store);

        let new_store = new_store();
        slot.replace(Arc::clone(&new_store));
        registry.bindings_for(&new_store);

        assert_eq!(fixed.retargets.load(Ordering::SeqCst), 0);
        assert_eq!(fixed.checks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_migration_replays_even_without_value_change() {
        let (registry, slot, old_store) = registry_with_app_store();
        let items: Vec<_> = ["a", "b", "c"].iter().map(|k| CountingItem::new(k)).collect();
        let bindings = registry.ensure_attached(&old_store);
        for item in &items {
            bindings.set_item(BoundItem::Retargetable(item.clone()));
        }
        registry.bindings_for(&old_store);

        let new_store = new_store();
        slot.replace(Arc::clone(&new_store));
        registry.bindings_for(&new_store);

        for item in &items {
            assert_eq!(item.checks.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_migration_merges_bindings_already_attached_to_new_store() {
        let (registry, slot, old_store) = registry_with_app_store();
        registry.ensure_attached(&old_store).set_item(BoundItem::Fixed(CountingItem::new("x")));
        registry.bindings_for(&old_store);

        let new_store = new_store();
        let early = CountingItem::new("y");
        let shadowed = CountingItem::new("x");
        let new_bindings = registry.ensure_attached(&new_store);
        new_bindings.set_item(BoundItem::Fixed(early.clone()));
        new_bindings.set_item(BoundItem::Fixed(shadowed.clone()));

        slot.replace(Arc::clone(&new_store));
        let merged = registry.bindings_for(&new_store).unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(early.checks.load(Ordering::SeqCst), 1);
        assert_eq!(shadowed.checks.load(Ordering::SeqCst), 0);
        assert_eq!(registry.attached_store_count(), 1);
    }

    #[test]
    fn test_concurrent_lookups_migrate_exactly_once() {
        let (registry, slot, old_store) = registry_with_app_store();
        let item = CountingItem::new("x");
        registry
            .ensure_attached(&old_store)
            .set_item(BoundItem::Retargetable(item.clone()));
        registry.bindings_for(&old_store);

        let new_store = new_store();
        slot.replace(Arc::clone(&new_store));

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let registry = Arc::clone(&registry);
                let new_store = Arc::clone(&new_store);
                scope.spawn(move || {
                    for _ in 0..50 {
                        assert!(registry.bindings_for(&new_store).is_some());
                    }
                });
            }
        });

        assert_eq!(item.retargets.load(Ordering::SeqCst), 1);
        assert_eq!(item.checks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_migrated_set_is_never_seen_pointing_at_old_store() {
        let (registry, slot, old_store) = registry_with_app_store();
        let bindings = registry.ensure_attached(&old_store);
        for key in ["a", "b", "c", "d"] {
            bindings.set_item(BoundItem::Retargetable(PreferenceBinding::<i64>::new(
                key,
                Arc::clone(&old_store),
            )));
        }

        let new_store = new_store();
        slot.replace(Arc::clone(&new_store));

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let registry = Arc::clone(&registry);
                let new_store = Arc::clone(&new_store);
                scope.spawn(move || {
                    for _ in 0..50 {
                        let bindings = registry.bindings_for(&new_store).unwrap();
                        for item in bindings.list() {
                            let binding = downcast_binding::<i64>(item).unwrap();
                            assert!(same_store(&binding.store(), &new_store));
                        }
                    }
                });
            }
        });
    }

    #[test]
    fn test_store_write_reaches_bindings_through_forwarding_listener() {
        let (registry, _slot, store) = registry_with_app_store();
        let binding = registry.bind::<i64>("x", &store);
        let hits = Arc::new(AtomicU32::new(0));
        let hits_clone = Arc::clone(&hits);
        let _sub = binding.subscribe(move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        store.set_int("x".into(), 3);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(binding.get(), 3);
    }

    #[test]
    fn test_forwarding_listener_targets_current_app_store() {
        let (registry, slot, old_store) = registry_with_app_store();
        let binding = registry.bind::<i64>("x", &old_store);
        let hits = Arc::new(AtomicU32::new(0));
        let hits_clone = Arc::clone(&hits);
        let _sub = binding.subscribe(move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        let new_store = new_store();
        new_store.set_int("x".into(), 9);
        slot.replace(Arc::clone(&new_store));

        // The old store fires, but the notification lands on the new app store's bindings
        old_store.set_int("unrelated".into(), 1);

        assert!(same_store(&binding.store(), &new_store));
        assert_eq!(binding.get(), 9);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bind_returns_existing_binding_of_same_type() {
        let (registry, _slot, store) = registry_with_app_store();

        let first = registry.bind::<bool>("flag", &store);
        let second = registry.bind::<bool>("flag", &store);
        assert!(Arc::ptr_eq(&first, &second));

        let retyped = registry.bind::<String>("flag", &store);
        assert_eq!(retyped.key(), "flag");
        assert_eq!(registry.bindings_for(&store).unwrap().len(), 1);
    }

    #[test]
    fn test_registry_does_not_keep_itself_alive_through_store() {
        let (registry, _slot, store) = registry_with_app_store();
        registry.ensure_attached(&store);
        let weak = Arc::downgrade(&registry);

        drop(registry);
        assert!(weak.upgrade().is_none());

        // The orphaned forwarding listener is a no-op
        store.set_bool("flag".into(), true);
    }
}
