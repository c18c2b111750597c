//! Tests for lookup caches.

use super::*;
use termbase_core::{MemoryStore, Store};

fn seeded() -> MemoryStore {
    let store = MemoryStore::new();
    let mut org = Organization::new("CIEL");
    org.internal_reference_id = Some("legacy-ciel".into());
    store.organizations().insert(org).unwrap();
    store
}

#[test]
fn test_hit_is_served_from_cache() {
    let store = seeded();
    let mut cache = LookupCache::new();

    let first = cache.resolve(store.organizations(), Lookup::NaturalKey("CIEL"));
    let second = cache.resolve(store.organizations(), Lookup::NaturalKey("CIEL"));

    assert_eq!(first.unwrap().id, second.unwrap().id);
    assert_eq!(cache.store_lookups(), 1);
}

#[test]
fn test_any_key_of_a_cached_record_hits() {
    let store = seeded();
    let mut cache = LookupCache::new();
    cache.resolve(store.organizations(), Lookup::NaturalKey("CIEL"));

    let by_uri = cache.resolve(store.organizations(), Lookup::Uri("/orgs/CIEL/"));
    let by_legacy = cache.resolve(
        store.organizations(),
        Lookup::InternalReferenceId("legacy-ciel"),
    );
    let by_id = cache.resolve(store.organizations(), Lookup::Id(1));

    assert!(by_uri.is_some());
    assert!(by_legacy.is_some());
    assert!(by_id.is_some());
    assert_eq!(cache.store_lookups(), 1);
}

#[test]
fn test_miss_is_remembered() {
    // Arrange
    let store = seeded();
    let mut cache: LookupCache<Organization> = LookupCache::new();

    // Act
    let first = cache.resolve(store.organizations(), Lookup::NaturalKey("OTHER"));
    store.organizations().insert(Organization::new("OTHER")).unwrap();
    let second = cache.resolve(store.organizations(), Lookup::NaturalKey("OTHER"));

    // Assert
    assert!(first.is_none());
    assert!(second.is_none());
    assert_eq!(cache.store_lookups(), 1);
}

#[test]
fn test_remember_replaces_miss() {
    let store = seeded();
    let mut cache: LookupCache<Organization> = LookupCache::new();
    cache.resolve(store.organizations(), Lookup::NaturalKey("NEW"));

    let created = store.organizations().insert(Organization::new("NEW")).unwrap();
    cache.remember(&created);

    let found = cache.resolve(store.organizations(), Lookup::NaturalKey("NEW"));
    assert_eq!(found.unwrap().id, created.id);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_alias_kinds_do_not_collide() {
    let store = MemoryStore::new();
    store.users().insert(User::new("42")).unwrap();
    let mut cache: LookupCache<User> = LookupCache::new();

    let by_legacy = cache.resolve(store.users(), Lookup::InternalReferenceId("42"));
    let by_username = cache.resolve(store.users(), Lookup::NaturalKey("42"));

    assert!(by_legacy.is_none());
    assert!(by_username.is_some());
}
