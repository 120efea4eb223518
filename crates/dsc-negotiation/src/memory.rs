//! # In-Memory Collaborators
//!
//! Thread-safe implementations of every collaborator trait, for tests and
//! single-process deployments. Locks are `parking_lot` and never held
//! across a collaborator call.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use dsc_core::{AgreementId, Uri};
use dsc_policy::{ContractAgreement, ContractOffer, ExecutionFailure, UsageExecution, UsageInformation};

use crate::collaborators::{
    AgreementStore, EntityPersistence, EntityResolver, OfferCatalog, StoreError, StoredAgreement,
};

// ── Generic store ────────────────────────────────────────────────────

/// Cloneable key-value map behind a shared lock. Clones share data.
#[derive(Debug)]
pub struct Store<K, V> {
    data: Arc<RwLock<HashMap<K, V>>>,
}

impl<K, V> Clone for Store<K, V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<K, V> Default for Store<K, V> {
    fn default() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<K: Eq + Hash, V: Clone> Store<K, V> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.data.write().insert(key, value)
    }

    /// Retrieve a record.
    pub fn get(&self, key: &K) -> Option<V> {
        self.data.read().get(key).cloned()
    }

    /// All records, in no particular order.
    pub fn list(&self) -> Vec<V> {
        self.data.read().values().cloned().collect()
    }

    /// Update a record in place. Returns the updated record, or `None` if not found.
    pub fn update(&self, key: &K, f: impl FnOnce(&mut V)) -> Option<V> {
        let mut guard = self.data.write();
        let entry = guard.get_mut(key)?;
        f(entry);
        Some(entry.clone())
    }

    /// Update the record at `key`, starting from `V::default()` when it is
    /// absent. Lookup and write happen under one lock.
    pub fn upsert(&self, key: K, f: impl FnOnce(&mut V)) -> V
    where
        V: Default,
    {
        let mut guard = self.data.write();
        let entry = guard.entry(key).or_default();
        f(entry);
        entry.clone()
    }

    /// Insert unless some record satisfies `conflicts`, which is checked
    /// under the same write lock. Returns the conflicting record.
    pub fn insert_unless(&self, key: K, value: V, conflicts: impl Fn(&V) -> bool) -> Result<(), V> {
        let mut guard = self.data.write();
        if let Some(existing) = guard.values().find(|v| conflicts(*v)) {
            return Err(existing.clone());
        }
        guard.insert(key, value);
        Ok(())
    }

    /// Remove a record.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.data.write().remove(key)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Catalog ──────────────────────────────────────────────────────────

/// Offers keyed by target.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    offers: Store<Uri, Vec<ContractOffer>>,
}

impl MemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an offer for `target`.
    pub fn publish(&self, target: Uri, offer: ContractOffer) {
        self.offers.upsert(target, |list| list.push(offer));
    }

    /// Withdraw every offer for `target`.
    pub fn withdraw(&self, target: &Uri) {
        self.offers.remove(target);
    }
}

impl OfferCatalog for MemoryCatalog {
    fn offers_for_target(&self, target: &Uri) -> Vec<ContractOffer> {
        self.offers.get(target).unwrap_or_default()
    }
}

// ── Agreements ───────────────────────────────────────────────────────

/// Agreement store with switchable failure modes.
#[derive(Debug, Clone, Default)]
pub struct MemoryAgreements {
    records: Store<AgreementId, StoredAgreement>,
    fail_saves: Arc<AtomicBool>,
    fail_links: Arc<AtomicBool>,
    refuse_confirmation: Arc<AtomicBool>,
}

impl MemoryAgreements {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every save fail.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make every artifact link fail.
    pub fn fail_links(&self, fail: bool) {
        self.fail_links.store(fail, Ordering::SeqCst);
    }

    /// Make confirmation answer `false`.
    pub fn refuse_confirmation(&self, refuse: bool) {
        self.refuse_confirmation.store(refuse, Ordering::SeqCst);
    }

    /// Every stored agreement.
    pub fn list(&self) -> Vec<StoredAgreement> {
        self.records.list()
    }

    /// Number of stored agreements.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn not_found(id: AgreementId) -> StoreError {
        StoreError::NotFound {
            entity: "agreement",
            id: id.to_string(),
        }
    }
}

impl AgreementStore for MemoryAgreements {
    fn save_agreement(&self, agreement: &ContractAgreement) -> Result<AgreementId, StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("agreement store is offline".to_string()));
        }
        let id = AgreementId::new();
        let record = StoredAgreement {
            id,
            agreement: agreement.clone(),
            confirmed: false,
            artifacts: Vec::new(),
        };
        self.records
            .insert_unless(id, record, |stored| stored.agreement.id == agreement.id)
            .map_err(|_| StoreError::Conflict {
                entity: "agreement",
                id: agreement.id.to_string(),
            })?;
        Ok(id)
    }

    fn confirm_agreement(&self, id: AgreementId) -> Result<bool, StoreError> {
        if self.refuse_confirmation.load(Ordering::SeqCst) {
            return self.records.get(&id).map(|_| false).ok_or_else(|| Self::not_found(id));
        }
        self.records
            .update(&id, |record| record.confirmed = true)
            .map(|_| true)
            .ok_or_else(|| Self::not_found(id))
    }

    fn link_artifacts_to_agreement(
        &self,
        artifacts: &[Uri],
        id: AgreementId,
    ) -> Result<(), StoreError> {
        if self.fail_links.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("artifact links are offline".to_string()));
        }
        self.records
            .update(&id, |record| {
                for artifact in artifacts {
                    if !record.artifacts.contains(artifact) {
                        record.artifacts.push(artifact.clone());
                    }
                }
            })
            .map(|_| ())
            .ok_or_else(|| Self::not_found(id))
    }

    fn discard_agreement(&self, id: AgreementId) -> Result<(), StoreError> {
        self.records
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(id))
    }

    fn get(&self, id: AgreementId) -> Option<StoredAgreement> {
        self.records.get(&id)
    }

    fn find_by_uri(&self, uri: &Uri) -> Option<StoredAgreement> {
        self.records
            .list()
            .into_iter()
            .find(|record| &record.agreement.id == uri)
    }
}

// ── Resources ────────────────────────────────────────────────────────

/// A local artifact with its usage counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRecord {
    /// Artifact data.
    pub data: String,
    /// When the artifact was created.
    pub created: DateTime<Utc>,
    /// How often the data has been served.
    pub accessed: u64,
}

/// Metadata received from a remote connector.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResource {
    /// Connector the description came from.
    pub provider: Uri,
    /// Latest description.
    pub description: Value,
    /// Artifacts requested with the resource.
    pub artifacts: Vec<Uri>,
}

/// Local resources, remote metadata and downloaded data.
#[derive(Debug, Clone, Default)]
pub struct MemoryResources {
    self_description: Arc<RwLock<Value>>,
    descriptions: Store<Uri, Value>,
    artifacts: Store<Uri, ArtifactRecord>,
    remote_resources: Store<Uri, RemoteResource>,
    remote_connectors: Store<Uri, Value>,
    data: Store<Uri, String>,
}

impl MemoryResources {
    /// Create an empty resource store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connector self-description.
    pub fn set_self_description(&self, description: Value) {
        *self.self_description.write() = description;
    }

    /// Register a described element (resource, representation, catalog).
    pub fn add_description(&self, element: Uri, description: Value) {
        self.descriptions.insert(element, description);
    }

    /// Register a local artifact with its description and data.
    pub fn add_artifact(&self, artifact: Uri, description: Value, data: impl Into<String>, created: DateTime<Utc>) {
        self.descriptions.insert(artifact.clone(), description);
        self.artifacts.insert(
            artifact,
            ArtifactRecord {
                data: data.into(),
                created,
                accessed: 0,
            },
        );
    }

    /// A local artifact record.
    pub fn artifact(&self, artifact: &Uri) -> Option<ArtifactRecord> {
        self.artifacts.get(artifact)
    }

    /// Metadata received for a remote resource.
    pub fn remote_resource(&self, resource: &Uri) -> Option<RemoteResource> {
        self.remote_resources.get(resource)
    }

    /// Latest description received for a remote connector.
    pub fn remote_connector(&self, connector: &Uri) -> Option<Value> {
        self.remote_connectors.get(connector)
    }

    /// Downloaded data of a remote artifact.
    pub fn data(&self, artifact: &Uri) -> Option<String> {
        self.data.get(artifact)
    }
}

impl EntityResolver for MemoryResources {
    fn description(&self, element: &Uri) -> Option<Value> {
        self.descriptions.get(element)
    }

    fn self_description(&self) -> Value {
        self.self_description.read().clone()
    }

    fn artifact_data(&self, artifact: &Uri) -> Result<String, StoreError> {
        self.artifacts
            .update(artifact, |record| record.accessed += 1)
            .map(|record| record.data)
            .ok_or_else(|| StoreError::NotFound {
                entity: "artifact",
                id: artifact.to_string(),
            })
    }
}

impl EntityPersistence for MemoryResources {
    fn save_metadata(
        &self,
        provider: &Uri,
        resource: &Uri,
        description: &Value,
        artifacts: &[Uri],
    ) -> Result<(), StoreError> {
        self.remote_resources.insert(
            resource.clone(),
            RemoteResource {
                provider: provider.clone(),
                description: description.clone(),
                artifacts: artifacts.to_vec(),
            },
        );
        Ok(())
    }

    fn save_data(&self, artifact: &Uri, data: &str) -> Result<(), StoreError> {
        self.data.insert(artifact.clone(), data.to_string());
        Ok(())
    }

    fn update_resource(&self, resource: &Uri, description: &Value) -> Result<(), StoreError> {
        self.remote_resources
            .update(resource, |record| record.description = description.clone())
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                entity: "resource",
                id: resource.to_string(),
            })
    }

    fn update_connector(&self, connector: &Uri, description: &Value) -> Result<(), StoreError> {
        self.remote_connectors.insert(connector.clone(), description.clone());
        Ok(())
    }
}

impl UsageInformation for MemoryResources {
    fn access_count(&self, target: &Uri) -> u64 {
        self.artifacts.get(target).map_or(0, |record| record.accessed)
    }

    fn creation_date(&self, target: &Uri) -> Option<DateTime<Utc>> {
        self.artifacts.get(target).map(|record| record.created)
    }
}

// ── Usage execution ──────────────────────────────────────────────────

/// Records log and notification duties instead of executing them.
#[derive(Debug, Clone, Default)]
pub struct MemoryExecution {
    logged: Arc<Mutex<Vec<(Uri, Uri)>>>,
    notified: Arc<Mutex<Vec<(String, Uri)>>>,
    unreachable: Arc<AtomicBool>,
}

impl MemoryExecution {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every log and notification fail.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Logged `(target, agreement)` pairs.
    pub fn logged(&self) -> Vec<(Uri, Uri)> {
        self.logged.lock().clone()
    }

    /// Sent `(endpoint, target)` notifications.
    pub fn notified(&self) -> Vec<(String, Uri)> {
        self.notified.lock().clone()
    }

    fn check(&self) -> Result<(), ExecutionFailure> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ExecutionFailure {
                reason: "execution endpoint unreachable".to_string(),
            });
        }
        Ok(())
    }
}

impl UsageExecution for MemoryExecution {
    fn log_access(&self, target: &Uri, agreement: &Uri) -> Result<(), ExecutionFailure> {
        self.check()?;
        self.logged.lock().push((target.clone(), agreement.clone()));
        Ok(())
    }

    fn notify_access(&self, endpoint: &str, target: &Uri) -> Result<(), ExecutionFailure> {
        self.check()?;
        self.notified.lock().push((endpoint.to_string(), target.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn uri(s: &str) -> Uri {
        Uri::new(s).unwrap()
    }

    fn agreement(id: &str) -> ContractAgreement {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        ContractAgreement {
            id: uri(id),
            provider: uri("https://p.example"),
            consumer: uri("https://c.example"),
            rules: Vec::new(),
            contract_date: at,
            contract_start: at,
            contract_end: at,
        }
    }

    #[test]
    fn store_clones_share_data() {
        let a: Store<u32, &str> = Store::new();
        let b = a.clone();
        a.insert(1, "one");
        assert_eq!(b.get(&1), Some("one"));
        assert_eq!(b.update(&1, |v| *v = "uno"), Some("uno"));
        assert_eq!(a.remove(&1), Some("uno"));
        assert!(b.is_empty());
    }

    #[test]
    fn catalog_accumulates_offers() {
        let catalog = MemoryCatalog::new();
        let target = uri("https://p.example/artifacts/1");
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let offer = ContractOffer {
            id: uri("https://p.example/offers/1"),
            provider: uri("https://p.example"),
            consumer: None,
            start: at,
            end: at,
            rules: Vec::new(),
        };
        catalog.publish(target.clone(), offer.clone());
        catalog.publish(target.clone(), offer);
        assert_eq!(catalog.offers_for_target(&target).len(), 2);
        catalog.withdraw(&target);
        assert!(catalog.offers_for_target(&target).is_empty());
    }

    #[test]
    fn concurrent_publishes_are_all_kept() {
        let catalog = MemoryCatalog::new();
        let target = uri("https://p.example/artifacts/1");
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        std::thread::scope(|s| {
            for t in 0..8 {
                let catalog = catalog.clone();
                let target = target.clone();
                s.spawn(move || {
                    for n in 0..25 {
                        catalog.publish(
                            target.clone(),
                            ContractOffer {
                                id: uri(&format!("https://p.example/offers/{t}-{n}")),
                                provider: uri("https://p.example"),
                                consumer: None,
                                start: at,
                                end: at,
                                rules: Vec::new(),
                            },
                        );
                    }
                });
            }
        });
        assert_eq!(catalog.offers_for_target(&target).len(), 200);
    }

    #[test]
    fn concurrent_saves_of_one_uri_store_it_once() {
        let store = MemoryAgreements::new();
        let saved: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let store = store.clone();
                    s.spawn(move || store.save_agreement(&agreement("https://p.example/agreements/1")))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(saved.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(saved
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, StoreError::Conflict { .. })));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn agreement_lifecycle() {
        let store = MemoryAgreements::new();
        let id = store.save_agreement(&agreement("https://p.example/agreements/1")).unwrap();
        assert!(!store.get(id).unwrap().confirmed);
        assert_eq!(store.confirm_agreement(id), Ok(true));
        let artifact = uri("https://p.example/artifacts/1");
        store.link_artifacts_to_agreement(&[artifact.clone(), artifact.clone()], id).unwrap();
        let stored = store.find_by_uri(&uri("https://p.example/agreements/1")).unwrap();
        assert!(stored.confirmed);
        assert_eq!(stored.artifacts, vec![artifact]);
    }

    #[test]
    fn duplicate_agreement_uri_conflicts() {
        let store = MemoryAgreements::new();
        store.save_agreement(&agreement("https://p.example/agreements/1")).unwrap();
        assert!(matches!(
            store.save_agreement(&agreement("https://p.example/agreements/1")),
            Err(StoreError::Conflict { .. })
        ));
    }

    #[test]
    fn refused_confirmation_is_false_not_error() {
        let store = MemoryAgreements::new();
        let id = store.save_agreement(&agreement("https://p.example/agreements/1")).unwrap();
        store.refuse_confirmation(true);
        assert_eq!(store.confirm_agreement(id), Ok(false));
        assert!(store.confirm_agreement(AgreementId::new()).is_err());
    }

    #[test]
    fn artifact_access_is_counted() {
        let resources = MemoryResources::new();
        let artifact = uri("https://p.example/artifacts/1");
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        resources.add_artifact(artifact.clone(), json!({"@id": artifact.as_str()}), "data", created);
        assert_eq!(resources.artifact_data(&artifact).unwrap(), "data");
        assert_eq!(resources.artifact_data(&artifact).unwrap(), "data");
        assert_eq!(resources.access_count(&artifact), 2);
        assert_eq!(resources.creation_date(&artifact), Some(created));
        assert!(resources.artifact_data(&uri("https://p.example/artifacts/2")).is_err());
    }

    #[test]
    fn resource_update_requires_known_resource() {
        let resources = MemoryResources::new();
        let resource = uri("https://p.example/resources/1");
        assert!(resources.update_resource(&resource, &json!({})).is_err());
        resources
            .save_metadata(&uri("https://p.example"), &resource, &json!({"v": 1}), &[])
            .unwrap();
        resources.update_resource(&resource, &json!({"v": 2})).unwrap();
        assert_eq!(resources.remote_resource(&resource).unwrap().description["v"], 2);
    }

    #[test]
    fn execution_records_and_fails_on_demand() {
        let exec = MemoryExecution::new();
        let target = uri("https://p.example/artifacts/1");
        exec.notify_access("https://pip.example/notify", &target).unwrap();
        exec.set_unreachable(true);
        assert!(exec.log_access(&target, &uri("https://p.example/agreements/1")).is_err());
        assert_eq!(exec.notified().len(), 1);
        assert!(exec.logged().is_empty());
    }
}
