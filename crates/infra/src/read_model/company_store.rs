use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

use custody_core::CompanyId;
use std::sync::Arc;

/// Company-isolated key/value store for disposable read models.
pub trait CompanyStore<K, V>: Send + Sync {
    fn get(&self, company_id: CompanyId, key: &K) -> Option<V>;
    fn upsert(&self, company_id: CompanyId, key: K, value: V);
    fn remove(&self, company_id: CompanyId, key: &K) -> Option<V>;
    fn list(&self, company_id: CompanyId) -> Vec<V>;
    /// Clear all read-model records for a company (rebuild support).
    fn clear_company(&self, company_id: CompanyId);
}

impl<K, V, S> CompanyStore<K, V> for Arc<S>
where
    S: CompanyStore<K, V> + ?Sized,
{
    fn get(&self, company_id: CompanyId, key: &K) -> Option<V> {
        (**self).get(company_id, key)
    }

    fn upsert(&self, company_id: CompanyId, key: K, value: V) {
        (**self).upsert(company_id, key, value)
    }

    fn remove(&self, company_id: CompanyId, key: &K) -> Option<V> {
        (**self).remove(company_id, key)
    }

    fn list(&self, company_id: CompanyId) -> Vec<V> {
        (**self).list(company_id)
    }

    fn clear_company(&self, company_id: CompanyId) {
        (**self).clear_company(company_id)
    }
}

#[derive(Debug)]
pub struct InMemoryCompanyStore<K, V> {
    inner: RwLock<HashMap<(CompanyId, K), V>>,
}

impl<K, V> InMemoryCompanyStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryCompanyStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> CompanyStore<K, V> for InMemoryCompanyStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, company_id: CompanyId, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(&(company_id, key.clone())).cloned()
    }

    fn upsert(&self, company_id: CompanyId, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((company_id, key), value);
        }
    }

    fn remove(&self, company_id: CompanyId, key: &K) -> Option<V> {
        let mut map = self.inner.write().ok()?;
        map.remove(&(company_id, key.clone()))
    }

    fn list(&self, company_id: CompanyId) -> Vec<V> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.iter()
            .filter_map(|((c, _k), v)| if *c == company_id { Some(v.clone()) } else { None })
            .collect()
    }

    fn clear_company(&self, company_id: CompanyId) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|(c, _k), _v| *c != company_id);
        }
    }
}
