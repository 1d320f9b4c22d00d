use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::RwLock;

use customers_core::domain::customer::{
    Customer, CustomerCreate, CustomerFindCriteria, CustomerId, CustomerUpdate,
};
use customers_core::repository::{CustomerRepository, CustomerStream, RepositoryError};

/// Map-backed store. Ids come from an atomic counter and are never handed out twice.
#[derive(Default)]
pub struct InMemoryCustomerRepository {
    customers: RwLock<HashMap<CustomerId, Customer>>,
    last_id: AtomicU64,
}

impl InMemoryCustomerRepository {
    /// Rebuilds a store from known records. `last_id` is the highest id ever issued.
    pub fn restore(customers: impl IntoIterator<Item = Customer>, last_id: u64) -> Self {
        let customers: HashMap<CustomerId, Customer> =
            customers.into_iter().map(|customer| (customer.id, customer)).collect();
        let last_id = customers.keys().map(|id| id.0).max().unwrap_or(0).max(last_id);

        Self { customers: RwLock::new(customers), last_id: AtomicU64::new(last_id) }
    }

    pub async fn len(&self) -> usize {
        self.customers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.customers.read().await.is_empty()
    }

    pub fn last_issued_id(&self) -> u64 {
        self.last_id.load(Ordering::SeqCst)
    }

    /// Id the next insert would receive. Callers must serialise inserts to rely on it.
    pub(crate) fn peek_next_id(&self) -> CustomerId {
        CustomerId(self.last_issued_id() + 1)
    }

    /// Stores a fully built record and advances the id counter past it.
    pub(crate) async fn put(&self, customer: Customer) {
        self.last_id.fetch_max(customer.id.0, Ordering::SeqCst);
        self.customers.write().await.insert(customer.id, customer);
    }
}

#[async_trait::async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn insert(
        &self,
        create: CustomerCreate,
        now: DateTime<Utc>,
    ) -> Result<Customer, RepositoryError> {
        let id = CustomerId(self.last_id.fetch_add(1, Ordering::SeqCst) + 1);
        let customer = Customer::new(id, create, now);

        let mut customers = self.customers.write().await;
        customers.insert(id, customer.clone());
        Ok(customer)
    }

    async fn find_one(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let customers = self.customers.read().await;
        Ok(customers.get(&id).cloned())
    }

    async fn find(&self, criteria: CustomerFindCriteria) -> Result<CustomerStream, RepositoryError> {
        let customers = self.customers.read().await;
        let mut found: Vec<Customer> =
            customers.values().filter(|customer| criteria.matches(customer)).cloned().collect();
        found.sort_by_key(|customer| customer.id);

        Ok(futures::stream::iter(found).boxed())
    }

    async fn update(
        &self,
        id: CustomerId,
        update: CustomerUpdate,
    ) -> Result<Option<Customer>, RepositoryError> {
        let mut customers = self.customers.write().await;
        let Some(existing) = customers.get_mut(&id) else {
            return Ok(None);
        };

        *existing = existing.patched(&update);
        Ok(Some(existing.clone()))
    }

    async fn delete(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let mut customers = self.customers.write().await;
        Ok(customers.remove(&id))
    }
}
