use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::domain::access::{AuthToken, Privilege};
use crate::domain::customer::{
    Customer, CustomerCreate, CustomerFindCriteria, CustomerId, CustomerUpdate,
};
use crate::errors::ServiceError;
use crate::repository::{CustomerRepository, CustomerStream, PrivilegeError, PrivilegeRepository};

/// Authorization-gated facade over customer data.
///
/// Every operation resolves the caller's privileges first and only touches the
/// repository once the required privilege is present. Dropping a returned future
/// before the check finishes means the data operation never starts.
#[derive(Clone)]
pub struct CustomerService {
    customers: Arc<dyn CustomerRepository>,
    privileges: Arc<dyn PrivilegeRepository>,
    clock: Arc<dyn Clock>,
}

impl CustomerService {
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        privileges: Arc<dyn PrivilegeRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { customers, privileges, clock }
    }

    pub async fn create(
        &self,
        create: CustomerCreate,
        token: &AuthToken,
    ) -> Result<Customer, ServiceError> {
        self.check_privilege(token, Privilege::CanWriteCustomer).await?;

        let created = self.customers.insert(create, self.clock.now()).await?;
        info!(
            event_name = "customer.service.create",
            customer_id = %created.id,
            "customer created"
        );
        Ok(created)
    }

    pub async fn get_one(&self, id: CustomerId, token: &AuthToken) -> Result<Customer, ServiceError> {
        self.check_privilege(token, Privilege::CanReadCustomer).await?;

        let found = self.customers.find_one(id).await?;
        Self::require(id, found, "customer.service.get_one")
    }

    pub async fn get_many(
        &self,
        criteria: CustomerFindCriteria,
        token: &AuthToken,
    ) -> Result<CustomerStream, ServiceError> {
        self.check_privilege(token, Privilege::CanReadCustomer).await?;

        debug!(event_name = "customer.service.get_many", ?criteria, "searching customers");
        Ok(self.customers.find(criteria).await?)
    }

    pub async fn update(
        &self,
        id: CustomerId,
        update: CustomerUpdate,
        token: &AuthToken,
    ) -> Result<Customer, ServiceError> {
        self.check_privilege(token, Privilege::CanWriteCustomer).await?;

        let updated = self.customers.update(id, update).await?;
        let updated = Self::require(id, updated, "customer.service.update")?;
        info!(event_name = "customer.service.update", customer_id = %id, "customer updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: CustomerId, token: &AuthToken) -> Result<Customer, ServiceError> {
        self.check_privilege(token, Privilege::CanWriteCustomer).await?;

        let deleted = self.customers.delete(id).await?;
        let deleted = Self::require(id, deleted, "customer.service.delete")?;
        info!(event_name = "customer.service.delete", customer_id = %id, "customer deleted");
        Ok(deleted)
    }

    /// Passes only when the token's privilege set contains `required`.
    pub async fn check_privilege(
        &self,
        token: &AuthToken,
        required: Privilege,
    ) -> Result<(), ServiceError> {
        if token.is_empty() {
            info!(event_name = "customer.auth.missing_token", "request carried no auth token");
            return Err(ServiceError::Unauthenticated("must provide an AuthToken".to_owned()));
        }

        let granted = match self.privileges.privileges(token).await {
            Ok(granted) => granted,
            Err(PrivilegeError::UnknownToken) => {
                info!(event_name = "customer.auth.unknown_token", "auth token not recognized");
                return Err(PrivilegeError::UnknownToken.into());
            }
            Err(error) => return Err(error.into()),
        };

        if !granted.contains(&required) {
            warn!(
                event_name = "customer.auth.denied",
                required = %required,
                "caller lacks required privilege"
            );
            return Err(ServiceError::Unauthorized { required });
        }

        Ok(())
    }

    fn require(
        id: CustomerId,
        found: Option<Customer>,
        event_name: &'static str,
    ) -> Result<Customer, ServiceError> {
        found.ok_or_else(|| {
            info!(event_name, customer_id = %id, "customer not found");
            ServiceError::NotFound { id }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use futures::StreamExt;

    use crate::clock::FixedClock;
    use crate::domain::access::{AuthToken, Privilege};
    use crate::domain::customer::{
        Customer, CustomerCreate, CustomerFindCriteria, CustomerId, CustomerUpdate,
    };
    use crate::errors::{ErrorKind, ServiceError};
    use crate::repository::{
        CustomerRepository, CustomerStream, PrivilegeError, PrivilegeRepository, RepositoryError,
    };
    use crate::service::CustomerService;

    #[derive(Default)]
    struct SpyCustomerRepository {
        calls: AtomicUsize,
        next_id: AtomicU64,
        records: Mutex<HashMap<CustomerId, Customer>>,
    }

    impl SpyCustomerRepository {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn touch(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }

        fn records(&self) -> std::sync::MutexGuard<'_, HashMap<CustomerId, Customer>> {
            match self.records.lock() {
                Ok(records) => records,
                Err(poisoned) => poisoned.into_inner(),
            }
        }
    }

    #[async_trait]
    impl CustomerRepository for SpyCustomerRepository {
        async fn insert(
            &self,
            create: CustomerCreate,
            now: DateTime<Utc>,
        ) -> Result<Customer, RepositoryError> {
            self.touch();
            let id = CustomerId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
            let customer = Customer::new(id, create, now);
            self.records().insert(id, customer.clone());
            Ok(customer)
        }

        async fn find_one(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
            self.touch();
            Ok(self.records().get(&id).cloned())
        }

        async fn find(
            &self,
            criteria: CustomerFindCriteria,
        ) -> Result<CustomerStream, RepositoryError> {
            self.touch();
            let found: Vec<Customer> =
                self.records().values().filter(|c| criteria.matches(c)).cloned().collect();
            Ok(futures::stream::iter(found).boxed())
        }

        async fn update(
            &self,
            id: CustomerId,
            update: CustomerUpdate,
        ) -> Result<Option<Customer>, RepositoryError> {
            self.touch();
            let mut records = self.records();
            let Some(existing) = records.get(&id) else {
                return Ok(None);
            };
            let updated = existing.patched(&update);
            records.insert(id, updated.clone());
            Ok(Some(updated))
        }

        async fn delete(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
            self.touch();
            Ok(self.records().remove(&id))
        }
    }

    struct SpyPrivilegeRepository {
        calls: AtomicUsize,
        grants: HashMap<AuthToken, HashSet<Privilege>>,
    }

    impl SpyPrivilegeRepository {
        fn new() -> Self {
            let mut grants = HashMap::new();
            grants.insert(
                AuthToken::new("admin"),
                HashSet::from([Privilege::CanReadCustomer, Privilege::CanWriteCustomer]),
            );
            grants.insert(AuthToken::new("reader"), HashSet::from([Privilege::CanReadCustomer]));
            grants.insert(AuthToken::new("writer"), HashSet::from([Privilege::CanWriteCustomer]));
            grants.insert(AuthToken::new("nobody"), HashSet::new());
            Self { calls: AtomicUsize::new(0), grants }
        }
    }

    #[async_trait]
    impl PrivilegeRepository for SpyPrivilegeRepository {
        async fn privileges(
            &self,
            token: &AuthToken,
        ) -> Result<HashSet<Privilege>, PrivilegeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.grants.get(token).cloned().ok_or(PrivilegeError::UnknownToken)
        }
    }

    struct Fixture {
        service: CustomerService,
        customers: Arc<SpyCustomerRepository>,
        privileges: Arc<SpyPrivilegeRepository>,
        clock: FixedClock,
    }

    fn fixture() -> Fixture {
        let customers = Arc::new(SpyCustomerRepository::default());
        let privileges = Arc::new(SpyPrivilegeRepository::new());
        let clock = FixedClock::from_epoch_secs(1_700_000_000).expect("valid epoch");
        let service = CustomerService::new(customers.clone(), privileges.clone(), Arc::new(clock));
        Fixture { service, customers, privileges, clock }
    }

    fn create(name: &str) -> CustomerCreate {
        CustomerCreate { name: name.to_string() }
    }

    #[tokio::test]
    async fn create_stamps_time_from_injected_clock() {
        let fx = fixture();

        let created = fx.service.create(create("Ada"), &"admin".into()).await.expect("create");

        assert_eq!(created.name, "Ada");
        assert_eq!(created.created_at, fx.clock.0);
        assert_eq!(created.last_logged_in_at, fx.clock.0);
    }

    #[tokio::test]
    async fn missing_privilege_never_reaches_the_repository() {
        let fx = fixture();
        let reader: AuthToken = "reader".into();
        let writer: AuthToken = "writer".into();

        let results = vec![
            fx.service.create(create("Ada"), &reader).await.map(|_| ()),
            fx.service.update(CustomerId(1), CustomerUpdate::default(), &reader).await.map(|_| ()),
            fx.service.delete(CustomerId(1), &reader).await.map(|_| ()),
            fx.service.get_one(CustomerId(1), &writer).await.map(|_| ()),
            fx.service.get_many(CustomerFindCriteria::default(), &writer).await.map(|_| ()),
        ];

        for result in results {
            let error = result.expect_err("operation should be denied");
            assert_eq!(error.kind(), ErrorKind::Unauthorized);
        }
        assert_eq!(fx.customers.calls(), 0);
        assert!(fx.customers.records().is_empty());
    }

    #[tokio::test]
    async fn empty_privilege_set_is_unauthorized() {
        let fx = fixture();

        let error = fx.service.get_one(CustomerId(1), &"nobody".into()).await.expect_err("denied");

        assert!(matches!(error, ServiceError::Unauthorized { required: Privilege::CanReadCustomer }));
        assert_eq!(fx.customers.calls(), 0);
    }

    async fn run_all_operations(service: &CustomerService, token: &AuthToken) -> Vec<ServiceError> {
        let results = vec![
            service.create(create("Ada"), token).await.map(|_| ()),
            service.get_one(CustomerId(1), token).await.map(|_| ()),
            service.get_many(CustomerFindCriteria::default(), token).await.map(|_| ()),
            service.update(CustomerId(1), CustomerUpdate::default(), token).await.map(|_| ()),
            service.delete(CustomerId(1), token).await.map(|_| ()),
        ];
        results.into_iter().filter_map(Result::err).collect()
    }

    #[tokio::test]
    async fn every_operation_rejects_empty_and_unknown_tokens() {
        let cases = [("", 0), ("stranger", 5)];

        for (raw, expected_lookups) in cases {
            let fx = fixture();

            let errors = run_all_operations(&fx.service, &AuthToken::new(raw)).await;

            assert_eq!(errors.len(), 5, "token {raw:?}: every operation should fail");
            for error in &errors {
                assert_eq!(error.kind(), ErrorKind::Unauthenticated, "token {raw:?}: {error}");
            }
            assert_eq!(fx.customers.calls(), 0, "token {raw:?} reached the repository");
            assert_eq!(
                fx.privileges.calls.load(Ordering::SeqCst),
                expected_lookups,
                "token {raw:?}: unexpected privilege lookups"
            );
        }
    }

    #[tokio::test]
    async fn single_record_operations_translate_absence_into_not_found() {
        let fx = fixture();
        let admin: AuthToken = "admin".into();
        let missing = CustomerId(404);

        let get = fx.service.get_one(missing, &admin).await.expect_err("absent");
        let update = fx
            .service
            .update(missing, CustomerUpdate { name: Some("x".into()) }, &admin)
            .await
            .expect_err("absent");
        let delete = fx.service.delete(missing, &admin).await.expect_err("absent");

        for error in [get, update, delete] {
            assert!(matches!(error, ServiceError::NotFound { id } if id == missing));
        }
    }

    #[tokio::test]
    async fn empty_search_is_a_success() {
        let fx = fixture();

        let stream = fx
            .service
            .get_many(CustomerFindCriteria::default(), &"reader".into())
            .await
            .expect("search should succeed");

        assert!(stream.collect::<Vec<_>>().await.is_empty());
    }

    #[tokio::test]
    async fn update_and_delete_round_trip_through_get_one() {
        let fx = fixture();
        let admin: AuthToken = "admin".into();
        let created = fx.service.create(create("Ada"), &admin).await.expect("create");

        let untouched = fx
            .service
            .update(created.id, CustomerUpdate { name: None }, &admin)
            .await
            .expect("update");
        assert_eq!(untouched, created);

        let renamed = fx
            .service
            .update(created.id, CustomerUpdate { name: Some("Grace".into()) }, &admin)
            .await
            .expect("update");
        assert_eq!(renamed.name, "Grace");
        assert_eq!(renamed.created_at, created.created_at);
        assert_eq!(fx.service.get_one(created.id, &admin).await.expect("get"), renamed);

        let deleted = fx.service.delete(created.id, &admin).await.expect("delete");
        assert_eq!(deleted, renamed);
        let error = fx.service.get_one(created.id, &admin).await.expect_err("gone");
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }
}
