use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use customers_core::domain::customer::{
    Customer, CustomerCreate, CustomerFindCriteria, CustomerId, CustomerUpdate,
};
use customers_core::repository::{CustomerRepository, CustomerStream, RepositoryError};

use super::InMemoryCustomerRepository;

/// One line of the append-only log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum LogEntry {
    Insert { customer: Customer },
    Update { customer: Customer },
    Delete { id: CustomerId },
}

/// Wraps the in-memory store and appends every mutation to a JSON-lines file.
///
/// A mutation is written to the log before it is applied in memory, so a failed
/// append leaves the store untouched. Opening an existing log replays it, so ids
/// stay unique across restarts.
pub struct FileLogCustomerRepository {
    inner: InMemoryCustomerRepository,
    path: PathBuf,
    writer: Mutex<File>,
}

impl FileLogCustomerRepository {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let path = path.into();
        let (customers, last_id) = replay(&path).await?;
        info!(
            event_name = "storage.file_log.opened",
            path = %path.display(),
            customers = customers.len(),
            last_id,
            "customer log replayed"
        );

        let writer = OpenOptions::new().create(true).append(true).open(&path).await?;
        Ok(Self {
            inner: InMemoryCustomerRepository::restore(customers, last_id),
            path,
            writer: Mutex::new(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(file: &mut File, entry: &LogEntry) -> Result<(), RepositoryError> {
        let mut line = serde_json::to_string(entry)
            .map_err(|error| RepositoryError::Encode(error.to_string()))?;
        line.push('\n');
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        debug!(event_name = "storage.file_log.appended", bytes = line.len(), "log entry written");
        Ok(())
    }
}

async fn replay(path: &Path) -> Result<(Vec<Customer>, u64), RepositoryError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return Ok((Vec::new(), 0));
        }
        Err(error) => return Err(error.into()),
    };

    let mut customers = BTreeMap::new();
    let mut last_id = 0;
    for (index, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let entry: LogEntry = serde_json::from_str(line).map_err(|error| {
            RepositoryError::Decode(format!("{}:{}: {error}", path.display(), index + 1))
        })?;
        match entry {
            LogEntry::Insert { customer } | LogEntry::Update { customer } => {
                last_id = last_id.max(customer.id.0);
                customers.insert(customer.id, customer);
            }
            LogEntry::Delete { id } => {
                last_id = last_id.max(id.0);
                customers.remove(&id);
            }
        }
    }

    Ok((customers.into_values().collect(), last_id))
}

#[async_trait::async_trait]
impl CustomerRepository for FileLogCustomerRepository {
    async fn insert(
        &self,
        create: CustomerCreate,
        now: DateTime<Utc>,
    ) -> Result<Customer, RepositoryError> {
        let mut writer = self.writer.lock().await;
        let customer = Customer::new(self.inner.peek_next_id(), create, now);
        Self::append(&mut writer, &LogEntry::Insert { customer: customer.clone() }).await?;
        self.inner.put(customer.clone()).await;
        Ok(customer)
    }

    async fn find_one(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        self.inner.find_one(id).await
    }

    async fn find(&self, criteria: CustomerFindCriteria) -> Result<CustomerStream, RepositoryError> {
        self.inner.find(criteria).await
    }

    async fn update(
        &self,
        id: CustomerId,
        update: CustomerUpdate,
    ) -> Result<Option<Customer>, RepositoryError> {
        let mut writer = self.writer.lock().await;
        let Some(existing) = self.inner.find_one(id).await? else {
            return Ok(None);
        };

        let updated = existing.patched(&update);
        Self::append(&mut writer, &LogEntry::Update { customer: updated.clone() }).await?;
        self.inner.put(updated.clone()).await;
        Ok(Some(updated))
    }

    async fn delete(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let mut writer = self.writer.lock().await;
        if self.inner.find_one(id).await?.is_none() {
            return Ok(None);
        }

        Self::append(&mut writer, &LogEntry::Delete { id }).await?;
        self.inner.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use futures::StreamExt;
    use tempfile::TempDir;

    use customers_core::domain::customer::{
        CustomerCreate, CustomerFindCriteria, CustomerId, CustomerUpdate,
    };
    use customers_core::repository::{CustomerRepository, RepositoryError};

    use tokio::fs::File;

    use crate::repositories::FileLogCustomerRepository;

    fn create(name: &str) -> CustomerCreate {
        CustomerCreate { name: name.to_string() }
    }

    #[tokio::test]
    async fn mutations_survive_reopen() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("customers.log");
        let now = Utc::now();

        {
            let repo = FileLogCustomerRepository::open(&path).await.expect("open");
            let ada = repo.insert(create("Ada"), now).await.expect("insert");
            let alan = repo.insert(create("Alan"), now).await.expect("insert");
            repo.update(ada.id, CustomerUpdate { name: Some("Ada L.".into()) })
                .await
                .expect("update");
            repo.delete(alan.id).await.expect("delete");
        }

        let reopened = FileLogCustomerRepository::open(&path).await.expect("reopen");
        let all: Vec<_> = reopened
            .find(CustomerFindCriteria::default())
            .await
            .expect("find")
            .collect()
            .await;

        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, CustomerId(1));
        assert_eq!(all[0].name, "Ada L.");
        assert_eq!(all[0].created_at, now);
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_reopen() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("customers.log");

        {
            let repo = FileLogCustomerRepository::open(&path).await.expect("open");
            let first = repo.insert(create("Ada"), Utc::now()).await.expect("insert");
            repo.delete(first.id).await.expect("delete");
        }

        let reopened = FileLogCustomerRepository::open(&path).await.expect("reopen");
        let next = reopened.insert(create("Grace"), Utc::now()).await.expect("insert");
        assert_eq!(next.id, CustomerId(2));
    }

    #[tokio::test]
    async fn absent_ids_do_not_write_log_entries() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("customers.log");

        let repo = FileLogCustomerRepository::open(&path).await.expect("open");
        assert_eq!(repo.delete(CustomerId(8)).await.expect("delete"), None);
        assert_eq!(
            repo.update(CustomerId(8), CustomerUpdate::default()).await.expect("update"),
            None
        );

        let raw = std::fs::read_to_string(repo.path()).expect("read log");
        assert!(raw.is_empty());
    }

    #[tokio::test]
    async fn corrupt_log_reports_the_line() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("customers.log");
        std::fs::write(&path, "{\"op\":\"delete\",\"id\":1}\nnot json\n").expect("write");

        let error = FileLogCustomerRepository::open(&path).await.err().expect("open should fail");

        assert!(matches!(error, RepositoryError::Decode(ref message) if message.contains(":2:")));
    }

    async fn with_full_disk(repo: &FileLogCustomerRepository) -> bool {
        let Ok(full) = std::fs::OpenOptions::new().write(true).open("/dev/full") else {
            return false;
        };
        *repo.writer.lock().await = File::from_std(full);
        true
    }

    #[tokio::test]
    async fn failed_append_leaves_the_store_untouched() {
        let dir = TempDir::new().expect("temp dir");
        let repo =
            FileLogCustomerRepository::open(dir.path().join("customers.log")).await.expect("open");
        let ada = repo.insert(create("Ada"), Utc::now()).await.expect("insert");

        if !with_full_disk(&repo).await {
            return;
        }

        let insert = repo.insert(create("Alan"), Utc::now()).await;
        assert!(matches!(insert, Err(RepositoryError::Io(_))));
        assert_eq!(repo.find_one(CustomerId(2)).await.expect("find"), None);
        assert_eq!(repo.inner.last_issued_id(), 1);

        let update = repo.update(ada.id, CustomerUpdate { name: Some("Grace".into()) }).await;
        assert!(update.is_err());
        assert_eq!(repo.find_one(ada.id).await.expect("find"), Some(ada.clone()));

        let delete = repo.delete(ada.id).await;
        assert!(delete.is_err());
        assert_eq!(repo.find_one(ada.id).await.expect("find"), Some(ada));
    }
}
