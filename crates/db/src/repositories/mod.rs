pub mod file_log;
pub mod memory;
pub mod privileges;

pub use file_log::FileLogCustomerRepository;
pub use memory::InMemoryCustomerRepository;
pub use privileges::{CachedPrivilegeRepository, PrivilegeGrants, StaticPrivilegeRepository};

pub use customers_core::repository::{
    CustomerRepository, PrivilegeError, PrivilegeRepository, RepositoryError,
};
