pub mod repositories;

pub use repositories::{
    CachedPrivilegeRepository, FileLogCustomerRepository, InMemoryCustomerRepository,
    StaticPrivilegeRepository,
};
