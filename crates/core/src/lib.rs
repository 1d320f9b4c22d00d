pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod repository;
pub mod service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::access::{AuthToken, Privilege};
pub use domain::customer::{
    Customer, CustomerCreate, CustomerFindCriteria, CustomerId, CustomerUpdate,
};
pub use errors::{ErrorKind, InterfaceError, ServiceError};
pub use repository::{
    CustomerRepository, CustomerStream, PrivilegeError, PrivilegeRepository, RepositoryError,
};
pub use service::CustomerService;
