pub mod access;
pub mod customer;
