//! Application services and the persistence contracts they depend on.

pub mod catalog;
pub mod error;
pub mod pagination;
pub mod repos;
