pub mod auth_service;
pub mod datasource;
pub mod fixtures;
pub mod memory_store;
pub mod remote_methods;
pub mod storage_service;
pub mod where_clause;
