//! Data models served by the fixture server.
//!
//! Datastore models (`Widget`, `Installation`, `Customer`) are persisted as
//! JSON documents through the Memory datasource; containers and files live
//! on disk.

pub mod container;
pub mod customer;
pub mod document;
pub mod filter;
pub mod geo_point;
pub mod installation;
pub mod widget;
