pub mod backend;
pub mod page_views;
pub mod queries;
pub mod schema;
pub mod store_impl;
pub mod visitors;

pub use backend::DuckDbBackend;

/// Re-export the `duckdb` crate so consumers (especially tests) can use
/// `folio_duckdb::duckdb::params!` without an extra dependency.
pub use duckdb;
