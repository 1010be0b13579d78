/// Re-export `Config` from `folio-core` for use within this crate.
///
/// Environment parsing lives in `folio-core` so integration tests can build
/// a `Config` without the server.
pub use folio_core::config::Config;
