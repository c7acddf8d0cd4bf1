use thiserror::Error;

/// Geo cache errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The request lacks a usable position. No upstream fetch is attempted.
    #[error("invalid request: missing or unparseable `{field}`")]
    InvalidRequest { field: &'static str },

    /// The cache was built without any slots.
    #[error("no cache slots configured")]
    NoSlots,
}
