use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("unsupported delivery scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid delivery url: {0}")]
    InvalidUrl(String),

    #[error("storage error: {0}")]
    Store(#[from] eventcast_store::StoreError),
}
