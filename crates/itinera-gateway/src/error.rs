use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Gateway server error: {0}")]
    ServerError(String),
}
