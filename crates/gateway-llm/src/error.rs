use gateway_shared::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("model '{0}' not found")]
    ModelNotFound(String),

    #[error("reserved additional-data key '{0}' may not be requested")]
    ReservedKey(String),

    #[error("{0}")]
    UnsupportedInput(String),

    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned an error: {0}")]
    UpstreamStatus(String),
}

impl From<AdapterError> for GatewayError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::ModelNotFound(id) => GatewayError::NotFound(format!("model '{id}'")),
            AdapterError::ReservedKey(key) => GatewayError::InvalidArgument(format!(
                "additional data key '{key}' is reserved for internal use"
            )),
            AdapterError::UnsupportedInput(msg) => GatewayError::Unsupported(msg),
            AdapterError::Transport(e) => GatewayError::UpstreamLlmFailure(e.to_string()),
            AdapterError::UpstreamStatus(msg) => GatewayError::UpstreamLlmFailure(msg),
        }
    }
}
