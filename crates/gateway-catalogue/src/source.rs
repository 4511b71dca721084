//! Where the catalogue's model list is fetched from.
//!
//! Enum dispatch rather than `dyn Trait`: there are exactly two concrete
//! sources (the real upstream and a fixed fake for tests), and both are
//! known at compile time.

use gateway_shared::model::ModelDescription;
use gateway_shared::{GatewayError, GatewayResult};

#[derive(Debug, Clone)]
pub enum ModelSourceKind {
    /// OpenRouter's `/models` endpoint.
    OpenRouter { client: reqwest::Client, base_url: String },
    /// A fixed list, for tests and local development.
    Fixed(Vec<ModelDescription>),
}

impl ModelSourceKind {
    pub fn open_router(base_url: impl Into<String>) -> Self {
        Self::OpenRouter { client: reqwest::Client::new(), base_url: base_url.into() }
    }

    pub async fn fetch(&self) -> GatewayResult<Vec<ModelDescription>> {
        match self {
            Self::OpenRouter { client, base_url } => {
                let url = format!("{base_url}/models");
                let response = client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| GatewayError::Internal(format!("catalogue fetch failed: {e}")))?;
                if !response.status().is_success() {
                    return Err(GatewayError::Internal(format!(
                        "catalogue fetch returned status {}",
                        response.status()
                    )));
                }
                response
                    .json::<Vec<ModelDescription>>()
                    .await
                    .map_err(|e| GatewayError::Internal(format!("catalogue response invalid: {e}")))
            }
            Self::Fixed(models) => Ok(models.clone()),
        }
    }
}
