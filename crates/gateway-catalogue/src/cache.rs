//! Fetch-once-then-serve model catalogue (spec §4.3).

use std::sync::Arc;
use std::time::Duration;

use gateway_shared::model::ModelDescription;
use gateway_shared::GatewayResult;
use moka::future::Cache;

use crate::source::ModelSourceKind;

/// Single logical cache slot; `moka`'s `get_with` collapses concurrent
/// misses into one fetch, satisfying the "only one refetch in flight"
/// requirement without hand-rolled locking.
const SLOT: () = ();

#[derive(Debug)]
pub struct ModelCatalogue {
    source: ModelSourceKind,
    cache: Cache<(), Arc<Vec<ModelDescription>>>,
}

impl ModelCatalogue {
    pub fn new(source: ModelSourceKind, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(1).time_to_live(ttl).build();
        Self { source, cache }
    }

    async fn snapshot(&self) -> GatewayResult<Arc<Vec<ModelDescription>>> {
        self.cache
            .try_get_with(SLOT, async { self.source.fetch().await.map(Arc::new) })
            .await
            .map_err(|e| (*e).clone())
    }

    pub async fn get_all(&self, provider: Option<&str>) -> GatewayResult<Vec<ModelDescription>> {
        let models = self.snapshot().await?;
        Ok(match provider {
            Some(p) => models.iter().filter(|m| m.provider == p).cloned().collect(),
            None => models.as_ref().clone(),
        })
    }

    pub async fn get_by_id(&self, id: &str) -> GatewayResult<Option<ModelDescription>> {
        let models = self.snapshot().await?;
        Ok(models.iter().find(|m| m.id == id).cloned())
    }

    /// Forces the next access to refetch, regardless of TTL.
    pub fn invalidate(&self) {
        self.cache.invalidate(&SLOT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_shared::model::{ModelArchitecture, ModelPricing};

    fn fake_model(id: &str) -> ModelDescription {
        ModelDescription {
            id: id.to_string(),
            provider: "test-provider".to_string(),
            context_length: 128_000,
            pricing: ModelPricing::default(),
            architecture: ModelArchitecture::default(),
            supports_reasoning: false,
            supports_native_web_search: false,
            supports_structured_outputs: true,
        }
    }

    #[tokio::test]
    async fn serves_fixed_source_and_filters_by_provider() {
        let catalogue = ModelCatalogue::new(
            ModelSourceKind::Fixed(vec![fake_model("a")]),
            Duration::from_secs(3600),
        );
        let all = catalogue.get_all(None).await.unwrap();
        assert_eq!(all.len(), 1);
        let found = catalogue.get_by_id("a").await.unwrap();
        assert!(found.is_some());
        let missing = catalogue.get_by_id("nope").await.unwrap();
        assert!(missing.is_none());
    }
}
