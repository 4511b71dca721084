//! `GET /models?provider=` (spec §6, C3).

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use gateway_shared::model::ModelDescription;
use gateway_shared::GatewayResult;

use crate::auth::AuthenticatedUser;
use crate::state::AppState;

#[derive(Deserialize)]
struct ListModelsQuery {
    provider: Option<String>,
}

async fn list_models(
    State(state): State<AppState>,
    _auth: AuthenticatedUser,
    Query(query): Query<ListModelsQuery>,
) -> GatewayResult<Json<Vec<ModelDescription>>> {
    let models = state.orchestration.catalogue.get_all(query.provider.as_deref()).await?;
    Ok(Json(models))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/models", get(list_models))
}
