use axum::{extract::State, Json};

use crate::errors::ApiResponse;
use crate::models::model_info::ModelList;
use crate::AppState;

/// GET /models: configured models in configuration order.
pub async fn list(State(state): State<AppState>) -> Json<ApiResponse<ModelList>> {
    ApiResponse::success(ModelList {
        models: state.registry.catalogue().to_vec(),
    })
}
