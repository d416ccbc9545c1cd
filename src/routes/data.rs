use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::services::graph_service::{self, GraphStats, NodeWithEdges, SalesView};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDataResponse {
    pub success: bool,
    pub graph_data: Vec<NodeWithEdges>,
    pub stats: GraphStats,
}

/// GET /api/data: graph read with resolved metadata and stats.
pub async fn graph_data(State(state): State<AppState>) -> AppResult<Json<GraphDataResponse>> {
    let (graph_data, stats) = graph_service::graph_overview(&state.pool).await?;
    Ok(Json(GraphDataResponse {
        success: true,
        graph_data,
        stats,
    }))
}

/// GET /api/sales/:id: sales-scoped conversations, read-only.
pub async fn sales_conversations(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<SalesView>> {
    let view = graph_service::sales_view(&state.pool, &id).await?;
    Ok(Json(view))
}
