use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BusStop, Route};
use crate::state::AppState;

#[derive(Serialize)]
pub struct RouteWithStops {
    #[serde(flatten)]
    route: Route,
    stops: Vec<BusStop>,
}

// GET /api/routes
pub async fn list_routes(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Route>>, AppError> {
    let db = state.conn()?;
    Ok(Json(queries::list_routes(&db)?))
}

// GET /api/routes/:id
pub async fn get_route(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RouteWithStops>, AppError> {
    let db = state.conn()?;
    let route = queries::get_route(&db, &id)?
        .ok_or_else(|| AppError::NotFound(format!("route {id}")))?;
    let stops = queries::get_route_stops(&db, &route.id)?;
    Ok(Json(RouteWithStops { route, stops }))
}

#[derive(Deserialize)]
pub struct RouteInfoRequest {
    from_location: String,
    to_location: String,
}

// POST /api/routes/info
pub async fn route_info(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RouteInfoRequest>,
) -> Result<Json<RouteWithStops>, AppError> {
    let db = state.conn()?;
    let route = queries::find_route(&db, &req.from_location, &req.to_location)?.ok_or_else(|| {
        AppError::NotFound(format!(
            "no route from {} to {}",
            req.from_location.trim(),
            req.to_location.trim()
        ))
    })?;
    let stops = queries::get_route_stops(&db, &route.id)?;
    Ok(Json(RouteWithStops { route, stops }))
}
