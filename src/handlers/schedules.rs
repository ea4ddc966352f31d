use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, Sse};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use super::user_for_token;
use crate::db::queries;
use crate::errors::AppError;
use crate::ledger::ScheduleOffer;
use crate::models::{ScheduleDetail, Seat};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SearchRequest {
    from_location: String,
    to_location: String,
    journey_date: String,
    passengers: i64,
}

// POST /api/schedules/search
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<Vec<ScheduleOffer>>, AppError> {
    let date = NaiveDate::parse_from_str(req.journey_date.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation("journey_date must be YYYY-MM-DD".to_string()))?;

    let offers = state.ledger.search_schedules(
        &req.from_location,
        &req.to_location,
        date,
        req.passengers,
    )?;

    tracing::info!(
        from = %req.from_location.trim(),
        to = %req.to_location.trim(),
        date = %date,
        results = offers.len(),
        "schedule search"
    );
    Ok(Json(offers))
}

// GET /api/schedules/:id
pub async fn get_schedule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ScheduleDetail>, AppError> {
    let db = state.conn()?;
    let detail = queries::get_schedule_detail(&db, &id)?
        .ok_or_else(|| AppError::NotFound(format!("schedule {id}")))?;
    Ok(Json(detail))
}

#[derive(Serialize)]
pub struct SeatView {
    #[serde(flatten)]
    seat: Seat,
    claimed: bool,
    bookable: bool,
}

// GET /api/schedules/:id/seats
pub async fn get_seats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<SeatView>>, AppError> {
    let db = state.conn()?;
    let detail = queries::get_schedule_detail(&db, &id)?
        .ok_or_else(|| AppError::NotFound(format!("schedule {id}")))?;

    let claimed: HashSet<String> = queries::get_claimed_seat_ids(&db, &id)?.into_iter().collect();
    let seats = queries::get_seats_for_bus(&db, &detail.bus.id)?
        .into_iter()
        .map(|seat| {
            let is_claimed = claimed.contains(&seat.id);
            SeatView {
                bookable: seat.status.is_bookable() && !is_claimed,
                claimed: is_claimed,
                seat,
            }
        })
        .collect();

    Ok(Json(seats))
}

#[derive(Deserialize)]
pub struct SseQuery {
    token: Option<String>,
}

// GET /api/schedules/:id/events
pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    // EventSource can't set headers, so the token comes in the query string
    user_for_token(&state, query.token.as_deref().unwrap_or(""))?;

    {
        let db = state.conn()?;
        if queries::get_schedule_detail(&db, &id)?.is_none() {
            return Err(AppError::NotFound(format!("schedule {id}")));
        }
    }

    let rx = state.ledger.subscribe();
    let live_stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) if event.schedule_id() == id => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().data(data).event(event.name())))
        }
        Ok(_) => None,
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(_)) => None,
    });

    let keepalive_stream = tokio_stream::StreamExt::map(
        tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(Duration::from_secs(30))),
        |_| Ok(Event::default().comment("keepalive")),
    );

    Ok(Sse::new(StreamExt::merge(live_stream, keepalive_stream)))
}
