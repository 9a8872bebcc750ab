use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDateTime;
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error};
use transit_planner_core::{
    Error as CoreError, Journey, JourneyRequest, StopNode, WeightScheme, plan_journey,
};

use crate::{map::itinerary_to_geojson, state::AppState};

pub fn build_router(state: Arc<AppState>, max_concurrent_requests: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stops", get(find_stop))
        .route("/journey", post(journey))
        .route("/journey/geojson", post(journey_geojson))
        .layer(GlobalConcurrencyLimitLayer::new(max_concurrent_requests))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnknownStop(_) | CoreError::NotFound { .. } => {
                ApiError::NotFound(err.to_string())
            }
            CoreError::MalformedTime(_) | CoreError::InvalidData(_) => {
                ApiError::BadRequest(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(message) => {
                error!("{message}");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    stops: usize,
    edges: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        stops: state.graph.node_count(),
        edges: state.graph.edge_count(),
    })
}

#[derive(Debug, Deserialize)]
struct StopQuery {
    name: Option<String>,
    id: Option<String>,
}

async fn find_stop(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StopQuery>,
) -> Result<Json<StopNode>, ApiError> {
    let stop = match (&query.name, &query.id) {
        (Some(name), _) => state.graph.stop_by_name(name),
        (None, Some(id)) => state.graph.stop_by_id(id),
        (None, None) => return Err(ApiError::BadRequest("expected `name` or `id`".into())),
    };
    stop.cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("no such stop".into()))
}

/// Journey query as posted by clients
#[derive(Debug, Deserialize)]
struct JourneyBody {
    from: String,
    to: String,
    departure: NaiveDateTime,
    #[serde(default)]
    scheme: WeightScheme,
    #[serde(default)]
    avoid_congestion: bool,
    #[serde(default)]
    flagged_stops: Vec<String>,
    congestion_factor: Option<f64>,
}

impl JourneyBody {
    fn into_request(self, state: &AppState) -> Result<JourneyRequest, ApiError> {
        if self.from.trim().is_empty() || self.to.trim().is_empty() {
            return Err(ApiError::BadRequest("`from` and `to` must not be empty".into()));
        }
        let congestion_factor = self.congestion_factor.unwrap_or(state.congestion_factor);
        if !congestion_factor.is_finite() {
            return Err(ApiError::BadRequest("congestion_factor must be a number".into()));
        }

        let mut request = JourneyRequest::new(self.from, self.to, self.departure)
            .with_deadline(Instant::now() + state.query_timeout);
        request.scheme = self.scheme;
        request.avoid_congestion = self.avoid_congestion;
        request.flagged_stops = self.flagged_stops;
        request.congestion_factor = congestion_factor;
        Ok(request)
    }
}

/// Runs the search off the async workers; it is CPU bound
async fn plan(state: Arc<AppState>, body: JourneyBody) -> Result<Journey, ApiError> {
    let request = body.into_request(&state)?;
    debug!(from = %request.from, to = %request.to, "planning journey");
    tokio::task::spawn_blocking(move || plan_journey(&state.graph, &state.estimator, &request))
        .await
        .map_err(|e| ApiError::Internal(format!("journey task failed: {e}")))?
        .map_err(ApiError::from)
}

async fn journey(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<JourneyBody>, JsonRejection>,
) -> Result<Json<Journey>, ApiError> {
    let Json(body) = payload?;
    plan(state, body).await.map(Json)
}

async fn journey_geojson(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<JourneyBody>, JsonRejection>,
) -> Result<Json<FeatureCollection>, ApiError> {
    let Json(body) = payload?;
    let journey = plan(state, body).await?;
    itinerary_to_geojson(&journey.itinerary)
        .map(Json)
        .map_err(ApiError::Internal)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, header},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use transit_planner_core::{
        Route, Stop, StopTime, Timetable, TransportMode, Trip, build_graph,
    };

    use super::*;
    use crate::config::ServerConfig;

    fn state() -> Arc<AppState> {
        let stop = |id: &str, name: &str| Stop {
            stop_id: id.into(),
            name: name.into(),
            lat: 50.63,
            lon: 3.06,
        };
        let stop_time = |stop: &str, seq: u32, time: u32| StopTime {
            trip_id: "T".into(),
            stop_id: stop.into(),
            sequence: seq,
            arrival: Some(time),
            departure: Some(time),
        };
        let timetable = Timetable {
            stops: vec![
                stop("A", "Gare"),
                stop("B", "Mairie"),
                stop("C", "Port"),
                stop("Z", "Depot"),
            ],
            trips: vec![Trip {
                trip_id: "T".into(),
                route_id: "R".into(),
            }],
            routes: vec![Route {
                route_id: "R".into(),
                short_name: "12".into(),
                long_name: String::new(),
                mode: TransportMode::Bus,
            }],
            stop_times: vec![
                stop_time("A", 1, 8 * 3600),
                stop_time("B", 2, 8 * 3600 + 300),
                stop_time("C", 3, 8 * 3600 + 900),
            ],
            transfers: vec![],
        };
        let config = ServerConfig::default();
        let graph = build_graph(&timetable, &config.graph);
        Arc::new(AppState::new(&timetable, graph, &config))
    }

    fn app() -> Router {
        build_router(state(), 4)
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_graph_size() {
        let (status, body) = send(get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stops"], 4);
        assert_eq!(body["edges"], 2);
    }

    #[tokio::test]
    async fn looks_up_stops() {
        let (status, body) = send(get("/stops?name=Mairie")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stop_id"], "B");

        let (status, _) = send(get("/stops?name=Nowhere")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(get("/stops")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn plans_journey() {
        let request = json!({"from": "A", "to": "C", "departure": "2025-01-06T07:58:00"});
        let (status, body) = send(post_json("/journey", &request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["path"]["stops"], json!(["A", "B", "C"]));

        let legs = body["itinerary"]["legs"].as_array().unwrap();
        assert_eq!(legs.len(), 3);
        assert_eq!(legs[0]["departure"], "2025-01-06T08:00:00");
        assert_eq!(legs[0]["wait_seconds"], 120);
        assert_eq!(legs[0]["route_name"], "12");
        assert_eq!(body["itinerary"]["total_duration"], 900);
    }

    #[tokio::test]
    async fn maps_errors_to_statuses() {
        let unknown = json!({"from": "Q", "to": "C", "departure": "2025-01-06T08:00:00"});
        let (status, body) = send(post_json("/journey", &unknown)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("Unknown stop"));

        let unreachable = json!({"from": "A", "to": "Z", "departure": "2025-01-06T08:00:00"});
        let (status, body) = send(post_json("/journey", &unreachable)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("No path"));

        let malformed = json!({"from": "A", "to": "C", "departure": "tomorrow"});
        let (status, _) = send(post_json("/journey", &malformed)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let empty = json!({"from": " ", "to": "C", "departure": "2025-01-06T08:00:00"});
        let (status, _) = send(post_json("/journey", &empty)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn renders_geojson() {
        let request = json!({"from": "A", "to": "C", "departure": "2025-01-06T08:00:00"});
        let (status, body) = send(post_json("/journey/geojson", &request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "FeatureCollection");

        let features = body["features"].as_array().unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[0]["geometry"]["type"], "LineString");
        assert_eq!(features[0]["properties"]["mode"], "Bus");
        assert_eq!(features[2]["geometry"]["type"], "Point");
    }
}
