use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{
        sse::{Event, Sse},
        Json,
    },
    routing::{get, post},
    Router,
};
use rand::Rng;
use serde::Deserialize;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use farm_coord::{CoordError, SubmitOutcome};
use farm_core::{GameId, PlayerId, RoundDecision, SkillTier};

use crate::state::{now_unix, AppState, RoundAdvanced};

#[cfg(test)]
pub fn make_router(state: AppState) -> Router {
    make_router_with_cors(state, "http://localhost:5173")
}

pub fn make_router_with_cors(state: AppState, cors_origin: &str) -> Router {
    let cors = match cors_origin.parse::<axum::http::HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any),
        Err(err) => {
            tracing::warn!("invalid cors origin {cors_origin}: {err}; allowing any");
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(Any)
        }
    };

    Router::new()
        .route("/api/v1/games", post(create_game_handler).get(list_games_handler))
        .route("/api/v1/games/:id", get(snapshot_handler))
        .route("/api/v1/games/:id/meta", get(meta_handler))
        .route("/api/v1/games/:id/advance", post(advance_handler))
        .route(
            "/api/v1/games/:id/players/:player_id/decision",
            post(submit_handler),
        )
        .route("/api/v1/games/:id/stream", get(stream_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_response(err: &CoordError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match err {
        CoordError::NotFound(_) => StatusCode::NOT_FOUND,
        CoordError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        CoordError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        CoordError::Conflict(_) => StatusCode::CONFLICT,
        CoordError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": err.to_string() })))
}

#[derive(Deserialize)]
pub struct CreateGameRequest {
    pub total_rounds: u32,
    #[serde(default)]
    pub round_deadline_secs: u64,
    #[serde(default)]
    pub player_label: String,
    pub num_players: u32,
    #[serde(default)]
    pub num_ai: u32,
    pub ai_skill: SkillTier,
    /// Event seed; a random one is drawn when absent.
    pub seed: Option<u64>,
}

pub async fn create_game_handler(
    State(app_state): State<AppState>,
    Json(req): Json<CreateGameRequest>,
) -> Result<Json<farm_core::Game>, (StatusCode, Json<serde_json::Value>)> {
    let seed = req.seed.unwrap_or_else(|| rand::thread_rng().gen());
    let id = GameId(format!("game_{:08x}", rand::thread_rng().gen::<u32>()));
    let settings = farm_core::GameSettings {
        total_rounds: req.total_rounds,
        round_deadline_secs: req.round_deadline_secs,
        player_label: req.player_label,
    };
    let config = farm_core::GameConfig {
        num_players: req.num_players,
        num_ai: req.num_ai,
        ai_skill: req.ai_skill,
    };
    app_state
        .coordinator
        .create_game(id, settings, config, seed, now_unix())
        .map(Json)
        .map_err(|err| error_response(&err))
}

pub async fn list_games_handler(State(app_state): State<AppState>) -> Json<Vec<GameId>> {
    Json(app_state.coordinator.game_ids())
}

pub async fn snapshot_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<farm_core::Game>, (StatusCode, Json<serde_json::Value>)> {
    app_state
        .coordinator
        .game(&GameId(id))
        .map(Json)
        .map_err(|err| error_response(&err))
}

pub async fn meta_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let game = app_state
        .coordinator
        .game(&GameId(id))
        .map_err(|err| error_response(&err))?;
    Ok(Json(serde_json::json!({
        "id": game.id,
        "status": game.status,
        "current_round": game.current_round,
        "total_rounds": game.settings.total_rounds,
        "round_deadline_unix": game.round_deadline_unix,
        "players": game.players.len(),
        "content_version": app_state.coordinator.content().content_version,
    })))
}

pub async fn submit_handler(
    State(app_state): State<AppState>,
    Path((id, player_id)): Path<(String, String)>,
    Json(decision): Json<RoundDecision>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let game_id = GameId(id);
    let outcome = app_state
        .coordinator
        .submit_decision(&game_id, &PlayerId(player_id), &decision, now_unix())
        .map_err(|err| error_response(&err))?;
    match outcome {
        SubmitOutcome::Submitted => Ok(Json(serde_json::json!({ "status": "submitted" }))),
        SubmitOutcome::Calculated(round) => {
            let _ = app_state.round_tx.send(RoundAdvanced {
                game_id,
                round: round.number,
            });
            Ok(Json(serde_json::json!({
                "status": "calculated",
                "round": round,
            })))
        }
    }
}

/// Manual advancement, same path the deadline sweep takes: synthesizes
/// decisions for everyone who has not submitted.
pub async fn advance_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let game_id = GameId(id);
    let round = app_state
        .coordinator
        .advance_round(&game_id, now_unix())
        .map_err(|err| error_response(&err))?;
    let _ = app_state.round_tx.send(RoundAdvanced {
        game_id: game_id.clone(),
        round,
    });
    Ok(Json(serde_json::json!({ "game_id": game_id, "round": round })))
}

pub async fn stream_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let game_id = GameId(id);
    let mut rx = app_state.round_tx.subscribe();
    let coordinator = app_state.coordinator.clone();

    let stream = async_stream::stream! {
        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(frame) if frame.game_id == game_id => {
                            let data = serde_json::to_string(&frame).unwrap_or_default();
                            yield Ok(Event::default().data(data));
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = tokio::time::sleep(Duration::from_secs(5)) => {
                    let round = coordinator.game(&game_id).map_or(0, |g| g.current_round);
                    let heartbeat = serde_json::json!({"heartbeat": true, "round": round});
                    yield Ok(Event::default().data(heartbeat.to_string()));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{body::Body, http::Request, http::StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use farm_core::test_fixtures::base_content;
    use farm_core::{Crop, RoundDecision, PARCEL_COUNT};

    use super::*;

    fn make_test_state() -> AppState {
        let coordinator = Arc::new(farm_coord::RoundCoordinator::new(
            farm_coord::MemoryStore::new(),
            base_content(),
        ));
        let (round_tx, _) = tokio::sync::broadcast::channel(64);
        AppState {
            coordinator,
            round_tx,
        }
    }

    fn create_request() -> Request<Body> {
        let body = serde_json::json!({
            "total_rounds": 12,
            "round_deadline_secs": 300,
            "player_label": "Farm",
            "num_players": 1,
            "num_ai": 2,
            "ai_skill": "Middle",
            "seed": 7,
        });
        Request::builder()
            .method("POST")
            .uri("/api/v1/games")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn create_game(state: &AppState) -> farm_core::Game {
        let response = make_router(state.clone())
            .oneshot(create_request())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn wheat_decision() -> RoundDecision {
        RoundDecision {
            machine_investment: 1,
            fertilizer: true,
            pesticide: false,
            organisms: false,
            organic: false,
            crops: vec![Crop::Wheat; PARCEL_COUNT],
            fixed_prices: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_game_returns_waiting_game() {
        let state = make_test_state();
        let game = create_game(&state).await;
        assert_eq!(game.status, farm_core::GameStatus::Waiting);
        assert_eq!(game.current_round, 0);
        assert_eq!(game.players.len(), 3);
    }

    #[tokio::test]
    async fn test_snapshot_roundtrips_created_game() {
        let state = make_test_state();
        let game = create_game(&state).await;

        let response = make_router(state)
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/games/{}", game.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let fetched: farm_core::Game = serde_json::from_slice(&body).unwrap();
        assert_eq!(fetched, game);
    }

    #[tokio::test]
    async fn test_meta_reports_round_and_content_version() {
        let state = make_test_state();
        let game = create_game(&state).await;

        let response = make_router(state)
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/games/{}/meta", game.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["current_round"], 0);
        assert_eq!(json["total_rounds"], 12);
        assert_eq!(json["content_version"], "test");
    }

    #[tokio::test]
    async fn test_unknown_game_is_404() {
        let state = make_test_state();
        let response = make_router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/v1/games/game_ffffffff")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sole_human_submission_calculates_round() {
        let state = make_test_state();
        let game = create_game(&state).await;

        let response = make_router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!(
                        "/api/v1/games/{}/players/player_01/decision",
                        game.id
                    ))
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_string(&wheat_decision()).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "calculated");
        assert_eq!(json["round"]["number"], 1);
    }

    #[tokio::test]
    async fn test_submission_by_stranger_is_403() {
        let state = make_test_state();
        let game = create_game(&state).await;

        let response = make_router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/games/{}/players/stranger/decision", game.id))
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_string(&wheat_decision()).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_submission_to_finished_game_is_403() {
        let state = make_test_state();
        let body = serde_json::json!({
            "total_rounds": 1,
            "num_players": 1,
            "ai_skill": "Middle",
            "seed": 7,
        });
        let response = make_router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/games")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let game: farm_core::Game = serde_json::from_slice(&bytes).unwrap();
        let uri = format!("/api/v1/games/{}/players/player_01/decision", game.id);

        let submit_request = |uri: &str| {
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&wheat_decision()).unwrap()))
                .unwrap()
        };
        // First submission finishes the one-round game.
        let response = make_router(state.clone())
            .oneshot(submit_request(&uri))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let response = make_router(state)
            .oneshot(submit_request(&uri))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_invalid_decision_is_400() {
        let state = make_test_state();
        let game = create_game(&state).await;

        let mut decision = wheat_decision();
        decision.crops.truncate(1);
        let response = make_router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!(
                        "/api/v1/games/{}/players/player_01/decision",
                        game.id
                    ))
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_string(&decision).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_manual_advance_fills_in_agents() {
        let state = make_test_state();
        let game = create_game(&state).await;

        let response = make_router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/games/{}/advance", game.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let stored = state.coordinator.game(&game.id).unwrap();
        assert_eq!(stored.current_round, 1);
        for player in stored.players.values() {
            assert_eq!(player.history.len(), 2);
        }
    }
}
