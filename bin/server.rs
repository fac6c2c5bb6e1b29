// Battle Ledger - Web Server
// Read-only JSON API over the battle analyzer

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use battle_ledger::{
    init_logging, AppConfig, BattleAnalyzer, BattleStats, LedgerAuditor, OpponentRef, Pokemon,
    Rarity, TypeWinRate,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Shared application state
///
/// The analyzer is immutable after load, so no lock is needed.
#[derive(Clone)]
struct AppState {
    analyzer: Arc<BattleAnalyzer>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        (
            StatusCode::OK,
            Json(Self {
                success: true,
                data: Some(data),
                error: None,
            }),
        )
            .into_response()
    }

    fn fail(status: StatusCode, message: String) -> Response {
        (
            status,
            Json(Self {
                success: false,
                data: None,
                error: Some(message),
            }),
        )
            .into_response()
    }
}

#[derive(Deserialize)]
struct RosterQuery {
    rarity: Option<String>,
}

/// Health response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    pokemon: usize,
    battles: usize,
    ledger_origin: String,
    loaded_at: String,
}

/// Stats response (adds the derived win rate)
#[derive(Serialize)]
struct StatsResponse {
    id: String,
    #[serde(flatten)]
    stats: BattleStats,
    win_rate: f64,
}

// ============================================================================
// API Handlers
// ============================================================================

/// 404 unless `id` is in the roster
fn known_pokemon<'a>(state: &'a AppState, id: &str) -> Result<&'a Pokemon, Response> {
    battle_ledger::EntityId::parse(id)
        .and_then(|entity_id| state.analyzer.roster().get(&entity_id))
        .ok_or_else(|| ApiResponse::<()>::fail(StatusCode::NOT_FOUND, format!("unknown pokemon {:?}", id)))
}

/// GET /api/health - Health check
async fn health_check(State(state): State<AppState>) -> Response {
    let ledger = state.analyzer.ledger();

    ApiResponse::ok(HealthResponse {
        status: if state.analyzer.is_loaded() { "OK" } else { "EMPTY" },
        version: battle_ledger::VERSION,
        pokemon: state.analyzer.roster().len(),
        battles: ledger.len(),
        ledger_origin: ledger.origin().to_string(),
        loaded_at: ledger.loaded_at().to_rfc3339(),
    })
}

/// GET /api/pokemon?rarity= - Roster, rarest first, optionally filtered
async fn list_pokemon(State(state): State<AppState>, Query(query): Query<RosterQuery>) -> Response {
    let filter = match query.rarity.as_deref() {
        None | Some("all") => None,
        Some(value) => match Rarity::parse(value) {
            Some(r) => Some(r),
            None => {
                return ApiResponse::<()>::fail(StatusCode::BAD_REQUEST, format!("unknown rarity {:?}", value))
            }
        },
    };

    ApiResponse::ok(state.analyzer.roster().listing(filter))
}

/// GET /api/pokemon/:id - Full detail report
async fn get_report(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.analyzer.report(&id) {
        Some(report) => ApiResponse::ok(report),
        None => ApiResponse::<()>::fail(StatusCode::NOT_FOUND, format!("unknown pokemon {:?}", id)),
    }
}

/// GET /api/pokemon/:id/stats - Wins, losses, total
async fn get_stats(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if let Err(response) = known_pokemon(&state, &id) {
        return response;
    }

    let stats = state.analyzer.battle_stats(&id);
    ApiResponse::ok(StatsResponse {
        id,
        win_rate: stats.win_rate(),
        stats,
    })
}

/// GET /api/pokemon/:id/defeated-by - Pokemon that beat this one
async fn get_defeated_by(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if let Err(response) = known_pokemon(&state, &id) {
        return response;
    }

    let opponents: Vec<OpponentRef> = state
        .analyzer
        .pokemon_that_defeated(&id)
        .into_iter()
        .map(OpponentRef::from)
        .collect();
    ApiResponse::ok(opponents)
}

/// GET /api/pokemon/:id/defeats - Pokemon this one beat
async fn get_defeats(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if let Err(response) = known_pokemon(&state, &id) {
        return response;
    }

    let opponents: Vec<OpponentRef> = state
        .analyzer
        .pokemon_defeated_by(&id)
        .into_iter()
        .map(OpponentRef::from)
        .collect();
    ApiResponse::ok(opponents)
}

/// GET /api/pokemon/:id/type-win-rates - Win rate by opponent type, best first
async fn get_type_win_rates(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if let Err(response) = known_pokemon(&state, &id) {
        return response;
    }

    let rates: Vec<TypeWinRate> = state.analyzer.win_rate_by_opponent_type(&id);
    ApiResponse::ok(rates)
}

/// GET /api/audit - Ledger audit summary
async fn get_audit(State(state): State<AppState>) -> Response {
    let report = LedgerAuditor::new().audit(state.analyzer.ledger(), state.analyzer.roster());
    ApiResponse::ok(report)
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/pokemon", get(list_pokemon))
        .route("/pokemon/:id", get(get_report))
        .route("/pokemon/:id/stats", get(get_stats))
        .route("/pokemon/:id/defeated-by", get(get_defeated_by))
        .route("/pokemon/:id/defeats", get(get_defeats))
        .route("/pokemon/:id/type-win-rates", get(get_type_win_rates))
        .route("/audit", get(get_audit))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = AppConfig::from_env()?;

    // Single-shot load; every request after this is a pure read
    let load_config = config.clone();
    let analyzer = match tokio::task::spawn_blocking(move || BattleAnalyzer::from_config(&load_config)).await? {
        Ok(analyzer) => analyzer,
        Err(e) => {
            error!(error = %e, "battle data unavailable, aborting");
            return Err(e.into());
        }
    };

    let state = AppState {
        analyzer: Arc::new(analyzer),
    };

    let listener = tokio::net::TcpListener::bind(config.server_addr).await?;
    info!(addr = %config.server_addr, "🚀 battle ledger API listening");

    axum::serve(listener, router(state)).await?;
    Ok(())
}
