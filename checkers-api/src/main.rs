//! Checkers session and turn service.
//!
//! The engine in `checkers-core` is pure; this service owns everything
//! around it: game lifecycle (`WAITING → IN_PROGRESS → FINISHED`), seat
//! assignment, turn arbitration, move validation against the engine's own
//! generated moves, and persistence.
//!
//! Games are stored in SQLite with the board as JSON text in the engine's
//! wire shape. A move executes as one read-modify-write sequence under the
//! connection lock, so two concurrent moves on the same game can never both
//! be applied to a stale board.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rand::{distr::Alphanumeric, Rng};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use checkers_core::{Board, Move, Pos, Side};

// =============================================================================
// Game Model
// =============================================================================

/// Lifecycle of a game session.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
enum GameStatus {
    #[serde(rename = "WAITING")]
    Waiting,
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[serde(rename = "FINISHED")]
    Finished,
}

impl GameStatus {
    fn as_str(self) -> &'static str {
        match self {
            GameStatus::Waiting => "WAITING",
            GameStatus::InProgress => "IN_PROGRESS",
            GameStatus::Finished => "FINISHED",
        }
    }

    fn from_str(s: &str) -> Option<GameStatus> {
        match s {
            "WAITING" => Some(GameStatus::Waiting),
            "IN_PROGRESS" => Some(GameStatus::InProgress),
            "FINISHED" => Some(GameStatus::Finished),
            _ => None,
        }
    }
}

/// One persisted game session.
#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Game {
    id: String,
    board: Board,
    current_player: Side,
    status: GameStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    player_white_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    player_black_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    player_white_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    player_black_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    winner: Option<Side>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
}

impl Game {
    /// A fresh game with the creator seated as White and a move pending for
    /// the second player to arrive.
    fn new(id: String, creator_name: String, creator_id: String) -> Game {
        Game {
            id,
            board: Board::initial(),
            current_player: Side::White,
            status: GameStatus::Waiting,
            player_white_id: Some(creator_id),
            player_black_id: None,
            player_white_name: Some(creator_name),
            player_black_name: None,
            winner: None,
            created_at: None,
        }
    }
}

/// Random alphanumeric identifier.
fn new_id(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

// =============================================================================
// Session Rules
// =============================================================================

#[derive(Debug, PartialEq, Eq)]
enum SeatError {
    Full,
}

/// Seat a player by name, following the original join semantics: a known
/// name rejoins its seat, otherwise the first free seat is taken (White,
/// then Black). Seating the second player starts the game. Returns the
/// assigned color and player id.
fn seat_player(game: &mut Game, name: &str, fresh_id: String) -> Result<(Side, String), SeatError> {
    if game.player_white_name.as_deref() == Some(name) {
        let id = game.player_white_id.get_or_insert(fresh_id).clone();
        return Ok((Side::White, id));
    }
    if game.player_black_name.as_deref() == Some(name) {
        let id = game.player_black_id.get_or_insert(fresh_id).clone();
        return Ok((Side::Black, id));
    }
    if game.player_white_id.is_none() {
        game.player_white_id = Some(fresh_id.clone());
        game.player_white_name = Some(name.to_string());
        return Ok((Side::White, fresh_id));
    }
    if game.player_black_id.is_none() {
        game.player_black_id = Some(fresh_id.clone());
        game.player_black_name = Some(name.to_string());
        game.status = GameStatus::InProgress;
        return Ok((Side::Black, fresh_id));
    }
    Err(SeatError::Full)
}

#[derive(Debug, PartialEq, Eq)]
enum TurnError {
    NotInProgress,
    NotYourTurn,
    InvalidMove,
}

/// Execute one turn: arbitration, validation against the engine's own move
/// set (including the side-wide mandatory-capture rule), application, and
/// the terminal check.
fn execute_move(game: &mut Game, player: Side, mv: &Move) -> Result<(), TurnError> {
    if game.status != GameStatus::InProgress {
        return Err(TurnError::NotInProgress);
    }
    if game.current_player != player {
        return Err(TurnError::NotYourTurn);
    }
    let next = game
        .board
        .apply_validated(mv, player)
        .map_err(|_| TurnError::InvalidMove)?;

    game.board = next;
    game.current_player = player.opponent();
    if game.board.is_game_over() {
        game.status = GameStatus::Finished;
        game.winner = game.board.winner();
    }
    Ok(())
}

/// Forfeit by the identified player, if seated and the game is running.
fn forfeit(game: &mut Game, player_id: &str) -> bool {
    if game.status != GameStatus::InProgress {
        return false;
    }
    let loser = if game.player_white_id.as_deref() == Some(player_id) {
        Side::White
    } else if game.player_black_id.as_deref() == Some(player_id) {
        Side::Black
    } else {
        return false;
    };
    game.status = GameStatus::Finished;
    game.winner = Some(loser.opponent());
    true
}

// =============================================================================
// Storage
// =============================================================================

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS games (
            id TEXT PRIMARY KEY,
            board TEXT NOT NULL,
            current_player TEXT NOT NULL,
            status TEXT NOT NULL,
            player_white_id TEXT,
            player_black_id TEXT,
            player_white_name TEXT,
            player_black_name TEXT,
            winner TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
}

fn bad_column<E>(err: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
{
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, err.into())
}

fn row_to_game(row: &rusqlite::Row<'_>) -> rusqlite::Result<Game> {
    let board_json: String = row.get("board")?;
    let board: Board = serde_json::from_str(&board_json).map_err(bad_column)?;

    let current_player: String = row.get("current_player")?;
    let current_player = Side::from_str(&current_player)
        .ok_or_else(|| bad_column(format!("unknown side tag: {current_player}")))?;

    let status: String = row.get("status")?;
    let status = GameStatus::from_str(&status)
        .ok_or_else(|| bad_column(format!("unknown status tag: {status}")))?;

    let winner = row
        .get::<_, Option<String>>("winner")?
        .map(|s| Side::from_str(&s).ok_or_else(|| bad_column(format!("unknown side tag: {s}"))))
        .transpose()?;

    Ok(Game {
        id: row.get("id")?,
        board,
        current_player,
        status,
        player_white_id: row.get("player_white_id")?,
        player_black_id: row.get("player_black_id")?,
        player_white_name: row.get("player_white_name")?,
        player_black_name: row.get("player_black_name")?,
        winner,
        created_at: row.get("created_at")?,
    })
}

fn insert_game(conn: &Connection, game: &Game) -> rusqlite::Result<()> {
    let board_json = serde_json::to_string(&game.board).map_err(bad_column)?;
    conn.execute(
        "INSERT INTO games (id, board, current_player, status,
                            player_white_id, player_black_id,
                            player_white_name, player_black_name, winner)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            game.id,
            board_json,
            game.current_player.as_str(),
            game.status.as_str(),
            game.player_white_id,
            game.player_black_id,
            game.player_white_name,
            game.player_black_name,
            game.winner.map(Side::as_str),
        ],
    )?;
    Ok(())
}

fn save_game(conn: &Connection, game: &Game) -> rusqlite::Result<()> {
    let board_json = serde_json::to_string(&game.board).map_err(bad_column)?;
    conn.execute(
        "UPDATE games
         SET board = ?1, current_player = ?2, status = ?3,
             player_white_id = ?4, player_black_id = ?5,
             player_white_name = ?6, player_black_name = ?7, winner = ?8
         WHERE id = ?9",
        params![
            board_json,
            game.current_player.as_str(),
            game.status.as_str(),
            game.player_white_id,
            game.player_black_id,
            game.player_white_name,
            game.player_black_name,
            game.winner.map(Side::as_str),
            game.id,
        ],
    )?;
    Ok(())
}

fn load_game(conn: &Connection, id: &str) -> rusqlite::Result<Option<Game>> {
    conn.query_row("SELECT * FROM games WHERE id = ?1", [id], row_to_game)
        .optional()
}

fn open_games(conn: &Connection) -> rusqlite::Result<Vec<Game>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM games WHERE status = ?1 ORDER BY created_at DESC LIMIT 10",
    )?;
    let games = stmt
        .query_map([GameStatus::Waiting.as_str()], row_to_game)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(games)
}

// =============================================================================
// API Types
// =============================================================================

struct AppStateInner {
    db: Mutex<Connection>,
}

type AppState = Arc<AppStateInner>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateGameRequest {
    player_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateGameResponse {
    game: Game,
    player_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinGameRequest {
    player_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JoinGameResponse {
    game: Game,
    player_color: Side,
    player_id: String,
}

#[derive(Deserialize)]
struct MovesQuery {
    row: i8,
    col: i8,
    player: Side,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MovesResponse {
    moves: Vec<Move>,
    forced_positions: Vec<Pos>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MakeMoveRequest {
    player_color: Side,
    #[serde(rename = "move")]
    mv: Move,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeaveGameRequest {
    player_id: String,
}

#[derive(Serialize)]
struct HealthModel {
    status: String,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            code,
            message: message.into(),
        }),
    )
}

fn storage_error(code: &'static str, err: rusqlite::Error) -> ApiError {
    tracing::error!(error = %err, "storage failure");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, code, "Something went wrong")
}

fn game_not_found(id: &str) -> ApiError {
    api_error(
        StatusCode::NOT_FOUND,
        "GAME_NOT_FOUND",
        format!("Game {id} not found"),
    )
}

// =============================================================================
// API Endpoints
// =============================================================================

async fn create_game(
    State(state): State<AppState>,
    Json(req): Json<CreateGameRequest>,
) -> ApiResult<CreateGameResponse> {
    let conn = state.db.lock().unwrap();

    let player_id = new_id(32);
    let game = Game::new(new_id(8), req.player_name, player_id.clone());
    insert_game(&conn, &game).map_err(|e| storage_error("FAILED_TO_CREATE", e))?;

    // Reload to pick up the database-assigned creation timestamp.
    let game = load_game(&conn, &game.id)
        .map_err(|e| storage_error("FAILED_TO_CREATE", e))?
        .ok_or_else(|| game_not_found(&game.id))?;

    tracing::info!(game = %game.id, player = ?game.player_white_name, "game created");
    Ok(Json(CreateGameResponse { game, player_id }))
}

async fn get_game(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Game> {
    let conn = state.db.lock().unwrap();
    let game = load_game(&conn, &id)
        .map_err(|e| storage_error("FAILED_TO_LOAD", e))?
        .ok_or_else(|| game_not_found(&id))?;
    Ok(Json(game))
}

async fn list_open_games(State(state): State<AppState>) -> ApiResult<Vec<Game>> {
    let conn = state.db.lock().unwrap();
    let games = open_games(&conn).map_err(|e| storage_error("FAILED_TO_LOAD", e))?;
    Ok(Json(games))
}

async fn join_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<JoinGameRequest>,
) -> ApiResult<JoinGameResponse> {
    let conn = state.db.lock().unwrap();
    let mut game = load_game(&conn, &id)
        .map_err(|e| storage_error("FAILED_TO_JOIN", e))?
        .ok_or_else(|| game_not_found(&id))?;

    let (player_color, player_id) = seat_player(&mut game, &req.player_name, new_id(32))
        .map_err(|_| api_error(StatusCode::CONFLICT, "GAME_FULL", "Game is full"))?;
    save_game(&conn, &game).map_err(|e| storage_error("FAILED_TO_JOIN", e))?;

    tracing::info!(
        game = %game.id,
        player = %req.player_name,
        color = player_color.as_str(),
        status = game.status.as_str(),
        "player joined"
    );
    Ok(Json(JoinGameResponse {
        game,
        player_color,
        player_id,
    }))
}

/// Legal moves for one square, plus the side-wide forced positions the
/// client needs to restrict piece selection. Both are empty when it is not
/// the requested side's turn.
async fn get_moves(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<MovesQuery>,
) -> ApiResult<MovesResponse> {
    let conn = state.db.lock().unwrap();
    let game = load_game(&conn, &id)
        .map_err(|e| storage_error("FAILED_TO_LOAD", e))?
        .ok_or_else(|| game_not_found(&id))?;

    if game.status != GameStatus::InProgress || game.current_player != query.player {
        return Ok(Json(MovesResponse {
            moves: Vec::new(),
            forced_positions: Vec::new(),
        }));
    }

    let from = Pos::new(query.row, query.col);
    Ok(Json(MovesResponse {
        moves: game.board.selectable_moves(from, query.player),
        forced_positions: game.board.forced_positions(query.player),
    }))
}

async fn make_move(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MakeMoveRequest>,
) -> ApiResult<Game> {
    // One lock span covers read, validation, and write: the move transaction.
    let conn = state.db.lock().unwrap();
    let mut game = load_game(&conn, &id)
        .map_err(|e| storage_error("FAILED_TO_MAKE_MOVE", e))?
        .ok_or_else(|| game_not_found(&id))?;

    execute_move(&mut game, req.player_color, &req.mv).map_err(|err| match err {
        TurnError::NotInProgress => api_error(
            StatusCode::CONFLICT,
            "GAME_NOT_IN_PROGRESS",
            "Game is not in progress",
        ),
        TurnError::NotYourTurn => {
            api_error(StatusCode::CONFLICT, "NOT_YOUR_TURN", "Not your turn")
        }
        TurnError::InvalidMove => {
            api_error(StatusCode::BAD_REQUEST, "INVALID_MOVE", "Invalid move")
        }
    })?;

    save_game(&conn, &game).map_err(|e| storage_error("FAILED_TO_MAKE_MOVE", e))?;

    tracing::info!(
        game = %game.id,
        player = req.player_color.as_str(),
        status = game.status.as_str(),
        "move applied"
    );
    Ok(Json(game))
}

async fn leave_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<LeaveGameRequest>,
) -> ApiResult<Game> {
    let conn = state.db.lock().unwrap();
    let mut game = load_game(&conn, &id)
        .map_err(|e| storage_error("FAILED_TO_LEAVE", e))?
        .ok_or_else(|| game_not_found(&id))?;

    if forfeit(&mut game, &req.player_id) {
        save_game(&conn, &game).map_err(|e| storage_error("FAILED_TO_LEAVE", e))?;
        tracing::info!(game = %game.id, winner = ?game.winner, "player left, game forfeited");
    }
    Ok(Json(game))
}

async fn health() -> Json<HealthModel> {
    Json(HealthModel {
        status: "ok".to_string(),
    })
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let db_path = std::env::var("CHECKERS_DB").unwrap_or_else(|_| "data/checkers.db".to_string());
    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn = Connection::open(&db_path).expect("open database");
    init_schema(&conn).expect("create schema");
    tracing::info!(path = %db_path, "database ready");

    let state: AppState = Arc::new(AppStateInner {
        db: Mutex::new(conn),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/games", post(create_game).get(list_open_games))
        .route("/games/{id}", get(get_game))
        .route("/games/{id}/join", post(join_game))
        .route("/games/{id}/moves", get(get_moves))
        .route("/games/{id}/move", post(make_move))
        .route("/games/{id}/leave", post(leave_game))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:5001").await.unwrap();
    tracing::info!("checkers API running on http://localhost:5001");
    axum::serve(listener, app).await.unwrap();
}
