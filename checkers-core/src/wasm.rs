//! WASM bindings for checkers-core
//!
//! Provides a JavaScript-friendly API for the game logic, so the browser
//! client can compute selection highlights, forced pieces, and legal moves
//! locally without a server round-trip.

use wasm_bindgen::prelude::*;

use crate::{Board, Move, Pos, Side};

fn parse_side(side: &str) -> Result<Side, JsValue> {
    Side::from_str(side).ok_or_else(|| JsValue::from_str("side must be WHITE or BLACK"))
}

/// WASM-friendly wrapper around Board
#[wasm_bindgen]
pub struct WasmBoard {
    inner: Board,
}

#[wasm_bindgen]
impl WasmBoard {
    /// Create a board with the standard starting position
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmBoard {
        WasmBoard {
            inner: Board::initial(),
        }
    }

    /// Rebuild a board from the wire shape `{squares: [[tag; 8]; 8]}`
    #[wasm_bindgen(js_name = fromJs)]
    pub fn from_js(value: JsValue) -> Result<WasmBoard, JsValue> {
        let inner: Board =
            serde_wasm_bindgen::from_value(value).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(WasmBoard { inner })
    }

    /// Get the board in its wire shape
    #[wasm_bindgen(js_name = toJs)]
    pub fn to_js(&self) -> JsValue {
        serde_wasm_bindgen::to_value(&self.inner).unwrap()
    }

    /// Legal moves for the piece at (row, col), ignoring other pieces'
    /// pending captures. Side is "WHITE" or "BLACK".
    #[wasm_bindgen(js_name = validMoves)]
    pub fn valid_moves(&self, row: i8, col: i8, side: &str) -> Result<JsValue, JsValue> {
        let side = parse_side(side)?;
        let moves = self.inner.valid_moves(Pos::new(row, col), side);
        Ok(serde_wasm_bindgen::to_value(&moves).unwrap())
    }

    /// Legal moves for the piece at (row, col) under the side-wide
    /// mandatory-capture rule; empty when the piece is not selectable.
    #[wasm_bindgen(js_name = selectableMoves)]
    pub fn selectable_moves(&self, row: i8, col: i8, side: &str) -> Result<JsValue, JsValue> {
        let side = parse_side(side)?;
        let moves = self.inner.selectable_moves(Pos::new(row, col), side);
        Ok(serde_wasm_bindgen::to_value(&moves).unwrap())
    }

    /// Positions of this side's pieces that must capture this turn,
    /// as an array of `{row, col}` records
    #[wasm_bindgen(js_name = forcedPositions)]
    pub fn forced_positions(&self, side: &str) -> Result<JsValue, JsValue> {
        let side = parse_side(side)?;
        let forced = self.inner.forced_positions(side);
        Ok(serde_wasm_bindgen::to_value(&forced).unwrap())
    }

    /// Apply a move in its wire shape `{from, to, captured?, chain?}`.
    /// Returns false (and leaves the board unchanged) if the move is not
    /// legal for the given side.
    #[wasm_bindgen(js_name = applyMove)]
    pub fn apply_move(&mut self, mv: JsValue, side: &str) -> Result<bool, JsValue> {
        let side = parse_side(side)?;
        let mv: Move =
            serde_wasm_bindgen::from_value(mv).map_err(|e| JsValue::from_str(&e.to_string()))?;
        match self.inner.apply_validated(&mv, side) {
            Ok(next) => {
                self.inner = next;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    /// Check if either side is out of pieces
    #[wasm_bindgen(js_name = isGameOver)]
    pub fn is_game_over(&self) -> bool {
        self.inner.is_game_over()
    }

    /// The winning side's wire tag, or undefined while both sides are alive
    pub fn winner(&self) -> Option<String> {
        self.inner.winner().map(|side| side.as_str().to_string())
    }
}
