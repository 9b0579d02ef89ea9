//! WASM bindings for frontend match replay

#![cfg(feature = "wasm")]

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::interaction::interactions_to_strings;
use crate::pairing::{round_robin_count, round_robin_pairs};
use crate::strategy::describe_strategy;
use crate::tournament::{Output, Tournament, TournamentConfig};
use crate::{Match, PlayerSpec, Strategy, StrategyBase};

/// Parse a player JSON string.
///
/// Accepts two formats:
/// - Player:   `{"base": {"base": "TitForTat"}, "transformers": [...]}`
/// - Strategy: `{"base": "TitForTat", "params": {...}}` (no transformers)
fn parse_player(json: &str) -> Result<PlayerSpec, String> {
    if let Ok(spec) = serde_json::from_str::<PlayerSpec>(json) {
        return Ok(spec);
    }
    let strategy: Strategy =
        serde_json::from_str(json).map_err(|e| format!("Invalid player: {}", e))?;
    Ok(PlayerSpec::from(strategy))
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsError> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
}

#[derive(Serialize)]
struct Replay {
    names: (String, String),
    actions: (String, String),
    scores: (f64, f64),
    cooperation: (usize, usize),
}

/// Replay a match with full turn-by-turn details
///
/// # Arguments
/// * `first_json` - JSON serialized player or strategy for the first player
/// * `second_json` - JSON serialized player or strategy for the second player
/// * `turns` - Match length
/// * `noise` - Probability of flipping each action
/// * `seed` - Match seed
#[wasm_bindgen]
pub fn replay_match(
    first_json: &str,
    second_json: &str,
    turns: u32,
    noise: f64,
    seed: u64,
) -> Result<JsValue, JsError> {
    let first = parse_player(first_json)
        .map_err(|e| JsError::new(&format!("Invalid first player: {}", e)))?;
    let second = parse_player(second_json)
        .map_err(|e| JsError::new(&format!("Invalid second player: {}", e)))?;
    let names = (first.name(), second.name());

    let mut game = Match::builder(first, second)
        .turns(turns)
        .noise(noise)
        .and_then(|builder| builder.seed(seed).build())
        .map_err(|e| JsError::new(&e.to_string()))?;
    let actions = interactions_to_strings(game.play().map_err(|e| JsError::new(&e.to_string()))?);

    to_js(&Replay {
        names,
        actions,
        scores: game.final_score().unwrap_or((0.0, 0.0)),
        cooperation: game.cooperation().unwrap_or((0, 0)),
    })
}

/// Play a seeded round robin in memory and return its ResultSet
#[wasm_bindgen]
pub fn play_tournament(
    players_json: &str,
    turns: u32,
    repetitions: usize,
    seed: u64,
) -> Result<JsValue, JsError> {
    let players: Vec<PlayerSpec> = serde_json::from_str(players_json)
        .map_err(|e| JsError::new(&format!("Invalid players: {}", e)))?;
    let config = TournamentConfig::new()
        .with_turns(turns)
        .with_repetitions(repetitions)
        .with_seed(seed)
        .with_output(Output::Memory);
    let results = Tournament::new("wasm", players, config)
        .and_then(|mut tournament| tournament.play())
        .map_err(|e| JsError::new(&e.to_string()))?;
    to_js(&results)
}

/// Get human-readable description of a strategy
#[wasm_bindgen]
pub fn get_strategy_description(strategy_json: &str) -> Result<String, JsError> {
    let strategy: Strategy = serde_json::from_str(strategy_json)
        .map_err(|e| JsError::new(&format!("Invalid strategy: {}", e)))?;

    Ok(describe_strategy(&strategy))
}

#[derive(Serialize)]
struct StrategyInfo {
    id: String,
    name: String,
    description: String,
}

/// Get all available strategy base types
#[wasm_bindgen]
pub fn get_strategy_types() -> Result<JsValue, JsError> {
    let types: Vec<StrategyInfo> = StrategyBase::ALL
        .iter()
        .map(|base| {
            let strategy = Strategy::new(*base);
            StrategyInfo {
                id: strategy.identifier(),
                name: strategy.name(),
                description: describe_strategy(&strategy),
            }
        })
        .collect();

    to_js(&types)
}

/// Create a strategy JSON from base type
#[wasm_bindgen]
pub fn create_strategy(base: &str) -> Result<String, JsError> {
    let base = StrategyBase::ALL
        .iter()
        .copied()
        .find(|b| format!("{:?}", b) == base)
        .ok_or_else(|| JsError::new(&format!("Unknown strategy: {}", base)))?;

    serde_json::to_string(&Strategy::new(base))
        .map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
}

/// Get round-robin pairings for a tournament
#[wasm_bindgen]
pub fn get_tournament_pairings(participant_count: usize) -> Result<JsValue, JsError> {
    to_js(&round_robin_pairs(participant_count))
}

/// Get total match count for one repetition of a round robin
#[wasm_bindgen]
pub fn get_match_count(participant_count: usize) -> usize {
    round_robin_count(participant_count)
}

#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Validate a player with its transformers
///
/// Returns `{valid: true}` or `{valid: false, error: "..."}`.
/// Never throws: validation errors are returned as structured data.
#[wasm_bindgen]
pub fn validate_player(player_json: &str) -> JsValue {
    let checked = parse_player(player_json)
        .and_then(|spec| spec.classifier().map_err(|e| e.to_string()));
    let result = match checked {
        Ok(_) => ValidationResult {
            valid: true,
            error: None,
        },
        Err(e) => ValidationResult {
            valid: false,
            error: Some(e),
        },
    };
    serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
}
