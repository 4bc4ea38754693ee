pub mod ai;
pub mod game;
pub mod utils;

use gloo_timers::future::TimeoutFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use std::str::FromStr;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{AiAgent, AiConfig, AiDecision, AiDifficulty};
pub use game::{
    all_moves, drop_moves, legal_moves, ActiveEffect, EffectKind, EffectLedger, EventKind,
    GameState, HistoryEntry, IntegrityError, MoveRecord, MoveSource, Piece, PieceId, PieceKind,
    Player, Position, RuleEngine, RuleError, RulesConfig, Session, TrumpActivation, TrumpCard,
    TrumpError, TrumpTarget,
};

use utils::{init_logger, set_panic_hook};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
    init_logger();
}

fn to_js_error<E: Serialize + std::fmt::Display>(error: E) -> JsValue {
    to_value(&error).unwrap_or_else(|_| JsValue::from_str(&error.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(serde_to_js_error)
}

/// 将 `"BTN_PIN"`、`"sente"` 这类裸字符串解析为对应的枚举。
fn parse_id<T: DeserializeOwned>(id: &str) -> Result<T, JsValue> {
    serde_json::from_value(serde_json::Value::String(id.to_string())).map_err(serde_to_js_error)
}

fn parse_difficulty(difficulty: Option<String>) -> AiDifficulty {
    difficulty
        .as_deref()
        .and_then(|value| AiDifficulty::from_str(value).ok())
        .unwrap_or(AiDifficulty::Normal)
}

/// 王牌发动的显式结果：成功时带回发动记录，失败时带回原因。
#[derive(Serialize)]
struct TrumpOutcome {
    applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    activation: Option<TrumpActivation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<TrumpError>,
}

#[derive(Serialize)]
struct AiMoveResponse<'a> {
    decision: &'a AiDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a GameState>,
}

#[wasm_bindgen]
pub struct GameEngine {
    session: Session,
}

#[wasm_bindgen]
impl GameEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(seed: Option<u32>, config_json: Option<String>) -> Result<GameEngine, JsValue> {
        let config = match config_json {
            Some(json) => serde_json::from_str(&json).map_err(serde_to_js_error)?,
            None => RulesConfig::default(),
        };
        Ok(GameEngine {
            session: Session::new(config, seed.map(u64::from)),
        })
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        to_json(self.session.state())
    }

    pub fn piece_at_json(&self, x: i8, y: i8) -> Result<String, JsValue> {
        to_json(&self.session.piece_at(Position::new(x, y)))
    }

    pub fn legal_moves_json(&self, x: i8, y: i8) -> Result<String, JsValue> {
        to_json(&self.session.legal_moves(Position::new(x, y)))
    }

    pub fn drop_moves_json(&self, kind: &str, player: &str) -> Result<String, JsValue> {
        let kind = PieceKind::from_str(kind)
            .map_err(|_| JsValue::from_str(&format!("unknown piece kind: {kind}")))?;
        let player = Player::from_str(player)
            .map_err(|_| JsValue::from_str(&format!("unknown player: {player}")))?;
        to_json(&self.session.drop_moves(kind, player))
    }

    pub fn all_moves_json(&self, player: &str) -> Result<String, JsValue> {
        let player = Player::from_str(player)
            .map_err(|_| JsValue::from_str(&format!("unknown player: {player}")))?;
        to_json(&self.session.all_moves(player))
    }

    pub fn play_move_json(&mut self, move_json: &str) -> Result<String, JsValue> {
        let mv: MoveRecord = serde_json::from_str(move_json).map_err(serde_to_js_error)?;
        let state = self.session.play_move(&mv).map_err(to_js_error)?;
        to_json(state)
    }

    pub fn choose_card(&mut self, player: &str, card_id: &str) -> Result<(), JsValue> {
        let player = Player::from_str(player)
            .map_err(|_| JsValue::from_str(&format!("unknown player: {player}")))?;
        let card: TrumpCard = parse_id(card_id)?;
        self.session
            .choose_trump_card(player, card)
            .map_err(to_js_error)
    }

    pub fn random_card(&mut self) -> Result<String, JsValue> {
        let card = self.session.random_card();
        serde_json::to_value(card)
            .map_err(serde_to_js_error)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| JsValue::from_str("card id is not a string"))
    }

    /// 行棋方发动王牌。总是返回结果对象，不会因校验失败而抛出。
    pub fn activate_trump_json(&mut self, card_id: &str, target_json: &str) -> Result<String, JsValue> {
        let card: TrumpCard = parse_id(card_id)?;
        let target: TrumpTarget = serde_json::from_str(target_json).map_err(serde_to_js_error)?;
        let outcome = match self.session.activate_trump(card, target) {
            Ok(activation) => TrumpOutcome {
                applied: true,
                activation: Some(activation),
                error: None,
            },
            Err(error) => TrumpOutcome {
                applied: false,
                activation: None,
                error: Some(error),
            },
        };
        to_json(&outcome)
    }

    /// 在后台计算当前行棋方的着法，结果需经 `apply_ai_decision_json` 提交。
    pub fn think_ai(&self, difficulty: Option<String>, delay_ms: Option<u32>) -> Promise {
        let state = self.session.state().clone();
        let config = AiConfig::from_difficulty(parse_difficulty(difficulty));
        let delay = delay_ms.unwrap_or(0);

        future_to_promise(async move {
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            let mut agent = AiAgent::new(config);
            let decision = agent.decide_move(&state, state.turn);
            let json = to_json(&decision)?;
            Ok(JsValue::from_str(&json))
        })
    }

    pub fn apply_ai_decision_json(&mut self, decision_json: &str) -> Result<String, JsValue> {
        let decision: AiDecision = serde_json::from_str(decision_json).map_err(serde_to_js_error)?;
        let state = self.session.apply_decision(&decision).map_err(to_js_error)?;
        to_json(&AiMoveResponse {
            decision: &decision,
            state,
        })
    }

    pub fn apply_ai_move(&mut self, difficulty: Option<String>) -> Result<String, JsValue> {
        let state_for_ai = self.session.state().clone();
        let mut agent = AiAgent::new(AiConfig::from_difficulty(parse_difficulty(difficulty)));
        let decision = agent.decide_move(&state_for_ai, state_for_ai.turn);
        let state = self.session.apply_decision(&decision).map_err(to_js_error)?;
        to_json(&AiMoveResponse {
            decision: &decision,
            state,
        })
    }

    pub fn restart(&mut self) {
        self.session.restart();
    }

    pub fn validate(&self) -> Result<(), JsValue> {
        self.session.validate().map_err(to_js_error)
    }
}

/// 返回标准开局状态，方便前端调试或初始化。
#[wasm_bindgen(js_name = "createGameState")]
pub fn create_game_state() -> Result<JsValue, JsValue> {
    to_value(&GameState::new()).map_err(JsValue::from)
}

/// 纯函数形式的状态转移：输入状态与着法，返回新状态。
#[wasm_bindgen(js_name = "applyMove")]
pub fn apply_move(state: JsValue, mv: JsValue) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    let mv: MoveRecord = from_value(mv).map_err(JsValue::from)?;
    let mut engine = RuleEngine::new();
    match engine.apply_move(&state, &mv) {
        Ok(next) => to_value(&next).map_err(JsValue::from),
        Err(error) => Err(to_js_error(error)),
    }
}

#[wasm_bindgen(js_name = "legalMoves")]
pub fn legal_moves_for(state: JsValue, x: i8, y: i8) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    to_value(&legal_moves(&state, Position::new(x, y))).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "dropMoves")]
pub fn drop_moves_for(state: JsValue, kind: &str, player: &str) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    let kind = PieceKind::from_str(kind)
        .map_err(|_| JsValue::from_str(&format!("unknown piece kind: {kind}")))?;
    let player = Player::from_str(player)
        .map_err(|_| JsValue::from_str(&format!("unknown player: {player}")))?;
    to_value(&drop_moves(&state, kind, player)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "trumpCatalogue")]
pub fn trump_catalogue() -> Result<JsValue, JsValue> {
    let cards: Vec<_> = TrumpCard::ALL.iter().map(|card| card.info()).collect();
    to_value(&cards).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "eventCatalogue")]
pub fn event_catalogue() -> Result<JsValue, JsValue> {
    let events: Vec<_> = EventKind::ALL.iter().map(|event| event.info()).collect();
    to_value(&events).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    state
        .integrity_check()
        .map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))?;
    Ok(())
}

#[wasm_bindgen(js_name = "computeAiMove")]
pub fn compute_ai_move(state: JsValue, difficulty: Option<String>) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    let mut agent = AiAgent::new(AiConfig::from_difficulty(parse_difficulty(difficulty)));
    let decision = agent.decide_move(&state, state.turn);
    to_value(&decision).map_err(JsValue::from)
}
