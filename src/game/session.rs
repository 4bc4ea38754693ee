//! 对局会话：由调用方持有的唯一可变状态入口。

use log::{info, warn};
use rand::seq::SliceRandom;

use super::movegen;
use super::rules::{RuleEngine, RuleError, RulesConfig};
use super::state::{GameState, MoveRecord, Piece, PieceKind, Player, Position};
use super::trump::{self, TrumpActivation, TrumpCard, TrumpError, TrumpTarget};
use crate::ai::AiDecision;

pub struct Session {
    state: GameState,
    engine: RuleEngine,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(RulesConfig::default(), None)
    }
}

impl Session {
    pub fn new(config: RulesConfig, seed: Option<u64>) -> Self {
        Self {
            state: GameState::new(),
            engine: RuleEngine::with_config(config, seed),
        }
    }

    pub fn with_state(state: GameState, config: RulesConfig, seed: Option<u64>) -> Self {
        Self {
            state,
            engine: RuleEngine::with_config(config, seed),
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn config(&self) -> &RulesConfig {
        self.engine.config()
    }

    pub fn piece_at(&self, pos: Position) -> Option<Piece> {
        self.state.piece_at(pos)
    }

    pub fn legal_moves(&self, from: Position) -> Vec<MoveRecord> {
        movegen::legal_moves(&self.state, from)
    }

    pub fn drop_moves(&self, kind: PieceKind, player: Player) -> Vec<MoveRecord> {
        movegen::drop_moves(&self.state, kind, player)
    }

    pub fn all_moves(&self, player: Player) -> Vec<MoveRecord> {
        movegen::all_moves(&self.state, player)
    }

    /// 为玩家选定王牌；每局只能选一次。
    pub fn choose_trump_card(&mut self, player: Player, card: TrumpCard) -> Result<(), RuleError> {
        let slot = self.state.trump.get_mut(player);
        if slot.chosen.is_some() {
            return Err(RuleError::CardAlreadyChosen { player });
        }
        slot.chosen = Some(card);
        info!("{:?} chose {:?}", player, card);
        Ok(())
    }

    /// 均匀随机抽一张王牌，供电脑一方选用。
    pub fn random_card(&mut self) -> TrumpCard {
        *TrumpCard::ALL
            .choose(self.engine.rng_mut())
            .unwrap_or(&TrumpCard::Reinforcement)
    }

    /// 校验着法属于当前生成结果后再执行转移。
    pub fn play_move(&mut self, mv: &MoveRecord) -> Result<&GameState, RuleError> {
        if self.state.is_finished() {
            return Err(RuleError::GameFinished);
        }
        if mv.player != self.state.turn {
            return Err(RuleError::NotPlayerTurn);
        }

        let candidates = if mv.is_drop() {
            movegen::drop_moves(&self.state, mv.piece, mv.player)
        } else {
            let from = mv.source_square().ok_or_else(|| RuleError::MalformedMove {
                reason: "board move lacks a source square".to_string(),
            })?;
            movegen::legal_moves(&self.state, from)
        };
        let generated = candidates
            .into_iter()
            .find(|candidate| candidate.to == mv.to && candidate.promoted == mv.promoted)
            .ok_or(RuleError::IllegalMove)?;

        self.state = self.engine.apply_move(&self.state, &generated)?;
        if let Some(winner) = self.state.winner {
            info!("game over at ply {}: {:?} wins", self.state.ply, winner);
        }
        Ok(&self.state)
    }

    pub fn activate_trump(
        &mut self,
        card: TrumpCard,
        target: TrumpTarget,
    ) -> Result<TrumpActivation, TrumpError> {
        let player = self.state.turn;
        let config = self.engine.config().clone();
        trump::activate(&mut self.state, card, target, &config).map_err(|error| {
            warn!("{:?} trump {:?} rejected: {}", player, card, error);
            error
        })
    }

    /// 应用延迟计算得到的决策。对局已结束或局面已经前进时丢弃该结果。
    pub fn apply_decision(&mut self, decision: &AiDecision) -> Result<Option<&GameState>, RuleError> {
        if self.state.is_finished() {
            warn!("discarding decision for ply {}: game already decided", decision.ply);
            return Err(RuleError::GameFinished);
        }
        if decision.ply != self.state.ply || decision.player != self.state.turn {
            warn!(
                "discarding stale decision for ply {} at ply {}",
                decision.ply, self.state.ply
            );
            return Err(RuleError::StaleDecision {
                expected_ply: decision.ply,
                actual_ply: self.state.ply,
            });
        }
        match &decision.mv {
            Some(mv) => self.play_move(mv).map(Some),
            None => Ok(None),
        }
    }

    /// 回到开局状态，清除双方的王牌选择。
    pub fn restart(&mut self) {
        self.state = GameState::new();
        info!("session restarted");
    }

    pub fn validate(&self) -> Result<(), RuleError> {
        self.state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })
    }
}
