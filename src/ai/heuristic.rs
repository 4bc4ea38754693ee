use std::str::FromStr;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::game::{all_moves, GameState, MoveRecord, PieceKind, Player, Position};

const CENTER: Position = Position::new(4, 4);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AiDifficulty {
    Easy,
    Normal,
    Hard,
    Expert,
}

impl FromStr for AiDifficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(AiDifficulty::Easy),
            "normal" | "medium" => Ok(AiDifficulty::Normal),
            "hard" => Ok(AiDifficulty::Hard),
            "expert" | "extreme" => Ok(AiDifficulty::Expert),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiConfig {
    pub difficulty: AiDifficulty,
    /// 比较分数时叠加的随机扰动幅度（分）。
    pub randomness: f64,
    pub promotion_bonus: f64,
    pub center_weight: f64,
}

impl AiConfig {
    pub fn from_difficulty(difficulty: AiDifficulty) -> Self {
        let randomness = match difficulty {
            AiDifficulty::Easy => 150.0,
            AiDifficulty::Normal => 40.0,
            AiDifficulty::Hard => 10.0,
            AiDifficulty::Expert => 0.0,
        };
        Self {
            difficulty,
            randomness,
            promotion_bonus: 200.0,
            center_weight: 10.0,
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig::from_difficulty(AiDifficulty::Normal)
    }
}

/// 评分器的输出。`ply` 与 `player` 标记它针对的局面，过期结果由会话丢弃。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiDecision {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mv: Option<MoveRecord>,
    pub evaluation: f64,
    pub candidates: usize,
    pub ply: u32,
    pub player: Player,
}

pub struct AiAgent {
    config: AiConfig,
    rng: SmallRng,
}

impl AiAgent {
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(config: AiConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// 一层贪心：吃子价值、升变加分、离中心距离扣分。吃王立即返回。
    pub fn decide_move(&mut self, state: &GameState, player: Player) -> AiDecision {
        let mut decision = AiDecision {
            mv: None,
            evaluation: 0.0,
            candidates: 0,
            ply: state.ply,
            player,
        };
        if state.is_finished() || state.turn != player {
            return decision;
        }

        let mut moves = all_moves(state, player);
        decision.candidates = moves.len();
        moves.shuffle(&mut self.rng);

        let mut best_cmp = f64::NEG_INFINITY;
        for mv in moves {
            if mv.captured == Some(PieceKind::King) {
                decision.evaluation = piece_value(PieceKind::King);
                decision.mv = Some(mv);
                return decision;
            }

            let score = self.score(&mv);
            let comparison = score + self.random_noise();
            if comparison > best_cmp {
                best_cmp = comparison;
                decision.evaluation = score;
                decision.mv = Some(mv);
            }
        }
        decision
    }

    fn score(&self, mv: &MoveRecord) -> f64 {
        let mut score = mv.captured.map(piece_value).unwrap_or(0.0);
        if mv.promoted {
            score += self.config.promotion_bonus;
        }
        let distance = (mv.to.x - CENTER.x).abs() + (mv.to.y - CENTER.y).abs();
        score - f64::from(distance) * self.config.center_weight
    }

    fn random_noise(&mut self) -> f64 {
        if self.config.randomness <= 0.0 {
            0.0
        } else {
            (self.rng.gen::<f64>() - 0.5) * 2.0 * self.config.randomness
        }
    }
}

pub fn piece_value(kind: PieceKind) -> f64 {
    match kind {
        PieceKind::Pawn => 100.0,
        PieceKind::Lance => 300.0,
        PieceKind::Knight => 400.0,
        PieceKind::Silver => 500.0,
        PieceKind::Gold
        | PieceKind::ProPawn
        | PieceKind::ProLance
        | PieceKind::ProKnight
        | PieceKind::ProSilver => 600.0,
        PieceKind::Bishop => 800.0,
        PieceKind::Rook | PieceKind::Horse => 1000.0,
        PieceKind::Dragon => 1200.0,
        PieceKind::King => 10000.0,
    }
}
