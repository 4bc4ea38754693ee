//! AI 模块（启发式着法评分）。

pub mod heuristic;

pub use heuristic::{piece_value, AiAgent, AiConfig, AiDecision, AiDifficulty};
