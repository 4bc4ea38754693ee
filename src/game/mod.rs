//! 对局核心逻辑模块（棋盘状态、着法生成、规则引擎、王牌与事件等）。

pub mod effects;
pub mod events;
pub mod movegen;
pub mod rules;
pub mod session;
pub mod state;
pub mod trump;

pub use effects::{ActiveEffect, EffectKind, EffectLedger, UNTIL_TRIGGERED};
pub use events::{EventInfo, EventKind};
pub use movegen::{all_moves, drop_moves, legal_moves};
pub use rules::{EffectDurations, RuleEngine, RuleError, RulesConfig};
pub use session::Session;
pub use state::{
    Board,
    BySide,
    GameState,
    Hand,
    HistoryEntry,
    IntegrityError,
    MoveRecord,
    MoveSource,
    Piece,
    PieceId,
    PieceKind,
    Player,
    Position,
    TrumpSlot,
    BOARD_SIZE,
};
pub use trump::{
    CardCategory,
    Targeting,
    TrumpActivation,
    TrumpCard,
    TrumpCardInfo,
    TrumpError,
    TrumpTarget,
};
