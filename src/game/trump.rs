use log::info;
use serde::{Deserialize, Serialize};

use super::effects::{EffectKind, UNTIL_TRIGGERED};
use super::rules::RulesConfig;
use super::state::{GameState, Piece, PieceKind, Player, Position};

/// 王牌卡。每名玩家在对局中选定一张，只能发动一次。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TrumpCard {
    #[serde(rename = "BTN_BODYDOUBLE")]
    BodyDouble,
    #[serde(rename = "BTN_PUSHBACK")]
    Pushback,
    #[serde(rename = "BTN_CHECKPOINT")]
    Checkpoint,
    #[serde(rename = "BTN_PIN")]
    Pin,
    #[serde(rename = "BTN_REINFORCEMENT")]
    Reinforcement,
    #[serde(rename = "BTN_SCORCHED")]
    ScorchedEarth,
    #[serde(rename = "BTN_WITHDRAW")]
    Withdraw,
    #[serde(rename = "BTN_SANDBAGS")]
    Sandbags,
    #[serde(rename = "BTN_PURSUIT")]
    Pursuit,
    #[serde(rename = "BTN_DOUBLEDEPLOY")]
    DoubleDeploy,
    #[serde(rename = "BTN_ESCORT")]
    Escort,
    #[serde(rename = "BTN_BOUNTY")]
    Bounty,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardCategory {
    Tactics,
    Support,
    Hype,
    Event,
}

/// 卡牌需要的目标形状，供前端决定如何引导选择。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Targeting {
    None,
    EmptySquare,
    EmptyOwnSquare,
    OwnPiece,
    EnemyPiece,
    EnemyPieceWithDirection,
    OwnAndEnemyPiece,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrumpCardInfo {
    pub id: TrumpCard,
    pub name: &'static str,
    pub category: CardCategory,
    pub chaos: u8,
    pub short_text: &'static str,
    pub long_text: &'static str,
    pub targeting: Targeting,
}

impl TrumpCard {
    pub const ALL: [TrumpCard; 12] = [
        TrumpCard::BodyDouble,
        TrumpCard::Pushback,
        TrumpCard::Checkpoint,
        TrumpCard::Pin,
        TrumpCard::Reinforcement,
        TrumpCard::ScorchedEarth,
        TrumpCard::Withdraw,
        TrumpCard::Sandbags,
        TrumpCard::Pursuit,
        TrumpCard::DoubleDeploy,
        TrumpCard::Escort,
        TrumpCard::Bounty,
    ];

    pub fn targeting(self) -> Targeting {
        match self {
            TrumpCard::BodyDouble => Targeting::OwnAndEnemyPiece,
            TrumpCard::Pushback => Targeting::EnemyPieceWithDirection,
            TrumpCard::Checkpoint => Targeting::EmptySquare,
            TrumpCard::Pin | TrumpCard::Bounty => Targeting::EnemyPiece,
            TrumpCard::Withdraw | TrumpCard::Escort => Targeting::OwnPiece,
            TrumpCard::Sandbags => Targeting::EmptyOwnSquare,
            TrumpCard::Reinforcement
            | TrumpCard::ScorchedEarth
            | TrumpCard::Pursuit
            | TrumpCard::DoubleDeploy => Targeting::None,
        }
    }

    pub fn info(self) -> TrumpCardInfo {
        let (name, category, chaos, short_text, long_text) = match self {
            TrumpCard::BodyDouble => (
                "Body Double",
                CardCategory::Tactics,
                3,
                "Swap one own and one enemy piece",
                "Swap the positions of one own piece and one enemy piece. Kings are excluded.",
            ),
            TrumpCard::Pushback => (
                "Pushback",
                CardCategory::Tactics,
                2,
                "Push an enemy piece one square",
                "Push one enemy piece one square in any direction onto an empty square. Kings are excluded.",
            ),
            TrumpCard::Checkpoint => (
                "Checkpoint",
                CardCategory::Tactics,
                2,
                "Close one square",
                "Pick an empty square; neither player may move or drop onto it for the next two actions.",
            ),
            TrumpCard::Pin => (
                "Pin",
                CardCategory::Tactics,
                2,
                "Freeze an enemy piece",
                "Pick an enemy piece; it cannot move during the opponent's next turn. Kings are excluded.",
            ),
            TrumpCard::Reinforcement => (
                "Reinforcement",
                CardCategory::Support,
                1,
                "+2 pawns",
                "Add two pawns to your hand.",
            ),
            TrumpCard::ScorchedEarth => (
                "Scorched Earth",
                CardCategory::Support,
                2,
                "Captured piece is destroyed",
                "The next time one of your pieces is captured it is destroyed instead of joining the opponent's hand. Once only.",
            ),
            TrumpCard::Withdraw => (
                "Withdraw",
                CardCategory::Support,
                2,
                "Recall an own piece",
                "Return one own piece to your hand. It cannot be dropped until your next turn. Kings are excluded.",
            ),
            TrumpCard::Sandbags => (
                "Sandbags",
                CardCategory::Support,
                1,
                "Place a pawn at home",
                "Place a pawn on an empty square of your own territory. Two pawns on a file is still forbidden.",
            ),
            TrumpCard::Pursuit => (
                "Pursuit",
                CardCategory::Hype,
                3,
                "Capture, then move again",
                "If you capture this turn, you keep the move.",
            ),
            TrumpCard::DoubleDeploy => (
                "Double Deploy",
                CardCategory::Hype,
                3,
                "Drop twice",
                "Drop twice this turn. The second drop cannot be a pawn.",
            ),
            TrumpCard::Escort => (
                "Escort",
                CardCategory::Hype,
                2,
                "Protect an own piece",
                "Pick an own piece; it cannot be captured until your next turn begins. Kings are excluded.",
            ),
            TrumpCard::Bounty => (
                "Bounty",
                CardCategory::Hype,
                2,
                "Mark an enemy piece",
                "Mark an enemy piece; when it is captured you gain one pawn. Kings are excluded.",
            ),
        };
        TrumpCardInfo {
            id: self,
            name,
            category,
            chaos,
            short_text,
            long_text,
            targeting: self.targeting(),
        }
    }
}

/// 发动王牌时附带的目标。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum TrumpTarget {
    None,
    Square { pos: Position },
    Piece { pos: Position },
    PieceWithDirection { pos: Position, dx: i8, dy: i8 },
    PiecePair { own: Position, enemy: Position },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrumpActivation {
    pub player: Player,
    pub card: TrumpCard,
    pub ply: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[serde(tag = "type")]
pub enum TrumpError {
    #[error("the game has already been decided")]
    GameFinished,
    #[error("no trump card has been chosen")]
    NoCardChosen,
    #[error("{card:?} is not the chosen card")]
    NotChosenCard { card: TrumpCard },
    #[error("the trump card has already been used")]
    AlreadyUsed,
    #[error("target does not match the card's targeting")]
    TargetMismatch,
    #[error("target is off the board")]
    OutOfBounds,
    #[error("target square is empty")]
    EmptySquare,
    #[error("target belongs to the wrong side")]
    WrongSide,
    #[error("kings cannot be targeted")]
    KingNotAllowed,
    #[error("target square is occupied")]
    SquareNotEmpty,
    #[error("target square is outside own territory")]
    NotOwnTerritory,
    #[error("file already holds an own unpromoted pawn")]
    DoublePawn,
    #[error("destination is blocked")]
    BlockedDestination,
    #[error("direction must be a single adjacent step")]
    InvalidDirection,
}

/// 已通过校验、可以直接落地的效果。
enum Plan {
    Swap { own: Position, enemy: Position },
    Push { from: Position, to: Position },
    Effect(EffectKind, u32),
    GrantPawns(u8),
    Recall { pos: Position, piece: Piece, cooldown: u32 },
    PlacePawn(Position),
}

/// 由行棋方发动已选定的王牌。校验全部通过之前不修改 `state`；
/// 成功时不推进手数，也不交换行棋方。
pub fn activate(
    state: &mut GameState,
    card: TrumpCard,
    target: TrumpTarget,
    config: &RulesConfig,
) -> Result<TrumpActivation, TrumpError> {
    if state.is_finished() {
        return Err(TrumpError::GameFinished);
    }
    let player = state.turn;
    let slot = *state.trump.get(player);
    let chosen = slot.chosen.ok_or(TrumpError::NoCardChosen)?;
    if chosen != card {
        return Err(TrumpError::NotChosenCard { card });
    }
    if slot.used {
        return Err(TrumpError::AlreadyUsed);
    }

    let plan = plan(state, player, card, target, config)?;
    execute(state, player, plan);

    state.trump.get_mut(player).used = true;
    state.record_trump(player, card);
    info!("{:?} activated {:?} at ply {}", player, card, state.ply);

    Ok(TrumpActivation {
        player,
        card,
        ply: state.ply,
    })
}

fn plan(
    state: &GameState,
    player: Player,
    card: TrumpCard,
    target: TrumpTarget,
    config: &RulesConfig,
) -> Result<Plan, TrumpError> {
    let durations = &config.durations;
    let opponent = player.opponent();

    let plan = match (card, target) {
        (TrumpCard::BodyDouble, TrumpTarget::PiecePair { own, enemy }) => {
            non_king_piece(state, own, player)?;
            non_king_piece(state, enemy, opponent)?;
            Plan::Swap { own, enemy }
        }
        (TrumpCard::Pushback, TrumpTarget::PieceWithDirection { pos, dx, dy }) => {
            if (dx, dy) == (0, 0) || !(-1..=1).contains(&dx) || !(-1..=1).contains(&dy) {
                return Err(TrumpError::InvalidDirection);
            }
            non_king_piece(state, pos, opponent)?;
            let to = pos
                .offset(dx, dy)
                .filter(|to| state.board.is_empty_at(*to))
                .ok_or(TrumpError::BlockedDestination)?;
            Plan::Push { from: pos, to }
        }
        (TrumpCard::Checkpoint, TrumpTarget::Square { pos }) => {
            empty_square(state, pos)?;
            Plan::Effect(EffectKind::ForbiddenSquare { square: pos }, durations.checkpoint)
        }
        (TrumpCard::Pin, TrumpTarget::Piece { pos }) => {
            let piece = non_king_piece(state, pos, opponent)?;
            Plan::Effect(EffectKind::Pinned { piece: piece.id }, durations.pin)
        }
        (TrumpCard::Reinforcement, TrumpTarget::None) => {
            Plan::GrantPawns(config.reinforcement_pawns)
        }
        (TrumpCard::ScorchedEarth, TrumpTarget::None) => Plan::Effect(
            EffectKind::DenyCaptureToHand { owner: player },
            UNTIL_TRIGGERED,
        ),
        (TrumpCard::Withdraw, TrumpTarget::Piece { pos }) => {
            let piece = non_king_piece(state, pos, player)?;
            Plan::Recall {
                pos,
                piece,
                cooldown: durations.withdraw_cooldown,
            }
        }
        (TrumpCard::Sandbags, TrumpTarget::Square { pos }) => {
            empty_square(state, pos)?;
            if !player.in_own_territory(pos.y) {
                return Err(TrumpError::NotOwnTerritory);
            }
            if state.board.has_unpromoted_pawn_on_file(player, pos.x) {
                return Err(TrumpError::DoublePawn);
            }
            Plan::PlacePawn(pos)
        }
        (TrumpCard::Pursuit, TrumpTarget::None) => {
            Plan::Effect(EffectKind::Pursuit { owner: player }, durations.pursuit)
        }
        (TrumpCard::DoubleDeploy, TrumpTarget::None) => Plan::Effect(
            EffectKind::DoubleDeploy {
                owner: player,
                drops: 0,
            },
            durations.double_deploy,
        ),
        (TrumpCard::Escort, TrumpTarget::Piece { pos }) => {
            let piece = non_king_piece(state, pos, player)?;
            Plan::Effect(EffectKind::CaptureImmunity { piece: piece.id }, durations.escort)
        }
        (TrumpCard::Bounty, TrumpTarget::Piece { pos }) => {
            let piece = non_king_piece(state, pos, opponent)?;
            Plan::Effect(
                EffectKind::Bounty {
                    piece: piece.id,
                    marker: player,
                },
                UNTIL_TRIGGERED,
            )
        }
        _ => return Err(TrumpError::TargetMismatch),
    };
    Ok(plan)
}

fn execute(state: &mut GameState, player: Player, plan: Plan) {
    match plan {
        Plan::Swap { own, enemy } => {
            let first = state.board.take(own);
            let second = state.board.take(enemy);
            state.board.set(own, second);
            state.board.set(enemy, first);
        }
        Plan::Push { from, to } => {
            let piece = state.board.take(from);
            state.board.set(to, piece);
        }
        Plan::Effect(kind, duration) => state.effects.push(kind, duration),
        Plan::GrantPawns(count) => state.hands.get_mut(player).add(PieceKind::Pawn, count),
        Plan::Recall { pos, piece, cooldown } => {
            state.board.take(pos);
            state.effects.release_piece(piece.id);
            let kind = piece.kind.unpromote();
            state.hands.get_mut(player).add(kind, 1);
            state
                .effects
                .push(EffectKind::DropCooldown { owner: player, kind }, cooldown);
        }
        Plan::PlacePawn(pos) => {
            state.spawn(pos, PieceKind::Pawn, player);
        }
    }
}

fn piece_on(state: &GameState, pos: Position) -> Result<Piece, TrumpError> {
    if !pos.is_valid() {
        return Err(TrumpError::OutOfBounds);
    }
    state.piece_at(pos).ok_or(TrumpError::EmptySquare)
}

fn non_king_piece(state: &GameState, pos: Position, side: Player) -> Result<Piece, TrumpError> {
    let piece = piece_on(state, pos)?;
    if piece.owner != side {
        return Err(TrumpError::WrongSide);
    }
    if piece.kind.is_king() {
        return Err(TrumpError::KingNotAllowed);
    }
    Ok(piece)
}

fn empty_square(state: &GameState, pos: Position) -> Result<(), TrumpError> {
    if !pos.is_valid() {
        return Err(TrumpError::OutOfBounds);
    }
    if !state.board.is_empty_at(pos) {
        return Err(TrumpError::SquareNotEmpty);
    }
    Ok(())
}
