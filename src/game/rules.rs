use log::{debug, info};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::{
    effects::EffectKind,
    events,
    movegen::is_dead_end,
    state::{GameState, HistoryEntry, IntegrityError, MoveRecord, PieceId, PieceKind, Player},
};

/// 各效果的持续时间，单位为“已执行的行动数”。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EffectDurations {
    pub checkpoint: u32,
    pub pin: u32,
    pub escort: u32,
    pub pursuit: u32,
    pub double_deploy: u32,
    pub withdraw_cooldown: u32,
    pub inspection: u32,
    pub darkness: u32,
    pub exhaustion: u32,
    pub war_drum: u32,
}

impl Default for EffectDurations {
    fn default() -> Self {
        Self {
            checkpoint: 2,
            pin: 2,
            escort: 2,
            pursuit: 1,
            double_deploy: 2,
            withdraw_cooldown: 2,
            inspection: 1,
            darkness: 1,
            exhaustion: 2,
            war_drum: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RulesConfig {
    /// 到达这些手数时生成事件预告，下一手数时发动。
    pub preview_plies: Vec<u32>,
    pub preview_size: usize,
    pub visibility_range: u8,
    pub reinforcement_pawns: u8,
    pub durations: EffectDurations,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            preview_plies: vec![7, 15],
            preview_size: 3,
            visibility_range: 3,
            reinforcement_pawns: 2,
            durations: EffectDurations::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[serde(tag = "type")]
pub enum RuleError {
    #[error("the game has already been decided")]
    GameFinished,
    #[error("it is not this player's turn")]
    NotPlayerTurn,
    #[error("malformed move: {reason}")]
    MalformedMove { reason: String },
    #[error("move is not among the generated candidates")]
    IllegalMove,
    #[error("{player:?} has already chosen a trump card")]
    CardAlreadyChosen { player: Player },
    #[error("decision computed for ply {expected_ply} but the game is at ply {actual_ply}")]
    StaleDecision { expected_ply: u32, actual_ply: u32 },
    #[error("integrity violation: {error}")]
    IntegrityViolation { error: IntegrityError },
}

fn malformed(reason: impl Into<String>) -> RuleError {
    RuleError::MalformedMove {
        reason: reason.into(),
    }
}

/// 状态转移引擎。持有规则配置与可注入种子的随机源（事件抽选使用）。
pub struct RuleEngine {
    config: RulesConfig,
    rng: SmallRng,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::with_config(RulesConfig::default(), None)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_config(RulesConfig::default(), Some(seed))
    }

    pub fn with_config(config: RulesConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self { config, rng }
    }

    pub fn config(&self) -> &RulesConfig {
        &self.config
    }

    pub(crate) fn rng_mut(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    /// 将一步生成的着法作用于 `state`，返回新的状态；`state` 本身保持不变。
    pub fn apply_move(&mut self, state: &GameState, mv: &MoveRecord) -> Result<GameState, RuleError> {
        if state.is_finished() {
            return Err(RuleError::GameFinished);
        }
        if mv.player != state.turn {
            return Err(RuleError::NotPlayerTurn);
        }
        if !mv.to.is_valid() {
            return Err(malformed("destination is off the board"));
        }

        let next_ply = state
            .ply
            .checked_add(1)
            .ok_or_else(|| malformed("ply counter overflow"))?;

        let mut next = state.clone();
        let player = mv.player;
        let mut captured_any = false;
        // 记入棋谱的是棋盘上的实际内容，而不是调用方填写的字段。
        let mut record = mv.clone();
        record.ply = state.ply;

        if mv.is_drop() {
            if mv.source_square().is_some() {
                return Err(malformed("drop must come from the hand"));
            }
            if !mv.piece.is_hand_kind() || mv.promoted {
                return Err(malformed("only unpromoted non-king pieces can be dropped"));
            }
            if !next.board.is_empty_at(mv.to) {
                return Err(malformed("drop destination is occupied"));
            }
            if is_dead_end(mv.piece, player, mv.to.y) {
                return Err(malformed("dropped piece would have no further move"));
            }
            if !next.hands.get_mut(player).take(mv.piece) {
                return Err(malformed("piece is not held in hand"));
            }
            if let Some(entry) = next.effects.find_mut(
                |kind| matches!(kind, EffectKind::DoubleDeploy { owner, .. } if *owner == player),
            ) {
                if let EffectKind::DoubleDeploy { drops, .. } = &mut entry.kind {
                    *drops += 1;
                }
            }
            next.spawn(mv.to, mv.piece, player);
            record.piece_id = None;
            record.captured = None;
        } else {
            let from = mv
                .source_square()
                .ok_or_else(|| malformed("board move lacks a source square"))?;
            let moving = next
                .board
                .take(from)
                .ok_or_else(|| malformed("source square is empty"))?;
            if moving.owner != player {
                return Err(malformed("source piece belongs to the other player"));
            }
            if moving.kind != mv.piece {
                return Err(malformed("recorded piece does not match the source square"));
            }
            if mv.promoted
                && !(player.in_promotion_zone(from.y) || player.in_promotion_zone(mv.to.y))
            {
                return Err(malformed("promotion outside the promotion zone"));
            }
            if !mv.promoted && is_dead_end(moving.kind, player, mv.to.y) {
                return Err(malformed("piece must promote on this rank"));
            }
            record.piece_id = Some(moving.id);
            record.captured = None;

            if let Some(target) = next.board.take(mv.to) {
                if target.owner == player {
                    return Err(malformed("destination holds an own piece"));
                }
                captured_any = true;
                record.captured = Some(target.kind);
                if target.kind.is_king() {
                    next.winner = Some(player);
                    info!("{:?} captured the king at ply {}", player, state.ply);
                } else {
                    Self::resolve_capture(&mut next, player, target.kind, target.id);
                }
                next.effects.release_piece(target.id);
            }

            let mut placed = moving;
            if mv.promoted {
                placed.kind = moving
                    .kind
                    .promote()
                    .ok_or_else(|| malformed("piece cannot promote"))?;
            }
            next.board.set(mv.to, Some(placed));
        }

        next.history.push(HistoryEntry::Move { record });
        next.ply = next_ply;

        if self.should_swap_turn(&mut next, player, mv.is_drop(), captured_any) {
            next.turn = player.opponent();
        }

        let settled = next.effects.len();
        self.run_event_schedule(&mut next);
        next.effects.decay(settled);

        debug!(
            "ply {} -> {}: {:?} {:?} to {:?}, turn {:?}",
            state.ply, next.ply, player, mv.piece, mv.to, next.turn
        );
        Ok(next)
    }

    /// 非王将被吃时的持驹结算：焼却命令、懸賞首、軍鼓。
    fn resolve_capture(state: &mut GameState, player: Player, captured: PieceKind, id: PieceId) {
        let victim = player.opponent();
        let scorched = state.effects.consume(
            |kind| matches!(kind, EffectKind::DenyCaptureToHand { owner } if *owner == victim),
        );
        if scorched.is_some() {
            debug!("{:?} piece {} destroyed instead of captured", victim, id);
            return;
        }

        state.hands.get_mut(player).add(captured, 1);

        if let Some(bounty) = state
            .effects
            .consume(|kind| matches!(kind, EffectKind::Bounty { piece, .. } if *piece == id))
        {
            if let EffectKind::Bounty { marker, .. } = bounty.kind {
                state.hands.get_mut(marker).add(PieceKind::Pawn, 1);
            }
        }

        if state.effects.war_drum_active() {
            state.hands.get_mut(player).add(PieceKind::Pawn, 1);
        }
    }

    fn should_swap_turn(
        &self,
        state: &mut GameState,
        player: Player,
        dropped: bool,
        captured: bool,
    ) -> bool {
        let mut swap = true;

        if captured
            && state
                .effects
                .consume(|kind| matches!(kind, EffectKind::Pursuit { owner } if *owner == player))
                .is_some()
        {
            swap = false;
        }

        if dropped {
            if let Some(drops) = state.effects.double_deploy_drops(player) {
                if drops < 2 {
                    swap = false;
                } else {
                    state.effects.consume(
                        |kind| matches!(kind, EffectKind::DoubleDeploy { owner, .. } if *owner == player),
                    );
                }
            }
        }

        swap
    }

    fn run_event_schedule(&mut self, state: &mut GameState) {
        let ply = state.ply;
        if self.config.preview_plies.contains(&ply) {
            events::roll_preview(state, &mut self.rng, self.config.preview_size);
        } else if ply
            .checked_sub(1)
            .is_some_and(|previous| self.config.preview_plies.contains(&previous))
        {
            events::activate_preview(state, &mut self.rng, &self.config);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::movegen::{drop_moves, legal_moves};
    use crate::game::state::{MoveSource, Position};

    fn first_move(state: &GameState, from: Position, to: Position) -> MoveRecord {
        legal_moves(state, from)
            .into_iter()
            .find(|mv| mv.to == to)
            .expect("move should be generated")
    }

    #[test]
    fn pawn_push_swaps_turn_and_advances_ply() {
        let mut engine = RuleEngine::with_seed(1);
        let state = GameState::new();
        let mv = first_move(&state, Position::new(4, 6), Position::new(4, 5));

        let next = engine.apply_move(&state, &mv).expect("move should apply");

        assert!(next.piece_at(Position::new(4, 6)).is_none());
        assert_eq!(
            next.piece_at(Position::new(4, 5)).map(|p| (p.kind, p.owner)),
            Some((PieceKind::Pawn, Player::Sente))
        );
        assert_eq!(next.ply, 2);
        assert_eq!(next.turn, Player::Gote);
        assert_eq!(next.history.len(), 1);
        assert_eq!(state.ply, 1, "input state must stay untouched");
    }

    #[test]
    fn capture_moves_demoted_piece_to_hand_and_keeps_identity() {
        let mut engine = RuleEngine::with_seed(1);
        let state = GameState::with_pieces(&[
            (Position::new(4, 8), PieceKind::King, Player::Sente),
            (Position::new(4, 0), PieceKind::King, Player::Gote),
            (Position::new(2, 4), PieceKind::Rook, Player::Sente),
            (Position::new(2, 2), PieceKind::Horse, Player::Gote),
        ]);
        let rook_id = state.piece_at(Position::new(2, 4)).map(|p| p.id);
        let mv = legal_moves(&state, Position::new(2, 4))
            .into_iter()
            .find(|mv| mv.to == Position::new(2, 2) && !mv.promoted)
            .expect("capture should be generated");
        assert_eq!(mv.captured, Some(PieceKind::Horse));

        let next = engine.apply_move(&state, &mv).expect("capture should apply");

        assert_eq!(next.hands.sente.bishop, 1);
        assert_eq!(next.piece_at(Position::new(2, 2)).map(|p| p.id), rook_id);
    }

    #[test]
    fn king_capture_sets_winner() {
        let mut engine = RuleEngine::with_seed(1);
        let state = GameState::with_pieces(&[
            (Position::new(4, 8), PieceKind::King, Player::Sente),
            (Position::new(4, 1), PieceKind::King, Player::Gote),
            (Position::new(4, 2), PieceKind::Gold, Player::Sente),
        ]);
        let mv = first_move(&state, Position::new(4, 2), Position::new(4, 1));

        let next = engine.apply_move(&state, &mv).expect("king capture should apply");

        assert_eq!(next.winner, Some(Player::Sente));
        assert_eq!(next.hands.sente.total(), 0);
        assert!(matches!(
            engine.apply_move(&next, &mv),
            Err(RuleError::GameFinished)
        ));
    }

    #[test]
    fn board_move_without_source_is_rejected() {
        let mut engine = RuleEngine::with_seed(1);
        let state = GameState::new();
        let mut mv = first_move(&state, Position::new(4, 6), Position::new(4, 5));
        mv.from = MoveSource::Hand;
        assert!(matches!(
            engine.apply_move(&state, &mv),
            Err(RuleError::MalformedMove { .. })
        ));
    }

    #[test]
    fn drop_consumes_hand_and_mints_new_identity() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = GameState::new();
        state.hands.sente.gold = 1;
        let mv = drop_moves(&state, PieceKind::Gold, Player::Sente)
            .into_iter()
            .find(|mv| mv.to == Position::new(4, 4))
            .expect("drop should be generated");

        let next = engine.apply_move(&state, &mv).expect("drop should apply");

        assert_eq!(next.hands.sente.gold, 0);
        let placed = next.piece_at(Position::new(4, 4)).expect("piece placed");
        assert_eq!(placed.kind, PieceKind::Gold);
        assert!(state.board.pieces().all(|(_, piece)| piece.id != placed.id));
        assert_eq!(next.turn, Player::Gote);
    }

    #[test]
    fn drop_without_hand_piece_is_rejected() {
        let mut engine = RuleEngine::with_seed(1);
        let state = GameState::new();
        let mv = MoveRecord {
            ply: 1,
            player: Player::Sente,
            from: MoveSource::Hand,
            to: Position::new(4, 4),
            piece: PieceKind::Rook,
            piece_id: None,
            promoted: false,
            captured: None,
            drop: true,
        };
        assert!(matches!(
            engine.apply_move(&state, &mv),
            Err(RuleError::MalformedMove { .. })
        ));
    }

    #[test]
    fn history_records_the_piece_actually_moved() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = GameState::new();
        state.effects.push(EffectKind::Exhaustion, 10);
        let pawn_id = state.piece_at(Position::new(4, 6)).map(|p| p.id);
        let mut push = first_move(&state, Position::new(4, 6), Position::new(4, 5));
        push.piece_id = None;
        push.captured = Some(PieceKind::Gold);

        let next = engine.apply_move(&state, &push).expect("push should apply");
        let recorded = next.last_move_by(Player::Sente).expect("move recorded");
        assert_eq!(recorded.piece_id, pawn_id);
        assert_eq!(recorded.captured, None);

        let reply = first_move(&next, Position::new(4, 2), Position::new(4, 3));
        let after = engine.apply_move(&next, &reply).expect("reply should apply");
        assert!(legal_moves(&after, Position::new(4, 5)).is_empty());
    }

    #[test]
    fn mismatched_piece_kind_is_rejected() {
        let mut engine = RuleEngine::with_seed(1);
        let state = GameState::new();
        let mut mv = first_move(&state, Position::new(4, 6), Position::new(4, 5));
        mv.piece = PieceKind::Gold;
        assert!(matches!(
            engine.apply_move(&state, &mv),
            Err(RuleError::MalformedMove { .. })
        ));
    }

    #[test]
    fn promotion_outside_the_zone_is_rejected() {
        let mut engine = RuleEngine::with_seed(1);
        let state = GameState::new();
        let mut mv = first_move(&state, Position::new(4, 6), Position::new(4, 5));
        mv.promoted = true;
        assert!(matches!(
            engine.apply_move(&state, &mv),
            Err(RuleError::MalformedMove { .. })
        ));
    }

    #[test]
    fn exhausted_ply_counter_is_rejected() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = GameState::new();
        let mv = first_move(&state, Position::new(4, 6), Position::new(4, 5));
        state.ply = u32::MAX;
        assert!(matches!(
            engine.apply_move(&state, &mv),
            Err(RuleError::MalformedMove { .. })
        ));
    }

    #[test]
    fn scorched_owner_loses_piece_without_feeding_hand() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = GameState::with_pieces(&[
            (Position::new(4, 8), PieceKind::King, Player::Sente),
            (Position::new(4, 0), PieceKind::King, Player::Gote),
            (Position::new(3, 5), PieceKind::Silver, Player::Sente),
            (Position::new(3, 4), PieceKind::Pawn, Player::Gote),
        ]);
        state.effects.push(
            EffectKind::DenyCaptureToHand { owner: Player::Gote },
            crate::game::effects::UNTIL_TRIGGERED,
        );
        let mv = first_move(&state, Position::new(3, 5), Position::new(3, 4));

        let next = engine.apply_move(&state, &mv).expect("capture should apply");

        assert_eq!(next.hands.sente.total(), 0);
        assert!(next.effects.is_empty());
    }

    #[test]
    fn war_drum_pays_a_pawn_and_stays_active() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = GameState::with_pieces(&[
            (Position::new(4, 8), PieceKind::King, Player::Sente),
            (Position::new(4, 0), PieceKind::King, Player::Gote),
            (Position::new(3, 5), PieceKind::Gold, Player::Sente),
            (Position::new(3, 4), PieceKind::Silver, Player::Gote),
        ]);
        state.effects.push(EffectKind::WarDrum, 2);
        let mv = first_move(&state, Position::new(3, 5), Position::new(3, 4));

        let next = engine.apply_move(&state, &mv).expect("capture should apply");

        assert_eq!(next.hands.sente.silver, 1);
        assert_eq!(next.hands.sente.pawn, 1);
        assert!(next.effects.war_drum_active());
    }

    #[test]
    fn events_preview_then_activate_at_milestones() {
        let config = RulesConfig {
            preview_plies: vec![2],
            ..RulesConfig::default()
        };
        let mut engine = RuleEngine::with_config(config, Some(5));
        let state = GameState::new();

        let mv = first_move(&state, Position::new(0, 6), Position::new(0, 5));
        let previewed = engine.apply_move(&state, &mv).expect("move should apply");
        assert_eq!(previewed.event_preview.len(), 3);

        let reply = first_move(&previewed, Position::new(0, 2), Position::new(0, 3));
        let activated = engine.apply_move(&previewed, &reply).expect("move should apply");
        assert!(activated.event_preview.is_empty());
        assert_eq!(activated.ply, 3);
    }
}
