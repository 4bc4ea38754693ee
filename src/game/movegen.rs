//! 伪合法着法生成（不检查自玉被将）。

use super::state::{
    GameState, MoveRecord, MoveSource, Piece, PieceKind, Player, Position, BOARD_SIZE,
};

const ORTHOGONAL: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const DIAGONAL: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

// 以先手视角给出，dy = -1 为前进方向。
const PAWN_STEPS: [(i8, i8); 1] = [(0, -1)];
const KNIGHT_STEPS: [(i8, i8); 2] = [(-1, -2), (1, -2)];
const SILVER_STEPS: [(i8, i8); 5] = [(-1, -1), (0, -1), (1, -1), (-1, 1), (1, 1)];
const GOLD_STEPS: [(i8, i8); 6] = [(-1, -1), (0, -1), (1, -1), (-1, 0), (1, 0), (0, 1)];
const KING_STEPS: [(i8, i8); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];
const LANCE_RAY: [(i8, i8); 1] = [(0, -1)];

/// 某种棋子的走法：一步走法的偏移与滑行方向。
struct Movement {
    steps: &'static [(i8, i8)],
    rays: &'static [(i8, i8)],
}

fn movement(kind: PieceKind) -> Movement {
    match kind {
        PieceKind::Pawn => Movement {
            steps: &PAWN_STEPS,
            rays: &[],
        },
        PieceKind::Knight => Movement {
            steps: &KNIGHT_STEPS,
            rays: &[],
        },
        PieceKind::Silver => Movement {
            steps: &SILVER_STEPS,
            rays: &[],
        },
        PieceKind::Gold
        | PieceKind::ProPawn
        | PieceKind::ProLance
        | PieceKind::ProKnight
        | PieceKind::ProSilver => Movement {
            steps: &GOLD_STEPS,
            rays: &[],
        },
        PieceKind::King => Movement {
            steps: &KING_STEPS,
            rays: &[],
        },
        PieceKind::Lance => Movement {
            steps: &[],
            rays: &LANCE_RAY,
        },
        PieceKind::Rook => Movement {
            steps: &[],
            rays: &ORTHOGONAL,
        },
        PieceKind::Bishop => Movement {
            steps: &[],
            rays: &DIAGONAL,
        },
        PieceKind::Dragon => Movement {
            steps: &DIAGONAL,
            rays: &ORTHOGONAL,
        },
        PieceKind::Horse => Movement {
            steps: &ORTHOGONAL,
            rays: &DIAGONAL,
        },
    }
}

/// 到达该段后若不升变便再无着法。
pub(crate) fn is_dead_end(kind: PieceKind, owner: Player, y: i8) -> bool {
    let depth = owner.ranks_from_far_edge(y);
    match kind {
        PieceKind::Pawn | PieceKind::Lance => depth == 0,
        PieceKind::Knight => depth <= 1,
        _ => false,
    }
}

/// 位于 `from` 的棋子的全部候选着法。只有行棋方的棋子才会产生着法。
pub fn legal_moves(state: &GameState, from: Position) -> Vec<MoveRecord> {
    let Some(piece) = state.piece_at(from) else {
        return Vec::new();
    };
    if state.is_finished() || piece.owner != state.turn {
        return Vec::new();
    }
    if state.effects.is_pinned(piece.id) || is_exhausted(state, &piece) {
        return Vec::new();
    }

    let mut moves = Vec::new();
    let Movement { steps, rays } = movement(piece.kind);
    // 后手的偏移沿纵向镜像。
    let mirror = -piece.owner.forward();

    for (dx, dy) in steps {
        if let Some(to) = from.offset(*dx, dy * mirror) {
            push_candidate(state, &piece, from, to, &mut moves);
        }
    }

    let limit = match piece.kind {
        PieceKind::Rook | PieceKind::Bishop => state
            .effects
            .visibility_limit()
            .map(i8::try_from)
            .and_then(Result::ok)
            .unwrap_or(BOARD_SIZE),
        _ => BOARD_SIZE,
    };

    for (dx, dy) in rays {
        let dy = dy * mirror;
        let mut cursor = from;
        for _ in 0..limit {
            let Some(to) = cursor.offset(*dx, dy) else {
                break;
            };
            if !push_candidate(state, &piece, from, to, &mut moves) {
                break;
            }
            cursor = to;
        }
    }

    moves
}

fn is_exhausted(state: &GameState, piece: &Piece) -> bool {
    state.effects.exhaustion_active()
        && state
            .last_move_by(piece.owner)
            .and_then(|record| record.piece_id)
            .is_some_and(|id| id == piece.id)
}

/// 尝试加入到 `to` 的着法；返回滑行是否可以继续越过该格。
fn push_candidate(
    state: &GameState,
    piece: &Piece,
    from: Position,
    to: Position,
    moves: &mut Vec<MoveRecord>,
) -> bool {
    if state.effects.is_square_forbidden(to) {
        return false;
    }
    let target = state.piece_at(to);
    if let Some(occupant) = target {
        if occupant.owner == piece.owner || state.effects.is_immune(occupant.id) {
            return false;
        }
    }

    let record = |promoted: bool| MoveRecord {
        ply: state.ply,
        player: piece.owner,
        from: MoveSource::Square { pos: from },
        to,
        piece: piece.kind,
        piece_id: Some(piece.id),
        promoted,
        captured: target.map(|occupant| occupant.kind),
        drop: false,
    };

    let may_promote = piece.kind.can_promote()
        && (piece.owner.in_promotion_zone(from.y) || piece.owner.in_promotion_zone(to.y));
    if may_promote {
        moves.push(record(true));
        if !is_dead_end(piece.kind, piece.owner, to.y) {
            moves.push(record(false));
        }
    } else {
        moves.push(record(false));
    }

    target.is_none()
}

/// `player` 打入 `kind` 的全部候选着法。
pub fn drop_moves(state: &GameState, kind: PieceKind, player: Player) -> Vec<MoveRecord> {
    if state.is_finished() || !kind.is_hand_kind() {
        return Vec::new();
    }
    let effects = &state.effects;
    if effects.drops_banned() || effects.drop_on_cooldown(player, kind) {
        return Vec::new();
    }
    if kind == PieceKind::Pawn && effects.double_deploy_drops(player).unwrap_or(0) >= 1 {
        return Vec::new();
    }

    let mut moves = Vec::new();
    for x in 0..BOARD_SIZE {
        if kind == PieceKind::Pawn && state.board.has_unpromoted_pawn_on_file(player, x) {
            continue;
        }
        for y in 0..BOARD_SIZE {
            let to = Position::new(x, y);
            if !state.board.is_empty_at(to)
                || is_dead_end(kind, player, y)
                || effects.is_square_forbidden(to)
            {
                continue;
            }
            moves.push(MoveRecord {
                ply: state.ply,
                player,
                from: MoveSource::Hand,
                to,
                piece: kind,
                piece_id: None,
                promoted: false,
                captured: None,
                drop: true,
            });
        }
    }
    moves
}

/// `player` 当前的全部候选着法：盘上走子加上所有持驹的打入。
pub fn all_moves(state: &GameState, player: Player) -> Vec<MoveRecord> {
    let mut moves: Vec<MoveRecord> = state
        .board
        .pieces()
        .filter(|(_, piece)| piece.owner == player)
        .flat_map(|(pos, _)| legal_moves(state, pos))
        .collect();

    let hand = state.hands.get(player);
    for kind in PieceKind::HAND_KINDS {
        if hand.count(kind) > 0 {
            moves.extend(drop_moves(state, kind, player));
        }
    }
    moves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::effects::EffectKind;

    fn kings_and(extra: &[(Position, PieceKind, Player)]) -> GameState {
        let mut pieces = vec![
            (Position::new(4, 8), PieceKind::King, Player::Sente),
            (Position::new(4, 0), PieceKind::King, Player::Gote),
        ];
        pieces.extend_from_slice(extra);
        GameState::with_pieces(&pieces)
    }

    fn destinations(moves: &[MoveRecord]) -> Vec<(i8, i8, bool)> {
        let mut out: Vec<_> = moves.iter().map(|mv| (mv.to.x, mv.to.y, mv.promoted)).collect();
        out.sort();
        out
    }

    #[test]
    fn opening_position_has_thirty_moves() {
        let state = GameState::new();
        assert_eq!(all_moves(&state, Player::Sente).len(), 30);
    }

    #[test]
    fn out_of_range_and_empty_squares_yield_nothing() {
        let state = GameState::new();
        assert!(legal_moves(&state, Position::new(9, 9)).is_empty());
        assert!(legal_moves(&state, Position::new(4, 4)).is_empty());
        assert!(legal_moves(&state, Position::new(4, 2)).is_empty());
    }

    #[test]
    fn gote_pieces_move_downwards() {
        let mut state = kings_and(&[(Position::new(2, 3), PieceKind::Knight, Player::Gote)]);
        state.turn = Player::Gote;
        assert_eq!(
            destinations(&legal_moves(&state, Position::new(2, 3))),
            vec![(1, 5, false), (3, 5, false)]
        );
    }

    #[test]
    fn pawn_reaching_last_rank_must_promote() {
        let state = kings_and(&[(Position::new(0, 1), PieceKind::Pawn, Player::Sente)]);
        assert_eq!(
            destinations(&legal_moves(&state, Position::new(0, 1))),
            vec![(0, 0, true)]
        );
    }

    #[test]
    fn entering_the_zone_offers_both_forms() {
        let state = kings_and(&[(Position::new(6, 3), PieceKind::Silver, Player::Sente)]);
        let moves = legal_moves(&state, Position::new(6, 3));
        assert!(moves.iter().any(|mv| mv.to == Position::new(6, 2) && mv.promoted));
        assert!(moves.iter().any(|mv| mv.to == Position::new(6, 2) && !mv.promoted));
        assert!(moves
            .iter()
            .filter(|mv| mv.to == Position::new(5, 4))
            .all(|mv| !mv.promoted));
    }

    #[test]
    fn knight_cannot_stop_on_the_last_two_ranks_unpromoted() {
        let state = kings_and(&[(Position::new(2, 3), PieceKind::Knight, Player::Sente)]);
        assert_eq!(
            destinations(&legal_moves(&state, Position::new(2, 3))),
            vec![(1, 1, true), (3, 1, true)]
        );
    }

    #[test]
    fn slides_stop_at_blockers_and_capture_enemies() {
        let state = kings_and(&[
            (Position::new(1, 4), PieceKind::Rook, Player::Sente),
            (Position::new(1, 6), PieceKind::Pawn, Player::Sente),
            (Position::new(3, 4), PieceKind::Pawn, Player::Gote),
        ]);
        let moves = legal_moves(&state, Position::new(1, 4));
        let right: Vec<_> = moves.iter().filter(|mv| mv.to.y == 4 && mv.to.x > 1).collect();
        assert_eq!(right.len(), 2);
        assert!(right
            .iter()
            .any(|mv| mv.to == Position::new(3, 4) && mv.captured == Some(PieceKind::Pawn)));
        assert!(moves.iter().all(|mv| mv.to != Position::new(1, 6)));
        assert!(moves.iter().any(|mv| mv.to == Position::new(1, 5)));
    }

    #[test]
    fn dragon_adds_diagonal_steps() {
        let state = kings_and(&[(Position::new(4, 4), PieceKind::Dragon, Player::Sente)]);
        let moves = legal_moves(&state, Position::new(4, 4));
        assert!(moves.iter().any(|mv| mv.to == Position::new(5, 5)));
        assert!(moves.iter().all(|mv| mv.to != Position::new(6, 6)));
        assert!(moves.iter().all(|mv| !mv.promoted));
    }

    #[test]
    fn pinned_piece_has_no_moves() {
        let mut state = kings_and(&[(Position::new(4, 6), PieceKind::Gold, Player::Sente)]);
        let id = state.piece_at(Position::new(4, 6)).map(|p| p.id).unwrap_or_default();
        state.effects.push(EffectKind::Pinned { piece: id }, 2);
        assert!(legal_moves(&state, Position::new(4, 6)).is_empty());
    }

    #[test]
    fn immune_piece_blocks_capture_and_slide() {
        let mut state = kings_and(&[
            (Position::new(0, 8), PieceKind::Lance, Player::Sente),
            (Position::new(0, 5), PieceKind::Silver, Player::Gote),
        ]);
        let id = state.piece_at(Position::new(0, 5)).map(|p| p.id).unwrap_or_default();
        state.effects.push(EffectKind::CaptureImmunity { piece: id }, 2);
        assert_eq!(
            destinations(&legal_moves(&state, Position::new(0, 8))),
            vec![(0, 6, false), (0, 7, false)]
        );
    }

    #[test]
    fn darkness_limits_rook_but_not_lance() {
        let mut state = kings_and(&[
            (Position::new(0, 8), PieceKind::Lance, Player::Sente),
            (Position::new(8, 8), PieceKind::Rook, Player::Sente),
        ]);
        state
            .effects
            .push(EffectKind::LimitedVisibility { max_distance: 3 }, 1);
        let rook = legal_moves(&state, Position::new(8, 8));
        assert!(rook.iter().all(|mv| mv.to.y >= 5));
        assert!(rook.iter().any(|mv| mv.to == Position::new(8, 5)));
        let lance = legal_moves(&state, Position::new(0, 8));
        assert!(lance.iter().any(|mv| mv.to == Position::new(0, 1)));
    }

    #[test]
    fn exhaustion_freezes_the_last_moved_piece() {
        let mut state = GameState::new();
        let pawn_id = state.piece_at(Position::new(2, 6)).map(|p| p.id);
        let mv = legal_moves(&state, Position::new(2, 6)).remove(0);
        state.board.take(Position::new(2, 6));
        state.board.set(
            Position::new(2, 5),
            pawn_id.map(|id| Piece::new(PieceKind::Pawn, Player::Sente, id)),
        );
        state.history.push(crate::game::state::HistoryEntry::Move { record: mv });
        state.effects.push(EffectKind::Exhaustion, 2);

        assert!(legal_moves(&state, Position::new(2, 5)).is_empty());
        assert!(!legal_moves(&state, Position::new(3, 6)).is_empty());
    }

    #[test]
    fn drops_respect_dead_ends_ban_and_cooldown() {
        let mut state = kings_and(&[]);
        state.hands.sente.knight = 1;
        state.hands.sente.lance = 1;
        let knights = drop_moves(&state, PieceKind::Knight, Player::Sente);
        assert!(knights.iter().all(|mv| mv.to.y >= 2));
        assert_eq!(knights.len(), 7 * 9 - 1);

        state.effects.push(
            EffectKind::DropCooldown {
                owner: Player::Sente,
                kind: PieceKind::Knight,
            },
            2,
        );
        assert!(drop_moves(&state, PieceKind::Knight, Player::Sente).is_empty());
        assert!(!drop_moves(&state, PieceKind::Lance, Player::Sente).is_empty());

        state.effects.push(EffectKind::DropBan, 1);
        assert!(drop_moves(&state, PieceKind::Lance, Player::Sente).is_empty());
    }

    #[test]
    fn checkpoint_square_refuses_drops() {
        let mut state = kings_and(&[]);
        state.hands.sente.gold = 1;
        state.effects.push(
            EffectKind::ForbiddenSquare {
                square: Position::new(4, 4),
            },
            2,
        );
        let drops = drop_moves(&state, PieceKind::Gold, Player::Sente);
        assert_eq!(drops.len(), 9 * 9 - 3);
        assert!(drops.iter().all(|mv| mv.to != Position::new(4, 4)));
    }

    #[test]
    fn promoted_pawn_does_not_block_pawn_drops() {
        let mut state = kings_and(&[(Position::new(5, 3), PieceKind::ProPawn, Player::Sente)]);
        state.hands.sente.pawn = 1;
        let drops = drop_moves(&state, PieceKind::Pawn, Player::Sente);
        assert!(drops.iter().any(|mv| mv.to.x == 5));
    }
}
