use serde::{Deserialize, Serialize};

use super::state::{PieceId, PieceKind, Player, Position};

/// 直到触发才消失的效果所使用的持续时间。
pub const UNTIL_TRIGGERED: u32 = 999;

/// 生效中的修正效果，每种效果带有各自形状的载荷。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum EffectKind {
    /// 关所：双方都不能进入该格。
    ForbiddenSquare { square: Position },
    /// 足止：该棋子不能移动。
    Pinned { piece: PieceId },
    /// 焼却命令：`owner` 的棋子下一次被吃时直接消灭。
    DenyCaptureToHand { owner: Player },
    /// 追撃命令：`owner` 吃子后不交换行棋方。
    Pursuit { owner: Player },
    /// 二連投入：`owner` 本回合可以打入两次。
    DoubleDeploy { owner: Player, drops: u8 },
    /// 護衛：该棋子不能被吃。
    CaptureImmunity { piece: PieceId },
    /// 懸賞首：该棋子被吃时 `marker` 获得一枚步。
    Bounty { piece: PieceId, marker: Player },
    /// 撤収后的冷却：`owner` 暂时不能打入该种类。
    DropCooldown { owner: Player, kind: PieceKind },
    /// 検問：双方都不能打入。
    DropBan,
    /// 視界不良：飛、角的移动距离上限。
    LimitedVisibility { max_distance: u8 },
    /// 疲労：不能连续移动同一枚棋子。
    Exhaustion,
    /// 軍鼓：吃子时额外获得一枚步。
    WarDrum,
}

impl EffectKind {
    /// 绑定到某枚棋子的效果返回该棋子的标识。
    pub fn bound_piece(&self) -> Option<PieceId> {
        match self {
            EffectKind::Pinned { piece }
            | EffectKind::CaptureImmunity { piece }
            | EffectKind::Bounty { piece, .. } => Some(*piece),
            EffectKind::ForbiddenSquare { .. }
            | EffectKind::DenyCaptureToHand { .. }
            | EffectKind::Pursuit { .. }
            | EffectKind::DoubleDeploy { .. }
            | EffectKind::DropCooldown { .. }
            | EffectKind::DropBan
            | EffectKind::LimitedVisibility { .. }
            | EffectKind::Exhaustion
            | EffectKind::WarDrum => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveEffect {
    pub kind: EffectKind,
    pub remaining: u32,
}

/// 按加入顺序保存的生效中效果。同种效果可以同时存在多条，查询时取最早的一条。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct EffectLedger {
    entries: Vec<ActiveEffect>,
}

impl EffectLedger {
    pub fn push(&mut self, kind: EffectKind, duration: u32) {
        if duration == 0 {
            return;
        }
        self.entries.push(ActiveEffect {
            kind,
            remaining: duration,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveEffect> + '_ {
        self.entries.iter()
    }

    pub fn find<P>(&self, predicate: P) -> Option<&ActiveEffect>
    where
        P: Fn(&EffectKind) -> bool,
    {
        self.entries.iter().find(|entry| predicate(&entry.kind))
    }

    pub fn find_mut<P>(&mut self, predicate: P) -> Option<&mut ActiveEffect>
    where
        P: Fn(&EffectKind) -> bool,
    {
        self.entries.iter_mut().find(|entry| predicate(&entry.kind))
    }

    pub fn contains<P>(&self, predicate: P) -> bool
    where
        P: Fn(&EffectKind) -> bool,
    {
        self.find(predicate).is_some()
    }

    /// 移除并返回第一条匹配的效果。
    pub fn consume<P>(&mut self, predicate: P) -> Option<ActiveEffect>
    where
        P: Fn(&EffectKind) -> bool,
    {
        let index = self.entries.iter().position(|entry| predicate(&entry.kind))?;
        Some(self.entries.remove(index))
    }

    /// 棋子离开棋盘后，绑定在它身上的效果一并失效。
    pub fn release_piece(&mut self, id: PieceId) {
        self.entries
            .retain(|entry| entry.kind.bound_piece() != Some(id));
    }

    /// 将前 `settled` 条效果的剩余时间减一并移除归零的条目；之后的条目是本次转移中刚加入的，不参与衰减。
    pub fn decay(&mut self, settled: usize) {
        let mut index = 0;
        self.entries.retain_mut(|entry| {
            let keep = if index < settled {
                entry.remaining = entry.remaining.saturating_sub(1);
                entry.remaining > 0
            } else {
                true
            };
            index += 1;
            keep
        });
    }

    pub fn is_square_forbidden(&self, pos: Position) -> bool {
        self.contains(|kind| matches!(kind, EffectKind::ForbiddenSquare { square } if *square == pos))
    }

    pub fn is_pinned(&self, id: PieceId) -> bool {
        self.contains(|kind| matches!(kind, EffectKind::Pinned { piece } if *piece == id))
    }

    pub fn is_immune(&self, id: PieceId) -> bool {
        self.contains(|kind| matches!(kind, EffectKind::CaptureImmunity { piece } if *piece == id))
    }

    pub fn drops_banned(&self) -> bool {
        self.contains(|kind| matches!(kind, EffectKind::DropBan))
    }

    pub fn visibility_limit(&self) -> Option<u8> {
        self.iter()
            .filter_map(|entry| match entry.kind {
                EffectKind::LimitedVisibility { max_distance } => Some(max_distance),
                _ => None,
            })
            .min()
    }

    pub fn exhaustion_active(&self) -> bool {
        self.contains(|kind| matches!(kind, EffectKind::Exhaustion))
    }

    pub fn war_drum_active(&self) -> bool {
        self.contains(|kind| matches!(kind, EffectKind::WarDrum))
    }

    pub fn drop_on_cooldown(&self, player: Player, piece: PieceKind) -> bool {
        self.contains(|effect| {
            matches!(effect, EffectKind::DropCooldown { owner, kind } if *owner == player && *kind == piece)
        })
    }

    /// 二連投入生效期间该玩家已经打入的次数。
    pub fn double_deploy_drops(&self, player: Player) -> Option<u8> {
        self.iter().find_map(|entry| match entry.kind {
            EffectKind::DoubleDeploy { owner, drops } if owner == player => Some(drops),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decay_removes_expired_entries_and_spares_fresh_ones() {
        let mut ledger = EffectLedger::default();
        ledger.push(EffectKind::DropBan, 1);
        ledger.push(EffectKind::WarDrum, 2);
        ledger.push(EffectKind::Exhaustion, 1);

        ledger.decay(2);

        assert!(!ledger.drops_banned());
        assert!(ledger.war_drum_active());
        assert!(ledger.exhaustion_active());
        assert_eq!(ledger.len(), 2);

        ledger.decay(ledger.len());
        assert!(!ledger.war_drum_active());
        assert!(!ledger.exhaustion_active());
        assert!(ledger.is_empty());
    }

    #[test]
    fn zero_duration_is_never_stored() {
        let mut ledger = EffectLedger::default();
        ledger.push(EffectKind::WarDrum, 0);
        assert!(ledger.is_empty());
    }

    #[test]
    fn consume_takes_only_the_first_match() {
        let mut ledger = EffectLedger::default();
        ledger.push(EffectKind::Pursuit { owner: Player::Sente }, 1);
        ledger.push(EffectKind::Pursuit { owner: Player::Sente }, 1);

        let taken = ledger.consume(|kind| matches!(kind, EffectKind::Pursuit { .. }));
        assert!(taken.is_some());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn release_piece_drops_bound_effects() {
        let mut ledger = EffectLedger::default();
        ledger.push(EffectKind::Pinned { piece: 7 }, 2);
        ledger.push(
            EffectKind::Bounty {
                piece: 7,
                marker: Player::Gote,
            },
            UNTIL_TRIGGERED,
        );
        ledger.push(EffectKind::CaptureImmunity { piece: 8 }, 2);

        ledger.release_piece(7);

        assert!(!ledger.is_pinned(7));
        assert!(ledger.is_immune(8));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn visibility_takes_tightest_limit() {
        let mut ledger = EffectLedger::default();
        assert_eq!(ledger.visibility_limit(), None);
        ledger.push(EffectKind::LimitedVisibility { max_distance: 3 }, 1);
        ledger.push(EffectKind::LimitedVisibility { max_distance: 2 }, 1);
        assert_eq!(ledger.visibility_limit(), Some(2));
    }
}
