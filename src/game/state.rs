use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

use super::effects::EffectLedger;
use super::events::EventKind;
use super::trump::TrumpCard;

/// 棋盘边长。
pub const BOARD_SIZE: i8 = 9;

/// 棋子在整个生命周期内不变的标识。
pub type PieceId = u32;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Player {
    Sente,
    Gote,
}

impl Player {
    pub const ALL: [Player; 2] = [Player::Sente, Player::Gote];

    pub fn opponent(self) -> Self {
        match self {
            Player::Sente => Player::Gote,
            Player::Gote => Player::Sente,
        }
    }

    /// 朝向对方阵地的行进方向。
    pub fn forward(self) -> i8 {
        match self {
            Player::Sente => -1,
            Player::Gote => 1,
        }
    }

    /// 第 `y` 段是否位于该玩家的敌阵三段（升变区）。
    pub fn in_promotion_zone(self, y: i8) -> bool {
        match self {
            Player::Sente => y <= 2,
            Player::Gote => y >= 6,
        }
    }

    /// 第 `y` 段是否位于该玩家的己方三段。
    pub fn in_own_territory(self, y: i8) -> bool {
        self.opponent().in_promotion_zone(y)
    }

    /// 从该玩家视角看，第 `y` 段距离最远一段的段数（0 即最远段）。
    pub fn ranks_from_far_edge(self, y: i8) -> i8 {
        match self {
            Player::Sente => y,
            Player::Gote => BOARD_SIZE - 1 - y,
        }
    }
}

impl FromStr for Player {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sente" | "black" => Ok(Player::Sente),
            "gote" | "white" => Ok(Player::Gote),
            _ => Err(()),
        }
    }
}

/// 棋子种类：8 种基本棋子与 6 种升变棋子。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PieceKind {
    #[serde(rename = "P")]
    Pawn,
    #[serde(rename = "L")]
    Lance,
    #[serde(rename = "N")]
    Knight,
    #[serde(rename = "S")]
    Silver,
    #[serde(rename = "G")]
    Gold,
    #[serde(rename = "B")]
    Bishop,
    #[serde(rename = "R")]
    Rook,
    #[serde(rename = "K")]
    King,
    #[serde(rename = "+P")]
    ProPawn,
    #[serde(rename = "+L")]
    ProLance,
    #[serde(rename = "+N")]
    ProKnight,
    #[serde(rename = "+S")]
    ProSilver,
    #[serde(rename = "+B")]
    Horse,
    #[serde(rename = "+R")]
    Dragon,
}

impl PieceKind {
    /// 可以进入持驹的种类。
    pub const HAND_KINDS: [PieceKind; 7] = [
        PieceKind::Pawn,
        PieceKind::Lance,
        PieceKind::Knight,
        PieceKind::Silver,
        PieceKind::Gold,
        PieceKind::Bishop,
        PieceKind::Rook,
    ];

    pub fn can_promote(self) -> bool {
        self.promote().is_some()
    }

    pub fn promote(self) -> Option<PieceKind> {
        match self {
            PieceKind::Pawn => Some(PieceKind::ProPawn),
            PieceKind::Lance => Some(PieceKind::ProLance),
            PieceKind::Knight => Some(PieceKind::ProKnight),
            PieceKind::Silver => Some(PieceKind::ProSilver),
            PieceKind::Bishop => Some(PieceKind::Horse),
            PieceKind::Rook => Some(PieceKind::Dragon),
            _ => None,
        }
    }

    pub fn unpromote(self) -> PieceKind {
        match self {
            PieceKind::ProPawn => PieceKind::Pawn,
            PieceKind::ProLance => PieceKind::Lance,
            PieceKind::ProKnight => PieceKind::Knight,
            PieceKind::ProSilver => PieceKind::Silver,
            PieceKind::Horse => PieceKind::Bishop,
            PieceKind::Dragon => PieceKind::Rook,
            other => other,
        }
    }

    pub fn is_king(self) -> bool {
        self == PieceKind::King
    }

    pub fn is_hand_kind(self) -> bool {
        Self::HAND_KINDS.contains(&self)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            PieceKind::Pawn => "P",
            PieceKind::Lance => "L",
            PieceKind::Knight => "N",
            PieceKind::Silver => "S",
            PieceKind::Gold => "G",
            PieceKind::Bishop => "B",
            PieceKind::Rook => "R",
            PieceKind::King => "K",
            PieceKind::ProPawn => "+P",
            PieceKind::ProLance => "+L",
            PieceKind::ProKnight => "+N",
            PieceKind::ProSilver => "+S",
            PieceKind::Horse => "+B",
            PieceKind::Dragon => "+R",
        }
    }
}

impl FromStr for PieceKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "P" => Ok(PieceKind::Pawn),
            "L" => Ok(PieceKind::Lance),
            "N" => Ok(PieceKind::Knight),
            "S" => Ok(PieceKind::Silver),
            "G" => Ok(PieceKind::Gold),
            "B" => Ok(PieceKind::Bishop),
            "R" => Ok(PieceKind::Rook),
            "K" => Ok(PieceKind::King),
            "+P" => Ok(PieceKind::ProPawn),
            "+L" => Ok(PieceKind::ProLance),
            "+N" => Ok(PieceKind::ProKnight),
            "+S" => Ok(PieceKind::ProSilver),
            "+B" => Ok(PieceKind::Horse),
            "+R" => Ok(PieceKind::Dragon),
            _ => Err(()),
        }
    }
}

/// 棋盘坐标。x 为筋（0 对应 9 筋），y 为段（0 对应一段）。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i8,
    pub y: i8,
}

impl Position {
    pub const fn new(x: i8, y: i8) -> Self {
        Self { x, y }
    }

    pub fn is_valid(&self) -> bool {
        (0..BOARD_SIZE).contains(&self.x) && (0..BOARD_SIZE).contains(&self.y)
    }

    pub fn offset(&self, dx: i8, dy: i8) -> Option<Position> {
        let next = Position::new(self.x + dx, self.y + dy);
        next.is_valid().then_some(next)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Piece {
    pub kind: PieceKind,
    pub owner: Player,
    pub id: PieceId,
}

impl Piece {
    pub fn new(kind: PieceKind, owner: Player, id: PieceId) -> Self {
        Self { kind, owner, id }
    }
}

/// 9×9 棋盘，按 `squares[y][x]` 存放。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Board {
    squares: [[Option<Piece>; 9]; 9],
}

impl Board {
    pub fn empty() -> Self {
        Self {
            squares: [[None; 9]; 9],
        }
    }

    /// 越界坐标视为空格。
    pub fn get(&self, pos: Position) -> Option<Piece> {
        if !pos.is_valid() {
            return None;
        }
        self.squares[pos.y as usize][pos.x as usize]
    }

    pub fn is_empty_at(&self, pos: Position) -> bool {
        pos.is_valid() && self.get(pos).is_none()
    }

    pub(crate) fn set(&mut self, pos: Position, piece: Option<Piece>) {
        if pos.is_valid() {
            self.squares[pos.y as usize][pos.x as usize] = piece;
        }
    }

    pub(crate) fn take(&mut self, pos: Position) -> Option<Piece> {
        if !pos.is_valid() {
            return None;
        }
        self.squares[pos.y as usize][pos.x as usize].take()
    }

    pub fn pieces(&self) -> impl Iterator<Item = (Position, Piece)> + '_ {
        self.squares.iter().enumerate().flat_map(|(y, row)| {
            row.iter().enumerate().filter_map(move |(x, square)| {
                square.map(|piece| (Position::new(x as i8, y as i8), piece))
            })
        })
    }

    pub fn find_piece(&self, id: PieceId) -> Option<(Position, Piece)> {
        self.pieces().find(|(_, piece)| piece.id == id)
    }

    pub fn has_unpromoted_pawn_on_file(&self, owner: Player, x: i8) -> bool {
        (0..BOARD_SIZE).any(|y| {
            matches!(
                self.get(Position::new(x, y)),
                Some(Piece { kind: PieceKind::Pawn, owner: o, .. }) if o == owner
            )
        })
    }
}

/// 持驹数量。
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hand {
    #[serde(rename = "P", default)]
    pub pawn: u8,
    #[serde(rename = "L", default)]
    pub lance: u8,
    #[serde(rename = "N", default)]
    pub knight: u8,
    #[serde(rename = "S", default)]
    pub silver: u8,
    #[serde(rename = "G", default)]
    pub gold: u8,
    #[serde(rename = "B", default)]
    pub bishop: u8,
    #[serde(rename = "R", default)]
    pub rook: u8,
}

impl Hand {
    fn slot_mut(&mut self, kind: PieceKind) -> Option<&mut u8> {
        match kind {
            PieceKind::Pawn => Some(&mut self.pawn),
            PieceKind::Lance => Some(&mut self.lance),
            PieceKind::Knight => Some(&mut self.knight),
            PieceKind::Silver => Some(&mut self.silver),
            PieceKind::Gold => Some(&mut self.gold),
            PieceKind::Bishop => Some(&mut self.bishop),
            PieceKind::Rook => Some(&mut self.rook),
            _ => None,
        }
    }

    pub fn count(&self, kind: PieceKind) -> u8 {
        match kind {
            PieceKind::Pawn => self.pawn,
            PieceKind::Lance => self.lance,
            PieceKind::Knight => self.knight,
            PieceKind::Silver => self.silver,
            PieceKind::Gold => self.gold,
            PieceKind::Bishop => self.bishop,
            PieceKind::Rook => self.rook,
            _ => 0,
        }
    }

    /// 以降级后的种类加入持驹；王将被忽略。
    pub fn add(&mut self, kind: PieceKind, count: u8) {
        if let Some(slot) = self.slot_mut(kind.unpromote()) {
            *slot = slot.saturating_add(count);
        }
    }

    /// 取出一枚持驹；没有时返回 false。
    pub fn take(&mut self, kind: PieceKind) -> bool {
        match self.slot_mut(kind) {
            Some(slot) if *slot > 0 => {
                *slot -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn total(&self) -> u32 {
        PieceKind::HAND_KINDS
            .iter()
            .map(|kind| self.count(*kind) as u32)
            .sum()
    }
}

/// 先手、后手各持一份的数据。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BySide<T> {
    pub sente: T,
    pub gote: T,
}

impl<T> BySide<T> {
    pub fn get(&self, player: Player) -> &T {
        match player {
            Player::Sente => &self.sente,
            Player::Gote => &self.gote,
        }
    }

    pub fn get_mut(&mut self, player: Player) -> &mut T {
        match player {
            Player::Sente => &mut self.sente,
            Player::Gote => &mut self.gote,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum MoveSource {
    Square { pos: Position },
    Hand,
}

/// 一步棋的记录：既是着法生成的输出，也是状态转移的输入。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoveRecord {
    pub ply: u32,
    pub player: Player,
    pub from: MoveSource,
    pub to: Position,
    pub piece: PieceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub piece_id: Option<PieceId>,
    #[serde(default)]
    pub promoted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured: Option<PieceKind>,
    #[serde(default)]
    pub drop: bool,
}

impl MoveRecord {
    pub fn is_drop(&self) -> bool {
        self.drop
    }

    pub fn source_square(&self) -> Option<Position> {
        match self.from {
            MoveSource::Square { pos } => Some(pos),
            MoveSource::Hand => None,
        }
    }
}

/// 棋谱条目：普通着法，或王牌发动。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum HistoryEntry {
    Move { record: MoveRecord },
    Trump { ply: u32, player: Player, card: TrumpCard },
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrumpSlot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chosen: Option<TrumpCard>,
    #[serde(default)]
    pub used: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[serde(tag = "type")]
pub enum IntegrityError {
    #[error("piece id {id} appears more than once")]
    DuplicatePieceId { id: PieceId },
    #[error("{player:?} has {count} kings on the board")]
    KingCount { player: Player, count: usize },
}

const INITIAL_BACK_RANK: [PieceKind; 9] = [
    PieceKind::Lance,
    PieceKind::Knight,
    PieceKind::Silver,
    PieceKind::Gold,
    PieceKind::King,
    PieceKind::Gold,
    PieceKind::Silver,
    PieceKind::Knight,
    PieceKind::Lance,
];

/// 对局整体状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameState {
    pub board: Board,
    pub hands: BySide<Hand>,
    pub turn: Player,
    pub ply: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub trump: BySide<TrumpSlot>,
    #[serde(default)]
    pub effects: EffectLedger,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_preview: Vec<EventKind>,
    /// 最近一次发动的随机事件。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event: Option<EventKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Player>,
    next_piece_id: PieceId,
}

impl GameState {
    /// 标准开局：先手行棋，手数为 1。
    pub fn new() -> Self {
        let mut state = Self {
            board: Board::empty(),
            hands: BySide::default(),
            turn: Player::Sente,
            ply: 1,
            history: Vec::new(),
            trump: BySide::default(),
            effects: EffectLedger::default(),
            event_preview: Vec::new(),
            last_event: None,
            winner: None,
            next_piece_id: 1,
        };

        for (player, back, rook_bishop, pawns) in [(Player::Gote, 0, 1, 2), (Player::Sente, 8, 7, 6)] {
            for (x, kind) in INITIAL_BACK_RANK.iter().enumerate() {
                state.spawn(Position::new(x as i8, back), *kind, player);
            }
            let (rook_x, bishop_x) = match player {
                Player::Gote => (1, 7),
                Player::Sente => (7, 1),
            };
            state.spawn(Position::new(rook_x, rook_bishop), PieceKind::Rook, player);
            state.spawn(Position::new(bishop_x, rook_bishop), PieceKind::Bishop, player);
            for x in 0..BOARD_SIZE {
                state.spawn(Position::new(x, pawns), PieceKind::Pawn, player);
            }
        }
        state
    }

    /// 只摆放指定棋子的局面，便于构造测试局面。
    pub fn with_pieces(pieces: &[(Position, PieceKind, Player)]) -> Self {
        let mut state = Self::new();
        state.board = Board::empty();
        state.next_piece_id = 1;
        for (pos, kind, owner) in pieces {
            state.spawn(*pos, *kind, *owner);
        }
        state
    }

    pub(crate) fn mint_piece_id(&mut self) -> PieceId {
        let id = self.next_piece_id;
        self.next_piece_id += 1;
        id
    }

    /// 以新标识放置棋子，覆盖该格原有内容。
    pub(crate) fn spawn(&mut self, pos: Position, kind: PieceKind, owner: Player) -> Piece {
        let piece = Piece::new(kind, owner, self.mint_piece_id());
        self.board.set(pos, Some(piece));
        piece
    }

    pub fn piece_at(&self, pos: Position) -> Option<Piece> {
        self.board.get(pos)
    }

    pub fn is_finished(&self) -> bool {
        self.winner.is_some()
    }

    pub fn moves(&self) -> impl DoubleEndedIterator<Item = &MoveRecord> + '_ {
        self.history.iter().filter_map(|entry| match entry {
            HistoryEntry::Move { record } => Some(record),
            HistoryEntry::Trump { .. } => None,
        })
    }

    /// `player` 最近一次走子或打入。
    pub fn last_move_by(&self, player: Player) -> Option<&MoveRecord> {
        self.moves().rev().find(|record| record.player == player)
    }

    pub fn record_trump(&mut self, player: Player, card: TrumpCard) {
        self.history.push(HistoryEntry::Trump {
            ply: self.ply,
            player,
            card,
        });
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        let mut seen = HashSet::new();
        let mut kings = BySide::<usize>::default();
        for (_, piece) in self.board.pieces() {
            if !seen.insert(piece.id) {
                return Err(IntegrityError::DuplicatePieceId { id: piece.id });
            }
            if piece.kind.is_king() {
                *kings.get_mut(piece.owner) += 1;
            }
        }

        for player in Player::ALL {
            let count = *kings.get(player);
            let expected = match self.winner {
                Some(winner) if winner != player => 0..=1,
                _ => 1..=1,
            };
            if !expected.contains(&count) {
                return Err(IntegrityError::KingCount { player, count });
            }
        }
        Ok(())
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
