use log::info;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::effects::EffectKind;
use super::rules::RulesConfig;
use super::state::{GameState, PieceKind, Player};
use super::trump::CardCategory;

/// 随机事件。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventKind {
    #[serde(rename = "EV_SUPPLY")]
    Supply,
    #[serde(rename = "EV_INSPECTION")]
    Inspection,
    #[serde(rename = "EV_DARKNESS")]
    Darkness,
    #[serde(rename = "EV_RATIONS")]
    Rations,
    #[serde(rename = "EV_REDEPLOY")]
    Redeploy,
    #[serde(rename = "EV_EXHAUST")]
    Exhaustion,
    #[serde(rename = "EV_WARDRUM")]
    WarDrum,
    #[serde(rename = "EV_FIELDWORKS")]
    Fieldworks,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventInfo {
    pub id: EventKind,
    pub name: &'static str,
    pub category: CardCategory,
    pub chaos: u8,
    pub short_text: &'static str,
    pub long_text: &'static str,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::Supply,
        EventKind::Inspection,
        EventKind::Darkness,
        EventKind::Rations,
        EventKind::Redeploy,
        EventKind::Exhaustion,
        EventKind::WarDrum,
        EventKind::Fieldworks,
    ];

    /// 事件为双方各自发放的步兵数。
    pub fn pawn_grant(self) -> u8 {
        match self {
            EventKind::Supply | EventKind::Fieldworks => 1,
            EventKind::Rations => 2,
            _ => 0,
        }
    }

    pub fn info(self) -> EventInfo {
        let (name, chaos, short_text, long_text) = match self {
            EventKind::Supply => (
                "Supply",
                1,
                "Both +1 pawn",
                "Both players add one pawn to their hand.",
            ),
            EventKind::Inspection => (
                "Inspection",
                2,
                "No drops next action",
                "For the next action neither player may drop.",
            ),
            EventKind::Darkness => (
                "Darkness",
                2,
                "Rook/bishop range 3",
                "For the next action rooks and bishops slide at most three squares.",
            ),
            EventKind::Rations => (
                "Rations",
                2,
                "Both +2 pawns",
                "Both players add two pawns to their hand.",
            ),
            EventKind::Redeploy => (
                "Redeploy",
                2,
                "Optional recall",
                "Players may recall a piece; currently has no effect.",
            ),
            EventKind::Exhaustion => (
                "Exhaustion",
                3,
                "No repeat mover",
                "For the next two actions no player may move the same piece twice in a row.",
            ),
            EventKind::WarDrum => (
                "War Drum",
                2,
                "Capture: +1 pawn",
                "Capturing during the next actions earns one extra pawn.",
            ),
            EventKind::Fieldworks => (
                "Fieldworks",
                2,
                "Both +1 pawn",
                "Both players add one pawn to their hand.",
            ),
        };
        EventInfo {
            id: self,
            name,
            category: CardCategory::Event,
            chaos,
            short_text,
            long_text,
        }
    }
}

/// 预告阶段：不放回地均匀抽取候选事件，覆盖已有预告。
pub fn roll_preview<R: Rng + ?Sized>(state: &mut GameState, rng: &mut R, count: usize) {
    state.event_preview = EventKind::ALL
        .choose_multiple(rng, count)
        .copied()
        .collect();
    info!("event preview at ply {}: {:?}", state.ply, state.event_preview);
}

/// 发动阶段：从预告中均匀抽取一个并生效，随后清空预告。
pub fn activate_preview<R: Rng + ?Sized>(
    state: &mut GameState,
    rng: &mut R,
    config: &RulesConfig,
) -> Option<EventKind> {
    let event = *state.event_preview.choose(rng)?;
    apply_event(state, event, config);
    state.event_preview.clear();
    state.last_event = Some(event);
    info!("event {:?} activated at ply {}", event, state.ply);
    Some(event)
}

pub fn apply_event(state: &mut GameState, event: EventKind, config: &RulesConfig) {
    match event {
        EventKind::Supply | EventKind::Fieldworks | EventKind::Rations => {
            grant_both(state, event.pawn_grant())
        }
        EventKind::Redeploy => {}
        EventKind::Inspection => state
            .effects
            .push(EffectKind::DropBan, config.durations.inspection),
        EventKind::Darkness => state.effects.push(
            EffectKind::LimitedVisibility {
                max_distance: config.visibility_range,
            },
            config.durations.darkness,
        ),
        EventKind::Exhaustion => state
            .effects
            .push(EffectKind::Exhaustion, config.durations.exhaustion),
        EventKind::WarDrum => state
            .effects
            .push(EffectKind::WarDrum, config.durations.war_drum),
    }
}

fn grant_both(state: &mut GameState, pawns: u8) {
    for player in Player::ALL {
        state.hands.get_mut(player).add(PieceKind::Pawn, pawns);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn preview_draws_distinct_events() {
        let mut state = GameState::new();
        let mut rng = SmallRng::seed_from_u64(11);
        roll_preview(&mut state, &mut rng, 3);
        assert_eq!(state.event_preview.len(), 3);
        let mut unique = state.event_preview.clone();
        unique.sort_by_key(|event| EventKind::ALL.iter().position(|e| e == event));
        unique.dedup();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn activation_picks_from_preview_and_clears_it() {
        let mut state = GameState::new();
        state.event_preview = vec![EventKind::Supply];
        let mut rng = SmallRng::seed_from_u64(3);
        let event = activate_preview(&mut state, &mut rng, &RulesConfig::default());
        assert_eq!(event, Some(EventKind::Supply));
        assert_eq!(state.last_event, Some(EventKind::Supply));
        assert!(state.event_preview.is_empty());
        assert_eq!(state.hands.sente.pawn, 1);
        assert_eq!(state.hands.gote.pawn, 1);
    }

    #[test]
    fn activation_without_preview_does_nothing() {
        let mut state = GameState::new();
        let mut rng = SmallRng::seed_from_u64(3);
        assert_eq!(
            activate_preview(&mut state, &mut rng, &RulesConfig::default()),
            None
        );
        assert!(state.effects.is_empty());
    }

    #[test]
    fn global_events_push_ledger_entries() {
        let config = RulesConfig::default();
        let mut state = GameState::new();
        apply_event(&mut state, EventKind::Darkness, &config);
        apply_event(&mut state, EventKind::Inspection, &config);
        apply_event(&mut state, EventKind::Redeploy, &config);
        assert_eq!(state.effects.visibility_limit(), Some(3));
        assert!(state.effects.drops_banned());
        assert_eq!(state.effects.len(), 2);
    }

    #[test]
    fn grant_events_pay_each_side_exactly_once() {
        let config = RulesConfig::default();
        for event in EventKind::ALL {
            let mut state = GameState::new();
            apply_event(&mut state, event, &config);
            let grant = event.pawn_grant();
            assert_eq!(state.hands.sente.pawn, grant, "{:?}", event);
            assert_eq!(state.hands.gote.pawn, grant, "{:?}", event);
        }
    }
}
