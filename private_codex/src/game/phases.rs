//! Match phases and what each one allows.
//!
//! Phases only move forward:
//! `Login -> AwaitCapacity -> AwaitColor -> RootPlacement ->
//! ObjectiveSelection -> TurnFlow -> End`.

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt};

use super::{entities::Username, errors::UserError};

/// Kinds of state-changing actions a player can submit.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ActionKind {
    Login,
    FixCapacity,
    AssignColor,
    PlaceCard,
    DrawCard,
    ChooseObjective,
}

impl ActionKind {
    /// Actions that belong to a player's turn.
    pub fn is_turn_action(self) -> bool {
        matches!(self, Self::PlaceCard | Self::DrawCard)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Login => "login",
            Self::FixCapacity => "fix capacity",
            Self::AssignColor => "assign color",
            Self::PlaceCard => "place card",
            Self::DrawCard => "draw card",
            Self::ChooseObjective => "choose objective",
        };
        write!(f, "{repr}")
    }
}

#[enum_dispatch]
pub trait PhaseRules {
    fn name(&self) -> &'static str;

    fn permits(&self, action: ActionKind) -> bool;

    /// Whether permitted actions must come from the current player.
    fn requires_turn(&self) -> bool;
}

/// Players who finished a wait-for-all step. Empty on phase entry.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Completion(BTreeSet<Username>);

impl Completion {
    /// Record `name` as done.
    ///
    /// # Errors
    ///
    /// * `InvalidAction` - `name` already completed this step
    pub fn complete(&mut self, name: &Username) -> Result<(), UserError> {
        if !self.0.insert(name.clone()) {
            return Err(UserError::InvalidAction);
        }
        Ok(())
    }

    pub fn contains(&self, name: &Username) -> bool {
        self.0.contains(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Nobody admitted yet.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Login;

/// Admitting players until the lobby is ready.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct AwaitCapacity;

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct AwaitColor;

/// Every player places their starter card at the origin.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct RootPlacement {
    pub completed: Completion,
}

/// Every player picks one of their two secret objectives.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ObjectiveSelection {
    pub completed: Completion,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStage {
    Place,
    Draw,
}

/// Regular play: each turn is a placement followed by a draw.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TurnFlow {
    pub stage: TurnStage,
    /// Set once someone reached the final-round threshold.
    pub final_round: bool,
}

impl Default for TurnFlow {
    fn default() -> Self {
        Self {
            stage: TurnStage::Place,
            final_round: false,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct End;

impl PhaseRules for Login {
    fn name(&self) -> &'static str {
        "login"
    }

    fn permits(&self, action: ActionKind) -> bool {
        action == ActionKind::Login
    }

    fn requires_turn(&self) -> bool {
        false
    }
}

impl PhaseRules for AwaitCapacity {
    fn name(&self) -> &'static str {
        "await_capacity"
    }

    fn permits(&self, action: ActionKind) -> bool {
        matches!(action, ActionKind::Login | ActionKind::FixCapacity)
    }

    fn requires_turn(&self) -> bool {
        false
    }
}

impl PhaseRules for AwaitColor {
    fn name(&self) -> &'static str {
        "await_color"
    }

    fn permits(&self, action: ActionKind) -> bool {
        action == ActionKind::AssignColor
    }

    fn requires_turn(&self) -> bool {
        false
    }
}

impl PhaseRules for RootPlacement {
    fn name(&self) -> &'static str {
        "root_placement"
    }

    fn permits(&self, action: ActionKind) -> bool {
        action == ActionKind::PlaceCard
    }

    fn requires_turn(&self) -> bool {
        false
    }
}

impl PhaseRules for ObjectiveSelection {
    fn name(&self) -> &'static str {
        "objective_selection"
    }

    fn permits(&self, action: ActionKind) -> bool {
        action == ActionKind::ChooseObjective
    }

    fn requires_turn(&self) -> bool {
        false
    }
}

impl PhaseRules for TurnFlow {
    fn name(&self) -> &'static str {
        match self.stage {
            TurnStage::Place => "turn_flow_place",
            TurnStage::Draw => "turn_flow_draw",
        }
    }

    fn permits(&self, action: ActionKind) -> bool {
        match self.stage {
            TurnStage::Place => action == ActionKind::PlaceCard,
            TurnStage::Draw => action == ActionKind::DrawCard,
        }
    }

    fn requires_turn(&self) -> bool {
        true
    }
}

impl PhaseRules for End {
    fn name(&self) -> &'static str {
        "end"
    }

    fn permits(&self, _action: ActionKind) -> bool {
        false
    }

    fn requires_turn(&self) -> bool {
        false
    }
}

#[enum_dispatch(PhaseRules)]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Login,
    AwaitCapacity,
    AwaitColor,
    RootPlacement,
    ObjectiveSelection,
    TurnFlow,
    End,
}

impl Default for Phase {
    fn default() -> Self {
        Login.into()
    }
}

impl Phase {
    /// Gate an action on phase and turn ownership.
    ///
    /// # Errors
    ///
    /// * `NotYourTurn` - a turn action from anyone but the current player,
    ///   whatever stage the turn is in
    /// * `WrongPhase` - this phase (or turn stage) doesn't allow `action`
    pub fn check(&self, action: ActionKind, is_current: bool) -> Result<(), UserError> {
        if self.requires_turn() && action.is_turn_action() && !is_current {
            return Err(UserError::NotYourTurn);
        }
        if !self.permits(action) {
            return Err(UserError::WrongPhase);
        }
        Ok(())
    }

    /// Position in the fixed phase order, used to assert forward movement.
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::Login(_) => 0,
            Self::AwaitCapacity(_) => 1,
            Self::AwaitColor(_) => 2,
            Self::RootPlacement(_) => 3,
            Self::ObjectiveSelection(_) => 4,
            Self::TurnFlow(_) => 5,
            Self::End(_) => 6,
        }
    }

    pub fn is_lobby(&self) -> bool {
        matches!(self, Self::Login(_) | Self::AwaitCapacity(_))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_before_place_is_wrong_phase() {
        let phase: Phase = TurnFlow::default().into();
        assert_eq!(phase.check(ActionKind::DrawCard, true), Err(UserError::WrongPhase));
        assert_eq!(phase.check(ActionKind::PlaceCard, true), Ok(()));
    }

    #[test]
    fn turn_flow_needs_current_player() {
        let phase: Phase = TurnFlow {
            stage: TurnStage::Draw,
            final_round: false,
        }
        .into();
        assert_eq!(phase.check(ActionKind::DrawCard, false), Err(UserError::NotYourTurn));
    }

    #[test]
    fn other_player_in_draw_stage_is_not_their_turn() {
        let phase: Phase = TurnFlow {
            stage: TurnStage::Draw,
            final_round: false,
        }
        .into();
        assert_eq!(phase.check(ActionKind::PlaceCard, false), Err(UserError::NotYourTurn));
        assert_eq!(phase.check(ActionKind::PlaceCard, true), Err(UserError::WrongPhase));
        assert_eq!(
            phase.check(ActionKind::ChooseObjective, false),
            Err(UserError::WrongPhase)
        );
    }

    #[test]
    fn wait_for_all_phases_ignore_turns() {
        let phase: Phase = RootPlacement::default().into();
        assert_eq!(phase.check(ActionKind::PlaceCard, false), Ok(()));
        assert_eq!(phase.check(ActionKind::AssignColor, false), Err(UserError::WrongPhase));
    }

    #[test]
    fn end_permits_nothing() {
        let phase: Phase = End.into();
        assert_eq!(phase.check(ActionKind::Login, true), Err(UserError::WrongPhase));
    }

    #[test]
    fn completion_rejects_repeats() {
        let mut completion = Completion::default();
        let name = Username::new("ann");
        completion.complete(&name).unwrap();
        assert_eq!(completion.complete(&name), Err(UserError::InvalidAction));
        assert_eq!(completion.len(), 1);
    }

    #[test]
    fn phase_order_is_monotonic() {
        let order: Vec<Phase> = vec![
            Login.into(),
            AwaitCapacity.into(),
            AwaitColor.into(),
            RootPlacement::default().into(),
            ObjectiveSelection::default().into(),
            TurnFlow::default().into(),
            End.into(),
        ];
        assert!(order.windows(2).all(|w| w[0].ordinal() < w[1].ordinal()));
    }
}
