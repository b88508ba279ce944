//! The authoritative match aggregate.
//!
//! [`GameMaster`] owns the lobby, the shared table, every board and the
//! phase machine. Each operation either commits fully and queues the
//! resulting [`MatchEvent`]s, or fails with a [`UserError`] and leaves the
//! state untouched.

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeSet, VecDeque},
    sync::Arc,
};

use super::{
    board::PlacedCard,
    constants::FINAL_ROUND_POINTS,
    deck::{Deck, TableState},
    entities::{CardCategory, CardId, Color, Coordinate, DrawSource, Facing, Player, Username},
    errors::UserError,
    events::{EndReason, HandView, MatchEvent, Placement, Standing},
    lobby::Lobby,
    phases::{
        ActionKind, AwaitCapacity, AwaitColor, End, ObjectiveSelection, Phase, PhaseRules,
        RootPlacement, TurnFlow, TurnStage,
    },
    rules::{PlacementAttempt, RuleEvaluator},
};

/// Everything needed to resume a match. This is what snapshots persist.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct MatchState {
    pub(crate) lobby: Lobby,
    pub(crate) phase: Phase,
    pub(crate) table: Option<TableState>,
    pub(crate) common_objectives: Option<[CardId; 2]>,
    pub(crate) turn: u32,
    pub(crate) current: usize,
    pub(crate) end_reason: Option<EndReason>,
}

impl MatchState {
    pub fn lobby(&self) -> &Lobby {
        &self.lobby
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn table(&self) -> Option<&TableState> {
        self.table.as_ref()
    }

    pub fn common_objectives(&self) -> Option<[CardId; 2]> {
        self.common_objectives
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn current_player(&self) -> Option<&Username> {
        match self.phase {
            Phase::TurnFlow(_) => self.lobby.players().get(self.current).map(|p| &p.name),
            _ => None,
        }
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    /// Sorted admitted names, used to match a fresh lobby against a snapshot.
    pub fn roster_key(&self) -> BTreeSet<Username> {
        self.lobby.names().into_iter().collect()
    }

    fn is_current(&self, name: &Username) -> bool {
        self.current_player() == Some(name)
    }
}

pub struct GameMaster {
    state: MatchState,
    rules: Arc<dyn RuleEvaluator>,
    rng: StdRng,
    events: VecDeque<MatchEvent>,
    resume_candidate: Option<MatchState>,
}

impl GameMaster {
    /// Create an empty match.
    ///
    /// # Arguments
    ///
    /// * `rules` - Card content evaluator
    /// * `seed` - Fixed shuffle seed, or `None` for OS entropy
    pub fn new(rules: Arc<dyn RuleEvaluator>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            state: MatchState::default(),
            rules,
            rng,
            events: VecDeque::new(),
            resume_candidate: None,
        }
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn lobby(&self) -> &Lobby {
        &self.state.lobby
    }

    pub fn phase(&self) -> &Phase {
        &self.state.phase
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state.phase, Phase::End(_))
    }

    pub fn drain_events(&mut self) -> VecDeque<MatchEvent> {
        std::mem::take(&mut self.events)
    }

    /// Offer a saved match. It is resumed instead of dealing a new one if
    /// the next ready lobby has exactly the same names and capacity.
    pub fn set_resume_candidate(&mut self, candidate: Option<MatchState>) {
        self.resume_candidate = candidate;
    }

    /// Copy of the state if a match is in flight.
    pub fn try_snapshot(&self) -> Option<MatchState> {
        match self.state.phase {
            Phase::TurnFlow(_) => Some(self.state.clone()),
            _ => None,
        }
    }

    /// Replace the current state with a saved one and announce it.
    pub fn restore(&mut self, snapshot: MatchState) {
        log::info!(
            "Resuming match at turn {} ({})",
            snapshot.turn,
            snapshot.phase
        );
        self.state = snapshot;
        self.events.clear();
        self.announce_resume();
    }

    /// Drop everything and go back to an empty lobby.
    pub fn reset(&mut self) {
        log::info!("Match reset");
        self.state = MatchState::default();
        self.events.clear();
    }

    fn enter(&mut self, phase: Phase) {
        debug_assert!(phase.ordinal() >= self.state.phase.ordinal());
        log::info!("Phase {} -> {}", self.state.phase, phase);
        self.state.phase = phase;
    }

    fn push_roster(&mut self) {
        self.events
            .push_back(MatchEvent::RosterChanged(self.state.lobby.roster()));
    }

    fn push_hand(&mut self, player: &Player) {
        self.events.push_back(MatchEvent::Hand {
            player: player.name.clone(),
            hand: HandView {
                cards: player.hand.slots(),
                root: player.root_card,
            },
        });
    }

    fn push_all_hands(&mut self) {
        let players = self.state.lobby.players().to_vec();
        for player in &players {
            self.push_hand(player);
        }
    }

    /// Admit a player.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` if this is the first admitted player
    pub fn login(&mut self, name: Username) -> Result<bool, UserError> {
        if !self.state.phase.is_lobby() {
            return Err(UserError::LobbyFull);
        }
        self.state.phase.check(ActionKind::Login, false)?;
        let first = self.state.lobby.admit(name.clone())?;
        log::info!("Admitted {} ({} in lobby)", name, self.state.lobby.len());
        if first {
            self.enter(AwaitCapacity.into());
        }
        self.push_roster();
        if self.state.lobby.is_ready() {
            self.start_match();
        }
        Ok(first)
    }

    pub fn fix_capacity(&mut self, name: &Username, capacity: usize) -> Result<(), UserError> {
        if self.state.phase.ordinal() > Phase::from(AwaitCapacity).ordinal() {
            return Err(UserError::AlreadyFixed);
        }
        self.state.phase.check(ActionKind::FixCapacity, false)?;
        self.state.lobby.fix_capacity(name, capacity)?;
        log::info!("Capacity fixed to {} by {}", capacity, name);
        self.push_roster();
        if self.state.lobby.is_ready() {
            self.start_match();
        }
        Ok(())
    }

    /// Give `name` a color.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` once every player has a color
    pub fn assign_color(&mut self, name: &Username, color: Color) -> Result<bool, UserError> {
        self.state.phase.check(ActionKind::AssignColor, false)?;
        let complete = self.state.lobby.assign_color(name, color)?;
        self.push_roster();
        if complete {
            self.enter(RootPlacement::default().into());
        }
        Ok(complete)
    }

    /// Place a card. During root placement the player's starter goes to the
    /// origin and `hand_index` is ignored.
    pub fn place_card(
        &mut self,
        name: &Username,
        hand_index: usize,
        coordinate: Coordinate,
        facing: Facing,
    ) -> Result<CardId, UserError> {
        let is_current = self.state.is_current(name);
        self.state.phase.check(ActionKind::PlaceCard, is_current)?;
        if !self.state.lobby.contains(name) {
            return Err(UserError::UnknownName);
        }
        match self.state.phase {
            Phase::RootPlacement(_) => self.place_root(name, coordinate, facing),
            _ => self.place_from_hand(name, hand_index, coordinate, facing),
        }
    }

    fn place_root(
        &mut self,
        name: &Username,
        coordinate: Coordinate,
        facing: Facing,
    ) -> Result<CardId, UserError> {
        let Phase::RootPlacement(ref phase) = self.state.phase else {
            return Err(UserError::WrongPhase);
        };
        if phase.completed.contains(name) {
            return Err(UserError::InvalidAction);
        }
        if !coordinate.is_origin() {
            return Err(UserError::CardPositionInvalid);
        }
        let player = self
            .state
            .lobby
            .get_mut(name)
            .ok_or(UserError::UnknownName)?;
        let card = player.root_card.ok_or(UserError::InvalidAction)?;
        let resources = self.rules.evaluate_root(card, facing)?;

        player.board.place_root(card, facing)?;
        player.root_card = None;
        player.resources.add(&resources);
        let placement = Placement {
            player: name.clone(),
            card,
            coordinate,
            facing,
            links: Vec::new(),
            points: player.points(),
            resources: player.resources,
        };

        let done = match self.state.phase {
            Phase::RootPlacement(ref mut phase) => {
                phase.completed.complete(name)?;
                phase.completed.len()
            }
            _ => return Err(UserError::WrongPhase),
        };
        self.events.push_back(MatchEvent::CardPlaced(placement));
        if done == self.state.lobby.len() {
            self.begin_objective_selection();
        }
        Ok(card)
    }

    fn place_from_hand(
        &mut self,
        name: &Username,
        hand_index: usize,
        coordinate: Coordinate,
        facing: Facing,
    ) -> Result<CardId, UserError> {
        let player = self
            .state
            .lobby
            .get_mut(name)
            .ok_or(UserError::UnknownName)?;
        let card = player.hand.get(hand_index).ok_or(UserError::InvalidAction)?;
        player.board.check_position(&coordinate)?;
        let effect = self.rules.evaluate_placement(PlacementAttempt {
            card,
            facing,
            resources: &player.resources,
            links: player.board.links(&coordinate).len(),
        })?;

        let links = player.board.insert(
            coordinate,
            PlacedCard {
                card,
                facing,
                turn: self.state.turn,
            },
        )?;
        player.hand.take(hand_index);
        player.resources.add(&effect.resources);
        let points = player.add_points(effect.points);
        let hand_empty = player.hand.is_empty();
        log::debug!(
            "{} placed {} at {} for {} points (total {})",
            name,
            card,
            coordinate,
            effect.points,
            points
        );

        let placement = Placement {
            player: name.clone(),
            card,
            coordinate,
            facing,
            links,
            points,
            resources: player.resources,
        };
        let snapshot = player.clone();
        self.events.push_back(MatchEvent::CardPlaced(placement));
        self.push_hand(&snapshot);

        if let Phase::TurnFlow(ref mut flow) = self.state.phase {
            if points >= FINAL_ROUND_POINTS && !flow.final_round {
                log::info!("{} reached {} points, final round", name, points);
                flow.final_round = true;
            }
            flow.stage = TurnStage::Draw;
        }

        let drawable = self
            .state
            .table
            .as_ref()
            .is_some_and(TableState::has_drawable);
        if hand_empty && !drawable {
            self.end_match(EndReason::HandExhausted);
        } else if !drawable {
            self.end_match(EndReason::TableExhausted);
        }
        Ok(card)
    }

    /// Draw into the acting player's hand.
    pub fn draw_card(
        &mut self,
        name: &Username,
        category: CardCategory,
        source: DrawSource,
    ) -> Result<CardId, UserError> {
        let is_current = self.state.is_current(name);
        self.state.phase.check(ActionKind::DrawCard, is_current)?;
        let player_idx = self
            .state
            .lobby
            .position(name)
            .ok_or(UserError::UnknownName)?;
        if self.state.lobby.players()[player_idx].hand.is_full() {
            return Err(UserError::InvalidAction);
        }
        let table = self.state.table.as_mut().ok_or(UserError::WrongPhase)?;
        let card = table.draw(category, source)?;
        let table_view = table.view();
        let exhausted = table.is_exhausted();

        let player = &mut self.state.lobby.players_mut()[player_idx];
        player.hand.insert(card)?;
        let snapshot = player.clone();
        log::debug!("{} drew from {} {}", name, category, source);

        self.events.push_back(MatchEvent::CardDrawn {
            player: name.clone(),
            category,
            source,
            table: table_view,
        });
        self.push_hand(&snapshot);

        if exhausted {
            self.end_match(EndReason::TableExhausted);
        } else {
            self.advance_turn();
        }
        Ok(card)
    }

    /// Keep one of the two offered secret objectives.
    pub fn choose_objective(&mut self, name: &Username, index: usize) -> Result<CardId, UserError> {
        self.state.phase.check(ActionKind::ChooseObjective, false)?;
        let Phase::ObjectiveSelection(ref phase) = self.state.phase else {
            return Err(UserError::WrongPhase);
        };
        if phase.completed.contains(name) {
            return Err(UserError::InvalidAction);
        }
        let player = self
            .state
            .lobby
            .get_mut(name)
            .ok_or(UserError::UnknownName)?;
        let objective = player
            .objective_choices
            .and_then(|choices| choices.get(index).copied())
            .ok_or(UserError::InvalidAction)?;
        player.secret_objective = Some(objective);

        let done = match self.state.phase {
            Phase::ObjectiveSelection(ref mut phase) => {
                phase.completed.complete(name)?;
                phase.completed.len()
            }
            _ => return Err(UserError::WrongPhase),
        };
        log::debug!("{} chose a secret objective", name);
        if done == self.state.lobby.len() {
            self.begin_turns();
        }
        Ok(objective)
    }

    fn start_match(&mut self) {
        if let Some(candidate) = self.resume_candidate.take() {
            if candidate.roster_key() == self.state.roster_key()
                && candidate.lobby.capacity() == self.state.lobby.capacity()
            {
                self.restore(candidate);
                return;
            }
            self.resume_candidate = Some(candidate);
        }
        self.deal_new_match();
    }

    fn deal_new_match(&mut self) {
        let rng = &mut self.rng;
        let table = TableState::new(
            Deck::shuffled(
                CardCategory::Resource,
                self.rules.card_pool(CardCategory::Resource),
                rng,
            ),
            Deck::shuffled(CardCategory::Gold, self.rules.card_pool(CardCategory::Gold), rng),
        );
        let mut starters = self.rules.starter_cards();
        starters.shuffle(rng);
        let mut objectives = self.rules.objective_cards();
        objectives.shuffle(rng);
        let mut objectives = objectives.into_iter();

        self.state.common_objectives = objectives.next().zip(objectives.next()).map(<[_; 2]>::from);
        for (player, starter) in self
            .state
            .lobby
            .players_mut()
            .iter_mut()
            .zip(starters.into_iter().map(Some).chain(std::iter::repeat(None)))
        {
            player.root_card = starter;
            player.objective_choices = objectives.next().zip(objectives.next()).map(<[_; 2]>::from);
        }

        self.state.table = Some(table);

        log::info!("Match starting with {} players", self.state.lobby.len());
        self.enter(AwaitColor.into());
        if let Some(table) = self.state.table.as_ref() {
            self.events.push_back(MatchEvent::MatchStarting {
                roster: self.state.lobby.roster(),
                table: table.view(),
                resumed: false,
            });
        }
        self.push_all_hands();
    }

    fn announce_resume(&mut self) {
        if let Some(table) = self.state.table.as_ref() {
            self.events.push_back(MatchEvent::MatchStarting {
                roster: self.state.lobby.roster(),
                table: table.view(),
                resumed: true,
            });
        }
        self.push_all_hands();
        if let Some(common) = self.state.common_objectives {
            self.events
                .push_back(MatchEvent::ObjectivesRevealed { common });
        }
        if let (Some(player), Phase::TurnFlow(flow)) =
            (self.state.current_player(), &self.state.phase)
        {
            self.events.push_back(MatchEvent::TurnChanged {
                player: player.clone(),
                turn: self.state.turn,
                final_round: flow.final_round,
            });
        }
    }

    fn begin_objective_selection(&mut self) {
        if let Some(table) = self.state.table.as_mut() {
            for player in self.state.lobby.players_mut() {
                let dealt = [
                    table.deal(CardCategory::Resource),
                    table.deal(CardCategory::Resource),
                    table.deal(CardCategory::Gold),
                ];
                for card in dealt.into_iter().flatten() {
                    let _ = player.hand.insert(card);
                }
            }
        }
        self.enter(ObjectiveSelection::default().into());
        self.push_all_hands();
        if let Some(common) = self.state.common_objectives {
            self.events
                .push_back(MatchEvent::ObjectivesRevealed { common });
        }
        let offers: Vec<_> = self
            .state
            .lobby
            .players()
            .iter()
            .filter_map(|p| p.objective_choices.map(|c| (p.name.clone(), c)))
            .collect();
        for (player, choices) in offers {
            self.events
                .push_back(MatchEvent::SecretObjectiveChoices { player, choices });
        }
    }

    fn begin_turns(&mut self) {
        self.state.current = 0;
        self.state.turn = 1;
        self.enter(TurnFlow::default().into());
        self.push_turn_changed();
    }

    fn push_turn_changed(&mut self) {
        let final_round = matches!(self.state.phase, Phase::TurnFlow(ref flow) if flow.final_round);
        if let Some(player) = self.state.current_player().cloned() {
            log::debug!("Turn {} goes to {}", self.state.turn, player);
            self.events.push_back(MatchEvent::TurnChanged {
                player,
                turn: self.state.turn,
                final_round,
            });
        }
    }

    fn advance_turn(&mut self) {
        let players = self.state.lobby.len().max(1);
        self.state.current = (self.state.current + 1) % players;
        self.state.turn += 1;
        let Phase::TurnFlow(ref mut flow) = self.state.phase else {
            return;
        };
        if flow.final_round && self.state.current == 0 {
            self.end_match(EndReason::FinalRound);
            return;
        }
        flow.stage = TurnStage::Place;
        self.push_turn_changed();
    }

    fn end_match(&mut self, reason: EndReason) {
        let common = self.state.common_objectives;
        let mut standings: Vec<Standing> = self
            .state
            .lobby
            .players()
            .iter()
            .map(|player| {
                let objective_bonus: u32 = common
                    .into_iter()
                    .flatten()
                    .chain(player.secret_objective)
                    .map(|objective| {
                        self.rules
                            .objective_bonus(objective, &player.board, &player.resources)
                    })
                    .sum();
                Standing {
                    player: player.name.clone(),
                    points: player.points(),
                    objective_bonus,
                    total: player.points() + objective_bonus,
                    winner: false,
                }
            })
            .collect();
        let best = standings.iter().map(|s| s.total).max().unwrap_or(0);
        for standing in standings.iter_mut() {
            standing.winner = standing.total == best;
        }

        log::info!("Match ended ({:?}) after turn {}", reason, self.state.turn);
        self.state.end_reason = Some(reason);
        self.enter(End.into());
        self.events
            .push_back(MatchEvent::EndGame { reason, standings });
    }
}
