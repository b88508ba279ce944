//! Card content: requirements, resource yields and scoring.
//!
//! The match only sees opaque card ids and asks a [`RuleEvaluator`] what a
//! placement is worth. [`StandardRules`] ships a small catalog built over the
//! id ranges in [`constants`](super::constants).

use super::{
    board::Board,
    constants::{CARDS_PER_KINGDOM, GOLD_CARDS, OBJECTIVE_CARDS, RESOURCE_CARDS, STARTER_CARDS},
    entities::{CardCategory, CardId, Facing, Kingdom, Resources},
    errors::UserError,
};

/// A placement attempt as seen by the rule evaluator.
#[derive(Clone, Copy, Debug)]
pub struct PlacementAttempt<'a> {
    pub card: CardId,
    pub facing: Facing,
    /// Resources the player holds before the card is placed.
    pub resources: &'a Resources,
    /// Number of already placed cards the new card will touch.
    pub links: usize,
}

/// What a successful placement adds to the player.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PlacementEffect {
    pub resources: Resources,
    pub points: u32,
}

/// Pure functions over card ids. Implementations must be deterministic.
pub trait RuleEvaluator: Send + Sync {
    /// Every card of a drawable category with the kingdom on its back.
    fn card_pool(&self, category: CardCategory) -> Vec<(CardId, Kingdom)>;

    fn starter_cards(&self) -> Vec<CardId>;

    fn objective_cards(&self) -> Vec<CardId>;

    /// Category a hand card belongs to, if it is a drawable card.
    fn category_of(&self, card: CardId) -> Option<CardCategory>;

    /// Resources a starter card provides at the origin.
    fn evaluate_root(&self, card: CardId, facing: Facing) -> Result<Resources, UserError>;

    /// Validate requirements and compute deltas. Called before anything is
    /// committed, so a rejection leaves the player untouched.
    fn evaluate_placement(&self, attempt: PlacementAttempt<'_>) -> Result<PlacementEffect, UserError>;

    /// End-of-match bonus for one objective against a finished board.
    fn objective_bonus(&self, objective: CardId, board: &Board, resources: &Resources) -> u32;
}

/// Default catalog.
///
/// * Resource cards yield one resource of their kingdom; the last three of
///   each kingdom also score a point when played face up.
/// * Gold cards require resources of their kingdom and score when played
///   face up; backs yield one resource and never score.
/// * Objectives score per triple of one kingdom, per full set of all four,
///   or per pair of two neighbouring kingdoms.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardRules;

impl StandardRules {
    fn kingdom_in(range_start: CardId, card: CardId) -> Kingdom {
        Kingdom::from_index(usize::from((card - range_start) / CARDS_PER_KINGDOM))
    }

    fn offset_in(range_start: CardId, card: CardId) -> u16 {
        (card - range_start) % CARDS_PER_KINGDOM
    }

    fn kingdom_of(card: CardId) -> Option<Kingdom> {
        if RESOURCE_CARDS.contains(&card) {
            Some(Self::kingdom_in(*RESOURCE_CARDS.start(), card))
        } else if GOLD_CARDS.contains(&card) {
            Some(Self::kingdom_in(*GOLD_CARDS.start(), card))
        } else {
            None
        }
    }
}

impl RuleEvaluator for StandardRules {
    fn card_pool(&self, category: CardCategory) -> Vec<(CardId, Kingdom)> {
        let range = match category {
            CardCategory::Resource => RESOURCE_CARDS,
            CardCategory::Gold => GOLD_CARDS,
        };
        range
            .filter_map(|card| Self::kingdom_of(card).map(|kingdom| (card, kingdom)))
            .collect()
    }

    fn starter_cards(&self) -> Vec<CardId> {
        STARTER_CARDS.collect()
    }

    fn objective_cards(&self) -> Vec<CardId> {
        OBJECTIVE_CARDS.collect()
    }

    fn category_of(&self, card: CardId) -> Option<CardCategory> {
        if RESOURCE_CARDS.contains(&card) {
            Some(CardCategory::Resource)
        } else if GOLD_CARDS.contains(&card) {
            Some(CardCategory::Gold)
        } else {
            None
        }
    }

    fn evaluate_root(&self, card: CardId, facing: Facing) -> Result<Resources, UserError> {
        if !STARTER_CARDS.contains(&card) {
            return Err(UserError::InvalidAction);
        }
        let idx = usize::from(card - STARTER_CARDS.start());
        let mut resources = Resources::single(Kingdom::from_index(idx), 1);
        if facing == Facing::Front {
            resources.add(&Resources::single(Kingdom::from_index(idx + 1), 1));
        }
        Ok(resources)
    }

    fn evaluate_placement(&self, attempt: PlacementAttempt<'_>) -> Result<PlacementEffect, UserError> {
        let category = self.category_of(attempt.card).ok_or(UserError::InvalidAction)?;
        let kingdom = Self::kingdom_of(attempt.card).ok_or(UserError::InvalidAction)?;
        let yield_one = Resources::single(kingdom, 1);

        if attempt.facing == Facing::Back {
            return Ok(PlacementEffect {
                resources: yield_one,
                points: 0,
            });
        }

        match category {
            CardCategory::Resource => {
                let offset = Self::offset_in(*RESOURCE_CARDS.start(), attempt.card);
                Ok(PlacementEffect {
                    resources: yield_one,
                    points: u32::from(offset >= 7),
                })
            }
            CardCategory::Gold => {
                let offset = Self::offset_in(*GOLD_CARDS.start(), attempt.card);
                let (required, points) = match offset {
                    0..=3 => (2, attempt.links as u32),
                    4..=7 => (3, 3),
                    _ => (4, 5),
                };
                if !attempt
                    .resources
                    .covers(&Resources::single(kingdom, required))
                {
                    return Err(UserError::NotEnoughResources);
                }
                Ok(PlacementEffect {
                    resources: Resources::default(),
                    points,
                })
            }
        }
    }

    fn objective_bonus(&self, objective: CardId, _board: &Board, resources: &Resources) -> u32 {
        if !OBJECTIVE_CARDS.contains(&objective) {
            return 0;
        }
        let idx = usize::from(objective - OBJECTIVE_CARDS.start());
        match idx {
            // Triples of one kingdom.
            0..=7 => 2 * (resources.get(Kingdom::from_index(idx)) / 3),
            // Full sets.
            8..=11 => {
                let sets = Kingdom::ALL
                    .into_iter()
                    .map(|k| resources.get(k))
                    .min()
                    .unwrap_or(0);
                3 * sets
            }
            // Pairs of neighbouring kingdoms.
            _ => {
                let a = resources.get(Kingdom::from_index(idx));
                let b = resources.get(Kingdom::from_index(idx + 1));
                2 * a.min(b)
            }
        }
    }
}
