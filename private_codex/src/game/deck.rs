//! Draw piles and the shared table.

use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::{
    constants::FACE_UP_SLOTS,
    entities::{CardCategory, CardId, DrawSource, Kingdom},
    errors::UserError,
};

/// Consumable pile of one category. Cards keep the kingdom printed on their
/// back so the head can be described without revealing it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Deck {
    category: CardCategory,
    cards: VecDeque<(CardId, Kingdom)>,
}

impl Deck {
    /// Deck in exactly the given order, head first.
    pub fn from_order(category: CardCategory, cards: Vec<(CardId, Kingdom)>) -> Self {
        Self {
            category,
            cards: cards.into(),
        }
    }

    pub fn shuffled<R: Rng + ?Sized>(
        category: CardCategory,
        mut cards: Vec<(CardId, Kingdom)>,
        rng: &mut R,
    ) -> Self {
        cards.shuffle(rng);
        Self::from_order(category, cards)
    }

    pub fn category(&self) -> CardCategory {
        self.category
    }

    /// Remove and return the head.
    pub fn draw(&mut self) -> Option<CardId> {
        self.cards.pop_front().map(|(card, _)| card)
    }

    /// Kingdom on the back of the head card.
    pub fn head_tag(&self) -> Option<Kingdom> {
        self.cards.front().map(|(_, kingdom)| *kingdom)
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Face-up pair plus the deck backing it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Pile {
    face_up: [Option<CardId>; FACE_UP_SLOTS],
    deck: Deck,
}

impl Pile {
    fn new(mut deck: Deck) -> Self {
        let mut face_up = [None; FACE_UP_SLOTS];
        for slot in face_up.iter_mut() {
            *slot = deck.draw();
        }
        Self { face_up, deck }
    }

    fn draw(&mut self, source: DrawSource) -> Result<CardId, UserError> {
        match source {
            DrawSource::Deck => self.deck.draw().ok_or(UserError::InvalidPosition),
            DrawSource::FaceUp(idx) => {
                let slot = self
                    .face_up
                    .get_mut(idx)
                    .ok_or(UserError::InvalidPosition)?;
                let card = slot.take().ok_or(UserError::InvalidPosition)?;
                *slot = self.deck.draw();
                Ok(card)
            }
        }
    }

    fn is_exhausted(&self) -> bool {
        self.deck.is_empty() && self.face_up.iter().all(Option::is_none)
    }

    fn view(&self) -> PileView {
        PileView {
            category: self.deck.category(),
            face_up: self.face_up,
            deck_head: self.deck.head_tag(),
            deck_remaining: self.deck.remaining(),
        }
    }
}

/// Public view of one category on the table.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PileView {
    pub category: CardCategory,
    pub face_up: [Option<CardId>; FACE_UP_SLOTS],
    pub deck_head: Option<Kingdom>,
    pub deck_remaining: usize,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TableView {
    pub resource: PileView,
    pub gold: PileView,
}

/// The shared table: one pile per drawable category.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TableState {
    resource: Pile,
    gold: Pile,
}

impl TableState {
    /// Reveal the face-up pairs from the top of each deck.
    pub fn new(resource: Deck, gold: Deck) -> Self {
        Self {
            resource: Pile::new(resource),
            gold: Pile::new(gold),
        }
    }

    fn pile(&self, category: CardCategory) -> &Pile {
        match category {
            CardCategory::Resource => &self.resource,
            CardCategory::Gold => &self.gold,
        }
    }

    fn pile_mut(&mut self, category: CardCategory) -> &mut Pile {
        match category {
            CardCategory::Resource => &mut self.resource,
            CardCategory::Gold => &mut self.gold,
        }
    }

    /// Take a card from a face-up slot or a deck head. A vacated slot is
    /// refilled from the same category's deck while it lasts.
    ///
    /// # Errors
    ///
    /// * `InvalidPosition` - slot out of range, empty slot, or empty deck
    pub fn draw(&mut self, category: CardCategory, source: DrawSource) -> Result<CardId, UserError> {
        self.pile_mut(category).draw(source)
    }

    /// Deal straight from a deck, bypassing the face-up slots.
    pub fn deal(&mut self, category: CardCategory) -> Option<CardId> {
        self.pile_mut(category).deck.draw()
    }

    pub fn is_category_exhausted(&self, category: CardCategory) -> bool {
        self.pile(category).is_exhausted()
    }

    /// Both decks and all face-up slots are empty.
    pub fn is_exhausted(&self) -> bool {
        CardCategory::ALL
            .into_iter()
            .all(|category| self.is_category_exhausted(category))
    }

    pub fn has_drawable(&self) -> bool {
        !self.is_exhausted()
    }

    pub fn view(&self) -> TableView {
        TableView {
            resource: self.resource.view(),
            gold: self.gold.view(),
        }
    }
}
