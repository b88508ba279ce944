//! Per-player placement graph.
//!
//! The board is an arena keyed by coordinate. Corner links are never stored;
//! they are derived from which axis neighbours are occupied, which keeps them
//! mutual without back references.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{
    entities::{CardId, Coordinate, Corner, Facing},
    errors::UserError,
};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlacedCard {
    pub card: CardId,
    pub facing: Facing,
    /// Match turn the card was placed on. Root cards are turn 0.
    pub turn: u32,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(
    from = "Vec<(Coordinate, PlacedCard)>",
    into = "Vec<(Coordinate, PlacedCard)>"
)]
pub struct Board {
    cards: BTreeMap<Coordinate, PlacedCard>,
}

impl From<Vec<(Coordinate, PlacedCard)>> for Board {
    fn from(value: Vec<(Coordinate, PlacedCard)>) -> Self {
        Self {
            cards: value.into_iter().collect(),
        }
    }
}

impl From<Board> for Vec<(Coordinate, PlacedCard)> {
    fn from(value: Board) -> Self {
        value.cards.into_iter().collect()
    }
}

impl Board {
    pub fn get(&self, coordinate: &Coordinate) -> Option<&PlacedCard> {
        self.cards.get(coordinate)
    }

    pub fn is_occupied(&self, coordinate: &Coordinate) -> bool {
        self.cards.contains_key(coordinate)
    }

    pub fn has_root(&self) -> bool {
        self.is_occupied(&Coordinate::ORIGIN)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Coordinate, &PlacedCard)> {
        self.cards.iter()
    }

    pub fn place_root(&mut self, card: CardId, facing: Facing) -> Result<(), UserError> {
        if self.has_root() {
            return Err(UserError::InvalidAction);
        }
        self.cards.insert(
            Coordinate::ORIGIN,
            PlacedCard {
                card,
                facing,
                turn: 0,
            },
        );
        Ok(())
    }

    /// Occupied neighbours of `coordinate`, keyed by the corner of the card
    /// at `coordinate` that touches them.
    pub fn links(&self, coordinate: &Coordinate) -> Vec<(Corner, Coordinate)> {
        Corner::ALL
            .into_iter()
            .map(|corner| (corner, coordinate.toward(corner)))
            .filter(|(_, neighbor)| self.is_occupied(neighbor))
            .collect()
    }

    /// Check that a non-root card may go at `coordinate` without mutating.
    ///
    /// # Errors
    ///
    /// * `CardPositionInvalid` - origin, occupied, or no occupied neighbour
    pub fn check_position(&self, coordinate: &Coordinate) -> Result<(), UserError> {
        if coordinate.is_origin()
            || self.is_occupied(coordinate)
            || self.links(coordinate).is_empty()
        {
            return Err(UserError::CardPositionInvalid);
        }
        Ok(())
    }

    /// Commit a validated placement and return the links it formed.
    pub fn insert(
        &mut self,
        coordinate: Coordinate,
        placed: PlacedCard,
    ) -> Result<Vec<(Corner, Coordinate)>, UserError> {
        self.check_position(&coordinate)?;
        self.cards.insert(coordinate, placed);
        Ok(self.links(&coordinate))
    }
}
