use serde::{Deserialize, Deserializer, Serialize};
use std::{
    fmt::{self},
    str::FromStr,
};

use super::{
    board::Board,
    constants::{self, HAND_SIZE, POINT_CAP},
    errors::UserError,
};

/// Opaque card identifier. Card content lives behind the rule evaluator.
pub type CardId = u16;

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Username(String);

impl Username {
    pub fn new(s: &str) -> Self {
        let username: String = s
            .trim()
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .take(constants::MAX_USERNAME_LENGTH)
            .collect();
        Self(username)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for Username {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}

impl From<String> for Username {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<&str> for Username {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The two drawable card categories. Each has its own deck and face-up pair.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardCategory {
    Resource,
    Gold,
}

impl CardCategory {
    pub const ALL: [CardCategory; 2] = [CardCategory::Resource, CardCategory::Gold];
}

impl fmt::Display for CardCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Resource => "resource",
            Self::Gold => "gold",
        };
        write!(f, "{repr}")
    }
}

/// Kingdom printed on a card. Card backs show it, which is how a deck head
/// is described without revealing the card.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Kingdom {
    Fungi,
    Plant,
    Animal,
    Insect,
}

impl Kingdom {
    pub const ALL: [Kingdom; 4] = [
        Kingdom::Fungi,
        Kingdom::Plant,
        Kingdom::Animal,
        Kingdom::Insect,
    ];

    pub fn from_index(idx: usize) -> Self {
        Self::ALL[idx % Self::ALL.len()]
    }
}

impl fmt::Display for Kingdom {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Fungi => "fungi",
            Self::Plant => "plant",
            Self::Animal => "animal",
            Self::Insect => "insect",
        };
        write!(f, "{repr}")
    }
}

/// Visible resource counters, one per kingdom.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Resources {
    pub fungi: u32,
    pub plant: u32,
    pub animal: u32,
    pub insect: u32,
}

impl Resources {
    pub fn single(kingdom: Kingdom, amount: u32) -> Self {
        let mut resources = Self::default();
        *resources.get_mut(kingdom) = amount;
        resources
    }

    pub fn get(&self, kingdom: Kingdom) -> u32 {
        match kingdom {
            Kingdom::Fungi => self.fungi,
            Kingdom::Plant => self.plant,
            Kingdom::Animal => self.animal,
            Kingdom::Insect => self.insect,
        }
    }

    fn get_mut(&mut self, kingdom: Kingdom) -> &mut u32 {
        match kingdom {
            Kingdom::Fungi => &mut self.fungi,
            Kingdom::Plant => &mut self.plant,
            Kingdom::Animal => &mut self.animal,
            Kingdom::Insect => &mut self.insect,
        }
    }

    pub fn add(&mut self, other: &Resources) {
        for kingdom in Kingdom::ALL {
            *self.get_mut(kingdom) += other.get(kingdom);
        }
    }

    /// Whether these counters meet every entry of `requirement`.
    pub fn covers(&self, requirement: &Resources) -> bool {
        Kingdom::ALL
            .into_iter()
            .all(|kingdom| self.get(kingdom) >= requirement.get(kingdom))
    }

    pub fn total(&self) -> u32 {
        Kingdom::ALL.into_iter().map(|k| self.get(k)).sum()
    }
}

impl fmt::Display for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "F{}/P{}/A{}/I{}",
            self.fungi, self.plant, self.animal, self.insect
        )
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Red,
    Blue,
    Green,
    Yellow,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Yellow => "yellow",
        };
        write!(f, "{repr}")
    }
}

impl FromStr for Color {
    type Err = UserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "red" => Ok(Self::Red),
            "blue" => Ok(Self::Blue),
            "green" => Ok(Self::Green),
            "yellow" => Ok(Self::Yellow),
            _ => Err(UserError::InvalidAction),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    Front,
    Back,
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Front => "front",
            Self::Back => "back",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
}

impl Coordinate {
    pub const ORIGIN: Coordinate = Coordinate { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn is_origin(&self) -> bool {
        *self == Self::ORIGIN
    }

    /// The coordinate touching this one on `corner`.
    pub fn toward(&self, corner: Corner) -> Self {
        let (dx, dy) = corner.offset();
        Self::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Card corners. Boards are laid out diagonally, so each corner maps to one
/// axis-adjacent coordinate.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    pub fn opposite(&self) -> Self {
        match self {
            Self::TopLeft => Self::BottomRight,
            Self::TopRight => Self::BottomLeft,
            Self::BottomLeft => Self::TopRight,
            Self::BottomRight => Self::TopLeft,
        }
    }

    const fn offset(&self) -> (i32, i32) {
        match self {
            Self::TopRight => (1, 0),
            Self::BottomLeft => (-1, 0),
            Self::TopLeft => (0, 1),
            Self::BottomRight => (0, -1),
        }
    }
}

/// Where a draw is taken from within one category.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawSource {
    FaceUp(usize),
    Deck,
}

impl fmt::Display for DrawSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::FaceUp(slot) => write!(f, "face-up slot {slot}"),
            Self::Deck => write!(f, "deck"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Hand([Option<CardId>; HAND_SIZE]);

impl Hand {
    pub fn get(&self, idx: usize) -> Option<CardId> {
        self.0.get(idx).copied().flatten()
    }

    pub fn take(&mut self, idx: usize) -> Option<CardId> {
        self.0.get_mut(idx).and_then(Option::take)
    }

    /// Put a card into the first empty slot, returning that slot.
    pub fn insert(&mut self, card: CardId) -> Result<usize, UserError> {
        let idx = self
            .0
            .iter()
            .position(Option::is_none)
            .ok_or(UserError::InvalidAction)?;
        self.0[idx] = Some(card);
        Ok(idx)
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    pub fn is_full(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }

    pub fn slots(&self) -> [Option<CardId>; HAND_SIZE] {
        self.0
    }
}

/// A player admitted to the lobby, and everything the match tracks for them.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Player {
    pub name: Username,
    pub color: Option<Color>,
    pub(crate) points: u32,
    pub(crate) resources: Resources,
    pub(crate) hand: Hand,
    /// Starter card dealt at match start, cleared once it is on the board.
    pub(crate) root_card: Option<CardId>,
    pub(crate) objective_choices: Option<[CardId; 2]>,
    pub(crate) secret_objective: Option<CardId>,
    pub(crate) board: Board,
}

impl Player {
    pub fn new(name: Username) -> Self {
        Self {
            name,
            color: None,
            points: 0,
            resources: Resources::default(),
            hand: Hand::default(),
            root_card: None,
            objective_choices: None,
            secret_objective: None,
            board: Board::default(),
        }
    }

    pub fn points(&self) -> u32 {
        self.points
    }

    /// Add placement points, saturating at the cap. Returns the new total.
    pub fn add_points(&mut self, delta: u32) -> u32 {
        self.points = self.points.saturating_add(delta).min(POINT_CAP);
        self.points
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn hand(&self) -> &Hand {
        &self.hand
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn root_card(&self) -> Option<CardId> {
        self.root_card
    }

    pub fn objective_choices(&self) -> Option<[CardId; 2]> {
        self.objective_choices
    }

    pub fn secret_objective(&self) -> Option<CardId> {
        self.secret_objective
    }
}
