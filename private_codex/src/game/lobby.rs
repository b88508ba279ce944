//! Player admission, capacity and color assignment.

use serde::{Deserialize, Serialize};

use super::{
    constants::{MAX_PLAYERS, MIN_PLAYERS},
    entities::{Color, Player, Username},
    errors::UserError,
};

/// Public line of the roster.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RosterEntry {
    pub name: Username,
    pub color: Option<Color>,
    pub points: u32,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Roster {
    pub capacity: Option<usize>,
    pub players: Vec<RosterEntry>,
}

impl Roster {
    pub fn names(&self) -> Vec<Username> {
        self.players.iter().map(|entry| entry.name.clone()).collect()
    }
}

/// Ordered set of admitted players. Admission order is turn order.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Lobby {
    players: Vec<Player>,
    capacity: Option<usize>,
}

impl Lobby {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a new player.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` if this is the first admitted player
    ///
    /// # Errors
    ///
    /// * `InvalidAction` - empty name
    /// * `NameTaken` - a player already uses this name
    /// * `LobbyFull` - capacity (or the absolute maximum) is reached
    pub fn admit(&mut self, name: Username) -> Result<bool, UserError> {
        if name.is_empty() {
            return Err(UserError::InvalidAction);
        }
        if self.contains(&name) {
            return Err(UserError::NameTaken);
        }
        if self.players.len() >= self.capacity.unwrap_or(MAX_PLAYERS) {
            return Err(UserError::LobbyFull);
        }
        self.players.push(Player::new(name));
        Ok(self.players.len() == 1)
    }

    /// Fix the target capacity. Only the first admitted player may do this,
    /// and only once.
    pub fn fix_capacity(&mut self, name: &Username, capacity: usize) -> Result<(), UserError> {
        if self.capacity.is_some() {
            return Err(UserError::AlreadyFixed);
        }
        match self.players.first() {
            None => return Err(UserError::UnknownName),
            Some(first) if &first.name != name => {
                return Err(if self.contains(name) {
                    UserError::NotYourTurn
                } else {
                    UserError::UnknownName
                });
            }
            Some(_) => {}
        }
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&capacity) || capacity < self.players.len() {
            return Err(UserError::InvalidCapacity);
        }
        self.capacity = Some(capacity);
        Ok(())
    }

    /// Give a player a color.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` once every admitted player has a color
    pub fn assign_color(&mut self, name: &Username, color: Color) -> Result<bool, UserError> {
        let idx = self.position(name).ok_or(UserError::UnknownName)?;
        if self.players[idx].color.is_some() {
            return Err(UserError::InvalidAction);
        }
        if self.players.iter().any(|p| p.color == Some(color)) {
            return Err(UserError::ColorTaken);
        }
        self.players[idx].color = Some(color);
        Ok(self.players.iter().all(|p| p.color.is_some()))
    }

    pub fn is_ready(&self) -> bool {
        self.capacity == Some(self.players.len())
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn contains(&self, name: &Username) -> bool {
        self.position(name).is_some()
    }

    pub fn position(&self, name: &Username) -> Option<usize> {
        self.players.iter().position(|p| &p.name == name)
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn players_mut(&mut self) -> &mut [Player] {
        &mut self.players
    }

    pub fn get(&self, name: &Username) -> Option<&Player> {
        self.players.iter().find(|p| &p.name == name)
    }

    pub fn get_mut(&mut self, name: &Username) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.name == name)
    }

    pub fn names(&self) -> Vec<Username> {
        self.players.iter().map(|p| p.name.clone()).collect()
    }

    pub fn roster(&self) -> Roster {
        Roster {
            capacity: self.capacity,
            players: self
                .players
                .iter()
                .map(|p| RosterEntry {
                    name: p.name.clone(),
                    color: p.color,
                    points: p.points(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Username {
        Username::new(s)
    }

    #[test]
    fn first_admission_is_flagged() {
        let mut lobby = Lobby::new();
        assert_eq!(lobby.admit(name("ann")), Ok(true));
        assert_eq!(lobby.admit(name("bob")), Ok(false));
        assert_eq!(lobby.admit(name("ann")), Err(UserError::NameTaken));
    }

    #[test]
    fn capacity_two_rejects_third() {
        let mut lobby = Lobby::new();
        lobby.admit(name("a")).unwrap();
        lobby.admit(name("b")).unwrap();
        assert!(!lobby.is_ready());
        lobby.fix_capacity(&name("a"), 2).unwrap();
        assert!(lobby.is_ready());
        assert_eq!(lobby.admit(name("c")), Err(UserError::LobbyFull));
    }

    #[test]
    fn only_first_player_fixes_capacity_once() {
        let mut lobby = Lobby::new();
        lobby.admit(name("a")).unwrap();
        lobby.admit(name("b")).unwrap();
        assert_eq!(lobby.fix_capacity(&name("b"), 3), Err(UserError::NotYourTurn));
        assert_eq!(lobby.fix_capacity(&name("z"), 3), Err(UserError::UnknownName));
        assert_eq!(lobby.fix_capacity(&name("a"), 5), Err(UserError::InvalidCapacity));
        assert_eq!(lobby.fix_capacity(&name("a"), 1), Err(UserError::InvalidCapacity));
        lobby.fix_capacity(&name("a"), 3).unwrap();
        assert_eq!(lobby.fix_capacity(&name("a"), 4), Err(UserError::AlreadyFixed));
        assert_eq!(lobby.capacity(), Some(3));
    }

    #[test]
    fn capacity_below_admitted_is_invalid() {
        let mut lobby = Lobby::new();
        for n in ["a", "b", "c"] {
            lobby.admit(name(n)).unwrap();
        }
        assert_eq!(lobby.fix_capacity(&name("a"), 2), Err(UserError::InvalidCapacity));
    }

    #[test]
    fn unfixed_lobby_caps_at_max_players() {
        let mut lobby = Lobby::new();
        for n in ["a", "b", "c", "d"] {
            lobby.admit(name(n)).unwrap();
        }
        assert_eq!(lobby.admit(name("e")), Err(UserError::LobbyFull));
    }

    #[test]
    fn colors_are_unique_and_report_completion() {
        let mut lobby = Lobby::new();
        lobby.admit(name("a")).unwrap();
        lobby.admit(name("b")).unwrap();
        assert_eq!(lobby.assign_color(&name("a"), Color::Red), Ok(false));
        assert_eq!(lobby.assign_color(&name("b"), Color::Red), Err(UserError::ColorTaken));
        assert_eq!(lobby.assign_color(&name("a"), Color::Blue), Err(UserError::InvalidAction));
        assert_eq!(lobby.assign_color(&name("x"), Color::Blue), Err(UserError::UnknownName));
        assert_eq!(lobby.assign_color(&name("b"), Color::Blue), Ok(true));
    }

    #[test]
    fn roster_follows_admission_order() {
        let mut lobby = Lobby::new();
        lobby.admit(name("zed")).unwrap();
        lobby.admit(name("amy")).unwrap();
        assert_eq!(lobby.roster().names(), vec![name("zed"), name("amy")]);
    }
}
