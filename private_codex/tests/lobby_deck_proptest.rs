/// Property-based tests for lobby admission, deck order, the face-up
/// slots and point accounting using proptest
use private_codex::{
    UserError,
    constants::{MAX_PLAYERS, POINT_CAP},
    entities::{CardCategory, DrawSource, Kingdom, Player, Username},
    game::{
        deck::{Deck, TableState},
        lobby::Lobby,
    },
};
use proptest::prelude::*;
use std::collections::BTreeSet;

// Strategy to generate distinct lowercase names
fn names_strategy(min: usize, max: usize) -> impl Strategy<Value = Vec<Username>> {
    prop::collection::btree_set("[a-z]{1,8}", min..=max)
        .prop_map(|names| names.iter().map(|name| Username::new(name)).collect())
}

// Strategy to generate a deck order of distinct card ids
fn order_strategy(max: usize) -> impl Strategy<Value = Vec<(u16, Kingdom)>> {
    prop::collection::btree_set(1u16..=40, 0..=max).prop_flat_map(|ids| {
        let ids: Vec<u16> = ids.into_iter().collect();
        let len = ids.len();
        (Just(ids), prop::collection::vec(0usize..4, len))
    })
    .prop_map(|(ids, kingdoms)| {
        ids.into_iter()
            .zip(kingdoms)
            .map(|(id, k)| (id, Kingdom::from_index(k)))
            .collect()
    })
    .prop_shuffle()
}

proptest! {
    #[test]
    fn test_lobby_is_ready_exactly_at_capacity(
        capacity in 2usize..=MAX_PLAYERS,
        names in names_strategy(5, 6),
    ) {
        let mut lobby = Lobby::new();
        prop_assert_eq!(lobby.admit(names[0].clone()), Ok(true));
        prop_assert_eq!(lobby.fix_capacity(&names[0], capacity), Ok(()));

        for (admitted, name) in names.iter().enumerate().skip(1) {
            let result = lobby.admit(name.clone());
            if admitted < capacity {
                prop_assert_eq!(result, Ok(false));
                prop_assert_eq!(lobby.is_ready(), admitted + 1 == capacity);
            } else {
                prop_assert_eq!(result, Err(UserError::LobbyFull));
            }
        }

        prop_assert_eq!(lobby.len(), capacity);
        let unique: BTreeSet<_> = lobby.names().into_iter().collect();
        prop_assert_eq!(unique.len(), lobby.len());
    }

    #[test]
    fn test_repeated_name_is_rejected(names in names_strategy(1, 4), pick in 0usize..4) {
        let mut lobby = Lobby::new();
        for name in &names {
            lobby.admit(name.clone()).unwrap();
        }
        let repeat = names[pick % names.len()].clone();
        prop_assert_eq!(lobby.admit(repeat), Err(UserError::NameTaken));
        prop_assert_eq!(lobby.len(), names.len());
    }

    #[test]
    fn test_deck_draws_follow_order(order in order_strategy(20), draws in 0usize..25) {
        let mut deck = Deck::from_order(CardCategory::Resource, order.clone());
        let drawn: Vec<u16> = (0..draws).map_while(|_| deck.draw()).collect();
        let expected: Vec<u16> = order.iter().take(draws).map(|(id, _)| *id).collect();
        prop_assert_eq!(drawn, expected);
        prop_assert_eq!(deck.remaining(), order.len().saturating_sub(draws));
        prop_assert_eq!(deck.head_tag(), order.get(draws).map(|(_, k)| *k));
    }

    #[test]
    fn test_face_up_slot_refills_until_deck_is_empty(order in order_strategy(8)) {
        let resource = Deck::from_order(CardCategory::Resource, order.clone());
        let gold = Deck::from_order(CardCategory::Gold, Vec::new());
        let mut table = TableState::new(resource, gold);

        // Slot 1 keeps the second card while slot 0 cycles through the rest.
        let ids: Vec<u16> = order.iter().map(|(id, _)| *id).collect();
        let mut expected: Vec<u16> = ids.iter().take(1).copied().collect();
        expected.extend(ids.iter().skip(2));

        let mut drawn = Vec::new();
        while let Ok(card) = table.draw(CardCategory::Resource, DrawSource::FaceUp(0)) {
            drawn.push(card);
        }
        prop_assert_eq!(drawn, expected);
        prop_assert_eq!(table.view().resource.face_up[0], None);
        prop_assert_eq!(table.view().resource.face_up[1], ids.get(1).copied());
        prop_assert!(table.is_category_exhausted(CardCategory::Gold));
    }

    #[test]
    fn test_points_never_decrease_or_pass_cap(deltas in prop::collection::vec(0u32..10, 0..20)) {
        let mut player = Player::new(Username::new("ann"));
        let mut previous = 0;
        for delta in deltas {
            player.add_points(delta);
            prop_assert!(player.points() >= previous);
            prop_assert!(player.points() <= POINT_CAP);
            previous = player.points();
        }
    }
}
