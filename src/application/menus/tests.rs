use std::collections::HashSet;
use std::time::Duration;

use super::*;
use crate::domain::{MenuError, Participant};
use crate::infra::channel::Symbol;
use crate::infra::memory_channel::{AutoResponder, MemoryChannel};

const TIMEOUT: Duration = Duration::from_secs(30);

fn player(id: u64) -> Participant {
    Participant::new(id, format!("player-{id}"))
}

fn maps(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("Map {i}")).collect()
}

#[test]
fn test_board_rejects_double_resolution() {
    let mut board = OptionsBoard::new("Menu", "a map", &maps(3)).unwrap();
    let symbol = board.remaining()[0];
    board
        .resolve(symbol, Symbol::VETOED, "veto", Attribution::Timeout)
        .unwrap();
    assert!(matches!(
        board.resolve(symbol, Symbol::VETOED, "veto", Attribution::Timeout),
        Err(MenuError::OptionAlreadyResolved(_))
    ));
    assert_eq!(board.remaining_len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_veto_timeouts_leave_one_survivor() {
    let channel = MemoryChannel::new("menus");
    let mut menu = TurnBasedVetoMenu::new(
        channel.as_ref(),
        [player(1), player(2)],
        "Map veto",
        "a map",
        "captains",
        &maps(9),
        1,
        TIMEOUT,
    )
    .unwrap();
    let picks = menu.run().await.unwrap();

    assert_eq!(picks.len(), 1);
    let board = menu.board();
    let mut vetoed = 0;
    for map in maps(9) {
        if map == picks[0] {
            continue;
        }
        assert_eq!(board.attribution_of(&map), Some(&Attribution::Timeout));
        vetoed += 1;
    }
    assert_eq!(vetoed, 8);
}

#[tokio::test(start_paused = true)]
async fn test_veto_explicit_picks_alternate() {
    let channel = MemoryChannel::new("menus");
    AutoResponder::new(channel.clone()).spawn();
    let mut menu = TurnBasedVetoMenu::new(
        channel.as_ref(),
        [player(1), player(2)],
        "Map veto",
        "a map",
        "captains",
        &maps(9),
        1,
        TIMEOUT,
    )
    .unwrap();
    let picks = menu.run().await.unwrap();

    // The responder always vetoes the first open option, so the last map
    // survives and the veto attributions alternate between the captains.
    assert_eq!(picks, vec!["Map 8".to_string()]);
    let board = menu.board();
    assert_eq!(
        board.attribution_of("Map 0"),
        Some(&Attribution::Selector(player(1)))
    );
    assert_eq!(
        board.attribution_of("Map 1"),
        Some(&Attribution::Selector(player(2)))
    );
    assert_eq!(
        board.attribution_of("Map 2"),
        Some(&Attribution::Selector(player(1)))
    );
}

#[test]
fn test_veto_preconditions() {
    let channel = MemoryChannel::new("menus");
    assert!(matches!(
        TurnBasedVetoMenu::new(
            channel.as_ref(),
            [player(1), player(2)],
            "Map veto",
            "a map",
            "captains",
            &maps(1),
            1,
            TIMEOUT,
        ),
        Err(MenuError::NotEnoughOptions { .. })
    ));
    assert!(matches!(
        TurnBasedVetoMenu::new(
            channel.as_ref(),
            [player(1), player(2)],
            "Map veto",
            "a map",
            "captains",
            &maps(9),
            9,
            TIMEOUT,
        ),
        Err(MenuError::TooManyPicks { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_selection_double_turn_order() {
    let channel = MemoryChannel::new("menus");
    AutoResponder::new(channel.clone()).spawn();
    let mut menu = TurnBasedSelectionMenu::new(
        channel.as_ref(),
        [player(1), player(2)],
        "Captains pick teams",
        "a player",
        "captains",
        &maps(10),
        TIMEOUT,
    )
    .unwrap();
    let selections = menu.run().await.unwrap();

    // First selector opens with one pick, then two picks per turn.
    assert_eq!(selections[0][0], "Map 0");
    assert_eq!(selections[1][0], "Map 1");
    assert_eq!(selections[1][1], "Map 2");
    assert_eq!(selections[0].len(), 5);
    assert_eq!(selections[1].len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_selection_covers_options_disjointly_on_timeouts() {
    let channel = MemoryChannel::new("menus");
    let mut menu = TurnBasedSelectionMenu::new(
        channel.as_ref(),
        [player(1), player(2)],
        "Captains pick teams",
        "a player",
        "captains",
        &maps(10),
        TIMEOUT,
    )
    .unwrap();
    let selections = menu.run().await.unwrap();

    assert_eq!(selections[0].len(), 5);
    assert_eq!(selections[1].len(), 5);
    let all: HashSet<&String> = selections[0].iter().chain(selections[1].iter()).collect();
    assert_eq!(all.len(), 10);
    for map in maps(10) {
        assert!(all.contains(&map));
    }
}

#[test]
fn test_selection_rejects_odd_option_count() {
    let channel = MemoryChannel::new("menus");
    assert!(matches!(
        TurnBasedSelectionMenu::new(
            channel.as_ref(),
            [player(1), player(2)],
            "Captains pick teams",
            "a player",
            "captains",
            &maps(7),
            TIMEOUT,
        ),
        Err(MenuError::OddOptionCount(7))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_poll_majority_wins() {
    let channel = MemoryChannel::new("menus");
    let voters = vec![player(1), player(2), player(3)];
    {
        let channel = channel.clone();
        let mut rx = channel.subscribe_prompts();
        tokio::spawn(async move {
            if let Ok(prompt) = rx.recv().await {
                let b = Symbol::letter(1).unwrap();
                let a = Symbol::letter(0).unwrap();
                channel.push_reaction(prompt.handle, player(1), b);
                channel.push_reaction(prompt.handle, player(2), b);
                channel.push_reaction(prompt.handle, player(3), a);
            }
        });
    }
    let mut menu = PollMenu::new(
        channel.as_ref(),
        voters,
        "Vote For Maps",
        "a map",
        &maps(3),
        TIMEOUT,
    )
    .unwrap();
    assert_eq!(menu.run().await.unwrap(), "Map 1");
}

#[tokio::test(start_paused = true)]
async fn test_poll_tie_breaks_among_tied() {
    let channel = MemoryChannel::new("menus");
    {
        let channel = channel.clone();
        let mut rx = channel.subscribe_prompts();
        tokio::spawn(async move {
            if let Ok(prompt) = rx.recv().await {
                channel.push_reaction(prompt.handle, player(1), Symbol::letter(0).unwrap());
                channel.push_reaction(prompt.handle, player(2), Symbol::letter(1).unwrap());
            }
        });
    }
    let mut menu = PollMenu::new(
        channel.as_ref(),
        vec![player(1), player(2)],
        "Vote For Maps",
        "a map",
        &maps(3),
        TIMEOUT,
    )
    .unwrap();
    let winner = menu.run().await.unwrap();
    assert!(winner == "Map 0" || winner == "Map 1", "got {winner}");
}

#[tokio::test(start_paused = true)]
async fn test_poll_without_votes_picks_any_option() {
    let channel = MemoryChannel::new("menus");
    let mut menu = PollMenu::new(
        channel.as_ref(),
        vec![player(1), player(2)],
        "Vote For Maps",
        "a map",
        &maps(3),
        TIMEOUT,
    )
    .unwrap();
    let winner = menu.run().await.unwrap();
    assert!(maps(3).contains(&winner));
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_clean_pass() {
    let channel = MemoryChannel::new("menus");
    AutoResponder::new(channel.clone()).spawn();
    let members: Vec<Participant> = (1..=4).map(player).collect();
    let menu = ConfirmationMenu::new(channel.as_ref(), members, "Ready Up", "ready up", TIMEOUT);
    assert!(menu.run().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_returns_absentees() {
    let channel = MemoryChannel::new("menus");
    AutoResponder::new(channel.clone()).afk(player(3)).spawn();
    let members: Vec<Participant> = (1..=4).map(player).collect();
    let menu = ConfirmationMenu::new(channel.as_ref(), members, "Ready Up", "ready up", TIMEOUT);
    assert_eq!(menu.run().await.unwrap(), vec![player(3)]);
}

#[tokio::test(start_paused = true)]
async fn test_single_selection_pick() {
    let channel = MemoryChannel::new("menus");
    AutoResponder::new(channel.clone()).prefer("Map 2").spawn();
    let mut menu = SingleSelectionMenu::new(
        channel.as_ref(),
        player(1),
        "Which map pool will be used?",
        "the map pool",
        &maps(3),
        TIMEOUT,
    )
    .unwrap();
    assert_eq!(menu.run().await.unwrap(), Some("Map 2".to_string()));
    let transcript = channel.transcript();
    assert!(transcript.last().unwrap().contains("has been selected"));
}

#[tokio::test(start_paused = true)]
async fn test_single_selection_timeout_is_none() {
    let channel = MemoryChannel::new("menus");
    let mut menu = SingleSelectionMenu::new(
        channel.as_ref(),
        player(1),
        "Which map pool will be used?",
        "the map pool",
        &maps(3),
        TIMEOUT,
    )
    .unwrap();
    assert_eq!(menu.run().await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_board_edit_failure_falls_back_to_plain_text() {
    let channel = MemoryChannel::new("menus");
    AutoResponder::new(channel.clone()).spawn();
    channel.fail_edits(true);
    let mut menu = SingleSelectionMenu::new(
        channel.as_ref(),
        player(1),
        "Which map pool will be used?",
        "the map pool",
        &maps(3),
        TIMEOUT,
    )
    .unwrap();
    // The pick still resolves; the result lands as a fresh plain message.
    assert_eq!(menu.run().await.unwrap(), Some("Map 0".to_string()));
    assert!(
        channel
            .transcript()
            .iter()
            .any(|m| m.contains("has been selected"))
    );
}
