mod common;

use common::{Client, TestServer};

fn current_player_nick(snapshot: &str) -> String {
    snapshot
        .lines()
        .find_map(|l| l.strip_prefix("Current player: "))
        .expect("snapshot has a current-player line")
        .to_string()
}

#[tokio::test]
async fn two_player_happy_path_draw_advances_turn() {
    let server = TestServer::new().await;
    let mut alice = Client::join_as(server.addr, "alice").await;
    let mut bob = Client::join_as(server.addr, "bob").await;

    alice.send("create 1").await;
    assert_eq!(alice.recv_line().await, "Created room 1.");
    bob.send("join 1").await;
    assert_eq!(bob.recv_line().await, "Joined room 1.");

    alice.send("start").await;

    // alice is the starter: she always receives the unconditional initial
    // broadcast, then the direct reply to the synthetic refresh `start`
    // pushes onto the room bus afterward.
    let alice_initial = alice.recv_snapshot().await;
    assert!(alice_initial.contains("Turn 0"));
    let _alice_refresh_reply = alice.recv_snapshot().await;

    // bob only ever receives the one unconditional broadcast -- use his copy
    // as the reliable source for who goes first.
    let bob_initial = bob.recv_snapshot().await;
    assert!(bob_initial.contains("Turn 0"));

    let current = current_player_nick(&bob_initial);
    if current == "alice" {
        alice.send("draw 0").await;
    } else {
        bob.send("draw 0").await;
    }

    let alice_after = alice.recv_snapshot().await;
    let bob_after = bob.recv_snapshot().await;
    assert!(alice_after.contains("Turn 1"), "got: {alice_after}");
    assert!(bob_after.contains("Turn 1"), "got: {bob_after}");
}

#[tokio::test]
async fn stale_turn_number_is_rejected_without_advancing_state() {
    let server = TestServer::new().await;
    let mut alice = Client::join_as(server.addr, "alice").await;
    let mut bob = Client::join_as(server.addr, "bob").await;

    alice.send("create 2").await;
    assert_eq!(alice.recv_line().await, "Created room 2.");
    bob.send("join 2").await;
    assert_eq!(bob.recv_line().await, "Joined room 2.");

    alice.send("start").await;
    let _ = alice.recv_snapshot().await;
    let _ = alice.recv_snapshot().await;
    let bob_initial = bob.recv_snapshot().await;
    let current = current_player_nick(&bob_initial);

    let (mut actor, mut other) = if current == "alice" { (alice, bob) } else { (bob, alice) };

    // A stale turn number (turn 5 when the actual turn is 0) is rejected.
    actor.send("draw 5").await;
    let reply = actor.recv_line().await;
    assert_eq!(reply, "Current turn is 0.");

    // Neither side should see a new broadcast from the rejected command.
    let stray = other.recv_line_timeout(std::time::Duration::from_millis(200)).await;
    assert!(stray.is_none(), "rejected stale command must not broadcast state: got {stray:?}");
}

#[tokio::test]
async fn mis_grab_on_empty_tables_absorbs_everything_and_reports_mistake() {
    let server = TestServer::new().await;
    let mut alice = Client::join_as(server.addr, "alice").await;
    let mut bob = Client::join_as(server.addr, "bob").await;

    alice.send("create 9").await;
    assert_eq!(alice.recv_line().await, "Created room 9.");
    bob.send("join 9").await;
    assert_eq!(bob.recv_line().await, "Joined room 9.");

    alice.send("start").await;
    let _ = alice.recv_snapshot().await;
    let _ = alice.recv_snapshot().await;
    let _ = bob.recv_snapshot().await;

    // Both tables are empty at turn 0 regardless of whose turn it is, so a
    // `grab` from either seat is a mis-grab: there is no opponent table-top
    // to match against.
    alice.send("grab 0").await;
    let reply = alice.recv_line().await;
    assert_eq!(reply, "You made a mistake. Take all the cards :)");

    let alice_after = alice.recv_snapshot().await;
    let bob_after = bob.recv_snapshot().await;
    assert!(alice_after.contains("alice: hand=72 table=0"), "got: {alice_after}");
    assert!(bob_after.contains("bob: hand=0 table=0"), "got: {bob_after}");
}

#[tokio::test]
async fn player_departure_mid_match_shrinks_roster() {
    let server = TestServer::new().await;
    let mut alice = Client::join_as(server.addr, "alice").await;
    let mut bob = Client::join_as(server.addr, "bob").await;
    let mut carol = Client::join_as(server.addr, "carol").await;

    alice.send("create 4").await;
    assert_eq!(alice.recv_line().await, "Created room 4.");
    bob.send("join 4").await;
    assert_eq!(bob.recv_line().await, "Joined room 4.");
    carol.send("join 4").await;
    assert_eq!(carol.recv_line().await, "Joined room 4.");

    alice.send("start").await;
    let _ = alice.recv_snapshot().await;
    let _ = alice.recv_snapshot().await;
    let bob_initial = bob.recv_snapshot().await;
    assert!(bob_initial.lines().filter(|l| l.contains(": hand=")).count() == 3);

    // carol disconnects; the connection handler emits a synthetic `leave`,
    // the Lobby Controller forwards it onto the room bus, and the Game
    // Runner reconciles its roster on its next poll, broadcasting an
    // updated two-player snapshot.
    drop(carol);

    let after = bob.recv_snapshot().await;
    let seat_lines = after.lines().filter(|l| l.contains(": hand=")).count();
    assert_eq!(seat_lines, 2, "departed player must be dropped from the roster: got {after}");
}
