mod common;

use std::time::Duration;

use common::{Client, TestServer};

#[tokio::test]
async fn nickname_negotiation_enforces_length_bounds() {
    let server = TestServer::new().await;
    let mut client = Client::connect(server.addr).await;
    client.recv_line().await; // greeting
    client.recv_line().await; // prompt

    client.send("ab").await;
    let reply = client.recv_line().await;
    assert!(reply.contains("must be between 3 and 16"), "got: {reply}");

    client.send("0123456789abcdefg").await; // 17 chars, too long
    let reply = client.recv_line().await;
    assert!(reply.contains("must be between 3 and 16"), "got: {reply}");

    client.send("alice").await;
    let reply = client.recv_line().await;
    assert_eq!(reply, "Welcome, alice.");
}

#[tokio::test]
async fn duplicate_nickname_is_rejected_and_retry_succeeds() {
    let server = TestServer::new().await;
    let _alice = Client::join_as(server.addr, "alice").await;

    let mut second = Client::connect(server.addr).await;
    second.recv_line().await;
    second.recv_line().await;
    second.send("alice").await;
    assert_eq!(second.recv_line().await, "Nickname unavailable.");

    second.send("alice2").await;
    assert_eq!(second.recv_line().await, "Welcome, alice2.");
}

#[tokio::test]
async fn create_join_and_list_round_trip() {
    let server = TestServer::new().await;
    let mut alice = Client::join_as(server.addr, "alice").await;
    let mut bob = Client::join_as(server.addr, "bob").await;

    alice.send("create 1").await;
    assert_eq!(alice.recv_line().await, "Created room 1.");

    bob.send("join 1").await;
    assert_eq!(bob.recv_line().await, "Joined room 1.");

    // list is pure: two consecutive calls produce identical output.
    alice.send("list").await;
    let first = alice.recv_block().await;
    alice.send("list").await;
    let second = alice.recv_block().await;
    assert_eq!(first, second);
    assert!(first.contains("alice"));
    assert!(first.contains("bob"));
}

#[tokio::test]
async fn create_rejects_negative_id_and_duplicate_id() {
    let server = TestServer::new().await;
    let mut alice = Client::join_as(server.addr, "alice").await;
    let mut bob = Client::join_as(server.addr, "bob").await;

    alice.send("create -1").await;
    assert_eq!(alice.recv_line().await, "Invalid argument.");

    alice.send("create 0").await;
    assert_eq!(alice.recv_line().await, "Created room 0.");

    bob.send("create 0").await;
    assert_eq!(bob.recv_line().await, "Room already exists.");
}

#[tokio::test]
async fn spectate_an_idle_room_does_not_require_a_seat() {
    let server = TestServer::new().await;
    let mut alice = Client::join_as(server.addr, "alice").await;
    let mut watcher = Client::join_as(server.addr, "watcher").await;

    alice.send("create 6").await;
    assert_eq!(alice.recv_line().await, "Created room 6.");

    watcher.send("spectate 6").await;
    assert_eq!(watcher.recv_line().await, "Spectating room 6.");

    // spectating does not seat the watcher, so a later join attempt still
    // fails on "already in a room", not a seat conflict.
    watcher.send("join 6").await;
    assert_eq!(watcher.recv_line().await, "Already in a room.");
}

#[tokio::test]
async fn spectating_an_in_progress_room_delivers_an_initial_snapshot() {
    let server = TestServer::new().await;
    let mut alice = Client::join_as(server.addr, "alice").await;
    let mut bob = Client::join_as(server.addr, "bob").await;
    let mut watcher = Client::join_as(server.addr, "watcher").await;

    alice.send("create 8").await;
    assert_eq!(alice.recv_line().await, "Created room 8.");
    bob.send("join 8").await;
    assert_eq!(bob.recv_line().await, "Joined room 8.");

    alice.send("start").await;
    let _ = alice.recv_snapshot().await;
    let _ = alice.recv_snapshot().await;
    let _ = bob.recv_snapshot().await;

    watcher.send("spectate 8").await;
    assert_eq!(watcher.recv_line().await, "Spectating room 8.");
    let snap = watcher.recv_snapshot().await;
    assert!(snap.contains("Turn 0"), "got: {snap}");
}

#[tokio::test]
async fn ninth_join_is_rejected_as_full() {
    let server = TestServer::new().await;
    let mut founder = Client::join_as(server.addr, "p0").await;
    founder.send("create 1").await;
    assert_eq!(founder.recv_line().await, "Created room 1.");

    let mut joiners = Vec::new();
    for i in 1..8 {
        let mut c = Client::join_as(server.addr, &format!("p{i}")).await;
        c.send("join 1").await;
        assert_eq!(c.recv_line().await, "Joined room 1.");
        joiners.push(c);
    }

    let mut ninth = Client::join_as(server.addr, "p8").await;
    ninth.send("join 1").await;
    assert_eq!(ninth.recv_line().await, "Room 1 is full.");
}

#[tokio::test]
async fn start_without_dealer_permission_is_refused_then_succeeds() {
    let server = TestServer::new().await;
    let mut alice = Client::join_as(server.addr, "alice").await;
    let mut bob = Client::join_as(server.addr, "bob").await;

    alice.send("create 7").await;
    assert_eq!(alice.recv_line().await, "Created room 7.");
    bob.send("join 7").await;
    assert_eq!(bob.recv_line().await, "Joined room 7.");

    bob.send("start").await;
    let reply = bob.recv_line().await;
    assert!(reply.contains("Only the earliest-joined player may start"), "got: {reply}");

    alice.send("start").await;
    // match begins: alice (the starter) receives the initial snapshot.
    let snap = alice.recv_snapshot().await;
    assert!(snap.contains("Turn 0"));
}

#[tokio::test]
async fn leave_with_no_room_is_idempotent() {
    let server = TestServer::new().await;
    let mut alice = Client::join_as(server.addr, "alice").await;

    alice.send("leave").await;
    assert_eq!(alice.recv_line().await, "Currently not in a room.");
    alice.send("leave").await;
    assert_eq!(alice.recv_line().await, "Currently not in a room.");
}

#[tokio::test]
async fn leave_reports_the_room_that_was_left() {
    let server = TestServer::new().await;
    let mut alice = Client::join_as(server.addr, "alice").await;
    alice.send("create 3").await;
    assert_eq!(alice.recv_line().await, "Created room 3.");

    alice.send("leave").await;
    assert_eq!(alice.recv_line().await, "Left room 3.");
}

#[tokio::test]
async fn priority_zero_leave_preempts_queued_priority_one_refreshes() {
    let server = TestServer::new().await;
    let mut alice = Client::join_as(server.addr, "alice").await;
    alice.send("create 5").await;
    assert_eq!(alice.recv_line().await, "Created room 5.");

    // Flood 10 gameplay-priority refreshes, then one lobby-priority leave,
    // all queued back-to-back before the Lobby Controller's drain loop can
    // catch up. Priority 0 must still be served first.
    for _ in 0..10 {
        alice.send("refresh").await;
    }
    alice.send("leave").await;

    let first_reply = alice.recv_line_timeout(Duration::from_secs(2)).await.expect("a reply");
    assert_eq!(first_reply, "Left room 5.", "leave (priority 0) must preempt queued refreshes (priority 1)");
}
