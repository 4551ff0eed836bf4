//! End-to-end scenarios driving a real server `Dispatcher` against a real
//! client `Dispatcher` over an in-memory duplex stream (SPEC_FULL.md §1.1,
//! §8). No sockets: the same wire codec and component dispatch as
//! production, minus the TCP layer.

use std::sync::Arc;
use std::time::Duration;

use jchat_client::{
    ChannelComponentClient, ChannelEvent, HandshakeComplete, IdentifyComplete, LocalUserState,
    MessageReceived, SystemComponentClient, UserComponentClient,
};
use jchat_core::{ConnectionIdAllocator, ConnectionRegistry, Dispatcher};
use jchat_protocol::{ChannelResult, SystemResult, UserResult};
use jchat_server::{ChannelComponentServer, SystemComponentServer, UserComponentServer, UserDirectory, UserRegistry};
use tokio::sync::{mpsc, Mutex};

/// A whole server, the way `main.rs` builds one, minus the TCP listener.
struct TestServer {
    connection_registry: Arc<ConnectionRegistry>,
    id_alloc: ConnectionIdAllocator,
    system: Arc<SystemComponentServer>,
    user: Arc<UserComponentServer>,
    channel: Arc<ChannelComponentServer>,
}

impl TestServer {
    fn new() -> Self {
        let user_registry = Arc::new(UserRegistry::new());
        let user = Arc::new(UserComponentServer::new(user_registry));
        let directory: Arc<dyn UserDirectory> = user.clone();
        let system = Arc::new(SystemComponentServer::new(directory.clone()));
        let channel = Arc::new(ChannelComponentServer::new(directory));
        Self {
            connection_registry: Arc::new(ConnectionRegistry::new()),
            id_alloc: ConnectionIdAllocator::new(),
            system,
            user,
            channel,
        }
    }

    /// Spawns a fresh client connection against this server, returning its
    /// component handles (to drive outbound calls and drain events) once
    /// both dispatchers are running.
    fn connect(&self) -> ClientHandle {
        let (client_side, server_side) = tokio::io::duplex(64 * 1024);

        let server_connection_id = self.id_alloc.allocate();
        let mut server_dispatcher =
            Dispatcher::new(server_connection_id, self.connection_registry.clone(), "127.0.0.1:1", server_side);
        server_dispatcher.register_component(self.system.clone()).unwrap();
        server_dispatcher.register_component(self.user.clone()).unwrap();
        server_dispatcher.register_component(self.channel.clone()).unwrap();
        tokio::spawn(server_dispatcher.run());

        let local_user = Arc::new(LocalUserState::new());
        let system = Arc::new(SystemComponentClient::new(local_user.clone()));
        let user = Arc::new(UserComponentClient::new(local_user.clone()));
        let channel = Arc::new(ChannelComponentClient::new(local_user.clone()));

        let (handshake_tx, handshake_rx) = mpsc::unbounded_channel();
        system.on_handshake_complete.subscribe(false, move |event| {
            let _ = handshake_tx.send(*event);
            true
        });

        let (identify_tx, identify_rx) = mpsc::unbounded_channel();
        user.on_identify_complete.subscribe(false, move |event| {
            let _ = identify_tx.send(event.clone());
            true
        });

        let (message_tx, message_rx) = mpsc::unbounded_channel();
        user.on_message_received.subscribe(false, move |event| {
            let _ = message_tx.send(event.clone());
            true
        });

        let (channel_tx, channel_rx) = mpsc::unbounded_channel();
        channel.on_event.subscribe(false, move |event| {
            let _ = channel_tx.send(event.clone());
            true
        });

        let client_registry = Arc::new(ConnectionRegistry::new());
        let client_alloc = ConnectionIdAllocator::new();
        let client_connection_id = client_alloc.allocate();
        let mut client_dispatcher =
            Dispatcher::new(client_connection_id, client_registry, "127.0.0.1:2", client_side);
        client_dispatcher.register_component(system.clone()).unwrap();
        client_dispatcher.register_component(user.clone()).unwrap();
        client_dispatcher.register_component(channel.clone()).unwrap();
        let task = tokio::spawn(client_dispatcher.run());

        ClientHandle {
            local_user,
            system,
            user,
            channel,
            task,
            handshake_events: Mutex::new(handshake_rx),
            identify_events: Mutex::new(identify_rx),
            message_events: Mutex::new(message_rx),
            channel_events: Mutex::new(channel_rx),
        }
    }
}

struct ClientHandle {
    local_user: Arc<LocalUserState>,
    system: Arc<SystemComponentClient>,
    user: Arc<UserComponentClient>,
    channel: Arc<ChannelComponentClient>,
    task: tokio::task::JoinHandle<Result<(), jchat_core::DispatchError>>,
    handshake_events: Mutex<mpsc::UnboundedReceiver<HandshakeComplete>>,
    identify_events: Mutex<mpsc::UnboundedReceiver<IdentifyComplete>>,
    message_events: Mutex<mpsc::UnboundedReceiver<MessageReceived>>,
    channel_events: Mutex<mpsc::UnboundedReceiver<ChannelEvent>>,
}

const WAIT: Duration = Duration::from_secs(2);

impl ClientHandle {
    /// Aborts the dispatcher task, dropping its half of the duplex stream so
    /// the server side observes a clean disconnect.
    fn disconnect(self) {
        self.task.abort();
    }

    async fn next_handshake(&self) -> HandshakeComplete {
        tokio::time::timeout(WAIT, self.handshake_events.lock().await.recv())
            .await
            .expect("handshake timed out")
            .expect("handshake channel closed")
    }

    async fn next_identify(&self) -> IdentifyComplete {
        tokio::time::timeout(WAIT, self.identify_events.lock().await.recv())
            .await
            .expect("identify timed out")
            .expect("identify channel closed")
    }

    async fn next_message(&self) -> MessageReceived {
        tokio::time::timeout(WAIT, self.message_events.lock().await.recv())
            .await
            .expect("message timed out")
            .expect("message channel closed")
    }

    /// Drains channel events until one matches `predicate`, ignoring any
    /// others observed along the way (a connection sees plenty of unrelated
    /// channel traffic between the call that triggers an event and the
    /// event a test actually cares about).
    async fn next_channel_event(&self, predicate: impl Fn(&ChannelEvent) -> bool) -> ChannelEvent {
        tokio::time::timeout(WAIT, async {
            let mut rx = self.channel_events.lock().await;
            loop {
                let event = rx.recv().await.expect("channel event channel closed");
                if predicate(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("channel event timed out")
    }
}

async fn setup_identified(server: &TestServer, username: &str) -> ClientHandle {
    let client = server.connect();
    assert_eq!(client.next_handshake().await.result, SystemResult::Ok);
    assert!(client.local_user.snapshot().enabled);

    client.user.identify(username).unwrap();
    assert_eq!(client.next_identify().await.result, UserResult::Ok);
    assert!(client.local_user.snapshot().identified);
    client
}

async fn join(client: &ClientHandle, name: &str) {
    client.channel.join_channel(name).unwrap();
    let event = client.next_channel_event(|e| matches!(e, ChannelEvent::JoinComplete { .. })).await;
    assert!(matches!(event, ChannelEvent::JoinComplete { result, .. } if result == ChannelResult::Ok || result == ChannelResult::ChannelCreated));
}

#[tokio::test]
async fn handshake_and_identify_enable_and_populate_local_identity() {
    let server = TestServer::new();
    let client = setup_identified(&server, "alice").await;

    let snap = client.local_user.snapshot();
    assert_eq!(snap.username, "alice");
    assert!(!snap.hostname.is_empty());
}

#[tokio::test]
async fn direct_message_is_delivered_to_the_named_recipient() {
    let server = TestServer::new();
    let alice = setup_identified(&server, "alice").await;
    let bob = setup_identified(&server, "bob").await;

    alice.user.send_message("bob", "hello bob").unwrap();
    let received = bob.next_message().await;
    assert_eq!(received.from_username, "alice");
    assert_eq!(received.message, "hello bob");
}

#[tokio::test]
async fn joining_a_new_channel_creates_it_with_the_founder_as_operator() {
    let server = TestServer::new();
    let alice = setup_identified(&server, "alice").await;

    alice.channel.join_channel("#lobby").unwrap();
    let event = alice.next_channel_event(|e| matches!(e, ChannelEvent::JoinComplete { .. })).await;
    assert!(matches!(event, ChannelEvent::JoinComplete { result: ChannelResult::ChannelCreated, .. }));

    let snap = alice.channel.mirror().snapshot("#lobby").unwrap();
    assert_eq!(snap.members.len(), 1);
    assert!(snap.members[0].is_operator);
}

#[tokio::test]
async fn second_joiner_sees_founder_and_founder_is_notified() {
    let server = TestServer::new();
    let alice = setup_identified(&server, "alice").await;
    let bob = setup_identified(&server, "bob").await;

    join(&alice, "#lobby").await;

    bob.channel.join_channel("#lobby").unwrap();
    let bob_join = bob.next_channel_event(|e| matches!(e, ChannelEvent::JoinComplete { .. })).await;
    assert!(matches!(bob_join, ChannelEvent::JoinComplete { result: ChannelResult::Ok, .. }));

    let alice_saw = alice.next_channel_event(|e| matches!(e, ChannelEvent::UserJoined { .. })).await;
    assert!(matches!(alice_saw, ChannelEvent::UserJoined { username, .. } if username == "bob"));

    let snap = bob.channel.mirror().snapshot("#lobby").unwrap();
    assert_eq!(snap.members.len(), 2);
    assert!(snap.members.iter().any(|m| m.username == "alice" && m.is_operator));
}

#[tokio::test]
async fn channel_message_reaches_other_members_not_the_sender() {
    let server = TestServer::new();
    let alice = setup_identified(&server, "alice").await;
    let bob = setup_identified(&server, "bob").await;

    join(&alice, "#lobby").await;
    join(&bob, "#lobby").await;
    alice.next_channel_event(|e| matches!(e, ChannelEvent::UserJoined { .. })).await;

    alice.channel.send_message("#lobby", "hi all").unwrap();
    let send_complete = alice.next_channel_event(|e| matches!(e, ChannelEvent::SendComplete { .. })).await;
    assert!(matches!(send_complete, ChannelEvent::SendComplete { result: ChannelResult::Ok, .. }));

    let received = bob.next_channel_event(|e| matches!(e, ChannelEvent::MessageReceived { .. })).await;
    assert!(matches!(received, ChannelEvent::MessageReceived { username, text, .. } if username == "alice" && text == "hi all"));
}

#[tokio::test]
async fn operator_can_kick_a_member() {
    let server = TestServer::new();
    let alice = setup_identified(&server, "alice").await;
    let bob = setup_identified(&server, "bob").await;

    join(&alice, "#lobby").await;
    join(&bob, "#lobby").await;
    alice.next_channel_event(|e| matches!(e, ChannelEvent::UserJoined { .. })).await;

    alice.channel.kick_user("#lobby", "bob").unwrap();
    let kick_complete = alice.next_channel_event(|e| matches!(e, ChannelEvent::KickComplete { .. })).await;
    assert!(matches!(kick_complete, ChannelEvent::KickComplete { result: ChannelResult::Ok, .. }));

    let snap = alice.channel.mirror().snapshot("#lobby").unwrap();
    assert_eq!(snap.members.len(), 1);
    assert_eq!(snap.members[0].username, "alice");
}

#[tokio::test]
async fn banned_user_cannot_rejoin() {
    let server = TestServer::new();
    let alice = setup_identified(&server, "alice").await;
    let bob = setup_identified(&server, "bob").await;

    join(&alice, "#lobby").await;
    join(&bob, "#lobby").await;
    alice.next_channel_event(|e| matches!(e, ChannelEvent::UserJoined { .. })).await;

    alice.channel.ban_user("#lobby", "bob").unwrap();
    let ban_complete = alice.next_channel_event(|e| matches!(e, ChannelEvent::BanComplete { .. })).await;
    assert!(matches!(ban_complete, ChannelEvent::BanComplete { result: ChannelResult::Ok, .. }));
    bob.next_channel_event(|e| matches!(e, ChannelEvent::UserBanned { .. })).await;

    bob.channel.join_channel("#lobby").unwrap();
    let rejoin = bob.next_channel_event(|e| matches!(e, ChannelEvent::JoinComplete { .. })).await;
    assert!(matches!(rejoin, ChannelEvent::JoinComplete { result: ChannelResult::BannedFromChannel, .. }));
}

#[tokio::test]
async fn duplicate_identify_is_rejected_with_username_in_use() {
    let server = TestServer::new();
    let alice = setup_identified(&server, "alice").await;
    let bob = server.connect();
    assert_eq!(bob.next_handshake().await.result, SystemResult::Ok);

    bob.user.identify("alice").unwrap();
    assert_eq!(bob.next_identify().await.result, UserResult::UsernameInUse);
    assert!(!bob.local_user.snapshot().identified);
    assert_eq!(alice.local_user.snapshot().username, "alice");
}

#[tokio::test]
async fn unbanned_user_can_rejoin_the_channel() {
    let server = TestServer::new();
    let alice = setup_identified(&server, "alice").await;
    let bob = setup_identified(&server, "bob").await;

    join(&alice, "#lobby").await;
    join(&bob, "#lobby").await;
    alice.next_channel_event(|e| matches!(e, ChannelEvent::UserJoined { .. })).await;

    alice.channel.ban_user("#lobby", "bob").unwrap();
    alice.next_channel_event(|e| matches!(e, ChannelEvent::BanComplete { .. })).await;
    bob.next_channel_event(|e| matches!(e, ChannelEvent::UserBanned { .. })).await;

    bob.channel.join_channel("#lobby").unwrap();
    let rejected = bob.next_channel_event(|e| matches!(e, ChannelEvent::JoinComplete { .. })).await;
    assert!(matches!(rejected, ChannelEvent::JoinComplete { result: ChannelResult::BannedFromChannel, .. }));

    alice.channel.unban_user("#lobby", "bob").unwrap();
    let unban_complete = alice.next_channel_event(|e| matches!(e, ChannelEvent::UnbanComplete { .. })).await;
    assert!(matches!(unban_complete, ChannelEvent::UnbanComplete { result: ChannelResult::Ok, .. }));
    bob.next_channel_event(|e| matches!(e, ChannelEvent::UserUnbanned { .. })).await;

    bob.channel.join_channel("#lobby").unwrap();
    let rejoin = bob.next_channel_event(|e| matches!(e, ChannelEvent::JoinComplete { .. })).await;
    assert!(matches!(rejoin, ChannelEvent::JoinComplete { result: ChannelResult::Ok, .. }));

    let snap = alice.channel.mirror().snapshot("#lobby").unwrap();
    assert_eq!(snap.members.len(), 2);
    assert!(snap.members.iter().any(|m| m.username == "bob"));
}

#[tokio::test]
async fn operator_status_mirrors_to_every_member_on_op_and_deop() {
    let server = TestServer::new();
    let alice = setup_identified(&server, "alice").await;
    let bob = setup_identified(&server, "bob").await;

    join(&alice, "#lobby").await;
    join(&bob, "#lobby").await;
    alice.next_channel_event(|e| matches!(e, ChannelEvent::UserJoined { .. })).await;

    alice.channel.op_user("#lobby", "bob").unwrap();
    alice.next_channel_event(|e| matches!(e, ChannelEvent::OpComplete { .. })).await;
    bob.next_channel_event(|e| matches!(e, ChannelEvent::UserOpped { .. })).await;

    let snap = bob.channel.mirror().snapshot("#lobby").unwrap();
    assert!(snap.members.iter().find(|m| m.username == "bob").unwrap().is_operator);

    alice.channel.deop_user("#lobby", "bob").unwrap();
    alice.next_channel_event(|e| matches!(e, ChannelEvent::DeopComplete { .. })).await;
    bob.next_channel_event(|e| matches!(e, ChannelEvent::UserDeopped { .. })).await;

    let snap = bob.channel.mirror().snapshot("#lobby").unwrap();
    assert!(!snap.members.iter().find(|m| m.username == "bob").unwrap().is_operator);
}

#[tokio::test]
async fn disconnecting_a_member_notifies_the_rest_of_the_channel() {
    let server = TestServer::new();
    let alice = setup_identified(&server, "alice").await;
    let bob = setup_identified(&server, "bob").await;

    join(&alice, "#lobby").await;
    join(&bob, "#lobby").await;
    alice.next_channel_event(|e| matches!(e, ChannelEvent::UserJoined { .. })).await;

    bob.disconnect();
    let left = alice.next_channel_event(|e| matches!(e, ChannelEvent::UserLeft { .. })).await;
    assert!(matches!(left, ChannelEvent::UserLeft { username, .. } if username == "bob"));
}
