//! Session actor: the single critical section of a match.

use std::sync::Arc;

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use super::{
    config::SessionConfig,
    distributor::Distributor,
    messages::{SessionError, SessionMessage, SessionStatus, TransportStatus},
};
use crate::{
    game::{
        GameMaster, MatchSnapshot, RuleEvaluator, SnapshotStore, UserError,
        constants::MAX_CHAT_LENGTH, entities::Username, events::MatchEvent,
    },
    net::messages::{ClientError, ServerMessage, UserCommand},
    transport::{ConnectionId, Delivery, TransportAdapter},
};

/// Session actor handle for sending messages
#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionMessage>,
}

impl SessionHandle {
    pub fn new(sender: mpsc::Sender<SessionMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionMessage,
    ) -> Result<T, SessionError> {
        let (response, rx) = oneshot::channel();
        self.sender
            .send(build(response))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Submit a decoded command on behalf of a connection.
    ///
    /// The reply has already been queued to the connection when this
    /// returns; the copy returned here is for bookkeeping.
    pub async fn submit(
        &self,
        connection: ConnectionId,
        command: UserCommand,
    ) -> Result<ServerMessage, SessionError> {
        self.request(|response| SessionMessage::Command {
            connection,
            command,
            response,
        })
        .await
    }

    /// Report a closed or unresponsive connection.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` if the loss tore the match down
    pub async fn connection_lost(&self, connection: ConnectionId) -> Result<bool, SessionError> {
        self.request(|response| SessionMessage::ConnectionLost {
            connection,
            response,
        })
        .await
    }

    pub async fn status(&self) -> Result<SessionStatus, SessionError> {
        self.request(|response| SessionMessage::GetStatus { response })
            .await
    }

    pub async fn cancel(&self) -> Result<(), SessionError> {
        self.request(|response| SessionMessage::Cancel { response })
            .await
    }

    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.request(|response| SessionMessage::Shutdown { response })
            .await
    }
}

#[derive(Debug)]
enum SnapshotJob {
    Save(MatchSnapshot),
    Clear,
}

/// Owns the [`GameMaster`] and serializes every mutation of it.
pub struct SessionActor {
    master: GameMaster,

    distributor: Distributor,

    /// Message inbox
    inbox: mpsc::Receiver<SessionMessage>,

    store: Arc<dyn SnapshotStore>,

    /// Queue feeding the persister task. Saves land in issue order.
    jobs: mpsc::UnboundedSender<SnapshotJob>,
    pending_jobs: Option<mpsc::UnboundedReceiver<SnapshotJob>>,

    /// Most recent snapshot of the match in flight
    latest: Option<MatchSnapshot>,

    matches_completed: u64,
    cascades: u64,
    is_closed: bool,
}

impl SessionActor {
    /// Create a new session actor
    ///
    /// # Arguments
    ///
    /// * `config` - Session configuration
    /// * `rules` - Card content evaluator
    /// * `store` - Where in-flight matches are persisted
    /// * `adapters` - Every transport clients can join over
    ///
    /// # Returns
    ///
    /// * `(SessionActor, SessionHandle)` - Actor and handle for sending messages
    pub fn new(
        config: SessionConfig,
        rules: Arc<dyn RuleEvaluator>,
        store: Arc<dyn SnapshotStore>,
        adapters: Vec<Arc<dyn TransportAdapter>>,
    ) -> (Self, SessionHandle) {
        let (sender, inbox) = mpsc::channel(config.inbox_capacity);
        let (jobs, pending_jobs) = mpsc::unbounded_channel();

        let actor = Self {
            master: GameMaster::new(rules, config.rng_seed),
            distributor: Distributor::new(adapters),
            inbox,
            store,
            jobs,
            pending_jobs: Some(pending_jobs),
            latest: None,
            matches_completed: 0,
            cascades: 0,
            is_closed: false,
        };

        (actor, SessionHandle::new(sender))
    }

    /// Run the session event loop
    pub async fn run(mut self) {
        log::info!(
            "Session starting with {} transports",
            self.distributor.adapters().len()
        );

        match self.store.load().await {
            Ok(Some(snapshot)) => {
                log::info!(
                    "Found saved match from {} at turn {}",
                    snapshot.saved_at,
                    snapshot.state.turn()
                );
                self.master.set_resume_candidate(Some(snapshot.state.clone()));
                self.latest = Some(snapshot);
            }
            Ok(None) => {}
            Err(e) => log::error!("Failed to load snapshot: {}", e),
        }

        let persister = self.pending_jobs.take().map(|jobs| {
            let store = self.store.clone();
            tokio::spawn(persist(store, jobs))
        });

        while let Some(message) = self.inbox.recv().await {
            self.handle_message(message);
            if self.is_closed {
                break;
            }
        }

        drop(self.jobs);
        if let Some(persister) = persister {
            let _ = persister.await;
        }
        log::info!(
            "Session closed after {} matches and {} cascades",
            self.matches_completed,
            self.cascades
        );
    }

    /// Spawn the actor onto the runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    fn handle_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Command {
                connection,
                command,
                response,
            } => {
                let reply = self.handle_command(connection, command);
                let _ = response.send(reply);
            }

            SessionMessage::ConnectionLost {
                connection,
                response,
            } => {
                let result = self.handle_connection_lost(connection);
                let _ = response.send(result);
            }

            SessionMessage::GetStatus { response } => {
                let _ = response.send(self.status());
            }

            SessionMessage::Cancel { response } => {
                self.cancel();
                let _ = response.send(());
            }

            SessionMessage::Shutdown { response } => {
                self.cancel();
                self.is_closed = true;
                let _ = response.send(());
            }
        }
    }

    /// Apply one command. The reply goes to the acting connection before any
    /// event the command caused, so a client always sees its ack first.
    fn handle_command(&mut self, connection: ConnectionId, command: UserCommand) -> ServerMessage {
        let Some(owner) = self.distributor.owner(connection).cloned() else {
            log::debug!("Dropping {} from unknown connection {}", command, connection);
            return ServerMessage::ClientError(ClientError::Unassociated);
        };

        let (reply, chat) = self.apply(owner.as_ref(), connection, command);
        owner.deliver(Delivery::Connection(connection), reply.clone());

        if let Some((sender, text)) = chat {
            self.distributor.route_chat(&sender, &text);
        }
        self.flush_events();
        reply
    }

    /// Validate and apply a command against the match.
    ///
    /// # Returns
    ///
    /// * The reply for the acting connection, and chat to route if the
    ///   command was an accepted chat message
    fn apply(
        &mut self,
        owner: &dyn TransportAdapter,
        connection: ConnectionId,
        command: UserCommand,
    ) -> (ServerMessage, Option<(Username, String)>) {
        if let UserCommand::Login(name) = command {
            if owner.username_of(connection).is_some() {
                return (ServerMessage::ClientError(ClientError::AlreadyAssociated), None);
            }
            return match self.master.login(name.clone()) {
                Ok(_) => match owner.associate(connection, name.clone()) {
                    Ok(()) => (ServerMessage::Ack(UserCommand::Login(name)), None),
                    Err(e) => (ServerMessage::ClientError(e), None),
                },
                Err(e) => (ServerMessage::UserError(e), None),
            };
        }

        if command == UserCommand::Pong {
            return (ServerMessage::Ack(command), None);
        }

        let Some(name) = owner.username_of(connection) else {
            return (ServerMessage::ClientError(ClientError::Unassociated), None);
        };

        let result = match &command {
            UserCommand::FixCapacity(capacity) => self.master.fix_capacity(&name, *capacity),
            UserCommand::AssignColor(color) => {
                self.master.assign_color(&name, *color).map(|_| ())
            }
            UserCommand::PlaceCard {
                hand_index,
                coordinate,
                facing,
            } => self
                .master
                .place_card(&name, *hand_index, *coordinate, *facing)
                .map(|_| ()),
            UserCommand::DrawCard { category, source } => {
                self.master.draw_card(&name, *category, *source).map(|_| ())
            }
            UserCommand::ChooseObjective(index) => {
                self.master.choose_objective(&name, *index).map(|_| ())
            }
            UserCommand::SendChat(text) => {
                let text = normalize_chat(text);
                if text.is_empty() {
                    return (ServerMessage::UserError(UserError::InvalidAction), None);
                }
                return (
                    ServerMessage::Ack(UserCommand::SendChat(text.clone())),
                    Some((name, text)),
                );
            }
            UserCommand::Login(_) | UserCommand::Pong => Ok(()),
        };

        match result {
            Ok(()) => {
                log::debug!("{} {}", name, command);
                (ServerMessage::Ack(command), None)
            }
            Err(e) => {
                log::debug!("{} rejected: {}", name, e);
                (ServerMessage::UserError(e), None)
            }
        }
    }

    /// Hand pending match events to every transport, snapshot after turn
    /// changes and wrap up a finished match.
    fn flush_events(&mut self) {
        let events = self.master.drain_events();
        let turn_changed = events
            .iter()
            .any(|event| matches!(event, MatchEvent::TurnChanged { .. }));
        self.distributor.dispatch(events);

        if self.master.is_terminal() {
            self.finish_match();
        } else if turn_changed {
            self.take_snapshot();
        }
    }

    fn take_snapshot(&mut self) {
        let Some(state) = self.master.try_snapshot() else {
            return;
        };
        let snapshot = MatchSnapshot::new(state);
        log::debug!("Snapshot at turn {}", snapshot.state.turn());
        self.latest = Some(snapshot.clone());
        let _ = self.jobs.send(SnapshotJob::Save(snapshot));
    }

    fn finish_match(&mut self) {
        self.matches_completed += 1;
        log::info!(
            "Match finished ({:?}), {} completed",
            self.master.state().end_reason(),
            self.matches_completed
        );
        self.master.reset();
        self.master.set_resume_candidate(None);
        self.distributor.release_all();
        self.latest = None;
        let _ = self.jobs.send(SnapshotJob::Clear);
    }

    fn handle_connection_lost(&mut self, connection: ConnectionId) -> bool {
        let lost = self
            .distributor
            .adapters()
            .iter()
            .find_map(|adapter| adapter.forget(connection).map(|name| (adapter.protocol(), name)));

        match lost {
            Some((protocol, Some(name))) => {
                log::warn!("Lost {} over {}, tearing the match down", name, protocol);
                let closed = self
                    .distributor
                    .disconnect_all(UserError::ConnectionLost(name));
                self.teardown();
                self.cascades += 1;
                log::info!("Cascade closed {} connections", closed);
                true
            }
            Some((protocol, None)) => {
                log::debug!("Connection {} over {} closed", connection, protocol);
                false
            }
            None => false,
        }
    }

    fn cancel(&mut self) {
        let closed = self.distributor.disconnect_all(UserError::MatchCancelled);
        self.teardown();
        log::info!("Session cancelled, closed {} connections", closed);
    }

    /// Empty the lobby. The latest snapshot stays on offer so the same
    /// roster can pick the match back up.
    fn teardown(&mut self) {
        self.master.reset();
        self.master
            .set_resume_candidate(self.latest.as_ref().map(|s| s.state.clone()));
    }

    fn status(&self) -> SessionStatus {
        let state = self.master.state();
        SessionStatus {
            phase: state.phase().to_string(),
            capacity: state.lobby().capacity(),
            players: state.lobby().names(),
            turn: state.turn(),
            current_player: state.current_player().cloned(),
            transports: self
                .distributor
                .counts()
                .into_iter()
                .map(|(protocol, counts)| TransportStatus {
                    protocol: protocol.to_string(),
                    connections: counts.total,
                    associated: counts.associated,
                })
                .collect(),
            matches_completed: self.matches_completed,
            cascades: self.cascades,
            resumable: self.latest.is_some(),
        }
    }
}

async fn persist(store: Arc<dyn SnapshotStore>, mut jobs: mpsc::UnboundedReceiver<SnapshotJob>) {
    while let Some(job) = jobs.recv().await {
        let result = match &job {
            SnapshotJob::Save(snapshot) => store.save(snapshot).await,
            SnapshotJob::Clear => store.clear().await,
        };
        if let Err(e) = result {
            log::error!("Snapshot job failed: {}", e);
        }
    }
}

/// Trim and cap chat text at [`MAX_CHAT_LENGTH`] characters.
fn normalize_chat(text: &str) -> String {
    text.trim().chars().take(MAX_CHAT_LENGTH).collect()
}
