//! WebSocket Escrow Server
//!
//! Async WebSocket front end for the escrow. Each connection authenticates
//! with a JWT, then issues create/join/reveal/forfeit requests against the
//! shared [`LedgerAdapter`]. The other party of a game is pushed a
//! [`GameUpdate`] whenever the record changes.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::core::identity::Identity;
use crate::game::coordinator::{CoordinatorConfig, GameCoordinator};
use crate::ledger::adapter::Receipt;
use crate::ledger::{InMemoryLedger, LedgerAdapter};
use crate::network::auth::{validate_token, AuthConfig, AuthError};
use crate::network::protocol::{
    AuthRequest, AuthResult, ClientMessage, ErrorCode, GameUpdate, ServerError, ServerMessage,
};

/// Escrow shared between connections.
pub type SharedEscrow = Arc<RwLock<LedgerAdapter<InMemoryLedger>>>;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Close a connection after this long without a message.
    pub idle_timeout: Duration,
    /// Dev faucet: credited once to each identity on first auth.
    pub starting_balance: u64,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            idle_timeout: Duration::from_secs(300),
            starting_balance: 0,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// Connection limit reached.
    #[error("Connection limit reached ({0})")]
    ConnectionLimitReached(usize),
}

/// Per-connection state.
#[derive(Debug, Clone)]
pub struct Session {
    /// Connection id.
    pub id: Uuid,
    /// Ledger identity once authenticated.
    pub identity: Option<Identity>,
}

impl Session {
    /// Fresh unauthenticated session.
    pub fn new() -> Self {
        Self { id: Uuid::new_v4(), identity: None }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Connected client state.
struct ConnectedClient {
    /// Remote address.
    addr: SocketAddr,
    /// Identity after auth.
    identity: Option<Identity>,
    /// Connection time.
    connected_at: Instant,
    /// Outbound queue.
    sender: mpsc::Sender<ServerMessage>,
}

/// The escrow server.
#[derive(Clone)]
pub struct GameServer {
    config: Arc<ServerConfig>,
    auth: Arc<AuthConfig>,
    escrow: SharedEscrow,
    clients: Arc<RwLock<BTreeMap<Uuid, ConnectedClient>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a server over a fresh in-memory ledger.
    pub fn new(config: ServerConfig, auth: AuthConfig, coordinator: CoordinatorConfig) -> Self {
        let escrow = LedgerAdapter::new(InMemoryLedger::new(), GameCoordinator::new(coordinator));
        Self::with_escrow(config, auth, escrow)
    }

    /// Create a server over an existing adapter.
    pub fn with_escrow(
        config: ServerConfig,
        auth: AuthConfig,
        escrow: LedgerAdapter<InMemoryLedger>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config: Arc::new(config),
            auth: Arc::new(auth),
            escrow: Arc::new(RwLock::new(escrow)),
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Shared escrow handle.
    pub fn escrow(&self) -> SharedEscrow {
        self.escrow.clone()
    }

    /// Run the server.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Escrow server listening on {}", self.config.bind_addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if let Err(e) = self.admit().await {
                                warn!("{}, rejecting {}", e, addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Check the connection cap before accepting another client.
    async fn admit(&self) -> Result<(), GameServerError> {
        if self.connection_count().await >= self.config.max_connections {
            return Err(GameServerError::ConnectionLimitReached(self.config.max_connections));
        }
        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let server = self.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);
            let mut session = Session::new();

            server.clients.write().await.insert(
                session.id,
                ConnectedClient {
                    addr,
                    identity: None,
                    connected_at: Instant::now(),
                    sender: msg_tx.clone(),
                },
            );

            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            loop {
                tokio::select! {
                    msg = timeout(server.config.idle_timeout, ws_receiver.next()) => {
                        match msg {
                            Err(_) => {
                                info!("Client {} idle for {:?}, closing", addr, server.config.idle_timeout);
                                break;
                            }
                            Ok(Some(Ok(Message::Text(text)))) => {
                                let reply = match ClientMessage::from_json(&text) {
                                    Ok(client_msg) => server.handle_message(&mut session, client_msg).await,
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        ServerMessage::Error(ServerError::new(
                                            ErrorCode::InvalidInput,
                                            "Invalid message format",
                                        ))
                                    }
                                };
                                if msg_tx.send(reply).await.is_err() {
                                    break;
                                }
                            }
                            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Ok(Some(Err(e))) => {
                                warn!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            Ok(Some(Ok(_))) => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Drop every sender so the writer drains and exits.
            let connected_for = server
                .clients
                .write()
                .await
                .remove(&session.id)
                .map(|c| c.connected_at.elapsed());
            drop(msg_tx);
            if timeout(Duration::from_secs(1), sender_task).await.is_err() {
                debug!("Writer for {} did not drain in time", addr);
            }

            info!("Client {} cleaned up after {:?}", addr, connected_for.unwrap_or_default());
        });
    }

    /// Handle one client message and produce the direct reply.
    pub async fn handle_message(&self, session: &mut Session, msg: ClientMessage) -> ServerMessage {
        match self.dispatch(session, msg).await {
            Ok(reply) => reply,
            Err(err) => ServerMessage::Error(err),
        }
    }

    async fn dispatch(&self, session: &mut Session, msg: ClientMessage) -> Result<ServerMessage, ServerError> {
        let caller = session.identity;

        let receipt = match (msg, caller) {
            (ClientMessage::Auth(req), _) => return Ok(self.handle_auth(session, req).await),
            (ClientMessage::Ping { timestamp }, _) => {
                return Ok(ServerMessage::Pong {
                    timestamp,
                    server_time: chrono::Utc::now().timestamp_millis().max(0) as u64,
                });
            }
            (_, None) => {
                return Err(ServerError::new(ErrorCode::NotAuthenticated, "Must authenticate first"));
            }
            (ClientMessage::Balance, Some(identity)) => {
                let amount = self.escrow.read().await.balance(&identity);
                return Ok(ServerMessage::Balance { identity, amount });
            }
            (ClientMessage::Fetch { game }, Some(_)) => {
                let escrow = self.escrow.read().await;
                let record = escrow.fetch(&game).map_err(|e| ServerError::from(&e))?;
                return Ok(ServerMessage::Game(GameUpdate { address: game, record, events: Vec::new() }));
            }
            (ClientMessage::Create(req), Some(identity)) => {
                self.escrow.write().await.create(identity, req.wager, req.commitment)
            }
            (ClientMessage::Join(req), Some(identity)) => {
                self.escrow.write().await.join(identity, req.game, req.commitment)
            }
            (ClientMessage::Reveal(req), Some(identity)) => {
                let secret = req
                    .secret_bytes()
                    .map_err(|e| ServerError::new(ErrorCode::InvalidInput, format!("secret: {}", e)))?;
                self.escrow.write().await.reveal(identity, req.game, req.move_value, &secret)
            }
            (ClientMessage::ClaimForfeit { game }, Some(identity)) => {
                self.escrow.write().await.claim_forfeit(identity, game)
            }
        };

        let receipt = receipt.map_err(|e| {
            debug!("Operation rejected for {:?}: {}", caller.map(|c| c.short()), e);
            ServerError::from(&e)
        })?;
        let update = to_update(receipt);
        self.notify_parties(session.id, &update).await;
        Ok(ServerMessage::Game(update))
    }

    /// Handle authentication.
    async fn handle_auth(&self, session: &mut Session, req: AuthRequest) -> ServerMessage {
        let claims = match validate_token(&req.token, &self.auth) {
            Ok(claims) => claims,
            Err(e) => {
                match e {
                    AuthError::NotConfigured => error!("Auth attempted but no verification key is configured"),
                    _ => debug!("Auth failed for session {}: {}", session.id, e),
                }
                return ServerMessage::AuthResult(AuthResult {
                    success: false,
                    identity: None,
                    error: Some(e.to_string()),
                    server_version: self.config.version.clone(),
                });
            }
        };

        let identity = claims.identity();
        session.identity = Some(identity);

        if let Some(client) = self.clients.write().await.get_mut(&session.id) {
            client.identity = Some(identity);
        }

        if self.config.starting_balance > 0 {
            let mut escrow = self.escrow.write().await;
            if !escrow.ledger().has_account(&identity) {
                if let Err(e) = escrow.ledger_mut().credit(identity, self.config.starting_balance) {
                    warn!("Starting balance for {} failed: {}", identity.short(), e);
                }
            }
        }

        debug!("Session {} authenticated as {}", session.id, identity.short());

        ServerMessage::AuthResult(AuthResult {
            success: true,
            identity: Some(identity),
            error: None,
            server_version: self.config.version.clone(),
        })
    }

    /// Push an update to the other connected party of a game.
    async fn notify_parties(&self, origin: Uuid, update: &GameUpdate) {
        let parties = [Some(update.record.creator), update.record.opponent];
        let clients = self.clients.read().await;

        for (id, client) in clients.iter() {
            if *id == origin || client.identity.is_none() || !parties.contains(&client.identity) {
                continue;
            }
            if let Err(e) = client.sender.try_send(ServerMessage::Game(update.clone())) {
                debug!("Dropped update for {}: {}", client.addr, e);
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

fn to_update(receipt: Receipt) -> GameUpdate {
    GameUpdate {
        address: receipt.address,
        record: receipt.record,
        events: receipt.events,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::commitment::commit;
    use crate::game::moves::Move;
    use crate::game::record::GameStatus;
    use crate::network::auth::tests::{hs_config, make_token, TEST_SECRET};
    use crate::network::protocol::{CreateRequest, JoinRequest, RevealRequest};

    fn test_server() -> GameServer {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            starting_balance: 1_000,
            ..Default::default()
        };
        GameServer::new(config, hs_config(), CoordinatorConfig::default())
    }

    async fn login(server: &GameServer, sub: &str) -> Session {
        let mut session = Session::new();
        let token = make_token(sub, 3_600, TEST_SECRET);
        let reply = server
            .handle_message(&mut session, ClientMessage::Auth(AuthRequest { token }))
            .await;
        match reply {
            ServerMessage::AuthResult(result) => assert!(result.success, "{:?}", result.error),
            other => panic!("unexpected reply: {:?}", other),
        }
        session
    }

    fn expect_game(reply: ServerMessage) -> GameUpdate {
        match reply {
            ServerMessage::Game(update) => update,
            other => panic!("expected game update, got {:?}", other),
        }
    }

    fn expect_error(reply: ServerMessage) -> ErrorCode {
        match reply {
            ServerMessage::Error(err) => err.code,
            other => panic!("expected error, got {:?}", other),
        }
    }

    async fn balance(server: &GameServer, session: &mut Session) -> u64 {
        match server.handle_message(session, ClientMessage::Balance).await {
            ServerMessage::Balance { amount, .. } => amount,
            other => panic!("expected balance, got {:?}", other),
        }
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.idle_timeout, Duration::from_secs(300));
        assert_eq!(config.starting_balance, 0);
    }

    #[tokio::test]
    async fn test_server_creation() {
        let server = test_server();
        assert_eq!(server.connection_count().await, 0);
        server.shutdown();
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            max_connections: 1,
            ..Default::default()
        };
        let server = GameServer::new(config, hs_config(), CoordinatorConfig::default());
        assert!(server.admit().await.is_ok());

        let (tx, _rx) = mpsc::channel(1);
        server.clients.write().await.insert(
            Uuid::new_v4(),
            ConnectedClient {
                addr: "127.0.0.1:9001".parse().unwrap(),
                identity: None,
                connected_at: Instant::now(),
                sender: tx,
            },
        );
        assert!(matches!(
            server.admit().await,
            Err(GameServerError::ConnectionLimitReached(1))
        ));
    }

    #[tokio::test]
    async fn test_requires_auth() {
        let server = test_server();
        let mut session = Session::new();

        let reply = server.handle_message(&mut session, ClientMessage::Balance).await;
        assert_eq!(expect_error(reply), ErrorCode::NotAuthenticated);

        let reply = server.handle_message(&mut session, ClientMessage::Ping { timestamp: 7 }).await;
        assert!(matches!(reply, ServerMessage::Pong { timestamp: 7, .. }));
    }

    #[tokio::test]
    async fn test_bad_token_rejected() {
        let server = test_server();
        let mut session = Session::new();
        let token = make_token("mallory", 3_600, "not-the-server-secret-at-all!!!!");

        let reply = server
            .handle_message(&mut session, ClientMessage::Auth(AuthRequest { token }))
            .await;
        match reply {
            ServerMessage::AuthResult(result) => {
                assert!(!result.success);
                assert!(result.identity.is_none());
            }
            other => panic!("unexpected reply: {:?}", other),
        }
        assert!(session.identity.is_none());
    }

    #[tokio::test]
    async fn test_starting_balance_credited_once() {
        let server = test_server();
        let mut alice = login(&server, "alice").await;
        assert_eq!(balance(&server, &mut alice).await, 1_000);

        let mut again = login(&server, "alice").await;
        assert_eq!(balance(&server, &mut again).await, 1_000);
    }

    #[tokio::test]
    async fn test_full_match() {
        let server = test_server();
        let mut alice = login(&server, "alice").await;
        let mut bob = login(&server, "bob").await;

        let created = expect_game(
            server
                .handle_message(
                    &mut alice,
                    ClientMessage::Create(CreateRequest {
                        wager: 100,
                        commitment: commit(Move::Rock, b"alice-secret"),
                    }),
                )
                .await,
        );
        assert_eq!(created.record.status, GameStatus::Open);
        let game = created.address;

        let joined = expect_game(
            server
                .handle_message(
                    &mut bob,
                    ClientMessage::Join(JoinRequest {
                        game,
                        commitment: commit(Move::Scissors, b"bob-secret"),
                    }),
                )
                .await,
        );
        assert_eq!(joined.record.status, GameStatus::Committed);

        for (session, mv, secret) in [
            (&mut alice, Move::Rock, &b"alice-secret"[..]),
            (&mut bob, Move::Scissors, &b"bob-secret"[..]),
        ] {
            let reply = server
                .handle_message(
                    session,
                    ClientMessage::Reveal(RevealRequest {
                        game,
                        move_value: mv.as_u8(),
                        secret: hex::encode(secret),
                    }),
                )
                .await;
            expect_game(reply);
        }

        let fetched = expect_game(server.handle_message(&mut alice, ClientMessage::Fetch { game }).await);
        assert_eq!(fetched.record.status, GameStatus::Ended);

        assert_eq!(balance(&server, &mut alice).await, 1_094);
        assert_eq!(balance(&server, &mut bob).await, 900);
    }

    #[tokio::test]
    async fn test_rejections_map_to_codes() {
        let server = test_server();
        let mut alice = login(&server, "alice").await;

        let created = expect_game(
            server
                .handle_message(
                    &mut alice,
                    ClientMessage::Create(CreateRequest {
                        wager: 10,
                        commitment: commit(Move::Paper, b"s"),
                    }),
                )
                .await,
        );

        let reply = server
            .handle_message(
                &mut alice,
                ClientMessage::Join(JoinRequest {
                    game: created.address,
                    commitment: commit(Move::Rock, b"t"),
                }),
            )
            .await;
        assert_eq!(expect_error(reply), ErrorCode::SelfJoin);

        let reply = server
            .handle_message(
                &mut alice,
                ClientMessage::Reveal(RevealRequest {
                    game: created.address,
                    move_value: 1,
                    secret: "zz".into(),
                }),
            )
            .await;
        assert_eq!(expect_error(reply), ErrorCode::InvalidInput);

        let reply = server
            .handle_message(
                &mut alice,
                ClientMessage::Create(CreateRequest {
                    wager: 5_000,
                    commitment: commit(Move::Paper, b"s"),
                }),
            )
            .await;
        assert_eq!(expect_error(reply), ErrorCode::InsufficientFunds);
    }

    #[tokio::test]
    async fn test_other_party_notified() {
        let server = test_server();
        let mut alice = login(&server, "alice").await;
        let mut bob = login(&server, "bob").await;

        let (tx, mut rx) = mpsc::channel(8);
        server.clients.write().await.insert(
            alice.id,
            ConnectedClient {
                addr: "127.0.0.1:9000".parse().unwrap(),
                identity: alice.identity,
                connected_at: Instant::now(),
                sender: tx,
            },
        );

        let created = expect_game(
            server
                .handle_message(
                    &mut alice,
                    ClientMessage::Create(CreateRequest {
                        wager: 10,
                        commitment: commit(Move::Paper, b"s"),
                    }),
                )
                .await,
        );
        assert!(rx.try_recv().is_err(), "originator is not echoed");

        server
            .handle_message(
                &mut bob,
                ClientMessage::Join(JoinRequest {
                    game: created.address,
                    commitment: commit(Move::Rock, b"t"),
                }),
            )
            .await;

        match rx.try_recv() {
            Ok(ServerMessage::Game(update)) => {
                assert_eq!(update.address, created.address);
                assert_eq!(update.record.status, GameStatus::Committed);
            }
            other => panic!("expected pushed update, got {:?}", other),
        }
    }
}
