//! Session lifecycle core
//!
//! One event-loop task owns all negotiation state (candidate set, server
//! handle, view state). Shell transitions and channel results enter through a
//! command queue; nothing touches the state from another task. Channel RPCs
//! run as spawned tasks whose results re-enter the loop as commands, so the
//! loop never blocks on the bus and results are never handled inside a
//! completion callback.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::power::SuspendInhibitor;
use crate::server::ContentServer;
use crate::tubes::{
    accept_tube, offer_tube, watch, PeerAddr, TubeChannel, TubeDiscovery, TubeId, TubeInfo,
};
use crate::view::{ViewCoordinator, ViewState};

use super::config::{SessionConfig, SessionRole};
use super::error::SessionError;
use super::events::ActivityEvent;

/// Deferred work processed by the session loop.
#[derive(Debug)]
enum Command {
    /// The shell reports the activity was joined.
    Joined,
    /// The shell reports the activity became shared.
    Shared,
    /// A tube was announced on the channel.
    TubeAnnounced(TubeInfo),
    /// Try to connect to the next unused candidate.
    ConnectNext,
    /// A spawned acceptance finished.
    Accepted(TubeId, Result<PeerAddr, SessionError>),
    /// Tear the session down.
    Close,
}

/// A collaboration session over a tube channel.
///
/// This is the main entry point: the sharer serves its documents and offers
/// a tube once shared; the joiner discovers a tube, accepts it, and emits the
/// resolved URL for the viewer.
pub struct Session {
    cmd_tx: mpsc::UnboundedSender<Command>,
    event_rx: Arc<RwLock<Option<mpsc::Receiver<ActivityEvent>>>>,
    running: Arc<RwLock<bool>>,
    task: Mutex<Option<JoinHandle<()>>>,
    role: SessionRole,
}

impl Session {
    /// Start a session in the role fixed by `config`.
    ///
    /// The sharer path launches the content server, inhibits suspend and
    /// loads its own URL; the joiner path waits for the joined transition
    /// (or proceeds immediately when `config.already_joined`).
    pub async fn start<C: TubeChannel>(
        config: SessionConfig,
        channel: C,
    ) -> Result<Self, SessionError> {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity);

        let role = config.role;
        let mut view = ViewCoordinator::new(event_tx.clone());
        let mut inhibitor = SuspendInhibitor::new(config.powerd_dir.clone());
        let mut server = None;

        match role {
            SessionRole::Sharer => {
                server = Some(ContentServer::start(
                    &config.server_program,
                    &config.content_root,
                    &config.state_dir,
                    config.port,
                )?);
                inhibitor.inhibit();
                view.connect_local(config.port).await;
            }
            SessionRole::Joiner => {
                view.await_peer();
            }
        }

        if role == SessionRole::Joiner && config.already_joined {
            // No joined transition will arrive; proceed on the first turn.
            let _ = cmd_tx.send(Command::Joined);
        }

        let running = Arc::new(RwLock::new(true));
        let mut session_loop = SessionLoop {
            config,
            channel: Arc::new(channel),
            cmd_tx: cmd_tx.clone(),
            event_tx,
            discovery: TubeDiscovery::new(),
            view,
            server,
            inhibitor,
            offered: None,
            watching: false,
            connecting: false,
        };

        let loop_running = running.clone();
        let task = tokio::spawn(async move {
            session_loop.run(cmd_rx).await;
            *loop_running.write().await = false;
        });

        info!(role = ?role, "session started");
        Ok(Self {
            cmd_tx,
            event_rx: Arc::new(RwLock::new(Some(event_rx))),
            running,
            task: Mutex::new(Some(task)),
            role,
        })
    }

    /// Role this session was created with.
    pub fn role(&self) -> SessionRole {
        self.role
    }

    /// Shell transition: the activity was joined.
    pub fn joined(&self) -> Result<(), SessionError> {
        self.send(Command::Joined)
    }

    /// Shell transition: the activity became shared.
    pub fn shared(&self) -> Result<(), SessionError> {
        self.send(Command::Shared)
    }

    /// Take the app-layer event receiver. Returns `None` after the first
    /// call.
    pub async fn events(&self) -> Option<mpsc::Receiver<ActivityEvent>> {
        self.event_rx.write().await.take()
    }

    /// Whether the event loop is still alive.
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Close the session: the server process is terminated first, then the
    /// suspend marker is released. Idempotent.
    pub async fn close(&self) {
        let _ = self.send(Command::Close);
        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }
    }

    fn send(&self, cmd: Command) -> Result<(), SessionError> {
        self.cmd_tx.send(cmd).map_err(|_| SessionError::NotRunning)
    }
}

/// Loop-owned state. Only `run` and its handlers touch these fields.
struct SessionLoop<C: TubeChannel> {
    config: SessionConfig,
    channel: Arc<C>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    event_tx: mpsc::Sender<ActivityEvent>,
    discovery: TubeDiscovery,
    view: ViewCoordinator,
    server: Option<ContentServer>,
    inhibitor: SuspendInhibitor,
    offered: Option<TubeId>,
    watching: bool,
    /// An acceptance is in flight; at most one runs at a time.
    connecting: bool,
}

impl<C: TubeChannel> SessionLoop<C> {
    async fn run(&mut self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                Command::Joined => self.handle_joined().await,
                Command::Shared => self.handle_shared().await,
                Command::TubeAnnounced(info) => self.handle_announced(info),
                Command::ConnectNext => self.handle_connect_next(),
                Command::Accepted(id, result) => {
                    if self.handle_accepted(id, result).await.is_err() {
                        break;
                    }
                }
                Command::Close => break,
            }
        }
        self.shutdown().await;
    }

    /// Joiner: start watching for content tubes.
    async fn handle_joined(&mut self) {
        if self.config.role != SessionRole::Joiner || self.watching {
            return;
        }
        self.watching = true;
        info!("activity joined, watching for content tubes");

        // Announcements re-enter through the command queue; the channel's
        // callback path never touches loop state.
        let (announce_tx, mut announce_rx) = mpsc::channel(32);
        let cmd_tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            while let Some(info) = announce_rx.recv().await {
                if cmd_tx.send(Command::TubeAnnounced(info)).is_err() {
                    break;
                }
            }
        });

        watch(self.channel.as_ref(), announce_tx).await;
        let _ = self.cmd_tx.send(Command::ConnectNext);
    }

    /// Sharer: publish the content tube, once.
    async fn handle_shared(&mut self) {
        if self.config.role != SessionRole::Sharer || self.offered.is_some() {
            return;
        }
        match offer_tube(self.channel.as_ref(), self.config.port).await {
            Ok(id) => {
                self.offered = Some(id);
                let _ = self.event_tx.send(ActivityEvent::TubeOffered(id)).await;
            }
            Err(e) => warn!(error = %e, "failed to offer content tube"),
        }
    }

    fn handle_announced(&mut self, info: TubeInfo) {
        if self.discovery.observe(&info) {
            // Candidate available; connect on a later turn.
            let _ = self.cmd_tx.send(Command::ConnectNext);
        }
    }

    fn handle_connect_next(&mut self) {
        if self.view.state() != ViewState::AwaitingPeer || self.connecting {
            // Already connected, closing, or mid-acceptance; the pending
            // attempt expires here.
            return;
        }
        if let Err(e) = self.start_accept() {
            debug!(reason = %e, "no connection attempt");
        }
    }

    /// Hand one candidate to the connector, off the loop.
    fn start_accept(&mut self) -> Result<(), SessionError> {
        let id = self
            .discovery
            .take_candidate()
            .ok_or(SessionError::NoCandidate)?;
        self.connecting = true;
        let channel = self.channel.clone();
        let cmd_tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            let result = accept_tube(channel.as_ref(), id).await;
            let _ = cmd_tx.send(Command::Accepted(id, result));
        });
        Ok(())
    }

    /// A fatal error return stops the loop.
    async fn handle_accepted(
        &mut self,
        id: TubeId,
        result: Result<PeerAddr, SessionError>,
    ) -> Result<(), SessionError> {
        self.connecting = false;
        if self.view.state() != ViewState::AwaitingPeer {
            debug!(tube = id, "acceptance resolved after connection, ignoring");
            return Ok(());
        }
        match result {
            Ok(addr) => {
                self.view.connect_peer(&addr).await;
                Ok(())
            }
            Err(e @ SessionError::InvalidAddress(_)) => {
                error!(tube = id, error = %e, "tube advertised a malformed address");
                Err(e)
            }
            Err(e) => {
                warn!(tube = id, error = %e, "tube connection failed, trying next candidate");
                let _ = self.cmd_tx.send(Command::ConnectNext);
                Ok(())
            }
        }
    }

    /// Server first, marker second.
    async fn shutdown(&mut self) {
        if let Some(server) = self.server.as_mut() {
            server.stop();
        }
        self.inhibitor.allow();
        self.view.close().await;
        info!("session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::Duration;

    use tokio::time::{sleep, timeout};

    use crate::testing::{stream_tube, ScriptedChannel};
    use crate::tubes::{ChannelError, LoopbackChannel, JOURNAL_STREAM_SERVICE};

    fn free_port() -> u16 {
        let listener = TcpListener::bind(("0.0.0.0", 0)).unwrap();
        listener.local_addr().unwrap().port()
    }

    async fn next_event(rx: &mut mpsc::Receiver<ActivityEvent>) -> ActivityEvent {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    async fn expect_no_event(rx: &mut mpsc::Receiver<ActivityEvent>) {
        let result = timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(result.is_err(), "unexpected event: {:?}", result);
    }

    async fn wait_for_subscription(channel: &ScriptedChannel) {
        for _ in 0..100 {
            if channel.subscriber_count().await > 0 {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("session never subscribed to announcements");
    }

    async fn wait_until_stopped(session: &Session) {
        for _ in 0..100 {
            if !session.is_running().await {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("session still running");
    }

    #[tokio::test]
    async fn test_sharer_loads_local_url() {
        let mut config = SessionConfig::for_testing(SessionRole::Sharer);
        config.port = free_port();
        let local_url = config.local_url();

        let session = Session::start(config, ScriptedChannel::new()).await.unwrap();
        let mut events = session.events().await.unwrap();

        assert_eq!(next_event(&mut events).await, ActivityEvent::LoadUrl(local_url));
        session.close().await;
        assert_eq!(next_event(&mut events).await, ActivityEvent::Closed);
    }

    #[tokio::test]
    async fn test_sharer_offers_tube_when_shared() {
        let channel = ScriptedChannel::new();
        let mut config = SessionConfig::for_testing(SessionRole::Sharer);
        config.port = free_port();
        let port = config.port;

        let session = Session::start(config, channel.clone()).await.unwrap();
        let mut events = session.events().await.unwrap();
        assert!(matches!(
            next_event(&mut events).await,
            ActivityEvent::LoadUrl(_)
        ));

        session.shared().unwrap();
        let offered = next_event(&mut events).await;
        assert!(matches!(offered, ActivityEvent::TubeOffered(_)));

        let offers = channel.offers().await;
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].service, JOURNAL_STREAM_SERVICE);
        assert_eq!(offers[0].host, "127.0.0.1");
        assert_eq!(offers[0].port, port);

        // The shared transition fires once; a repeat does not re-offer.
        session.shared().unwrap();
        session.close().await;
        assert_eq!(channel.offers().await.len(), 1);
    }

    #[tokio::test]
    async fn test_joiner_connects_from_announcement() {
        let channel = ScriptedChannel::new();
        channel
            .script_accept(Ok(("10.0.0.5".to_string(), 3400)))
            .await;

        let mut config = SessionConfig::for_testing(SessionRole::Joiner);
        config.already_joined = true;

        let session = Session::start(config, channel.clone()).await.unwrap();
        let mut events = session.events().await.unwrap();
        wait_for_subscription(&channel).await;

        channel
            .announce(stream_tube(7, JOURNAL_STREAM_SERVICE))
            .await;

        assert_eq!(
            next_event(&mut events).await,
            ActivityEvent::LoadUrl("http://10.0.0.5:3400/web/index.html".to_string())
        );

        let accepts = channel.accepts().await;
        assert_eq!(accepts.len(), 1);
        assert_eq!(accepts[0].id, 7);
        session.close().await;
    }

    #[tokio::test]
    async fn test_joiner_waits_for_joined_transition() {
        let channel = ScriptedChannel::new();
        channel
            .script_list(Ok(vec![stream_tube(3, JOURNAL_STREAM_SERVICE)]))
            .await;
        channel
            .script_accept(Ok(("10.0.0.9".to_string(), 8080)))
            .await;

        let config = SessionConfig::for_testing(SessionRole::Joiner);
        let session = Session::start(config, channel.clone()).await.unwrap();
        let mut events = session.events().await.unwrap();

        // Not joined yet; nothing may happen.
        expect_no_event(&mut events).await;
        assert!(channel.accepts().await.is_empty());

        session.joined().unwrap();
        assert_eq!(
            next_event(&mut events).await,
            ActivityEvent::LoadUrl("http://10.0.0.9:8080/web/index.html".to_string())
        );
        session.close().await;
    }

    #[tokio::test]
    async fn test_foreign_service_is_never_consumed() {
        let channel = ScriptedChannel::new();
        let mut config = SessionConfig::for_testing(SessionRole::Joiner);
        config.already_joined = true;

        let session = Session::start(config, channel.clone()).await.unwrap();
        let mut events = session.events().await.unwrap();
        wait_for_subscription(&channel).await;

        channel.announce(stream_tube(9, "file-transfer")).await;

        expect_no_event(&mut events).await;
        assert!(channel.accepts().await.is_empty());
        session.close().await;
    }

    #[tokio::test]
    async fn test_malformed_address_stops_session() {
        let channel = ScriptedChannel::new();
        channel
            .script_accept(Ok(("10.0.0.5".to_string(), 70000)))
            .await;

        let mut config = SessionConfig::for_testing(SessionRole::Joiner);
        config.already_joined = true;

        let session = Session::start(config, channel.clone()).await.unwrap();
        let mut events = session.events().await.unwrap();
        wait_for_subscription(&channel).await;

        channel
            .announce(stream_tube(7, JOURNAL_STREAM_SERVICE))
            .await;

        // No URL is loaded; the session tears down instead.
        assert_eq!(next_event(&mut events).await, ActivityEvent::Closed);
        wait_until_stopped(&session).await;
    }

    #[tokio::test]
    async fn test_enumeration_failure_degrades_to_live_announcements() {
        let channel = ScriptedChannel::new();
        channel
            .script_list(Err(ChannelError::Rpc("bus timeout".to_string())))
            .await;
        channel
            .script_accept(Ok(("10.0.0.5".to_string(), 3400)))
            .await;

        let mut config = SessionConfig::for_testing(SessionRole::Joiner);
        config.already_joined = true;

        let session = Session::start(config, channel.clone()).await.unwrap();
        let mut events = session.events().await.unwrap();
        wait_for_subscription(&channel).await;

        channel
            .announce(stream_tube(4, JOURNAL_STREAM_SERVICE))
            .await;

        assert_eq!(
            next_event(&mut events).await,
            ActivityEvent::LoadUrl("http://10.0.0.5:3400/web/index.html".to_string())
        );
        session.close().await;
    }

    #[tokio::test]
    async fn test_rpc_failure_tries_next_candidate() {
        let channel = ScriptedChannel::new();
        channel
            .script_list(Ok(vec![
                stream_tube(2, JOURNAL_STREAM_SERVICE),
                stream_tube(5, JOURNAL_STREAM_SERVICE),
            ]))
            .await;
        channel
            .script_accept(Err(ChannelError::Rpc("tube vanished".to_string())))
            .await;
        channel
            .script_accept(Ok(("10.0.0.5".to_string(), 3400)))
            .await;

        let mut config = SessionConfig::for_testing(SessionRole::Joiner);
        config.already_joined = true;

        let session = Session::start(config, channel.clone()).await.unwrap();
        let mut events = session.events().await.unwrap();

        assert_eq!(
            next_event(&mut events).await,
            ActivityEvent::LoadUrl("http://10.0.0.5:3400/web/index.html".to_string())
        );

        let accepts = channel.accepts().await;
        assert_eq!(accepts.len(), 2);
        assert_eq!(accepts[0].id, 2);
        assert_eq!(accepts[1].id, 5);
        session.close().await;
    }

    #[tokio::test]
    async fn test_loopback_end_to_end() {
        let (sharer_end, joiner_end) = LoopbackChannel::pair();

        let mut sharer_config = SessionConfig::for_testing(SessionRole::Sharer);
        sharer_config.port = free_port();
        let port = sharer_config.port;

        let sharer = Session::start(sharer_config, sharer_end).await.unwrap();
        let mut sharer_events = sharer.events().await.unwrap();
        assert!(matches!(
            next_event(&mut sharer_events).await,
            ActivityEvent::LoadUrl(_)
        ));
        sharer.shared().unwrap();
        assert!(matches!(
            next_event(&mut sharer_events).await,
            ActivityEvent::TubeOffered(_)
        ));

        let mut joiner_config = SessionConfig::for_testing(SessionRole::Joiner);
        joiner_config.already_joined = true;
        let joiner = Session::start(joiner_config, joiner_end).await.unwrap();
        let mut joiner_events = joiner.events().await.unwrap();

        assert_eq!(
            next_event(&mut joiner_events).await,
            ActivityEvent::LoadUrl(format!("http://127.0.0.1:{}/web/index.html", port))
        );

        joiner.close().await;
        sharer.close().await;
    }
}
