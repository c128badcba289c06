// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Connection Manager
//!
//! Owns the physical link to the broker. A single lifecycle task connects with
//! exponential backoff, publishes the link, waits until the link closes and then
//! goes back to connecting. Every transition is reported on the `started`
//! channel handed to [`ConnectionManager::start`]: `true` once connected,
//! `false` when the link is lost or the retry policy gives up.
//!
//! Dependents never hold the physical link. They hold publisher and subscriber
//! handles that resolve the current link through a shared [`LinkSlot`] at call
//! time, so the handles stay valid across reconnects.

use crate::{
    channel::AmqpConnector,
    config::BridgeConfig,
    errors::AmqpError,
    publisher::AmqpPublisher,
    retry::RetryPolicy,
    subscriber::AmqpSubscriber,
};
use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};
use tokio::{
    sync::{mpsc, oneshot, watch, RwLock},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

/// Lifecycle state of the broker link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

/// A freshly opened link and the signal fired when it closes.
pub struct Established<L> {
    pub link: Arc<L>,
    /// Resolves with the closure reason. A dropped sender also counts as closed.
    pub closed: oneshot::Receiver<String>,
}

/// Opens and closes physical links.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Link: Send + Sync + 'static;

    async fn connect(&self) -> Result<Established<Self::Link>, AmqpError>;

    async fn close(&self, link: &Self::Link);
}

/// Holds whatever link is current, if any.
pub struct LinkSlot<L> {
    link: RwLock<Option<Arc<L>>>,
}

impl<L> Default for LinkSlot<L> {
    fn default() -> Self {
        LinkSlot {
            link: RwLock::new(None),
        }
    }
}

impl<L> LinkSlot<L> {
    pub async fn current(&self) -> Result<Arc<L>, AmqpError> {
        self.link.read().await.clone().ok_or(AmqpError::NotConnected)
    }

    async fn replace(&self, link: Option<Arc<L>>) -> Option<Arc<L>> {
        std::mem::replace(&mut *self.link.write().await, link)
    }
}

struct Shared<C: Connector> {
    connector: C,
    policy: RetryPolicy,
    slot: Arc<LinkSlot<C::Link>>,
    state: watch::Sender<ConnectionState>,
    shutdown: watch::Sender<bool>,
    gave_up: AtomicBool,
}

/// Owns the broker link and keeps it alive.
pub struct ConnectionManager<C: Connector = AmqpConnector> {
    shared: Arc<Shared<C>>,
    lifecycle: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager<AmqpConnector> {
    pub fn from_config(cfg: &BridgeConfig) -> Self {
        ConnectionManager::new(
            AmqpConnector::new(&cfg.rabbitmq.uri(), &cfg.app_name),
            cfg.retry.clone(),
        )
    }

    /// Publisher capability bound to whatever link is current.
    pub fn publisher(&self) -> Arc<AmqpPublisher> {
        AmqpPublisher::new(self.link_slot())
    }

    /// Subscriber capability bound to whatever link is current.
    pub fn subscriber(&self) -> Arc<AmqpSubscriber> {
        AmqpSubscriber::new(self.link_slot())
    }
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, policy: RetryPolicy) -> Self {
        if !policy.is_valid() {
            warn!(?policy, "retry policy does not grow, clamping it");
        }

        ConnectionManager {
            shared: Arc::new(Shared {
                connector,
                policy,
                slot: Arc::new(LinkSlot::default()),
                state: watch::Sender::new(ConnectionState::Disconnected),
                shutdown: watch::Sender::new(false),
                gave_up: AtomicBool::new(false),
            }),
            lifecycle: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn link_slot(&self) -> Arc<LinkSlot<C::Link>> {
        self.shared.slot.clone()
    }

    /// Whether the lifecycle task is still alive.
    pub fn is_running(&self) -> bool {
        self.lifecycle()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Whether the retry policy was exhausted. Only an explicit `start` retries
    /// after that.
    pub fn has_given_up(&self) -> bool {
        self.shared.gave_up.load(Ordering::SeqCst)
    }

    /// Spawns the lifecycle task. Must be called within a tokio runtime.
    ///
    /// Calling it while a lifecycle task is alive does nothing, so there is
    /// never more than one connect loop.
    pub fn start(&self, started: mpsc::Sender<bool>) {
        let mut lifecycle = self.lifecycle();
        if lifecycle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
        {
            warn!("connection manager already started");
            return;
        }

        self.shared.shutdown.send_replace(false);
        self.shared.gave_up.store(false, Ordering::SeqCst);
        let shared = self.shared.clone();
        *lifecycle = Some(tokio::spawn(async move { shared.run(started).await }));
    }

    /// Closes the link and stops reconnecting. No-op when already stopped.
    ///
    /// The lifecycle task is joined rather than aborted, so a connection
    /// attempt in flight completes and its link is closed here.
    pub async fn stop(&self) {
        self.shared.shutdown.send_replace(true);

        let handle = self.lifecycle().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = err.to_string(), "connection lifecycle task failed");
            }
        }

        if let Some(link) = self.shared.slot.replace(None).await {
            self.shared.state.send_replace(ConnectionState::Closing);
            self.shared.connector.close(&link).await;
            debug!("amqp handler stopped");
        }

        self.shared.state.send_replace(ConnectionState::Disconnected);
    }

    fn lifecycle(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Connector> Shared<C> {
    async fn run(&self, started: mpsc::Sender<bool>) {
        let mut shutdown = self.shutdown.subscribe();

        loop {
            let established = match self.connect_with_retry(&mut shutdown).await {
                Ok(Some(established)) => established,
                Ok(None) => return,
                Err(err) => {
                    error!(error = err.to_string(), "giving up connecting to the broker");
                    self.state.send_replace(ConnectionState::Disconnected);
                    self.gave_up.store(true, Ordering::SeqCst);
                    notify(&started, false, &mut shutdown).await;
                    return;
                }
            };

            self.slot.replace(Some(established.link)).await;
            self.state.send_replace(ConnectionState::Connected);
            info!("amqp connection established");
            notify(&started, true, &mut shutdown).await;

            tokio::select! {
                reason = established.closed => {
                    let reason = reason.unwrap_or_else(|_| "close signal dropped".to_owned());
                    info!(reason, "amqp connection closed");

                    self.slot.replace(None).await;
                    self.state.send_replace(ConnectionState::Disconnected);
                    notify(&started, false, &mut shutdown).await;
                }
                _ = stopped(&mut shutdown) => return,
            }
        }
    }

    /// Returns `Ok(None)` when shutdown is requested while connecting.
    async fn connect_with_retry(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<Option<Established<C::Link>>, AmqpError> {
        let mut backoff = self.policy.backoff();

        loop {
            if *shutdown.borrow() {
                return Ok(None);
            }

            self.state.send_replace(ConnectionState::Connecting);
            let err = match self.connector.connect().await {
                Ok(established) if *shutdown.borrow() => {
                    debug!("shutdown requested while connecting, closing the new link");
                    self.connector.close(&established.link).await;
                    return Ok(None);
                }
                Ok(established) => return Ok(Some(established)),
                Err(err) => err,
            };
            self.state.send_replace(ConnectionState::Disconnected);

            let Some(delay) = backoff.next() else {
                return Err(AmqpError::RetryExhausted);
            };

            warn!(
                error = err.to_string(),
                delay_ms = delay.as_millis() as u64,
                "failure to connect, retrying"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stopped(shutdown) => return Ok(None),
            }
        }
    }
}

/// Reports a lifecycle transition unless shutdown wins first.
async fn notify(started: &mpsc::Sender<bool>, up: bool, shutdown: &mut watch::Receiver<bool>) {
    tokio::select! {
        _ = started.send(up) => {}
        _ = stopped(shutdown) => {}
    }
}

/// Resolves once shutdown has been requested.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::atomic::AtomicUsize, time::Duration};
    use tokio::time::timeout;

    #[derive(Default)]
    struct FakeLink;

    /// Connector failing the first `failures` attempts and keeping the close
    /// trigger of every link it opens.
    #[derive(Default)]
    struct FakeConnector {
        failures: usize,
        always_fail: bool,
        connect_delay: Option<Duration>,
        attempts: AtomicUsize,
        closed_links: AtomicUsize,
        closers: Mutex<Vec<oneshot::Sender<String>>>,
    }

    impl FakeConnector {
        fn drop_link(&self, reason: &str) {
            let closer = self.closers.lock().unwrap().pop().unwrap();
            closer.send(reason.to_owned()).unwrap();
        }
    }

    #[async_trait]
    impl Connector for Arc<FakeConnector> {
        type Link = FakeLink;

        async fn connect(&self) -> Result<Established<FakeLink>, AmqpError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.connect_delay {
                tokio::time::sleep(delay).await;
            }
            if self.always_fail || attempt < self.failures {
                return Err(AmqpError::ConnectionError);
            }

            let (tx, rx) = oneshot::channel();
            self.closers.lock().unwrap().push(tx);

            Ok(Established {
                link: Arc::new(FakeLink),
                closed: rx,
            })
        }

        async fn close(&self, _link: &FakeLink) {
            self.closed_links.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            initial_interval: Duration::from_millis(1),
            multiplier: 2.0,
            max_interval: Duration::from_millis(5),
            max_elapsed: None,
        }
    }

    async fn next(rx: &mut mpsc::Receiver<bool>) -> bool {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("notification expected")
            .expect("channel open")
    }

    #[tokio::test]
    async fn should_retry_until_connected() {
        let connector = Arc::new(FakeConnector {
            failures: 3,
            ..Default::default()
        });
        let manager = ConnectionManager::new(connector.clone(), fast_policy());
        let (tx, mut rx) = mpsc::channel(4);

        manager.start(tx);

        assert!(next(&mut rx).await);
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 4);
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert!(manager.link_slot().current().await.is_ok());

        manager.stop().await;
    }

    #[tokio::test]
    async fn should_reconnect_after_closure() {
        let connector = Arc::new(FakeConnector::default());
        let manager = ConnectionManager::new(connector.clone(), fast_policy());
        let (tx, mut rx) = mpsc::channel(4);

        manager.start(tx);
        assert!(next(&mut rx).await);

        connector.drop_link("connection reset by peer");

        assert!(!next(&mut rx).await);
        assert!(next(&mut rx).await);
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(manager.state(), ConnectionState::Connected);

        manager.stop().await;
    }

    #[tokio::test]
    async fn should_keep_a_single_connect_loop() {
        let connector = Arc::new(FakeConnector::default());
        let manager = ConnectionManager::new(connector.clone(), fast_policy());
        let (tx, mut rx) = mpsc::channel(4);

        manager.start(tx.clone());
        manager.start(tx);

        assert!(next(&mut rx).await);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(rx.try_recv().is_err());
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);

        manager.stop().await;
    }

    #[tokio::test]
    async fn should_report_failure_when_policy_gives_up() {
        let connector = Arc::new(FakeConnector {
            always_fail: true,
            ..Default::default()
        });
        let policy = RetryPolicy {
            max_elapsed: Some(Duration::from_millis(10)),
            ..fast_policy()
        };
        let manager = ConnectionManager::new(connector.clone(), policy);
        let (tx, mut rx) = mpsc::channel(4);

        manager.start(tx);

        assert!(!next(&mut rx).await);
        assert!(manager.has_given_up());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!manager.is_running());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(
            manager.link_slot().current().await.err(),
            Some(AmqpError::NotConnected)
        );
    }

    #[tokio::test]
    async fn should_stop_idempotently() {
        let connector = Arc::new(FakeConnector::default());
        let manager = ConnectionManager::new(connector.clone(), fast_policy());
        let (tx, mut rx) = mpsc::channel(4);

        manager.stop().await;
        assert_eq!(connector.closed_links.load(Ordering::SeqCst), 0);

        manager.start(tx);
        assert!(next(&mut rx).await);

        manager.stop().await;
        manager.stop().await;

        assert_eq!(connector.closed_links.load(Ordering::SeqCst), 1);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.is_running());
    }

    #[tokio::test]
    async fn should_close_link_opened_while_stopping() {
        let connector = Arc::new(FakeConnector {
            connect_delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let manager = ConnectionManager::new(connector.clone(), fast_policy());
        let (tx, mut rx) = mpsc::channel(4);

        manager.start(tx);
        tokio::time::sleep(Duration::from_millis(10)).await;

        timeout(Duration::from_secs(5), manager.stop())
            .await
            .expect("stop must not hang");

        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(connector.closed_links.load(Ordering::SeqCst), 1);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.link_slot().current().await.is_err());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_stop_while_nobody_reads_notifications() {
        let connector = Arc::new(FakeConnector::default());
        let manager = ConnectionManager::new(connector.clone(), fast_policy());
        let (tx, rx) = mpsc::channel(1);

        manager.start(tx);
        tokio::time::sleep(Duration::from_millis(20)).await;
        connector.drop_link("connection reset by peer");
        tokio::time::sleep(Duration::from_millis(20)).await;

        timeout(Duration::from_secs(5), manager.stop())
            .await
            .expect("stop must not hang");

        assert!(!manager.is_running());
        drop(rx);
    }
}
