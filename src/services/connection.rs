use crate::services::device::DeviceSession;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Where the device session should be opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoint {
    pub host: String,
    pub port: u16,
    pub working_dir: String,
}

impl fmt::Display for DeviceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ftp://{}:{}{}", self.host, self.port, self.working_dir)
    }
}

/// Reason a single connection attempt failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("device {endpoint} unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("login rejected: {reason}")]
    LoginRejected { reason: String },

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Opens one session to the device. One call is one attempt.
pub trait Connector: Send + Sync {
    fn connect(&self, endpoint: &DeviceEndpoint) -> Result<Box<dyn DeviceSession>, ConnectError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Abort,
}

/// Decides whether a failed attempt is retried.
///
/// The default retries every error kind forever with no delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: Option<u32>,
    delay: Duration,
    abort_on_login_rejected: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl RetryPolicy {
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            delay: Duration::ZERO,
            abort_on_login_rejected: false,
        }
    }

    /// Gives up after `max_attempts` attempts in total (at least one is always made)
    pub fn bounded(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
            ..Self::unbounded()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn abort_on_login_rejected(mut self, abort: bool) -> Self {
        self.abort_on_login_rejected = abort;
        self
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// `attempt` is the 1-based number of the attempt that just failed
    pub fn decide(&self, attempt: u32, error: &ConnectError) -> RetryDecision {
        if self.abort_on_login_rejected && matches!(error, ConnectError::LoginRejected { .. }) {
            return RetryDecision::Abort;
        }
        match self.max_attempts {
            Some(max) if attempt >= max => RetryDecision::Abort,
            _ => RetryDecision::Retry,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// A usable session plus the number of attempts it took
pub struct Connection {
    pub session: Box<dyn DeviceSession>,
    pub attempts: u32,
}

#[derive(Error, Debug)]
#[error("gave up connecting after {attempts} attempt(s): {last_error}")]
pub struct ConnectAborted {
    pub attempts: u32,
    pub last_error: ConnectError,
}

pub struct ConnectionManager<'a> {
    connector: &'a dyn Connector,
    policy: RetryPolicy,
    state: ConnectionState,
}

impl<'a> ConnectionManager<'a> {
    pub fn new(connector: &'a dyn Connector, policy: RetryPolicy) -> Self {
        Self {
            connector,
            policy,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Blocks until a session is established or the policy gives up
    pub fn connect(&mut self, endpoint: &DeviceEndpoint) -> Result<Connection, ConnectAborted> {
        self.transition(ConnectionState::Connecting);
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);
            info!("🔌 Attempting to connect to device on {} (attempt {})...", endpoint, attempt);

            match self.connector.connect(endpoint) {
                Ok(session) => {
                    self.transition(ConnectionState::Connected);
                    info!("✅ Connected to {} after {} attempt(s)", endpoint.host, attempt);
                    return Ok(Connection {
                        session,
                        attempts: attempt,
                    });
                }
                Err(e) => match self.policy.decide(attempt, &e) {
                    RetryDecision::Retry => {
                        warn!("Could not connect to device: {}. Retrying...", e);
                        if !self.policy.delay.is_zero() {
                            std::thread::sleep(self.policy.delay);
                        }
                    }
                    RetryDecision::Abort => {
                        self.transition(ConnectionState::Disconnected);
                        return Err(ConnectAborted {
                            attempts: attempt,
                            last_error: e,
                        });
                    }
                },
            }
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            debug!("connection state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}
