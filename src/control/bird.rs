//! Unix-socket client for the BIRD control channel.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;

use super::reply::{
    Reply, ReplyLine, CODE_ALREADY_DISABLED, CODE_ALREADY_ENABLED, CODE_DISABLED, CODE_ENABLED,
    CODE_WELCOME,
};
use crate::error::{Result, SyncError};

/// Label carried by [`SyncError::Timeout`] when the daemon stops answering.
pub const CONTROL_OPERATION: &str = "control call";

/// Upper bound on lines in one reply; guards against a runaway peer.
const MAX_REPLY_LINES: usize = 256;

/// The two administrative verbs issued to the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlVerb {
    Enable,
    Disable,
}

impl ControlVerb {
    /// Command keyword on the wire.
    pub fn keyword(self) -> &'static str {
        match self {
            ControlVerb::Enable  => "enable",
            ControlVerb::Disable => "disable",
        }
    }

    /// Reply codes meaning the protocol is now in the requested state.
    fn success_codes(self) -> [u16; 2] {
        match self {
            ControlVerb::Enable  => [CODE_ENABLED, CODE_ALREADY_ENABLED],
            ControlVerb::Disable => [CODE_DISABLED, CODE_ALREADY_DISABLED],
        }
    }
}

impl std::fmt::Display for ControlVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Anything that can switch a routing protocol on or off.
///
/// [`BirdClient`] is the production implementation.
pub trait RoutingControl {
    /// Apply `verb` to `protocol`. Returns once the daemon has confirmed the
    /// requested state, or with an error; never hangs past the implementation's
    /// deadline.
    fn apply(&self, verb: ControlVerb, protocol: &str)
        -> impl Future<Output = Result<()>> + Send;
}

/// Reject names that could smuggle extra tokens or commands onto the wire.
pub fn validate_protocol_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| !c.is_whitespace() && !c.is_control() && c != '"' && c != ';');
    if ok {
        Ok(())
    } else {
        Err(SyncError::InvalidProtocolName(name.to_string()))
    }
}

async fn bounded<T>(after: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| SyncError::Timeout {
            operation: CONTROL_OPERATION,
            after,
        })?
}

/// Connection factory for the daemon's control socket.
///
/// Holds no connection itself; every [`connect`](Self::connect) opens a
/// fresh session so a broken socket never outlives the call that hit it.
#[derive(Debug, Clone)]
pub struct BirdClient {
    path: PathBuf,
    timeout: Duration,
}

impl BirdClient {
    /// `timeout` bounds each step of a session: connect, greeting, and each
    /// command round trip.
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }

    /// Open a session and consume the daemon's greeting.
    ///
    /// # Errors
    /// - [`SyncError::Connect`] when the socket cannot be reached.
    /// - [`SyncError::Timeout`] when connect or greeting exceeds the deadline.
    /// - [`SyncError::Protocol`] when the greeting is not a welcome line.
    pub async fn connect(&self) -> Result<BirdSession> {
        let stream = bounded(self.timeout, async {
            UnixStream::connect(&self.path)
                .await
                .map_err(|source| SyncError::Connect {
                    path: self.path.display().to_string(),
                    source,
                })
        })
        .await?;

        let mut session = BirdSession {
            stream: BufReader::new(stream),
            timeout: self.timeout,
        };
        let greeting = bounded(self.timeout, session.read_reply()).await?;
        if !greeting.has_code(CODE_WELCOME) {
            return Err(SyncError::Protocol(format!(
                "expected welcome, got: {}",
                greeting.message()
            )));
        }
        debug!(path = %self.path.display(), greeting = %greeting.message(), "control session open");
        Ok(session)
    }
}

impl RoutingControl for BirdClient {
    /// The whole call, connect included, shares one deadline.
    async fn apply(&self, verb: ControlVerb, protocol: &str) -> Result<()> {
        bounded(self.timeout, async {
            let mut session = self.connect().await?;
            session.run(verb, protocol).await.map(|_| ())
        })
        .await
    }
}

/// One open conversation with the daemon.
#[derive(Debug)]
pub struct BirdSession {
    stream: BufReader<UnixStream>,
    timeout: Duration,
}

impl BirdSession {
    pub async fn enable(&mut self, protocol: &str) -> Result<Reply> {
        self.run(ControlVerb::Enable, protocol).await
    }

    pub async fn disable(&mut self, protocol: &str) -> Result<Reply> {
        self.run(ControlVerb::Disable, protocol).await
    }

    /// Send `verb protocol` and wait for a reply that confirms the state.
    ///
    /// The "already enabled/disabled" answers count as success since the
    /// protocol ends up where it was asked to be.
    pub async fn run(&mut self, verb: ControlVerb, protocol: &str) -> Result<Reply> {
        validate_protocol_name(protocol)?;
        let command = format!("{} {}\n", verb.keyword(), protocol);
        let timeout = self.timeout;
        let reply = bounded(timeout, async {
            self.stream.get_mut().write_all(command.as_bytes()).await?;
            self.stream.get_mut().flush().await?;
            self.read_reply().await
        })
        .await?
        .into_result(protocol)?;

        if verb.success_codes().iter().any(|&c| reply.has_code(c)) {
            debug!(verb = %verb, protocol, reply = %reply.message(), "control call confirmed");
            Ok(reply)
        } else {
            Err(SyncError::Protocol(format!(
                "{verb} {protocol} not confirmed: {}",
                reply.message()
            )))
        }
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let mut reply = Reply::default();
        let mut buf = String::new();
        loop {
            buf.clear();
            if self.stream.read_line(&mut buf).await? == 0 {
                return Err(SyncError::Protocol(
                    "control socket closed mid-reply".into(),
                ));
            }
            let raw = buf.trim_end_matches(['\n', '\r']);
            let previous = reply.lines.last().map(|l| l.code);
            let line = ReplyLine::parse(raw, previous)?;
            let last = line.last;
            reply.lines.push(line);
            if last {
                return Ok(reply);
            }
            if reply.lines.len() >= MAX_REPLY_LINES {
                return Err(SyncError::Protocol(format!(
                    "reply exceeded {MAX_REPLY_LINES} lines"
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("tailscale")]
    #[case("bgp_uplink1")]
    #[case("ospf-v3")]
    fn valid_protocol_names(#[case] name: &str) {
        assert!(validate_protocol_name(name).is_ok());
    }

    #[rstest]
    #[case::empty("")]
    #[case::space("tailscale all")]
    #[case::newline("tailscale\nshow route")]
    #[case::quote("\"tailscale\"")]
    #[case::semicolon("a;b")]
    fn invalid_protocol_names(#[case] name: &str) {
        assert!(matches!(
            validate_protocol_name(name),
            Err(SyncError::InvalidProtocolName(_))
        ));
    }

    #[test]
    fn verb_keywords() {
        assert_eq!(ControlVerb::Enable.keyword(), "enable");
        assert_eq!(ControlVerb::Disable.to_string(), "disable");
    }

    #[test]
    fn success_codes_include_already_in_state() {
        assert!(ControlVerb::Enable.success_codes().contains(&CODE_ALREADY_ENABLED));
        assert!(ControlVerb::Disable.success_codes().contains(&CODE_ALREADY_DISABLED));
        assert!(!ControlVerb::Enable.success_codes().contains(&CODE_DISABLED));
    }

    #[tokio::test]
    async fn connect_to_missing_socket_is_connect_error() {
        let dir = tempfile::tempdir().unwrap();
        let client = BirdClient::new(dir.path().join("bird.ctl"), Duration::from_secs(1));
        let err = client.apply(ControlVerb::Enable, "tailscale").await.unwrap_err();
        assert!(matches!(err, SyncError::Connect { .. }), "got {err:?}");
        assert!(err.is_control_failure());
    }
}
