//! SSH transport
//!
//! Opens a fresh authenticated session per call, runs one command on a
//! single channel and collects its output. The libssh2 calls are blocking,
//! so the whole exchange runs on the blocking pool while the async caller
//! waits. The read loop polls in non-blocking mode so it can notice the
//! deadline and caller cancellation between reads. A command's stdin
//! payload is written in the same loop and followed by EOF; commands
//! without one see EOF straight away, so an unexpected prompt fails fast.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use ssh2::{ErrorCode, Session};
use tracing::{debug, instrument, trace, warn};

use super::{CommandSpec, ExecutionResult, RemoteTarget, Transport, TransportError};

/// libssh2's LIBSSH2_ERROR_TIMEOUT
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;

/// libssh2's LIBSSH2_ERROR_EAGAIN
const LIBSSH2_ERROR_EAGAIN: i32 = -37;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Environment variable carrying the swap hint to the remote side
pub const SWAP_HINT_ENV: &str = "REMOTE_ACTIONS_SWAP";

#[derive(Debug, Clone)]
pub struct SshConfig {
    pub connect_timeout: Duration,
    /// Used when a command does not carry its own timeout
    pub command_timeout: Duration,
    /// Forward `skip_swap` to the host as an environment variable
    pub swap_hint: bool,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(60),
            swap_hint: false,
        }
    }
}

/// libssh2-backed transport, one session per command
#[derive(Debug, Clone, Default)]
pub struct SshTransport {
    config: SshConfig,
}

impl SshTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SshConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SshConfig {
        &self.config
    }
}

/// Raises the flag when the awaiting future goes away
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for SshTransport {
    #[instrument(skip(self, target, spec), fields(target = %target.display_name(), command = %spec.summary))]
    async fn execute(
        &self,
        target: &RemoteTarget,
        spec: &CommandSpec,
    ) -> Result<ExecutionResult, TransportError> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let _guard = CancelOnDrop(Arc::clone(&cancelled));

        let config = self.config.clone();
        let target = target.clone();
        let spec = spec.clone();

        let handle = tokio::task::spawn_blocking(move || {
            exec_blocking(&config, &target, &spec, &cancelled)
        });

        match handle.await {
            Ok(result) => result,
            Err(e) => Err(TransportError::Connection(format!(
                "ssh worker terminated: {}",
                e
            ))),
        }
    }
}

fn exec_blocking(
    config: &SshConfig,
    target: &RemoteTarget,
    spec: &CommandSpec,
    cancelled: &AtomicBool,
) -> Result<ExecutionResult, TransportError> {
    let budget = spec.options.timeout.unwrap_or(config.command_timeout);
    let started = Instant::now();

    let session = connect_session(config, target, budget)?;

    let mut channel = session.channel_session().map_err(|e| map_ssh_error(e, started))?;

    if config.swap_hint {
        let value = if spec.options.skip_swap { "0" } else { "1" };
        if let Err(e) = channel.setenv(SWAP_HINT_ENV, value) {
            // Hosts without a matching AcceptEnv refuse this; the hint is then a no-op
            debug!("swap hint not accepted by {}: {}", target.host, e);
        }
    }

    trace!(command = %spec.text, "exec");
    channel
        .exec(&spec.text)
        .map_err(|e| map_ssh_error(e, started))?;

    let stdin = spec.stdin.as_deref().unwrap_or_default().as_bytes();
    let mut stdin_offset = 0;
    let mut stdin_open = true;
    if stdin.is_empty() {
        if let Err(e) = channel.send_eof() {
            debug!("could not close stdin on {}: {}", target.host, e);
        }
        stdin_open = false;
    }
    session.set_blocking(false);

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut err_stream = channel.stderr();
    let mut buf = [0u8; 8192];

    loop {
        let mut progressed = false;

        if stdin_open {
            match channel.write(&stdin[stdin_offset..]) {
                Ok(n) => {
                    stdin_offset += n;
                    progressed |= n > 0;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) => {
                    // The remote side stopped reading; its exit status tells the rest
                    debug!("stdin write to {} failed: {}", target.host, e);
                    stdin_offset = stdin.len();
                }
            }
            if stdin_offset >= stdin.len() {
                match channel.send_eof() {
                    Ok(()) => stdin_open = false,
                    Err(e) if matches!(e.code(), ErrorCode::Session(LIBSSH2_ERROR_EAGAIN)) => {}
                    Err(e) => {
                        debug!("could not close stdin on {}: {}", target.host, e);
                        stdin_open = false;
                    }
                }
            }
        }

        match channel.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                stdout.extend_from_slice(&buf[..n]);
                progressed = true;
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => {
                return Err(TransportError::Connection(format!(
                    "reading stdout failed: {}",
                    e
                )))
            }
        }

        match err_stream.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                stderr.extend_from_slice(&buf[..n]);
                progressed = true;
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => {
                return Err(TransportError::Connection(format!(
                    "reading stderr failed: {}",
                    e
                )))
            }
        }

        if channel.eof() {
            break;
        }

        if cancelled.load(Ordering::SeqCst) {
            warn!("cancelling remote command on {}", target.host);
            session.set_blocking(true);
            let _ = channel.close();
            return Err(TransportError::Cancelled);
        }

        if started.elapsed() > budget {
            warn!(
                "remote command on {} exceeded {:?}, closing channel",
                target.host, budget
            );
            session.set_blocking(true);
            let _ = channel.close();
            return Err(TransportError::Timeout {
                elapsed: started.elapsed(),
            });
        }

        if !progressed {
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    session.set_blocking(true);
    // Anything still buffered after EOF
    let _ = channel.read_to_end(&mut stdout);
    let _ = err_stream.read_to_end(&mut stderr);
    let _ = channel.wait_close();
    let status = channel.exit_status().unwrap_or(-1);
    let signal = channel.exit_signal().ok().and_then(|s| s.exit_signal);
    let (exit_code, signal_note) = resolve_exit(status, signal.as_deref());

    debug!(
        "remote command on {} exited with {} after {:?}",
        target.host,
        exit_code,
        started.elapsed()
    );

    let mut stderr = String::from_utf8_lossy(&stderr).into_owned();
    if let Some(note) = signal_note {
        warn!("remote command on {}: {}", target.host, note);
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        stderr.push_str(&note);
    }

    Ok(ExecutionResult {
        exit_code,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr,
    })
}

/// Exit code for a finished channel, plus a note when a signal killed it
///
/// libssh2 reports status 0 when no exit-status message arrived, which is
/// the case for signal deaths. Those map to `128 + signo` like a shell
/// does, or -1 for signals without a known number.
fn resolve_exit(status: i32, signal: Option<&str>) -> (i32, Option<String>) {
    let Some(name) = signal.map(str::trim).filter(|s| !s.is_empty()) else {
        return (status, None);
    };
    let name = name.strip_prefix("SIG").unwrap_or(name);
    let code = signal_number(name).map_or(-1, |n| 128 + n);
    (code, Some(format!("remote process killed by signal SIG{}", name)))
}

fn signal_number(name: &str) -> Option<i32> {
    let number = match name {
        "HUP" => 1,
        "INT" => 2,
        "QUIT" => 3,
        "ILL" => 4,
        "ABRT" => 6,
        "FPE" => 8,
        "KILL" => 9,
        "USR1" => 10,
        "SEGV" => 11,
        "USR2" => 12,
        "PIPE" => 13,
        "ALRM" => 14,
        "TERM" => 15,
        _ => return None,
    };
    Some(number)
}

fn connect_session(
    config: &SshConfig,
    target: &RemoteTarget,
    budget: Duration,
) -> Result<Session, TransportError> {
    let started = Instant::now();
    let tcp = connect_tcp(&target.host, target.port, config.connect_timeout)?;

    let mut session = Session::new()
        .map_err(|e| TransportError::Connection(format!("cannot create ssh session: {}", e)))?;
    session.set_tcp_stream(tcp);
    // Bounds every blocking libssh2 call, including handshake and auth
    session.set_timeout(clamp_millis(budget.max(config.connect_timeout)));
    session
        .handshake()
        .map_err(|e| map_ssh_error(e, started))?;

    if let Some(expected) = target.host_key_sha256.as_deref() {
        let observed = host_key_sha256(&session).unwrap_or_else(|| "unknown".to_string());
        if normalize_fingerprint(expected) != observed {
            return Err(TransportError::HostKeyMismatch {
                expected: expected.to_string(),
                observed,
            });
        }
    }

    session
        .userauth_pubkey_memory(
            &target.username,
            None,
            &target.auth_key,
            target.passphrase.as_deref(),
        )
        .map_err(|e| match e.code() {
            ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT) => TransportError::Timeout {
                elapsed: started.elapsed(),
            },
            _ => TransportError::Authentication(format!("{} for {}", e.message(), target.username)),
        })?;

    if !session.authenticated() {
        return Err(TransportError::Authentication(format!(
            "server rejected key for {}",
            target.username
        )));
    }

    Ok(session)
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, TransportError> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| TransportError::Connection(format!("cannot resolve {}: {}", host, e)))?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }

    Err(TransportError::Connection(match last_error {
        Some(e) => format!("{}:{}: {}", host, port, e),
        None => format!("{}:{}: no addresses", host, port),
    }))
}

fn host_key_sha256(session: &Session) -> Option<String> {
    session
        .host_key()
        .map(|(key, _)| hex::encode(Sha256::digest(key)))
}

/// Accepts `AB:CD:..`, `abcd..` and `SHA256:`-prefixed forms
fn normalize_fingerprint(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("SHA256:")
        .or_else(|| trimmed.strip_prefix("sha256:"))
        .unwrap_or(trimmed);
    trimmed.replace(':', "").to_ascii_lowercase()
}

fn map_ssh_error(err: ssh2::Error, started: Instant) -> TransportError {
    match err.code() {
        ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT) => TransportError::Timeout {
            elapsed: started.elapsed(),
        },
        _ => TransportError::Connection(err.message().to_string()),
    }
}

fn clamp_millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_fingerprint() {
        assert_eq!(normalize_fingerprint("AB:cd:01"), "abcd01");
        assert_eq!(normalize_fingerprint("SHA256:ABCD"), "abcd");
        assert_eq!(normalize_fingerprint("  abcd  "), "abcd");
    }

    #[test]
    fn test_timeout_error_code_maps_to_timeout() {
        let err = ssh2::Error::new(ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT), "timed out");
        let mapped = map_ssh_error(err, Instant::now());
        assert!(matches!(mapped, TransportError::Timeout { .. }));
    }

    #[test]
    fn test_other_error_code_maps_to_connection() {
        let err = ssh2::Error::new(ErrorCode::Session(-13), "socket disconnect");
        let mapped = map_ssh_error(err, Instant::now());
        assert!(matches!(mapped, TransportError::Connection(_)));
    }

    #[test]
    fn test_exit_status_without_signal_is_kept() {
        assert_eq!(resolve_exit(0, None), (0, None));
        assert_eq!(resolve_exit(3, None), (3, None));
        assert_eq!(resolve_exit(0, Some("")), (0, None));
    }

    #[test]
    fn test_killed_process_is_not_success() {
        let (code, note) = resolve_exit(0, Some("KILL"));
        assert_eq!(code, 137);
        assert_eq!(note.as_deref(), Some("remote process killed by signal SIGKILL"));

        assert_eq!(resolve_exit(0, Some("SIGTERM")).0, 143);
        assert_eq!(resolve_exit(0, Some("XCPU")).0, -1);
    }

    #[test]
    fn test_clamp_millis() {
        assert_eq!(clamp_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(clamp_millis(Duration::from_secs(u64::MAX / 1000)), u32::MAX);
    }

    #[tokio::test]
    async fn test_unreachable_target_is_connection_error() {
        let transport = SshTransport::with_config(SshConfig {
            connect_timeout: Duration::from_millis(500),
            ..SshConfig::default()
        });
        // Port 1 is closed on any sane test host
        let target = RemoteTarget::new("127.0.0.1", "nobody", "key").with_port(1);
        let spec = CommandSpec::new("true", "noop");

        let result = transport.execute(&target, &spec).await;
        assert!(matches!(result, Err(TransportError::Connection(_))));
    }
}
