//! Flood-controlled output scheduling.
//!
//! [`OutputScheduler`] is a cheap, cloneable handle. The write half of the
//! connection lives in a single drain task ([`DrainTask`]) that owns the
//! FIFO backlog and the rate-limit window. Callers never block: queued lines
//! and urgent lines travel to the task over unbounded channels.
//!
//! ```text
//! send_now ──────► urgent ─┐
//!                          ├─► drain task ──► writer
//! send_queued ──► backlog ─┘   (window-limited)
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace, warn};

use crate::command::sanitize;
use crate::error::{ConfigError, TransportError};

/// Rate limit: at most `max_messages` lines in any rolling `per_seconds`
/// window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FloodPolicy {
    max_messages: u32,
    per_seconds: u32,
}

impl FloodPolicy {
    /// Build a policy; both values must be positive.
    pub fn new(max_messages: u32, per_seconds: u32) -> Result<Self, ConfigError> {
        if max_messages == 0 || per_seconds == 0 {
            return Err(ConfigError::InvalidFloodPolicy {
                max_messages,
                per_seconds,
            });
        }
        Ok(Self {
            max_messages,
            per_seconds,
        })
    }

    /// Messages allowed per window.
    pub fn max_messages(&self) -> u32 {
        self.max_messages
    }

    /// Window length in seconds.
    pub fn per_seconds(&self) -> u32 {
        self.per_seconds
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        Duration::from_secs(u64::from(self.per_seconds))
    }
}

impl Default for FloodPolicy {
    fn default() -> Self {
        Self {
            max_messages: 4,
            per_seconds: 2,
        }
    }
}

/// Send times of recent queued lines, oldest first.
///
/// The window rolls: a line may leave once fewer than `max_messages` lines
/// went out in the `per_seconds` before it.
#[derive(Debug, Default)]
struct FloodWindow {
    sent: VecDeque<Instant>,
}

impl FloodWindow {
    /// Earliest instant at which the next queued line may leave.
    fn next_slot(&self, policy: &FloodPolicy, now: Instant) -> Instant {
        let cap = policy.max_messages as usize;
        if self.sent.len() < cap {
            return now;
        }
        let oldest = self.sent[self.sent.len() - cap];
        now.max(oldest + policy.window())
    }

    fn record(&mut self, policy: &FloodPolicy, now: Instant) {
        self.sent.push_back(now);
        while self.sent.len() > policy.max_messages as usize {
            self.sent.pop_front();
        }
        while self
            .sent
            .front()
            .is_some_and(|&at| at + policy.window() <= now)
        {
            self.sent.pop_front();
        }
    }
}

type FailureSlot = Option<Arc<std::io::Error>>;

/// Handle for sending lines through a connection's drain task.
#[derive(Clone, Debug)]
pub struct OutputScheduler {
    urgent: mpsc::UnboundedSender<String>,
    queued: mpsc::UnboundedSender<String>,
    failure: watch::Receiver<FailureSlot>,
}

impl OutputScheduler {
    /// Start a drain task writing to `writer`.
    ///
    /// The policy is re-read from `policy` before every scheduling decision.
    pub fn spawn<W>(writer: W, policy: watch::Receiver<FloodPolicy>) -> (Self, DrainTask)
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (urgent_tx, urgent_rx) = mpsc::unbounded_channel();
        let (queued_tx, queued_rx) = mpsc::unbounded_channel();
        let (failure_tx, failure_rx) = watch::channel(None);

        let drain = Drain {
            writer,
            urgent: urgent_rx,
            queued: queued_rx,
            policy,
            failure: failure_tx,
            backlog: VecDeque::new(),
            window: FloodWindow::default(),
        };
        let handle = tokio::spawn(drain.run());

        let scheduler = Self {
            urgent: urgent_tx,
            queued: queued_tx,
            failure: failure_rx,
        };
        (scheduler, DrainTask { handle: Some(handle) })
    }

    /// Queue a line behind any backlog, subject to the flood policy.
    pub fn send_queued(&self, line: impl Into<String>) {
        if self.is_in_error_state() {
            trace!("output in error state, dropping queued line");
            return;
        }
        if self.queued.send(line.into()).is_err() {
            debug!("drain task gone, dropping queued line");
        }
    }

    /// Send a line ahead of the backlog, bypassing the flood policy.
    pub fn send_now(&self, line: impl Into<String>) {
        if self.is_in_error_state() {
            trace!("output in error state, dropping urgent line");
            return;
        }
        if self.urgent.send(line.into()).is_err() {
            debug!("drain task gone, dropping urgent line");
        }
    }

    /// Returns `true` once any write has failed.
    pub fn is_in_error_state(&self) -> bool {
        self.failure.borrow().is_some()
    }

    /// Resolves with the write error once the scheduler enters its error
    /// state. Stays pending if the drain task ends without failing.
    pub async fn failed(&self) -> TransportError {
        let mut failure = self.failure.clone();
        let result = failure
            .wait_for(Option::is_some)
            .await
            .map(|slot| slot.clone());
        match result {
            Ok(Some(err)) => TransportError::Write(err),
            _ => std::future::pending().await,
        }
    }
}

/// Owner of a connection's drain task.
///
/// Dropping it aborts the task, discarding any backlog.
#[derive(Debug)]
pub struct DrainTask {
    handle: Option<JoinHandle<()>>,
}

impl DrainTask {
    /// Abort the task immediately.
    pub fn abort(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Let the task flush urgent lines once every scheduler handle has been
    /// dropped, then abort it if it is still running after `grace`.
    pub async fn close(mut self, grace: Duration) {
        let Some(mut handle) = self.handle.take() else {
            return;
        };
        if tokio::time::timeout(grace, &mut handle).await.is_err() {
            debug!("drain task did not finish in time, aborting");
            handle.abort();
        }
    }
}

impl Drop for DrainTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

struct Drain<W> {
    writer: W,
    urgent: mpsc::UnboundedReceiver<String>,
    queued: mpsc::UnboundedReceiver<String>,
    policy: watch::Receiver<FloodPolicy>,
    failure: watch::Sender<FailureSlot>,
    backlog: VecDeque<String>,
    window: FloodWindow,
}

impl<W: AsyncWrite + Unpin> Drain<W> {
    async fn run(mut self) {
        let mut queue_open = true;

        loop {
            let next_slot = if self.backlog.is_empty() {
                None
            } else {
                Some(self.window.next_slot(&self.policy.borrow(), Instant::now()))
            };

            let line = tokio::select! {
                biased;
                line = self.urgent.recv() => match line {
                    Some(line) => line,
                    // every handle dropped: flush nothing more
                    None => break,
                },
                _ = sleep_until(next_slot.unwrap_or_else(Instant::now)), if next_slot.is_some() => {
                    let Some(line) = self.backlog.pop_front() else { continue };
                    self.window.record(&self.policy.borrow(), Instant::now());
                    line
                }
                line = self.queued.recv(), if queue_open => {
                    match line {
                        Some(line) => self.backlog.push_back(line),
                        None => queue_open = false,
                    }
                    continue;
                }
            };

            if let Err(e) = self.write_line(&line).await {
                warn!(error = %e, "write failed, output halted");
                self.failure.send_replace(Some(Arc::new(e)));
                break;
            }
        }

        if !self.backlog.is_empty() {
            debug!(dropped = self.backlog.len(), "drain task stopped with backlog");
        }
    }

    async fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        let line = sanitize(line);
        trace!(line, "->");
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_rejects_zero() {
        assert!(matches!(
            FloodPolicy::new(0, 1),
            Err(ConfigError::InvalidFloodPolicy { .. })
        ));
        assert!(matches!(
            FloodPolicy::new(3, 0),
            Err(ConfigError::InvalidFloodPolicy { .. })
        ));
        let policy = FloodPolicy::new(3, 2).unwrap();
        assert_eq!(policy.window(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_allows_cap_then_waits() {
        let policy = FloodPolicy::new(2, 1).unwrap();
        let mut window = FloodWindow::default();
        let t0 = Instant::now();

        assert_eq!(window.next_slot(&policy, t0), t0);
        window.record(&policy, t0);
        assert_eq!(window.next_slot(&policy, t0), t0);
        window.record(&policy, t0);
        assert_eq!(window.next_slot(&policy, t0), t0 + Duration::from_secs(1));

        let later = t0 + Duration::from_millis(1500);
        assert_eq!(window.next_slot(&policy, later), later);
        window.record(&policy, later);
        assert_eq!(window.sent, [later]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_rolls_from_oldest_send() {
        let policy = FloodPolicy::new(3, 1).unwrap();
        let mut window = FloodWindow::default();
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(900);

        window.record(&policy, t0);
        window.record(&policy, t1);
        window.record(&policy, t1);
        assert_eq!(window.next_slot(&policy, t1), t0 + Duration::from_secs(1));

        let t2 = t0 + Duration::from_secs(1);
        window.record(&policy, t2);
        // two sends at t1 are still inside the window ending at t2
        assert_eq!(window.next_slot(&policy, t2), t1 + Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_follows_smaller_cap() {
        let wide = FloodPolicy::new(5, 1).unwrap();
        let narrow = FloodPolicy::new(1, 10).unwrap();
        let mut window = FloodWindow::default();
        let t0 = Instant::now();

        window.record(&wide, t0);
        window.record(&wide, t0 + Duration::from_millis(100));
        assert_eq!(
            window.next_slot(&narrow, t0 + Duration::from_millis(200)),
            t0 + Duration::from_millis(10_100)
        );
    }
}
