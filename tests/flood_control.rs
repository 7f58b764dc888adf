//! Integration tests for the flood-controlled output scheduler.
//!
//! Time is paused, so elapsed times are exact and the tests run instantly.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use slirc_client::{FloodPolicy, OutputScheduler, TransportError};
use tokio::io::{AsyncBufReadExt, AsyncWrite, BufReader, DuplexStream, Lines};
use tokio::sync::watch;
use tokio::time::{timeout, Instant};

fn scheduler(
    max_messages: u32,
    per_seconds: u32,
) -> (
    OutputScheduler,
    slirc_client::DrainTask,
    watch::Sender<FloodPolicy>,
    Lines<BufReader<DuplexStream>>,
) {
    let (client_side, server_side) = tokio::io::duplex(4096);
    let (policy_tx, policy_rx) = watch::channel(FloodPolicy::new(max_messages, per_seconds).unwrap());
    let (output, drain) = OutputScheduler::spawn(client_side, policy_rx);
    (output, drain, policy_tx, BufReader::new(server_side).lines())
}

async fn next_line(lines: &mut Lines<BufReader<DuplexStream>>) -> String {
    timeout(Duration::from_secs(60), lines.next_line())
        .await
        .expect("timed out waiting for a line")
        .expect("read failed")
        .expect("stream closed")
}

#[tokio::test(start_paused = true)]
async fn test_queued_lines_respect_window() {
    let (output, _drain, _policy, mut lines) = scheduler(3, 1);
    let start = Instant::now();

    for i in 1..=5 {
        output.send_queued(format!("PRIVMSG #test :message {}", i));
    }

    let mut received = Vec::new();
    for _ in 0..5 {
        let line = next_line(&mut lines).await;
        received.push((line, start.elapsed()));
    }

    for (i, (line, _)) in received.iter().enumerate() {
        assert_eq!(line, &format!("PRIVMSG #test :message {}", i + 1));
    }
    for (_, elapsed) in &received[..3] {
        assert!(*elapsed < Duration::from_secs(1), "sent too late: {:?}", elapsed);
    }
    for (_, elapsed) in &received[3..] {
        assert!(*elapsed >= Duration::from_secs(1), "sent too early: {:?}", elapsed);
        assert!(*elapsed < Duration::from_secs(2), "sent too late: {:?}", elapsed);
    }
}

#[tokio::test(start_paused = true)]
async fn test_window_rolls_across_boundary() {
    let (output, _drain, _policy, mut lines) = scheduler(3, 1);
    let start = Instant::now();
    let mut sent_at = Vec::new();

    output.send_queued("PRIVMSG #test :message 1");
    assert_eq!(next_line(&mut lines).await, "PRIVMSG #test :message 1");
    sent_at.push(start.elapsed());

    // a burst late in the first window must not get a fresh allowance at 1s
    tokio::time::sleep(Duration::from_millis(900)).await;
    for i in 2..=6 {
        output.send_queued(format!("PRIVMSG #test :message {}", i));
    }
    for i in 2..=6 {
        assert_eq!(
            next_line(&mut lines).await,
            format!("PRIVMSG #test :message {}", i)
        );
        sent_at.push(start.elapsed());
    }

    assert!(sent_at[2] < Duration::from_secs(1));
    assert!(sent_at[3] >= Duration::from_secs(1));
    assert!(sent_at[4] >= Duration::from_millis(1900));
    for (i, pair) in sent_at.windows(4).enumerate() {
        assert!(
            pair[3] - pair[0] >= Duration::from_secs(1),
            "four sends within one second starting at message {}: {:?}",
            i + 1,
            sent_at
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_send_now_jumps_the_backlog() {
    let (output, _drain, _policy, mut lines) = scheduler(1, 10);
    let start = Instant::now();

    output.send_queued("PRIVMSG #test :one");
    output.send_queued("PRIVMSG #test :two");
    output.send_queued("PRIVMSG #test :three");
    assert_eq!(next_line(&mut lines).await, "PRIVMSG #test :one");

    output.send_now("PONG server.example.com");
    assert_eq!(next_line(&mut lines).await, "PONG server.example.com");
    assert!(start.elapsed() < Duration::from_secs(1));

    assert_eq!(next_line(&mut lines).await, "PRIVMSG #test :two");
    assert!(start.elapsed() >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_send_now_ignores_limit() {
    let (output, _drain, _policy, mut lines) = scheduler(1, 10);
    let start = Instant::now();

    for i in 0..5 {
        output.send_now(format!("NOTICE nick :urgent {}", i));
    }
    for i in 0..5 {
        assert_eq!(next_line(&mut lines).await, format!("NOTICE nick :urgent {}", i));
    }
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_lines_are_sanitized() {
    let (output, _drain, _policy, mut lines) = scheduler(5, 1);

    output.send_queued("PRIVMSG #test :hello\r\nQUIT :injected");
    output.send_queued("PRIVMSG #test :after");

    assert_eq!(next_line(&mut lines).await, "PRIVMSG #test :hello");
    assert_eq!(next_line(&mut lines).await, "PRIVMSG #test :after");
}

#[tokio::test(start_paused = true)]
async fn test_policy_change_applies_to_next_decision() {
    let (output, _drain, policy, mut lines) = scheduler(1, 10);
    let start = Instant::now();

    output.send_queued("PRIVMSG #test :one");
    output.send_queued("PRIVMSG #test :two");
    output.send_queued("PRIVMSG #test :three");
    assert_eq!(next_line(&mut lines).await, "PRIVMSG #test :one");

    policy.send_replace(FloodPolicy::new(5, 1).unwrap());

    // The wait already in progress is not rescheduled...
    assert_eq!(next_line(&mut lines).await, "PRIVMSG #test :two");
    assert!(start.elapsed() >= Duration::from_secs(10));
    // ...but the one after it uses the new policy.
    assert_eq!(next_line(&mut lines).await, "PRIVMSG #test :three");
    assert!(start.elapsed() < Duration::from_secs(11));
}

#[tokio::test(start_paused = true)]
async fn test_close_flushes_urgent_lines() {
    let (output, drain, _policy, mut lines) = scheduler(1, 10);

    output.send_now("QUIT :bye");
    drop(output);
    drain.close(Duration::from_secs(1)).await;

    assert_eq!(next_line(&mut lines).await, "QUIT :bye");
    assert!(lines.next_line().await.unwrap().is_none());
}

/// A writer whose every write fails.
struct FailingWriter {
    attempts: Arc<AtomicUsize>,
}

impl AsyncWrite for FailingWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe")))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[tokio::test(start_paused = true)]
async fn test_write_failure_enters_error_state() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let writer = FailingWriter {
        attempts: Arc::clone(&attempts),
    };
    let (_policy_tx, policy_rx) = watch::channel(FloodPolicy::default());
    let (output, _drain) = OutputScheduler::spawn(writer, policy_rx);

    assert!(!output.is_in_error_state());
    output.send_queued("PRIVMSG #test :doomed");

    let err = timeout(Duration::from_secs(5), output.failed())
        .await
        .expect("error state never reported");
    assert!(matches!(err, TransportError::Write(_)));
    assert!(output.is_in_error_state());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    output.send_queued("PRIVMSG #test :dropped");
    output.send_now("PONG dropped");
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}
