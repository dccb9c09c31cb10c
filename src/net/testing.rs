//! Mock control transport shared by the unit tests in this module tree.

use crate::net::socket::{ControlChannel, ControlDialer};
use anyhow::{bail, Result};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Shared `(socket label, frame)` log so a test can assert cross-socket
/// ordering.
pub(crate) type FrameLog = Arc<Mutex<Vec<(String, String)>>>;

pub(crate) fn frame_log() -> FrameLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub(crate) struct MockChannel {
    label: String,
    log: FrameLog,
    pub(crate) closed: CancellationToken,
}

impl MockChannel {
    fn new(label: &str, log: FrameLog) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_owned(),
            log,
            closed: CancellationToken::new(),
        })
    }
}

impl ControlChannel for MockChannel {
    fn send_text<'a>(&'a self, frame: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.closed.is_cancelled() {
                bail!("socket {} is closed", self.label);
            }
            self.log
                .lock()
                .expect("frame log poisoned")
                .push((self.label.clone(), frame.to_owned()));
            Ok(())
        })
    }

    fn closed(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.closed.cancelled())
    }

    fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

/// Fails the first `failures` dials, then hands out fresh [`MockChannel`]s.
pub(crate) struct ScriptedDialer {
    label: String,
    failures: usize,
    attempts: AtomicUsize,
    log: FrameLog,
    dial_times: Mutex<Vec<Instant>>,
    channels: Mutex<Vec<Arc<MockChannel>>>,
}

impl ScriptedDialer {
    pub(crate) fn new(label: &str, failures: usize) -> Arc<Self> {
        Self::with_log(label, failures, frame_log())
    }

    pub(crate) fn with_log(label: &str, failures: usize, log: FrameLog) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_owned(),
            failures,
            attempts: AtomicUsize::new(0),
            log,
            dial_times: Mutex::new(Vec::new()),
            channels: Mutex::new(Vec::new()),
        })
    }

    /// Instants at which each dial was requested, in order.
    pub(crate) fn dial_times(&self) -> Vec<Instant> {
        self.dial_times.lock().expect("dial log poisoned").clone()
    }

    pub(crate) fn channel(&self, index: usize) -> Arc<MockChannel> {
        self.channels.lock().expect("channel log poisoned")[index].clone()
    }

    pub(crate) fn dial_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl ControlDialer for ScriptedDialer {
    fn dial<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, Result<Arc<dyn ControlChannel>>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        self.dial_times
            .lock()
            .expect("dial log poisoned")
            .push(Instant::now());
        Box::pin(async move {
            if attempt < self.failures {
                bail!("connection refused");
            }
            let channel = MockChannel::new(&self.label, self.log.clone());
            self.channels
                .lock()
                .expect("channel log poisoned")
                .push(channel.clone());
            Ok(channel as Arc<dyn ControlChannel>)
        })
    }
}
