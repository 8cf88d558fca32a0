//! Deterministic scripted media devices for tests and CI.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dermalens_core::Frame;
use tokio::sync::Notify;

use crate::{CaptureError, MediaAccessError, MediaConstraint, MediaDevices, MediaStream};

/// Scripted result for one constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedOutcome {
    /// Acquisition succeeds.
    Grant,
    /// User or system refused access.
    Deny,
    /// No device matches the constraint.
    NoDevice,
    /// Any other device failure.
    Fail(String),
}

/// Shared counters of streams opened and stopped by synthetic devices.
#[derive(Debug, Default)]
pub struct StreamLedger {
    opened: AtomicUsize,
    stopped: AtomicUsize,
}

impl StreamLedger {
    /// Number of streams ever opened.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of streams stopped.
    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Streams opened and not yet stopped.
    pub fn live(&self) -> usize {
        self.opened().saturating_sub(self.stopped())
    }
}

/// Scripted [`MediaDevices`] implementation.
///
/// Constraints without a scripted outcome are granted.
#[derive(Debug)]
pub struct SyntheticMediaDevices {
    outcomes: HashMap<MediaConstraint, ScriptedOutcome>,
    queued: Mutex<VecDeque<ScriptedOutcome>>,
    attempts: Mutex<Vec<MediaConstraint>>,
    ledger: Arc<StreamLedger>,
    gate: Option<Arc<Notify>>,
    width: u32,
    height: u32,
}

impl SyntheticMediaDevices {
    /// Creates devices that grant every constraint with a 4x4 stream.
    pub fn new() -> Self {
        Self {
            outcomes: HashMap::new(),
            queued: Mutex::new(VecDeque::new()),
            attempts: Mutex::new(Vec::new()),
            ledger: Arc::new(StreamLedger::default()),
            gate: None,
            width: 4,
            height: 4,
        }
    }

    /// Scripts the outcome of one constraint.
    pub fn with_outcome(mut self, constraint: MediaConstraint, outcome: ScriptedOutcome) -> Self {
        self.outcomes.insert(constraint, outcome);
        self
    }

    /// Queues an outcome for the next call, ahead of per-constraint scripts.
    /// Queued outcomes are consumed in call order.
    pub fn then(self, outcome: ScriptedOutcome) -> Self {
        if let Ok(mut queued) = self.queued.lock() {
            queued.push_back(outcome);
        }
        self
    }

    /// Sets the native resolution of produced streams.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Holds every acquisition until the returned handle is notified.
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(gate.clone());
        (self, gate)
    }

    /// Returns constraints tried so far, in order.
    pub fn attempts(&self) -> Vec<MediaConstraint> {
        self.attempts
            .lock()
            .map(|attempts| attempts.clone())
            .unwrap_or_default()
    }

    /// Returns the stream ledger shared with produced streams.
    pub fn ledger(&self) -> Arc<StreamLedger> {
        self.ledger.clone()
    }
}

impl Default for SyntheticMediaDevices {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaDevices for SyntheticMediaDevices {
    async fn get_user_media(
        &self,
        constraint: &MediaConstraint,
    ) -> Result<Box<dyn MediaStream>, MediaAccessError> {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.push(constraint.clone());
        }
        let queued = self
            .queued
            .lock()
            .ok()
            .and_then(|mut queued| queued.pop_front());

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let outcome = queued
            .or_else(|| self.outcomes.get(constraint).cloned())
            .unwrap_or(ScriptedOutcome::Grant);
        match outcome {
            ScriptedOutcome::Grant => {
                let index = self.ledger.opened.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(Box::new(SyntheticStream {
                    id: format!("synthetic-stream-{index}"),
                    width: self.width,
                    height: self.height,
                    live: AtomicBool::new(true),
                    sequence: AtomicU64::new(0),
                    ledger: self.ledger.clone(),
                }))
            }
            ScriptedOutcome::Deny => Err(MediaAccessError::PermissionDenied(
                "synthetic permission prompt dismissed".to_string(),
            )),
            ScriptedOutcome::NoDevice => Err(MediaAccessError::NoDevice(format!(
                "no synthetic device satisfies {constraint}"
            ))),
            ScriptedOutcome::Fail(detail) => Err(MediaAccessError::Other(detail)),
        }
    }
}

/// Stream produced by [`SyntheticMediaDevices`].
#[derive(Debug)]
pub struct SyntheticStream {
    id: String,
    width: u32,
    height: u32,
    live: AtomicBool,
    sequence: AtomicU64,
    ledger: Arc<StreamLedger>,
}

impl MediaStream for SyntheticStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn grab_frame(&self, captured_at_ms: u64) -> Result<Frame, CaptureError> {
        if !self.is_live() {
            return Err(CaptureError::StreamEnded(self.id.clone()));
        }

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let byte = (sequence % 255) as u8;
        let rgba_len = (self.width as usize) * (self.height as usize) * 4;

        Ok(Frame::new(
            self.id.clone(),
            self.width,
            self.height,
            captured_at_ms,
            vec![byte; rgba_len],
        )?)
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            self.ledger.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}
