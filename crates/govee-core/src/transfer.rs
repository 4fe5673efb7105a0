//! Bulk history transfer tracking.
//!
//! A [`TransferSession`] is created when a history request is written and is
//! only mutated by routed notifications afterwards. The device opens the
//! transfer with a `33 01` echo, streams batches on the history channel and
//! closes it with `EE 01` carrying the number of batches it sent.

use govee_types::codec::HistoryBatch;
use govee_types::{Calibration, Measurement};
use serde::Serialize;
use time::OffsetDateTime;

/// Progress of a history transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Request written, nothing heard yet.
    Idle,
    /// Reserved. No transition enters this state.
    Waiting,
    /// The device acknowledged the request.
    Started,
    /// Finished and the counts agree.
    Complete,
    /// Finished but the counts disagree.
    Incomplete,
}

impl TransferStatus {
    /// Whether the device has closed the transfer.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Complete | TransferStatus::Incomplete)
    }
}

/// How a history download ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferOutcome {
    /// The device reported exactly the number of batches received.
    Complete,
    /// The device finished but reported a different number of batches.
    PartialMismatch { reported: u16, counted: u32 },
    /// The device never finished within the wait cap.
    TimedOut { status: TransferStatus },
}

impl TransferOutcome {
    /// Whether every batch the device sent arrived.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, TransferOutcome::Complete)
    }
}

/// Result of one history retrieval. Samples are returned whatever the outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDownload {
    /// Decoded samples in arrival order.
    pub samples: Vec<Measurement>,
    /// How the transfer ended.
    pub outcome: TransferOutcome,
    /// Batches expected from the requested range. Informational only.
    pub expected_messages: u32,
    /// Batches actually received.
    pub counted_messages: u32,
}

/// A history transfer in progress.
#[derive(Debug, Clone)]
pub struct TransferSession {
    requested_at: OffsetDateTime,
    expected: u32,
    counted: u32,
    reported: Option<u16>,
    status: TransferStatus,
    calibration: Calibration,
    samples: Vec<Measurement>,
}

impl TransferSession {
    /// Start tracking a transfer requested at `requested_at`.
    #[must_use]
    pub fn new(requested_at: OffsetDateTime, expected: u32, calibration: Calibration) -> Self {
        Self {
            requested_at,
            expected,
            counted: 0,
            reported: None,
            status: TransferStatus::Idle,
            calibration,
            samples: Vec::new(),
        }
    }

    /// Time the request was written.
    #[must_use]
    pub fn requested_at(&self) -> OffsetDateTime {
        self.requested_at
    }

    /// Batches expected from the requested range.
    #[must_use]
    pub fn expected(&self) -> u32 {
        self.expected
    }

    /// Batches received so far.
    #[must_use]
    pub fn counted(&self) -> u32 {
        self.counted
    }

    /// Batch count the device reported on completion.
    #[must_use]
    pub fn reported(&self) -> Option<u16> {
        self.reported
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> TransferStatus {
        self.status
    }

    /// Samples decoded so far.
    #[must_use]
    pub fn samples(&self) -> &[Measurement] {
        &self.samples
    }

    /// The device acknowledged the request.
    pub fn mark_started(&mut self) {
        if !self.status.is_terminal() {
            self.status = TransferStatus::Started;
        }
    }

    /// Append a batch. Counted in every state, including before the
    /// acknowledgement arrives.
    pub fn record_batch(&mut self, batch: HistoryBatch) {
        self.counted += 1;
        self.samples
            .extend(batch.into_measurements(self.requested_at, self.calibration));
    }

    /// The device closed the transfer after sending `reported` batches.
    pub fn finish(&mut self, reported: u16) {
        self.reported = Some(reported);
        self.status = if u32::from(reported) == self.counted {
            TransferStatus::Complete
        } else {
            TransferStatus::Incomplete
        };
    }

    /// Consume the session into a download result.
    #[must_use]
    pub fn into_download(self) -> HistoryDownload {
        let outcome = match (self.status, self.reported) {
            (TransferStatus::Complete, _) => TransferOutcome::Complete,
            (TransferStatus::Incomplete, Some(reported)) => TransferOutcome::PartialMismatch {
                reported,
                counted: self.counted,
            },
            (status, _) => TransferOutcome::TimedOut { status },
        };
        HistoryDownload {
            samples: self.samples,
            outcome,
            expected_messages: self.expected,
            counted_messages: self.counted,
        }
    }
}
