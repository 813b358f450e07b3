//! Hierarchical progress reporting.
//!
//! Purely observational: sinks can log, stream over a channel, or do
//! nothing. Nothing here feeds back into control flow.

use std::path::PathBuf;
use std::time::Duration;

use crate::bake::RunStatus;

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    RunStarted {
        jobs: usize,
    },
    JobStarted {
        job: String,
        index: usize,
        total: usize,
    },
    PassStarted {
        job: String,
        pass: String,
        index: usize,
        total: usize,
    },
    PairBaked {
        job: String,
        pass: String,
        lowpoly: String,
        index: usize,
        total: usize,
    },
    PassWritten {
        job: String,
        pass: String,
        path: PathBuf,
    },
    JobFinished {
        job: String,
    },
    RunFinished {
        status: RunStatus,
        elapsed: Duration,
    },
}

pub trait ProgressSink {
    fn event(&self, event: &ProgressEvent);
}

/// Sink for non-interactive environments.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn event(&self, _event: &ProgressEvent) {}
}

/// Logs every event through the `log` facade.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::RunStarted { jobs } => {
                log::info!("[driver] starting {jobs} job(s)");
            }
            ProgressEvent::JobStarted { job, index, total } => {
                log::info!("[driver] job '{job}' ({}/{total})", index + 1);
            }
            ProgressEvent::PassStarted {
                job,
                pass,
                index,
                total,
            } => {
                log::info!("[driver] job '{job}': pass '{pass}' ({}/{total})", index + 1);
            }
            ProgressEvent::PairBaked {
                pass,
                lowpoly,
                index,
                total,
                ..
            } => {
                log::info!("[bake] pass '{pass}': baked '{lowpoly}' ({}/{total})", index + 1);
            }
            ProgressEvent::PassWritten { pass, path, .. } => {
                log::info!("[compo] pass '{pass}' written to {}", path.display());
            }
            ProgressEvent::JobFinished { job } => {
                log::info!("[driver] job '{job}' finished");
            }
            ProgressEvent::RunFinished { status, elapsed } => {
                log::info!("[driver] run {status:?} after {elapsed:.2?}");
            }
        }
    }
}

/// Streams events to a consumer thread; send failures are ignored because a
/// vanished consumer must not fail the bake.
pub struct ChannelProgress {
    tx: crossbeam_channel::Sender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new(tx: crossbeam_channel::Sender<ProgressEvent>) -> Self {
        ChannelProgress { tx }
    }
}

impl ProgressSink for ChannelProgress {
    fn event(&self, event: &ProgressEvent) {
        let _ = self.tx.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_delivers_events() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let sink = ChannelProgress::new(tx);
        sink.event(&ProgressEvent::RunStarted { jobs: 2 });
        match rx.try_recv().unwrap() {
            ProgressEvent::RunStarted { jobs } => assert_eq!(jobs, 2),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn channel_sink_survives_dropped_receiver() {
        let (tx, rx) = crossbeam_channel::unbounded();
        drop(rx);
        let sink = ChannelProgress::new(tx);
        sink.event(&ProgressEvent::RunStarted { jobs: 1 });
    }
}
