// Progress reporting hook.
//
// The core never prints. Hashing, diffing and restoring call a `Progress`
// implementation once every `interval` blocks; the CLI turns those calls
// into dots on stderr.

/// Operation that emitted a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Hash,
    Diff,
    Restore,
}

/// One progress notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub stage: Stage,
    /// Blocks processed so far in this stage.
    pub blocks: u64,
    /// Whether the interval since the previous event produced at least one
    /// new (payload) block. Only ever true for `Stage::Diff`.
    pub fresh: bool,
}

/// Receiver for progress events.
pub trait Progress {
    fn tick(&mut self, event: ProgressEvent);

    /// Called once when a stage has processed its last block.
    fn finish(&mut self, _stage: Stage) {}
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn tick(&mut self, _event: ProgressEvent) {}
}

impl<F: FnMut(ProgressEvent)> Progress for F {
    fn tick(&mut self, event: ProgressEvent) {
        self(event)
    }
}

/// Fixed-cadence event generator.
#[derive(Debug)]
pub(crate) struct Ticker {
    stage: Stage,
    interval: u64,
    blocks: u64,
    fresh: bool,
}

impl Ticker {
    /// An `interval` of zero disables ticking.
    pub(crate) fn new(stage: Stage, interval: u64) -> Self {
        Self {
            stage,
            interval,
            blocks: 0,
            fresh: false,
        }
    }

    /// Count one block; `fresh` marks a block written to the payload.
    pub(crate) fn step(&mut self, progress: &mut dyn Progress, fresh: bool) {
        self.blocks += 1;
        self.fresh |= fresh;
        if self.interval != 0 && self.blocks % self.interval == 0 {
            progress.tick(ProgressEvent {
                stage: self.stage,
                blocks: self.blocks,
                fresh: self.fresh,
            });
            self.fresh = false;
        }
    }

    pub(crate) fn finish(self, progress: &mut dyn Progress) -> u64 {
        progress.finish(self.stage);
        self.blocks
    }
}
