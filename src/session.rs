// WHY: Only one story may be in flight; a regenerate request supersedes the running one
// Aborting the task drops its assembler, so a stale run never appends to the new story

use anyhow::{Context, Result};
use futures::stream::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::stream::{StoryAssembly, StreamConfig};

const SEGMENT_CHANNEL_CAPACITY: usize = 64;

/// Owner of the running generation, if any
#[derive(Debug)]
pub struct StorySession {
    config: StreamConfig,
    current: Option<JoinHandle<()>>,
    generation: u64,
}

impl StorySession {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            current: None,
            generation: 0,
        }
    }

    /// Start assembling a new fragment stream, cancelling the previous run first.
    /// Segments arrive on the returned stream; it ends after the final flush,
    /// after a transport error, or when the run is cancelled.
    /// Must be called from within a Tokio runtime; otherwise an error is returned.
    pub fn start<S, B, E>(&mut self, fragments: S) -> Result<ReceiverStream<Result<String>>>
    where
        S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
        B: AsRef<[u8]> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .context("Story sessions need a running Tokio runtime")?;
        self.cancel();

        let mut assembly = StoryAssembly::new(fragments, &self.config)?;
        self.generation += 1;
        let generation = self.generation;

        let (tx, rx) = mpsc::channel(SEGMENT_CHANNEL_CAPACITY);
        let handle = runtime.spawn(async move {
            while let Some(segment) = assembly.next_segment().await {
                if tx.send(segment).await.is_err() {
                    debug!(generation, "Segment receiver dropped, stopping run");
                    return;
                }
            }

            let stats = assembly.stats();
            info!(
                generation,
                fragments = stats.fragments_read,
                segments = stats.segments_emitted,
                completed = stats.completed,
                "Story run finished"
            );
        });

        debug!(generation, "Started story run");
        self.current = Some(handle);
        Ok(ReceiverStream::new(rx))
    }

    /// Abort the running generation. Returns true if one was still running.
    pub fn cancel(&mut self) -> bool {
        match self.current.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                debug!(generation = self.generation, "Cancelled story run");
                true
            }
            _ => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.current.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Number of runs started so far
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Default for StorySession {
    fn default() -> Self {
        Self::new(StreamConfig::default())
    }
}

impl Drop for StorySession {
    fn drop(&mut self) {
        self.cancel();
    }
}
