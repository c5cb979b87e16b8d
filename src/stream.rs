use anyhow::{Context, Result};
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::assembler::{BoundaryRules, StreamAssembler};
use crate::decoder::Utf8StreamDecoder;

/// Configuration for assembling a fragment stream
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Sentence boundary rules for the assembler
    pub boundary_rules: BoundaryRules,
    /// Fragment size used when replaying a recorded body from disk (default: 8KB)
    pub chunk_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            boundary_rules: BoundaryRules::default(),
            chunk_size: 8192,
        }
    }
}

/// Statistics for one assembled story
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AssemblyStats {
    pub fragments_read: u64,
    pub bytes_read: u64,
    pub segments_emitted: u64,
    pub chars_emitted: u64,
    pub duration_ms: u64,
    /// True once the stream ended normally and the buffer was flushed
    pub completed: bool,
    pub error: Option<String>,
}

/// Pulls fragments in order and yields cleaned segments.
/// Dropping it stops reading and discards the pending buffer.
pub struct StoryAssembly<S> {
    fragments: Pin<Box<S>>,
    decoder: Utf8StreamDecoder,
    assembler: StreamAssembler,
    stats: AssemblyStats,
    started: Instant,
    finished: bool,
}

impl<S, B, E> StoryAssembly<S>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<anyhow::Error>,
{
    pub fn new(fragments: S, config: &StreamConfig) -> Result<Self> {
        Ok(Self {
            fragments: Box::pin(fragments),
            decoder: Utf8StreamDecoder::new(),
            assembler: StreamAssembler::new(config.boundary_rules.clone())?,
            stats: AssemblyStats::default(),
            started: Instant::now(),
            finished: false,
        })
    }

    /// Next non-empty segment, `None` after the final flush or after an error
    pub async fn next_segment(&mut self) -> Option<Result<String>> {
        if self.finished {
            return None;
        }

        loop {
            match self.fragments.next().await {
                Some(Ok(bytes)) => {
                    let bytes = bytes.as_ref();
                    self.stats.fragments_read += 1;
                    self.stats.bytes_read += bytes.len() as u64;

                    let text = self.decoder.decode(bytes);
                    let segment = self.assembler.process_fragment(&text);
                    if !segment.is_empty() {
                        return Some(Ok(self.record(segment)));
                    }
                }
                Some(Err(e)) => {
                    let error: anyhow::Error = e.into();
                    warn!("Fragment stream failed after {} fragments: {:#}", self.stats.fragments_read, error);
                    self.assembler.discard();
                    self.finish_run(Some(format!("{error:#}")));
                    return Some(Err(error));
                }
                None => {
                    let tail = self.decoder.finish();
                    let mut segment = self.assembler.process_fragment(&tail);
                    segment.push_str(&self.assembler.flush());
                    self.finish_run(None);
                    debug!("Fragment stream ended, flushed {} chars", segment.len());
                    if segment.is_empty() {
                        return None;
                    }
                    return Some(Ok(self.record(segment)));
                }
            }
        }
    }

    pub fn stats(&self) -> &AssemblyStats {
        &self.stats
    }

    fn record(&mut self, segment: String) -> String {
        self.stats.segments_emitted += 1;
        self.stats.chars_emitted += segment.chars().count() as u64;
        segment
    }

    fn finish_run(&mut self, error: Option<String>) {
        self.finished = true;
        self.stats.completed = error.is_none();
        self.stats.error = error;
        self.stats.duration_ms = self.started.elapsed().as_millis() as u64;
    }
}

/// Stream of cleaned segments built from a stream of raw byte fragments
pub fn assemble_story<S, B, E>(
    fragments: S,
    config: &StreamConfig,
) -> Result<impl Stream<Item = Result<String>>>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<anyhow::Error>,
{
    let assembly = StoryAssembly::new(fragments, config)?;

    Ok(futures::stream::unfold(assembly, |mut assembly| async move {
        assembly
            .next_segment()
            .await
            .map(|segment| (segment, assembly))
    }))
}

/// Drive a fragment stream to completion, handing each segment to `sink`
pub async fn collect_story<S, B, E, F>(
    fragments: S,
    config: &StreamConfig,
    mut sink: F,
) -> Result<AssemblyStats>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<anyhow::Error>,
    F: FnMut(&str),
{
    let mut assembly = StoryAssembly::new(fragments, config)?;

    while let Some(segment) = assembly.next_segment().await {
        sink(&segment?);
    }

    let stats = assembly.stats().clone();
    info!(
        "Assembled story: {} fragments, {} bytes, {} segments, {} chars in {}ms ({:.2} KB/s)",
        stats.fragments_read,
        stats.bytes_read,
        stats.segments_emitted,
        stats.chars_emitted,
        stats.duration_ms,
        if stats.duration_ms > 0 {
            (stats.bytes_read as f64 / 1_000.0) / (stats.duration_ms as f64 / 1000.0)
        } else {
            0.0
        }
    );
    Ok(stats)
}

/// Split an in-memory body into fixed-size byte fragments
pub fn fragments_from_bytes(
    body: Vec<u8>,
    chunk_size: usize,
) -> impl Stream<Item = Result<Vec<u8>>> {
    let chunk_size = chunk_size.max(1);
    let chunks: Vec<Result<Vec<u8>>> = body.chunks(chunk_size).map(|c| Ok(c.to_vec())).collect();
    futures::stream::iter(chunks)
}

/// Replay a recorded response body from disk through the assembler
pub async fn replay_file<P, F>(path: P, config: &StreamConfig, sink: F) -> Result<AssemblyStats>
where
    P: AsRef<std::path::Path>,
    F: FnMut(&str),
{
    let path = path.as_ref();
    debug!("Replaying recorded body: {}", path.display());
    let body = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read recorded body {}", path.display()))?;

    collect_story(fragments_from_bytes(body, config.chunk_size), config, sink).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn ok_fragments(parts: &[&str]) -> impl Stream<Item = Result<Vec<u8>>> {
        let items: Vec<Result<Vec<u8>>> = parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(items)
    }

    #[tokio::test]
    async fn test_assemble_story_segments() {
        let config = StreamConfig::default();
        let fragments = ok_fragments(&["Mario ran. Luigi ", "walked. Peach", " waved"]);
        let segments: Vec<String> = assemble_story(fragments, &config)
            .unwrap()
            .map(|s| s.unwrap())
            .collect()
            .await;

        assert_eq!(segments, vec!["Mario ran.", " Luigi walked.", " Peach waved"]);
    }

    #[tokio::test]
    async fn test_collect_story_stats() {
        let config = StreamConfig::default();
        let mut story = String::new();
        let stats = collect_story(ok_fragments(&["One. Two", ". Three"]), &config, |s| story.push_str(s))
            .await
            .unwrap();

        assert_eq!(story, "One. Two. Three");
        assert_eq!(stats.fragments_read, 2);
        assert_eq!(stats.bytes_read, 15);
        assert_eq!(stats.segments_emitted, 3);
        assert!(stats.completed);
        assert!(stats.error.is_none());
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let items: Vec<Result<Vec<u8>>> = vec![
            Ok(b"First step. Second".to_vec()),
            Err(anyhow::anyhow!("connection reset")),
            Ok(b" never read.".to_vec()),
        ];
        let config = StreamConfig::default();
        let results: Vec<Result<String>> = assemble_story(stream::iter(items), &config)
            .unwrap()
            .collect()
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), "First step.");
        assert!(results[1].as_ref().unwrap_err().to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_collect_story_propagates_error() {
        let items: Vec<Result<Vec<u8>>> = vec![Err(anyhow::anyhow!("boom"))];
        let config = StreamConfig::default();
        let mut story = String::new();
        let result = collect_story(stream::iter(items), &config, |s| story.push_str(s)).await;
        assert!(result.is_err());
        assert!(story.is_empty());
    }

    #[tokio::test]
    async fn test_multibyte_split_across_fragments() {
        let body = "Émile sang. Zoë listened.".as_bytes().to_vec();
        let config = StreamConfig::default();
        let mut story = String::new();
        // One-byte fragments split every multi-byte character
        collect_story(fragments_from_bytes(body, 1), &config, |s| story.push_str(s))
            .await
            .unwrap();
        assert_eq!(story, "Émile sang. Zoë listened.");
    }

    #[tokio::test]
    async fn test_empty_stream_emits_nothing() {
        let config = StreamConfig::default();
        let mut story = String::new();
        let stats = collect_story(ok_fragments(&[]), &config, |s| story.push_str(s))
            .await
            .unwrap();
        assert!(story.is_empty());
        assert_eq!(stats.segments_emitted, 0);
        assert!(stats.completed);
    }

    #[tokio::test]
    async fn test_replay_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("body.txt");
        tokio::fs::write(&path, "0:\"N ancy\"\n0:\" found a clue.\"\n0:\" Then\"\n0:\" she smiled.\"\n")
            .await
            .unwrap();

        let config = StreamConfig { chunk_size: 7, ..Default::default() };
        let mut story = String::new();
        let stats = replay_file(&path, &config, |s| story.push_str(s)).await.unwrap();

        assert!(story.starts_with("Nancy found a clue."), "got: {story}");
        assert!(stats.fragments_read > 1);
    }

    #[tokio::test]
    async fn test_replay_missing_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let result = replay_file(temp_dir.path().join("missing.txt"), &StreamConfig::default(), |_| {}).await;
        assert!(result.is_err());
    }
}
