pub mod assembler;
pub mod client;
pub mod decoder;
pub mod normalizer;
pub mod prompt;
pub mod session;
pub mod stream;

// Re-export main types for convenient access
pub use assembler::{BoundaryRules, ProcessedChunk, StreamAssembler};
pub use normalizer::{normalize, TextNormalizer};

// Re-export the async pipeline used by the CLI and integration tests
pub use client::{ClientConfig, StoryClient};
pub use prompt::{default_characters, Character, Genre, StoryRequest, Tone};
pub use session::StorySession;
pub use stream::{assemble_story, collect_story, replay_file, AssemblyStats, StreamConfig};
