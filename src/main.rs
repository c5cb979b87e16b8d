use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, Level};

use storyweave::client::DEFAULT_ENDPOINT;
use storyweave::prompt::load_characters;
use storyweave::{
    collect_story, default_characters, replay_file, AssemblyStats, BoundaryRules, ClientConfig, Genre,
    StoryClient, StoryRequest, StreamConfig, Tone,
};

const FAILURE_MESSAGE: &str = "Failed to generate story. Please try again.";

#[derive(Parser, Debug)]
#[command(name = "storyweave")]
#[command(about = "Generate a story from a cast of characters and render the reply as readable prose while it streams")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log at DEBUG level
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Request a story and print it as it arrives
    Generate(GenerateArgs),
    /// Feed a recorded raw response body through the same pipeline
    Replay(ReplayArgs),
    /// Print the prompt that would be sent
    Prompt(StoryArgs),
}

#[derive(clap::Args, Debug)]
struct StoryArgs {
    #[arg(long, value_enum)]
    genre: Genre,

    #[arg(long, value_enum)]
    tone: Tone,

    /// JSON file with an array of {name, description, personality}
    #[arg(long)]
    characters: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct AssemblyArgs {
    /// Allow sentence breaks right after titles such as "Mr."
    #[arg(long)]
    no_abbreviation_guard: bool,

    /// Stats output file path
    #[arg(long)]
    stats_out: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    story: StoryArgs,

    #[command(flatten)]
    assembly: AssemblyArgs,

    /// Chat endpoint that streams the reply
    #[arg(long, env = "STORYWEAVE_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Suppress the spinner shown while waiting for the first sentence
    #[arg(long)]
    no_progress: bool,
}

#[derive(clap::Args, Debug)]
struct ReplayArgs {
    /// Recorded response body
    file: PathBuf,

    #[command(flatten)]
    assembly: AssemblyArgs,

    /// Bytes per replayed fragment
    #[arg(long, default_value_t = 8192)]
    chunk_size: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // WHY: stdout carries the story, so structured logs go to stderr
    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(io::stderr)
        .json()
        .init();

    info!(?cli, "Parsed CLI arguments");

    match cli.command {
        Command::Generate(args) => {
            // Bad input is reported as itself; only the request and stream fail generically
            let request = story_request(&args.story).await?;
            let prompt = request.build_prompt()?;
            if let Err(e) = generate(args, &request, &prompt).await {
                error!("Story generation failed: {:#}", e);
                eprintln!("{FAILURE_MESSAGE}");
                std::process::exit(1);
            }
        }
        Command::Replay(args) => replay(args).await?,
        Command::Prompt(args) => {
            let request = story_request(&args).await?;
            println!("{}", request.build_prompt()?);
        }
    }

    Ok(())
}

async fn generate(args: GenerateArgs, request: &StoryRequest, prompt: &str) -> Result<()> {
    let config = stream_config(&args.assembly, StreamConfig::default());

    info!(
        genre = request.genre.label(),
        tone = request.tone.label(),
        characters = request.characters.len(),
        "Requesting story"
    );

    let client = StoryClient::new(ClientConfig {
        endpoint: args.endpoint.clone(),
        ..Default::default()
    })?;

    let spinner = (!args.no_progress).then(|| {
        make_spinner(format!(
            "{} Writing a {} {} story...",
            request.genre.emoji(),
            request.tone.label().to_lowercase(),
            request.genre.label()
        ))
    });
    let mut printer = StoryPrinter::new(spinner);

    let stats = match client.open_stream(prompt).await {
        Ok(fragments) => collect_story(fragments, &config, |segment| printer.print(segment)).await,
        Err(e) => Err(e),
    };
    printer.finish()?;
    let stats = stats?;

    write_stats(args.assembly.stats_out.as_deref(), &stats).await
}

async fn replay(args: ReplayArgs) -> Result<()> {
    let config = stream_config(
        &args.assembly,
        StreamConfig {
            chunk_size: args.chunk_size,
            ..Default::default()
        },
    );

    let mut printer = StoryPrinter::new(None);
    let stats = replay_file(&args.file, &config, |segment| printer.print(segment)).await;
    printer.finish()?;
    let stats = stats?;

    info!("Replayed {} as {} fragments", args.file.display(), stats.fragments_read);
    write_stats(args.assembly.stats_out.as_deref(), &stats).await
}

async fn story_request(args: &StoryArgs) -> Result<StoryRequest> {
    let characters = match &args.characters {
        Some(path) => load_characters(path).await?,
        None => default_characters(),
    };
    let request = StoryRequest::new(args.genre, args.tone, characters);
    request.validate()?;
    Ok(request)
}

fn stream_config(args: &AssemblyArgs, base: StreamConfig) -> StreamConfig {
    StreamConfig {
        boundary_rules: BoundaryRules {
            guard_title_abbreviations: !args.no_abbreviation_guard,
            ..base.boundary_rules
        },
        ..base
    }
}

async fn write_stats(path: Option<&Path>, stats: &AssemblyStats) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let content = serde_json::to_string_pretty(stats)?;
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write stats to {}", path.display()))?;
    info!("Wrote run stats to {}", path.display());
    Ok(())
}

fn make_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{elapsed}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Writes segments to stdout as they arrive, clearing the spinner on the first one
struct StoryPrinter {
    spinner: Option<ProgressBar>,
    wrote_any: bool,
    error: Option<io::Error>,
}

impl StoryPrinter {
    fn new(spinner: Option<ProgressBar>) -> Self {
        Self {
            spinner,
            wrote_any: false,
            error: None,
        }
    }

    fn print(&mut self, segment: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
        if self.error.is_some() {
            return;
        }

        let mut stdout = io::stdout();
        match stdout.write_all(segment.as_bytes()).and_then(|()| stdout.flush()) {
            Ok(()) => self.wrote_any = true,
            Err(e) => self.error = Some(e),
        }
    }

    fn finish(mut self) -> Result<()> {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
        if let Some(e) = self.error {
            return Err(e).context("Failed to write story to stdout");
        }
        if self.wrote_any {
            println!();
        }
        Ok(())
    }
}
