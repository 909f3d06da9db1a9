//! Voxdesk - Entry Point
//!
//! Wires the command pipeline from configuration and drives it from stdin.
//! In text mode every line is submitted as a typed command. In voice mode
//! lines stand in for the speech collaborator: they are delivered as final
//! transcripts and `:wake`, `:partial` and `:error` simulate the rest.

use clap::Parser;
use voxdesk::core::config::{AssistantConfig, VoiceOutput};
use voxdesk::core::error::Result;
use voxdesk::core::types::Utterance;
use voxdesk::pipeline::{CommandPipeline, HostResponse, PipelineEvent};

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tokio::runtime::Runtime;

/// Voice and text command assistant
#[derive(Parser, Debug)]
#[command(name = "voxdesk")]
#[command(about = "Turn natural-language commands into desktop actions")]
struct Args {
    /// Configuration file (TOML); defaults apply when it does not exist
    #[arg(long, default_value = "voxdesk.toml")]
    config: PathBuf,

    /// Re-arm listening after every command
    #[arg(long)]
    continuous: bool,

    /// Speak replies with the macOS `say` command
    #[arg(long)]
    say: bool,

    /// Treat input lines as voice transcripts instead of typed commands
    #[arg(long)]
    voice: bool,

    /// Print full JSON responses in text mode
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("voxdesk=info")),
        )
        .init();

    let args = Args::parse();
    tracing::info!("Voxdesk starting...");

    let mut config = AssistantConfig::load(&args.config)?;
    config.apply_env();
    if args.continuous {
        config.pipeline.continuous = true;
    }
    if args.say {
        config.speech.voice = VoiceOutput::Say;
    }

    let rt = Runtime::new()?;
    let (pipeline, events) = CommandPipeline::from_config(&config).map_err(|e| {
        eprintln!("Failed to start: {}", e);
        e
    })?;

    let status = pipeline.status();
    println!("\n=== VOXDESK ===");
    println!(
        "Platform: {:?} | AI backend: {} | Mode: {}",
        status.platform,
        if status.ai_ready { "ready" } else { "keyword fallback" },
        if args.voice { "voice" } else { "text" }
    );
    println!();
    println!("Commands:");
    println!("  :status           - Show pipeline status");
    println!("  :quit             - Exit");
    if args.voice {
        println!("  :wake             - Simulate the wake word");
        println!("  :partial <text>   - Deliver an interim transcript");
        println!("  :error <message>  - Simulate a transcription error");
        println!("  <any text>        - Deliver a final transcript");
    } else {
        println!("  <any text>        - Run a command");
    }
    println!();

    let sender = pipeline.event_sender();
    let runner = if args.voice {
        Some(rt.spawn(pipeline.clone().run(events)))
    } else {
        drop(events);
        None
    };

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            ":quit" | ":q" => break,
            ":status" => {
                println!("{}", serde_json::to_string_pretty(&pipeline.status())?);
                continue;
            }
            _ => {}
        }

        if args.voice {
            let event = if input == ":wake" {
                PipelineEvent::Wake
            } else if let Some(text) = input.strip_prefix(":partial ") {
                PipelineEvent::Transcript(Utterance::interim(text))
            } else if let Some(message) = input.strip_prefix(":error ") {
                PipelineEvent::TranscriptionError(message.to_string())
            } else {
                PipelineEvent::Transcript(Utterance::final_text(input))
            };
            if sender.send(event).is_err() {
                tracing::error!("Pipeline stopped");
                break;
            }
        } else {
            let response = rt.block_on(pipeline.submit_utterance(input));
            print_response(&response, args.json)?;
        }
    }

    if let Some(runner) = runner {
        let _ = sender.send(PipelineEvent::Shutdown);
        let _ = rt.block_on(runner);
    }

    println!("Goodbye.");
    Ok(())
}

fn print_response(response: &HostResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }
    let marker = if response.success { "ok" } else { "failed" };
    match response.execution_result() {
        Some(result) => println!("[{}] {}", marker, result.message),
        None => println!("[{}] {}", marker, response.message),
    }
    Ok(())
}
