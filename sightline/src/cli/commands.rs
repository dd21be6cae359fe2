//! CLI command execution.
//!
//! This is a thin presentation shell - every state change goes through the
//! orchestrator, and recoverable failures are printed, never propagated.

use std::collections::HashMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::backend::{HttpBackend, VisionBackend};
use crate::config;
use crate::error::Error;
use crate::geometry::{project, DisplayMode};
use crate::models::{Message, MessageRole};
use crate::orchestrator::{Orchestrator, Submission, UploadPhase};
use crate::readiness::READY_GRACE;
use crate::render::scene_to_svg;

use super::args::{Cli, Commands};

/// Default output path for `/boxes`.
const DEFAULT_OVERLAY_PATH: &str = "overlay.svg";

// === Command Execution ===

pub async fn execute(cli: Cli) -> Result<()> {
    let base_url = config::resolve_backend_url(cli.backend.as_deref());

    match cli.command {
        Some(Commands::Status) => print_status(&base_url).await,
        Some(Commands::Chat { image }) => run_chat(&base_url, image).await,
        None => run_chat(&base_url, None).await,
    }
}

/// One-shot warm-up status query.
async fn print_status(base_url: &str) -> Result<()> {
    let backend = HttpBackend::new(base_url);
    let status = backend
        .status()
        .await
        .with_context(|| format!("Failed to reach backend at {base_url}"))?;
    println!(
        "{} [{}] step {}/{} ready={}",
        status.message, status.detail, status.step, status.total_steps, status.ready
    );
    Ok(())
}

/// Interactive chat loop.
async fn run_chat(base_url: &str, image: Option<PathBuf>) -> Result<()> {
    let backend: Arc<dyn VisionBackend> = Arc::new(HttpBackend::new(base_url));
    let mut orchestrator = Orchestrator::new(backend);
    let mut mode = DisplayMode::Detection;
    let mut printed: HashMap<String, u64> = HashMap::new();

    println!("sightline - conversational satellite imagery inspection");
    println!("Backend: {base_url}");
    println!("Type /help for commands, /quit to exit.");
    println!();
    flush_transcript(&orchestrator, &mut printed);

    if let Some(path) = image {
        upload(&mut orchestrator, &path, &mut printed).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix('/') {
            if !dispatch(&mut orchestrator, rest, &mut mode, &mut printed).await {
                break;
            }
        } else {
            // Caller contract: at most one chat request in flight.
            if orchestrator.analyzing() {
                println!("Still analyzing the previous question.");
                continue;
            }
            let id = orchestrator.store().active_id().to_string();
            println!("Analyzing...");
            if let Err(err) = orchestrator.submit_query(&id, &line).await {
                println!("{err}");
            }
            flush_transcript(&orchestrator, &mut printed);
        }
    }

    orchestrator.shutdown().await;
    Ok(())
}

/// Handle one slash command. Returns false when the loop should exit.
async fn dispatch(
    orchestrator: &mut Orchestrator,
    input: &str,
    mode: &mut DisplayMode,
    printed: &mut HashMap<String, u64>,
) -> bool {
    let input = input.trim_start();
    let mut parts = input.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let rest = input[command.len()..].trim();

    match command {
        "upload" => {
            if rest.is_empty() {
                println!("Usage: /upload <path>");
            } else {
                upload(orchestrator, Path::new(rest), printed).await;
            }
        }
        "remove" => {
            let id = orchestrator.store().active_id().to_string();
            if orchestrator.store().active().image.is_empty() {
                println!("No image attached.");
            } else if let Err(err) = orchestrator.remove_image(&id) {
                println!("{err}");
            } else {
                println!("Image removed. Upload a new one to continue.");
            }
        }
        "new" => {
            orchestrator.store_mut().create();
            flush_transcript(orchestrator, printed);
        }
        "sessions" => list_sessions(orchestrator),
        "switch" => match rest.parse::<usize>() {
            Ok(index) => switch_session(orchestrator, index, printed),
            Err(_) => println!("Usage: /switch <index>"),
        },
        "rename" => {
            let id = orchestrator.store().active_id().to_string();
            match orchestrator.store_mut().rename(&id, rest) {
                Ok(()) => println!("Renamed to \"{}\".", orchestrator.store().active().title),
                Err(err) => println!("{err}"),
            }
        }
        "delete" => {
            let id = orchestrator.store().active_id().to_string();
            match orchestrator.store_mut().delete(&id) {
                Ok(()) => {
                    println!(
                        "Session deleted. Now on \"{}\".",
                        orchestrator.store().active().title
                    );
                }
                Err(err) => println!("{err}"),
            }
        }
        "mode" => match rest {
            "detection" => {
                *mode = DisplayMode::Detection;
                println!("Display mode: detection.");
            }
            "distance" => {
                *mode = DisplayMode::Distance;
                println!("Display mode: distance.");
            }
            _ => println!("Usage: /mode <detection|distance>"),
        },
        "boxes" => {
            let out = if rest.is_empty() {
                Path::new(DEFAULT_OVERLAY_PATH)
            } else {
                Path::new(rest)
            };
            write_overlay(orchestrator, *mode, out);
        }
        "help" => print_help(),
        "quit" | "exit" => return false,
        _ => println!("Unknown command /{command}. Type /help for commands."),
    }
    true
}

/// Upload an image for the active session, then follow warm-up to ready.
async fn upload(
    orchestrator: &mut Orchestrator,
    path: &Path,
    printed: &mut HashMap<String, u64>,
) {
    let id = orchestrator.store().active_id().to_string();
    match orchestrator.submit_upload(&id, path).await {
        Ok(Submission::Completed) => {
            flush_transcript(orchestrator, printed);
            follow_warm_up(orchestrator).await;
        }
        Ok(Submission::Ignored) => println!("No file provided."),
        Ok(_) => {}
        Err(err) => println!("{err}"),
    }
}

/// Print warm-up transitions until the backend reports ready, then linger
/// for the grace period so the final state is visible.
async fn follow_warm_up(orchestrator: &Orchestrator) {
    let mut rx = orchestrator.readiness();
    let mut last_detail = String::new();
    loop {
        let state = rx.borrow().clone();
        if state.detail != last_detail {
            last_detail.clone_from(&state.detail);
            println!(
                "[{}/{}] {}  >> {}... OK",
                state.step, state.total_steps, state.message, state.detail
            );
        }
        if state.ready {
            break;
        }
        if rx.changed().await.is_err() {
            break;
        }
    }
    tokio::time::sleep(READY_GRACE).await;
    println!("System online.");
}

fn list_sessions(orchestrator: &Orchestrator) {
    let active = orchestrator.store().active_id().to_string();
    for (index, session) in orchestrator.store().list().iter().enumerate() {
        let marker = if session.id == active { "*" } else { " " };
        let phase = orchestrator
            .upload_phase(&session.id)
            .map_or("?", phase_label);
        println!(
            "{marker} [{index}] {} (created {}, {} messages, {phase})",
            session.title,
            session.created_at.format("%H:%M"),
            session.messages().len()
        );
    }
}

fn switch_session(
    orchestrator: &mut Orchestrator,
    index: usize,
    printed: &mut HashMap<String, u64>,
) {
    let Some(id) = orchestrator
        .store()
        .list()
        .get(index)
        .map(|s| s.id.clone())
    else {
        println!("No session at index {index}.");
        return;
    };
    if let Err(err) = orchestrator.store_mut().set_active(&id) {
        println!("{err}");
        return;
    }
    let session = orchestrator.store().active();
    println!("Switched to \"{}\".", session.title);
    // Replay the whole transcript so the conversation has its context back.
    printed.remove(&session.id);
    flush_transcript(orchestrator, printed);
}

/// Render the active session's latest grounding as an SVG overlay.
fn write_overlay(orchestrator: &Orchestrator, mode: DisplayMode, out: &Path) {
    let session = orchestrator.store().active();
    let detections = session.latest_grounding();
    if detections.is_empty() {
        println!("No detections to draw yet. Ask a question that locates objects first.");
        return;
    }
    let Some(preview) = session.image.preview() else {
        println!("No image attached to this session.");
        return;
    };
    let (width, height) = match image::image_dimensions(preview) {
        Ok(dims) => dims,
        Err(err) => {
            println!(
                "{}",
                Error::InvalidImage {
                    path: preview.to_path_buf(),
                    reason: err.to_string(),
                }
            );
            return;
        }
    };
    let scene = project(width, height, detections, mode);
    let svg = scene_to_svg(&scene);
    match std::fs::write(out, svg) {
        Ok(()) => println!(
            "Wrote {} annotation(s) to {}.",
            scene.annotations.len(),
            out.display()
        ),
        Err(err) => println!("Failed to write {}: {err}", out.display()),
    }
}

const fn phase_label(phase: UploadPhase) -> &'static str {
    match phase {
        UploadPhase::NoImage => "no image",
        UploadPhase::Uploading => "uploading",
        UploadPhase::Warming => "warming",
        UploadPhase::Ready => "ready",
    }
}

/// Print transcript entries the user has not seen yet, tracked by the last
/// printed message id per session.
fn flush_transcript(orchestrator: &Orchestrator, printed: &mut HashMap<String, u64>) {
    let session = orchestrator.store().active();
    let last_seen = printed.get(&session.id).copied();
    for message in session.messages() {
        if last_seen.is_some_and(|id| message.id <= id) {
            continue;
        }
        print_message(message);
    }
    if let Some(last) = session.messages().last() {
        printed.insert(session.id.clone(), last.id);
    }
}

fn print_message(message: &Message) {
    let speaker = match message.role {
        MessageRole::User => "you",
        MessageRole::Assistant => "sightline",
    };
    println!("[{}] {speaker}: {}", message.display_time(), message.text);
    for detection in &message.grounding {
        println!(
            "    - {} (score {:.2}) at ({:.0}, {:.0})",
            detection.label, detection.score, detection.bbox.cx, detection.bbox.cy
        );
    }
}

fn print_help() {
    println!("Commands:");
    println!("  /upload <path>            Upload an image for this session");
    println!("  /remove                   Remove the session's image");
    println!("  /new                      Create a new session");
    println!("  /sessions                 List sessions");
    println!("  /switch <index>           Switch to a session");
    println!("  /rename <title>           Rename the active session");
    println!("  /delete                   Delete the active session");
    println!("  /mode <detection|distance> Set the overlay display mode");
    println!("  /boxes [path]             Write the latest detections as SVG");
    println!("  /quit                     Exit");
    println!();
    println!("Anything else is sent to the backend as a question.");
}

fn prompt() -> Result<()> {
    let mut out = std::io::stdout();
    write!(out, "> ")?;
    out.flush()?;
    Ok(())
}
