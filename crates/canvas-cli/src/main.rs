use std::borrow::Cow::{self, Borrowed, Owned};
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use rustyline::Editor;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use canvas_application::{ConversationPipeline, InteractionOutcome, SessionHandle};
use canvas_audio::{AudioBackend, AudioEngine, NullBackend, RodioBackend};
use canvas_core::chat::MessageRole;
use canvas_core::mood::Language;
use canvas_core::state::{CanvasAction, CanvasState};
use canvas_core::view::Point;
use canvas_interaction::{BackendConfig, HttpImageAgent, HttpReasoningAgent};

/// Screen-space viewport assumed for camera math in the terminal client.
const VIEWPORT: (f64, f64) = (1280.0, 800.0);

const COMMANDS: [&str; 12] = [
    "/drill",
    "/associate",
    "/connect",
    "/choose",
    "/select",
    "/nodes",
    "/chat",
    "/pan",
    "/zoom",
    "/voice",
    "/music",
    "/lang",
];

/// CLI helper for rustyline that provides completion, highlighting, and hints.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

/// Builds the audio engine from the environment. `INNERCANVAS_NO_AUDIO`
/// forces the silent backend; `INNERCANVAS_ASSETS_DIR` locates the mood
/// tracks and `INNERCANVAS_TTS` names the speech synthesizer command.
fn build_audio_engine() -> AudioEngine {
    let backend: Arc<dyn AudioBackend> = if std::env::var_os("INNERCANVAS_NO_AUDIO").is_some() {
        Arc::new(NullBackend)
    } else {
        let assets_dir =
            std::env::var("INNERCANVAS_ASSETS_DIR").unwrap_or_else(|_| "assets".to_string());
        let tts = std::env::var("INNERCANVAS_TTS").ok();
        Arc::new(RodioBackend::new(assets_dir, tts))
    };
    AudioEngine::new(backend)
}

/// Prints every chat message past `printed`, returning the new count.
fn render_new_messages(state: &CanvasState, printed: usize) -> usize {
    for message in state.chat_history.iter().skip(printed) {
        match message.role {
            MessageRole::User => {
                println!("{}", format!("> {}", message.content).green());
            }
            MessageRole::Model => {
                for line in message.content.lines() {
                    println!("{}", line.bright_blue());
                }
                if let Some(options) = &message.options {
                    let header = message.options_header.as_deref().unwrap_or("Choose one");
                    println!("{}", format!("{header}:").bright_yellow());
                    for (i, option) in options.iter().enumerate() {
                        println!(
                            "  {} {} {}",
                            format!("[{}]", i + 1).yellow(),
                            option.label.bright_yellow(),
                            format!("- {}", option.description).bright_black()
                        );
                    }
                    println!("{}", "Pick with /choose <number>".bright_black());
                }
            }
        }
        println!();
    }
    state.chat_history.len()
}

/// Prints nodes added past `printed`, returning the new count.
fn render_new_nodes(state: &CanvasState, printed: usize) -> usize {
    for node in state.graph.nodes.iter().skip(printed) {
        println!(
            "{}",
            format!("New evidence pinned: {} ({})", node.title, node.insight).bright_magenta()
        );
        println!();
    }
    state.graph.nodes.len()
}

fn render_nodes(state: &CanvasState) {
    if state.graph.nodes.is_empty() {
        println!("{}", "The canvas is empty.".bright_black());
        return;
    }
    for (i, node) in state.graph.nodes.iter().enumerate() {
        let selected = state.graph.selected_node_ids.contains(&node.id);
        let marker = if selected { "*" } else { " " };
        let image = match (&node.image_url, node.is_loading_image) {
            (_, true) => "image pending",
            (Some(_), false) => "image ready",
            (None, false) => "no image",
        };
        let line = format!(
            "{marker} [{i}] {} at ({:.0}, {:.0}) - {} ({image})",
            node.title, node.x, node.y, node.insight
        );
        if selected {
            println!("{}", line.bright_white());
        } else {
            println!("{line}");
        }
    }
    for edge in &state.graph.edges {
        let label = edge.label.as_deref().unwrap_or("Connected");
        println!(
            "{}",
            format!("    {} --[{}]--> {}", edge.source_id, label, edge.target_id).bright_black()
        );
    }
}

fn render_chat(state: &CanvasState) {
    if state.chat_history.is_empty() {
        println!("{}", "No conversation yet.".bright_black());
        return;
    }
    for message in &state.chat_history {
        match message.role {
            MessageRole::User => println!("{}", format!("> {}", message.content).green()),
            MessageRole::Model => println!("{}", message.content.bright_blue()),
        }
    }
}

fn parse_on_off(arg: Option<&str>) -> Option<bool> {
    match arg {
        Some("on") => Some(true),
        Some("off") => Some(false),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // ===== Backend Initialization =====
    let config = BackendConfig::load()?;
    let reasoning = Arc::new(HttpReasoningAgent::new(&config.api_base_url)?);
    let imagery = Arc::new(HttpImageAgent::new(&config.api_base_url)?);
    let audio = build_audio_engine();

    let session = SessionHandle::new();
    session.center_initial_view(VIEWPORT.0, VIEWPORT.1).await;
    // The initial state has music enabled; bring the engine in line.
    audio.set_music_enabled(true).await;

    let pipeline = Arc::new(ConversationPipeline::new(
        session.clone(),
        reasoning,
        imagery,
        audio,
        VIEWPORT,
    ));

    // Channel carrying finished-interaction notifications back to the
    // printer so slow responses never block the prompt.
    let (outcome_tx, mut outcome_rx) = mpsc::channel::<InteractionOutcome>(32);

    let printer_pipeline = pipeline.clone();
    let printer = tokio::spawn(async move {
        let mut printed_messages = 0;
        let mut printed_nodes = 0;
        while let Some(outcome) = outcome_rx.recv().await {
            match outcome {
                InteractionOutcome::Completed => {
                    let state = printer_pipeline.session().snapshot().await;
                    printed_messages = render_new_messages(&state, printed_messages);
                    printed_nodes = render_new_nodes(&state, printed_nodes);
                }
                InteractionOutcome::Stale => {
                    // Superseded by a newer interaction; nothing to show.
                }
                InteractionOutcome::NoOp => {
                    println!(
                        "{}",
                        "Nothing to do. Check the selection with /nodes.".bright_black()
                    );
                }
            }
        }
    });

    // ===== REPL Setup =====
    let helper = CliHelper::new();
    let mut rl = Editor::new()?;
    rl.set_helper(Some(helper));

    println!("{}", "=== Inner Canvas ===".bright_magenta().bold());
    println!(
        "{}",
        "Type to talk, /drill /associate /connect to work the selection, or 'quit' to exit."
            .bright_black()
    );
    println!();

    // ===== Main REPL Loop =====
    loop {
        let readline = rl.readline(">> ");

        match readline {
            Ok(line) => {
                let trimmed = line.trim();

                if trimmed == "quit" || trimmed == "exit" {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);

                let mut parts = trimmed.split_whitespace();
                let command = parts.next().unwrap_or_default();
                match command {
                    "/drill" => {
                        let p = pipeline.clone();
                        let tx = outcome_tx.clone();
                        tokio::spawn(async move {
                            let _ = tx.send(p.drill_down().await).await;
                        });
                    }
                    "/associate" => {
                        let p = pipeline.clone();
                        let tx = outcome_tx.clone();
                        tokio::spawn(async move {
                            let _ = tx.send(p.free_associate().await).await;
                        });
                    }
                    "/connect" => {
                        let p = pipeline.clone();
                        let tx = outcome_tx.clone();
                        tokio::spawn(async move {
                            let _ = tx.send(p.synthesize().await).await;
                        });
                    }
                    "/choose" => {
                        let index: Option<usize> = parts.next().and_then(|a| a.parse().ok());
                        let option = pipeline
                            .session()
                            .read(|s| {
                                let options = s
                                    .chat_history
                                    .iter()
                                    .rev()
                                    .find_map(|m| m.options.as_ref())?;
                                index
                                    .and_then(|i| i.checked_sub(1))
                                    .and_then(|i| options.get(i))
                                    .cloned()
                            })
                            .await;
                        match option {
                            Some(option) => {
                                let p = pipeline.clone();
                                let tx = outcome_tx.clone();
                                tokio::spawn(async move {
                                    let _ = tx.send(p.choose_option(&option).await).await;
                                });
                            }
                            None => {
                                println!("{}", "No such option to choose.".yellow());
                            }
                        }
                    }
                    "/select" => {
                        let index: Option<usize> = parts.next().and_then(|a| a.parse().ok());
                        let shift = parts.next() == Some("shift");
                        let id = match index {
                            Some(i) => {
                                pipeline
                                    .session()
                                    .read(|s| s.graph.nodes.get(i).map(|n| n.id.clone()))
                                    .await
                            }
                            None => None,
                        };
                        match id {
                            Some(id) => {
                                pipeline
                                    .session()
                                    .apply(CanvasAction::ClickSelect { id, shift })
                                    .await;
                                let state = pipeline.session().snapshot().await;
                                render_nodes(&state);
                            }
                            None => println!(
                                "{}",
                                "Usage: /select <index> [shift]  (see /nodes)".yellow()
                            ),
                        }
                    }
                    "/nodes" => {
                        let state = pipeline.session().snapshot().await;
                        render_nodes(&state);
                    }
                    "/chat" => {
                        let state = pipeline.session().snapshot().await;
                        render_chat(&state);
                    }
                    "/pan" => {
                        let dx: Option<f64> = parts.next().and_then(|a| a.parse().ok());
                        let dy: Option<f64> = parts.next().and_then(|a| a.parse().ok());
                        match (dx, dy) {
                            (Some(dx), Some(dy)) => {
                                pipeline.session().apply(CanvasAction::Pan { dx, dy }).await;
                                let view = pipeline.session().read(|s| s.view).await;
                                println!(
                                    "{}",
                                    format!(
                                        "View at ({:.0}, {:.0}) scale {:.2}",
                                        view.x, view.y, view.scale
                                    )
                                    .bright_black()
                                );
                            }
                            _ => println!("{}", "Usage: /pan <dx> <dy>".yellow()),
                        }
                    }
                    "/zoom" => {
                        let delta = match parts.next() {
                            Some("in") => Some(1.0),
                            Some("out") => Some(-1.0),
                            _ => None,
                        };
                        match delta {
                            Some(delta) => {
                                let center = Point::new(VIEWPORT.0 / 2.0, VIEWPORT.1 / 2.0);
                                pipeline
                                    .session()
                                    .apply(CanvasAction::Zoom { delta, center })
                                    .await;
                                let scale = pipeline.session().read(|s| s.view.scale).await;
                                println!("{}", format!("Scale {scale:.2}").bright_black());
                            }
                            None => println!("{}", "Usage: /zoom in|out".yellow()),
                        }
                    }
                    "/voice" => match parse_on_off(parts.next()) {
                        Some(enabled) => {
                            pipeline.set_speaking(enabled).await;
                            println!(
                                "{}",
                                format!("Voice {}", if enabled { "on" } else { "off" })
                                    .bright_black()
                            );
                        }
                        None => println!("{}", "Usage: /voice on|off".yellow()),
                    },
                    "/music" => match parse_on_off(parts.next()) {
                        Some(enabled) => {
                            pipeline.set_music(enabled).await;
                            println!(
                                "{}",
                                format!("Music {}", if enabled { "on" } else { "off" })
                                    .bright_black()
                            );
                        }
                        None => println!("{}", "Usage: /music on|off".yellow()),
                    },
                    "/lang" => {
                        let language = parts.next().and_then(|a| a.parse::<Language>().ok());
                        match language {
                            Some(language) => {
                                pipeline.set_language(language).await;
                                println!("{}", format!("Language set to {language}").bright_black());
                            }
                            None => println!("{}", "Usage: /lang en|zh|ja|ko|es|fr".yellow()),
                        }
                    }
                    _ if command.starts_with('/') => {
                        println!("{}", "Unknown command".bright_black());
                    }
                    _ => {
                        let p = pipeline.clone();
                        let tx = outcome_tx.clone();
                        let input = trimmed.to_string();
                        tokio::spawn(async move {
                            let _ = tx.send(p.submit_text(&input).await).await;
                        });
                    }
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    // Drop the channel to signal shutdown and let the printer drain.
    drop(outcome_tx);
    let _ = printer.await;

    Ok(())
}
