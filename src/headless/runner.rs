//! Headless mode runner - one grid component driven from stdin
//!
//! Commands arrive one per line on stdin and act on the in-memory view the
//! way a user would; the events they raise flow through the component's
//! message loop like any other.

use std::path::Path;
use std::str::FromStr;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use gridsync_app::config::{init_config_dir, load_settings};
use gridsync_app::view::FilterCondition;
use gridsync_app::{
    ChannelHost, ComponentFrame, ContainerLayout, GridComponent, HostProps, InMemoryGrid, Message,
};
use gridsync_core::prelude::*;
use gridsync_core::{BehaviorRegistry, SortDirection};

use super::HeadlessEvent;

/// Capacity of the stdin command channel
const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// A stdin command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Select(usize),
    Deselect,
    Sort(String, Option<SortDirection>),
    Filter(String, String),
    ClearFilter,
    Edit(usize, String, Value),
    Event(String),
    Update,
    Props(Box<HostProps>),
    Cells,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        match verb {
            "select" => parse_index(rest).map(Command::Select),
            "deselect" => Ok(Command::Deselect),
            "sort" => {
                let mut parts = rest.split_whitespace();
                let field = parts.next().ok_or("usage: sort <field> <asc|desc|none>")?;
                let direction = match parts.next().unwrap_or("asc") {
                    "none" => None,
                    other => Some(SortDirection::from_str(other).map_err(|e| e.to_string())?),
                };
                Ok(Command::Sort(field.to_string(), direction))
            }
            "filter" => {
                let (field, text) = rest
                    .split_once(char::is_whitespace)
                    .ok_or("usage: filter <field> <text>")?;
                Ok(Command::Filter(field.to_string(), text.trim().to_string()))
            }
            "clear-filter" => Ok(Command::ClearFilter),
            "edit" => {
                let mut parts = rest.splitn(3, char::is_whitespace);
                let (Some(index), Some(field), Some(raw)) = (parts.next(), parts.next(), parts.next())
                else {
                    return Err("usage: edit <row> <field> <json>".to_string());
                };
                let raw = raw.trim();
                let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::from(raw));
                Ok(Command::Edit(parse_index(index)?, field.to_string(), value))
            }
            "event" if !rest.is_empty() => Ok(Command::Event(rest.to_string())),
            "update" => Ok(Command::Update),
            "props" => HostProps::from_json(rest)
                .map(|props| Command::Props(Box::new(props)))
                .map_err(|e| e.to_string()),
            "cells" => Ok(Command::Cells),
            "q" | "quit" => Ok(Command::Quit),
            _ => Err(format!("unknown command: {line}")),
        }
    }
}

fn parse_index(text: &str) -> std::result::Result<usize, String> {
    text.trim()
        .parse()
        .map_err(|_| format!("not a row index: {text:?}"))
}

/// Frame that reports to stdout
#[derive(Debug, Default)]
struct HeadlessFrame;

impl ComponentFrame for HeadlessFrame {
    fn append_stylesheet(&mut self, css: &str) {
        HeadlessEvent::stylesheet(css).emit();
    }

    fn set_container(&mut self, layout: &ContainerLayout) {
        debug!("Container: {:?}", layout);
    }

    fn set_refresh_indicator(&mut self, text: &str) {
        HeadlessEvent::refreshed(text).emit();
    }
}

/// Run in headless mode - read host props from `props_path`, settings from
/// `project_path`, and output JSON events
pub async fn run_headless(props_path: &Path, project_path: &Path) -> Result<()> {
    info!("═══════════════════════════════════════════════════════");
    info!("gridsync starting in HEADLESS mode");
    info!("Props: {}", props_path.display());
    info!("Project: {}", project_path.display());
    info!("═══════════════════════════════════════════════════════");

    if let Err(e) = init_config_dir(project_path) {
        warn!("Failed to initialize .gridsync directory: {}", e);
    }
    let settings = load_settings(project_path);

    let text = std::fs::read_to_string(props_path)
        .with_context(|| format!("Cannot read props file {}", props_path.display()))
        .inspect_err(report_fatal)?;
    let props = HostProps::from_json(&text).inspect_err(report_fatal)?;

    let (host, mut payload_rx) = ChannelHost::channel(settings.dispatch.channel_capacity.max(1));
    let mut component = GridComponent::new(
        props,
        settings,
        InMemoryGrid::new(),
        Box::new(host),
        Box::new(HeadlessFrame),
        BehaviorRegistry::with_builtins(),
    )
    .inspect_err(report_fatal)?;

    component.on_grid_ready();
    emit_ready(&component);

    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(COMMAND_CHANNEL_CAPACITY);
    std::thread::spawn(move || {
        spawn_stdin_reader_blocking(cmd_tx);
    });

    let result = headless_event_loop(&mut component, &mut cmd_rx, &mut payload_rx).await;

    // Payloads delivered by the last messages
    while let Ok(payload) = payload_rx.try_recv() {
        HeadlessEvent::payload(payload).emit();
    }

    info!("gridsync headless mode exiting");
    result
}

fn report_fatal(e: &Error) {
    error!("{}", e);
    HeadlessEvent::error(e.to_string(), true).emit();
}

fn emit_ready(component: &GridComponent<InMemoryGrid>) {
    let props = component.props();
    let triggers = component
        .dispatcher()
        .triggers()
        .iter()
        .map(ToString::to_string)
        .collect();
    let layout = ContainerLayout::from_props(props, component.state().grid_height);
    HeadlessEvent::component_ready(
        component.state().snapshot.len(),
        triggers,
        props.is_manual(),
        &layout,
    )
    .emit();
}

/// Main headless event loop
async fn headless_event_loop(
    component: &mut GridComponent<InMemoryGrid>,
    cmd_rx: &mut mpsc::Receiver<Command>,
    payload_rx: &mut mpsc::Receiver<gridsync_core::ReturnPayload>,
) -> Result<()> {
    loop {
        if component.should_quit() {
            info!("Quit requested");
            break;
        }

        tokio::select! {
            Some(msg) = component.msg_rx.recv() => {
                if let Err(e) = component.process_message(msg) {
                    error!("{}", e);
                    HeadlessEvent::error(e.to_string(), e.is_fatal()).emit();
                    if e.is_fatal() {
                        return Err(e);
                    }
                }
            }
            Some(payload) = payload_rx.recv() => {
                HeadlessEvent::payload(payload).emit();
            }
            cmd = cmd_rx.recv() => {
                // stdin closed without "quit"
                let cmd = cmd.unwrap_or(Command::Quit);
                apply_command(component, cmd)?;
            }
        }
    }

    Ok(())
}

/// Apply one stdin command to the component.
///
/// # Errors
///
/// Only fatal errors from new props; everything else is reported as an
/// error event and the loop carries on.
pub fn apply_command(component: &mut GridComponent<InMemoryGrid>, cmd: Command) -> Result<()> {
    debug!("Stdin: {:?}", cmd);
    let outcome = match cmd {
        Command::Select(index) => component.view_mut().select_row(index),
        Command::Deselect => {
            component.view_mut().clear_selection();
            Ok(())
        }
        Command::Sort(field, direction) => {
            component.view_mut().sort_by(&field, direction);
            Ok(())
        }
        Command::Filter(field, text) => {
            component
                .view_mut()
                .set_filter(&field, FilterCondition::parse(&text));
            Ok(())
        }
        Command::ClearFilter => {
            component.view_mut().clear_filters();
            Ok(())
        }
        Command::Edit(index, field, value) => component.view_mut().edit_cell(index, &field, value),
        Command::Event(name) => {
            component.view_mut().raise(&name);
            Ok(())
        }
        Command::Update => component.process_message(Message::ManualUpdate),
        Command::Props(props) => component.process_message(Message::SetProps(props)),
        Command::Cells => {
            HeadlessEvent::cells(presented_rows(component)).emit();
            Ok(())
        }
        Command::Quit => component.process_message(Message::Quit),
    };

    match outcome {
        Err(e) if e.is_fatal() => {
            report_fatal(&e);
            Err(e)
        }
        Err(e) => {
            warn!("Command failed: {}", e);
            HeadlessEvent::error(e.to_string(), false).emit();
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}

fn presented_rows(component: &GridComponent<InMemoryGrid>) -> Vec<Value> {
    component
        .present_displayed_rows()
        .into_iter()
        .map(|cells| {
            Value::Object(
                cells
                    .into_iter()
                    .map(|(field, cell)| (field, serde_json::to_value(cell).unwrap_or(Value::Null)))
                    .collect(),
            )
        })
        .collect()
}

/// Read stdin lines into commands (blocking; run on its own thread)
fn spawn_stdin_reader_blocking(cmd_tx: mpsc::Sender<Command>) {
    use std::io::BufRead;

    let stdin = std::io::stdin();
    let reader = stdin.lock();

    for line in reader.lines() {
        match line {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match trimmed.parse::<Command>() {
                    Ok(cmd) => {
                        let quit = cmd == Command::Quit;
                        if cmd_tx.blocking_send(cmd).is_err() || quit {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Unknown stdin command: {}", trimmed);
                        HeadlessEvent::error(e, false).emit();
                    }
                }
            }
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        }
    }

    info!("Stdin reader exiting");
}
