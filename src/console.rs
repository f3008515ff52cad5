//! Console screens and prompts
//!
//! Screens are built as plain strings by `render_*` functions and printed by
//! [`show`]. Lines are joined with `\r\n` since the keyboard feed keeps the
//! terminal in raw mode while the learn and usage screens are up.

use anyhow::{Context, Result};
use colored::*;
use crossterm::{cursor::MoveTo, execute, terminal::Clear, terminal::ClearType};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::Write;
use std::path::Path;

use crate::device::PortInfo;
use crate::engine::{HoldMode, LearnStatus};
use crate::mapping::{LoadStatus, SaveResult};

const RULE: &str = "---------------------------";
const HEADER_RULE: &str = "=============================================================";

/// What to do after the device is selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Learn a new mapping, then continue into usage
    Map,
    /// Use the loaded mapping
    Use,
}

impl Mode {
    fn from_index(index: usize) -> Self {
        if index == 0 {
            Mode::Map
        } else {
            Mode::Use
        }
    }
}

/// List of input ports as shown before the index prompt
pub fn render_device_list(ports: &[PortInfo]) -> Vec<String> {
    let mut lines = vec!["List of MIDI input devices:".bold().to_string(), RULE.to_string()];
    if ports.is_empty() {
        lines.push("No input ports found".dimmed().to_string());
    }
    for port in ports {
        lines.push(format!("{}: {}", port.index.to_string().cyan(), port.name));
    }
    lines.push(RULE.to_string());
    lines.push(String::new());
    lines
}

pub fn print_device_list(ports: &[PortInfo]) {
    for line in render_device_list(ports) {
        println!("{}", line);
    }
}

/// Parse a typed index, accepting `0..count`
pub fn parse_index(input: &str, count: usize) -> Option<usize> {
    input.trim().parse::<usize>().ok().filter(|index| *index < count)
}

/// Ask for an index until a valid one is typed
pub fn prompt_index(prompt: &str, count: usize) -> Result<usize> {
    let mut rl = DefaultEditor::new().context("Failed to open console input")?;

    loop {
        match rl.readline(prompt) {
            Ok(line) => match parse_index(&line, count) {
                Some(index) => return Ok(index),
                None => print_wrong_index(),
            },
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                anyhow::bail!("Selection cancelled")
            }
            Err(e) => return Err(e).context("Console input read error"),
        }
    }
}

pub fn print_wrong_index() {
    println!("{}", "Wrong index selected".red());
}

/// Header shown on top of every screen after device selection
pub fn render_header(device: &str) -> Vec<String> {
    vec![
        format!("MIDI In device selected: {}", device.bold()),
        HEADER_RULE.to_string(),
        String::new(),
    ]
}

pub fn render_mode_menu(device: &str, load: LoadStatus, mapping: &Path) -> Vec<String> {
    let mut lines = render_header(device);

    lines.push(format!("Mapping file: {}", mapping.display()));

    lines.push(match load {
        LoadStatus::Loaded { .. } => format!("Mapping file {}", "found and loaded".green()),
        LoadStatus::NotFound | LoadStatus::Failed => {
            format!("Mapping file {}", "not found / not loaded".yellow())
        }
    });
    if let LoadStatus::Loaded { skipped, .. } = load {
        if skipped > 0 {
            lines.push(format!("{} malformed line(s) skipped", skipped).yellow().to_string());
        }
    }
    lines.push(String::new());

    lines.push("Select option:".bold().to_string());
    lines.push(RULE.to_string());
    lines.push("0. Map keys".to_string());
    lines.push("1. Start usage".to_string());
    lines.push(RULE.to_string());
    lines.push(String::new());
    lines
}

/// Show the mode menu and read the choice
pub fn prompt_mode(device: &str, load: LoadStatus, mapping: &Path) -> Result<Mode> {
    for line in render_mode_menu(device, load, mapping) {
        println!("{}", line);
    }
    prompt_index("", 2).map(Mode::from_index)
}

pub fn render_learn_screen(device: &str, status: &LearnStatus) -> String {
    let mut lines = render_header(device);

    lines.push("Press MIDI key, then press one or more keyboard keys to map".to_string());
    lines.push(
        "When finished with current MIDI key, just press next MIDI key, no need to confirm current mapping in any way"
            .to_string(),
    );
    lines.push("Press Esc anytime to stop mapping process and start normal usage".to_string());
    lines.push(String::new());

    match &status.current {
        None => lines.push("Press MIDI key".cyan().to_string()),
        Some((note, combo)) => {
            lines.push("Press keyboard key(s)".cyan().to_string());
            lines.push(String::new());
            lines.push(format!(
                "MIDI key {} mapped to -> {}",
                note.to_string().bold(),
                combo.to_string().green()
            ));
        }
    }

    lines.join("\r\n")
}

pub fn render_usage_screen(device: &str, save: SaveResult, mode: HoldMode) -> String {
    let mut lines = render_header(device);

    match save {
        SaveResult::NotCalled => {}
        SaveResult::Ok => {
            lines.push(format!("Mappings {}", "saved".green()));
            lines.push(String::new());
        }
        SaveResult::Nok => {
            lines.push(format!("Mappings {}", "not saved".red()));
            lines.push(String::new());
        }
    }

    if mode == HoldMode::PerNote {
        lines.push("Hold mode: per note".dimmed().to_string());
    }
    lines.push("Normal usage process (press Esc to exit the program)".to_string());

    lines.join("\r\n")
}

/// Clear the terminal and print `screen`
pub fn show(screen: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;
    write!(stdout, "{}\r\n", screen)?;
    stdout.flush()
}

/// Print a single line while the terminal may be in raw mode
pub fn print_line(line: &str) {
    print!("{}\r\n", line);
    let _ = std::io::stdout().flush();
}
