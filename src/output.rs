//! # Output Configuration
//!
//! Formatting of the per-mirror status lines printed by fleet commands, and
//! the color settings they honor.
//!
//! Color is decided once per run from the `--color` flag and the
//! environment:
//! - `--color=never|always|auto`
//! - `NO_COLOR` disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` disables colors
//! - `CLICOLOR_FORCE=1` forces colors even when stdout is not a terminal
//! - `TERM=dumb` disables colors

use std::env;

use console::style;

use crate::recovery::{Event, MirrorReport, MirrorState, MirrorStatus};

/// Output configuration for controlling colors and symbols.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and symbols should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// In auto mode, colors are disabled if `NO_COLOR` is set, `CLICOLOR=0`,
    /// `TERM=dumb`, or stdout is not a terminal (unless `CLICOLOR_FORCE=1`).
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        // presence alone disables, even when empty
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns the symbol when colors are enabled, otherwise the plain text.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

#[derive(Clone, Copy)]
enum Tone {
    Good,
    Notice,
    Bad,
}

fn tone_of(event: &Event) -> Tone {
    match event {
        Event::Cloned | Event::Locked | Event::Unlocked | Event::Pulled | Event::Removed => {
            Tone::Good
        }
        Event::Failed(_) => Tone::Bad,
        _ => Tone::Notice,
    }
}

fn paint(config: &OutputConfig, tone: Tone, text: &str) -> String {
    if !config.use_color {
        return text.to_string();
    }
    match tone {
        Tone::Good => style(text).green().to_string(),
        Tone::Notice => style(text).yellow().to_string(),
        Tone::Bad => style(text).red().bold().to_string(),
    }
}

/// One line per event, e.g. `core: commits didn't match, pulled`.
pub fn report_lines(config: &OutputConfig, report: &MirrorReport) -> Vec<String> {
    report
        .events
        .iter()
        .map(|event| {
            let tone = tone_of(event);
            let mark = match tone {
                Tone::Good => emoji(config, "✓", "[ok]"),
                Tone::Notice => emoji(config, "•", "[..]"),
                Tone::Bad => emoji(config, "✗", "[!!]"),
            };
            format!(
                "{} {}: {}",
                paint(config, tone, mark),
                report.name,
                event
            )
        })
        .collect()
}

/// Closing line of a fleet command, e.g. `3 mirrors: 2 synced, 1 failed`.
pub fn summary_line(reports: &[MirrorReport]) -> String {
    let count = |state: MirrorState| reports.iter().filter(|r| r.state == state).count();
    let mut parts = Vec::new();
    for state in [
        MirrorState::Synced,
        MirrorState::Dirty,
        MirrorState::Diverged,
        MirrorState::Absent,
        MirrorState::Failed,
    ] {
        let n = count(state);
        if n > 0 {
            parts.push(format!("{} {}", n, state));
        }
    }
    let noun = if reports.len() == 1 { "mirror" } else { "mirrors" };
    if parts.is_empty() {
        format!("{} {}", reports.len(), noun)
    } else {
        format!("{} {}: {}", reports.len(), noun, parts.join(", "))
    }
}

/// Human-readable line for `gpack check`.
pub fn status_line(config: &OutputConfig, status: &MirrorStatus) -> String {
    if !status.exists {
        return format!(
            "{} {}: not installed",
            paint(config, Tone::Notice, emoji(config, "•", "[..]")),
            status.name
        );
    }

    let lock = if status.locked { "locked" } else { "unlocked" };
    let tree = if status.clean { "clean" } else { "dirty" };
    let history = if status.commits_match {
        "up to date"
    } else {
        "diverged"
    };
    let branch = status.branch.as_deref().unwrap_or("?");
    let tone = if status.is_consistent() {
        Tone::Good
    } else {
        Tone::Bad
    };
    let mark = if status.is_consistent() {
        emoji(config, "✓", "[ok]")
    } else {
        emoji(config, "✗", "[!!]")
    };
    format!(
        "{} {} ({}): {}, {}, {}",
        paint(config, tone, mark),
        status.name,
        branch,
        lock,
        tree,
        history
    )
}
