//! Human-mode status lines
//!
//! Everything goes to stderr so bundled code on stdout stays pipeable.
//! Colour follows stderr: none when it is not a terminal or `NO_COLOR` is
//! set.

use std::sync::OnceLock;

use owo_colors::{OwoColorize, Style};

use crate::ui::Icons;

static COLOUR: OnceLock<bool> = OnceLock::new();

/// Role of a piece of text in a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Header,
    Success,
    Error,
    Info,
    Dim,
}

impl Tone {
    pub fn style(self) -> Style {
        let colour = *COLOUR.get_or_init(|| {
            wants_colour(console::Term::stderr().is_term(), std::env::var("NO_COLOR").ok().as_deref())
        });
        if colour { self.colored() } else { Style::new() }
    }

    fn colored(self) -> Style {
        match self {
            Tone::Header => Style::new().cyan().bold(),
            Tone::Success => Style::new().green().bold(),
            Tone::Error => Style::new().red().bold(),
            Tone::Info => Style::new().magenta(),
            Tone::Dim => Style::new().white().dimmed(),
        }
    }
}

fn wants_colour(is_term: bool, no_color: Option<&str>) -> bool {
    is_term && no_color.is_none_or(str::is_empty)
}

pub fn header(text: &str) {
    eprintln!("{} {}", Icons::PACKAGE, text.style(Tone::Header.style()));
}

pub fn success(label: &str) {
    eprintln!("{} {}", Icons::CHECK, label.style(Tone::Success.style()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(Tone::Error.style()));
}

pub fn info(label: &str, value: &str) {
    eprintln!(
        "{} {}: {}",
        Icons::INFO.style(Tone::Info.style()),
        label.style(Tone::Dim.style()),
        value
    );
}

pub fn dim(text: &str) -> String {
    text.style(Tone::Dim.style()).to_string()
}

pub fn file_written(icon: &str, path: &str, bytes: Option<usize>) {
    let icon = icon.style(Tone::Success.style());
    match bytes {
        Some(bytes) => eprintln!("{} {} {}", icon, path, dim(&human_bytes(bytes))),
        None => eprintln!("{} {}", icon, path),
    }
}

pub fn timing(elapsed: &str) {
    eprintln!("{} {}", Icons::CLOCK.style(Tone::Dim.style()), elapsed);
}

pub fn summary_row(label: &str, value: &str) {
    eprintln!("  {} {}", label.style(Tone::Dim.style()), value);
}

pub fn human_bytes(bytes: usize) -> String {
    const UNITS: [&str; 3] = ["B", "KB", "MB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colour_needs_a_terminal() {
        assert!(wants_colour(true, None));
        assert!(wants_colour(true, Some("")));
        assert!(!wants_colour(true, Some("1")));
        assert!(!wants_colour(false, None));
    }

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2048), "2.0 KB");
        assert_eq!(human_bytes(3 * 1024 * 1024 + 512 * 1024), "3.5 MB");
    }
}
