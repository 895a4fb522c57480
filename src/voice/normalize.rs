//! Transcript to command mapping

use std::sync::OnceLock;

use regex::Regex;

use crate::command::{Axis, Command};

/// Whole-word direction patterns, checked in this order
fn direction_patterns() -> &'static [(Regex, Axis)] {
    static PATTERNS: OnceLock<Vec<(Regex, Axis)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        Axis::ALL
            .into_iter()
            .filter_map(|axis| {
                Regex::new(&format!(r"(?i)\b{axis}\b"))
                    .ok()
                    .map(|regex| (regex, axis))
            })
            .collect()
    })
}

/// Map a recognized utterance to at most one command.
///
/// Matching is case-insensitive with a fixed priority: `restart`, then
/// `stop`/`play` (both the pause toggle), then `mute` (which also covers
/// `unmute`), then the whole words `up`, `down`, `left`, `right`. A spoken
/// direction only ever yields the HIGH half of its axis.
pub fn normalize(transcript: &str) -> Option<Command> {
    let text = transcript.to_lowercase();

    if text.contains("restart") {
        return Some(Command::Restart);
    }
    if text.contains("stop") || text.contains("play") {
        return Some(Command::PausePlay);
    }
    if text.contains("mute") {
        return Some(Command::Mute);
    }

    direction_patterns()
        .iter()
        .find(|(regex, _)| regex.is_match(&text))
        .map(|(_, axis)| axis.high())
}
