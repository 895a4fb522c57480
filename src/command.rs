//! Command vocabulary understood by the remote console
//!
//! Eleven fixed tokens: a HIGH (press) and LOW (release) for each of the
//! four directional axes, plus three stateless toggles.

use serde::{Deserialize, Serialize};

/// Sent once per successful connection to request the current device state
pub const BOOTSTRAP_TOKEN: &str = "states";

/// Prefix for diagnostic transcript frames
pub const VOICE_PREFIX: &str = "VOICE:";

/// A directional axis of the console's joystick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Up,
    Down,
    Left,
    Right,
}

impl Axis {
    pub const ALL: [Axis; 4] = [Axis::Up, Axis::Down, Axis::Left, Axis::Right];

    /// Press half of this axis
    pub fn high(self) -> Command {
        match self {
            Axis::Up => Command::UpHigh,
            Axis::Down => Command::DownHigh,
            Axis::Left => Command::LeftHigh,
            Axis::Right => Command::RightHigh,
        }
    }

    /// Release half of this axis
    pub fn low(self) -> Command {
        match self {
            Axis::Up => Command::UpLow,
            Axis::Down => Command::DownLow,
            Axis::Left => Command::LeftLow,
            Axis::Right => Command::RightLow,
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::Up => write!(f, "up"),
            Axis::Down => write!(f, "down"),
            Axis::Left => write!(f, "left"),
            Axis::Right => write!(f, "right"),
        }
    }
}

/// A vocabulary command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    UpHigh,
    UpLow,
    DownHigh,
    DownLow,
    LeftHigh,
    LeftLow,
    RightHigh,
    RightLow,
    /// Single toggle for both pause and resume
    PausePlay,
    Restart,
    /// Single toggle for both mute and unmute
    Mute,
}

impl Command {
    pub const ALL: [Command; 11] = [
        Command::UpHigh,
        Command::UpLow,
        Command::DownHigh,
        Command::DownLow,
        Command::LeftHigh,
        Command::LeftLow,
        Command::RightHigh,
        Command::RightLow,
        Command::PausePlay,
        Command::Restart,
        Command::Mute,
    ];

    /// Wire token for this command
    pub fn token(self) -> &'static str {
        match self {
            Command::UpHigh => "UP_HIGH",
            Command::UpLow => "UP_LOW",
            Command::DownHigh => "DOWN_HIGH",
            Command::DownLow => "DOWN_LOW",
            Command::LeftHigh => "LEFT_HIGH",
            Command::LeftLow => "LEFT_LOW",
            Command::RightHigh => "RIGHT_HIGH",
            Command::RightLow => "RIGHT_LOW",
            Command::PausePlay => "PAUSE_PLAY",
            Command::Restart => "RESTART",
            Command::Mute => "MUTE",
        }
    }

    /// Axis this command drives, `None` for toggles
    pub fn axis(self) -> Option<Axis> {
        match self {
            Command::UpHigh | Command::UpLow => Some(Axis::Up),
            Command::DownHigh | Command::DownLow => Some(Axis::Down),
            Command::LeftHigh | Command::LeftLow => Some(Axis::Left),
            Command::RightHigh | Command::RightLow => Some(Axis::Right),
            Command::PausePlay | Command::Restart | Command::Mute => None,
        }
    }

    pub fn is_toggle(self) -> bool {
        self.axis().is_none()
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}
