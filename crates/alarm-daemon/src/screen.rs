//! Pure screen composition.
//!
//! The coordinator gathers a `Frame` snapshot and `compose` decides what the
//! display shows.  Nothing here touches the display itself.
use std::fmt;

use alarm_proto::state::Alarm;
use unicode_width::UnicodeWidthStr;

use crate::mode::{Mode, PopUp};

pub const DISPLAY_WIDTH: usize = 128;
pub const CHAR_WIDTH: usize = 6;
/// Blank pixels between the end of a scrolling label and its next pass.
pub const SCROLL_GAP: usize = 20;

const VISIBLE_COLUMNS: usize = DISPLAY_WIDTH / CHAR_WIDTH;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub text: String,
    /// Horizontal offset in pixels; `None` when the text fits.
    pub scroll: Option<usize>,
}

impl Label {
    pub fn new(text: impl Into<String>, tick: usize) -> Self {
        let text = text.into();
        let width = Self::pixel_width(&text);
        let scroll = (width > DISPLAY_WIDTH).then(|| tick % (width + SCROLL_GAP));
        Self { text, scroll }
    }

    pub fn pixel_width(text: &str) -> usize {
        text.width() * CHAR_WIDTH
    }

    /// The columns currently visible on the panel.
    fn visible(&self) -> String {
        match self.scroll {
            None => self.text.clone(),
            Some(offset) => {
                let gap = " ".repeat(SCROLL_GAP.div_ceil(CHAR_WIDTH));
                let cycle: Vec<char> = self.text.chars().chain(gap.chars()).collect();
                let start = (offset / CHAR_WIDTH) % cycle.len();
                cycle
                    .iter()
                    .cycle()
                    .skip(start)
                    .take(VISIBLE_COLUMNS)
                    .collect()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Intro,
    Clock {
        hour: u32,
        minute: u32,
        label: Label,
        alarm_enabled: bool,
        ringing: bool,
    },
    AlarmSettings {
        hour: u8,
        minute: u8,
        enabled: bool,
        label: Label,
    },
    Volume {
        volume: u8,
    },
    SnoozeOff,
    End,
}

impl Screen {
    /// True when the frame carries a scrolling label.
    pub fn is_animated(&self) -> bool {
        match self {
            Screen::Clock { label, .. } | Screen::AlarmSettings { label, .. } => {
                label.scroll.is_some()
            }
            _ => false,
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Screen::Intro => write!(f, "[intro] Alarm radio"),
            Screen::Clock {
                hour,
                minute,
                label,
                alarm_enabled,
                ringing,
            } => {
                let bell = match (alarm_enabled, ringing) {
                    (_, true) => " (ringing)",
                    (true, false) => " (alarm)",
                    (false, false) => "",
                };
                write!(f, "[clock] {:02}:{:02}{} {}", hour, minute, bell, label.visible())
            }
            Screen::AlarmSettings {
                hour,
                minute,
                enabled,
                label,
            } => write!(
                f,
                "[alarm] {:02}:{:02} {} {}",
                hour,
                minute,
                if *enabled { "on" } else { "off" },
                label.visible()
            ),
            Screen::Volume { volume } => write!(f, "[volume] {}%", volume),
            Screen::SnoozeOff => write!(f, "[snooze] Snooze off"),
            Screen::End => write!(f, "[end] See you!"),
        }
    }
}

/// Everything screen composition depends on.
#[derive(Debug, Clone)]
pub struct Frame {
    pub mode: Mode,
    pub popup: PopUp,
    pub animation_tick: usize,
    pub time: (u32, u32),
    pub alarm: Alarm,
    pub ringing: bool,
    pub volume: u8,
    /// Name of what plays right now, if anything.
    pub now_playing: Option<String>,
    /// Name of the alarm target, if it has one.
    pub alarm_target: Option<String>,
}

pub fn compose(frame: &Frame) -> Screen {
    match frame.popup {
        PopUp::Volume => {
            return Screen::Volume {
                volume: frame.volume,
            }
        }
        PopUp::SnoozeOff => return Screen::SnoozeOff,
        PopUp::None => {}
    }

    match frame.mode {
        Mode::Undefined => Screen::Intro,
        Mode::End => Screen::End,
        Mode::Clock => Screen::Clock {
            hour: frame.time.0,
            minute: frame.time.1,
            label: Label::new(
                frame.now_playing.clone().unwrap_or_default(),
                frame.animation_tick,
            ),
            alarm_enabled: frame.alarm.enabled,
            ringing: frame.ringing,
        },
        Mode::AlarmSetting => Screen::AlarmSettings {
            hour: frame.alarm.hour,
            minute: frame.alarm.minute,
            enabled: frame.alarm.enabled,
            label: Label::new(
                frame.alarm_target.clone().unwrap_or_default(),
                frame.animation_tick,
            ),
        },
    }
}
