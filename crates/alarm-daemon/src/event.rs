//! Typed events flowing from the producers into the coordinator.
use alarm_proto::protocol::{PlaylistId, WebradioId};
use tokio::sync::oneshot;

use crate::player::PlaybackError;
use crate::timers::TimerToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonId {
    Digit1,
    Digit2,
    Digit3,
    Digit4,
    Digit5,
    Digit6,
    Playlist,
    AlarmSetting,
    More,
    Less,
    Snooze,
    NextPowerOff,
}

impl ButtonId {
    pub const ALL: [ButtonId; 12] = [
        ButtonId::Digit1,
        ButtonId::Digit2,
        ButtonId::Digit3,
        ButtonId::Digit4,
        ButtonId::Digit5,
        ButtonId::Digit6,
        ButtonId::Playlist,
        ButtonId::AlarmSetting,
        ButtonId::More,
        ButtonId::Less,
        ButtonId::Snooze,
        ButtonId::NextPowerOff,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Radio group bound to a digit button.
    pub fn digit_group(self) -> Option<u32> {
        match self {
            ButtonId::Digit1 => Some(1),
            ButtonId::Digit2 => Some(2),
            ButtonId::Digit3 => Some(3),
            ButtonId::Digit4 => Some(4),
            ButtonId::Digit5 => Some(5),
            ButtonId::Digit6 => Some(6),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Emitted on every press-step while the button is held.
    Press,
    /// Emitted once when the button goes up, carrying the final step count.
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub button: ButtonId,
    pub phase: Phase,
    pub step_count: u32,
}

impl ButtonEvent {
    pub fn press(button: ButtonId, step_count: u32) -> Self {
        Self {
            button,
            phase: Phase::Press,
            step_count,
        }
    }

    pub fn release(button: ButtonId, step_count: u32) -> Self {
        Self {
            button,
            phase: Phase::Release,
            step_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    /// The displayed HH:MM changed.
    MinuteTick,
    /// The armed alarm time was reached (once per matching minute).
    AlarmDue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebradioEvent {
    /// The stream process exited on its own.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistEvent {
    /// The running track ended; the next one started or the playlist idled.
    TrackChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiCommand {
    PlayWebradio(WebradioId),
    PlayPlaylist(PlaylistId),
    SetVolume(i64),
}

/// A remote-control request.  The HTTP handler waits on `reply`.
#[derive(Debug)]
pub struct ApiRequest {
    pub command: ApiCommand,
    pub reply: oneshot::Sender<Result<(), PlaybackError>>,
}

/// Events the coordinator schedules for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalEvent {
    PopupHide(TimerToken),
    AnimationTick(TimerToken),
    SnoozeWake(TimerToken),
}

/// Everything the coordinator can be woken up by.
#[derive(Debug)]
pub enum Event {
    Internal(InternalEvent),
    Clock(ClockEvent),
    Api(ApiRequest),
    Webradio(WebradioEvent),
    Playlist(PlaylistEvent),
    Button(ButtonEvent),
}
