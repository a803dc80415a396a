//! Button gestures to user intents.
//!
//! `interpret` is pure: the coordinator builds a `Context` snapshot, asks
//! for an intent and executes it.
use crate::event::{ButtonEvent, ButtonId, Phase};
use crate::mode::Mode;

pub const VOLUME_STEP: i32 = 4;

/// Station and playlist buttons repeat on steps 1, 4, 7...
const CYCLE_EVERY: u32 = 3;
/// Holding alarm-setting this long toggles the alarm instead of switching mode.
const ALARM_TOGGLE_STEP: u32 = 6;
const SNOOZE_STEP: u32 = 5;
const SNOOZE_OFF_STEP: u32 = 15;
const POWER_OFF_STEP: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    pub mode: Mode,
    /// A snooze timer exists: the alarm is ringing or snoozed.
    pub alarm_ringing: bool,
    pub playlist_active: bool,
    /// Number of configured webradio groups.
    pub webradio_groups: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    PlayNextWebradio { group_id: u32 },
    CycleAlarmWebradio { group_id: u32 },
    PlayNextPlaylist,
    CycleAlarmPlaylist,
    SwitchMode,
    ToggleAlarmEnabled,
    AdjustVolume(i32),
    AdjustAlarm(i32),
    SwitchDisplay,
    Snooze,
    SnoozeOff,
    NextSong,
    PowerOff,
}

fn is_cycle_step(step_count: u32) -> bool {
    step_count >= 1 && (step_count - 1) % CYCLE_EVERY == 0
}

/// Alarm minutes moved per step: slow at first, then faster the longer the
/// button is held.
fn alarm_increment(step_count: u32) -> i32 {
    match step_count {
        0..=20 => 1,
        21..=30 => 5,
        _ => 30,
    }
}

pub fn interpret(event: &ButtonEvent, ctx: &Context) -> Option<Intent> {
    let editing = match ctx.mode {
        Mode::Clock => false,
        Mode::AlarmSetting => true,
        Mode::Undefined | Mode::End => return None,
    };
    let step = event.step_count;
    let press = event.phase == Phase::Press;

    match event.button {
        ButtonId::Digit1
        | ButtonId::Digit2
        | ButtonId::Digit3
        | ButtonId::Digit4
        | ButtonId::Digit5
        | ButtonId::Digit6 => {
            let group_id = event.button.digit_group()?;
            if !press || !is_cycle_step(step) || group_id > ctx.webradio_groups {
                return None;
            }
            Some(if editing {
                Intent::CycleAlarmWebradio { group_id }
            } else {
                Intent::PlayNextWebradio { group_id }
            })
        }
        ButtonId::Playlist => {
            if !press || !is_cycle_step(step) {
                return None;
            }
            Some(if editing {
                Intent::CycleAlarmPlaylist
            } else {
                Intent::PlayNextPlaylist
            })
        }
        ButtonId::AlarmSetting => match event.phase {
            Phase::Release if step < ALARM_TOGGLE_STEP => Some(Intent::SwitchMode),
            Phase::Press if step == ALARM_TOGGLE_STEP && !editing => {
                Some(Intent::ToggleAlarmEnabled)
            }
            _ => None,
        },
        ButtonId::More | ButtonId::Less => {
            if !press {
                return None;
            }
            let sign = if event.button == ButtonId::More { 1 } else { -1 };
            Some(if editing {
                Intent::AdjustAlarm(sign * alarm_increment(step))
            } else {
                Intent::AdjustVolume(sign * VOLUME_STEP)
            })
        }
        ButtonId::Snooze => match event.phase {
            Phase::Release if step < SNOOZE_STEP => Some(Intent::SwitchDisplay),
            Phase::Press if step == SNOOZE_STEP => Some(Intent::Snooze),
            Phase::Press if step == SNOOZE_OFF_STEP && ctx.alarm_ringing => {
                Some(Intent::SnoozeOff)
            }
            _ => None,
        },
        ButtonId::NextPowerOff => match event.phase {
            Phase::Release if step < POWER_OFF_STEP && ctx.playlist_active => {
                Some(Intent::NextSong)
            }
            Phase::Press if step == POWER_OFF_STEP => Some(Intent::PowerOff),
            _ => None,
        },
    }
}
