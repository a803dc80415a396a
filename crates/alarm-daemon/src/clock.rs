use std::sync::Arc;
use std::time::Duration;

use alarm_proto::state::{Alarm, StateStore};
use chrono::Timelike;
use tokio::sync::mpsc;
use tracing::info;

use crate::event::ClockEvent;
use crate::task::TaskHandle;

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Remembers the minute of the last tick so both events fire on the clock
/// entering a new minute only.  Editing the alarm onto the current minute
/// does not ring it.
#[derive(Debug, Default)]
pub struct ClockWatch {
    previous: Option<(u32, u32)>,
}

impl ClockWatch {
    pub fn tick(&mut self, now: (u32, u32), alarm: &Alarm) -> Vec<ClockEvent> {
        if self.previous == Some(now) {
            return Vec::new();
        }
        self.previous = Some(now);

        let mut events = vec![ClockEvent::MinuteTick];
        if alarm.enabled && alarm.matches(now.0, now.1) {
            events.push(ClockEvent::AlarmDue);
        }
        events
    }
}

pub fn spawn(state: Arc<StateStore>, tx: mpsc::Sender<ClockEvent>) -> TaskHandle {
    TaskHandle::spawn("clock", move |token| async move {
        let mut watch = ClockWatch::default();
        let mut ticker = tokio::time::interval(TICK_INTERVAL);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let now = chrono::Local::now();
                    let alarm = state.alarm().await;
                    for event in watch.tick((now.hour(), now.minute()), &alarm) {
                        if event == ClockEvent::AlarmDue {
                            info!("Alarm time reached: {:02}:{:02}", alarm.hour, alarm.minute);
                        }
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed(hour: u8, minute: u8) -> Alarm {
        Alarm {
            hour,
            minute,
            enabled: true,
            ..Alarm::default()
        }
    }

    #[test]
    fn test_minute_tick_on_change_only() {
        let mut watch = ClockWatch::default();
        let alarm = Alarm::default();
        assert_eq!(watch.tick((10, 0), &alarm), vec![ClockEvent::MinuteTick]);
        assert!(watch.tick((10, 0), &alarm).is_empty());
        assert_eq!(watch.tick((10, 1), &alarm), vec![ClockEvent::MinuteTick]);
    }

    #[test]
    fn test_alarm_fires_once_on_edge() {
        let mut watch = ClockWatch::default();
        let alarm = armed(8, 0);
        assert_eq!(watch.tick((7, 59), &alarm), vec![ClockEvent::MinuteTick]);
        assert_eq!(
            watch.tick((8, 0), &alarm),
            vec![ClockEvent::MinuteTick, ClockEvent::AlarmDue]
        );
        assert!(watch.tick((8, 0), &alarm).is_empty());
        assert_eq!(watch.tick((8, 1), &alarm), vec![ClockEvent::MinuteTick]);
    }

    #[test]
    fn test_disabled_alarm_never_fires() {
        let mut watch = ClockWatch::default();
        let alarm = Alarm {
            enabled: false,
            ..armed(8, 0)
        };
        assert_eq!(watch.tick((8, 0), &alarm), vec![ClockEvent::MinuteTick]);
    }

    #[test]
    fn test_fires_when_started_inside_the_minute() {
        let mut watch = ClockWatch::default();
        let events = watch.tick((6, 30), &armed(6, 30));
        assert!(events.contains(&ClockEvent::AlarmDue));
    }

    #[test]
    fn test_alarm_edited_onto_current_minute_waits_for_tomorrow() {
        let mut watch = ClockWatch::default();
        let mut alarm = armed(8, 1);
        assert_eq!(watch.tick((8, 0), &alarm), vec![ClockEvent::MinuteTick]);

        alarm.add_minutes(-1);
        assert!(watch.tick((8, 0), &alarm).is_empty());
        assert_eq!(watch.tick((8, 1), &alarm), vec![ClockEvent::MinuteTick]);
    }

    #[test]
    fn test_toggling_alarm_inside_its_minute_does_not_ring_again() {
        let mut watch = ClockWatch::default();
        let mut alarm = armed(8, 0);
        watch.tick((7, 59), &alarm);
        assert!(watch.tick((8, 0), &alarm).contains(&ClockEvent::AlarmDue));

        alarm.enabled = false;
        assert!(watch.tick((8, 0), &alarm).is_empty());
        alarm.enabled = true;
        assert!(watch.tick((8, 0), &alarm).is_empty());
    }

    #[test]
    fn test_fires_again_next_day() {
        let mut watch = ClockWatch::default();
        let alarm = armed(0, 0);
        assert!(watch.tick((0, 0), &alarm).contains(&ClockEvent::AlarmDue));
        watch.tick((12, 0), &alarm);
        assert!(watch.tick((0, 0), &alarm).contains(&ClockEvent::AlarmDue));
    }
}
