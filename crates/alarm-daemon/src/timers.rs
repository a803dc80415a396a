/// One-shot timers delivering `InternalEvent`s back to the coordinator.
///
/// Each scheduled timer carries a fresh token.  The coordinator keeps the
/// `Scheduled` it is waiting for and drops any delivery whose token does not
/// match: a timer that fired after being cancelled or replaced is stale.
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::event::InternalEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

#[derive(Debug)]
pub struct Scheduled {
    token: TimerToken,
    task: AbortHandle,
}

impl Scheduled {
    pub fn token(&self) -> TimerToken {
        self.token
    }

    pub fn cancel(self) {
        self.task.abort();
    }
}

/// True when `slot` holds the timer identified by `token`.
pub fn is_current(slot: &Option<Scheduled>, token: TimerToken) -> bool {
    slot.as_ref().is_some_and(|s| s.token == token)
}

pub struct Timers {
    tx: mpsc::Sender<InternalEvent>,
    next_token: u64,
}

impl Timers {
    pub fn new(tx: mpsc::Sender<InternalEvent>) -> Self {
        Self { tx, next_token: 1 }
    }

    pub fn schedule(
        &mut self,
        delay: Duration,
        make_event: fn(TimerToken) -> InternalEvent,
    ) -> Scheduled {
        let token = TimerToken(self.next_token);
        self.next_token += 1;

        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(make_event(token)).await.is_err() {
                debug!("timer {:?} fired after the event loop stopped", token);
            }
        });

        Scheduled {
            token,
            task: task.abort_handle(),
        }
    }
}
