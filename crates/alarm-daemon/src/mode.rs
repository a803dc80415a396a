/// What the device is showing and reacting to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Before the intro screen has been replaced by the clock.
    #[default]
    Undefined,
    Clock,
    AlarmSetting,
    /// Entered once, on shutdown.
    End,
}

impl Mode {
    /// Clock and AlarmSetting swap; every other mode stays put.
    pub fn toggled(self) -> Mode {
        match self {
            Mode::Clock => Mode::AlarmSetting,
            Mode::AlarmSetting => Mode::Clock,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PopUp {
    #[default]
    None,
    Volume,
    SnoozeOff,
}
