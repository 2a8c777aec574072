//! Operator commands from the display layer.
//!
//! Senders may live on any thread; the controller drains the queue only at
//! tick boundaries so every command is observed atomically by the next task.

use crossbeam_channel as xch;

/// Speed presets offered on the live screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeedPreset {
    Off,
    Low,
    Medium,
    High,
}

impl SpeedPreset {
    pub fn percent(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Low => 30,
            Self::Medium => 60,
            Self::High => 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    TriggerEmergency,
    ResetEmergency,
    /// Manual override, percent.
    SetSpeed(u8),
    Preset(SpeedPreset),
    /// Settings-screen change; zone geometry is marked dirty.
    ApplyConfig(Box<pisau_config::Config>),
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct CommandSender(xch::Sender<Command>);

impl CommandSender {
    /// Queue a command. Returns `false` once the controller is gone.
    pub fn send(&self, cmd: Command) -> bool {
        self.0.send(cmd).is_ok()
    }

    pub fn trigger_emergency(&self) -> bool {
        self.send(Command::TriggerEmergency)
    }

    pub fn reset_emergency(&self) -> bool {
        self.send(Command::ResetEmergency)
    }
}

#[derive(Debug)]
pub struct CommandQueue {
    tx: xch::Sender<Command>,
    rx: xch::Receiver<Command>,
}

impl Default for CommandQueue {
    fn default() -> Self {
        let (tx, rx) = xch::unbounded();
        Self { tx, rx }
    }
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sender(&self) -> CommandSender {
        CommandSender(self.tx.clone())
    }

    /// Everything queued so far, in arrival order.
    pub fn drain(&self) -> Vec<Command> {
        self.rx.try_iter().collect()
    }
}
