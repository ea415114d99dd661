//! Operator session: console commands in, link events out.

use std::sync::Arc;

use link_core::{
    event_channel, ChannelSink, ControlState, EventReceiver, Link, LinkError, LinkEvent,
    LinkState, SerialSettings, Transport, EVENT_QUEUE_CAPACITY,
};
use log::{error, info, warn};

use crate::commands::{Command, HELP};
use crate::console::Console;
use crate::gamepad::controller_poller;

/// What the main loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Quit,
}

pub struct App {
    link: Link,
    console: Console,
    sink: ChannelSink,
    events: EventReceiver,
    settings: Option<SerialSettings>,
    gamepad: bool,
}

impl App {
    /// `settings` is `None` when no port could be found; connecting then
    /// fails until one is plugged in and the program restarted.
    #[must_use]
    pub fn new(settings: Option<SerialSettings>, console: Console, gamepad: bool) -> Self {
        let (sink, events) = event_channel(EVENT_QUEUE_CAPACITY);
        Self {
            link: Link::new(Arc::new(ControlState::new())),
            console,
            sink,
            events,
            settings,
            gamepad,
        }
    }

    #[must_use]
    pub fn link(&self) -> &Link {
        &self.link
    }

    #[must_use]
    pub fn console(&self) -> &Console {
        &self.console
    }

    /// Consumer end of the link's event queue.
    #[must_use]
    pub fn events(&self) -> &EventReceiver {
        &self.events
    }

    fn control(&self) -> &ControlState {
        self.link.control()
    }

    /// Open the configured port and start the link.
    pub fn connect(&mut self) -> Result<(), LinkError> {
        let settings = self
            .settings
            .clone()
            .ok_or_else(|| LinkError::InvalidSetting("no serial port selected".into()))?;
        let gamepad = self.gamepad;
        self.console.reset();
        self.link
            .connect(&settings, self.sink.clone(), move || controller_poller(gamepad))
    }

    /// Start the link on an already open transport.
    pub fn attach<T: Transport + 'static>(&mut self, transport: T) -> Result<(), LinkError> {
        let gamepad = self.gamepad;
        self.console.reset();
        self.link
            .attach(transport, self.sink.clone(), move || controller_poller(gamepad))
    }

    pub fn disconnect(&mut self) {
        self.link.disconnect();
    }

    /// Render one event.
    pub fn dispatch(&mut self, event: &LinkEvent) {
        event.dispatch(&mut self.console);
    }

    /// Render everything queued so far. Returns the number of events.
    pub fn drain_events(&mut self) -> usize {
        let mut count = 0;
        while let Ok(event) = self.events.try_recv() {
            event.dispatch(&mut self.console);
            count += 1;
        }
        count
    }

    pub fn handle(&mut self, command: Command) -> Outcome {
        match command {
            Command::ToggleMode => {
                let mode = self.control().toggle_mode();
                info!("drive mode: {:?}", mode);
            }
            Command::Stick { x, y } => {
                if self.control().mode().is_manual() {
                    self.control().set(x, y);
                } else {
                    warn!("stick input ignored in autonomous mode (press m)");
                }
            }
            Command::Release => self.control().release(),
            Command::SendSettings(settings) => {
                if let Err(e) = self.link.send_settings(&settings) {
                    warn!("settings not sent: {}", e);
                }
            }
            Command::ToggleConnection => match self.link.state() {
                LinkState::Connected => self.disconnect(),
                LinkState::Disconnected => {
                    if let Err(e) = self.connect() {
                        error!("connect failed: {}", e);
                    }
                }
            },
            Command::History => self.console.print_history(),
            Command::Help => println!("{}", HELP),
            Command::Quit => {
                self.disconnect();
                return Outcome::Quit;
            }
        }
        Outcome::Continue
    }
}
