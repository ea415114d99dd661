//! Physical controller input through gilrs.
//!
//! Gilrs handles are not guaranteed to be `Send`, so the poller is built on
//! the link thread itself: pass [`controller_poller`] (wrapped in a closure)
//! as the link's poller factory.

use link_core::{AxisSource, GamepadPoller, NoController};
#[cfg(feature = "gamepad")]
use log::{info, warn};

#[cfg(feature = "gamepad")]
use gilrs::{Axis, Event, EventType, GamepadId, Gilrs};

/// Left stick of the first connected controller.
#[cfg(feature = "gamepad")]
pub struct GilrsAxes {
    gilrs: Gilrs,
    active: Option<GamepadId>,
}

#[cfg(feature = "gamepad")]
impl GilrsAxes {
    /// Start the controller backend. Returns `None` if the platform has none.
    pub fn open() -> Option<Self> {
        let gilrs = match Gilrs::new() {
            Ok(gilrs) => gilrs,
            Err(e) => {
                warn!("controller support unavailable: {}", e);
                return None;
            }
        };
        let active = gilrs.gamepads().next().map(|(id, pad)| {
            info!("using controller {} ({})", pad.name(), id);
            id
        });
        if active.is_none() {
            info!("no controller connected yet");
        }
        Some(Self { gilrs, active })
    }

    fn pump_events(&mut self) {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Disconnected if self.active == Some(id) => {
                    warn!("controller {} disconnected", id);
                    self.active = None;
                }
                EventType::Disconnected => {}
                _ if self.active.is_none() => {
                    info!("using controller {}", id);
                    self.active = Some(id);
                }
                _ => {}
            }
        }
    }
}

#[cfg(feature = "gamepad")]
impl AxisSource for GilrsAxes {
    fn read_axes(&mut self) -> Option<(f32, f32)> {
        self.pump_events();
        let pad = self.gilrs.connected_gamepad(self.active?)?;
        // gilrs reports up as positive; flip to the device convention.
        Some((pad.value(Axis::LeftStickX), -pad.value(Axis::LeftStickY)))
    }
}

/// Poller for the link thread: gilrs when `enabled` and available, otherwise
/// one that never yields.
#[cfg_attr(not(feature = "gamepad"), allow(unused_variables))]
#[must_use]
pub fn controller_poller(enabled: bool) -> GamepadPoller<Box<dyn AxisSource>> {
    #[cfg(feature = "gamepad")]
    if enabled {
        if let Some(axes) = GilrsAxes::open() {
            return GamepadPoller::new(Box::new(axes));
        }
    }
    GamepadPoller::new(Box::new(NoController))
}
