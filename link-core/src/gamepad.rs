//! Game controller polling with dead-zone filtering.
//!
//! The poller runs on the link thread at the link cadence, so stick
//! responsiveness never depends on how busy the consumer side is.

use car_proto::{clamp_axis, DriveMode, AXIS_MAX};

/// Stick deflection at or below this magnitude reads as exactly zero.
pub const DEAD_ZONE: f32 = 0.10;

/// A source of two continuous stick axes.
///
/// Values are in [-1.0, 1.0] using the usual device convention: positive x is
/// right, positive y is *down*. Implementations must not block.
pub trait AxisSource {
    /// Current `(x, y)` deflection, or `None` if no controller is attached
    /// or the read failed.
    fn read_axes(&mut self) -> Option<(f32, f32)>;
}

impl<A: AxisSource + ?Sized> AxisSource for Box<A> {
    fn read_axes(&mut self) -> Option<(f32, f32)> {
        (**self).read_axes()
    }
}

/// Axis source for when no controller is present.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoController;

impl AxisSource for NoController {
    fn read_axes(&mut self) -> Option<(f32, f32)> {
        None
    }
}

/// Zero out values inside the dead zone.
#[inline]
#[must_use]
pub fn apply_dead_zone(value: f32, dead_zone: f32) -> f32 {
    if !value.is_finite() || value.abs() <= dead_zone {
        0.0
    } else {
        value
    }
}

/// Scale a filtered deflection to the wire range, truncating toward zero.
#[inline]
#[must_use]
pub fn scale_axis(value: f32) -> i8 {
    clamp_axis((value * AXIS_MAX as f32) as i32)
}

/// Reads the controller and converts it to command axes.
pub struct GamepadPoller<A> {
    source: A,
    dead_zone: f32,
}

impl<A: AxisSource> GamepadPoller<A> {
    #[must_use]
    pub fn new(source: A) -> Self {
        Self {
            source,
            dead_zone: DEAD_ZONE,
        }
    }

    /// Override the dead-zone threshold.
    #[must_use]
    pub fn with_dead_zone(mut self, dead_zone: f32) -> Self {
        self.dead_zone = dead_zone.abs();
        self
    }

    /// Poll once.
    ///
    /// Returns `None` outside manual mode, or when the source has nothing.
    /// Otherwise returns `(x, forward)` where forward is the inverted
    /// vertical axis.
    pub fn poll(&mut self, mode: DriveMode) -> Option<(i8, i8)> {
        if !mode.is_manual() {
            return None;
        }
        let (x, y) = self.source.read_axes()?;
        let x = apply_dead_zone(x, self.dead_zone);
        let y = apply_dead_zone(y, self.dead_zone);
        Some((scale_axis(x), scale_axis(-y)))
    }

    pub fn source_mut(&mut self) -> &mut A {
        &mut self.source
    }
}

impl GamepadPoller<NoController> {
    /// A poller that never yields anything.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(NoController)
    }
}
