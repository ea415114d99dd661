//! The link loop and its connection state machine.
//!
//! [`Link`] is the consumer-facing handle: `connect` opens the serial port and
//! starts a worker thread, `disconnect` stops it. The worker runs a
//! [`LinkLoop`], which owns the port exclusively and performs one
//! [`LinkLoop::tick`] every [`TICK_INTERVAL`]:
//!
//! 1. poll the gamepad (manual mode only) into the shared [`ControlState`]
//! 2. send a drive command if the transmission gate is open
//! 3. flush one-shot frames queued by the consumer (settings)
//! 4. read everything the port has buffered
//! 5. drain complete frames to the [`TelemetrySink`], reporting new station
//!    arrivals
//!
//! I/O errors never stop the loop. Only `disconnect` (or dropping the
//! [`Link`]) does.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use car_proto::{encode_command, encode_settings, DriveMode, FrameAccumulator, Settings};
use chrono::Local;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{debug, error, info, trace, warn};

use crate::control::ControlState;
use crate::error::LinkError;
use crate::gamepad::{AxisSource, GamepadPoller};
use crate::serial::{SerialSettings, Transport};
use crate::sink::{StationArrival, TelemetrySink};
use crate::station::StationTracker;

/// Link loop cadence.
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Autonomous-mode command period.
pub const TX_PERIOD_MS: u128 = 100;

/// Width of the send window at the start of each [`TX_PERIOD_MS`].
pub const TX_WINDOW_MS: u128 = 20;

/// Consecutive failing ticks before the operator is told.
pub const ERROR_REPORT_THRESHOLD: u32 = 20;

/// Depth of the consumer-to-link command queue.
pub const COMMAND_QUEUE_CAPACITY: usize = 8;

const READ_CHUNK: usize = 256;

/// Whether a drive command goes out on this tick.
///
/// Manual mode streams every tick. Autonomous mode only sends inside the
/// first [`TX_WINDOW_MS`] of each [`TX_PERIOD_MS`], about 10 Hz.
#[inline]
#[must_use]
pub fn should_transmit(mode: DriveMode, elapsed: Duration) -> bool {
    mode.is_manual() || elapsed.as_millis() % TX_PERIOD_MS < TX_WINDOW_MS
}

/// First grid slot at or after `due` that is still in the future at `now`.
///
/// Both arguments are offsets from the start of the loop; the result is
/// always a whole number of [`TICK_INTERVAL`]s past `due`.
fn next_slot(due: Duration, now: Duration) -> Duration {
    if due > now {
        return due;
    }
    let missed = (now - due).as_nanos() / TICK_INTERVAL.as_nanos() + 1;
    due + TICK_INTERVAL * u32::try_from(missed).unwrap_or(u32::MAX)
}

/// Request posted from the consumer to the link worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCommand {
    /// Write a pre-encoded frame once, on the next tick.
    Write(Vec<u8>),
}

/// Counters kept by the link loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub ticks: u64,
    pub commands_sent: u64,
    pub frames_received: u64,
    pub io_errors: u64,
}

/// One connection's worth of link state.
///
/// A fresh loop is built for every connection, so the receive buffer and the
/// station marker always start empty.
pub struct LinkLoop<T, S, A> {
    transport: T,
    sink: S,
    poller: GamepadPoller<A>,
    control: Arc<ControlState>,
    commands: Receiver<LinkCommand>,
    rx: FrameAccumulator,
    stations: StationTracker,
    failure_streak: u32,
    stats: LinkStats,
}

impl<T: Transport, S: TelemetrySink, A: AxisSource> LinkLoop<T, S, A> {
    pub fn new(
        transport: T,
        sink: S,
        poller: GamepadPoller<A>,
        control: Arc<ControlState>,
        commands: Receiver<LinkCommand>,
    ) -> Self {
        Self {
            transport,
            sink,
            poller,
            control,
            commands,
            rx: FrameAccumulator::new(),
            stations: StationTracker::new(),
            failure_streak: 0,
            stats: LinkStats::default(),
        }
    }

    /// Run one tick. `elapsed` is this tick's offset from the start of the
    /// connection.
    pub fn tick(&mut self, elapsed: Duration) {
        self.stats.ticks += 1;
        let mut failure = None;

        if let Some((x, y)) = self.poller.poll(self.control.mode()) {
            self.control.set_from_gamepad(x, y);
        }

        let cmd = self.control.snapshot();
        if should_transmit(cmd.mode, elapsed) {
            match self.transport.write_frame(&encode_command(&cmd)) {
                Ok(()) => {
                    self.stats.commands_sent += 1;
                    trace!("tx {:?}", cmd);
                }
                Err(e) => failure = Some(e),
            }
        }

        while let Ok(command) = self.commands.try_recv() {
            match command {
                LinkCommand::Write(frame) => match self.transport.write_frame(&frame) {
                    Ok(()) => debug!("one-shot frame sent: {:02X?}", frame),
                    Err(e) => failure = Some(e),
                },
            }
        }

        if let Err(e) = self.receive() {
            failure = Some(e);
        }

        self.track_failure(failure);
    }

    /// Pull everything buffered on the port and drain complete frames.
    fn receive(&mut self) -> io::Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = self.transport.read_available(&mut chunk)?;
            if n == 0 {
                return Ok(());
            }
            let discarded = self.rx.extend(&chunk[..n]);
            if discarded > 0 {
                warn!("receive buffer full, {} stale bytes discarded", discarded);
            }
            self.drain();
            if n < chunk.len() {
                return Ok(());
            }
        }
    }

    fn drain(&mut self) {
        while let Some(telemetry) = self.rx.next_frame() {
            self.stats.frames_received += 1;
            self.sink.on_telemetry(&telemetry);

            if let Some(station_index) = self.stations.observe(&telemetry) {
                info!("arrived at station {}", station_index);
                self.sink.on_station_arrival(&StationArrival {
                    station_index,
                    timestamp: Local::now(),
                });
            }
        }
    }

    fn track_failure(&mut self, failure: Option<io::Error>) {
        let Some(e) = failure else {
            if self.failure_streak >= ERROR_REPORT_THRESHOLD {
                info!("serial I/O recovered");
            }
            self.failure_streak = 0;
            return;
        };

        self.stats.io_errors += 1;
        self.failure_streak = self.failure_streak.saturating_add(1);
        debug!("serial I/O error (streak {}): {}", self.failure_streak, e);

        if self.failure_streak == ERROR_REPORT_THRESHOLD {
            let message = format!(
                "serial I/O failing for {} consecutive ticks: {}",
                self.failure_streak, e
            );
            warn!("{}", message);
            self.sink.on_link_error(&message);
        }
    }

    #[must_use]
    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Tick at [`TICK_INTERVAL`] until `running` is cleared.
    ///
    /// Ticks stay on the grid anchored at the start of the loop, and each
    /// tick is handed its scheduled offset, so the transmission gate keeps
    /// its phase after an overrun.
    ///
    /// Consumes the loop, so the transport is closed on return.
    pub fn run(mut self, running: &AtomicBool) {
        let start = Instant::now();
        let mut due = Duration::ZERO;

        while running.load(Ordering::Acquire) {
            self.tick(due);

            let on_time = due + TICK_INTERVAL;
            due = next_slot(on_time, start.elapsed());
            if due > on_time {
                debug!(
                    "tick overran, skipping {} slot(s)",
                    (due - on_time).as_millis() / TICK_INTERVAL.as_millis()
                );
            }
            thread::sleep(due.saturating_sub(start.elapsed()));
        }

        info!(
            "link loop stopped: {} ticks, {} commands sent, {} frames received, {} I/O errors, {} bytes resynced",
            self.stats.ticks,
            self.stats.commands_sent,
            self.stats.frames_received,
            self.stats.io_errors,
            self.rx.resynced_bytes()
        );
    }
}

/// Owner of a running link worker thread.
///
/// Dropping the handle stops the worker.
pub struct LinkHandle {
    running: Arc<AtomicBool>,
    commands: Sender<LinkCommand>,
    worker: Option<JoinHandle<()>>,
}

impl LinkHandle {
    /// Start a worker driving `transport`.
    ///
    /// The gamepad poller is built on the worker thread by `make_poller`,
    /// since some controller backends cannot move between threads.
    pub fn spawn<T, S, A, F>(
        transport: T,
        sink: S,
        make_poller: F,
        control: Arc<ControlState>,
    ) -> Result<Self, LinkError>
    where
        T: Transport + 'static,
        S: TelemetrySink + 'static,
        A: AxisSource + 'static,
        F: FnOnce() -> GamepadPoller<A> + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let (commands, command_rx) = crossbeam_channel::bounded(COMMAND_QUEUE_CAPACITY);
        let flag = Arc::clone(&running);

        let worker = thread::Builder::new()
            .name("car-link".into())
            .spawn(move || {
                let poller = make_poller();
                LinkLoop::new(transport, sink, poller, control, command_rx).run(&flag);
            })
            .map_err(LinkError::WorkerSpawn)?;

        Ok(Self {
            running,
            commands,
            worker: Some(worker),
        })
    }

    /// Queue a command for the next tick. Never blocks.
    pub fn send(&self, command: LinkCommand) -> Result<(), LinkError> {
        self.commands.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => LinkError::QueueFull,
            TrySendError::Disconnected(_) => LinkError::NotConnected,
        })
    }

    /// Whether the worker thread is still alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Signal the worker and wait for it to exit (at most one tick).
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("link worker panicked");
            }
        }
    }
}

impl Drop for LinkHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
}

/// Connect/disconnect state machine around a [`LinkHandle`].
pub struct Link {
    control: Arc<ControlState>,
    handle: Option<LinkHandle>,
}

impl Link {
    #[must_use]
    pub fn new(control: Arc<ControlState>) -> Self {
        Self {
            control,
            handle: None,
        }
    }

    /// The command state shared with the worker.
    #[must_use]
    pub fn control(&self) -> &Arc<ControlState> {
        &self.control
    }

    #[must_use]
    pub fn state(&self) -> LinkState {
        match &self.handle {
            Some(handle) if handle.is_running() => LinkState::Connected,
            _ => LinkState::Disconnected,
        }
    }

    /// Open the serial port and start the worker.
    ///
    /// An already running link is stopped first. If the port cannot be
    /// opened the link stays disconnected and no worker is started.
    pub fn connect<S, A, F>(
        &mut self,
        settings: &SerialSettings,
        sink: S,
        make_poller: F,
    ) -> Result<(), LinkError>
    where
        S: TelemetrySink + 'static,
        A: AxisSource + 'static,
        F: FnOnce() -> GamepadPoller<A> + Send + 'static,
    {
        self.disconnect();
        let port = settings.open()?;
        self.attach(port, sink, make_poller)?;
        info!("link established: {}", settings);
        Ok(())
    }

    /// Start the worker on an already open transport.
    pub fn attach<T, S, A, F>(&mut self, transport: T, sink: S, make_poller: F) -> Result<(), LinkError>
    where
        T: Transport + 'static,
        S: TelemetrySink + 'static,
        A: AxisSource + 'static,
        F: FnOnce() -> GamepadPoller<A> + Send + 'static,
    {
        self.disconnect();
        let handle = LinkHandle::spawn(transport, sink, make_poller, Arc::clone(&self.control))?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Stop the worker and close the port. Does nothing when disconnected.
    pub fn disconnect(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.stop();
            info!("link closed");
        }
    }

    /// Queue a settings frame for the vehicle.
    pub fn send_settings(&self, settings: &Settings) -> Result<(), LinkError> {
        let handle = self
            .handle
            .as_ref()
            .filter(|h| h.is_running())
            .ok_or(LinkError::NotConnected)?;
        handle.send(LinkCommand::Write(encode_settings(settings).to_vec()))?;
        info!(
            "settings queued: cruise speed {}%, dwell {}s",
            settings.cruise_speed_pct(),
            settings.dwell_seconds()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{event_channel, LinkEvent};
    use car_proto::{encode_telemetry, OutgoingCommand, Telemetry};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockWire {
        written: Vec<Vec<u8>>,
        incoming: VecDeque<u8>,
        fail_reads: bool,
        fail_writes: bool,
        stall_once: Option<Duration>,
        panic_on_write: bool,
    }

    #[derive(Clone, Default)]
    struct MockTransport {
        wire: Arc<Mutex<MockWire>>,
    }

    impl Transport for MockTransport {
        fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
            let mut wire = self.wire.lock().unwrap();
            if wire.panic_on_write {
                drop(wire);
                panic!("transport blew up");
            }
            if wire.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
            }
            wire.written.push(frame.to_vec());
            Ok(())
        }

        fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let stall = self.wire.lock().unwrap().stall_once.take();
            if let Some(stall) = stall {
                thread::sleep(stall);
            }
            let mut wire = self.wire.lock().unwrap();
            if wire.fail_reads {
                return Err(io::Error::new(io::ErrorKind::Other, "framing error"));
            }
            let n = buf.len().min(wire.incoming.len());
            for slot in buf.iter_mut().take(n) {
                *slot = wire.incoming.pop_front().unwrap();
            }
            Ok(n)
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        events: Arc<Mutex<Vec<LinkEvent>>>,
    }

    impl TelemetrySink for RecordingSink {
        fn on_telemetry(&mut self, telemetry: &Telemetry) {
            self.events.lock().unwrap().push(LinkEvent::Telemetry(*telemetry));
        }

        fn on_station_arrival(&mut self, arrival: &StationArrival) {
            self.events
                .lock()
                .unwrap()
                .push(LinkEvent::StationArrival(*arrival));
        }

        fn on_link_error(&mut self, message: &str) {
            self.events
                .lock()
                .unwrap()
                .push(LinkEvent::LinkError(message.to_owned()));
        }
    }

    struct FixedAxes(Option<(f32, f32)>);

    impl AxisSource for FixedAxes {
        fn read_axes(&mut self) -> Option<(f32, f32)> {
            self.0
        }
    }

    struct Harness {
        link: LinkLoop<MockTransport, RecordingSink, FixedAxes>,
        wire: Arc<Mutex<MockWire>>,
        events: Arc<Mutex<Vec<LinkEvent>>>,
        control: Arc<ControlState>,
        commands: Sender<LinkCommand>,
    }

    fn harness(axes: Option<(f32, f32)>) -> Harness {
        let transport = MockTransport::default();
        let sink = RecordingSink::default();
        let control = Arc::new(ControlState::new());
        let (commands, command_rx) = crossbeam_channel::bounded(COMMAND_QUEUE_CAPACITY);
        Harness {
            wire: Arc::clone(&transport.wire),
            events: Arc::clone(&sink.events),
            control: Arc::clone(&control),
            commands,
            link: LinkLoop::new(
                transport,
                sink,
                GamepadPoller::new(FixedAxes(axes)),
                control,
                command_rx,
            ),
        }
    }

    fn feed(wire: &Arc<Mutex<MockWire>>, bytes: &[u8]) {
        wire.lock().unwrap().incoming.extend(bytes.iter().copied());
    }

    fn docked(station: u8) -> [u8; 8] {
        encode_telemetry(&Telemetry::from_fields(3, 0, 0, station, 8))
    }

    fn at(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn test_transmit_gate() {
        assert!(should_transmit(DriveMode::Manual, at(55)));
        assert!(should_transmit(DriveMode::Autonomous, at(0)));
        assert!(should_transmit(DriveMode::Autonomous, at(19)));
        assert!(!should_transmit(DriveMode::Autonomous, at(20)));
        assert!(!should_transmit(DriveMode::Autonomous, at(50)));
        assert!(!should_transmit(DriveMode::Autonomous, at(99)));
        assert!(should_transmit(DriveMode::Autonomous, at(100)));
        assert!(should_transmit(DriveMode::Autonomous, at(1_215)));
    }

    #[test]
    fn test_next_slot_stays_on_grid() {
        assert_eq!(next_slot(at(100), at(60)), at(100));
        assert_eq!(next_slot(at(100), at(100)), at(150));
        assert_eq!(next_slot(at(50), at(75)), at(100));
        assert_eq!(next_slot(at(100), at(175)), at(200));
    }

    #[test]
    fn test_run_keeps_autonomous_rate_after_overrun() {
        let h = harness(None);
        h.wire.lock().unwrap().stall_once = Some(at(75));

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let link = h.link;
        let worker = thread::spawn(move || link.run(&flag));
        thread::sleep(at(1_100));
        running.store(false, Ordering::Release);
        worker.join().unwrap();

        // About one command per 100 ms, stall included.
        let sent = h.wire.lock().unwrap().written.len();
        assert!((8..=13).contains(&sent), "{} commands sent", sent);
    }

    #[test]
    fn test_autonomous_mode_sends_every_other_tick() {
        let mut h = harness(None);
        for n in 0..20 {
            h.link.tick(at(n * 50));
        }
        assert_eq!(h.wire.lock().unwrap().written.len(), 10);
        assert_eq!(h.link.stats().commands_sent, 10);
    }

    #[test]
    fn test_manual_mode_sends_every_tick() {
        let mut h = harness(None);
        h.control.set_mode(DriveMode::Manual);
        for n in 0..20 {
            h.link.tick(at(n * 50));
        }
        assert_eq!(h.wire.lock().unwrap().written.len(), 20);
    }

    #[test]
    fn test_gamepad_drives_command_in_manual_mode() {
        let mut h = harness(Some((1.0, -1.0)));
        h.control.set_mode(DriveMode::Manual);
        h.link.tick(at(50));

        let expected = encode_command(&OutgoingCommand::new(127, 127, DriveMode::Manual));
        assert_eq!(h.wire.lock().unwrap().written, vec![expected.to_vec()]);
        assert_eq!(h.control.snapshot().axis_y, 127);
    }

    #[test]
    fn test_gamepad_ignored_in_autonomous_mode() {
        let mut h = harness(Some((1.0, 1.0)));
        h.control.set(5, 6);
        h.link.tick(at(0));

        let expected = encode_command(&OutgoingCommand::new(5, 6, DriveMode::Autonomous));
        assert_eq!(h.wire.lock().unwrap().written, vec![expected.to_vec()]);
    }

    #[test]
    fn test_pointer_input_without_controller() {
        let mut h = harness(None);
        h.control.set_mode(DriveMode::Manual);
        h.control.set(-40, 90);
        h.link.tick(at(50));

        let expected = encode_command(&OutgoingCommand::new(-40, 90, DriveMode::Manual));
        assert_eq!(h.wire.lock().unwrap().written, vec![expected.to_vec()]);
    }

    #[test]
    fn test_station_arrival_reported_once_per_docking() {
        let mut h = harness(None);
        for _ in 0..10 {
            feed(&h.wire, &docked(5));
        }
        h.link.tick(at(0));
        feed(&h.wire, &docked(6));
        h.link.tick(at(50));

        let events = h.events.lock().unwrap();
        let telemetry = events
            .iter()
            .filter(|e| matches!(e, LinkEvent::Telemetry(_)))
            .count();
        let arrivals: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                LinkEvent::StationArrival(a) => Some(a.station_index),
                _ => None,
            })
            .collect();
        assert_eq!(telemetry, 11);
        assert_eq!(arrivals, vec![5, 6]);
    }

    #[test]
    fn test_corrupt_leading_byte_recovered() {
        let mut h = harness(None);
        let frame = encode_telemetry(&Telemetry::from_fields(1, 1, 1, 0, 44));
        feed(&h.wire, &[0x13]);
        feed(&h.wire, &frame);
        h.link.tick(at(0));

        let events = h.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            LinkEvent::Telemetry(t) => assert_eq!(t.distance_cm(), Some(44)),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_frame_split_across_ticks() {
        let mut h = harness(None);
        let frame = docked(2);
        feed(&h.wire, &frame[..5]);
        h.link.tick(at(0));
        assert!(h.events.lock().unwrap().is_empty());

        feed(&h.wire, &frame[5..]);
        h.link.tick(at(50));
        assert_eq!(h.link.stats().frames_received, 1);
    }

    #[test]
    fn test_large_backlog_drained_without_loss() {
        let mut h = harness(None);
        for station in 0..100u8 {
            let frame = encode_telemetry(&Telemetry::from_fields(1, 1, 0, station, 30));
            feed(&h.wire, &frame);
        }
        h.link.tick(at(0));
        assert_eq!(h.link.stats().frames_received, 100);
    }

    #[test]
    fn test_io_failures_reported_once_per_streak() {
        let mut h = harness(None);
        h.control.set_mode(DriveMode::Manual);
        h.wire.lock().unwrap().fail_reads = true;
        for n in 0..45 {
            h.link.tick(at(n * 50));
        }
        let errors = |events: &[LinkEvent]| {
            events
                .iter()
                .filter(|e| matches!(e, LinkEvent::LinkError(_)))
                .count()
        };
        assert_eq!(errors(&h.events.lock().unwrap()), 1);
        // Writes kept going while reads failed.
        assert_eq!(h.wire.lock().unwrap().written.len(), 45);

        h.wire.lock().unwrap().fail_reads = false;
        h.link.tick(at(2_250));

        h.wire.lock().unwrap().fail_writes = true;
        for n in 0..ERROR_REPORT_THRESHOLD as u64 {
            h.link.tick(at(2_300 + n * 50));
        }
        assert_eq!(errors(&h.events.lock().unwrap()), 2);
        assert_eq!(h.link.stats().io_errors, 45 + ERROR_REPORT_THRESHOLD as u64);
    }

    #[test]
    fn test_settings_frame_flushed_on_next_tick() {
        let mut h = harness(None);
        let settings = Settings::new(60, 15).unwrap();
        h.commands
            .send(LinkCommand::Write(encode_settings(&settings).to_vec()))
            .unwrap();
        h.link.tick(at(50));

        assert_eq!(
            h.wire.lock().unwrap().written,
            vec![encode_settings(&settings).to_vec()]
        );
    }

    #[test]
    fn test_link_lifecycle_with_worker_thread() {
        let control = Arc::new(ControlState::new());
        let mut link = Link::new(Arc::clone(&control));
        assert_eq!(link.state(), LinkState::Disconnected);

        let transport = MockTransport::default();
        let wire = Arc::clone(&transport.wire);
        feed(&wire, &docked(1));

        let (sink, events) = event_channel(16);
        link.attach(transport, sink, GamepadPoller::detached).unwrap();
        assert_eq!(link.state(), LinkState::Connected);

        // The arrival takes the urgent lane, so it may overtake its frame.
        let received: Vec<LinkEvent> = (0..2)
            .map(|_| events.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        assert!(received
            .iter()
            .any(|e| matches!(e, LinkEvent::Telemetry(_))));
        assert!(received.iter().any(|e| matches!(
            e,
            LinkEvent::StationArrival(StationArrival {
                station_index: 1,
                ..
            })
        )));

        let settings = Settings::new(30, 5).unwrap();
        link.send_settings(&settings).unwrap();
        let expected = encode_settings(&settings).to_vec();
        let mut seen = false;
        for _ in 0..40 {
            if wire.lock().unwrap().written.contains(&expected) {
                seen = true;
                break;
            }
            thread::sleep(Duration::from_millis(25));
        }
        assert!(seen, "settings frame never written");

        link.disconnect();
        assert_eq!(link.state(), LinkState::Disconnected);
        link.disconnect();
        assert!(matches!(
            link.send_settings(&settings),
            Err(LinkError::NotConnected)
        ));
    }

    #[test]
    fn test_failed_open_stays_disconnected() {
        let mut link = Link::new(Arc::new(ControlState::new()));
        let (sink, _events) = event_channel(4);
        let result = link.connect(
            &SerialSettings::new("/dev/car-link-missing-port"),
            sink,
            GamepadPoller::detached,
        );
        assert!(matches!(result, Err(LinkError::DeviceOpen { .. })));
        assert_eq!(link.state(), LinkState::Disconnected);
    }

    #[test]
    fn test_full_command_queue_reported() {
        let (commands, command_rx) = crossbeam_channel::bounded(1);
        let handle = LinkHandle {
            running: Arc::new(AtomicBool::new(false)),
            commands,
            worker: None,
        };
        let frame = || LinkCommand::Write(vec![0xB5]);

        handle.send(frame()).unwrap();
        assert!(matches!(handle.send(frame()), Err(LinkError::QueueFull)));

        drop(command_rx);
        assert!(matches!(handle.send(frame()), Err(LinkError::NotConnected)));
    }

    #[test]
    fn test_dead_worker_reports_disconnected() {
        let mut link = Link::new(Arc::new(ControlState::new()));
        let transport = MockTransport::default();
        transport.wire.lock().unwrap().panic_on_write = true;
        let (sink, _events) = event_channel(4);
        link.attach(transport, sink, GamepadPoller::detached).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while link.state() == LinkState::Connected && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(link.state(), LinkState::Disconnected);
        assert!(matches!(
            link.send_settings(&Settings::new(50, 3).unwrap()),
            Err(LinkError::NotConnected)
        ));
        link.disconnect();
    }
}
