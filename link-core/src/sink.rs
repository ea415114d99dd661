//! Telemetry sink interface and the cross-thread event channel.
//!
//! The link loop only ever talks to a [`TelemetrySink`]. In the running
//! application that sink is a [`ChannelSink`], which posts [`LinkEvent`]s and
//! never blocks. The consumer drains the matching [`EventReceiver`] on its own
//! thread and hands each event to its own sink implementation with
//! [`LinkEvent::dispatch`].
//!
//! Telemetry goes onto a bounded drop-oldest queue. Station arrivals and link
//! errors are rare and must not be lost, so they use a separate unbounded
//! lane that is drained first.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use car_proto::Telemetry;
use chrono::{DateTime, Local};
use crossbeam_channel::{
    select, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError,
};
use log::{debug, warn};

/// Default queue depth between the link loop and the consumer.
///
/// About three seconds of telemetry at the vehicle's 20 Hz rate.
pub const EVENT_QUEUE_CAPACITY: usize = 64;

/// One station arrival, logged at most once per docking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationArrival {
    pub station_index: u8,
    pub timestamp: DateTime<Local>,
}

/// Consumer of decoded link output.
///
/// Every method is called from the link thread (or from the consumer's own
/// drain loop) and must return promptly.
pub trait TelemetrySink: Send {
    /// A validated telemetry frame.
    fn on_telemetry(&mut self, telemetry: &Telemetry);

    /// The vehicle docked at a station not yet reported on this connection.
    fn on_station_arrival(&mut self, arrival: &StationArrival);

    /// A persistent link problem worth telling the operator about.
    fn on_link_error(&mut self, message: &str);
}

/// Message posted from the link loop to the consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Telemetry(Telemetry),
    StationArrival(StationArrival),
    LinkError(String),
}

impl LinkEvent {
    /// Deliver this event to a consumer-side sink.
    pub fn dispatch<S: TelemetrySink + ?Sized>(&self, sink: &mut S) {
        match self {
            Self::Telemetry(t) => sink.on_telemetry(t),
            Self::StationArrival(a) => sink.on_station_arrival(a),
            Self::LinkError(msg) => sink.on_link_error(msg),
        }
    }
}

/// Non-blocking event publisher.
///
/// When the telemetry queue is full the oldest queued frame is evicted to
/// make room, so a stalled consumer always resumes on recent data. Arrivals
/// and errors are never evicted. Clones share the queues.
#[derive(Clone)]
pub struct ChannelSink {
    tx: Sender<LinkEvent>,
    evict: Receiver<LinkEvent>,
    urgent: Sender<LinkEvent>,
    dropped: Arc<AtomicUsize>,
}

/// Consumer end of an [`event_channel`].
///
/// Arrivals and errors are handed out ahead of any queued telemetry.
#[derive(Clone)]
pub struct EventReceiver {
    urgent: Receiver<LinkEvent>,
    telemetry: Receiver<LinkEvent>,
}

impl EventReceiver {
    pub fn try_recv(&self) -> Result<LinkEvent, TryRecvError> {
        self.urgent
            .try_recv()
            .or_else(|_| self.telemetry.try_recv())
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<LinkEvent, RecvTimeoutError> {
        if let Ok(event) = self.try_recv() {
            return Ok(event);
        }
        select! {
            recv(self.urgent) -> event => event.map_err(|_| RecvTimeoutError::Disconnected),
            recv(self.telemetry) -> event => event.map_err(|_| RecvTimeoutError::Disconnected),
            default(timeout) => Err(RecvTimeoutError::Timeout),
        }
    }

    /// Everything queued right now, arrivals and errors first.
    pub fn try_iter(&self) -> impl Iterator<Item = LinkEvent> + '_ {
        std::iter::from_fn(move || self.try_recv().ok())
    }
}

/// Create a sink and its consumer end. `capacity` bounds the telemetry queue.
#[must_use]
pub fn event_channel(capacity: usize) -> (ChannelSink, EventReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    let (urgent_tx, urgent_rx) = crossbeam_channel::unbounded();
    let sink = ChannelSink {
        tx,
        evict: rx.clone(),
        urgent: urgent_tx,
        dropped: Arc::new(AtomicUsize::new(0)),
    };
    let events = EventReceiver {
        urgent: urgent_rx,
        telemetry: rx,
    };
    (sink, events)
}

impl ChannelSink {
    /// Shared counter of telemetry frames evicted so far.
    #[must_use]
    pub fn dropped_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.dropped)
    }

    fn post(&mut self, event: LinkEvent) {
        let event = match self.tx.try_send(event) {
            Ok(()) => return,
            Err(TrySendError::Disconnected(_)) => {
                debug!("event consumer gone, discarding");
                return;
            }
            Err(TrySendError::Full(event)) => event,
        };

        if self.evict.try_recv().is_ok() {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if dropped == 1 || dropped % 100 == 0 {
                warn!("consumer is falling behind, {} events dropped", dropped);
            }
        }
        if let Err(e) = self.tx.try_send(event) {
            debug!("event discarded: {}", e);
        }
    }

    fn post_urgent(&mut self, event: LinkEvent) {
        if self.urgent.send(event).is_err() {
            debug!("event consumer gone, discarding");
        }
    }
}

impl TelemetrySink for ChannelSink {
    fn on_telemetry(&mut self, telemetry: &Telemetry) {
        self.post(LinkEvent::Telemetry(*telemetry));
    }

    fn on_station_arrival(&mut self, arrival: &StationArrival) {
        self.post_urgent(LinkEvent::StationArrival(*arrival));
    }

    fn on_link_error(&mut self, message: &str) {
        self.post_urgent(LinkEvent::LinkError(message.to_owned()));
    }
}
