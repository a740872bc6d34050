//! Events paired with their absolute position in ticks.

use crate::{event::TrackEventKind, prelude::*, timed::Timed};

/// Where a detected event was read from.
///
/// Detection tags every event it reads from a track with its position, which is what keeps the
/// relative order of simultaneous events intact when a track is regenerated.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct EventSource {
    /// Index of the track within the slice of tracks handed to a multi-track operation, zero
    /// for single-track operations.
    pub track: usize,
    /// Index of the event within its track.
    pub index: usize,
}

/// An event along with its absolute time in ticks.
///
/// This is the atomic unit every other object is built from.
/// Events read from a track carry their position as identity: two of them are only equal if
/// they were read from the same position, and never equal an event created with `new`.
/// Events created with `new` are equal when they fire at the same time and carry the same
/// event.
#[derive(Clone, Debug)]
pub struct TimedEvent {
    time: u64,
    kind: TrackEventKind,
    source: Option<EventSource>,
}
impl TimedEvent {
    /// Create a new timed event that was not read from any track.
    #[inline]
    pub fn new(time: u64, kind: TrackEventKind) -> TimedEvent {
        TimedEvent {
            time,
            kind,
            source: None,
        }
    }

    #[inline]
    pub(crate) fn with_source(time: u64, kind: TrackEventKind, source: EventSource) -> TimedEvent {
        TimedEvent {
            time,
            kind,
            source: Some(source),
        }
    }

    /// The event itself.
    #[inline]
    pub fn kind(&self) -> &TrackEventKind {
        &self.kind
    }

    /// Mutable access to the event itself.
    #[inline]
    pub fn kind_mut(&mut self) -> &mut TrackEventKind {
        &mut self.kind
    }

    /// Discard the timing information.
    #[inline]
    pub fn into_kind(self) -> TrackEventKind {
        self.kind
    }

    /// Where this event was read from, if it was detected in a track.
    #[inline]
    pub fn source(&self) -> Option<EventSource> {
        self.source
    }

    #[inline]
    pub(crate) fn set_source(&mut self, source: Option<EventSource>) {
        self.source = source;
    }
}
impl Timed for TimedEvent {
    #[inline]
    fn time(&self) -> u64 {
        self.time
    }

    #[inline]
    fn set_time(&mut self, time: u64) {
        self.time = time;
    }
}
impl PartialEq for TimedEvent {
    fn eq(&self, other: &TimedEvent) -> bool {
        self.source == other.source && self.time == other.time && self.kind == other.kind
    }
}
impl Eq for TimedEvent {}

/// The data a `TimedEventConstructor` decides on.
#[derive(Copy, Clone, Debug)]
pub struct TimedEventData<'a> {
    /// Absolute time of the event.
    pub time: u64,
    /// The event itself.
    pub kind: &'a TrackEventKind,
}

/// Builds the timed event detected for a raw event, or declines with `None`.
///
/// Declined events are left alone: they are never part of a note and stay in the background of
/// managers.
pub type TimedEventConstructor = Arc<dyn Fn(TimedEventData) -> Option<TimedEvent> + Send + Sync>;

/// Settings controlling how raw events become timed events.
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimedEventDetectionSettings {
    /// Custom constructor for timed events.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub constructor: Option<TimedEventConstructor>,
}
impl TimedEventDetectionSettings {
    /// Use a custom constructor for detected timed events.
    pub fn with_constructor<F>(mut self, constructor: F) -> TimedEventDetectionSettings
    where
        F: Fn(TimedEventData) -> Option<TimedEvent> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(constructor));
        self
    }

    /// Run the constructor on a raw event.
    ///
    /// The constructed event keeps the identity of the raw one.
    pub(crate) fn construct(&self, event: TimedEvent) -> core::result::Result<TimedEvent, TimedEvent> {
        let ctor = match &self.constructor {
            Some(ctor) => ctor,
            None => return Ok(event),
        };
        let built = ctor(TimedEventData {
            time: event.time,
            kind: &event.kind,
        });
        match built {
            Some(mut built) => {
                built.source = event.source;
                Ok(built)
            }
            None => Err(event),
        }
    }
}
impl fmt::Debug for TimedEventDetectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TimedEventDetectionSettings")
            .field("constructor", &self.constructor.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Run the constructor of `settings` over a time-ordered sequence of events.
///
/// Events the constructor declines are skipped.
pub fn get_timed_events<I>(events: I, settings: &TimedEventDetectionSettings) -> Vec<TimedEvent>
where
    I: IntoIterator<Item = TimedEvent>,
{
    events
        .into_iter()
        .filter_map(|ev| settings.construct(ev).ok())
        .collect()
}
