//! The container that objects are detected in and written back to.

use crate::{
    event::{TrackEvent, TrackEventKind},
    prelude::*,
    timed::Timed,
    timed_event::{EventSource, TimedEvent},
};

/// An ordered list of delta-timed events.
///
/// Reading a track only involves accumulating delta times.
/// Every operation that edits objects regenerates the delta times of the events it touches, so
/// that the track stays time-ordered and keeps the relative order of events that were not
/// edited.
#[derive(Clone, PartialEq, Eq, Debug, Default, Hash)]
pub struct Track {
    events: Vec<TrackEvent>,
}
impl Track {
    #[inline]
    pub fn new() -> Track {
        Track { events: Vec::new() }
    }

    /// The events of the track, in order.
    #[inline]
    pub fn events(&self) -> &[TrackEvent] {
        &self.events
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Remove all events.
    #[inline]
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Append events at the end of the track.
    #[inline]
    pub fn add_range<I: IntoIterator<Item = TrackEvent>>(&mut self, events: I) {
        self.events.extend(events);
    }

    #[inline]
    pub fn into_events(self) -> Vec<TrackEvent> {
        self.events
    }

    /// Iterate over the events of the track along with their absolute time.
    #[inline]
    pub fn timed_events(&self) -> TimedEvents {
        self.tagged_timed_events(0)
    }

    pub(crate) fn tagged_timed_events(&self, track: usize) -> TimedEvents {
        TimedEvents {
            iter: self.events.iter().enumerate(),
            time: 0,
            track,
        }
    }

    /// Build a track out of events in any order.
    ///
    /// Events are sorted by time (ties keep their order) and delta times are computed as the
    /// distance to the previous event.
    /// An `EndOfTrack` meta event is always moved last.
    pub fn from_timed_events<I: IntoIterator<Item = TimedEvent>>(events: I) -> Result<Track> {
        Ok(Track {
            events: encode(events.into_iter().collect())?,
        })
    }

    /// Replace all events at once.
    #[inline]
    pub(crate) fn replace(&mut self, events: Vec<TrackEvent>) {
        self.events = events;
    }

    /// Keep only the events for which `keep` returns `true`, in a single pass.
    ///
    /// `keep` receives the index, absolute time and kind of each event.
    /// The delta time of each removed event is carried over to the next kept event, so kept
    /// events do not move.
    /// Returns the amount of removed events.
    pub(crate) fn retain<F>(&mut self, mut keep: F) -> Result<usize>
    where
        F: FnMut(usize, u64, &TrackEventKind) -> bool,
    {
        let mut kept = Vec::with_capacity(self.events.len());
        let mut time = 0;
        let mut last_kept = 0;
        for (idx, ev) in self.events.iter().enumerate() {
            time += ev.delta.ticks();
            if keep(idx, time, &ev.kind) {
                kept.push((idx, u28::from_ticks(time - last_kept)?));
                last_kept = time;
            }
        }
        let removed = self.events.len() - kept.len();
        if removed == 0 {
            return Ok(0);
        }
        let mut old = mem::take(&mut self.events).into_iter().enumerate();
        for (idx, delta) in kept {
            if let Some((_, ev)) = old.find(|(i, _)| *i == idx) {
                self.events.push(TrackEvent::new(delta, ev.kind));
            }
        }
        Ok(removed)
    }
}
impl From<Vec<TrackEvent>> for Track {
    #[inline]
    fn from(events: Vec<TrackEvent>) -> Track {
        Track { events }
    }
}
impl core::iter::FromIterator<TrackEvent> for Track {
    fn from_iter<I: IntoIterator<Item = TrackEvent>>(events: I) -> Track {
        Track {
            events: events.into_iter().collect(),
        }
    }
}

/// Iterator over the events of a track along with their absolute time.
///
/// Each event is tagged with its position, see `TimedEvent::source`.
#[derive(Clone, Debug)]
pub struct TimedEvents<'a> {
    iter: core::iter::Enumerate<core::slice::Iter<'a, TrackEvent>>,
    time: u64,
    track: usize,
}
impl<'a> Iterator for TimedEvents<'a> {
    type Item = TimedEvent;

    fn next(&mut self) -> Option<TimedEvent> {
        let (index, ev) = self.iter.next()?;
        self.time += ev.delta.ticks();
        Some(TimedEvent::with_source(
            self.time,
            ev.kind.clone(),
            EventSource {
                track: self.track,
                index,
            },
        ))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}
impl ExactSizeIterator for TimedEvents<'_> {}

/// Merge the events of several tracks into a single time-ordered sequence.
///
/// Simultaneous events are ordered by track, then by position in the track.
pub(crate) fn merge_tracks(tracks: &[Track]) -> Vec<TimedEvent> {
    let mut events: Vec<TimedEvent> = tracks
        .iter()
        .enumerate()
        .flat_map(|(idx, track)| track.tagged_timed_events(idx))
        .collect();
    events.sort_by_key(|ev| ev.time());
    events
}

/// Sort timed events and compute their delta times.
///
/// Events are ordered by time.
/// Simultaneous events that were read from a track keep their original relative order, and
/// come before simultaneous events that were not.
/// End of track events go last.
pub(crate) fn encode(events: Vec<TimedEvent>) -> Result<Vec<TrackEvent>> {
    encode_ranked(events.into_iter().map(|ev| (ev, None)).collect())
}

/// Sort timed events like `encode`, then reorder the simultaneous events that start an object
/// by the rank of their object.
///
/// Only the slots held by ranked events are rearranged, and events of equal rank keep their
/// relative order.
pub(crate) fn encode_ranked(
    mut events: Vec<(TimedEvent, Option<usize>)>,
) -> Result<Vec<TrackEvent>> {
    events.sort_by_key(|(ev, _rank)| {
        let source = ev
            .source()
            .map_or((usize::MAX, usize::MAX), |src| (src.track, src.index));
        (ev.kind().is_end_of_track(), ev.time(), source)
    });
    let mut start = 0;
    while start < events.len() {
        let tick = (events[start].0.kind().is_end_of_track(), events[start].0.time());
        let len = events[start..]
            .iter()
            .take_while(|(ev, _rank)| (ev.kind().is_end_of_track(), ev.time()) == tick)
            .count();
        let run = &mut events[start..start + len];
        let slots: Vec<usize> = (0..run.len()).filter(|&i| run[i].1.is_some()).collect();
        if slots.len() > 1 {
            let mut ranked: Vec<(TimedEvent, Option<usize>)> =
                slots.iter().map(|&i| run[i].clone()).collect();
            ranked.sort_by_key(|(_ev, rank)| *rank);
            for (slot, ev) in slots.into_iter().zip(ranked) {
                run[slot] = ev;
            }
        }
        start += len;
    }
    let mut prev = 0;
    let mut encoded = Vec::with_capacity(events.len());
    for (ev, _rank) in events {
        let time = ev.time().max(if ev.kind().is_end_of_track() { prev } else { 0 });
        encoded.push(TrackEvent::new(u28::from_ticks(time - prev)?, ev.into_kind()));
        prev = time;
    }
    Ok(encoded)
}
