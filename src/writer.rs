//! Forward-only writing of objects as delta-timed events.

use crate::{
    event::TrackEvent,
    prelude::*,
    timed::{Timed, TimedObjectKind},
    timed_event::TimedEvent,
    track::Track,
};
use std::collections::VecDeque;

/// Somewhere delta-timed events can be written to, one at a time.
pub trait EventSink {
    fn write_event(&mut self, event: TrackEvent) -> Result<()>;
}
impl EventSink for Vec<TrackEvent> {
    #[inline]
    fn write_event(&mut self, event: TrackEvent) -> Result<()> {
        self.push(event);
        Ok(())
    }
}
impl EventSink for Track {
    #[inline]
    fn write_event(&mut self, event: TrackEvent) -> Result<()> {
        self.add_range(Some(event));
        Ok(())
    }
}
impl<S: EventSink + ?Sized> EventSink for &mut S {
    #[inline]
    fn write_event(&mut self, event: TrackEvent) -> Result<()> {
        (**self).write_event(event)
    }
}

/// Writes objects to an `EventSink` as they come, without collecting them first.
///
/// Objects must be handed over in order of their start time.
/// Events of an object that end up later than its start, such as note-offs, are held back until
/// an object starting at or after them arrives, so only those events are ever buffered.
///
/// Remaining events are flushed by `finish`, or when the writer is dropped.
///
/// ```rust
/// use midly_objects::{num::{u4, u7}, Note, TimedObjectsWriter};
///
/// let mut writer = TimedObjectsWriter::new(Vec::new());
/// writer.write_object(Note::new(u4::new(0), u7::new(60), 0, 100)).unwrap();
/// writer.write_object(Note::new(u4::new(0), u7::new(62), 50, 100)).unwrap();
/// let events = writer.finish().unwrap();
/// let deltas: Vec<u32> = events.iter().map(|ev| ev.delta.as_int()).collect();
/// assert_eq!(deltas, [0, 50, 50, 50]);
/// ```
pub struct TimedObjectsWriter<S: EventSink> {
    sink: Option<S>,
    /// Time of the last written event.
    position: u64,
    /// Events waiting for their turn, ordered by time.
    pending: VecDeque<TimedEvent>,
}
impl<S: EventSink> TimedObjectsWriter<S> {
    pub fn new(sink: S) -> TimedObjectsWriter<S> {
        TimedObjectsWriter {
            sink: Some(sink),
            position: 0,
            pending: VecDeque::new(),
        }
    }

    /// Time of the last event written to the sink.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Amount of events held back.
    #[inline]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Write an object.
    ///
    /// Fails with `ErrorKind::OutOfOrder` without writing anything if the object starts before
    /// an event that was already written.
    pub fn write_object<T: TimedObjectKind>(&mut self, object: T) -> Result<()> {
        let time = object.time();
        ensure!(
            time >= self.position,
            ErrorKind::OutOfOrder {
                time,
                position: self.position,
            }
        );
        while self.pending.front().map_or(false, |ev| ev.time() <= time) {
            if let Some(ev) = self.pending.pop_front() {
                self.emit(ev)?;
            }
        }
        let mut events = Vec::new();
        object.into_events(&mut events);
        events.sort_by_key(|ev| ev.time());
        for ev in events {
            if ev.time() <= time {
                self.emit(ev)?;
            } else {
                let at = self.pending.partition_point(|pending| pending.time() <= ev.time());
                tracing::trace!(time = ev.time(), "holding back event");
                self.pending.insert(at, ev);
            }
        }
        Ok(())
    }

    /// Write a sequence of objects ordered by start time.
    pub fn write_objects<I, T>(&mut self, objects: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: TimedObjectKind,
    {
        for obj in objects {
            self.write_object(obj)?;
        }
        Ok(())
    }

    /// Flush every pending event and give the sink back.
    pub fn finish(mut self) -> Result<S> {
        self.flush()?;
        self.sink
            .take()
            .ok_or_else(|| err_state!("writer is already finished").into())
    }

    fn flush(&mut self) -> Result<()> {
        let count = self.pending.len();
        while let Some(ev) = self.pending.pop_front() {
            self.emit(ev)?;
        }
        tracing::debug!(flushed = count, position = self.position, "flushed writer");
        Ok(())
    }

    fn emit(&mut self, ev: TimedEvent) -> Result<()> {
        let sink = match self.sink.as_mut() {
            Some(sink) => sink,
            None => bail!(err_state!("writer is already finished")),
        };
        let time = ev.time();
        let delta = u28::from_ticks(time - self.position)?;
        sink.write_event(TrackEvent::new(delta, ev.into_kind()))?;
        self.position = time;
        Ok(())
    }
}
impl<S: EventSink> Drop for TimedObjectsWriter<S> {
    fn drop(&mut self) {
        if self.sink.is_none() {
            return;
        }
        if let Err(err) = self.flush() {
            tracing::error!(error = %err, "failed to flush writer on drop");
        }
    }
}
impl<S: EventSink + fmt::Debug> fmt::Debug for TimedObjectsWriter<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TimedObjectsWriter")
            .field("sink", &self.sink)
            .field("position", &self.position)
            .field("pending", &self.pending)
            .finish()
    }
}

impl Track {
    /// Build a track out of objects ordered by start time.
    pub fn from_objects<I, T>(objects: I) -> Result<Track>
    where
        I: IntoIterator<Item = T>,
        T: TimedObjectKind,
    {
        let mut writer = TimedObjectsWriter::new(Track::new());
        writer.write_objects(objects)?;
        writer.finish()
    }
}
