//! Notes and note detection.

use crate::{
    event::{MidiMessage, NoteEvent, TrackEventKind},
    prelude::*,
    timed::{Lengthed, Timed, TimedObject},
    timed_event::{EventSource, TimedEvent},
};
use std::collections::{HashMap, VecDeque};

/// A note: a note-on event and the note-off event that stops it, on the same channel and key.
///
/// The two events are rebuilt from the properties of the note whenever they are needed, so they
/// always agree on channel and key, and the note-off never precedes the note-on.
#[derive(Clone, Debug)]
pub struct Note {
    channel: u4,
    key: u7,
    time: u64,
    length: u64,
    velocity: u7,
    off_velocity: u7,
    /// The note was stopped by a note-on with zero velocity.
    silent_off: bool,
    on_source: Option<EventSource>,
    off_source: Option<EventSource>,
}
impl Note {
    /// Velocity of notes created with `Note::new`.
    pub const DEFAULT_VELOCITY: u7 = u7::new(100);
    /// Off velocity of notes created with `Note::new`.
    pub const DEFAULT_OFF_VELOCITY: u7 = u7::new(0);

    /// Create a note with the default velocities.
    pub fn new(channel: u4, key: u7, time: u64, length: u64) -> Note {
        Note {
            channel,
            key,
            time,
            length,
            velocity: Note::DEFAULT_VELOCITY,
            off_velocity: Note::DEFAULT_OFF_VELOCITY,
            silent_off: false,
            on_source: None,
            off_source: None,
        }
    }

    /// Build a note out of a note-on and a note-off event.
    ///
    /// The events must start and stop a note on the same channel and key, and the note-off must
    /// not come before the note-on.
    pub fn from_events(on: &TimedEvent, off: &TimedEvent) -> Result<Note> {
        let (channel, key, velocity) = match on.kind().as_note_event() {
            Some(NoteEvent::On { channel, key, vel }) => (channel, key, vel),
            _ => bail!(err_arg!("first event does not start a note")),
        };
        let off_velocity = match off.kind().as_note_event() {
            Some(NoteEvent::Off {
                channel: off_channel,
                key: off_key,
                vel,
            }) => {
                ensure!(
                    off_channel == channel && off_key == key,
                    err_arg!("note-on and note-off events belong to different notes")
                );
                vel
            }
            _ => bail!(err_arg!("second event does not stop a note")),
        };
        ensure!(
            off.time() >= on.time(),
            err_arg!("note-off event comes before the note-on event")
        );
        Ok(Note {
            channel,
            key,
            time: on.time(),
            length: off.time() - on.time(),
            velocity,
            off_velocity,
            silent_off: !matches!(
                off.kind(),
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOff { .. },
                    ..
                }
            ),
            on_source: on.source(),
            off_source: off.source(),
        })
    }

    /// Set the length of the note, moving its note-off event.
    #[inline]
    pub fn set_length(&mut self, length: u64) {
        self.length = length;
    }

    /// Set the end time of the note, moving its note-off event.
    pub fn set_end_time(&mut self, end_time: u64) -> Result<()> {
        ensure!(
            end_time >= self.time,
            err_arg!("note cannot end before it starts")
        );
        self.length = end_time - self.time;
        Ok(())
    }

    #[inline]
    pub fn channel(&self) -> u4 {
        self.channel
    }

    #[inline]
    pub fn set_channel(&mut self, channel: u4) {
        self.channel = channel;
    }

    /// The key, or note number, of the note.
    #[inline]
    pub fn key(&self) -> u7 {
        self.key
    }

    #[inline]
    pub fn set_key(&mut self, key: u7) {
        self.key = key;
    }

    /// Velocity of the note-on event.
    #[inline]
    pub fn velocity(&self) -> u7 {
        self.velocity
    }

    /// Set the velocity of the note-on event.
    ///
    /// A note-on with a velocity of zero would stop a note instead of starting one, so zero is
    /// rejected.
    pub fn set_velocity(&mut self, velocity: u7) -> Result<()> {
        ensure!(
            velocity.as_int() > 0,
            err_arg!("note-on velocity must be greater than zero")
        );
        self.velocity = velocity;
        Ok(())
    }

    /// Velocity of the note-off event.
    #[inline]
    pub fn off_velocity(&self) -> u7 {
        self.off_velocity
    }

    #[inline]
    pub fn set_off_velocity(&mut self, off_velocity: u7) {
        self.off_velocity = off_velocity;
    }

    /// The note-on event.
    pub fn note_on_event(&self) -> TimedEvent {
        let kind = TrackEventKind::note_on(self.channel, self.key, self.velocity);
        let mut ev = TimedEvent::new(self.time, kind);
        ev.set_source(self.on_source);
        ev
    }

    /// The note-off event.
    ///
    /// Notes stopped by a zero-velocity note-on keep doing so as long as the off velocity stays
    /// zero.
    pub fn note_off_event(&self) -> TimedEvent {
        let kind = if self.silent_off && self.off_velocity.as_int() == 0 {
            TrackEventKind::note_on(self.channel, self.key, self.off_velocity)
        } else {
            TrackEventKind::note_off(self.channel, self.key, self.off_velocity)
        };
        let mut ev = TimedEvent::new(self.end_time(), kind);
        ev.set_source(self.off_source);
        ev
    }

    /// Both events of the note, note-on first.
    pub fn timed_events(&self) -> [TimedEvent; 2] {
        [self.note_on_event(), self.note_off_event()]
    }

    /// Split the note at the given time.
    ///
    /// Returns the part before `time` and the part after it.
    /// If `time` falls outside of the note, one of the parts is a copy of the whole note and the
    /// other one is `None`.
    pub fn split(&self, time: u64) -> (Option<Note>, Option<Note>) {
        if time <= self.time {
            return (None, Some(self.clone()));
        }
        if time >= self.end_time() {
            return (Some(self.clone()), None);
        }
        let mut left = self.clone();
        left.length = time - self.time;
        left.off_source = None;
        let mut right = self.clone();
        right.time = time;
        right.length = self.end_time() - time;
        right.on_source = None;
        (Some(left), Some(right))
    }

    #[inline]
    pub(crate) fn on_source(&self) -> Option<EventSource> {
        self.on_source
    }

    pub(crate) fn set_sources(&mut self, on: Option<EventSource>, off: Option<EventSource>) {
        self.on_source = on;
        self.off_source = off;
    }
}
impl Timed for Note {
    #[inline]
    fn time(&self) -> u64 {
        self.time
    }

    /// Moves the note-off event along, keeping the length.
    #[inline]
    fn set_time(&mut self, time: u64) {
        self.time = time;
    }
}
impl Lengthed for Note {
    #[inline]
    fn length(&self) -> u64 {
        self.length
    }
}
impl PartialEq for Note {
    fn eq(&self, other: &Note) -> bool {
        self.timed_events() == other.timed_events()
    }
}
impl Eq for Note {}

/// Which open note-on a note-off closes when several notes on the same channel and key
/// overlap.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NoteStartDetectionPolicy {
    /// The earliest open note-on, so overlapping notes are paired first-in, first-out.
    FirstNoteOn,
    /// The latest open note-on.
    LastNoteOn,
}
impl Default for NoteStartDetectionPolicy {
    fn default() -> NoteStartDetectionPolicy {
        NoteStartDetectionPolicy::FirstNoteOn
    }
}

/// Where the note-off of a note is searched for when detecting notes in several tracks at once.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NoteSearchContext {
    /// Only in the track of the note-on.
    SingleEventsCollection,
    /// In any track.
    AllEventsCollections,
}
impl Default for NoteSearchContext {
    fn default() -> NoteSearchContext {
        NoteSearchContext::SingleEventsCollection
    }
}

/// The data a `NoteConstructor` decides on.
#[derive(Copy, Clone, Debug)]
pub struct NoteData<'a> {
    /// The event starting the note.
    pub on: &'a TimedEvent,
    /// The event stopping the note.
    pub off: &'a TimedEvent,
}

/// Builds the note detected for a note-on and note-off pair, or declines with `None`.
///
/// The events of a declined pair are detected as plain timed events.
pub type NoteConstructor = Arc<dyn Fn(NoteData) -> Option<Note> + Send + Sync>;

/// Settings controlling how notes are detected.
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NoteDetectionSettings {
    pub start_policy: NoteStartDetectionPolicy,
    pub search_context: NoteSearchContext,
    /// Custom constructor for detected notes.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub constructor: Option<NoteConstructor>,
}
impl NoteDetectionSettings {
    pub fn with_start_policy(mut self, policy: NoteStartDetectionPolicy) -> NoteDetectionSettings {
        self.start_policy = policy;
        self
    }

    pub fn with_search_context(mut self, context: NoteSearchContext) -> NoteDetectionSettings {
        self.search_context = context;
        self
    }

    /// Use a custom constructor for detected notes.
    pub fn with_constructor<F>(mut self, constructor: F) -> NoteDetectionSettings
    where
        F: Fn(NoteData) -> Option<Note> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(constructor));
        self
    }

    fn construct(
        &self,
        on: TimedEvent,
        off: TimedEvent,
    ) -> core::result::Result<Note, (TimedEvent, TimedEvent)> {
        let built = match &self.constructor {
            Some(ctor) => ctor(NoteData { on: &on, off: &off }),
            None => Note::from_events(&on, &off).ok(),
        };
        match built {
            Some(mut note) => {
                note.set_sources(on.source(), off.source());
                Ok(note)
            }
            None => Err((on, off)),
        }
    }
}
impl fmt::Debug for NoteDetectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("NoteDetectionSettings")
            .field("start_policy", &self.start_policy)
            .field("search_context", &self.search_context)
            .field("constructor", &self.constructor.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// An output of note detection, along with the arrival order of its events.
#[derive(Debug)]
pub(crate) enum Detected {
    Note {
        note: Note,
        on_seq: usize,
        off_seq: usize,
    },
    Event {
        event: TimedEvent,
        seq: usize,
    },
}

#[derive(Debug)]
enum Slot {
    Open { event: TimedEvent, seq: usize },
    Done(Detected),
    Vacant,
}

type NoteId = (Option<usize>, u4, u7);

/// Pairs note-on and note-off events on the fly.
///
/// Outputs are yielded in the order their first event arrived in, which means a note is held
/// back until every note started before it is complete.
/// Note-ons that are never closed and note-offs that close nothing come out as plain events.
pub(crate) struct NotesBuilder<'s, I> {
    events: I,
    settings: &'s NoteDetectionSettings,
    slots: VecDeque<Slot>,
    /// Absolute index of `slots[0]`.
    base: usize,
    open: HashMap<NoteId, VecDeque<usize>>,
    exhausted: bool,
}
impl<'s, I> NotesBuilder<'s, I>
where
    I: Iterator<Item = (usize, TimedEvent)>,
{
    pub(crate) fn new(events: I, settings: &'s NoteDetectionSettings) -> NotesBuilder<'s, I> {
        NotesBuilder {
            events,
            settings,
            slots: VecDeque::new(),
            base: 0,
            open: HashMap::new(),
            exhausted: false,
        }
    }

    fn note_id(&self, event: &TimedEvent, note: NoteEvent) -> NoteId {
        let track = match self.settings.search_context {
            NoteSearchContext::SingleEventsCollection => event.source().map(|src| src.track),
            NoteSearchContext::AllEventsCollections => None,
        };
        (track, note.channel(), note.key())
    }

    fn push(&mut self, seq: usize, event: TimedEvent) {
        let note = match event.kind().as_note_event() {
            Some(note) => note,
            None => {
                self.slots.push_back(Slot::Done(Detected::Event { event, seq }));
                return;
            }
        };
        let id = self.note_id(&event, note);
        match note {
            NoteEvent::On { .. } => {
                let idx = self.base + self.slots.len();
                self.slots.push_back(Slot::Open { event, seq });
                self.open.entry(id).or_default().push_back(idx);
            }
            NoteEvent::Off { .. } => {
                let policy = self.settings.start_policy;
                let idx = self.open.get_mut(&id).and_then(|holder| match policy {
                    NoteStartDetectionPolicy::FirstNoteOn => holder.pop_front(),
                    NoteStartDetectionPolicy::LastNoteOn => holder.pop_back(),
                });
                if self.open.get(&id).map_or(false, |holder| holder.is_empty()) {
                    self.open.remove(&id);
                }
                let idx = match idx {
                    Some(idx) => idx - self.base,
                    None => {
                        self.slots.push_back(Slot::Done(Detected::Event { event, seq }));
                        return;
                    }
                };
                if let Slot::Open { event: on, seq: on_seq } =
                    mem::replace(&mut self.slots[idx], Slot::Vacant)
                {
                    match self.settings.construct(on, event) {
                        Ok(note) => {
                            self.slots[idx] = Slot::Done(Detected::Note {
                                note,
                                on_seq,
                                off_seq: seq,
                            });
                        }
                        Err((on, off)) => {
                            self.slots[idx] = Slot::Done(Detected::Event {
                                event: on,
                                seq: on_seq,
                            });
                            self.slots
                                .push_back(Slot::Done(Detected::Event { event: off, seq }));
                        }
                    }
                }
            }
        }
    }
}
impl<'s, I> Iterator for NotesBuilder<'s, I>
where
    I: Iterator<Item = (usize, TimedEvent)>,
{
    type Item = Detected;

    fn next(&mut self) -> Option<Detected> {
        loop {
            if let Some(Slot::Done(_)) = self.slots.front() {
                self.base += 1;
                if let Some(Slot::Done(detected)) = self.slots.pop_front() {
                    return Some(detected);
                }
            }
            if self.exhausted {
                self.base += 1;
                match self.slots.pop_front()? {
                    Slot::Open { event, seq } => return Some(Detected::Event { event, seq }),
                    Slot::Done(detected) => return Some(detected),
                    Slot::Vacant => continue,
                }
            }
            match self.events.next() {
                Some((seq, event)) => self.push(seq, event),
                None => self.exhausted = true,
            }
        }
    }
}

/// Detect the notes among a time-ordered sequence of events.
///
/// Events that are not part of any note are skipped.
pub fn get_notes<I>(events: I, settings: &NoteDetectionSettings) -> Vec<Note>
where
    I: IntoIterator<Item = TimedEvent>,
{
    NotesBuilder::new(events.into_iter().enumerate(), settings)
        .filter_map(|detected| match detected {
            Detected::Note { note, .. } => Some(note),
            Detected::Event { .. } => None,
        })
        .collect()
}

/// Lazily detect the notes among a time-ordered sequence of events, passing every other event
/// through.
///
/// Objects come out ordered by the time of their first event, ties keeping the input order.
pub fn notes_and_timed_events<'s, I>(
    events: I,
    settings: &'s NoteDetectionSettings,
) -> impl Iterator<Item = TimedObject> + 's
where
    I: IntoIterator<Item = TimedEvent>,
    I::IntoIter: 's,
{
    NotesBuilder::new(events.into_iter().enumerate(), settings).map(|detected| match detected {
        Detected::Note { note, .. } => TimedObject::Note(note),
        Detected::Event { event, .. } => TimedObject::TimedEvent(event),
    })
}
