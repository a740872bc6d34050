//! What all detected objects have in common.

use crate::{
    chord::{Chord, ChordChange},
    note::Note,
    prelude::*,
    rest::Rest,
    timed_event::{EventSource, TimedEvent},
};

/// An object positioned at an absolute time in ticks.
pub trait Timed {
    /// Absolute time of the object in ticks.
    fn time(&self) -> u64;

    /// Move the object to an absolute time, keeping its shape.
    fn set_time(&mut self, time: u64);

    /// Move the object by a signed amount of ticks.
    ///
    /// Fails without moving anything if the object would end up before tick zero.
    fn shift_time(&mut self, ticks: i64) -> Result<()> {
        let time = self.time() as i128 + ticks as i128;
        ensure!(time >= 0, err_state!("time cannot be negative"));
        self.set_time(time as u64);
        Ok(())
    }
}

/// An object that spans a range of time.
pub trait Lengthed: Timed {
    /// Amount of ticks between the start and the end of the object.
    fn length(&self) -> u64;

    /// Absolute time at which the object ends.
    #[inline]
    fn end_time(&self) -> u64 {
        self.time() + self.length()
    }
}

/// Orders objects by ascending time.
///
/// This is the default comparer of every collection and manager.
/// Sorting with it is stable, so objects at the same time keep their insertion order.
pub fn compare_by_time<T: Timed + ?Sized>(a: &T, b: &T) -> Ordering {
    a.time().cmp(&b.time())
}

/// A set of object types that detection should produce.
///
/// Types are combined with `|`:
///
/// ```rust
/// use midly_objects::ObjectType;
///
/// let wanted = ObjectType::CHORD | ObjectType::NOTE;
/// assert!(wanted.contains(ObjectType::NOTE));
/// assert!(!wanted.contains(ObjectType::TIMED_EVENT));
/// ```
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectType(u8);
impl ObjectType {
    /// Events that are not part of any other requested object.
    pub const TIMED_EVENT: ObjectType = ObjectType(1 << 0);
    /// Pairs of note-on and note-off events.
    pub const NOTE: ObjectType = ObjectType(1 << 1);
    /// Groups of notes starting at about the same time.
    pub const CHORD: ObjectType = ObjectType(1 << 2);
    /// Gaps between notes.
    pub const REST: ObjectType = ObjectType(1 << 3);

    /// No object type at all.
    #[inline]
    pub const fn empty() -> ObjectType {
        ObjectType(0)
    }

    /// Every object type.
    #[inline]
    pub const fn all() -> ObjectType {
        ObjectType(0b1111)
    }

    /// Whether all of the types in `other` are also in `self`.
    #[inline]
    pub const fn contains(self, other: ObjectType) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether any of the types in `other` is also in `self`.
    #[inline]
    pub const fn intersects(self, other: ObjectType) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Objects that own events and can therefore be edited and written back.
    pub(crate) fn ensure_editable(self) -> Result<()> {
        ensure!(!self.is_empty(), err_arg!("no object type requested"));
        ensure!(
            !self.intersects(ObjectType::REST),
            err_arg!("rests are derived from notes and cannot be edited")
        );
        Ok(())
    }
}
impl core::ops::BitOr for ObjectType {
    type Output = ObjectType;
    #[inline]
    fn bitor(self, rhs: ObjectType) -> ObjectType {
        ObjectType(self.0 | rhs.0)
    }
}
impl core::ops::BitOrAssign for ObjectType {
    #[inline]
    fn bitor_assign(&mut self, rhs: ObjectType) {
        self.0 |= rhs.0;
    }
}
impl core::ops::BitAnd for ObjectType {
    type Output = ObjectType;
    #[inline]
    fn bitand(self, rhs: ObjectType) -> ObjectType {
        ObjectType(self.0 & rhs.0)
    }
}

/// Any detected object.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TimedObject {
    /// An event that is not part of any other requested object.
    TimedEvent(TimedEvent),
    /// A note.
    Note(Note),
    /// A chord.
    Chord(Chord),
    /// A rest.
    Rest(Rest),
}
impl TimedObject {
    /// The type of this object, as a single flag.
    pub fn object_type(&self) -> ObjectType {
        match self {
            TimedObject::TimedEvent(_) => ObjectType::TIMED_EVENT,
            TimedObject::Note(_) => ObjectType::NOTE,
            TimedObject::Chord(_) => ObjectType::CHORD,
            TimedObject::Rest(_) => ObjectType::REST,
        }
    }

    /// Length of the object, zero for timed events.
    pub fn length(&self) -> u64 {
        match self {
            TimedObject::TimedEvent(_) => 0,
            TimedObject::Note(note) => note.length(),
            TimedObject::Chord(chord) => chord.length(),
            TimedObject::Rest(rest) => rest.length(),
        }
    }

    /// Absolute time at which the object ends.
    #[inline]
    pub fn end_time(&self) -> u64 {
        self.time() + self.length()
    }

    pub fn as_timed_event(&self) -> Option<&TimedEvent> {
        match self {
            TimedObject::TimedEvent(ev) => Some(ev),
            _ => None,
        }
    }

    pub fn as_note(&self) -> Option<&Note> {
        match self {
            TimedObject::Note(note) => Some(note),
            _ => None,
        }
    }

    pub fn as_chord(&self) -> Option<&Chord> {
        match self {
            TimedObject::Chord(chord) => Some(chord),
            _ => None,
        }
    }

    pub fn as_rest(&self) -> Option<&Rest> {
        match self {
            TimedObject::Rest(rest) => Some(rest),
            _ => None,
        }
    }
}
impl Timed for TimedObject {
    fn time(&self) -> u64 {
        match self {
            TimedObject::TimedEvent(ev) => ev.time(),
            TimedObject::Note(note) => note.time(),
            TimedObject::Chord(chord) => chord.time(),
            TimedObject::Rest(rest) => rest.time(),
        }
    }

    fn set_time(&mut self, time: u64) {
        match self {
            TimedObject::TimedEvent(ev) => ev.set_time(time),
            TimedObject::Note(note) => note.set_time(time),
            TimedObject::Chord(chord) => chord.set_time(time),
            TimedObject::Rest(rest) => rest.set_time(time),
        }
    }
}
impl From<TimedEvent> for TimedObject {
    fn from(ev: TimedEvent) -> TimedObject {
        TimedObject::TimedEvent(ev)
    }
}
impl From<Note> for TimedObject {
    fn from(note: Note) -> TimedObject {
        TimedObject::Note(note)
    }
}
impl From<Chord> for TimedObject {
    fn from(chord: Chord) -> TimedObject {
        TimedObject::Chord(chord)
    }
}
impl From<Rest> for TimedObject {
    fn from(rest: Rest) -> TimedObject {
        TimedObject::Rest(rest)
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for crate::timed_event::TimedEvent {}
    impl Sealed for crate::note::Note {}
    impl Sealed for crate::chord::Chord {}
    impl Sealed for crate::timed::TimedObject {}
}

/// The object types that managers, processing utilities and writers work with.
///
/// This trait is sealed: it is implemented for `TimedEvent`, `Note`, `Chord` and `TimedObject`.
pub trait TimedObjectKind: Timed + sealed::Sealed + Sized {
    /// The object type to detect when no other type is specified.
    const OBJECT_TYPE: ObjectType;

    /// Take the object out of the generic enum, or give it back if it is of another type.
    fn from_object(object: TimedObject) -> core::result::Result<Self, TimedObject>;

    /// Append copies of the events of this object to `out`.
    fn collect_events(&self, out: &mut Vec<TimedEvent>);

    /// Append the events of this object to `out`.
    fn into_events(self, out: &mut Vec<TimedEvent>);

    /// Start and length of the object.
    fn time_and_length(&self) -> (u64, u64);

    /// Identity, start and length of each note the object is made of.
    #[doc(hidden)]
    fn note_snapshot(&self) -> Vec<(Option<EventSource>, u64, u64)> {
        Vec::new()
    }

    /// Drain the change log of the object, if it keeps one.
    #[doc(hidden)]
    fn take_changes(&mut self) -> Vec<ChordChange> {
        Vec::new()
    }
}
impl TimedObjectKind for TimedEvent {
    const OBJECT_TYPE: ObjectType = ObjectType::TIMED_EVENT;

    fn from_object(object: TimedObject) -> core::result::Result<TimedEvent, TimedObject> {
        match object {
            TimedObject::TimedEvent(ev) => Ok(ev),
            other => Err(other),
        }
    }

    fn collect_events(&self, out: &mut Vec<TimedEvent>) {
        out.push(self.clone());
    }

    fn into_events(self, out: &mut Vec<TimedEvent>) {
        out.push(self);
    }

    fn time_and_length(&self) -> (u64, u64) {
        (self.time(), 0)
    }
}
impl TimedObjectKind for Note {
    const OBJECT_TYPE: ObjectType = ObjectType::NOTE;

    fn from_object(object: TimedObject) -> core::result::Result<Note, TimedObject> {
        match object {
            TimedObject::Note(note) => Ok(note),
            other => Err(other),
        }
    }

    fn collect_events(&self, out: &mut Vec<TimedEvent>) {
        out.extend(self.timed_events().iter().cloned());
    }

    fn into_events(self, out: &mut Vec<TimedEvent>) {
        out.extend(self.timed_events().iter().cloned());
    }

    fn time_and_length(&self) -> (u64, u64) {
        (self.time(), self.length())
    }

    fn note_snapshot(&self) -> Vec<(Option<EventSource>, u64, u64)> {
        vec![(self.on_source(), self.time(), self.length())]
    }
}
impl TimedObjectKind for Chord {
    const OBJECT_TYPE: ObjectType = ObjectType::CHORD;

    fn from_object(object: TimedObject) -> core::result::Result<Chord, TimedObject> {
        match object {
            TimedObject::Chord(chord) => Ok(chord),
            other => Err(other),
        }
    }

    fn collect_events(&self, out: &mut Vec<TimedEvent>) {
        for note in self.notes() {
            note.collect_events(out);
        }
    }

    fn into_events(self, out: &mut Vec<TimedEvent>) {
        for note in self.into_notes() {
            note.into_events(out);
        }
    }

    fn time_and_length(&self) -> (u64, u64) {
        self.time_and_length()
    }

    fn note_snapshot(&self) -> Vec<(Option<EventSource>, u64, u64)> {
        let mut snapshot: Vec<_> = self
            .notes()
            .iter()
            .map(|note| (note.on_source(), note.time(), note.length()))
            .collect();
        snapshot.sort();
        snapshot
    }

    fn take_changes(&mut self) -> Vec<ChordChange> {
        Chord::take_changes(self)
    }
}
impl TimedObjectKind for TimedObject {
    const OBJECT_TYPE: ObjectType = ObjectType::TIMED_EVENT;

    fn from_object(object: TimedObject) -> core::result::Result<TimedObject, TimedObject> {
        Ok(object)
    }

    fn collect_events(&self, out: &mut Vec<TimedEvent>) {
        match self {
            TimedObject::TimedEvent(ev) => ev.collect_events(out),
            TimedObject::Note(note) => note.collect_events(out),
            TimedObject::Chord(chord) => chord.collect_events(out),
            TimedObject::Rest(_) => {}
        }
    }

    fn into_events(self, out: &mut Vec<TimedEvent>) {
        match self {
            TimedObject::TimedEvent(ev) => ev.into_events(out),
            TimedObject::Note(note) => note.into_events(out),
            TimedObject::Chord(chord) => chord.into_events(out),
            TimedObject::Rest(_) => {}
        }
    }

    fn time_and_length(&self) -> (u64, u64) {
        match self {
            TimedObject::Chord(chord) => chord.time_and_length(),
            other => (other.time(), other.length()),
        }
    }

    fn note_snapshot(&self) -> Vec<(Option<EventSource>, u64, u64)> {
        match self {
            TimedObject::Note(note) => note.note_snapshot(),
            TimedObject::Chord(chord) => chord.note_snapshot(),
            _ => Vec::new(),
        }
    }

    fn take_changes(&mut self) -> Vec<ChordChange> {
        match self {
            TimedObject::Chord(chord) => Chord::take_changes(chord),
            _ => Vec::new(),
        }
    }
}
