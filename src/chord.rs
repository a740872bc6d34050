//! Chords and chord detection.

use crate::{
    note::{Detected, Note, NoteSearchContext},
    prelude::*,
    timed::{Lengthed, Timed, TimedObject},
};
use std::collections::HashMap;

/// A change of a chord's time or length, as recorded in its change log.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum ChordChange {
    /// The chord was moved.
    Time { old: u64, new: u64 },
    /// The chord was stretched or shrunk.
    Length { old: u64, new: u64 },
}

/// A group of notes.
///
/// The time of a chord is the time of its earliest note, and its length spans up to the end of
/// its latest-ending note.
/// Channel and velocities are the values shared by all of the notes; reading them fails if the
/// notes disagree or if there are no notes at all.
///
/// Moving or stretching a chord through its setters records a `ChordChange`, unless the new
/// value equals the old one.
/// The log is drained with `take_changes`.
#[derive(Clone, Debug, Default)]
pub struct Chord {
    notes: Vec<Note>,
    changes: Vec<ChordChange>,
}
impl Chord {
    /// Create a chord out of the given notes, in insertion order.
    pub fn new<I: IntoIterator<Item = Note>>(notes: I) -> Chord {
        Chord {
            notes: notes.into_iter().collect(),
            changes: Vec::new(),
        }
    }

    /// Create a chord out of the given notes and move it to `time`.
    pub fn with_time<I: IntoIterator<Item = Note>>(notes: I, time: u64) -> Chord {
        let mut chord = Chord::new(notes);
        chord.set_time(time);
        chord.changes.clear();
        chord
    }

    /// The notes of the chord, in insertion order.
    #[inline]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Mutable access to the notes of the chord.
    ///
    /// Changes made through this reference are not recorded in the change log.
    #[inline]
    pub fn notes_mut(&mut self) -> &mut Vec<Note> {
        &mut self.notes
    }

    #[inline]
    pub fn into_notes(self) -> Vec<Note> {
        self.notes
    }

    #[inline]
    pub fn add_note(&mut self, note: Note) {
        self.notes.push(note);
    }

    /// Remove every note matching the predicate, returning the removed notes.
    pub fn remove_notes<F>(&mut self, mut matches: F) -> Vec<Note>
    where
        F: FnMut(&Note) -> bool,
    {
        let (removed, kept) = mem::take(&mut self.notes)
            .into_iter()
            .partition(|note| matches(note));
        self.notes = kept;
        removed
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Time and length of the chord in one pass, both zero for an empty chord.
    pub fn time_and_length(&self) -> (u64, u64) {
        let mut start = u64::MAX;
        let mut end = 0;
        for note in &self.notes {
            start = start.min(note.time());
            end = end.max(note.end_time());
        }
        if self.notes.is_empty() {
            (0, 0)
        } else {
            (start, end - start)
        }
    }

    /// Stretch or shrink the chord by changing the length of every note by the same amount.
    ///
    /// The length cannot be less than the distance from the chord start to its last note, and
    /// cannot leave any note with a negative length.
    pub fn set_length(&mut self, length: u64) -> Result<()> {
        let (start, old) = self.time_and_length();
        if length == old {
            return Ok(());
        }
        ensure!(!self.notes.is_empty(), err_state!("chord is empty"));
        let last_note_time = self.notes.iter().map(|note| note.time()).max().unwrap_or(start);
        ensure!(
            length >= last_note_time - start,
            err_arg!("chord length is less than the distance between its start and its last note")
        );
        let change = length as i128 - old as i128;
        ensure!(
            self.notes
                .iter()
                .all(|note| note.length() as i128 + change >= 0),
            err_arg!("chord length would leave a note with a negative length")
        );
        for note in &mut self.notes {
            note.set_length((note.length() as i128 + change) as u64);
        }
        self.changes.push(ChordChange::Length { old, new: length });
        Ok(())
    }

    /// The channel shared by all notes.
    pub fn channel(&self) -> Result<u4> {
        self.common(Note::channel, "chord's notes have different channels")
    }

    /// Move every note to the given channel.
    pub fn set_channel(&mut self, channel: u4) {
        for note in &mut self.notes {
            note.set_channel(channel);
        }
    }

    /// The note-on velocity shared by all notes.
    pub fn velocity(&self) -> Result<u7> {
        self.common(Note::velocity, "chord's notes have different velocities")
    }

    /// Set the note-on velocity of every note.
    pub fn set_velocity(&mut self, velocity: u7) -> Result<()> {
        ensure!(
            velocity.as_int() > 0,
            err_arg!("note-on velocity must be greater than zero")
        );
        for note in &mut self.notes {
            note.set_velocity(velocity)?;
        }
        Ok(())
    }

    /// The note-off velocity shared by all notes.
    pub fn off_velocity(&self) -> Result<u7> {
        self.common(Note::off_velocity, "chord's notes have different off velocities")
    }

    /// Set the note-off velocity of every note.
    pub fn set_off_velocity(&mut self, off_velocity: u7) {
        for note in &mut self.notes {
            note.set_off_velocity(off_velocity);
        }
    }

    fn common<T: PartialEq + Copy>(&self, get: fn(&Note) -> T, differ: &'static str) -> Result<T> {
        let mut common = None;
        for note in &self.notes {
            let value = get(note);
            match common {
                Some(common) if common != value => bail!(err_state!(differ)),
                _ => common = Some(value),
            }
        }
        Ok(common.ok_or(err_state!("chord is empty"))?)
    }

    /// Split every note of the chord at the given time.
    ///
    /// Returns the chord made of the parts before `time` and the chord made of the parts after
    /// it.
    /// If `time` falls outside of the chord, one of the parts is a copy of the whole chord and
    /// the other one is `None`.
    pub fn split(&self, time: u64) -> (Option<Chord>, Option<Chord>) {
        let (start, length) = self.time_and_length();
        if time <= start {
            return (None, Some(Chord::new(self.notes.iter().cloned())));
        }
        if time >= start + length {
            return (Some(Chord::new(self.notes.iter().cloned())), None);
        }
        let mut left = Vec::new();
        let mut right = Vec::new();
        for note in &self.notes {
            let (l, r) = note.split(time);
            left.extend(l);
            right.extend(r);
        }
        (Some(Chord::new(left)), Some(Chord::new(right)))
    }

    /// Drain the log of time and length changes.
    pub fn take_changes(&mut self) -> Vec<ChordChange> {
        mem::take(&mut self.changes)
    }
}
impl Timed for Chord {
    #[inline]
    fn time(&self) -> u64 {
        self.time_and_length().0
    }

    /// Moves every note, keeping their offsets from the chord start.
    fn set_time(&mut self, time: u64) {
        let old = self.time();
        if time == old || self.notes.is_empty() {
            return;
        }
        for note in &mut self.notes {
            let offset = note.time() - old;
            note.set_time(time + offset);
        }
        self.changes.push(ChordChange::Time { old, new: time });
    }
}
impl Lengthed for Chord {
    #[inline]
    fn length(&self) -> u64 {
        self.time_and_length().1
    }
}
impl PartialEq for Chord {
    fn eq(&self, other: &Chord) -> bool {
        self.notes == other.notes
    }
}
impl Eq for Chord {}

/// The data a `ChordConstructor` decides on.
#[derive(Copy, Clone, Debug)]
pub struct ChordData<'a> {
    /// The notes grouped together, in detection order.
    pub notes: &'a [Note],
}

/// Builds the chord detected for a group of notes, or declines with `None`.
///
/// The notes of a declined group are detected as standalone notes.
pub type ChordConstructor = Arc<dyn Fn(ChordData) -> Option<Chord> + Send + Sync>;

/// Settings controlling how notes are grouped into chords.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ChordDetectionSettings {
    /// Maximum distance in ticks between the start of the first note of a chord and the start
    /// of any other note in it.
    pub notes_tolerance: u64,
    /// Minimum amount of notes in a chord, at least 1.
    pub notes_min_count: usize,
    /// Custom constructor for detected chords.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub constructor: Option<ChordConstructor>,
}
impl Default for ChordDetectionSettings {
    fn default() -> ChordDetectionSettings {
        ChordDetectionSettings {
            notes_tolerance: 0,
            notes_min_count: 1,
            constructor: None,
        }
    }
}
impl ChordDetectionSettings {
    pub fn with_notes_tolerance(mut self, notes_tolerance: u64) -> ChordDetectionSettings {
        self.notes_tolerance = notes_tolerance;
        self
    }

    pub fn with_notes_min_count(mut self, notes_min_count: usize) -> ChordDetectionSettings {
        self.notes_min_count = notes_min_count;
        self
    }

    /// Use a custom constructor for detected chords.
    pub fn with_constructor<F>(mut self, constructor: F) -> ChordDetectionSettings
    where
        F: Fn(ChordData) -> Option<Chord> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(constructor));
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.notes_min_count >= 1,
            err_arg!("minimum chord size must be at least 1")
        );
        Ok(())
    }

    fn construct(&self, notes: &[Note]) -> Option<Chord> {
        match &self.constructor {
            Some(ctor) => ctor(ChordData { notes }),
            None => Some(Chord::new(notes.iter().cloned())),
        }
    }
}
impl fmt::Debug for ChordDetectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ChordDetectionSettings")
            .field("notes_tolerance", &self.notes_tolerance)
            .field("notes_min_count", &self.notes_min_count)
            .field("constructor", &self.constructor.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// An output of chord detection, along with the arrival order of its first event.
#[derive(Debug)]
pub(crate) enum Grouped {
    Chord { chord: Chord, seq: usize },
    Single(Detected),
}

struct Member {
    /// Position of the note in the detection input.
    idx: usize,
    on_seq: usize,
    off_seq: usize,
}

/// Notes grouped so far on one channel.
struct Window {
    anchor: u64,
    notes: Vec<Note>,
    members: Vec<Member>,
}

/// Group detected notes into chords with a sliding window.
///
/// Each channel is grouped on its own.
/// A window is anchored at the start of its first note and takes every following note starting
/// within the tolerance; the first note that does not fit closes it.
/// Windows that are too small, or whose chord the constructor declines, give their notes back
/// as standalone notes.
/// The output keeps the order of the input, each chord taking the place of its first note.
pub(crate) fn group_chords(
    items: Vec<Detected>,
    settings: &ChordDetectionSettings,
    context: NoteSearchContext,
) -> Vec<Grouped> {
    let mut out: Vec<Option<Grouped>> = Vec::with_capacity(items.len());
    let mut windows: HashMap<(Option<usize>, u4), Window> = HashMap::new();
    for (idx, item) in items.into_iter().enumerate() {
        out.push(None);
        let (note, on_seq, off_seq) = match item {
            Detected::Note {
                note,
                on_seq,
                off_seq,
            } => (note, on_seq, off_seq),
            event => {
                out[idx] = Some(Grouped::Single(event));
                continue;
            }
        };
        let track = match context {
            NoteSearchContext::SingleEventsCollection => note.on_source().map(|src| src.track),
            NoteSearchContext::AllEventsCollections => None,
        };
        let key = (track, note.channel());
        let member = Member {
            idx,
            on_seq,
            off_seq,
        };
        let time = note.time();
        if let Some(window) = windows.get_mut(&key) {
            if time >= window.anchor && time - window.anchor <= settings.notes_tolerance {
                window.notes.push(note);
                window.members.push(member);
                continue;
            }
        }
        let fresh = Window {
            anchor: time,
            notes: vec![note],
            members: vec![member],
        };
        if let Some(closed) = windows.insert(key, fresh) {
            close_window(closed, settings, &mut out);
        }
    }
    for (_key, window) in windows {
        close_window(window, settings, &mut out);
    }
    out.into_iter().flatten().collect()
}

fn close_window(window: Window, settings: &ChordDetectionSettings, out: &mut [Option<Grouped>]) {
    if window.notes.len() >= settings.notes_min_count {
        if let Some(chord) = settings.construct(&window.notes) {
            let first = &window.members[0];
            out[first.idx] = Some(Grouped::Chord {
                chord,
                seq: first.on_seq,
            });
            return;
        }
    }
    for (note, member) in window.notes.into_iter().zip(window.members) {
        out[member.idx] = Some(Grouped::Single(Detected::Note {
            note,
            on_seq: member.on_seq,
            off_seq: member.off_seq,
        }));
    }
}

/// Group a time-ordered sequence of notes into chords.
///
/// Notes that do not end up in a chord come out as standalone notes, so no note is ever lost.
/// Objects come out ordered by time, ties keeping the input order.
pub fn group_notes_into_chords<I>(
    notes: I,
    settings: &ChordDetectionSettings,
) -> Result<Vec<TimedObject>>
where
    I: IntoIterator<Item = Note>,
{
    settings.validate()?;
    let items = notes
        .into_iter()
        .enumerate()
        .map(|(seq, note)| Detected::Note {
            note,
            on_seq: seq,
            off_seq: seq,
        })
        .collect();
    let mut objects: Vec<(usize, TimedObject)> =
        group_chords(items, settings, NoteSearchContext::AllEventsCollections)
            .into_iter()
            .map(|grouped| match grouped {
                Grouped::Chord { chord, seq } => (seq, TimedObject::Chord(chord)),
                Grouped::Single(Detected::Note { note, on_seq, .. }) => {
                    (on_seq, TimedObject::Note(note))
                }
                Grouped::Single(Detected::Event { event, seq }) => {
                    (seq, TimedObject::TimedEvent(event))
                }
            })
            .collect();
    objects.sort_by(|(a_seq, a), (b_seq, b)| a.time().cmp(&b.time()).then(a_seq.cmp(b_seq)));
    Ok(objects.into_iter().map(|(_seq, obj)| obj).collect())
}
