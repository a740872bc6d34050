//! Batch processing and removal of detected objects.

use crate::{
    chord::Chord,
    note::{Note, NoteDetectionSettings},
    objects::{detect, ObjectDetectionSettings},
    prelude::*,
    timed::{ObjectType, Timed, TimedObjectKind},
    timed_event::{EventSource, TimedEvent, TimedEventDetectionSettings},
    track::{encode, Track},
};
use std::collections::HashSet;

/// What a processing action promises it may change in the objects it is given.
///
/// After running the action on an object, only the promised aspects are compared against their
/// previous values.
/// If none of them changed, the events of the processed objects are written back in place,
/// keeping the delta times of the track.
/// Otherwise the whole track is regenerated.
///
/// Changing something that was not promised is detected: the track is left untouched and
/// processing fails with `ErrorKind::InvalidState`.
///
/// ```rust
/// use midly_objects::ObjectProcessingHint;
///
/// let hint = ObjectProcessingHint::TIME_OR_LENGTH_CAN_BE_CHANGED
///     | ObjectProcessingHint::NOTES_COLLECTION_CAN_BE_CHANGED;
/// assert!(hint.contains(ObjectProcessingHint::NOTES_COLLECTION_CAN_BE_CHANGED));
/// assert_eq!(ObjectProcessingHint::default(), ObjectProcessingHint::TIME_OR_LENGTH_CAN_BE_CHANGED);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectProcessingHint(u8);
impl ObjectProcessingHint {
    /// Neither times, lengths nor notes change, only event data such as velocities.
    pub const NONE: ObjectProcessingHint = ObjectProcessingHint(0);
    /// The time or the length of the objects may change.
    pub const TIME_OR_LENGTH_CAN_BE_CHANGED: ObjectProcessingHint = ObjectProcessingHint(1 << 0);
    /// Notes may be added to or removed from chords.
    pub const NOTES_COLLECTION_CAN_BE_CHANGED: ObjectProcessingHint = ObjectProcessingHint(1 << 1);
    /// The notes of chords may be moved, stretched or shrunk individually.
    pub const NOTE_TIME_OR_LENGTH_CAN_BE_CHANGED: ObjectProcessingHint =
        ObjectProcessingHint(1 << 2);

    /// Whether all of the promises in `other` are also in `self`.
    #[inline]
    pub const fn contains(self, other: ObjectProcessingHint) -> bool {
        self.0 & other.0 == other.0
    }

    fn watches_notes(self) -> bool {
        self.0
            & (ObjectProcessingHint::NOTES_COLLECTION_CAN_BE_CHANGED.0
                | ObjectProcessingHint::NOTE_TIME_OR_LENGTH_CAN_BE_CHANGED.0)
            != 0
    }
}
impl Default for ObjectProcessingHint {
    fn default() -> ObjectProcessingHint {
        ObjectProcessingHint::TIME_OR_LENGTH_CAN_BE_CHANGED
    }
}
impl core::ops::BitOr for ObjectProcessingHint {
    type Output = ObjectProcessingHint;
    #[inline]
    fn bitor(self, rhs: ObjectProcessingHint) -> ObjectProcessingHint {
        ObjectProcessingHint(self.0 | rhs.0)
    }
}
impl core::ops::BitOrAssign for ObjectProcessingHint {
    #[inline]
    fn bitor_assign(&mut self, rhs: ObjectProcessingHint) {
        self.0 |= rhs.0;
    }
}

/// The aspects of an object a hint promised could change.
#[derive(PartialEq, Eq, Debug)]
struct Snapshot {
    time_and_length: Option<(u64, u64)>,
    notes: Option<Vec<(Option<EventSource>, u64, u64)>>,
}
impl Snapshot {
    fn take<T: TimedObjectKind>(obj: &T, hint: ObjectProcessingHint) -> Snapshot {
        Snapshot {
            time_and_length: if hint.contains(ObjectProcessingHint::TIME_OR_LENGTH_CAN_BE_CHANGED)
            {
                Some(obj.time_and_length())
            } else {
                None
            },
            notes: if hint.watches_notes() {
                Some(obj.note_snapshot())
            } else {
                None
            },
        }
    }
}

fn event_layout(events: &[TimedEvent]) -> Vec<(Option<EventSource>, u64)> {
    let mut layout: Vec<_> = events.iter().map(|ev| (ev.source(), ev.time())).collect();
    layout.sort();
    layout
}

/// Run an action on every detected object of type `T` that matches a predicate.
///
/// Returns the amount of matching objects, which were all handed to `action`.
/// Detected objects that are not of type `T` are left alone.
/// If processing fails the track is left untouched.
pub fn process_objects<T, A, M>(
    track: &mut Track,
    object_type: ObjectType,
    settings: &ObjectDetectionSettings,
    mut action: A,
    mut matches: M,
    hint: ObjectProcessingHint,
) -> Result<usize>
where
    T: TimedObjectKind,
    A: FnMut(&mut T),
    M: FnMut(&T) -> bool,
{
    object_type.ensure_editable()?;
    let detection = detect(track.timed_events(), object_type, settings)?;
    let mut background = detection.background;
    let mut objects = Vec::with_capacity(detection.objects.len());
    for obj in detection.objects {
        match T::from_object(obj) {
            Ok(obj) => objects.push(obj),
            Err(other) => other.into_events(&mut background),
        }
    }

    let mut processed = 0;
    let mut moved = false;
    let mut touched: Vec<(Vec<TimedEvent>, Vec<TimedEvent>)> = Vec::new();
    for obj in &mut objects {
        if !matches(obj) {
            continue;
        }
        processed += 1;
        let snapshot = Snapshot::take(&*obj, hint);
        let mut before = Vec::new();
        obj.collect_events(&mut before);
        action(obj);
        obj.take_changes();
        if Snapshot::take(&*obj, hint) != snapshot {
            moved = true;
        }
        if !moved {
            let mut after = Vec::new();
            obj.collect_events(&mut after);
            touched.push((before, after));
        }
    }
    if processed == 0 {
        return Ok(0);
    }

    if moved {
        let mut events = background;
        for obj in objects {
            obj.into_events(&mut events);
        }
        let encoded = encode(events).context(err_state!("could not write processed objects"))?;
        tracing::debug!(processed, events = encoded.len(), "regenerated processed track");
        track.replace(encoded);
        return Ok(processed);
    }

    //Nothing moved: overwrite the events where they are
    let mut events = track.events().to_vec();
    for (before, after) in touched {
        if event_layout(&before) != event_layout(&after) {
            tracing::warn!(
                processed,
                ?hint,
                "processing action changed objects beyond what its hint allows"
            );
            bail!(err_state!(
                "processing action changed objects beyond what its hint allows"
            ));
        }
        for ev in after {
            if let Some(slot) = ev.source().and_then(|src| events.get_mut(src.index)) {
                slot.kind = ev.into_kind();
            }
        }
    }
    tracing::debug!(processed, "processed objects in place");
    track.replace(events);
    Ok(processed)
}

/// Remove every detected object of type `T` that matches a predicate, along with all of its
/// events.
///
/// The delta times of removed events are carried over so no other event moves.
/// Returns the amount of removed objects.
pub fn remove_objects<T, M>(
    track: &mut Track,
    object_type: ObjectType,
    settings: &ObjectDetectionSettings,
    mut matches: M,
) -> Result<usize>
where
    T: TimedObjectKind,
    M: FnMut(&T) -> bool,
{
    object_type.ensure_editable()?;
    let detection = detect(track.timed_events(), object_type, settings)?;
    let mut doomed = HashSet::new();
    let mut removed = 0;
    let mut events = Vec::new();
    for obj in detection.objects {
        let obj = match T::from_object(obj) {
            Ok(obj) => obj,
            Err(_) => continue,
        };
        if !matches(&obj) {
            continue;
        }
        removed += 1;
        obj.into_events(&mut events);
        doomed.extend(events.drain(..).filter_map(|ev| ev.source()).map(|src| src.index));
    }
    if removed == 0 {
        return Ok(0);
    }
    let removed_events = track.retain(|idx, _time, _kind| !doomed.contains(&idx))?;
    tracing::debug!(removed, removed_events, "removed objects");
    Ok(removed)
}

/// Remove every event of a track matching a predicate, in a single pass.
///
/// Returns the amount of removed events.
pub fn remove_timed_events<M>(track: &mut Track, mut matches: M) -> Result<usize>
where
    M: FnMut(&TimedEvent) -> bool,
{
    let removed = track.retain(|_idx, time, kind| !matches(&TimedEvent::new(time, kind.clone())))?;
    tracing::debug!(removed, "removed timed events");
    Ok(removed)
}

impl Track {
    /// Run an action on every detected object of type `T` that matches a predicate.
    ///
    /// See `process_objects`.
    pub fn process_objects<T, A, M>(
        &mut self,
        object_type: ObjectType,
        settings: &ObjectDetectionSettings,
        action: A,
        matches: M,
        hint: ObjectProcessingHint,
    ) -> Result<usize>
    where
        T: TimedObjectKind,
        A: FnMut(&mut T),
        M: FnMut(&T) -> bool,
    {
        process_objects(self, object_type, settings, action, matches, hint)
    }

    /// Run an action on every event matching a predicate.
    pub fn process_timed_events<A, M>(
        &mut self,
        settings: &TimedEventDetectionSettings,
        action: A,
        matches: M,
        hint: ObjectProcessingHint,
    ) -> Result<usize>
    where
        A: FnMut(&mut TimedEvent),
        M: FnMut(&TimedEvent) -> bool,
    {
        let settings = ObjectDetectionSettings::default().with_timed_event(settings.clone());
        process_objects(
            self,
            ObjectType::TIMED_EVENT,
            &settings,
            action,
            matches,
            hint,
        )
    }

    /// Run an action on every note matching a predicate.
    pub fn process_notes<A, M>(
        &mut self,
        settings: &NoteDetectionSettings,
        action: A,
        matches: M,
        hint: ObjectProcessingHint,
    ) -> Result<usize>
    where
        A: FnMut(&mut Note),
        M: FnMut(&Note) -> bool,
    {
        let settings = ObjectDetectionSettings::default().with_note(settings.clone());
        process_objects(self, ObjectType::NOTE, &settings, action, matches, hint)
    }

    /// Run an action on every chord matching a predicate.
    ///
    /// ```rust
    /// use midly_objects::{
    ///     num::{u28, u4, u7}, ChordDetectionSettings, ObjectDetectionSettings,
    ///     ObjectProcessingHint, Timed, Track, TrackEvent, TrackEventKind,
    /// };
    ///
    /// let ch = u4::new(0);
    /// let mut track = Track::from(vec![
    ///     TrackEvent::new(u28::new(0), TrackEventKind::note_on(ch, u7::new(60), u7::new(90))),
    ///     TrackEvent::new(u28::new(0), TrackEventKind::note_on(ch, u7::new(64), u7::new(90))),
    ///     TrackEvent::new(u28::new(10), TrackEventKind::note_off(ch, u7::new(60), u7::new(0))),
    ///     TrackEvent::new(u28::new(0), TrackEventKind::note_off(ch, u7::new(64), u7::new(0))),
    /// ]);
    /// let processed = track.process_chords(
    ///     &ObjectDetectionSettings::default(),
    ///     |chord| chord.set_time(100),
    ///     |_| true,
    ///     ObjectProcessingHint::TIME_OR_LENGTH_CAN_BE_CHANGED,
    /// ).unwrap();
    /// assert_eq!(processed, 1);
    /// assert_eq!(track.events()[0].delta, 100);
    /// ```
    pub fn process_chords<A, M>(
        &mut self,
        settings: &ObjectDetectionSettings,
        action: A,
        matches: M,
        hint: ObjectProcessingHint,
    ) -> Result<usize>
    where
        A: FnMut(&mut Chord),
        M: FnMut(&Chord) -> bool,
    {
        process_objects(self, ObjectType::CHORD, settings, action, matches, hint)
    }

    /// Remove every detected object of type `T` that matches a predicate.
    ///
    /// See `remove_objects`.
    pub fn remove_objects<T, M>(
        &mut self,
        object_type: ObjectType,
        settings: &ObjectDetectionSettings,
        matches: M,
    ) -> Result<usize>
    where
        T: TimedObjectKind,
        M: FnMut(&T) -> bool,
    {
        remove_objects(self, object_type, settings, matches)
    }

    /// Remove every event matching a predicate.
    pub fn remove_timed_events<M>(&mut self, matches: M) -> Result<usize>
    where
        M: FnMut(&TimedEvent) -> bool,
    {
        remove_timed_events(self, matches)
    }

    /// Remove every note matching a predicate.
    pub fn remove_notes<M>(&mut self, settings: &NoteDetectionSettings, matches: M) -> Result<usize>
    where
        M: FnMut(&Note) -> bool,
    {
        let settings = ObjectDetectionSettings::default().with_note(settings.clone());
        remove_objects(self, ObjectType::NOTE, &settings, matches)
    }

    /// Remove every chord matching a predicate, along with its notes.
    pub fn remove_chords<M>(&mut self, settings: &ObjectDetectionSettings, matches: M) -> Result<usize>
    where
        M: FnMut(&Chord) -> bool,
    {
        remove_objects(self, ObjectType::CHORD, settings, matches)
    }
}

/// Run an operation on every track in parallel, adding up the counts.
///
/// Tracks are independent: an error in one track does not undo the changes made to others.
#[cfg(feature = "parallel")]
fn for_each_track<F>(tracks: &mut [Track], op: F) -> Result<usize>
where
    F: Fn(&mut Track) -> Result<usize> + Send + Sync,
{
    use rayon::prelude::*;

    let counts = tracks
        .par_iter_mut()
        .map(&op)
        .collect::<Result<Vec<usize>>>()?;
    Ok(counts.into_iter().sum())
}

/// Run an operation on every track, adding up the counts.
#[cfg(not(feature = "parallel"))]
fn for_each_track<F>(tracks: &mut [Track], op: F) -> Result<usize>
where
    F: Fn(&mut Track) -> Result<usize> + Send + Sync,
{
    let mut total = 0;
    for track in tracks {
        total += op(track)?;
    }
    Ok(total)
}

/// Run `process_timed_events` on every track.
pub fn process_timed_events_in_tracks<A, M>(
    tracks: &mut [Track],
    settings: &TimedEventDetectionSettings,
    action: A,
    matches: M,
    hint: ObjectProcessingHint,
) -> Result<usize>
where
    A: Fn(&mut TimedEvent) + Send + Sync,
    M: Fn(&TimedEvent) -> bool + Send + Sync,
{
    for_each_track(tracks, |track| {
        track.process_timed_events(settings, &action, &matches, hint)
    })
}

/// Run `process_notes` on every track.
pub fn process_notes_in_tracks<A, M>(
    tracks: &mut [Track],
    settings: &NoteDetectionSettings,
    action: A,
    matches: M,
    hint: ObjectProcessingHint,
) -> Result<usize>
where
    A: Fn(&mut Note) + Send + Sync,
    M: Fn(&Note) -> bool + Send + Sync,
{
    for_each_track(tracks, |track| {
        track.process_notes(settings, &action, &matches, hint)
    })
}

/// Run `process_chords` on every track.
pub fn process_chords_in_tracks<A, M>(
    tracks: &mut [Track],
    settings: &ObjectDetectionSettings,
    action: A,
    matches: M,
    hint: ObjectProcessingHint,
) -> Result<usize>
where
    A: Fn(&mut Chord) + Send + Sync,
    M: Fn(&Chord) -> bool + Send + Sync,
{
    for_each_track(tracks, |track| {
        track.process_chords(settings, &action, &matches, hint)
    })
}

/// Run `remove_timed_events` on every track.
pub fn remove_timed_events_in_tracks<M>(tracks: &mut [Track], matches: M) -> Result<usize>
where
    M: Fn(&TimedEvent) -> bool + Send + Sync,
{
    for_each_track(tracks, |track| track.remove_timed_events(&matches))
}

/// Run `remove_notes` on every track.
pub fn remove_notes_in_tracks<M>(
    tracks: &mut [Track],
    settings: &NoteDetectionSettings,
    matches: M,
) -> Result<usize>
where
    M: Fn(&Note) -> bool + Send + Sync,
{
    for_each_track(tracks, |track| track.remove_notes(settings, &matches))
}

/// Run `remove_chords` on every track.
pub fn remove_chords_in_tracks<M>(
    tracks: &mut [Track],
    settings: &ObjectDetectionSettings,
    matches: M,
) -> Result<usize>
where
    M: Fn(&Chord) -> bool + Send + Sync,
{
    for_each_track(tracks, |track| track.remove_chords(settings, &matches))
}
