//! The object detection pipeline.

use crate::{
    chord::{group_chords, Chord, ChordDetectionSettings, Grouped},
    note::{Detected, Note, NoteDetectionSettings, NotesBuilder},
    prelude::*,
    rest::{Rest, RestDetectionSettings, RestsBuilder},
    timed::{ObjectType, Timed, TimedObject},
    timed_event::{get_timed_events, TimedEvent, TimedEventDetectionSettings},
    track::{merge_tracks, Track},
};

/// All of the settings of the detection pipeline.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ObjectDetectionSettings {
    pub timed_event: TimedEventDetectionSettings,
    pub note: NoteDetectionSettings,
    pub chord: ChordDetectionSettings,
    pub rest: RestDetectionSettings,
}
impl ObjectDetectionSettings {
    pub fn with_timed_event(mut self, settings: TimedEventDetectionSettings) -> Self {
        self.timed_event = settings;
        self
    }

    pub fn with_note(mut self, settings: NoteDetectionSettings) -> Self {
        self.note = settings;
        self
    }

    pub fn with_chord(mut self, settings: ChordDetectionSettings) -> Self {
        self.chord = settings;
        self
    }

    pub fn with_rest(mut self, settings: RestDetectionSettings) -> Self {
        self.rest = settings;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.chord.validate()
    }
}

/// The outcome of a detection pass.
#[derive(Debug, Default)]
pub(crate) struct Detection {
    /// Objects of the requested types, ordered by time.
    pub(crate) objects: Vec<TimedObject>,
    /// Every input event that is not part of `objects`, in input order.
    pub(crate) background: Vec<TimedEvent>,
}

/// Run detection over a time-ordered sequence of events.
///
/// Chords are detected first, then notes among the leftovers, then timed events among what is
/// still unclaimed.
/// Objects of a type that was not requested degrade to the next requested granularity, or to
/// the background.
pub(crate) fn detect<I>(
    events: I,
    object_type: ObjectType,
    settings: &ObjectDetectionSettings,
) -> Result<Detection>
where
    I: IntoIterator<Item = TimedEvent>,
{
    settings.validate()?;
    let mut background = Vec::new();
    let mut sequenced = Vec::new();
    for (seq, ev) in events.into_iter().enumerate() {
        match settings.timed_event.construct(ev) {
            Ok(ev) => sequenced.push((seq, ev)),
            Err(declined) => background.push(declined),
        }
    }

    let mut placed: Vec<(usize, TimedObject)> = Vec::with_capacity(sequenced.len());
    let mut place_event = |placed: &mut Vec<(usize, TimedObject)>, seq: usize, ev: TimedEvent| {
        if object_type.contains(ObjectType::TIMED_EVENT) {
            placed.push((seq, TimedObject::TimedEvent(ev)));
        } else {
            background.push(ev);
        }
    };
    let wants_rests = object_type.contains(ObjectType::REST);
    let mut sounding: Vec<Note> = Vec::new();

    if object_type.intersects(ObjectType::NOTE | ObjectType::CHORD | ObjectType::REST) {
        let detected: Vec<Detected> =
            NotesBuilder::new(sequenced.into_iter(), &settings.note).collect();
        let grouped: Vec<Grouped> = if object_type.contains(ObjectType::CHORD) {
            group_chords(detected, &settings.chord, settings.note.search_context)
        } else {
            detected.into_iter().map(Grouped::Single).collect()
        };
        for item in grouped {
            match item {
                Grouped::Chord { chord, seq } => {
                    if wants_rests {
                        sounding.extend(chord.notes().iter().cloned());
                    }
                    placed.push((seq, TimedObject::Chord(chord)));
                }
                Grouped::Single(Detected::Note {
                    note,
                    on_seq,
                    off_seq,
                }) => {
                    if wants_rests {
                        sounding.push(note.clone());
                    }
                    if object_type.contains(ObjectType::NOTE) {
                        placed.push((on_seq, TimedObject::Note(note)));
                    } else {
                        let [on, off] = note.timed_events();
                        place_event(&mut placed, on_seq, on);
                        place_event(&mut placed, off_seq, off);
                    }
                }
                Grouped::Single(Detected::Event { event, seq }) => {
                    place_event(&mut placed, seq, event)
                }
            }
        }
    } else {
        for (seq, ev) in sequenced {
            place_event(&mut placed, seq, ev);
        }
    }

    placed.sort_by(|(a_seq, a), (b_seq, b)| a.time().cmp(&b.time()).then(a_seq.cmp(b_seq)));
    let mut objects: Vec<TimedObject> = placed.into_iter().map(|(_seq, obj)| obj).collect();
    //Notes of different chords and channels may start out of order
    sounding.sort_by_key(|note| note.time());
    let mut rests = RestsBuilder::new(settings.rest);
    let found_rests: Vec<Rest> = sounding.iter().filter_map(|note| rests.feed(note)).collect();
    for rest in found_rests {
        let at = objects.partition_point(|obj| obj.time() <= rest.time());
        objects.insert(at, TimedObject::Rest(rest));
    }
    tracing::debug!(
        objects = objects.len(),
        background = background.len(),
        "detected objects"
    );
    Ok(Detection {
        objects,
        background,
    })
}

/// Detect objects of the requested types in a time-ordered sequence of events.
///
/// Objects are ordered by time, and objects at the same time keep the order of their first
/// event in the input.
///
/// ```rust
/// use midly_objects::{
///     get_objects, num::{u4, u7}, Lengthed, ObjectDetectionSettings, ObjectType, TimedEvent,
///     TrackEventKind,
/// };
///
/// let events = vec![
///     TimedEvent::new(0, TrackEventKind::note_on(u4::new(0), u7::new(60), u7::new(100))),
///     TimedEvent::new(50, TrackEventKind::note_off(u4::new(0), u7::new(60), u7::new(0))),
/// ];
/// let objects = get_objects(events, ObjectType::NOTE, &ObjectDetectionSettings::default())
///     .unwrap();
/// let note = objects[0].as_note().unwrap();
/// assert_eq!(note.length(), 50);
/// ```
pub fn get_objects<I>(
    events: I,
    object_type: ObjectType,
    settings: &ObjectDetectionSettings,
) -> Result<Vec<TimedObject>>
where
    I: IntoIterator<Item = TimedEvent>,
{
    Ok(detect(events, object_type, settings)?.objects)
}

/// Detect objects in several tracks at once, as if they were a single track.
///
/// Whether a note can start in one track and end in another is controlled by
/// `NoteDetectionSettings::search_context`.
/// Simultaneous events are ordered by track.
pub fn get_objects_from_tracks(
    tracks: &[Track],
    object_type: ObjectType,
    settings: &ObjectDetectionSettings,
) -> Result<Vec<TimedObject>> {
    get_objects(merge_tracks(tracks), object_type, settings)
}

impl Track {
    /// Detect objects of the requested types in this track.
    pub fn get_objects(
        &self,
        object_type: ObjectType,
        settings: &ObjectDetectionSettings,
    ) -> Result<Vec<TimedObject>> {
        get_objects(self.timed_events(), object_type, settings)
    }

    /// The events of this track along with their absolute time, as seen by the constructor of
    /// `settings`.
    pub fn get_timed_events(&self, settings: &TimedEventDetectionSettings) -> Vec<TimedEvent> {
        get_timed_events(self.timed_events(), settings)
    }

    /// Detect the notes of this track.
    pub fn get_notes(&self, settings: &NoteDetectionSettings) -> Vec<Note> {
        crate::note::get_notes(self.timed_events(), settings)
    }

    /// Detect the chords of this track.
    ///
    /// Notes that do not belong to any chord are skipped.
    pub fn get_chords(&self, settings: &ObjectDetectionSettings) -> Result<Vec<Chord>> {
        Ok(self
            .get_objects(ObjectType::CHORD, settings)?
            .into_iter()
            .filter_map(|obj| match obj {
                TimedObject::Chord(chord) => Some(chord),
                _ => None,
            })
            .collect())
    }
}
