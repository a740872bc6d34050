//! Editing detected objects and writing them back.

use crate::{
    chord::Chord,
    collection::{Comparer, TimedObjectsCollection},
    note::{Note, NoteDetectionSettings},
    objects::{detect, ObjectDetectionSettings},
    prelude::*,
    timed::{compare_by_time, ObjectType, Timed, TimedObject, TimedObjectKind},
    timed_event::{TimedEvent, TimedEventDetectionSettings},
    track::{encode_ranked, Track},
};

/// Edits the objects of a track and writes them back when dropped.
///
/// On creation the track is split into the detected objects, which can be edited freely through
/// `objects_mut`, and the background: every event that is not part of an object.
/// Saving regenerates the whole track out of the background and the current state of the
/// objects, recomputing every delta time.
/// Simultaneous objects start in the order of the manager's comparer, and events that were not
/// edited otherwise keep their relative order.
///
/// Changes are saved exactly once, either through `finish`, which reports errors, or when the
/// manager is dropped, which can only log them.
/// Dropping includes unwinding from a panic inside the editing scope.
///
/// ```rust
/// use midly_objects::{
///     num::{u28, u4, u7}, NoteDetectionSettings, Timed, Track, TrackEvent, TrackEventKind,
/// };
///
/// let mut track = Track::from(vec![
///     TrackEvent::new(u28::new(0), TrackEventKind::note_on(u4::new(0), u7::new(60), u7::new(90))),
///     TrackEvent::new(u28::new(10), TrackEventKind::note_off(u4::new(0), u7::new(60), u7::new(0))),
/// ]);
/// {
///     let mut notes = track.manage_notes(&NoteDetectionSettings::default()).unwrap();
///     for note in notes.objects_mut().iter_mut() {
///         note.set_time(5);
///     }
/// }
/// assert_eq!(track.events()[0].delta, 5);
/// ```
pub struct TimedObjectsManager<'t, T: TimedObjectKind> {
    track: &'t mut Track,
    objects: TimedObjectsCollection<T>,
    background: Vec<TimedEvent>,
    finished: bool,
}
impl<'t, T: TimedObjectKind> TimedObjectsManager<'t, T> {
    /// Manage the objects of type `T` in a track, ordered by time.
    pub fn new(track: &'t mut Track, settings: &ObjectDetectionSettings) -> Result<Self> {
        Self::with_comparer(track, T::OBJECT_TYPE, settings, compare_by_time::<T>)
    }

    /// Manage the objects of a track, detecting the given object types and ordering them with a
    /// custom comparer.
    ///
    /// Detected objects that are not of type `T` become part of the background.
    /// Rests cannot be managed, since they own no events.
    pub fn with_comparer(
        track: &'t mut Track,
        object_type: ObjectType,
        settings: &ObjectDetectionSettings,
        comparer: Comparer<T>,
    ) -> Result<Self> {
        object_type.ensure_editable()?;
        let detection = detect(track.timed_events(), object_type, settings)?;
        let mut background = detection.background;
        let mut objects = TimedObjectsCollection::with_comparer(comparer);
        let mut managed = Vec::with_capacity(detection.objects.len());
        for obj in detection.objects {
            match T::from_object(obj) {
                Ok(obj) => managed.push(obj),
                Err(other) => other.into_events(&mut background),
            }
        }
        objects.add_range(managed);
        tracing::debug!(
            objects = objects.len(),
            background = background.len(),
            "managing objects"
        );
        Ok(TimedObjectsManager {
            track,
            objects,
            background,
            finished: false,
        })
    }

    /// The managed objects.
    #[inline]
    pub fn objects(&self) -> &TimedObjectsCollection<T> {
        &self.objects
    }

    /// Mutable access to the managed objects, to edit, add or remove them.
    #[inline]
    pub fn objects_mut(&mut self) -> &mut TimedObjectsCollection<T> {
        &mut self.objects
    }

    /// The events of the track that are not part of any managed object.
    #[inline]
    pub fn background(&self) -> &[TimedEvent] {
        &self.background
    }

    /// Write the current state of the objects back into the track.
    ///
    /// The manager stays usable, and is saved again when dropped.
    /// If saving fails the track is left untouched.
    pub fn save_changes(&mut self) -> Result<()> {
        let mut changes = 0;
        for obj in self.objects.iter_mut() {
            changes += obj.take_changes().len();
        }
        let mut events: Vec<(TimedEvent, Option<usize>)> =
            self.background.iter().map(|ev| (ev.clone(), None)).collect();
        //Objects the comparer tells apart start in comparer order
        let comparer = self.objects.comparer();
        let mut rank = 0;
        let mut prev: Option<&T> = None;
        let mut own = Vec::new();
        for obj in self.objects.iter() {
            if prev.map_or(false, |prev| comparer(prev, obj) != Ordering::Equal) {
                rank += 1;
            }
            prev = Some(obj);
            let start = obj.time();
            obj.collect_events(&mut own);
            events.extend(own.drain(..).map(|ev| {
                let ranked = if ev.time() == start { Some(rank) } else { None };
                (ev, ranked)
            }));
        }
        let encoded =
            encode_ranked(events).context(err_state!("could not save managed objects"))?;
        tracing::debug!(
            events = encoded.len(),
            objects = self.objects.len(),
            chord_changes = changes,
            "saved managed objects"
        );
        self.track.replace(encoded);
        Ok(())
    }

    /// Save the changes and release the track.
    pub fn finish(mut self) -> Result<()> {
        self.finished = true;
        self.save_changes()
    }
}
impl<T: TimedObjectKind> Drop for TimedObjectsManager<'_, T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Err(err) = self.save_changes() {
            tracing::error!(error = %err, "failed to save managed objects on drop");
        }
    }
}
impl<T: TimedObjectKind + fmt::Debug> fmt::Debug for TimedObjectsManager<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TimedObjectsManager")
            .field("objects", &self.objects)
            .field("background", &self.background)
            .finish()
    }
}

impl Track {
    /// Edit the events of this track one by one.
    pub fn manage_timed_events(
        &mut self,
        settings: &TimedEventDetectionSettings,
    ) -> Result<TimedObjectsManager<TimedEvent>> {
        let settings = ObjectDetectionSettings::default().with_timed_event(settings.clone());
        TimedObjectsManager::new(self, &settings)
    }

    /// Edit the notes of this track.
    pub fn manage_notes(
        &mut self,
        settings: &NoteDetectionSettings,
    ) -> Result<TimedObjectsManager<Note>> {
        let settings = ObjectDetectionSettings::default().with_note(settings.clone());
        TimedObjectsManager::new(self, &settings)
    }

    /// Edit the chords of this track.
    ///
    /// Notes that are not part of any chord stay in the background.
    pub fn manage_chords(
        &mut self,
        settings: &ObjectDetectionSettings,
    ) -> Result<TimedObjectsManager<Chord>> {
        TimedObjectsManager::new(self, settings)
    }

    /// Edit objects of several types at once.
    pub fn manage_objects(
        &mut self,
        object_type: ObjectType,
        settings: &ObjectDetectionSettings,
    ) -> Result<TimedObjectsManager<TimedObject>> {
        TimedObjectsManager::with_comparer(
            self,
            object_type,
            settings,
            compare_by_time::<TimedObject>,
        )
    }
}
