//! # Overview
//!
//! `midly-objects` reconstructs musical objects out of the flat, delta-timed event lists of MIDI
//! tracks, lets them be edited, and writes them back as a consistent event list.
//!
//! Detection pairs note-on and note-off events into [`Note`](struct.Note.html)s, groups notes
//! starting at about the same time into [`Chord`](struct.Chord.html)s and finds the
//! [`Rest`](struct.Rest.html)s between them:
//!
//! ```rust
//! use midly_objects::{
//!     num::{u28, u4, u7}, ObjectDetectionSettings, ObjectType, Track, TrackEvent,
//!     TrackEventKind,
//! };
//!
//! let ch = u4::new(0);
//! let track = Track::from(vec![
//!     TrackEvent::new(u28::new(0), TrackEventKind::note_on(ch, u7::new(60), u7::new(100))),
//!     TrackEvent::new(u28::new(5), TrackEventKind::note_on(ch, u7::new(64), u7::new(100))),
//!     TrackEvent::new(u28::new(45), TrackEventKind::note_off(ch, u7::new(60), u7::new(0))),
//!     TrackEvent::new(u28::new(0), TrackEventKind::note_off(ch, u7::new(64), u7::new(0))),
//! ]);
//!
//! let mut settings = ObjectDetectionSettings::default();
//! settings.chord.notes_tolerance = 10;
//! let objects = track.get_objects(ObjectType::CHORD, &settings).unwrap();
//! assert_eq!(objects.len(), 1);
//! assert_eq!(objects[0].as_chord().unwrap().len(), 2);
//! ```
//!
//! # Editing tracks
//!
//! Objects can be edited in three ways:
//!
//! - Through a [`TimedObjectsManager`](struct.TimedObjectsManager.html), which detects objects
//!   once, hands out a mutable collection of them and regenerates the track when it is finished
//!   or dropped.
//! - Through the batch utilities, such as `Track::process_notes` or `Track::remove_chords`,
//!   which run a closure on every matching object.
//!   A [`ObjectProcessingHint`](struct.ObjectProcessingHint.html) tells them what the closure may
//!   change, so that tracks are only regenerated when something actually moved.
//! - Through a [`TimedObjectsWriter`](struct.TimedObjectsWriter.html), which writes objects out as
//!   they come without collecting them first.
//!
//! In every case, events that were not edited keep their relative order, and a track that was
//! not edited at all comes back identical.
//!
//! # About features
//!
//! - The `parallel` feature
//!
//!   Multi-track operations such as `process_notes_in_tracks` work on each track in parallel,
//!   through the `rayon` dependency.
//!   This feature is enabled by default.
//!
//! - The `serde` feature
//!
//!   Derives `Serialize` and `Deserialize` for detection settings, policies and flags.
//!   Custom constructors are skipped.
//!
//! # Logging
//!
//! The crate reports what it does through `tracing`.
//! It never installs a subscriber.

macro_rules! bail {
    ($err:expr) => {{
        return Err($err.into());
    }};
}
macro_rules! ensure {
    ($cond:expr, $err:expr) => {{
        if !$cond {
            bail!($err)
        }
    }};
}

/// All of the errors this crate produces.
#[macro_use]
mod error;

mod prelude {
    pub(crate) use crate::{
        error::{ErrorKind, Result, ResultExt},
        primitive::{u14, u24, u28, u4, u7},
    };
    pub(crate) use core::{cmp::Ordering, fmt, mem};
    pub(crate) use std::sync::Arc;
}

mod chord;
mod collection;
mod event;
mod manager;
mod note;
mod objects;
mod primitive;
mod process;
mod rest;
mod timed;
mod timed_event;
mod track;
mod writer;

pub use crate::{
    chord::{
        group_notes_into_chords, Chord, ChordChange, ChordConstructor, ChordData,
        ChordDetectionSettings,
    },
    collection::{
        ChangedObject, CollectionChange, Comparer, ObjectId, ObservableChange,
        ObservableTimedObjectsCollection, TimedObjectsCollection,
    },
    error::{Error, ErrorKind, Result},
    event::{MetaMessage, MidiMessage, NoteEvent, PitchBend, TrackEvent, TrackEventKind},
    manager::TimedObjectsManager,
    note::{
        get_notes, notes_and_timed_events, Note, NoteConstructor, NoteData,
        NoteDetectionSettings, NoteSearchContext, NoteStartDetectionPolicy,
    },
    objects::{get_objects, get_objects_from_tracks, ObjectDetectionSettings},
    process::{
        process_chords_in_tracks, process_notes_in_tracks, process_objects,
        process_timed_events_in_tracks, remove_chords_in_tracks, remove_notes_in_tracks,
        remove_objects, remove_timed_events, remove_timed_events_in_tracks, ObjectProcessingHint,
    },
    rest::{Rest, RestDetectionSettings, RestSeparationPolicy},
    timed::{compare_by_time, Lengthed, ObjectType, Timed, TimedObject, TimedObjectKind},
    timed_event::{
        get_timed_events, EventSource, TimedEvent, TimedEventConstructor, TimedEventData,
        TimedEventDetectionSettings,
    },
    track::{TimedEvents, Track},
    writer::{EventSink, TimedObjectsWriter},
};

/// Exotically-sized integers used by the MIDI standard.
pub mod num {
    pub use crate::primitive::{u14, u24, u28, u4, u7};
}
