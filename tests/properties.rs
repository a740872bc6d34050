use midly_objects::{
    num::{u4, u7},
    get_notes, ChordDetectionSettings, Lengthed, MetaMessage, MidiMessage, NoteDetectionSettings,
    ObjectDetectionSettings, ObjectType, Timed, TimedEvent, TimedObject, Track, TrackEventKind,
};
use proptest::prelude::*;

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn on(key: u8, vel: u8) -> TrackEventKind {
    TrackEventKind::note_on(u4::new(0), u7::new(key), u7::new(vel))
}

fn off(key: u8) -> TrackEventKind {
    TrackEventKind::note_off(u4::new(0), u7::new(key), u7::new(0))
}

fn cc(value: u8) -> TrackEventKind {
    TrackEventKind::Midi {
        channel: u4::new(0),
        message: MidiMessage::Controller {
            controller: u7::new(7),
            value: u7::new(value),
        },
    }
}

/// Any event that can appear in the middle of a track.
fn any_kind() -> impl Strategy<Value = TrackEventKind> {
    prop_oneof![
        (0u8..3, 58u8..64, 0u8..128).prop_map(|(channel, key, vel)| {
            TrackEventKind::note_on(u4::new(channel), u7::new(key), u7::new(vel))
        }),
        (0u8..3, 58u8..64, 0u8..128).prop_map(|(channel, key, vel)| {
            TrackEventKind::note_off(u4::new(channel), u7::new(key), u7::new(vel))
        }),
        (0u8..128).prop_map(cc),
        "[a-z]{0,4}".prop_map(|text| TrackEventKind::Meta(MetaMessage::Text(text.into_bytes()))),
    ]
}

fn any_track() -> impl Strategy<Value = Track> {
    prop::collection::vec((0u64..20, any_kind()), 0..60).prop_map(|events| {
        let mut time = 0;
        let events: Vec<TimedEvent> = events
            .into_iter()
            .map(|(delta, kind)| {
                time += delta;
                TimedEvent::new(time, kind)
            })
            .collect();
        Track::from_timed_events(events).unwrap()
    })
}

proptest! {
    #[test]
    fn sequential_notes_are_recovered(
        notes in prop::collection::vec((0u8..128, 0u64..50, 1u64..50), 1..20),
        controls in prop::collection::vec((0u64..2000, 0u8..128), 0..20),
    ) {
        let mut events = Vec::new();
        let mut expected = Vec::new();
        let mut time = 0;
        for &(key, gap, length) in &notes {
            time += gap;
            events.push(TimedEvent::new(time, on(key, 100)));
            events.push(TimedEvent::new(time + length, off(key)));
            expected.push((key, time, length));
            time += length;
        }
        for &(at, value) in &controls {
            events.push(TimedEvent::new(at, cc(value)));
        }
        let track = Track::from_timed_events(events).unwrap();
        let found: Vec<(u8, u64, u64)> = track
            .get_notes(&NoteDetectionSettings::default())
            .iter()
            .map(|note| (note.key().as_int(), note.time(), note.length()))
            .collect();
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn two_notes_form_a_chord_within_tolerance(distance in 0u64..100, tolerance in 0u64..100) {
        let track = Track::from_timed_events(vec![
            TimedEvent::new(0, on(60, 100)),
            TimedEvent::new(distance, on(64, 100)),
            TimedEvent::new(200, off(60)),
            TimedEvent::new(200, off(64)),
        ])
        .unwrap();
        let settings = ObjectDetectionSettings::default().with_chord(
            ChordDetectionSettings::default()
                .with_notes_tolerance(tolerance)
                .with_notes_min_count(2),
        );
        let objects = track
            .get_objects(ObjectType::CHORD | ObjectType::NOTE, &settings)
            .unwrap();
        let chords = objects.iter().filter(|obj| obj.as_chord().is_some()).count();
        prop_assert_eq!(chords == 1, distance <= tolerance);
        prop_assert_eq!(objects.len(), if distance <= tolerance { 1 } else { 2 });
    }

    #[test]
    fn chords_conserve_notes(
        track in any_track(),
        tolerance in 0u64..30,
        min_count in 1usize..4,
    ) {
        let settings = ObjectDetectionSettings::default().with_chord(
            ChordDetectionSettings::default()
                .with_notes_tolerance(tolerance)
                .with_notes_min_count(min_count),
        );
        let objects = track
            .get_objects(ObjectType::CHORD | ObjectType::NOTE, &settings)
            .unwrap();
        let mut total = 0;
        for obj in &objects {
            match obj {
                TimedObject::Chord(chord) => {
                    prop_assert!(chord.len() >= min_count);
                    let first = chord.notes().iter().map(Timed::time).min().unwrap();
                    let last = chord.notes().iter().map(Timed::time).max().unwrap();
                    prop_assert!(last - first <= tolerance);
                    total += chord.len();
                }
                TimedObject::Note(_) => total += 1,
                other => prop_assert!(false, "unexpected object {:?}", other),
            }
        }
        prop_assert_eq!(total, get_notes(track.timed_events(), &settings.note).len());
        let times: Vec<u64> = objects.iter().map(Timed::time).collect();
        let mut sorted = times.clone();
        sorted.sort();
        prop_assert_eq!(times, sorted);
    }

    #[test]
    fn untouched_managers_round_trip(track in any_track()) {
        init_logging();
        let mut edited = track.clone();
        drop(edited.manage_notes(&NoteDetectionSettings::default()).unwrap());
        prop_assert_eq!(&edited, &track);
        drop(edited.manage_chords(&ObjectDetectionSettings::default()).unwrap());
        prop_assert_eq!(&edited, &track);
        edited
            .manage_objects(
                ObjectType::CHORD | ObjectType::NOTE | ObjectType::TIMED_EVENT,
                &ObjectDetectionSettings::default(),
            )
            .unwrap()
            .finish()
            .unwrap();
        prop_assert_eq!(&edited, &track);
    }

    #[test]
    fn removal_keeps_other_events_in_place(track in any_track()) {
        let settings = NoteDetectionSettings::default();
        let mut edited = track.clone();
        let doomed = edited.get_notes(&settings).iter().filter(|note| note.key() == u7::new(60)).count();
        prop_assert_eq!(edited.remove_notes(&settings, |note| note.key() == u7::new(60)).unwrap(), doomed);
        prop_assert_eq!(edited.remove_notes(&settings, |note| note.key() == u7::new(60)).unwrap(), 0);

        let others = |track: &Track| -> Vec<(u64, TrackEventKind)> {
            track
                .timed_events()
                .filter(|ev| ev.kind().channel().is_none() || matches!(
                    ev.kind(),
                    TrackEventKind::Midi { message: MidiMessage::Controller { .. }, .. }
                ))
                .map(|ev| (ev.time(), ev.into_kind()))
                .collect()
        };
        prop_assert_eq!(others(&edited), others(&track));
        prop_assert_eq!(track.len() - edited.len(), 2 * doomed);
    }

    #[test]
    fn processing_without_changes_keeps_the_track(track in any_track()) {
        let mut edited = track.clone();
        let notes = track.get_notes(&NoteDetectionSettings::default()).len();
        let processed = edited
            .process_notes(
                &NoteDetectionSettings::default(),
                |note| note.set_time(note.time()),
                |_| true,
                midly_objects::ObjectProcessingHint::default(),
            )
            .unwrap();
        prop_assert_eq!(processed, notes);
        prop_assert_eq!(&edited, &track);
    }
}

#[test]
fn streamed_objects_match_detected_track() {
    init_logging();
    let track = Track::from_timed_events(vec![
        TimedEvent::new(0, on(60, 90)),
        TimedEvent::new(0, on(64, 90)),
        TimedEvent::new(5, cc(3)),
        TimedEvent::new(40, off(60)),
        TimedEvent::new(40, off(64)),
        TimedEvent::new(40, on(67, 80)),
        TimedEvent::new(80, TrackEventKind::note_on(u4::new(0), u7::new(67), u7::new(0))),
        TimedEvent::new(90, TrackEventKind::Meta(MetaMessage::EndOfTrack)),
    ])
    .unwrap();
    let settings = ObjectDetectionSettings::default()
        .with_chord(ChordDetectionSettings::default().with_notes_min_count(2));
    let objects = track
        .get_objects(
            ObjectType::CHORD | ObjectType::NOTE | ObjectType::TIMED_EVENT,
            &settings,
        )
        .unwrap();
    assert_eq!(objects.len(), 4);
    assert_eq!(objects[2].as_note().map(|note| note.end_time()), Some(80));
    assert_eq!(Track::from_objects(objects).unwrap(), track);
}
