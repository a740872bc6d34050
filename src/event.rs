//! The event model that objects are built from.
//!
//! Events are treated as opaque records: detection only ever looks at whether an event starts
//! or stops a note, and on which channel and key.
//! Everything else travels through untouched.

use crate::prelude::*;

/// Represents a track event.
///
/// Consists of a delta time (in MIDI ticks relative to the previous event) and the actual track
/// event.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct TrackEvent {
    /// How many MIDI ticks after the previous event should this event fire.
    pub delta: u28,
    /// The type of event along with event-specific data.
    pub kind: TrackEventKind,
}
impl TrackEvent {
    /// Create a new event firing `delta` ticks after the previous one.
    #[inline]
    pub fn new(delta: u28, kind: TrackEventKind) -> TrackEvent {
        TrackEvent { delta, kind }
    }
}

/// Represents the different kinds of track events and their associated data.
///
/// It notably does *not* include the timing of the event; the `TrackEvent` struct (or a
/// `TimedEvent`) is responsible for this.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub enum TrackEventKind {
    /// A message associated to a MIDI channel carrying musical data.
    ///
    /// Usually, the bulk of MIDI data is these kind of messages.
    Midi {
        /// The MIDI channel that this event is associated with.
        channel: u4,
        /// The MIDI message type and associated data.
        message: MidiMessage,
    },
    /// A System Exclusive message, carrying arbitrary data.
    ///
    /// The data bytes included here do not include the implicit `0xF0` prefix.
    SysEx(Vec<u8>),
    /// An escape sequence, intended to send arbitrary data to the MIDI synthesizer.
    Escape(Vec<u8>),
    /// A meta-message, giving extra information for correct playback, like tempo, song name,
    /// lyrics, etc...
    Meta(MetaMessage),
}
impl TrackEventKind {
    /// Shorthand for a channel message starting a note.
    #[inline]
    pub fn note_on(channel: u4, key: u7, vel: u7) -> TrackEventKind {
        TrackEventKind::Midi {
            channel,
            message: MidiMessage::NoteOn { key, vel },
        }
    }

    /// Shorthand for a channel message stopping a note.
    #[inline]
    pub fn note_off(channel: u4, key: u7, vel: u7) -> TrackEventKind {
        TrackEventKind::Midi {
            channel,
            message: MidiMessage::NoteOff { key, vel },
        }
    }

    /// The channel of a channel message, `None` for any other event.
    #[inline]
    pub fn channel(&self) -> Option<u4> {
        match self {
            TrackEventKind::Midi { channel, .. } => Some(*channel),
            _ => None,
        }
    }

    /// Classify this event as the start or the end of a note.
    ///
    /// By convention a `NoteOn` message with a velocity of 0 stops a note.
    pub fn as_note_event(&self) -> Option<NoteEvent> {
        match self {
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn { key, vel },
            } if vel.as_int() > 0 => Some(NoteEvent::On {
                channel: *channel,
                key: *key,
                vel: *vel,
            }),
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn { key, vel },
            }
            | TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff { key, vel },
            } => Some(NoteEvent::Off {
                channel: *channel,
                key: *key,
                vel: *vel,
            }),
            _ => None,
        }
    }

    /// Whether this is the meta event closing a track.
    #[inline]
    pub fn is_end_of_track(&self) -> bool {
        matches!(self, TrackEventKind::Meta(MetaMessage::EndOfTrack))
    }
}

/// The note-related view of an event, as seen by note detection.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum NoteEvent {
    /// A note starts.
    On {
        /// The channel the note plays on.
        channel: u4,
        /// The key being pressed.
        key: u7,
        /// Always greater than zero.
        vel: u7,
    },
    /// A note stops.
    Off {
        /// The channel the note plays on.
        channel: u4,
        /// The key being released.
        key: u7,
        /// Zero for `NoteOn` messages with a velocity of zero.
        vel: u7,
    },
}
impl NoteEvent {
    /// The channel of the note, whether starting or stopping.
    #[inline]
    pub fn channel(&self) -> u4 {
        match *self {
            NoteEvent::On { channel, .. } | NoteEvent::Off { channel, .. } => channel,
        }
    }

    /// The key of the note, whether starting or stopping.
    #[inline]
    pub fn key(&self) -> u7 {
        match *self {
            NoteEvent::On { key, .. } | NoteEvent::Off { key, .. } => key,
        }
    }
}

/// Represents a MIDI message, usually associated to a MIDI channel.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum MidiMessage {
    /// Stop playing a note.
    NoteOff {
        /// The MIDI key to stop playing.
        key: u7,
        /// The velocity with which to stop playing it.
        vel: u7,
    },
    /// Start playing a note.
    NoteOn {
        /// The key to start playing.
        key: u7,
        /// The velocity (strength) with which to press it.
        ///
        /// Note that by convention a `NoteOn` message with a velocity of 0 is equivalent to a
        /// `NoteOff`.
        vel: u7,
    },
    /// Modify the velocity of a note after it has been played.
    Aftertouch {
        /// The key for which to modify its velocity.
        key: u7,
        /// The new velocity for the key.
        vel: u7,
    },
    /// Modify the value of a MIDI controller.
    Controller {
        /// The controller to modify.
        controller: u7,
        /// The value to set it to.
        value: u7,
    },
    /// Change the program (also known as instrument) for a channel.
    ProgramChange {
        /// The new program (instrument) to use for the channel.
        program: u7,
    },
    /// Change the note velocity of a whole channel at once, without starting new notes.
    ChannelAftertouch {
        /// The new velocity for all notes currently playing in the channel.
        vel: u7,
    },
    /// Set the pitch bend value for the entire channel.
    PitchBend {
        /// The new pitch-bend value.
        bend: PitchBend,
    },
}

/// The value of a pitch bend, represented as 14 bits.
///
/// A value of `0x0000` indicates full bend downwards.
/// A value of `0x2000` indicates no bend.
/// A value of `0x3FFF` indicates full bend upwards.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct PitchBend(pub u14);
impl PitchBend {
    /// The middle value of `0x2000`, indicating no bend.
    #[inline]
    pub const fn mid_raw_value() -> PitchBend {
        PitchBend(u14::new(0x2000))
    }

    /// Create a `PitchBend` value from an int in the range `[-0x2000, 0x1FFF]`.
    ///
    /// Integers outside this range will be clamped.
    #[inline]
    pub fn from_int(int: i16) -> PitchBend {
        PitchBend(u14::new((int.max(-0x2000).min(0x1FFF) + 0x2000) as u16))
    }

    /// Returns an int in the range `[-0x2000, 0x1FFF]`.
    #[inline]
    pub fn as_int(self) -> i16 {
        self.0.as_int() as i16 - 0x2000
    }
}

/// A "meta message", as defined by the SMF spec.
/// These events carry metadata about the track, such as tempo, time signature, copyright, etc...
///
/// Meta messages never take part in any detected object, so managers always keep them in the
/// background.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub enum MetaMessage {
    /// For sequential MIDI files, `TrackNumber` can be empty, and defaults to the track index.
    TrackNumber(Option<u16>),
    /// Arbitrary text associated to an instant.
    Text(Vec<u8>),
    /// A copyright notice.
    Copyright(Vec<u8>),
    /// Information about the name of the track.
    TrackName(Vec<u8>),
    /// Information about the name of the current instrument.
    InstrumentName(Vec<u8>),
    /// Arbitrary lyric information associated to an instant.
    Lyric(Vec<u8>),
    /// Arbitrary marker text associated to an instant.
    Marker(Vec<u8>),
    /// Arbitrary cue point text associated to an instant.
    CuePoint(Vec<u8>),
    /// Number of the MIDI channel that this track was intended to be played with.
    MidiChannel(u4),
    /// Number of the MIDI port that this track was intended to be played with.
    MidiPort(u7),
    /// Obligatory at track end.
    ///
    /// When a track is regenerated, this event is always kept last.
    EndOfTrack,
    /// Amount of microseconds per beat (quarter note).
    Tempo(u24),
    /// In order of the MIDI specification, numerator, denominator, MIDI clocks per click, 32nd
    /// notes per quarter
    TimeSignature(u8, u8, u8, u8),
    /// As in the MIDI specification, negative numbers indicate number of flats and positive
    /// numbers indicate number of sharps.
    /// `false` indicates a major scale, `true` indicates a minor scale.
    KeySignature(i8, bool),
    /// Arbitrary data intended for the sequencer.
    SequencerSpecific(Vec<u8>),
    /// An unknown meta-message.
    ///
    /// The `u8` is the raw meta-message identifier byte.
    Unknown(u8, Vec<u8>),
}
