//! Rests: the silence between notes.

use crate::{
    note::Note,
    prelude::*,
    timed::{Lengthed, Timed},
};

/// A span of time in which no note plays.
///
/// Depending on the `RestSeparationPolicy` a rest may only concern one channel, one key, or
/// both.
/// Rests are derived from notes and own no events.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct Rest {
    time: u64,
    length: u64,
    channel: Option<u4>,
    key: Option<u7>,
}
impl Rest {
    pub fn new(time: u64, length: u64, channel: Option<u4>, key: Option<u7>) -> Rest {
        Rest {
            time,
            length,
            channel,
            key,
        }
    }

    /// The channel that is silent, if rests are separated by channel.
    #[inline]
    pub fn channel(&self) -> Option<u4> {
        self.channel
    }

    /// The key that is silent, if rests are separated by key.
    #[inline]
    pub fn key(&self) -> Option<u7> {
        self.key
    }
}
impl Timed for Rest {
    #[inline]
    fn time(&self) -> u64 {
        self.time
    }

    #[inline]
    fn set_time(&mut self, time: u64) {
        self.time = time;
    }
}
impl Lengthed for Rest {
    #[inline]
    fn length(&self) -> u64 {
        self.length
    }
}

/// Which notes silence each other when detecting rests.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RestSeparationPolicy {
    /// A rest is a span in which no note at all plays.
    NoSeparation,
    /// Rests are detected on each channel separately.
    SeparateByChannel,
    /// Rests are detected on each key separately.
    SeparateByNoteNumber,
    /// Rests are detected on each key of each channel separately.
    SeparateByChannelAndNoteNumber,
}
impl Default for RestSeparationPolicy {
    fn default() -> RestSeparationPolicy {
        RestSeparationPolicy::NoSeparation
    }
}

/// Settings controlling how rests are detected.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RestDetectionSettings {
    pub separation: RestSeparationPolicy,
}
impl RestDetectionSettings {
    pub fn with_separation(mut self, separation: RestSeparationPolicy) -> RestDetectionSettings {
        self.separation = separation;
        self
    }

    fn descriptor(&self, note: &Note) -> (Option<u4>, Option<u7>) {
        let (by_channel, by_key) = match self.separation {
            RestSeparationPolicy::NoSeparation => (false, false),
            RestSeparationPolicy::SeparateByChannel => (true, false),
            RestSeparationPolicy::SeparateByNoteNumber => (false, true),
            RestSeparationPolicy::SeparateByChannelAndNoteNumber => (true, true),
        };
        (
            if by_channel { Some(note.channel()) } else { None },
            if by_key { Some(note.key()) } else { None },
        )
    }
}

/// Finds rests while notes are fed in order of their start.
///
/// Every group of notes starts silent at tick zero.
#[derive(Debug, Default)]
pub(crate) struct RestsBuilder {
    settings: RestDetectionSettings,
    last_end: std::collections::HashMap<(Option<u4>, Option<u7>), u64>,
}
impl RestsBuilder {
    pub(crate) fn new(settings: RestDetectionSettings) -> RestsBuilder {
        RestsBuilder {
            settings,
            last_end: Default::default(),
        }
    }

    /// Register a note, returning the rest that precedes it, if any.
    pub(crate) fn feed(&mut self, note: &Note) -> Option<Rest> {
        let descriptor = self.settings.descriptor(note);
        let last_end = self.last_end.entry(descriptor).or_insert(0);
        let rest = if note.time() > *last_end {
            Some(Rest::new(
                *last_end,
                note.time() - *last_end,
                descriptor.0,
                descriptor.1,
            ))
        } else {
            None
        };
        *last_end = (*last_end).max(note.end_time());
        rest
    }
}
