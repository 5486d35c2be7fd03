//! Reads, edits, and writes Standard MIDI Files.
//!
//! ```
//! use midi_file::{Channel, MidiFile, NoteNumber, Velocity};
//!
//! let mut file = MidiFile::new();
//! file.add_note_on(0, 0, Channel::new(0), NoteNumber::new(60), Velocity::new(100)).unwrap();
//! file.add_note_off(0, 120, Channel::new(0), NoteNumber::new(60), Velocity::new(0)).unwrap();
//! file.sort_tracks();
//!
//! let mut bytes = Vec::new();
//! file.write(&mut bytes).unwrap();
//! ```

#![allow(dead_code)]

#[macro_use]
mod error;
#[macro_use]
mod clamp;
#[macro_use]
mod macros;

mod bits;
mod byte_iter;
mod clocks;
mod division;
mod duration_name;
mod event;
mod event_list;
mod header;
mod message;
mod meta_event;
mod midi_event;
mod midi_file;
mod numbers;
mod scribe;
mod sysex;
mod text;
mod text_format;
mod tuning;
mod vlq;

pub use clocks::Clocks;
pub use division::{Division, FrameRate, QuarterNoteDivision, SmpteRate};
pub use duration_name::DurationName;
pub use error::{Error, Result};
pub use event::Event;
pub use event_list::EventList;
pub use header::{Format, Header};
pub use message::{
    ChannelPressureValue, Control, ControlChangeValue, Message, MonoModeOnValue, NoteMessage,
    PitchBendValueMessage, ProgramChangeValue, StatusType,
};
pub use meta_event::{
    KeyAccidentals, KeyMode, KeySignatureValue, MetaEvent, MicrosecondsPerQuarter,
    QuartersPerMinute, SmpteOffsetValue, TimeSignatureValue,
};
pub use midi_event::MidiEvent;
pub use midi_file::{MidiFile, TimeState, TrackState};
pub use numbers::{
    Channel, ControlValue, NoteNumber, PitchBendValue, Program, PortValue, Velocity, U7,
};
pub use sysex::{SysexEvent, SysexEventType};
pub use text::Text;
pub use tuning::{ChannelBitMap, ScaleTuningDump, ScaleTuningDump1Byte, Tuning, TuningNoteChange};
