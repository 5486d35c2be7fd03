//! MIDI Tuning Standard (MTS) real-time system-exclusive builders: type-2 per-key tuning dumps
//! and type-9 octave/scale tuning dumps (MIDI Tuning Updated Specification, CA-020/021/RP-020).
//!
//! These build a [`SysexEvent`] ready to drop into a track; this crate does not attempt to parse
//! MTS messages back out of a file, since nothing in the SMF format distinguishes them from any
//! other manufacturer-specific SysEx payload.

use crate::error::LibResult;
use crate::numbers::U7;
use crate::sysex::{SysexEvent, SysexEventType};

const UNIVERSAL_REAL_TIME: u8 = 0x7f;
const SUB_ID_1_TUNING: u8 = 0x08;
const SUB_ID_2_NOTE_CHANGE: u8 = 0x02;
const SUB_ID_2_SCALE_TUNING_1_BYTE: u8 = 0x09;
const SUB_ID_2_SCALE_TUNING_2_BYTE: u8 = 0x08;

/// A single note's tuning: the nearest semitone plus a 14-bit fractional offset above it, in
/// units of 100/16384 cents.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Tuning {
    semitone: U7,
    fraction: u16,
}

impl Tuning {
    pub fn new(semitone: U7, fraction: u16) -> Self {
        Self {
            semitone,
            fraction: fraction.min(0x3fff),
        }
    }

    pub fn semitone(&self) -> U7 {
        self.semitone
    }

    pub fn fraction(&self) -> u16 {
        self.fraction
    }

    fn extend(&self, v: &mut Vec<u8>) {
        v.push(self.semitone.get());
        let msb = (self.fraction >> 7) as u8 & 0x7f;
        let lsb = (self.fraction & 0x7f) as u8;
        v.push(msb);
        v.push(lsb);
    }
}

/// Per-key real-time tuning change (type-2): retunes an explicit set of note numbers.
pub struct TuningNoteChange {
    device_id: U7,
    tuning_program_num: U7,
    tunings: Vec<(U7, Option<Tuning>)>,
}

impl TuningNoteChange {
    pub fn new(device_id: U7, tuning_program_num: U7, tunings: Vec<(U7, Option<Tuning>)>) -> crate::Result<Self> {
        ensure_at_most_127(tunings.len())?;
        Ok(Self {
            device_id,
            tuning_program_num,
            tunings,
        })
    }

    pub fn build(&self) -> SysexEvent {
        let mut data = vec![
            self.device_id.get(),
            SUB_ID_1_TUNING,
            SUB_ID_2_NOTE_CHANGE,
            self.tuning_program_num.get(),
            self.tunings.len() as u8,
        ];
        for (note, tuning) in &self.tunings {
            data.push(note.get());
            match tuning {
                Some(t) => t.extend(&mut data),
                None => data.extend_from_slice(&[0x7f, 0x7f, 0x7f]),
            }
        }
        data.push(checksum(&data));
        data.push(0xf7);
        SysexEvent::new(SysexEventType::F0, data)
    }
}

/// Two-byte (high-resolution) octave/scale tuning dump (type-9): twelve per-semitone offsets
/// repeated across all octaves, applied to a bitmap of channels.
pub struct ScaleTuningDump {
    device_id: U7,
    channels: ChannelBitMap,
    /// Fractional cents offset from equal temperament for each of the 12 semitones starting at
    /// C, range -8192..=8191 in units of roughly .0122 cents.
    tuning: [i16; 12],
}

impl ScaleTuningDump {
    pub fn new(device_id: U7, channels: ChannelBitMap, tuning: [i16; 12]) -> Self {
        Self {
            device_id,
            channels,
            tuning,
        }
    }

    pub fn build(&self) -> SysexEvent {
        let mut data = vec![self.device_id.get(), SUB_ID_1_TUNING, SUB_ID_2_SCALE_TUNING_2_BYTE];
        self.channels.extend(&mut data);
        for t in self.tuning.iter() {
            let biased = (*t as i32 + 8192) as u16;
            let msb = (biased >> 7) as u8 & 0x7f;
            let lsb = (biased & 0x7f) as u8;
            data.push(lsb);
            data.push(msb);
        }
        data.push(checksum(&data));
        data.push(0xf7);
        SysexEvent::new(SysexEventType::F0, data)
    }
}

/// One-byte (coarse) octave/scale tuning dump (type-9): cents offsets in -64..=63.
pub struct ScaleTuningDump1Byte {
    device_id: U7,
    channels: ChannelBitMap,
    tuning: [i8; 12],
}

impl ScaleTuningDump1Byte {
    pub fn new(device_id: U7, channels: ChannelBitMap, tuning: [i8; 12]) -> Self {
        Self {
            device_id,
            channels,
            tuning,
        }
    }

    pub fn build(&self) -> SysexEvent {
        let mut data = vec![self.device_id.get(), SUB_ID_1_TUNING, SUB_ID_2_SCALE_TUNING_1_BYTE];
        self.channels.extend(&mut data);
        for t in self.tuning.iter() {
            data.push((*t as i32 + 64).clamp(0, 127) as u8);
        }
        data.push(checksum(&data));
        data.push(0xf7);
        SysexEvent::new(SysexEventType::F0, data)
    }
}

/// The 16 MIDI channels a scale tuning dump applies to, packed 3 bits-per-byte + 7 + 6 per the
/// MTS spec's channel bitmap layout.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ChannelBitMap {
    bits: u16,
}

impl ChannelBitMap {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self { bits: 0xffff }
    }

    /// `channel` is 0-indexed (channel 0 is MIDI channel 1).
    pub fn set(&mut self, channel: U7, on: bool) {
        let bit = 1u16 << (channel.get().min(15));
        if on {
            self.bits |= bit;
        } else {
            self.bits &= !bit;
        }
    }

    fn extend(&self, v: &mut Vec<u8>) {
        let byte1 = ((self.bits >> 14) & 0b11) as u8;
        let byte2 = ((self.bits >> 7) & 0x7f) as u8;
        let byte3 = (self.bits & 0x7f) as u8;
        v.push(byte1);
        v.push(byte2);
        v.push(byte3);
    }
}

fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0x7fu8, |acc, b| acc ^ b) & 0x7f
}

fn ensure_at_most_127(len: usize) -> LibResult<()> {
    if len > 127 {
        invalid_parameter!("a tuning note change may specify at most 127 notes, got {}", len);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_change_builds_valid_sysex() {
        let change = TuningNoteChange::new(
            U7::new(0),
            U7::new(0),
            vec![(U7::new(60), Some(Tuning::new(U7::new(60), 0))), (U7::new(61), None)],
        )
        .unwrap();
        let event = change.build();
        let data = event.data();
        assert_eq!(data[0], 0); // device id
        assert_eq!(data[1], SUB_ID_1_TUNING);
        assert_eq!(data[2], SUB_ID_2_NOTE_CHANGE);
        assert_eq!(*data.last().unwrap(), 0xf7);
    }

    #[test]
    fn note_change_rejects_too_many_notes() {
        let tunings = (0..128).map(|n| (U7::new(n as u8), None)).collect();
        assert!(TuningNoteChange::new(U7::new(0), U7::new(0), tunings).is_err());
    }

    #[test]
    fn scale_tuning_2byte_round_trips_bias() {
        let mut channels = ChannelBitMap::none();
        channels.set(U7::new(0), true);
        let dump = ScaleTuningDump::new(U7::new(0x7f), channels, [0; 12]);
        let event = dump.build();
        assert_eq!(event.data()[1], SUB_ID_1_TUNING);
        assert_eq!(*event.data().last().unwrap(), 0xf7);
    }

    #[test]
    fn channel_bit_map_all_sets_every_channel() {
        let mut data = Vec::new();
        ChannelBitMap::all().extend(&mut data);
        assert_eq!(data, vec![0b11, 0x7f, 0x7f]);
    }
}
