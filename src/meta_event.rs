use crate::byte_iter::ByteIter;
use crate::clocks::Clocks;
use crate::duration_name::DurationName;
use crate::error::{self, LibResult};
use crate::numbers::{Channel, PortValue};
use crate::scribe::Scribe;
use crate::vlq;
use crate::{Result, Text};
use snafu::{ensure, OptionExt, ResultExt};
use std::convert::TryFrom;
use std::io::{Read, Write};

/// A small subset of the file's non-musical data: track names, tempo and time/key signature
/// changes, lyrics, and other annotations that ride alongside the musical events in a track.
///
/// In general, meta-events in a track which occur at the same tick may occur in any order. If a
/// copyright event is used, it should be placed as early as possible in the file. Sequence Number
/// and Sequence/Track Name events, if present, must appear at tick 0. An end-of-track event must
/// occur as the last event in the track.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum MetaEvent {
    /// `FF 00 02 ssss`: This optional event, which must occur at the beginning of a track, before
    /// any nonzero delta-times, specifies the number of a sequence. In a format 2 file, it
    /// identifies each "pattern" so a "song" sequence can refer to it with a Cue message. If
    /// omitted, the sequence's position in the file is used as its number.
    SequenceNumber(u16),

    /// `FF 01 len text`: Any amount of text describing anything.
    ///
    /// Meta event types 01 through 0F are reserved for various types of text events, each of
    /// which meets the specification of text events (above) but is used for a different purpose.
    OtherText(Text),

    /// `FF 02 len text`: A copyright notice as printable ASCII text. Should be the first event in
    /// the first track, at tick 0.
    Copyright(Text),

    /// `FF 03 len text`: If in a format 0 track, or the first track in a format 1 file, the name
    /// of the sequence. Otherwise, the name of the track.
    TrackName(Text),

    /// `FF 04 len text`: A description of the instrumentation to be used in that track.
    InstrumentName(Text),

    /// `FF 05 len text`: A lyric to be sung, generally one syllable per event.
    Lyric(Text),

    /// `FF 06 len text`: The name of a point in the sequence, such as a rehearsal letter.
    Marker(Text),

    /// `FF 07 len text`: A description of something happening on a film or video screen at that
    /// point in the score.
    CuePoint(Text),

    /// `FF 08 len text`: The name of the program (patch) in use.
    ProgramName(Text),

    /// `FF 09 len text`: The name of the device the track is intended for.
    DeviceName(Text),

    /// `FF 20 01 cc`: Associates a MIDI channel with the events that follow, including SysEx and
    /// meta-events, until the next normal MIDI event or MIDI Channel Prefix meta-event.
    MidiChannelPrefix(Channel),

    /// `FF 2F 00`: Not optional. Specifies an exact ending point for the track.
    EndOfTrack,

    /// `FF 51 03 tttttt`: Set Tempo, in microseconds per MIDI quarter-note.
    SetTempo(MicrosecondsPerQuarter),

    /// `FF 54 05 hr mn se fr ff`: The SMPTE time at which the track chunk is supposed to start.
    /// Should be present at the beginning of the track, before any nonzero delta-times.
    SmpteOffset(SmpteOffsetValue),

    /// `FF 58 04 nn dd cc bb`: numerator, denominator (negative power of two), MIDI clocks per
    /// metronome click, and number of notated 32nd-notes per MIDI quarter-note.
    TimeSignature(TimeSignatureValue),

    /// `FF 59 02 sf mi`: key signature as accidentals and major/minor mode.
    KeySignature(KeySignatureValue),

    /// `FF 7f len data`: Sequencer-specific data. The first byte(s) of `data` are a manufacturer
    /// ID (one byte, or three if the first byte is `0x00`), followed by arbitrary payload bytes.
    Sequencer(Vec<u8>),

    /// `FF 21 01 value`: assigns a MIDI port/bus number to the events that follow.
    Port(PortValue),

    /// An unrecognized meta event type, preserved verbatim as its raw type byte and payload so
    /// that reading and writing a file never silently drops data this library doesn't know how
    /// to interpret.
    Other(u8, Vec<u8>),
}

impl Default for MetaEvent {
    fn default() -> Self {
        MetaEvent::EndOfTrack
    }
}

impl MetaEvent {
    pub(crate) fn parse<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Self> {
        iter.read_expect(0xff).context(io!())?;
        let meta_type_byte = iter.read_or_die().context(io!())?;
        match meta_type_byte {
            META_SEQUENCE_NUM => {
                let length = iter.read_or_die().context(io!())?;
                if length == 0 {
                    return Ok(MetaEvent::SequenceNumber(0));
                }
                ensure!(
                    length == LEN_META_SEQUENCE_NUM,
                    error::WrongKind {
                        site: site!(),
                        description: format!("unexpected sequence number length {}", length)
                    }
                );
                let bytes = iter.read2().context(io!())?;
                Ok(MetaEvent::SequenceNumber(u16::from_be_bytes(bytes)))
            }
            META_TEXT..=META_DEVICE_NAME => MetaEvent::parse_text(iter),
            META_CHAN_PREFIX => {
                iter.read_expect(LEN_META_CHAN_PREFIX).context(io!())?;
                Ok(MetaEvent::MidiChannelPrefix(Channel::new(
                    iter.read_or_die().context(io!())?,
                )))
            }
            META_END_OF_TRACK => MetaEvent::parse_end_of_track(iter),
            META_SET_TEMPO => Ok(MetaEvent::SetTempo(MicrosecondsPerQuarter::parse(iter)?)),
            META_SMTPE_OFFSET => Ok(MetaEvent::SmpteOffset(SmpteOffsetValue::parse(iter)?)),
            META_TIME_SIG => Ok(MetaEvent::TimeSignature(TimeSignatureValue::parse(iter)?)),
            META_KEY_SIG => Ok(MetaEvent::KeySignature(KeySignatureValue::parse(iter)?)),
            META_SEQ_SPECIFIC => {
                let length = iter.read_vlq_u32().context(io!())?;
                let data = iter.read_n(length as usize).context(io!())?;
                Ok(MetaEvent::Sequencer(data))
            }
            META_PORT => Ok(MetaEvent::Port(PortValue::new({
                iter.read_expect(1).context(io!())?;
                iter.read_or_die().context(io!())?
            }))),
            other => {
                log::warn!(
                    "unrecognized meta event type byte {:#04X}; preserving its payload verbatim",
                    other
                );
                let length = iter.read_vlq_u32().context(io!())?;
                let data = iter.read_n(length as usize).context(io!())?;
                Ok(MetaEvent::Other(other, data))
            }
        }
    }

    pub(crate) fn write<W: Write>(&self, w: &mut Scribe<W>) -> LibResult<()> {
        w.write_all(&[0xff]).context(wr!())?;
        match self {
            MetaEvent::SequenceNumber(n) => {
                write_u8!(w, META_SEQUENCE_NUM)?;
                write_u8!(w, LEN_META_SEQUENCE_NUM)?;
                w.write_all(&n.to_be_bytes()).context(wr!())
            }
            MetaEvent::OtherText(s) => write_text(w, 0x01, s),
            MetaEvent::Copyright(s) => write_text(w, 0x02, s),
            MetaEvent::TrackName(s) => write_text(w, 0x03, s),
            MetaEvent::InstrumentName(s) => write_text(w, 0x04, s),
            MetaEvent::Lyric(s) => write_text(w, 0x05, s),
            MetaEvent::Marker(s) => write_text(w, 0x06, s),
            MetaEvent::CuePoint(s) => write_text(w, 0x07, s),
            MetaEvent::ProgramName(s) => write_text(w, 0x08, s),
            MetaEvent::DeviceName(s) => write_text(w, 0x09, s),
            MetaEvent::MidiChannelPrefix(channel) => {
                write_u8!(w, META_CHAN_PREFIX)?;
                write_u8!(w, LEN_META_CHAN_PREFIX)?;
                write_u8!(w, channel.get())
            }
            MetaEvent::EndOfTrack => {
                write_u8!(w, META_END_OF_TRACK)?;
                write_u8!(w, LEN_META_END_OF_TRACK)?;
                Ok(())
            }
            MetaEvent::SetTempo(value) => {
                write_u8!(w, META_SET_TEMPO)?;
                write_u8!(w, LEN_META_SET_TEMPO)?;
                // encode as big-endian u24 by dropping the top byte of the u32 be representation
                let bytes = u32::to_be_bytes(value.get());
                debug_assert_eq!(bytes.len(), 4);
                w.write_all(&bytes[1..]).context(wr!())
            }
            MetaEvent::SmpteOffset(value) => value.write(w),
            MetaEvent::TimeSignature(value) => value.write(w),
            MetaEvent::KeySignature(value) => value.write(w),
            MetaEvent::Sequencer(data) => {
                write_u8!(w, META_SEQ_SPECIFIC)?;
                let size_u32 = u32::try_from(data.len())
                    .ok()
                    .context(error::InvalidParameter {
                        site: site!(),
                        description: "sequencer-specific data too long".to_string(),
                    })?;
                let size = vlq::encode_u32(size_u32).map_err(|e| invalid_vlv!(e))?;
                w.write_all(&size).context(wr!())?;
                w.write_all(data).context(wr!())
            }
            MetaEvent::Port(value) => {
                write_u8!(w, META_PORT)?;
                write_u8!(w, 1)?;
                write_u8!(w, value.get())
            }
            MetaEvent::Other(type_byte, data) => {
                write_u8!(w, *type_byte)?;
                let size_u32 = u32::try_from(data.len())
                    .ok()
                    .context(error::InvalidParameter {
                        site: site!(),
                        description: "unrecognized meta event payload too long".to_string(),
                    })?;
                let size = vlq::encode_u32(size_u32).map_err(|e| invalid_vlv!(e))?;
                w.write_all(&size).context(wr!())?;
                w.write_all(data).context(wr!())
            }
        }
    }

    pub(crate) fn parse_end_of_track<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Self> {
        iter.read_expect(0x00).context(io!())?;
        Ok(MetaEvent::EndOfTrack)
    }

    pub(crate) fn parse_text<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Self> {
        let text_type = iter.current().context(error::WrongKind {
            site: site!(),
            description: "expected to be positioned on a meta event type byte".to_string(),
        })?;
        let length = iter.read_vlq_u32().context(io!())?;
        let bytes = iter.read_n(length as usize).context(io!())?;
        // the spec does not strictly specify what encoding should be used for strings
        let s: Text = bytes.into();
        match text_type {
            META_TEXT => Ok(MetaEvent::OtherText(s)),
            META_COPYRIGHT => Ok(MetaEvent::Copyright(s)),
            META_TRACK_NAME => Ok(MetaEvent::TrackName(s)),
            META_INSTR_NAME => Ok(MetaEvent::InstrumentName(s)),
            META_LYRIC => Ok(MetaEvent::Lyric(s)),
            META_MARKER => Ok(MetaEvent::Marker(s)),
            META_CUE_POINT => Ok(MetaEvent::CuePoint(s)),
            META_PROG_NAME => Ok(MetaEvent::ProgramName(s)),
            META_DEVICE_NAME => Ok(MetaEvent::DeviceName(s)),
            _ => invalid_file!("unrecognized text meta event type byte {:#04X}", text_type),
        }
    }

    /// True for meta events which, per the MIDI file spec, must occur at tick 0 and before any
    /// other events in the track.
    pub(crate) fn must_be_first(&self) -> bool {
        matches!(
            self,
            MetaEvent::SequenceNumber(_) | MetaEvent::TrackName(_)
        )
    }
}

fn write_text<W: Write>(w: &mut Scribe<W>, text_type: u8, text: &Text) -> LibResult<()> {
    w.write_all(&text_type.to_be_bytes()).context(wr!())?;
    let bytes = text.as_bytes();
    let size_u32 = u32::try_from(bytes.len())
        .ok()
        .context(error::InvalidParameter {
            site: site!(),
            description: "text too long to encode as a vlq length".to_string(),
        })?;
    let size = vlq::encode_u32(size_u32).map_err(|e| invalid_vlv!(e))?;
    w.write_all(&size).context(wr!())?;
    w.write_all(bytes).context(wr!())?;
    Ok(())
}

#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct SmpteOffsetValue {
    pub(crate) hr: u8,
    pub(crate) mn: u8,
    pub(crate) se: u8,
    pub(crate) fr: u8,
    pub(crate) ff: u8,
}

impl SmpteOffsetValue {
    pub fn new(hr: u8, mn: u8, se: u8, fr: u8, ff: u8) -> Self {
        Self { hr, mn, se, fr, ff }
    }

    pub(crate) fn parse<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Self> {
        iter.read_expect(LEN_META_SMTPE_OFFSET).context(io!())?;
        Ok(Self {
            hr: iter.read_or_die().context(io!())?,
            mn: iter.read_or_die().context(io!())?,
            se: iter.read_or_die().context(io!())?,
            fr: iter.read_or_die().context(io!())?,
            ff: iter.read_or_die().context(io!())?,
        })
    }

    pub(crate) fn write<W: Write>(&self, w: &mut Scribe<W>) -> LibResult<()> {
        write_u8!(w, META_SMTPE_OFFSET)?;
        write_u8!(w, LEN_META_SMTPE_OFFSET)?;
        write_u8!(w, self.hr)?;
        write_u8!(w, self.mn)?;
        write_u8!(w, self.se)?;
        write_u8!(w, self.fr)?;
        write_u8!(w, self.ff)?;
        Ok(())
    }
}

pub(crate) const META_SEQUENCE_NUM: u8 = 0x00;
pub(crate) const META_TEXT: u8 = 0x01;
pub(crate) const META_COPYRIGHT: u8 = 0x02;
pub(crate) const META_TRACK_NAME: u8 = 0x03;
pub(crate) const META_INSTR_NAME: u8 = 0x04;
pub(crate) const META_LYRIC: u8 = 0x05;
pub(crate) const META_MARKER: u8 = 0x06;
pub(crate) const META_CUE_POINT: u8 = 0x07;
pub(crate) const META_PROG_NAME: u8 = 0x08;
pub(crate) const META_DEVICE_NAME: u8 = 0x09;
pub(crate) const META_CHAN_PREFIX: u8 = 0x20;
pub(crate) const META_END_OF_TRACK: u8 = 0x2f;
pub(crate) const META_SET_TEMPO: u8 = 0x51;
pub(crate) const META_SMTPE_OFFSET: u8 = 0x54;
pub(crate) const META_TIME_SIG: u8 = 0x58;
pub(crate) const META_KEY_SIG: u8 = 0x59;
pub(crate) const META_SEQ_SPECIFIC: u8 = 0x7f;
pub(crate) const META_PORT: u8 = 0x21;

pub(crate) const LEN_META_SEQUENCE_NUM: u8 = 2;
pub(crate) const LEN_META_CHAN_PREFIX: u8 = 1;
pub(crate) const LEN_META_END_OF_TRACK: u8 = 0;
pub(crate) const LEN_META_SET_TEMPO: u8 = 3;
pub(crate) const LEN_META_SMTPE_OFFSET: u8 = 5;
pub(crate) const LEN_META_TIME_SIG: u8 = 4;
pub(crate) const LEN_META_KEY_SIG: u8 = 2;

#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct TimeSignatureValue {
    /// The upper part of a time signature. For example, in 6/8, the `numerator` is 6.
    numerator: u8,

    /// The lower part of a time signature, a negative power of two. For example, in 6/8, the
    /// `denominator` is [`DurationName::Eighth`].
    denominator: DurationName,

    /// The number of MIDI clocks in a metronome click, unrelated to tempo.
    click: Clocks,

    /// The number of notated 32nd-notes per MIDI quarter-note (24 MIDI clocks). Normally 8.
    tpq: u8,
}

impl TimeSignatureValue {
    pub fn new(numerator: u8, denominator: DurationName, click: Clocks) -> Result<Self> {
        ensure!(
            numerator > 0,
            error::InvalidParameter {
                site: site!(),
                description: "time signature numerator must be greater than zero".to_string()
            }
        );
        Ok(Self {
            numerator,
            denominator,
            click,
            ..Self::default()
        })
    }

    pub fn numerator(&self) -> u8 {
        self.numerator
    }

    pub fn denominator(&self) -> DurationName {
        self.denominator
    }

    pub fn click(&self) -> Clocks {
        self.click
    }

    pub(crate) fn parse<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Self> {
        iter.read_expect(LEN_META_TIME_SIG).context(io!())?;
        Ok(Self {
            numerator: iter.read_or_die().context(io!())?,
            denominator: DurationName::from_u8(iter.read_or_die().context(io!())?)?,
            click: Clocks::from_u8(iter.read_or_die().context(io!())?),
            tpq: iter.read_or_die().context(io!())?,
        })
    }

    pub(crate) fn write<W: Write>(&self, w: &mut Scribe<W>) -> LibResult<()> {
        write_u8!(w, META_TIME_SIG)?;
        write_u8!(w, LEN_META_TIME_SIG)?;
        write_u8!(w, self.numerator)?;
        write_u8!(w, self.denominator.to_u8())?;
        write_u8!(w, self.click.to_u8())?;
        write_u8!(w, self.tpq)?;
        Ok(())
    }
}

// -7 is 7 flats, +7 is 7 sharps.
clamp!(
    /// The number of flats or sharps in a key signature. For example `-2` means "2 flats". Valid
    /// range is -7 to 7.
    KeyAccidentals,
    i8,
    -7,
    7,
    0,
    pub
);

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum KeyMode {
    Major,
    Minor,
}

impl Default for KeyMode {
    fn default() -> Self {
        KeyMode::Major
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct KeySignatureValue {
    accidentals: KeyAccidentals,
    mode: KeyMode,
}

impl KeySignatureValue {
    pub fn new(accidentals: KeyAccidentals, mode: KeyMode) -> Self {
        Self { accidentals, mode }
    }

    pub fn accidentals(&self) -> KeyAccidentals {
        self.accidentals
    }

    pub fn mode(&self) -> KeyMode {
        self.mode
    }

    pub(crate) fn parse<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Self> {
        iter.read_expect(LEN_META_KEY_SIG).context(io!())?;
        let raw_accidentals_byte = iter.read_or_die().context(io!())?;
        let casted_accidentals = raw_accidentals_byte as i8;
        Ok(Self {
            accidentals: casted_accidentals.into(),
            mode: match iter.read_or_die().context(io!())? {
                1 => KeyMode::Minor,
                _ => KeyMode::Major,
            },
        })
    }

    pub(crate) fn write<W: Write>(&self, w: &mut Scribe<W>) -> LibResult<()> {
        write_u8!(w, META_KEY_SIG)?;
        write_u8!(w, LEN_META_KEY_SIG)?;
        write_u8!(w, self.accidentals.get() as u8)?;
        write_u8!(w, self.mode as u8)?;
        Ok(())
    }
}

pub(crate) const DEFAULT_MICROSECONDS_PER_QUARTER: u32 = 500_000;
pub(crate) const MAX_24BIT_UINT_VALUE: u32 = 16_777_215;

clamp!(
    /// Tempo expressed as microseconds per MIDI quarter note. Tempo microseconds are given by a
    /// 6-nibble (24-bit) integer, hence the upper bound of 16,777,215. The default, 500,000,
    /// corresponds to 120 beats per minute.
    MicrosecondsPerQuarter,
    u32,
    1,
    MAX_24BIT_UINT_VALUE,
    DEFAULT_MICROSECONDS_PER_QUARTER,
    pub
);

impl MicrosecondsPerQuarter {
    pub(crate) fn parse<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Self> {
        iter.read_expect(LEN_META_SET_TEMPO).context(io!())?;
        let bytes = iter.read_n(LEN_META_SET_TEMPO as usize).context(io!())?;
        // bytes is a big-endian u24; pad it into a big-endian u32 and parse
        let beu32 = [0u8, bytes[0], bytes[1], bytes[2]];
        Ok(MicrosecondsPerQuarter::new(u32::from_be_bytes(beu32)))
    }

    /// Tempo in seconds per quarter note.
    pub fn seconds_per_quarter(&self) -> f64 {
        f64::from(self.get()) / 1_000_000.0
    }

    /// Tempo in beats (quarter notes) per minute.
    pub fn bpm(&self) -> f64 {
        60.0 / self.seconds_per_quarter()
    }

    /// Ticks per second at this tempo, given the file's ticks-per-quarter-note.
    pub fn ticks_per_second(&self, tpq: u16) -> f64 {
        f64::from(tpq) / self.seconds_per_quarter()
    }

    /// Seconds per tick at this tempo, given the file's ticks-per-quarter-note.
    pub fn seconds_per_tick(&self, tpq: u16) -> f64 {
        self.seconds_per_quarter() / f64::from(tpq)
    }
}

clamp!(
    /// A more convenient way to specify tempo than [`MicrosecondsPerQuarter`], e.g. "120 Beats
    /// per Minute". Locked to quarter-notes; translate if your "beat" is not a quarter note.
    QuartersPerMinute,
    u8,
    1,
    u8::MAX,
    120,
    pub
);

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(event: MetaEvent) -> MetaEvent {
        let mut buf = Vec::new();
        let mut scribe = Scribe::new(&mut buf, Default::default());
        event.write(&mut scribe).unwrap();
        use std::io::Read as _;
        let cursor = std::io::Cursor::new(buf);
        let mut iter = ByteIter::new(cursor.bytes()).unwrap();
        MetaEvent::parse(&mut iter).unwrap()
    }

    #[test]
    fn sequence_number_round_trips() {
        assert_eq!(
            MetaEvent::SequenceNumber(42),
            round_trip(MetaEvent::SequenceNumber(42))
        );
    }

    #[test]
    fn sequencer_specific_round_trips() {
        let data = vec![0x00, 0x01, 0x02, 0x03, 0xff];
        assert_eq!(
            MetaEvent::Sequencer(data.clone()),
            round_trip(MetaEvent::Sequencer(data))
        );
    }

    #[test]
    fn track_name_round_trips() {
        let event = MetaEvent::TrackName(Text::new("Piano"));
        assert_eq!(event.clone(), round_trip(event));
    }

    #[test]
    fn set_tempo_round_trips() {
        let event = MetaEvent::SetTempo(MicrosecondsPerQuarter::new(600_000));
        assert_eq!(event.clone(), round_trip(event));
    }

    #[test]
    fn unrecognized_meta_event_is_preserved_verbatim() {
        // 0x20 (MIDI channel prefix's neighbor in some vendor extensions) is not one of the
        // recognized meta event type bytes this library decodes structurally.
        let event = MetaEvent::Other(0x5a, vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(event.clone(), round_trip(event));
    }

    #[test]
    fn tempo_accessors_match_120_bpm_default() {
        let tempo = MicrosecondsPerQuarter::default();
        assert_eq!(tempo.get(), 500_000);
        assert!((tempo.seconds_per_quarter() - 0.5).abs() < f64::EPSILON);
        assert!((tempo.bpm() - 120.0).abs() < 1e-9);
        assert!((tempo.ticks_per_second(480) - 960.0).abs() < 1e-9);
        assert!((tempo.seconds_per_tick(480) - 0.5 / 480.0).abs() < 1e-12);
    }
}
