use crate::error::LibResult;
use crate::scribe::Scribe;
use crate::Error;
use snafu::ResultExt;
use std::convert::TryFrom;
use std::io::Write;

clamp!(
    /// The allowable values for [`Division`] when using the quarter-note method. It is a positive
    /// 14-bit value and thus has the range 1 to 16,383. The default value is 1024.
    QuarterNoteDivision,
    u16,
    1,
    16383,
    1024,
    pub
);

/// Specifies the meaning of a track's delta-times. It has two formats, one for metrical time and
/// one for time-code-based time.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum Division {
    /// If bit 15 of `<division>` is zero, bits 14 thru 0 represent the number of delta-time
    /// "ticks" which make up a quarter-note. For instance, if `<division>` is 96, then a time
    /// interval of an eighth-note between two events in the file would be 48.
    QuarterNote(QuarterNoteDivision),
    /// Frame rate and resolution within the frame, for time-code-based files.
    Smpte(SmpteRate),
}

impl Default for Division {
    fn default() -> Self {
        Division::QuarterNote(QuarterNoteDivision::default())
    }
}

const DIVISION_TYPE_BIT: u16 = 0b1000000000000000;

impl Division {
    pub(crate) fn from_u16(value: u16) -> LibResult<Self> {
        if value & DIVISION_TYPE_BIT == DIVISION_TYPE_BIT {
            let frame_rate_byte = (value >> 8) as u8;
            let frame_rate = FrameRate::from_negative_byte(frame_rate_byte)?;
            let resolution = (value & 0x00ff) as u8;
            Ok(Division::Smpte(SmpteRate {
                frame_rate,
                resolution,
            }))
        } else {
            Ok(Division::QuarterNote(QuarterNoteDivision::new(value)))
        }
    }

    pub(crate) fn write<W: Write>(&self, w: &mut Scribe<W>) -> LibResult<()> {
        match self {
            Division::QuarterNote(q) => Ok(w.write_all(&q.get().to_be_bytes()).context(wr!())?),
            Division::Smpte(s) => {
                let bytes = [s.frame_rate.to_negative_byte(), s.resolution];
                Ok(w.write_all(&bytes).context(wr!())?)
            }
        }
    }
}

impl TryFrom<u16> for Division {
    type Error = Error;

    fn try_from(value: u16) -> crate::Result<Self> {
        Ok(Division::from_u16(value)?)
    }
}

/// `<division>` bits 14 thru 8 contain one of the four values -24, -25, -29, or -30, corresponding
/// to the four standard SMPTE and MIDI time code formats (-29 corresponds to 30 drop frame), and
/// represents the number of frames per second. These negative numbers are stored in two's
/// complement form.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum FrameRate {
    /// 24 frames per second
    N24,
    /// 25 frames per second
    N25,
    /// 30 drop frame
    N29,
    /// 30 frames per second
    N30,
    /// A byte outside the four legal frame rates, preserved verbatim (two's complement form).
    Other(u8),
}

impl Default for FrameRate {
    fn default() -> Self {
        FrameRate::N24
    }
}

impl FrameRate {
    fn from_negative_byte(byte: u8) -> LibResult<Self> {
        match byte as i8 {
            -24 => Ok(FrameRate::N24),
            -25 => Ok(FrameRate::N25),
            -29 => Ok(FrameRate::N29),
            -30 => Ok(FrameRate::N30),
            other => {
                log::warn!(
                    "unrecognized smpte frame rate byte {} ({:#04X}); preserving it verbatim",
                    other,
                    byte
                );
                Ok(FrameRate::Other(byte))
            }
        }
    }

    fn to_negative_byte(self) -> u8 {
        let v: i8 = match self {
            FrameRate::N24 => -24,
            FrameRate::N25 => -25,
            FrameRate::N29 => -29,
            FrameRate::N30 => -30,
            FrameRate::Other(byte) => return byte,
        };
        v as u8
    }
}

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct SmpteRate {
    /// The number of frames per second.
    frame_rate: FrameRate,
    /// The `<division>` second byte (stored positive) is the resolution within a frame: typical
    /// values may be 4 (MIDI time code resolution), 8, 10, 80 (bit resolution), or 100. This
    /// allows exact specification of time-code-based tracks, but also allows millisecond-based
    /// tracks by specifying 25 frames/sec and a resolution of 40 units per frame.
    resolution: u8,
}

impl SmpteRate {
    pub fn new(frame_rate: FrameRate, resolution: u8) -> Self {
        Self {
            frame_rate,
            resolution,
        }
    }

    pub fn frame_rate(&self) -> FrameRate {
        self.frame_rate
    }

    pub fn resolution(&self) -> u8 {
        self.resolution
    }
}

impl Default for SmpteRate {
    fn default() -> Self {
        // This is the 'millisecond-based tracks' example given by the MIDI file spec.
        SmpteRate {
            frame_rate: FrameRate::N25,
            resolution: 40,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smpte_round_trips() {
        let division = Division::Smpte(SmpteRate::default());
        let mut buf = Vec::new();
        let mut scribe = Scribe::new(&mut buf, Default::default());
        division.write(&mut scribe).unwrap();
        assert_eq!(vec![0xE7, 40], buf);
        let value = u16::from_be_bytes([buf[0], buf[1]]);
        assert_eq!(division, Division::from_u16(value).unwrap());
    }

    #[test]
    fn quarter_note_round_trips() {
        let division = Division::QuarterNote(QuarterNoteDivision::new(480));
        let mut buf = Vec::new();
        let mut scribe = Scribe::new(&mut buf, Default::default());
        division.write(&mut scribe).unwrap();
        let value = u16::from_be_bytes([buf[0], buf[1]]);
        assert_eq!(division, Division::from_u16(value).unwrap());
    }

    #[test]
    fn unrecognized_smpte_frame_rate_is_preserved_not_rejected() {
        // -1 in two's complement: not one of the four legal frame rates.
        let byte = (-1_i8) as u8;
        let value = u16::from_be_bytes([0x80 | byte, 40]);
        let division = Division::from_u16(value).unwrap();
        assert_eq!(
            division,
            Division::Smpte(SmpteRate::new(FrameRate::Other(byte), 40))
        );
        let mut buf = Vec::new();
        let mut scribe = Scribe::new(&mut buf, Default::default());
        division.write(&mut scribe).unwrap();
        assert_eq!(vec![0x80 | byte, 40], buf);
    }
}
