use crate::byte_iter::ByteIter;
use crate::error::LibResult;
use crate::scribe::Scribe;
use crate::vlq;
use snafu::{OptionExt, ResultExt};
use std::convert::TryFrom;
use std::io::{Read, Write};

/// A system exclusive (SysEx) event, either a complete message or one packet of a message split
/// across several events.
///
/// `<sysex event>` is used to specify a MIDI system exclusive message, either as one unit or in
/// packets, or as an "escape" to specify any arbitrary bytes to be transmitted.
#[derive(Clone, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct SysexEvent {
    t: SysexEventType,
    data: Vec<u8>,
}

impl SysexEvent {
    pub fn new(t: SysexEventType, data: Vec<u8>) -> Self {
        Self { t, data }
    }

    pub fn event_type(&self) -> SysexEventType {
        self.t
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// `first_byte` (`0xf0` or `0xf7`) has already been consumed from `r`.
    pub(crate) fn parse<R: Read>(first_byte: u8, r: &mut ByteIter<R>) -> LibResult<Self> {
        let t = SysexEventType::from_u8(first_byte)?;
        let length = r.read_vlq_u32().context(io!())?;
        let data = r.read_n(length as usize).context(io!())?;
        Ok(Self { t, data })
    }

    pub(crate) fn write<W: Write>(&self, w: &mut Scribe<W>) -> LibResult<()> {
        write_u8!(w, self.t as u8)?;
        let size_u32 = u32::try_from(self.data.len())
            .ok()
            .context(crate::error::InvalidParameter {
                site: site!(),
                description: "sysex payload too long to encode as a vlq length".to_string(),
            })?;
        let size = vlq::encode_u32(size_u32).map_err(|e| invalid_vlv!(e))?;
        w.write_all(&size).context(wr!())?;
        w.write_all(&self.data).context(wr!())?;
        Ok(())
    }
}

/// `<sysex event>` is used to specify a MIDI system exclusive message, either as one unit or in
/// packets, or as an "escape" to specify any arbitrary bytes to be transmitted.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash, Default)]
pub enum SysexEventType {
    /// `F0 <length> <bytes to be transmitted after F0>`
    ///
    /// The length is stored as a variable-length quantity. It specifies the number of bytes which
    /// follow it, not including the F0 or the length itself. For instance, the transmitted
    /// message `F0 43 12 00 07 F7` would be stored in a MIDI file as `F0 05 43 12 00 07 F7`. The
    /// terminating `F7` must be included so the reader knows it has read the entire message.
    #[default]
    F0 = 0xf0,

    /// `F7 <length> <all bytes to be transmitted>`
    ///
    /// Some manufacturers specify that their system exclusive messages are transmitted as
    /// packets. An F0 sysex event is used for the first packet in a series; an F7 sysex event is
    /// used for the remaining packets, which do not begin with F0 (the stored F7 byte itself is
    /// not part of the transmitted message). A syntactic system exclusive message must always end
    /// with an F7 event, even if the real device didn't send one, so the reader knows it has
    /// reached the end without looking ahead to the next event.
    F7 = 0xf7,
}

impl SysexEventType {
    fn from_u8(value: u8) -> LibResult<Self> {
        match value {
            0xf0 => Ok(SysexEventType::F0),
            0xf7 => Ok(SysexEventType::F7),
            other => invalid_file!("expected a sysex event byte (0xf0 or 0xf7), got {:#04X}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_packet_round_trips() {
        let event = SysexEvent::new(SysexEventType::F0, vec![0x43, 0x12, 0x00, 0x07, 0xf7]);
        let mut buf = Vec::new();
        let mut scribe = Scribe::new(&mut buf, Default::default());
        event.write(&mut scribe).unwrap();
        assert_eq!(vec![0xf0, 0x05, 0x43, 0x12, 0x00, 0x07, 0xf7], buf);

        use std::io::Read as _;
        let first_byte = buf[0];
        let cursor = std::io::Cursor::new(buf[1..].to_vec());
        let mut iter = ByteIter::new(cursor.bytes()).unwrap();
        let parsed = SysexEvent::parse(first_byte, &mut iter).unwrap();
        assert_eq!(event, parsed);
    }

    #[test]
    fn packetized_continuation_round_trips() {
        let event = SysexEvent::new(SysexEventType::F7, vec![0x01, 0x02, 0xf7]);
        let mut buf = Vec::new();
        let mut scribe = Scribe::new(&mut buf, Default::default());
        event.write(&mut scribe).unwrap();

        use std::io::Read as _;
        let first_byte = buf[0];
        let cursor = std::io::Cursor::new(buf[1..].to_vec());
        let mut iter = ByteIter::new(cursor.bytes()).unwrap();
        let parsed = SysexEvent::parse(first_byte, &mut iter).unwrap();
        assert_eq!(event, parsed);
    }
}
