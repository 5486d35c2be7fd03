use crate::byte_iter::ByteIter;
use crate::error::LibResult;
use crate::meta_event::MetaEvent;
use crate::message::Message;
use crate::scribe::Scribe;
use crate::sysex::SysexEvent;
use crate::vlq;
use log::trace;
use snafu::ResultExt;
use std::io::{Read, Write};

/// `0xFF`: all meta-events begin with FF, then have an event type byte (which is always less
/// than 128).
const FILE_META_EVENT: u8 = 0b1111_1111;

/// `0xF0`: `F0 <length> <bytes to be transmitted after F0>`
const FILE_SYSEX_F0: u8 = 0b1111_0000;

/// `0xF7`: `F7 <length> <all bytes to be transmitted>`
const FILE_SYSEX_F7: u8 = 0b1111_0111;

/// `<event> = <MIDI event> | <sysex event> | <meta-event>`
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum Event {
    /// Any MIDI channel message. Running status is used when reading; writing always spells out
    /// a fresh status byte.
    Midi(Message),
    /// A MIDI system exclusive message.
    Sysex(SysexEvent),
    /// Non-MIDI information useful to this format or to sequencers.
    Meta(MetaEvent),
}

impl Default for Event {
    fn default() -> Self {
        Event::Midi(Message::default())
    }
}

impl Event {
    pub(crate) fn parse<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Self> {
        let status_byte = iter.peek_or_die().context(io!())?;
        match status_byte {
            FILE_SYSEX_F7 | FILE_SYSEX_F0 => {
                iter.read().context(io!())?;
                Ok(Event::Sysex(SysexEvent::parse(status_byte, iter)?))
            }
            FILE_META_EVENT => {
                trace!("I peeked at {:#x}, a MetaEvent!", status_byte);
                Ok(Event::Meta(MetaEvent::parse(iter)?))
            }
            _ => {
                trace!(
                    "I peeked at {:#x}, neither a SysEx nor a MetaEvent, it must be a MIDI Message!",
                    status_byte
                );
                Ok(Event::Midi(Message::parse(iter)?))
            }
        }
    }

    pub(crate) fn write<W: Write>(&self, w: &mut Scribe<W>) -> LibResult<()> {
        match self {
            Event::Midi(md) => md.write(w),
            Event::Sysex(sx) => sx.write(w),
            Event::Meta(mt) => mt.write(w),
        }
    }

    /// Returns true if this is an [`MetaEvent::EndOfTrack`] event.
    pub(crate) fn is_end(&self) -> bool {
        matches!(self, Event::Meta(MetaEvent::EndOfTrack))
    }
}

/// `<MTrk event> = <delta-time> <event>`
#[derive(Clone, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct TrackEvent {
    /// The amount of time, in ticks as specified by the header chunk's division, before this
    /// event. A delta-time of zero is used for the first event in a track and for simultaneous
    /// events.
    delta_time: u32,
    event: Event,
}

impl TrackEvent {
    pub fn new(delta_time: u32, event: Event) -> Self {
        Self { delta_time, event }
    }

    pub fn delta_time(&self) -> u32 {
        self.delta_time
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Returns true if the track event is a [`MetaEvent::EndOfTrack`].
    pub(crate) fn is_end(&self) -> bool {
        self.event.is_end()
    }

    pub(crate) fn parse<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Self> {
        let delta_time = iter.read_vlq_u32().context(io!())?;
        trace!("delta_time {}", delta_time);
        let event = Event::parse(iter)?;
        Ok(Self { delta_time, event })
    }

    pub(crate) fn write<W: Write>(&self, w: &mut Scribe<W>) -> LibResult<()> {
        let delta = vlq::encode_u32(self.delta_time).map_err(|e| invalid_vlv!(e))?;
        w.write_all(&delta).context(wr!())?;
        self.event.write(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numbers::{Channel, NoteNumber, Velocity};
    use crate::message::NoteMessage;

    fn round_trip(event: TrackEvent) -> TrackEvent {
        let mut buf = Vec::new();
        let mut scribe = Scribe::new(&mut buf, Default::default());
        event.write(&mut scribe).unwrap();
        let cursor = std::io::Cursor::new(buf);
        let mut iter = ByteIter::new(cursor.bytes()).unwrap();
        TrackEvent::parse(&mut iter).unwrap()
    }

    #[test]
    fn midi_event_round_trips() {
        let msg = Message::NoteOn(NoteMessage::new(
            Channel::new(2),
            NoteNumber::new(64),
            Velocity::new(100),
        ));
        let event = TrackEvent::new(120, Event::Midi(msg));
        assert_eq!(event, round_trip(event.clone()));
    }

    #[test]
    fn meta_event_round_trips() {
        let event = TrackEvent::new(0, Event::Meta(MetaEvent::EndOfTrack));
        assert!(event.is_end());
        let parsed = round_trip(event.clone());
        assert_eq!(event, parsed);
        assert!(parsed.is_end());
    }

    #[test]
    fn sysex_event_round_trips() {
        let sysex = SysexEvent::new(crate::sysex::SysexEventType::F0, vec![0x43, 0x12, 0xf7]);
        let event = TrackEvent::new(10, Event::Sysex(sysex));
        assert_eq!(event, round_trip(event.clone()));
    }
}
