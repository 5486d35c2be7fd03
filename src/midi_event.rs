use crate::event::Event;
use crate::meta_event::MetaEvent;
use crate::message::Message;

/// A single timed event inside a track: a decoded [`Event`] plus the bookkeeping a `MidiFile`
/// needs to sort, join, split, and pair it up with other events.
///
/// The `tick` field is interpreted as delta or absolute time depending on the owning file's
/// current `TimeState`; converting between the two is a whole-file operation, not a per-event
/// one (see `MidiFile::to_absolute_ticks`/`to_delta_ticks`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MidiEvent {
    pub(crate) tick: u32,
    pub(crate) track: u32,
    pub(crate) seq: u64,
    pub(crate) seconds: Option<f64>,
    pub(crate) linked_index: Option<usize>,
    pub(crate) event: Event,
}

impl MidiEvent {
    pub fn new(tick: u32, track: u32, seq: u64, event: Event) -> Self {
        Self {
            tick,
            track,
            seq,
            seconds: None,
            linked_index: None,
            event,
        }
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn set_tick(&mut self, tick: u32) {
        self.tick = tick;
        self.seconds = None;
    }

    pub fn track(&self) -> u32 {
        self.track
    }

    pub fn set_track(&mut self, track: u32) {
        self.track = track;
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Clears this event's sequence-ordinal tiebreaker. After this, identical-tick events no
    /// longer preserve their original insertion order under sort.
    pub fn clear_sequence(&mut self) {
        self.seq = 0;
    }

    pub(crate) fn set_seq(&mut self, seq: u64) {
        self.seq = seq;
    }

    /// Seconds since the start of the file, valid only if a tempo analysis has run since the
    /// last mutation that would invalidate it.
    pub fn seconds(&self) -> Option<f64> {
        self.seconds
    }

    pub(crate) fn set_seconds(&mut self, seconds: f64) {
        self.seconds = Some(seconds);
    }

    /// The index, within the same track, of this event's paired note-on/note-off, set by
    /// `MidiFile::link_note_pairs`.
    pub fn linked_index(&self) -> Option<usize> {
        self.linked_index
    }

    pub(crate) fn set_linked_index(&mut self, index: Option<usize>) {
        self.linked_index = index;
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn event_mut(&mut self) -> &mut Event {
        &mut self.event
    }

    /// True for a zero-length message payload; `EventList::erase_empties` removes these.
    pub(crate) fn is_empty_payload(&self) -> bool {
        matches!(&self.event, Event::Sysex(s) if s.data().is_empty())
    }

    pub fn is_note_on(&self) -> bool {
        matches!(
            &self.event,
            Event::Midi(Message::NoteOn(n)) if n.velocity().get() > 0
        )
    }

    pub fn is_note_off(&self) -> bool {
        match &self.event {
            Event::Midi(Message::NoteOff(_)) => true,
            Event::Midi(Message::NoteOn(n)) => n.velocity().get() == 0,
            _ => false,
        }
    }

    pub fn is_end_of_track(&self) -> bool {
        matches!(&self.event, Event::Meta(MetaEvent::EndOfTrack))
    }

    /// Sort-priority bucket at a shared tick: end-of-track sorts last, other meta events sort
    /// before channel voice messages, and within channel voice, note-off/pitch-bend sort before
    /// note-on.
    pub(crate) fn sort_priority(&self) -> u8 {
        match &self.event {
            Event::Meta(MetaEvent::EndOfTrack) => 3,
            Event::Meta(_) => 0,
            Event::Sysex(_) => 0,
            Event::Midi(_) if self.is_note_off() => 1,
            Event::Midi(Message::PitchBend(_)) => 1,
            Event::Midi(_) => 2,
        }
    }
}
