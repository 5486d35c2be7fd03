use crate::midi_event::MidiEvent;

/// An ordered sequence of [`MidiEvent`]s making up one track.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventList {
    events: Vec<MidiEvent>,
}

impl EventList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last(&self) -> Option<&MidiEvent> {
        self.events.last()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn get(&self, index: usize) -> Option<&MidiEvent> {
        self.events.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut MidiEvent> {
        self.events.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MidiEvent> {
        self.events.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut MidiEvent> {
        self.events.iter_mut()
    }

    /// Appends `event`, assigning it the next sequence ordinal.
    pub(crate) fn append(&mut self, mut event: MidiEvent) {
        event.seq = self.next_seq();
        self.events.push(event);
    }

    /// Appends `event` as-is, preserving whatever sequence ordinal it already carries (used
    /// while loading, where `seq` is assigned in file order rather than append order).
    pub(crate) fn push_raw(&mut self, event: MidiEvent) {
        self.events.push(event);
    }

    fn next_seq(&self) -> u64 {
        self.events.iter().map(|e| e.seq).max().map_or(0, |m| m + 1)
    }

    /// Removes events carrying a zero-length SysEx payload.
    pub fn erase_empties(&mut self) {
        self.events.retain(|e| !e.is_empty_payload());
    }

    /// Stable sort by (tick, sort-priority bucket, sequence ordinal). See
    /// [`MidiEvent::sort_priority`] for the bucket rules.
    pub fn sort(&mut self) {
        self.events
            .sort_by_key(|e| (e.tick(), e.sort_priority(), e.seq()));
    }

    pub(crate) fn into_vec(self) -> Vec<MidiEvent> {
        self.events
    }

    pub(crate) fn from_vec(events: Vec<MidiEvent>) -> Self {
        Self { events }
    }
}

impl<'a> IntoIterator for &'a EventList {
    type Item = &'a MidiEvent;
    type IntoIter = std::slice::Iter<'a, MidiEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::meta_event::MetaEvent;

    fn meta_at(tick: u32, seq: u64) -> MidiEvent {
        MidiEvent::new(tick, 0, seq, Event::Meta(MetaEvent::Marker(Default::default())))
    }

    #[test]
    fn sort_breaks_ties_by_ascending_seq() {
        let mut list = EventList::new();
        list.push_raw(meta_at(5, 2));
        list.push_raw(meta_at(5, 1));
        list.push_raw(meta_at(1, 0));
        list.sort();
        let ticks: Vec<u32> = list.iter().map(|e| e.tick()).collect();
        assert_eq!(vec![1, 5, 5], ticks);
        let seqs: Vec<u64> = list.iter().map(|e| e.seq()).collect();
        assert_eq!(vec![0, 1, 2], seqs);
    }

    #[test]
    fn end_of_track_sorts_last_at_same_tick() {
        let mut list = EventList::new();
        list.push_raw(MidiEvent::new(10, 0, 0, Event::Meta(MetaEvent::EndOfTrack)));
        list.push_raw(meta_at(10, 1));
        list.sort();
        assert!(list.get(1).unwrap().is_end_of_track());
    }

    #[test]
    fn append_assigns_increasing_sequence() {
        let mut list = EventList::new();
        list.append(meta_at(0, 999));
        list.append(meta_at(0, 999));
        let seqs: Vec<u64> = list.iter().map(|e| e.seq()).collect();
        assert_eq!(vec![0, 1], seqs);
    }
}
