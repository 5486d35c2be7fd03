use crate::byte_iter::ByteIter;
use crate::division::{Division, QuarterNoteDivision};
use crate::error::{self, LibResult};
use crate::event::Event;
use crate::event_list::EventList;
use crate::header::{Format, Header};
use crate::message::{Message, NoteMessage, ProgramChangeValue};
use crate::meta_event::{MetaEvent, MicrosecondsPerQuarter, QuartersPerMinute, TimeSignatureValue};
use crate::midi_event::MidiEvent;
use crate::numbers::{Channel, NoteNumber, Velocity};
use crate::scribe::{Scribe, ScribeSettings};
use crate::sysex::SysexEvent;
use crate::vlq;
use crate::Text;
use log::{debug, trace};
use snafu::ResultExt;
use std::convert::TryFrom;
use std::io::{Read, Write};

const DEFAULT_TPQ: u16 = 48;

/// Whether a [`MidiFile`]'s events carry delta or absolute tick values.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimeState {
    Delta,
    Absolute,
}

/// Whether a [`MidiFile`]'s tracks are independent (split) or have been flattened into one
/// logical stream by [`MidiFile::join_tracks`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TrackState {
    Split,
    Joined,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct TickTime {
    tick: u32,
    seconds: f64,
}

/// The top-level object: a sequence of tracks, a time base, and the analytical passes (tempo
/// map, note-pair linking) that make an in-memory file useful for editing.
pub struct MidiFile {
    tracks: Vec<EventList>,
    format: Format,
    division: Division,
    time_state: TimeState,
    track_state: TrackState,
    tempo_map: Vec<TickTime>,
    tempo_map_valid: bool,
    rwstatus: bool,
    next_seq: u64,
}

impl Default for MidiFile {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiFile {
    /// A new file with one empty track at the default 48 ticks-per-quarter-note time base.
    pub fn new() -> Self {
        Self {
            tracks: vec![EventList::new()],
            format: Format::Multi,
            division: Division::QuarterNote(QuarterNoteDivision::new(DEFAULT_TPQ)),
            time_state: TimeState::Absolute,
            track_state: TrackState::Split,
            tempo_map: Vec::new(),
            tempo_map_valid: false,
            rwstatus: true,
            next_seq: 0,
        }
    }

    /// Reads a file from binary SMF, ASCII hex, base64, or BinASC text, sniffing which one `r`
    /// contains. Prefer [`MidiFile::read_hex`], [`MidiFile::read_base64`], or
    /// [`MidiFile::read_binasc`] when the encoding is already known.
    pub fn from_reader<R: Read>(mut r: R) -> crate::Result<Self> {
        let mut raw = Vec::new();
        r.read_to_end(&mut raw).context(wr!())?;
        let binary = crate::text_format::sniff_decode(&raw);
        Self::from_binary(&binary)
    }

    pub fn from_path<P: AsRef<std::path::Path>>(path: P) -> crate::Result<Self> {
        let file = std::fs::File::open(path).context(wr!())?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Reads a file whose contents are whitespace-separated ASCII hex, as produced by
    /// [`MidiFile::write_hex`].
    pub fn read_hex<R: Read>(mut r: R) -> crate::Result<Self> {
        let mut text = String::new();
        r.read_to_string(&mut text).context(wr!())?;
        let binary = crate::text_format::read_ascii_hex(&text)?;
        Self::from_binary(&binary)
    }

    /// Reads a file whose contents are base64, as produced by [`MidiFile::write_base64`].
    pub fn read_base64<R: Read>(mut r: R) -> crate::Result<Self> {
        let mut text = String::new();
        r.read_to_string(&mut text).context(wr!())?;
        let binary = crate::text_format::read_base64(&text)?;
        Self::from_binary(&binary)
    }

    /// Reads a file whose contents are BinASC notation, as produced by
    /// [`MidiFile::write_binasc`].
    pub fn read_binasc<R: Read>(mut r: R) -> crate::Result<Self> {
        let mut text = String::new();
        r.read_to_string(&mut text).context(wr!())?;
        let binary = crate::text_format::read_binasc(&text)?;
        Self::from_binary(&binary)
    }

    fn from_binary(binary: &[u8]) -> crate::Result<Self> {
        let mut iter = ByteIter::new(std::io::Cursor::new(binary).bytes()).context(io!())?;
        Ok(Self::parse(&mut iter)?)
    }

    /// True iff the most recent read or write completed without error.
    pub fn status(&self) -> bool {
        self.rwstatus
    }

    // ---- structure ----------------------------------------------------

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn track(&self, index: usize) -> Option<&EventList> {
        self.tracks.get(index)
    }

    pub fn track_mut(&mut self, index: usize) -> Option<&mut EventList> {
        self.tempo_map_valid = false;
        self.tracks.get_mut(index)
    }

    pub fn add_track(&mut self) -> usize {
        self.tracks.push(EventList::new());
        self.tracks.len() - 1
    }

    pub fn delete_track(&mut self, index: usize) -> crate::Result<()> {
        if index >= self.tracks.len() {
            state_violation!("track index {} out of range", index);
        }
        self.tracks.remove(index);
        self.tempo_map_valid = false;
        Ok(())
    }

    /// Moves every event from track `b` onto the end of track `a` and removes `b`. This is
    /// destructive: the moved events' `track` field is overwritten, so, unlike `join_tracks`,
    /// this cannot be undone by `split_tracks`.
    pub fn merge_tracks(&mut self, a: usize, b: usize) -> crate::Result<()> {
        if a >= self.tracks.len() || b >= self.tracks.len() {
            state_violation!("track index out of range in merge_tracks({}, {})", a, b);
        }
        if a == b {
            return Ok(());
        }
        let removed = self.tracks.remove(b);
        let a = if b < a { a - 1 } else { a };
        for mut event in removed.into_vec() {
            event.set_track(a as u32);
            self.tracks[a].push_raw(event);
        }
        self.tracks[a].sort();
        self.tempo_map_valid = false;
        Ok(())
    }

    // ---- time base ------------------------------------------------------

    pub fn tpq(&self) -> u16 {
        match self.division {
            Division::QuarterNote(q) => q.get(),
            Division::Smpte(_) => DEFAULT_TPQ,
        }
    }

    pub fn set_tpq(&mut self, tpq: u16) {
        self.division = Division::QuarterNote(QuarterNoteDivision::new(tpq));
        self.tempo_map_valid = false;
    }

    /// Sets a millisecond-resolution SMPTE time base (25 frames/sec, 40 subframes/frame).
    pub fn set_millisecond_tpq(&mut self) {
        use crate::division::{FrameRate, SmpteRate};
        self.division = Division::Smpte(SmpteRate::new(FrameRate::N25, 40));
        self.tempo_map_valid = false;
    }

    pub fn division(&self) -> &Division {
        &self.division
    }

    pub fn time_state(&self) -> TimeState {
        self.time_state
    }

    pub fn track_state(&self) -> TrackState {
        self.track_state
    }

    // ---- time-state conversion ------------------------------------------

    pub fn to_absolute_ticks(&mut self) {
        if self.time_state == TimeState::Absolute {
            return;
        }
        for track in &mut self.tracks {
            let mut running = 0u32;
            for event in track.iter_mut() {
                running = running.saturating_add(event.tick());
                event.set_tick(running);
            }
        }
        self.time_state = TimeState::Absolute;
    }

    pub fn to_delta_ticks(&mut self) {
        if self.time_state == TimeState::Delta {
            return;
        }
        for track in &mut self.tracks {
            let mut previous = 0u32;
            for event in track.iter_mut() {
                let tick = event.tick();
                event.set_tick(tick.saturating_sub(previous));
                previous = tick;
            }
        }
        self.time_state = TimeState::Delta;
    }

    // ---- sorting ----------------------------------------------------------

    pub fn sort_track(&mut self, index: usize) -> crate::Result<()> {
        if index >= self.tracks.len() {
            state_violation!("track index {} out of range", index);
        }
        self.tracks[index].sort();
        self.tempo_map_valid = false;
        Ok(())
    }

    pub fn sort_tracks(&mut self) {
        for track in &mut self.tracks {
            track.sort();
        }
        self.tempo_map_valid = false;
    }

    /// Assigns fresh, ascending sequence ordinals to every event, per track, in its current
    /// order. The counterpart to [`MidiFile::clear_sequence`]: restores tie-break stability
    /// after it's been zeroed out.
    pub fn mark_sequence(&mut self) {
        for track in &mut self.tracks {
            for (seq, event) in track.iter_mut().enumerate() {
                event.set_seq(seq as u64);
            }
        }
    }

    pub fn clear_sequence(&mut self) {
        for track in &mut self.tracks {
            for event in track.iter_mut() {
                event.clear_sequence();
            }
        }
    }

    // ---- note pairing -------------------------------------------------------

    /// Links every note-on to its matching note-off (or zero-velocity note-on) within each
    /// track, walking in absolute-tick order. Requires `time_state == Absolute`.
    pub fn link_note_pairs(&mut self) -> crate::Result<()> {
        if self.time_state != TimeState::Absolute {
            state_violation!("link_note_pairs requires absolute tick time");
        }
        for track in &mut self.tracks {
            let events = track.clone().into_vec();
            let mut stacks: std::collections::HashMap<(u8, u8), Vec<usize>> =
                std::collections::HashMap::new();
            let mut linked: Vec<Option<usize>> = vec![None; events.len()];
            for (i, event) in events.iter().enumerate() {
                if let Event::Midi(Message::NoteOn(n)) = event.event() {
                    if n.velocity().get() > 0 {
                        stacks
                            .entry((n.channel().get(), n.note_number().get()))
                            .or_default()
                            .push(i);
                        continue;
                    }
                }
                if event.is_note_off() {
                    let key = note_off_key(event);
                    if let Some(key) = key {
                        if let Some(stack) = stacks.get_mut(&key) {
                            if let Some(on_index) = stack.pop() {
                                linked[on_index] = Some(i);
                                linked[i] = Some(on_index);
                            }
                        }
                    }
                }
            }
            let mut list = EventList::from_vec(events);
            for (i, link) in linked.into_iter().enumerate() {
                if let Some(event) = list.get_mut(i) {
                    event.set_linked_index(link);
                }
            }
            *track = list;
        }
        Ok(())
    }

    pub fn clear_links(&mut self) {
        for track in &mut self.tracks {
            for event in track.iter_mut() {
                event.set_linked_index(None);
            }
        }
    }

    // ---- tempo map ----------------------------------------------------------

    /// Rebuilds the tick-to-seconds tempo map by joining the file (internally, restoring the
    /// prior track/time state afterward) and walking its events in absolute-tick order.
    pub fn do_time_analysis(&mut self) {
        let saved_track_state = self.track_state;
        let saved_time_state = self.time_state;

        self.to_absolute_ticks();
        self.join_tracks();

        let tpq = self.tpq().max(1);
        let mut tempo_map = Vec::new();
        let mut last_tick = 0u32;
        let mut tick_init = false;
        let mut last_seconds = 0f64;
        let mut seconds_per_tick = MicrosecondsPerQuarter::default().seconds_per_tick(tpq);

        if let Some(track) = self.tracks.first() {
            for event in track.iter() {
                let cur_tick = event.tick();
                if cur_tick > last_tick || !tick_init {
                    tick_init = true;
                    let cur_seconds =
                        last_seconds + f64::from(cur_tick - last_tick) * seconds_per_tick;
                    tempo_map.push(TickTime {
                        tick: cur_tick,
                        seconds: cur_seconds,
                    });
                    last_tick = cur_tick;
                    last_seconds = cur_seconds;
                }
                if let Event::Meta(MetaEvent::SetTempo(mpq)) = event.event() {
                    seconds_per_tick = mpq.seconds_per_tick(tpq);
                }
            }
        }

        self.tempo_map = tempo_map;
        self.tempo_map_valid = true;

        if saved_track_state == TrackState::Split {
            self.split_tracks();
        }
        if saved_time_state == TimeState::Delta {
            self.to_delta_ticks();
        }
    }

    fn ensure_tempo_map(&mut self) {
        if !self.tempo_map_valid {
            self.do_time_analysis();
        }
    }

    /// Seconds elapsed at `tick`, interpolating between tempo-map entries as needed.
    pub fn time_in_seconds(&mut self, tick: u32) -> f64 {
        self.ensure_tempo_map();
        seconds_at_tick(&self.tempo_map, tick)
    }

    /// The tick nearest `seconds`, interpolating between tempo-map entries as needed. Returns
    /// a negative sentinel (-1.0) if the tempo map is empty.
    pub fn tick_at_seconds(&mut self, seconds: f64) -> f64 {
        self.ensure_tempo_map();
        if self.tempo_map.is_empty() {
            return -1.0;
        }
        tick_at_seconds(&self.tempo_map, seconds)
    }

    pub fn max_tick(&self) -> u32 {
        self.tracks
            .iter()
            .flat_map(|t| t.iter())
            .map(|e| e.tick())
            .max()
            .unwrap_or(0)
    }

    pub fn file_duration_in_ticks(&self) -> u32 {
        self.max_tick()
    }

    pub fn file_duration_in_seconds(&mut self) -> f64 {
        let tick = self.max_tick();
        self.time_in_seconds(tick)
    }

    pub fn file_duration_in_quarters(&self) -> f64 {
        f64::from(self.max_tick()) / f64::from(self.tpq().max(1))
    }

    // ---- join / split -------------------------------------------------------

    /// Flattens all tracks into track 0 (converting to absolute ticks first, then sorting).
    /// Each event retains its original `track` field so `split_tracks` can restore the layout.
    pub fn join_tracks(&mut self) {
        if self.track_state == TrackState::Joined {
            return;
        }
        self.to_absolute_ticks();
        let mut all: Vec<MidiEvent> = Vec::new();
        for track in self.tracks.drain(..) {
            all.extend(track.into_vec());
        }
        let mut joined = EventList::from_vec(all);
        joined.sort();
        self.tracks = vec![joined];
        self.track_state = TrackState::Joined;
    }

    /// Restores the per-track layout from a prior `join_tracks`, using each event's `track`
    /// field. A no-op if the file is already split.
    pub fn split_tracks(&mut self) {
        if self.track_state == TrackState::Split {
            return;
        }
        let joined = match self.tracks.pop() {
            Some(t) => t,
            None => return,
        };
        let max_track = joined
            .iter()
            .map(|e| e.track())
            .max()
            .unwrap_or(0) as usize;
        let mut tracks: Vec<EventList> = (0..=max_track).map(|_| EventList::new()).collect();
        for event in joined.into_vec() {
            let idx = event.track() as usize;
            tracks[idx].push_raw(event);
        }
        self.tracks = tracks;
        self.track_state = TrackState::Split;
    }

    /// Creates one track per distinct MIDI channel found among channel-voice events (plus a
    /// track 0 carrying all non-channel-voice events), re-homing each channel-voice event's
    /// `track` field to its channel's track. Operates on a joined copy internally.
    pub fn split_tracks_by_channel(&mut self) {
        self.join_tracks();
        let joined = self.tracks.pop().unwrap_or_default();

        let mut channels: Vec<u8> = joined
            .iter()
            .filter_map(|e| match e.event() {
                Event::Midi(m) => Some(m.channel().get()),
                _ => None,
            })
            .collect();
        channels.sort_unstable();
        channels.dedup();

        let mut tracks: Vec<EventList> = vec![EventList::new()];
        let mut channel_track: std::collections::HashMap<u8, usize> =
            std::collections::HashMap::new();
        for ch in channels {
            channel_track.insert(ch, tracks.len());
            tracks.push(EventList::new());
        }

        for mut event in joined.into_vec() {
            let track_index = match event.event() {
                Event::Midi(m) => *channel_track.get(&m.channel().get()).unwrap_or(&0),
                _ => 0,
            };
            event.set_track(track_index as u32);
            tracks[track_index].push_raw(event);
        }
        for track in &mut tracks {
            track.sort();
        }
        self.tracks = tracks;
        self.track_state = TrackState::Split;
        self.tempo_map_valid = false;
    }

    // ---- event insertion ------------------------------------------------

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub fn add_event(&mut self, track: usize, tick: u32, event: Event) -> crate::Result<()> {
        if track >= self.tracks.len() {
            state_violation!("track index {} out of range", track);
        }
        let seq = self.next_seq();
        let midi_event = MidiEvent::new(tick, track as u32, seq, event);
        self.tracks[track].push_raw(midi_event);
        self.tempo_map_valid = false;
        Ok(())
    }

    pub fn add_note_on(
        &mut self,
        track: usize,
        tick: u32,
        channel: Channel,
        note_number: NoteNumber,
        velocity: Velocity,
    ) -> crate::Result<()> {
        let event = Event::Midi(Message::NoteOn(NoteMessage::new(channel, note_number, velocity)));
        self.add_event(track, tick, event)
    }

    pub fn add_note_off(
        &mut self,
        track: usize,
        tick: u32,
        channel: Channel,
        note_number: NoteNumber,
        velocity: Velocity,
    ) -> crate::Result<()> {
        let event = Event::Midi(Message::NoteOff(NoteMessage::new(channel, note_number, velocity)));
        self.add_event(track, tick, event)
    }

    pub fn add_controller(
        &mut self,
        track: usize,
        tick: u32,
        channel: Channel,
        control: crate::message::Control,
        value: crate::numbers::ControlValue,
    ) -> crate::Result<()> {
        use crate::message::ControlChangeValue;
        let event = Event::Midi(Message::Control(ControlChangeValue::new(channel, control, value)));
        self.add_event(track, tick, event)
    }

    pub fn add_patch_change(
        &mut self,
        track: usize,
        tick: u32,
        channel: Channel,
        program: crate::numbers::Program,
    ) -> crate::Result<()> {
        let event = Event::Midi(Message::ProgramChange(ProgramChangeValue::new(channel, program)));
        self.add_event(track, tick, event)
    }

    pub fn add_pitch_bend(
        &mut self,
        track: usize,
        tick: u32,
        channel: Channel,
        value: crate::numbers::PitchBendValue,
    ) -> crate::Result<()> {
        use crate::message::PitchBendValueMessage;
        let event = Event::Midi(Message::PitchBend(PitchBendValueMessage::new(channel, value)));
        self.add_event(track, tick, event)
    }

    /// Builds a pitch bend from a `-1.0..=1.0` deviation, clamping on overflow. `0.0` maps to
    /// the 8192 centre value.
    pub fn add_pitch_bend_amount(
        &mut self,
        track: usize,
        tick: u32,
        channel: Channel,
        amount: f64,
    ) -> crate::Result<()> {
        let clamped = amount.clamp(-1.0, 1.0);
        let raw = ((clamped + 1.0) * 8192.0).round().clamp(0.0, 16383.0) as u16;
        self.add_pitch_bend(track, tick, channel, crate::numbers::PitchBendValue::new(raw))
    }

    pub fn add_tempo(
        &mut self,
        track: usize,
        tick: u32,
        quarters_per_minute: QuartersPerMinute,
    ) -> crate::Result<()> {
        let minutes_per_quarter = 1f64 / f64::from(quarters_per_minute.get());
        let microseconds_per_quarter = minutes_per_quarter * 60f64 * 1_000_000f64;
        let event = Event::Meta(MetaEvent::SetTempo(MicrosecondsPerQuarter::new(
            microseconds_per_quarter as u32,
        )));
        self.add_event(track, tick, event)?;
        self.tempo_map_valid = false;
        Ok(())
    }

    pub fn add_time_signature(
        &mut self,
        track: usize,
        tick: u32,
        numerator: u8,
        denominator: crate::duration_name::DurationName,
        click: crate::clocks::Clocks,
    ) -> crate::Result<()> {
        let value = match TimeSignatureValue::new(numerator, denominator, click) {
            Ok(v) => v,
            Err(_) => invalid_parameter!("invalid time signature parameters"),
        };
        self.add_event(track, tick, Event::Meta(MetaEvent::TimeSignature(value)))
    }

    pub fn add_key_signature(
        &mut self,
        track: usize,
        tick: u32,
        value: crate::meta_event::KeySignatureValue,
    ) -> crate::Result<()> {
        self.add_event(track, tick, Event::Meta(MetaEvent::KeySignature(value)))
    }

    pub fn add_text<S: Into<String>>(&mut self, track: usize, tick: u32, text: S) -> crate::Result<()> {
        self.add_event(track, tick, Event::Meta(MetaEvent::OtherText(Text::new(text))))
    }

    pub fn add_lyric<S: Into<String>>(&mut self, track: usize, tick: u32, text: S) -> crate::Result<()> {
        self.add_event(track, tick, Event::Meta(MetaEvent::Lyric(Text::new(text))))
    }

    pub fn add_track_name<S: Into<String>>(
        &mut self,
        track: usize,
        tick: u32,
        name: S,
    ) -> crate::Result<()> {
        self.add_event(track, tick, Event::Meta(MetaEvent::TrackName(Text::new(name))))
    }

    pub fn add_marker<S: Into<String>>(&mut self, track: usize, tick: u32, name: S) -> crate::Result<()> {
        self.add_event(track, tick, Event::Meta(MetaEvent::Marker(Text::new(name))))
    }

    pub fn add_copyright<S: Into<String>>(&mut self, track: usize, tick: u32, text: S) -> crate::Result<()> {
        self.add_event(track, tick, Event::Meta(MetaEvent::Copyright(Text::new(text))))
    }

    pub fn add_instrument_name<S: Into<String>>(
        &mut self,
        track: usize,
        tick: u32,
        name: S,
    ) -> crate::Result<()> {
        self.add_event(
            track,
            tick,
            Event::Meta(MetaEvent::InstrumentName(Text::new(name))),
        )
    }

    pub fn add_cue<S: Into<String>>(&mut self, track: usize, tick: u32, text: S) -> crate::Result<()> {
        self.add_event(track, tick, Event::Meta(MetaEvent::CuePoint(Text::new(text))))
    }

    pub fn add_sysex(&mut self, track: usize, tick: u32, sysex: SysexEvent) -> crate::Result<()> {
        self.add_event(track, tick, Event::Sysex(sysex))
    }

    /// Inserts a MIDI Tuning Standard type-2 (per-key) real-time tuning change.
    pub fn add_mts2(&mut self, track: usize, tick: u32, change: &crate::tuning::TuningNoteChange) -> crate::Result<()> {
        self.add_sysex(track, tick, change.build())
    }

    /// Inserts a MIDI Tuning Standard type-9 two-byte octave/scale tuning dump.
    pub fn add_mts9(&mut self, track: usize, tick: u32, dump: &crate::tuning::ScaleTuningDump) -> crate::Result<()> {
        self.add_sysex(track, tick, dump.build())
    }

    /// Inserts a MIDI Tuning Standard type-9 one-byte octave/scale tuning dump.
    pub fn add_mts9_1byte(
        &mut self,
        track: usize,
        tick: u32,
        dump: &crate::tuning::ScaleTuningDump1Byte,
    ) -> crate::Result<()> {
        self.add_sysex(track, tick, dump.build())
    }

    // ---- parsing / serialising ------------------------------------------

    pub(crate) fn parse<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Self> {
        let parse_result = Self::parse_inner(iter);
        match parse_result {
            Ok(mut file) => {
                file.rwstatus = true;
                Ok(file)
            }
            Err(e) => Err(e),
        }
    }

    fn parse_inner<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Self> {
        let (header, ntracks) = Header::parse(iter)?;
        let mut tracks = Vec::with_capacity(ntracks as usize);
        for track_ix in 0..ntracks {
            let events = parse_track(iter, track_ix as u32)?;
            tracks.push(events);
        }
        if tracks.is_empty() {
            tracks.push(EventList::new());
        }
        let next_seq = tracks
            .iter()
            .flat_map(|t| t.iter())
            .map(|e| e.seq())
            .max()
            .map_or(0, |m| m + 1);
        Ok(Self {
            tracks,
            format: *header.format(),
            division: *header.division(),
            time_state: TimeState::Absolute,
            track_state: TrackState::Split,
            tempo_map: Vec::new(),
            tempo_map_valid: false,
            rwstatus: true,
            next_seq,
        })
    }

    pub fn write<W: Write>(&mut self, w: W) -> crate::Result<()> {
        let saved_time_state = self.time_state;
        self.to_delta_ticks();
        let result = self.write_inner(w);
        if saved_time_state == TimeState::Absolute {
            self.to_absolute_ticks();
        } else {
            self.time_state = TimeState::Delta;
        }
        self.rwstatus = result.is_ok();
        result
    }

    fn write_inner<W: Write>(&self, w: W) -> crate::Result<()> {
        let format = if self.tracks.len() == 1 {
            Format::Single
        } else {
            self.format
        };
        let header = Header::new(format, self.division);
        let mut scribe = Scribe::new(w, ScribeSettings { running_status: false });
        header.write(&mut scribe, self.tracks.len() as u16)?;
        for track in &self.tracks {
            write_track(&mut scribe, track)?;
        }
        Ok(())
    }

    pub fn write_hex<W: Write>(&mut self, w: W, width: usize) -> crate::Result<()> {
        let mut buf = Vec::new();
        self.write(&mut buf)?;
        Ok(crate::text_format::write_ascii_hex(&buf, w, width)?)
    }

    pub fn write_base64<W: Write>(&mut self, w: W, wrap: Option<usize>) -> crate::Result<()> {
        let mut buf = Vec::new();
        self.write(&mut buf)?;
        Ok(crate::text_format::write_base64(&buf, w, wrap)?)
    }

    pub fn write_binasc<W: Write>(&mut self, w: W, with_comments: bool) -> crate::Result<()> {
        let mut buf = Vec::new();
        self.write(&mut buf)?;
        Ok(crate::text_format::write_binasc(&buf, w, with_comments)?)
    }
}

fn note_off_key(event: &MidiEvent) -> Option<(u8, u8)> {
    match event.event() {
        Event::Midi(Message::NoteOff(n)) => Some((n.channel().get(), n.note_number().get())),
        Event::Midi(Message::NoteOn(n)) if n.velocity().get() == 0 => {
            Some((n.channel().get(), n.note_number().get()))
        }
        _ => None,
    }
}

fn seconds_at_tick(map: &[TickTime], tick: u32) -> f64 {
    if map.is_empty() {
        return 0.0;
    }
    match map.binary_search_by_key(&tick, |t| t.tick) {
        Ok(i) => map[i].seconds,
        Err(0) => {
            let first = map[0];
            if first.tick == 0 {
                first.seconds
            } else {
                // extrapolate backward using the first segment's rate, or just clamp to entry.
                first.seconds
            }
        }
        Err(i) if i >= map.len() => map[map.len() - 1].seconds,
        Err(i) => {
            let a = map[i - 1];
            let b = map[i];
            let span_ticks = f64::from(b.tick - a.tick);
            let span_seconds = b.seconds - a.seconds;
            let rate = if span_ticks > 0.0 {
                span_seconds / span_ticks
            } else {
                0.0
            };
            a.seconds + f64::from(tick - a.tick) * rate
        }
    }
}

fn tick_at_seconds(map: &[TickTime], seconds: f64) -> f64 {
    match map.binary_search_by(|t| t.seconds.partial_cmp(&seconds).unwrap()) {
        Ok(i) => f64::from(map[i].tick),
        Err(0) => f64::from(map[0].tick),
        Err(i) if i >= map.len() => f64::from(map[map.len() - 1].tick),
        Err(i) => {
            let a = map[i - 1];
            let b = map[i];
            let span_seconds = b.seconds - a.seconds;
            let span_ticks = f64::from(b.tick - a.tick);
            let rate = if span_seconds > 0.0 {
                span_ticks / span_seconds
            } else {
                0.0
            };
            f64::from(a.tick) + (seconds - a.seconds) * rate
        }
    }
}

fn parse_track<R: Read>(iter: &mut ByteIter<R>, track_ix: u32) -> LibResult<EventList> {
    iter.expect_tag("MTrk").context(io!())?;
    let chunk_length = iter.read_u32().context(io!())?;
    iter.set_size_limit(chunk_length as u64);
    let mut events = EventList::new();
    let mut tick = 0u32;
    let mut seq = 0u64;
    loop {
        if iter.is_end() {
            log::warn!(
                "track {}: declared chunk length reached before an EndOfTrack event; \
                 treating track as complete with {} event(s) parsed",
                track_ix,
                events.size()
            );
            break;
        }
        let wire_event = crate::event::TrackEvent::parse(iter)?;
        tick = tick.saturating_add(wire_event.delta_time());
        trace!("parsed event at tick {}", tick);
        let is_end = wire_event.is_end();
        events.push_raw(MidiEvent::new(tick, track_ix, seq, wire_event.event().clone()));
        seq += 1;
        if is_end {
            debug!("end of track event");
            if !iter.is_end() {
                log::warn!(
                    "track {}: declared chunk length extends past its EndOfTrack event; \
                     skipping the remaining bytes",
                    track_ix
                );
                while !iter.is_end() {
                    iter.read().context(io!())?;
                }
            }
            break;
        }
    }
    iter.clear_size_limit();
    Ok(events)
}

fn write_track<W: Write>(w: &mut Scribe<W>, track: &EventList) -> LibResult<()> {
    w.write_all(b"MTrk").context(wr!())?;

    let mut track_data: Vec<u8> = Vec::new();
    let mut track_scribe = Scribe::new(&mut track_data, ScribeSettings { running_status: false });

    let mut previous_tick = 0u32;
    let mut wrote_end = false;
    for event in track.iter() {
        let delta = event.tick().saturating_sub(previous_tick);
        previous_tick = event.tick();
        let delta_bytes = vlq::encode_u32(delta).map_err(|e| invalid_vlv!(e))?;
        track_scribe.write_all(&delta_bytes).context(wr!())?;
        event.event().write(&mut track_scribe)?;
        if event.is_end_of_track() {
            wrote_end = true;
        }
    }
    if !wrote_end {
        track_scribe.write_all(&[0]).context(wr!())?;
        MetaEvent::EndOfTrack.write(&mut track_scribe)?;
    }

    let track_length = u32::try_from(track_data.len()).context(error::TrackTooLong { site: site!() })?;
    w.write_all(&track_length.to_be_bytes()).context(wr!())?;
    w.write_all(&track_data).context(wr!())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_write_matches_spec_bytes() {
        let mut file = MidiFile::new();
        let mut buf = Vec::new();
        file.write(&mut buf).unwrap();
        let expected = [
            0x4D, 0x54, 0x68, 0x64, 0x00, 0x00, 0x00, 0x06, 0x00, 0x00, 0x00, 0x01, 0x00, 0x30,
            0x4D, 0x54, 0x72, 0x6B, 0x00, 0x00, 0x00, 0x04, 0x00, 0xFF, 0x2F, 0x00,
        ];
        assert_eq!(&expected[..], &buf[..]);
    }

    #[test]
    fn write_then_read_round_trips_note() {
        let mut file = MidiFile::new();
        file.add_note_on(0, 0, Channel::new(0), NoteNumber::new(60), Velocity::new(64))
            .unwrap();
        file.add_note_off(0, 120, Channel::new(0), NoteNumber::new(60), Velocity::new(0))
            .unwrap();
        file.sort_tracks();
        let mut buf = Vec::new();
        file.write(&mut buf).unwrap();

        let read_back = MidiFile::from_reader(std::io::Cursor::new(buf)).unwrap();
        assert_eq!(1, read_back.track_count());
        let events: Vec<_> = read_back.track(0).unwrap().iter().collect();
        assert_eq!(3, events.len());
        assert_eq!(0, events[0].tick());
        assert_eq!(120, events[1].tick());
        assert!(events[2].is_end_of_track());
    }

    #[test]
    fn tempo_map_matches_spec_scenario() {
        let mut file = MidiFile::new();
        file.set_tpq(120);
        file.add_tempo(0, 0, QuartersPerMinute::new(120)).unwrap();
        file.add_note_on(0, 240, Channel::new(0), NoteNumber::new(60), Velocity::new(64))
            .unwrap();
        file.sort_tracks();
        let seconds = file.time_in_seconds(240);
        assert!((seconds - 1.0).abs() < 1e-9);

        file.add_tempo(0, 120, QuartersPerMinute::new(240)).unwrap();
        file.sort_tracks();
        file.do_time_analysis();
        let seconds = file.time_in_seconds(240);
        assert!((seconds - 0.75).abs() < 1e-9);
    }

    #[test]
    fn link_note_pairs_links_on_and_off() {
        let mut file = MidiFile::new();
        file.add_note_on(0, 0, Channel::new(0), NoteNumber::new(64), Velocity::new(100))
            .unwrap();
        file.add_note_off(0, 50, Channel::new(0), NoteNumber::new(64), Velocity::new(0))
            .unwrap();
        file.sort_tracks();
        file.link_note_pairs().unwrap();
        let track = file.track(0).unwrap();
        let on = track.get(0).unwrap();
        let off = track.get(1).unwrap();
        assert_eq!(Some(1), on.linked_index());
        assert_eq!(Some(0), off.linked_index());
    }

    #[test]
    fn join_then_split_is_identity() {
        let mut file = MidiFile::new();
        file.add_track();
        file.add_note_on(0, 0, Channel::new(0), NoteNumber::new(60), Velocity::new(64))
            .unwrap();
        file.add_note_on(1, 0, Channel::new(1), NoteNumber::new(62), Velocity::new(64))
            .unwrap();
        file.sort_tracks();
        let before: Vec<Vec<u32>> = file
            .tracks
            .iter()
            .map(|t| t.iter().map(|e| e.tick()).collect())
            .collect();
        file.join_tracks();
        file.split_tracks();
        let after: Vec<Vec<u32>> = file
            .tracks
            .iter()
            .map(|t| t.iter().map(|e| e.tick()).collect())
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn mark_sequence_restores_ascending_order_after_clear() {
        let mut file = MidiFile::new();
        file.add_note_on(0, 0, Channel::new(0), NoteNumber::new(60), Velocity::new(64))
            .unwrap();
        file.add_note_on(0, 0, Channel::new(0), NoteNumber::new(64), Velocity::new(64))
            .unwrap();
        file.clear_sequence();
        assert!(file.track(0).unwrap().iter().all(|e| e.seq() == 0));
        file.mark_sequence();
        let seqs: Vec<u64> = file.track(0).unwrap().iter().map(|e| e.seq()).collect();
        assert_eq!(seqs, (0..seqs.len() as u64).collect::<Vec<_>>());
    }

    #[test]
    fn write_hex_then_read_hex_round_trips() {
        let mut file = MidiFile::new();
        file.add_note_on(0, 0, Channel::new(0), NoteNumber::new(60), Velocity::new(64))
            .unwrap();
        file.sort_tracks();
        let mut buf = Vec::new();
        file.write_hex(&mut buf, 0).unwrap();

        let read_back = MidiFile::read_hex(std::io::Cursor::new(buf.clone())).unwrap();
        assert_eq!(1, read_back.track_count());

        let sniffed = MidiFile::from_reader(std::io::Cursor::new(buf)).unwrap();
        assert_eq!(1, sniffed.track_count());
    }

    #[test]
    fn write_base64_then_from_reader_sniffs_it() {
        let mut file = MidiFile::new();
        file.add_note_on(0, 0, Channel::new(0), NoteNumber::new(60), Velocity::new(64))
            .unwrap();
        file.sort_tracks();
        let mut buf = Vec::new();
        file.write_base64(&mut buf, Some(40)).unwrap();

        let read_back = MidiFile::from_reader(std::io::Cursor::new(buf)).unwrap();
        assert_eq!(1, read_back.track_count());
    }

    #[test]
    fn declared_chunk_length_shorter_than_events_warns_and_stops() {
        // Chunk length of 0 with a real event and EndOfTrack following: the parser should hit
        // its size limit before ever seeing an event, warn, and return an empty track instead
        // of erroring.
        let mut bytes = b"MTrk".to_vec();
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]); // delta 0, EndOfTrack
        let cursor = std::io::Cursor::new(bytes);
        let mut iter = ByteIter::new(cursor.bytes()).unwrap();
        let events = parse_track(&mut iter, 0).unwrap();
        assert_eq!(0, events.size());
    }

    #[test]
    fn declared_chunk_length_longer_than_events_warns_and_skips_remainder() {
        // EndOfTrack arrives before the declared chunk length is exhausted: the parser should
        // warn, skip the trailing padding, and still return the parsed events.
        let mut track_data = vec![0x00, 0xFF, 0x2F, 0x00]; // delta 0, EndOfTrack
        track_data.extend_from_slice(&[0x00, 0x00, 0x00]); // bogus trailing padding
        let mut bytes = b"MTrk".to_vec();
        bytes.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&track_data);
        let cursor = std::io::Cursor::new(bytes);
        let mut iter = ByteIter::new(cursor.bytes()).unwrap();
        let events = parse_track(&mut iter, 0).unwrap();
        assert_eq!(1, events.size());
        assert!(events.get(0).unwrap().is_end_of_track());
    }
}
