mod utils;

use midi_file::{Channel, Event, Message, MidiFile, NoteNumber, Velocity};
use utils::enable_logging;

/// S2: a two-track C major scale round-trips through write/read with every note-on linked to its
/// matching note-off.
#[test]
fn two_track_scale_round_trips_and_links_notes() {
    enable_logging();
    let mut file = MidiFile::new();
    file.set_tpq(120);
    file.add_track();

    let scale = [60u8, 62, 64, 65, 67, 69, 71, 72];
    let mut tick = 0u32;
    for &key in &scale {
        file.add_note_on(0, tick, Channel::new(0), NoteNumber::new(key), Velocity::new(64))
            .unwrap();
        file.add_note_off(0, tick + 120, Channel::new(0), NoteNumber::new(key), Velocity::new(0))
            .unwrap();
        tick += 120;
    }
    for (i, &key) in scale.iter().enumerate() {
        let t = i as u32 * 120;
        file.add_note_on(1, t, Channel::new(1), NoteNumber::new(key + 12), Velocity::new(80))
            .unwrap();
        file.add_note_off(1, t + 120, Channel::new(1), NoteNumber::new(key + 12), Velocity::new(0))
            .unwrap();
    }

    file.sort_tracks();
    file.link_note_pairs().unwrap();

    for track_ix in 0..2 {
        let track = file.track(track_ix).unwrap();
        for i in (0..scale.len() * 2).step_by(2) {
            let on = track.get(i).unwrap();
            let off = track.get(i + 1).unwrap();
            assert_eq!(Some(i + 1), on.linked_index());
            assert_eq!(Some(i), off.linked_index());
        }
    }

    let mut bytes = Vec::new();
    file.write(&mut bytes).unwrap();
    let read_back = MidiFile::from_reader(std::io::Cursor::new(bytes)).unwrap();
    assert_eq!(2, read_back.track_count());

    for track_ix in 0..2 {
        let original: Vec<(u32, &Event)> = file
            .track(track_ix)
            .unwrap()
            .iter()
            .filter(|e| !e.is_end_of_track())
            .map(|e| (e.tick(), e.event()))
            .collect();
        let reloaded: Vec<(u32, &Event)> = read_back
            .track(track_ix)
            .unwrap()
            .iter()
            .filter(|e| !e.is_end_of_track())
            .map(|e| (e.tick(), e.event()))
            .collect();
        assert_eq!(original, reloaded);
    }
}

/// S4: running-status decode. `00 90 3C 40 10 3C 00` is a note-on velocity 64 at tick 0 followed
/// by a zero-velocity note-on (a note-off in disguise) at tick 16, both on channel 0 key 60,
/// sharing the first event's status byte.
#[test]
fn running_status_decodes_to_two_events() {
    enable_logging();
    let mut track_body = vec![0x00, 0x90, 0x3C, 0x40, 0x10, 0x3C, 0x00];
    track_body.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]); // end of track

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"MThd");
    bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x06]);
    bytes.extend_from_slice(&[0x00, 0x00]); // format 0
    bytes.extend_from_slice(&[0x00, 0x01]); // 1 track
    bytes.extend_from_slice(&[0x00, 0x30]); // tpq 48
    bytes.extend_from_slice(b"MTrk");
    bytes.extend_from_slice(&(track_body.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&track_body);

    let file = MidiFile::from_reader(std::io::Cursor::new(bytes)).unwrap();
    let track = file.track(0).unwrap();

    let first = track.get(0).unwrap();
    assert_eq!(0, first.tick());
    assert!(first.is_note_on());
    match first.event() {
        Event::Midi(Message::NoteOn(n)) => {
            assert_eq!(0, n.channel().get());
            assert_eq!(60, n.note_number().get());
            assert_eq!(64, n.velocity().get());
        }
        other => panic!("wrong event: {:?}", other),
    }

    let second = track.get(1).unwrap();
    assert_eq!(16, second.tick());
    assert!(second.is_note_off());
}

/// A truncated MThd chunk is rejected rather than silently accepted.
#[test]
fn truncated_header_is_rejected() {
    enable_logging();
    let bytes = vec![0x4D, 0x54, 0x68, 0x64, 0x00, 0x00];
    assert!(MidiFile::from_reader(std::io::Cursor::new(bytes)).is_err());
}
