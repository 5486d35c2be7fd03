//! Newtypes for the small numeric ranges that MIDI byte values are restricted to. All of these
//! silently clamp out-of-range values rather than erroring, since that is how a DAW or hardware
//! device would typically behave when handed a bad value to write.

clamp!(Channel, u8, 0, 15, 0, pub);
clamp!(NoteNumber, u8, 0, 127, 60, pub);
clamp!(Velocity, u8, 0, 127, 72, pub);
clamp!(Program, u8, 0, 127, 0, pub);
clamp!(U7, u8, 0, 127, 0, pub);
clamp!(ControlValue, u8, 0, 127, 0, pub);
clamp!(PortValue, u8, 0, 15, 0, pub);
clamp!(PitchBendValue, u16, 0, 16383, 8192, pub);
