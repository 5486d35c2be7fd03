//! Human-readable encodings of a serialised file's raw bytes: whitespace-separated ASCII hex,
//! standard base64, and a line-oriented BinASC notation modelled on the textual dump format some
//! MIDI tools use for diffable, hand-editable fixtures.

use crate::error::{self, LibResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use snafu::{OptionExt, ResultExt};
use std::io::Write;

/// Writes `data` as two-digit uppercase hex pairs separated by spaces, wrapping to a new line
/// every `width` bytes (a `width` of `0` means one line).
pub(crate) fn write_ascii_hex<W: Write>(data: &[u8], mut w: W, width: usize) -> LibResult<()> {
    for (i, byte) in data.iter().enumerate() {
        if width > 0 && i > 0 && i % width == 0 {
            writeln!(w).context(wr!())?;
        } else if i > 0 {
            write!(w, " ").context(wr!())?;
        }
        write!(w, "{:02X}", byte).context(wr!())?;
    }
    writeln!(w).context(wr!())?;
    Ok(())
}

/// Writes `data` as standard-alphabet base64, optionally wrapping at `wrap` characters per line.
pub(crate) fn write_base64<W: Write>(data: &[u8], mut w: W, wrap: Option<usize>) -> LibResult<()> {
    let encoded = STANDARD.encode(data);
    match wrap {
        None | Some(0) => {
            writeln!(w, "{}", encoded).context(wr!())?;
        }
        Some(width) => {
            for chunk in encoded.as_bytes().chunks(width) {
                let line = std::str::from_utf8(chunk).unwrap_or_default();
                writeln!(w, "{}", line).context(wr!())?;
            }
        }
    }
    Ok(())
}

/// Writes `data` in BinASC notation: one hex byte per token, printable ASCII runs rendered as
/// `"..."` string literals, optionally preceded by an `; offset N` comment every 16 bytes.
pub(crate) fn write_binasc<W: Write>(data: &[u8], mut w: W, with_comments: bool) -> LibResult<()> {
    const BYTES_PER_LINE: usize = 16;
    for (line_num, chunk) in data.chunks(BYTES_PER_LINE).enumerate() {
        if with_comments {
            writeln!(w, "; offset {}", line_num * BYTES_PER_LINE).context(wr!())?;
        }
        let mut tokens = Vec::with_capacity(chunk.len());
        let mut run = String::new();
        for &byte in chunk {
            if byte.is_ascii_graphic() || byte == b' ' {
                run.push(byte as char);
            } else {
                flush_run(&mut run, &mut tokens);
                tokens.push(format!("{:02x}", byte));
            }
        }
        flush_run(&mut run, &mut tokens);
        writeln!(w, "{}", tokens.join(" ")).context(wr!())?;
    }
    Ok(())
}

fn flush_run(run: &mut String, tokens: &mut Vec<String>) {
    if !run.is_empty() {
        tokens.push(format!("\"{}\"", run));
        run.clear();
    }
}

/// Decodes whitespace-separated two-digit hex byte pairs, the inverse of [`write_ascii_hex`].
pub(crate) fn read_ascii_hex(text: &str) -> LibResult<Vec<u8>> {
    text.split_whitespace()
        .map(|token| {
            u8::from_str_radix(token, 16)
                .ok()
                .context(error::WrongKind {
                    site: site!(),
                    description: format!("invalid ascii-hex byte '{}'", token),
                })
        })
        .collect()
}

/// Decodes standard-alphabet base64, the inverse of [`write_base64`]. Lines are joined before
/// decoding so a wrapped encoding round-trips.
pub(crate) fn read_base64(text: &str) -> LibResult<Vec<u8>> {
    let joined: String = text.split_whitespace().collect();
    STANDARD.decode(joined.as_bytes()).ok().context(error::WrongKind {
        site: site!(),
        description: "invalid base64 text".to_string(),
    })
}

/// Decodes BinASC notation, the inverse of [`write_binasc`]: `"..."` string literals become their
/// ASCII bytes, bare two-digit hex tokens become single bytes, and `;`-prefixed lines are skipped.
pub(crate) fn read_binasc(text: &str) -> LibResult<Vec<u8>> {
    let mut out = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        for token in tokenize_binasc_line(line) {
            if let Some(inner) = token.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
                out.extend(inner.bytes());
            } else {
                let byte = u8::from_str_radix(&token, 16).ok().context(error::WrongKind {
                    site: site!(),
                    description: format!("invalid binasc token '{}'", token),
                })?;
                out.push(byte);
            }
        }
    }
    Ok(out)
}

fn tokenize_binasc_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' {
            chars.next();
            let mut s = String::from("\"");
            for c2 in chars.by_ref() {
                s.push(c2);
                if c2 == '"' {
                    break;
                }
            }
            tokens.push(s);
        } else {
            let mut tok = String::new();
            while let Some(&c2) = chars.peek() {
                if c2.is_whitespace() {
                    break;
                }
                tok.push(c2);
                chars.next();
            }
            tokens.push(tok);
        }
    }
    tokens
}

/// Decodes `bytes` to a binary SMF stream, sniffing whether it's already binary (`MThd` magic) or
/// one of the human-readable text encodings. Falls back to returning `bytes` unchanged so that a
/// stream which is none of the above still fails with a clear SMF parse error rather than a
/// confusing decode error.
pub(crate) fn sniff_decode(bytes: &[u8]) -> Vec<u8> {
    if bytes.starts_with(b"MThd") {
        return bytes.to_vec();
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        for attempt in [read_base64(text), read_ascii_hex(text), read_binasc(text)] {
            match attempt {
                Ok(decoded) if decoded.starts_with(b"MThd") => return decoded,
                _ => continue,
            }
        }
    }
    bytes.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_hex_round_trip_shape() {
        let mut buf = Vec::new();
        write_ascii_hex(&[0x4D, 0x54, 0x68, 0x64], &mut buf, 0).unwrap();
        assert_eq!("4D 54 68 64\n", String::from_utf8(buf).unwrap());
    }

    #[test]
    fn ascii_hex_wraps_at_width() {
        let mut buf = Vec::new();
        write_ascii_hex(&[1, 2, 3, 4], &mut buf, 2).unwrap();
        assert_eq!("01 02\n03 04\n", String::from_utf8(buf).unwrap());
    }

    #[test]
    fn base64_matches_standard_encoding() {
        let mut buf = Vec::new();
        write_base64(b"MTrk", &mut buf, None).unwrap();
        assert_eq!("TVRyaw==\n", String::from_utf8(buf).unwrap());
    }

    #[test]
    fn binasc_renders_printable_runs_as_strings() {
        let mut buf = Vec::new();
        write_binasc(b"MTrk\x00\x00\x00\x04", &mut buf, false).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("\"MTrk\""));
        assert!(text.contains("00 00 00 04"));
    }

    const SAMPLE: &[u8] = b"MThd\x00\x00\x00\x06\x00\x01\x00\x02\x00\x60";

    #[test]
    fn ascii_hex_round_trips() {
        let mut buf = Vec::new();
        write_ascii_hex(SAMPLE, &mut buf, 4).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(SAMPLE.to_vec(), read_ascii_hex(&text).unwrap());
    }

    #[test]
    fn base64_round_trips() {
        let mut buf = Vec::new();
        write_base64(SAMPLE, &mut buf, Some(8)).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(SAMPLE.to_vec(), read_base64(&text).unwrap());
    }

    #[test]
    fn binasc_round_trips() {
        let mut buf = Vec::new();
        write_binasc(SAMPLE, &mut buf, true).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(SAMPLE.to_vec(), read_binasc(&text).unwrap());
    }

    #[test]
    fn sniff_decode_recognizes_each_format() {
        let mut hex_buf = Vec::new();
        write_ascii_hex(SAMPLE, &mut hex_buf, 0).unwrap();
        assert_eq!(SAMPLE.to_vec(), sniff_decode(&hex_buf));

        let mut base64_buf = Vec::new();
        write_base64(SAMPLE, &mut base64_buf, None).unwrap();
        assert_eq!(SAMPLE.to_vec(), sniff_decode(&base64_buf));

        let mut binasc_buf = Vec::new();
        write_binasc(SAMPLE, &mut binasc_buf, false).unwrap();
        assert_eq!(SAMPLE.to_vec(), sniff_decode(&binasc_buf));

        assert_eq!(SAMPLE.to_vec(), sniff_decode(SAMPLE));
    }
}
