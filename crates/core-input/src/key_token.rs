//! Raw terminal bytes to logical keys.
//!
//! The decoder is fed byte chunks exactly as `read(2)` returned them and
//! yields keys in order. Escape sequences or UTF-8 code points split across
//! two chunks are held back until the rest arrives, with one exception: a lone
//! `ESC` at the very end of a chunk is the escape key itself, since terminals
//! deliver a whole sequence in a single write.
//!
//! A control byte inside an escape sequence ends it: the prefix becomes
//! `Key::Unknown` and the control byte decodes as its own key. A partial
//! sequence longer than `MAX_SEQUENCE_LEN` is flushed as `Key::Unknown`.

pub const KEY_CTRL_C: u8 = 0x03;
pub const KEY_CTRL_D: u8 = 0x04;
pub const KEY_TAB: u8 = 0x09;
pub const KEY_CTRL_L: u8 = 0x0C;
pub const KEY_ENTER: u8 = 0x0D;
pub const KEY_CTRL_R: u8 = 0x12;
pub const KEY_CTRL_T: u8 = 0x14;
pub const KEY_ESCAPE: u8 = 0x1B;
pub const KEY_BACKSPACE: u8 = 0x7F;

/// Longest partial escape sequence held back between chunks.
pub const MAX_SEQUENCE_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    /// ctrl-c
    Interrupt,
    /// ctrl-d
    Eof,
    /// ctrl-l
    ClearScreen,
    Tab,
    Enter,
    /// ctrl-r
    StartSearch,
    /// ctrl-t
    OpenEditor,
    Escape,
    Backspace,
    Delete,
    Home,
    End,
    Up,
    Down,
    Right,
    Left,
    /// A run of printable text (typed or pasted).
    Text(String),
    /// Reply to `ESC[6n`: 1-based cursor row and column.
    CursorReport { row: u16, column: u16 },
    /// Recognized framing but no binding (other CSI sequences, stray control bytes).
    Unknown(Vec<u8>),
}

#[derive(Debug, Default)]
pub struct KeyDecoder {
    pending: Vec<u8>,
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when a partial sequence is buffered waiting for more bytes.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Decode one chunk, returning every complete key it finishes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Key> {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(chunk);

        let mut keys = Vec::new();
        let mut i = 0;
        while i < buf.len() {
            let b = buf[i];
            match b {
                KEY_ESCAPE => match decode_escape(&buf[i..]) {
                    Step::Key(key, used) => {
                        keys.push(key);
                        i += used;
                    }
                    Step::Incomplete => {
                        self.pending = buf[i..].to_vec();
                        break;
                    }
                },
                KEY_CTRL_C => push_and_step(&mut keys, &mut i, Key::Interrupt),
                KEY_CTRL_D => push_and_step(&mut keys, &mut i, Key::Eof),
                KEY_TAB => push_and_step(&mut keys, &mut i, Key::Tab),
                KEY_CTRL_L => push_and_step(&mut keys, &mut i, Key::ClearScreen),
                KEY_ENTER => push_and_step(&mut keys, &mut i, Key::Enter),
                KEY_CTRL_R => push_and_step(&mut keys, &mut i, Key::StartSearch),
                KEY_CTRL_T => push_and_step(&mut keys, &mut i, Key::OpenEditor),
                KEY_BACKSPACE => push_and_step(&mut keys, &mut i, Key::Backspace),
                b if b < 0x20 => push_and_step(&mut keys, &mut i, Key::Unknown(vec![b])),
                _ => {
                    let end = buf[i..]
                        .iter()
                        .position(|&c| c < 0x20 || c == KEY_BACKSPACE)
                        .map_or(buf.len(), |p| i + p);
                    let run = &buf[i..end];
                    match std::str::from_utf8(run) {
                        Ok(text) => keys.push(Key::Text(text.to_string())),
                        Err(e) if e.error_len().is_none() && end == buf.len() => {
                            // Code point split across reads: emit the valid prefix, keep the tail.
                            let valid = e.valid_up_to();
                            if valid > 0 {
                                keys.push(Key::Text(
                                    String::from_utf8_lossy(&run[..valid]).into_owned(),
                                ));
                            }
                            self.pending = run[valid..].to_vec();
                            break;
                        }
                        Err(_) => keys.push(Key::Text(String::from_utf8_lossy(run).into_owned())),
                    }
                    i = end;
                }
            }
        }
        keys
    }
}

fn decode_escape(seq: &[u8]) -> Step {
    match seq.get(1) {
        None => Step::Key(Key::Escape, 1),
        Some(b'[') => decode_csi(seq),
        Some(b'O') => match seq.get(2) {
            None => Step::Incomplete,
            Some(&f) if is_control(f) => Step::Key(Key::Unknown(seq[..2].to_vec()), 2),
            Some(&f) => {
                let key = map_ss3(f).unwrap_or_else(|| Key::Unknown(seq[..3].to_vec()));
                Step::Key(key, 3)
            }
        },
        Some(_) => Step::Key(Key::Escape, 1),
    }
}

enum Step {
    Key(Key, usize),
    Incomplete,
}

#[inline]
fn is_control(b: u8) -> bool {
    b < 0x20 || b == KEY_BACKSPACE
}

#[inline]
fn push_and_step(keys: &mut Vec<Key>, i: &mut usize, key: Key) {
    keys.push(key);
    *i += 1;
}

fn decode_csi(seq: &[u8]) -> Step {
    // ESC [ <params 0x30-0x3F>* <intermediates 0x20-0x2F>* <final 0x40-0x7E>
    let mut j = 2;
    while j < seq.len() && (0x20..=0x3F).contains(&seq[j]) {
        j += 1;
    }
    let Some(&final_byte) = seq.get(j) else {
        if seq.len() > MAX_SEQUENCE_LEN {
            return Step::Key(Key::Unknown(seq.to_vec()), seq.len());
        }
        return Step::Incomplete;
    };
    if is_control(final_byte) {
        return Step::Key(Key::Unknown(seq[..j].to_vec()), j);
    }
    let used = j + 1;
    let params = &seq[2..j];
    let key = match (params, final_byte) {
        (b"", b'A') => Key::Up,
        (b"", b'B') => Key::Down,
        (b"", b'C') => Key::Right,
        (b"", b'D') => Key::Left,
        (b"", b'H') | (b"1", b'~') => Key::Home,
        (b"", b'F') | (b"4", b'~') => Key::End,
        (b"3", b'~') => Key::Delete,
        (_, b'R') => {
            parse_cursor_report(params).unwrap_or_else(|| Key::Unknown(seq[..used].to_vec()))
        }
        _ => Key::Unknown(seq[..used].to_vec()),
    };
    Step::Key(key, used)
}

fn map_ss3(final_byte: u8) -> Option<Key> {
    Some(match final_byte {
        b'A' => Key::Up,
        b'B' => Key::Down,
        b'C' => Key::Right,
        b'D' => Key::Left,
        b'H' => Key::Home,
        b'F' => Key::End,
        _ => return None,
    })
}

/// Parse the `row;col` parameter block of a cursor position report.
pub fn parse_cursor_report(params: &[u8]) -> Option<Key> {
    let text = std::str::from_utf8(params).ok()?;
    let (row, column) = text.split_once(';')?;
    let parse = |s: &str| -> Option<u16> {
        if s.is_empty() {
            Some(1)
        } else {
            s.parse().ok()
        }
    };
    Some(Key::CursorReport {
        row: parse(row)?,
        column: parse(column)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn decode(chunk: &[u8]) -> Vec<Key> {
        KeyDecoder::new().feed(chunk)
    }

    #[test]
    fn maps_control_bytes() {
        assert_eq!(decode(b"\x03"), vec![Key::Interrupt]);
        assert_eq!(decode(b"\x04"), vec![Key::Eof]);
        assert_eq!(decode(b"\x0c"), vec![Key::ClearScreen]);
        assert_eq!(decode(b"\x09"), vec![Key::Tab]);
        assert_eq!(decode(b"\x0d"), vec![Key::Enter]);
        assert_eq!(decode(b"\x12"), vec![Key::StartSearch]);
        assert_eq!(decode(b"\x14"), vec![Key::OpenEditor]);
        assert_eq!(decode(b"\x7f"), vec![Key::Backspace]);
    }

    #[test]
    fn maps_escape_sequences() {
        assert_eq!(decode(b"\x1b"), vec![Key::Escape]);
        assert_eq!(decode(b"\x1b[3~"), vec![Key::Delete]);
        assert_eq!(decode(b"\x1b[H"), vec![Key::Home]);
        assert_eq!(decode(b"\x1b[F"), vec![Key::End]);
        assert_eq!(decode(b"\x1b[A"), vec![Key::Up]);
        assert_eq!(decode(b"\x1b[B"), vec![Key::Down]);
        assert_eq!(decode(b"\x1b[C"), vec![Key::Right]);
        assert_eq!(decode(b"\x1b[D"), vec![Key::Left]);
        assert_eq!(decode(b"\x1bOH"), vec![Key::Home]);
    }

    #[test]
    fn parses_cursor_report() {
        assert_eq!(
            decode(b"\x1b[12;40R"),
            vec![Key::CursorReport { row: 12, column: 40 }]
        );
    }

    #[test]
    fn text_runs_split_on_control_bytes() {
        assert_eq!(
            decode(b"ls -la\r"),
            vec![Key::Text("ls -la".into()), Key::Enter]
        );
        assert_eq!(
            decode("» héllo".as_bytes()),
            vec![Key::Text("» héllo".into())]
        );
    }

    #[test]
    fn sequence_split_across_chunks() {
        let mut d = KeyDecoder::new();
        assert_eq!(d.feed(b"a\x1b[3"), vec![Key::Text("a".into())]);
        assert!(d.has_pending());
        assert_eq!(d.feed(b";9Rb"), vec![
            Key::CursorReport { row: 3, column: 9 },
            Key::Text("b".into())
        ]);
        assert!(!d.has_pending());
    }

    #[test]
    fn utf8_split_across_chunks() {
        let bytes = "é".as_bytes();
        let mut d = KeyDecoder::new();
        assert!(d.feed(&bytes[..1]).is_empty());
        assert_eq!(d.feed(&bytes[1..]), vec![Key::Text("é".into())]);
    }

    #[test]
    fn escape_followed_by_text_is_escape_then_text() {
        assert_eq!(
            decode(b"\x1bx"),
            vec![Key::Escape, Key::Text("x".into())]
        );
    }

    #[test]
    fn unbound_sequences_are_unknown() {
        assert_eq!(decode(b"\x1b[5~"), vec![Key::Unknown(b"\x1b[5~".to_vec())]);
        assert_eq!(decode(b"\x01"), vec![Key::Unknown(vec![0x01])]);
    }

    #[test]
    fn control_byte_ends_partial_sequence() {
        let mut d = KeyDecoder::new();
        assert_eq!(d.feed(b"ls\x1b["), vec![Key::Text("ls".into())]);
        assert!(d.has_pending());
        assert_eq!(d.feed(b"\r"), vec![Key::Unknown(b"\x1b[".to_vec()), Key::Enter]);
        assert!(!d.has_pending());

        assert_eq!(
            decode(b"\x1b[1;\x03"),
            vec![Key::Unknown(b"\x1b[1;".to_vec()), Key::Interrupt]
        );
        assert_eq!(
            decode(b"\x1bO\x7f"),
            vec![Key::Unknown(b"\x1bO".to_vec()), Key::Backspace]
        );
    }

    #[test]
    fn unterminated_sequence_is_bounded() {
        let mut d = KeyDecoder::new();
        assert!(d.feed(b"\x1b[").is_empty());
        for _ in 0..MAX_SEQUENCE_LEN - 2 {
            assert!(d.feed(b"1").is_empty());
        }
        assert!(d.has_pending());
        let keys = d.feed(b"1");
        assert!(matches!(keys.as_slice(), [Key::Unknown(bytes)] if bytes.len() == MAX_SEQUENCE_LEN + 1));
        assert!(!d.has_pending());
        assert_eq!(d.feed(b"x\r"), vec![Key::Text("x".into()), Key::Enter]);
    }
}
