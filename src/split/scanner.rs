/// Lexical context of the byte under the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
}

/// Cursor over a SQL string tracking quotes and parenthesis depth.
pub(super) struct Scanner<'a> {
    bytes: &'a [u8],
    idx: usize,
    state: State,
    depth: u32,
}

impl<'a> Scanner<'a> {
    pub(super) fn new(sql: &'a str) -> Self {
        Self {
            bytes: sql.as_bytes(),
            idx: 0,
            state: State::Normal,
            depth: 0,
        }
    }

    /// Advance to the next top-level `;` and return its byte offset.
    pub(super) fn next_boundary(&mut self) -> Option<usize> {
        while self.idx < self.bytes.len() {
            let b = self.bytes[self.idx];
            let at = self.idx;
            self.idx += 1;
            match self.state {
                State::Normal => match b {
                    b'\'' => self.state = State::SingleQuoted,
                    b'"' => self.state = State::DoubleQuoted,
                    b'(' => self.depth += 1,
                    b')' => self.depth = self.depth.saturating_sub(1),
                    b';' if self.depth == 0 => return Some(at),
                    _ => {}
                },
                State::SingleQuoted => self.step_quoted(b, b'\''),
                State::DoubleQuoted => self.step_quoted(b, b'"'),
            }
        }
        None
    }

    fn step_quoted(&mut self, b: u8, quote: u8) {
        if b == b'\\' {
            // backslash escapes the next byte
            self.idx += 1;
        } else if b == quote {
            self.state = State::Normal;
        }
    }
}
