//! Stream Decoding
//!
//! Pipes deliver bytes in arbitrary slices, so a multi-byte character can be
//! split between two reads. `StreamDecoder` holds back an incomplete trailing
//! sequence until the rest arrives; genuinely invalid bytes are replaced with
//! U+FFFD.

/// Incremental UTF-8 decoder for one captured stream.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    pending: Vec<u8>,
    text: String,
    closed: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes read from the pipe.
    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);

        let split = incomplete_tail_start(&self.pending);
        let rest = self.pending.split_off(split);
        let complete = std::mem::replace(&mut self.pending, rest);
        self.text.push_str(&String::from_utf8_lossy(&complete));
    }

    /// The stream reached EOF (or failed); flush whatever is held back.
    pub fn finish(&mut self) {
        if !self.pending.is_empty() {
            let pending = std::mem::take(&mut self.pending);
            self.text.push_str(&String::from_utf8_lossy(&pending));
        }
        self.closed = true;
    }

    /// Take the text decoded since the last call.
    pub fn take_text(&mut self) -> String {
        std::mem::take(&mut self.text)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Index where an unfinished UTF-8 sequence begins, or `bytes.len()`.
fn incomplete_tail_start(bytes: &[u8]) -> usize {
    let mut start = 0;
    loop {
        match std::str::from_utf8(&bytes[start..]) {
            Ok(_) => return bytes.len(),
            Err(e) => match e.error_len() {
                None => return start + e.valid_up_to(),
                Some(len) => start += e.valid_up_to() + len,
            },
        }
    }
}
