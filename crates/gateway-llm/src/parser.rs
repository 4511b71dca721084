//! The additional-data tag parser (spec §4.2, §8 properties 4-6).
//!
//! Segments of the form `<additional_data key=NAME>VALUE</additional_data>`
//! are stripped from assistant output and collected into a side map. The
//! streaming variant is a three-state machine (OUTSIDE / INSIDE_TAG /
//! FLUSHING is realized here as `State::Outside` / `State::InTag`, with the
//! "flushing" behavior being the trailing-buffer flush at end of stream) that
//! never emits a chunk containing a partial tag literal: on every delta it
//! finds the rightmost cut that cannot be the start of `<additional_data` or
//! `</additional_data` and defers everything from that cut onward.

use std::collections::HashMap;

use crate::message::StreamedChunk;

const OPEN_LITERAL: &str = "<additional_data";
/// The fixed-length prefix of an opening tag, up to the variable-length key
/// name. Everything from a match of this guard onward must be deferred
/// until a terminating `>` is seen - the key name itself has unbounded
/// length, so no fixed suffix check can protect it.
const OPEN_GUARD: &str = "<additional_data key=";
const CLOSE_LITERAL: &str = "</additional_data>";

/// Non-streaming parse: strip all tag segments from `content`, returning the
/// cleaned text and the collected key/value map (last write wins per key).
pub fn parse_additional_data(content: &str) -> (String, HashMap<String, String>) {
    let mut data = HashMap::new();
    let mut cleaned = String::with_capacity(content.len());
    let mut rest = content;

    loop {
        let Some(open_start) = rest.find(OPEN_LITERAL) else {
            cleaned.push_str(rest);
            break;
        };
        let after_open = &rest[open_start + OPEN_LITERAL.len()..];
        let Some(key_start) = after_open.find("key=") else {
            cleaned.push_str(&rest[..open_start + OPEN_LITERAL.len()]);
            rest = after_open;
            continue;
        };
        if key_start != 0 {
            // Not an immediate `key=`, e.g. `<additional_dataXYZ` - not our tag.
            cleaned.push_str(&rest[..open_start + OPEN_LITERAL.len() + key_start]);
            rest = &after_open[key_start..];
            continue;
        }
        let after_key = &after_open[4..];
        let Some(tag_close) = after_key.find('>') else {
            cleaned.push_str(rest);
            break;
        };
        let key = after_key[..tag_close].trim().to_string();
        let after_tag_open = &after_key[tag_close + 1..];

        let Some(close_pos) = after_tag_open.find(CLOSE_LITERAL) else {
            // Unterminated tag: treat the rest as plain text, matching the
            // original's regex-based parser which would simply not match.
            cleaned.push_str(rest);
            break;
        };
        let value = after_tag_open[..close_pos].trim().to_string();
        data.insert(key, value);

        cleaned.push_str(&rest[..open_start]);
        rest = &after_tag_open[close_pos + CLOSE_LITERAL.len()..];
    }

    (cleaned.trim().to_string(), data)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Outside,
    InTag { key: String, content: String },
}

/// Incremental parser fed one delta at a time (spec §4.2 streaming case).
#[derive(Debug)]
pub struct StreamParser {
    buffer: String,
    state: State,
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamParser {
    pub fn new() -> Self {
        Self { buffer: String::new(), state: State::Outside }
    }

    /// Feed a newly arrived text delta, returning any chunks that are now
    /// safe to emit.
    pub fn push(&mut self, delta: &str) -> Vec<StreamedChunk> {
        self.buffer.push_str(delta);
        let mut out = Vec::new();
        loop {
            if self.buffer.is_empty() {
                break;
            }
            match &self.state {
                State::Outside => {
                    if !self.process_outside(&mut out) {
                        break;
                    }
                }
                State::InTag { .. } => {
                    if !self.process_in_tag(&mut out) {
                        break;
                    }
                }
            }
        }
        out
    }

    /// End of stream: flush whatever remains in the buffer. An unterminated
    /// tag's accumulated body is emitted as-is under its key, mirroring the
    /// reference parser's end-of-stream behavior.
    pub fn finish(mut self) -> Option<StreamedChunk> {
        if self.buffer.is_empty() {
            return match self.state {
                State::Outside => None,
                State::InTag { key, content } => {
                    if content.is_empty() {
                        None
                    } else {
                        Some(StreamedChunk::tagged(content, key))
                    }
                }
            };
        }
        match self.state {
            State::Outside => Some(StreamedChunk::plain(std::mem::take(&mut self.buffer))),
            State::InTag { key, mut content } => {
                content.push_str(&self.buffer);
                Some(StreamedChunk::tagged(content, key))
            }
        }
    }

    /// Returns true if progress was made and the loop in `push` should
    /// continue; false if the buffer could not be advanced further this
    /// round (everything remaining is a deferred partial match).
    fn process_outside(&mut self, out: &mut Vec<StreamedChunk>) -> bool {
        if let Some(guard_pos) = self.buffer.find(OPEN_GUARD) {
            let after_guard = guard_pos + OPEN_GUARD.len();
            if let Some(close_offset) = self.buffer[after_guard..].find('>') {
                let key = self.buffer[after_guard..after_guard + close_offset].trim().to_string();
                let before = self.buffer[..guard_pos].to_string();
                if !before.is_empty() {
                    out.push(StreamedChunk::plain(before));
                }
                self.buffer.drain(..after_guard + close_offset + 1);
                self.state = State::InTag { key, content: String::new() };
                return true;
            }
            // Guard matched but the key name/terminator hasn't arrived yet:
            // flush everything before the guard and defer the rest, however
            // long the eventual key name turns out to be.
            if guard_pos == 0 {
                return false;
            }
            let before: String = self.buffer.drain(..guard_pos).collect();
            out.push(StreamedChunk::plain(before));
            return true;
        }

        let safe_end = safe_content_end(&self.buffer, OPEN_GUARD);
        if safe_end == 0 {
            return false;
        }
        let content: String = self.buffer.drain(..safe_end).collect();
        if !content.is_empty() {
            out.push(StreamedChunk::plain(content));
        }
        true
    }

    fn process_in_tag(&mut self, out: &mut Vec<StreamedChunk>) -> bool {
        let State::InTag { key, content } = &mut self.state else { unreachable!() };

        if let Some(close_pos) = self.buffer.find(CLOSE_LITERAL) {
            content.push_str(&self.buffer[..close_pos]);
            out.push(StreamedChunk::tagged(content.clone(), key.clone()));
            self.buffer.drain(..close_pos + CLOSE_LITERAL.len());
            self.state = State::Outside;
            return true;
        }

        let safe_end = safe_content_end(&self.buffer, CLOSE_LITERAL);
        if safe_end == 0 {
            return false;
        }
        let chunk: String = self.buffer.drain(..safe_end).collect();
        content.push_str(&chunk);
        true
    }
}

/// The index up to which `buffer` is guaranteed not to contain a prefix of
/// `literal` that could grow into a full match with more input.
fn safe_content_end(buffer: &str, literal: &str) -> usize {
    let max = literal.len().min(buffer.len());
    for i in (1..=max).rev() {
        if buffer.ends_with(&literal[..i]) {
            return buffer.len() - i;
        }
    }
    buffer.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_streaming_strips_and_collects() {
        let (cleaned, data) = parse_additional_data(
            "Hello <additional_data key=a>v1</additional_data> world",
        );
        assert_eq!(cleaned, "Hello  world");
        assert_eq!(data.get("a"), Some(&"v1".to_string()));
    }

    #[test]
    fn non_streaming_last_write_wins() {
        let (_, data) = parse_additional_data(
            "<additional_data key=a>first</additional_data><additional_data key=a>second</additional_data>",
        );
        assert_eq!(data.get("a"), Some(&"second".to_string()));
    }

    #[test]
    fn streaming_matches_non_streaming_for_split_deltas() {
        let mut parser = StreamParser::new();
        let mut chunks = parser.push("Hello <additional_d");
        chunks.extend(parser.push("ata key=a>v1</additional_data> world"));
        if let Some(tail) = parser.finish() {
            chunks.push(tail);
        }

        assert_eq!(
            chunks,
            vec![
                StreamedChunk::plain("Hello "),
                StreamedChunk::tagged("v1", "a"),
                StreamedChunk::plain(" world"),
            ]
        );
    }

    #[test]
    fn streaming_never_splits_tag_literal() {
        let mut parser = StreamParser::new();
        for literal_fragment in ["<addi", "tional_d", "ata key=k>", "body", "</addi", "tional_data>"] {
            for chunk in parser.push(literal_fragment) {
                assert!(!chunk.content.contains("<additional_d"));
                assert!(!chunk.content.contains("</additional_d"));
            }
        }
    }

    #[test]
    fn byte_by_byte_partition_matches_whole_parse() {
        let text = "pre <additional_data key=x>abc</additional_data> post <additional_data key=y>def</additional_data>";
        let (expected_clean, expected_data) = parse_additional_data(text);

        let mut parser = StreamParser::new();
        let mut by_key: HashMap<Option<String>, String> = HashMap::new();
        for ch in text.chars() {
            for chunk in parser.push(&ch.to_string()) {
                by_key.entry(chunk.additional_data_key).or_default().push_str(&chunk.content);
            }
        }
        if let Some(tail) = parser.finish() {
            by_key.entry(tail.additional_data_key).or_default().push_str(&tail.content);
        }

        assert_eq!(by_key.get(&None).cloned().unwrap_or_default().trim(), expected_clean);
        for (key, value) in &expected_data {
            assert_eq!(by_key.get(&Some(key.clone())), Some(value));
        }
    }
}
