//! Incremental recovery of the `answer` field from partially-arrived JSON.
//!
//! Fragments are appended to a buffer; after each one the buffer is searched for a
//! complete object (see [`ExtractStrategy`]) and, when one parses with a string
//! `answer`, the text not yet handed out is returned.

use crate::config::ExtractStrategy;

/// Streaming `{"answer": "..."}` decoder. One per generation; not shared.
#[derive(Debug)]
pub struct AnswerExtractor {
    strategy: ExtractStrategy,
    buffer: String,
    best: Option<String>,
    emitted: String,
}

impl AnswerExtractor {
    pub fn new(strategy: ExtractStrategy) -> Self {
        Self {
            strategy,
            buffer: String::new(),
            best: None,
            emitted: String::new(),
        }
    }

    /// Append a fragment. Returns the newly revealed answer text, if any.
    ///
    /// When the recovered answer no longer extends what was already returned, it
    /// replaces the best-known answer but yields nothing: handed-out text cannot be
    /// taken back.
    pub fn push(&mut self, fragment: &str) -> Option<String> {
        self.buffer.push_str(fragment);
        let candidate = match self.strategy {
            ExtractStrategy::BraceSpan => brace_span(&self.buffer),
            ExtractStrategy::Balanced => first_balanced_object(&self.buffer),
        }?;
        let answer = parse_answer(candidate)?;
        self.accept(answer)
    }

    /// Adopt a freshly parsed answer and return the part not yet handed out.
    fn accept(&mut self, answer: String) -> Option<String> {
        let delta = if answer.starts_with(self.emitted.as_str()) {
            let suffix = &answer[self.emitted.len()..];
            if suffix.is_empty() {
                None
            } else {
                Some(suffix.to_string())
            }
        } else {
            log::debug!("extractor: recovered answer diverged from emitted prefix");
            None
        };
        if let Some(ref d) = delta {
            self.emitted.push_str(d);
        }
        self.best = Some(answer);
        delta
    }

    /// Best answer recovered so far.
    pub fn current(&self) -> Option<&str> {
        self.best.as_deref()
    }

    /// Raw bytes seen so far (for diagnostics).
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Last successfully parsed answer; None when no valid object was ever recovered.
    pub fn finish(self) -> Option<String> {
        self.best
    }
}

/// Span from the first `{` to the last `}` of the whole buffer, inclusive.
fn brace_span(buf: &str) -> Option<&str> {
    let start = buf.find('{')?;
    let end = buf.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&buf[start..=end])
}

/// First top-level object whose braces balance, ignoring braces inside JSON strings.
fn first_balanced_object(buf: &str) -> Option<&str> {
    let start = buf.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in buf[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&buf[start..=start + i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_answer(candidate: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(candidate).ok()?;
    value.get("answer")?.as_str().map(str::to_string)
}
