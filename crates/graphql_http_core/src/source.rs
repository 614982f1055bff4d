//! Request source text and locations within it.

use serde::{Deserialize, Serialize};

/// The name given to query text that arrived over HTTP.
pub const REQUEST_SOURCE_NAME: &str = "GraphQL request";

/// A 1-based line/column position, as reported in `errors[].locations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// GraphQL document text together with a name used in diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    body: String,
    name: String,
}

impl Source {
    /// Creates a source named after an HTTP request.
    pub fn new(body: impl Into<String>) -> Self {
        Self::named(body, REQUEST_SOURCE_NAME)
    }

    /// Creates a source with an explicit name.
    pub fn named(body: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            name: name.into(),
        }
    }

    /// Returns the document text.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the source name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Converts a byte offset into a line/column location.
    ///
    /// Lines are terminated by `\n`, `\r\n` or a lone `\r`. Columns count
    /// characters, not bytes. Offsets past the end clamp to the end.
    pub fn location_at(&self, offset: usize) -> Location {
        let mut line = 1;
        let mut column = 1;
        let mut chars = self.body.char_indices().peekable();

        while let Some((idx, ch)) = chars.next() {
            if idx >= offset {
                break;
            }
            match ch {
                '\r' => {
                    if matches!(chars.peek(), Some((_, '\n'))) {
                        continue;
                    }
                    line += 1;
                    column = 1;
                }
                '\n' => {
                    line += 1;
                    column = 1;
                }
                _ => column += 1,
            }
        }

        Location::new(line, column)
    }
}

impl From<&str> for Source {
    fn from(body: &str) -> Self {
        Self::new(body)
    }
}

impl From<String> for Source {
    fn from(body: String) -> Self {
        Self::new(body)
    }
}
