// THEORY:
// The frame source is the leaf of the data flow. It turns an append-only file of
// JSON lines into a lazy, ordered stream of `FrameRecord`s.
//
// Key architectural principles:
// 1.  **Lazy**: Lines are read one at a time through a `BufRead`, so a record is
//     only pulled off disk when the cycle driver asks for it.
// 2.  **Every Line Counts**: Each line is one raw record and gets the next sequence
//     number, even if it is unreadable JSON. Decimation counts raw records, so a
//     garbage line still consumes its slot; it only becomes an error if it is the
//     record that gets admitted to the window.
// 3.  **I/O vs. Data Quality**: A failing read is a `SourceError` and ends the run.
//     A malformed payload, including a line that is not valid UTF-8, is carried
//     inside the record and reported later as an `InvalidFrame`.

use crate::core_modules::frame::{Frame, FrameError};
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Split};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to open frame source {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read record {sequence} from frame source")]
    Read {
        sequence: u64,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Deserialize)]
struct RawRecord {
    image: Value,
}

/// One raw line from the source, not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    /// Zero-based line index within the source.
    pub sequence: u64,
    /// The `image` payload, or `None` when the line was not an object carrying one.
    pub image: Option<Value>,
}

impl FrameRecord {
    pub fn parse(sequence: u64, line: &str) -> Self {
        Self::parse_bytes(sequence, line.as_bytes())
    }

    /// Parses one raw line. Bytes that are not UTF-8 JSON leave `image` empty.
    pub fn parse_bytes(sequence: u64, line: &[u8]) -> Self {
        let image = serde_json::from_slice::<RawRecord>(line)
            .ok()
            .map(|record| record.image);
        Self { sequence, image }
    }

    pub fn from_image(sequence: u64, image: Value) -> Self {
        Self {
            sequence,
            image: Some(image),
        }
    }

    /// Validates the payload into a `Frame`.
    pub fn decode(&self) -> Result<Frame, FrameError> {
        match &self.image {
            Some(image) => Frame::from_json(self.sequence, image),
            None => Err(FrameError::MissingImage {
                sequence: self.sequence,
            }),
        }
    }
}

/// Streams `FrameRecord`s out of a JSON-lines reader.
pub struct JsonLinesSource<R> {
    lines: Split<R>,
    next_sequence: u64,
}

impl JsonLinesSource<BufReader<File>> {
    /// Opens a file from the start. Reopening restarts the stream at sequence zero.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.split(b'\n'),
            next_sequence: 0,
        }
    }
}

impl<R: BufRead> Iterator for JsonLinesSource<R> {
    type Item = Result<FrameRecord, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.lines.next()?;
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        Some(
            line.map(|bytes| FrameRecord::parse_bytes(sequence, &bytes))
                .map_err(|source| SourceError::Read { sequence, source }),
        )
    }
}
