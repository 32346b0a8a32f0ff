// SPDX-License-Identifier: Apache-2.0

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// What to do with bytes after the last newline when EOF is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialLine {
    /// Leave the unterminated tail unread; the writer may still be appending to it.
    Hold,
    /// Return the unterminated tail as a final line. Used for retired files.
    Consume,
}

/// One raw line read from a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// Line bytes without the trailing newline, capped at the reader's max size
    pub bytes: Vec<u8>,
    /// Byte position where the line begins
    pub offset: u64,
    /// Bytes consumed from the file, including the newline
    pub len: u64,
    /// Whether the line exceeded the max size and was cut short
    pub truncated: bool,
}

impl RawLine {
    /// Byte position just past this line: a valid resume point.
    pub fn end_offset(&self) -> u64 {
        self.offset + self.len
    }
}

/// FileReader reads newline-delimited lines forward from a byte offset to EOF.
pub struct FileReader {
    /// Path to the file
    path: PathBuf,
    /// Buffered reader positioned at `offset`
    reader: BufReader<File>,
    /// Offset just past the last line handed out
    offset: u64,
    /// Maximum bytes kept for a single line
    max_log_size: usize,
    /// Treatment of the unterminated tail
    partial: PartialLine,
    /// Whether we've reached EOF
    eof: bool,
}

impl FileReader {
    /// Open `path` and position the reader at `offset`.
    pub fn open(
        path: impl AsRef<Path>,
        offset: u64,
        max_log_size: usize,
        partial: PartialLine,
    ) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Self::from_file(file, path, offset, max_log_size, partial)
    }

    /// Create a FileReader from an already open handle.
    pub fn from_file(
        mut file: File,
        path: PathBuf,
        offset: u64,
        max_log_size: usize,
        partial: PartialLine,
    ) -> io::Result<Self> {
        file.seek(SeekFrom::Start(offset))?;
        Ok(Self {
            path,
            reader: BufReader::new(file),
            offset,
            max_log_size,
            partial,
            eof: false,
        })
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offset just past the last complete line returned.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Check if we're at EOF
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Read the next line, or `None` at EOF.
    ///
    /// Lines longer than the max size are consumed in full but only the first
    /// `max_log_size` bytes are kept.
    pub fn read_line(&mut self) -> io::Result<Option<RawLine>> {
        if self.eof {
            return Ok(None);
        }

        let mut bytes = Vec::new();
        let mut consumed: u64 = 0;
        let mut truncated = false;
        let mut terminated = false;

        loop {
            let available = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if available.is_empty() {
                break;
            }

            let (content_len, take) = match available.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    terminated = true;
                    (pos, pos + 1)
                }
                None => (available.len(), available.len()),
            };

            let room = self.max_log_size.saturating_sub(bytes.len());
            if content_len > room {
                truncated = true;
            }
            bytes.extend_from_slice(&available[..content_len.min(room)]);

            self.reader.consume(take);
            consumed += take as u64;

            if terminated {
                break;
            }
        }

        if !terminated {
            self.eof = true;
            if consumed == 0 || self.partial == PartialLine::Hold {
                return Ok(None);
            }
        }

        let line = RawLine {
            bytes,
            offset: self.offset,
            len: consumed,
            truncated,
        };
        self.offset += consumed;
        Ok(Some(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn collect(reader: &mut FileReader) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = reader.read_line().unwrap() {
            lines.push(String::from_utf8(line.bytes).unwrap());
        }
        lines
    }

    #[test]
    fn test_reader_read_lines() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "line 1\nline 2\nline 3\n").unwrap();
        file.flush().unwrap();

        let mut reader = FileReader::open(file.path(), 0, 1024, PartialLine::Hold).unwrap();

        assert_eq!(collect(&mut reader), vec!["line 1", "line 2", "line 3"]);
        assert!(reader.is_eof());
        assert_eq!(reader.offset(), 21);
    }

    #[test]
    fn test_reader_line_offsets() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "ab\n\ncdef\n").unwrap();
        file.flush().unwrap();

        let mut reader = FileReader::open(file.path(), 0, 1024, PartialLine::Hold).unwrap();

        let first = reader.read_line().unwrap().unwrap();
        assert_eq!((first.offset, first.len), (0, 3));
        let empty = reader.read_line().unwrap().unwrap();
        assert_eq!((empty.offset, empty.len), (3, 1));
        assert!(empty.bytes.is_empty());
        let last = reader.read_line().unwrap().unwrap();
        assert_eq!((last.offset, last.len, last.end_offset()), (4, 5, 9));
        assert!(reader.read_line().unwrap().is_none());
    }

    #[test]
    fn test_reader_resumes_from_offset() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "line 1\nline 2\n").unwrap();
        file.flush().unwrap();

        let mut reader = FileReader::open(file.path(), 7, 1024, PartialLine::Hold).unwrap();
        assert_eq!(collect(&mut reader), vec!["line 2"]);
    }

    #[test]
    fn test_reader_holds_partial_tail() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "line 1\nline 2 in prog").unwrap();
        file.flush().unwrap();

        let mut reader = FileReader::open(file.path(), 0, 1024, PartialLine::Hold).unwrap();
        assert_eq!(collect(&mut reader), vec!["line 1"]);
        assert_eq!(reader.offset(), 7);

        // Writer finishes the line; a new reader picks it up whole
        write!(file, "ress\n").unwrap();
        file.flush().unwrap();
        let mut reader =
            FileReader::open(file.path(), reader.offset(), 1024, PartialLine::Hold).unwrap();
        assert_eq!(collect(&mut reader), vec!["line 2 in progress"]);
    }

    #[test]
    fn test_reader_consumes_partial_tail() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "line 1\nlast").unwrap();
        file.flush().unwrap();

        let mut reader = FileReader::open(file.path(), 0, 1024, PartialLine::Consume).unwrap();
        assert_eq!(collect(&mut reader), vec!["line 1", "last"]);
        assert_eq!(reader.offset(), 11);
    }

    #[test]
    fn test_reader_truncates_long_lines() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "0123456789\nok\n").unwrap();
        file.flush().unwrap();

        let mut reader = FileReader::open(file.path(), 0, 4, PartialLine::Hold).unwrap();
        let long = reader.read_line().unwrap().unwrap();
        assert_eq!(long.bytes, b"0123");
        assert!(long.truncated);
        assert_eq!(long.len, 11);

        let short = reader.read_line().unwrap().unwrap();
        assert_eq!(short.bytes, b"ok");
        assert!(!short.truncated);
    }

    #[test]
    fn test_reader_offset_past_eof() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "short\n").unwrap();
        file.flush().unwrap();

        let mut reader = FileReader::open(file.path(), 100, 1024, PartialLine::Consume).unwrap();
        assert!(reader.read_line().unwrap().is_none());
        assert_eq!(reader.offset(), 100);
    }

    #[test]
    fn test_reader_invalid_utf8_kept_as_bytes() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"ok\n\xff\xfe bad\n").unwrap();
        file.flush().unwrap();

        let mut reader = FileReader::open(file.path(), 0, 1024, PartialLine::Hold).unwrap();
        reader.read_line().unwrap().unwrap();
        let bad = reader.read_line().unwrap().unwrap();
        assert_eq!(bad.bytes, b"\xff\xfe bad");
    }
}
