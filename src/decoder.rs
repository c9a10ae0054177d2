//! Streaming decoder for the issues file.
//!
//! The issues file is one JSON array that can hold an arbitrary number of
//! records. [`IssueRecordDecoder`] walks the array punctuation itself and
//! hands each element to `serde_json` straight from the buffered reader, so
//! only the record currently being decoded is held in memory.
//!
//! The first failure (I/O or format) is yielded once and the iterator then
//! stops; a malformed report is rejected as a whole.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::DigestError;
use crate::models::RawIssueRecord;

/// Default issues file name inside a report directory.
pub const ISSUES_FILE: &str = "issues.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    /// Before the opening `[`.
    Start,
    /// Just after `[`: either `]` or the first element follows.
    FirstElement,
    /// After an element: `,` or `]` follows.
    AfterElement,
    Done,
}

/// Lazy, non-restartable sequence of [`RawIssueRecord`]s.
///
/// Owns the underlying reader; the file is closed when the decoder is
/// dropped, whatever the reason the caller stopped iterating.
pub struct IssueRecordDecoder<R = BufReader<File>> {
    reader: R,
    path: PathBuf,
    cursor: Cursor,
    records_read: usize,
}

impl IssueRecordDecoder<BufReader<File>> {
    /// Open an issues file for streaming.
    pub fn open(path: &Path) -> Result<Self, DigestError> {
        let file = File::open(path).map_err(|e| DigestError::read(path, e))?;
        Ok(Self::from_reader(BufReader::new(file), path))
    }
}

impl<R: BufRead> IssueRecordDecoder<R> {
    /// Decode from any buffered reader. `path` is only used in errors.
    pub fn from_reader(reader: R, path: &Path) -> Self {
        Self {
            reader,
            path: path.to_path_buf(),
            cursor: Cursor::Start,
            records_read: 0,
        }
    }

    /// Number of records decoded so far.
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Next non-whitespace byte, without consuming it.
    fn peek_significant(&mut self) -> Result<Option<u8>, DigestError> {
        loop {
            let next = match self.reader.fill_buf() {
                Ok(buf) => buf.first().copied(),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(DigestError::read(&self.path, e)),
            };
            match next {
                Some(b) if b.is_ascii_whitespace() => self.reader.consume(1),
                other => return Ok(other),
            }
        }
    }

    fn expect_byte(&mut self, expected: u8, what: &str) -> Result<(), DigestError> {
        match self.peek_significant()? {
            Some(b) if b == expected => {
                self.reader.consume(1);
                Ok(())
            }
            Some(b) => Err(self.format_error(format!(
                "expected {} but found '{}'",
                what,
                char::from(b)
            ))),
            None => Err(self.format_error(format!("expected {} but reached end of file", what))),
        }
    }

    fn format_error(&self, reason: impl Into<String>) -> DigestError {
        DigestError::format(
            &self.path,
            format!("{} (after {} records)", reason.into(), self.records_read),
        )
    }

    fn decode_element(&mut self) -> Result<RawIssueRecord, DigestError> {
        if self.peek_significant()? != Some(b'{') {
            return Err(self.format_error("expected an issue object"));
        }

        let decoded = {
            let mut de = serde_json::Deserializer::from_reader(&mut self.reader);
            RawIssueRecord::deserialize(&mut de)
        };
        let record = decoded.map_err(|e| {
            if e.is_io() {
                DigestError::read(&self.path, std::io::Error::other(e))
            } else {
                self.format_error(format!("invalid issue record: {}", e))
            }
        })?;

        if record.key.is_empty() || record.rule_repo.is_empty() || record.rule_key.is_empty() {
            return Err(self.format_error("issue key and rule reference must not be empty"));
        }

        self.records_read += 1;
        Ok(record)
    }

    fn advance(&mut self) -> Result<Option<RawIssueRecord>, DigestError> {
        loop {
            match self.cursor {
                Cursor::Done => return Ok(None),
                Cursor::Start => {
                    self.expect_byte(b'[', "the issues array")?;
                    self.cursor = Cursor::FirstElement;
                }
                Cursor::FirstElement => {
                    if self.peek_significant()? == Some(b']') {
                        self.reader.consume(1);
                        self.finish()?;
                        return Ok(None);
                    }
                    let record = self.decode_element()?;
                    self.cursor = Cursor::AfterElement;
                    return Ok(Some(record));
                }
                Cursor::AfterElement => match self.peek_significant()? {
                    Some(b',') => {
                        self.reader.consume(1);
                        return self.decode_element().map(Some);
                    }
                    Some(b']') => {
                        self.reader.consume(1);
                        self.finish()?;
                        return Ok(None);
                    }
                    Some(b) => {
                        return Err(self.format_error(format!(
                            "expected ',' or ']' but found '{}'",
                            char::from(b)
                        )))
                    }
                    None => return Err(self.format_error("truncated issues array")),
                },
            }
        }
    }

    /// The closing `]` must be the last significant byte of the file.
    fn finish(&mut self) -> Result<(), DigestError> {
        self.cursor = Cursor::Done;
        match self.peek_significant()? {
            None => Ok(()),
            Some(_) => Err(self.format_error("unexpected content after the issues array")),
        }
    }
}

impl<R: BufRead> Iterator for IssueRecordDecoder<R> {
    type Item = Result<RawIssueRecord, DigestError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.cursor = Cursor::Done;
                Some(Err(e))
            }
        }
    }
}

impl<R: BufRead> std::iter::FusedIterator for IssueRecordDecoder<R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor as IoCursor;

    fn decode(json: &str) -> Vec<Result<RawIssueRecord, DigestError>> {
        IssueRecordDecoder::from_reader(IoCursor::new(json.as_bytes().to_vec()), Path::new("issues.json"))
            .collect()
    }

    fn record(key: &str) -> String {
        format!(r#"{{"key":"{}","ruleRepo":"squid","ruleKey":"S1"}}"#, key)
    }

    #[test]
    fn test_empty_array() {
        assert!(decode("[]").is_empty());
        assert!(decode("  [ \n ]  \n").is_empty());
    }

    #[test]
    fn test_records_in_order() {
        let json = format!("[{}, {},\n{}]", record("a"), record("b"), record("c"));
        let keys: Vec<String> = decode(&json).into_iter().map(|r| r.unwrap().key).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_nested_values_inside_record() {
        let json = r#"[{"key":"a","ruleRepo":"r","ruleKey":"k","extra":{"list":[1,2,{"x":"]"}]},"message":"a, b ] c"}]"#;
        let out = decode(json);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap().message.as_deref(), Some("a, b ] c"));
    }

    #[test]
    fn test_not_an_array() {
        let out = decode(&record("a"));
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Err(DigestError::Format { .. })));
    }

    #[test]
    fn test_truncated_array_fails_after_valid_prefix() {
        let json = format!("[{}, {}", record("a"), record("b"));
        let out = decode(&json);
        assert_eq!(out.len(), 3);
        assert!(out[0].is_ok());
        assert!(out[1].is_ok());
        assert!(matches!(out[2], Err(DigestError::Format { .. })));
    }

    #[test]
    fn test_truncated_record() {
        let json = format!(r#"[{}, {{"key":"b","ruleRe"#, record("a"));
        let out = decode(&json);
        assert_eq!(out.len(), 2);
        assert!(out[1].is_err());
    }

    #[test]
    fn test_missing_rule_key_fails_and_stops() {
        let json = format!(
            r#"[{}, {{"key":"b","ruleRepo":"squid"}}, {}]"#,
            record("a"),
            record("c")
        );
        let out = decode(&json);
        assert_eq!(out.len(), 2);
        match &out[1] {
            Err(DigestError::Format { reason, .. }) => assert!(reason.contains("after 1 records")),
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_comma_rejected() {
        let json = format!("[{},]", record("a"));
        let out = decode(&json);
        assert!(out.last().unwrap().is_err());
    }

    #[test]
    fn test_non_object_element_rejected() {
        let out = decode("[42]");
        assert_eq!(out.len(), 1);
        assert!(out[0].is_err());
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let json = format!("[{}] x", record("a"));
        let out = decode(&json);
        assert_eq!(out.len(), 2);
        assert!(out[1].is_err());
    }

    #[test]
    fn test_empty_rule_key_rejected() {
        let out = decode(r#"[{"key":"a","ruleRepo":"squid","ruleKey":""}]"#);
        assert!(out[0].is_err());
    }

    #[test]
    fn test_open_missing_file() {
        let err = IssueRecordDecoder::open(Path::new("/definitely/not/here/issues.json"))
            .err()
            .unwrap();
        assert!(matches!(err, DigestError::ResourceRead { .. }));
    }

    #[test]
    fn test_records_read_counter() {
        let json = format!("[{},{}]", record("a"), record("b"));
        let mut decoder =
            IssueRecordDecoder::from_reader(IoCursor::new(json.into_bytes()), Path::new("issues.json"));
        assert_eq!(decoder.records_read(), 0);
        decoder.next();
        assert_eq!(decoder.records_read(), 1);
        decoder.next();
        assert!(decoder.next().is_none());
        assert_eq!(decoder.records_read(), 2);
    }
}
