//! Trace decoding.
//!
//! A trace is a gzip stream (possibly multi-member) holding a sequence of JSON
//! objects, one per record, not wrapped in an array.

use crate::error::StreamError;
use flate2::read::MultiGzDecoder;
use kvtrace_core::Operation;
use serde_json::de::IoRead;
use serde_json::StreamDeserializer;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Lazy decoder over a compressed trace
pub struct TraceDecoder<R: Read> {
    records: StreamDeserializer<'static, IoRead<MultiGzDecoder<R>>, Operation>,
    decoded: u64,
    failed: bool,
}

impl<R: Read> TraceDecoder<R> {
    /// Decode records from a gzip-compressed reader
    pub fn new(reader: R) -> Self {
        let gz = MultiGzDecoder::new(reader);
        Self {
            records: serde_json::Deserializer::from_reader(gz).into_iter::<Operation>(),
            decoded: 0,
            failed: false,
        }
    }

    /// Records decoded so far
    #[must_use]
    pub fn decoded(&self) -> u64 {
        self.decoded
    }
}

impl<R: Read> Iterator for TraceDecoder<R> {
    type Item = Result<Operation, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.records.next()? {
            Ok(op) => {
                self.decoded += 1;
                Some(Ok(op))
            }
            Err(err) => {
                // The deserializer cannot resync after a bad record.
                self.failed = true;
                Some(Err(StreamError::Decode {
                    record: self.decoded,
                    reason: err.to_string(),
                }))
            }
        }
    }
}

/// Open a trace file, checking the gzip magic before any decoding starts
///
/// # Errors
///
/// Returns error if the file cannot be read or is not gzip-compressed
pub fn open_trace(path: &Path) -> Result<TraceDecoder<BufReader<File>>, StreamError> {
    let file = File::open(path).map_err(|source| StreamError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    let head = reader.fill_buf().map_err(|source| StreamError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    if !head.starts_with(&GZIP_MAGIC) {
        return Err(StreamError::NotGzip {
            path: path.to_path_buf(),
        });
    }
    Ok(TraceDecoder::new(reader))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::TraceWriter;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use kvtrace_core::OpKind;
    use std::io::{Cursor, Write};

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_decode_written_trace() {
        let ops = vec![
            Operation::new("S001", OpKind::DbOpen),
            Operation::new("S001", OpKind::Set).with_key("a").with_value("1"),
            Operation::new("S001", OpKind::DbClose),
        ];
        let mut writer = TraceWriter::new(Vec::new());
        for op in &ops {
            writer.write(op).unwrap();
        }
        let bytes = writer.finish().unwrap();

        let decoded: Vec<Operation> = TraceDecoder::new(Cursor::new(bytes))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(decoded, ops);
    }

    #[test]
    fn test_decode_concatenated_objects() {
        let bytes = gzip(r#"{"id":"S001","op":"dbOpen"}{"id":"S001","op":"get","key":"k"}"#);
        let decoded: Vec<_> = TraceDecoder::new(Cursor::new(bytes)).collect();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[1].as_ref().unwrap().op, OpKind::Get);
    }

    #[test]
    fn test_decode_stops_after_bad_record() {
        let bytes = gzip("{\"id\":\"S001\",\"op\":\"dbOpen\"}\n{\"id\":\"S001\",\"op\":\n");
        let mut decoder = TraceDecoder::new(Cursor::new(bytes));

        assert!(decoder.next().unwrap().is_ok());
        match decoder.next() {
            Some(Err(StreamError::Decode { record, .. })) => assert_eq!(record, 1),
            other => panic!("expected decode error, got {:?}", other.map(|r| r.is_ok())),
        }
        assert!(decoder.next().is_none());
        assert_eq!(decoder.decoded(), 1);
    }

    #[test]
    fn test_decode_multi_member() {
        let mut bytes = gzip("{\"id\":\"S001\",\"op\":\"dbOpen\"}\n");
        bytes.extend(gzip("{\"id\":\"S001\",\"op\":\"dbClose\"}\n"));
        let decoded: Vec<Operation> = TraceDecoder::new(Cursor::new(bytes))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[1].op, OpKind::DbClose);
    }

    #[test]
    fn test_open_trace_rejects_plain_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wal.json.gz");
        std::fs::write(&path, br#"{"id":"S001","op":"dbOpen"}"#).unwrap();

        assert!(matches!(open_trace(&path), Err(StreamError::NotGzip { .. })));
    }

    #[test]
    fn test_open_trace_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = open_trace(&dir.path().join("absent.json.gz"));
        assert!(matches!(result, Err(StreamError::Open { .. })));
    }

    #[test]
    fn test_open_trace_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wal.json.gz");
        std::fs::write(&path, gzip("{\"id\":\"S001\",\"op\":\"dbOpen\"}\n")).unwrap();

        let decoded: Vec<_> = open_trace(&path).unwrap().collect();
        assert_eq!(decoded.len(), 1);
    }
}
