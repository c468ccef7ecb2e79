//! Single-use access to a request body.
//!
//! A body is read either as raw bytes ([`BodyStream`]) or as decoded text
//! ([`BodyReader`]), never both. The gate starts `Untouched`; the first open
//! picks the channel for the rest of the request's life. Opening the same
//! channel again hands back the same object, positioned wherever the previous
//! caller left it.

use crate::errors::{MockError, Result};
use crate::request::multipart::MultipartBody;
use encoding_rs::{Encoding, UTF_8};
use log::trace;
use std::fmt;
use std::io::{self, BufRead, Cursor, Read};

/// The two ways of consuming a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyChannel {
    Stream,
    Reader,
}

impl fmt::Display for BodyChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyChannel::Stream => write!(f, "stream"),
            BodyChannel::Reader => write!(f, "reader"),
        }
    }
}

/// Where body bytes come from once a channel is opened.
pub(crate) enum BodySource {
    Bytes(Vec<u8>),
    Multipart(MultipartBody),
    Stream(Box<dyn Read + Send + Sync>),
}

impl BodySource {
    fn len(&self) -> Option<u64> {
        match self {
            BodySource::Bytes(bytes) => Some(bytes.len() as u64),
            BodySource::Multipart(body) => Some(body.len()),
            BodySource::Stream(_) => None,
        }
    }
}

enum StreamInner {
    Bytes(Cursor<Vec<u8>>),
    Multipart(MultipartBody),
    Stream(Box<dyn Read + Send + Sync>),
}

/// Raw byte channel of a request body.
pub struct BodyStream {
    inner: StreamInner,
    len: Option<u64>,
}

impl BodyStream {
    fn new(source: BodySource) -> Self {
        let len = source.len();
        let inner = match source {
            BodySource::Bytes(bytes) => StreamInner::Bytes(Cursor::new(bytes)),
            BodySource::Multipart(body) => StreamInner::Multipart(body),
            BodySource::Stream(stream) => StreamInner::Stream(stream),
        };
        Self { inner, len }
    }

    /// Total length when known up front. Test-supplied streams have none.
    pub fn len(&self) -> Option<u64> {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == Some(0)
    }

    /// Drains the rest of the stream.
    pub fn read_remaining(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.read_to_end(&mut out).map_err(MockError::BodyRead)?;
        Ok(out)
    }
}

impl Read for BodyStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            StreamInner::Bytes(cursor) => cursor.read(buf),
            StreamInner::Multipart(body) => body.read(buf),
            StreamInner::Stream(stream) => stream.read(buf),
        }
    }
}

impl fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.inner {
            StreamInner::Bytes(_) => "bytes",
            StreamInner::Multipart(_) => "multipart",
            StreamInner::Stream(_) => "stream",
        };
        f.debug_struct("BodyStream")
            .field("source", &kind)
            .field("len", &self.len)
            .finish()
    }
}

/// Decoded text channel of a request body.
///
/// The whole body is decoded when the reader is opened.
pub struct BodyReader {
    cursor: Cursor<String>,
    encoding: &'static Encoding,
    raw_len: u64,
}

impl BodyReader {
    fn decode(source: BodySource, encoding: &'static Encoding) -> Result<Self> {
        let bytes = match source {
            BodySource::Bytes(bytes) => bytes,
            BodySource::Multipart(body) => body.to_bytes(),
            BodySource::Stream(mut stream) => {
                let mut bytes = Vec::new();
                stream.read_to_end(&mut bytes).map_err(MockError::BodyRead)?;
                bytes
            }
        };

        let (text, _, had_errors) = encoding.decode(&bytes);
        if had_errors {
            trace!("body is not valid {}, replaced malformed sequences", encoding.name());
        }

        Ok(Self {
            cursor: Cursor::new(text.into_owned()),
            encoding,
            raw_len: bytes.len() as u64,
        })
    }

    /// The complete decoded body, regardless of how much was read.
    pub fn as_str(&self) -> &str {
        self.cursor.get_ref()
    }

    /// Name of the encoding the body was decoded with.
    pub fn encoding(&self) -> &'static str {
        self.encoding.name()
    }

    /// Reads the rest of the text.
    pub fn read_remaining(&mut self) -> Result<String> {
        let mut out = String::new();
        self.read_to_string(&mut out).map_err(MockError::BodyRead)?;
        Ok(out)
    }
}

impl Read for BodyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl BufRead for BodyReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.cursor.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.cursor.consume(amt)
    }
}

impl fmt::Debug for BodyReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyReader")
            .field("encoding", &self.encoding.name())
            .field("position", &self.cursor.position())
            .field("len", &self.cursor.get_ref().len())
            .finish()
    }
}

/// Resolves a charset label, UTF-8 when none is given.
pub(crate) fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        None => Ok(UTF_8),
        Some(label) => Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| MockError::UnknownEncoding(label.to_string())),
    }
}

enum BodyState {
    Untouched,
    StreamOpened(BodyStream),
    ReaderOpened(BodyReader),
}

/// Tracks which channel, if any, a request body was opened through.
pub(crate) struct BodyGate {
    state: BodyState,
    explicit: Option<BodySource>,
}

impl Default for BodyGate {
    fn default() -> Self {
        Self {
            state: BodyState::Untouched,
            explicit: None,
        }
    }
}

impl BodyGate {
    pub(crate) fn is_untouched(&self) -> bool {
        matches!(self.state, BodyState::Untouched)
    }

    pub(crate) fn has_explicit(&self) -> bool {
        self.explicit.is_some()
    }

    /// Channel the body was opened through.
    pub(crate) fn opened(&self) -> Option<BodyChannel> {
        match self.state {
            BodyState::Untouched => None,
            BodyState::StreamOpened(_) => Some(BodyChannel::Stream),
            BodyState::ReaderOpened(_) => Some(BodyChannel::Reader),
        }
    }

    pub(crate) fn ensure_untouched(&self) -> Result<()> {
        if self.is_untouched() {
            Ok(())
        } else {
            Err(MockError::BodyAlreadyConsumed)
        }
    }

    /// Supplies the body explicitly. Replaces an earlier explicit body.
    pub(crate) fn supply(&mut self, source: BodySource) -> Result<()> {
        self.ensure_untouched()?;
        self.explicit = Some(source);
        Ok(())
    }

    /// Opens the raw byte channel. `resolve` runs at most once, on the first
    /// successful open, and only when no explicit body was supplied.
    pub(crate) fn open_stream<F>(&mut self, resolve: F) -> Result<&mut BodyStream>
    where
        F: FnOnce() -> Result<BodySource>,
    {
        if let BodyState::Untouched = self.state {
            let source = match self.explicit.take() {
                Some(source) => source,
                None => resolve()?,
            };
            trace!("request body opened as stream");
            self.state = BodyState::StreamOpened(BodyStream::new(source));
        }

        match &mut self.state {
            BodyState::StreamOpened(stream) => Ok(stream),
            _ => Err(MockError::AlreadyConsumed {
                opened: BodyChannel::Reader,
            }),
        }
    }

    /// Opens the decoded text channel. An unknown `encoding` label fails
    /// before anything is consumed.
    pub(crate) fn open_reader<F>(
        &mut self,
        encoding: Option<&str>,
        resolve: F,
    ) -> Result<&mut BodyReader>
    where
        F: FnOnce() -> Result<BodySource>,
    {
        if let BodyState::Untouched = self.state {
            let encoding = resolve_encoding(encoding)?;
            let source = match self.explicit.take() {
                Some(source) => source,
                None => resolve()?,
            };
            trace!("request body opened as {} reader", encoding.name());
            self.state = BodyState::ReaderOpened(BodyReader::decode(source, encoding)?);
        }

        match &mut self.state {
            BodyState::ReaderOpened(reader) => Ok(reader),
            _ => Err(MockError::AlreadyConsumed {
                opened: BodyChannel::Stream,
            }),
        }
    }

    /// Length of the body in bytes, when known without consuming anything.
    pub(crate) fn len(&self) -> Option<u64> {
        match &self.state {
            BodyState::Untouched => self.explicit.as_ref().and_then(BodySource::len),
            BodyState::StreamOpened(stream) => stream.len(),
            BodyState::ReaderOpened(reader) => Some(reader.raw_len),
        }
    }
}

impl fmt::Debug for BodyGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyGate")
            .field("opened", &self.opened())
            .field("explicit", &self.explicit.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn bytes(b: &[u8]) -> impl FnOnce() -> Result<BodySource> + '_ {
        move || Ok(BodySource::Bytes(b.to_vec()))
    }

    #[test]
    fn stream_reopen_continues_where_it_left_off() {
        let mut gate = BodyGate::default();
        let calls = Cell::new(0);
        let resolve = || {
            calls.set(calls.get() + 1);
            Ok(BodySource::Bytes(b"abcdef".to_vec()))
        };

        let mut first = [0u8; 3];
        gate.open_stream(resolve).unwrap().read_exact(&mut first).unwrap();
        assert_eq!(&first, b"abc");

        let rest = gate
            .open_stream(|| panic!("resolved twice"))
            .unwrap()
            .read_remaining()
            .unwrap();
        assert_eq!(rest, b"def");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn opposite_channel_fails_both_ways() {
        let mut gate = BodyGate::default();
        gate.open_stream(bytes(b"x")).unwrap();
        let err = gate.open_reader(None, bytes(b"x")).unwrap_err();
        assert!(matches!(
            err,
            MockError::AlreadyConsumed {
                opened: BodyChannel::Stream
            }
        ));

        let mut gate = BodyGate::default();
        gate.open_reader(None, bytes(b"x")).unwrap();
        let err = gate.open_stream(bytes(b"x")).unwrap_err();
        assert!(matches!(
            err,
            MockError::AlreadyConsumed {
                opened: BodyChannel::Reader
            }
        ));
        assert_eq!(err.to_string(), "Request body already opened as reader");
    }

    #[test]
    fn explicit_body_wins_over_resolver() {
        let mut gate = BodyGate::default();
        gate.supply(BodySource::Bytes(b"explicit".to_vec())).unwrap();
        assert_eq!(gate.len(), Some(8));

        let text = gate
            .open_reader(None, || panic!("explicit body ignored"))
            .unwrap()
            .read_remaining()
            .unwrap();
        assert_eq!(text, "explicit");
        assert!(matches!(
            gate.supply(BodySource::Bytes(Vec::new())),
            Err(MockError::BodyAlreadyConsumed)
        ));
    }

    #[test]
    fn reader_decodes_with_requested_charset() {
        let mut gate = BodyGate::default();
        let reader = gate
            .open_reader(Some("ISO-8859-1"), bytes(&[0x63, 0x61, 0x66, 0xe9]))
            .unwrap();
        assert_eq!(reader.as_str(), "café");
        assert_eq!(reader.encoding(), "windows-1252");

        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line, "café");
    }

    #[test]
    fn unknown_charset_leaves_gate_untouched() {
        let mut gate = BodyGate::default();
        let err = gate.open_reader(Some("klingon"), bytes(b"x")).unwrap_err();
        assert!(matches!(err, MockError::UnknownEncoding(label) if label == "klingon"));
        assert!(gate.is_untouched());
        assert!(gate.open_stream(bytes(b"x")).is_ok());
    }

    #[test]
    fn failed_resolution_leaves_gate_untouched() {
        let mut gate = BodyGate::default();
        let err = gate
            .open_stream(|| Err(MockError::InvalidAttachment("gone".into())))
            .unwrap_err();
        assert!(matches!(err, MockError::InvalidAttachment(_)));
        assert_eq!(gate.opened(), None);
    }

    #[test]
    fn supplied_stream_has_unknown_length() {
        let mut gate = BodyGate::default();
        gate.supply(BodySource::Stream(Box::new(Cursor::new(b"streamed".to_vec()))))
            .unwrap();
        assert_eq!(gate.len(), None);

        let stream = gate.open_stream(bytes(b"")).unwrap();
        assert_eq!(stream.len(), None);
        assert_eq!(stream.read_remaining().unwrap(), b"streamed");
    }
}
