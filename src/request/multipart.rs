//! `multipart/form-data` body synthesizer.
//!
//! Turns the fields and attachments of a request into the exact bytes a browser
//! would have sent, so code under test can run them through a real multipart
//! parser. Layout:
//!
//! ```text
//! --<boundary>\r\n
//! Content-Disposition: form-data; name="<field>"\r\n
//! \r\n
//! <value>\r\n
//! --<boundary>\r\n
//! Content-Disposition: form-data; name="<field>"; filename="<file name>"\r\n
//! Content-Type: <declared type>\r\n
//! \r\n
//! <file bytes>\r\n
//! --<boundary>--\r\n
//! ```
//!
//! One part per field value comes first, then one part per attachment. The
//! boundary is a fixed literal so fixtures are reproducible.

use crate::errors::Result;
use crate::request::fields::{AttachmentStore, FieldStore};
use log::debug;
use std::io::{self, Read};

/// Boundary shared by every synthesized body.
pub const MULTIPART_BOUNDARY: &str = "primeframeworkmultipartuploadLKAlskld09309djoid";

/// Content type announced for requests carrying attachments.
pub const MULTIPART_CONTENT_TYPE: &str =
    "multipart/form-data, boundary=primeframeworkmultipartuploadLKAlskld09309djoid";

/// A synthesized body, read front to back through [`Read`].
///
/// File contents are read when the body is built and kept as separate
/// segments, so reading does not concatenate them into one buffer.
#[derive(Debug, Clone)]
pub struct MultipartBody {
    segments: Vec<Vec<u8>>,
    segment: usize,
    offset: usize,
    len: u64,
}

impl MultipartBody {
    /// Builds the body. Fails without producing any bytes when an attachment's
    /// source can no longer be read.
    pub fn synthesize(fields: &FieldStore, attachments: &AttachmentStore) -> Result<Self> {
        let mut segments = Vec::new();

        for (name, value) in fields.pairs() {
            let mut part = format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n",
                escape_quoted(name)
            )
            .into_bytes();
            part.extend_from_slice(value.as_bytes());
            part.extend_from_slice(b"\r\n");
            segments.push(part);
        }

        for attachment in attachments.iter() {
            let content = attachment.read()?;
            segments.push(
                format!(
                    "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    escape_quoted(attachment.name()),
                    escape_quoted(attachment.file_name()),
                    attachment.content_type()
                )
                .into_bytes(),
            );
            segments.push(content);
            segments.push(b"\r\n".to_vec());
        }

        segments.push(format!("--{MULTIPART_BOUNDARY}--\r\n").into_bytes());

        let len = segments.iter().map(|s| s.len() as u64).sum();
        debug!(
            "synthesized multipart body: {} fields, {} attachments, {len} bytes",
            fields.pairs().count(),
            attachments.len()
        );

        Ok(Self {
            segments,
            segment: 0,
            offset: 0,
            len,
        })
    }

    /// Total length in bytes, independent of how much was read.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// A body always holds at least the closing delimiter.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The full body as one buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.segments.concat()
    }
}

impl Read for MultipartBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut written = 0;
        while written < buf.len() {
            let Some(segment) = self.segments.get(self.segment) else {
                break;
            };
            let remaining = &segment[self.offset..];
            let n = remaining.len().min(buf.len() - written);
            buf[written..written + n].copy_from_slice(&remaining[..n]);
            written += n;
            self.offset += n;
            if self.offset == segment.len() {
                self.segment += 1;
                self.offset = 0;
            }
        }
        Ok(written)
    }
}

// Quotes are backslash-escaped so parsers hand the name back unchanged. Line
// breaks cannot be escaped that way and are percent-encoded, which is lossy.
fn escape_quoted(s: &str) -> String {
    s.replace('"', "\\\"").replace('\r', "%0D").replace('\n', "%0A")
}
