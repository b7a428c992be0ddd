// SPDX-License-Identifier: MIT OR Apache-2.0

//! Minimal HTTP/1.x message framing: start line, header fields, body.
//!
//! HTTP rides over TCP, so a single captured segment frequently holds an
//! incomplete message; accessors are therefore best-effort over whatever
//! text is present, and validation imposes no structural requirements.

use crate::error::*;
use crate::utils;

use super::dev_traits::*;
use super::traits::*;

/// The first line of an HTTP message.
#[derive(Clone, Debug, PartialEq)]
pub enum HttpStartLine {
    Request {
        method: String,
        uri: String,
        version: String,
    },
    Response {
        version: String,
        status_code: u16,
        reason: String,
    },
}

impl HttpStartLine {
    fn parse(line: &str) -> Option<HttpStartLine> {
        let mut parts = line.splitn(3, ' ');
        let first = parts.next()?;
        let second = parts.next()?;
        let third = parts.next().unwrap_or("");

        if let Some(version) = first.strip_prefix("HTTP/") {
            Some(HttpStartLine::Response {
                version: version.to_string(),
                status_code: second.parse().ok()?,
                reason: third.to_string(),
            })
        } else if third.strip_prefix("HTTP/").is_some() {
            Some(HttpStartLine::Request {
                method: first.to_string(),
                uri: second.to_string(),
                version: third.trim_start_matches("HTTP/").to_string(),
            })
        } else {
            None
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        match self {
            HttpStartLine::Request {
                method,
                uri,
                version,
            } => {
                out.extend_from_slice(method.as_bytes());
                out.push(b' ');
                out.extend_from_slice(uri.as_bytes());
                out.extend_from_slice(b" HTTP/");
                out.extend_from_slice(version.as_bytes());
            }
            HttpStartLine::Response {
                version,
                status_code,
                reason,
            } => {
                out.extend_from_slice(b"HTTP/");
                out.extend_from_slice(version.as_bytes());
                out.extend_from_slice(format!(" {status_code} ").as_bytes());
                out.extend_from_slice(reason.as_bytes());
            }
        }
    }
}

/// An HTTP message.
///
/// A message with no start line serializes as a bare body, which is how
/// mid-stream segment captures re-serialize unchanged.
#[derive(Clone, Debug, PartialEq)]
pub struct Http {
    start_line: Option<HttpStartLine>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Http {
    pub fn request(method: &str, uri: &str, version: &str) -> Self {
        Http {
            start_line: Some(HttpStartLine::Request {
                method: method.to_string(),
                uri: uri.to_string(),
                version: version.to_string(),
            }),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn response(version: &str, status_code: u16, reason: &str) -> Self {
        Http {
            start_line: Some(HttpStartLine::Response {
                version: version.to_string(),
                status_code,
                reason: reason.to_string(),
            }),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    #[inline]
    pub fn start_line(&self) -> Option<&HttpStartLine> {
        self.start_line.as_ref()
    }

    #[inline]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn add_header(&mut self, field: &str, value: &str) {
        self.headers.push((field.to_string(), value.to_string()));
    }

    /// The first value of the named header field, compared
    /// case-insensitively.
    pub fn header(&self, field: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(field))
            .map(|(_, value)| value.as_str())
    }

    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[inline]
    pub fn set_body(&mut self, body: Vec<u8>) {
        self.body = body;
    }
}

layer_identity!(Http, HttpRef, "Http");

impl LayerLength for Http {
    fn len(&self) -> usize {
        let mut bytes = Vec::new();
        self.write_text(&mut bytes);
        bytes.len()
    }
}

impl Http {
    fn write_text(&self, bytes: &mut Vec<u8>) {
        if let Some(start_line) = &self.start_line {
            start_line.write(bytes);
            bytes.extend_from_slice(b"\r\n");
            for (field, value) in &self.headers {
                bytes.extend_from_slice(field.as_bytes());
                bytes.extend_from_slice(b": ");
                bytes.extend_from_slice(value.as_bytes());
                bytes.extend_from_slice(b"\r\n");
            }
            bytes.extend_from_slice(b"\r\n");
        }
        bytes.extend_from_slice(&self.body);
    }
}

impl LayerObject for Http {
    #[inline]
    fn layer_name(&self) -> &'static str {
        Self::name()
    }

    #[inline]
    fn can_add_payload_default(&self, _payload: &dyn LayerObject) -> bool {
        false
    }

    #[inline]
    fn payload(&self) -> Option<&dyn LayerObject> {
        None
    }

    #[inline]
    fn payload_mut(&mut self) -> Option<&mut dyn LayerObject> {
        None
    }

    #[inline]
    fn set_payload_unchecked(&mut self, _payload: Box<dyn LayerObject>) {
        panic!("set_payload_unchecked() called on Http layer, which cannot hold a payload")
    }

    #[inline]
    fn remove_payload(&mut self) -> Option<Box<dyn LayerObject>> {
        None
    }

    #[inline]
    fn to_boxed_layer(&self) -> Box<dyn LayerObject> {
        Box::new(self.clone())
    }

    #[inline]
    fn compare(&self, other: &dyn LayerObject) -> bool {
        other.as_any().downcast_ref::<Self>().is_some_and(|o| self == o)
    }
}

impl Layer for Http {}

impl ToBytes for Http {
    #[inline]
    fn to_bytes_checksummed(
        &self,
        bytes: &mut Vec<u8>,
        _prev: Option<(LayerId, usize)>,
    ) -> Result<(), SerializationError> {
        self.write_text(bytes);
        Ok(())
    }
}

impl FromBytesCurrent for Http {
    fn from_bytes_current_layer_unchecked(bytes: &[u8]) -> Self {
        let http = HttpRef::from_bytes_unchecked(bytes);
        match http.start_line() {
            Some(start_line) => Http {
                start_line: Some(start_line),
                headers: http
                    .header_fields()
                    .map(|(f, v)| (f.to_string(), v.to_string()))
                    .collect(),
                body: http.body().to_vec(),
            },
            // Not the start of a message: keep the bytes untouched as body.
            None => Http {
                start_line: None,
                headers: Vec::new(),
                body: bytes.to_vec(),
            },
        }
    }

    #[inline]
    fn payload_from_bytes_unchecked_default(&mut self, _bytes: &[u8]) {}
}

/// A view of an HTTP message.
#[derive(Clone, Copy, Debug)]
pub struct HttpRef<'a> {
    data: &'a [u8],
}

impl<'a> HttpRef<'a> {
    /// The parsed start line, or `None` when the text does not begin with
    /// one.
    pub fn start_line(&self) -> Option<HttpStartLine> {
        let line = self.lines().next()?;
        HttpStartLine::parse(core::str::from_utf8(line).ok()?)
    }

    /// Whether the message begins with a request line.
    #[inline]
    pub fn is_request(&self) -> bool {
        matches!(self.start_line(), Some(HttpStartLine::Request { .. }))
    }

    /// Whether the message begins with a status line.
    #[inline]
    pub fn is_response(&self) -> bool {
        matches!(self.start_line(), Some(HttpStartLine::Response { .. }))
    }

    /// The header fields following the start line, up to the first empty
    /// line.
    pub fn header_fields(&self) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.lines()
            .skip(1)
            .take_while(|line| !line.is_empty())
            .filter_map(|line| {
                let text = core::str::from_utf8(line).ok()?;
                let (field, value) = text.split_once(':')?;
                Some((field.trim(), value.trim()))
            })
    }

    /// The first value of the named header field, compared
    /// case-insensitively.
    pub fn header(&self, field: &str) -> Option<&'a str> {
        self.header_fields()
            .find(|(name, _)| name.eq_ignore_ascii_case(field))
            .map(|(_, value)| value)
    }

    /// The bytes after the header terminator, or the empty slice when no
    /// terminator is present.
    pub fn body(&self) -> &'a [u8] {
        match utils::find_bytes(self.data, b"\r\n\r\n") {
            Some(idx) => &self.data[idx + 4..],
            None => &[],
        }
    }

    fn lines(&self) -> impl Iterator<Item = &'a [u8]> {
        let head = match utils::find_bytes(self.data, b"\r\n\r\n") {
            Some(idx) => &self.data[..idx],
            None => self.data,
        };
        head.split(|&b| b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
    }
}

impl<'a> FromBytesRef<'a> for HttpRef<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        HttpRef { data: bytes }
    }
}

impl LayerOffset for HttpRef<'_> {
    #[inline]
    fn payload_byte_index_default(_bytes: &[u8], _layer_type: LayerId) -> Option<usize> {
        None
    }
}

impl Validate for HttpRef<'_> {
    /// HTTP content is free text at this level; a captured segment may
    /// hold any fragment of a message, so nothing is structurally
    /// required.
    #[inline]
    fn validate_current_layer(_curr_layer: &[u8]) -> Result<(), ValidationError> {
        Ok(())
    }

    #[inline]
    fn validate_payload_default(_curr_layer: &[u8]) -> Result<(), ValidationError> {
        Ok(())
    }
}

impl ToLayer for HttpRef<'_> {
    type Owned = Http;

    #[inline]
    fn to_layer(&self) -> Http {
        Http::from_bytes_unchecked(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trip() {
        let mut http = Http::request("GET", "/index.html", "1.1");
        http.add_header("Host", "example.com");
        http.add_header("Accept", "*/*");
        let bytes = http.to_bytes().unwrap();
        assert!(bytes.starts_with(b"GET /index.html HTTP/1.1\r\n"));

        let parsed = HttpRef::from_bytes_unchecked(&bytes);
        assert!(parsed.is_request());
        assert_eq!(parsed.header("host"), Some("example.com"));
        assert_eq!(parsed.to_layer(), http);
    }

    #[test]
    fn response_with_body_round_trip() {
        let mut http = Http::response("1.0", 404, "Not Found");
        http.add_header("Content-Length", "5");
        http.set_body(b"oops\n".to_vec());
        let bytes = http.to_bytes().unwrap();

        let parsed = HttpRef::from_bytes_unchecked(&bytes);
        assert!(parsed.is_response());
        assert_eq!(parsed.body(), b"oops\n");
        assert_eq!(parsed.to_layer(), http);
    }

    #[test]
    fn mid_stream_fragment_keeps_bytes() {
        let fragment = b"partial body with no start line";
        let parsed = Http::from_bytes_unchecked(fragment);
        assert_eq!(parsed.start_line(), None);
        assert_eq!(parsed.to_bytes().unwrap(), fragment);
    }
}
