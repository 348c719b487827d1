//! Content-encoding negotiation for cached responses.

use std::io::{self, Write};

use flate2::{Compression, write::GzEncoder};

/// Returns true when the `Accept-Encoding` value lists `gzip` as a token.
///
/// Tokens are split on `,` and trimmed; parameters such as `;q=` are not
/// interpreted, so `gzip;q=0.5` does not count.
pub fn accepts_gzip(accept_encoding: Option<&str>) -> bool {
    accept_encoding.is_some_and(|value| value.split(',').map(str::trim).any(|t| t == "gzip"))
}

/// Gzip-encode `content` at the default compression level.
pub fn gzip(content: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content)?;
    encoder.finish()
}
