//! Log setup with secret redaction
//!
//! Everything written by the `tracing` subscriber passes through
//! [`RedactingWriter`], which masks API hashes, phone numbers and serialized
//! session blobs before they reach stderr.

// lazy_regex! statics are validated at compile time
#![allow(clippy::non_std_lazy_statics)]

use lazy_regex::lazy_regex;
use std::io::{self, Write};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Telegram API hash: 32 lowercase hex characters
static RE_API_HASH: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"\b[0-9a-f]{32}\b");

/// International phone number
static RE_PHONE: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"\+\d[\d \-]{6,18}\d");

/// Long base64 run, as produced by session serialization
static RE_SESSION_BLOB: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"[A-Za-z0-9+/]{96,}={0,2}");

/// Mask secrets in one chunk of log output
#[must_use]
pub fn redact(input: &str) -> String {
    let output = RE_SESSION_BLOB.replace_all(input, "[SESSION]");
    let output = RE_API_HASH.replace_all(&output, "[API_HASH]");
    RE_PHONE.replace_all(&output, "[PHONE]").into_owned()
}

/// Writer that redacts everything passing through it
pub struct RedactingWriter<W: Write> {
    inner: W,
}

impl<W: Write> RedactingWriter<W> {
    /// Wrap `inner`
    pub const fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        self.inner.write_all(redact(&s).as_bytes())?;
        // Report the original length: the caller's buffer was fully consumed.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)())
    }
}

/// Install the global subscriber (`RUST_LOG` filter, default `info`)
pub fn init() {
    let make_writer = RedactingMakeWriter {
        make_inner: io::stderr,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}
