//! Single-attempt streaming HTTP GET into a caller-provided sink.
//!
//! Uses the curl crate (libcurl). The body is handed to the sink chunk by
//! chunk as libcurl receives it, so memory stays bounded by the receive
//! buffer whatever the content length.
//!
//! The timeout covers connecting and waiting for the server to start
//! responding, and is re-armed for every hop of a redirect chain. Once the
//! final response has started the transfer may run for as long as data keeps
//! coming; no overall deadline is set.

mod error;

pub use error::TransferError;

use std::cell::{Cell, RefCell};
use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Receive buffer handed to libcurl; bodies reach the sink in chunks of at most this size.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Default connect/first-byte timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest timeout libcurl accepts everywhere (milliseconds in a 32-bit `long`).
pub const MAX_TIMEOUT_SECS: u64 = i32::MAX as u64 / 1000;

const MAX_REDIRECTS: u32 = 10;

/// Per-request transfer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    /// Bound on connect and on waiting for the first response byte.
    pub timeout: Duration,
    /// Verify the server certificate chain and hostname (HTTPS).
    pub verify_tls: bool,
    /// libcurl receive buffer size in bytes (libcurl clamps it to its own limits).
    pub chunk_size: usize,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            verify_tls: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Downloads `url` into `sink` with a single GET. Returns the number of body bytes written.
///
/// Only `http` and `https` URLs are accepted. Redirects are followed. A final
/// status outside 2xx fails with [`TransferError::HttpStatus`] and writes no
/// body bytes. No retries.
pub fn download(
    url: &str,
    sink: &mut dyn Write,
    options: &TransferOptions,
) -> Result<u64, TransferError> {
    let request_url = request_url(url)?;

    let status = Cell::new(0u32);
    let responded = Cell::new(false);
    let waiting_since = Cell::new(Instant::now());
    let watchdog_fired = Cell::new(false);
    let written = Cell::new(0u64);
    let sink_error: RefCell<Option<io::Error>> = RefCell::new(None);

    let mut easy = curl::easy::Easy::new();
    easy.url(request_url.as_str())
        .map_err(TransferError::Transport)?;
    easy.follow_location(true).map_err(TransferError::Transport)?;
    easy.max_redirections(MAX_REDIRECTS)
        .map_err(TransferError::Transport)?;
    // 4xx/5xx end the transfer before any body is delivered.
    easy.fail_on_error(true).map_err(TransferError::Transport)?;
    easy.connect_timeout(options.timeout)
        .map_err(TransferError::Transport)?;
    easy.buffer_size(options.chunk_size)
        .map_err(TransferError::Transport)?;
    easy.progress(true).map_err(TransferError::Transport)?;
    if !options.verify_tls {
        easy.ssl_verify_peer(false).map_err(TransferError::Transport)?;
        easy.ssl_verify_host(false).map_err(TransferError::Transport)?;
    }

    let first_byte_timeout = options.timeout;
    waiting_since.set(Instant::now());
    let performed = {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|line| {
                responded.set(true);
                if let Some(code) = parse_status_line(line) {
                    status.set(code);
                } else if is_end_of_headers(line) && is_interim(status.get()) {
                    // libcurl sends another request (or waits for the final
                    // response): wait for that one to start again.
                    responded.set(false);
                    waiting_since.set(Instant::now());
                }
                true
            })
            .map_err(TransferError::Transport)?;
        transfer
            .write_function(|data| {
                responded.set(true);
                if !is_success(status.get()) {
                    // Body of a non-2xx response (e.g. a final 3xx): drop it.
                    return Ok(data.len());
                }
                match sink.write_all(data) {
                    Ok(()) => {
                        written.set(written.get() + data.len() as u64);
                        Ok(data.len())
                    }
                    Err(e) => {
                        *sink_error.borrow_mut() = Some(e);
                        Ok(0) // abort transfer
                    }
                }
            })
            .map_err(TransferError::Transport)?;
        transfer
            .progress_function(|_, _, _, _| {
                if responded.get() || waiting_since.get().elapsed() < first_byte_timeout {
                    return true;
                }
                watchdog_fired.set(true);
                false
            })
            .map_err(TransferError::Transport)?;
        transfer.perform()
    };

    if let Err(e) = performed {
        if e.is_write_error() {
            if let Some(io_err) = sink_error.borrow_mut().take() {
                return Err(TransferError::Sink(io_err));
            }
        }
        if e.is_http_returned_error() {
            let code = easy.response_code().unwrap_or(status.get());
            return Err(TransferError::HttpStatus { status: code });
        }
        return Err(TransferError::from_curl(e, watchdog_fired.get()));
    }

    let code = easy.response_code().map_err(TransferError::Transport)?;
    if !is_success(code) {
        return Err(TransferError::HttpStatus { status: code });
    }
    sink.flush().map_err(TransferError::Sink)?;

    let written = written.get();
    tracing::debug!(url = %url, bytes = written, "transfer complete");
    Ok(written)
}

/// Something that can fetch a URL into a sink. Implemented by [`CurlTransfer`]
/// and by any `Fn(&str, &mut dyn Write) -> anyhow::Result<()>`.
///
/// Errors that are [`TransferError`] or [`std::io::Error`] count as ordinary
/// transfer failures; anything else is treated as unexpected.
pub trait Transfer: Sync {
    fn transfer(&self, url: &str, sink: &mut dyn Write) -> anyhow::Result<()>;
}

impl<F> Transfer for F
where
    F: Fn(&str, &mut dyn Write) -> anyhow::Result<()> + Sync,
{
    fn transfer(&self, url: &str, sink: &mut dyn Write) -> anyhow::Result<()> {
        self(url, sink)
    }
}

/// [`download`] with fixed options.
#[derive(Debug, Clone, Default)]
pub struct CurlTransfer {
    options: TransferOptions,
}

impl CurlTransfer {
    pub fn new(options: TransferOptions) -> Self {
        Self { options }
    }
}

impl Transfer for CurlTransfer {
    fn transfer(&self, url: &str, sink: &mut dyn Write) -> anyhow::Result<()> {
        download(url, sink, &self.options)?;
        Ok(())
    }
}

fn is_success(code: u32) -> bool {
    (200..300).contains(&code)
}

/// 1xx and 3xx: another response follows on a re-armed watchdog. A 3xx that
/// libcurl does not follow ends the transfer anyway.
fn is_interim(code: u32) -> bool {
    (100..200).contains(&code) || (300..400).contains(&code)
}

fn is_end_of_headers(line: &[u8]) -> bool {
    line == b"\r\n" || line == b"\n"
}

/// The URL as sent on the wire: percent-encoded by `url` (spaces and
/// non-ASCII in the path are legal in the input list but not for libcurl).
/// Only `http` and `https` are fetched.
fn request_url(url: &str) -> Result<url::Url, TransferError> {
    let parsed = url::Url::parse(url).map_err(|_| {
        TransferError::Transport(curl::Error::new(curl_sys::CURLE_URL_MALFORMAT))
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(TransferError::Transport(curl::Error::new(
            curl_sys::CURLE_UNSUPPORTED_PROTOCOL,
        ))),
    }
}

/// Status code from a response status line (`HTTP/1.1 200 OK`, `HTTP/2 404`).
/// Returns `None` for ordinary header lines.
fn parse_status_line(line: &[u8]) -> Option<u32> {
    let line = std::str::from_utf8(line).ok()?;
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_parsing() {
        assert_eq!(parse_status_line(b"HTTP/1.1 200 OK\r\n"), Some(200));
        assert_eq!(parse_status_line(b"HTTP/2 404\r\n"), Some(404));
        assert_eq!(parse_status_line(b"HTTP/1.0 301 Moved Permanently\r\n"), Some(301));
        assert_eq!(parse_status_line(b"Content-Length: 12\r\n"), None);
        assert_eq!(parse_status_line(b"\r\n"), None);
        assert_eq!(parse_status_line(b"HTTP/1.1\r\n"), None);
    }

    #[test]
    fn success_range() {
        assert!(is_success(200));
        assert!(is_success(204));
        assert!(!is_success(0));
        assert!(!is_success(199));
        assert!(!is_success(304));
        assert!(!is_success(500));
    }

    #[test]
    fn interim_statuses_rearm_the_watchdog() {
        assert!(is_interim(100));
        assert!(is_interim(301));
        assert!(is_interim(307));
        assert!(!is_interim(200));
        assert!(!is_interim(404));
        assert!(is_end_of_headers(b"\r\n"));
        assert!(is_end_of_headers(b"\n"));
        assert!(!is_end_of_headers(b"Location: /x\r\n"));
    }

    #[test]
    fn only_http_schemes() {
        assert!(request_url("http://a/b").is_ok());
        assert!(request_url("HTTPS://a/b").is_ok());
        assert!(request_url("ftp://a/b").is_err());
        assert!(request_url("file:///etc/passwd").is_err());
        assert!(request_url("not a url").is_err());
    }

    #[test]
    fn request_url_is_percent_encoded() {
        let u = request_url("http://foo:8080/El Niño/").unwrap();
        assert_eq!(u.as_str(), "http://foo:8080/El%20Ni%C3%B1o/");
    }

    #[test]
    fn unsupported_scheme_is_transport_error() {
        let mut sink = Vec::new();
        let err = download("ftp://127.0.0.1/x", &mut sink, &TransferOptions::default())
            .unwrap_err();
        assert!(
            matches!(&err, TransferError::Transport(e) if e.code() == curl_sys::CURLE_UNSUPPORTED_PROTOCOL),
            "{:?}",
            err
        );
        assert!(sink.is_empty());

        let err = download("not a url", &mut sink, &TransferOptions::default()).unwrap_err();
        assert!(
            matches!(&err, TransferError::Transport(e) if e.code() == curl_sys::CURLE_URL_MALFORMAT),
            "{:?}",
            err
        );
    }

    #[test]
    fn default_options() {
        let opts = TransferOptions::default();
        assert_eq!(opts.timeout, Duration::from_secs(5));
        assert!(opts.verify_tls);
        assert_eq!(opts.chunk_size, 1024 * 1024);
    }

    #[test]
    fn closures_are_transfers() {
        let t = |_url: &str, sink: &mut dyn Write| -> anyhow::Result<()> {
            sink.write_all(b"foobar")?;
            Ok(())
        };
        let mut buf = Vec::new();
        t.transfer("a", &mut buf).unwrap();
        assert_eq!(buf, b"foobar");
    }
}
