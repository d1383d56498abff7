use std::io::Read;
use std::time::Duration;

use crate::census::{analyze_text, decode_source, AnalysisResult};
use crate::error::AnalyticsError;
use crate::language::LanguageReference;

fn is_timeout(err: &ureq::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(err);
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if matches!(io.kind(), std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock) {
                return true;
            }
        }
        source = e.source();
    }
    err.to_string().contains("timed out")
}

/// Download one text unit into memory. Undecodable bytes are replaced. A
/// body longer than `max_bytes` is refused rather than analyzed in part.
pub fn fetch_text(url: &str, timeout: Duration, max_bytes: u64) -> Result<String, AnalyticsError> {
    let url = url.trim();
    let lower = url.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return Err(AnalyticsError::InvalidInput(format!(
            "expected an http(s) URL: {url:?}"
        )));
    }

    let agent = ureq::AgentBuilder::new().timeout(timeout).build();
    let resp = agent.get(url).call().map_err(|e| match e {
        ureq::Error::Status(code, _) => AnalyticsError::AcquisitionFailed(format!("HTTP {code} for {url}")),
        e if is_timeout(&e) => AnalyticsError::AcquisitionTimeout {
            secs: timeout.as_secs(),
        },
        e => AnalyticsError::AcquisitionFailed(e.to_string()),
    })?;

    let mut body = Vec::new();
    resp.into_reader()
        .take(max_bytes.saturating_add(1))
        .read_to_end(&mut body)
        .map_err(|e| {
            if matches!(e.kind(), std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock) {
                AnalyticsError::AcquisitionTimeout {
                    secs: timeout.as_secs(),
                }
            } else {
                AnalyticsError::AcquisitionFailed(format!("reading body of {url}: {e}"))
            }
        })?;
    if body.len() as u64 > max_bytes {
        return Err(AnalyticsError::AcquisitionFailed(format!(
            "body of {url} exceeds {max_bytes} bytes"
        )));
    }

    Ok(decode_source(&body))
}

/// Fetch and analyze a single remote file; `meta.source` is the URL.
pub fn analyze_url(
    url: &str,
    timeout: Duration,
    max_bytes: u64,
    reference: &LanguageReference,
) -> Result<AnalysisResult, AnalyticsError> {
    let text = fetch_text(url, timeout, max_bytes)?;
    Ok(analyze_text(&text, url.trim(), reference))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::py312;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;

    /// Serve exactly one canned response on a local port.
    fn serve_once(status: &str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let status = status.to_string();
        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap_or(0) > 0 {
                if line == "\r\n" {
                    break;
                }
                line.clear();
            }
            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
        });
        format!("http://{addr}/collections/__init__.py")
    }

    #[test]
    fn analyzes_downloaded_text() {
        let url = serve_once("200 OK", "class C:\n    def __len__(self): return len(self.items)\n");
        let r = analyze_url(&url, Duration::from_secs(5), 1 << 20, py312()).unwrap();
        assert_eq!(r.meta.source, url);
        assert_eq!(r.dunder_freq.get("__len__"), 1);
        assert_eq!(r.builtin_freq.get("len"), 1);
        assert!(r.meta.files_processed.is_none());
    }

    #[test]
    fn http_error_status_is_a_fetch_failure() {
        let url = serve_once("404 Not Found", "missing");
        let err = fetch_text(&url, Duration::from_secs(5), 1 << 20).unwrap_err();
        assert_eq!(err.code(), "acquisition_failed");
    }

    #[test]
    fn oversized_body_is_refused() {
        let url = serve_once("200 OK", "import os\nprint(os.getcwd())\n");
        let err = fetch_text(&url, Duration::from_secs(5), 16).unwrap_err();
        assert_eq!(err.code(), "acquisition_failed");
        assert!(err.to_string().contains("exceeds 16 bytes"));
    }

    #[test]
    fn body_at_the_cap_is_accepted() {
        let body = "print(len(x))\n";
        let url = serve_once("200 OK", body);
        let text = fetch_text(&url, Duration::from_secs(5), body.len() as u64).unwrap();
        assert_eq!(text, body);
    }

    #[test]
    fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/slow.py", listener.local_addr().unwrap());
        let err = fetch_text(&url, Duration::from_millis(200), 1 << 20).unwrap_err();
        assert_eq!(err.code(), "acquisition_timeout");
        drop(listener);
    }

    #[test]
    fn non_http_urls_are_rejected() {
        let err = fetch_text("file:///etc/passwd", Duration::from_secs(1), 10).unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }
}
