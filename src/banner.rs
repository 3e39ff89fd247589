use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time;

use crate::config::BannerOptions;

/// Upper bound on bytes read for a banner.
pub const MAX_BANNER_BYTES: usize = 1024;

/// The only bytes ever sent to a service: a bare line terminator.
const PROBE_BYTES: &[u8] = b"\r\n";

/// Try to elicit and read a banner from an already-connected stream.
///
/// Every failure in here (write error, read error, timeouts) ends in an empty
/// or partial banner, never an error: the caller has already classified the
/// port as open and nothing here may change that.
pub async fn collect_banner<S>(stream: &mut S, opts: BannerOptions, op_timeout: Duration) -> String
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if !opts.enabled {
        return String::new();
    }

    if opts.send_probe {
        match time::timeout(op_timeout, send_probe(stream)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!("banner probe write failed: {e}"),
            Err(_) => tracing::debug!("banner probe write timed out"),
        }
    }

    let mut buf = vec![0u8; MAX_BANNER_BYTES];
    match time::timeout(op_timeout, stream.read(&mut buf)).await {
        Ok(Ok(n)) if n > 0 => {
            buf.truncate(n);
            decode_banner(&buf)
        }
        Ok(Ok(_)) => String::new(),
        Ok(Err(e)) => {
            tracing::debug!("banner read failed: {e}");
            String::new()
        }
        // Silence is a valid answer.
        Err(_) => String::new(),
    }
}

async fn send_probe<S>(stream: &mut S) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(PROBE_BYTES).await?;
    stream.flush().await
}

/// Lossy UTF-8 decode with surrounding whitespace trimmed.
///
/// Invalid sequences become U+FFFD rather than failing, so binary greetings
/// still produce a (possibly odd looking) banner.
pub fn decode_banner(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// First `max_chars` characters of `s`, respecting char boundaries.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
