use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time;

use crate::banner::collect_banner;
use crate::config::ScanConfig;
use crate::types::PortState;

/// Probe one address: a single connect attempt bounded by `cfg.timeout`,
/// then the banner phase if the port is open and banners are enabled.
///
/// Never fails. Refusal maps to `Closed`; timeout and every other connect
/// error map to `Filtered`.
pub async fn probe_port(addr: SocketAddr, cfg: &ScanConfig) -> PortState {
    match time::timeout(cfg.timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            let opts = cfg.banner;
            let op_timeout = cfg.banner_timeout();
            let banner = run_banner_phase(stream, op_timeout, move |mut s| async move {
                let banner = collect_banner(&mut s, opts, op_timeout).await;
                (s, banner)
            })
            .await;
            PortState::Open { banner }
        }
        Ok(Err(e)) => classify_connect_error(&e),
        Err(_elapsed) => PortState::Filtered,
    }
}

/// Map a failed connect to a state. Only an explicit refusal counts as closed.
pub fn classify_connect_error(e: &io::Error) -> PortState {
    match e.kind() {
        io::ErrorKind::ConnectionRefused => PortState::Closed,
        _ => PortState::Filtered,
    }
}

/// Run `phase` on its own task so that a panic inside it is contained.
///
/// The stream is moved into the task: on the normal path it is handed back and
/// shut down here, on a panic it is dropped during unwinding. Either way the
/// socket is closed before this returns, and the result is at worst an empty
/// banner.
pub async fn run_banner_phase<F, Fut>(stream: TcpStream, op_timeout: Duration, phase: F) -> String
where
    F: FnOnce(TcpStream) -> Fut + Send + 'static,
    Fut: Future<Output = (TcpStream, String)> + Send + 'static,
{
    let peer = stream.peer_addr().ok();
    match tokio::spawn(phase(stream)).await {
        Ok((stream, banner)) => {
            release(stream, op_timeout).await;
            banner
        }
        Err(e) => {
            tracing::warn!(?peer, "banner phase aborted: {e}");
            String::new()
        }
    }
}

async fn release(mut stream: TcpStream, op_timeout: Duration) {
    // Shutdown errors are irrelevant; the drop below closes the fd regardless.
    let _ = time::timeout(op_timeout, stream.shutdown()).await;
}
