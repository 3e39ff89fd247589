//! Local TCP fixtures: a port that accepts, ports that refuse, and a port
//! that never answers.
#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::time::timeout;

/// Listener that greets each client with `greeting` (if any) and then holds
/// the connection until the client goes away.
pub async fn spawn_listener(greeting: Option<&'static [u8]>) -> u16 {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((mut s, _)) = listener.accept().await else { return };
            tokio::spawn(async move {
                if let Some(g) = greeting {
                    let _ = s.write_all(g).await;
                }
                let mut buf = [0u8; 64];
                while let Ok(n) = s.read(&mut buf).await {
                    if n == 0 {
                        break;
                    }
                }
            });
        }
    });
    port
}

/// Distinct ports that were bound a moment ago and are now refused.
pub async fn refused_ports(n: usize) -> Vec<u16> {
    let mut held = Vec::new();
    for _ in 0..n {
        held.push(TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap());
    }
    held.iter().map(|l| l.local_addr().unwrap().port()).collect()
}

/// A loopback port whose SYNs are silently dropped.
///
/// The listener has a backlog of one and never accepts; once its accept queue
/// is full the kernel drops new SYNs, so connects hang until the caller's
/// timeout. Keep the value alive for as long as the port must stay silent.
pub struct SilentPort {
    pub port: u16,
    _listener: TcpListener,
    _queued: Vec<TcpStream>,
}

pub async fn silent_port() -> SilentPort {
    let socket = TcpSocket::new_v4().unwrap();
    socket
        .bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .unwrap();
    let listener = socket.listen(1).unwrap();
    let addr = listener.local_addr().unwrap();

    let mut queued = Vec::new();
    for _ in 0..64 {
        match timeout(Duration::from_millis(200), TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => queued.push(stream),
            Ok(Err(e)) => panic!("connect to saturating listener failed: {e}"),
            // First connect that hangs: the queue is full.
            Err(_) => {
                return SilentPort {
                    port: addr.port(),
                    _listener: listener,
                    _queued: queued,
                }
            }
        }
    }
    panic!("accept queue of {addr} never filled");
}
