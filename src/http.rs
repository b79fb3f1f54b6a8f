// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Read-only telemetry listener. Serves the two event channels as
// server-sent event streams on `/commits` and `/uptime`; everything else is
// a 404. This is deliberately not a general HTTP server — it exists only so
// that the channels have somewhere to fan out to.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{error, info};

use crate::channel::Channel;
use crate::context::BrokerContext;

/// How often a streaming connection re-checks the stop flag when its
/// channel is quiet.
const STREAM_POLL: Duration = Duration::from_secs(1);

/// Shared handle on the listener: the bound port plus the stop flag the
/// quit thread flips.
pub struct ServerStatus {
    requested_port: u16,
    bound_port: AtomicU16,
    stop: AtomicBool,
}

impl ServerStatus {
    pub fn new(requested_port: u16) -> Self {
        Self {
            requested_port,
            bound_port: AtomicU16::new(0),
            stop: AtomicBool::new(false),
        }
    }

    /// The port the listener actually bound (0 until it is up).
    pub fn port(&self) -> u16 {
        self.bound_port.load(Ordering::Acquire)
    }

    pub fn stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Stop accepting connections. Wakes the accept loop by connecting to
    /// it, which is benign if the listener is already gone.
    pub fn quit(&self) {
        self.stop.store(true, Ordering::Release);
        let port = self.port();
        if port != 0 {
            let _ = TcpStream::connect(("127.0.0.1", port));
        }
    }
}

/// Run the listener until [`ServerStatus::quit`] is called. `announce` is
/// invoked once with the bound port.
pub fn server<F>(
    status: &Arc<ServerStatus>,
    ctx: &Arc<BrokerContext>,
    announce: F,
) -> io::Result<()>
where
    F: FnOnce(u16),
{
    let listener = TcpListener::bind(("127.0.0.1", status.requested_port))?;
    let port = listener.local_addr()?.port();
    status.bound_port.store(port, Ordering::Release);
    info!("telemetry listening on port {port}");
    announce(port);

    for stream in listener.incoming() {
        if status.stopping() {
            break;
        }
        let stream = match stream {
            Ok(s) => s,
            Err(err) => {
                error!("accept failed: {err}");
                continue;
            }
        };
        let status = Arc::clone(status);
        let ctx = Arc::clone(ctx);
        let _ = thread::Builder::new()
            .name("http-conn".to_string())
            .spawn(move || {
                if let Err(err) = handle_connection(stream, &status, &ctx) {
                    // Subscribers come and go; a dropped connection is routine.
                    info!("telemetry connection closed: {err}");
                }
            });
    }
    info!("telemetry listener exiting");
    Ok(())
}

fn handle_connection(
    stream: TcpStream,
    status: &ServerStatus,
    ctx: &BrokerContext,
) -> io::Result<()> {
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    // "GET <path> HTTP/1.1"
    let target = request_line.split_whitespace().nth(1).unwrap_or("");
    let channel = match target {
        "/commits" => Some(&ctx.commits),
        "/uptime" => Some(&ctx.uptime),
        _ => None,
    };

    let mut out = stream.try_clone()?;
    match channel {
        Some(channel) => stream_channel(&mut out, channel, status),
        None => {
            out.write_all(
                b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            )?;
            out.flush()?;
            stream.shutdown(Shutdown::Both)
        }
    }
}

/// Attach to `channel` and forward every published payload as one SSE
/// event until the peer disconnects or the broker stops.
fn stream_channel(
    out: &mut TcpStream,
    channel: &Channel,
    status: &ServerStatus,
) -> io::Result<()> {
    out.write_all(
        b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n",
    )?;
    out.flush()?;

    let mut sub = channel.subscribe();
    while !status.stopping() {
        if let Some(payload) = sub.next_timeout(STREAM_POLL) {
            out.write_all(b"data: ")?;
            out.write_all(payload.as_bytes())?;
            out.write_all(b"\n\n")?;
            out.flush()?;
        }
    }
    Ok(())
}
