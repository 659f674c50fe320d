// Wiregate
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Streaming forwarding: a WebSocket bridged onto a bidirectional backend stream

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::upgrade::{OnUpgrade, Upgraded};
use hyper::{Method, Request, Response, StatusCode, header};
use hyper_util::rt::TokioIo;
use sha1::{Digest, Sha1};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Role};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use tonic::client::Grpc;
use tonic::transport::Channel;
use tonic::{Status, Streaming};
use tracing::{debug, info, trace, warn};

use crate::catalog::MethodRoute;
use crate::codec::RawCodec;
use crate::config::GatewayConfig;
use crate::gateway::plain_response;
use crate::status;

const HANDSHAKE_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Frames queued between the inbound pump and the backend call while the
/// stream is still opening.
const FORWARD_BUFFER: usize = 16;

type WsSink = SplitSink<WebSocketStream<TokioIo<Upgraded>>, Message>;
type WsSource = SplitStream<WebSocketStream<TokioIo<Upgraded>>>;

/// Terminal event published by the inbound pump, at most once per session.
enum PumpExit {
    /// The socket failed, the peer closed, or the connection ended.
    Socket(WsError),
    /// The backend stopped accepting request messages.
    BackendClosed,
}

/// Terminal condition of a running session.
enum Terminal {
    /// The backend finished its response stream cleanly.
    Complete,
    /// The backend ended the call with a status.
    Backend(Status),
    /// The socket side failed first.
    Socket(WsError),
}

/// Accept a WebSocket upgrade and bridge it onto a backend stream.
///
/// The session itself runs on a spawned task; the handler only validates
/// the handshake and commits the 101. A rejected handshake never opens a
/// socket, so no close frame is owed.
pub(crate) fn handle(
    channel: Channel,
    config: &GatewayConfig,
    shutdown: &CancellationToken,
    route: Arc<MethodRoute>,
    mut req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let accept_key = match handshake_accept(&req) {
        Ok(key) => key,
        Err(response) => return response,
    };

    let upgrade = hyper::upgrade::on(&mut req);
    let socket_config = config.websocket_config();
    let handshake_timeout = config.handshake_timeout;
    let token = shutdown.child_token();

    tokio::spawn(async move {
        let upgraded = match await_upgrade(upgrade, handshake_timeout).await {
            Ok(upgraded) => upgraded,
            Err(err) => {
                info!("failed to upgrade connection for {}: {}", route.full_method(), err);
                return;
            }
        };

        let socket = WebSocketStream::from_raw_socket(TokioIo::new(upgraded), Role::Server, Some(socket_config)).await;
        run_session(channel, route, socket, token).await;
    });

    // hyper finishes the switch once this response reaches the wire.
    Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(header::UPGRADE, "websocket")
        .header(header::CONNECTION, "Upgrade")
        .header(header::SEC_WEBSOCKET_ACCEPT, accept_key)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|err| {
            warn!("failed to build upgrade response: {}", err);
            plain_response(StatusCode::INTERNAL_SERVER_ERROR, "")
        })
}

/// Validate the upgrade request and derive the RFC 6455 accept key.
fn handshake_accept(req: &Request<Incoming>) -> Result<String, Response<Full<Bytes>>> {
    if req.method() != Method::GET {
        return Err(plain_response(StatusCode::METHOD_NOT_ALLOWED, ""));
    }
    if !header_contains(req, header::CONNECTION, "upgrade") || !header_contains(req, header::UPGRADE, "websocket") {
        return Err(plain_response(StatusCode::BAD_REQUEST, "not a websocket handshake"));
    }
    let version_ok = req
        .headers()
        .get(header::SEC_WEBSOCKET_VERSION)
        .map(|value| value.as_bytes() == b"13")
        .unwrap_or(false);
    if !version_ok {
        return Err(plain_response(StatusCode::BAD_REQUEST, "unsupported websocket version"));
    }
    let key = match req.headers().get(header::SEC_WEBSOCKET_KEY) {
        Some(key) => key,
        None => return Err(plain_response(StatusCode::BAD_REQUEST, "missing websocket key")),
    };

    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(HANDSHAKE_GUID.as_bytes());
    Ok(BASE64.encode(hasher.finalize()))
}

fn header_contains(req: &Request<Incoming>, name: header::HeaderName, needle: &str) -> bool {
    req.headers()
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.to_ascii_lowercase().contains(needle))
}

async fn await_upgrade(upgrade: OnUpgrade, limit: Option<Duration>) -> Result<Upgraded, String> {
    let upgraded = match limit {
        Some(limit) => match tokio::time::timeout(limit, upgrade).await {
            Ok(result) => result,
            Err(_) => return Err(format!("handshake did not complete within {:?}", limit)),
        },
        None => upgrade.await,
    };

    upgraded.map_err(|err| err.to_string())
}

/// Drive one session: open the backend stream, pump both directions, and
/// terminate with a single translated close frame.
async fn run_session(channel: Channel, route: Arc<MethodRoute>, socket: WebSocketStream<TokioIo<Upgraded>>, token: CancellationToken) {
    // Any exit, including this future being dropped, releases the pump and
    // with it the backend stream.
    let _guard = token.clone().drop_guard();
    let (mut sink, source) = socket.split();

    let (forward_tx, forward_rx) = mpsc::channel::<Bytes>(FORWARD_BUFFER);
    let (exit_tx, exit_rx) = oneshot::channel::<PumpExit>();

    // The pump must be running before the backend call resolves: response
    // headers for a server-streaming handler only arrive after the first
    // request message, and the pump is what delivers it. The pump also
    // owns the read half outright, since the inbound peer has no way to
    // half-close and must be drained to discover its termination.
    tokio::spawn(inbound_pump(source, forward_tx, exit_tx, token.clone()));

    let mut grpc = Grpc::new(channel);
    if let Err(err) = grpc.ready().await {
        warn!("backend channel not ready for {}: {}", route.full_method(), err);
        write_close(&mut sink, status::internal_close_frame()).await;
        return;
    }

    let outbound = ReceiverStream::new(forward_rx);
    let mut inbound: Streaming<Bytes> = match grpc.streaming(tonic::Request::new(outbound), route.grpc_path(), RawCodec).await {
        Ok(response) => response.into_inner(),
        Err(status) => {
            // A trailers-only reply lands here too: the backend refused the
            // call before its first message, and its status still deserves
            // the translated close code rather than a blanket failure.
            warn!("failed to open backend stream for {}: {}", route.full_method(), status);
            write_close(&mut sink, status::close_frame(Some(&status))).await;
            return;
        }
    };

    let terminal = forward(&mut inbound, &mut sink, exit_rx).await;

    // Socket errors and backend errors get the same blind close write; at
    // worst it lands on a connection that is already gone.
    let frame = match &terminal {
        Terminal::Complete => status::close_frame(None),
        Terminal::Backend(status) => status::close_frame(Some(status)),
        Terminal::Socket(_) => status::internal_close_frame(),
    };
    debug!("closing {} session with code {}", route.full_method(), u16::from(frame.code));
    write_close(&mut sink, frame).await;
}

/// Drive the backend-to-socket direction until either side reports a
/// terminal condition.
///
/// Biased toward the backend receive so that when both sides fail in the
/// same instant, the richer, translatable error wins.
async fn forward(inbound: &mut Streaming<Bytes>, sink: &mut WsSink, mut pump_exit: oneshot::Receiver<PumpExit>) -> Terminal {
    loop {
        tokio::select! {
            biased;
            message = inbound.message() => match message {
                Ok(Some(payload)) => {
                    if let Err(err) = sink.send(Message::Binary(payload.to_vec())).await {
                        return Terminal::Socket(err);
                    }
                }
                Ok(None) => return Terminal::Complete,
                Err(status) => return Terminal::Backend(status),
            },
            exit = &mut pump_exit => match exit {
                Ok(PumpExit::Socket(err)) => return Terminal::Socket(err),
                // The request side only tears down once the call already has
                // a terminal status; keep receiving so that status, and any
                // responses still in flight, reach the peer.
                Ok(PumpExit::BackendClosed) | Err(_) => return drain_backend(inbound, sink).await,
            },
        }
    }
}

/// Finish receiving after the request side of the backend call has shut.
async fn drain_backend(inbound: &mut Streaming<Bytes>, sink: &mut WsSink) -> Terminal {
    loop {
        match inbound.message().await {
            Ok(Some(payload)) => {
                if let Err(err) = sink.send(Message::Binary(payload.to_vec())).await {
                    return Terminal::Socket(err);
                }
            }
            Ok(None) => return Terminal::Complete,
            Err(status) => return Terminal::Backend(status),
        }
    }
}

/// Sole reader of the inbound socket: forwards every data frame to the
/// backend stream and publishes a single terminal event when it stops.
///
/// Read failures are not differentiated; an error report rarely makes it
/// back to a peer whose connection is already in trouble.
async fn inbound_pump(mut source: WsSource, forward_tx: mpsc::Sender<Bytes>, exit_tx: oneshot::Sender<PumpExit>, token: CancellationToken) {
    let exit = loop {
        let frame = tokio::select! {
            _ = token.cancelled() => return,
            frame = source.next() => frame,
        };

        let payload = match frame {
            Some(Ok(Message::Binary(data))) => Bytes::from(data),
            Some(Ok(Message::Text(text))) => Bytes::from(text.into_bytes()),
            // tungstenite answers pings on the write path; nothing to forward.
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
            Some(Ok(Message::Close(_))) | None => break PumpExit::Socket(WsError::ConnectionClosed),
            Some(Err(err)) => break PumpExit::Socket(err),
        };

        let sent = tokio::select! {
            _ = token.cancelled() => return,
            sent = forward_tx.send(payload) => sent,
        };
        if sent.is_err() {
            break PumpExit::BackendClosed;
        }
    };

    // The session may already be gone; its own terminal state wins then.
    let _ = exit_tx.send(exit);
}

async fn write_close(sink: &mut WsSink, frame: CloseFrame<'static>) {
    if let Err(err) = sink.send(Message::Close(Some(frame))).await {
        trace!("failed to write close frame: {}", err);
    }
}
