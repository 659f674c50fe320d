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

//! Gateway assembly: route construction, dispatch, and the serve loop

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode, header};
use hyper_util::rt::TokioIo;
use prost_reflect::DescriptorPool;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tonic::transport::Channel;
use tracing::{debug, warn};

use crate::catalog;
use crate::config::GatewayConfig;
use crate::error::GatewayResult;
use crate::router::{Route, Router};
use crate::{streaming, unary};

/// HTTP and WebSocket front for every method a backend's descriptor set
/// declares.
///
/// Unary methods are exposed as plain HTTP/1.1 POSTs under
/// `/api/<service>/<method>`; streaming methods as WebSocket endpoints
/// under the same path. Payload bytes cross in both directions without
/// being interpreted. The catalogue is read once at construction; later
/// changes to the backend are not observed.
pub struct Gateway {
    channel: Channel,
    config: GatewayConfig,
    router: Router,
    shutdown: CancellationToken,
}

impl Gateway {
    /// Gateway over `channel` serving every method in `pool`, with default
    /// configuration and a fresh router.
    pub fn new(channel: Channel, pool: &DescriptorPool) -> GatewayResult<Self> {
        Self::with_config(channel, pool, GatewayConfig::default(), Router::new())
    }

    /// Gateway with explicit configuration and a router that may already
    /// carry caller endpoints.
    pub fn with_config(channel: Channel, pool: &DescriptorPool, config: GatewayConfig, mut router: Router) -> GatewayResult<Self> {
        for route in catalog::method_routes(pool)? {
            let route = Arc::new(route);
            let target = if route.streaming() {
                Route::Streaming(Arc::clone(&route))
            } else {
                Route::Unary(Arc::clone(&route))
            };

            debug!("installing {} route for {}", if route.streaming() { "streaming" } else { "unary" }, route.http_path());
            router.insert(route.http_path().to_string(), target)?;
        }

        Ok(Self {
            channel,
            config,
            router,
            shutdown: CancellationToken::new(),
        })
    }

    /// Decode an encoded file descriptor set — the artifact a backend
    /// registers for gRPC reflection — and build a gateway from it.
    pub fn from_encoded_descriptor_set(channel: Channel, descriptor_set: &[u8]) -> GatewayResult<Self> {
        let pool = DescriptorPool::decode(descriptor_set)?;
        Self::new(channel, &pool)
    }

    /// Dispatch one request. Routing is strictly by path; unknown paths get
    /// a 404.
    pub async fn route(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        let path = req.uri().path().to_string();
        let route = match self.router.lookup(&path) {
            Some(route) => route.clone(),
            None => {
                debug!("no route for {}", path);
                return plain_response(StatusCode::NOT_FOUND, "");
            }
        };

        match route {
            Route::Unary(method) => unary::handle(self.channel.clone(), &method, req).await,
            Route::Streaming(method) => streaming::handle(self.channel.clone(), &self.config, &self.shutdown, method, req),
            Route::Custom(handler) => handler(req).await,
        }
    }

    /// Serve connections accepted from `listener`, forwarding requests to
    /// the backend, until accepting fails.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> GatewayResult<()> {
        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let gateway = Arc::clone(&self);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req: Request<Incoming>| {
                    let gateway = Arc::clone(&gateway);
                    async move { Ok::<_, Infallible>(gateway.route(req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).with_upgrades().await {
                    debug!("connection from {} ended with error: {}", remote_addr, err);
                }
            });
        }
    }

    /// Listen on `addr` and serve, forwarding requests to the backend.
    pub async fn listen_and_serve(self: Arc<Self>, addr: &str) -> GatewayResult<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }
}

/// Plain-text response used on every gateway-generated error path.
pub(crate) fn plain_response(code: StatusCode, message: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(code)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(message.to_owned())))
        .unwrap_or_else(|err| {
            warn!("failed to build error response: {}", err);
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        })
}
