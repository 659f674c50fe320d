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

//! Unary forwarding: one HTTP POST in, one opaque reply out

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode, header};
use tonic::client::Grpc;
use tonic::transport::Channel;
use tracing::{debug, trace};

use crate::catalog::MethodRoute;
use crate::codec::RawCodec;
use crate::gateway::plain_response;
use crate::status;

/// Exact content type required on forwarded request bodies.
pub(crate) const CONTENT_TYPE: &str = "application/proto";

/// Forward one HTTP request as a unary backend call.
///
/// Exactly one response is written; the backend is invoked at most once.
pub(crate) async fn handle(channel: Channel, route: &MethodRoute, req: Request<Incoming>) -> Response<Full<Bytes>> {
    if req.method() != Method::POST {
        return plain_response(StatusCode::METHOD_NOT_ALLOWED, "");
    }

    let content_type = req.headers().get(header::CONTENT_TYPE).and_then(|value| value.to_str().ok());
    if content_type != Some(CONTENT_TYPE) {
        return plain_response(StatusCode::BAD_REQUEST, "");
    }

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            // Either the client went away mid-body or we could not buffer
            // the request. The caller is expected to retry in both cases.
            trace!("failed to read request body for {}: {}", route.full_method(), err);
            return plain_response(StatusCode::INTERNAL_SERVER_ERROR, "");
        }
    };

    let mut grpc = Grpc::new(channel);
    if let Err(err) = grpc.ready().await {
        debug!("backend channel not ready for {}: {}", route.full_method(), err);
        return plain_response(StatusCode::BAD_GATEWAY, "gateway error");
    }

    match grpc.unary(tonic::Request::new(body), route.grpc_path(), RawCodec).await {
        Ok(response) => Response::new(Full::new(response.into_inner())),
        Err(status) if status::is_link_error(&status) => {
            debug!("link failure forwarding {}: {}", route.full_method(), status);
            plain_response(StatusCode::BAD_GATEWAY, "gateway error")
        }
        Err(status) => plain_response(status::http_status(status.code()), status.message()),
    }
}
