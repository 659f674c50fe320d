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

//! Status translation between gRPC, HTTP, and WebSocket close frames

use hyper::StatusCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tonic::{Code, Status};

/// Non-standard "client closed request" code popularized by nginx; the
/// conventional HTTP rendering of a cancelled RPC.
const CLIENT_CLOSED_REQUEST: u16 = 499;

/// HTTP status equivalent of a gRPC status code, following the mapping used
/// by the gRPC ecosystem's REST gateways.
pub fn http_status(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        Code::Cancelled => StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Code::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        Code::InvalidArgument => StatusCode::BAD_REQUEST,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists => StatusCode::CONFLICT,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        Code::FailedPrecondition => StatusCode::BAD_REQUEST,
        Code::Aborted => StatusCode::CONFLICT,
        Code::OutOfRange => StatusCode::BAD_REQUEST,
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
    }
}

/// Whether a status was synthesized locally from a transport failure rather
/// than decoded off the wire.
///
/// Statuses built from a connection-level error carry that error as their
/// source; statuses parsed out of response trailers never do. A link error
/// means the gateway-to-backend hop itself is broken, which is reported as
/// 502 / close code 1011 instead of being dressed up as a backend verdict.
pub fn is_link_error(status: &Status) -> bool {
    std::error::Error::source(status).is_some()
}

/// WebSocket close frame wrapping the terminal condition of a forwarded
/// stream. `None` means the backend finished its response stream cleanly.
///
/// Recognizable backend codes ride in the private close-code range of RFC
/// 6455 §7.4.2 as `4000 + code`, with the status message as reason, so
/// peers can recover the original status. The native close-code range is
/// too narrow to hold them directly.
pub fn close_frame(err: Option<&Status>) -> CloseFrame<'static> {
    match err {
        None => CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        },
        Some(status) if is_link_error(status) => internal_close_frame(),
        Some(status) => CloseFrame {
            code: CloseCode::from(4000 + status.code() as u16),
            reason: status.message().to_owned().into(),
        },
    }
}

/// Close frame for failures that carry no backend status at all.
pub fn internal_close_frame() -> CloseFrame<'static> {
    CloseFrame {
        code: CloseCode::Error,
        reason: "".into(),
    }
}
