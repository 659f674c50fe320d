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

//! Transparent HTTP/1.1 and WebSocket gateway in front of a gRPC backend
//!
//! Methods discovered from the backend's descriptor set are exposed under
//! `/api/<service>/<method>`: unary methods as ordinary HTTP POSTs carrying
//! `application/proto` bodies, streaming methods as WebSocket endpoints
//! exchanging binary frames. The gateway forwards already-serialized
//! message bytes in both directions and never learns their schema.

pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod gateway;
pub mod router;
pub mod status;

mod streaming;
mod unary;

pub use catalog::MethodRoute;
pub use codec::RawCodec;
pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use gateway::Gateway;
pub use router::Router;
