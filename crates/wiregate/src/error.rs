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

//! Error handling for gateway construction and serving

use thiserror::Error;

/// Errors surfaced while assembling or running a gateway.
///
/// Forwarding-time failures never appear here: they are translated into
/// HTTP statuses or WebSocket close frames at the point they gain meaning
/// (see [`crate::status`]).
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("invalid method route: {message}")]
    InvalidRoute { message: String },

    #[error("route table: {0}")]
    RouteTable(#[from] matchit::InsertError),

    #[error("descriptor set: {0}")]
    Descriptor(#[from] prost_reflect::DescriptorError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
