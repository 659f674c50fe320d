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

//! Method catalogue derived from the backend's descriptor set

use http::uri::PathAndQuery;
use prost_reflect::{DescriptorPool, MethodDescriptor};

use crate::error::{GatewayError, GatewayResult};

/// Path prefix under which every backend method is exposed over HTTP.
pub const HTTP_PATH_PREFIX: &str = "/api";

/// One backend method, resolved once at gateway construction and immutable
/// afterwards. Changes to the backend catalogue are not observed.
#[derive(Debug, Clone)]
pub struct MethodRoute {
    full_method: String,
    http_path: String,
    grpc_path: PathAndQuery,
    streaming: bool,
}

impl MethodRoute {
    fn from_descriptor(method: &MethodDescriptor) -> GatewayResult<Self> {
        let service = method.parent_service();
        let full_method = format!("{}/{}", service.full_name(), method.name());
        let grpc_path = format!("/{}", full_method)
            .parse::<PathAndQuery>()
            .map_err(|err| GatewayError::InvalidRoute {
                message: format!("{}: {}", full_method, err),
            })?;

        Ok(Self {
            http_path: format!("{}/{}", HTTP_PATH_PREFIX, full_method),
            grpc_path,
            streaming: method.is_client_streaming() || method.is_server_streaming(),
            full_method,
        })
    }

    /// Canonical `service/method` name.
    pub fn full_method(&self) -> &str {
        &self.full_method
    }

    /// Path the method is served under on the HTTP side.
    pub fn http_path(&self) -> &str {
        &self.http_path
    }

    /// Request path for the backend gRPC connection.
    pub fn grpc_path(&self) -> PathAndQuery {
        self.grpc_path.clone()
    }

    /// True when either direction of the method streams.
    pub fn streaming(&self) -> bool {
        self.streaming
    }
}

/// Enumerate every method of every service in the backend's descriptor pool.
pub fn method_routes(pool: &DescriptorPool) -> GatewayResult<Vec<MethodRoute>> {
    let mut routes = Vec::new();
    for service in pool.services() {
        for method in service.methods() {
            routes.push(MethodRoute::from_descriptor(&method)?);
        }
    }
    Ok(routes)
}
