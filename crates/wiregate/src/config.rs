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

//! Configuration for accepted WebSocket connections

use std::time::Duration;

use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

/// Tunables for the streaming side of the gateway.
///
/// Applies to the upgrade handshake and every WebSocket the gateway
/// accepts. The defaults keep a small write buffer and place no bound on
/// the handshake; operators that want a bound opt in through
/// [`handshake_timeout`](GatewayConfig::handshake_timeout).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bytes buffered on an accepted socket before a write is flushed.
    pub write_buffer_size: usize,

    /// Largest accepted message payload; `None` lifts the limit.
    pub max_message_size: Option<usize>,

    /// Largest accepted single frame; `None` lifts the limit.
    pub max_frame_size: Option<usize>,

    /// Bound on completing the HTTP upgrade once a 101 has been committed.
    pub handshake_timeout: Option<Duration>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            write_buffer_size: 1024,
            max_message_size: None,
            max_frame_size: None,
            handshake_timeout: None,
        }
    }
}

impl GatewayConfig {
    /// Socket-level configuration applied to accepted connections.
    pub(crate) fn websocket_config(&self) -> WebSocketConfig {
        let mut config = WebSocketConfig::default();
        config.write_buffer_size = self.write_buffer_size;
        config.max_message_size = self.max_message_size;
        config.max_frame_size = self.max_frame_size;
        config
    }
}
