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

//! Path-keyed dispatch table for forwarded and caller-supplied endpoints

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response};

use crate::catalog::MethodRoute;
use crate::error::GatewayResult;

/// Boxed handler for endpoints hosted next to the forwarded methods.
pub type RouteHandler = Arc<dyn Fn(Request<Incoming>) -> BoxFuture<'static, Response<Full<Bytes>>> + Send + Sync>;

/// Target installed under one path.
#[derive(Clone)]
pub(crate) enum Route {
    Unary(Arc<MethodRoute>),
    Streaming(Arc<MethodRoute>),
    Custom(RouteHandler),
}

/// Dispatch table for the gateway. Lookup is strictly by path; requests for
/// anything unknown get a 404 from the gateway itself.
///
/// A pre-populated router can be handed to
/// [`Gateway::with_config`](crate::Gateway::with_config) to host other
/// endpoints alongside the forwarded methods.
#[derive(Clone)]
pub struct Router {
    table: matchit::Router<Route>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create an empty router.
    pub fn new() -> Self {
        Self { table: matchit::Router::new() }
    }

    /// Register a caller-supplied handler under `path`.
    pub fn handle<F, Fut>(&mut self, path: &str, handler: F) -> GatewayResult<()>
    where
        F: Fn(Request<Incoming>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response<Full<Bytes>>> + Send + 'static,
    {
        let handler: RouteHandler = Arc::new(move |req| Box::pin(handler(req)));
        self.insert(path.to_string(), Route::Custom(handler))
    }

    pub(crate) fn insert(&mut self, path: String, route: Route) -> GatewayResult<()> {
        self.table.insert(path, route)?;
        Ok(())
    }

    pub(crate) fn lookup(&self, path: &str) -> Option<&Route> {
        self.table.at(path).ok().map(|found| found.value)
    }
}
