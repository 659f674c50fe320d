//! Hand-rolled echo service used to exercise the gateway end to end.
//!
//! The messages and the server glue mirror what `tonic-build` would emit
//! for `echo.v1.Echo`, written out by hand so the tests carry no build-time
//! protoc dependency.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Code, Request, Response, Status};

#[derive(Clone, PartialEq, prost::Message)]
pub struct EchoRequest {
    #[prost(string, tag = "1")]
    pub message: String,
    #[prost(uint32, tag = "2")]
    pub repetitions: u32,
    /// Non-zero induces a failure with this gRPC code.
    #[prost(int32, tag = "3")]
    pub status_code: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct EchoResponse {
    #[prost(string, tag = "1")]
    pub message: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct EchoStreamRequest {
    #[prost(string, tag = "1")]
    pub message: String,
    #[prost(uint32, tag = "2")]
    pub repetitions: u32,
    #[prost(uint32, tag = "3")]
    pub responses: u32,
    #[prost(uint64, tag = "4")]
    pub interval_ms: u64,
    /// Non-zero induces a failure with this gRPC code...
    #[prost(int32, tag = "5")]
    pub status_code: i32,
    /// ...once this many responses have been sent.
    #[prost(uint32, tag = "6")]
    pub failure_index: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct EchoStreamResponse {
    #[prost(string, tag = "1")]
    pub message: String,
    #[prost(uint64, tag = "2")]
    pub index: u64,
}

pub mod echo_server {
    use tonic::codegen::*;

    /// Server-side contract for the echo service.
    #[async_trait]
    pub trait Echo: Send + Sync + 'static {
        async fn echo(&self, request: tonic::Request<super::EchoRequest>) -> Result<tonic::Response<super::EchoResponse>, tonic::Status>;

        /// Server streaming response type for the EchoStream method.
        type EchoStreamStream: tokio_stream::Stream<Item = Result<super::EchoStreamResponse, tonic::Status>> + Send + 'static;

        async fn echo_stream(&self, request: tonic::Request<super::EchoStreamRequest>) -> Result<tonic::Response<Self::EchoStreamStream>, tonic::Status>;
    }

    #[derive(Debug)]
    pub struct EchoServer<T> {
        inner: Arc<T>,
    }

    impl<T> EchoServer<T> {
        pub fn new(inner: T) -> Self {
            Self { inner: Arc::new(inner) }
        }
    }

    impl<T, B> Service<http::Request<B>> for EchoServer<T>
    where
        T: Echo,
        B: Body + Send + 'static,
        B::Error: Into<StdError> + Send + 'static,
    {
        type Response = http::Response<tonic::body::BoxBody>;
        type Error = std::convert::Infallible;
        type Future = BoxFuture<Self::Response, Self::Error>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            let inner = Arc::clone(&self.inner);
            match req.uri().path() {
                "/echo.v1.Echo/Echo" => Box::pin(async move {
                    #[allow(non_camel_case_types)]
                    struct EchoSvc<T: Echo>(pub Arc<T>);
                    impl<T: Echo> tonic::server::UnaryService<super::EchoRequest> for EchoSvc<T> {
                        type Response = super::EchoResponse;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;

                        fn call(&mut self, request: tonic::Request<super::EchoRequest>) -> Self::Future {
                            let inner = Arc::clone(&self.0);
                            Box::pin(async move { <T as Echo>::echo(&inner, request).await })
                        }
                    }

                    let mut grpc = tonic::server::Grpc::new(tonic::codec::ProstCodec::default());
                    Ok(grpc.unary(EchoSvc(inner), req).await)
                }),
                "/echo.v1.Echo/EchoStream" => Box::pin(async move {
                    #[allow(non_camel_case_types)]
                    struct EchoStreamSvc<T: Echo>(pub Arc<T>);
                    impl<T: Echo> tonic::server::ServerStreamingService<super::EchoStreamRequest> for EchoStreamSvc<T> {
                        type Response = super::EchoStreamResponse;
                        type ResponseStream = T::EchoStreamStream;
                        type Future = BoxFuture<tonic::Response<Self::ResponseStream>, tonic::Status>;

                        fn call(&mut self, request: tonic::Request<super::EchoStreamRequest>) -> Self::Future {
                            let inner = Arc::clone(&self.0);
                            Box::pin(async move { <T as Echo>::echo_stream(&inner, request).await })
                        }
                    }

                    let mut grpc = tonic::server::Grpc::new(tonic::codec::ProstCodec::default());
                    Ok(grpc.server_streaming(EchoStreamSvc(inner), req).await)
                }),
                _ => Box::pin(async move {
                    Ok(http::Response::builder()
                        .status(200)
                        .header("grpc-status", (tonic::Code::Unimplemented as i32).to_string())
                        .header("content-type", "application/grpc")
                        .body(empty_body())
                        .unwrap())
                }),
            }
        }
    }

    impl<T> Clone for EchoServer<T> {
        fn clone(&self) -> Self {
            Self { inner: Arc::clone(&self.inner) }
        }
    }

    impl<T> tonic::server::NamedService for EchoServer<T> {
        const NAME: &'static str = "echo.v1.Echo";
    }
}

/// Echo behavior: repeat the message, optionally failing with an induced
/// status, exactly like the gateway's reference backend.
#[derive(Clone)]
pub struct EchoService;

#[tonic::async_trait]
impl echo_server::Echo for EchoService {
    async fn echo(&self, request: Request<EchoRequest>) -> Result<Response<EchoResponse>, Status> {
        let req = request.into_inner();
        if req.status_code != 0 {
            return Err(Status::new(Code::from_i32(req.status_code), "induce"));
        }

        Ok(Response::new(EchoResponse {
            message: req.message.repeat(req.repetitions as usize),
        }))
    }

    type EchoStreamStream = ReceiverStream<Result<EchoStreamResponse, Status>>;

    async fn echo_stream(&self, request: Request<EchoStreamRequest>) -> Result<Response<Self::EchoStreamStream>, Status> {
        let req = request.into_inner();
        let (tx, rx) = mpsc::channel(4);

        tokio::spawn(async move {
            for index in 0..req.responses {
                if req.status_code != 0 && req.failure_index == index {
                    let _ = tx.send(Err(Status::new(Code::from_i32(req.status_code), "induced"))).await;
                    return;
                }

                let response = EchoStreamResponse {
                    message: req.message.repeat(req.repetitions as usize),
                    index: index as u64,
                };
                if tx.send(Ok(response)).await.is_err() {
                    return;
                }

                tokio::time::sleep(Duration::from_millis(req.interval_ms)).await;
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}
