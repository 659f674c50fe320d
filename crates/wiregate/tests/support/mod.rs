//! In-process echo backend plus a gateway wired in front of it.

pub mod echo;

use std::net::SocketAddr;
use std::sync::Arc;

use prost_reflect::DescriptorPool;
use prost_types::{DescriptorProto, FileDescriptorProto, FileDescriptorSet, MethodDescriptorProto, ServiceDescriptorProto};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Channel, Server};
use wiregate::{Gateway, GatewayConfig, Router};

use self::echo::EchoService;
use self::echo::echo_server::EchoServer;

/// Descriptor pool equivalent to what `echo.proto` would compile to,
/// assembled by hand because the messages themselves are hand-rolled.
pub fn echo_descriptor_pool() -> DescriptorPool {
    fn message(name: &str) -> DescriptorProto {
        DescriptorProto {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    let file = FileDescriptorProto {
        name: Some("echo.proto".to_string()),
        package: Some("echo.v1".to_string()),
        message_type: vec![
            message("EchoRequest"),
            message("EchoResponse"),
            message("EchoStreamRequest"),
            message("EchoStreamResponse"),
        ],
        service: vec![ServiceDescriptorProto {
            name: Some("Echo".to_string()),
            method: vec![
                MethodDescriptorProto {
                    name: Some("Echo".to_string()),
                    input_type: Some(".echo.v1.EchoRequest".to_string()),
                    output_type: Some(".echo.v1.EchoResponse".to_string()),
                    ..Default::default()
                },
                MethodDescriptorProto {
                    name: Some("EchoStream".to_string()),
                    input_type: Some(".echo.v1.EchoStreamRequest".to_string()),
                    output_type: Some(".echo.v1.EchoStreamResponse".to_string()),
                    server_streaming: Some(true),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }],
        syntax: Some("proto3".to_string()),
        ..Default::default()
    };

    DescriptorPool::from_file_descriptor_set(FileDescriptorSet { file: vec![file] }).expect("echo descriptors")
}

/// Boot the echo backend and a gateway in front of it; returns the address
/// the gateway listens on. Both serve until the test process exits.
pub async fn spawn_gateway() -> SocketAddr {
    spawn_gateway_with(GatewayConfig::default(), Router::new()).await
}

pub async fn spawn_gateway_with(config: GatewayConfig, router: Router) -> SocketAddr {
    let _ = tracing_subscriber::fmt::try_init();

    let backend = TcpListener::bind("127.0.0.1:0").await.expect("bind backend");
    let backend_addr = backend.local_addr().expect("backend addr");
    tokio::spawn(async move {
        Server::builder()
            .add_service(EchoServer::new(EchoService))
            .serve_with_incoming(TcpListenerStream::new(backend))
            .await
            .expect("echo backend");
    });

    let channel = Channel::from_shared(format!("http://{}", backend_addr))
        .expect("backend uri")
        .connect_lazy();
    let gateway = Gateway::with_config(channel, &echo_descriptor_pool(), config, router).expect("gateway");

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind gateway");
    let addr = listener.local_addr().expect("gateway addr");
    tokio::spawn(async move {
        let _ = Arc::new(gateway).serve(listener).await;
    });

    addr
}
