//! End-to-end scenarios spanning the handshake, the endpoint, and the
//! object registry together (spec §8).

use std::sync::Arc;
use std::time::Duration;

use remoting_test_support::DefaultTestSerializer;
use sharp_remote::{
    read_handshake, write_handshake, EndpointConfig, EndpointState, GrainId, HandshakePayload,
    InterfaceFingerprint, InvokeError, ObjectRegistry, PayloadReader, PayloadWriter, ProxyOrLocal,
    RemotingError, Subject, ValueSerializer,
};
use tokio::net::{TcpListener, TcpStream};

struct AdderSubject;
impl Subject for AdderSubject {
    fn invoke(
        &self,
        method_name: &str,
        serializer: &dyn ValueSerializer,
        reader: &mut PayloadReader<'_>,
        writer: &mut PayloadWriter,
    ) -> Result<(), InvokeError> {
        match method_name {
            "Add" => {
                let a = serializer.read_i32(reader).map_err(|e| InvokeError::Unserializable(Box::new(e)))?;
                let b = serializer.read_i32(reader).map_err(|e| InvokeError::Unserializable(Box::new(e)))?;
                serializer.write_i32(writer, a + b);
                Ok(())
            }
            "Throw" => Err(InvokeError::Remote("boom".into())),
            other => Err(InvokeError::NoSuchMethod(other.to_owned())),
        }
    }
}

fn encode_add_args(a: i32, b: i32) -> Vec<u8> {
    let ser = DefaultTestSerializer;
    let mut w = PayloadWriter::new();
    ser.write_i32(&mut w, a);
    ser.write_i32(&mut w, b);
    w.into_vec()
}

async fn dial_handshaken_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let accept = tokio::spawn(async move {
        let (mut stream, _peer) = listener.accept().await.unwrap();
        read_handshake(&mut stream).await.unwrap();
        write_handshake(&mut stream, &HandshakePayload { peer_name: "server".to_owned() }).await.unwrap();
        stream
    });

    let mut client = TcpStream::connect(addr).await.unwrap();
    write_handshake(&mut client, &HandshakePayload { peer_name: "client".to_owned() }).await.unwrap();
    read_handshake(&mut client).await.unwrap();

    let server = accept.await.unwrap();
    (client, server)
}

#[tokio::test]
async fn happy_path_add_call_over_a_real_tcp_connection() {
    let (client_stream, server_stream) = dial_handshaken_pair().await;

    let server_registry = ObjectRegistry::new();
    server_registry
        .create_servant(GrainId(1), InterfaceFingerprint::of_name("IAdder"), Arc::new(AdderSubject))
        .unwrap();

    let client = sharp_remote::Endpoint::spawn(
        client_stream,
        EndpointConfig::default(),
        ObjectRegistry::new(),
        Arc::new(DefaultTestSerializer),
    );
    let _server = sharp_remote::Endpoint::spawn(
        server_stream,
        EndpointConfig::default(),
        server_registry,
        Arc::new(DefaultTestSerializer),
    );

    let payload = client.call(GrainId(1), "IAdder", "Add", encode_add_args(2, 3)).await.unwrap();
    let mut r = PayloadReader::new(&payload);
    assert_eq!(DefaultTestSerializer.read_i32(&mut r).unwrap(), 5);
}

#[tokio::test]
async fn a_servant_side_exception_that_can_be_marshalled_surfaces_as_a_remote_exception() {
    let (client_stream, server_stream) = dial_handshaken_pair().await;

    let server_registry = ObjectRegistry::new();
    server_registry
        .create_servant(GrainId(1), InterfaceFingerprint::of_name("IAdder"), Arc::new(AdderSubject))
        .unwrap();

    let client = sharp_remote::Endpoint::spawn(
        client_stream,
        EndpointConfig::default(),
        ObjectRegistry::new(),
        Arc::new(DefaultTestSerializer),
    );
    let _server = sharp_remote::Endpoint::spawn(
        server_stream,
        EndpointConfig::default(),
        server_registry,
        Arc::new(DefaultTestSerializer),
    );

    let err = client.call(GrainId(1), "IAdder", "Throw", vec![]).await.unwrap_err();
    match err {
        RemotingError::RemoteException(message) => assert!(message.contains("boom")),
        other => panic!("expected a RemoteException, got {other:?}"),
    }
}

#[tokio::test]
async fn calling_an_unregistered_grain_id_surfaces_no_such_servant() {
    let (client_stream, server_stream) = dial_handshaken_pair().await;

    let client = sharp_remote::Endpoint::spawn(
        client_stream,
        EndpointConfig::default(),
        ObjectRegistry::new(),
        Arc::new(DefaultTestSerializer),
    );
    let _server = sharp_remote::Endpoint::spawn(
        server_stream,
        EndpointConfig::default(),
        ObjectRegistry::new(),
        Arc::new(DefaultTestSerializer),
    );

    let err = client.call(GrainId(404), "IAdder", "Add", vec![]).await.unwrap_err();
    assert!(matches!(err, RemotingError::NoSuchServant(GrainId(404))));
}

#[tokio::test]
async fn dropping_the_peer_connection_fails_outstanding_and_future_calls() {
    let (client_stream, server_stream) = dial_handshaken_pair().await;

    let client = sharp_remote::Endpoint::spawn(
        client_stream,
        EndpointConfig::default(),
        ObjectRegistry::new(),
        Arc::new(DefaultTestSerializer),
    );

    // Drop the server side outright, simulating the peer process dying
    // mid-connection rather than sending Goodbye.
    drop(server_stream);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(matches!(*client.state().borrow(), EndpointState::Faulted(_)));

    let err = client.call(GrainId(1), "IAdder", "Add", encode_add_args(1, 1)).await.unwrap_err();
    assert!(matches!(err, RemotingError::NotConnected));
}

#[tokio::test]
async fn get_or_create_proxy_returns_the_same_instance_across_repeated_lookups() {
    let (client_stream, server_stream) = dial_handshaken_pair().await;

    let client = sharp_remote::Endpoint::spawn(
        client_stream,
        EndpointConfig::default(),
        ObjectRegistry::new(),
        Arc::new(DefaultTestSerializer),
    );
    let _server = sharp_remote::Endpoint::spawn(
        server_stream,
        EndpointConfig::default(),
        ObjectRegistry::new(),
        Arc::new(DefaultTestSerializer),
    );

    let remote_grain = GrainId(42);
    let fingerprint = InterfaceFingerprint::of_name("IAdder");

    let first = match client.get_or_create_proxy(remote_grain, fingerprint) {
        ProxyOrLocal::Proxy(p) => p,
        ProxyOrLocal::LocalServant(_) => panic!("no local servant registered for this id"),
    };
    let second = match client.get_or_create_proxy(remote_grain, fingerprint) {
        ProxyOrLocal::Proxy(p) => p,
        ProxyOrLocal::LocalServant(_) => panic!("no local servant registered for this id"),
    };

    assert!(Arc::ptr_eq(&first, &second), "repeated lookups must reuse the same proxy instance");
}
