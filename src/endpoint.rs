//! The connected endpoint: read/write pumps, call dispatch, and the
//! connection state machine (spec §4.1, §4.3, §4.6).
//!
//! `Endpoint::spawn` takes an already-handshaken stream — connecting the
//! transport and exchanging [`remoting_wire::HandshakePayload`]s is the
//! caller's job, since it differs between an in-process `TcpStream` dial and
//! a silo's freshly-spawned child. From there the endpoint owns everything:
//! framing, call dispatch, heartbeat supervision, and disconnect handling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use remoting_heartbeat::{HeartbeatFailureReason, HeartbeatSupervisor, NeverDebugging};
use remoting_registry::{
    EndpointHandle, InterfaceFingerprint, InvokeError, ObjectRegistry, ProxyOrLocal, Subject,
};
use remoting_silo::EndPointDisconnectReason;
use remoting_wire::{
    CallHeader, Frame, FrameCodec, GrainId, IdAllocator, MessageKind, PayloadReader, PayloadWriter,
    ValueSerializer, WireError,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use crate::config::EndpointConfig;
use crate::error::RemotingError;
use crate::pending::PendingCalls;

/// Connection lifecycle (spec §3). Connecting and handshaking happen before
/// [`Endpoint::spawn`] is ever called, so every endpoint starts `Connected`.
/// Any state can transition to `Faulted` (spec §4.5); a requested, graceful
/// disconnect lands in `Disconnected` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    Connected,
    Disconnecting,
    Disconnected(EndPointDisconnectReason),
    Faulted(EndPointDisconnectReason),
}

/// Whether a disconnect reason reflects a requested, orderly shutdown rather
/// than a detected failure (spec §4.5's "any state → Faulted" transition).
fn is_graceful(reason: EndPointDisconnectReason) -> bool {
    matches!(
        reason,
        EndPointDisconnectReason::RequestedByEndPoint | EndPointDisconnectReason::RequestedByRemoteEndPoint
    )
}

/// The built-in servant at [`GrainId::HEARTBEAT`]. It does nothing besides
/// answer `Probe`, which is exactly what the supervisor needs to confirm the
/// peer is still processing calls.
struct HeartbeatSubject;

impl Subject for HeartbeatSubject {
    fn invoke(
        &self,
        method_name: &str,
        _serializer: &dyn ValueSerializer,
        _reader: &mut PayloadReader<'_>,
        _writer: &mut PayloadWriter,
    ) -> Result<(), InvokeError> {
        match method_name {
            "Probe" => Ok(()),
            other => Err(InvokeError::NoSuchMethod(other.to_owned())),
        }
    }
}

/// Reserved typename for the built-in "no servant at this grain id" fault
/// (spec §7). Not a user exception type, so the call-awaiting side maps it
/// back to the distinct [`RemotingError::NoSuchServant`] kind instead of the
/// generic [`RemotingError::RemoteException`].
const NO_SUCH_SERVANT_TYPENAME: &str = "SharpRemote.NoSuchServantException";

fn encode_exception(
    serializer: &dyn ValueSerializer,
    marshalable: bool,
    original_typename: &str,
    original_message: &str,
) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.put(&[u8::from(marshalable)]);
    let _ = serializer.write_string(&mut w, Some(original_typename));
    let _ = serializer.write_string(&mut w, Some(original_message));
    w.into_vec()
}

fn decode_exception(
    serializer: &dyn ValueSerializer,
    payload: &[u8],
) -> Result<(bool, String, String), RemotingError> {
    let mut r = PayloadReader::new(payload);
    let marshalable = r.take(1)?[0] != 0;
    let original_typename = serializer.read_string(&mut r)?.unwrap_or_default();
    let original_message = serializer.read_string(&mut r)?.unwrap_or_default();
    Ok((marshalable, original_typename, original_message))
}

/// One live connection: owns the read/write pumps, the pending-call table,
/// and a heartbeat supervisor probing the peer's [`GrainId::HEARTBEAT`]
/// servant.
pub struct Endpoint {
    registry: Arc<ObjectRegistry>,
    pending: Arc<PendingCalls>,
    ids: IdAllocator,
    outbound: mpsc::Sender<Frame>,
    state_tx: watch::Sender<EndpointState>,
    state_rx: watch::Receiver<EndpointState>,
    dispatch_semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    serializer: Arc<dyn ValueSerializer>,
    disconnect_once: AtomicBool,
    heartbeat: Mutex<Option<Arc<HeartbeatSupervisor>>>,
    #[allow(clippy::type_complexity)]
    on_disconnect: Mutex<Option<Arc<dyn Fn(EndPointDisconnectReason) + Send + Sync>>>,
}

impl Endpoint {
    /// Take ownership of an already-handshaken stream and start pumping it.
    /// `registry` must not already hold a servant at [`GrainId::HEARTBEAT`]
    /// — each endpoint brings its own.
    #[must_use]
    pub fn spawn<S>(
        stream: S,
        config: EndpointConfig,
        registry: Arc<ObjectRegistry>,
        serializer: Arc<dyn ValueSerializer>,
    ) -> Arc<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        registry
            .create_servant(
                GrainId::HEARTBEAT,
                InterfaceFingerprint::of_name("IHeartbeat"),
                Arc::new(HeartbeatSubject) as Arc<dyn Subject>,
            )
            .expect("a fresh registry registers the heartbeat servant exactly once");

        let (outbound_tx, outbound_rx) = mpsc::channel(config.max_in_flight_calls.max(1));
        let (state_tx, state_rx) = watch::channel(EndpointState::Connected);

        let endpoint = Arc::new(Self {
            registry,
            pending: Arc::new(PendingCalls::new(config.max_in_flight_calls)),
            ids: IdAllocator::new(),
            outbound: outbound_tx,
            state_tx,
            state_rx,
            dispatch_semaphore: Arc::new(Semaphore::new(config.dispatch_workers)),
            cancel: CancellationToken::new(),
            serializer,
            disconnect_once: AtomicBool::new(false),
            heartbeat: Mutex::new(None),
            on_disconnect: Mutex::new(None),
        });

        let (read_half, write_half) = tokio::io::split(stream);
        let framed_read = FramedRead::new(read_half, FrameCodec::new(config.max_frame_size));
        let framed_write = FramedWrite::new(write_half, FrameCodec::new(config.max_frame_size));

        let read_endpoint = endpoint.clone();
        tokio::spawn(async move { read_endpoint.read_pump(framed_read).await });

        let write_endpoint = endpoint.clone();
        tokio::spawn(async move { write_endpoint.write_pump(framed_write, outbound_rx).await });

        let probe_weak: Weak<dyn remoting_heartbeat::HeartbeatProbe> =
            Arc::downgrade(&endpoint) as Weak<dyn remoting_heartbeat::HeartbeatProbe>;
        let failure_endpoint = endpoint.clone();
        let supervisor = HeartbeatSupervisor::start(
            config.heartbeat,
            probe_weak,
            Arc::new(NeverDebugging),
            move |_reason: HeartbeatFailureReason| {
                let endpoint = failure_endpoint.clone();
                tokio::spawn(async move {
                    endpoint.disconnect(EndPointDisconnectReason::ReadFailure).await;
                });
            },
        );
        *endpoint.heartbeat.lock() = Some(supervisor);

        endpoint
    }

    /// Install a hook run once, on the first transition out of `Connected`.
    pub fn on_disconnect(&self, hook: impl Fn(EndPointDisconnectReason) + Send + Sync + 'static) {
        *self.on_disconnect.lock() = Some(Arc::new(hook));
    }

    #[must_use]
    pub fn state(&self) -> watch::Receiver<EndpointState> {
        self.state_rx.clone()
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ObjectRegistry> {
        &self.registry
    }

    /// Resolve a proxy for `grain_id` against this endpoint's peer, or a
    /// local pass-through if `grain_id` already names a servant here (spec
    /// §4.4).
    pub fn get_or_create_proxy(
        self: &Arc<Self>,
        grain_id: GrainId,
        interface_fingerprint: InterfaceFingerprint,
    ) -> ProxyOrLocal {
        let handle: Weak<dyn EndpointHandle> = Arc::downgrade(self) as Weak<dyn EndpointHandle>;
        self.registry.get_or_create_proxy(grain_id, interface_fingerprint, handle)
    }

    /// Issue a call and wait for its response. Fails fast with
    /// [`RemotingError::NotConnected`] rather than queuing against a dead
    /// connection.
    pub async fn call(
        &self,
        servant_id: GrainId,
        interface_name: impl Into<String>,
        method_name: impl Into<String>,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, RemotingError> {
        if !matches!(*self.state_rx.borrow(), EndpointState::Connected) {
            return Err(RemotingError::NotConnected);
        }

        let rpc_id = self.ids.next_rpc_id();
        let frame = Frame::call(rpc_id, servant_id, interface_name, method_name, payload);
        let (_guard, rx) = self.pending.enqueue(rpc_id).await;
        self.outbound.send(frame).await.map_err(|_| RemotingError::NotConnected)?;
        let frame = rx.await.map_err(|_| RemotingError::NotConnected)??;

        if frame.kind.is_exception() {
            let (marshalable, original_typename, original_message) =
                decode_exception(self.serializer.as_ref(), &frame.payload)?;
            return if original_typename == NO_SUCH_SERVANT_TYPENAME {
                Err(RemotingError::NoSuchServant(servant_id))
            } else if marshalable {
                Err(RemotingError::RemoteException(original_message))
            } else {
                Err(RemotingError::UnserializableException { original_typename, original_message })
            };
        }

        Ok(frame.payload)
    }

    /// Send `Goodbye` and disconnect locally (spec §4.3).
    pub async fn close(self: &Arc<Self>) {
        let rpc_id = self.ids.next_rpc_id();
        let _ = self.outbound.send(Frame::goodbye(rpc_id)).await;
        self.disconnect(EndPointDisconnectReason::RequestedByEndPoint).await;
    }

    /// Tear the connection down. Idempotent: only the first call runs
    /// cleanup and invokes the disconnect hook.
    pub async fn disconnect(self: &Arc<Self>, reason: EndPointDisconnectReason) {
        if self.disconnect_once.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return;
        }
        tracing::info!(?reason, "endpoint disconnecting");
        let _ = self.state_tx.send(EndpointState::Disconnecting);
        self.cancel.cancel();
        if let Some(supervisor) = self.heartbeat.lock().take() {
            supervisor.stop();
        }
        self.pending.cancel_all(|| RemotingError::ConnectionLost(reason));
        let terminal =
            if is_graceful(reason) { EndpointState::Disconnected(reason) } else { EndpointState::Faulted(reason) };
        let _ = self.state_tx.send(terminal);
        if let Some(hook) = self.on_disconnect.lock().clone() {
            hook(reason);
        }
    }

    async fn read_pump<R>(self: Arc<Self>, mut framed: FramedRead<R, FrameCodec>)
    where
        R: AsyncRead + Unpin,
    {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return,
                frame = framed.next() => {
                    match frame {
                        Some(Ok(frame)) => self.clone().handle_incoming(frame).await,
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "endpoint read pump failing");
                            let reason = match e {
                                WireError::RpcInvalidResponse(_) => EndPointDisconnectReason::RpcInvalidResponse,
                                _ => EndPointDisconnectReason::ReadFailure,
                            };
                            self.disconnect(reason).await;
                            return;
                        }
                        None => {
                            self.disconnect(EndPointDisconnectReason::ReadFailure).await;
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn handle_incoming(self: Arc<Self>, frame: Frame) {
        if frame.kind.contains(MessageKind::GOODBYE) {
            self.disconnect(EndPointDisconnectReason::RequestedByRemoteEndPoint).await;
            return;
        }
        if frame.kind.contains(MessageKind::CALL) {
            tokio::spawn(async move { self.dispatch_call(frame).await });
            return;
        }
        if frame.kind.contains(MessageKind::RETURN) {
            self.pending.complete(frame.rpc_id, Ok(frame));
            return;
        }
        if frame.kind == MessageKind::HEARTBEAT {
            // A courtesy keep-alive ping, independent of the RPC-based probe
            // the heartbeat supervisor issues against GrainId::HEARTBEAT.
            let _ = self.outbound.send(Frame::heartbeat(frame.rpc_id)).await;
        }
    }

    async fn dispatch_call(self: Arc<Self>, frame: Frame) {
        let Ok(permit) = self.dispatch_semaphore.clone().acquire_owned().await else { return };
        let rpc_id = frame.rpc_id;
        let call: CallHeader = frame.call.expect("CALL frames always carry a call header");

        let response = match self.registry.lookup_servant(call.servant_id) {
            Ok(servant) => {
                let mut reader = PayloadReader::new(&frame.payload);
                let mut writer = PayloadWriter::new();
                match servant.invoke(&call.method_name, self.serializer.as_ref(), &mut reader, &mut writer) {
                    Ok(()) => Frame::returns(rpc_id, writer.into_vec()),
                    Err(InvokeError::NoSuchMethod(name)) => Frame::exception(
                        rpc_id,
                        encode_exception(
                            self.serializer.as_ref(),
                            true,
                            "NoSuchMethod",
                            &format!("no such method: {name}"),
                        ),
                    ),
                    Err(InvokeError::Remote(e)) => Frame::exception(
                        rpc_id,
                        encode_exception(self.serializer.as_ref(), true, "RemoteException", &e.to_string()),
                    ),
                    Err(InvokeError::Unserializable(e)) => Frame::exception(
                        rpc_id,
                        encode_exception(
                            self.serializer.as_ref(),
                            false,
                            "UnserializableException",
                            &e.to_string(),
                        ),
                    ),
                }
            }
            Err(_) => Frame::exception(
                rpc_id,
                encode_exception(
                    self.serializer.as_ref(),
                    true,
                    NO_SUCH_SERVANT_TYPENAME,
                    &format!("no such servant: {}", call.servant_id),
                ),
            ),
        };

        drop(permit);
        let _ = self.outbound.send(response).await;
    }

    async fn write_pump<W>(
        self: Arc<Self>,
        mut framed: FramedWrite<W, FrameCodec>,
        mut outbound_rx: mpsc::Receiver<Frame>,
    ) where
        W: AsyncWrite + Unpin,
    {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return,
                frame = outbound_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            if let Err(e) = framed.send(frame).await {
                                tracing::warn!(error = %e, "endpoint write pump failing");
                                self.disconnect(EndPointDisconnectReason::UnhandledException).await;
                                return;
                            }
                        }
                        None => return,
                    }
                }
            }
        }
    }
}

impl EndpointHandle for Endpoint {
    fn is_connected(&self) -> bool {
        matches!(*self.state_rx.borrow(), EndpointState::Connected)
    }
}

#[async_trait::async_trait]
impl remoting_heartbeat::HeartbeatProbe for Endpoint {
    async fn probe(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.call(GrainId::HEARTBEAT, "IHeartbeat", "Probe", Vec::new())
            .await
            .map(|_| ())
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remoting_test_support::{transport_pair, DefaultTestSerializer, DEFAULT_BUFFER_SIZE};
    use std::time::Duration;

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

    async fn connected_pair() -> (Arc<Endpoint>, Arc<Endpoint>) {
        let (client_stream, server_stream) = transport_pair(DEFAULT_BUFFER_SIZE);

        let server_registry = ObjectRegistry::new();
        let adder_id = GrainId(1);
        server_registry
            .create_servant(adder_id, InterfaceFingerprint::of_name("IAdder"), Arc::new(AdderSubject))
            .unwrap();

        let client = Endpoint::spawn(
            client_stream,
            EndpointConfig::default(),
            ObjectRegistry::new(),
            Arc::new(DefaultTestSerializer),
        );
        let server = Endpoint::spawn(
            server_stream,
            EndpointConfig::default(),
            server_registry,
            Arc::new(DefaultTestSerializer),
        );
        (client, server)
    }

    #[tokio::test]
    async fn a_call_reaches_the_remote_servant_and_returns_its_result() {
        let (client, _server) = connected_pair().await;

        let payload =
            client.call(GrainId(1), "IAdder", "Add", encode_add_args(2, 3)).await.unwrap();

        let ser = DefaultTestSerializer;
        let mut r = PayloadReader::new(&payload);
        assert_eq!(ser.read_i32(&mut r).unwrap(), 5);
    }

    #[tokio::test]
    async fn calling_an_unknown_servant_surfaces_no_such_servant() {
        let (client, _server) = connected_pair().await;

        let err = client.call(GrainId(404), "IAdder", "Add", vec![]).await.unwrap_err();
        assert!(matches!(err, RemotingError::NoSuchServant(GrainId(404))));
    }

    #[tokio::test]
    async fn calling_an_unknown_method_surfaces_a_remote_exception() {
        let (client, _server) = connected_pair().await;

        let err = client.call(GrainId(1), "IAdder", "Subtract", vec![]).await.unwrap_err();
        assert!(matches!(err, RemotingError::RemoteException(_)));
    }

    #[tokio::test]
    async fn closing_one_side_disconnects_the_other() {
        let (client, server) = connected_pair().await;

        client.close().await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(matches!(*server.state().borrow(), EndpointState::Disconnected(_)));
    }

    #[tokio::test]
    async fn disconnecting_fails_every_outstanding_call() {
        let (client, _server) = connected_pair().await;

        // Exhaust nothing, just issue a call against a servant that never
        // responds by racing disconnect against the in-flight call.
        let call = tokio::spawn({
            let client = client.clone();
            async move { client.call(GrainId(1), "IAdder", "Add", encode_add_args(1, 1)).await }
        });

        client.disconnect(EndPointDisconnectReason::ReadFailure).await;

        // The in-flight call may have already completed successfully before
        // disconnect ran; either outcome is acceptable, but a second call
        // issued after disconnect must fail fast.
        let _ = call.await.unwrap();
        let err = client.call(GrainId(1), "IAdder", "Add", encode_add_args(1, 1)).await.unwrap_err();
        assert!(matches!(err, RemotingError::NotConnected));
    }
}
