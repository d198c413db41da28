//! Wires an [`Endpoint`]'s disconnect into an [`OutOfProcessSilo`]'s fault
//! aggregation (spec §4.7).

use std::sync::Arc;

use remoting_silo::{OutOfProcessSilo, SiloFaultReason};

use crate::endpoint::Endpoint;

/// Reports every endpoint disconnect into the silo's fault aggregation.
/// One-directional: the silo's own `report_fault` is idempotent, so wiring
/// this never causes the endpoint itself to be disconnected a second time —
/// it only ever reacts to a disconnect the endpoint already decided on.
pub fn bridge_endpoint_faults_to_silo(endpoint: &Arc<Endpoint>, silo: Arc<OutOfProcessSilo>) {
    endpoint.on_disconnect(move |reason| {
        let silo = silo.clone();
        let fault = SiloFaultReason::from(reason);
        tokio::spawn(async move {
            silo.report_fault(fault).await;
        });
    });
}
