//! Probe harness commands: deploy, inspect, reset, verify, tear down.
//!
//! The probe pair is plain evidence-gathering machinery: a client
//! looping one request per second against a server, logging each
//! outcome. Both are deployed from manifests embedded in the binary,
//! are not rotation state, and can be started or stopped at any time.

use taproot_cluster::WorkloadApi;
use taproot_rotation::verify::{
    ProbeRole, WorkloadProbeHarness, PROBE_CLIENT_UNIT, PROBE_LOG_PATH, PROBE_SERVER_UNIT,
};
use taproot_rotation::ProbeHarness;

use super::{print_json, Context};
use crate::format;

const SERVER_MANIFEST: &str = include_str!("../../manifests/probe-server.yaml");
const CLIENT_MANIFEST: &str = include_str!("../../manifests/probe-client.yaml");

/// The mesh sidecar's local introspection endpoint; reports the
/// certificate the workload is currently serving.
const SIDECAR_CERT_ENDPOINT: &str = "http://127.0.0.1:15000/certs";

/// Deploy both probe workloads and wait for their rollouts.
pub fn start(ctx: &Context) -> anyhow::Result<()> {
    ctx.workloads.apply_manifest(SERVER_MANIFEST)?;
    ctx.workloads.apply_manifest(CLIENT_MANIFEST)?;

    for unit in [PROBE_SERVER_UNIT, PROBE_CLIENT_UNIT] {
        ctx.workloads.wait_ready(unit, ctx.ready_timeout_secs)?;
    }

    if ctx.json {
        print_json(&serde_json::json!({ "started": [PROBE_SERVER_UNIT, PROBE_CLIENT_UNIT] }));
    } else {
        println!("Probe pair running: {PROBE_SERVER_UNIT}, {PROBE_CLIENT_UNIT}.");
    }
    Ok(())
}

/// Show the tail of the probe log plus each workload's active
/// certificate as reported by the sidecar.
pub fn status(ctx: &Context) -> anyhow::Result<()> {
    let mut harness = WorkloadProbeHarness::new(&ctx.workloads);
    let entries = harness.read_log()?;

    let cert_of = |role: ProbeRole| {
        ctx.workloads
            .exec(
                role.unit(),
                &format!("curl -s --max-time 2 {SIDECAR_CERT_ENDPOINT}"),
            )
            .unwrap_or_else(|e| format!("(introspection unavailable: {e})"))
    };
    let client_cert = cert_of(ProbeRole::Client);
    let server_cert = cert_of(ProbeRole::Server);

    if ctx.json {
        print_json(&serde_json::json!({
            "observed": entries.len(),
            "failures": entries.iter().filter(|e| !e.ok).count(),
            "recent": entries.iter().rev().take(10).rev().collect::<Vec<_>>(),
            "client_certificate": client_cert,
            "server_certificate": server_cert,
        }));
    } else {
        format::probe_status(&entries, &client_cert, &server_cert);
    }
    Ok(())
}

/// Truncate the shared request log.
pub fn reset_log(ctx: &Context) -> anyhow::Result<()> {
    let mut harness = WorkloadProbeHarness::new(&ctx.workloads);
    harness.reset_log()?;
    if !ctx.json {
        println!("Probe log reset ({PROBE_LOG_PATH}).");
    }
    Ok(())
}

/// Run the full three-step verification under the given label.
pub fn verify(ctx: &Context, label: &str) -> anyhow::Result<()> {
    super::rotate::run_verification(ctx, label)
}

/// Remove both probe workloads.
pub fn stop(ctx: &Context) -> anyhow::Result<()> {
    ctx.workloads.delete_manifest(CLIENT_MANIFEST)?;
    ctx.workloads.delete_manifest(SERVER_MANIFEST)?;
    if !ctx.json {
        println!("Probe pair removed.");
    }
    Ok(())
}
