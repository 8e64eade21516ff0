//! Human-readable CLI output formatting.
//!
//! Presentation layer only — JSON output bypasses this module entirely.

use taproot_pki::{RootIdentity, RotationWorkspace};
use taproot_rotation::verify::{ProbeLogEntry, VerificationReport};
use taproot_rotation::{Phase, RotationState, Snapshot, TransitionPlan};

pub fn prepare_summary(
    ws: &RotationWorkspace,
    root_a: &RootIdentity,
    root_b: &RootIdentity,
    snapshot: &Snapshot,
) {
    println!("Workspace prepared.");
    println!("  Workdir:       {}", ws.path().display());
    println!("  Root A (live): {}", short(&root_a.fingerprint));
    println!("  Root B (new):  {}", short(&root_b.fingerprint));
    println!("  Snapshot of:   {}", snapshot.manifest.record_name);
    println!();
    println!("Next: `taproot probes start`, then `taproot advance --to phase1`.");
}

pub fn plan_summary(plan: &TransitionPlan) {
    println!("Proposed transition: {} -> {}", plan.current, plan.target);
    println!("  Signing identity: {}", plan.signer);
    println!(
        "  Trust anchors:    {} entr{}",
        plan.expected_anchor_count(),
        if plan.expected_anchor_count() == 1 { "y" } else { "ies" }
    );
    for fp in plan.expected_anchor_fingerprints() {
        println!("    - {}", short(&fp));
    }
    println!("  Entry condition:  {}", plan.target.entry_condition());
    if plan.destructive {
        println!("  DESTRUCTIVE:      removes root A's trust anchor");
    }
}

pub fn verification_report(report: &VerificationReport) {
    println!("Verification '{}' passed:", report.label);
    for step in &report.steps {
        println!(
            "  {:<24} {} request(s), 0 failures",
            step.name, step.observed
        );
    }
}

pub fn status_summary(
    record_name: &str,
    record_present: bool,
    anchor_fingerprints: &[String],
    declared: Option<&RotationState>,
    inferred: Option<Phase>,
    snapshot_present: bool,
) {
    println!("Live configuration");
    println!("  Record:   {record_name}{}", if record_present { "" } else { " (absent)" });
    println!("  Anchors:  {}", anchor_fingerprints.len());
    for fp in anchor_fingerprints {
        println!("    - {}", short(fp));
    }
    match declared {
        Some(state) => println!(
            "  Declared: {} (as of {})",
            state.phase,
            state.updated_at.format("%Y-%m-%d %H:%M:%SZ")
        ),
        None => println!("  Declared: none (workspace not prepared)"),
    }
    match inferred {
        Some(phase) => println!("  Inferred: {phase} (diagnostic cross-check from anchor count)"),
        None => println!("  Inferred: unrecognized bundle shape"),
    }
    println!("  Snapshot: {}", if snapshot_present { "present" } else { "absent" });
}

pub fn probe_status(entries: &[ProbeLogEntry], client_cert: &str, server_cert: &str) {
    let failures = entries.iter().filter(|e| !e.ok).count();
    println!("Probe log: {} request(s), {failures} failure(s)", entries.len());
    for entry in entries.iter().rev().take(10).rev() {
        println!("  {entry}");
    }
    println!();
    println!("Client certificate (sidecar introspection):");
    println!("{}", indent(client_cert));
    println!("Server certificate (sidecar introspection):");
    println!("{}", indent(server_cert));
}

fn short(fingerprint: &str) -> &str {
    &fingerprint[..fingerprint.len().min(16)]
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|l| format!("  {l}"))
        .collect::<Vec<_>>()
        .join("\n")
}
