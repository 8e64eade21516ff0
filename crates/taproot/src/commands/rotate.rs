//! Rotation lifecycle commands: prepare, advance, status, rollback, run.

use anyhow::Context as _;

use taproot_cluster::secret::{
    BUILTIN_RECORD, FIELD_BUILTIN_CERT, FIELD_TRUST_BUNDLE, SIGNING_RECORD,
};
use taproot_cluster::ConfigStore;
use taproot_pki::bundle::anchor_ders;
use taproot_pki::identity::fingerprint_sha256;
use taproot_pki::{
    create_intermediate_identity, create_root_identity, extract_current_root, verify_issued_by,
    RootId,
};
use taproot_rotation::verify::WorkloadProbeHarness;
use taproot_rotation::{
    audit, commit_transition, infer_phase, load_materials, load_state, propose_transition,
    rollback, save_state, take_snapshot, verify_phase, Phase, TransitionPlan,
};

use super::{confirm, print_json, Context};
use crate::format;

/// `prepare` — everything up to (but not including) the first transition.
///
/// Aborts before any mutation if `kubectl` is missing, and refuses to
/// overwrite an existing snapshot, so re-running against a half-prepared
/// workspace is safe.
pub fn prepare(ctx: &Context) -> anyhow::Result<()> {
    taproot_cluster::kubectl::ensure_available()?;
    ctx.ws.ensure_layout()?;

    let root_a = extract_current_root(&ctx.store)?;
    ctx.ws.write_root(&root_a)?;

    let root_b = create_root_identity(RootId::B, ctx.root_days)?;
    ctx.ws.write_root(&root_b)?;

    let intermediate = create_intermediate_identity(&root_b, ctx.intermediate_days)?;
    verify_issued_by(&intermediate.cert_pem, &root_b.cert_pem)
        .context("freshly issued intermediate failed chain validation")?;
    ctx.ws.write_intermediate(&intermediate, &root_b)?;

    ctx.ws.write_trust_bundles(&root_a, &root_b)?;

    let snapshot = take_snapshot(&ctx.store, &ctx.ws)?;
    save_state(&ctx.ws, Phase::Initial)?;

    let _ = audit::append_entry(
        &ctx.ws.audit_path(),
        "prepared",
        &[
            ("root_a", &root_a.fingerprint[..12]),
            ("root_b", &root_b.fingerprint[..12]),
            ("snapshot_record", &snapshot.manifest.record_name),
        ],
    );

    if ctx.json {
        print_json(&serde_json::json!({
            "prepared": true,
            "workdir": ctx.ws.path(),
            "root_a_fingerprint": root_a.fingerprint,
            "root_b_fingerprint": root_b.fingerprint,
            "snapshot_record": snapshot.manifest.record_name,
        }));
    } else {
        format::prepare_summary(&ctx.ws, &root_a, &root_b, &snapshot);
    }
    Ok(())
}

/// `advance --to <phase>` — propose, confirm, commit, verify.
pub fn advance(ctx: &Context, to: &str) -> anyhow::Result<()> {
    let target = Phase::from_str_loose(to)
        .ok_or_else(|| anyhow::anyhow!("unknown phase '{to}' (expected phase1, phase2, or phase3)"))?;
    let state = load_state(&ctx.ws)?
        .ok_or_else(|| anyhow::anyhow!("no rotation state found — run `prepare` first"))?;

    let materials = load_materials(&ctx.ws)?;
    let plan = propose_transition(&materials, state.phase, target)?;

    format::plan_summary(&plan);
    if !confirm_transition(&plan, ctx.yes) {
        eprintln!("Aborted. Nothing was changed.");
        return Ok(());
    }

    let applied = commit_transition(&ctx.store, &plan, ctx.settle)?;
    save_state(&ctx.ws, target)?;
    let _ = audit::append_entry(
        &ctx.ws.audit_path(),
        "transition_applied",
        &[
            ("target", &target.to_string()),
            ("anchors", &applied.anchor_count.to_string()),
        ],
    );

    if ctx.json {
        print_json(&serde_json::json!({
            "applied": target.to_string(),
            "anchors": applied.anchor_count,
        }));
    } else {
        println!(
            "Applied {target}: {} trust anchor(s) live, read-back confirmed.",
            applied.anchor_count
        );
    }

    run_verification(ctx, &target.to_string())
}

fn confirm_transition(plan: &TransitionPlan, assume_yes: bool) -> bool {
    if plan.destructive {
        eprintln!(
            "\nWARNING: {} removes root A's anchor. Workloads still holding\n\
             A-signed certificates will lose connectivity. Proceed only after\n\
             attesting that every live workload certificate is signed under\n\
             root B (see `probes status`), ideally after a long soak at phase2.\n",
            plan.target
        );
    }
    confirm(
        &format!("Apply {} ({} -> {})?", plan.target, plan.current, plan.target),
        assume_yes,
    )
}

/// Shared by `advance` and `run`: drive the three-step protocol and
/// record the verdict in the audit log.
pub fn run_verification(ctx: &Context, label: &str) -> anyhow::Result<()> {
    let mut harness = WorkloadProbeHarness::new(&ctx.workloads);
    match verify_phase(&mut harness, label, ctx.settle_secs, ctx.ready_timeout_secs) {
        Ok(report) => {
            let _ = audit::append_entry(
                &ctx.ws.audit_path(),
                "verification_passed",
                &[("label", label)],
            );
            if ctx.json {
                print_json(&report);
            } else {
                format::verification_report(&report);
            }
            Ok(())
        }
        Err(e) => {
            let _ = audit::append_entry(
                &ctx.ws.audit_path(),
                "verification_failed",
                &[("label", label), ("error", &e.to_string())],
            );
            Err(e.into())
        }
    }
}

/// `status` — read-only inspection of the live configuration.
///
/// Reads the signing record (or the built-in record if no operator
/// record exists) and cross-checks the anchor count against the declared
/// phase. Never mutates the store.
pub fn status(ctx: &Context) -> anyhow::Result<()> {
    let declared = load_state(&ctx.ws)?;
    let snapshot_present = taproot_rotation::load_snapshot(&ctx.ws).is_ok();

    let (record_name, record) = match ctx.store.get(SIGNING_RECORD)? {
        Some(record) => (SIGNING_RECORD, Some(record)),
        None => (BUILTIN_RECORD, ctx.store.get(BUILTIN_RECORD)?),
    };

    // The builtin record has no bundle field; its self-signed root is
    // the single live anchor.
    let bundle_field = if record_name == SIGNING_RECORD {
        FIELD_TRUST_BUNDLE
    } else {
        FIELD_BUILTIN_CERT
    };
    let anchors = match &record {
        Some(record) => match record.field(bundle_field) {
            Some(bundle) => anchor_ders(bundle)?,
            None => Vec::new(),
        },
        None => Vec::new(),
    };

    // Diagnostic inference only; the declared phase is the truth.
    let (root_a_der, root_b_der) = workspace_root_ders(ctx);
    let inferred = infer_phase(&anchors, root_a_der.as_deref(), root_b_der.as_deref());

    let fingerprints: Vec<String> = anchors.iter().map(|d| fingerprint_sha256(d)).collect();

    if ctx.json {
        print_json(&serde_json::json!({
            "record": record_name,
            "record_present": record.is_some(),
            "anchor_count": anchors.len(),
            "anchor_fingerprints": fingerprints,
            "declared_phase": declared.as_ref().map(|s| s.phase.to_string()),
            "inferred_phase": inferred.map(|p| p.to_string()),
            "snapshot_present": snapshot_present,
        }));
    } else {
        format::status_summary(
            record_name,
            record.is_some(),
            &fingerprints,
            declared.as_ref(),
            inferred,
            snapshot_present,
        );
    }
    Ok(())
}

fn workspace_root_ders(ctx: &Context) -> (Option<Vec<u8>>, Option<Vec<u8>>) {
    let der_of = |id| {
        ctx.ws
            .read_root(id)
            .ok()
            .and_then(|root| anchor_ders(root.cert_pem.as_bytes()).ok())
            .and_then(|mut ders| if ders.is_empty() { None } else { Some(ders.remove(0)) })
    };
    (der_of(RootId::A), der_of(RootId::B))
}

/// `rollback` — restore the pre-rotation snapshot from any phase.
pub fn rollback_cmd(ctx: &Context) -> anyhow::Result<()> {
    if !confirm(
        "Restore the pre-rotation signing configuration from the snapshot?",
        ctx.yes,
    ) {
        eprintln!("Aborted. Nothing was changed.");
        return Ok(());
    }

    let snapshot = rollback(&ctx.store, &ctx.ws, ctx.settle)?;
    save_state(&ctx.ws, Phase::Initial)?;
    let _ = audit::append_entry(
        &ctx.ws.audit_path(),
        "rollback_applied",
        &[("record", &snapshot.manifest.record_name)],
    );

    if ctx.json {
        print_json(&serde_json::json!({
            "rolled_back": true,
            "record": snapshot.manifest.record_name,
            "taken_at": snapshot.manifest.taken_at.to_rfc3339(),
        }));
    } else {
        println!(
            "Rolled back to the snapshot of {} taken {}.",
            snapshot.manifest.record_name,
            snapshot.manifest.taken_at.format("%Y-%m-%d %H:%M:%SZ")
        );
    }
    Ok(())
}

/// `run` — the whole rotation as one interactive session. Pauses for
/// confirmation before every transition; any decline or failure leaves
/// the mesh parked at the last verified phase, which is always a safe
/// place to stay.
pub fn run_all(ctx: &Context) -> anyhow::Result<()> {
    if load_state(&ctx.ws)?.is_none() {
        if !confirm("Workspace is not prepared. Run `prepare` now?", ctx.yes) {
            eprintln!("Aborted. Nothing was changed.");
            return Ok(());
        }
        prepare(ctx)?;
    }

    loop {
        let state = load_state(&ctx.ws)?
            .ok_or_else(|| anyhow::anyhow!("rotation state vanished mid-run"))?;
        let Some(target) = state.phase.next() else {
            println!("Rotation complete: the mesh trusts only root B.");
            return Ok(());
        };

        advance(ctx, &target.to_string())?;

        if let Some(following) = target.next() {
            if !confirm(
                &format!("{target} verified. Continue to {following}?"),
                ctx.yes,
            ) {
                println!("Pausing at {target}. Re-run `run` or `advance` to continue.");
                return Ok(());
            }
        }
    }
}
