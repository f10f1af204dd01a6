use std::sync::Arc;

use orca_core::config::AppConfig;
use orca_core::location::{self, FileLocation, LocationHost};
use orca_core::traits::Backend;

struct CheckResult {
    label: String,
    ok: bool,
    detail: String,
}

/// Run every check and print one line per result. Returns the number of
/// failed checks.
pub async fn run_doctor(config: &AppConfig, backend: Arc<dyn Backend>) -> usize {
    let mut checks = Vec::new();

    // 1. Engine reachable and listing workflows
    let engine = check_engine(config, backend.as_ref()).await;
    let workflows = engine.1;
    checks.push(engine.0);

    // 2. Every graph is structurally sound
    checks.push(check_graphs(backend.as_ref(), &workflows).await);

    // 3. State dir exists and writable
    checks.push(check_state_dir(config));

    // 4. Saved location is usable
    checks.push(check_location(config, &workflows));

    let mut ok_count = 0;
    let mut fail_count = 0;

    for check in &checks {
        let icon = if check.ok { "[OK]" } else { "[!!]" };
        println!("  {} {}: {}", icon, check.label, check.detail);
        if check.ok {
            ok_count += 1;
        } else {
            fail_count += 1;
        }
    }

    println!();
    println!("  {} passed, {} issues found", ok_count, fail_count);
    fail_count
}

async fn check_engine(config: &AppConfig, backend: &dyn Backend) -> (CheckResult, Vec<String>) {
    match backend.list_workflows().await {
        Ok(list) => {
            let ids: Vec<String> = list.iter().map(|w| w.workflow_id().to_string()).collect();
            (
                CheckResult {
                    label: "Engine".into(),
                    ok: true,
                    detail: format!("{} ({} workflows)", config.backend.base_url, ids.len()),
                },
                ids,
            )
        }
        Err(e) => (
            CheckResult {
                label: "Engine".into(),
                ok: false,
                detail: format!("{}: {}", config.backend.base_url, e),
            },
            Vec::new(),
        ),
    }
}

async fn check_graphs(backend: &dyn Backend, workflows: &[String]) -> CheckResult {
    let mut issues = Vec::new();
    for workflow in workflows {
        let result = match backend.fetch_graph(workflow).await {
            Ok(doc) => orca_core::transform(&doc).map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            issues.push(format!("{}: {}", workflow, e));
        }
    }

    if issues.is_empty() {
        CheckResult {
            label: "Graphs".into(),
            ok: true,
            detail: format!("{} checked", workflows.len()),
        }
    } else {
        CheckResult {
            label: "Graphs".into(),
            ok: false,
            detail: issues.join("; "),
        }
    }
}

fn check_state_dir(config: &AppConfig) -> CheckResult {
    let dir = config.state_dir();
    if let Err(e) = std::fs::create_dir_all(&dir) {
        return CheckResult {
            label: "State dir".into(),
            ok: false,
            detail: format!("{} (cannot create: {})", dir.display(), e),
        };
    }

    // Check writable by attempting to create a temp file
    let test_file = dir.join(".doctor_test");
    match std::fs::write(&test_file, "test") {
        Ok(_) => {
            std::fs::remove_file(&test_file).ok();
            CheckResult {
                label: "State dir".into(),
                ok: true,
                detail: format!("{}", dir.display()),
            }
        }
        Err(e) => CheckResult {
            label: "State dir".into(),
            ok: false,
            detail: format!("{} (not writable: {})", dir.display(), e),
        },
    }
}

fn check_location(config: &AppConfig, workflows: &[String]) -> CheckResult {
    let host = FileLocation::new(config.location_file());
    let raw = host.read();
    let state = location::parse(&raw);

    if raw.is_empty() {
        return CheckResult {
            label: "Location".into(),
            ok: true,
            detail: "None saved".into(),
        };
    }

    let canonical = state.to_string();
    match state.workflow_id() {
        Some(wf) if !workflows.is_empty() && !workflows.iter().any(|w| w == wf) => CheckResult {
            label: "Location".into(),
            ok: false,
            detail: format!("{} (workflow '{}' not known to the engine)", canonical, wf),
        },
        _ if canonical != raw => CheckResult {
            label: "Location".into(),
            ok: false,
            detail: format!("'{}' opens as '{}'", raw, canonical),
        },
        _ => CheckResult {
            label: "Location".into(),
            ok: true,
            detail: canonical,
        },
    }
}
