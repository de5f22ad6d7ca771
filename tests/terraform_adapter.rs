//! Terraform adapter driven against a stub CLI script.
//!
//! All scenarios run inside one test: writing and executing scripts from
//! parallel tests can fail with ETXTBSY.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use deploy_verify::provision::{ProvisionError, Provisioner, TerraformProvisioner};

const OUTPUT_LISTING: &str =
    r#"{"alb_dns_name":{"sensitive":false,"type":"string","value":"web-alb.example.com"}}"#;

fn write_stub(dir: &Path, name: &str, plan_exit: i32) -> PathBuf {
    let path = dir.join(name);
    let script = format!(
        r#"#!/bin/sh
echo "$1" >> calls.log
case "$1" in
  init|apply) exit 0 ;;
  plan) echo "plan result" >&2; exit {plan_exit} ;;
  output) echo '{OUTPUT_LISTING}' ;;
  *) echo "unknown command $1" >&2; exit 1 ;;
esac
"#
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn calls(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_terraform_adapter_against_stub_cli() {
    let bin_dir = tempfile::tempdir().unwrap();
    let stable = write_stub(bin_dir.path(), "tf-stable", 0);
    let drifting = write_stub(bin_dir.path(), "tf-drifting", 2);
    let broken = write_stub(bin_dir.path(), "tf-broken", 1);

    // Converged apply: init, apply, plan, then output
    let work = tempfile::tempdir().unwrap();
    let provisioner = TerraformProvisioner::new(stable.to_string_lossy(), true);
    let handle = provisioner.provision(work.path()).await.unwrap();
    assert_eq!(handle.dir(), work.path());
    assert_eq!(
        provisioner.output(&handle, "alb_dns_name").await.unwrap(),
        "web-alb.example.com"
    );
    assert!(matches!(
        provisioner.output(&handle, "vpc_id").await,
        Err(ProvisionError::OutputNotFound { .. })
    ));
    assert_eq!(
        calls(work.path()),
        vec!["init", "apply", "plan", "output", "output"]
    );

    // Idempotency check disabled: no plan step
    let work = tempfile::tempdir().unwrap();
    let provisioner = TerraformProvisioner::new(drifting.to_string_lossy(), false);
    provisioner.provision(work.path()).await.unwrap();
    assert_eq!(calls(work.path()), vec!["init", "apply"]);

    // Pending changes after apply
    let work = tempfile::tempdir().unwrap();
    let provisioner = TerraformProvisioner::new(drifting.to_string_lossy(), true);
    let err = provisioner.provision(work.path()).await.unwrap_err();
    assert!(err.to_string().contains("changes still pending"), "{err}");

    // Plan itself fails
    let work = tempfile::tempdir().unwrap();
    let provisioner = TerraformProvisioner::new(broken.to_string_lossy(), true);
    let err = provisioner.provision(work.path()).await.unwrap_err();
    assert!(err.to_string().contains("plan result"), "{err}");

    // Missing binary
    let work = tempfile::tempdir().unwrap();
    let provisioner = TerraformProvisioner::new("/nonexistent/terraform", true);
    let err = provisioner.provision(work.path()).await.unwrap_err();
    assert!(matches!(err, ProvisionError::Spawn { .. }));
}
