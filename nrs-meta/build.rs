//! Build script for nrs-meta
//!
//! Stamps the binary with the source revision, build time and cargo profile
//! for the startup log line. `SOURCE_DATE_EPOCH` pins the build time for
//! reproducible builds; `NRS_BUILD_REVISION` overrides the git lookup for
//! tarball builds without a `.git` directory.

use chrono::{DateTime, SecondsFormat, Utc};
use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
    println!("cargo:rerun-if-env-changed=NRS_BUILD_REVISION");
    // Paths that do not exist force a rerun, so a tree without git restamps every build
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=../.git/index");

    let revision = env::var("NRS_BUILD_REVISION")
        .ok()
        .filter(|r| !r.trim().is_empty())
        .or_else(source_revision)
        .unwrap_or_else(|| "unknown".to_string());

    emit("GIT_HASH", &revision);
    emit("BUILD_TIMESTAMP", &build_time().to_rfc3339_opts(SecondsFormat::Secs, true));
    emit("BUILD_PROFILE", &env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string()));
}

/// Short commit hash, with `-dirty` when the work tree has local edits
fn source_revision() -> Option<String> {
    let hash = git(&["rev-parse", "--short=8", "HEAD"])?;
    let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
        .is_some_and(|status| !status.is_empty());
    Some(if dirty { format!("{}-dirty", hash) } else { hash })
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok().map(|s| s.trim().to_string())
}

fn build_time() -> DateTime<Utc> {
    env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}

fn emit(key: &str, value: &str) {
    println!("cargo:rustc-env={}={}", key, value);
}
