//! Build script for vtel-live
//!
//! Exposes `GIT_HASH`, `BUILD_TIMESTAMP` and `BUILD_PROFILE` to the binary for
//! the startup banner. Source tarballs have no `.git`, so
//! packagers can pin the revision through `VTEL_GIT_HASH`.

use chrono::{SecondsFormat, Utc};
use std::env;
use std::process::Command;

const UNKNOWN: &str = "unknown";

fn main() {
    emit("GIT_HASH", &git_revision());
    emit("BUILD_TIMESTAMP", &Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
    emit("BUILD_PROFILE", &env::var("PROFILE").unwrap_or_else(|_| UNKNOWN.to_string()));
}

fn emit(key: &str, value: &str) {
    println!("cargo:rustc-env={}={}", key, value);
}

/// Pinned revision, else `git describe` with a `-dirty` suffix for local edits
fn git_revision() -> String {
    if let Ok(pinned) = env::var("VTEL_GIT_HASH") {
        if !pinned.trim().is_empty() {
            return pinned.trim().to_string();
        }
    }

    Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=8"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|described| described.trim().to_string())
        .filter(|described| !described.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}
