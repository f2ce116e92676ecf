//! Build script for deployit-action
//! Stamps the binary with the commit and build date shown in the startup log

use chrono::Utc;
use std::process::Command;

fn commit_hash() -> String {
    // CI runners export the commit being built
    if let Some(sha) = std::env::var("GITHUB_SHA")
        .ok()
        .and_then(|sha| sha.get(..7).map(str::to_string))
    {
        return sha;
    }

    Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() {
    println!("cargo:rustc-env=GIT_HASH={}", commit_hash());
    println!(
        "cargo:rustc-env=BUILD_TIME={}",
        Utc::now().format("%Y-%m-%d")
    );

    println!("cargo:rerun-if-env-changed=GITHUB_SHA");
    println!("cargo:rerun-if-changed=../.git/HEAD");
}
