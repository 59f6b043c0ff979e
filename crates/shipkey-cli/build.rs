//! Derive the binary's version from git tags.
//!
//! The result is the running version the upgrade check compares against, so
//! it must stay in step with the tags releases are published under.

fn main() {
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-env-changed=SHIPKEY_VERSION_OVERRIDE");

    let version = std::env::var("SHIPKEY_VERSION_OVERRIDE")
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| {
            std::process::Command::new("git")
                .args(["describe", "--tags", "--always", "--dirty=-dev"])
                .output()
                .ok()
                .filter(|o| o.status.success())
                .and_then(|o| String::from_utf8(o.stdout).ok())
                .map(|s| s.trim().trim_start_matches('v').to_string())
                // A bare commit hash is not a version.
                .filter(|v| v.contains('.') && v.starts_with(|c: char| c.is_ascii_digit()))
        })
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo:rustc-env=SHIPKEY_VERSION={version}");
}
