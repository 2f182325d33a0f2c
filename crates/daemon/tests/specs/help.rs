//! Help and version output specs

use crate::prelude::*;

#[test]
fn help_shows_usage() {
    reaperd().args(&["--help"]).passes().stdout_has("Usage:").stdout_has("--check");
}

#[test]
fn version_shows_version() {
    reaperd().args(&["--version"]).passes().stdout_has("reaperd 0.1");
}

#[test]
fn unknown_flag_fails() {
    reaperd().args(&["--frobnicate"]).fails().stderr_has("--frobnicate");
}
