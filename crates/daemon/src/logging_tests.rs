// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    unset = { None, "info" },
    level = { Some("warn"), "warn" },
    target = { Some("reaper_engine=debug"), "reaper_engine=debug" },
    garbage = { Some("reaper_engine=loud"), "info" },
)]
fn filter_falls_back_to_info(directive: Option<&str>, expected: &str) {
    assert_eq!(filter(directive).to_string(), expected);
}
