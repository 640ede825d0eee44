// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use libfuzzer_sys::fuzz_target;
use shotsort::classifier::clean_filename;
use shotsort::matcher::{extract_date, is_screenshot_name};

fuzz_target!(|name: &str| {
    let date = extract_date(name);
    assert!(date.is_empty() || date.len() == 6);

    if is_screenshot_name(name) {
        assert_eq!(date.len(), 6);
    }

    let clean = clean_filename(name);
    assert!(!clean.contains('/') && !clean.contains('\\'));
});
