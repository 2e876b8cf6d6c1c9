//! Environment diagnostics for the `check` command.
//!
//! Verifies that the codec library can be loaded and the configuration is usable.

use crate::audio::codec::opus_version;
use crate::audio::encoder::{OPUS_SAMPLE_RATES, PacketEncoder, Pcm16Encoder};
use crate::config::Config;

/// Result of a single check.
#[derive(Debug, PartialEq)]
pub enum CheckResult {
    /// Working; carries a detail line
    Ok(String),
    /// Not available; carries the reason and how to fix it
    NotFound(String),
    /// Present but misconfigured
    Warning(String),
}

impl CheckResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, CheckResult::Ok(_))
    }
}

/// Check whether libopus can be loaded.
pub fn check_opus() -> CheckResult {
    match opus_version() {
        Ok(version) => CheckResult::Ok(version.to_string()),
        Err(e) => CheckResult::NotFound(e.to_string()),
    }
}

/// Check that the configuration builds a working session.
pub fn check_config(config: &Config) -> CheckResult {
    if let Err(e) = config.validate() {
        return CheckResult::Warning(e.to_string());
    }
    if !OPUS_SAMPLE_RATES.contains(&config.codec.sample_rate) {
        return CheckResult::Warning(format!(
            "codec.sample_rate {} Hz works with pcm16 only; Opus needs one of {:?}",
            config.codec.sample_rate, OPUS_SAMPLE_RATES
        ));
    }
    match Pcm16Encoder::new(config.encoder_config()) {
        Ok(encoder) => CheckResult::Ok(format!(
            "{} Hz, {} samples per packet",
            config.codec.sample_rate,
            encoder.frame_size()
        )),
        Err(e) => CheckResult::Warning(e.to_string()),
    }
}

fn print_result(label: &str, result: &CheckResult) {
    print!("{label}: ");
    match result {
        CheckResult::Ok(detail) => println!("✓ OK ({detail})"),
        CheckResult::NotFound(reason) => println!("✗ NOT FOUND\n  {reason}"),
        CheckResult::Warning(msg) => println!("⚠ WARNING: {msg}"),
    }
}

/// Run all checks and print a report. Returns true when everything passed.
pub fn check_environment(config: &Config) -> bool {
    println!("Checking voxnexus environment...\n");

    let opus = check_opus();
    print_result("libopus", &opus);

    let config_result = check_config(config);
    print_result("configuration", &config_result);

    println!();
    if opus.is_ok() && config_result.is_ok() {
        println!("All checks passed.");
        true
    } else if !opus.is_ok() && config_result.is_ok() {
        println!("Opus is unavailable; sessions can still run with --codec pcm16.");
        false
    } else {
        println!("Some checks failed.");
        false
    }
}
