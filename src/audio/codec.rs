//! Process-wide availability check for the native Opus codec.
//!
//! The probe runs once and its outcome is cached; later calls only read the
//! cached result. Nothing here changes how the library is located.

use crate::error::{Result, VoxnexusError};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// How to make libopus available, quoted in every unavailability error.
pub const OPUS_OVERRIDE_HINT: &str = "build with `--features opus` and set LIBOPUS_LIB_DIR to a \
     directory containing libopus (LIBOPUS_STATIC=1 links it statically)";

static OPUS_PROBE: OnceLock<std::result::Result<&'static str, String>> = OnceLock::new();

/// Returns `Ok(())` when an Opus encoder can be created in this process.
pub fn opus_available() -> Result<()> {
    opus_version().map(|_| ())
}

/// Version string reported by the linked libopus.
pub fn opus_version() -> Result<&'static str> {
    match OPUS_PROBE.get_or_init(probe) {
        Ok(version) => Ok(version),
        Err(message) => Err(VoxnexusError::CodecUnavailable {
            message: message.clone(),
        }),
    }
}

#[cfg(feature = "opus")]
fn probe() -> std::result::Result<&'static str, String> {
    match opus::Encoder::new(48000, opus::Channels::Mono, opus::Application::Audio) {
        Ok(_) => {
            let version = opus::version();
            debug!(version, "libopus available");
            Ok(version)
        }
        Err(e) => {
            warn!(error = %e, "libopus probe failed");
            Err(format!("libopus could not create an encoder ({e}); {OPUS_OVERRIDE_HINT}"))
        }
    }
}

#[cfg(not(feature = "opus"))]
fn probe() -> std::result::Result<&'static str, String> {
    warn!("voxnexus was built without Opus support");
    debug!("libopus probe skipped");
    Err(format!("libopus is not linked into this build; {OPUS_OVERRIDE_HINT}"))
}
