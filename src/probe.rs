//! Human-readable container/stream summary via ffprobe.
//!
//! ffprobe is optional: when it is missing the probe degrades to a fixed
//! message instead of failing.

use crate::command::build_probe;
use crate::tool_resolver::ToolPathResolver;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

pub const PROBE_UNAVAILABLE: &str = "ffprobe not found. Skipping detailed probe.";

/// Run ffprobe on `input` and return its summary, or a message explaining why not
pub async fn probe(resolver: &ToolPathResolver, input: &Path) -> String {
    let Some(ffprobe) = resolver.ffprobe() else {
        return PROBE_UNAVAILABLE.to_string();
    };

    let spec = build_probe(&ffprobe, input);
    debug!("Probing: {}", spec);

    let output = Command::new(&spec.program)
        .args(&spec.args)
        .stdin(Stdio::null())
        .output()
        .await;

    match output {
        Ok(output) => {
            // ffprobe reports errors on stderr; show both streams together.
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));

            if output.status.success() {
                text
            } else {
                format!("ffprobe failed:\n{}", text)
            }
        }
        Err(e) => format!("ffprobe failed:\n{}", e),
    }
}
