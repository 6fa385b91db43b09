//! CLI output: error mapping from engine errors to stable CLI surface.

use crate::error::EngineError;

/// Map an engine error to the text printed on stderr.
/// Validation failures carry the whole report; unformatted files are listed.
pub fn map_error(e: &EngineError) -> String {
    match e {
        EngineError::ValidationFailed { report } => format!("{}\n{}", e, report),
        EngineError::Unformatted { files } => {
            let mut out = e.to_string();
            for file in files {
                out.push_str(&format!("\n  {}", file.display()));
            }
            out
        }
        _ => e.to_string(),
    }
}
