//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                                        |
//! |------|----------------------------------------------------------------|
//! | 0    | Success                                                        |
//! | 1    | General error (unspecified)                                    |
//! | 2    | CLI usage error (bad args)                                     |
//! | 3    | Invalid config, missing identifier column, uncoercible column  |
//! | 4    | Runtime I/O (unreadable input, unwritable output, bad CSV)     |
//! | 5    | Run completed with warnings under `--strict`                   |
//!
//! Clap reports its own usage errors with exit 2.

use sitemerge_triage::TriageError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Config failed to parse or validate, or a source export cannot be mapped.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Reading an input or writing an output failed.
pub const EXIT_RUNTIME_IO: u8 = 4;

/// `--strict` and the run produced data warnings. Output is still written.
pub const EXIT_STRICT_WARNINGS: u8 = 5;

/// Map an engine error to its exit code.
pub fn triage_exit_code(err: &TriageError) -> u8 {
    if err.is_configuration() {
        EXIT_INVALID_CONFIG
    } else {
        EXIT_RUNTIME_IO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitemerge_triage::SourceKind;

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_INVALID_CONFIG,
            EXIT_RUNTIME_IO,
            EXIT_STRICT_WARNINGS,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn engine_errors_map_by_kind() {
        let missing = TriageError::MissingIdentifierColumn {
            input: SourceKind::Gsc,
            tried: "'Page'".into(),
        };
        assert_eq!(triage_exit_code(&missing), EXIT_INVALID_CONFIG);
        assert_eq!(
            triage_exit_code(&TriageError::ConfigParse("x".into())),
            EXIT_INVALID_CONFIG
        );
        assert_eq!(triage_exit_code(&TriageError::Io("disk full".into())), EXIT_RUNTIME_IO);
        let csv = TriageError::Csv {
            input: SourceKind::Frog,
            message: "bad quote".into(),
        };
        assert_eq!(triage_exit_code(&csv), EXIT_RUNTIME_IO);
    }
}
