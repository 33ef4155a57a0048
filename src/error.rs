/// Crate-level error types for the analysis engine.
use crate::types::DocUri;

/// All errors carry enough context to produce a useful diagnostic without
/// a debugger. Absence of a document is never an error (operations return
/// empty results for missing documents), and an unresolvable link target
/// is a classification value, not an error.
#[allow(clippy::error_impl_error, reason = "crate-level error type")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The operation's cancellation token fired before completion.
    /// Distinguishes "no answer yet" from "no matches".
    #[error("operation cancelled")]
    Cancelled,

    /// An excluded-path pattern in the configuration is not a valid glob.
    #[error("invalid glob `{pattern}`: {reason}")]
    InvalidGlob {
        /// The offending pattern as configured.
        pattern: String,
        /// Description of why the pattern failed to compile.
        reason: String,
    },

    /// The tokenizer violated its contract on a document it accepted.
    #[error("tokenize failed for {uri}: {reason}")]
    Tokenize {
        /// Description of the tokenizer failure.
        reason: String,
        /// Document that was being tokenized.
        uri: DocUri,
    },
}
