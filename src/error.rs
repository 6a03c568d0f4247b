//! Error types for the conversion engine.

use quick_error::quick_error;
use std::io;

/// Type alias for a result from this crate.
pub type Result<T> = ::std::result::Result<T, Error>;

quick_error! {
    /// The main error type for the conversion engine.
    ///
    /// All parser-level failures are reported through these variants and
    /// never silently normalized. The engine is deterministic, so every
    /// failure is terminal.
    #[derive(Debug)]
    pub enum Error {
        /// Malformed or inconsistent input bytes.
        BadFileFormat(reason: String) {
            display("Bad file format: {}", reason)
        }
        /// Inconsistent geometry, duplicate keys or programmatic misuse.
        ParameterOutOfRange(reason: String) {
            display("Parameter out of range: {}", reason)
        }
        /// Reference to a missing tag or instance.
        InexistentItem(reason: String) {
            display("Inexistent item: {}", reason)
        }
        /// The API was used in the wrong temporal order.
        BadSequenceOfCalls(reason: String) {
            display("Bad sequence of calls: {}", reason)
        }
        /// Contract violation from an injected collaborator.
        NullPointer(reason: String) {
            display("Null pointer: {}", reason)
        }
        /// Unsupported pixel format or multi-frame geometry.
        NotImplemented(reason: String) {
            display("Not implemented: {}", reason)
        }
        /// The slices of one conversion disagree on the pixel format.
        IncompatibleImageFormat(reason: String) {
            display("Incompatible image format: {}", reason)
        }
        /// An invariant that should be unreachable was violated.
        InternalError(reason: String) {
            display("Internal error: {}", reason)
        }
        /// I/O error from a serialization sink.
        Io(err: io::Error) {
            from()
            display("I/O error: {}", err)
        }
    }
}
