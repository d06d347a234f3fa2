//==================================================
// File: error.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Runtime error taxonomy
// Objective: Typed failures for linking, table construction and scheduling,
//            plus the fatal path for scheduler invariant violations
//==================================================

use thiserror::Error;

use crate::segment::DescriptorRef;

/// Errors surfaced by the linker, the table builders and the async bridge.
#[derive(Debug, Error)]
pub enum SolvraError {
    #[error("invalid linkage: {0}")]
    InvalidLinkage(String),
    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("invalid constructor: {0}")]
    InvalidConstructor(String),
    #[error("invalid allocator: {0}")]
    InvalidAllocator(String),
    #[error("invalid impl type: {0}")]
    InvalidImplType(String),
    #[error("duplicate member {0}")]
    DuplicateMember(DescriptorRef),
    #[error("inheritance cycle detected at {0}")]
    CycleDetected(DescriptorRef),
    #[error("missing object {0}")]
    MissingObject(String),
    #[error("missing symbol {0}")]
    MissingSymbol(String),
    #[error("missing method {0}")]
    MissingMethod(String),
    #[error("runtime invariant: {0}")]
    RuntimeInvariant(String),
    #[error("bytecode error: {0}")]
    Bytecode(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl SolvraError {
    /// True for failures caused by a corrupt or incompatible segment rather than runtime misuse.
    pub fn is_linkage_error(&self) -> bool {
        matches!(
            self,
            SolvraError::InvalidLinkage(_)
                | SolvraError::InvalidSymbol(_)
                | SolvraError::MissingObject(_)
                | SolvraError::MissingSymbol(_)
        )
    }
}

impl From<std::io::Error> for SolvraError {
    fn from(err: std::io::Error) -> Self {
        SolvraError::Internal(err.to_string())
    }
}

pub type SolvraResult<T> = Result<T, SolvraError>;

/// Log an invariant violation and abort the current thread of control.
///
/// Used for scheduler misuse, which indicates an interpreter bug rather than bad input.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)+) => {{
        let message = format!($($arg)+);
        ::tracing::error!(target: "solvra_runtime::fatal", "{}", message);
        panic!("{}", message);
    }};
}

//==================================================
// End of file
//==================================================
