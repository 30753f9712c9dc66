pub mod atomic;
pub mod resilient_fs;
pub mod space;

#[cfg(test)]
mod tests;

// Re-exports
pub use resilient_fs::{FromRecovery, ResilientFileSystem};

use crate::error::ErrorContext;
use crate::RawError;
use std::path::PathBuf;

/// POSIX codes the file layer retries locally before involving the error handler
pub const RETRYABLE_CODES: [&str; 8] = [
    "EBUSY", "EMFILE", "ENFILE", "ENOENT", "EAGAIN", "EINTR", "EIO", "ENOSPC",
];

/// Result type for I/O operations
pub type IOResult<T> = Result<T, IOError>;

/// I/O specific errors
#[derive(Debug, thiserror::Error)]
pub enum IOError {
    #[error("{operation} failed for {}: {source}", path.display())]
    OperationFailed {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Insufficient disk space in {}: {required} bytes required", path.display())]
    InsufficientSpace { path: PathBuf, required: u64 },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl IOError {
    /// Wrap the original error of a failed operation
    pub fn operation(context: &ErrorContext, source: std::io::Error) -> Self {
        IOError::OperationFailed {
            operation: context.operation.clone(),
            path: context.file_path.clone().unwrap_or_default(),
            source,
        }
    }

    /// Underlying io::Error, if there is one
    pub fn io_error(&self) -> Option<&std::io::Error> {
        match self {
            IOError::OperationFailed { source, .. } => Some(source),
            IOError::IoError(e) => Some(e),
            IOError::InsufficientSpace { .. } => None,
        }
    }

    pub fn kind(&self) -> Option<std::io::ErrorKind> {
        self.io_error().map(|e| e.kind())
    }
}

impl From<&IOError> for RawError {
    fn from(err: &IOError) -> Self {
        match err {
            IOError::InsufficientSpace { .. } => RawError::msg(err.to_string()).with_code("ENOSPC"),
            _ => {
                let mut raw = RawError::msg(err.to_string());
                raw.code = err.io_error().and_then(posix_code);
                raw
            }
        }
    }
}

impl From<IOError> for RawError {
    fn from(err: IOError) -> Self {
        RawError::from(&err)
    }
}

/// POSIX code name (`ENOENT`, `EACCES`, ...) for an io::Error
pub fn posix_code(err: &std::io::Error) -> Option<String> {
    if let Some(errno) = err.raw_os_error() {
        return Some(format!("{:?}", nix::errno::Errno::from_i32(errno)));
    }

    use std::io::ErrorKind;
    let code = match err.kind() {
        ErrorKind::NotFound => "ENOENT",
        ErrorKind::PermissionDenied => "EACCES",
        ErrorKind::AlreadyExists => "EEXIST",
        ErrorKind::TimedOut => "ETIMEDOUT",
        ErrorKind::WouldBlock => "EAGAIN",
        ErrorKind::Interrupted => "EINTR",
        _ => return None,
    };
    Some(code.to_string())
}

/// Check whether a rename failed because source and target are on different devices
pub fn is_cross_device(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(libc::EXDEV)
}

pub fn is_retryable_code(code: Option<&str>) -> bool {
    code.map(|c| RETRYABLE_CODES.contains(&c)).unwrap_or(false)
}
