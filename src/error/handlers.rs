//! Error handlers
//!
//! Maps transfer failures onto the status trailer sent to clients.

use crate::error::types::TransferError;
use crate::protocol::{Code, Status};
use log::{error, warn};

/// Log a failed call at a level matching its severity
pub fn handle_error(err: &TransferError) {
    match error_to_status_code(err) {
        Code::Internal => error!("Transfer failed: {}", err),
        _ => warn!("Transfer rejected: {}", err),
    }
}

/// Convert error to status code
pub fn error_to_status_code(err: &TransferError) -> Code {
    match err {
        TransferError::InvalidName(_) => Code::InvalidArgument,
        TransferError::ResourceExhausted(_) => Code::ResourceExhausted,
        TransferError::NotFound(_) => Code::NotFound,
        TransferError::Storage(_) => Code::Internal,
        TransferError::Transport(_) => Code::Internal,
        TransferError::Cancelled => Code::Internal,
    }
}

/// Convert error to the full status trailer
pub fn error_to_status(err: &TransferError) -> Status {
    Status::new(error_to_status_code(err), err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AdmissionError, NameError, StorageError};
    use crate::middleware::OperationClass;
    use std::io;

    #[test]
    fn taxonomy_maps_onto_status_codes() {
        let invalid = TransferError::from(NameError::Empty);
        assert_eq!(error_to_status_code(&invalid), Code::InvalidArgument);

        let exhausted = TransferError::from(AdmissionError::Cancelled(OperationClass::Upload));
        assert_eq!(error_to_status_code(&exhausted), Code::ResourceExhausted);

        let missing = TransferError::from(StorageError::NotFound {
            name: "a.txt".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        });
        assert_eq!(error_to_status_code(&missing), Code::NotFound);

        let broken = TransferError::from(StorageError::io(
            "write",
            "storage/a.txt",
            io::Error::other("disk full"),
        ));
        assert_eq!(error_to_status_code(&broken), Code::Internal);

        let transport = TransferError::Transport(io::Error::from(io::ErrorKind::BrokenPipe));
        assert_eq!(error_to_status_code(&transport), Code::Internal);
        assert_eq!(error_to_status_code(&TransferError::Cancelled), Code::Internal);
    }

    #[test]
    fn status_message_carries_error_text() {
        let status = error_to_status(&TransferError::NotFound("missing.bin".into()));
        assert_eq!(status.code, Code::NotFound);
        assert!(status.message.contains("missing.bin"));
    }
}
