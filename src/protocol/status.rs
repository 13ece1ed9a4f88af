//! Call status
//!
//! Every call ends with one status trailer. Codes keep the numbering
//! familiar from gRPC so clients can map them directly.

use std::fmt;

/// Outcome code carried by the status trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Code {
    Ok = 0,
    InvalidArgument = 3,
    NotFound = 5,
    ResourceExhausted = 8,
    Internal = 13,
}

impl Code {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Code::Ok),
            3 => Some(Code::InvalidArgument),
            5 => Some(Code::NotFound),
            8 => Some(Code::ResourceExhausted),
            13 => Some(Code::Internal),
            _ => None,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Code::Ok => "ok",
            Code::InvalidArgument => "invalid argument",
            Code::NotFound => "not found",
            Code::ResourceExhausted => "resource exhausted",
            Code::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Status trailer: a code plus a human readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: Code,
    pub message: String,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new(Code::Ok, "")
    }

    pub fn is_ok(&self) -> bool {
        self.code == Code::Ok
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for Status {}
