use thiserror::Error;

use crate::params::ParamField;
use crate::request::OperationKind;

/// A single parameter field that could not be accepted.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {input:?} ({reason})")]
pub struct FieldError {
    pub field: ParamField,
    /// The raw text that was rejected.
    pub input: String,
    pub reason: &'static str,
}

/// Malformed parameter input, detected before anything reaches the network.
///
/// Every rejected field is listed; fields that parsed cleanly in the same
/// edit have already been applied.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid parameters: {}", join_fields(.fields))]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

impl ValidationError {
    pub fn single(field: ParamField, input: impl Into<String>, reason: &'static str) -> Self {
        Self {
            fields: vec![FieldError {
                field,
                input: input.into(),
                reason,
            }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// An operation was attempted before the session could support it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PreconditionError {
    #[error("no fractal image yet: generate one first")]
    NoImage,

    #[error("image dimensions must be > 0, got {width}×{height}")]
    ZeroImageDimension { width: u32, height: u32 },

    #[error("click position is not finite: ({x}, {y})")]
    NonFiniteClick { x: f64, y: f64 },

    #[error("mapped centre is not finite: ({re}, {im})")]
    NonFiniteCenter { re: f64, im: f64 },
}

/// The request never produced a decodable reply: network failure,
/// non-JSON body, or a reply missing required fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors surfaced by the session controller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error("{0}")]
    Transport(#[from] TransportError),

    /// Well-formed reply whose success flag was `"False"`.
    #[error("{kind} failed: {message}")]
    Domain { kind: OperationKind, message: String },

    /// A newer request of the same kind was issued while this one was in
    /// flight; its reply was dropped without touching any state.
    #[error("{kind} reply superseded by a newer request")]
    Superseded { kind: OperationKind },
}
