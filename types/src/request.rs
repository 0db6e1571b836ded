//! Input Builder: turns a workflow mode plus raw user input into a canonical
//! submission request.
//!
//! Building is pure. Files arrive as in-memory [`Upload`]s; reading them from
//! disk is the caller's job.

use std::fmt;

use thiserror::Error;

use crate::workflow::{Outgroup, WorkflowMode};

/// File name used for sequence text submitted as a standalone blob.
pub const TEXT_BLOB_FILE_NAME: &str = "blob";

/// A user-provided file, already read into memory.
#[derive(Clone, PartialEq, Eq)]
pub struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

impl Upload {
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_parts(self) -> (String, Vec<u8>) {
        (self.file_name, self.bytes)
    }
}

// Sequence files can be large; keep them out of logs.
impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Raw form state for every mode. Fields irrelevant to the chosen mode are ignored.
#[derive(Debug, Clone, Default)]
pub struct InputFields {
    pub outgroup: Option<String>,
    /// Mode 1.
    pub aligned_matrix: Option<Upload>,
    /// Mode 2. Absent means "use the service default alignment".
    pub existing_alignment: Option<Upload>,
    /// Mode 3.
    pub raw_matrix: Option<Upload>,
    /// New sequences (mode 2) or user sequences (mode 3).
    pub sequences_file: Option<Upload>,
    pub sequences_text: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing aligned matrix")]
    MissingAlignedMatrix,
    #[error("missing sequence input")]
    MissingSequenceInput,
    #[error("missing raw matrix")]
    MissingRawMatrix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlignmentSource {
    Uploaded(Upload),
    ServiceDefault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceInput {
    File(Upload),
    /// Trimmed, non-empty pasted text.
    Text(String),
}

impl SequenceInput {
    /// File wins over text; blank text counts as absent.
    fn pick(file: Option<&Upload>, text: Option<&str>) -> Option<Self> {
        if let Some(file) = file {
            return Some(SequenceInput::File(file.clone()));
        }
        text.map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| SequenceInput::Text(t.to_string()))
    }
}

/// Canonical, validated submission. Exactly one mode's artifacts are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionRequest {
    PreAligned {
        outgroup: Outgroup,
        aligned_matrix: Upload,
    },
    AugmentAlignment {
        outgroup: Outgroup,
        alignment: AlignmentSource,
        sequences: SequenceInput,
    },
    AlignFromScratch {
        outgroup: Outgroup,
        raw_matrix: Upload,
        user_sequences: Option<SequenceInput>,
    },
}

/// Value of one multipart form part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File(Upload),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: &'static str,
    pub value: FormValue,
}

impl FormPart {
    fn text(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: FormValue::Text(value.into()),
        }
    }

    fn file(name: &'static str, upload: Upload) -> Self {
        Self {
            name,
            value: FormValue::File(upload),
        }
    }

    fn sequences(file_field: &'static str, text_field: &'static str, input: SequenceInput) -> Self {
        match input {
            SequenceInput::File(upload) => Self::file(file_field, upload),
            SequenceInput::Text(text) => {
                Self::file(text_field, Upload::new(TEXT_BLOB_FILE_NAME, text.into_bytes()))
            }
        }
    }
}

/// Validate `fields` for `mode` and produce the request.
pub fn build(mode: WorkflowMode, fields: &InputFields) -> Result<SubmissionRequest, ValidationError> {
    let outgroup = Outgroup::or_default(fields.outgroup.as_deref());
    let sequences = SequenceInput::pick(
        fields.sequences_file.as_ref(),
        fields.sequences_text.as_deref(),
    );

    match mode {
        WorkflowMode::PreAligned => {
            let aligned_matrix = fields
                .aligned_matrix
                .clone()
                .ok_or(ValidationError::MissingAlignedMatrix)?;
            Ok(SubmissionRequest::PreAligned {
                outgroup,
                aligned_matrix,
            })
        }
        WorkflowMode::AugmentAlignment => {
            let sequences = sequences.ok_or(ValidationError::MissingSequenceInput)?;
            let alignment = match &fields.existing_alignment {
                Some(upload) => AlignmentSource::Uploaded(upload.clone()),
                None => AlignmentSource::ServiceDefault,
            };
            Ok(SubmissionRequest::AugmentAlignment {
                outgroup,
                alignment,
                sequences,
            })
        }
        WorkflowMode::AlignFromScratch => {
            let raw_matrix = fields
                .raw_matrix
                .clone()
                .ok_or(ValidationError::MissingRawMatrix)?;
            Ok(SubmissionRequest::AlignFromScratch {
                outgroup,
                raw_matrix,
                user_sequences: sequences,
            })
        }
    }
}

impl SubmissionRequest {
    #[must_use]
    pub fn mode(&self) -> WorkflowMode {
        match self {
            SubmissionRequest::PreAligned { .. } => WorkflowMode::PreAligned,
            SubmissionRequest::AugmentAlignment { .. } => WorkflowMode::AugmentAlignment,
            SubmissionRequest::AlignFromScratch { .. } => WorkflowMode::AlignFromScratch,
        }
    }

    #[must_use]
    pub fn outgroup(&self) -> &Outgroup {
        match self {
            SubmissionRequest::PreAligned { outgroup, .. }
            | SubmissionRequest::AugmentAlignment { outgroup, .. }
            | SubmissionRequest::AlignFromScratch { outgroup, .. } => outgroup,
        }
    }

    /// Flatten into the multipart parts the upload endpoint expects, in order.
    #[must_use]
    pub fn into_form_parts(self) -> Vec<FormPart> {
        let mode = self.mode();
        let mut parts = vec![
            FormPart::text("workflow_mode", mode.wire_value()),
            FormPart::text("outgroup", self.outgroup().as_str()),
        ];

        match self {
            SubmissionRequest::PreAligned { aligned_matrix, .. } => {
                parts.push(FormPart::file("aligned_matrix", aligned_matrix));
            }
            SubmissionRequest::AugmentAlignment {
                alignment,
                sequences,
                ..
            } => {
                parts.push(match alignment {
                    AlignmentSource::Uploaded(upload) => {
                        FormPart::file("existing_alignment", upload)
                    }
                    AlignmentSource::ServiceDefault => {
                        FormPart::text("use_default_alignment", "true")
                    }
                });
                parts.push(FormPart::sequences(
                    "new_sequences",
                    "new_sequences_text",
                    sequences,
                ));
            }
            SubmissionRequest::AlignFromScratch {
                raw_matrix,
                user_sequences,
                ..
            } => {
                parts.push(FormPart::file("raw_matrix", raw_matrix));
                if let Some(sequences) = user_sequences {
                    parts.push(FormPart::sequences(
                        "user_sequences",
                        "user_sequences_text",
                        sequences,
                    ));
                }
            }
        }

        parts
    }
}
