//! Shared pieces of the submission flows: check the fields, write one
//! document, turn the outcome into a line of text for the form.
//!
//! Nothing here echoes the new document into a page; it shows up through
//! the live view like everybody else's writes.

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("Erro: Autenticação não está pronta.")]
    AuthNotReady,
    #[error("Você precisa cadastrar seu perfil antes de continuar.")]
    ProfileRequired,
    #[error("Erro: {0}")]
    Invalid(&'static str),
    #[error("Falha ao salvar: {0}")]
    Write(#[from] StoreError),
}

/// What the form shows after a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormStatus {
    pub ok: bool,
    pub message: String,
}

impl FormStatus {
    pub fn success(message: impl Into<String>) -> Self {
        FormStatus { ok: true, message: message.into() }
    }

    pub fn failure(err: &FormError) -> Self {
        if let FormError::Write(inner) = err {
            tracing::warn!(error = %inner, "form write failed");
        }
        FormStatus { ok: false, message: err.to_string() }
    }

    pub fn render(status: Option<&FormStatus>) -> String {
        match status {
            Some(status) => crate::res::status(Some(&status.message), status.ok),
            None => String::new(),
        }
    }
}

/// The trimmed value, or `message` if there is nothing left.
pub fn required<'a>(value: &'a str, message: &'static str) -> Result<&'a str, FormError> {
    match value.trim() {
        "" => Err(FormError::Invalid(message)),
        trimmed => Ok(trimmed),
    }
}

/// The trimmed value, or `None` when blank.
pub fn optional(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|v| !v.is_empty())
}

pub fn actor(user_id: Option<&str>) -> Result<&str, FormError> {
    user_id.ok_or(FormError::AuthNotReady)
}
