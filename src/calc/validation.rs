use thiserror::Error;

/// A user-facing validation failure. Display text is what the form shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("Client name cannot be empty")]
    EmptyClient,
    #[error("Description cannot be empty")]
    EmptyDescription,
    #[error("The invoice has no lines")]
    NoLines,
}

pub fn validate_client(name: &str) -> Result<(), FieldError> {
    if name.trim().is_empty() {
        Err(FieldError::EmptyClient)
    } else {
        Ok(())
    }
}

pub fn validate_description(description: &str) -> Result<(), FieldError> {
    if description.trim().is_empty() {
        Err(FieldError::EmptyDescription)
    } else {
        Ok(())
    }
}

/// Combines validity with visibility: an error is shown only for a touched
/// field that does not currently have focus.
pub fn visible_error(
    validity: Result<(), FieldError>,
    touched: bool,
    focused: bool,
) -> Option<FieldError> {
    if !touched || focused {
        return None;
    }
    validity.err()
}
