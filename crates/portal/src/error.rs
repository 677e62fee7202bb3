use fms_core::error::CoreError;
use fms_remote::RemoteError;

/// Portal-level error wrapping the domain and remote layers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Text shown to the user in a toast or inline message.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Core(CoreError::Validation(msg)) => msg.clone(),
            AppError::Core(e) => e.to_string(),
            AppError::Remote(RemoteError::Api { message, .. }) => message.clone(),
            AppError::Remote(e) if e.is_network() => {
                "Could not reach the server. Check your connection and try again.".into()
            }
            AppError::Remote(e) => e.to_string(),
            AppError::Validation(errors) => validation_summary(errors),
            AppError::NotAuthenticated => "Please sign in to continue.".into(),
            AppError::Forbidden(msg) => msg.clone(),
            AppError::Internal(_) => "Something went wrong.".into(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Typed outcome of a failed sign-in or sign-up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Email not confirmed")]
    EmailNotConfirmed,

    #[error("Network error: {0}")]
    Network(String),

    /// The auth service refused the request, e.g. a duplicate registration.
    #[error("{0}")]
    Rejected(String),
}

impl From<RemoteError> for AuthFailure {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::InvalidCredentials => AuthFailure::InvalidCredentials,
            RemoteError::EmailNotConfirmed => AuthFailure::EmailNotConfirmed,
            e if e.is_network() => AuthFailure::Network(e.to_string()),
            RemoteError::Api { message, .. } => AuthFailure::Rejected(message),
            e => AuthFailure::Rejected(e.to_string()),
        }
    }
}

// ---- private helpers ----

fn validation_summary(errors: &validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => msg.to_string(),
                None => format!("{field} is invalid"),
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_are_classified() {
        assert_eq!(
            AuthFailure::from(RemoteError::InvalidCredentials),
            AuthFailure::InvalidCredentials
        );
        assert_eq!(
            AuthFailure::from(RemoteError::Unavailable("down".into())),
            AuthFailure::Network("Remote service unavailable: down".into())
        );
        assert_eq!(
            AuthFailure::from(RemoteError::Api {
                status: 422,
                code: Some("user_already_exists".into()),
                message: "User already registered".into(),
            }),
            AuthFailure::Rejected("User already registered".into())
        );
    }

    #[test]
    fn user_messages_hide_internals() {
        let err = AppError::Remote(RemoteError::Api {
            status: 409,
            code: None,
            message: "duplicate key value".into(),
        });
        assert_eq!(err.user_message(), "duplicate key value");
        assert_eq!(
            AppError::Internal("type mismatch".into()).user_message(),
            "Something went wrong."
        );
        assert_eq!(
            AppError::Core(CoreError::Validation("Total students is required".into())).user_message(),
            "Total students is required"
        );
    }
}
