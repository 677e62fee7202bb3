//! Sign-in and registration forms.
//!
//! Failures are kept on the view as inline text; the matching toast comes
//! from the event bus.

use std::sync::Arc;

use fms_core::roles::Role;
use fms_remote::{AuthUser, SignUpOutcome};
use validator::Validate;

use super::required;
use crate::error::AppError;
use crate::session::SessionContext;

#[derive(Debug, Clone, Default, Validate)]
pub struct SignInForm {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Default, Validate)]
pub struct SignUpForm {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(custom(function = "required", message = "Full name is required"))]
    pub full_name: String,
    /// Faculty when not chosen.
    pub role: Option<Role>,
}

pub struct AuthView {
    session: Arc<SessionContext>,
    /// Inline error of the last submission.
    pub error: Option<String>,
    /// Inline notice of the last successful registration.
    pub notice: Option<String>,
}

impl AuthView {
    pub fn new(session: Arc<SessionContext>) -> Self {
        Self {
            session,
            error: None,
            notice: None,
        }
    }

    pub async fn sign_in(&mut self, form: &SignInForm) -> Option<AuthUser> {
        self.clear();
        let form = SignInForm {
            email: form.email.trim().to_string(),
            ..form.clone()
        };
        if let Err(errors) = form.validate() {
            self.error = Some(AppError::from(errors).user_message());
            return None;
        }

        match self.session.sign_in(&form.email, &form.password).await {
            Ok(user) => Some(user),
            Err(failure) => {
                self.error = Some(failure.to_string());
                None
            }
        }
    }

    pub async fn sign_up(&mut self, form: &SignUpForm) -> Option<SignUpOutcome> {
        self.clear();
        let form = SignUpForm {
            email: form.email.trim().to_string(),
            full_name: form.full_name.trim().to_string(),
            ..form.clone()
        };
        if let Err(errors) = form.validate() {
            self.error = Some(AppError::from(errors).user_message());
            return None;
        }

        match self
            .session
            .sign_up(&form.email, &form.password, &form.full_name, form.role)
            .await
        {
            Ok(outcome) => {
                self.notice = Some(match &outcome {
                    SignUpOutcome::PendingConfirmation(_) => {
                        "Please check your email to confirm your account.".to_string()
                    }
                    SignUpOutcome::Active(_) => "Account created successfully.".to_string(),
                });
                Some(outcome)
            }
            Err(failure) => {
                self.error = Some(failure.to_string());
                None
            }
        }
    }

    fn clear(&mut self) {
        self.error = None;
        self.notice = None;
    }
}
