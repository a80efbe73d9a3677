//! Sign-in and sign-up form state.

use shelfmark_client::{AuthService, ClientError, Result};
use shelfmark_core::{LoginRequest, SignupRequest, SignupResponse, User};
use tracing::warn;

const SIGNUP_SUCCESS: &str = "Account created successfully! Please check your email for verification.";

#[derive(Debug)]
pub struct LoginController {
    auth: AuthService,
    pub form: LoginRequest,
    loading: bool,
    error: Option<String>,
}

impl LoginController {
    pub fn new(auth: AuthService) -> Self {
        Self {
            auth,
            form: LoginRequest::default(),
            loading: false,
            error: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Submit the form. The password is cleared on failure.
    pub async fn submit(&mut self) -> Result<User> {
        self.error = None;
        self.loading = true;
        let result = self.auth.login(&self.form).await;
        self.loading = false;

        result.inspect_err(|e| {
            warn!(email = %self.form.email, error = %e, "sign-in failed");
            self.error = Some(login_message(e));
            self.form.password.clear();
        })
    }
}

fn login_message(err: &ClientError) -> String {
    match err {
        ClientError::Unauthorized(_) => "Invalid email or password".to_string(),
        ClientError::Network(_) | ClientError::Server { .. } | ClientError::Core(_) => {
            err.user_message()
        }
        ClientError::Validation(m)
        | ClientError::Forbidden(m)
        | ClientError::NotFound(m)
        | ClientError::Conflict(m)
        | ClientError::Unexpected { message: m, .. }
            if !m.trim().is_empty() =>
        {
            m.clone()
        }
        _ => "An unexpected error occurred. Please try again.".to_string(),
    }
}

#[derive(Debug)]
pub struct SignupController {
    auth: AuthService,
    pub form: SignupRequest,
    loading: bool,
    error: Option<String>,
    success: Option<String>,
}

impl SignupController {
    pub fn new(auth: AuthService) -> Self {
        Self {
            auth,
            form: SignupRequest::default(),
            loading: false,
            error: None,
            success: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn success(&self) -> Option<&str> {
        self.success.as_deref()
    }

    /// Submit the form. On success the form is reset and a confirmation
    /// message is set.
    pub async fn submit(&mut self) -> Result<SignupResponse> {
        self.error = None;
        self.success = None;
        self.loading = true;
        let result = self.auth.signup(&self.form).await;
        self.loading = false;

        match result {
            Ok(resp) => {
                self.form = SignupRequest::default();
                self.success = Some(SIGNUP_SUCCESS.to_string());
                Ok(resp)
            }
            Err(e) => {
                warn!(email = %self.form.email, error = %e, "sign-up failed");
                self.error = Some(signup_message(&e));
                Err(e)
            }
        }
    }
}

fn signup_message(err: &ClientError) -> String {
    match err {
        ClientError::Conflict(_) => {
            "Email already exists. Please use a different email address.".to_string()
        }
        ClientError::Validation(_) => err.user_message(),
        ClientError::Core(e) => e.to_string(),
        ClientError::Network(_) | ClientError::Server { .. } => err.user_message(),
        ClientError::Unexpected { message, .. } if !message.trim().is_empty() => message.clone(),
        _ => "Registration failed. Please try again.".to_string(),
    }
}
