use std::fmt;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Transport(String),
    Http { status: u16, body: String },
    Unauthorized,
    Decode(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(err) => write!(f, "io error: {err}"),
            StoreError::Json(err) => write!(f, "json error: {err}"),
            StoreError::Transport(message) => write!(f, "transport error: {message}"),
            StoreError::Http { status, body } => write!(f, "http {status}: {body}"),
            StoreError::Unauthorized => write!(f, "document store rejected credentials"),
            StoreError::Decode(message) => write!(f, "malformed document: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        StoreError::Io(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        StoreError::Json(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    MissingCredentials,
    InvalidEmail,
    InvalidCredentials,
    EmailInUse,
    WeakPassword(String),
    UserDisabled,
    TooManyAttempts,
    SessionExpired,
    Transport(String),
    Provider(String),
}

impl AuthError {
    /// Maps an identity-provider error code (e.g. `EMAIL_EXISTS`,
    /// `WEAK_PASSWORD : Password should be at least 6 characters`).
    pub fn from_code(message: &str) -> Self {
        let (code, detail) = match message.split_once(':') {
            Some((code, detail)) => (code.trim(), detail.trim()),
            None => (message.trim(), ""),
        };
        match code {
            "EMAIL_EXISTS" => AuthError::EmailInUse,
            "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
                AuthError::InvalidCredentials
            }
            "INVALID_EMAIL" => AuthError::InvalidEmail,
            "MISSING_EMAIL" | "MISSING_PASSWORD" => AuthError::MissingCredentials,
            "WEAK_PASSWORD" => AuthError::WeakPassword(detail.to_string()),
            "USER_DISABLED" => AuthError::UserDisabled,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => AuthError::TooManyAttempts,
            "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "USER_NOT_FOUND" => {
                AuthError::SessionExpired
            }
            _ => AuthError::Provider(message.trim().to_string()),
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingCredentials => write!(f, "email and password are required"),
            AuthError::InvalidEmail => write!(f, "the email address is badly formatted"),
            AuthError::InvalidCredentials => write!(f, "invalid email or password"),
            AuthError::EmailInUse => write!(f, "an account already exists for this email"),
            AuthError::WeakPassword(detail) if detail.is_empty() => {
                write!(f, "password is too weak")
            }
            AuthError::WeakPassword(detail) => write!(f, "password is too weak: {detail}"),
            AuthError::UserDisabled => write!(f, "this account has been disabled"),
            AuthError::TooManyAttempts => write!(f, "too many attempts, try again later"),
            AuthError::SessionExpired => write!(f, "session expired, sign in again"),
            AuthError::Transport(message) => write!(f, "auth request failed: {message}"),
            AuthError::Provider(message) => write!(f, "auth error: {message}"),
        }
    }
}

impl std::error::Error for AuthError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    EmptyText,
    ZeroMinutes,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyText => write!(f, "please enter a task"),
            ValidationError::ZeroMinutes => write!(f, "reminder offset must be at least one minute"),
        }
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug)]
pub enum TodoError {
    Validation(ValidationError),
    NotAuthenticated,
    TaskNotFound(String),
    DuplicateId(String),
    IndexOutOfRange { index: usize, len: usize },
    Auth(AuthError),
    RemoteUnavailable(StoreError),
}

impl fmt::Display for TodoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TodoError::Validation(err) => write!(f, "{err}"),
            TodoError::NotAuthenticated => write!(f, "not signed in"),
            TodoError::TaskNotFound(id) => write!(f, "task not found: {id}"),
            TodoError::DuplicateId(id) => write!(f, "duplicate task id: {id}"),
            TodoError::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for {len} tasks")
            }
            TodoError::Auth(err) => write!(f, "{err}"),
            TodoError::RemoteUnavailable(err) => write!(f, "remote storage unavailable: {err}"),
        }
    }
}

impl std::error::Error for TodoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TodoError::Validation(err) => Some(err),
            TodoError::Auth(err) => Some(err),
            TodoError::RemoteUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for TodoError {
    fn from(value: ValidationError) -> Self {
        TodoError::Validation(value)
    }
}

impl From<AuthError> for TodoError {
    fn from(value: AuthError) -> Self {
        TodoError::Auth(value)
    }
}

impl From<StoreError> for TodoError {
    fn from(value: StoreError) -> Self {
        TodoError::RemoteUnavailable(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotifyError {
    PermissionDenied,
    Unavailable(String),
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyError::PermissionDenied => write!(f, "notification permission denied"),
            NotifyError::Unavailable(message) => write!(f, "notifications unavailable: {message}"),
        }
    }
}

impl std::error::Error for NotifyError {}
