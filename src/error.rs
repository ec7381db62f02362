//! Error taxonomy for login attempts.
//!
//! Every terminal variant carries a message suitable for direct display to a
//! non-technical end user. [`Challenge`] variants are not failures: they are
//! the expected control-flow signal for interactive logins, telling the
//! caller which value to collect before re-invoking the login entry point.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for login operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which credential field the site rejected, when its error message says so.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialField {
    /// The username/login identifier was rejected.
    Username,
    /// The password was rejected.
    Password,
}

impl std::fmt::Display for CredentialField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialField::Username => write!(f, "username"),
            CredentialField::Password => write!(f, "password"),
        }
    }
}

/// Delivery medium for an out-of-band one-time password.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpMedium {
    /// Code sent by SMS.
    Sms,
    /// Code sent by email.
    Email,
    /// Code displayed in the site's mobile application.
    MobileApp,
    /// Code generated by a physical device.
    Device,
    /// The site did not say how the code was delivered.
    Unknown,
}

impl std::fmt::Display for OtpMedium {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OtpMedium::Sms => write!(f, "SMS"),
            OtpMedium::Email => write!(f, "email"),
            OtpMedium::MobileApp => write!(f, "mobile app"),
            OtpMedium::Device => write!(f, "device"),
            OtpMedium::Unknown => write!(f, "unknown medium"),
        }
    }
}

/// A second-factor challenge raised during login.
///
/// Each variant carries enough metadata for the caller to service the
/// request: the human prompt to show, and the factor key (`field`) to fill
/// before calling login again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    /// An OTP was sent out of band; the caller must collect it.
    #[error("{message}")]
    SentOtp {
        /// How the code was delivered.
        medium: OtpMedium,
        /// Human-readable prompt from the site.
        message: String,
        /// Factor key the caller must fill with the code.
        field: String,
    },

    /// The user must approve the login inside the site's mobile app.
    #[error("{message}")]
    AppValidation {
        /// Human-readable instruction from the site.
        message: String,
        /// How long the site keeps the validation open, when known.
        expires_in: Option<Duration>,
    },

    /// A reCAPTCHA v2 must be solved.
    #[error("please solve the CAPTCHA displayed on {website_url}")]
    RecaptchaV2 {
        /// Site key to pass to the solver.
        website_key: String,
        /// Page hosting the CAPTCHA.
        website_url: String,
        /// Factor key the caller must fill with the response token.
        field: String,
    },

    /// An image CAPTCHA must be solved.
    #[error("please solve the image CAPTCHA at {image_url}")]
    ImageCaptcha {
        /// Where to fetch the challenge image.
        image_url: String,
        /// Factor key the caller must fill with the answer.
        field: String,
    },
}

impl Challenge {
    /// Factor key the caller is expected to fill, when the challenge has one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Challenge::SentOtp { field, .. }
            | Challenge::RecaptchaV2 { field, .. }
            | Challenge::ImageCaptcha { field, .. } => Some(field),
            Challenge::AppValidation { .. } => None,
        }
    }
}

/// Errors (and challenge signals) produced by a login attempt.
#[derive(Error, Debug)]
pub enum Error {
    /// The site rejected the username and/or password.
    #[error("incorrect credentials{}: {message}", .field.as_ref().map(|f| format!(" ({f})")).unwrap_or_default())]
    IncorrectCredentials {
        /// Which field was wrong, when the site disambiguates it.
        field: Option<CredentialField>,
        /// Human-readable message from the site.
        message: String,
    },

    /// Too many failed attempts; the account is temporarily locked.
    #[error("account locked: {message}")]
    AccountLocked {
        /// Cooldown message from the site, when available.
        message: String,
    },

    /// The site demands a password change before login can proceed.
    #[error("password expired: {message}")]
    PasswordExpired {
        /// Human-readable message from the site.
        message: String,
    },

    /// The user must perform an action on the website before retrying.
    #[error("action needed on the website: {message}")]
    ActionNeeded {
        /// What the user has to do.
        message: String,
    },

    /// A second factor is required; see [`Challenge`] for what to supply.
    #[error("second factor required: {0}")]
    Challenge(#[from] Challenge),

    /// The user refused the app validation.
    #[error("the validation was cancelled on the mobile application")]
    ValidationCancelled,

    /// The app validation window elapsed without an answer.
    #[error("the validation request expired before being confirmed")]
    ValidationExpired,

    /// Login needs a human but none is available (batch/headless context).
    #[error("this login requires user interaction, please run it interactively")]
    NeedsInteractive,

    /// Transient site-side failure; the caller may retry the whole attempt.
    #[error("website unavailable: {message}")]
    SiteUnavailable {
        /// What the site said, when anything.
        message: String,
    },

    /// A resumed session is no longer accepted by the site.
    #[error("stored session is no longer valid, a full login is required")]
    SessionExpired,

    /// The site answered with something the flow does not recognize.
    #[error("unhandled website behavior: {context}")]
    Unhandled {
        /// Full context for maintainers.
        context: String,
    },

    /// Underlying HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns true if the whole login attempt may be retried later as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::SiteUnavailable { .. } | Error::Http(_))
    }

    /// Returns true if this is a challenge signal rather than a failure.
    pub fn is_challenge(&self) -> bool {
        matches!(self, Error::Challenge(_))
    }

    /// Suggested delay before retrying, if applicable.
    pub fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Error::SiteUnavailable { .. } => Some(60),
            Error::Http(_) => Some(10),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_messages() {
        let err = Error::IncorrectCredentials {
            field: Some(CredentialField::Password),
            message: "wrong password".into(),
        };
        assert_eq!(
            err.to_string(),
            "incorrect credentials (password): wrong password"
        );

        let err = Error::IncorrectCredentials {
            field: None,
            message: "bad login".into(),
        };
        assert_eq!(err.to_string(), "incorrect credentials: bad login");
    }

    #[test]
    fn test_challenge_field() {
        let challenge = Challenge::SentOtp {
            medium: OtpMedium::Sms,
            message: "enter the code".into(),
            field: "otp_sms".into(),
        };
        assert_eq!(challenge.field(), Some("otp_sms"));

        let challenge = Challenge::AppValidation {
            message: "confirm in your app".into(),
            expires_in: None,
        };
        assert_eq!(challenge.field(), None);
    }

    #[test]
    fn test_retryable() {
        assert!(Error::SiteUnavailable {
            message: "maintenance".into()
        }
        .is_retryable());
        assert!(!Error::ValidationCancelled.is_retryable());
        assert!(!Error::NeedsInteractive.is_retryable());
    }

    #[test]
    fn test_challenge_is_not_failure() {
        let err = Error::from(Challenge::AppValidation {
            message: "confirm".into(),
            expires_in: None,
        });
        assert!(err.is_challenge());
        assert!(!err.is_retryable());
    }
}
