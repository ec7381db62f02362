//! # relogin
//!
//! A resumable two-factor login state machine for clients that drive
//! private/unofficial website APIs over HTTP.
//!
//! Sites protected by strong customer authentication (SCA) interrupt a
//! login with a challenge — an SMS or email OTP, an approval in a mobile
//! app, a CAPTCHA — that only a human can answer, possibly minutes or hours
//! later, possibly in another process. This crate provides the generic
//! engine those logins share:
//!
//! - **Interruptible**: a challenge propagates to the caller as a typed
//!   [`Challenge`] signal carrying everything needed to prompt the user;
//!   the caller fills the matching factor value and invokes login again.
//! - **Resumable**: a successful login is snapshotted — cookies, declared
//!   custom fields, the second-factor completion timestamp — into an opaque
//!   [`SessionState`] blob with a computed expiry, so the next process start
//!   skips re-authentication entirely while the state is still valid.
//! - **Replay-safe**: consumed challenge answers are cleared so they can
//!   never re-fire a handler, and single-use challenge cookies are stripped
//!   from every dump.
//!
//! Site-specific protocols plug in through the [`LoginFlow`] trait; the
//! engine never hardcodes any site's quirks.
//!
//! ## Example
//!
//! ```rust,ignore
//! use relogin::{Session, StatePolicy, TwoFactorBrowser, Error};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let session = Session::with_defaults()?;
//!     let mut browser = TwoFactorBrowser::new(MyBankFlow::new(username, password), session, StatePolicy::default())
//!         .with_interactive(true);
//!
//!     match browser.login().await {
//!         Ok(()) => {}
//!         Err(Error::Challenge(challenge)) => {
//!             // Show `challenge` to the user, collect the answer...
//!             browser.supply_factor("otp_sms", read_code_from_user(&challenge)?);
//!             browser.login().await?;
//!         }
//!         Err(err) => return Err(err.into()),
//!     }
//!
//!     // Persist for the next run; reusable until its expiry.
//!     let state = browser.dump_state();
//!     save_blob(&serde_json::to_vec(&state)?)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod browser;
pub mod config;
pub mod cookies;
pub mod error;
pub mod factors;
pub mod flow;
pub mod polling;
pub mod session;
pub mod state;

pub use browser::TwoFactorBrowser;
pub use config::{Config, HttpConfig, PollingConfig, RetryConfig, StateConfig};
pub use cookies::{Cookie, CookieJar};
pub use error::{Challenge, CredentialField, Error, OtpMedium, Result};
pub use factors::{FactorKind, FactorValues};
pub use flow::LoginFlow;
pub use polling::{poll_app_validation, PollStatus};
pub use session::Session;
pub use state::{SessionState, StatePolicy};
