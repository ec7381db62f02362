//! The two-factor login state machine.
//!
//! One [`TwoFactorBrowser`] drives one [`LoginFlow`] through a login
//! attempt. On each attempt it decides whether a second-factor answer is
//! already waiting to be redeemed, whether the attempt may run
//! non-interactively, and how to stamp and persist a successful login so the
//! next process start can skip the whole dance.
//!
//! A login attempt has exactly two outcomes: `Ok(())`, or one of the
//! [`Error`] kinds — a [`Challenge`](crate::Challenge) being the expected
//! signal for "come back with the user's answer".

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::factors::{FactorKind, FactorValues};
use crate::flow::LoginFlow;
use crate::session::Session;
use crate::state::{format_state_timestamp, SessionState, StatePolicy};

/// Generic login engine: dispatches second-factor answers to their handler,
/// enforces interactive gating, and owns the session snapshot lifecycle.
pub struct TwoFactorBrowser<F: LoginFlow> {
    flow: F,
    session: Session,
    policy: StatePolicy,
    factors: FactorValues,
    interactive: bool,
    twofa_logged_date: Option<DateTime<Utc>>,
}

impl<F: LoginFlow> TwoFactorBrowser<F> {
    /// Create an engine around a flow, a session and a persistence policy.
    /// The engine starts non-interactive; see [`set_interactive`].
    ///
    /// [`set_interactive`]: TwoFactorBrowser::set_interactive
    pub fn new(flow: F, session: Session, policy: StatePolicy) -> Self {
        Self {
            flow,
            session,
            policy,
            factors: FactorValues::new(),
            interactive: false,
            twofa_logged_date: None,
        }
    }

    /// Declare whether a human can answer challenges during this run.
    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    /// Builder-style variant of [`set_interactive`](Self::set_interactive).
    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Supply a second-factor answer before re-invoking [`login`](Self::login).
    pub fn supply_factor(&mut self, kind: impl Into<String>, value: impl Into<String>) {
        self.factors.set(kind, value);
    }

    /// The second-factor value store.
    pub fn factors(&self) -> &FactorValues {
        &self.factors
    }

    /// Mutable access to the second-factor value store.
    pub fn factors_mut(&mut self) -> &mut FactorValues {
        &mut self.factors
    }

    /// When the last second factor completed, if ever.
    pub fn twofa_logged_date(&self) -> Option<DateTime<Utc>> {
        self.twofa_logged_date
    }

    /// The underlying flow.
    pub fn flow(&self) -> &F {
        &self.flow
    }

    /// Mutable access to the underlying flow.
    pub fn flow_mut(&mut self) -> &mut F {
        &mut self.flow
    }

    /// The HTTP session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Mutable access to the HTTP session.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Run one login attempt.
    ///
    /// Dispatch order: the flow's declared factor keys, first non-empty
    /// caller-supplied value wins. When a handler runs:
    ///
    /// - success stamps the completion date and clears **every** declared
    ///   factor value, so a stale leftover answer can never re-trigger a
    ///   handler on a later unrelated attempt;
    /// - a fresh [`Challenge`](crate::Challenge) (wrong OTP, retry) clears
    ///   only the consumed key and propagates, leaving other answers intact;
    /// - any other error clears only the consumed key and propagates
    ///   unchanged, with no stamping.
    ///
    /// With no answer pending, a flow that is not credentials-only refuses
    /// to start without an interactive session — before any network call —
    /// then `init_login` runs from a clean cookie jar and may itself raise a
    /// `Challenge` for the caller to service.
    pub async fn login(&mut self) -> Result<()> {
        let methods: Vec<FactorKind> = self.flow.authentication_methods().to_vec();

        for &kind in &methods {
            let Some(value) = self.factors.get(kind).map(str::to_owned) else {
                continue;
            };

            tracing::info!(factor = kind, "redeeming second-factor answer");
            let outcome = match self.flow.handle_factor(&mut self.session, kind, &value).await {
                Ok(()) => self.flow.finalize_login(&mut self.session).await,
                Err(err) => Err(err),
            };

            return match outcome {
                Ok(()) => {
                    // Stamp strictly after the network calls succeeded.
                    self.twofa_logged_date = Some(Utc::now());
                    self.factors.clear_all(&methods);
                    tracing::info!(factor = kind, "second factor completed");
                    Ok(())
                }
                Err(err) => {
                    // The answer is consumed either way; a retry must not
                    // re-fire this handler with the stale value.
                    self.factors.clear(kind);
                    if err.is_challenge() {
                        tracing::info!(factor = kind, "handler raised a new challenge");
                    } else {
                        tracing::warn!(factor = kind, error = %err, "second factor failed");
                    }
                    Err(err)
                }
            };
        }

        if !self.flow.has_credentials_only() {
            self.check_interactive()?;
        }

        // Start from a clean jar; stale cookies from a previous attempt are
        // a recurring source of bogus login errors.
        self.session.cookies_mut().clear();

        tracing::info!("starting first-factor login");
        self.flow.init_login(&mut self.session).await?;
        self.flow.finalize_login(&mut self.session).await?;
        tracing::info!("login completed without a second factor");
        Ok(())
    }

    fn check_interactive(&self) -> Result<()> {
        if self.interactive {
            Ok(())
        } else {
            Err(Error::NeedsInteractive)
        }
    }

    /// Snapshot the session for persistence.
    ///
    /// Removes the policy's do-not-persist cookies from the jar first, then
    /// captures cookies, last URL, the flow's custom fields, the
    /// second-factor completion date, and the computed expiry. Never fails.
    pub fn dump_state(&mut self) -> SessionState {
        for name in &self.policy.cookies_to_clear {
            self.session.cookies_mut().remove(name);
        }

        let now = Utc::now();
        let expire = self.policy.expire_at(now, self.twofa_logged_date);
        let state = SessionState {
            url: self.session.last_url().map(str::to_owned),
            cookies: self.session.cookies().snapshot(),
            fields: self.flow.dump_custom_state(),
            twofa_logged_date: self.twofa_logged_date.map(format_state_timestamp),
            expire: Some(format_state_timestamp(expire)),
        };

        tracing::debug!(
            cookies = state.cookies.len(),
            fields = state.fields.len(),
            expire = %expire,
            "dumped session state"
        );
        state
    }

    /// Restore a previously dumped state.
    ///
    /// Tolerant by design: an expired blob is ignored (the next login runs in
    /// full), missing custom fields keep their initial values, and garbage
    /// timestamps are dropped. When a stored URL is present and no
    /// skip-listed factor value is pending, the flow's logged-in probe runs;
    /// a rejected probe discards the restored cookies so the next attempt
    /// starts cold. The completion date survives a rejected probe, since it
    /// still feeds the expiry window.
    pub async fn load_state(&mut self, state: &SessionState) {
        let now = Utc::now();
        if state.is_expired(now) {
            tracing::info!("stored state expired, not reloading it");
            return;
        }

        self.session.cookies_mut().restore(state.cookies.clone());
        self.session.set_last_url(state.url.clone());
        self.flow.restore_custom_state(&state.fields);
        self.twofa_logged_date = state.twofa_logged_date();
        tracing::debug!(cookies = state.cookies.len(), "reloaded session state");

        let Some(url) = state.url.clone() else {
            return;
        };
        if self.should_skip_locate() {
            tracing::debug!("skipping logged-in probe, a second-factor answer is pending");
            return;
        }

        match self.flow.locate_browser(&mut self.session, &url).await {
            Ok(()) => tracing::debug!(url, "restored session confirmed logged in"),
            Err(Error::SessionExpired) => {
                tracing::info!("restored session rejected by the site, full login required");
                self.session.reset();
            }
            // A flaky probe is not a verdict; the next privileged call will
            // route to re-login if the state is actually dead.
            Err(err) => tracing::debug!(error = %err, "logged-in probe failed, keeping state"),
        }
    }

    fn should_skip_locate(&self) -> bool {
        self.policy
            .skip_locate_on
            .iter()
            .any(|kind| self.factors.is_set(kind))
    }
}
