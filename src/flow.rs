//! Per-site login flow contract.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::factors::FactorKind;
use crate::session::Session;

/// A site-specific login flow plugged into the
/// [`TwoFactorBrowser`](crate::browser::TwoFactorBrowser) engine.
///
/// The engine owns the state machine; the flow owns the site's protocol:
/// which requests establish the first factor, how each declared second
/// factor is redeemed, and what a logged-in page looks like.
#[async_trait]
pub trait LoginFlow: Send {
    /// Priority-ordered second-factor keys this flow understands.
    /// Declaration order is dispatch order: the first key with a non-empty
    /// caller-supplied value wins.
    fn authentication_methods(&self) -> &[FactorKind];

    /// True when the site can complete a login with credentials alone, so a
    /// non-interactive attempt is worth making.
    fn has_credentials_only(&self) -> bool {
        false
    }

    /// Start a login from scratch with the first factor (credentials).
    ///
    /// When the site demands a second factor, return the matching
    /// [`Challenge`](crate::error::Challenge); it propagates uncaught to the
    /// caller, who collects the answer and re-invokes login.
    async fn init_login(&mut self, session: &mut Session) -> Result<()>;

    /// Redeem a caller-supplied second-factor value.
    ///
    /// A wrong answer that the site lets the user retry should return a
    /// fresh `Challenge`; the engine clears the consumed value first so the
    /// retry cannot re-fire with the stale answer.
    async fn handle_factor(
        &mut self,
        session: &mut Session,
        kind: FactorKind,
        value: &str,
    ) -> Result<()>;

    /// Confirm the flow actually landed on a logged-in page.
    ///
    /// Called after a factor handler or `init_login` succeeds. Landing back
    /// on a login or password-expired page here must produce
    /// `IncorrectCredentials` or `PasswordExpired`, never a silent success.
    async fn finalize_login(&mut self, _session: &mut Session) -> Result<()> {
        Ok(())
    }

    /// Probe a restored session to confirm it is still logged in.
    ///
    /// The default issues a GET on the stored URL and classifies the status;
    /// flows with a cheaper dedicated endpoint override this.
    async fn locate_browser(&mut self, session: &mut Session, url: &str) -> Result<()> {
        let response = session.get(url).await?;
        Session::check_logged_in(&response)
    }

    /// Custom fields to include in the state dump, beyond cookies and the
    /// second-factor completion timestamp.
    fn dump_custom_state(&self) -> BTreeMap<String, serde_json::Value> {
        BTreeMap::new()
    }

    /// Restore custom fields from a loaded blob. Keys absent from the blob
    /// must keep their current (initial) values, never fail.
    fn restore_custom_state(&mut self, _fields: &BTreeMap<String, serde_json::Value>) {}
}
