//! End-to-end login flow tests against a scripted bank-like flow.
//!
//! No network is involved: the flow fakes the site's answers so the engine's
//! observable behavior (challenges raised, values cleared, state persisted,
//! expiry computed) can be asserted exactly.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use relogin::{
    poll_app_validation, Challenge, Error, FactorKind, LoginFlow, OtpMedium, PollStatus,
    PollingConfig, Result, Session, SessionState, StatePolicy, TwoFactorBrowser,
};

// ============================================================================
// Scripted flow
// ============================================================================

/// A flow imitating a bank that sends an SMS OTP on first login and also
/// supports app-push validation through the `resume` key.
struct BankFlow {
    expected_otp: &'static str,
    /// Remote app-validation statuses, popped one per poll.
    validation_script: Vec<PollStatus>,
    polling: PollingConfig,
    session_id: Option<String>,
    device_token: Option<String>,
    otp_requests: Arc<AtomicU32>,
}

impl BankFlow {
    fn new() -> Self {
        Self {
            expected_otp: "123456",
            validation_script: Vec::new(),
            polling: PollingConfig {
                interval: Duration::from_millis(5),
                timeout: Duration::from_millis(200),
                max_checks: None,
            },
            session_id: None,
            device_token: None,
            otp_requests: Arc::new(AtomicU32::new(0)),
        }
    }

    fn otp_challenge() -> Challenge {
        Challenge::SentOtp {
            medium: OtpMedium::Sms,
            message: "Enter the code sent to your mobile phone".into(),
            field: "otp".into(),
        }
    }
}

#[async_trait]
impl LoginFlow for BankFlow {
    fn authentication_methods(&self) -> &[FactorKind] {
        &["resume", "otp"]
    }

    async fn init_login(&mut self, _session: &mut Session) -> Result<()> {
        // The fake site always challenges a fresh login with an SMS OTP.
        self.otp_requests.fetch_add(1, Ordering::SeqCst);
        Err(BankFlow::otp_challenge().into())
    }

    async fn handle_factor(
        &mut self,
        _session: &mut Session,
        kind: FactorKind,
        value: &str,
    ) -> Result<()> {
        match kind {
            "otp" => {
                if value == self.expected_otp {
                    self.session_id = Some("sess-42".into());
                    self.device_token = Some("trusted-device-7".into());
                    Ok(())
                } else {
                    Err(BankFlow::otp_challenge().into())
                }
            }
            "resume" => {
                let polling = self.polling.clone();
                let mut script = std::mem::take(&mut self.validation_script).into_iter();
                let result = poll_app_validation(&polling, move || {
                    let status = script.next().unwrap_or(PollStatus::Pending);
                    async move { Ok(status) }
                })
                .await;
                if result.is_ok() {
                    self.session_id = Some("sess-app".into());
                }
                result
            }
            other => Err(Error::Unhandled {
                context: format!("unknown factor key {other}"),
            }),
        }
    }

    async fn locate_browser(&mut self, _session: &mut Session, _url: &str) -> Result<()> {
        Ok(())
    }

    fn dump_custom_state(&self) -> BTreeMap<String, serde_json::Value> {
        let mut fields = BTreeMap::new();
        if let Some(ref id) = self.session_id {
            fields.insert("session_id".into(), serde_json::json!(id));
        }
        if let Some(ref token) = self.device_token {
            fields.insert("device_token".into(), serde_json::json!(token));
        }
        fields
    }

    fn restore_custom_state(&mut self, fields: &BTreeMap<String, serde_json::Value>) {
        if let Some(id) = fields.get("session_id").and_then(|v| v.as_str()) {
            self.session_id = Some(id.to_string());
        }
        if let Some(token) = fields.get("device_token").and_then(|v| v.as_str()) {
            self.device_token = Some(token.to_string());
        }
    }
}

fn bank_policy() -> StatePolicy {
    StatePolicy {
        state_duration: Duration::from_secs(10 * 60),
        twofa_duration: Some(Duration::from_secs(1440 * 60)),
        cookies_to_clear: vec!["otp_transaction".into()],
        skip_locate_on: vec!["otp"],
    }
}

fn bank_browser(flow: BankFlow) -> TwoFactorBrowser<BankFlow> {
    TwoFactorBrowser::new(flow, Session::with_defaults().unwrap(), bank_policy())
}

// ============================================================================
// The full interactive OTP scenario
// ============================================================================

#[tokio::test]
async fn test_full_otp_login_and_resume() {
    // (1) Non-interactive, no answer pending: refused before any site call.
    let mut browser = bank_browser(BankFlow::new());
    assert!(matches!(
        browser.login().await,
        Err(Error::NeedsInteractive)
    ));
    assert_eq!(browser.flow().otp_requests.load(Ordering::SeqCst), 0);

    // (2) Interactive: init_login runs and raises the OTP question.
    browser.set_interactive(true);
    match browser.login().await {
        Err(Error::Challenge(Challenge::SentOtp { field, medium, .. })) => {
            assert_eq!(field, "otp");
            assert_eq!(medium, OtpMedium::Sms);
        }
        other => panic!("expected an OTP challenge, got {other:?}"),
    }

    // (3) Supply the code: the handler runs, the login is stamped, and the
    // answer reads back as empty.
    let attempt_start = Utc::now();
    browser.supply_factor("otp", "123456");
    browser.login().await.unwrap();
    let logged = browser.twofa_logged_date().expect("completion date stamped");
    assert!(logged >= attempt_start - chrono::Duration::seconds(1));
    assert!(!browser.factors().is_set("otp"));

    // (4) Dump: the expiry is the 2FA window, which exceeds now + 10 min.
    let state = browser.dump_state();
    let expire = relogin::state::parse_state_timestamp(state.expire.as_deref().unwrap()).unwrap();
    let logged_trunc =
        relogin::state::parse_state_timestamp(state.twofa_logged_date.as_deref().unwrap()).unwrap();
    assert_eq!(expire, logged_trunc + chrono::Duration::minutes(1440));

    // (5) Reload into a fresh instance: custom fields round-trip and the
    // completion date is still within its window, so nothing asks for a
    // second factor again.
    let mut resumed = bank_browser(BankFlow::new());
    resumed.load_state(&state).await;
    assert_eq!(resumed.flow().session_id.as_deref(), Some("sess-42"));
    assert_eq!(
        resumed.flow().device_token.as_deref(),
        Some("trusted-device-7")
    );
    assert_eq!(resumed.twofa_logged_date(), Some(logged_trunc));
    assert!(!state.is_expired(Utc::now()));
}

#[tokio::test]
async fn test_wrong_otp_raises_fresh_challenge_and_clears_the_answer() {
    let mut browser = bank_browser(BankFlow::new()).with_interactive(true);
    browser.supply_factor("otp", "000000");

    let err = browser.login().await.unwrap_err();
    assert!(err.is_challenge());
    assert!(!browser.factors().is_set("otp"));
    assert!(browser.twofa_logged_date().is_none());

    // The retry with the right code goes through.
    browser.supply_factor("otp", "123456");
    browser.login().await.unwrap();
    assert!(browser.twofa_logged_date().is_some());
}

// ============================================================================
// App-push validation
// ============================================================================

#[tokio::test]
async fn test_app_validation_approved_after_polling() {
    let mut flow = BankFlow::new();
    flow.validation_script = vec![
        PollStatus::Pending,
        PollStatus::Pending,
        PollStatus::Approved,
    ];
    let mut browser = bank_browser(flow);

    browser.supply_factor("resume", "true");
    browser.login().await.unwrap();
    assert_eq!(browser.flow().session_id.as_deref(), Some("sess-app"));
    assert!(browser.twofa_logged_date().is_some());
    assert!(!browser.factors().is_set("resume"));
}

#[tokio::test]
async fn test_app_validation_cancelled_is_terminal() {
    let mut flow = BankFlow::new();
    flow.validation_script = vec![PollStatus::Pending, PollStatus::Cancelled];
    let mut browser = bank_browser(flow);

    browser.supply_factor("resume", "true");
    let err = browser.login().await.unwrap_err();
    assert!(matches!(err, Error::ValidationCancelled));
    assert!(browser.twofa_logged_date().is_none());
    // The consumed trigger cannot re-fire the handler.
    assert!(!browser.factors().is_set("resume"));
}

#[tokio::test]
async fn test_app_validation_never_answered_expires() {
    // An empty script means every poll sees Pending until the budget runs out.
    let mut browser = bank_browser(BankFlow::new());
    browser.supply_factor("resume", "true");
    let err = browser.login().await.unwrap_err();
    assert!(matches!(err, Error::ValidationExpired));
}

// ============================================================================
// Persistence details
// ============================================================================

#[tokio::test]
async fn test_one_shot_cookies_never_reach_the_blob() {
    let mut browser = bank_browser(BankFlow::new());
    browser
        .session_mut()
        .cookies_mut()
        .store(relogin::Cookie::new("auth", "keep-me"));
    browser
        .session_mut()
        .cookies_mut()
        .store(relogin::Cookie::new("otp_transaction", "single-use"));

    let state = browser.dump_state();
    let names: Vec<&str> = state.cookies.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["auth"]);
}

#[tokio::test]
async fn test_pending_otp_skips_the_probe_on_reload() {
    // The stored URL is the OTP-sending endpoint; reloading with a pending
    // `otp` answer must not re-fetch it (that would send a second SMS).
    let state = SessionState {
        url: Some("https://bank.example/send-otp".into()),
        ..SessionState::default()
    };

    struct CountingFlow(Arc<AtomicU32>);
    #[async_trait]
    impl LoginFlow for CountingFlow {
        fn authentication_methods(&self) -> &[FactorKind] {
            &["otp"]
        }
        async fn init_login(&mut self, _session: &mut Session) -> Result<()> {
            Ok(())
        }
        async fn handle_factor(
            &mut self,
            _session: &mut Session,
            _kind: FactorKind,
            _value: &str,
        ) -> Result<()> {
            Ok(())
        }
        async fn locate_browser(&mut self, _session: &mut Session, _url: &str) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let probes = Arc::new(AtomicU32::new(0));
    let mut browser = TwoFactorBrowser::new(
        CountingFlow(probes.clone()),
        Session::with_defaults().unwrap(),
        bank_policy(),
    );

    browser.supply_factor("otp", "123456");
    browser.load_state(&state).await;
    assert_eq!(probes.load(Ordering::SeqCst), 0);

    // Without the pending answer the probe runs.
    browser.factors_mut().clear("otp");
    browser.load_state(&state).await;
    assert_eq!(probes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_expired_blob_is_equivalent_to_no_blob() {
    let mut donor = bank_browser(BankFlow::new());
    donor
        .session_mut()
        .cookies_mut()
        .store(relogin::Cookie::new("auth", "stale"));
    let mut state = donor.dump_state();
    state.expire = Some("2001-01-01T00:00:00+00:00".into());
    assert!(state.is_expired(Utc::now()));

    let mut browser = bank_browser(BankFlow::new()).with_interactive(true);
    browser.load_state(&state).await;
    assert!(browser.session().cookies().is_empty());

    // The next login runs in full, exactly as with no state at all.
    let err = browser.login().await.unwrap_err();
    assert!(err.is_challenge());
}
