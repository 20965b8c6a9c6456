//! Login state machine.
//!
//! Drives the ordered requests that turn an agency, user name and password
//! into a sealed [`CredentialStore`]. The [`PortalVariant`] decides which
//! states are visited and where the tokens live; this module performs the
//! exchanges and classifies failures.

use std::collections::BTreeMap;

use reqwest::RequestBuilder;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::auth::{AgencyInfo, CredentialStore, RawCredentials};
use crate::core::client::{SessionConfig, preview};
use crate::core::extract::{contains_phrase, form_value, normalize_quotes};
use crate::core::variant::PortalVariant;
use crate::error::{PortalError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    AuthenticationRejected,
    MissingVerificationToken,
    MissingCredentialFragment,
    Decode,
    Transport,
    InvalidConfig,
}

impl FailureReason {
    fn classify(err: &PortalError) -> Self {
        match err {
            PortalError::AuthenticationRejected(_) => FailureReason::AuthenticationRejected,
            PortalError::MissingVerificationToken => FailureReason::MissingVerificationToken,
            PortalError::MissingCredentialFragment(_) => FailureReason::MissingCredentialFragment,
            PortalError::Decode { .. } | PortalError::EmptyResult(_) => FailureReason::Decode,
            PortalError::Transport(_) => FailureReason::Transport,
            PortalError::InvalidConfig(_) | PortalError::NotInitialized => {
                FailureReason::InvalidConfig
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapState {
    Start,
    VerificationTokenFetched,
    CredentialsSubmitted,
    FormTokensParsed,
    DashboardOpened,
    CredentialsParsed,
    Ready,
    Failed(FailureReason),
}

/// `Credentials` object assigned in the dashboard script
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct ScriptCredentials {
    agency: i64,
    member: i64,
    #[serde(rename = "Type")]
    member_type: i64,
    token: String,
    agency_type: String,
    session_token: String,
}

pub(crate) struct Bootstrapper<'a> {
    http: &'a reqwest::Client,
    config: &'a SessionConfig,
    raw: &'a RawCredentials,
    state: BootstrapState,
    verification_token: Option<String>,
    /// Body of the most recent response
    page: String,
    store: CredentialStore,
}

impl<'a> Bootstrapper<'a> {
    pub(crate) fn new(
        http: &'a reqwest::Client,
        config: &'a SessionConfig,
        raw: &'a RawCredentials,
    ) -> Self {
        Self {
            http,
            config,
            raw,
            state: BootstrapState::Start,
            verification_token: None,
            page: String::new(),
            store: CredentialStore::default(),
        }
    }

    fn variant(&self) -> PortalVariant {
        self.config.variant
    }

    /// Step through the variant's states until `Ready` or the first failure.
    pub(crate) async fn run(&mut self) -> Result<CredentialStore> {
        loop {
            if self.state == BootstrapState::Ready {
                return Ok(std::mem::take(&mut self.store));
            }

            let next = self.variant().next_state(&self.state);
            match self.enter(&next).await {
                Ok(()) => {
                    debug!("Login state {:?} -> {:?}", self.state, next);
                    self.state = next;
                }
                Err(err) => {
                    let failed = BootstrapState::Failed(FailureReason::classify(&err));
                    debug!("Login state {:?} -> {:?}: {err}", self.state, failed);
                    self.state = failed;
                    return Err(err);
                }
            }
        }
    }

    /// State the machine stopped in: `Ready`, or `Failed` with the reason.
    pub(crate) fn into_state(self) -> BootstrapState {
        self.state
    }

    /// Perform the work that moves the machine into `state`.
    async fn enter(&mut self, state: &BootstrapState) -> Result<()> {
        let variant = self.config.variant;
        match state {
            BootstrapState::VerificationTokenFetched => self.fetch_verification_token().await,
            BootstrapState::CredentialsSubmitted => self.submit_credentials().await,
            BootstrapState::FormTokensParsed => {
                apply_form_tokens(&mut self.store, &self.page, variant);
                Ok(())
            }
            BootstrapState::DashboardOpened => self.open_dashboard().await,
            BootstrapState::CredentialsParsed => {
                apply_script_credentials(&mut self.store, &self.page, variant)
            }
            BootstrapState::Ready => seal(&mut self.store),
            BootstrapState::Start | BootstrapState::Failed(_) => Ok(()),
        }
    }

    async fn fetch_verification_token(&mut self) -> Result<()> {
        let url = self.config.login_endpoint()?;
        debug!("Fetching login page {url}");

        let body = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let token = form_value(&body, self.variant().verification_field())
            .filter(|token| !token.is_empty())
            .ok_or(PortalError::MissingVerificationToken)?;

        self.verification_token = Some(token);
        self.page = body;
        Ok(())
    }

    async fn submit_credentials(&mut self) -> Result<()> {
        let raw = self.raw;

        if let Some(path) = self.variant().prevalidate_path() {
            let params = serde_json::json!({
                "memberLogin": "true",
                "agencyName": raw.agency_name,
                "memberfname": raw.username,
                "memberpwd": raw.password,
                "rememberPwd": false,
                "urlTo": "",
                "overrideSession": true,
            });
            let url = self.config.portal_endpoint(path)?;
            debug!("Pre-validating login at {url}");
            self.post_login(self.http.post(url).json(&params)).await?;
        }

        let url = self.config.login_endpoint()?;
        let request = match self.variant() {
            PortalVariant::AuthSubdomain => {
                let token = self
                    .verification_token
                    .as_deref()
                    .ok_or(PortalError::MissingVerificationToken)?;
                let form = [
                    ("Input.Agency", raw.agency_name.as_str()),
                    ("Input.Username", raw.username.as_str()),
                    ("Input.Password", raw.password.as_str()),
                    ("Input.RememberLogin", "false"),
                    ("Input.ReturnUrl", ""),
                    (self.variant().verification_field(), token),
                ];
                self.http.post(url).form(&form)
            }
            PortalVariant::LegacyInlineToken => {
                let form = [
                    ("username", raw.username.as_str()),
                    ("password", raw.password.as_str()),
                    ("email", ""),
                ];
                self.http.post(url).form(&form)
            }
        };

        debug!("Submitting credentials for {}", raw.username);
        self.page = self.post_login(request).await?;
        Ok(())
    }

    /// Send a login submission. The rejection phrase is checked before the
    /// status code because the portal reports bad credentials with either.
    async fn post_login(&self, request: RequestBuilder) -> Result<String> {
        let response = request.send().await?;
        let status_error = response.error_for_status_ref().err();
        let body = response.text().await?;
        debug!("Login response: {}", preview(&body));

        if contains_phrase(&body, self.variant().rejection_phrase()) {
            info!("Portal rejected the log-in information");
            return Err(PortalError::AuthenticationRejected(
                "the portal refused the agency, user name or password".into(),
            ));
        }
        if let Some(err) = status_error {
            return Err(err.into());
        }
        Ok(body)
    }

    async fn open_dashboard(&mut self) -> Result<()> {
        let variant = self.config.variant;
        let url = self.config.portal_endpoint(variant.dashboard_path())?;
        debug!("Opening dashboard {url}");

        let body = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        apply_dashboard_fields(&mut self.store, &body, variant);
        apply_form_tokens(&mut self.store, &body, variant);
        self.page = body;
        Ok(())
    }
}

/// Copy crypted request tokens and the API token out of hidden inputs.
/// Missing fields are left alone; [`seal`] decides whether that matters.
fn apply_form_tokens(store: &mut CredentialStore, html: &str, variant: PortalVariant) {
    let fields = variant.form_token_fields();

    CredentialStore::absorb(&mut store.org_token, form_value(html, fields.org));
    CredentialStore::absorb(&mut store.member_token, form_value(html, fields.member));
    CredentialStore::absorb(&mut store.admin_token, form_value(html, fields.admin));
    CredentialStore::absorb(&mut store.agency_token, form_value(html, fields.agency));
    if let Some(token) = form_value(html, fields.api_token).filter(|t| !t.trim().is_empty()) {
        store.api_token = token;
    }

    debug!(
        "Form tokens: org={} member={} admin={} agency={}",
        store.org_token.is_some(),
        store.member_token.is_some(),
        store.admin_token.is_some(),
        store.agency_token.is_some()
    );
}

/// Member id, subscriber id and API token only appear once the dashboard
/// has been opened.
fn apply_dashboard_fields(store: &mut CredentialStore, html: &str, variant: PortalVariant) {
    let fields = variant.dashboard_fields();
    let parse_id = |field: &str| {
        form_value(html, field)
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
    };

    if let Some(member_id) = parse_id(fields.member_id) {
        store.member_id = member_id;
    }
    if let Some(agency_id) = parse_id(fields.subscriber_id) {
        store.agency_id = agency_id;
    }
    if let Some(token) = form_value(html, fields.api_token).filter(|t| !t.trim().is_empty()) {
        store.api_token = token;
    }
}

/// Decode the `Credentials`, `ValidAgencies` and `AgencyNames` script
/// assignments. Only `Credentials` is mandatory.
fn apply_script_credentials(
    store: &mut CredentialStore,
    body: &str,
    variant: PortalVariant,
) -> Result<()> {
    let pattern = variant.credentials_pattern();
    let fragment = pattern
        .extract(body)
        .map_err(|e| PortalError::MissingCredentialFragment(e.0))?;

    let credentials: ScriptCredentials = serde_json::from_str(&fragment)
        .or_else(|_| serde_json::from_str(&normalize_quotes(&fragment)))
        .map_err(|e| PortalError::decode("dashboard credentials", e, &fragment))?;

    debug!(
        "Script credentials: agency={} member={} type={}",
        credentials.agency, credentials.member, credentials.member_type
    );

    if credentials.agency > 0 {
        store.agency_id = credentials.agency;
    }
    if credentials.member > 0 {
        store.member_id = credentials.member;
    }
    if !credentials.token.is_empty() {
        store.api_token = credentials.token;
    }
    CredentialStore::absorb(&mut store.session_token, Some(credentials.session_token));
    CredentialStore::absorb(&mut store.agency_type, Some(credentials.agency_type));

    if let Some(pattern) = variant.valid_agencies_pattern() {
        match pattern.extract(body) {
            Ok(fragment) => match parse_agency_ids(&fragment) {
                Some(ids) => store.valid_agency_ids.extend(ids),
                None => warn!("Could not decode valid agency list: {fragment}"),
            },
            Err(e) => debug!("{e}"),
        }
    }

    if let Some(pattern) = variant.agency_names_pattern() {
        match pattern.extract(body) {
            Ok(fragment) => match parse_agency_names(&fragment) {
                Some(names) => store.agency_names.extend(names),
                None => warn!("Could not decode agency names"),
            },
            Err(e) => debug!("{e}"),
        }
    }

    Ok(())
}

/// `['12','34']`, `["12"]` and `[12, 34]` all decode to ids.
fn parse_agency_ids(fragment: &str) -> Option<Vec<i64>> {
    let values: Vec<Value> = serde_json::from_str(&normalize_quotes(fragment)).ok()?;
    Some(
        values
            .iter()
            .filter_map(|value| match value {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .collect(),
    )
}

/// The names map is emitted with inconsistent quoting, so fall back to a
/// YAML decode when it is not valid JSON.
fn parse_agency_names(fragment: &str) -> Option<BTreeMap<i64, AgencyInfo>> {
    let normalized = normalize_quotes(fragment);
    let raw: BTreeMap<String, AgencyInfo> = serde_json::from_str(&normalized)
        .ok()
        .or_else(|| serde_yaml::from_str(fragment).ok())
        .or_else(|| serde_yaml::from_str(&normalized).ok())?;

    Some(
        raw.into_iter()
            .filter_map(|(key, info)| {
                let id = key.trim().parse().ok().or((info.id > 0).then_some(info.id))?;
                Some((id, info))
            })
            .collect(),
    )
}

fn seal(store: &mut CredentialStore) -> Result<()> {
    store.seal().map_err(|missing| {
        PortalError::AuthenticationRejected(format!(
            "portal did not issue {}",
            missing.join(", ")
        ))
    })
}
