use chrono::{Duration, Local, NaiveDateTime};
use reqwest::RequestBuilder;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use tracing::{debug, info};
use url::Url;

use crate::core::auth::{CredentialStore, RawCredentials};
use crate::core::bootstrap::{BootstrapState, Bootstrapper};
use crate::core::feeds::{
    DispatchMessage, DispatcherStatus, IncidentInfo, ReminderEvent, RosterEntry, ScheduleEntry,
};
use crate::core::normalize;
use crate::core::variant::PortalVariant;
use crate::error::{PortalError, Result};

pub const PORTAL_BASE: &str = "https://iamresponding.com";
pub const AUTH_BASE: &str = "https://auth.iamresponding.com";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Without an explicit Accept header the ASP.NET services answer with an
/// error page instead of data.
const ACCEPT_HEADER: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8";

const ROSTER_PATH: &str = "/v3/AgencyServices.asmx/GetNowRespondingWithSort";
const SCHEDULE_PATH: &str = "/v3/AgencyServices.asmx/GetOnScheduleWithSort";
const MESSAGES_PATH: &str = "/v3/DispatchMessages.asmx/ListWithParser";
const INCIDENT_PATH: &str = "/v3/IncidentsDashboard.asmx/GetIncidentInfo";
const LATEST_INCIDENTS_PATH: &str = "/v3/IncidentsDashboard.asmx/GetLatestIncidents";
const REMINDERS_PATH: &str = "/v3/Calendar.asmx/GetReminders";
const DISPATCHER_PATH: &str = "/v3/DispatcherServices.asmx/GetDispatcherAgencyInformation";

/// How far back [`Session::reminders`] looks
const REMINDER_LOOKBACK_DAYS: i64 = 7;

const REMINDER_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Where and how a [`Session`] talks to the portal
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub variant: PortalVariant,
    pub portal_url: Url,
    pub auth_url: Url,
    pub user_agent: String,
}

impl SessionConfig {
    pub fn new(variant: PortalVariant) -> Self {
        Self {
            variant,
            ..Self::default()
        }
    }

    /// Point the session at other hosts, e.g. a staging portal.
    pub fn with_base_urls(mut self, portal_url: &str, auth_url: &str) -> Result<Self> {
        self.portal_url = parse_base(portal_url)?;
        self.auth_url = parse_base(auth_url)?;
        Ok(self)
    }

    pub(crate) fn portal_endpoint(&self, path: &str) -> Result<Url> {
        self.portal_url
            .join(path)
            .map_err(|e| PortalError::InvalidConfig(format!("{path}: {e}")))
    }

    pub(crate) fn login_endpoint(&self) -> Result<Url> {
        let base = if self.variant.login_on_auth_host() {
            &self.auth_url
        } else {
            &self.portal_url
        };
        let path = self.variant.login_path();
        base.join(path)
            .map_err(|e| PortalError::InvalidConfig(format!("{path}: {e}")))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            variant: PortalVariant::default(),
            portal_url: Url::parse(PORTAL_BASE).expect("portal base URL is valid"),
            auth_url: Url::parse(AUTH_BASE).expect("auth base URL is valid"),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

fn parse_base(value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| PortalError::InvalidConfig(format!("{value}: {e}")))
}

/// First few hundred characters of a body, for log lines
pub(crate) fn preview(text: &str) -> &str {
    match text.char_indices().nth(500) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Start and end of the reminder window ending at `now`.
pub fn reminder_window(now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
    (now - Duration::days(REMINDER_LOOKBACK_DAYS), now)
}

/// One logged-in connection to the portal.
///
/// Owns the HTTP client and its cookie jar. Every call that talks to the
/// portal takes `&mut self`, so one session can never have two exchanges in
/// flight; use one session per credential set for parallel work.
pub struct Session {
    http: reqwest::Client,
    config: SessionConfig,
    credentials: CredentialStore,
    state: BootstrapState,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HEADER));

        let http = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            config,
            credentials: CredentialStore::default(),
            state: BootstrapState::Start,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The current credential set. Not initialized until [`Session::login`]
    /// has succeeded.
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn is_logged_in(&self) -> bool {
        self.credentials.is_initialized()
    }

    /// Where the last login attempt stopped. `Start` before any attempt,
    /// `Ready` after a successful one, `Failed` with the reason otherwise.
    pub fn login_state(&self) -> &BootstrapState {
        &self.state
    }

    /// Run the login flow of the configured variant.
    ///
    /// Any previous credentials are discarded first, so a failed login leaves
    /// the session logged out.
    pub async fn login(&mut self, raw: &RawCredentials) -> Result<&CredentialStore> {
        info!(
            "Logging in to {} as {} ({:?} flow)",
            raw.agency_name, raw.username, self.config.variant
        );
        self.credentials = CredentialStore::default();
        self.state = BootstrapState::Start;

        let mut bootstrapper = Bootstrapper::new(&self.http, &self.config, raw);
        let result = bootstrapper.run().await;
        self.state = bootstrapper.into_state();
        let store = result?;
        info!(
            "Logged in, agency {} member {}",
            store.agency_id(),
            store.member_id()
        );

        self.credentials = store;
        Ok(&self.credentials)
    }

    fn require_login(&self) -> Result<&CredentialStore> {
        if !self.credentials.is_initialized() {
            return Err(PortalError::NotInitialized);
        }
        Ok(&self.credentials)
    }

    async fn fetch(&self, request: RequestBuilder, what: &str) -> Result<String> {
        let response = request.send().await?.error_for_status()?;
        let text = response.text().await?;
        debug!("{what} response: {}", preview(&text));
        Ok(text)
    }

    /// Members currently responding
    pub async fn roster(&mut self) -> Result<Vec<RosterEntry>> {
        let creds = self.require_login()?;
        let form = [
            ("org", creds.org_token().unwrap_or_default()),
            ("member", creds.member_token().unwrap_or_default()),
            ("sort", ""),
            ("flag", ""),
            ("userType", ""),
        ];
        let url = self.config.portal_endpoint(ROSTER_PATH)?;

        let body = self.fetch(self.http.post(url).form(&form), "roster").await?;
        let entries = normalize::roster(&body)?;
        info!("Fetched {} roster entries", entries.len());
        Ok(entries)
    }

    /// Members on the duty schedule
    pub async fn schedule(&mut self) -> Result<Vec<ScheduleEntry>> {
        let creds = self.require_login()?;
        let form = [
            ("org", creds.org_token().unwrap_or_default()),
            ("member", creds.member_token().unwrap_or_default()),
            ("sort", ""),
            ("flag", "0"),
            ("userType", ""),
        ];
        let url = self.config.portal_endpoint(SCHEDULE_PATH)?;

        let body = self.fetch(self.http.post(url).form(&form), "schedule").await?;
        let entries = normalize::schedule(&body)?;
        info!("Fetched {} schedule entries", entries.len());
        Ok(entries)
    }

    pub async fn dispatch_messages(&mut self) -> Result<Vec<DispatchMessage>> {
        let creds = self.require_login()?;
        let form = [
            ("subscriber", creds.org_token().unwrap_or_default()),
            ("member", creds.member_token().unwrap_or_default()),
            ("admin", creds.admin_token().unwrap_or_default()),
            ("agency", creds.agency_token().unwrap_or_default()),
        ];
        let url = self.config.portal_endpoint(MESSAGES_PATH)?;

        let body = self
            .fetch(self.http.post(url).form(&form), "dispatch messages")
            .await?;
        let messages = normalize::dispatch_messages(&body)?;
        info!("Fetched {} dispatch messages", messages.len());
        Ok(messages)
    }

    /// Look up one incident. `token` is normally the session's API token.
    pub async fn incident(&mut self, incident_id: i64, token: &str) -> Result<IncidentInfo> {
        self.require_login()?;
        let params = serde_json::json!({
            "messageId": incident_id,
            "token": token,
        });
        let url = self.config.portal_endpoint(INCIDENT_PATH)?;

        let body = self
            .fetch(self.http.post(url).json(&params), "incident")
            .await?;
        normalize::incident(&body, incident_id)
    }

    /// Most recent incidents for the logged-in member
    pub async fn latest_incidents(&mut self) -> Result<Vec<IncidentInfo>> {
        let creds = self.require_login()?;
        let params = serde_json::json!({
            "memberId": creds.member_id(),
            "agencyId": creds.agency_id(),
            "token": creds.api_token(),
        });
        let url = self.config.portal_endpoint(LATEST_INCIDENTS_PATH)?;

        let body = self
            .fetch(self.http.post(url).json(&params), "latest incidents")
            .await?;
        let incidents = normalize::incidents(&body)?;
        info!("Fetched {} incidents", incidents.len());
        Ok(incidents)
    }

    /// Calendar reminders for the agency over the last seven days
    pub async fn reminders(&mut self) -> Result<Vec<ReminderEvent>> {
        let creds = self.require_login()?;
        let (from, to) = reminder_window(Local::now().naive_local());
        let form = [
            ("agency", creds.agency_id().to_string()),
            ("member", creds.member_id().to_string()),
            ("from", from.format(REMINDER_TIME_FORMAT).to_string()),
            ("to", to.format(REMINDER_TIME_FORMAT).to_string()),
        ];
        let url = self.config.portal_endpoint(REMINDERS_PATH)?;

        let body = self
            .fetch(self.http.post(url).form(&form), "reminders")
            .await?;
        let events = normalize::reminders(&body)?;
        info!("Fetched {} reminders", events.len());
        Ok(events)
    }

    /// On-duty personnel, responders and apparatus for the agency
    pub async fn dispatcher_status(&mut self) -> Result<DispatcherStatus> {
        let creds = self.require_login()?;
        let params = serde_json::json!({
            "agencyId": creds.agency_id(),
            "token": creds.api_token(),
        });
        let url = self.config.portal_endpoint(DISPATCHER_PATH)?;

        let body = self
            .fetch(self.http.post(url).json(&params), "dispatcher status")
            .await?;
        normalize::dispatcher_status(&body)
    }
}
