use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Login details supplied by the caller. Never persisted or logged.
#[derive(Clone)]
pub struct RawCredentials {
    pub agency_name: String,
    pub username: String,
    pub password: String,
}

impl RawCredentials {
    pub fn new(
        agency_name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            agency_name: agency_name.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for RawCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawCredentials")
            .field("agency_name", &self.agency_name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Display metadata for one agency the member belongs to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgencyInfo {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub index: i64,
    #[serde(default, rename = "autoDisplay")]
    pub auto_display: String,
}

/// Identifiers and secrets that authorize feed requests.
///
/// The bootstrapper fills this in step by step. Once [`CredentialStore::seal`]
/// succeeds the store is read-only; callers only ever see it through getters.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    pub(crate) agency_id: i64,
    pub(crate) member_id: i64,
    pub(crate) api_token: String,
    pub(crate) session_token: Option<String>,
    pub(crate) org_token: Option<String>,
    pub(crate) member_token: Option<String>,
    pub(crate) admin_token: Option<String>,
    pub(crate) agency_token: Option<String>,
    pub(crate) agency_type: Option<String>,
    pub(crate) valid_agency_ids: BTreeSet<i64>,
    pub(crate) agency_names: BTreeMap<i64, AgencyInfo>,
    pub(crate) initialized: bool,
}

impl CredentialStore {
    pub fn agency_id(&self) -> i64 {
        self.agency_id
    }

    pub fn member_id(&self) -> i64 {
        self.member_id
    }

    pub fn api_token(&self) -> &str {
        &self.api_token
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    pub fn org_token(&self) -> Option<&str> {
        self.org_token.as_deref()
    }

    pub fn member_token(&self) -> Option<&str> {
        self.member_token.as_deref()
    }

    pub fn admin_token(&self) -> Option<&str> {
        self.admin_token.as_deref()
    }

    pub fn agency_token(&self) -> Option<&str> {
        self.agency_token.as_deref()
    }

    pub fn agency_type(&self) -> Option<&str> {
        self.agency_type.as_deref()
    }

    pub fn valid_agency_ids(&self) -> &BTreeSet<i64> {
        &self.valid_agency_ids
    }

    pub fn agency_names(&self) -> &BTreeMap<i64, AgencyInfo> {
        &self.agency_names
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Store a token only if it carries a value, so a later step that finds
    /// nothing cannot wipe out what an earlier step found.
    pub(crate) fn absorb(slot: &mut Option<String>, value: Option<String>) {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            *slot = Some(value);
        }
    }

    /// Names of the fields the feeds need that are still empty.
    ///
    /// The crypted org/member tokens are checked only here, after the
    /// dashboard has had its chance to supply what the login response lacked.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.agency_id == 0 {
            missing.push("agency id");
        }
        if self.member_id == 0 {
            missing.push("member id");
        }
        if self.api_token.is_empty() {
            missing.push("api token");
        }
        let tokens = [
            ("org token", &self.org_token),
            ("member token", &self.member_token),
        ];
        for (name, token) in tokens {
            if token.as_deref().is_none_or(str::is_empty) {
                missing.push(name);
            }
        }
        missing
    }

    /// Mark the store ready. Fails with the list of missing fields.
    pub(crate) fn seal(&mut self) -> Result<(), Vec<&'static str>> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(missing);
        }
        self.initialized = true;
        Ok(())
    }
}
