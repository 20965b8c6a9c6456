//! Login-flow variants of the portal.
//!
//! The portal has shipped more than one incompatible login flow. Each variant
//! here describes one of them: which requests to make, which hidden fields and
//! script variables carry the tokens, and which of them must be present for
//! the session to count as logged in.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::core::bootstrap::BootstrapState;
use crate::core::extract::{self, TokenNotFound};

/// A script variable in the dashboard page.
///
/// With a terminator the value runs up to `;var <terminator>=`. Without one
/// the value is the object literal after `var <variable>=`, matched by its
/// braces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptPattern {
    pub variable: &'static str,
    pub terminator: Option<&'static str>,
}

impl ScriptPattern {
    /// Raw literal text assigned to the variable.
    pub fn extract(&self, body: &str) -> Result<String, TokenNotFound> {
        match self.terminator {
            Some(terminator) => extract::script_assignment(body, self.variable, terminator),
            None => extract::script_object(body, self.variable),
        }
    }
}

/// Hidden form field ids carrying the crypted request tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormTokenFields {
    pub org: &'static str,
    pub member: &'static str,
    pub admin: &'static str,
    pub agency: &'static str,
    pub api_token: &'static str,
}

/// Hidden form fields only present on the dashboard after login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardFields {
    pub member_id: &'static str,
    pub subscriber_id: &'static str,
    pub api_token: &'static str,
}

const FORM_TOKENS: FormTokenFields = FormTokenFields {
    org: "orgCrypted",
    member: "memberCrypted",
    admin: "hdnIsAdminCrypted",
    agency: "hdnIsAgencyCrypted",
    api_token: "hdnApiToken",
};

const DASHBOARD_FIELDS: DashboardFields = DashboardFields {
    member_id: "hdnMemberId",
    subscriber_id: "hdnSubscriberId",
    api_token: "hdnApiToken",
};

const CREDENTIALS: ScriptPattern = ScriptPattern {
    variable: "Credentials",
    terminator: Some("ValidAgencies"),
};

const VALID_AGENCIES: ScriptPattern = ScriptPattern {
    variable: "ValidAgencies",
    terminator: Some("AgencyNames"),
};

const AGENCY_NAMES: ScriptPattern = ScriptPattern {
    variable: "AgencyNames",
    terminator: Some("IsAgencyAdmin"),
};

/// The legacy dashboard puts no fixed variable after `Credentials`.
const LEGACY_CREDENTIALS: ScriptPattern = ScriptPattern {
    variable: "Credentials",
    terminator: None,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum PortalVariant {
    /// Current flow: login on the auth subdomain with an anti-forgery token
    /// and a cookie jar.
    #[default]
    #[value(name = "auth")]
    AuthSubdomain,
    /// Older cookie-less flow with inline ASP.NET tokens on the main host.
    #[value(name = "legacy")]
    LegacyInlineToken,
}

impl PortalVariant {
    /// The state that follows `state` on the happy path.
    ///
    /// Terminal states map to themselves.
    pub fn next_state(&self, state: &BootstrapState) -> BootstrapState {
        use BootstrapState::*;

        match (self, state) {
            (PortalVariant::AuthSubdomain, Start) => VerificationTokenFetched,
            (PortalVariant::LegacyInlineToken, Start) => CredentialsSubmitted,
            (_, VerificationTokenFetched) => CredentialsSubmitted,
            (_, CredentialsSubmitted) => FormTokensParsed,
            (_, FormTokensParsed) => DashboardOpened,
            (_, DashboardOpened) => CredentialsParsed,
            (_, CredentialsParsed) => Ready,
            (_, Ready) => Ready,
            (_, Failed(reason)) => Failed(reason.clone()),
        }
    }

    /// Path of the login form. Served from the auth host when
    /// [`PortalVariant::login_on_auth_host`] is true.
    pub fn login_path(&self) -> &'static str {
        match self {
            PortalVariant::AuthSubdomain => "/login/member",
            PortalVariant::LegacyInlineToken => "/v3/agency/def.aspx",
        }
    }

    /// True when the login form lives on the auth subdomain rather than the
    /// main portal host.
    pub fn login_on_auth_host(&self) -> bool {
        matches!(self, PortalVariant::AuthSubdomain)
    }

    /// JSON pre-validation call made by the legacy flow before the form post.
    pub fn prevalidate_path(&self) -> Option<&'static str> {
        match self {
            PortalVariant::AuthSubdomain => None,
            PortalVariant::LegacyInlineToken => {
                Some("/v3/Pages/memberlogin.aspx/ValidateLoginInfo")
            }
        }
    }

    pub fn dashboard_path(&self) -> &'static str {
        match self {
            PortalVariant::AuthSubdomain => "/v3/agency/dashboard.aspx",
            PortalVariant::LegacyInlineToken => "/v3/agency/incidentsdashboard.aspx",
        }
    }

    pub fn verification_field(&self) -> &'static str {
        "__RequestVerificationToken"
    }

    pub fn form_token_fields(&self) -> FormTokenFields {
        FORM_TOKENS
    }

    pub fn dashboard_fields(&self) -> DashboardFields {
        DASHBOARD_FIELDS
    }

    pub fn credentials_pattern(&self) -> ScriptPattern {
        match self {
            PortalVariant::AuthSubdomain => CREDENTIALS,
            PortalVariant::LegacyInlineToken => LEGACY_CREDENTIALS,
        }
    }

    /// Valid-agency list; only the auth flow publishes it.
    pub fn valid_agencies_pattern(&self) -> Option<ScriptPattern> {
        match self {
            PortalVariant::AuthSubdomain => Some(VALID_AGENCIES),
            PortalVariant::LegacyInlineToken => None,
        }
    }

    pub fn agency_names_pattern(&self) -> Option<ScriptPattern> {
        match self {
            PortalVariant::AuthSubdomain => Some(AGENCY_NAMES),
            PortalVariant::LegacyInlineToken => None,
        }
    }

    /// Fragments of the message the portal shows for a bad agency, user name
    /// or password.
    pub fn rejection_phrase(&self) -> &'static [&'static str] {
        &["log-in information", "is incorrect"]
    }
}
