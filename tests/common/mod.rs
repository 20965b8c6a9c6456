//! Fake portal pages and a mock server wired up for the login flows.

#![allow(dead_code)]

use iamresponding::{PortalVariant, RawCredentials, Session, SessionConfig};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const AGENCY: &str = "Station9";
pub const USERNAME: &str = "jdoe";
pub const PASSWORD: &str = "hunter2";
pub const VERIFICATION_TOKEN: &str = "CfDJ8verify";

pub const LOGIN_PAGE: &str = r#"<!DOCTYPE html>
<html><body>
<form method="post" action="/login/member">
  <input id="Input_Agency" name="Input.Agency" type="text" />
  <input id="Input_Username" name="Input.Username" type="text" />
  <input id="Input_Password" name="Input.Password" type="password" />
  <input name="__RequestVerificationToken" type="hidden" value="CfDJ8verify" />
</form>
</body></html>"#;

pub const LOGIN_PAGE_WITHOUT_TOKEN: &str = r#"<!DOCTYPE html>
<html><body><form method="post"><input name="Input.Username" /></form></body></html>"#;

pub const REJECTED_PAGE: &str = r#"<!DOCTYPE html>
<html><body>
<div class="validation-summary-errors">
  <span>The log-in information you have entered is incorrect.</span>
</div>
</body></html>"#;

pub const LANDING_PAGE: &str = r#"<!DOCTYPE html>
<html><body>
<input type="hidden" id="orgCrypted" value="orgtok" />
<input type="hidden" id="memberCrypted" value="membertok" />
<input type="hidden" id="hdnIsAdminCrypted" value="admintok" />
<input type="hidden" id="hdnIsAgencyCrypted" value="agencytok" />
</body></html>"#;

pub const DASHBOARD_PAGE: &str = r#"<!DOCTYPE html>
<html><body>
<input type="hidden" id="hdnMemberId" value="99310" />
<input type="hidden" id="hdnSubscriberId" value="4821" />
<input type="hidden" id="hdnApiToken" value="hidden-api-token" />
<script type="text/javascript">
var Credentials={"Agency":4821,"Member":99310,"Type":1,"Token":"apitok","AgencyType":"Fire","SessionToken":"sesstok"};var ValidAgencies=['4821','5100'];var AgencyNames={'4821': {id: 4821, name: 'Station 9', index: 0, autoDisplay: 'true'}};var IsAgencyAdmin=false;
</script>
</body></html>"#;

pub const BARE_LANDING_PAGE: &str = r#"<!DOCTYPE html>
<html><body><h1>Welcome back</h1></body></html>"#;

pub const DASHBOARD_WITH_FORM_TOKENS: &str = r#"<!DOCTYPE html>
<html><body>
<input type="hidden" id="orgCrypted" value="dash-org" />
<input type="hidden" id="memberCrypted" value="dash-member" />
<script type="text/javascript">
var Credentials={"Agency":4821,"Member":99310,"Type":1,"Token":"apitok"};var ValidAgencies=[4821];var AgencyNames={};var IsAgencyAdmin=false;
</script>
</body></html>"#;

pub const DASHBOARD_WITHOUT_SCRIPT: &str = r#"<!DOCTYPE html>
<html><body><h1>Scheduled maintenance</h1></body></html>"#;

pub const LEGACY_DASHBOARD_PAGE: &str = r#"<html><body><script>
var Credentials={"Agency":4821,"Member":99310,"Type":1,"Token":"apitok","AgencyType":"Fire","SessionToken":"sesstok"};var IncidentsSettings={};
</script></body></html>"#;

pub fn credentials() -> RawCredentials {
    RawCredentials::new(AGENCY, USERNAME, PASSWORD)
}

pub fn session_for(server: &MockServer, variant: PortalVariant) -> Session {
    let config = SessionConfig::new(variant)
        .with_base_urls(&server.uri(), &server.uri())
        .expect("mock server URI is valid");
    Session::new(config).expect("client builds")
}

pub fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

pub fn xml(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/xml; charset=utf-8")
}

pub fn json(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_raw(body.as_bytes().to_vec(), "application/json; charset=utf-8")
}

/// Mount the auth-subdomain login flow with the given dashboard page.
pub async fn mount_auth_flow(server: &MockServer, dashboard: &str) {
    mount_auth_flow_with(server, LANDING_PAGE, dashboard).await;
}

/// Auth-subdomain flow where the credential POST answers with `landing`.
pub async fn mount_auth_flow_with(server: &MockServer, landing: &str, dashboard: &str) {
    Mock::given(method("GET"))
        .and(path("/login/member"))
        .respond_with(html(LOGIN_PAGE))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/login/member"))
        .and(body_string_contains("Input.Username=jdoe"))
        .and(body_string_contains("Input.Password=hunter2"))
        .and(body_string_contains("__RequestVerificationToken=CfDJ8verify"))
        .respond_with(html(landing))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v3/agency/dashboard.aspx"))
        .respond_with(html(dashboard))
        .mount(server)
        .await;
}

/// Start a server with the auth flow mounted and return a logged-in session.
pub async fn logged_in() -> (MockServer, Session) {
    let server = MockServer::start().await;
    mount_auth_flow(&server, DASHBOARD_PAGE).await;

    let mut session = session_for(&server, PortalVariant::AuthSubdomain);
    session.login(&credentials()).await.expect("login succeeds");
    (server, session)
}
