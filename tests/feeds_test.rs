//! Feed calls on a logged-in session against a mock portal.

mod common;

use common::*;
use iamresponding::{PortalError, PortalVariant};
use wiremock::matchers::{any, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn feed_calls_without_login_never_touch_the_network() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut session = session_for(&server, PortalVariant::AuthSubdomain);

    assert!(matches!(session.roster().await, Err(PortalError::NotInitialized)));
    assert!(matches!(session.schedule().await, Err(PortalError::NotInitialized)));
    assert!(matches!(
        session.dispatch_messages().await,
        Err(PortalError::NotInitialized)
    ));
    assert!(matches!(
        session.incident(5531, "tok").await,
        Err(PortalError::NotInitialized)
    ));
    assert!(matches!(
        session.latest_incidents().await,
        Err(PortalError::NotInitialized)
    ));
    assert!(matches!(session.reminders().await, Err(PortalError::NotInitialized)));
    assert!(matches!(
        session.dispatcher_status().await,
        Err(PortalError::NotInitialized)
    ));

    let received = server.received_requests().await.unwrap_or_default();
    assert!(received.is_empty());
}

#[tokio::test]
async fn roster_sends_crypted_tokens() {
    let (server, mut session) = logged_in().await;
    Mock::given(method("POST"))
        .and(path("/v3/AgencyServices.asmx/GetNowRespondingWithSort"))
        .and(body_string_contains("org=orgtok"))
        .and(body_string_contains("member=membertok"))
        .respond_with(xml(
            r#"<?xml version="1.0" encoding="utf-8"?>
<NewDataSet>
    <NowResponding>
        <memberfname>Dana Reyes</memberfname>
        <membercat>EMT</membercat>
        <memberstation>Station 9</memberstation>
        <eta>4 min</eta>
    </NowResponding>
    <NowResponding>
        <memberfname></memberfname>
    </NowResponding>
</NewDataSet>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let roster = session.roster().await.unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].member_name, "Dana Reyes");
    assert_eq!(roster[0].eta, "4 min");
}

#[tokio::test]
async fn schedule_drops_placeholder_rows() {
    let (server, mut session) = logged_in().await;
    Mock::given(method("POST"))
        .and(path("/v3/AgencyServices.asmx/GetOnScheduleWithSort"))
        .and(body_string_contains("flag=0"))
        .respond_with(xml(
            "<NewDataSet><OnSchedule><membername>Kim Park</membername><untilat>07:00</untilat></OnSchedule><OnSchedule><membername> </membername></OnSchedule></NewDataSet>",
        ))
        .mount(&server)
        .await;

    let schedule = session.schedule().await.unwrap();
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0].member_name, "Kim Park");
    assert_eq!(schedule[0].until_at, "07:00");
}

#[tokio::test]
async fn dispatch_messages_carry_addresses() {
    let (server, mut session) = logged_in().await;
    Mock::given(method("POST"))
        .and(path("/v3/DispatchMessages.asmx/ListWithParser"))
        .and(body_string_contains("subscriber=orgtok"))
        .and(body_string_contains("admin=admintok"))
        .and(body_string_contains("agency=agencytok"))
        .respond_with(xml(
            r#"<NewDataSet>
    <DispatchMessages>
        <id>5531</id>
        <messagebody>Fire * 123 Main St * extra</messagebody>
        <messagesubject>Structure fire</messagesubject>
    </DispatchMessages>
    <DispatchMessages>
        <id>5532</id>
        <messagebody>Monthly test page</messagebody>
    </DispatchMessages>
</NewDataSet>"#,
        ))
        .mount(&server)
        .await;

    let messages = session.dispatch_messages().await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].id, 5531);
    assert_eq!(messages[0].address, "123 Main St");
    assert_eq!(messages[1].address, "");
}

#[tokio::test]
async fn incident_lookup_decodes_first_row() {
    let (server, mut session) = logged_in().await;
    Mock::given(method("POST"))
        .and(path("/v3/IncidentsDashboard.asmx/GetIncidentInfo"))
        .and(body_string_contains(r#""messageId":5531"#))
        .and(body_string_contains(r#""token":"apitok""#))
        .respond_with(json(
            r#"{"d":[{"__type":"IncidentInfoData","Id":5531,"SubscriberId":4821,"Subject":"Structure fire","Address":"123 Main St","OverrideBounds":false,"UpdatedOn":null}]}"#,
        ))
        .mount(&server)
        .await;

    let token = session.credentials().api_token().to_string();
    let incident = session.incident(5531, &token).await.unwrap();
    assert_eq!(incident.id, 5531);
    assert_eq!(incident.subscriber_id, 4821);
    assert_eq!(incident.address, "123 Main St");
    assert_eq!(incident.updated_on, "");
}

#[tokio::test]
async fn incident_lookup_with_empty_payload_is_empty_result() {
    let (server, mut session) = logged_in().await;
    Mock::given(method("POST"))
        .and(path("/v3/IncidentsDashboard.asmx/GetIncidentInfo"))
        .respond_with(json(r#"{"d": []}"#))
        .mount(&server)
        .await;

    match session.incident(42, "apitok").await {
        Err(PortalError::EmptyResult(id)) => assert_eq!(id, 42),
        other => panic!("expected empty result, got {other:?}"),
    }
}

#[tokio::test]
async fn latest_incidents_unescape_html_encoded_json() {
    let (server, mut session) = logged_in().await;
    Mock::given(method("POST"))
        .and(path("/v3/IncidentsDashboard.asmx/GetLatestIncidents"))
        .and(body_string_contains(r#""memberId":99310"#))
        .respond_with(json(
            "{&#34;d&#34;:[{&#34;Id&#34;:1,&#34;Subject&#34;:&#34;MVA&#34;},{&#34;Id&#34;:2,&#34;Subject&#34;:&#34;EMS&#34;}]}",
        ))
        .mount(&server)
        .await;

    let incidents = session.latest_incidents().await.unwrap();
    let subjects: Vec<_> = incidents.iter().map(|i| i.subject.as_str()).collect();
    assert_eq!(subjects, vec!["MVA", "EMS"]);
}

#[tokio::test]
async fn reminders_cover_the_agency() {
    let (server, mut session) = logged_in().await;
    Mock::given(method("POST"))
        .and(path("/v3/Calendar.asmx/GetReminders"))
        .and(body_string_contains("agency=4821"))
        .and(body_string_contains("from="))
        .respond_with(xml(
            "<NewDataSet><event><eventid>77</eventid><subject>Drill night</subject><eventstart>2026-10-14T19:00:00</eventstart></event></NewDataSet>",
        ))
        .mount(&server)
        .await;

    let reminders = session.reminders().await.unwrap();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].subject, "Drill night");
    assert!(reminders[0].start.is_some());
}

#[tokio::test]
async fn dispatcher_status_lists_on_duty_personnel() {
    let (server, mut session) = logged_in().await;
    Mock::given(method("POST"))
        .and(path("/v3/DispatcherServices.asmx/GetDispatcherAgencyInformation"))
        .and(body_string_contains(r#""agencyId":4821"#))
        .respond_with(json(
            r#"{"d":{"AgencyId":4821,"OnDuties":[{"Name":"Dana Reyes","Position":"Captain"}],"NowRespondings":[]}}"#,
        ))
        .mount(&server)
        .await;

    let status = session.dispatcher_status().await.unwrap();
    assert_eq!(status.agency_id, 4821);
    assert_eq!(status.on_duty[0].position, "Captain");
    assert!(status.now_responding.is_empty());
}

#[tokio::test]
async fn server_error_is_transport_error() {
    let (server, mut session) = logged_in().await;
    Mock::given(method("POST"))
        .and(path("/v3/AgencyServices.asmx/GetOnScheduleWithSort"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert!(matches!(
        session.schedule().await,
        Err(PortalError::Transport(_))
    ));
}

#[tokio::test]
async fn garbage_payload_is_decode_error_with_body() {
    let (server, mut session) = logged_in().await;
    Mock::given(method("POST"))
        .and(path("/v3/IncidentsDashboard.asmx/GetLatestIncidents"))
        .respond_with(html("<html>Runtime Error</html>"))
        .mount(&server)
        .await;

    match session.latest_incidents().await {
        Err(PortalError::Decode { body, .. }) => assert!(body.contains("Runtime Error")),
        other => panic!("expected decode error, got {other:?}"),
    }
}
