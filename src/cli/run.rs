use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

use crate::cli::commands::{Feed, LoginArgs};
use crate::core::client::Session;

async fn open_session(args: &LoginArgs) -> Result<Session> {
    let mut session = Session::new(args.session_config()?)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(format!("Logging in to {}...", args.agency));

    let result = session.login(&args.credentials()).await.map(|_| ());
    spinner.finish_and_clear();
    result?;

    Ok(session)
}

pub async fn run_login(args: LoginArgs) -> Result<()> {
    let session = open_session(&args).await?;
    let creds = session.credentials();

    println!("Agency {} / member {}", creds.agency_id(), creds.member_id());
    if let Some(agency_type) = creds.agency_type() {
        println!("Agency type: {agency_type}");
    }
    for id in creds.valid_agency_ids() {
        match creds.agency_names().get(id) {
            Some(info) => println!("  {id}  {}", info.name),
            None => println!("  {id}"),
        }
    }

    Ok(())
}

pub async fn run_fetch(args: LoginArgs, json: bool, feed: Feed) -> Result<()> {
    let mut session = open_session(&args).await?;

    match feed {
        Feed::Roster => {
            let entries = session.roster().await?;
            emit(json, &entries, |e| {
                format!("{:<24} {:<10} {:<16} ETA {}", e.member_name, e.category, e.station, e.eta)
            })?;
        }
        Feed::Schedule => {
            let entries = session.schedule().await?;
            emit(json, &entries, |e| {
                format!("{:<24} {:<10} {:<16} until {}", e.member_name, e.category, e.station, e.until_at)
            })?;
        }
        Feed::Messages => {
            let messages = session.dispatch_messages().await?;
            emit(json, &messages, |m| {
                format!("{:>8}  {}  {}  [{}]", m.id, m.arrived_on, m.subject, m.address)
            })?;
        }
        Feed::Incident { id, token } => {
            let token = token.unwrap_or_else(|| session.credentials().api_token().to_string());
            let incident = session.incident(id, &token).await?;
            emit(json, std::slice::from_ref(&incident), |i| {
                format!("{:>8}  {}  {}  {}", i.id, i.arrived_on, i.subject, i.address)
            })?;
        }
        Feed::Incidents => {
            let incidents = session.latest_incidents().await?;
            emit(json, &incidents, |i| {
                format!("{:>8}  {}  {}  {}", i.id, i.arrived_on, i.subject, i.address)
            })?;
        }
        Feed::Reminders => {
            let events = session.reminders().await?;
            emit(json, &events, |e| {
                let start = e
                    .start
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                format!("{start:<16}  {}", e.subject)
            })?;
        }
        Feed::Dispatchers => {
            let status = session.dispatcher_status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("On duty:");
                for person in &status.on_duty {
                    println!("  {:<24} {:<10} {}", person.name, person.position, person.until_at_string);
                }
                println!("Responding:");
                for member in &status.now_responding {
                    println!("  {:<24} {:<10} ETA {}", member.name, member.position, member.eta_string);
                }
            }
        }
    }

    Ok(())
}

fn emit<T: Serialize>(json: bool, records: &[T], line: impl Fn(&T) -> String) -> Result<()> {
    info!("Printing {} records", records.len());
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
    } else if records.is_empty() {
        println!("No records");
    } else {
        for record in records {
            println!("{}", line(record));
        }
    }
    Ok(())
}
