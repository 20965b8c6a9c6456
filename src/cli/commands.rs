use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::core::auth::RawCredentials;
use crate::core::client::{AUTH_BASE, PORTAL_BASE, SessionConfig};
use crate::core::variant::PortalVariant;
use crate::error::Result;

#[derive(Parser, Debug)]
#[command(name = "iamresponding")]
#[command(author, version, about = "IAmResponding dispatch portal client", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and show the agencies the member can see
    Login {
        #[command(flatten)]
        login: LoginArgs,
    },

    /// Log in and fetch one feed
    Fetch {
        #[command(flatten)]
        login: LoginArgs,

        /// Print records as JSON
        #[arg(long, global = true)]
        json: bool,

        #[command(subcommand)]
        feed: Feed,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    /// Agency name as typed on the portal login page
    #[arg(long, env = "IAR_AGENCY")]
    pub agency: String,

    /// Member user name
    #[arg(long, env = "IAR_USERNAME")]
    pub username: String,

    /// Member password
    #[arg(long, env = "IAR_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Login flow the portal uses
    #[arg(long, value_enum, default_value = "auth")]
    pub variant: PortalVariant,

    /// Portal base URL
    #[arg(long, env = "IAR_PORTAL_URL", default_value = PORTAL_BASE)]
    pub portal_url: String,

    /// Auth subdomain base URL
    #[arg(long, env = "IAR_AUTH_URL", default_value = AUTH_BASE)]
    pub auth_url: String,
}

impl LoginArgs {
    pub fn credentials(&self) -> RawCredentials {
        RawCredentials::new(&self.agency, &self.username, &self.password)
    }

    pub fn session_config(&self) -> Result<SessionConfig> {
        SessionConfig::new(self.variant).with_base_urls(&self.portal_url, &self.auth_url)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Feed {
    /// Members currently responding
    Roster,

    /// Members on the duty schedule
    Schedule,

    /// Dispatch messages with parsed addresses
    Messages,

    /// One incident by id
    Incident {
        /// Incident (dispatch message) id
        id: i64,

        /// Token to send with the lookup, defaults to the session's API token
        #[arg(long)]
        token: Option<String>,
    },

    /// Latest incidents for the logged-in member
    Incidents,

    /// Calendar reminders from the last seven days
    Reminders,

    /// On-duty personnel and apparatus status
    Dispatchers,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Fish,
    Zsh,
}

impl From<Shell> for clap_complete::Shell {
    fn from(shell: Shell) -> Self {
        match shell {
            Shell::Bash => clap_complete::Shell::Bash,
            Shell::Fish => clap_complete::Shell::Fish,
            Shell::Zsh => clap_complete::Shell::Zsh,
        }
    }
}
