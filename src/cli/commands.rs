//! CLI commands and argument parsing

use crate::config::{
    LarkConfig, ServerConfig, SessionMode, DEFAULT_API_BASE, DEFAULT_CLIENT_URL,
    DEFAULT_REDIRECT_URI, DEFAULT_SESSION_FILE,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Copy a Lark/Feishu Base into a new static Base
#[derive(Parser, Debug)]
#[command(name = "base-snapshot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub lark: LarkArgs,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Vendor app credentials and endpoints
#[derive(Args, Debug, Clone)]
pub struct LarkArgs {
    /// App id of the vendor app
    #[arg(long, env = "LARK_APP_ID", global = true, default_value = "")]
    pub app_id: String,

    /// App secret of the vendor app
    #[arg(long, env = "LARK_APP_SECRET", global = true, hide_env_values = true, default_value = "")]
    pub app_secret: String,

    /// Open-apis root
    #[arg(long, env = "LARK_API_BASE", global = true, default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Root of the authorization page (defaults to the API base)
    #[arg(long, env = "LARK_AUTH_BASE", global = true)]
    pub auth_base: Option<String>,
}

impl LarkArgs {
    pub fn to_config(&self) -> LarkConfig {
        LarkConfig {
            app_id: self.app_id.clone(),
            app_secret: self.app_secret.clone(),
            api_base: self.api_base.clone(),
            auth_base: self.auth_base.clone(),
        }
    }
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value = "3001")]
        port: u16,

        /// OAuth redirect URI registered with the vendor app
        #[arg(long, env = "LARK_REDIRECT_URI", default_value = DEFAULT_REDIRECT_URI)]
        redirect_uri: String,

        /// Origin of the UI
        #[arg(long, env = "CLIENT_URL", default_value = DEFAULT_CLIENT_URL)]
        client_url: String,

        /// Session storage (detected from the runtime when omitted)
        #[arg(long, env = "SESSION_MODE", value_enum)]
        session_mode: Option<SessionMode>,

        /// Session file for file mode
        #[arg(long, env = "SESSION_FILE", default_value = DEFAULT_SESSION_FILE)]
        session_file: PathBuf,
    },

    /// Copy a Base and print the result as JSON
    Snapshot {
        /// URL of the source Base
        #[arg(long)]
        source: String,

        /// Name of the new Base
        #[arg(long)]
        name: String,

        /// Copy only these tables (repeatable)
        #[arg(long = "table")]
        tables: Vec<String>,

        /// Copy attachment files instead of their names
        #[arg(long)]
        preserve_attachments: bool,

        /// Grant the token's user full access to the new Base (needs --user-token)
        #[arg(long)]
        grant_admin: bool,

        /// Act as this user instead of the app
        #[arg(long, env = "LARK_USER_TOKEN", hide_env_values = true)]
        user_token: Option<String>,
    },

    /// List the tables a snapshot would copy
    Preview {
        /// URL of the source Base
        #[arg(long)]
        source: String,

        /// Act as this user instead of the app
        #[arg(long, env = "LARK_USER_TOKEN", hide_env_values = true)]
        user_token: Option<String>,
    },
}

impl Commands {
    /// Server settings for the `serve` command
    pub fn server_config(&self, lark: LarkConfig) -> Option<ServerConfig> {
        let Self::Serve {
            port,
            redirect_uri,
            client_url,
            session_mode,
            session_file,
        } = self
        else {
            return None;
        };

        Some(ServerConfig {
            lark,
            redirect_uri: redirect_uri.clone(),
            client_url: client_url.clone(),
            port: *port,
            session_mode: session_mode.unwrap_or_else(SessionMode::detect),
            session_file: session_file.clone(),
        })
    }
}
