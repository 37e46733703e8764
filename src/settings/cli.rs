use super::Parser;
use clap::Subcommand;

#[derive(Parser, Debug)]
#[command(name = "warden", about = "Authenticated API client with block enforcement")]
pub struct Cli {
    #[arg(long)]
    pub settings: Option<String>,

    /// Log in with this credential before running the command.
    #[arg(long, global = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store a bearer credential for later calls.
    Login {
        #[arg(long)]
        token: String,
    },
    /// Forget the stored credential.
    Logout,
    /// Show session and block state.
    Status,
    /// Make one call through the pipeline and print the outcome as JSON.
    Call {
        endpoint: String,
        #[arg(long, default_value = "GET")]
        method: String,
        /// Query parameter as key=value; repeatable.
        #[arg(long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
        /// JSON request body.
        #[arg(long)]
        body: Option<String>,
    },
    /// Run the authenticated route tracker for a path.
    Navigate { path: String },
    /// Mount a public page tracker for a page.
    Visit { page: String },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}
