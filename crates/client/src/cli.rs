use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sellora-poll")]
#[command(about = "Submit product photos for enhancement and track them to completion")]
pub struct Cli {
    /// Base URL of the Sellora API server
    #[arg(long, env = "SELLORA_API_URL", default_value = "http://localhost:3001")]
    pub api_url: String,

    /// Address to register when the email fallback is offered
    #[arg(long, env = "NOTIFY_EMAIL")]
    pub notify_email: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit an uploaded file and track the new job
    Submit {
        /// Name of the uploaded file on the server
        file_id: String,
        /// Enhancement style, e.g. natural or luxury
        style: String,
        /// Options object as JSON, e.g. '{"strength":1.2}'
        #[arg(long)]
        options: Option<String>,
    },

    /// Track an existing job
    Track {
        job_id: String,
    },
}
