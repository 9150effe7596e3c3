use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version)]
pub struct Cli {
    /// Optional message to send as soon as the session starts.
    pub prompt: Option<String>,

    /// Agent chat endpoint. `/continue` is resolved relative to it.
    #[arg(long = "chat-url", value_name = "URL")]
    pub chat_api_url: Option<String>,

    /// Bearer token for the agent backend. Defaults to `WANGR_API_KEY`.
    #[arg(long = "api-key", value_name = "KEY")]
    pub api_key: Option<String>,

    /// Tell the agent to use the specified directory as its working root.
    /// File operations are confined to this directory.
    #[clap(long = "cd", short = 'C', value_name = "DIR")]
    pub cwd: Option<PathBuf>,
}
