use clap::Parser;
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Tail a live Twitch stream into a file or stdout",
    long_about = "Follows a channel's live HLS playlist and writes every new segment, in order,\n\
                  to the chosen output. Pipe it into a player with `-o -` (the default).\n\
                  \n\
                  Press q<Enter> or Ctrl-C to stop."
)]
pub struct CliArgs {
    /// Channel to tail
    #[arg(short, long, help = "Name of the channel to tail")]
    pub channel: String,

    /// Quality label of the variant
    #[arg(
        long,
        default_value = "chunked",
        help = "Variant (quality label) of the stream, e.g. chunked, 720p60, audio_only"
    )]
    pub variant: String,

    /// Output path, `-` for stdout
    #[arg(
        short,
        long,
        default_value = "-",
        help = "File to write the stream to, or '-' for stdout"
    )]
    pub output: String,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", help = "Copy log output into the given file")]
    pub log_file: Option<PathBuf>,

    /// OAuth client id
    #[arg(
        long,
        env = "TWITCH_CLIENT_ID",
        hide_env_values = true,
        help = "Client id sent with token requests; also used for refresh-token exchange"
    )]
    pub client_id: Option<String>,

    /// OAuth client secret
    #[arg(
        long,
        env = "TWITCH_CLIENT_SECRET",
        hide_env_values = true,
        help = "Client secret used for refresh-token exchange"
    )]
    pub client_secret: Option<String>,

    /// OAuth refresh token
    #[arg(
        long,
        env = "TWITCH_REFRESH_TOKEN",
        hide_env_values = true,
        help = "Refresh token; with client id and secret enables authenticated access"
    )]
    pub refresh_token: Option<String>,

    /// Pre-obtained OAuth token
    #[arg(
        long,
        env = "TWITCH_OAUTH_TOKEN",
        hide_env_values = true,
        help = "Static OAuth token used when no refresh-token triple is given"
    )]
    pub oauth_token: Option<String>,

    /// Custom HTTP headers for all requests
    #[arg(
        long = "header",
        short = 'H',
        help = "Add custom HTTP header to requests (can be used multiple times). Format: 'Name: Value'",
        value_name = "HEADER"
    )]
    pub headers: Vec<String>,

    /// User agent override
    #[arg(long, help = "User-Agent header sent with every request")]
    pub user_agent: Option<String>,

    /// Overall request timeout in seconds
    #[arg(
        long,
        default_value = "0",
        help = "Overall timeout in seconds for HTTP requests (0 disables it)"
    )]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value = "30",
        help = "Connection timeout in seconds (time to establish initial connection)"
    )]
    pub connect_timeout: u64,

    /// Read timeout in seconds
    #[arg(
        long,
        default_value = "30",
        help = "Read timeout in seconds (maximum time between receiving data chunks)"
    )]
    pub read_timeout: u64,

    /// Segments taken from the end of the first playlist
    #[arg(
        long,
        default_value = "4",
        help = "Number of most recent segments to start from"
    )]
    pub live_edge: usize,

    /// Show a progress spinner
    #[arg(
        short = 'P',
        long = "progress",
        default_value = "false",
        help = "Show total bytes and download rate while tailing"
    )]
    pub show_progress: bool,
}
