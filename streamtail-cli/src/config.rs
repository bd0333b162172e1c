use std::time::Duration;

use streamtail_engine::{AuthConfig, ChannelIdentity, SessionConfig};
use tracing::info;

use crate::cli::CliArgs;
use crate::error::AppError;
use crate::output::OutputTarget;
use crate::utils::parse_headers;

/// Configuration for the entire program
#[derive(Debug, Clone)]
pub struct ProgramConfig {
    /// Channel and variant to tail
    pub identity: ChannelIdentity,

    /// Engine configuration
    pub session: SessionConfig,

    /// Optional account credentials
    pub auth: AuthConfig,

    /// Where the stream bytes go
    pub output: OutputTarget,

    /// Whether to draw the status spinner
    pub show_progress: bool,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ProgramConfig {
    pub fn from_args(args: &CliArgs) -> Result<Self, AppError> {
        let identity = ChannelIdentity::new(&args.channel, args.variant.trim())?;
        let output: OutputTarget = args.output.parse()?;

        if args.live_edge == 0 {
            return Err(AppError::InvalidInput(
                "--live-edge must be at least 1".to_string(),
            ));
        }

        info!(
            "HTTP timeout configuration: overall={}s, connect={}s, read={}s",
            args.timeout, args.connect_timeout, args.read_timeout
        );

        let mut builder = SessionConfig::builder()
            .with_timeout(Duration::from_secs(args.timeout))
            .with_connect_timeout(Duration::from_secs(args.connect_timeout))
            .with_read_timeout(Duration::from_secs(args.read_timeout))
            .with_headers(parse_headers(&args.headers))
            .with_live_edge_segments(args.live_edge);

        if let Some(user_agent) = non_blank(&args.user_agent) {
            builder = builder.with_user_agent(user_agent);
        }

        let auth = AuthConfig {
            client_id: non_blank(&args.client_id),
            client_secret: non_blank(&args.client_secret),
            refresh_token: non_blank(&args.refresh_token),
            oauth_token: non_blank(&args.oauth_token),
        };
        // the configured client id also identifies token requests
        if let Some(client_id) = &auth.client_id {
            builder = builder.with_client_id(client_id.clone());
        }

        Ok(Self {
            identity,
            session: builder.build(),
            auth,
            output,
            show_progress: args.show_progress,
        })
    }
}
