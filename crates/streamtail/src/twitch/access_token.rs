use std::fmt;
use std::sync::Arc;

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::auth::TokenSource;
use crate::error::AuthError;
use crate::twitch::ChannelIdentity;

const PLAYBACK_ACCESS_TOKEN_HASH: &str =
    "0828119ded1c13477966434e15800ff57ddacf13ba1911c129dc2200705b0712";

/// Short-lived token/signature pair that unlocks the channel's playlists.
#[derive(Clone, PartialEq, Eq)]
pub struct PlaybackCredential {
    pub token: String,
    pub signature: String,
}

impl fmt::Debug for PlaybackCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackCredential")
            .field("token", &format_args!("<{} bytes>", self.token.len()))
            .field("signature", &self.signature)
            .finish()
    }
}

fn decode_error(reason: impl Into<String>) -> AuthError {
    AuthError::Decode {
        endpoint: "gql",
        reason: reason.into(),
    }
}

/// Extract the playback credential from a `PlaybackAccessToken` response.
///
/// The endpoint answers either with a single object or with a batch array; only
/// the first element of a batch is looked at.
pub fn parse_access_token(channel: &str, body: &[u8]) -> Result<PlaybackCredential, AuthError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| decode_error(e.to_string()))?;
    let response = match &value {
        Value::Array(items) => items
            .first()
            .ok_or_else(|| decode_error("empty response array"))?,
        other => other,
    };

    if let Some(message) = response
        .get("errors")
        .and_then(|errors| errors.get(0))
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
    {
        return Err(decode_error(format!("gql error: {message}")));
    }

    let data = response
        .get("data")
        .ok_or_else(|| decode_error("missing data"))?;
    let access_token = match data.get("streamPlaybackAccessToken") {
        None => return Err(decode_error("missing streamPlaybackAccessToken")),
        Some(Value::Null) => return Err(AuthError::ChannelNotFound(channel.to_string())),
        Some(token) => token,
    };

    let field = |name: &str| {
        access_token
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| decode_error(format!("missing {name}")))
    };

    Ok(PlaybackCredential {
        token: field("value")?,
        signature: field("signature")?,
    })
}

/// Requests playback credentials from the GraphQL endpoint.
pub struct AccessTokenClient {
    client: Client,
    gql_url: String,
    client_id: String,
    token_source: Arc<dyn TokenSource>,
}

impl AccessTokenClient {
    pub fn new(
        client: Client,
        gql_url: impl Into<String>,
        client_id: impl Into<String>,
        token_source: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            client,
            gql_url: gql_url.into(),
            client_id: client_id.into(),
            token_source,
        }
    }

    fn request_body(identity: &ChannelIdentity) -> Value {
        serde_json::json!({
            "operationName": "PlaybackAccessToken",
            "extensions": {
                "persistedQuery": {
                    "version": 1,
                    "sha256Hash": PLAYBACK_ACCESS_TOKEN_HASH
                }
            },
            "variables": {
                "isLive": true,
                "login": identity.channel(),
                "isVod": false,
                "vodID": "",
                "playerType": "site",
                "isClip": false,
                "clipID": ""
            }
        })
    }

    pub async fn acquire(&self, identity: &ChannelIdentity) -> Result<PlaybackCredential, AuthError> {
        let token = self
            .token_source
            .token()
            .await
            .map_err(|e| match e {
                AuthError::TokenSource(_) => e,
                other => AuthError::TokenSource(other.to_string()),
            })?;

        let mut request = self
            .client
            .post(&self.gql_url)
            .header("Client-Id", &self.client_id)
            .json(&Self::request_body(identity));
        if let Some(token) = &token {
            request = request.header(
                reqwest::header::AUTHORIZATION,
                format!("OAuth {}", token.secret()),
            );
        }

        debug!(
            channel = identity.channel(),
            authenticated = token.is_some(),
            "Requesting playback access token"
        );
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Status {
                endpoint: "gql",
                status,
            });
        }

        let body = response.bytes().await?;
        let credential = parse_access_token(identity.channel(), &body)?;
        debug!(channel = identity.channel(), "Playback access token acquired");
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_and_batched_responses() {
        let single = br#"{"data":{"streamPlaybackAccessToken":{"value":"{\"channel\":\"foo\"}","signature":"abc123","__typename":"PlaybackAccessToken"}},"extensions":{"operationName":"PlaybackAccessToken"}}"#;
        let credential = parse_access_token("foo", single).unwrap();
        assert_eq!(credential.token, r#"{"channel":"foo"}"#);
        assert_eq!(credential.signature, "abc123");

        let batched = br#"[{"data":{"streamPlaybackAccessToken":{"value":"v","signature":"s"}}}]"#;
        let credential = parse_access_token("foo", batched).unwrap();
        assert_eq!(credential.token, "v");
        assert_eq!(credential.signature, "s");
    }

    #[test]
    fn null_token_means_unknown_channel() {
        let body = br#"{"data":{"streamPlaybackAccessToken":null}}"#;
        match parse_access_token("nobody", body) {
            Err(AuthError::ChannelNotFound(channel)) => assert_eq!(channel, "nobody"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn malformed_responses_are_decode_errors() {
        for body in [
            &b"not json"[..],
            &br#"[]"#[..],
            &br#"{"data":{}}"#[..],
            &br#"{"data":{"streamPlaybackAccessToken":{"value":"v"}}}"#[..],
            &br#"{"errors":[{"message":"PersistedQueryNotFound"}]}"#[..],
        ] {
            assert!(
                matches!(parse_access_token("foo", body), Err(AuthError::Decode { .. })),
                "body {:?} should fail to decode",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn request_targets_channel_login() {
        let identity = ChannelIdentity::new("Foo", "chunked").unwrap();
        let body = AccessTokenClient::request_body(&identity);
        assert_eq!(body["variables"]["login"], "foo");
        assert_eq!(body["operationName"], "PlaybackAccessToken");
        assert_eq!(
            body["extensions"]["persistedQuery"]["sha256Hash"],
            PLAYBACK_ACCESS_TOKEN_HASH
        );
    }

    #[test]
    fn credential_debug_hides_token() {
        let credential = PlaybackCredential {
            token: "secret-token".to_string(),
            signature: "sig".to_string(),
        };
        assert!(!format!("{credential:?}").contains("secret-token"));
    }
}
