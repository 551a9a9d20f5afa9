//! Command execution.
//!
//! Each subcommand reads its input, talks to the library, and writes a
//! result to the given output stream.

use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use stellartools_core::client::{ApiClient, ApiError, RequestOptions};
use stellartools_core::config::{
    Command, ConfigError, ValidatedConfig, parse_method, parse_query_pair,
};
use stellartools_core::webhook::{WebhookDelivery, WebhookDestination, WebhookSigner};

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;

/// Error type for command execution failures.
#[derive(Debug, Error)]
pub enum RunError {
    /// A setting the command needs is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failed to read a payload, body, or data file.
    #[error("Failed to read {what}: {source}")]
    Input {
        /// What was being read
        what: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The data file is not valid JSON.
    #[error("Invalid JSON in '{}': {source}", path.display())]
    InvalidJson {
        /// Path of the data file
        path: PathBuf,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },

    /// The API call failed.
    #[error("Request failed: {0}")]
    Api(#[from] ApiError),

    /// The webhook destination did not accept the event.
    #[error("Webhook delivery failed: {0}")]
    Delivery(String),

    /// The signature did not verify.
    #[error("Signature verification failed")]
    SignatureRejected,

    /// Failed to write the result.
    #[error("Failed to write output: {0}")]
    Output(#[source] std::io::Error),
}

/// Executes one subcommand.
///
/// `input` stands in for stdin when no file is given; results go to `output`.
///
/// # Errors
///
/// Returns [`RunError`] when the command cannot complete. A signature that
/// fails verification is reported as [`RunError::SignatureRejected`].
pub async fn execute<R, W>(
    command: &Command,
    config: &ValidatedConfig,
    input: R,
    output: &mut W,
) -> Result<(), RunError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match command {
        // Handled before configuration is loaded
        Command::Init { .. } => Ok(()),
        Command::Sign { payload_file } => {
            let payload = read_input(payload_file.as_deref(), input, "payload").await?;
            let signature = WebhookSigner::new().generate_signature(&payload, config.secret()?);
            write_line(output, &signature).await
        }
        Command::Verify {
            signature,
            payload_file,
        } => {
            let payload = read_input(payload_file.as_deref(), input, "payload").await?;
            verify(config, &payload, signature)?;
            write_line(output, "valid").await
        }
        Command::Deliver {
            url,
            event,
            data_file,
        } => deliver(config, url, event, data_file.as_deref(), output).await,
        Command::Request {
            method,
            endpoint,
            body_file,
            request_id,
            query,
        } => {
            let call = Call {
                method,
                endpoint,
                query,
                body_file: body_file.as_deref(),
                request_id: request_id.as_deref(),
            };
            request(config, &call, output).await
        }
    }
}

fn verify(config: &ValidatedConfig, payload: &[u8], signature: &str) -> Result<(), RunError> {
    let valid = WebhookSigner::new().verify_signature_with_tolerance(
        payload,
        signature,
        config.secret()?,
        config.tolerance_secs,
    );
    if valid {
        Ok(())
    } else {
        Err(RunError::SignatureRejected)
    }
}

async fn deliver<W: AsyncWrite + Unpin>(
    config: &ValidatedConfig,
    url: &str,
    event: &str,
    data_file: Option<&Path>,
    output: &mut W,
) -> Result<(), RunError> {
    let data = match data_file {
        Some(path) => {
            let raw = read_file(path, "data file").await?;
            serde_json::from_slice(&raw).map_err(|e| RunError::InvalidJson {
                path: path.to_path_buf(),
                source: e,
            })?
        }
        None => json!({}),
    };

    let destination = WebhookDestination::new(url, config.secret()?);
    let report = WebhookDelivery::new()
        .with_retry(config.retry)
        .with_timeout(config.timeout)
        .with_user_agent(config.user_agent.clone())
        .deliver(&destination, event, data)
        .await;

    write_json(output, &report).await?;

    if report.success {
        Ok(())
    } else {
        Err(RunError::Delivery(
            report
                .error_message
                .unwrap_or_else(|| "unknown error".to_string()),
        ))
    }
}

/// Arguments of the `request` subcommand.
struct Call<'a> {
    method: &'a str,
    endpoint: &'a str,
    query: &'a [String],
    body_file: Option<&'a Path>,
    request_id: Option<&'a str>,
}

async fn request<W: AsyncWrite + Unpin>(
    config: &ValidatedConfig,
    call: &Call<'_>,
    output: &mut W,
) -> Result<(), RunError> {
    let method = parse_method(call.method)?;
    let client = ApiClient::new(config.api_client_config()?);

    let mut options = RequestOptions::new();
    for pair in call.query {
        let (name, value) = parse_query_pair(pair)?;
        options = options.with_query(name, value);
    }
    if let Some(path) = call.body_file {
        options = options.with_body(read_file(path, "body file").await?);
    }
    if let Some(id) = call.request_id {
        options = options.with_request_id(id);
    }

    let response = client
        .request::<Value>(method, call.endpoint, options)
        .await?;
    tracing::debug!(status = %response.status, url = %response.url, "Request completed");

    let summary = json!({
        "status": response.status.as_u16(),
        "status_text": response.status_text,
        "url": response.url.as_str(),
        "data": response.data.into_value(),
    });
    write_json(output, &summary).await
}

async fn read_input<R: AsyncRead + Unpin>(
    path: Option<&Path>,
    mut input: R,
    what: &str,
) -> Result<Vec<u8>, RunError> {
    if let Some(path) = path {
        return read_file(path, what).await;
    }

    let mut buf = Vec::new();
    input
        .read_to_end(&mut buf)
        .await
        .map_err(|e| RunError::Input {
            what: format!("{what} from stdin"),
            source: e,
        })?;
    Ok(buf)
}

async fn read_file(path: &Path, what: &str) -> Result<Vec<u8>, RunError> {
    tokio::fs::read(path).await.map_err(|e| RunError::Input {
        what: format!("{what} '{}'", path.display()),
        source: e,
    })
}

async fn write_json<W, T>(output: &mut W, value: &T) -> Result<(), RunError>
where
    W: AsyncWrite + Unpin,
    T: serde::Serialize,
{
    // Serializing plain data structures cannot fail
    let text = serde_json::to_string_pretty(value).unwrap_or_default();
    write_line(output, &text).await
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> Result<(), RunError> {
    output
        .write_all(format!("{line}\n").as_bytes())
        .await
        .map_err(RunError::Output)?;
    output.flush().await.map_err(RunError::Output)
}
