// Line-delimited activity driver
//
// Reads one JSON request per line, executes it through the registry and
// writes one JSON response per line. Malformed lines produce an error
// response and do not stop the loop.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::activity::{error_types, ActivityError};
use crate::registry::ActivityRegistry;
use crate::reliability::RetryPolicy;

/// One activity invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRequest {
    pub activity: String,
    #[serde(default)]
    pub input: Value,
}

/// Result of one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityResponse {
    pub activity: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Output(Value),
    Error(ActivityError),
}

/// Serve requests from `reader` until end of input
///
/// Returns the number of requests handled.
pub async fn run<R, W>(
    registry: &ActivityRegistry,
    policy: &RetryPolicy,
    reader: R,
    mut writer: W,
) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut handled = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = handle_line(registry, policy, &line).await;
        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
        writer.flush().await?;
        handled += 1;
    }

    Ok(handled)
}

async fn handle_line(
    registry: &ActivityRegistry,
    policy: &RetryPolicy,
    line: &str,
) -> ActivityResponse {
    let request: ActivityRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected malformed request");
            return ActivityResponse {
                activity: String::new(),
                outcome: Outcome::Error(
                    ActivityError::non_retryable(format!("malformed request: {e}"))
                        .with_type(error_types::INVALID_INPUT),
                ),
            };
        }
    };

    let outcome = match registry
        .execute_with_retry(&request.activity, request.input, policy)
        .await
    {
        Ok(output) => Outcome::Output(output),
        Err(error) => {
            tracing::warn!(
                activity = %request.activity,
                error_type = error.error_type.as_deref().unwrap_or("unknown"),
                error = %error,
                "Activity failed"
            );
            Outcome::Error(error)
        }
    };

    ActivityResponse {
        activity: request.activity,
        outcome,
    }
}
