//! Command handlers for CLI subcommands

use crate::cli::{LoginArgs, RequestArgs, WhoamiArgs};
use crate::error::{Error, Result};
use crate::output::OutputWriter;
use campus_core::services::AuthService;
use campus_core::ApiClient;
use serde_json::Value;

/// Handle the login command
pub async fn handle_login(
    args: LoginArgs,
    client: &ApiClient,
    output: &mut OutputWriter,
) -> Result<()> {
    let login = AuthService::new(client.clone())
        .login(&args.email, &args.password)
        .await?;

    output.success(&format!("Signed in as {}", args.email));
    output.json(&login.user)
}

/// Handle the logout command
pub async fn handle_logout(client: &ApiClient, output: &mut OutputWriter) -> Result<()> {
    let auth = AuthService::new(client.clone());
    if !auth.is_authenticated().await? {
        output.success("No active session");
        return Ok(());
    }

    auth.logout().await?;
    output.success("Signed out");
    Ok(())
}

/// Handle the whoami command
pub async fn handle_whoami(
    args: WhoamiArgs,
    client: &ApiClient,
    output: &mut OutputWriter,
) -> Result<()> {
    let auth = AuthService::new(client.clone());
    if !auth.is_authenticated().await? {
        return Err(Error::NotSignedIn);
    }

    let user = auth.current_user(args.refresh).await?;
    output.json(&user)
}

/// Handle the request command.
///
/// Ctrl-C cancels the call, including any pending retry.
pub async fn handle_request(
    args: RequestArgs,
    client: &ApiClient,
    output: &mut OutputWriter,
) -> Result<()> {
    let mut call = client.call(args.method, args.path).query(args.query);
    if let Some(raw) = &args.data {
        let body = parse_body(raw)?;
        call = call.json(&body);
    }

    tracing::info!(trace_id = call.trace_id(), "sending request");
    let pending = call.spawn();
    let cancel = pending.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, cancelling request");
            cancel.cancel();
        }
    });

    let result = pending.wait().await;
    interrupt.abort();

    output.json(&result?)
}

fn parse_body(raw: &str) -> Result<Value> {
    serde_json::from_str(raw)
        .map_err(|e| Error::invalid_args(format!("--data is not valid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(r#"{"name":"Ada"}"#).unwrap(), json!({"name": "Ada"}));

        let err = parse_body("{name").unwrap_err();
        assert!(err.should_show_help());
    }
}
