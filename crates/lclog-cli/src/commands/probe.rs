//! Reachability and firmware checks run before any log retrieval.

use anyhow::anyhow;
use serde::Deserialize;

use crate::client::{CliError, CliResult, LCLOG_PATH, MANAGER_PATH, SessionContext};
use crate::filter::IdConvention;

#[derive(Debug, Deserialize)]
struct ManagerFirmware {
    #[serde(rename = "FirmwareVersion")]
    firmware_version: String,
}

/// Confirm the Lifecycle log endpoint exists and accepts our credentials.
pub(crate) async fn probe(ctx: &SessionContext) -> CliResult<()> {
    tracing::info!(
        base_url = %ctx.base_url,
        auth = ctx.credentials.kind(),
        verify_tls = ctx.verify_tls,
        "probing Lifecycle log endpoint"
    );
    let reply = ctx.get(ctx.endpoint(LCLOG_PATH)?).await?;
    match reply.status {
        200 => Ok(()),
        401 => Err(CliError::auth(
            "status code 401 returned. Incorrect iDRAC username/password or invalid privilege detected",
        )),
        status => Err(CliError::unsupported(format!(
            "iDRAC version installed does not support this feature using Redfish API (status code {status})"
        ))),
    }
}

/// Read the controller firmware version and pick the message-ID convention.
///
/// A 401 here is reported and the run continues with [`IdConvention::New`],
/// whose normalisation leaves undotted IDs untouched.
pub(crate) async fn detect_convention(ctx: &SessionContext) -> CliResult<IdConvention> {
    let mut url = ctx.endpoint(MANAGER_PATH)?;
    url.set_query(Some("$select=FirmwareVersion"));
    let reply = ctx.get(url).await?;

    match reply.status {
        200 => {
            let manager: ManagerFirmware = serde_json::from_str(&reply.body).map_err(|err| {
                CliError::failure(anyhow!("failed to parse iDRAC firmware version: {err}"))
            })?;
            let convention = IdConvention::from_firmware_version(&manager.firmware_version)?;
            tracing::info!(
                firmware = %manager.firmware_version,
                convention = convention.as_str(),
                "detected iDRAC firmware"
            );
            Ok(convention)
        }
        401 => {
            eprintln!(
                "- ERROR, status code 401 detected, check to make sure your iDRAC script session has correct username/password credentials or if using X-auth token, confirm the session is still active."
            );
            tracing::warn!("firmware version unavailable, assuming dotted message IDs");
            Ok(IdConvention::New)
        }
        status => Err(CliError::unsupported(format!(
            "unable to get current iDRAC version installed (status code {status})"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Credentials;
    use httpmock::prelude::*;
    use reqwest::Client;
    use serde_json::json;

    fn context(server: &MockServer) -> SessionContext {
        SessionContext {
            client: Client::new(),
            base_url: server.base_url().parse().expect("valid URL"),
            credentials: Credentials::Basic {
                username: "root".into(),
                password: "calvin".into(),
            },
            verify_tls: false,
            convention: IdConvention::Old,
        }
    }

    #[tokio::test]
    async fn probe_accepts_reachable_endpoint() -> CliResult<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path(LCLOG_PATH);
            then.status(200).json_body(json!({"Members": []}));
        });
        probe(&context(&server)).await?;
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn probe_reports_bad_credentials() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path(LCLOG_PATH);
            then.status(401).body("{}");
        });
        let err = probe(&context(&server))
            .await
            .expect_err("401 should fail");
        assert!(matches!(err, CliError::Auth(_)));
    }

    #[tokio::test]
    async fn probe_reports_missing_endpoint() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path(LCLOG_PATH);
            then.status(404).body("{}");
        });
        let err = probe(&context(&server))
            .await
            .expect_err("404 should fail");
        assert!(matches!(err, CliError::Unsupported(ref message) if message.contains("404")));
    }

    #[tokio::test]
    async fn detect_convention_reads_firmware_version() -> CliResult<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path(MANAGER_PATH)
                .query_param("$select", "FirmwareVersion");
            then.status(200)
                .json_body(json!({"FirmwareVersion": "5.10.50.00"}));
        });
        let convention = detect_convention(&context(&server)).await?;
        assert_eq!(convention, IdConvention::Old);
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn detect_convention_continues_after_unauthorized() -> CliResult<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path(MANAGER_PATH);
            then.status(401).body("{}");
        });
        assert_eq!(
            detect_convention(&context(&server)).await?,
            IdConvention::New
        );
        Ok(())
    }

    #[tokio::test]
    async fn detect_convention_fails_on_other_errors() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path(MANAGER_PATH);
            then.status(503).body("busy");
        });
        let err = detect_convention(&context(&server))
            .await
            .expect_err("503 should fail");
        assert!(matches!(err, CliError::Unsupported(_)));
    }
}
