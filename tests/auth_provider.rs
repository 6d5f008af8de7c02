use anyhow::Result;
use assert_matches::assert_matches;
use chrono::{Duration as ChronoDuration, Utc};
use mockito::Matcher;
use serde_json::json;
use sheets_mcp::auth::{
    Credential, CredentialProvider, CredentialSource, SHEETS_SCOPE, read_token_file,
    write_token_file,
};
use sheets_mcp::config::{CLIENT_SECRET_FILE_NAME, InlineCredentials, TOKEN_FILE_NAME};
use sheets_mcp::errors::AuthError;
use std::sync::Arc;
use std::time::Duration;

mod support;

const TIMEOUT: Duration = Duration::from_secs(5);

fn inline_source(token_uri: String) -> CredentialSource {
    CredentialSource::Inline {
        credentials: InlineCredentials {
            client_id: "client-id".into(),
            client_secret: "client-secret".into(),
            refresh_token: "1//refresh".into(),
        },
        token_uri,
    }
}

fn token_body(access_token: &str) -> String {
    json!({
        "access_token": access_token,
        "expires_in": 3599,
        "scope": SHEETS_SCOPE,
        "token_type": "Bearer"
    })
    .to_string()
}

fn stored_credential(token_uri: String, expires_in_secs: i64) -> Credential {
    Credential {
        access_token: Some("ya29.stored".into()),
        refresh_token: Some("1//stored-refresh".into()),
        token_uri,
        client_id: "client-id".into(),
        client_secret: "client-secret".into(),
        scopes: vec![SHEETS_SCOPE.into()],
        expiry: Some(Utc::now() + ChronoDuration::seconds(expires_in_secs)),
    }
}

fn file_source(workspace: &support::TestWorkspace) -> CredentialSource {
    CredentialSource::TokenFile {
        token_path: workspace.path(TOKEN_FILE_NAME),
        client_secret_path: workspace.path(CLIENT_SECRET_FILE_NAME),
    }
}

#[tokio::test]
async fn inline_credentials_refresh_once_and_cache() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("client_id".into(), "client-id".into()),
            Matcher::UrlEncoded("client_secret".into(), "client-secret".into()),
            Matcher::UrlEncoded("refresh_token".into(), "1//refresh".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(token_body("ya29.fresh"))
        .expect(1)
        .create_async()
        .await;

    let provider =
        CredentialProvider::new(inline_source(format!("{}/token", server.url())), TIMEOUT)?;

    assert_eq!(provider.access_token().await?, "ya29.fresh");
    assert_eq!(provider.access_token().await?, "ya29.fresh");

    let credential = provider.credential().await?;
    assert_eq!(credential.refresh_token.as_deref(), Some("1//refresh"));
    assert!(credential.expiry.is_some());
    mock.assert_async().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_use_refreshes_once() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(token_body("ya29.shared"))
        .expect(1)
        .create_async()
        .await;

    let provider = Arc::new(CredentialProvider::new(
        inline_source(format!("{}/token", server.url())),
        TIMEOUT,
    )?);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let provider = provider.clone();
            tokio::spawn(async move { provider.access_token().await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await??, "ya29.shared");
    }

    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn reset_forces_new_refresh() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(token_body("ya29.again"))
        .expect(2)
        .create_async()
        .await;

    let provider =
        CredentialProvider::new(inline_source(format!("{}/token", server.url())), TIMEOUT)?;
    provider.access_token().await?;
    provider.reset().await;
    provider.access_token().await?;

    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn rejected_refresh_surfaces_endpoint_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/token")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })
            .to_string(),
        )
        .create_async()
        .await;

    let provider =
        CredentialProvider::new(inline_source(format!("{}/token", server.url())), TIMEOUT)
            .expect("provider");
    let err = provider.access_token().await.unwrap_err();
    assert_matches!(
        &err,
        AuthError::Refresh(message) if message == "invalid_grant: Token has been expired or revoked."
    );
}

#[tokio::test]
async fn valid_token_file_is_used_without_network() -> Result<()> {
    let workspace = support::TestWorkspace::new();
    let token_path = workspace.path(TOKEN_FILE_NAME);
    write_token_file(
        &token_path,
        &stored_credential("http://127.0.0.1:9/token".into(), 3600),
    )
    .await?;

    let provider = CredentialProvider::new(file_source(&workspace), TIMEOUT)?;
    assert_eq!(provider.access_token().await?, "ya29.stored");
    Ok(())
}

#[tokio::test]
async fn expired_token_file_is_refreshed_and_written_back() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/token")
        .match_body(Matcher::UrlEncoded(
            "refresh_token".into(),
            "1//stored-refresh".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(token_body("ya29.renewed"))
        .expect(1)
        .create_async()
        .await;

    let workspace = support::TestWorkspace::new();
    let token_path = workspace.path(TOKEN_FILE_NAME);
    write_token_file(
        &token_path,
        &stored_credential(format!("{}/token", server.url()), -120),
    )
    .await?;

    let provider = CredentialProvider::new(file_source(&workspace), TIMEOUT)?;
    assert_eq!(provider.access_token().await?, "ya29.renewed");
    mock.assert_async().await;

    let stored = read_token_file(&token_path).await?.expect("token file");
    assert_eq!(stored.access_token.as_deref(), Some("ya29.renewed"));
    assert_eq!(stored.refresh_token.as_deref(), Some("1//stored-refresh"));
    assert!(!stored.is_expired());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&token_path)?.permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
    Ok(())
}

#[tokio::test]
async fn missing_secret_file_is_configuration_error() {
    let workspace = support::TestWorkspace::new();
    let provider = CredentialProvider::new(file_source(&workspace), TIMEOUT).expect("provider");

    let err = provider.access_token().await.unwrap_err();
    assert_matches!(&err, AuthError::Configuration(path) if path.ends_with(CLIENT_SECRET_FILE_NAME));
    assert!(err.to_string().contains("GOOGLE_REFRESH_TOKEN"));
}

#[tokio::test]
async fn malformed_token_file_is_reported() {
    let workspace = support::TestWorkspace::new();
    workspace.write_file(TOKEN_FILE_NAME, "{ not json");
    let provider = CredentialProvider::new(file_source(&workspace), TIMEOUT).expect("provider");

    let err = provider.access_token().await.unwrap_err();
    assert_matches!(err, AuthError::Malformed { .. });
}

#[tokio::test]
async fn source_follows_config() {
    let workspace = support::TestWorkspace::new();
    let config = workspace.config();
    assert_matches!(
        CredentialSource::from_config(&config),
        CredentialSource::TokenFile { .. }
    );

    let inline = workspace.config_with(|cfg| {
        cfg.inline_credentials = Some(InlineCredentials {
            client_id: "id".into(),
            client_secret: "secret".into(),
            refresh_token: "token".into(),
        });
    });
    assert_matches!(
        CredentialSource::from_config(&inline),
        CredentialSource::Inline { .. }
    );
}

#[tokio::test]
async fn token_reply_without_expires_in_gets_default_lifetime() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "access_token": "ya29.x" }).to_string())
        .create_async()
        .await;

    let provider =
        CredentialProvider::new(inline_source(format!("{}/token", server.url())), TIMEOUT)?;
    let credential = provider.credential().await?;

    let expiry = credential.expiry.expect("expiry defaults to one hour");
    let remaining = (expiry - Utc::now()).num_seconds();
    assert!((3590..=3600).contains(&remaining), "remaining {remaining}");
    assert!(!credential.is_expired());
    Ok(())
}
