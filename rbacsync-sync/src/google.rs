//! Google Admin SDK Directory client.
//!
//! Authenticates with a service account key using domain-wide delegation:
//! a signed JWT naming the admin user as subject is exchanged for an access
//! token at the key's `token_uri`, then `members.list` is paged through for
//! each group.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use rbacsync_core::GroupId;

use crate::error::ResolveError;
use crate::resolver::{DirectoryClient, DirectoryMember};

pub const DIRECTORY_API: &str = "https://admin.googleapis.com/admin/directory/v1";
pub const DIRECTORY_SCOPES: &str = "https://www.googleapis.com/auth/admin.directory.group.member.readonly https://www.googleapis.com/auth/admin.directory.group.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME: Duration = Duration::hours(1);
/// Refresh this long before the token actually expires.
const TOKEN_SLACK: Duration = Duration::seconds(60);

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: String,
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    sub: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MembersPage {
    #[serde(default)]
    members: Vec<ApiMember>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMember {
    #[serde(default)]
    email: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

pub struct GoogleDirectory {
    http: reqwest::Client,
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    admin_user: String,
    api_base: String,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleDirectory {
    pub fn new(
        key: ServiceAccountKey,
        admin_user: impl Into<String>,
    ) -> Result<Self, ResolveError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        Ok(Self {
            http: reqwest::Client::new(),
            key,
            signing_key,
            admin_user: admin_user.into(),
            api_base: DIRECTORY_API.to_string(),
            token: Mutex::new(None),
        })
    }

    /// Read a service account JSON key file.
    pub fn from_key_file(path: &Path, admin_user: &str) -> Result<Self, ResolveError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ResolveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let key: ServiceAccountKey =
            serde_json::from_str(&contents).map_err(|source| ResolveError::InvalidKey {
                path: path.to_path_buf(),
                source,
            })?;
        Self::new(key, admin_user)
    }

    /// Point the client at a different API root.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn signed_assertion(&self, now: DateTime<Utc>) -> Result<String, ResolveError> {
        let claims = Claims {
            iss: &self.key.client_email,
            sub: &self.admin_user,
            scope: DIRECTORY_SCOPES,
            aud: &self.key.token_uri,
            iat: now.timestamp(),
            exp: (now + TOKEN_LIFETIME).timestamp(),
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.signing_key,
        )?)
    }

    async fn access_token(&self) -> Result<String, ResolveError> {
        let mut cached = self.token.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref() {
            if token.expires_at - TOKEN_SLACK > now {
                return Ok(token.value.clone());
            }
        }

        let assertion = self.signed_assertion(now)?;
        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        let response = check_status(response, "token exchange").await?;
        let token: TokenResponse = response.json().await?;

        let lifetime = token
            .expires_in
            .map(Duration::seconds)
            .unwrap_or(TOKEN_LIFETIME);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: now + lifetime,
        });
        tracing::debug!(admin_user = %self.admin_user, "refreshed directory access token");
        Ok(token.access_token)
    }
}

#[async_trait]
impl DirectoryClient for GoogleDirectory {
    async fn list_members(&self, group: &GroupId) -> Result<Vec<DirectoryMember>, ResolveError> {
        let token = self.access_token().await?;
        let url = members_url(&self.api_base, group)?;

        let mut members = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.http.get(url.clone()).bearer_auth(&token);
            if let Some(page) = &page_token {
                request = request.query(&[("pageToken", page.as_str())]);
            }
            let response = request.send().await?;
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(ResolveError::GroupNotFound(group.clone()));
            }
            let page: MembersPage = check_status(response, &format!("group {group}"))
                .await?
                .json()
                .await?;

            members.extend(page.members.into_iter().filter_map(into_member));

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }
        Ok(members)
    }
}

/// `{api_base}/groups/{group}/members` with the group id escaped as a
/// single path segment.
fn members_url(api_base: &str, group: &GroupId) -> Result<reqwest::Url, ResolveError> {
    let mut url = reqwest::Url::parse(api_base)
        .map_err(|e| ResolveError::InvalidApiBase(format!("{api_base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| ResolveError::InvalidApiBase(api_base.to_string()))?
        .pop_if_empty()
        .extend(["groups", group.0.as_str(), "members"]);
    Ok(url)
}

/// Users and nested groups only; whole-domain (`CUSTOMER`) entries and
/// entries without an address carry no identity to bind.
fn into_member(member: ApiMember) -> Option<DirectoryMember> {
    let email = member.email.filter(|e| !e.is_empty())?;
    match member.kind.as_deref() {
        Some("GROUP") => Some(DirectoryMember::group(email)),
        Some("CUSTOMER") => None,
        _ => Some(DirectoryMember::user(email)),
    }
}

async fn check_status(
    response: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response, ResolveError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ResolveError::Status {
        status: status.as_u16(),
        what: what.to_string(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn members_url_escapes_the_group_id() {
        let url = members_url(DIRECTORY_API, &GroupId::from("dev/ops#1?@example.com"))
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://admin.googleapis.com/admin/directory/v1/groups/dev%2Fops%231%3F@example.com/members"
        );
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
    }

    #[test]
    fn members_url_handles_a_trailing_slash() {
        let url = members_url("http://127.0.0.1:8080/", &GroupId::from("eng@example.com"))
            .expect("url");
        assert_eq!(url.path(), "/groups/eng@example.com/members");
    }

    #[test]
    fn unparseable_api_base_is_rejected() {
        let err = members_url("not a url", &GroupId::from("eng@example.com")).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidApiBase(_)));
    }

    #[test]
    fn member_types_map_to_kinds() {
        let page: MembersPage = serde_json::from_str(
            r#"{
                "members": [
                    {"email": "alice@example.com", "type": "USER"},
                    {"email": "eng@example.com", "type": "GROUP"},
                    {"type": "CUSTOMER", "id": "C0123"},
                    {"email": "svc@example.com"}
                ],
                "nextPageToken": "abc"
            }"#,
        )
        .expect("parse page");

        assert_eq!(page.next_page_token.as_deref(), Some("abc"));
        let members: Vec<_> = page.members.into_iter().filter_map(into_member).collect();
        assert_eq!(
            members,
            vec![
                DirectoryMember::user("alice@example.com"),
                DirectoryMember::group("eng@example.com"),
                DirectoryMember::user("svc@example.com"),
            ]
        );
    }

    #[test]
    fn empty_group_page_has_no_members() {
        let page: MembersPage = serde_json::from_str(r#"{"kind": "admin#directory#members"}"#)
            .expect("parse page");
        assert!(page.members.is_empty());
        assert!(page.next_page_token.is_none());
    }
}
