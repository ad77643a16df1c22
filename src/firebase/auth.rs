use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use super::{
    models::{
        IdTokenRequest, LookupResponse, OobCodeRequest, PasswordRequest, PasswordResponse,
        RefreshRequest, RefreshResponse,
    },
    FirebaseHttp,
};
use crate::backend::{AuthUser, IdentityProvider, TokenGrant};

/// Firebase Authentication over the Identity Toolkit and Secure Token REST APIs.
#[derive(Clone)]
pub struct FirebaseAuth {
    http: FirebaseHttp,
    identity_base_url: String,
    secure_token_base_url: String,
    api_key: String,
}

impl FirebaseAuth {
    pub fn new(
        http: FirebaseHttp,
        identity_base_url: impl Into<String>,
        secure_token_base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            identity_base_url: identity_base_url.into(),
            secure_token_base_url: secure_token_base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// `{identity}/v1/accounts:{method}?key={api_key}`
    fn accounts_url(&self, method: &str) -> String {
        format!(
            "{}/v1/accounts:{method}?key={}",
            self.identity_base_url, self.api_key
        )
    }

    async fn password_call(&self, method: &str, email: &str, password: &str) -> Result<AuthUser> {
        let body = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        let resp: PasswordResponse = self
            .http
            .execute_json(
                method,
                "",
                self.http.client().post(self.accounts_url(method)).json(&body),
            )
            .await?;

        Ok(AuthUser {
            expires_in: resp.expires_in_secs()?,
            email: if resp.email.is_empty() { email.to_owned() } else { resp.email },
            uid: resp.local_id,
            id_token: resp.id_token,
            refresh_token: resp.refresh_token,
        })
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser> {
        debug!(email = %email, "Signing in with password");
        self.password_call("signInWithPassword", email, password).await
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<AuthUser> {
        info!(email = %email, "Creating account");
        self.password_call("signUp", email, password).await
    }

    async fn email_verified(&self, id_token: &str) -> Result<bool> {
        let resp: LookupResponse = self
            .http
            .execute_json(
                "lookup",
                "",
                self.http
                    .client()
                    .post(self.accounts_url("lookup"))
                    .json(&IdTokenRequest { id_token }),
            )
            .await?;

        let user = resp
            .users
            .first()
            .context("account lookup returned no user")?;
        debug!(uid = %user.local_id, verified = user.email_verified, "Looked up account");
        Ok(user.email_verified)
    }

    async fn send_email_verification(&self, id_token: &str) -> Result<()> {
        let body = OobCodeRequest {
            request_type: "VERIFY_EMAIL",
            id_token,
        };
        self.http
            .execute(
                "send_oob_code",
                "",
                self.http.client().post(self.accounts_url("sendOobCode")).json(&body),
            )
            .await?;
        Ok(())
    }

    async fn delete_account(&self, id_token: &str) -> Result<()> {
        self.http
            .execute(
                "delete",
                "",
                self.http
                    .client()
                    .post(self.accounts_url("delete"))
                    .json(&IdTokenRequest { id_token }),
            )
            .await?;
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant> {
        let url = format!("{}/v1/token?key={}", self.secure_token_base_url, self.api_key);
        let body = RefreshRequest {
            grant_type: "refresh_token",
            refresh_token,
        };
        let resp: RefreshResponse = self
            .http
            .execute_json("refresh", "", self.http.client().post(url).json(&body))
            .await?;

        Ok(TokenGrant {
            expires_in: resp.expires_in_secs()?,
            id_token: resp.id_token,
            refresh_token: resp.refresh_token,
        })
    }
}
