use std::sync::Arc;

use tracing::{error, info, warn};

use crate::{
    backend::{IdentityProvider, ProfileStore},
    error::{MonitorError, MonitorResult},
    models::Profile,
    session::{Session, SessionStore},
};

/// Outcome of a completed sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub uid: String,
    pub profile_id: String,
}

/// Sign-in, sign-up and sign-out flows on top of the identity provider.
pub struct AccountService {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    session: SessionStore,
}

impl AccountService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
        session: SessionStore,
    ) -> Self {
        Self {
            identity,
            profiles,
            session,
        }
    }

    /// Exchanges credentials and starts a session only if the address is
    /// verified. An unverified account leaves nobody signed in.
    pub async fn sign_in(&self, email: &str, password: &str) -> MonitorResult<Session> {
        require("Email", email)?;
        require("Password", password)?;

        let user = self.identity.sign_in(email, password).await?;

        if !self.identity.email_verified(&user.id_token).await? {
            self.session.clear().await;
            warn!(uid = %user.uid, "Sign-in refused: e-mail not verified");
            return Err(MonitorError::VerificationRequired);
        }

        self.session.start(&user).await;
        info!(uid = %user.uid, "Signed in");
        self.session.current().await.ok_or(MonitorError::NotSignedIn)
    }

    /// Creates the account, writes the profile document, then sends the
    /// verification e-mail.
    ///
    /// If the profile write fails the new account is deleted again and the
    /// profile error is returned. A failed verification e-mail is reported
    /// but leaves account and profile in place.
    pub async fn sign_up(&self, profile: &Profile, password: &str) -> MonitorResult<Registration> {
        require("Name", &profile.name)?;
        require("Surname", &profile.surname)?;
        require("Plant", &profile.plant)?;
        require("Email", &profile.email)?;
        require("Password", password)?;

        let user = self.identity.create_account(&profile.email, password).await?;

        let profile_id = match self.profiles.create_profile(&user.id_token, profile).await {
            Ok(id) => id,
            Err(e) => {
                warn!(uid = %user.uid, error = %e, "Profile write failed; deleting new account");
                if let Err(del) = self.identity.delete_account(&user.id_token).await {
                    error!(uid = %user.uid, error = %del, "Failed to delete orphaned account");
                }
                return Err(e.into());
            }
        };

        self.identity.send_email_verification(&user.id_token).await?;
        info!(uid = %user.uid, profile = %profile_id, "Account registered; verification e-mail sent");

        Ok(Registration {
            uid: user.uid,
            profile_id,
        })
    }

    pub async fn sign_out(&self) {
        self.session.clear().await;
    }

    /// Sends a fresh verification e-mail for an account that cannot sign in
    /// yet. Leaves nobody signed in.
    pub async fn resend_verification(&self, email: &str, password: &str) -> MonitorResult<()> {
        require("Email", email)?;
        require("Password", password)?;

        let user = self.identity.sign_in(email, password).await?;
        self.identity.send_email_verification(&user.id_token).await?;
        info!(uid = %user.uid, "Verification e-mail re-sent");
        Ok(())
    }
}

fn require(field: &'static str, value: &str) -> MonitorResult<()> {
    if value.trim().is_empty() {
        return Err(MonitorError::MissingField(field));
    }
    Ok(())
}
