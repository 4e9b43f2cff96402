//! Development auth stand-in. Session issuance and verification live in an
//! external service; the gateway only consumes the [`Auth`] contract, and
//! this implementation satisfies it for single-user local deployments.

use async_trait::async_trait;
use loreweaver_core::config::AuthConfig;
use loreweaver_core::{Auth, AuthError, CurrentUser};

/// Resolves every non-empty bearer token to one configured local identity.
/// A missing token is still rejected, so the 401 path stays exercised.
#[derive(Debug, Clone)]
pub struct SingleUserAuth {
    user: CurrentUser,
}

impl SingleUserAuth {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            user: CurrentUser {
                user_id: config.user_id.clone(),
                email: config.email.clone(),
            },
        }
    }
}

#[async_trait]
impl Auth for SingleUserAuth {
    async fn current_user(&self, bearer_token: Option<&str>) -> Result<CurrentUser, AuthError> {
        match bearer_token {
            Some(token) if !token.is_empty() => Ok(self.user.clone()),
            _ => Err(AuthError::InvalidToken),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> SingleUserAuth {
        SingleUserAuth::new(&AuthConfig::default())
    }

    #[tokio::test]
    async fn any_token_resolves_to_the_configured_user() {
        let user = auth().current_user(Some("dev-token")).await.unwrap();
        assert_eq!(user.user_id, "local-user");
    }

    #[tokio::test]
    async fn missing_or_empty_token_is_rejected() {
        assert!(auth().current_user(None).await.is_err());
        assert!(auth().current_user(Some("")).await.is_err());
    }
}
