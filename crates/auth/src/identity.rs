//! Caller identity

use uuid::Uuid;

use crate::claims::IdentityClaims;
use crate::error::AuthError;

/// The authenticated caller, as asserted by the identity layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl Identity {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            email: None,
            name: None,
        }
    }
}

impl TryFrom<IdentityClaims> for Identity {
    type Error = AuthError;

    fn try_from(claims: IdentityClaims) -> Result<Self, Self::Error> {
        let user_id = claims
            .sub
            .parse::<Uuid>()
            .map_err(|_| AuthError::InvalidUserId)?;

        Ok(Self {
            user_id,
            email: claims.email,
            name: claims.name,
        })
    }
}
