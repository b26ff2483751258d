//! M-Pesa credential record entity.
//!
//! One active record per (tenant, environment). Secrets live encrypted at
//! rest; rotation writes a new row and logically deactivates the old one.

use crate::config::profiles::MpesaEnvironment;
use crate::crypto::{CodecError, CredentialCodec};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Credential record as stored, secrets still encrypted.
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub environment: MpesaEnvironment,
    pub business_short_code: String,
    pub consumer_key_enc: String,
    pub consumer_secret_enc: String,
    pub passkey_enc: String,
    pub callback_url: String,
    pub key_version: i16,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Credential secrets in the clear, decrypted on demand for request
/// building and never persisted.
#[derive(Debug, Clone)]
pub struct DecryptedCredentials {
    pub business_short_code: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub passkey: String,
    pub callback_url: String,
}

/// Plaintext input when a tenant saves or rotates credentials.
#[derive(Debug)]
pub struct NewCredentials {
    pub tenant_id: Uuid,
    pub environment: MpesaEnvironment,
    pub business_short_code: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub passkey: String,
    pub callback_url: String,
}

impl CredentialRecord {
    pub fn decrypt(&self, codec: &CredentialCodec) -> Result<DecryptedCredentials, CodecError> {
        Ok(DecryptedCredentials {
            business_short_code: self.business_short_code.clone(),
            consumer_key: codec.decrypt(&self.consumer_key_enc)?,
            consumer_secret: codec.decrypt(&self.consumer_secret_enc)?,
            passkey: codec.decrypt(&self.passkey_enc)?,
            callback_url: self.callback_url.clone(),
        })
    }
}

impl NewCredentials {
    /// Encrypts the three secrets into a storable record.
    pub fn seal(self, codec: &CredentialCodec) -> Result<CredentialRecord, CodecError> {
        let now = Utc::now();
        Ok(CredentialRecord {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            environment: self.environment,
            business_short_code: self.business_short_code,
            consumer_key_enc: codec.encrypt(&self.consumer_key)?,
            consumer_secret_enc: codec.encrypt(&self.consumer_secret)?,
            passkey_enc: codec.encrypt(&self.passkey)?,
            callback_url: self.callback_url,
            key_version: codec.key_version(),
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }
}
