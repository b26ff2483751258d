pub mod credentials;
pub mod transaction;

pub use credentials::{CredentialRecord, DecryptedCredentials, NewCredentials};
pub use transaction::{PaymentTransaction, TransactionStatus, CURRENCY};
