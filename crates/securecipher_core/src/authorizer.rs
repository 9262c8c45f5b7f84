//! Transaction authorization: client signature check followed by the server counter-signature
//!
//! Each attempt runs `Pending -> ClientVerified -> CoSigned`, or ends in
//! `Rejected` at the first failed step. There are no retries: the pending
//! transaction is consumed, and a caller that wants to try again must submit
//! a fresh payload and signature.

use crate::impls::{EcdsaP384Verifier, P384KeyValidator};
use crate::issuer::{issue_keypair, Keypair};
use crate::traits::{KeyGenerationError, KeyValidator, SignatureVerifier};
use crate::types::{CoSignedTransaction, EncodedPublicKey, EncodedSignature, TransactionPayload};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    InvalidClientKey,
    InvalidClientSignature,
    /// The server could not produce its counter-signature
    ServerSigningFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationState {
    Pending,
    ClientVerified,
    CoSigned,
    Rejected(RejectionReason),
}

/// Terminal failure of an authorization attempt.
///
/// The display text is the same for every reason so that nothing user-facing
/// reveals which check failed. The reason is for the caller and for logs.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("transaction rejected")]
pub struct Rejection {
    reason: RejectionReason,
}

impl Rejection {
    pub fn reason(&self) -> RejectionReason {
        self.reason
    }
}

/// Client submission awaiting authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    payload: TransactionPayload,
    client_key: EncodedPublicKey,
    client_signature: EncodedSignature,
}

impl PendingTransaction {
    pub fn new(
        payload: TransactionPayload,
        client_key: EncodedPublicKey,
        client_signature: EncodedSignature,
    ) -> Self {
        Self {
            payload,
            client_key,
            client_signature,
        }
    }

    pub fn payload(&self) -> &TransactionPayload {
        &self.payload
    }

    pub fn client_key(&self) -> &EncodedPublicKey {
        &self.client_key
    }

    pub fn client_signature(&self) -> &EncodedSignature {
        &self.client_signature
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    CoSigned(CoSignedTransaction),
    Rejected(Rejection),
}

impl AuthorizationOutcome {
    pub fn state(&self) -> AuthorizationState {
        match self {
            Self::CoSigned(_) => AuthorizationState::CoSigned,
            Self::Rejected(rejection) => AuthorizationState::Rejected(rejection.reason),
        }
    }

    pub fn is_co_signed(&self) -> bool {
        matches!(self, Self::CoSigned(_))
    }

    pub fn into_result(self) -> Result<CoSignedTransaction, Rejection> {
        match self {
            Self::CoSigned(record) => Ok(record),
            Self::Rejected(rejection) => Err(rejection),
        }
    }
}

/// Composition root for co-signing
#[derive(Debug, Clone, Default)]
pub struct TransactionAuthorizer<V = P384KeyValidator, S = EcdsaP384Verifier> {
    validator: V,
    verifier: S,
}

impl TransactionAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<V: KeyValidator, S: SignatureVerifier> TransactionAuthorizer<V, S> {
    pub fn with_components(validator: V, verifier: S) -> Self {
        Self {
            validator,
            verifier,
        }
    }

    /// Evaluate one attempt with the server's signing identity
    pub fn authorize(&self, pending: PendingTransaction, server: &Keypair) -> AuthorizationOutcome {
        let mut state = AuthorizationState::Pending;
        let payload_id = pending.payload.digest_hex();

        if !self.validator.validate(&pending.client_key) {
            return reject(&payload_id, RejectionReason::InvalidClientKey);
        }

        if !self.verifier.verify(
            &pending.client_signature,
            pending.payload.as_bytes(),
            &pending.client_key,
        ) {
            return reject(&payload_id, RejectionReason::InvalidClientSignature);
        }

        state = advance(&payload_id, state, AuthorizationState::ClientVerified);

        let server_signature = match server.sign(pending.payload.as_bytes()) {
            Ok(signature) => signature,
            Err(_) => return reject(&payload_id, RejectionReason::ServerSigningFailed),
        };

        let PendingTransaction {
            payload,
            client_key,
            client_signature,
        } = pending;
        let record = CoSignedTransaction::new(
            client_key,
            client_signature,
            server.public_key(),
            server_signature,
            payload,
        );

        advance(&payload_id, state, AuthorizationState::CoSigned);
        tracing::info!(id = %payload_id, "transaction co-signed");
        AuthorizationOutcome::CoSigned(record)
    }

    /// Co-sign with a keypair issued for this transaction alone.
    ///
    /// The private scalar is dropped (and zeroized) before returning; the
    /// record carries the matching `q_s`.
    pub fn authorize_with_ephemeral_key(
        &self,
        pending: PendingTransaction,
    ) -> Result<AuthorizationOutcome, KeyGenerationError> {
        let (server, _) = issue_keypair()?;
        Ok(self.authorize(pending, &server))
    }
}

fn advance(
    payload_id: &str,
    from: AuthorizationState,
    to: AuthorizationState,
) -> AuthorizationState {
    tracing::debug!(id = %payload_id, ?from, ?to, "authorization state change");
    to
}

fn reject(payload_id: &str, reason: RejectionReason) -> AuthorizationOutcome {
    tracing::debug!(id = %payload_id, ?reason, "rejection reason");
    tracing::info!(id = %payload_id, "transaction rejected");
    AuthorizationOutcome::Rejected(Rejection { reason })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Amount, TransactionFields};
    use std::cell::Cell;
    use std::sync::{Arc, Mutex};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    fn payload(amount: &str) -> TransactionPayload {
        let amount: Amount = amount.parse().unwrap();
        TransactionPayload::from_fields(&TransactionFields::new(amount, "VX-8012345678")).unwrap()
    }

    fn signed_pending(payload: TransactionPayload) -> (PendingTransaction, Keypair) {
        let (client, client_key) = issue_keypair().expect("Failed to generate client keypair");
        let signature = client.sign(payload.as_bytes()).unwrap();
        (PendingTransaction::new(payload, client_key, signature), client)
    }

    #[derive(Default)]
    struct CountingVerifier {
        calls: Cell<usize>,
    }

    impl SignatureVerifier for CountingVerifier {
        fn verify(&self, _: &EncodedSignature, _: &[u8], _: &EncodedPublicKey) -> bool {
            self.calls.set(self.calls.get() + 1);
            true
        }
    }

    struct RejectAll;

    impl KeyValidator for RejectAll {
        fn validate(&self, _: &EncodedPublicKey) -> bool {
            false
        }
    }

    #[test]
    fn test_valid_transaction_is_co_signed() {
        let (server, server_key) = issue_keypair().unwrap();
        let (pending, _client) = signed_pending(payload("1500.00"));
        let expected = pending.clone();

        let outcome = TransactionAuthorizer::new().authorize(pending, &server);
        assert_eq!(outcome.state(), AuthorizationState::CoSigned);

        let record = outcome.into_result().expect("should be co-signed");
        assert_eq!(record.client_key(), expected.client_key());
        assert_eq!(record.client_signature(), expected.client_signature());
        assert_eq!(record.server_key(), &server_key);
        assert_eq!(record.payload(), expected.payload());
        assert_eq!(record.id(), expected.payload().digest_hex());

        assert!(EcdsaP384Verifier.verify(
            record.server_signature(),
            record.payload().as_bytes(),
            &server_key
        ));
        assert!(record.verify_signatures(&EcdsaP384Verifier));
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let (server, _) = issue_keypair().unwrap();
        let (pending, _client) = signed_pending(payload("1500.00"));

        let mut bytes = pending.payload().as_bytes().to_vec();
        let idx = bytes.iter().position(|&b| b == b'1').unwrap();
        bytes[idx] = b'9';
        let tampered = PendingTransaction::new(
            TransactionPayload::from_bytes(bytes),
            pending.client_key().clone(),
            pending.client_signature().clone(),
        );

        let outcome = TransactionAuthorizer::new().authorize(tampered, &server);
        assert_eq!(
            outcome.state(),
            AuthorizationState::Rejected(RejectionReason::InvalidClientSignature)
        );
    }

    #[test]
    fn test_invalid_client_key_is_rejected() {
        let (server, _) = issue_keypair().unwrap();
        let (pending, _client) = signed_pending(payload("10"));
        let mut key = pending.client_key().clone();
        key.y = key.x.clone();

        let outcome = TransactionAuthorizer::new().authorize(
            PendingTransaction::new(pending.payload().clone(), key, pending.client_signature().clone()),
            &server,
        );
        assert_eq!(
            outcome.state(),
            AuthorizationState::Rejected(RejectionReason::InvalidClientKey)
        );
    }

    #[test]
    fn test_signature_from_other_key_is_rejected() {
        let (server, _) = issue_keypair().unwrap();
        let (pending, _client) = signed_pending(payload("10"));
        let (_, other_key) = issue_keypair().unwrap();

        let outcome = TransactionAuthorizer::new().authorize(
            PendingTransaction::new(
                pending.payload().clone(),
                other_key,
                pending.client_signature().clone(),
            ),
            &server,
        );
        assert_eq!(
            outcome.state(),
            AuthorizationState::Rejected(RejectionReason::InvalidClientSignature)
        );
    }

    #[test]
    fn test_key_check_runs_before_signature_check() {
        let (server, _) = issue_keypair().unwrap();
        let (pending, _client) = signed_pending(payload("10"));
        let verifier = CountingVerifier::default();
        let authorizer = TransactionAuthorizer::with_components(RejectAll, verifier);

        let outcome = authorizer.authorize(pending, &server);
        assert_eq!(
            outcome.state(),
            AuthorizationState::Rejected(RejectionReason::InvalidClientKey)
        );
        assert_eq!(authorizer.verifier.calls.get(), 0);
    }

    #[test]
    fn test_rejection_message_is_generic() {
        let key = Rejection {
            reason: RejectionReason::InvalidClientKey,
        };
        let signature = Rejection {
            reason: RejectionReason::InvalidClientSignature,
        };
        assert_eq!(key.to_string(), signature.to_string());
        assert_eq!(key.to_string(), "transaction rejected");
    }

    #[test]
    fn test_ephemeral_server_key() {
        let (pending, _client) = signed_pending(payload("42.10"));
        let outcome = TransactionAuthorizer::new()
            .authorize_with_ephemeral_key(pending)
            .expect("entropy should be available");

        let record = outcome.into_result().expect("should be co-signed");
        assert!(record.verify_signatures(&EcdsaP384Verifier));
    }

    #[derive(Clone, Default)]
    struct CapturedEvents(Arc<Mutex<Vec<(Level, Vec<&'static str>)>>>);

    impl<S: Subscriber> Layer<S> for CapturedEvents {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let fields = event.fields().map(|field| field.name()).collect();
            self.0.lock().unwrap().push((*event.metadata().level(), fields));
        }
    }

    #[test]
    fn test_rejection_reason_only_logged_at_debug() {
        let events = CapturedEvents::default();
        let subscriber = tracing_subscriber::registry().with(events.clone());

        let (server, _) = issue_keypair().unwrap();
        let (pending, _client) = signed_pending(payload("10.00"));
        let tampered = PendingTransaction::new(
            payload("10.01"),
            pending.client_key().clone(),
            pending.client_signature().clone(),
        );
        let outcome = tracing::subscriber::with_default(subscriber, || {
            TransactionAuthorizer::new().authorize(tampered, &server)
        });
        assert!(!outcome.is_co_signed());

        let events = events.0.lock().unwrap();
        let with_reason: Vec<_> = events
            .iter()
            .filter(|(_, fields)| fields.contains(&"reason"))
            .collect();
        assert!(!with_reason.is_empty());
        assert!(with_reason.iter().all(|(level, _)| *level == Level::DEBUG));
        assert!(events
            .iter()
            .any(|(level, fields)| *level == Level::INFO && !fields.contains(&"reason")));
    }
}
