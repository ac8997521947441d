//! Property tests for the authentication pipeline.

use std::sync::Arc;

use authn::{Authenticate, Authenticator, FixedKeySource, JwksKeySource, JwksOptions, KeySource, PublicKey};
use proptest::prelude::*;
use serde_json::Value;
use test_utils::fixtures::{self, KID_PRIMARY, PRIMARY_EC_KEY};
use test_utils::mocks::MockHttpClient;
use test_utils::{claims_strategy, kid_strategy, malformed_token_strategy};
use tokio_util::sync::CancellationToken;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn fixed_authenticator() -> Authenticator {
    let key = PublicKey::from_pem(PRIMARY_EC_KEY.public_pem.as_bytes()).unwrap();
    Authenticator::new(Arc::new(FixedKeySource::new(key)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_malformed_tokens_are_bad(token in malformed_token_strategy()) {
        let err = runtime()
            .block_on(fixed_authenticator().authenticate(&CancellationToken::new(), &token))
            .unwrap_err();
        prop_assert!(err.is_bad_token());
    }

    #[test]
    fn prop_signed_claims_survive_authentication(claims in claims_strategy()) {
        let token = fixtures::mint_es256(&PRIMARY_EC_KEY, Some(KID_PRIMARY), &Value::Object(claims.clone()));
        let verified = runtime()
            .block_on(fixed_authenticator().authenticate(&CancellationToken::new(), &token))
            .unwrap();
        prop_assert_eq!(verified, claims);
    }

    #[test]
    fn prop_unknown_kids_never_hit_network_without_on_demand(kid in kid_strategy()) {
        prop_assume!(kid != KID_PRIMARY);

        runtime().block_on(async {
            let client = Arc::new(
                MockHttpClient::new().respond(200, fixtures::jwks_json(&[(KID_PRIMARY, &PRIMARY_EC_KEY)])),
            );
            let source = JwksKeySource::new(
                "https://issuer.test/jwks",
                JwksOptions::default().with_client(client.clone()),
            )
            .await
            .unwrap();

            let err = source
                .fetch_public_key(&CancellationToken::new(), &kid)
                .await
                .unwrap_err();
            prop_assert!(err.is_not_found());
            prop_assert_eq!(client.calls(), 1);
            Ok(())
        })?;
    }
}
