//! End-to-end authentication through key sources, parser, and adapter.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use authn::{
    AuthConfig, AuthError, AuthService, Authenticate, Authenticator, ErrorAdapter, ErrorCode,
    FallbackKeySource, FixedKeySource, JwksKeySource, JwksOptions, KeySource, KeySourceError,
    MapKeySource, PostParseHook, PublicKey, ServiceAuthError,
};
use serde_json::{Value, json};
use test_utils::fixtures::{self, KID_PRIMARY, KID_SECONDARY, PRIMARY_EC_KEY, SECONDARY_EC_KEY};
use test_utils::mocks::{MockHttpClient, WarnRecorder};
use tokio_util::sync::CancellationToken;

async fn jwks_source(body: String) -> Arc<JwksKeySource> {
    let client = Arc::new(MockHttpClient::new().respond(200, body));
    Arc::new(
        JwksKeySource::new(
            "https://issuer.test/jwks",
            JwksOptions::default().with_client(client),
        )
        .await
        .unwrap(),
    )
}

fn fixed(key: &fixtures::EcKeyPair) -> Arc<dyn KeySource> {
    Arc::new(FixedKeySource::new(
        PublicKey::from_pem(key.public_pem.as_bytes()).unwrap(),
    ))
}

fn primary_token(claims: &Value) -> String {
    fixtures::mint_es256(&PRIMARY_EC_KEY, Some(KID_PRIMARY), claims)
}

/// Key source that counts lookups before delegating.
struct Counting {
    inner: Arc<dyn KeySource>,
    lookups: AtomicUsize,
}

#[async_trait]
impl KeySource for Counting {
    async fn fetch_public_key(
        &self,
        ctx: &CancellationToken,
        kid: &str,
    ) -> Result<PublicKey, KeySourceError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_public_key(ctx, kid).await
    }
}

#[tokio::test]
async fn test_es256_token_verifies_against_jwks() {
    let keys = jwks_source(fixtures::jwks_json(&[(KID_PRIMARY, &PRIMARY_EC_KEY)])).await;
    let auth = Authenticator::new(keys);

    let claims = auth
        .authenticate(
            &CancellationToken::new(),
            &primary_token(&json!({ "sub": "user-42", "exp": fixtures::now() + 600 })),
        )
        .await
        .unwrap();
    assert_eq!(claims["sub"], "user-42");
}

#[tokio::test]
async fn test_garbage_token_is_bad() {
    let keys = jwks_source(fixtures::jwks_json(&[(KID_PRIMARY, &PRIMARY_EC_KEY)])).await;
    let auth = Authenticator::new(keys);

    let err = auth
        .authenticate(&CancellationToken::new(), "invalid_jwt")
        .await
        .unwrap_err();
    assert!(err.is_bad_token());
    assert!(err.to_string().starts_with("failed to parse token"));
}

#[tokio::test]
async fn test_expired_token_is_not_authenticated() {
    let keys = jwks_source(fixtures::jwks_json(&[(KID_PRIMARY, &PRIMARY_EC_KEY)])).await;
    let auth = Authenticator::new(keys);

    let err = auth
        .authenticate(
            &CancellationToken::new(),
            &primary_token(&json!({ "sub": "user-42", "exp": fixtures::now() - 3600 })),
        )
        .await
        .unwrap_err();
    assert!(err.is_not_authenticated());
}

#[tokio::test]
async fn test_unknown_kid_is_unverifiable() {
    let keys = jwks_source(fixtures::jwks_json(&[(KID_PRIMARY, &PRIMARY_EC_KEY)])).await;
    let auth = Authenticator::new(keys);

    let token = fixtures::mint_es256(&SECONDARY_EC_KEY, Some(KID_SECONDARY), &json!({}));
    let err = auth
        .authenticate(&CancellationToken::new(), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TokenUnverifiable { ref kid } if kid == KID_SECONDARY));
}

#[tokio::test]
async fn test_hook_can_add_claims() {
    let keys = jwks_source(fixtures::jwks_json(&[(KID_PRIMARY, &PRIMARY_EC_KEY)])).await;
    let hook: PostParseHook = Arc::new(|token| {
        token
            .claims
            .insert("custom_claim".to_string(), Value::from("x"));
        Ok(())
    });
    let auth = Authenticator::new(keys).with_hook(hook);

    let claims = auth
        .authenticate(&CancellationToken::new(), &primary_token(&json!({ "sub": "u" })))
        .await
        .unwrap();
    assert_eq!(claims["custom_claim"], "x");
    assert_eq!(claims["sub"], "u");
}

#[tokio::test]
async fn test_fallback_prefers_primary() {
    let jwks = jwks_source(fixtures::jwks_json(&[(KID_PRIMARY, &PRIMARY_EC_KEY)])).await;
    let secondary = Arc::new(Counting {
        inner: fixed(&SECONDARY_EC_KEY),
        lookups: AtomicUsize::new(0),
    });
    let recorder = WarnRecorder::new();
    let keys = FallbackKeySource::new("jwks", jwks, "fixed-key", secondary.clone())
        .with_warn(recorder.sink());

    let auth = Authenticator::new(Arc::new(keys));
    auth.authenticate(&CancellationToken::new(), &primary_token(&json!({})))
        .await
        .unwrap();

    assert_eq!(secondary.lookups.load(Ordering::SeqCst), 0);
    assert!(recorder.messages().is_empty());
}

#[tokio::test]
async fn test_fallback_warns_once_naming_both_sources() {
    let jwks = jwks_source(fixtures::jwks_json(&[(KID_PRIMARY, &PRIMARY_EC_KEY)])).await;
    let recorder = WarnRecorder::new();
    let keys = FallbackKeySource::new("jwks", jwks, "fixed-key", fixed(&SECONDARY_EC_KEY))
        .with_warn(recorder.sink());
    let auth = Authenticator::new(Arc::new(keys));

    let token = fixtures::mint_es256(&SECONDARY_EC_KEY, Some("rotated-out"), &json!({ "sub": "s" }));
    let claims = auth
        .authenticate(&CancellationToken::new(), &token)
        .await
        .unwrap();
    assert_eq!(claims["sub"], "s");

    let warnings = recorder.messages();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("jwks"));
    assert!(warnings[0].contains("fixed-key"));
    assert!(warnings[0].contains("rotated-out"));
}

#[tokio::test]
async fn test_adapter_maps_taxonomy() {
    let keys = Arc::new(MapKeySource::default().with_key(
        KID_PRIMARY,
        PublicKey::from_pem(PRIMARY_EC_KEY.public_pem.as_bytes()).unwrap(),
    ));
    let adapter = ErrorAdapter::new(Authenticator::new(keys));
    let ctx = CancellationToken::new();

    let bad = adapter.authenticate(&ctx, "invalid_jwt").await.unwrap_err();
    assert!(matches!(bad, ServiceAuthError::InvalidToken(_)));

    let expired = adapter
        .authenticate(&ctx, &primary_token(&json!({ "exp": fixtures::now() - 60 })))
        .await
        .unwrap_err();
    assert!(matches!(expired, ServiceAuthError::Unauthenticated(_)));

    let unknown = fixtures::mint_es256(&PRIMARY_EC_KEY, Some("gone"), &json!({}));
    let unverifiable = adapter.authenticate(&ctx, &unknown).await.unwrap_err();
    assert!(matches!(unverifiable, ServiceAuthError::Unauthenticated(_)));
    assert_eq!(unverifiable.code(), ErrorCode::Unauthenticated);
}

#[tokio::test]
async fn test_cancelled_context_surfaces_as_other() {
    let keys = Arc::new(MapKeySource::default());
    let adapter = ErrorAdapter::new(Authenticator::new(keys));
    let ctx = CancellationToken::new();
    ctx.cancel();

    let err = adapter
        .authenticate(&ctx, &primary_token(&json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceAuthError::Other(_)));
    assert!(err.inner().is_cancelled());
    assert_eq!(err.code(), ErrorCode::Cancelled);
}

#[tokio::test]
async fn test_service_keeps_serving_after_shutdown() {
    let mut config = AuthConfig::default();
    config.jwks.endpoint = "https://issuer.test/jwks".to_string();
    config.jwks.request_on_unknown_kid = true;

    let client = Arc::new(
        MockHttpClient::new().respond(200, fixtures::jwks_json(&[(KID_PRIMARY, &PRIMARY_EC_KEY)])),
    );
    let service = AuthService::builder(config)
        .with_http_client(client.clone())
        .build()
        .await
        .unwrap();
    let ctx = CancellationToken::new();

    service.shutdown().await;
    service.shutdown().await;

    let claims = service
        .authenticate(&ctx, &primary_token(&json!({ "sub": "after-stop" })))
        .await
        .unwrap();
    assert_eq!(claims["sub"], "after-stop");

    let unknown = fixtures::mint_es256(&SECONDARY_EC_KEY, Some(KID_SECONDARY), &json!({}));
    let err = service.authenticate(&ctx, &unknown).await.unwrap_err();
    assert!(matches!(err, ServiceAuthError::Unauthenticated(_)));
    assert_eq!(client.calls(), 1);
}
