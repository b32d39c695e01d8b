//! Property tests for the Token Manager.

use aegis_core::{Clock, ManualClock, TokenError};
use aegis_token::{SigningAlgorithm, TokenManager, TokenManagerConfig};
use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use std::sync::Arc;

// 64 bytes, enough for every algorithm
const SECRET_512: &str =
    "a2tra2tra2tra2tra2tra2tra2tra2tra2tra2tra2tra2tra2tra2tra2tra2tra2tra2tra2tra2tra2traw==";

fn start(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn manager(clock: Arc<ManualClock>, ttl_secs: u64, algorithm: SigningAlgorithm) -> TokenManager {
    TokenManager::with_clock(
        TokenManagerConfig::new(SECRET_512)
            .with_ttl(std::time::Duration::from_secs(ttl_secs))
            .with_algorithm(algorithm),
        clock,
    )
    .unwrap()
}

fn algorithm() -> impl Strategy<Value = SigningAlgorithm> {
    prop_oneof![
        Just(SigningAlgorithm::Hs256),
        Just(SigningAlgorithm::Hs384),
        Just(SigningAlgorithm::Hs512),
    ]
}

proptest! {
    #[test]
    fn issue_then_parse_recovers_subject_and_authorities(
        subject in "[a-zA-Z0-9_.@-]{1,32}",
        authorities in proptest::collection::vec("ROLE_[A-Z]{1,10}", 0..6),
        now in 1_000_000_000i64..4_000_000_000i64,
        alg in algorithm(),
    ) {
        let clock = Arc::new(ManualClock::new(start(now)));
        let manager = manager(clock, 3600, alg);

        let token = manager.issue(&subject, &authorities).unwrap();
        let claims = manager.parse(token.value()).unwrap();

        prop_assert_eq!(&claims.sub, &subject);
        prop_assert_eq!(claims.authority_list(), authorities);
    }

    #[test]
    fn token_expires_exactly_past_the_boundary(
        ttl in 1u64..86_400,
        now in 1_000_000_000i64..4_000_000_000i64,
        overshoot_ms in 1i64..5_000,
        subsec_nanos in 0u32..1_000_000_000,
    ) {
        let clock = Arc::new(ManualClock::new(DateTime::from_timestamp(now, subsec_nanos).unwrap()));
        let manager = manager(clock.clone(), ttl, SigningAlgorithm::Hs256);
        let token = manager.issue("admin", &[]).unwrap();
        prop_assert_eq!(manager.parse_token(token.value()).unwrap().expires_at(), token.expires_at());

        clock.set(token.expires_at());
        prop_assert!(manager.validate(&token));
        prop_assert!(manager.parse(token.value()).is_ok());

        clock.advance(Duration::milliseconds(overshoot_ms));
        prop_assert!(!manager.validate(&token));
        prop_assert_eq!(manager.parse(token.value()), Err(TokenError::Expired));
        prop_assert_eq!(manager.refresh(&token), Ok(None));
    }

    #[test]
    fn refresh_yields_later_and_different_token(
        elapsed in 1i64..3600,
        now in 1_000_000_000i64..4_000_000_000i64,
    ) {
        let clock = Arc::new(ManualClock::new(start(now)));
        let manager = manager(clock.clone(), 3600, SigningAlgorithm::Hs256);
        let roles = vec!["ROLE_USER".to_string()];
        let original = manager.issue("user", &roles).unwrap();

        clock.advance(Duration::seconds(elapsed));
        let refreshed = manager.refresh(&original).unwrap().unwrap();

        prop_assert!(refreshed.issued_at() > original.issued_at());
        prop_assert!(refreshed.expires_at() > original.expires_at());
        prop_assert_ne!(refreshed.value(), original.value());
        prop_assert_eq!(refreshed.subject(), original.subject());
        prop_assert_eq!(refreshed.authorities(), roles);
        prop_assert_eq!(clock.now(), refreshed.issued_at());
    }
}

#[test]
fn scenario_admin_round_trip() {
    let clock = Arc::new(ManualClock::new(start(1_750_000_000)));
    let manager = manager(clock.clone(), 3600, SigningAlgorithm::Hs256);
    let authorities = vec!["ROLE_ADMIN".to_string(), "ROLE_USER".to_string()];

    let token = manager.issue("admin", &authorities).unwrap();
    let claims = manager.parse(token.value()).unwrap();

    assert_eq!(claims.sub, "admin");
    assert!(claims.authority_list().contains(&"ROLE_ADMIN".to_string()));
    assert!(claims.authority_list().contains(&"ROLE_USER".to_string()));
    assert!(!token.is_expired_at(clock.now()));
}

#[test]
fn weak_key_fails_initialization() {
    // 16 bytes of 'k'
    let err = TokenManager::new(TokenManagerConfig::new("a2tra2tra2tra2tra2traw==")).unwrap_err();
    let as_config: aegis_core::AegisError = err.into();
    assert!(as_config.is_configuration());
}
