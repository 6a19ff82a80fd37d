//! End-to-end enrollment through the endpoint registry.

mod common;

use std::time::Duration;

use certenroll::api::{Operation, RequestParts, Response};
use certenroll::api::cert::same_name;
use certenroll::commons::error::{Error, ErrorKind};
use certenroll::service::CallContext;
use certenroll::signing::{KeyAlgorithm, Signer, Validity};

use common::TestAuthority;

#[tokio::test]
async fn health_is_reported() {
    let ta = TestAuthority::new();
    match ta.handle(RequestParts::new(Operation::Health)).await.unwrap() {
        Response::Health(res) => assert!(res.healthy),
        other => panic!("unexpected response: {:?}", other),
    }
}

#[tokio::test]
async fn enroll_issues_certificate_for_csr() {
    let ta = TestAuthority::new();
    let (csr, _) = common::csr("example");

    let cert = common::issued(ta.handle(common::enroll("default", &csr)).await.unwrap());
    assert_eq!(cert.subject_text(), "CN=example");
    assert_eq!(cert.public_key_der().unwrap(), csr.public_key_der().unwrap());

    // The empty profile selects the default one.
    let cert = common::issued(ta.handle(common::enroll("", &csr)).await.unwrap());
    assert!(cert.is_signed_by(&ta.ca_signer("default").issuer().clone()));
}

#[tokio::test]
async fn enroll_with_unknown_profile_fails() {
    let ta = TestAuthority::new();
    let (csr, _) = common::csr("example");

    let err = ta.handle(common::enroll("nonexistent", &csr)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProfileNotFound);
    assert_eq!(err.to_error_response().label, "profile-not-found");
}

#[tokio::test]
async fn unparseable_csr_is_rejected() {
    let ta = TestAuthority::new();
    let parts = RequestParts::new(Operation::Enroll)
        .with_aps("default")
        .with_csr(&b"-----BEGIN CERTIFICATE REQUEST-----\nnonsense\n"[..]);
    let err = ta.handle(parts).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CsrInvalid);

    let err = ta.handle(RequestParts::new(Operation::ServerKeyGen)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedRequest);
}

#[tokio::test]
async fn enroll_without_proof_of_possession_fails() {
    let ta = TestAuthority::new();
    let csr = common::tampered_csr("example");

    let err = ta.handle(common::enroll("default", &csr)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CsrInvalid);
    assert_eq!(err.to_error_response().label, "csr-invalid");
}

#[tokio::test]
async fn enroll_with_weak_key_fails() {
    let ta = TestAuthority::new();

    let weak = common::rsa_csr("example", 1024);
    let err = ta.handle(common::enroll("default", &weak)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CsrInvalid);

    let strong = common::rsa_csr("example", 2048);
    let cert = common::issued(ta.handle(common::enroll("default", &strong)).await.unwrap());
    assert_eq!(cert.public_key_der().unwrap(), strong.public_key_der().unwrap());
}

#[tokio::test]
async fn ca_certificate_is_no_credential() {
    let ta = TestAuthority::new();
    let ca = match ta.handle(RequestParts::new(Operation::GetCas)).await.unwrap() {
        Response::GetCas(res) => res.certs[0].clone(),
        other => panic!("unexpected response: {:?}", other),
    };
    let (csr, _) = common::csr(&ca.common_name().unwrap());

    let err = ta.handle(common::reenroll("default", &ca, &csr)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthenticationInvalid);

    let err = ta.handle(common::enroll("default", &csr)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CsrInvalid);
}

#[tokio::test]
async fn reenroll_with_expired_certificate_fails() {
    let ta = TestAuthority::new();
    let (csr, _) = common::csr("example");
    let expired = ta.issue_expired("default", &csr);

    let err = ta
        .handle(common::reenroll("default", &expired, &csr))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthenticationExpired);
}

#[tokio::test]
async fn reenroll_keeps_subject() {
    let ta = TestAuthority::new();
    let (csr, _) = common::csr("example");
    let current = common::issued(ta.handle(common::enroll("default", &csr)).await.unwrap());

    let (renewal, _) = common::csr("example");
    let renewed = common::issued(
        ta.handle(common::reenroll("default", &current, &renewal))
            .await
            .unwrap(),
    );
    assert!(same_name(renewed.subject(), current.subject()));
    assert_eq!(renewed.public_key_der().unwrap(), renewal.public_key_der().unwrap());

    let (other, _) = common::csr("intruder");
    let err = ta
        .handle(common::reenroll("default", &current, &other))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SubjectMismatch);
}

#[tokio::test]
async fn reenroll_with_foreign_certificate_fails() {
    let ta = TestAuthority::new();
    let other = TestAuthority::new();
    let (csr, _) = common::csr("example");
    let foreign = other.issue("default", &csr, Validity::days_from_now(1));

    let err = ta
        .handle(common::reenroll("default", &foreign, &csr))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthenticationInvalid);
}

#[tokio::test]
async fn server_keygen_returns_matching_key() {
    let ta = TestAuthority::with_profiles(vec![common::keygen_profile(
        "devices",
        KeyAlgorithm::EcP384,
    )]);
    let (csr, _) = common::csr("device-1");

    let err = ta.handle(common::server_keygen("default", &csr)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthorizationDenied);

    match ta.handle(common::server_keygen("devices", &csr)).await.unwrap() {
        Response::ServerKeyGen(res) => {
            let key = res.key.to_pkey().unwrap();
            assert!(res.cert.public_key().unwrap().public_eq(&key));
            assert_eq!(res.cert.subject_text(), "CN=device-1");
            assert_eq!(key.bits(), 384);
        }
        other => panic!("unexpected response: {:?}", other),
    }
}

#[tokio::test]
async fn server_keygen_keys_are_never_shared() {
    let ta = TestAuthority::with_profiles(vec![common::keygen_profile(
        "devices",
        KeyAlgorithm::EcP256,
    )]);

    let mut calls = Vec::new();
    for i in 0..8 {
        let endpoints = ta.endpoints.clone();
        let (csr, _) = common::csr(&format!("device-{}", i));
        let parts = common::server_keygen("devices", &csr);
        calls.push(tokio::spawn(async move {
            endpoints.handle(&CallContext::new(), parts).await
        }));
    }

    let mut keys = Vec::new();
    for call in calls {
        match call.await.unwrap().unwrap() {
            Response::ServerKeyGen(res) => {
                let key = res.key.to_pkey().unwrap();
                assert!(res.cert.public_key().unwrap().public_eq(&key));
                keys.push(res.key.der().to_vec());
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 8);
}

#[tokio::test]
async fn ca_certs_are_stable() {
    let ta = TestAuthority::new();
    let get = || RequestParts::new(Operation::GetCas).with_aps("default");

    let first = match ta.handle(get()).await.unwrap() {
        Response::GetCas(res) => res.certs,
        other => panic!("unexpected response: {:?}", other),
    };
    let second = match ta.handle(get()).await.unwrap() {
        Response::GetCas(res) => res.certs,
        other => panic!("unexpected response: {:?}", other),
    };
    assert_eq!(first.len(), 1);
    let first: Vec<_> = first.iter().map(|c| c.to_der().unwrap()).collect();
    let second: Vec<_> = second.iter().map(|c| c.to_der().unwrap()).collect();
    assert_eq!(first, second);

    let err = ta
        .handle(RequestParts::new(Operation::GetCas).with_aps("nonexistent"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProfileNotFound);
}

#[tokio::test]
async fn ended_contexts_end_calls() {
    let ta = TestAuthority::new();
    let (csr, _) = common::csr("example");

    let ctx = CallContext::new();
    ctx.cancel();
    let err = ta
        .endpoints
        .handle(&ctx, common::enroll("default", &csr))
        .await
        .unwrap_err();
    assert_eq!(err, Error::Cancelled);
    assert!(err.kind().is_retryable());

    let ctx = CallContext::with_timeout(Duration::ZERO);
    let err = ta
        .endpoints
        .handle(&ctx, common::enroll("default", &csr))
        .await
        .unwrap_err();
    assert_eq!(err, Error::DeadlineExceeded);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_enrollments() {
    let ta = TestAuthority::new();

    let mut calls = Vec::new();
    for i in 0..16 {
        let endpoints = ta.endpoints.clone();
        let name = format!("client-{}", i);
        calls.push(tokio::spawn(async move {
            let (csr, _) = common::csr(&name);
            let cert = common::issued(
                endpoints
                    .handle(&CallContext::new(), common::enroll("default", &csr))
                    .await
                    .unwrap(),
            );
            (name, cert)
        }));
    }

    let mut serials = Vec::new();
    for call in calls {
        let (name, cert) = call.await.unwrap();
        assert_eq!(cert.subject_text(), format!("CN={}", name));
        serials.push(cert.serial_hex().unwrap());
    }
    serials.sort();
    serials.dedup();
    assert_eq!(serials.len(), 16);
}
