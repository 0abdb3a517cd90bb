//! Integration tests for context-bound cipher sessions.

use std::thread;

use crypttool::crypto::{CipherSession, Key};
use crypttool::errors::CryptError;

#[test]
fn one_key_set_backs_many_sessions() {
    let private = Key::generate();
    let public = private.public_key();
    let keys = vec![private];

    let envelopes: Vec<(String, String)> = ["paas-a", "paas-b", "paas-c"]
        .iter()
        .map(|name| {
            let session = CipherSession::new(*name, &[], Some(&public)).unwrap();
            (name.to_string(), session.encrypt(name.as_bytes()).unwrap())
        })
        .collect();

    for (name, envelope) in &envelopes {
        let session = CipherSession::for_decryption(name.as_str(), &keys).unwrap();
        assert_eq!(session.decrypt(envelope).unwrap().as_slice(), name.as_bytes());
    }
}

#[test]
fn sessions_share_keys_across_threads() {
    let private = Key::generate();
    let public = private.public_key();
    let keys = vec![private];

    thread::scope(|scope| {
        for i in 0..4 {
            let keys = &keys;
            let public = &public;
            scope.spawn(move || {
                let context = format!("paas-{i}");
                let session = CipherSession::new(context, keys, Some(public)).unwrap();
                let envelope = session.encrypt(b"shared").unwrap();
                assert_eq!(session.decrypt(&envelope).unwrap().as_slice(), b"shared");
            });
        }
    });
}

#[test]
fn copied_secret_does_not_open_in_another_record() {
    let private = Key::generate();
    let public = private.public_key();
    let keys = vec![private];

    let source = CipherSession::new("source-paas", &keys, Some(&public)).unwrap();
    let target = CipherSession::new("target-paas", &keys, Some(&public)).unwrap();

    let envelope = source.encrypt(b"deploy key").unwrap();
    assert!(matches!(
        target.decrypt(&envelope),
        Err(CryptError::Decrypt { attempts: 1 })
    ));
    assert_eq!(source.decrypt(&envelope).unwrap().as_slice(), b"deploy key");
}

#[test]
fn session_without_keys_is_a_configuration_error() {
    let session = CipherSession::new("paas", &[], None).unwrap();
    assert!(matches!(
        session.encrypt(b"x"),
        Err(CryptError::Configuration(_))
    ));
    assert!(matches!(
        session.decrypt("v1:AAAA"),
        Err(CryptError::Configuration(_))
    ));
}

#[test]
fn corrupt_envelope_is_not_a_decrypt_error() {
    let keys = vec![Key::generate()];
    let session = CipherSession::for_decryption("paas", &keys).unwrap();

    assert!(matches!(
        session.decrypt("no separator"),
        Err(CryptError::CorruptEnvelope(_))
    ));
    assert!(matches!(
        session.decrypt("v1:%%%%"),
        Err(CryptError::CorruptEnvelope(_))
    ));
}
