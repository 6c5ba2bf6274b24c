use std::fs;
use std::path::Path;

use i2p_newsfeed::pipeline::paths::SourceLayout;
use i2p_newsfeed::su3::{CONTENT_TYPE_NEWS, FILE_TYPE_XML};
use i2p_newsfeed::{
    run_build, sign_build_dir, sign_feed, BuildOptions, FeedMetadata, KeyKind, NewsSigningKey,
    SignatureType, SignedSu3, Su3Signer, Su3VerifyingKey, Target,
};
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use tempfile::TempDir;
use time::macros::datetime;

const SIGNER: &str = "news@mail.i2p";

fn build_fixture(root: &Path) {
    let data = root.join("data");
    fs::create_dir_all(data.join("translations")).unwrap();
    fs::write(
        data.join("entries.html"),
        "<header>Test Feed</header><article id=\"urn:test:1\" title=\"Title\"><p>Body</p></article>",
    )
    .unwrap();
    fs::write(
        data.join("translations/entries.de.html"),
        "<article id=\"urn:test:de\" title=\"Titel\"><p>Text</p></article>",
    )
    .unwrap();
    fs::write(
        data.join("releases.json"),
        r#"[{"date":"2022-11-21","version":"2.0.0","minVersion":"0.9.9","minJavaVersion":"1.8",
            "updates":{"su3":{"torrent":"magnet:?xt=urn:btih:abc123","url":["http://stats.i2p/u.su3"]}}}]"#,
    )
    .unwrap();

    let options = BuildOptions {
        layout: SourceLayout {
            data_dir: data.clone(),
            release_json: data.join("releases.json"),
            blocklist: None,
            translations_dir: None,
        },
        build_dir: root.join("build"),
        targets: vec![Target::default_tree()],
        metadata: FeedMetadata {
            title: "I2P News".to_string(),
            main_feed_url: "http://example.b32.i2p/news.atom.xml".to_string(),
            ..FeedMetadata::default()
        },
        generation_time: datetime!(2024-05-06 07:08:09.123 UTC),
    };
    let summary = run_build(&options).unwrap();
    assert_eq!(summary.written.len(), 2);
}

fn ed25519_key() -> NewsSigningKey {
    let pem = ed25519_dalek::SigningKey::from_bytes(&[42u8; 32])
        .to_pkcs8_pem(LineEnding::LF)
        .unwrap();
    NewsSigningKey::from_pem(&pem).unwrap()
}

fn every_key_kind() -> Vec<NewsSigningKey> {
    let p256 = p256::SecretKey::from_slice(&[0x11; 32]).unwrap();
    let p384 = p384::SecretKey::from_slice(&[0x22; 48]).unwrap();
    let mut p521_bytes = [0x33u8; 66];
    p521_bytes[0] = 0;
    let p521 = p521::SecretKey::from_slice(&p521_bytes).unwrap();
    let rsa = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();

    vec![
        NewsSigningKey::from_pem(&p256.to_pkcs8_pem(LineEnding::LF).unwrap()).unwrap(),
        NewsSigningKey::from_pem(&p384.to_pkcs8_pem(LineEnding::LF).unwrap()).unwrap(),
        NewsSigningKey::from_pem(&p521.to_pkcs8_pem(LineEnding::LF).unwrap()).unwrap(),
        NewsSigningKey::from_pem(&rsa.to_pkcs8_pem(LineEnding::LF).unwrap()).unwrap(),
        ed25519_key(),
    ]
}

#[test]
fn sign_then_read_with_ed25519() {
    let tmp = TempDir::new().unwrap();
    build_fixture(tmp.path());
    let atom = tmp.path().join("build/news.atom.xml");
    let before = fs::read(&atom).unwrap();

    let key = ed25519_key();
    let su3 = sign_feed(&atom, &key, SIGNER, "1714979289").unwrap();
    assert_eq!(su3, tmp.path().join("build/news.su3"));

    let bytes = fs::read(&su3).unwrap();
    assert_eq!(&bytes[8..10], &8u16.to_be_bytes());

    let parsed = SignedSu3::parse(&bytes).unwrap();
    assert_eq!(parsed.file.signature_type, SignatureType::EdDsaSha512Ed25519ph);
    assert_eq!(parsed.file.file_type, FILE_TYPE_XML);
    assert_eq!(parsed.file.content_type, CONTENT_TYPE_NEWS);
    assert_eq!(parsed.file.signer_id, SIGNER);
    assert_eq!(parsed.file.version, "1714979289");
    assert_eq!(parsed.file.content, before);
    parsed.verify(&key.verifying_key()).unwrap();

    assert_eq!(fs::read(&atom).unwrap(), before);
}

#[test]
fn every_supported_key_kind_round_trips() {
    let tmp = TempDir::new().unwrap();
    build_fixture(tmp.path());
    let atom = tmp.path().join("build/news.atom.xml");
    let content = fs::read(&atom).unwrap();

    let expected = [
        (KeyKind::EcdsaP256, SignatureType::EcdsaSha256P256, 64),
        (KeyKind::EcdsaP384, SignatureType::EcdsaSha384P384, 96),
        (KeyKind::EcdsaP521, SignatureType::EcdsaSha512P521, 132),
        (KeyKind::Rsa(2048), SignatureType::RsaSha512, 256),
        (KeyKind::Ed25519, SignatureType::EdDsaSha512Ed25519ph, 64),
    ];

    for (key, (kind, sig_type, sig_len)) in every_key_kind().into_iter().zip(expected) {
        assert_eq!(key.key_kind(), kind);
        let su3 = sign_feed(&atom, &key, SIGNER, "1").unwrap();
        let parsed = SignedSu3::parse(&fs::read(&su3).unwrap()).unwrap();

        assert_eq!(parsed.file.signature_type, sig_type, "{kind}");
        assert_eq!(parsed.signature().len(), sig_len, "{kind}");
        assert_eq!(parsed.file.content, content, "{kind}");
        parsed.verify(&key.verifying_key()).unwrap();
    }
}

#[test]
fn verifies_with_spki_pem_and_rejects_other_keys() {
    let tmp = TempDir::new().unwrap();
    build_fixture(tmp.path());
    let atom = tmp.path().join("build/news.atom.xml");

    let secret = p384::SecretKey::from_slice(&[0x44; 48]).unwrap();
    let key = NewsSigningKey::from_pem(&secret.to_pkcs8_pem(LineEnding::LF).unwrap()).unwrap();
    let su3 = sign_feed(&atom, &key, SIGNER, "1").unwrap();
    let parsed = SignedSu3::parse(&fs::read(su3).unwrap()).unwrap();

    let public = secret.public_key().to_public_key_pem(LineEnding::LF).unwrap();
    let public = Su3VerifyingKey::from_public_key_pem(&public).unwrap();
    parsed.verify(&public).unwrap();

    let other = p384::SecretKey::from_slice(&[0x55; 48]).unwrap();
    let other = Su3VerifyingKey::from_public_key_pem(
        &other.public_key().to_public_key_pem(LineEnding::LF).unwrap(),
    )
    .unwrap();
    assert!(parsed.verify(&other).is_err());
    assert!(parsed.verify(&ed25519_key().verifying_key()).is_err());
}

#[test]
fn driver_signs_whole_build_tree() {
    let tmp = TempDir::new().unwrap();
    build_fixture(tmp.path());
    let build = tmp.path().join("build");

    let report = sign_build_dir(&build, &ed25519_key(), SIGNER);
    assert!(report.failed.is_empty());
    assert_eq!(report.signed.len(), 2);
    assert!(build.join("news.su3").is_file());
    assert!(build.join("news_de.su3").is_file());

    let german = SignedSu3::parse(&fs::read(build.join("news_de.su3")).unwrap()).unwrap();
    assert_eq!(
        german.file.content,
        fs::read(build.join("news_de.atom.xml")).unwrap()
    );
    let version: i64 = german.file.version.parse().unwrap();
    assert!(version > 1_700_000_000);
}
