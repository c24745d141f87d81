//! Shared fixtures: JUMBF manifest stores, signed claims, certificate chains,
//! fragmented MP4 segments and Merkle trees.

#![allow(dead_code)]

use ciborium::Value;
use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::ecdsa::EcdsaSig;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::sign::Signer;
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectKeyIdentifier,
};
use openssl::x509::{X509Builder, X509Name, X509NameBuilder, X509};

use streamproof_core::bmff::{BoxIndex, C2PA_BOX_UUID};
use streamproof_core::crypto::HashAlg;
use streamproof_core::manifest::ExclusionRange;
use streamproof_core::validators::hash_with_exclusions;

pub const MANIFEST_LABEL: &str = "urn:uuid:6f2d9a1e-3c4b-4e5f-8a7b-1c2d3e4f5a6b";
pub const GENERATOR: &str = "streamproof-fixtures/1.0";
pub const CHUNK_COUNT: usize = 7;
pub const ES256: i64 = -7;

const C2PA_UUID_SUFFIX: [u8; 12] = [
    0x00, 0x11, 0x00, 0x10, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71,
];

// ---------------------------------------------------------------------------
// CBOR and JUMBF
// ---------------------------------------------------------------------------

pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

pub fn map(entries: Vec<(&str, Value)>) -> Value {
    Value::Map(entries.into_iter().map(|(k, v)| (text(k), v)).collect())
}

pub fn cbor(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    ciborium::into_writer(value, &mut out).unwrap();
    out
}

pub fn raw_box(box_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(box_type);
    out.extend_from_slice(payload);
    out
}

pub fn cbor_box(value: &Value) -> Vec<u8> {
    raw_box(b"cbor", &cbor(value))
}

/// A `jumb` superbox whose description carries `tag` and `label`.
pub fn superbox(tag: &[u8; 4], label: &str, content: &[Vec<u8>]) -> Vec<u8> {
    let mut desc = tag.to_vec();
    desc.extend_from_slice(&C2PA_UUID_SUFFIX);
    desc.push(0x03);
    desc.extend_from_slice(label.as_bytes());
    desc.push(0);

    let mut payload = raw_box(b"jumd", &desc);
    for c in content {
        payload.extend_from_slice(c);
    }
    raw_box(b"jumb", &payload)
}

// ---------------------------------------------------------------------------
// Certificates and signing
// ---------------------------------------------------------------------------

/// How the signing certificate deviates from the signer profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeafProfile {
    #[default]
    Valid,
    MissingSubjectKeyId,
    NonCriticalKeyUsage,
    CodeSigningFirst,
    NotYetValid,
    /// Valid from 30 days ago until 10 days ago
    Expired,
    WeakRsa,
}

/// A signing key and its chain, leaf first, DER encoded.
#[derive(Clone)]
pub struct TestSigner {
    pub key: PKey<Private>,
    pub chain: Vec<Vec<u8>>,
}

pub fn ec_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

fn serial() -> Asn1Integer {
    let mut bn = BigNum::new().unwrap();
    bn.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();
    bn.to_asn1_integer().unwrap()
}

fn name(common_name: &str) -> X509Name {
    let mut builder = X509NameBuilder::new().unwrap();
    builder.append_entry_by_text("O", "Streamproof").unwrap();
    builder.append_entry_by_text("CN", common_name).unwrap();
    builder.build()
}

const DAY: i64 = 86_400;

/// Validity window relative to now, in seconds.
fn set_validity(builder: &mut X509Builder, not_before_offset: i64, not_after_offset: i64) {
    let now = chrono::Utc::now().timestamp();
    let not_before = Asn1Time::from_unix((now + not_before_offset) as _).unwrap();
    let not_after = Asn1Time::from_unix((now + not_after_offset) as _).unwrap();
    builder.set_not_before(&not_before).unwrap();
    builder.set_not_after(&not_after).unwrap();
}

/// A self-signed EC root CA carrying every required extension.
pub fn root_ca(common_name: &str) -> (X509, PKey<Private>) {
    let key = ec_key();
    let subject = name(common_name);

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    builder.set_serial_number(&serial()).unwrap();
    builder.set_subject_name(&subject).unwrap();
    builder.set_issuer_name(&subject).unwrap();
    builder.set_pubkey(&key).unwrap();
    set_validity(&mut builder, -60 * DAY, 365 * DAY);

    builder
        .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
        .unwrap();
    builder
        .append_extension(
            KeyUsage::new()
                .critical()
                .key_cert_sign()
                .crl_sign()
                .build()
                .unwrap(),
        )
        .unwrap();
    let ski = SubjectKeyIdentifier::new()
        .build(&builder.x509v3_context(None, None))
        .unwrap();
    builder.append_extension(ski).unwrap();
    let aki = AuthorityKeyIdentifier::new()
        .keyid(true)
        .build(&builder.x509v3_context(None, None))
        .unwrap();
    builder.append_extension(aki).unwrap();

    builder.sign(&key, MessageDigest::sha256()).unwrap();
    (builder.build(), key)
}

/// A signing certificate for `key` issued by `issuer`.
pub fn leaf_cert(
    issuer: &X509,
    issuer_key: &PKey<Private>,
    key: &PKey<Private>,
    profile: LeafProfile,
) -> X509 {
    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    builder.set_serial_number(&serial()).unwrap();
    builder
        .set_subject_name(&name("Streamproof Test Signer"))
        .unwrap();
    builder.set_issuer_name(issuer.subject_name()).unwrap();
    builder.set_pubkey(key).unwrap();
    match profile {
        LeafProfile::NotYetValid => set_validity(&mut builder, DAY, 365 * DAY),
        LeafProfile::Expired => set_validity(&mut builder, -30 * DAY, -10 * DAY),
        _ => set_validity(&mut builder, -3600, 365 * DAY),
    }

    builder
        .append_extension(BasicConstraints::new().critical().build().unwrap())
        .unwrap();

    let mut key_usage = KeyUsage::new();
    if profile != LeafProfile::NonCriticalKeyUsage {
        key_usage.critical();
    }
    builder
        .append_extension(key_usage.digital_signature().build().unwrap())
        .unwrap();

    let mut eku = ExtendedKeyUsage::new();
    if profile == LeafProfile::CodeSigningFirst {
        eku.code_signing();
    }
    builder
        .append_extension(eku.email_protection().build().unwrap())
        .unwrap();

    if profile != LeafProfile::MissingSubjectKeyId {
        let ski = SubjectKeyIdentifier::new()
            .build(&builder.x509v3_context(Some(&**issuer), None))
            .unwrap();
        builder.append_extension(ski).unwrap();
    }
    let aki = AuthorityKeyIdentifier::new()
        .keyid(true)
        .build(&builder.x509v3_context(Some(&**issuer), None))
        .unwrap();
    builder.append_extension(aki).unwrap();

    builder.sign(issuer_key, MessageDigest::sha256()).unwrap();
    builder.build()
}

/// A leaf + root chain whose leaf follows `profile`.
pub fn test_signer(profile: LeafProfile) -> TestSigner {
    let (root, root_key) = root_ca("Streamproof Test Root");
    let key = match profile {
        LeafProfile::WeakRsa => PKey::from_rsa(Rsa::generate(1024).unwrap()).unwrap(),
        _ => ec_key(),
    };
    let leaf = leaf_cert(&root, &root_key, &key, profile);

    TestSigner {
        key,
        chain: vec![leaf.to_der().unwrap(), root.to_der().unwrap()],
    }
}

/// ES256 signature in COSE form: `r || s`, 32 bytes each.
pub fn sign_es256(key: &PKey<Private>, data: &[u8]) -> Vec<u8> {
    let mut signer = Signer::new(MessageDigest::sha256(), key).unwrap();
    signer.update(data).unwrap();
    let der = signer.sign_to_vec().unwrap();

    let sig = EcdsaSig::from_der(&der).unwrap();
    let mut raw = sig.r().to_vec_padded(32).unwrap();
    raw.extend(sig.s().to_vec_padded(32).unwrap());
    raw
}

// ---------------------------------------------------------------------------
// Manifest stores
// ---------------------------------------------------------------------------

/// Builds a one-manifest store with a signed claim over its assertions.
pub struct ManifestBuilder {
    manifest_tag: [u8; 4],
    assertions: Vec<(String, Value)>,
    signer: TestSigner,
    corrupt_signature: bool,
    corrupt_assertion_hash: bool,
}

impl ManifestBuilder {
    pub fn new(signer: TestSigner) -> Self {
        Self {
            manifest_tag: *b"c2ma",
            assertions: Vec::new(),
            signer,
            corrupt_signature: false,
            corrupt_assertion_hash: false,
        }
    }

    pub fn update_manifest(mut self) -> Self {
        self.manifest_tag = *b"c2um";
        self
    }

    pub fn assertion(mut self, label: &str, value: Value) -> Self {
        self.assertions.push((label.to_string(), value));
        self
    }

    pub fn corrupt_signature(mut self) -> Self {
        self.corrupt_signature = true;
        self
    }

    pub fn corrupt_assertion_hash(mut self) -> Self {
        self.corrupt_assertion_hash = true;
        self
    }

    pub fn assertion_uri(label: &str) -> String {
        format!("self#jumbf=c2pa/{MANIFEST_LABEL}/c2pa.assertions/{label}")
    }

    pub fn signature_uri() -> String {
        format!("self#jumbf=c2pa/{MANIFEST_LABEL}/c2pa.signature")
    }

    pub fn build(&self) -> Vec<u8> {
        let mut assertion_boxes = Vec::new();
        let mut references = Vec::new();
        for (i, (label, value)) in self.assertions.iter().enumerate() {
            let assertion = superbox(b"cbor", label, &[cbor_box(value)]);
            let mut hash = HashAlg::Sha256.digest(&assertion[8..]).unwrap();
            if self.corrupt_assertion_hash && i == 0 {
                hash[0] ^= 0xFF;
            }
            references.push(map(vec![
                ("url", text(&Self::assertion_uri(label))),
                ("hash", Value::Bytes(hash)),
            ]));
            assertion_boxes.push(assertion);
        }

        let claim = map(vec![
            ("claim_generator", text(GENERATOR)),
            ("signature", text(&Self::signature_uri())),
            ("assertions", Value::Array(references)),
            ("alg", text("sha256")),
            ("dc:format", text("video/mp4")),
            ("instanceID", text("xmp:iid:0b7f6c1e-2a3d-4c5b-9e8f-7a6b5c4d3e2f")),
        ]);
        let claim_bytes = cbor(&claim);

        let protected = cbor(&Value::Map(vec![(
            Value::Integer(1.into()),
            Value::Integer(ES256.into()),
        )]));
        let sig_structure = cbor(&Value::Array(vec![
            text("Signature1"),
            Value::Bytes(protected.clone()),
            Value::Bytes(Vec::new()),
            Value::Bytes(claim_bytes),
        ]));
        let mut signature = sign_es256(&self.signer.key, &sig_structure);
        if self.corrupt_signature {
            signature[10] ^= 0x01;
        }

        let x5chain = Value::Array(
            self.signer
                .chain
                .iter()
                .map(|der| Value::Bytes(der.clone()))
                .collect(),
        );
        let cose = Value::Tag(
            18,
            Box::new(Value::Array(vec![
                Value::Bytes(protected),
                Value::Map(vec![(text("x5chain"), x5chain)]),
                Value::Null,
                Value::Bytes(signature),
            ])),
        );

        let assertion_store = superbox(b"c2as", "c2pa.assertions", &assertion_boxes);
        let claim_box = superbox(b"c2cl", "c2pa.claim", &[cbor_box(&claim)]);
        let signature_box = superbox(b"c2cs", "c2pa.signature", &[cbor_box(&cose)]);
        let manifest = superbox(
            &self.manifest_tag,
            MANIFEST_LABEL,
            &[assertion_store, claim_box, signature_box],
        );
        superbox(b"c2pa", "c2pa", &[manifest])
    }
}

// ---------------------------------------------------------------------------
// Fragmented MP4
// ---------------------------------------------------------------------------

pub fn full_box(box_type: &[u8; 4], flags: u32, payload: &[u8]) -> Vec<u8> {
    let mut body = (flags & 0x00FF_FFFF).to_be_bytes().to_vec();
    body.extend_from_slice(payload);
    raw_box(box_type, &body)
}

fn c2pa_uuid_box(purpose: &str, header: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut body = C2PA_BOX_UUID.to_vec();
    body.extend_from_slice(&[0, 0, 0, 0]);
    body.extend_from_slice(purpose.as_bytes());
    body.push(0);
    body.extend_from_slice(header);
    body.extend_from_slice(payload);
    raw_box(b"uuid", &body)
}

/// c2pa box of an init segment carrying `store`.
pub fn manifest_box(store: &[u8]) -> Vec<u8> {
    c2pa_uuid_box("manifest", &0u64.to_be_bytes(), store)
}

/// c2pa box of a chunk carrying a CBOR Merkle proof.
pub fn merkle_box(proof: &[u8]) -> Vec<u8> {
    c2pa_uuid_box("merkle", &[], proof)
}

/// `ftyp`, the optional c2pa box, then `moov`.
pub fn init_segment(c2pa: Option<&[u8]>) -> Vec<u8> {
    let mut buf = raw_box(b"ftyp", b"iso6\0\0\0\0iso6cmfc");
    if let Some(c2pa) = c2pa {
        buf.extend_from_slice(c2pa);
    }

    let mvhd = full_box(b"mvhd", 0, &[0x11; 96]);
    let tkhd = full_box(b"tkhd", 0x000003, &[0x22; 80]);
    let trex = full_box(b"trex", 0, &[0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    let mut moov = mvhd;
    moov.extend(raw_box(b"trak", &tkhd));
    moov.extend(raw_box(b"mvex", &trex));
    buf.extend(raw_box(b"moov", &moov));
    buf
}

/// `moof` + `mdat` of one fragment.
pub fn chunk_body(sequence: u32, payload: &[u8]) -> Vec<u8> {
    let mfhd = full_box(b"mfhd", 0, &sequence.to_be_bytes());
    let tfhd = full_box(b"tfhd", 0x020000, &1u32.to_be_bytes());
    let tfdt = full_box(b"tfdt", 0, &(sequence * 48_000).to_be_bytes());
    let trun = full_box(b"trun", 0x000001, &[0, 0, 0, 1, 0, 0, 0, 0]);

    let mut traf = tfhd;
    traf.extend(tfdt);
    traf.extend(trun);

    let mut moof = mfhd;
    moof.extend(raw_box(b"traf", &traf));

    let mut buf = raw_box(b"moof", &moof);
    buf.extend(raw_box(b"mdat", payload));
    buf
}

pub fn chunk_payload(index: usize) -> Vec<u8> {
    (0..64u8).map(|b| b.wrapping_mul(index as u8 + 3)).collect()
}

/// Offset of the first `mdat` payload byte of a segment.
pub fn mdat_offset(segment: &[u8]) -> usize {
    let index = BoxIndex::parse(segment).unwrap();
    index.find_by_path("/mdat").unwrap().payload_range().start
}

/// Offset of the `mfhd` sequence number of a chunk.
pub fn sequence_offset(segment: &[u8]) -> usize {
    let index = BoxIndex::parse(segment).unwrap();
    index.find_by_path("/moof/mfhd").unwrap().start + 12
}

// ---------------------------------------------------------------------------
// Content binding
// ---------------------------------------------------------------------------

/// The whole c2pa box and the `mfhd` sequence number.
pub fn exclusions_value() -> Value {
    Value::Array(vec![
        map(vec![("xpath", text("/uuid"))]),
        map(vec![
            ("xpath", text("/moof/mfhd")),
            (
                "subset",
                Value::Array(vec![map(vec![
                    ("offset", Value::Integer(12.into())),
                    ("length", Value::Integer(4.into())),
                ])]),
            ),
        ]),
    ])
}

pub fn exclusions() -> Vec<ExclusionRange> {
    exclusions_value().deserialized().unwrap()
}

pub fn segment_hash(segment: &[u8], exclusions: &[ExclusionRange]) -> Vec<u8> {
    let index = BoxIndex::parse(segment).unwrap();
    hash_with_exclusions(HashAlg::Sha256, &index, segment, exclusions).unwrap()
}

/// Rows of the tree from the leaves up to the root. A last node without a
/// sibling is promoted unchanged.
pub fn merkle_levels(leaves: Vec<Vec<u8>>) -> Vec<Vec<Vec<u8>>> {
    let mut levels = vec![leaves];
    while levels.last().unwrap().len() > 1 {
        let next = levels
            .last()
            .unwrap()
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => HashAlg::Sha256
                    .digest_parts([left.as_slice(), right.as_slice()])
                    .unwrap(),
                [single] => single.clone(),
                _ => unreachable!(),
            })
            .collect();
        levels.push(next);
    }
    levels
}

/// Sibling hashes from leaf `index` to the root.
pub fn merkle_proof(levels: &[Vec<Vec<u8>>], mut index: usize) -> Vec<Vec<u8>> {
    let mut proof = Vec::new();
    for level in &levels[..levels.len() - 1] {
        if let Some(sibling) = level.get(index ^ 1) {
            proof.push(sibling.clone());
        }
        index /= 2;
    }
    proof
}

pub fn proof_value(location: usize, hashes: &[Vec<u8>]) -> Value {
    map(vec![
        ("uniqueId", Value::Integer(1.into())),
        ("localId", Value::Integer(1.into())),
        ("location", Value::Integer((location as u64).into())),
        (
            "hashes",
            Value::Array(hashes.iter().map(|h| Value::Bytes(h.clone())).collect()),
        ),
    ])
}

/// Options of [`stream_fixture`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamOptions {
    pub profile: LeafProfile,
    pub corrupt_signature: bool,
    /// Bind with `c2pa.hash.data` instead of `c2pa.hash.bmff`
    pub data_hash_binding: bool,
}

/// A signed init segment and [`CHUNK_COUNT`] chunks with Merkle proofs
/// against a committed root.
pub struct StreamFixture {
    pub init: Vec<u8>,
    pub chunks: Vec<Vec<u8>>,
    pub store: Vec<u8>,
    pub leaves: Vec<Vec<u8>>,
    pub root: Vec<u8>,
}

pub fn bmff_hash_value(init_hash: &[u8], root: &[u8]) -> Value {
    map(vec![
        ("exclusions", exclusions_value()),
        ("alg", text("sha256")),
        (
            "merkle",
            Value::Array(vec![map(vec![
                ("uniqueId", Value::Integer(1.into())),
                ("localId", Value::Integer(1.into())),
                ("count", Value::Integer((CHUNK_COUNT as u64).into())),
                ("initHash", Value::Bytes(init_hash.to_vec())),
                ("hashes", Value::Array(vec![Value::Bytes(root.to_vec())])),
            ])]),
        ),
        ("name", text("fragmented video")),
    ])
}

pub fn stream_fixture(options: StreamOptions) -> StreamFixture {
    let exclusions = exclusions();

    let bodies: Vec<Vec<u8>> = (0..CHUNK_COUNT)
        .map(|i| chunk_body(i as u32 + 1, &chunk_payload(i)))
        .collect();
    let leaves: Vec<Vec<u8>> = bodies
        .iter()
        .map(|body| segment_hash(&[merkle_box(&[]), body.clone()].concat(), &exclusions))
        .collect();
    let levels = merkle_levels(leaves.clone());
    let root = levels[levels.len() - 1][0].clone();

    let init_hash = segment_hash(&init_segment(Some(&manifest_box(&[]))), &exclusions);

    let mut builder = ManifestBuilder::new(test_signer(options.profile));
    builder = if options.data_hash_binding {
        builder.assertion(
            "c2pa.hash.data",
            map(vec![
                ("exclusions", Value::Array(Vec::new())),
                ("alg", text("sha256")),
                ("hash", Value::Bytes(init_hash.clone())),
            ]),
        )
    } else {
        builder.assertion("c2pa.hash.bmff", bmff_hash_value(&init_hash, &root))
    };
    if options.corrupt_signature {
        builder = builder.corrupt_signature();
    }
    let store = builder.build();

    let init = init_segment(Some(&manifest_box(&store)));
    let chunks = bodies
        .iter()
        .enumerate()
        .map(|(i, body)| {
            let proof = cbor(&proof_value(i, &merkle_proof(&levels, i)));
            [merkle_box(&proof), body.clone()].concat()
        })
        .collect();

    StreamFixture {
        init,
        chunks,
        store,
        leaves,
        root,
    }
}
