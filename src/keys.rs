//! Loading key pairs for signing the filter records.
//!
//! A key pair is given by a base name as produced by `dnssec-keygen` and
//! similar tools. The secret key is read from `<base>.private` in the BIND
//! private key format, the public key from the DNSKEY record in
//! `<base>.key`.
//!
//! The private key file is a sequence of `name: value` lines:
//!
//! ```text
//! Private-key-format: v1.2
//! Algorithm: 15 (ED25519)
//! PrivateKey: ODIyNjAzODQ2MjgwODAxMjI2NDUxOTAyMDQxNDIyNjI=
//! ```
//!
//! RSA keys carry the fields `Modulus`, `PublicExponent`,
//! `PrivateExponent`, `Prime1`, `Prime2`, `Exponent1`, `Exponent2`, and
//! `Coefficient` instead of `PrivateKey`. Other fields are ignored.

use std::path::{Path, PathBuf};
use std::{error, fmt, fs};

use bytes::Bytes;
use domain::base::iana::SecAlg;
use domain::base::name::ToName;
use domain::base::Name;
use domain::rdata::{Dnskey, ZoneRecordData};
use domain::utils::base64;
use domain::zonefile::inplace::{Entry, Zonefile};
use ring::rand::SystemRandom;
use ring::rsa::{KeyPairComponents, PublicKeyComponents};
use ring::signature::{
    EcdsaKeyPair, EcdsaSigningAlgorithm, Ed25519KeyPair, RsaKeyPair,
    ECDSA_P256_SHA256_FIXED_SIGNING, ECDSA_P384_SHA384_FIXED_SIGNING,
    RSA_PKCS1_SHA256,
};
use tracing::debug;

use crate::error::Error;

/// The algorithms keys can be loaded for.
const SUPPORTED: [SecAlg; 4] = [
    SecAlg::RSASHA256,
    SecAlg::ECDSAP256SHA256,
    SecAlg::ECDSAP384SHA384,
    SecAlg::ED25519,
];

/// The smallest RSA modulus accepted, in octets.
const MIN_RSA_MODULUS: usize = 2048 / 8;

//------------ SigningKey ----------------------------------------------------

/// A key pair ready for signing.
#[derive(Debug)]
pub struct SigningKey {
    /// The owner of the DNSKEY record, used as the signer name.
    owner: Name<Bytes>,

    /// The public key.
    dnskey: Dnskey<Bytes>,

    /// The key pair.
    key_pair: KeyPair,
}

impl SigningKey {
    /// Loads the key pair with the given base name.
    pub fn load(base: &Path) -> Result<Self, Error> {
        let private_path = with_extension(base, "private");
        let public_path = with_extension(base, "key");

        let private = fs::read_to_string(&private_path)
            .map_err(|err| Error::key_load(&private_path, err))?;
        let file = PrivateKeyFile::parse(&private)
            .map_err(|err| Error::key_load(&private_path, err))?;

        let public = fs::read(&public_path)
            .map_err(|err| Error::key_load(&public_path, err))?;
        let (owner, dnskey) = parse_dnskey(&public)
            .map_err(|err| Error::key_load(&public_path, err))?;

        let key_pair = KeyPair::new(&file, &dnskey)
            .map_err(|err| Error::key_load(&private_path, err))?;
        debug!(
            "loaded key {} with tag {} and algorithm {}",
            owner,
            dnskey.key_tag(),
            dnskey.algorithm()
        );
        Ok(SigningKey {
            owner,
            dnskey,
            key_pair,
        })
    }

    /// Returns the owner name of the public key.
    pub fn owner(&self) -> &Name<Bytes> {
        &self.owner
    }

    /// Returns the public key.
    pub fn dnskey(&self) -> &Dnskey<Bytes> {
        &self.dnskey
    }

    /// Returns the key tag of the public key.
    pub fn key_tag(&self) -> u16 {
        self.dnskey.key_tag()
    }

    /// Returns the signing algorithm.
    pub fn algorithm(&self) -> SecAlg {
        self.dnskey.algorithm()
    }

    /// Signs `data`.
    pub fn sign_raw(&self, data: &[u8]) -> Result<Vec<u8>, KeyError> {
        self.key_pair.sign(data)
    }
}

/// Appends an extension to a key base name.
///
/// Base names contain dots, so [`Path::with_extension`] would replace part
/// of the name.
fn with_extension(base: &Path, ext: &str) -> PathBuf {
    let mut res = base.as_os_str().to_owned();
    res.push(".");
    res.push(ext);
    res.into()
}

/// Reads the first DNSKEY record from the content of a `.key` file.
fn parse_dnskey(
    data: &[u8],
) -> Result<(Name<Bytes>, Dnskey<Bytes>), KeyError> {
    let mut zonefile = Zonefile::load(&mut &*data)
        .map_err(|_| KeyError::Misformatted)?;
    while let Some(entry) =
        zonefile.next_entry().map_err(|_| KeyError::Misformatted)?
    {
        let Entry::Record(record) = entry else {
            continue;
        };
        let owner: Name<Bytes> = record.owner().to_name();
        if let ZoneRecordData::Dnskey(dnskey) = record.into_data() {
            return Ok((owner, dnskey));
        }
    }
    Err(KeyError::MissingDnskey)
}

//------------ PrivateKeyFile ------------------------------------------------

/// The fields of a BIND private key file.
struct PrivateKeyFile<'a> {
    fields: Vec<(&'a str, &'a str)>,
}

impl<'a> PrivateKeyFile<'a> {
    /// Splits the file into its fields and checks the format version.
    fn parse(data: &'a str) -> Result<Self, KeyError> {
        let mut fields = Vec::new();
        for line in data.lines().map(str::trim) {
            if line.is_empty() || line.starts_with(';') {
                continue;
            }
            let (name, value) =
                line.split_once(':').ok_or(KeyError::Misformatted)?;
            fields.push((name.trim(), value.trim()));
        }
        let res = PrivateKeyFile { fields };
        match res.find("Private-key-format") {
            Some(version)
                if version
                    .strip_prefix("v1.")
                    .is_some_and(|minor| minor.parse::<u8>().is_ok()) =>
            {
                Ok(res)
            }
            _ => Err(KeyError::UnsupportedFormat),
        }
    }

    fn find(&self, name: &str) -> Option<&'a str> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| *value)
    }

    /// Returns the decoded value of a base64 field.
    fn decode(&self, name: &str) -> Result<Vec<u8>, KeyError> {
        let value = self.find(name).ok_or(KeyError::Misformatted)?;
        base64::decode(value).map_err(|_| KeyError::Misformatted)
    }

    /// Returns the decoded value of a field that must have `len` octets.
    fn decode_exact(
        &self,
        name: &str,
        len: usize,
    ) -> Result<Vec<u8>, KeyError> {
        let res = self.decode(name)?;
        if res.len() != len {
            return Err(KeyError::Misformatted);
        }
        Ok(res)
    }

    /// Returns the algorithm of the key.
    ///
    /// The field holds the algorithm number, optionally followed by its
    /// mnemonic in parentheses.
    fn algorithm(&self) -> Result<SecAlg, KeyError> {
        let algorithm = self
            .find("Algorithm")
            .and_then(|value| value.split_whitespace().next())
            .and_then(|code| code.parse::<u8>().ok())
            .map(SecAlg::from_int)
            .ok_or(KeyError::Misformatted)?;
        if !SUPPORTED.contains(&algorithm) {
            return Err(KeyError::UnsupportedAlgorithm(algorithm));
        }
        Ok(algorithm)
    }
}

//------------ KeyPair -------------------------------------------------------

/// A key pair for one of the supported algorithms.
enum KeyPair {
    RsaSha256 { key: RsaKeyPair, rng: SystemRandom },
    EcdsaP256Sha256 { key: EcdsaKeyPair, rng: SystemRandom },
    EcdsaP384Sha384 { key: EcdsaKeyPair, rng: SystemRandom },
    Ed25519(Ed25519KeyPair),
}

impl KeyPair {
    /// Creates the key pair for a private key file and its DNSKEY.
    fn new(
        file: &PrivateKeyFile,
        dnskey: &Dnskey<Bytes>,
    ) -> Result<Self, KeyError> {
        let algorithm = file.algorithm()?;
        if algorithm != dnskey.algorithm() {
            return Err(KeyError::Mismatch);
        }
        let public = dnskey.public_key().as_ref();
        let rng = SystemRandom::new();
        match algorithm {
            SecAlg::RSASHA256 => {
                let key = rsa_key_pair(file, public)?;
                Ok(KeyPair::RsaSha256 { key, rng })
            }
            SecAlg::ECDSAP256SHA256 => {
                let key = ecdsa_key_pair(
                    &ECDSA_P256_SHA256_FIXED_SIGNING,
                    file.decode_exact("PrivateKey", 32)?,
                    public,
                    &rng,
                )?;
                Ok(KeyPair::EcdsaP256Sha256 { key, rng })
            }
            SecAlg::ECDSAP384SHA384 => {
                let key = ecdsa_key_pair(
                    &ECDSA_P384_SHA384_FIXED_SIGNING,
                    file.decode_exact("PrivateKey", 48)?,
                    public,
                    &rng,
                )?;
                Ok(KeyPair::EcdsaP384Sha384 { key, rng })
            }
            SecAlg::ED25519 => {
                let seed = file.decode_exact("PrivateKey", 32)?;
                Ed25519KeyPair::from_seed_and_public_key(&seed, public)
                    .map(KeyPair::Ed25519)
                    .map_err(|_| KeyError::Mismatch)
            }
            alg => Err(KeyError::UnsupportedAlgorithm(alg)),
        }
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, KeyError> {
        match self {
            KeyPair::RsaSha256 { key, rng } => {
                let mut buf = vec![0u8; key.public().modulus_len()];
                key.sign(&RSA_PKCS1_SHA256, rng, data, &mut buf)
                    .map_err(|_| KeyError::Signing)?;
                Ok(buf)
            }
            KeyPair::EcdsaP256Sha256 { key, rng }
            | KeyPair::EcdsaP384Sha384 { key, rng } => key
                .sign(rng, data)
                .map(|sig| sig.as_ref().to_vec())
                .map_err(|_| KeyError::Signing),
            KeyPair::Ed25519(key) => Ok(key.sign(data).as_ref().to_vec()),
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            KeyPair::RsaSha256 { .. } => "KeyPair::RsaSha256",
            KeyPair::EcdsaP256Sha256 { .. } => "KeyPair::EcdsaP256Sha256",
            KeyPair::EcdsaP384Sha384 { .. } => "KeyPair::EcdsaP384Sha384",
            KeyPair::Ed25519(_) => "KeyPair::Ed25519",
        })
    }
}

/// Creates an RSA key pair.
///
/// The modulus and public exponent of the private key file have to be
/// those of the DNSKEY record.
fn rsa_key_pair(
    file: &PrivateKeyFile,
    public: &[u8],
) -> Result<RsaKeyPair, KeyError> {
    let (exponent, modulus) = split_rsa_public_key(public)?;
    if modulus.len() < MIN_RSA_MODULUS {
        return Err(KeyError::WeakKey);
    }
    let components = KeyPairComponents {
        public_key: PublicKeyComponents {
            n: file.decode("Modulus")?,
            e: file.decode("PublicExponent")?,
        },
        d: file.decode("PrivateExponent")?,
        p: file.decode("Prime1")?,
        q: file.decode("Prime2")?,
        dP: file.decode("Exponent1")?,
        dQ: file.decode("Exponent2")?,
        qInv: file.decode("Coefficient")?,
    };
    if strip_leading_zeros(&components.public_key.n) != modulus
        || strip_leading_zeros(&components.public_key.e) != exponent
    {
        return Err(KeyError::Mismatch);
    }
    RsaKeyPair::from_components(&components)
        .map_err(|_| KeyError::InvalidKey)
}

/// Splits the public key of an RSA DNSKEY into exponent and modulus.
///
/// See RFC 3110, section 2.
fn split_rsa_public_key(public: &[u8]) -> Result<(&[u8], &[u8]), KeyError> {
    let (len, rest) = match public {
        [0, hi, lo, rest @ ..] => {
            (usize::from(u16::from_be_bytes([*hi, *lo])), rest)
        }
        [len, rest @ ..] => (usize::from(*len), rest),
        [] => return Err(KeyError::Misformatted),
    };
    if len == 0 || rest.len() <= len {
        return Err(KeyError::Misformatted);
    }
    Ok(rest.split_at(len))
}

fn strip_leading_zeros(value: &[u8]) -> &[u8] {
    let start = value.iter().position(|&b| b != 0).unwrap_or(value.len());
    &value[start..]
}

/// Creates an ECDSA key pair.
///
/// DNSKEY records carry the public point without the leading `0x04` of
/// the uncompressed encoding.
fn ecdsa_key_pair(
    algorithm: &'static EcdsaSigningAlgorithm,
    secret: Vec<u8>,
    public: &[u8],
    rng: &SystemRandom,
) -> Result<EcdsaKeyPair, KeyError> {
    let mut point = Vec::with_capacity(public.len() + 1);
    point.push(0x04);
    point.extend_from_slice(public);
    EcdsaKeyPair::from_private_key_and_public_key(
        algorithm, &secret, &point, rng,
    )
    .map_err(|_| KeyError::Mismatch)
}

//------------ KeyError ------------------------------------------------------

/// A key pair could not be loaded or used.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyError {
    /// The private key file is not in a supported format version.
    UnsupportedFormat,

    /// The algorithm is not supported.
    UnsupportedAlgorithm(SecAlg),

    /// A file is not correctly formatted.
    Misformatted,

    /// The public key file contains no DNSKEY record.
    MissingDnskey,

    /// The secret key is invalid.
    InvalidKey,

    /// The key is too weak to be used.
    WeakKey,

    /// The secret and the public key do not belong together.
    Mismatch,

    /// Creating a signature failed.
    Signing,
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KeyError::UnsupportedFormat => {
                f.write_str("unsupported private key format")
            }
            KeyError::UnsupportedAlgorithm(alg) => {
                write!(f, "unsupported algorithm {}", alg)
            }
            KeyError::Misformatted => f.write_str("misformatted key file"),
            KeyError::MissingDnskey => f.write_str("no DNSKEY record found"),
            KeyError::InvalidKey => f.write_str("invalid private key"),
            KeyError::WeakKey => f.write_str("key is too weak"),
            KeyError::Mismatch => {
                f.write_str("private key does not match the public key")
            }
            KeyError::Signing => f.write_str("signing failed"),
        }
    }
}

impl error::Error for KeyError {}

//============ Testing =======================================================
