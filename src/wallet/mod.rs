use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::info;
use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};

use crate::transaction::Tx;

/// A secp256k1 identity. The address is the hex of the compressed public key.
pub struct Wallet {
    secret: SecretKey,
    pub address: String,
}

impl Wallet {
    /// Fresh random keypair.
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret, public) = secp.generate_keypair(&mut OsRng);
        Self {
            secret,
            address: hex::encode(public.serialize()),
        }
    }

    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, &'static str> {
        let bytes = hex::decode(secret_hex.trim()).map_err(|_| "invalid secret key hex")?;
        let secret = SecretKey::from_slice(&bytes).map_err(|_| "invalid secret key bytes")?;
        let public = PublicKey::from_secret_key(&Secp256k1::signing_only(), &secret);
        Ok(Self {
            secret,
            address: hex::encode(public.serialize()),
        })
    }

    /// Restore the node wallet from `path`, or create and save a new one there.
    pub fn load_or_create(path: &Path) -> std::io::Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_secret_hex(&contents)
                .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let wallet = Self::generate();
                fs::write(path, wallet.secret_hex())?;
                info!("created wallet {} at {}", wallet.address, path.display());
                Ok(wallet)
            }
            Err(e) => Err(e),
        }
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret.secret_bytes())
    }

    /// Sign a 32-byte digest; returns hex of the 64-byte compact signature.
    pub fn sign(&self, msg32: [u8; 32]) -> String {
        let secp = Secp256k1::signing_only();
        // a 32-byte array is always a valid message
        let msg = Message::from_slice(&msg32).expect("32-byte digest");
        hex::encode(secp.sign_ecdsa(&msg, &self.secret).serialize_compact())
    }

    /// Sign every input of `tx` over its sighash.
    pub fn sign_tx(&self, tx: &mut Tx) {
        let signature = self.sign(tx.sighash());
        for input in &mut tx.tx_ins {
            input.signature = signature.clone();
        }
    }
}

/// Derive address (hex of compressed pubkey) from a given hex pubkey.
/// Returns normalized hex (lowercase) if valid.
pub fn pubkey_to_address_hex(pubkey_hex: &str) -> Result<String, &'static str> {
    let bytes = hex::decode(pubkey_hex).map_err(|_| "invalid pubkey hex")?;
    let pk = PublicKey::from_slice(&bytes).map_err(|_| "invalid pubkey bytes")?;
    Ok(hex::encode(pk.serialize()))
}

/// Verify a compact signature (hex) against an address and a 32-byte digest.
pub fn verify_signature_hex(
    address: &str,
    sig_hex: &str,
    msg32: [u8; 32],
) -> Result<bool, &'static str> {
    let secp = Secp256k1::verification_only();

    let sig_bytes = hex::decode(sig_hex).map_err(|_| "invalid signature hex")?;
    let sig = Signature::from_compact(&sig_bytes).map_err(|_| "invalid compact signature")?;

    let pk_bytes = hex::decode(address).map_err(|_| "address is not hex")?;
    let pk = PublicKey::from_slice(&pk_bytes).map_err(|_| "address is not a public key")?;

    let msg = Message::from_slice(&msg32).map_err(|_| "invalid message length")?;
    Ok(secp.verify_ecdsa(&msg, &sig, &pk).is_ok())
}
