//! Cryptographic primitives, specified at contract level (spec.md §4.1).
//!
//! The core consumes these through the [`CryptoProvider`] trait and never
//! dictates their internal construction. [`ReferenceCrypto`] is *one*
//! concrete, swappable implementation used by this crate's own tests and
//! demo binary — grounded on the stack used across the privacy-coin/
//! stealth-address repos in the example pack:
//! - signing/verification/hashing: `ed25519-dalek` + `blake2`, the stack
//!   used by `examples/0x000NULL-obscura2.0/core`.
//! - Pedersen commitments, stealth addresses, linkable ring signatures and
//!   range proofs: `curve25519-dalek` Ristretto group operations, the stack
//!   pinned by `examples/Leihyn-nocturne` (`curve25519-dalek = "3.2"`) and
//!   the DKSAP construction documented in its `crypto/dksap.rs`
//!   (`P = B + H(ss)·G`, ephemeral key `R = r·G`, shared secret `ss = r·S`).
//!
//! All verification functions return `bool`; nothing in this module panics
//! on attacker-controlled input.

use blake2::Blake2b;
use blake2::digest::consts::U32;
use blake2::Digest;
use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use ed25519_dalek::{Keypair as EdKeypair, PublicKey as EdPublicKey, SecretKey as EdSecretKey, Signature as EdSignature};
use ed25519_dalek::{Signer, Verifier};
use rand::rngs::OsRng;
use sha2::Sha512;

type Blake2b256 = Blake2b<U32>;

/// Number of bits a confidential payment amount is range-proved over. Bounds
/// individual transfer amounts to `< 2^40` micro-units (~1.1M native units),
/// which is ample for a single payment without requiring a full bulletproof
/// implementation.
pub const RANGE_BITS: usize = 40;

/// A 32-byte Ed25519 signing key.
#[derive(Clone)]
pub struct PrivateKey(pub [u8; 32]);

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PublicKey(pub [u8; 32]);

/// A 64-byte Ed25519 signature.
#[derive(Clone, Debug)]
pub struct Signature(pub Vec<u8>);

/// A Ristretto-group commitment point, serialized compressed.
pub type Commitment = [u8; 32];

/// The deterministic second Pedersen generator `H`, derived by hashing the
/// basepoint into the group so that `log_G(H)` is unknown to anyone.
fn pedersen_h() -> RistrettoPoint {
    RistrettoPoint::hash_from_bytes::<Sha512>(b"valnode-core/pedersen-h/v1")
}

fn hash_to_scalar(label: &[u8], parts: &[&[u8]]) -> Scalar {
    let mut buf = Vec::new();
    buf.extend_from_slice(label);
    for p in parts {
        buf.extend_from_slice(p);
    }
    Scalar::hash_from_bytes::<Sha512>(&buf)
}

fn hash_to_point(label: &[u8], parts: &[&[u8]]) -> RistrettoPoint {
    let mut buf = Vec::new();
    buf.extend_from_slice(label);
    for p in parts {
        buf.extend_from_slice(p);
    }
    RistrettoPoint::hash_from_bytes::<Sha512>(&buf)
}

/// Contract for the cryptographic operations the core consumes.
pub trait CryptoProvider: Send + Sync {
    fn keypair(&self) -> (PrivateKey, PublicKey);
    fn sign(&self, priv_key: &PrivateKey, digest32: &[u8; 32]) -> Signature;
    fn verify(&self, pub_key: &PublicKey, digest32: &[u8; 32], sig: &Signature) -> bool;
    fn hash256(&self, bytes: &[u8]) -> [u8; 32];

    fn pedersen_commit(&self, value: u64, blinding: &[u8; 32]) -> Commitment;

    fn stealth_generate(&self, view_pub: &[u8; 32], spend_pub: &[u8; 32]) -> Option<StealthOutput>;
    fn stealth_recover(
        &self,
        view_priv: &[u8; 32],
        spend_pub: &[u8; 32],
        ephemeral_pub: &[u8; 32],
        view_tag: u8,
    ) -> Option<[u8; 32]>;

    fn ring_sign(
        &self,
        message: &[u8],
        signer_priv: &[u8; 32],
        ring_pubs: &[[u8; 32]],
        signer_index: usize,
    ) -> Option<Vec<u8>>;
    fn ring_verify(&self, sig_bytes: &[u8], message: &[u8]) -> bool;

    fn range_prove(&self, value: u64, blinding: &[u8; 32]) -> Vec<u8>;
    fn range_verify(&self, proof: &[u8], commitment: &Commitment) -> bool;
}

/// Output of stealth-address generation (the sender's side of DKSAP).
#[derive(Clone, Debug)]
pub struct StealthOutput {
    pub one_time_address: [u8; 32],
    pub ephemeral_pub: [u8; 32],
    pub view_tag: u8,
    pub shared_secret: [u8; 32],
}

/// Reference implementation of [`CryptoProvider`].
#[derive(Clone, Default)]
pub struct ReferenceCrypto;

impl ReferenceCrypto {
    pub fn new() -> Self {
        Self
    }

    fn decode_point(bytes: &[u8; 32]) -> Option<RistrettoPoint> {
        CompressedRistretto(*bytes).decompress()
    }

    fn decode_scalar(bytes: &[u8; 32]) -> Scalar {
        // Clamp into the scalar field deterministically via reduction, so
        // any 32 bytes (e.g. a raw blinding factor from a transaction) are
        // accepted as a valid scalar rather than panicking.
        Scalar::from_bytes_mod_order(*bytes)
    }
}

impl CryptoProvider for ReferenceCrypto {
    fn keypair(&self) -> (PrivateKey, PublicKey) {
        let mut csprng = OsRng;
        let kp = EdKeypair::generate(&mut csprng);
        let mut sk = [0u8; 32];
        sk.copy_from_slice(kp.secret.as_bytes());
        let mut pk = [0u8; 32];
        pk.copy_from_slice(kp.public.as_bytes());
        (PrivateKey(sk), PublicKey(pk))
    }

    fn sign(&self, priv_key: &PrivateKey, digest32: &[u8; 32]) -> Signature {
        let secret = match EdSecretKey::from_bytes(&priv_key.0) {
            Ok(s) => s,
            Err(_) => return Signature(Vec::new()),
        };
        let public = EdPublicKey::from(&secret);
        let expanded = ed25519_dalek::ExpandedSecretKey::from(&secret);
        let sig = expanded.sign(digest32, &public);
        Signature(sig.to_bytes().to_vec())
    }

    fn verify(&self, pub_key: &PublicKey, digest32: &[u8; 32], sig: &Signature) -> bool {
        let public = match EdPublicKey::from_bytes(&pub_key.0) {
            Ok(p) => p,
            Err(_) => return false,
        };
        let signature = match EdSignature::from_bytes(&sig.0) {
            Ok(s) => s,
            Err(_) => return false,
        };
        public.verify(digest32, &signature).is_ok()
    }

    fn hash256(&self, bytes: &[u8]) -> [u8; 32] {
        let mut hasher = Blake2b256::new();
        hasher.update(bytes);
        let out = hasher.finalize();
        let mut result = [0u8; 32];
        result.copy_from_slice(&out);
        result
    }

    fn pedersen_commit(&self, value: u64, blinding: &[u8; 32]) -> Commitment {
        let v = Scalar::from(value);
        let b = Self::decode_scalar(blinding);
        let c = RISTRETTO_BASEPOINT_POINT * v + pedersen_h() * b;
        c.compress().to_bytes()
    }

    fn stealth_generate(&self, view_pub: &[u8; 32], spend_pub: &[u8; 32]) -> Option<StealthOutput> {
        let view_pub_pt = Self::decode_point(view_pub)?;
        let spend_pub_pt = Self::decode_point(spend_pub)?;
        let mut csprng = OsRng;
        let r = Scalar::random(&mut csprng);
        let ephemeral = RISTRETTO_BASEPOINT_POINT * r;
        let shared_point = view_pub_pt * r;
        let shared_bytes = shared_point.compress().to_bytes();
        let h = hash_to_scalar(b"valnode-core/dksap/v1", &[&shared_bytes]);
        let one_time = spend_pub_pt + RISTRETTO_BASEPOINT_POINT * h;
        let view_tag = self.hash256(&shared_bytes)[0];
        Some(StealthOutput {
            one_time_address: one_time.compress().to_bytes(),
            ephemeral_pub: ephemeral.compress().to_bytes(),
            view_tag,
            shared_secret: shared_bytes,
        })
    }

    fn stealth_recover(
        &self,
        view_priv: &[u8; 32],
        spend_pub: &[u8; 32],
        ephemeral_pub: &[u8; 32],
        view_tag: u8,
    ) -> Option<[u8; 32]> {
        let ephemeral_pt = Self::decode_point(ephemeral_pub)?;
        let spend_pub_pt = Self::decode_point(spend_pub)?;
        let s = Self::decode_scalar(view_priv);
        let shared_point = ephemeral_pt * s;
        let shared_bytes = shared_point.compress().to_bytes();
        if self.hash256(&shared_bytes)[0] != view_tag {
            return None;
        }
        let h = hash_to_scalar(b"valnode-core/dksap/v1", &[&shared_bytes]);
        let candidate = spend_pub_pt + RISTRETTO_BASEPOINT_POINT * h;
        Some(candidate.compress().to_bytes())
    }

    fn ring_sign(
        &self,
        message: &[u8],
        signer_priv: &[u8; 32],
        ring_pubs: &[[u8; 32]],
        signer_index: usize,
    ) -> Option<Vec<u8>> {
        let n = ring_pubs.len();
        if n == 0 || signer_index >= n {
            return None;
        }
        let pubs: Vec<RistrettoPoint> = ring_pubs
            .iter()
            .map(Self::decode_point)
            .collect::<Option<Vec<_>>>()?;
        let x = Self::decode_scalar(signer_priv);
        // Hash-points used per-member for the linkable (LSAG-style) ring.
        let hp: Vec<RistrettoPoint> = ring_pubs
            .iter()
            .map(|p| hash_to_point(b"valnode-core/ring-hp/v1", &[p]))
            .collect();
        let key_image = hp[signer_index] * x;

        let mut csprng = OsRng;
        let alpha = Scalar::random(&mut csprng);
        let mut c = vec![Scalar::zero(); n];
        let mut s = vec![Scalar::zero(); n];

        let start = (signer_index + 1) % n;
        c[start] = hash_to_scalar(
            b"valnode-core/ring-sig/v1",
            &[
                message,
                (RISTRETTO_BASEPOINT_POINT * alpha).compress().as_bytes(),
                (hp[signer_index] * alpha).compress().as_bytes(),
            ],
        );

        let mut i = start;
        loop {
            if i == signer_index {
                break;
            }
            let si = Scalar::random(&mut csprng);
            s[i] = si;
            let l = RISTRETTO_BASEPOINT_POINT * si + pubs[i] * c[i];
            let r = hp[i] * si + key_image * c[i];
            let next = (i + 1) % n;
            c[next] = hash_to_scalar(
                b"valnode-core/ring-sig/v1",
                &[message, l.compress().as_bytes(), r.compress().as_bytes()],
            );
            i = next;
        }
        s[signer_index] = alpha - c[signer_index] * x;

        let mut out = Vec::with_capacity(4 + n * 32 + 32 + 32 + n * 32);
        out.extend_from_slice(&(n as u32).to_le_bytes());
        for p in ring_pubs {
            out.extend_from_slice(p);
        }
        out.extend_from_slice(key_image.compress().as_bytes());
        out.extend_from_slice(c[0].as_bytes());
        for si in &s {
            out.extend_from_slice(si.as_bytes());
        }
        Some(out)
    }

    fn ring_verify(&self, sig_bytes: &[u8], message: &[u8]) -> bool {
        if sig_bytes.len() < 4 {
            return false;
        }
        let n = u32::from_le_bytes([sig_bytes[0], sig_bytes[1], sig_bytes[2], sig_bytes[3]]) as usize;
        let expected_len = 4 + n * 32 + 32 + 32 + n * 32;
        if n == 0 || sig_bytes.len() != expected_len {
            return false;
        }
        let mut offset = 4;
        let mut ring_pubs = Vec::with_capacity(n);
        for _ in 0..n {
            let mut p = [0u8; 32];
            p.copy_from_slice(&sig_bytes[offset..offset + 32]);
            offset += 32;
            ring_pubs.push(p);
        }
        let pubs: Option<Vec<RistrettoPoint>> = ring_pubs.iter().map(Self::decode_point).collect();
        let pubs = match pubs {
            Some(p) => p,
            None => return false,
        };
        let mut key_image_bytes = [0u8; 32];
        key_image_bytes.copy_from_slice(&sig_bytes[offset..offset + 32]);
        offset += 32;
        let key_image = match Self::decode_point(&key_image_bytes) {
            Some(p) => p,
            None => return false,
        };
        let mut c0_bytes = [0u8; 32];
        c0_bytes.copy_from_slice(&sig_bytes[offset..offset + 32]);
        offset += 32;
        let c0 = Scalar::from_bytes_mod_order(c0_bytes);
        let mut s = Vec::with_capacity(n);
        for _ in 0..n {
            let mut sb = [0u8; 32];
            sb.copy_from_slice(&sig_bytes[offset..offset + 32]);
            offset += 32;
            s.push(Scalar::from_bytes_mod_order(sb));
        }
        let hp: Vec<RistrettoPoint> = ring_pubs
            .iter()
            .map(|p| hash_to_point(b"valnode-core/ring-hp/v1", &[p]))
            .collect();

        let mut c = c0;
        for i in 0..n {
            let l = RISTRETTO_BASEPOINT_POINT * s[i] + pubs[i] * c;
            let r = hp[i] * s[i] + key_image * c;
            c = hash_to_scalar(
                b"valnode-core/ring-sig/v1",
                &[message, l.compress().as_bytes(), r.compress().as_bytes()],
            );
        }
        c == c0
    }

    fn range_prove(&self, value: u64, blinding: &[u8; 32]) -> Vec<u8> {
        let mut csprng = OsRng;
        let target_blinding = Self::decode_scalar(blinding);

        let mut bit_blindings = vec![Scalar::zero(); RANGE_BITS];
        let mut acc = Scalar::zero();
        let two = Scalar::from(2u64);
        let mut pow = Scalar::one();
        for i in 0..RANGE_BITS - 1 {
            let r = Scalar::random(&mut csprng);
            bit_blindings[i] = r;
            acc += pow * r;
            pow *= two;
        }
        // Last bit's blinding is fixed so the weighted sum matches `blinding`.
        let last_pow_inv = pow.invert();
        bit_blindings[RANGE_BITS - 1] = (target_blinding - acc) * last_pow_inv;

        let h = pedersen_h();
        let mut commitments = Vec::with_capacity(RANGE_BITS);
        let mut proofs = Vec::with_capacity(RANGE_BITS);
        for i in 0..RANGE_BITS {
            let bit = (value >> i) & 1;
            let r = bit_blindings[i];
            let c_i = if bit == 1 {
                RISTRETTO_BASEPOINT_POINT + h * r
            } else {
                h * r
            };
            commitments.push(c_i);

            // One-of-two Schnorr OR proof that c_i commits to 0 or 1.
            let t0 = c_i;
            let t1 = c_i - RISTRETTO_BASEPOINT_POINT;
            let (a0, a1, e0, e1, s0, s1);
            if bit == 0 {
                let k = Scalar::random(&mut csprng);
                let a0_real = h * k;
                let e1_sim = Scalar::random(&mut csprng);
                let s1_sim = Scalar::random(&mut csprng);
                let a1_sim = h * s1_sim - t1 * e1_sim;
                let c = hash_to_scalar(
                    b"valnode-core/range-bit/v1",
                    &[
                        &(i as u32).to_le_bytes(),
                        c_i.compress().as_bytes(),
                        a0_real.compress().as_bytes(),
                        a1_sim.compress().as_bytes(),
                    ],
                );
                let e0_real = c - e1_sim;
                let s0_real = k + e0_real * r;
                a0 = a0_real;
                a1 = a1_sim;
                e0 = e0_real;
                e1 = e1_sim;
                s0 = s0_real;
                s1 = s1_sim;
            } else {
                let k = Scalar::random(&mut csprng);
                let a1_real = h * k;
                let e0_sim = Scalar::random(&mut csprng);
                let s0_sim = Scalar::random(&mut csprng);
                let a0_sim = h * s0_sim - t0 * e0_sim;
                let c = hash_to_scalar(
                    b"valnode-core/range-bit/v1",
                    &[
                        &(i as u32).to_le_bytes(),
                        c_i.compress().as_bytes(),
                        a0_sim.compress().as_bytes(),
                        a1_real.compress().as_bytes(),
                    ],
                );
                let e1_real = c - e0_sim;
                let s1_real = k + e1_real * r;
                a0 = a0_sim;
                a1 = a1_real;
                e0 = e0_sim;
                e1 = e1_real;
                s0 = s0_sim;
                s1 = s1_real;
            }
            proofs.push((a0, a1, e0, e1, s0, s1));
        }

        let mut out = Vec::with_capacity(RANGE_BITS * 32 + RANGE_BITS * 6 * 32);
        for c_i in &commitments {
            out.extend_from_slice(c_i.compress().as_bytes());
        }
        for (a0, a1, e0, e1, s0, s1) in &proofs {
            out.extend_from_slice(a0.compress().as_bytes());
            out.extend_from_slice(a1.compress().as_bytes());
            out.extend_from_slice(e0.as_bytes());
            out.extend_from_slice(e1.as_bytes());
            out.extend_from_slice(s0.as_bytes());
            out.extend_from_slice(s1.as_bytes());
        }
        out
    }

    fn range_verify(&self, proof: &[u8], commitment: &Commitment) -> bool {
        let expected_len = RANGE_BITS * 32 + RANGE_BITS * 6 * 32;
        if proof.len() != expected_len {
            return false;
        }
        let h = pedersen_h();
        let mut offset = 0;
        let mut commitments = Vec::with_capacity(RANGE_BITS);
        for _ in 0..RANGE_BITS {
            let mut b = [0u8; 32];
            b.copy_from_slice(&proof[offset..offset + 32]);
            offset += 32;
            match CompressedRistretto(b).decompress() {
                Some(p) => commitments.push(p),
                None => return false,
            }
        }
        let mut pow = Scalar::one();
        let two = Scalar::from(2u64);
        let mut reconstructed = commitments[0] - commitments[0];
        for c_i in &commitments {
            reconstructed += *c_i * pow;
            pow *= two;
        }
        let target = match CompressedRistretto(*commitment).decompress() {
            Some(p) => p,
            None => return false,
        };
        if reconstructed.compress() != target.compress() {
            return false;
        }

        for i in 0..RANGE_BITS {
            let mut read32 = || {
                let mut b = [0u8; 32];
                b.copy_from_slice(&proof[offset..offset + 32]);
                offset += 32;
                b
            };
            let a0b = read32();
            let a1b = read32();
            let e0b = read32();
            let e1b = read32();
            let s0b = read32();
            let s1b = read32();
            let (a0, a1) = match (CompressedRistretto(a0b).decompress(), CompressedRistretto(a1b).decompress()) {
                (Some(a0), Some(a1)) => (a0, a1),
                _ => return false,
            };
            let e0 = Scalar::from_bytes_mod_order(e0b);
            let e1 = Scalar::from_bytes_mod_order(e1b);
            let s0 = Scalar::from_bytes_mod_order(s0b);
            let s1 = Scalar::from_bytes_mod_order(s1b);

            let c = hash_to_scalar(
                b"valnode-core/range-bit/v1",
                &[
                    &(i as u32).to_le_bytes(),
                    commitments[i].compress().as_bytes(),
                    a0.compress().as_bytes(),
                    a1.compress().as_bytes(),
                ],
            );
            if e0 + e1 != c {
                return false;
            }
            let t0 = commitments[i];
            let t1 = commitments[i] - RISTRETTO_BASEPOINT_POINT;
            if h * s0 != a0 + t0 * e0 {
                return false;
            }
            if h * s1 != a1 + t1 * e1 {
                return false;
            }
        }
        true
    }
}

/// Extracts the key image embedded in a ring signature produced by
/// [`ReferenceCrypto::ring_sign`], without fully verifying the signature.
pub fn extract_key_image(sig_bytes: &[u8]) -> Option<[u8; 32]> {
    if sig_bytes.len() < 4 {
        return None;
    }
    let n = u32::from_le_bytes([sig_bytes[0], sig_bytes[1], sig_bytes[2], sig_bytes[3]]) as usize;
    let start = 4 + n * 32;
    if sig_bytes.len() < start + 32 {
        return None;
    }
    let mut image = [0u8; 32];
    image.copy_from_slice(&sig_bytes[start..start + 32]);
    Some(image)
}
