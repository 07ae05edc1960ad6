//! Threshold BLS signatures over BN254.
//!
//! Signatures live in G1, public keys in G2. The dealer samples a degree
//! `t - 1` polynomial `f`; member `i` receives `f(id_i)` where `id_i` is the
//! hash of its address into the scalar field. Any `t` signature shares
//! `σ_i = f(id_i) · H(m)` recover `σ = f(0) · H(m)` through Lagrange
//! interpolation at zero, which verifies against `f(0) · g2`.

pub mod error;
mod hashing;

#[cfg(test)]
mod tests;

use ark_bn254::{Bn254, Fq, Fr, G1Affine, G1Projective, G2Affine};
use ark_ec::{pairing::Pairing, AffineRepr, CurveGroup};
use ark_ff::{BigInteger, Field, One, PrimeField, UniformRand, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use core::fmt;
use rand::{CryptoRng, Rng};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub use error::{CryptoError, Result};
pub use hashing::{sha2_256, sha2_256_tagged};

/// Domain tag mixed into every member-id derivation.
pub const MEMBER_ID_TAG: &[u8] = b"beacon/member-id/v1";

/// Length in bytes of the entropy derived from an aggregate signature.
pub const ENTROPY_LEN: usize = 32;

/// Serialize this to a vector of bytes.
pub fn to_bytes<T: CanonicalSerialize>(elt: &T) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(elt.compressed_size());
    elt.serialize_compressed(&mut bytes)?;
    Ok(bytes)
}

/// Deserialize this from a slice of bytes, validating curve membership.
pub fn from_bytes<T: CanonicalDeserialize>(bytes: &[u8]) -> Result<T> {
    Ok(T::deserialize_compressed(bytes)?)
}

macro_rules! impl_ark_serde {
    ($name:ident) => {
        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(
                &self,
                serializer: S,
            ) -> core::result::Result<S::Ok, S::Error> {
                let bytes = to_bytes(&self.0).map_err(serde::ser::Error::custom)?;
                serializer.serialize_bytes(&bytes)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let bytes = <Vec<u8>>::deserialize(deserializer)?;
                let inner = from_bytes(&bytes).map_err(serde::de::Error::custom)?;
                Ok($name(inner))
            }
        }
    };
}

/// A cabinet member's identity in the scalar field.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberId(pub Fr);

/// A member's secret share `f(id)`. Wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretShare(pub Fr);

/// A BLS public key in G2; used both for the shared key and per-share keys.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PublicKey(pub G2Affine);

/// A BLS signature (or signature share) in G1.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Signature(pub G1Affine);

impl_ark_serde!(MemberId);
impl_ark_serde!(SecretShare);
impl_ark_serde!(PublicKey);
impl_ark_serde!(Signature);

impl MemberId {
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Debug for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemberId({})", self)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.into_bigint().to_bytes_be();
        let tail = &bytes[bytes.len().saturating_sub(4)..];
        write!(f, "{}", hex::encode(tail))
    }
}

impl SecretShare {
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// The share's public key `share · g2`.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey(
            G2Affine::generator()
                .mul_bigint(self.0.into_bigint())
                .into_affine(),
        )
    }
}

impl PublicKey {
    /// Whether this is the point at infinity.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.0.infinity
    }
}

impl fmt::Debug for SecretShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretShare(<redacted>)")
    }
}

/// Deterministically map an address to its threshold identity.
#[must_use]
pub fn hash_to_id(address: &[u8]) -> MemberId {
    let digest = sha2_256_tagged(MEMBER_ID_TAG, address);
    MemberId(Fr::from_be_bytes_mod_order(&digest))
}

/// The dealer's ephemeral polynomial. Coefficients are wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKeyPolynomial {
    coefficients: Vec<Fr>,
}

impl MasterKeyPolynomial {
    /// Sample a random polynomial with `threshold` coefficients (degree `threshold - 1`).
    pub fn generate<R: Rng + CryptoRng + ?Sized>(threshold: usize, rng: &mut R) -> Result<Self> {
        if threshold == 0 {
            return Err(CryptoError::InvalidThreshold(threshold));
        }

        let coefficients = (0..threshold).map(|_| Fr::rand(rng)).collect();
        Ok(Self { coefficients })
    }

    #[must_use]
    pub fn threshold(&self) -> usize {
        self.coefficients.len()
    }

    /// `f(0) · g2`
    #[must_use]
    pub fn shared_public_key(&self) -> PublicKey {
        let secret = self.coefficients.first().copied().unwrap_or_else(Fr::zero);
        PublicKey(
            G2Affine::generator()
                .mul_bigint(secret.into_bigint())
                .into_affine(),
        )
    }

    /// Evaluate the polynomial at `id` using Horner's method.
    pub fn derive_share(&self, id: &MemberId) -> Result<SecretShare> {
        if id.is_zero() {
            return Err(CryptoError::ZeroMemberId);
        }

        let mut result = Fr::zero();
        for coeff in self.coefficients.iter().rev() {
            result = result * id.0 + coeff;
        }
        Ok(SecretShare(result))
    }
}

impl fmt::Debug for MasterKeyPolynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKeyPolynomial")
            .field("threshold", &self.coefficients.len())
            .finish_non_exhaustive()
    }
}

fn hash_to_curve(digest: &[u8]) -> G1Affine {
    let one = Fq::one();
    let three = Fq::from(3u64);

    let mut x = Fq::from_be_bytes_mod_order(&sha2_256(digest));

    loop {
        // y^2 = x^3 + 3
        let mut y = x;
        y.square_in_place();
        y *= x;
        y += three;

        // BN254 G1 has cofactor one, so any point on the curve is in the subgroup
        if let Some(y) = y.sqrt() {
            return G1Affine::new_unchecked(x, y);
        }
        x += one;
    }
}

/// Sign `payload` with a secret share (or any secret scalar).
pub fn sign(share: &SecretShare, payload: &[u8]) -> Result<Signature> {
    let q = hash_to_curve(payload);
    let r = q.mul_bigint(share.0.into_bigint()).into_affine();

    if !r.is_on_curve() || !r.is_in_correct_subgroup_assuming_on_curve() {
        return Err(CryptoError::SignatureNotInSubgroup);
    }

    Ok(Signature(r))
}

/// Check `e(H(payload), pk) == e(signature, g2)`.
#[must_use]
pub fn verify(signature: &Signature, public_key: &PublicKey, payload: &[u8]) -> bool {
    let signature = signature.0;
    if !signature.is_on_curve() || !signature.is_in_correct_subgroup_assuming_on_curve() {
        return false;
    }

    let q = hash_to_curve(payload);
    let c1 = Bn254::pairing(q, public_key.0);
    let c2 = Bn254::pairing(signature, G2Affine::generator());
    c1 == c2
}

/// Lagrange coefficient for `id` over `ids`, evaluated at zero.
///
/// λ_i = Π_{j≠i} x_j / (x_j - x_i)
pub fn lagrange_coefficient(id: &MemberId, ids: &[MemberId]) -> Result<Fr> {
    let mut numerator = Fr::one();
    let mut denominator = Fr::one();

    for other in ids {
        if other == id {
            continue;
        }
        numerator *= other.0;
        denominator *= other.0 - id.0;
    }

    let inverse = denominator
        .inverse()
        .ok_or(CryptoError::LagrangeInterpolationFailed)?;
    Ok(numerator * inverse)
}

/// Combine signature shares into the group signature `σ = Σ λ_i · σ_i`.
///
/// Every supplied share takes part in the interpolation, so the caller
/// decides which subset to use. At least `threshold` shares are required.
pub fn recover_group_signature(
    shares: &[(MemberId, Signature)],
    threshold: usize,
) -> Result<Signature> {
    if threshold == 0 {
        return Err(CryptoError::InvalidThreshold(threshold));
    }
    if shares.len() < threshold {
        return Err(CryptoError::InsufficientShares {
            required: threshold,
            got: shares.len(),
        });
    }

    let ids: Vec<MemberId> = shares.iter().map(|(id, _)| *id).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() != ids.len() {
        return Err(CryptoError::DuplicateShareId);
    }

    let mut result = G1Projective::zero();
    for (id, signature) in shares {
        let lambda = lagrange_coefficient(id, &ids)?;
        result += signature.0.mul_bigint(lambda.into_bigint());
    }

    Ok(Signature(result.into_affine()))
}

/// Entropy derived from an aggregate signature: `SHA-256(compressed σ)`.
pub fn entropy_from_signature(signature: &Signature) -> Result<[u8; ENTROPY_LEN]> {
    Ok(sha2_256(&to_bytes(&signature.0)?))
}
