//! Diffie-Hellman key exchange over the fixed Winbox modulus.
//!
//! Pre-6.43 clients negotiate a session key with plain Diffie-Hellman over
//! a non-standard 1984-bit prime with generator 5. Both public values are
//! encoded as exactly 248 big-endian bytes, and the 248-byte shared secret
//! splits down the middle into the two directional cipher keys.
//!
//! # Security
//!
//! This exchange is unauthenticated by design - that is precisely what a
//! man-in-the-middle position exploits. The ephemeral secret is 128 bits,
//! matching the real client, and is zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use krait_proto::winbox::DhExchange;
//!
//! let server = DhExchange::new();
//! let client = DhExchange::new();
//!
//! let server_material = server.compute_shared(client.public_value()).unwrap();
//! let client_material = client.compute_shared(server.public_value()).unwrap();
//!
//! // Mirrored halves: one side's outbound key is the other's inbound key.
//! assert_eq!(server_material.outbound_key(), client_material.outbound_key());
//! ```

use num_bigint::BigUint;
use rand::thread_rng;
use zeroize::Zeroize;

use super::cipher::SESSION_KEY_LEN;
use super::error::{Error, Result};

/// Encoded public value and shared secret length (0xF8 bytes).
pub const PUBLIC_VALUE_LEN: usize = 0xF8;

/// Ephemeral secret size in bits, as generated by the real client.
const SECRET_BITS: u32 = 128;

/// Fixed group parameters.
///
/// The prime is a 1984-bit literal constant; it is not generated and does
/// not match any published MODP group.
mod group {
    use num_bigint::BigUint;
    use once_cell::sync::Lazy;

    /// Key exchange prime (1984-bit)
    pub static P: Lazy<BigUint> = Lazy::new(|| {
        BigUint::from_bytes_be(
            &hex::decode(
                "B7BA220582B41518F8526BFE0F624DE926106DFB4F719DD93BC4309D49045A41\
                 75DB1C58C4D7843D16E766226894B31793B13E789FFD2CF3331267476031B30D\
                 2F995237F0B59A33A4F972FB1A618556EF8F332E7A3C366B24FDB39B42B0670B\
                 1F90A3D2E8C22E78DDA51A16B46A8E693BB9AED29E8509361BD438E76B1C235F\
                 CDD11E70A2B8C0EA15A9DFEA03278F39C12520A0BC36F21694546154C82E065B\
                 2EFFD7DDEBD5C1E588F9916F87D80E91303C9435A20E91DD1C9360DEF6A2B0D5\
                 4FDA44049C0E8CC8A8049CBB1432C6E322D603F41DAA60028C40D78A8653F659\
                 C4FFC3F5D8A4E01A5C08E4B04B52388E9EF4A5E24569D15F"
                    .replace([' ', '\n'], "")
                    .as_str(),
            )
            .expect("Invalid hex"),
        )
    });

    /// Key exchange generator
    pub static G: Lazy<BigUint> = Lazy::new(|| BigUint::from(5u32));
}

/// One connection's half of the Diffie-Hellman exchange.
///
/// Created fresh per connection; never reused.
pub struct DhExchange {
    /// Ephemeral secret (x)
    secret: Vec<u8>,
    /// Public value (g^x mod p), 248 bytes big-endian
    public: Vec<u8>,
}

impl DhExchange {
    /// Generates a fresh exchange with a random 128-bit secret.
    pub fn new() -> Self {
        use num_bigint::RandBigInt;

        let mut rng = thread_rng();
        let upper = BigUint::from(1u32) << SECRET_BITS;
        let x = rng.gen_biguint_range(&BigUint::from(1u32), &upper);

        let y = group::G.modpow(&x, &group::P);

        Self {
            secret: x.to_bytes_be(),
            public: encode_fixed(&y),
        }
    }

    /// Returns the local public value, encoded as exactly 248 bytes.
    pub fn public_value(&self) -> &[u8] {
        &self.public
    }

    /// Computes the shared secret from the peer's public value.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidLength`] if the peer value is not exactly 248
    ///   bytes;
    /// - [`Error::Exchange`] if the value is `<= 1` or `>= p`. Such values
    ///   are treated as malicious and the connection is torn down.
    pub fn compute_shared(&self, peer_public: &[u8]) -> Result<SharedSecretMaterial> {
        if peer_public.len() != PUBLIC_VALUE_LEN {
            return Err(Error::InvalidLength {
                expected: PUBLIC_VALUE_LEN,
                actual: peer_public.len(),
            });
        }

        let y_peer = BigUint::from_bytes_be(peer_public);
        if y_peer <= BigUint::from(1u32) || y_peer >= *group::P {
            return Err(Error::Exchange(
                "peer public value out of range".to_string(),
            ));
        }

        let x = BigUint::from_bytes_be(&self.secret);
        let shared = y_peer.modpow(&x, &group::P);

        Ok(SharedSecretMaterial {
            material: encode_fixed(&shared),
        })
    }

    /// Builds an exchange from a caller-supplied secret.
    #[cfg(test)]
    fn with_secret(secret: &BigUint) -> Self {
        let y = group::G.modpow(secret, &group::P);
        Self {
            secret: secret.to_bytes_be(),
            public: encode_fixed(&y),
        }
    }
}

impl Default for DhExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DhExchange {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

/// The 248 shared-secret bytes produced by the exchange.
///
/// Split into two disjoint halves: the upper half keys the server-to-client
/// stream, the lower half the client-to-server stream. The material is
/// discarded (and zeroized) once the two cipher engines are seeded.
pub struct SharedSecretMaterial {
    material: Vec<u8>,
}

impl SharedSecretMaterial {
    /// Key for the server-to-client stream (bytes `[0x7C..0xF8)`).
    pub fn outbound_key(&self) -> &[u8] {
        &self.material[SESSION_KEY_LEN..]
    }

    /// Key for the client-to-server stream (bytes `[0x00..0x7C)`).
    pub fn inbound_key(&self) -> &[u8] {
        &self.material[..SESSION_KEY_LEN]
    }
}

impl Drop for SharedSecretMaterial {
    fn drop(&mut self) {
        self.material.zeroize();
    }
}

/// Encodes a value as a fixed 248-byte big-endian integer, left-padded
/// with zeros.
fn encode_fixed(value: &BigUint) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    let mut out = vec![0u8; PUBLIC_VALUE_LEN];
    out[PUBLIC_VALUE_LEN - bytes.len()..].copy_from_slice(&bytes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prime_parameters() {
        assert_eq!(group::P.bits(), 1984);
        assert_eq!(*group::G, BigUint::from(5u32));
    }

    #[test]
    fn test_exchange_agreement() {
        let server = DhExchange::new();
        let client = DhExchange::new();

        let a = server.compute_shared(client.public_value()).unwrap();
        let b = client.compute_shared(server.public_value()).unwrap();

        assert_eq!(a.material, b.material);
        assert_eq!(a.material.len(), PUBLIC_VALUE_LEN);
    }

    #[test]
    fn test_public_value_fixed_width() {
        for _ in 0..4 {
            let exchange = DhExchange::new();
            assert_eq!(exchange.public_value().len(), PUBLIC_VALUE_LEN);
        }
    }

    #[test]
    fn test_key_split_disjoint_and_complete() {
        let server = DhExchange::new();
        let client = DhExchange::new();
        let material = server.compute_shared(client.public_value()).unwrap();

        assert_eq!(material.inbound_key().len(), SESSION_KEY_LEN);
        assert_eq!(material.outbound_key().len(), SESSION_KEY_LEN);

        let mut rejoined = material.inbound_key().to_vec();
        rejoined.extend_from_slice(material.outbound_key());
        assert_eq!(rejoined, material.material);
    }

    #[test]
    fn test_known_shared_value() {
        // Reference vector: shared secret for a fixed pair of secrets.
        let a = BigUint::parse_bytes(b"0123456789abcdef0123456789abcdef", 16).unwrap();
        let b = BigUint::parse_bytes(b"fedcba9876543210fedcba9876543210", 16).unwrap();

        let alice = DhExchange::with_secret(&a);
        let bob = DhExchange::with_secret(&b);

        let shared = alice.compute_shared(bob.public_value()).unwrap();
        let mirror = bob.compute_shared(alice.public_value()).unwrap();
        assert_eq!(shared.material, mirror.material);

        let expected = "9bc586fdbaa65bc8a8f2766f5ed23f0ef85928648df6e7e298147b4b958a01da\
                        c76786f9016356f0359b6f47e036d9162b2074d4b05a53f4964656074c6203c7\
                        ba0971a2f3cf28d5af62d8be95d307daf968c8cc38e027964833861b6cda19e7\
                        649ea58e80c22b21512972eb770bb5b0e0afc44f3085c1d8645a186624793817\
                        aaebe48d220596a2eef80203c8971e6c87bb00cfe55b486fa890ce73d0936b91\
                        127970691d697f6f5e2c6394590b39a9a7360b241cd69896a86e13fc6011b4f5\
                        65aa2e277546733e860108d11c473f806312a789909756a21b400e2213a0a998\
                        8c5eaff308342aba72a60fe4f25ce7430b0e09f325643107";
        assert_eq!(hex::encode(&shared.material), expected);
    }

    #[test]
    fn test_peer_value_out_of_range() {
        let exchange = DhExchange::new();

        // Zero and one are degenerate.
        let zero = vec![0u8; PUBLIC_VALUE_LEN];
        assert!(matches!(
            exchange.compute_shared(&zero),
            Err(Error::Exchange(_))
        ));

        let mut one = vec![0u8; PUBLIC_VALUE_LEN];
        one[PUBLIC_VALUE_LEN - 1] = 1;
        assert!(matches!(
            exchange.compute_shared(&one),
            Err(Error::Exchange(_))
        ));

        // The prime itself and anything above it are rejected.
        let p = encode_fixed(&group::P);
        assert!(matches!(exchange.compute_shared(&p), Err(Error::Exchange(_))));

        let above = vec![0xFFu8; PUBLIC_VALUE_LEN];
        assert!(matches!(
            exchange.compute_shared(&above),
            Err(Error::Exchange(_))
        ));
    }

    #[test]
    fn test_peer_value_wrong_length() {
        let exchange = DhExchange::new();
        let short = vec![0x42u8; 16];
        assert!(matches!(
            exchange.compute_shared(&short),
            Err(Error::InvalidLength {
                expected: PUBLIC_VALUE_LEN,
                actual: 16
            })
        ));
    }
}
