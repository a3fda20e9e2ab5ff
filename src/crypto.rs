use aes::Aes256;
use chacha20poly1305::{
    aead::{generic_array::GenericArray, AeadInPlace, Error as AeadError, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use ctr::cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;
use rand_core::RngCore;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 24;
pub const TAG_LEN: usize = 16;
pub const AES_IV_LEN: usize = 16;

type Aes256Ctr = Ctr128BE<Aes256>;

pub type Key = [u8; KEY_LEN];

/// Detached AEAD ciphertext of a fixed-size plaintext.
#[derive(Clone, Debug)]
pub struct CtBlob<const PT_LEN: usize> {
    pub nonce: [u8; NONCE_LEN],
    pub ct: [u8; PT_LEN],
    pub tag: [u8; TAG_LEN],
}

pub fn rand_bytes<const N: usize>(rng: &mut impl RngCore) -> [u8; N] {
    let mut out = [0u8; N];
    rng.fill_bytes(&mut out);
    out
}

/// Keyed blake3 over length-prefixed parts, domain separated by `dst`.
pub fn prf(key: &Key, dst: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut h = blake3::Hasher::new_keyed(key);
    h.update(dst);
    for p in parts {
        h.update(&(p.len() as u64).to_le_bytes());
        h.update(p);
    }
    *h.finalize().as_bytes()
}

pub fn xchacha_encrypt_detached<const PT_LEN: usize>(
    key: &Key,
    aad: &[u8],
    plaintext: &[u8; PT_LEN],
    rng: &mut impl RngCore,
) -> Result<CtBlob<PT_LEN>, AeadError> {
    let cipher = XChaCha20Poly1305::new(GenericArray::from_slice(key));

    let nonce: [u8; NONCE_LEN] = rand_bytes(rng);
    let xnonce = XNonce::from_slice(&nonce);

    let mut ct = *plaintext;
    let tag = cipher.encrypt_in_place_detached(xnonce, aad, &mut ct)?;

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_slice());

    Ok(CtBlob {
        nonce,
        ct,
        tag: tag_bytes,
    })
}

pub fn xchacha_decrypt_detached<const PT_LEN: usize>(
    key: &Key,
    aad: &[u8],
    blob: &CtBlob<PT_LEN>,
) -> Result<[u8; PT_LEN], AeadError> {
    let cipher = XChaCha20Poly1305::new(GenericArray::from_slice(key));
    let xnonce = XNonce::from_slice(&blob.nonce);

    let mut pt = blob.ct;
    let tag = GenericArray::from_slice(&blob.tag);

    cipher.decrypt_in_place_detached(xnonce, aad, &mut pt, tag)?;
    Ok(pt)
}

/// AES-256-CTR keystream XOR, in place. Encrypt and decrypt are the same call.
pub fn aes256ctr_apply(key: &Key, iv: &[u8; AES_IV_LEN], buf: &mut [u8]) {
    let mut cipher = Aes256Ctr::new(&(*key).into(), &(*iv).into());
    cipher.apply_keystream(buf);
}
