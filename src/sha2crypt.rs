//! The SHA-2 family crypt calculation shared by the SHA-256 and
//! SHA-512 schemes.

use digest::Digest;

use crate::cryptoutil::permute;

/// Performs the raw SHA-2 family crypt calculation.
pub(crate) fn encrypt<D: Digest>(
    password: &[u8],
    salt: &[u8],
    rounds: u32,
    permutation: &[u8],
) -> Vec<u8> {
    let size = <D as Digest>::output_size();
    let db = D::new()
        .chain_update(password)
        .chain_update(salt)
        .chain_update(password)
        .finalize();
    let mut ha = D::new();
    ha.update(password);
    ha.update(salt);
    let mut i = password.len();
    while i > size {
        ha.update(&db);
        i -= size;
    }
    ha.update(&db[..i]);
    let mut i = password.len();
    while i > 0 {
        if i & 1 != 0 {
            ha.update(&db);
        } else {
            ha.update(password);
        }
        i >>= 1;
    }
    let da = ha.finalize();
    let mut hp = D::new();
    for _ in 0..password.len() {
        hp.update(password);
    }
    let p = repeat_to(&hp.finalize(), password.len());
    let mut hs = D::new();
    for _ in 0..16 + da[0] as usize {
        hs.update(salt);
    }
    let s = repeat_to(&hs.finalize(), salt.len());
    let mut dc = da.to_vec();
    for i in 0..rounds {
        let mut hc = D::new();
        if i & 1 != 0 {
            hc.update(&p);
        } else {
            hc.update(&dc);
        }
        if i % 3 != 0 {
            hc.update(&s);
        }
        if i % 7 != 0 {
            hc.update(&p);
        }
        if i & 1 != 0 {
            hc.update(&dc);
        } else {
            hc.update(&p);
        }
        dc = hc.finalize().to_vec();
    }
    permute(&dc, permutation)
}

fn repeat_to(b: &[u8], n: usize) -> Vec<u8> {
    b.iter().copied().cycle().take(n).collect()
}
