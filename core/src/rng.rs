//! Stateless seeded randomness: every draw is a hash of `(seed, salt)`, so the same
//! seed reproduces a lattice or a scatter regardless of evaluation order.

pub fn splitmix32(mut value: u32) -> u32 {
    value = value.wrapping_add(0x9E37_79B9);
    let mut z = value;
    z = (z ^ (z >> 16)).wrapping_mul(0x85EB_CA6B);
    z = (z ^ (z >> 13)).wrapping_mul(0xC2B2_AE35);
    z ^ (z >> 16)
}

pub fn mix_seed(seed: u32, stream: u32) -> u32 {
    splitmix32(seed ^ stream.wrapping_mul(0x9E37_79B9))
}

/// Uniform in `[0, 1)`.
pub fn rand_unit(seed: u32, salt: u32) -> f32 {
    let mixed = splitmix32(seed ^ splitmix32(salt));
    let top = mixed >> 8;
    top as f32 / ((1u32 << 24) as f32)
}

pub fn rand_range(seed: u32, salt: u32, min: f32, max: f32) -> f32 {
    min + (max - min) * rand_unit(seed, salt)
}

/// Uniform in `[-1, 1)`.
pub fn rand_signed(seed: u32, salt: u32) -> f32 {
    rand_unit(seed, salt) * 2.0 - 1.0
}

pub fn rand_index(seed: u32, salt: u32, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    ((rand_unit(seed, salt) * len as f32) as usize).min(len - 1)
}
