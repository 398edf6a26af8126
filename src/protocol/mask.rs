//! Payload unmasking for client-to-server frames.

/// XOR `data` with `mask`, where `data[0]` sits at payload position
/// `offset`. The key cycles on the absolute payload position so a frame can
/// be unmasked in pieces as bytes arrive.
#[inline]
pub fn apply_mask_at(data: &mut [u8], mask: [u8; 4], offset: usize) {
    let phase = offset & 3;
    // Rotate the key so that data[0] lines up with mask[phase].
    let key = [
        mask[phase],
        mask[(phase + 1) & 3],
        mask[(phase + 2) & 3],
        mask[(phase + 3) & 3],
    ];
    apply_mask_words(data, key);
}

/// XOR `data` with `mask`, starting at payload position zero.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    apply_mask_words(data, mask);
}

/// Processes 4 bytes at a time using u32 operations, then the tail.
#[inline]
fn apply_mask_words(data: &mut [u8], mask: [u8; 4]) {
    let mask_u32 = u32::from_ne_bytes(mask);
    let mut chunks = data.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let val = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        chunk.copy_from_slice(&(val ^ mask_u32).to_ne_bytes());
    }
    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= mask[i];
    }
}
