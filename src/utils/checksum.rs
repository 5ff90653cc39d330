/// XOR of every little-endian u32 word in `data`, seed 0.
/// Trailing bytes that do not fill a whole word are ignored.
pub fn fold(data: &[u8]) -> u32 {
    data.chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .fold(0, |acc, word| acc ^ word)
}
