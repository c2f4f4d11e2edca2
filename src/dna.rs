pub fn reverse_complement(sequence: &str) -> String {
    sequence
        .chars()
        .rev()
        .map(|base| match base {
            'A' => 'T',
            'T' => 'A',
            'C' => 'G',
            'G' => 'C',
            other => other,
        })
        .collect()
}

/// Binary string with '1' wherever the two aligned strands carry the same
/// symbol at a position.
pub fn base_comparison(seq_a: &str, aligned_b: &str) -> String {
    seq_a
        .chars()
        .zip(aligned_b.chars())
        .map(|(a, b)| if a == b { '1' } else { '0' })
        .collect()
}

/// First strand's half as written, second strand's half reversed so both
/// halves read in the first strand's direction.
pub fn split_halves(text: &str, strand_len: usize) -> (String, String) {
    let first = text.chars().take(strand_len).collect();
    let second = text.chars().rev().take(strand_len).collect();
    (first, second)
}

pub fn joined_halves(text: &str, strand_len: usize) -> String {
    let (first, second) = split_halves(text, strand_len);
    format!("{first} {second}")
}
