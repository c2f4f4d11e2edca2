//! Fixed prompt wording for every expert. The fine-tuned models were trained
//! against these exact strings, so even misspellings ("binaires") stay.

use crate::gateway::types::ChatMessage;

pub const REVERSE_COMPLEMENT: &str =
    "You are a DNA analyzer. Please return the reverse complement of the following sequence.";

pub const BASE_COMPARISON_PAIRED: &str = "You are a DNA analyzer. Please compare the two partially complementary sequences and return a binary string corresponding to a valid or invalid base pairing.";

pub const BASE_COMPARISON_ALIGNED: &str = "You are a DNA analyzer. Please compare the two sequences and return a binary string corresponding to characters being identical or not.";

pub const BASE_PAIRING_WITH_COMPARISON: &str = "You are a DNA analyzer. Please compare the two sequences and the corresponding base comparison binary to generate two binaries representing where base pairing occurs.";

pub const BASE_PAIRING_SEQUENCES_ONLY: &str = "You are a DNA analyzer. Please compare the two sequences to generate two binaries representing where base pairing occurs.";

pub const BASE_PAIRING_STRUCTURE: &str = "You are a DNA analyzer. Please compare the two sequences and the corresponding base comparison binary to determine the secondary structure in dot-parens-plus notation.";

pub const STRUCTURE_CONVERSION: &str = "You are a DNA analyzer. Please take the base pairing binaires and convert them to parens-dot-plus notation.";

pub const STRUCTURE_CONVERSION_CHARS: &str = "You are a DNA analyzer. Please take the base pairing binaires and convert the characters to parens-dot notation.";

pub const SECONDARY_STRUCTURE: &str = "You are a DNA analyzer. Please take the following DNA sequence pair and produce the secondary structure in parens-dot-plus notation.";

pub const FREE_ENERGY: &str = "You are a DNA analyzer. Please analyze the following DNA sequence pair and determine the corresponding minimum free energy in kcal/mol.";

pub const FREE_ENERGY_WITH_STRUCTURE: &str = "You are a DNA analyzer. Please analyze the following DNA sequence pair and secondary structure to determine the corresponding minimum free energy in kcal/mol.";

pub const SEQUENCE_DESIGN: &str = "You are a DNA designer. Please design a pair of DNA sequences that will form the following secondary structure.";

fn messages(system: &str, user: String) -> Vec<ChatMessage> {
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

pub fn reverse_complement_messages(seq_b: &str) -> Vec<ChatMessage> {
    messages(REVERSE_COMPLEMENT, seq_b.to_string())
}

pub fn base_comparison_paired_messages(seq_a: &str, seq_b: &str) -> Vec<ChatMessage> {
    messages(BASE_COMPARISON_PAIRED, format!("{seq_a} {seq_b}"))
}

pub fn base_comparison_aligned_messages(seq_a: &str, aligned_b: &str) -> Vec<ChatMessage> {
    messages(BASE_COMPARISON_ALIGNED, format!("{seq_a} {aligned_b}"))
}

pub fn base_pairing_with_comparison_messages(
    seq_a: &str,
    aligned_b: &str,
    comparison: &str,
) -> Vec<ChatMessage> {
    messages(
        BASE_PAIRING_WITH_COMPARISON,
        format!("{seq_a} {aligned_b} {comparison}"),
    )
}

pub fn base_pairing_sequences_only_messages(seq_a: &str, aligned_b: &str) -> Vec<ChatMessage> {
    messages(BASE_PAIRING_SEQUENCES_ONLY, format!("{seq_a} {aligned_b}"))
}

pub fn base_pairing_structure_messages(
    seq_a: &str,
    aligned_b: &str,
    comparison: &str,
) -> Vec<ChatMessage> {
    messages(
        BASE_PAIRING_STRUCTURE,
        format!("{seq_a} {aligned_b} {comparison}"),
    )
}

pub fn structure_conversion_messages(mask_halves: &str) -> Vec<ChatMessage> {
    messages(STRUCTURE_CONVERSION, mask_halves.to_string())
}

pub fn structure_conversion_chars_messages(mask_halves: &str) -> Vec<ChatMessage> {
    messages(STRUCTURE_CONVERSION_CHARS, mask_halves.to_string())
}

pub fn secondary_structure_messages(seq_a: &str, seq_b: &str) -> Vec<ChatMessage> {
    messages(SECONDARY_STRUCTURE, format!("{seq_a} {seq_b}"))
}

pub fn free_energy_messages(seq_a: &str, second_strand: &str) -> Vec<ChatMessage> {
    messages(FREE_ENERGY, format!("{seq_a} {second_strand}"))
}

pub fn free_energy_with_structure_messages(
    seq_a: &str,
    aligned_b: &str,
    structure: &str,
) -> Vec<ChatMessage> {
    messages(
        FREE_ENERGY_WITH_STRUCTURE,
        format!("{seq_a} {aligned_b} {structure}"),
    )
}

pub fn sequence_design_messages(structure: &str) -> Vec<ChatMessage> {
    messages(SEQUENCE_DESIGN, structure.to_string())
}
