use thiserror::Error;

/// Marker the rationale-trained experts emit between their working and the
/// final answer.
pub const ANSWER_DELIMITER: &str = "ans:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAlphabet {
    Binary,
    Nucleotides,
    /// Structure symbols legal on the first strand.
    OpenStrand,
    /// Structure symbols legal on the second strand.
    CloseStrand,
}

impl TokenAlphabet {
    fn admits(&self, symbol: char) -> bool {
        match self {
            TokenAlphabet::Binary => matches!(symbol, '0' | '1'),
            TokenAlphabet::Nucleotides => matches!(symbol, 'A' | 'C' | 'G' | 'T'),
            TokenAlphabet::OpenStrand => matches!(symbol, '(' | '.'),
            TokenAlphabet::CloseStrand => matches!(symbol, ')' | '.'),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenShape {
    pub len: usize,
    pub alphabet: TokenAlphabet,
}

/// Syntactic contract a stage's reply must satisfy before it is merged into
/// pipeline state. Checking never consults ground truth; a reply can be
/// well-shaped and still wrong.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputShape {
    /// A single strand over ACGT of exactly `len` symbols.
    Nucleotides { len: usize },
    /// Space-separated tokens, each with its own length and alphabet.
    Tokens { tokens: Vec<TokenShape> },
    /// A duplex structure over `().+` of exactly `len` symbols.
    Structure { len: usize },
    /// A plain decimal number, sign and fraction allowed.
    Scalar,
    /// Free-form working followed by `ans:` and an inner-shaped answer. The
    /// accepted value is the answer alone.
    Rationale { inner: Box<OutputShape> },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeViolation {
    #[error("expected length {expected}, got {found}")]
    WrongLength { expected: usize, found: usize },
    #[error("symbol '{symbol}' is not allowed here")]
    ForbiddenSymbol { symbol: char },
    #[error("expected {expected} space-separated tokens, got {found}")]
    WrongTokenCount { expected: usize, found: usize },
    #[error("answer delimiter '{ANSWER_DELIMITER}' missing or repeated")]
    BadDelimiter,
    #[error("not a decimal number")]
    NotANumber,
}

impl OutputShape {
    pub fn nucleotides(len: usize) -> Self {
        OutputShape::Nucleotides { len }
    }

    pub fn structure(len: usize) -> Self {
        OutputShape::Structure { len }
    }

    pub fn binary(len: usize) -> Self {
        OutputShape::Tokens {
            tokens: vec![TokenShape { len, alphabet: TokenAlphabet::Binary }],
        }
    }

    pub fn binary_pair(len: usize) -> Self {
        OutputShape::Tokens {
            tokens: vec![
                TokenShape { len, alphabet: TokenAlphabet::Binary },
                TokenShape { len, alphabet: TokenAlphabet::Binary },
            ],
        }
    }

    pub fn structure_halves(len: usize) -> Self {
        OutputShape::Tokens {
            tokens: vec![
                TokenShape { len, alphabet: TokenAlphabet::OpenStrand },
                TokenShape { len, alphabet: TokenAlphabet::CloseStrand },
            ],
        }
    }

    pub fn strand_pair(len: usize) -> Self {
        OutputShape::Tokens {
            tokens: vec![
                TokenShape { len, alphabet: TokenAlphabet::Nucleotides },
                TokenShape { len, alphabet: TokenAlphabet::Nucleotides },
            ],
        }
    }

    pub fn rationale(inner: OutputShape) -> Self {
        OutputShape::Rationale { inner: Box::new(inner) }
    }

    /// Validates `raw` and returns the value to merge into pipeline state.
    /// For most shapes that is `raw` itself; rationale shapes strip the
    /// working and keep only what follows the delimiter.
    pub fn check(&self, raw: &str) -> Result<String, ShapeViolation> {
        match self {
            OutputShape::Nucleotides { len } => {
                check_symbols(raw, *len, TokenAlphabet::Nucleotides)
            }
            OutputShape::Structure { len } => {
                let found = raw.chars().count();
                if found != *len {
                    return Err(ShapeViolation::WrongLength { expected: *len, found });
                }
                if let Some(symbol) = raw.chars().find(|c| !matches!(c, '(' | ')' | '.' | '+')) {
                    return Err(ShapeViolation::ForbiddenSymbol { symbol });
                }
                Ok(raw.to_string())
            }
            OutputShape::Tokens { tokens } => {
                let parts: Vec<&str> = raw.split(' ').collect();
                if parts.len() != tokens.len() {
                    return Err(ShapeViolation::WrongTokenCount {
                        expected: tokens.len(),
                        found: parts.len(),
                    });
                }
                for (part, token) in parts.iter().zip(tokens) {
                    check_symbols(part, token.len, token.alphabet)?;
                }
                Ok(raw.to_string())
            }
            OutputShape::Scalar => check_scalar(raw),
            OutputShape::Rationale { inner } => {
                let parts: Vec<&str> = raw.split(ANSWER_DELIMITER).collect();
                if parts.len() != 2 {
                    return Err(ShapeViolation::BadDelimiter);
                }
                inner.check(parts[1])
            }
        }
    }
}

fn check_symbols(raw: &str, len: usize, alphabet: TokenAlphabet) -> Result<String, ShapeViolation> {
    let found = raw.chars().count();
    if found != len {
        return Err(ShapeViolation::WrongLength { expected: len, found });
    }
    if let Some(symbol) = raw.chars().find(|c| !alphabet.admits(*c)) {
        return Err(ShapeViolation::ForbiddenSymbol { symbol });
    }
    Ok(raw.to_string())
}

fn check_scalar(raw: &str) -> Result<String, ShapeViolation> {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    let mut seen_digit = false;
    let mut seen_dot = false;
    for symbol in digits.chars() {
        match symbol {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => return Err(ShapeViolation::NotANumber),
        }
    }
    if !seen_digit {
        return Err(ShapeViolation::NotANumber);
    }
    Ok(raw.to_string())
}
