//! The command language of the plotter.
//!
//! A step command says, for a single time step, what each of the two motors
//! and the pen should do. Each of these three channels gets one of three
//! symbols: `'+'` (lengthen the cable, or put the pen down), `'-'` (shorten
//! the cable, or lift the pen) and anything else, conventionally `'.'`,
//! meaning "do nothing".
//!
//! Commands are packed into six bits, two per channel.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::vec::Vec;
use core::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[cfg(feature = "std")]
pub mod file;

const LEFT_SHIFT: u8 = 4;
const RIGHT_SHIFT: u8 = 2;
const PEN_SHIFT: u8 = 0;
const CHANNEL_MASK: u8 = 0b11;
const CODE_MASK: u8 = 0b11_1111;

pub const POS_CHAR: char = '+';
pub const NEG_CHAR: char = '-';
pub const NOP_CHAR: char = '.';

/// What a single channel does during one step.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbol {
    #[default]
    Nop,
    Pos,
    Neg,
}

impl Symbol {
    pub fn from_char(c: char) -> Symbol {
        match c {
            POS_CHAR => Symbol::Pos,
            NEG_CHAR => Symbol::Neg,
            _ => Symbol::Nop,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Symbol::Pos => POS_CHAR,
            Symbol::Neg => NEG_CHAR,
            Symbol::Nop => NOP_CHAR,
        }
    }

    fn bits(self) -> u8 {
        match self {
            Symbol::Nop => 0b00,
            Symbol::Pos => 0b01,
            Symbol::Neg => 0b10,
        }
    }

    // 0b11 is never produced by `bits`, and we read it as a no-op.
    fn from_bits(bits: u8) -> Symbol {
        match bits & CHANNEL_MASK {
            0b01 => Symbol::Pos,
            0b10 => Symbol::Neg,
            _ => Symbol::Nop,
        }
    }
}

/// A single packed step: left motor in bits 4-5, right motor in bits 2-3
/// and pen in bits 0-1.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepCommand(u8);

impl StepCommand {
    pub fn new(left: Symbol, right: Symbol, pen: Symbol) -> StepCommand {
        StepCommand(
            (left.bits() << LEFT_SHIFT) | (right.bits() << RIGHT_SHIFT) | (pen.bits() << PEN_SHIFT),
        )
    }

    /// Wraps a packed code. Only the low six bits are kept.
    pub fn from_code(code: u8) -> StepCommand {
        StepCommand(code & CODE_MASK)
    }

    pub fn code(self) -> u8 {
        self.0
    }

    pub fn left(self) -> Symbol {
        Symbol::from_bits(self.0 >> LEFT_SHIFT)
    }

    pub fn right(self) -> Symbol {
        Symbol::from_bits(self.0 >> RIGHT_SHIFT)
    }

    pub fn pen(self) -> Symbol {
        Symbol::from_bits(self.0 >> PEN_SHIFT)
    }

    pub fn from_chars(symbols: [char; 3]) -> StepCommand {
        StepCommand::new(
            Symbol::from_char(symbols[0]),
            Symbol::from_char(symbols[1]),
            Symbol::from_char(symbols[2]),
        )
    }

    pub fn to_chars(self) -> [char; 3] {
        [
            self.left().to_char(),
            self.right().to_char(),
            self.pen().to_char(),
        ]
    }
}

impl fmt::Display for StepCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [l, r, p] = self.to_chars();
        write!(f, "{l}{r}{p}")
    }
}

impl fmt::Debug for StepCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StepCommand({self})")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("a step has exactly 3 characters, found {0}")]
pub struct ParseStepError(pub usize);

impl FromStr for StepCommand {
    type Err = ParseStepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next(), chars.next(), chars.next()) {
            (Some(l), Some(r), Some(p), None) => Ok(StepCommand::from_chars([l, r, p])),
            _ => Err(ParseStepError(s.chars().count())),
        }
    }
}

/// Packs three symbols into a code in `0..64`.
pub fn encode_step(symbols: [char; 3]) -> u8 {
    StepCommand::from_chars(symbols).code()
}

/// Unpacks a code into its three symbols. Bits above the sixth are ignored.
pub fn decode_step(code: u8) -> [char; 3] {
    StepCommand::from_code(code).to_chars()
}

/// Step commands in the order they should be carried out.
///
/// There's no way to modify a sequence once it's built: when the steps
/// change, build a new one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSequence {
    steps: Vec<StepCommand>,
}

impl StepSequence {
    pub fn new(steps: Vec<StepCommand>) -> StepSequence {
        StepSequence { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn as_slice(&self) -> &[StepCommand] {
        &self.steps
    }

    pub fn iter(&self) -> core::slice::Iter<'_, StepCommand> {
        self.steps.iter()
    }
}

impl From<Vec<StepCommand>> for StepSequence {
    fn from(steps: Vec<StepCommand>) -> Self {
        StepSequence::new(steps)
    }
}

impl FromIterator<StepCommand> for StepSequence {
    fn from_iter<I: IntoIterator<Item = StepCommand>>(iter: I) -> Self {
        StepSequence::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a StepSequence {
    type Item = &'a StepCommand;
    type IntoIter = core::slice::Iter<'a, StepCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALPHABET: [char; 3] = [POS_CHAR, NEG_CHAR, NOP_CHAR];

    fn all_triplets() -> impl Iterator<Item = [char; 3]> {
        ALPHABET.into_iter().flat_map(|l| {
            ALPHABET
                .into_iter()
                .flat_map(move |r| ALPHABET.into_iter().map(move |p| [l, r, p]))
        })
    }

    impl Arbitrary for Symbol {
        type Parameters = ();
        type Strategy = BoxedStrategy<Symbol>;

        fn arbitrary_with(_: ()) -> Self::Strategy {
            prop_oneof![Just(Symbol::Nop), Just(Symbol::Pos), Just(Symbol::Neg)].boxed()
        }
    }

    #[test]
    fn known_code() {
        assert_eq!(encode_step(['+', '-', '.']), 0b01_10_00);
        assert_eq!(encode_step(['.', '.', '+']), 0b00_00_01);
        assert_eq!(encode_step(['-', '-', '-']), 0b10_10_10);
    }

    #[test]
    fn round_trip() {
        for t in all_triplets() {
            assert_eq!(decode_step(encode_step(t)), t);
        }
    }

    #[test]
    fn codes_in_range() {
        let mut seen = alloc::collections::BTreeSet::new();
        for t in all_triplets() {
            let code = encode_step(t);
            assert!(code < 64);
            seen.insert(code);
        }
        assert_eq!(seen.len(), 27);
    }

    #[test]
    fn reserved_bits_are_nop() {
        assert_eq!(decode_step(0b11_11_11), ['.', '.', '.']);
        assert_eq!(decode_step(0b01_11_10), ['+', '.', '-']);
    }

    #[test]
    fn high_bits_are_ignored() {
        assert_eq!(decode_step(0b1100_0001), ['.', '.', '+']);
        assert_eq!(StepCommand::from_code(0xff).code(), 0b11_1111);
    }

    #[test]
    fn other_chars_are_nop() {
        assert_eq!(encode_step(['x', ' ', '0']), 0);
        assert_eq!(decode_step(encode_step(['x', '+', '?'])), ['.', '+', '.']);
    }

    #[test]
    fn parse() {
        let step: StepCommand = "+.-".parse().unwrap();
        assert_eq!(step.left(), Symbol::Pos);
        assert_eq!(step.right(), Symbol::Nop);
        assert_eq!(step.pen(), Symbol::Neg);
        assert_eq!(step.to_string(), "+.-");

        assert_eq!("+-".parse::<StepCommand>(), Err(ParseStepError(2)));
        assert_eq!("+-.+".parse::<StepCommand>(), Err(ParseStepError(4)));
    }

    proptest! {
        #[test]
        fn channels_are_independent(left: Symbol, right: Symbol, pen: Symbol) {
            let step = StepCommand::new(left, right, pen);
            assert_eq!(step.left(), left);
            assert_eq!(step.right(), right);
            assert_eq!(step.pen(), pen);
        }
    }
}
