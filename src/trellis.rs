//! Trellis model of a recursive systematic convolutional encoder

use crate::{Bit, Error};

/// Single state transition: next state and output symbol labels
#[derive(Clone, Eq, PartialEq, Debug, Copy)]
pub struct Transition {
    /// Next state index
    pub next: usize,
    /// Systematic output bit label
    pub sys: Bit,
    /// Parity output bit label
    pub par: Bit,
}

/// Finite-state-machine description of a rate-1/2 RSC encoder
///
/// The trellis is an immutable table with one [`Transition`] per (state, input bit) pair, shared
/// read-only by every decode call. The state count is always a power of two; its base-2 logarithm
/// is the encoder memory length (number of flip-flops). Each state additionally carries the
/// tail-closing input bit that steers the encoder back towards the all-zero state.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Trellis {
    /// Number of states
    num_states: usize,
    /// Memory length (number of flip-flops)
    memory_len: usize,
    /// One transition per (state, input bit) pair
    transitions: Vec<[Transition; 2]>,
    /// Input bit that closes the feedback register, per state
    tail_inputs: Vec<Bit>,
}

impl Trellis {
    /// Returns trellis for the RSC encoder with given code polynomials.
    ///
    /// # Parameters
    ///
    /// - `code_polynomials`: Integer representations of the two generator polynomials for the
    ///   code. The first element is taken as the feedback polynomial (this corresponds to the
    ///   systematic bit), and the second as the feedforward polynomial (this corresponds to the
    ///   parity bit). For a code of constraint length `L`, the feedback polynomial must be in the
    ///   range `(2^(L-1), 2^L)`, and the feedforward polynomial must be in the range `[1, 2^L)`
    ///   and different from the feedback polynomial.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of code polynomials is not `2`, if the feedback polynomial
    /// is either `0` or a power of `2`, or if the feedforward polynomial is either not in the
    /// range `[1, 2^L)` or equals the feedback polynomial.
    ///
    /// # Examples
    ///
    /// ```
    /// use sisodec::Trellis;
    ///
    /// let trellis = Trellis::from_polynomials(&[0o13, 0o15])?;
    /// assert_eq!(trellis.num_states(), 8);
    /// assert_eq!(trellis.memory_len(), 3);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_polynomials(code_polynomials: &[usize]) -> Result<Self, Error> {
        let constraint_len = constraint_length(code_polynomials)?;
        let memory_len = constraint_len - 1;
        let num_states = 1 << memory_len;
        let feedback = code_polynomials[0];
        let feedforward = code_polynomials[1];
        let mut transitions = Vec::with_capacity(num_states);
        let mut tail_inputs = Vec::with_capacity(num_states);
        for state in 0 .. num_states {
            let mut per_input = [Transition {
                next: 0,
                sys: Bit::Zero,
                par: Bit::Zero,
            }; 2];
            for input in 0 .. 2 {
                let feedback_bit = bitxor((state + input * num_states) & feedback);
                let augmented = state + (feedback_bit as usize) * num_states;
                per_input[input] = Transition {
                    next: augmented >> 1,
                    sys: bit_from_index(input),
                    par: bitxor(augmented & feedforward),
                };
            }
            transitions.push(per_input);
            tail_inputs.push(bitxor(state & feedback));
        }
        Ok(Self {
            num_states,
            memory_len,
            transitions,
            tail_inputs,
        })
    }

    /// Returns trellis for a given raw transition table.
    ///
    /// # Parameters
    ///
    /// - `transitions`: One `[Transition; 2]` entry per state, indexed by input bit.
    ///
    /// # Panics
    ///
    /// Panics if the state count is not a power of two, if any transition targets a state outside
    /// the table, if a systematic output label differs from its input bit, or if some state has
    /// no tail-closing transition (no input leading to state `s >> 1`). These are configuration
    /// bugs, not runtime data errors.
    #[must_use]
    pub fn from_table(transitions: Vec<[Transition; 2]>) -> Self {
        let num_states = transitions.len();
        assert!(
            num_states.is_power_of_two(),
            "Trellis state count must be a power of two (found {num_states})",
        );
        let memory_len = num_states.trailing_zeros() as usize;
        let mut tail_inputs = Vec::with_capacity(num_states);
        for (state, per_input) in transitions.iter().enumerate() {
            for (input, transition) in per_input.iter().enumerate() {
                assert!(
                    transition.next < num_states,
                    "Transition from state {state} targets out-of-range state {}",
                    transition.next,
                );
                assert!(
                    transition.sys == bit_from_index(input),
                    "Systematic label of transition from state {state} must equal input bit {input}",
                );
            }
            let tail_input = (0 .. 2)
                .find(|&input| per_input[input].next == state >> 1)
                .unwrap_or_else(|| panic!("State {state} has no tail-closing transition"));
            tail_inputs.push(bit_from_index(tail_input));
        }
        Self {
            num_states,
            memory_len,
            transitions,
            tail_inputs,
        }
    }

    /// Returns the number of states.
    #[must_use]
    pub fn num_states(&self) -> usize {
        self.num_states
    }

    /// Returns the memory length (number of flip-flops).
    #[must_use]
    pub fn memory_len(&self) -> usize {
        self.memory_len
    }

    /// Returns the transition out of `state` for a given input bit.
    #[must_use]
    pub fn transition(&self, state: usize, input: Bit) -> Transition {
        self.transitions[state][input as usize]
    }

    /// Returns the input bit that closes the feedback register from `state`.
    #[must_use]
    pub fn tail_input(&self, state: usize) -> Bit {
        self.tail_inputs[state]
    }

    /// Generates code bits in pairwise (interleaved) sample order.
    ///
    /// # Parameters
    ///
    /// - `info_bits`: Information bits to be encoded.
    ///
    /// - `code_bits`: Vector to which code bits must be written (any pre-existing elements will
    ///   be cleared first). For each of the `info_bits.len() + memory_len` trellis steps, the
    ///   systematic bit is followed by the parity bit, so the total length is
    ///   `2 * (info_bits.len() + memory_len)`. The final `memory_len` steps are tail steps that
    ///   terminate the encoder in the all-zero state.
    pub fn encode(&self, info_bits: &[Bit], code_bits: &mut Vec<Bit>) {
        code_bits.clear();
        let mut state = 0;
        for &bit in info_bits {
            let transition = self.transitions[state][bit as usize];
            code_bits.push(transition.sys);
            code_bits.push(transition.par);
            state = transition.next;
        }
        for _ in 0 .. self.memory_len {
            let tail_bit = self.tail_inputs[state];
            let transition = self.transitions[state][tail_bit as usize];
            code_bits.push(transition.sys);
            code_bits.push(transition.par);
            state = transition.next;
        }
        debug_assert_eq!(state, 0);
    }

    /// Generates code bits in buffered sample order.
    ///
    /// # Parameters
    ///
    /// - `info_bits`: Information bits to be encoded.
    ///
    /// - `code_bits`: Vector to which code bits must be written (any pre-existing elements will
    ///   be cleared first), in the order: `K` systematic bits, `K` parity bits, `memory_len`
    ///   systematic tail bits, `memory_len` parity tail bits.
    pub fn encode_buffered(&self, info_bits: &[Bit], code_bits: &mut Vec<Bit>) {
        let mut paired = Vec::with_capacity(2 * (info_bits.len() + self.memory_len));
        self.encode(info_bits, &mut paired);
        let num_info_bits = info_bits.len();
        code_bits.clear();
        for k in 0 .. num_info_bits {
            code_bits.push(paired[2 * k]);
        }
        for k in 0 .. num_info_bits {
            code_bits.push(paired[2 * k + 1]);
        }
        for t in num_info_bits .. num_info_bits + self.memory_len {
            code_bits.push(paired[2 * t]);
        }
        for t in num_info_bits .. num_info_bits + self.memory_len {
            code_bits.push(paired[2 * t + 1]);
        }
    }
}

/// Returns constraint length corresponding to given code polynomials.
fn constraint_length(code_polynomials: &[usize]) -> Result<usize, Error> {
    if code_polynomials.len() != 2 {
        return Err(Error::InvalidInput(
            "Expected exactly two code polynomials (feedback, feedforward)".to_string(),
        ));
    }
    let feedback_poly = code_polynomials[0];
    if feedback_poly == 0 || feedback_poly & (feedback_poly - 1) == 0 {
        return Err(Error::InvalidInput(
            "Feedback polynomial cannot be 0 or a power of 2".to_string(),
        ));
    }
    // OK to cast `u32` to `usize`: Numbers involved will always be small enough.
    let constraint_len = (usize::BITS - feedback_poly.leading_zeros()) as usize;
    let two_pow_constraint_len = 1 << constraint_len;
    let feedforward_poly = code_polynomials[1];
    if feedforward_poly == 0
        || feedforward_poly == feedback_poly
        || feedforward_poly >= two_pow_constraint_len
    {
        return Err(Error::InvalidInput(format!(
            "For constraint length of {constraint_len}, the feedforward polynomial \
            must be in the range [1, {two_pow_constraint_len}), and cannot equal the \
            feedback polynomial {feedback_poly}",
        )));
    }
    Ok(constraint_len)
}

/// Returns XOR of bits in the binary representation of given integer.
fn bitxor(num: usize) -> Bit {
    match num.count_ones() % 2 {
        0 => Bit::Zero,
        _ => Bit::One,
    }
}

/// Returns bit corresponding to given index.
fn bit_from_index(bit_index: usize) -> Bit {
    match bit_index {
        0 => Bit::Zero,
        _ => Bit::One,
    }
}

#[cfg(test)]
mod tests_of_trellis {
    use super::*;
    use Bit::{One, Zero};

    #[test]
    fn test_from_polynomials() {
        let trellis = Trellis::from_polynomials(&[0o13, 0o15]).unwrap();
        assert_eq!(trellis.num_states(), 8);
        assert_eq!(trellis.memory_len(), 3);
        let correct_next_for_zero = [0, 4, 5, 1, 2, 6, 7, 3];
        let correct_par_for_zero = [Zero, Zero, One, One, One, One, Zero, Zero];
        let correct_next_for_one = [4, 0, 1, 5, 6, 2, 3, 7];
        let correct_par_for_one = [One, One, Zero, Zero, Zero, Zero, One, One];
        for state in 0 .. trellis.num_states() {
            let for_zero = trellis.transition(state, Zero);
            assert_eq!(for_zero.next, correct_next_for_zero[state]);
            assert_eq!(for_zero.sys, Zero);
            assert_eq!(for_zero.par, correct_par_for_zero[state]);
            let for_one = trellis.transition(state, One);
            assert_eq!(for_one.next, correct_next_for_one[state]);
            assert_eq!(for_one.sys, One);
            assert_eq!(for_one.par, correct_par_for_one[state]);
        }
    }

    #[test]
    fn test_from_polynomials_errors() {
        assert!(Trellis::from_polynomials(&[]).is_err());
        assert!(Trellis::from_polynomials(&[0o13]).is_err());
        assert!(Trellis::from_polynomials(&[0o13, 0o15, 0o17]).is_err());
        assert!(Trellis::from_polynomials(&[0o0, 0o15]).is_err());
        assert!(Trellis::from_polynomials(&[0o20, 0o15]).is_err());
        assert!(Trellis::from_polynomials(&[0o13, 0o0]).is_err());
        assert!(Trellis::from_polynomials(&[0o13, 0o13]).is_err());
        assert!(Trellis::from_polynomials(&[0o13, 0o20]).is_err());
    }

    #[test]
    fn test_tail_inputs() {
        let trellis = Trellis::from_polynomials(&[0o13, 0o15]).unwrap();
        let correct_tail_inputs = [Zero, One, One, Zero, Zero, One, One, Zero];
        for state in 0 .. trellis.num_states() {
            assert_eq!(trellis.tail_input(state), correct_tail_inputs[state]);
            let transition = trellis.transition(state, trellis.tail_input(state));
            assert_eq!(transition.next, state >> 1);
        }
    }

    #[test]
    fn test_from_table_round_trip() {
        let reference = Trellis::from_polynomials(&[0o7, 0o5]).unwrap();
        let table: Vec<[Transition; 2]> = (0 .. reference.num_states())
            .map(|state| [reference.transition(state, Zero), reference.transition(state, One)])
            .collect();
        let rebuilt = Trellis::from_table(table);
        assert_eq!(rebuilt, reference);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn test_from_table_rejects_bad_state_count() {
        let entry = Transition {
            next: 0,
            sys: Zero,
            par: Zero,
        };
        let one = Transition {
            next: 0,
            sys: One,
            par: One,
        };
        let _ = Trellis::from_table(vec![[entry, one], [entry, one], [entry, one]]);
    }

    #[test]
    fn test_encode() {
        let trellis = Trellis::from_polynomials(&[0o13, 0o15]).unwrap();
        let info_bits = [Zero, One, One, Zero];
        let mut code_bits = Vec::new();
        trellis.encode(&info_bits, &mut code_bits);
        let correct_code_bits = [
            Zero, Zero, One, One, One, Zero, Zero, Zero, Zero, Zero, Zero, One, One, One,
        ];
        assert_eq!(code_bits, correct_code_bits);
    }

    #[test]
    fn test_encode_buffered() {
        let trellis = Trellis::from_polynomials(&[0o13, 0o15]).unwrap();
        let info_bits = [Zero, One, One, Zero];
        let mut code_bits = Vec::new();
        trellis.encode_buffered(&info_bits, &mut code_bits);
        let correct_code_bits = [
            Zero, One, One, Zero, Zero, One, Zero, Zero, Zero, Zero, One, Zero, One, One,
        ];
        assert_eq!(code_bits, correct_code_bits);
    }
}
