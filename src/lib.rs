//! This crate implements soft-input/soft-output channel decoding primitives: a BCJR
//! (forward-backward) decoder for recursive systematic convolutional (RSC) codes over a
//! finite-state trellis, and a successive-cancellation (SC) decoder for polar codes over a binary
//! decoding tree. Both consume channel log-likelihood-ratio (LLR) streams and produce refined
//! extrinsic LLRs and hard bit decisions, and both support batched multi-frame operation so that
//! corresponding trellis steps of several frames can be processed in lockstep. Matching encoders
//! and a BPSK-AWGN simulation harness are included for round-trip testing and BER/BLER evaluation.

#![warn(
    clippy::complexity,
    clippy::pedantic,
    clippy::perf,
    clippy::style,
    clippy::suspicious,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_allocation,
    unused_import_braces,
    unused_qualifications
)]

use serde::{Deserialize, Serialize};

pub mod bcjr;
mod llr;
pub mod polar;
pub mod reorder;
pub mod sim;
pub mod trellis;
pub mod utils;

pub use bcjr::{BcjrDecoder, EngineKind, FrameLayout, Termination};
pub use llr::Llr;
pub use polar::PolarDecoder;
pub use trellis::Trellis;

/// Custom error type
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Invalid input error
    #[error("{0}")]
    InvalidInput(String),
    /// File read/write error
    #[error("{0}")]
    FileReadWriteError(#[from] std::io::Error),
    /// Serde read/write error
    #[error("{0}")]
    SerdeReadWriteError(#[from] serde_json::Error),
}

/// Enumeration of binary symbol values
#[derive(Clone, Eq, PartialEq, Debug, Copy, Deserialize, Serialize)]
pub enum Bit {
    /// Binary symbol `0`
    Zero = 0,
    /// Binary symbol `1`
    One = 1,
}

impl std::ops::BitXor for Bit {
    type Output = Bit;

    fn bitxor(self, rhs: Bit) -> Bit {
        if self == rhs {
            Bit::Zero
        } else {
            Bit::One
        }
    }
}

/// Enumeration of metric combination rules for BCJR decoding
#[derive(Clone, Eq, Hash, PartialEq, Debug, Copy, Deserialize, Serialize)]
pub enum DecodingAlgo {
    /// Log-MAP decoding (exact log-domain sum, highest complexity)
    LogMAP,
    /// Max-Log-MAP decoding (max approximation, lowest complexity)
    MaxLogMAP,
    /// Linear-Log-MAP decoding (Valenti & Sun, 2001)
    LinearLogMAP,
}

impl DecodingAlgo {
    /// Returns the name of the variant.
    fn name(self) -> &'static str {
        match self {
            DecodingAlgo::LogMAP => "Log-MAP",
            DecodingAlgo::MaxLogMAP => "Max-Log-MAP",
            DecodingAlgo::LinearLogMAP => "Linear-Log-MAP",
        }
    }
}

impl std::fmt::Display for DecodingAlgo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} decoding", self.name())
    }
}

#[cfg(test)]
mod tests_of_types {
    use super::*;
    use Bit::{One, Zero};

    #[test]
    fn test_bit_xor() {
        assert_eq!(Zero ^ Zero, Zero);
        assert_eq!(Zero ^ One, One);
        assert_eq!(One ^ Zero, One);
        assert_eq!(One ^ One, Zero);
    }

    #[test]
    fn test_decoding_algo_display() {
        assert_eq!(DecodingAlgo::LogMAP.to_string(), "Log-MAP decoding");
        assert_eq!(DecodingAlgo::MaxLogMAP.to_string(), "Max-Log-MAP decoding");
        assert_eq!(
            DecodingAlgo::LinearLogMAP.to_string(),
            "Linear-Log-MAP decoding"
        );
    }
}
