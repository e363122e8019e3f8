//! Signal processing layers: tone synthesis on the way out, tone
//! detection on the way in.

pub mod detection;
pub mod modulation;

pub use detection::{calculate_signal_energy, ChirpDetector, SymbolDetection, SymbolDetector};
pub use modulation::{JitterPrng, Modulator};
