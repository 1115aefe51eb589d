// Ledger responsibilities are split into submodules: the chain itself,
// whole-chain validation, the derived ownership projection, and the
// store that keeps all of them consistent under one lock.

pub mod chain;
pub mod state;
pub mod store;
pub mod validation;

pub use chain::*;
pub use state::*;
pub use store::*;
pub use validation::*;
