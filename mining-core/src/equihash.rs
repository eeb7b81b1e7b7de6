//! Equihash solver interface (C6, `spec.md` §6.5). Solver *internals*
//! are explicitly out of scope (`spec.md` §1); this is only the trait
//! boundary the mining loop drives it through. Grounded on
//! `bond-core::mining::Miner::mine_header_range`'s
//! callback/cancellation shape (there inlined; here pulled out as a
//! trait so a real `tromp`/`default` backend can be plugged in without
//! touching `mining_loop`).

use crate::config::EquihashSolverKind;

/// Callbacks the solver invokes during a search (`spec.md` §6.5,
/// §4.6 "Solve").
pub trait SolverCallbacks {
    /// Called with a candidate solution. Returns `true` if the caller
    /// accepted it (ends the search), `false` to keep searching
    /// (`spec.md` §4.6 `validBlock`: "If above target, return false.
    /// Otherwise submit and return true").
    fn valid_block(&mut self, solution: &[u8]) -> bool;

    /// Polled between internal solver steps (`spec.md` §4.6
    /// `cancelled`: "returns the current value of the shared cancel
    /// flag").
    fn cancelled(&self) -> bool;
}

/// An Equihash backend (`spec.md` §6.5: "Two implementations behind a
/// common contract (selector string `tromp | default`)").
pub trait EquihashSolver: Send + Sync {
    /// Runs the search over `input` (the keyed BLAKE2b state extended
    /// with the current nonce, `spec.md` §4.6), invoking `callbacks` for
    /// each candidate and cancellation check. Returns once the solver
    /// exhausts its search space or a callback ends it.
    fn solve(&self, input: blake2b_simd::Hash, callbacks: &mut dyn SolverCallbacks);

    fn kind(&self) -> EquihashSolverKind;
}

/// Resolves a `tromp | default` selector string to a solver kind
/// (`spec.md` §6.6 `equihashsolver`).
#[must_use]
pub fn resolve_solver_kind(selector: &str) -> Option<EquihashSolverKind> {
    match selector {
        "tromp" => Some(EquihashSolverKind::Tromp),
        "default" => Some(EquihashSolverKind::Default),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_selectors() {
        assert_eq!(resolve_solver_kind("tromp"), Some(EquihashSolverKind::Tromp));
        assert_eq!(resolve_solver_kind("default"), Some(EquihashSolverKind::Default));
        assert_eq!(resolve_solver_kind("nonsense"), None);
    }
}
