// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Composition protocol shared by every pipeline stage.

/// A stage that folds input symbols into a mergeable partial result.
///
/// Blocks of one input are scanned independently and their results combined
/// with [`Transducer::merge_results`], which must be associative with
/// [`Transducer::identity_result`] as its identity. Only the first block of an
/// input starts from [`Transducer::initial_result`].
pub trait Transducer {
    /// Symbol consumed by [`Transducer::process_symbol`].
    type Input;
    /// Per-block accumulator.
    type PartialResult: Clone;
    /// Final output, read from a fully merged result.
    type TerminalResult;

    /// Result for a block known to start at the beginning of the input.
    fn initial_result(&self) -> Self::PartialResult;

    /// Result for a block whose incoming context is unknown.
    fn identity_result(&self) -> Self::PartialResult;

    /// Consumes one symbol at absolute input position `offset`.
    ///
    /// `offset` is for output materialisation only; it never drives control
    /// flow.
    fn process_symbol(
        &self,
        result: &mut Self::PartialResult,
        symbol: Self::Input,
        offset: usize,
    );

    /// Appends the adjacent block `right` to `left`.
    fn merge_results(&self, left: &mut Self::PartialResult, right: Self::PartialResult);

    /// Extracts the final output.
    ///
    /// # Panics
    /// If `result` does not describe exactly one end-to-end path.
    fn last_stage_result<'a>(&self, result: &'a Self::PartialResult) -> &'a Self::TerminalResult;
}
