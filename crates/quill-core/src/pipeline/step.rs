use std::future::Future;

use super::PipelineError;

/// One stage of a run: consumes the previous stage record and produces the next.
pub trait Step: Send + Sync {
    type Input: Send;
    type Output: Send;

    /// Short stage label used in logs and errors.
    fn name(&self) -> &'static str;

    fn run(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = Result<Self::Output, PipelineError>> + Send;
}
