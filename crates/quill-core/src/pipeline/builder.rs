use super::PipelineError;
use super::step::Step;

pub trait Runnable: Send + Sync {
    type Input: Send;
    type Output: Send;

    fn run(
        &self,
        input: Self::Input,
    ) -> impl std::future::Future<Output = Result<Self::Output, PipelineError>> + Send;

    /// Stage names in execution order.
    fn stages(&self) -> Vec<&'static str>;
}

pub struct Start<S>(S);

impl<S: Step> Runnable for Start<S> {
    type Input = S::Input;
    type Output = S::Output;

    async fn run(&self, input: Self::Input) -> Result<Self::Output, PipelineError> {
        tracing::debug!(stage = self.0.name(), "running stage");
        self.0.run(input).await
    }

    fn stages(&self) -> Vec<&'static str> {
        vec![self.0.name()]
    }
}

pub struct Chain<Prev, Current> {
    prev: Prev,
    current: Current,
}

impl<Prev, Current> Runnable for Chain<Prev, Current>
where
    Prev: Runnable,
    Current: Step<Input = Prev::Output>,
{
    type Input = Prev::Input;
    type Output = Current::Output;

    async fn run(&self, input: Self::Input) -> Result<Self::Output, PipelineError> {
        let intermediate = self.prev.run(input).await?;
        tracing::debug!(stage = self.current.name(), "running stage");
        self.current.run(intermediate).await
    }

    fn stages(&self) -> Vec<&'static str> {
        let mut stages = self.prev.stages();
        stages.push(self.current.name());
        stages
    }
}

/// A strictly sequential chain of steps whose types line up at compile time.
pub struct Pipeline<S> {
    steps: S,
}

impl Pipeline<()> {
    #[must_use]
    pub fn start<S: Step>(step: S) -> Pipeline<Start<S>> {
        Pipeline { steps: Start(step) }
    }
}

impl<S> Pipeline<S> {
    #[must_use]
    pub fn step<T: Step>(self, step: T) -> Pipeline<Chain<S, T>> {
        Pipeline {
            steps: Chain {
                prev: self.steps,
                current: step,
            },
        }
    }
}

impl<S: Runnable> Pipeline<S> {
    /// # Errors
    ///
    /// Returns the error of the first step that fails; later steps do not run.
    pub async fn run(&self, input: S::Input) -> Result<S::Output, PipelineError> {
        self.steps.run(input).await
    }

    #[must_use]
    pub fn stages(&self) -> Vec<&'static str> {
        self.steps.stages()
    }
}
