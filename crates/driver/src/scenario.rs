//! Scenario engine: named end-to-end flows built from transitions
//!
//! Built-in scenarios:
//! - `basic`: launch a desktop and delete it
//! - `lifecycle`: launch, boost and downsize (when the type supports it),
//!   shelve, unshelve, hard reboot, delete
//! - `newuser`: agree to the terms of service and create a first workspace
//!
//! # Extending
//!
//! A scenario is any type implementing [`Scenario`], plus a
//! [`ScenarioFactory`] that builds it from the residual command-line
//! arguments. Register the factory under a name before looking it up:
//!
//! ```ignore
//! let mut registry = ScenarioRegistry::builtin();
//! registry.register("soak", SoakScenario::from_args);
//! let scenario = registry.create("soak", &args)?;
//! ```

use async_trait::async_trait;
use clap::Parser;
use std::collections::BTreeMap;
use tracing::info;

use crate::error::{DriverError, DriverResult};
use crate::executor::{Executor, Stopwatch};
use crate::request::ActionRequest;
use crate::state::State;

/// One end-to-end flow.
///
/// A scenario borrows the executor (and through it the session) for the
/// length of `run`, and stops at the first failing transition.
#[async_trait]
pub trait Scenario: Send {
    fn name(&self) -> &str;

    async fn run(&mut self, executor: &mut Executor<'_>, request: &ActionRequest) -> DriverResult<()>;
}

/// Builds a scenario from its own command-line arguments.
pub type ScenarioFactory = fn(&[String]) -> DriverResult<Box<dyn Scenario>>;

/// Scenarios known by name.
#[derive(Clone)]
pub struct ScenarioRegistry {
    factories: BTreeMap<String, ScenarioFactory>,
}

impl Default for ScenarioRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ScenarioRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry holding `basic`, `lifecycle` and `newuser`.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(BasicScenario::NAME, BasicScenario::from_args);
        registry.register(LifecycleScenario::NAME, LifecycleScenario::from_args);
        registry.register(NewUserScenario::NAME, NewUserScenario::from_args);
        registry
    }

    /// Add or replace the factory for `name`.
    pub fn register(&mut self, name: impl Into<String>, factory: ScenarioFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn create(&self, name: &str, args: &[String]) -> DriverResult<Box<dyn Scenario>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| DriverError::ScenarioNotFound(name.to_string()))?;
        factory(args)
    }
}

/// Build and run the scenario `name`.
///
/// The session must already be logged in; otherwise nothing is attempted.
pub async fn run_scenario(
    registry: &ScenarioRegistry,
    name: &str,
    args: &[String],
    executor: &mut Executor<'_>,
    request: &ActionRequest,
) -> DriverResult<()> {
    let mut scenario = registry.create(name, args)?;

    let entry = executor.sense().await?;
    if entry == State::NotLoggedIn {
        return Err(DriverError::UnexpectedState(entry));
    }

    let watch = Stopwatch::start(format!("{} scenario", scenario.name()));
    scenario.run(executor, request).await?;
    watch.finish();
    info!("Scenario completed");
    Ok(())
}

/// Reset to the `NoDesktop` baseline, deleting any leftover desktop.
///
/// Anything other than `NoDesktop` afterwards is a `ResetFailed`: a run that
/// starts dirty proves nothing.
pub async fn normalize(executor: &mut Executor<'_>, request: &ActionRequest) -> DriverResult<()> {
    let mut state = executor.sense().await?;
    if state.is_deletable() {
        info!("Reset: deleting existing desktop");
        executor.delete(request).await.map_err(|e| match e {
            DriverError::TransitionIncomplete { actual, .. } => DriverError::ResetFailed(actual),
            other => other,
        })?;
        state = executor.sense().await?;
    }
    if state != State::NoDesktop {
        return Err(DriverError::ResetFailed(state));
    }
    Ok(())
}

fn parse_args<T: Parser>(scenario: &str, args: &[String]) -> DriverResult<T> {
    T::try_parse_from(std::iter::once(scenario.to_string()).chain(args.iter().cloned())).map_err(
        |e| DriverError::ScenarioArgs {
            scenario: scenario.to_string(),
            reason: e.to_string().trim().to_string(),
        },
    )
}

/// Scenarios that take no arguments of their own.
#[derive(Parser, Debug)]
struct NoArgs {}

/// Launch a desktop and delete it.
#[derive(Debug, Default)]
pub struct BasicScenario;

impl BasicScenario {
    pub const NAME: &'static str = "basic";

    pub fn from_args(args: &[String]) -> DriverResult<Box<dyn Scenario>> {
        parse_args::<NoArgs>(Self::NAME, args)?;
        Ok(Box::new(Self))
    }
}

#[async_trait]
impl Scenario for BasicScenario {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&mut self, executor: &mut Executor<'_>, request: &ActionRequest) -> DriverResult<()> {
        normalize(executor, request).await?;
        executor.launch(request).await?;
        executor.delete(request).await
    }
}

/// The full "is the service working" flow.
#[derive(Debug, Default)]
pub struct LifecycleScenario;

impl LifecycleScenario {
    pub const NAME: &'static str = "lifecycle";

    pub fn from_args(args: &[String]) -> DriverResult<Box<dyn Scenario>> {
        parse_args::<NoArgs>(Self::NAME, args)?;
        Ok(Box::new(Self))
    }
}

#[async_trait]
impl Scenario for LifecycleScenario {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&mut self, executor: &mut Executor<'_>, request: &ActionRequest) -> DriverResult<()> {
        normalize(executor, request).await?;

        let desktop = request.desktop_type_for(executor.session().site());
        let boostable = executor.session().is_boostable(&desktop).await?;

        executor.launch(request).await?;
        if boostable {
            executor.boost(request).await?;
            executor.downsize(request).await?;
        } else {
            info!("Skipping boost / downsize: '{}' is not boostable", desktop);
        }
        executor.shelve(request).await?;
        executor.unshelve(request).await?;
        executor.reboot(&request.clone().with_hard(true)).await?;
        executor.delete(request).await
    }
}

#[derive(Parser, Debug)]
struct NewUserArgs {
    /// Skip steps that have already been done
    #[arg(long)]
    as_required: bool,
}

/// Onboard a fresh account: terms of service, then a first workspace.
#[derive(Debug, Default)]
pub struct NewUserScenario {
    as_required: bool,
}

impl NewUserScenario {
    pub const NAME: &'static str = "newuser";

    pub fn new(as_required: bool) -> Self {
        Self { as_required }
    }

    pub fn from_args(args: &[String]) -> DriverResult<Box<dyn Scenario>> {
        let parsed = parse_args::<NewUserArgs>(Self::NAME, args)?;
        Ok(Box::new(Self::new(parsed.as_required)))
    }

    fn already_done(&self, executor: &mut Executor<'_>, step: &'static str) -> DriverResult<()> {
        if self.as_required {
            info!("Skipping {}: already done", step);
            Ok(())
        } else {
            Err(DriverError::OnboardingAlreadyDone {
                user: executor.session().site().username.clone(),
                step,
            })
        }
    }
}

#[async_trait]
impl Scenario for NewUserScenario {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&mut self, executor: &mut Executor<'_>, request: &ActionRequest) -> DriverResult<()> {
        if executor.sense().await? == State::TermsOfServicePending {
            executor.agree_terms(request).await?;
        } else {
            self.already_done(executor, "terms of service")?;
        }

        if executor.sense().await? == State::CreateWorkspacePending {
            executor.create_workspace(request).await?;
        } else {
            self.already_done(executor, "workspace creation")?;
        }
        Ok(())
    }
}
