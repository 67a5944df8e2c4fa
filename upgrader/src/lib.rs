/*!
Idempotent, resumable upgrade of a UUPS token proxy.

An upgrade is four [`Stage`]s run in order:

1. deploy the new implementation,
2. call `initializeV2` through the proxy,
3. allow-list the liquidity pair,
4. point the proxy at the new implementation.

Each stage becomes an [`UpgradeStep`](step::UpgradeStep): a read-only
precondition, one transaction with an explicit gas limit, and a
postcondition checked against the state after inclusion. The [`Executor`]
runs a single step; the [`Orchestrator`] runs a list of stages, stops at
the first failure and tracks the [`StageState`] reached.

```rust,ignore
use chain::Client;
use proxy_upgrader::{Orchestrator, UpgradeConfig};

let config = UpgradeConfig::load("upgrade.toml")?;
let client = Client::from_env()?;

let report = Orchestrator::new(&client, config.limits)
    .run(&config.plan()?)
    .await
    .into_result()?;
```

Re-running after a failure is safe for every stage except deployment,
which creates a new contract each time. Configure `implementation` once a
deployment went through.
*/

pub mod artifact;
pub mod config;
mod error;
mod executor;
pub mod orchestrator;
pub mod stage;
pub mod status;
pub mod step;

pub use artifact::Artifact;
pub use config::UpgradeConfig;
pub use error::Failure;
pub use executor::Executor;
pub use orchestrator::{Orchestrator, Report};
pub use stage::{Stage, StageLimits, StageState};
pub use status::ProxyStatus;
