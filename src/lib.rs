//! airlift - remote CI build pipeline for on-device artifacts
//!
//! This library automates turning a triggered remote build into an installed
//! artifact on a target device: it triggers a build on one of several CI
//! backends, polls for completion under a bounded time budget, retrieves and
//! unpacks the resulting artifact, validates it, and attempts installation
//! through an ordered chain of delivery methods with graceful degradation to
//! manual instructions.
//!
//! # Core Concepts
//!
//! - **Providers**: pluggable CI backends (GitHub Actions, Codemagic,
//!   Expo EAS) behind the [`CiProvider`] trait
//! - **Poller**: bounded-time, fixed-interval status loop; a single timeout
//!   budget is the only backstop
//! - **Retriever**: streamed, redirect-following download with container
//!   archive unpacking and payload discovery
//! - **Delivery chain**: ordered install methods degrading to manual
//!   instructions, never a hard error
//!
//! # Example Usage
//!
//! ```ignore
//! use airlift::{AirliftConfig, BuildTarget, DeliveryChain, Pipeline};
//! use airlift::notify::ConsoleNotifier;
//! use airlift::progress::NullReporter;
//!
//! async fn ship(config: AirliftConfig) -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = airlift::provider::create_provider(config.provider)?;
//!     let pipeline = Pipeline::new(
//!         provider,
//!         DeliveryChain::standard(),
//!         Box::new(ConsoleNotifier),
//!         Box::new(NullReporter),
//!         config,
//!     );
//!
//!     let outcome = pipeline.run(&BuildTarget::new("owner/app", "main")).await?;
//!     println!("Artifact: {}", outcome.artifact().path.display());
//!     Ok(())
//! }
//! ```

// Public modules
pub mod artifact;
pub mod cli;
pub mod config;
pub mod deliver;
pub mod model;
pub mod notify;
pub mod pipeline;
pub mod poller;
pub mod progress;
pub mod provider;
pub mod stagelog;
pub mod validate;

// Re-export key types for convenient access
pub use artifact::{DownloadError, Retriever};
pub use config::{AirliftConfig, ConfigError};
pub use deliver::{DeliveryChain, InstallError, InstallMethod};
pub use model::{
    ArtifactFile, ArtifactKind, ArtifactLocator, BuildHandle, BuildStatus, BuildTarget, DeliveryOutcome,
    ProviderKind,
};
pub use pipeline::{Pipeline, PipelineError};
pub use poller::{PollConfig, PollError, Poller};
pub use provider::{create_provider, CiProvider, ProviderError};
pub use validate::{validate, ValidationError, ValidationReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
