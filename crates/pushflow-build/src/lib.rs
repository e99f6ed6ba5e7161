//! PushFlow image build / push
//!
//! Drives an external container CLI (`docker` by default) to build an image
//! with optional named-stage layer caching, tag it with a content-addressed
//! name, and push it to a registry.
//!
//! ```no_run
//! use pushflow_build::{BuildSpec, ImagePublisher, PublishRequest, TracingSink};
//! use std::sync::Arc;
//!
//! # async fn run() -> pushflow_build::Result<()> {
//! let publisher = ImagePublisher::new(Arc::new(TracingSink));
//! let request = PublishRequest::new("app:v1", BuildSpec::new("./app"))
//!     .with_repository("registry.example.com/team/app");
//! let unique_name = publisher.publish(request).await?;
//! println!("{}", unique_name);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod cache;
pub mod command;
pub mod error;
pub mod log;
pub mod login;
pub mod orchestrator;
pub mod pusher;
pub mod reference;
pub mod runner;
pub mod request;

#[cfg(test)]
mod testing;

pub use builder::ImageBuilder;
pub use error::{BuildError, Result};
pub use log::{LogSink, Severity, StreamId, TracingSink};
pub use login::LoginCoordinator;
pub use orchestrator::{DEFAULT_TOOL, ImagePublisher, ImagePublisherBuilder};
pub use pusher::ImagePusher;
pub use reference::{check_repository_url, image_name_and_tag, tagged_image_name};
pub use runner::{CommandResult, Invocation, ProcessRunner, ToolRunner};
pub use request::{BuildOutput, BuildSource, BuildSpec, CacheFrom, CacheSpec, PublishRequest, Registry};
