//! Transaction extraction workflow for an online banking portal.
//!
//! A run opens a [`Session`] through a [`driver::Launcher`], logs in, resolves
//! the requested accounts, extracts each one and exports the results. The
//! [`Workflow`] owns that sequence and guarantees logout and cleanup on every
//! exit path.

pub mod accounts;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod export;
pub mod extract;
pub mod model;
pub mod query;
pub mod session;
pub mod workflow;

pub use config::{BrowserSettings, Credentials, PortalConfig, PortalSelectors, Secret, Timing};
pub use error::{Result, ScrapeError};
pub use extract::ExtractionMode;
pub use model::{Account, AccountType, ExtractionResult, Payload, TimeRange};
pub use query::{FieldPair, Query, QueryFieldMapping};
pub use session::{Session, SessionState};
pub use workflow::{RunReport, ScrapeRequest, Workflow};
