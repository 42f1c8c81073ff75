//! UI session driver for bankscrape.
//!
//! [`PageDriver`] is the seam between the extraction workflow and whatever
//! renders the portal. [`chromium::ChromiumLauncher`] drives a local
//! Chromium-family browser over the DevTools protocol; the `fake` feature adds
//! an in-memory scripted page for tests.

pub mod chromium;
pub mod error;
#[cfg(any(test, feature = "fake"))]
pub mod fake;
pub mod page;
pub mod process;

pub use chromium::{ChromiumLauncher, ChromiumPage};
pub use error::{DriverError, Result};
pub use page::{ElementState, LaunchOptions, Launcher, PageDriver, SelectOption, Viewport, WaitUntil};
