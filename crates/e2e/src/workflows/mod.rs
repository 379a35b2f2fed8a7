//! Page workflows against the reference application
//!
//! Each page type wraps a [`Page`] (driver, wait helper and base URL) and
//! exposes the sequential actions the acceptance scenarios are built from.

pub mod editor;
pub mod frames;
pub mod page;
pub mod windows;

pub use editor::{timestamped, EditorPage, TextColor};
pub use frames::NestedFramesPage;
pub use page::Page;
pub use windows::WindowsPage;
