//! Figure subsystem
//!
//! - [`FigureService`]: lookup, linking, metadata edits and uploads
//! - [`FigureGenerator`]: prompt → image → stored figure
//! - [`FigureUrlCache`]: memoised public URLs

pub mod cache;
pub mod generator;
pub mod linker;

pub use cache::FigureUrlCache;
pub use generator::{FigureGenerator, FigureRequest, GeneratedFigure, GenerationTarget};
pub use linker::{FigureService, FigureView, LinkOutcome};
