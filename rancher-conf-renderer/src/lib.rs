//! # rancher-conf-renderer
//!
//! Tera-based template rendering against a linked metadata [`Context`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use rancher_conf_core::Context;
//! use rancher_conf_renderer::Renderer;
//!
//! fn render(ctx: &Context) {
//!     if let Ok(renderer) = Renderer::new(ctx) {
//!         if let Ok(bytes) = renderer.render_file(Path::new("/etc/rancher-conf/hosts.tera")) {
//!             println!("{} bytes", bytes.len());
//!         }
//!     }
//! }
//! ```
//!
//! [`Context`]: rancher_conf_core::Context

pub mod context;
pub mod engine;
pub mod error;
pub mod functions;

pub use context::TemplateContext;
pub use engine::Renderer;
pub use error::RenderError;
