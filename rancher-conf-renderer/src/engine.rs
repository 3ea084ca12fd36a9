//! Tera rendering engine.
//!
//! A [`Renderer`] is built once per poll cycle from the freshly built
//! [`Context`]; every template job of that cycle renders against it.
//! Templates are read from disk on each render so edits take effect on the
//! next change without a restart.

use std::path::Path;

use tera::Tera;

use rancher_conf_core::Context;

use crate::context::TemplateContext;
use crate::error::RenderError;
use crate::functions;

/// Renders template files against one cycle's context.
pub struct Renderer {
    view: TemplateContext,
    tera_ctx: tera::Context,
}

impl Renderer {
    /// Prepare the view tree and Tera context for `ctx`.
    pub fn new(ctx: &Context) -> Result<Self, RenderError> {
        Self::from_view(TemplateContext::from_context(ctx))
    }

    pub fn from_view(view: TemplateContext) -> Result<Self, RenderError> {
        let tera_ctx = view.to_tera_context()?;
        Ok(Renderer { view, tera_ctx })
    }

    pub fn view(&self) -> &TemplateContext {
        &self.view
    }

    /// Read and render the template at `source`.
    ///
    /// A missing file is reported as [`RenderError::Missing`].
    pub fn render_file(&self, source: &Path) -> Result<Vec<u8>, RenderError> {
        if !source.exists() {
            return Err(RenderError::Missing {
                path: source.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(source).map_err(|e| RenderError::Io {
            path: source.to_path_buf(),
            source: e,
        })?;
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());
        self.render_str(&name, &text).map(String::into_bytes)
    }

    /// Render template `text` registered under `name`.
    pub fn render_str(&self, name: &str, text: &str) -> Result<String, RenderError> {
        let mut tera = Tera::default();
        // Config files are not HTML; never escape, whatever the extension.
        tera.autoescape_on(vec![]);
        functions::register(&mut tera, &self.view)?;
        tera.add_raw_template(name, text)
            .map_err(|source| RenderError::Parse {
                name: name.to_string(),
                source,
            })?;
        tera.render(name, &self.tera_ctx)
            .map_err(|source| RenderError::Render {
                name: name.to_string(),
                source,
            })
    }
}
