//! Template document and rendering contract
//!
//! A [`Document`] carries the buffers, template functions and variables
//! accumulated while a page is being put together. The host's asset injector
//! fills it through the five location-specific injection calls on
//! [`Renderer`], then the renderer expands it into the final HTML.

use crate::asset::LayoutType;
use crate::errors::SiteError;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use std::collections::HashMap;
use std::sync::Arc;

/// A template function. Invoked during expansion; its output is emitted
/// without escaping.
pub type TemplateFunc = Arc<dyn Fn() -> String + Send + Sync>;

/// Template functions keyed by token name.
pub type FuncMap = HashMap<String, TemplateFunc>;

/// Template variables. Expanded values are HTML-escaped.
pub type Vars = serde_json::Map<String, serde_json::Value>;

/// Accumulated page state handed between the injector and the renderer.
#[derive(Clone, Default)]
pub struct Document {
    pub head: String,
    pub header: String,
    pub main: String,
    pub footer: String,
    /// Fragment emitted at the end of the body, after the footer.
    pub body: String,
    pub funcs: FuncMap,
    pub vars: Vars,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fragment to a buffer, separating fragments with newlines.
    pub fn append(buffer: &mut String, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        if !buffer.is_empty() {
            buffer.push('\n');
        }
        buffer.push_str(fragment);
    }

    /// Merges template functions and variables into the document. Later
    /// entries win on collision.
    pub fn merge(&mut self, funcs: FuncMap, vars: Vars) {
        self.funcs.extend(funcs);
        self.vars.extend(vars);
    }
}

/// The template engine contract.
///
/// One enabled plugin provides the renderer for the whole site. The five
/// `inject_*` methods are the only way content reaches a document, so the
/// engine can validate or transform every fragment before it is committed.
/// An error from any injection call aborts the render.
pub trait Renderer: Send + Sync {
    fn inject_head(
        &self,
        doc: Document,
        fragment: &str,
        funcs: FuncMap,
        vars: Vars,
    ) -> Result<Document, SiteError>;

    fn inject_header(
        &self,
        doc: Document,
        fragment: &str,
        funcs: FuncMap,
        vars: Vars,
    ) -> Result<Document, SiteError>;

    fn inject_main(
        &self,
        doc: Document,
        fragment: &str,
        funcs: FuncMap,
        vars: Vars,
    ) -> Result<Document, SiteError>;

    fn inject_body(
        &self,
        doc: Document,
        fragment: &str,
        funcs: FuncMap,
        vars: Vars,
    ) -> Result<Document, SiteError>;

    fn inject_footer(
        &self,
        doc: Document,
        fragment: &str,
        funcs: FuncMap,
        vars: Vars,
    ) -> Result<Document, SiteError>;

    /// Renders `content` as a full page using the page layout.
    fn page(
        &self,
        req: &Request<Body>,
        content: &str,
        vars: Vars,
    ) -> Result<Response, SiteError>;

    /// Renders `content` as a full page using the post layout.
    fn post(
        &self,
        req: &Request<Body>,
        content: &str,
        vars: Vars,
    ) -> Result<Response, SiteError>;

    /// Renders an error page. Infallible so it can terminate any failure
    /// path.
    fn error(&self, status: StatusCode, message: &str) -> Response;
}

/// The asset injection contract.
///
/// Collects assets, template functions and variables from enabled plugins,
/// filters them by auth state and layout, and feeds the merged result to the
/// renderer's injection calls. The renderer is passed in per call because the
/// injector is constructed before any renderer exists.
pub trait AssetInjector: Send + Sync {
    fn inject(
        &self,
        renderer: &dyn Renderer,
        doc: Document,
        req: &Request<Body>,
        layout: LayoutType,
    ) -> Result<Document, SiteError>;
}
