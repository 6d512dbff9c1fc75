//! HTML template engine plugin
//!
//! Provides the [`Renderer`] capability. Pages are assembled from a fixed
//! five-region shell (head, header, main, footer, body-end) filled through
//! the injection calls, then expanded: `{{name}}` tokens resolve to template
//! variables (HTML-escaped) or template functions (emitted raw), and unknown
//! tokens pass through untouched so plugin content may carry literal braces.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use sdk::{
    escape_html, AssetInjector, Document, FuncMap, LayoutType, Plugin, Renderer, SiteError,
    Toolkit, Vars,
};
use serde_json::Value;
use std::sync::Arc;

/// The plugin wrapper that hands the template engine capability to the host.
#[derive(Default)]
pub struct HtmlEnginePlugin;

impl HtmlEnginePlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for HtmlEnginePlugin {
    fn plugin_name(&self) -> &str {
        "htmlengine"
    }

    fn plugin_version(&self) -> &str {
        "1.0.0"
    }

    fn template_engine(
        &self,
        injector: Arc<dyn AssetInjector>,
    ) -> Option<Result<Arc<dyn Renderer>, SiteError>> {
        Some(Ok(Arc::new(HtmlEngine::new(injector))))
    }
}

/// The engine itself.
pub struct HtmlEngine {
    injector: Arc<dyn AssetInjector>,
}

impl HtmlEngine {
    pub fn new(injector: Arc<dyn AssetInjector>) -> Self {
        Self { injector }
    }

    fn render_layout(
        &self,
        req: &Request<Body>,
        content: &str,
        vars: Vars,
        layout: LayoutType,
    ) -> Result<Response, SiteError> {
        let mut doc = Document::new();
        doc.merge(FuncMap::new(), vars);
        doc = self.inject_main(doc, content, FuncMap::new(), Vars::new())?;
        doc = self.injector.inject(self, doc, req, layout)?;
        Toolkit::html(self.expand_document(&doc, layout))
    }

    fn expand_document(&self, doc: &Document, layout: LayoutType) -> String {
        let class = match layout {
            LayoutType::Page => "layout-page",
            LayoutType::Post => "layout-post",
        };
        let title = doc
            .vars
            .get("title")
            .map(|v| format!("<title>{}</title>\n", escape_html(&value_text(v))))
            .unwrap_or_default();

        let shell = format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n{title}{head}\n</head>\n\
             <body class=\"{class}\">\n<header>\n{header}\n</header>\n\
             <main>\n{main}\n</main>\n<footer>\n{footer}\n</footer>\n{body}\n</body>\n</html>\n",
            head = doc.head,
            header = doc.header,
            main = doc.main,
            footer = doc.footer,
            body = doc.body,
        );
        expand(&shell, &doc.funcs, &doc.vars)
    }
}

/// Rejects fragments with an opening `{{` that never closes. Everything else
/// is committed as-is; expansion deals with unknown tokens.
fn validate_fragment(fragment: &str) -> Result<(), SiteError> {
    let mut rest = fragment;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => rest = &after[end + 2..],
            None => {
                return Err(SiteError::Render(
                    "unclosed template token in fragment".to_string(),
                ))
            }
        }
    }
    Ok(())
}

/// Expands `{{name}}` tokens. Variables win over functions when both exist
/// under one name; variables are escaped, function output is not.
fn expand(input: &str, funcs: &FuncMap, vars: &Vars) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let token = after[..end].trim();
                if let Some(value) = vars.get(token) {
                    out.push_str(&escape_html(&value_text(value)));
                } else if let Some(func) = funcs.get(token) {
                    out.push_str(&func());
                } else {
                    tracing::debug!(%token, "unknown template token left in place");
                    out.push_str(&rest[start..start + 2 + end + 2]);
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Renderer for HtmlEngine {
    fn inject_head(
        &self,
        mut doc: Document,
        fragment: &str,
        funcs: FuncMap,
        vars: Vars,
    ) -> Result<Document, SiteError> {
        validate_fragment(fragment)?;
        Document::append(&mut doc.head, fragment);
        doc.merge(funcs, vars);
        Ok(doc)
    }

    fn inject_header(
        &self,
        mut doc: Document,
        fragment: &str,
        funcs: FuncMap,
        vars: Vars,
    ) -> Result<Document, SiteError> {
        validate_fragment(fragment)?;
        Document::append(&mut doc.header, fragment);
        doc.merge(funcs, vars);
        Ok(doc)
    }

    fn inject_main(
        &self,
        mut doc: Document,
        fragment: &str,
        funcs: FuncMap,
        vars: Vars,
    ) -> Result<Document, SiteError> {
        validate_fragment(fragment)?;
        Document::append(&mut doc.main, fragment);
        doc.merge(funcs, vars);
        Ok(doc)
    }

    fn inject_body(
        &self,
        mut doc: Document,
        fragment: &str,
        funcs: FuncMap,
        vars: Vars,
    ) -> Result<Document, SiteError> {
        validate_fragment(fragment)?;
        Document::append(&mut doc.body, fragment);
        doc.merge(funcs, vars);
        Ok(doc)
    }

    fn inject_footer(
        &self,
        mut doc: Document,
        fragment: &str,
        funcs: FuncMap,
        vars: Vars,
    ) -> Result<Document, SiteError> {
        validate_fragment(fragment)?;
        Document::append(&mut doc.footer, fragment);
        doc.merge(funcs, vars);
        Ok(doc)
    }

    fn page(&self, req: &Request<Body>, content: &str, vars: Vars) -> Result<Response, SiteError> {
        self.render_layout(req, content, vars, LayoutType::Page)
    }

    fn post(&self, req: &Request<Body>, content: &str, vars: Vars) -> Result<Response, SiteError> {
        self.render_layout(req, content, vars, LayoutType::Post)
    }

    fn error(&self, status: StatusCode, message: &str) -> Response {
        let reason = status.canonical_reason().unwrap_or("Error");
        let html = format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head><title>{code} {reason}</title></head>\n\
             <body class=\"layout-error\">\n<main>\n<h1>{code} {reason}</h1>\n<p>{message}</p>\n\
             </main>\n</body>\n</html>\n",
            code = status.as_u16(),
            message = escape_html(message),
        );
        Response::builder()
            .status(status)
            .header(axum::http::header::CONTENT_TYPE, "text/html; charset=utf-8")
            .body(Body::from(html))
            .unwrap_or_default()
    }
}
