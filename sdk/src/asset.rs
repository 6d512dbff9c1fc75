//! Page assets contributed by plugins
//!
//! An asset is one fragment a plugin wants merged into rendered pages: a
//! stylesheet, a script, or a generic element such as a meta tag. The host
//! collects assets from every enabled plugin with the `site.asset:write`
//! grant, filters them by auth state and layout, and injects the surviving
//! elements into the named locations of the page template.

use serde::{Deserialize, Serialize};

/// What kind of file an asset is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    #[default]
    Stylesheet,
    Javascript,
    /// An arbitrary element described by `tag_name`, `attributes` and
    /// `content` rather than a file.
    Generic,
}

/// Where in the page an asset is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetLocation {
    #[default]
    Head,
    Header,
    Main,
    Footer,
    /// End of the document body, after the footer.
    Body,
}

/// Which visitors see an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    /// Everyone.
    #[default]
    All,
    /// Only requests without an authenticated user.
    Anonymous,
    /// Only requests with an authenticated user.
    Authenticated,
}

/// Which page layout an asset is limited to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutType {
    Page,
    Post,
}

/// One attribute on a generic asset element. A `value` of `None` renders as
/// a bare attribute name, as in `<script defer>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetAttribute {
    pub name: String,
    pub value: Option<String>,
}

impl AssetAttribute {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: Some(value.to_string()),
        }
    }

    pub fn bare(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: None,
        }
    }
}

/// A page fragment contributed by a plugin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Asset {
    /// URL path for file assets. Non-external, non-inline file assets are
    /// also served by the host at this path.
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub filetype: FileType,
    #[serde(default)]
    pub location: AssetLocation,
    /// True when `path` points at another origin.
    #[serde(default)]
    pub external: bool,
    /// True when `content` should be emitted inline instead of referencing
    /// `path`.
    #[serde(default)]
    pub inline: bool,
    #[serde(default)]
    pub auth: AuthType,
    /// When set, the asset only appears on the named layout.
    #[serde(default)]
    pub layout_only: Option<LayoutType>,
    /// Tag name for generic assets, for example `meta`.
    #[serde(default)]
    pub tag_name: String,
    /// Whether the generic element needs a closing tag.
    #[serde(default)]
    pub closing_tag: bool,
    /// Inline file content, or the text content of a generic element. Emitted
    /// verbatim, so it may carry template tokens.
    #[serde(default)]
    pub content: String,
    /// Attributes for generic assets.
    #[serde(default)]
    pub attributes: Vec<AssetAttribute>,
}

impl Asset {
    /// Whether the host should register a route serving this asset's content.
    pub fn routable(&self) -> bool {
        !self.external && !self.inline && self.filetype != FileType::Generic
    }

    /// Whether this is a charset declaration, which must be hoisted to the
    /// front of the head regardless of plugin order.
    pub fn is_charset(&self) -> bool {
        self.tag_name == "meta" && self.attributes.iter().any(|a| a.name == "charset")
    }

    /// The content type the host serves a routable asset with.
    pub fn content_type(&self) -> &'static str {
        match self.filetype {
            FileType::Stylesheet => "text/css; charset=utf-8",
            FileType::Javascript => "application/javascript; charset=utf-8",
            FileType::Generic => "text/html; charset=utf-8",
        }
    }

    /// Renders the asset as an HTML element string. Attribute values and
    /// paths are escaped; `content` is not.
    pub fn element(&self) -> String {
        match self.filetype {
            FileType::Stylesheet => {
                if self.inline {
                    format!("<style>{}</style>", self.content)
                } else {
                    format!("<link rel=\"stylesheet\" href=\"{}\">", escape_attr(&self.path))
                }
            }
            FileType::Javascript => {
                if self.inline {
                    format!("<script>{}</script>", self.content)
                } else {
                    format!("<script src=\"{}\"></script>", escape_attr(&self.path))
                }
            }
            FileType::Generic => {
                if self.tag_name.is_empty() {
                    return self.content.clone();
                }
                let mut out = String::new();
                out.push('<');
                out.push_str(&self.tag_name);
                for attr in &self.attributes {
                    out.push(' ');
                    out.push_str(&attr.name);
                    if let Some(value) = &attr.value {
                        out.push_str("=\"");
                        out.push_str(&escape_attr(value));
                        out.push('"');
                    }
                }
                out.push('>');
                if self.closing_tag {
                    out.push_str(&self.content);
                    out.push_str("</");
                    out.push_str(&self.tag_name);
                    out.push('>');
                }
                out
            }
        }
    }
}

/// Escapes a string for use inside a double-quoted HTML attribute.
pub fn escape_attr(input: &str) -> String {
    escape_html(input)
}

/// Escapes HTML-significant characters.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
