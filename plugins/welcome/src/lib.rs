//! Welcome content plugin
//!
//! The default front door of a fresh site: a home page listing published
//! posts, an about page, a base stylesheet, and a `poweredby` template
//! function. Also a worked example of the plugin contract, since it touches
//! routes, assets, settings, grants and template functions without being a
//! capability provider.

use axum::body::Body;
use axum::http::Request;
use sdk::{
    escape_html, handler_fn, Asset, AssetAttribute, AssetLocation, FileType, FuncMap, Grant,
    GrantRequest, Plugin, Setting, SiteError, Toolkit, Vars,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

const STYLESHEET: &str = "body { font-family: sans-serif; margin: 2rem auto; max-width: 42rem; }\n\
header, footer { color: #555; }\n\
.subtitle { font-style: italic; }\n";

pub struct WelcomePlugin {
    toolkit: Mutex<Option<Toolkit>>,
}

impl WelcomePlugin {
    pub fn new() -> Self {
        Self {
            toolkit: Mutex::new(None),
        }
    }

    fn toolkit(&self) -> Option<Toolkit> {
        self.toolkit.lock().expect("toolkit lock poisoned").clone()
    }
}

impl Default for WelcomePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for WelcomePlugin {
    fn plugin_name(&self) -> &str {
        "welcome"
    }

    fn plugin_version(&self) -> &str {
        "1.0.0"
    }

    fn enable(&self, toolkit: Toolkit) -> Result<(), SiteError> {
        toolkit.log.debug("enabled");
        *self.toolkit.lock().expect("toolkit lock poisoned") = Some(toolkit);
        Ok(())
    }

    fn disable(&self) -> Result<(), SiteError> {
        *self.toolkit.lock().expect("toolkit lock poisoned") = None;
        Ok(())
    }

    fn routes(&self) {
        let Some(tk) = self.toolkit() else { return };
        tk.mux.get("/", home_handler(tk.clone()));
        tk.mux.get("/about", about_handler(tk.clone()));
    }

    fn grant_requests(&self) -> Vec<GrantRequest> {
        vec![
            GrantRequest::new(Grant::SiteTitleRead, "Shows the site title on every page"),
            GrantRequest::new(Grant::SiteContentRead, "Shows the home page introduction"),
            GrantRequest::new(Grant::SitePostRead, "Lists published posts on the home page"),
            GrantRequest::new(Grant::RouterRouteWrite, "Serves the home and about pages"),
            GrantRequest::new(Grant::SiteAssetWrite, "Adds the base stylesheet"),
            GrantRequest::new(Grant::SiteFuncMapWrite, "Provides the poweredby footer text"),
            GrantRequest::new(Grant::PluginSettingRead, "Reads the Subtitle setting"),
            GrantRequest::new(Grant::UserAuthenticatedRead, "Greets logged-in visitors"),
        ]
    }

    fn settings(&self) -> Vec<Setting> {
        vec![Setting::new("Subtitle", json!(""))
            .with_description("Shown under the site title on the home page")]
    }

    fn assets(&self) -> Vec<Asset> {
        vec![
            Asset {
                filetype: FileType::Generic,
                location: AssetLocation::Head,
                tag_name: "meta".to_string(),
                attributes: vec![AssetAttribute::new("charset", "utf-8")],
                ..Default::default()
            },
            Asset {
                filetype: FileType::Stylesheet,
                location: AssetLocation::Head,
                path: "/welcome/style.css".to_string(),
                content: STYLESHEET.to_string(),
                ..Default::default()
            },
            Asset {
                filetype: FileType::Generic,
                location: AssetLocation::Footer,
                content: "<p class=\"poweredby\">{{welcome_poweredby}}</p>".to_string(),
                ..Default::default()
            },
        ]
    }

    fn funcmap(&self, _req: &Request<Body>) -> Option<FuncMap> {
        let tk = self.toolkit()?;
        let mut funcs = FuncMap::new();
        funcs.insert(
            "poweredby".to_string(),
            Arc::new(|| "Powered by Atrium".to_string()) as sdk::TemplateFunc,
        );
        let site = Arc::clone(&tk.site);
        funcs.insert(
            "subtitle".to_string(),
            Arc::new(move || {
                site.plugin_setting_string("Subtitle").unwrap_or_default()
            }) as sdk::TemplateFunc,
        );
        Some(funcs)
    }
}

fn home_handler(tk: Toolkit) -> sdk::Handler {
    handler_fn(move |req| {
        let tk = tk.clone();
        async move {
            let title = tk.site.title()?;
            let content = tk.site.content()?;
            let posts = tk.site.published_posts()?;
            let subtitle = tk.site.plugin_setting_string("Subtitle")?;

            let mut html = String::new();
            html.push_str(&format!("<h1>{}</h1>\n", escape_html(&title)));
            if !subtitle.is_empty() {
                html.push_str(&format!(
                    "<p class=\"subtitle\">{}</p>\n",
                    escape_html(&subtitle)
                ));
            }
            if let Ok(user) = tk.site.authenticated_user(&req) {
                html.push_str(&format!(
                    "<p>Welcome back, {}.</p>\n",
                    escape_html(&user)
                ));
            }
            // Site content is trusted HTML written by the site owner.
            html.push_str(&content);
            if !posts.is_empty() {
                html.push_str("\n<ul class=\"posts\">\n");
                for entry in posts {
                    html.push_str(&format!(
                        "<li><a href=\"/{}\">{}</a></li>\n",
                        escape_html(&entry.post.url),
                        escape_html(&entry.post.title)
                    ));
                }
                html.push_str("</ul>\n");
            }

            let mut vars = Vars::new();
            vars.insert("title".to_string(), json!(title));
            tk.render.page(&req, &html, vars)
        }
    })
}

fn about_handler(tk: Toolkit) -> sdk::Handler {
    handler_fn(move |req| {
        let tk = tk.clone();
        async move {
            let title = tk.site.title()?;
            let html = format!(
                "<h1>About {}</h1>\n<p>This site runs on Atrium, a plugin-driven web host.</p>\n",
                escape_html(&title)
            );
            let mut vars = Vars::new();
            vars.insert("title".to_string(), json!(format!("About {title}")));
            tk.render.page(&req, &html, vars)
        }
    })
}
