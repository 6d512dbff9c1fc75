//! Shared contracts and data types for Atrium plugins
//!
//! This crate is the whole surface a plugin sees. It defines:
//!
//! - [`Plugin`], the contract every plugin implements, and [`PluginLoader`],
//!   the boot-time plugin set
//! - [`SecureSite`], the grant-checked facade each plugin is handed
//! - [`Grant`] and [`GrantRequest`], the fixed permission vocabulary
//! - [`Toolkit`], [`Mux`] and [`PluginLogger`], the per-plugin handles
//! - the capability contracts the host fills from plugins:
//!   [`AppRouter`], [`SessionManager`], [`Renderer`] and [`AssetInjector`]
//! - [`DataStorer`], the persistence contract for the site document
//! - the models stored in the site document ([`PluginData`], [`Post`]) and
//!   the page-composition types ([`Asset`], [`Document`], [`Setting`])
//!
//! Plugins depend on this crate alone; the engine depends on it plus the
//! plugin crates it boots with.

pub mod asset;
pub mod contracts;
pub mod errors;
pub mod grant;
pub mod handler;
pub mod models;
pub mod plugin;
pub mod render;
pub mod secure_site;
pub mod setting;
pub mod toolkit;

pub use asset::{escape_attr, escape_html, Asset, AssetAttribute, AssetLocation, AuthType, FileType, LayoutType};
pub use contracts::{AppRouter, DataStorer, RouteRegistrar, SessionManager};
pub use errors::{SiteError, SiteErrorExt};
pub use grant::{Grant, GrantRequest};
pub use handler::{handler_fn, Handler, HandlerFuture, Middleware, Route, RouteParams};
pub use models::{PluginData, Post, PostWithID};
pub use plugin::{Plugin, PluginLoader, HOST_IDENTITY};
pub use render::{AssetInjector, Document, FuncMap, Renderer, TemplateFunc, Vars};
pub use secure_site::SecureSite;
pub use setting::{Setting, SettingDescription, SettingType};
pub use toolkit::{Mux, PluginLogger, Toolkit};
