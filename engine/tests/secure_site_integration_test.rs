//! Integration tests for the grant-checked site facade
//!
//! Every facade method names the grants it needs; these tests pin the
//! decision for each operation family, the host identity bypass, and the
//! mutations' persistence semantics.

mod common;

use chrono::{TimeZone, Utc};
use common::{MockPlugin, SharedStore, StubSession, TestBed};
use sdk::{
    Grant, Plugin, Post, SecureSite, SessionManager, Setting, SiteError,
};
use serde_json::json;
use std::sync::Arc;

use atrium_engine::storage::Storage;
use axum::body::Body;
use axum::http::Request;

async fn bed_with(names: &[&str]) -> TestBed {
    let plugins = names
        .iter()
        .map(|n| Arc::new(MockPlugin::new(n)) as Arc<dyn Plugin>)
        .collect();
    common::boot(plugins, &[]).await
}

fn post_at(title: &str, year: i32, published: bool, page: bool) -> Post {
    Post {
        title: title.to_string(),
        url: title.to_lowercase(),
        timestamp: Some(Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap()),
        content: format!("<p>{title}</p>"),
        published,
        page,
        tags: Vec::new(),
    }
}

#[tokio::test]
async fn test_site_field_reads_require_their_grant() {
    let bed = bed_with(&["mp1"]).await;
    let site = bed.host.derive("mp1");

    assert!(matches!(
        site.title(),
        Err(SiteError::AccessDenied { plugin, grant })
            if plugin == "mp1" && grant == Grant::SiteTitleRead
    ));

    bed.system
        .set_grant("mp1", Grant::SiteTitleRead, true)
        .await
        .unwrap();
    assert_eq!(site.title().unwrap(), "");
}

#[tokio::test]
async fn test_writes_are_granted_separately_and_persist() {
    let bed = bed_with(&["mp1"]).await;
    let site = bed.host.derive("mp1");
    bed.system
        .set_grant("mp1", Grant::SiteTitleWrite, true)
        .await
        .unwrap();

    site.set_title("Quiet Corner").await.unwrap();
    // The write grant does not imply the read grant.
    assert!(site.title().is_err());
    assert_eq!(bed.host.title().unwrap(), "Quiet Corner");
    assert_eq!(
        bed.storage.read(|site| site.title.clone()),
        "Quiet Corner"
    );
}

#[tokio::test]
async fn test_host_identity_bypasses_every_check() {
    let bed = bed_with(&["mp1"]).await;

    bed.host.set_title("t").await.unwrap();
    bed.host.set_content("<p>c</p>").await.unwrap();
    bed.host.set_scheme("https").await.unwrap();
    bed.host.set_url("example.org").await.unwrap();
    assert_eq!(bed.host.full_url().unwrap(), "https://example.org");
    assert!(bed.host.plugins().is_ok());
    assert!(bed.host.posts_and_pages(false).is_ok());
}

#[tokio::test]
async fn test_derived_facade_narrows_to_its_identity() {
    let bed = bed_with(&["mp1"]).await;
    let site = bed.host.derive("mp1");
    assert_eq!(site.identity(), "mp1");
    // Deriving from the host facade conveys none of its authority.
    assert!(site.title().is_err());
}

#[tokio::test]
async fn test_full_url_needs_both_read_grants() {
    let bed = bed_with(&["mp1"]).await;
    bed.host.set_scheme("https").await.unwrap();
    bed.host.set_url("example.org").await.unwrap();
    let site = bed.host.derive("mp1");

    assert!(matches!(
        site.full_url(),
        Err(SiteError::AccessDenied { grant: Grant::SiteURLRead, .. })
    ));

    bed.system
        .set_grant("mp1", Grant::SiteURLRead, true)
        .await
        .unwrap();
    assert!(matches!(
        site.full_url(),
        Err(SiteError::AccessDenied { grant: Grant::SiteSchemeRead, .. })
    ));

    bed.system
        .set_grant("mp1", Grant::SiteSchemeRead, true)
        .await
        .unwrap();
    assert_eq!(site.full_url().unwrap(), "https://example.org");
}

#[tokio::test]
async fn test_updated_errors_until_first_save() {
    // No plugins registered, so boot writes nothing.
    let bed = common::boot(vec![], &[]).await;
    assert!(matches!(bed.host.updated(), Err(SiteError::NotFound(_))));

    bed.host.set_title("first save").await.unwrap();
    assert!(bed.host.updated().is_ok());
}

#[tokio::test]
async fn test_post_lifecycle_and_orderings() {
    let bed = bed_with(&["mp1"]).await;
    bed.host.save_post("p1", post_at("Old", 2023, true, false)).await.unwrap();
    bed.host.save_post("p2", post_at("New", 2025, true, false)).await.unwrap();
    bed.host.save_post("p3", post_at("Draft", 2024, false, false)).await.unwrap();
    bed.host.save_post("p4", post_at("About", 2022, true, true)).await.unwrap();

    let all = bed.host.posts_and_pages(false).unwrap();
    let ids: Vec<&str> = all.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["p2", "p3", "p1", "p4"]);

    let published = bed.host.posts_and_pages(true).unwrap();
    assert_eq!(published.len(), 3);
    assert!(published.iter().all(|e| e.post.published));

    let posts = bed.host.published_posts().unwrap();
    let ids: Vec<&str> = posts.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["p2", "p1"]);

    let pages = bed.host.published_pages().unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].id, "p4");

    assert_eq!(bed.host.post_by_id("p3").unwrap().title, "Draft");

    bed.host.delete_post_by_id("p1").await.unwrap();
    assert!(matches!(
        bed.host.post_by_id("p1"),
        Err(SiteError::NotFound(msg)) if msg == "post p1"
    ));
    assert!(matches!(
        bed.host.delete_post_by_id("p1").await,
        Err(SiteError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_post_operations_respect_grants() {
    let bed = bed_with(&["mp1"]).await;
    bed.host.save_post("p1", post_at("One", 2024, true, false)).await.unwrap();
    let site = bed.host.derive("mp1");
    bed.system
        .set_grant("mp1", Grant::SitePostRead, true)
        .await
        .unwrap();

    assert_eq!(site.published_posts().unwrap().len(), 1);
    assert!(matches!(
        site.save_post("p2", post_at("Two", 2024, true, false)).await,
        Err(SiteError::AccessDenied { grant: Grant::SitePostWrite, .. })
    ));
    assert!(matches!(
        site.delete_post_by_id("p1").await,
        Err(SiteError::AccessDenied { grant: Grant::SitePostDelete, .. })
    ));
}

#[tokio::test]
async fn test_grant_assignment_requires_a_request() {
    let bed = common::boot(
        vec![Arc::new(MockPlugin::new("mp2").with_grants(&[Grant::SiteTitleRead]))
            as Arc<dyn Plugin>],
        &[],
    )
    .await;

    // Assigning something the plugin never asked for fails and writes
    // nothing.
    assert!(matches!(
        bed.host
            .set_neighbor_plugin_grant("mp2", Grant::SitePostWrite, true)
            .await,
        Err(SiteError::GrantNotRequested { plugin, grant })
            if plugin == "mp2" && grant == Grant::SitePostWrite
    ));
    let grants = bed.host.neighbor_plugin_grants("mp2").unwrap();
    assert!(!grants.contains_key(&Grant::SitePostWrite));

    bed.host
        .set_neighbor_plugin_grant("mp2", Grant::SiteTitleRead, true)
        .await
        .unwrap();
    assert!(bed
        .host
        .neighbor_plugin_granted("mp2", Grant::SiteTitleRead)
        .unwrap());

    // Revocation is legal even for grants that were never requested, so
    // stale assignments in an edited document can always be cleaned up.
    bed.host
        .set_neighbor_plugin_grant("mp2", Grant::SitePostWrite, false)
        .await
        .unwrap();
    let grants = bed.host.neighbor_plugin_grants("mp2").unwrap();
    assert_eq!(grants.get(&Grant::SitePostWrite), Some(&false));
}

#[tokio::test]
async fn test_neighbor_grant_operations_are_gated() {
    let bed = bed_with(&["mp1", "mp2"]).await;
    let site = bed.host.derive("mp1");

    assert!(matches!(
        site.neighbor_plugin_grants("mp2"),
        Err(SiteError::AccessDenied { grant: Grant::PluginNeighborGrantRead, .. })
    ));
    assert!(matches!(
        site.set_neighbor_plugin_grant("mp2", Grant::SiteTitleRead, true).await,
        Err(SiteError::AccessDenied { grant: Grant::PluginNeighborGrantWrite, .. })
    ));

    bed.system
        .set_grant("mp1", Grant::PluginNeighborGrantRead, true)
        .await
        .unwrap();
    assert!(site.neighbor_plugin_grants("mp2").unwrap().is_empty());
    assert!(site.neighbor_plugin_grant_list("mp2").unwrap().is_empty());
    assert!(matches!(
        site.neighbor_plugin_grants("ghost"),
        Err(SiteError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_setting_resolution_stored_then_default() {
    let declared = Setting::new("Subtitle", json!("fallback"));
    let bed = common::boot(
        vec![Arc::new(MockPlugin::new("mp1").with_setting(declared)) as Arc<dyn Plugin>],
        &[],
    )
    .await;
    let site = bed.host.derive("mp1");
    bed.system
        .set_grant("mp1", Grant::PluginSettingRead, true)
        .await
        .unwrap();
    bed.system
        .set_grant("mp1", Grant::PluginSettingWrite, true)
        .await
        .unwrap();

    // Nothing stored yet: the declared default answers.
    assert_eq!(site.plugin_setting_string("Subtitle").unwrap(), "fallback");

    site.set_plugin_setting("Subtitle", json!("stored")).await.unwrap();
    assert_eq!(site.plugin_setting_string("Subtitle").unwrap(), "stored");
    assert_eq!(site.plugin_setting("Subtitle").unwrap(), json!("stored"));

    // Undeclared names are rejected on both sides.
    assert!(matches!(
        site.set_plugin_setting("Nope", json!(1)).await,
        Err(SiteError::SettingNotSpecified { setting, .. }) if setting == "Nope"
    ));
    assert!(matches!(
        site.plugin_setting("Nope"),
        Err(SiteError::SettingNotSpecified { .. })
    ));
}

#[tokio::test]
async fn test_plugin_setting_bool_coercion() {
    let bed = common::boot(
        vec![Arc::new(
            MockPlugin::new("mp1").with_setting(Setting::new("Flag", json!(false))),
        ) as Arc<dyn Plugin>],
        &[],
    )
    .await;

    assert!(!bed.host.plugin_setting_bool("Flag").unwrap());

    for (value, expect) in [
        (json!(true), true),
        (json!("true"), true),
        (json!("yes"), false),
        (json!(1), false),
    ] {
        bed.host.set_plugin_setting("Flag", value).await.unwrap();
        assert_eq!(bed.host.plugin_setting_bool("Flag").unwrap(), expect);
    }
}

#[tokio::test]
async fn test_neighbor_settings_are_gated_and_validated() {
    let bed = common::boot(
        vec![
            Arc::new(MockPlugin::new("mp1")) as Arc<dyn Plugin>,
            Arc::new(MockPlugin::new("mp2").with_setting(Setting::new("Mode", json!("day"))))
                as Arc<dyn Plugin>,
        ],
        &[],
    )
    .await;
    let site = bed.host.derive("mp1");

    assert!(matches!(
        site.neighbor_plugin_setting_string("mp2", "Mode"),
        Err(SiteError::AccessDenied { grant: Grant::PluginNeighborSettingRead, .. })
    ));

    bed.system
        .set_grant("mp1", Grant::PluginNeighborSettingRead, true)
        .await
        .unwrap();
    bed.system
        .set_grant("mp1", Grant::PluginNeighborSettingWrite, true)
        .await
        .unwrap();

    assert_eq!(
        site.neighbor_plugin_setting_string("mp2", "Mode").unwrap(),
        "day"
    );
    assert_eq!(site.neighbor_plugin_settings_list("mp2").unwrap().len(), 1);

    site.set_neighbor_plugin_setting("mp2", "Mode", json!("night"))
        .await
        .unwrap();
    assert_eq!(
        site.neighbor_plugin_setting_string("mp2", "Mode").unwrap(),
        "night"
    );

    assert!(matches!(
        site.set_neighbor_plugin_setting("mp2", "Undeclared", json!(0)).await,
        Err(SiteError::SettingNotSpecified { .. })
    ));
}

#[tokio::test]
async fn test_enable_needs_a_live_instance() {
    let bed = bed_with(&["mp1"]).await;
    assert!(matches!(
        bed.host.enable_plugin("ghost", false).await,
        Err(SiteError::NotFound(_))
    ));

    // A bare stored record without a registered instance cannot be enabled
    // either.
    bed.storage
        .mutate(|site| {
            site.plugins
                .insert("orphan".to_string(), sdk::PluginData::new("1.0.0"));
            Ok(())
        })
        .await
        .unwrap();
    assert!(matches!(
        bed.host.enable_plugin("orphan", false).await,
        Err(SiteError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_enable_disable_cycle_drives_dispatch() {
    let bed = common::boot(
        vec![Arc::new(MockPlugin::new("mp1").with_route("GET", "/hello")) as Arc<dyn Plugin>],
        &[],
    )
    .await;
    bed.system
        .set_grant("mp1", Grant::RouterRouteWrite, true)
        .await
        .unwrap();

    bed.host.enable_plugin("mp1", true).await.unwrap();
    let resp = bed.serve("GET", "/hello").await.unwrap();
    assert_eq!(common::body_text(resp).await, "mp1");
    assert_eq!(bed.system.routes("mp1").len(), 1);
    assert_eq!(bed.host.plugin_neighbor_routes_list("mp1").unwrap().len(), 1);

    // Disabling without unload keeps the routes recorded but gates them.
    bed.host.disable_plugin("mp1", false).await.unwrap();
    assert!(matches!(
        bed.serve("GET", "/hello").await,
        Err(SiteError::NotFound(_))
    ));

    bed.host.enable_plugin("mp1", false).await.unwrap();
    assert!(bed.serve("GET", "/hello").await.is_ok());

    // Unloading clears the recorded routes and the bookkeeping.
    bed.host.disable_plugin("mp1", true).await.unwrap();
    assert!(bed.system.routes("mp1").is_empty());
    bed.host.enable_plugin("mp1", false).await.unwrap();
    assert!(matches!(
        bed.serve("GET", "/hello").await,
        Err(SiteError::NotFound(_))
    ));

    // A full reload brings them back.
    bed.host.enable_plugin("mp1", true).await.unwrap();
    assert!(bed.serve("GET", "/hello").await.is_ok());
}

#[tokio::test]
async fn test_disable_unload_runs_the_disable_hook() {
    let mp1 = Arc::new(MockPlugin::new("mp1"));
    let bed = common::boot(vec![Arc::clone(&mp1) as Arc<dyn Plugin>], &[]).await;

    bed.host.enable_plugin("mp1", true).await.unwrap();
    assert!(mp1.toolkit().is_some());

    bed.host.disable_plugin("mp1", false).await.unwrap();
    assert!(mp1.toolkit().is_some());

    bed.host.disable_plugin("mp1", true).await.unwrap();
    assert!(mp1.toolkit().is_none());
}

#[tokio::test]
async fn test_plugin_management_is_gated() {
    let bed = bed_with(&["mp1", "mp2"]).await;
    let site = bed.host.derive("mp1");

    assert!(matches!(
        site.enable_plugin("mp2", false).await,
        Err(SiteError::AccessDenied { grant: Grant::SitePluginEnable, .. })
    ));
    assert!(matches!(
        site.disable_plugin("mp2", false).await,
        Err(SiteError::AccessDenied { grant: Grant::SitePluginDisable, .. })
    ));
    assert!(matches!(
        site.delete_plugin("mp2").await,
        Err(SiteError::AccessDenied { grant: Grant::SitePluginDelete, .. })
    ));
    assert!(matches!(
        site.plugins(),
        Err(SiteError::AccessDenied { grant: Grant::SitePluginRead, .. })
    ));
    assert!(matches!(
        site.load_all_plugin_pages().await,
        Err(SiteError::AccessDenied { grant: Grant::SiteLoadTrigger, .. })
    ));
}

#[tokio::test]
async fn test_delete_reinitializes_registered_plugins() {
    let bed = bed_with(&["mp1"]).await;
    bed.enable_with_grants("mp1", &[Grant::SiteTitleRead]).await;

    bed.host.delete_plugin("mp1").await.unwrap();

    // Still registered, so a blank record takes the old one's place.
    let record = bed.system.plugin_data("mp1").unwrap();
    assert!(!record.enabled);
    assert_eq!(record.version, "1.0.0");
    assert!(record.grants.is_empty());

    // Unregistered names have nothing to delete.
    assert!(matches!(
        bed.host.delete_plugin("ghost").await,
        Err(SiteError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_load_all_continues_past_a_broken_plugin() {
    let bed = common::boot(
        vec![
            Arc::new(MockPlugin::new("bad").failing_enable()) as Arc<dyn Plugin>,
            Arc::new(MockPlugin::new("good").with_route("GET", "/ok")) as Arc<dyn Plugin>,
        ],
        &[],
    )
    .await;
    bed.enable_with_grants("bad", &[]).await;
    bed.enable_with_grants("good", &[Grant::RouterRouteWrite]).await;

    bed.host.load_all_plugin_pages().await.unwrap();

    let resp = bed.serve("GET", "/ok").await.unwrap();
    assert_eq!(common::body_text(resp).await, "good");
}

#[tokio::test]
async fn test_load_all_skips_disabled_plugins() {
    let bed = common::boot(
        vec![Arc::new(MockPlugin::new("mp1").with_route("GET", "/hello")) as Arc<dyn Plugin>],
        &[],
    )
    .await;
    bed.system
        .set_grant("mp1", Grant::RouterRouteWrite, true)
        .await
        .unwrap();

    // Disabled, so the pass never reaches it.
    bed.host.load_all_plugin_pages().await.unwrap();
    assert!(matches!(
        bed.serve("GET", "/hello").await,
        Err(SiteError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_route_clearing_operations() {
    let bed = common::boot(
        vec![Arc::new(
            MockPlugin::new("mp1")
                .with_route("GET", "/a")
                .with_route("GET", "/b"),
        ) as Arc<dyn Plugin>],
        &[],
    )
    .await;
    bed.system
        .set_grant("mp1", Grant::RouterRouteWrite, true)
        .await
        .unwrap();
    bed.host.enable_plugin("mp1", true).await.unwrap();
    assert_eq!(bed.system.routes("mp1").len(), 2);

    let site = bed.host.derive("mp1");
    assert!(matches!(
        site.clear_route("GET", "/a"),
        Err(SiteError::AccessDenied { grant: Grant::RouterRouteClear, .. })
    ));

    bed.system
        .set_grant("mp1", Grant::RouterRouteClear, true)
        .await
        .unwrap();
    site.clear_route("GET", "/a").unwrap();
    let remaining = bed.system.routes("mp1");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].path, "/b");
    assert!(matches!(
        bed.serve("GET", "/a").await,
        Err(SiteError::NotFound(_))
    ));

    // A neighbor needs its own grant to clear everything.
    let other = bed.host.derive("mp2");
    assert!(matches!(
        other.clear_neighbor_routes("mp1"),
        Err(SiteError::AccessDenied { grant: Grant::RouterNeighborRouteClear, .. })
    ));
    bed.host.clear_neighbor_routes("mp1").unwrap();
    assert!(bed.system.routes("mp1").is_empty());
    assert!(matches!(
        bed.serve("GET", "/b").await,
        Err(SiteError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_user_operations_without_a_session_manager() {
    let bed = bed_with(&["mp1"]).await;
    let req = Request::builder().uri("/").body(Body::empty()).unwrap();

    assert!(matches!(
        bed.host.authenticated_user(&req),
        Err(SiteError::Unavailable(what)) if what == "session manager"
    ));
    assert!(bed.host.set_csrf(&req).is_err());
    assert!(!bed.host.csrf(&req, "anything"));
}

#[tokio::test]
async fn test_user_operations_through_a_session_manager() {
    let stub = Arc::new(StubSession::new());
    let session: Arc<dyn SessionManager> = Arc::clone(&stub) as Arc<dyn SessionManager>;
    let bed = common::boot_with_session(
        vec![Arc::new(MockPlugin::new("mp1")) as Arc<dyn Plugin>],
        &[],
        Some(session),
    )
    .await;
    let site = bed.host.derive("mp1");
    let req = Request::builder().uri("/").body(Body::empty()).unwrap();

    assert!(matches!(
        site.authenticated_user(&req),
        Err(SiteError::AccessDenied { grant: Grant::UserAuthenticatedRead, .. })
    ));
    assert!(matches!(
        site.user_login(&req, "ada"),
        Err(SiteError::AccessDenied { grant: Grant::UserAuthenticatedWrite, .. })
    ));
    assert!(matches!(
        site.user_persist(&req, true),
        Err(SiteError::AccessDenied { grant: Grant::UserPersistWrite, .. })
    ));

    bed.system
        .set_grant("mp1", Grant::UserAuthenticatedRead, true)
        .await
        .unwrap();
    bed.system
        .set_grant("mp1", Grant::UserAuthenticatedWrite, true)
        .await
        .unwrap();

    assert!(matches!(
        site.authenticated_user(&req),
        Err(SiteError::NotAuthenticated)
    ));
    site.user_login(&req, "ada").unwrap();
    assert_eq!(site.authenticated_user(&req).unwrap(), "ada");
    site.user_logout(&req).unwrap();
    assert!(site.authenticated_user(&req).is_err());

    // CSRF helpers carry no grant; any plugin serving a form needs them.
    assert_eq!(site.set_csrf(&req).unwrap(), "stub-csrf");
    assert!(site.csrf(&req, "stub-csrf"));
    assert!(!site.csrf(&req, "wrong"));
}

#[tokio::test]
async fn test_load_site_rereads_the_backend() {
    let bed = bed_with(&["mp1"]).await;
    let site = bed.host.derive("mp1");

    // Another writer shares the same backing store.
    let other = Storage::open(Box::new(SharedStore(Arc::clone(&bed.store))))
        .await
        .unwrap();
    other
        .mutate(|site| {
            site.title = "external".to_string();
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(bed.host.title().unwrap(), "");

    assert!(matches!(
        site.load_site().await,
        Err(SiteError::AccessDenied { grant: Grant::SiteLoadTrigger, .. })
    ));
    bed.system
        .set_grant("mp1", Grant::SiteLoadTrigger, true)
        .await
        .unwrap();
    site.load_site().await.unwrap();
    assert_eq!(bed.host.title().unwrap(), "external");
}

#[tokio::test]
async fn test_plugin_listing_reads() {
    let bed = bed_with(&["mp1", "mp2"]).await;
    assert_eq!(bed.host.plugin_names().unwrap(), vec!["mp1", "mp2"]);
    let records = bed.host.plugins().unwrap();
    assert!(records.contains_key("mp1"));
    assert!(records.contains_key("mp2"));
}
