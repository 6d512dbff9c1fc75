use atrium_engine::config::{Config, StorageKind};
use atrium_engine::injector::namespaced_func_name;
use atrium_engine::validate::{
    normalize_plugin_name, validate_plugin_name, validate_plugin_version,
};
use proptest::prelude::*;
use std::path::PathBuf;

proptest! {
    #[test]
    fn test_config_round_trips_through_toml(
        host in "[a-z0-9.]{1,20}",
        port in any::<u16>(),
        log_level in "error|warn|info|debug|trace",
        dev_console in any::<bool>(),
        kind in prop_oneof![Just(StorageKind::Memory), Just(StorageKind::Local)],
        encrypt in any::<bool>(),
        site_dir in "[a-z]{1,10}",
        trusted in proptest::collection::vec("[a-z][a-z0-9]{0,8}", 0..4),
    ) {
        let mut config = Config::default();
        config.server.host = host;
        config.server.port = port;
        config.server.log_level = log_level;
        config.server.dev_console = dev_console;
        config.storage.kind = kind;
        config.storage.path = PathBuf::from(format!("/tmp/{site_dir}/site.json"));
        config.storage.encrypt = encrypt;
        config.plugins.trusted = trusted;

        let text = toml::to_string(&config).expect("config should serialize");
        let parsed: Config = toml::from_str(&text).expect("config should parse back");

        prop_assert_eq!(config.server.host, parsed.server.host);
        prop_assert_eq!(config.server.port, parsed.server.port);
        prop_assert_eq!(config.server.log_level, parsed.server.log_level);
        prop_assert_eq!(config.server.dev_console, parsed.server.dev_console);
        prop_assert_eq!(config.storage.kind, parsed.storage.kind);
        prop_assert_eq!(config.storage.path, parsed.storage.path);
        prop_assert_eq!(config.storage.encrypt, parsed.storage.encrypt);
        prop_assert_eq!(config.plugins.trusted, parsed.plugins.trusted);
    }
}

proptest! {
    #[test]
    fn test_normalization_is_idempotent(name in "[ -~]{0,40}") {
        let once = normalize_plugin_name(&name);
        let twice = normalize_plugin_name(&once);
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(once.trim(), once.as_str());
    }

    #[test]
    fn test_normalization_erases_case_and_padding(
        name in "[a-z][a-z0-9]{0,15}",
        pad in " {0,3}",
    ) {
        let shouted = format!("{pad}{}{pad}", name.to_uppercase());
        prop_assert_eq!(normalize_plugin_name(&shouted), name);
    }
}

proptest! {
    /// Anything that survives validation has the canonical shape: it starts
    /// with a letter, carries only lowercase alphanumerics, and is not a
    /// reserved name.
    #[test]
    fn test_accepted_names_have_the_canonical_shape(raw in "[ -~]{0,30}") {
        let name = normalize_plugin_name(&raw);
        if validate_plugin_name(&name).is_ok() {
            let mut chars = name.chars();
            prop_assert!(chars.next().is_some_and(|c| c.is_ascii_lowercase()));
            prop_assert!(chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
            prop_assert!(!matches!(name.as_str(), "atrium" | "atr" | "plugin" | "plugins"));
        }
    }
}

proptest! {
    #[test]
    fn test_function_namespacing_is_idempotent(
        plugin in "[a-z][a-z0-9]{0,10}",
        func in "[a-z0-9_]{1,12}",
    ) {
        let once = namespaced_func_name(&plugin, &func);
        let twice = namespaced_func_name(&plugin, &once);
        prop_assert_eq!(&once, &twice);
        let prefix = format!("{plugin}_");
        prop_assert!(once.starts_with(&prefix));
    }

    /// Valid plugin names carry no underscore, so two plugins can never
    /// produce the same namespaced function name.
    #[test]
    fn test_namespaces_never_collide_across_plugins(
        p1 in "[a-z][a-z0-9]{0,10}",
        p2 in "[a-z][a-z0-9]{0,10}",
        func in "[a-z0-9_]{1,12}",
    ) {
        prop_assume!(p1 != p2);
        prop_assert_ne!(
            namespaced_func_name(&p1, &func),
            namespaced_func_name(&p2, &func)
        );
    }
}

proptest! {
    #[test]
    fn test_version_validation_follows_semver(
        major in 0..100u64,
        minor in 0..100u64,
        patch in 0..100u64,
    ) {
        let full = format!("{major}.{minor}.{patch}");
        prop_assert!(validate_plugin_version("mp1", &full).is_ok());

        let partial = format!("{major}.{minor}");
        prop_assert!(validate_plugin_version("mp1", &partial).is_err());

        let prefixed = format!("v{major}.{minor}.{patch}");
        prop_assert!(validate_plugin_version("mp1", &prefixed).is_err());
    }
}
