/// Application name
pub const APP_NAME: &str = "plughost";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Plugin directory under the config directory
pub const PLUGINS_DIR: &str = "plugins";

/// Plugin registry file, under the config directory
pub const PLUGIN_REGISTRY_FILE: &str = "plugins.config";

/// Host settings file, under the config directory
pub const HOST_SETTINGS_FILE: &str = "host.json";

/// Per-plugin manifest file
pub const PLUGIN_MANIFEST_FILE: &str = "plugin.config";

/// Per-plugin client app manifest file
pub const CLIENTS_MANIFEST_FILE: &str = "clients.config";

/// Registry key prefix and suffix: `plugin.<name>.startOnLoad`
pub const REGISTRY_PREFIX: &str = "plugin.";
pub const REGISTRY_ENABLED_SUFFIX: &str = ".startOnLoad";

/// Built-in webapps a plugin may never shadow
pub const STANDARD_WEBAPPS: &[&str] = &[
    "snark", "tunnels", "addressbook", "mail", "dns", "console",
];

/// Built-in themes a plugin may never shadow
pub const STANDARD_THEMES: &[&str] = &["images", "light", "dark", "classic", "midnight"];

/// Theme registration key prefix, `console.theme.<name>` -> absolute path
pub const THEME_PREFIX: &str = "console.theme.";

/// Currently selected theme
pub const CURRENT_THEME_KEY: &str = "console.theme";

/// Theme selected when the current one is uninstalled
pub const DEFAULT_THEME: &str = "light";

/// Master switch for plugin startup
pub const PLUGINS_ENABLED_KEY: &str = "plugins.enabled";

/// Console display language
pub const LANGUAGE_KEY: &str = "console.lang";
pub const DEFAULT_LANGUAGE: &str = "en";

/// Retry interval used when a delayed client app is not yet loadable
pub const RETRY_SHORT_MILLIS_KEY: &str = "plugins.retry.shortMillis";
pub const RETRY_LONG_MILLIS_KEY: &str = "plugins.retry.longMillis";
pub const DEFAULT_RETRY_SHORT_MILLIS: u64 = 1000;
pub const DEFAULT_RETRY_LONG_MILLIS: u64 = 2000;

/// Client app delay when the manifest does not give one
pub const DEFAULT_CLIENT_DELAY_SECS: i64 = 120;

/// Placeholders substituted in client app arguments and classpaths
pub const BASE_PLACEHOLDER: &str = "$BASE";
pub const CONFIG_PLACEHOLDER: &str = "$CONFIG";
pub const PLUGIN_PLACEHOLDER: &str = "$PLUGIN";

/// Plugin console layout
pub const CONSOLE_DIR: &str = "console";
pub const THEMES_DIR: &str = "console/themes";
pub const WEBAPPS_DIR: &str = "console/webapps";
pub const LOCALE_DIR: &str = "console/locale";
pub const WEBAPPS_CONFIG_FILE: &str = "webapps.config";
pub const WEBAPP_PREFIX: &str = "webapps.";

/// Packaged webapp extension
pub const WEBAPP_EXTENSION: &str = "war";

/// Translation bundle extensions picked up from `console/locale`
pub const TRANSLATION_EXTENSIONS: &[&str] = &["mo", "ftl"];

/// Length of a base64 signing public key in `plugin.config`
pub const SIGNING_KEY_LENGTH: usize = 172;
