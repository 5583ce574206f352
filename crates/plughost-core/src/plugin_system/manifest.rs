use std::path::Path;

use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::plugin_system::error::PluginSystemError;
use crate::storage::{Properties, StorageProvider};
use crate::utils::escape_html;

const CLIENT_PREFIX: &str = "clientApp.";

/// One client app declared in a plugin's `clients.config`.
///
/// Entries are numbered from zero:
///
/// ```text
/// clientApp.0.main=com.example.Foo
/// clientApp.0.name=Foo service
/// clientApp.0.args=-x $PLUGIN/data
/// clientApp.0.stopargs=stop
/// clientApp.0.delay=5
/// clientApp.0.classpath=$PLUGIN/lib/libfoo.so
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAppSpec {
    /// Entry point resolved in the execution scope
    pub class_name: String,
    pub display_name: String,
    pub start_args: String,
    pub stop_args: Option<String>,
    pub uninstall_args: Option<String>,
    /// Negative runs inline, zero runs on a new thread, positive schedules a job
    pub delay_seconds: i64,
    /// Comma-separated list of absolute paths
    pub classpath: Option<String>,
    pub disabled: bool,
}

impl ClientAppSpec {
    pub fn new(class_name: &str) -> Self {
        Self {
            class_name: class_name.to_string(),
            display_name: class_name.to_string(),
            start_args: String::new(),
            stop_args: None,
            uninstall_args: None,
            delay_seconds: constants::DEFAULT_CLIENT_DELAY_SECS,
            classpath: None,
            disabled: false,
        }
    }

    pub fn with_args(mut self, args: &str) -> Self {
        self.start_args = args.to_string();
        self
    }

    pub fn with_stop_args(mut self, args: &str) -> Self {
        self.stop_args = Some(args.to_string());
        self
    }

    pub fn with_uninstall_args(mut self, args: &str) -> Self {
        self.uninstall_args = Some(args.to_string());
        self
    }

    pub fn with_delay(mut self, delay_seconds: i64) -> Self {
        self.delay_seconds = delay_seconds;
        self
    }

    pub fn with_classpath(mut self, classpath: &str) -> Self {
        self.classpath = Some(classpath.to_string());
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Parse every entry of a client app manifest, in declaration order.
    ///
    /// Enumeration stops at the first index without a `main` key.
    pub fn parse_all(props: &Properties, source: &Path) -> std::result::Result<Vec<Self>, PluginSystemError> {
        let mut apps = Vec::new();
        for index in 0.. {
            let key = |suffix: &str| format!("{}{}.{}", CLIENT_PREFIX, index, suffix);
            let Some(class_name) = props.get(&key("main")).filter(|c| !c.is_empty()) else {
                break;
            };

            let mut spec = ClientAppSpec::new(class_name);
            if let Some(name) = props.get(&key("name")).filter(|n| !n.is_empty()) {
                spec.display_name = name.to_string();
            }
            spec.start_args = props.get(&key("args")).unwrap_or_default().to_string();
            spec.stop_args = props.get(&key("stopargs")).map(str::to_string);
            spec.uninstall_args = props.get(&key("uninstallargs")).map(str::to_string);
            spec.classpath = props
                .get(&key("classpath"))
                .filter(|cp| !cp.is_empty())
                .map(str::to_string);

            if let Some(delay) = props.get(&key("delay")) {
                let seconds = delay.parse::<i32>().map_err(|_| PluginSystemError::ManifestError {
                    path: source.to_path_buf(),
                    message: format!("invalid delay '{}' for {}", delay, key("delay")),
                })?;
                spec.delay_seconds = i64::from(seconds);
            }
            if props.get_bool(&key("onBoot")) == Some(true) {
                spec.delay_seconds = 0;
            }
            spec.disabled = props.get_bool(&key("startOnLoad")) == Some(false);

            apps.push(spec);
        }
        Ok(apps)
    }

    /// Read and parse a plugin's `clients.config`.
    pub fn load_all(provider: &dyn StorageProvider, path: &Path) -> Result<Vec<Self>> {
        let props = Properties::load(provider, path)?;
        Ok(Self::parse_all(&props, path)?)
    }
}

/// Accessors over a plugin's `plugin.config`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginProperties {
    props: Properties,
}

/// A console navigation link declared by a plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLink {
    pub name: String,
    pub url: String,
    pub tooltip: Option<String>,
}

impl PluginProperties {
    pub fn new(props: Properties) -> Self {
        Self { props }
    }

    /// Load a manifest, treating a missing or unreadable file as empty.
    pub fn load_or_default(provider: &dyn StorageProvider, path: &Path) -> Self {
        if !provider.is_file(path) {
            return Self::default();
        }
        match Properties::load(provider, path) {
            Ok(props) => Self::new(props),
            Err(e) => {
                log::warn!("Cannot read plugin manifest {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn properties(&self) -> &Properties {
        &self.props
    }

    /// Value for `key_<lang>`, falling back to the language-neutral `key`; HTML-escaped.
    fn localized(&self, key: &str, language: &str) -> Option<String> {
        self.props
            .get(&format!("{}_{}", key, language))
            .or_else(|| self.props.get(key))
            .map(escape_html)
    }

    /// Localized console link name, if declared
    pub fn console_link_name(&self, language: &str) -> Option<String> {
        self.localized("consoleLinkName", language).filter(|n| !n.is_empty())
    }

    /// Console link, present only when both a name and a URL are declared
    pub fn console_link(&self, language: &str) -> Option<ConsoleLink> {
        let name = self.console_link_name(language)?;
        let url = self
            .props
            .get("consoleLinkURL")
            .map(escape_html)
            .filter(|u| !u.is_empty())?;
        Some(ConsoleLink {
            name,
            url,
            tooltip: self.localized("consoleLinkTooltip", language),
        })
    }

    /// Signing key and signer, when they pass the length sanity check
    pub fn signing_key(&self) -> Option<(String, String)> {
        let key = self.props.get("key")?;
        let signer = self.props.get("signer")?;
        if key.len() == constants::SIGNING_KEY_LENGTH && !signer.is_empty() {
            Some((key.to_string(), signer.to_string()))
        } else {
            None
        }
    }
}
