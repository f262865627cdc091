//! Base plugin trait definition.

use crate::Result;

/// Base trait that all plugins must implement.
///
/// Provides lifecycle management and identification. Plugins are stored as
/// `Arc<dyn ...>` in process-global registries, so all plugins must be
/// `Send + Sync` and lifecycle hooks take `&self`.
pub trait Plugin: Send + Sync {
    /// Unique name for this plugin: lowercase with hyphens, URL-safe.
    fn name(&self) -> &str;

    /// Semantic version of this plugin.
    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    /// Called once when the plugin is registered. Registration fails when
    /// this returns an error.
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Called when the plugin is unregistered. Errors are logged but do not
    /// interrupt the shutdown.
    fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    /// Optional description for debugging and logging.
    fn description(&self) -> &str {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct TestPlugin {
        initialized: AtomicBool,
    }

    impl Plugin for TestPlugin {
        fn name(&self) -> &str {
            "test-plugin"
        }

        fn initialize(&self) -> Result<()> {
            self.initialized.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn shutdown(&self) -> Result<()> {
            self.initialized.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn description(&self) -> &str {
            "A test plugin"
        }
    }

    #[test]
    fn test_plugin_metadata() {
        let plugin = TestPlugin {
            initialized: AtomicBool::new(false),
        };
        assert_eq!(plugin.name(), "test-plugin");
        assert_eq!(plugin.version(), env!("CARGO_PKG_VERSION"));
        assert_eq!(plugin.description(), "A test plugin");
    }

    #[test]
    fn test_plugin_lifecycle() {
        let plugin = TestPlugin {
            initialized: AtomicBool::new(false),
        };

        plugin.initialize().unwrap();
        assert!(plugin.initialized.load(Ordering::SeqCst));

        plugin.shutdown().unwrap();
        assert!(!plugin.initialized.load(Ordering::SeqCst));
    }
}
