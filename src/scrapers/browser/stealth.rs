//! Automation-masking scripts, registered to run before any page script.

/// Each entry is installed with `Page.addScriptToEvaluateOnNewDocument`, so it
/// also applies to the documents loaded by pagination.
pub const STEALTH_SCRIPTS: &[&str] = &[
    // navigator.webdriver is the first thing bot checks read
    r#"
    Object.defineProperty(Navigator.prototype, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    r#"
    if (!window.chrome) {
        window.chrome = { runtime: {}, app: {}, csi: function() {}, loadTimes: function() {} };
    }
    "#,
    // The comment view is a zh-CN storefront
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['zh-CN', 'zh', 'en'],
        configurable: true
    });
    "#,
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'PDF Viewer', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'internal-pdf-viewer', description: 'Portable Document Format' }
        ],
        configurable: true
    });
    "#,
    r#"
    if (window.navigator.permissions && window.navigator.permissions.query) {
        const query = window.navigator.permissions.query.bind(window.navigator.permissions);
        window.navigator.permissions.query = (params) =>
            params && params.name === 'notifications'
                ? Promise.resolve({ state: Notification.permission })
                : query(params);
    }
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_are_non_empty() {
        assert!(!STEALTH_SCRIPTS.is_empty());
        assert!(STEALTH_SCRIPTS.iter().all(|s| !s.trim().is_empty()));
    }
}
