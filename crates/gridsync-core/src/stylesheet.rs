//! Host-supplied custom CSS, flattened into a single stylesheet

use std::collections::BTreeMap;

/// CSS selector → property → value, as supplied by the host in `custom_css`
pub type CssDict = BTreeMap<String, BTreeMap<String, String>>;

/// Flatten a [`CssDict`] into stylesheet text.
///
/// Each selector becomes one `selector {prop: value;...}` rule; rules are
/// joined by newlines.
pub fn flatten(styles: &CssDict) -> String {
    styles
        .iter()
        .map(|(selector, props)| {
            let body: String = props
                .iter()
                .map(|(prop, value)| format!("{prop}: {value};"))
                .collect();
            format!("{selector} {{{body}}}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
