//! Page-context scripts used by the CDP driver.
//!
//! Matched elements are tagged with a `data-clinprobe-ref` attribute so later
//! calls (click, type, attribute reads) can address the same DOM node with a
//! plain CSS selector.

use crate::locator::{LocatorKind, LocatorSpec};

/// Attribute carrying the element reference
pub const REF_ATTRIBUTE: &str = "data-clinprobe-ref";

/// Encode a Rust string as a JavaScript string literal
#[must_use]
pub fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_owned()).to_string()
}

/// CSS selector addressing a previously tagged element
#[must_use]
pub fn ref_selector(id: &str) -> String {
    format!("[{REF_ATTRIBUTE}={}]", js_string(id))
}

fn finder(locator: &LocatorSpec) -> String {
    let v = js_string(locator.value());
    match locator.kind() {
        LocatorKind::Id => {
            format!("Array.from(root.querySelectorAll('[id=\"' + CSS.escape({v}) + '\"]'))")
        }
        LocatorKind::XPath => format!(
            "(() => {{
                const snap = document.evaluate(
                    {v}, root, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
                const out = [];
                for (let i = 0; i < snap.snapshotLength; i++) {{
                    const node = snap.snapshotItem(i);
                    if (node && node.nodeType === 1) out.push(node);
                }}
                return out;
            }})()"
        ),
        LocatorKind::ClassName => format!("Array.from(root.getElementsByClassName({v}))"),
        LocatorKind::CssSelector => format!("Array.from(root.querySelectorAll({v}))"),
        LocatorKind::LinkText => format!(
            "Array.from(root.querySelectorAll('a')).filter(a => (a.innerText || '').trim() === {v})"
        ),
    }
}

/// Script returning every match of `locator` as serialized element handles.
///
/// With `parent` set, the search is rooted at that element instead of the document.
#[must_use]
pub fn query_script(locator: &LocatorSpec, parent: Option<&str>) -> String {
    let root = parent.map_or_else(
        || "document".to_string(),
        |id| format!("document.querySelector({})", js_string(&ref_selector(id))),
    );
    format!(
        "(() => {{
            const root = {root};
            if (!root) return [];
            const found = {finder};
            return found.map(el => {{
                if (!el.getAttribute('{REF_ATTRIBUTE}')) {{
                    window.__clinprobeSeq = (window.__clinprobeSeq || 0) + 1;
                    el.setAttribute('{REF_ATTRIBUTE}', String(window.__clinprobeSeq));
                }}
                const rect = el.getBoundingClientRect();
                const style = window.getComputedStyle(el);
                return {{
                    id: el.getAttribute('{REF_ATTRIBUTE}'),
                    tag_name: el.tagName.toLowerCase(),
                    text: (el.innerText || el.textContent || '').trim(),
                    visible: rect.width > 0 && rect.height > 0
                        && style.visibility !== 'hidden' && style.display !== 'none',
                    enabled: !el.disabled && el.getAttribute('aria-disabled') !== 'true',
                }};
            }});
        }})()",
        finder = finder(locator),
    )
}

/// Script answering whether any text node contains `fragment`
#[must_use]
pub fn text_present_script(fragment: &str) -> String {
    format!(
        "(() => {{
            const needle = {needle};
            const start = document.body || document.documentElement;
            if (!start) return false;
            const walker = document.createTreeWalker(start, NodeFilter.SHOW_TEXT);
            let node;
            while ((node = walker.nextNode())) {{
                if (node.nodeValue && node.nodeValue.includes(needle)) return true;
            }}
            return false;
        }})()",
        needle = js_string(fragment),
    )
}

/// Script emptying a form field and notifying framework listeners
#[must_use]
pub fn clear_script(id: &str) -> String {
    format!(
        "(() => {{
            const el = document.querySelector({selector});
            if (!el) return false;
            el.focus();
            if ('value' in el) {{
                el.value = '';
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            }} else {{
                el.textContent = '';
            }}
            return true;
        }})()",
        selector = js_string(&ref_selector(id)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string("it's \"x\""), "\"it's \\\"x\\\"\"");
    }

    #[test]
    fn test_query_script_per_kind() {
        let xpath = query_script(&LocatorSpec::xpath("//button[span]"), None);
        assert!(xpath.contains("ORDERED_NODE_SNAPSHOT_TYPE"));
        assert!(xpath.contains("\"//button[span]\""));

        let class = query_script(&LocatorSpec::class_name("mat-chip"), None);
        assert!(class.contains("getElementsByClassName(\"mat-chip\")"));

        let link = query_script(&LocatorSpec::link_text("Sair"), None);
        assert!(link.contains("querySelectorAll('a')"));

        let id = query_script(&LocatorSpec::id("email"), None);
        assert!(id.contains("CSS.escape(\"email\")"));
    }

    #[test]
    fn test_query_script_scoped_to_parent() {
        let script = query_script(&LocatorSpec::class_name("mat-badge-content"), Some("7"));
        assert!(script.contains("document.querySelector("));
        assert!(script.contains("data-clinprobe-ref"));
    }

    #[test]
    fn test_text_script_embeds_fragment_literally() {
        let script = text_present_script("Processando:");
        assert!(script.contains("\"Processando:\""));
        assert!(script.contains("SHOW_TEXT"));
    }

    #[test]
    fn test_ref_selector() {
        assert_eq!(ref_selector("12"), "[data-clinprobe-ref=\"12\"]");
    }
}
