//! Page-side scripts evaluated by the Chrome driver
//!
//! Every script is a self-contained IIFE returning `JSON.stringify(..)` so the
//! driver only ever parses one string value. Arguments are embedded as a
//! single JSON literal, never spliced into the script text.

use serde_json::json;

use crate::driver::{ElementQuery, ElementRef};

const PRELUDE: &str = r#"
  function quillNodes(q) {
    if (q.kind === 'css') {
      return Array.from(document.querySelectorAll(q.value));
    }
    const snap = document.evaluate(q.value, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
    const out = [];
    for (let i = 0; i < snap.snapshotLength; i++) {
      out.push(snap.snapshotItem(i));
    }
    return out;
  }
  function quillVisible(el) {
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    return rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden' && style.display !== 'none';
  }
  function quillEnabled(el) {
    return !el.disabled && el.getAttribute('aria-disabled') !== 'true' && !el.classList.contains('disabled');
  }
  function quillLabel(el) {
    return el.getAttribute('aria-label') || el.getAttribute('placeholder')
      || el.getAttribute('data-placeholder') || el.getAttribute('title') || '';
  }
  function quillPick(args) {
    const el = quillNodes(args.query)[args.index];
    if (!el) {
      throw new Error('stale element reference');
    }
    return el;
  }
"#;

fn wrap(args: serde_json::Value, body: &str) -> String {
    let template = format!(
        "(() => {{\n{}\n  const args = __ARGS__;\n  try {{\n{}\n  }} catch (e) {{\n    return JSON.stringify({{ error: String(e && e.message || e) }});\n  }}\n}})()",
        PRELUDE, body
    );
    template.replacen("__ARGS__", &args.to_string(), 1)
}

fn element_args(element: &ElementRef) -> serde_json::Value {
    json!({ "query": element.query, "index": element.index })
}

/// Snapshot every node matching `query`
pub fn inspect(query: &ElementQuery) -> String {
    wrap(
        json!({ "query": query }),
        r#"
    const nodes = quillNodes(args.query);
    return JSON.stringify({ value: nodes.map((el, index) => ({
      index,
      visible: quillVisible(el),
      enabled: quillEnabled(el),
      text: (el.innerText || el.textContent || '').trim(),
      label: quillLabel(el),
    })) });"#,
    )
}

pub fn click(element: &ElementRef) -> String {
    wrap(
        element_args(element),
        r#"
    const el = quillPick(args);
    el.scrollIntoView({ block: 'center' });
    el.click();
    return JSON.stringify({ value: true });"#,
    )
}

pub fn focus(element: &ElementRef) -> String {
    wrap(
        element_args(element),
        r#"
    const el = quillPick(args);
    el.scrollIntoView({ block: 'center' });
    el.click();
    el.focus();
    return JSON.stringify({ value: true });"#,
    )
}

/// Select-all then delete, falling back to resetting the value
pub fn clear(element: &ElementRef) -> String {
    wrap(
        element_args(element),
        r#"
    const el = quillPick(args);
    el.focus();
    if (typeof el.select === 'function') {
      el.select();
    } else {
      document.execCommand('selectAll', false, null);
    }
    document.execCommand('delete', false, null);
    if ('value' in el && el.value) {
      el.value = '';
    } else if (el.isContentEditable && el.innerText.trim()) {
      el.innerHTML = '';
    }
    el.dispatchEvent(new Event('input', { bubbles: true }));
    return JSON.stringify({ value: true });"#,
    )
}

/// Insert at the caret as a single edit
pub fn insert(element: &ElementRef, text: &str) -> String {
    let mut args = element_args(element);
    args["text"] = json!(text);
    wrap(
        args,
        r#"
    const el = quillPick(args);
    el.focus();
    const inserted = document.execCommand('insertText', false, args.text);
    if (!inserted) {
      if ('value' in el) {
        el.value = el.value + args.text;
      } else {
        el.textContent = el.textContent + args.text;
      }
      el.dispatchEvent(new Event('input', { bubbles: true }));
    }
    return JSON.stringify({ value: inserted });"#,
    )
}

pub fn read(element: &ElementRef) -> String {
    wrap(
        element_args(element),
        r#"
    const el = quillPick(args);
    const text = ('value' in el && typeof el.value === 'string') ? el.value : (el.innerText || '');
    return JSON.stringify({ value: text });"#,
    )
}

pub fn scroll(x: i64, y: i64) -> String {
    wrap(
        json!({ "x": x, "y": y }),
        r#"
    window.scrollTo(args.x, args.y);
    return JSON.stringify({ value: true });"#,
    )
}

/// Full scrollable size of the document in CSS pixels
pub fn page_size() -> String {
    wrap(
        json!({}),
        r#"
    const root = document.documentElement;
    const body = document.body || root;
    const width = Math.max(root.scrollWidth, body.scrollWidth, root.clientWidth);
    const height = Math.max(root.scrollHeight, body.scrollHeight, root.clientHeight);
    return JSON.stringify({ value: { width, height } });"#,
    )
}

pub const READY_STATE: &str = "document.readyState";
