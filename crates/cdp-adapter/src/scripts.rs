//! In-page scripts evaluated by the Chromium driver.
//!
//! Matched elements are tagged with a `data-waypoint-ref` attribute so later calls
//! can find them again without holding remote object ids across navigations.
//! Refs carry a per-document nonce: the tag counter restarts with every new
//! document, and a handle from a previous document must never match a new element.

use waypoint_core_types::Interaction;

use crate::error::AdapterError;

pub const REF_ATTR: &str = "data-waypoint-ref";

const PRELUDE: &str = r#"
const REF_ATTR = 'data-waypoint-ref';
const norm = (v) => (v == null ? '' : String(v)).replace(/\s+/g, ' ').trim();
const textMatches = (m, value) => {
  const v = norm(value);
  if (m == null) return true;
  if ('Exact' in m) return v === norm(m.Exact);
  if ('Contains' in m) return v.toLowerCase().includes(norm(m.Contains).toLowerCase());
  if ('Pattern' in m) {
    try { return new RegExp(m.Pattern.source, m.Pattern.case_insensitive ? 'i' : '').test(v); }
    catch (e) { return false; }
  }
  return false;
};
const IMPLICIT_ROLES = {
  button: 'button, input[type=button], input[type=submit], input[type=reset], summary',
  link: 'a[href], area[href]',
  checkbox: 'input[type=checkbox]',
  radio: 'input[type=radio]',
  combobox: 'select:not([multiple]), input[list]',
  listbox: 'select[multiple], datalist',
  searchbox: 'input[type=search]',
  textbox: 'input:not([type]), input[type=text], input[type=email], input[type=tel], input[type=url], textarea',
  option: 'option',
  heading: 'h1, h2, h3, h4, h5, h6',
};
const labelText = (el) => {
  const aria = el.getAttribute('aria-label');
  if (aria) return aria;
  const by = el.getAttribute('aria-labelledby');
  if (by) {
    return by.split(/\s+/).map((id) => {
      const n = document.getElementById(id);
      return n ? n.textContent : '';
    }).join(' ');
  }
  if (el.labels && el.labels.length) return Array.from(el.labels, (l) => l.textContent).join(' ');
  const wrap = el.closest('label');
  return wrap ? wrap.textContent : null;
};
const accessibleName = (el) => {
  const label = labelText(el);
  if (label) return label;
  if (el.tagName === 'INPUT') return el.value || el.getAttribute('placeholder') || el.getAttribute('title') || '';
  return el.textContent || el.getAttribute('title') || '';
};
const byRole = (root, role) => {
  const selectors = ['[role="' + role + '"]'];
  if (IMPLICIT_ROLES[role]) selectors.push(IMPLICIT_ROLES[role]);
  return Array.from(root.querySelectorAll(selectors.join(', '))).filter((el) => {
    const explicit = el.getAttribute('role');
    return !explicit || explicit === role;
  });
};
const innermost = (hits) => hits.filter((el) => !hits.some((o) => o !== el && el.contains(o)));
const SKIP = new Set(['SCRIPT', 'STYLE', 'NOSCRIPT', 'HEAD', 'TITLE', 'TEMPLATE']);
const findRef = (ref) => document.querySelector('[' + REF_ATTR + '="' + CSS.escape(ref) + '"]');
const isVisible = (el) => {
  const style = window.getComputedStyle(el);
  const rect = el.getBoundingClientRect();
  return style.visibility !== 'hidden' && style.display !== 'none' &&
    (rect.width > 0 || rect.height > 0 || el.getClientRects().length > 0);
};
const checkedOf = (el) => {
  if (el.tagName === 'INPUT' && (el.type === 'checkbox' || el.type === 'radio')) return el.checked;
  const aria = el.getAttribute('aria-checked');
  if (aria === 'true') return true;
  if (aria === 'false') return false;
  return null;
};
"#;

fn literal<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, AdapterError> {
    serde_json::to_string(value)
        .map_err(|err| AdapterError::internal(format!("failed to encode script argument: {}", err)))
}

/// CSS selector addressing a tagged element.
pub fn selector_for(node_ref: &str) -> String {
    format!("[{}=\"{}\"]", REF_ATTR, node_ref)
}

/// Run the query described by `query_json` and tag every hit.
///
/// Evaluates to `{ stale, error, refs }`.
pub fn query_expression(
    ref_prefix: &str,
    scope_ref: Option<&str>,
    query_json: &str,
) -> Result<String, AdapterError> {
    Ok(format!(
        r#"(() => {{
{prelude}
const prefix = {prefix};
const scopeRef = {scope};
const q = {query};
const root = scopeRef == null ? document : findRef(scopeRef);
if (!root) return {{ stale: true, error: null, refs: [] }};
let hits = [];
try {{
  if ('TestId' in q) {{
    hits = Array.from(root.querySelectorAll('[data-testid]')).filter((el) => textMatches(q.TestId, el.getAttribute('data-testid')));
  }} else if ('Role' in q) {{
    hits = byRole(root, q.Role.role).filter((el) => textMatches(q.Role.name, accessibleName(el)));
  }} else if ('Text' in q) {{
    hits = innermost(Array.from(root.querySelectorAll('*')).filter((el) => !SKIP.has(el.tagName) && textMatches(q.Text, el.textContent)));
  }} else if ('Placeholder' in q) {{
    hits = Array.from(root.querySelectorAll('[placeholder]')).filter((el) => textMatches(q.Placeholder, el.getAttribute('placeholder')));
  }} else if ('Label' in q) {{
    hits = Array.from(root.querySelectorAll('input, textarea, select, [aria-label], [aria-labelledby]')).filter((el) => {{
      const label = labelText(el);
      return label != null && textMatches(q.Label, label);
    }});
  }} else if ('Css' in q) {{
    hits = Array.from(root.querySelectorAll(q.Css));
  }}
}} catch (err) {{
  return {{ stale: false, error: String(err), refs: [] }};
}}
if (!window.__waypointDoc) {{
  window.__waypointDoc = (window.crypto && crypto.randomUUID)
    ? crypto.randomUUID().slice(0, 8)
    : Math.random().toString(36).slice(2, 10);
}}
const refs = hits.map((el) => {{
  let ref = el.getAttribute(REF_ATTR);
  if (!ref) {{
    window.__waypointSeq = (window.__waypointSeq || 0) + 1;
    ref = prefix + '-' + window.__waypointDoc + '-' + window.__waypointSeq;
    el.setAttribute(REF_ATTR, ref);
  }}
  return ref;
}});
return {{ stale: false, error: null, refs }};
}})()"#,
        prelude = PRELUDE,
        prefix = literal(ref_prefix)?,
        scope = literal(&scope_ref)?,
        query = query_json,
    ))
}

/// Evaluates to `{ attached, visible, checked }`.
pub fn state_expression(node_ref: &str) -> Result<String, AdapterError> {
    Ok(format!(
        r#"(() => {{
{prelude}
const el = findRef({node});
if (!el || !el.isConnected) return {{ attached: false, visible: false, checked: null }};
return {{ attached: true, visible: isVisible(el), checked: checkedOf(el) }};
}})()"#,
        prelude = PRELUDE,
        node = literal(node_ref)?,
    ))
}

/// Scroll into view if needed, then report whether a real pointer would reach
/// the element. Evaluates to `{ attached, ready, reason }`.
pub fn actionability_expression(node_ref: &str) -> Result<String, AdapterError> {
    Ok(format!(
        r#"(() => {{
{prelude}
const el = findRef({node});
if (!el || !el.isConnected) return {{ attached: false, ready: false, reason: 'detached' }};
if (!isVisible(el)) return {{ attached: true, ready: false, reason: 'not visible' }};
if (el.disabled || el.getAttribute('aria-disabled') === 'true') return {{ attached: true, ready: false, reason: 'disabled' }};
let rect = el.getBoundingClientRect();
const inViewport = rect.bottom > 0 && rect.right > 0 && rect.top < window.innerHeight && rect.left < window.innerWidth;
if (!inViewport) {{
  el.scrollIntoView({{ block: 'center', inline: 'center' }});
  rect = el.getBoundingClientRect();
}}
const x = rect.left + rect.width / 2;
const y = rect.top + rect.height / 2;
const top = document.elementFromPoint(x, y);
if (!top) return {{ attached: true, ready: false, reason: 'outside of the viewport' }};
if (top !== el && !el.contains(top)) {{
  const desc = top.tagName.toLowerCase() + (top.className ? '.' + String(top.className).split(' ').join('.') : '');
  return {{ attached: true, ready: false, reason: 'covered by <' + desc + '>' }};
}}
return {{ attached: true, ready: true, reason: null }};
}})()"#,
        prelude = PRELUDE,
        node = literal(node_ref)?,
    ))
}

/// Evaluates to `{ attached }` after scrolling the element into the viewport centre.
pub fn scroll_expression(node_ref: &str) -> Result<String, AdapterError> {
    Ok(format!(
        r#"(() => {{
{prelude}
const el = findRef({node});
if (!el) return {{ attached: false }};
el.scrollIntoView({{ block: 'center', inline: 'center' }});
return {{ attached: true }};
}})()"#,
        prelude = PRELUDE,
        node = literal(node_ref)?,
    ))
}

/// Clear an input through its native value setter so framework listeners fire.
pub fn clear_value_expression(node_ref: &str) -> Result<String, AdapterError> {
    Ok(format!(
        r#"(() => {{
{prelude}
const el = findRef({node});
if (!el) return {{ attached: false }};
el.focus();
const proto = el.tagName === 'TEXTAREA' ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
const setter = Object.getOwnPropertyDescriptor(proto, 'value');
if (setter && setter.set) setter.set.call(el, ''); else el.value = '';
el.dispatchEvent(new Event('input', {{ bubbles: true }}));
return {{ attached: true }};
}})()"#,
        prelude = PRELUDE,
        node = literal(node_ref)?,
    ))
}

/// Programmatic invocation. Evaluates to `{ ok, reason }`.
pub fn invoke_expression(node_ref: &str, interaction: &Interaction) -> Result<String, AdapterError> {
    let body = match interaction {
        Interaction::Click => "el.click();\nreturn { ok: true, reason: null };".to_string(),
        Interaction::Fill(text) => format!(
            r#"const proto = el.tagName === 'TEXTAREA' ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
const setter = Object.getOwnPropertyDescriptor(proto, 'value');
if (setter && setter.set) setter.set.call(el, {value}); else el.value = {value};
el.dispatchEvent(new Event('input', {{ bubbles: true }}));
el.dispatchEvent(new Event('change', {{ bubbles: true }}));
return {{ ok: true, reason: null }};"#,
            value = literal(text.expose())?,
        ),
        Interaction::Check => r#"const current = checkedOf(el);
if (current === null) return { ok: false, reason: 'element has no checked state' };
if (current) return { ok: true, reason: null };
el.click();
if (checkedOf(el) !== true && el.tagName === 'INPUT') {
  el.checked = true;
  el.dispatchEvent(new Event('change', { bubbles: true }));
}
return { ok: checkedOf(el) === true, reason: checkedOf(el) === true ? null : 'element did not become checked' };"#
            .to_string(),
    };

    Ok(format!(
        r#"(() => {{
{prelude}
const el = findRef({node});
if (!el || !el.isConnected) return {{ ok: false, reason: 'detached' }};
{body}
}})()"#,
        prelude = PRELUDE,
        node = literal(node_ref)?,
        body = body,
    ))
}

pub const READY_STATE_EXPRESSION: &str = "document.readyState";

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_core_types::{CandidateQuery, InputText, TextMatch};

    #[test]
    fn query_expression_embeds_serialized_query() {
        let query = CandidateQuery::role("button", TextMatch::regex("more"));
        let json = serde_json::to_string(&query).unwrap();
        let script = query_expression("abcd", None, &json).unwrap();
        assert!(script.contains(r#""Role""#));
        assert!(script.contains("const scopeRef = null;"));
        assert!(script.contains(r#"const prefix = "abcd";"#));
    }

    #[test]
    fn refs_are_scoped_to_the_current_document() {
        let json = serde_json::to_string(&CandidateQuery::css("input")).unwrap();
        let script = query_expression("abcd", None, &json).unwrap();
        assert!(script.contains("if (!window.__waypointDoc)"));
        assert!(script
            .contains("ref = prefix + '-' + window.__waypointDoc + '-' + window.__waypointSeq;"));
    }

    #[test]
    fn fill_value_is_json_escaped() {
        let script =
            invoke_expression("p-1", &Interaction::Fill(InputText::plain("a\"b"))).unwrap();
        assert!(script.contains(r#""a\"b""#));
    }

    #[test]
    fn selector_targets_ref_attribute() {
        assert_eq!(selector_for("p-7"), "[data-waypoint-ref=\"p-7\"]");
    }
}
