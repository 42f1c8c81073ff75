//! Page-side expressions evaluated through `Runtime.evaluate`.
//!
//! Selectors and values are embedded as JSON string literals.

use serde_json::Value;

fn literal(text: &str) -> String {
	Value::String(text.to_string()).to_string()
}

pub(crate) fn is_visible(selector: &str) -> String {
	format!(
		r#"(() => {{
	const el = document.querySelector({sel});
	if (!el) return false;
	const style = window.getComputedStyle(el);
	if (style.visibility === 'hidden' || style.display === 'none') return false;
	const rect = el.getBoundingClientRect();
	return rect.width > 0 && rect.height > 0;
}})()"#,
		sel = literal(selector)
	)
}

pub(crate) fn click(selector: &str) -> String {
	format!(
		r#"(() => {{
	const el = document.querySelector({sel});
	if (!el) return false;
	el.scrollIntoView({{ block: 'center' }});
	el.click();
	return true;
}})()"#,
		sel = literal(selector)
	)
}

pub(crate) fn focus_and_clear(selector: &str) -> String {
	format!(
		r#"(() => {{
	const el = document.querySelector({sel});
	if (!el) return false;
	el.focus();
	el.value = '';
	el.dispatchEvent(new Event('input', {{ bubbles: true }}));
	return true;
}})()"#,
		sel = literal(selector)
	)
}

pub(crate) fn commit_input(selector: &str) -> String {
	format!(
		r#"(() => {{
	const el = document.querySelector({sel});
	if (!el) return false;
	el.dispatchEvent(new Event('change', {{ bubbles: true }}));
	el.blur();
	return true;
}})()"#,
		sel = literal(selector)
	)
}

/// Evaluates to `"missing"`, `"no-option"` or `"ok"`.
pub(crate) fn select_option(selector: &str, value: &str) -> String {
	format!(
		r#"(() => {{
	const el = document.querySelector({sel});
	if (!el || !el.options) return 'missing';
	const wanted = {val};
	const option = Array.from(el.options).find((o) => o.value === wanted);
	if (!option) return 'no-option';
	el.value = wanted;
	el.dispatchEvent(new Event('input', {{ bubbles: true }}));
	el.dispatchEvent(new Event('change', {{ bubbles: true }}));
	return 'ok';
}})()"#,
		sel = literal(selector),
		val = literal(value)
	)
}

/// Evaluates to `[{value, label}]`, or `null` when the control is missing.
pub(crate) fn select_options(selector: &str) -> String {
	format!(
		r#"(() => {{
	const el = document.querySelector({sel});
	if (!el || !el.options) return null;
	return Array.from(el.options).map((o) => ({{ value: o.value, label: (o.label || o.text || '').trim() }}));
}})()"#,
		sel = literal(selector)
	)
}

pub(crate) fn rows(selector: &str) -> String {
	format!(
		r#"Array.from(document.querySelectorAll({sel})).map((row) =>
	Array.from(row.children).map((cell) => (cell.innerText || cell.textContent || '').trim()))"#,
		sel = literal(selector)
	)
}

pub(crate) fn text(selector: &str) -> String {
	format!(
		r#"(() => {{
	const el = document.querySelector({sel});
	return el ? (el.innerText || el.textContent || '').trim() : null;
}})()"#,
		sel = literal(selector)
	)
}

pub(crate) fn count(selector: &str) -> String {
	format!("document.querySelectorAll({}).length", literal(selector))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn selectors_are_quoted_as_string_literals() {
		let script = count(r#"input[id$='_slAllAccounts'] "x""#);
		assert_eq!(script, r#"document.querySelectorAll("input[id$='_slAllAccounts'] \"x\"").length"#);
	}

	#[test]
	fn select_option_embeds_value() {
		let script = select_option("#acct", "DE12 3456");
		assert!(script.contains(r#"const wanted = "DE12 3456";"#));
		assert!(script.contains("'no-option'"));
	}
}
