use std::cell::RefCell;
use std::collections::HashMap;

use regex::Regex;

const OPAQUE_AT_RULES: &[&str] = &["@font-face", "@page", "@import", "@charset", "@namespace"];

thread_local! {
    static CACHE: RefCell<HashMap<(String, String), String>> = RefCell::new(HashMap::new());
}

/// Rewrites `css` so every selector is scoped to `scope_id`:
/// - `@keyframes name { ... }` becomes `@keyframes {scope_id}-name { ... }`,
///   and any `animation`/`animation-name` declaration referencing that name
///   elsewhere in the sheet is rewritten to the scoped name.
/// - Every selector in a plain rule is either prefixed with
///   `[data-scope="{scope_id}"] ` or, if it starts with `:root`, `:host`,
///   `html`, or `body`, has that leading token replaced by the scope
///   attribute selector outright.
/// - `@media`/`@supports` (and other rule-nesting at-rules) recurse into
///   their body; `@font-face`/`@page`/`@import`/`@charset`/`@namespace`
///   are copied through unscoped — they carry no selector to scope.
///
/// Memoized per `(css, scope_id)` pair so repeated calls are cheap and
/// exactly equal.
pub fn scope_styles(css: &str, scope_id: &str) -> String {
    let key = (css.to_string(), scope_id.to_string());
    if let Some(hit) = CACHE.with(|c| c.borrow().get(&key).cloned()) {
        return hit;
    }

    let mut keyframe_renames: HashMap<String, String> = HashMap::new();
    let rewritten = rewrite_block(css, scope_id, &mut keyframe_renames);
    let result = apply_animation_renames(&rewritten, &keyframe_renames);

    CACHE.with(|c| c.borrow_mut().insert(key, result.clone()));
    result
}

/// Splits `css` into top-level rules (`prelude { body }`) and rewrites each,
/// recording any `@keyframes` renames it performs along the way.
fn rewrite_block(css: &str, scope_id: &str, renames: &mut HashMap<String, String>) -> String {
    let mut out = String::with_capacity(css.len() + 32);
    let bytes = css.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        // Copy whitespace/comments between rules through untouched.
        let start = i;
        let mut depth = 0i32;
        let mut brace_pos = None;
        while i < bytes.len() {
            match bytes[i] {
                b'{' if depth == 0 => {
                    brace_pos = Some(i);
                    break;
                }
                b'{' => depth += 1,
                b'}' => depth -= 1,
                _ => {}
            }
            i += 1;
        }
        let Some(open) = brace_pos else {
            out.push_str(&css[start..]);
            break;
        };
        let prelude = css[start..open].trim();
        // Find the matching closing brace for this rule's body.
        let body_start = open + 1;
        let mut bdepth = 1i32;
        let mut j = body_start;
        while j < bytes.len() && bdepth > 0 {
            match bytes[j] {
                b'{' => bdepth += 1,
                b'}' => bdepth -= 1,
                _ => {}
            }
            if bdepth == 0 {
                break;
            }
            j += 1;
        }
        let body = &css[body_start..j];
        i = (j + 1).min(bytes.len());

        if prelude.is_empty() {
            continue;
        }

        if let Some(name) = keyframes_name(prelude) {
            let scoped = format!("{scope_id}-{name}");
            renames.insert(name.to_string(), scoped.clone());
            let at_kw = &prelude[..prelude.len() - name.len()];
            out.push_str(at_kw.trim_end());
            out.push(' ');
            out.push_str(&scoped);
            out.push_str(" {");
            out.push_str(body);
            out.push('}');
        } else if OPAQUE_AT_RULES.iter().any(|kw| prelude.starts_with(kw)) {
            out.push_str(prelude);
            out.push_str(" {");
            out.push_str(body);
            out.push('}');
        } else if prelude.starts_with('@') {
            // @media / @supports / other rule-nesting at-rules: recurse.
            out.push_str(prelude);
            out.push_str(" {");
            out.push_str(&rewrite_block(body, scope_id, renames));
            out.push('}');
        } else {
            let scoped_selector = scope_selector_list(prelude, scope_id);
            out.push_str(&scoped_selector);
            out.push_str(" {");
            out.push_str(body);
            out.push('}');
        }
    }
    out
}

fn keyframes_name(prelude: &str) -> Option<&str> {
    let trimmed = prelude.trim_start();
    for prefix in ["@keyframes", "@-webkit-keyframes", "@-moz-keyframes", "@-o-keyframes"] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            let name = rest.trim();
            if !name.is_empty() {
                return Some(name);
            }
        }
    }
    None
}

const HOST_LIKE: &[&str] = &[":root", ":host", "html", "body"];

fn scope_selector_list(prelude: &str, scope_id: &str) -> String {
    split_top_level_commas(prelude)
        .into_iter()
        .map(|sel| scope_one_selector(sel.trim(), scope_id))
        .collect::<Vec<_>>()
        .join(", ")
}

fn scope_one_selector(selector: &str, scope_id: &str) -> String {
    if starts_with_data_scope_attr(selector) {
        return selector.to_string();
    }

    let attr = format!("[data-scope=\"{scope_id}\"]");
    for token in HOST_LIKE {
        if selector == *token {
            return attr;
        }
        if let Some(rest) = selector.strip_prefix(token) {
            let boundary_ok = rest.is_empty() || !rest.starts_with(|c: char| c.is_alphanumeric() || c == '-');
            if boundary_ok {
                return format!("{attr}{rest}");
            }
        }
    }
    format!("{attr} {selector}")
}

/// True if `selector` already begins with a `[data-scope="..."]` attribute
/// selector, so re-running `scope_styles` on already-scoped output doesn't
/// re-prefix it.
fn starts_with_data_scope_attr(selector: &str) -> bool {
    selector.trim_start().starts_with("[data-scope=")
}

/// Splits a selector list on commas that are not nested inside parentheses
/// (so `:not(a, b)` is not split in the middle of its argument list).
fn split_top_level_commas(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (idx, ch) in s.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&s[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn apply_animation_renames(css: &str, renames: &HashMap<String, String>) -> String {
    if renames.is_empty() {
        return css.to_string();
    }
    let decl_re = Regex::new(r"(?i)(animation(?:-name)?\s*:\s*)([^;}]+)").unwrap();
    decl_re
        .replace_all(css, |caps: &regex::Captures| {
            let prop = &caps[1];
            let value = &caps[2];
            let rewritten = rewrite_animation_value(value, renames);
            format!("{prop}{rewritten}")
        })
        .into_owned()
}

fn rewrite_animation_value(value: &str, renames: &HashMap<String, String>) -> String {
    let word_re = Regex::new(r"[A-Za-z_][A-Za-z0-9_-]*").unwrap();
    word_re
        .replace_all(value, |caps: &regex::Captures| {
            let word = &caps[0];
            renames.get(word).cloned().unwrap_or_else(|| word.to_string())
        })
        .into_owned()
}
