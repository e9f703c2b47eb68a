//! RenderBridge: turns a UI node into an inlineable mount fragment.
//!
//! Each call draws a fresh random 64-bit mount identifier. Identifiers are
//! not checked for uniqueness; collisions on one page are improbable enough
//! to ignore.

use rand::Rng;
use serde_json::Value;

/// A UI node that can describe itself as a client-side render expression.
pub trait Render {
    fn render(&self) -> Value;
}

impl Render for Value {
    fn render(&self) -> Value {
        self.clone()
    }
}

impl<T: Render + ?Sized> Render for &T {
    fn render(&self) -> Value {
        (**self).render()
    }
}

/// A mount point plus the expression the client hydrates into it.
#[derive(Debug, Clone, PartialEq)]
pub struct MountFragment {
    id: u64,
    expression: Value,
}

impl MountFragment {
    pub fn new(id: u64, expression: Value) -> Self {
        Self { id, expression }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn expression(&self) -> &Value {
        &self.expression
    }

    /// Container element plus an inline script that mounts the expression
    /// into it once the document has loaded.
    pub fn to_html(&self) -> String {
        let id = self.id;
        let expression = script_json(&self.expression);
        format!(
            r#"<div class="webio-mountpoint" data-webio-mountpoint="{id}">
<script>
(function () {{
  function mount() {{
    WebIO.mount(
      document.querySelector('[data-webio-mountpoint="{id}"]'),
      {expression}
    );
  }}
  if (document.readyState === "loading") {{
    document.addEventListener("DOMContentLoaded", mount);
  }} else {{
    mount();
  }}
}})();
</script>
</div>"#
        )
    }
}

impl std::fmt::Display for MountFragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_html())
    }
}

/// Render `node` into a fragment with a newly drawn identifier.
pub fn render_fragment<N: Render + ?Sized>(node: &N) -> MountFragment {
    let id: u64 = rand::rng().random();
    MountFragment::new(id, node.render())
}

/// Serialize JSON for embedding inside a `<script>` element.
///
/// `<`, `>` and `&` only occur inside JSON strings, where the `\u` escapes
/// decode to the same text. U+2028/U+2029 are line terminators in older JS.
pub(crate) fn script_json(value: &Value) -> String {
    let raw = value.to_string();
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out
}
