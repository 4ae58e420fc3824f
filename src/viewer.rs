//! Self-contained HTML viewer for a session's documents.
//!
//! Each document is embedded as a base64 `data:` URI, so the page needs no
//! server to display. Annotated copies are shown where they exist, and the
//! focus document (if any) is listed and opened first.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::session::Session;

pub fn render_viewer(session: &Session, focus: Option<&str>) -> String {
    let mut names = session.document_names();
    if let Some(focus) = focus {
        if let Some(i) = names.iter().position(|n| *n == focus) {
            let name = names.remove(i);
            names.insert(0, name);
        }
    }

    let mut options = String::new();
    let mut frames = String::new();
    for (i, name) in names.iter().enumerate() {
        let Some(bytes) = session.display_bytes(name) else {
            continue;
        };
        let escaped = escape_html(name);
        options.push_str(&format!("<option value=\"doc-{i}\">{escaped}</option>\n"));
        let hidden = if i == 0 { "" } else { " hidden" };
        frames.push_str(&format!(
            "<iframe id=\"doc-{i}\" title=\"{escaped}\"{hidden} \
             src=\"data:application/pdf;base64,{}\"></iframe>\n",
            STANDARD.encode(bytes)
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>docent</title>
<style>
body {{ margin: 0; font-family: sans-serif; }}
header {{ padding: 8px; border-bottom: 1px solid #ccc; }}
iframe {{ width: 100%; height: calc(100vh - 50px); border: none; }}
</style>
</head>
<body>
<header>
<select id="picker" onchange="show(this.value)">
{options}</select>
</header>
{frames}<script>
function show(id) {{
  for (const f of document.querySelectorAll("iframe")) {{ f.hidden = f.id !== id; }}
}}
</script>
</body>
</html>
"#
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
