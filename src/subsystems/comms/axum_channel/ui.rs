//! UI route handlers for the axum channel.
//!
//! The root handler serves `index.html` from the configured static directory
//! when there is one, otherwise a small built-in upload page that talks to
//! `POST /process`.

use axum::response::Html;
use axum::extract::State;
use tracing::debug;

use super::AxumState;

// ── Root page ─────────────────────────────────────────────────────────────────

const ROOT_INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>Invoice Relay</title>
  <style>
    *, *::before, *::after { box-sizing: border-box; margin: 0; padding: 0; }
    body {
      font-family: system-ui, -apple-system, sans-serif;
      background: #0f0f0f; color: #e0e0e0;
      display: flex; justify-content: center; padding: 3rem 1rem;
    }
    .card {
      width: 100%; max-width: 44rem; padding: 2rem;
      border: 1px solid #333; border-radius: 12px; background: #1a1a1a;
    }
    h1 { font-size: 1.5rem; margin-bottom: 0.5rem; }
    p  { font-size: 0.9rem; color: #888; margin-bottom: 1rem; }
    fieldset { border: 1px solid #333; border-radius: 8px; padding: 0.75rem; margin: 1rem 0; }
    label { display: inline-block; margin: 0.25rem 0.75rem 0.25rem 0; font-size: 0.9rem; }
    button {
      padding: 0.5rem 1.5rem; border: 0; border-radius: 8px;
      background: #2a2a3a; color: #c0c0e0; font-size: 0.9rem; cursor: pointer;
    }
    button:hover { background: #3a3a5a; }
    pre {
      margin-top: 1rem; padding: 1rem; border-radius: 8px; background: #111;
      font-size: 0.8rem; white-space: pre-wrap; word-break: break-word;
    }
  </style>
</head>
<body>
  <div class="card">
    <h1>Invoice Relay</h1>
    <p>Upload PDF or image invoices and pick the fields to extract.</p>
    <form id="upload">
      <input type="file" name="files" accept=".pdf,.png,.jpg,.jpeg" multiple required />
      <fieldset id="fields"><legend>Fields</legend></fieldset>
      <button type="submit">Extract</button>
    </form>
    <pre id="out"></pre>
  </div>
  <script>
    const box = document.getElementById('fields');
    fetch('/api/fields').then(r => r.json()).then(data => {
      for (const f of data.fields) {
        const label = document.createElement('label');
        label.title = data.descriptions[f] || '';
        label.innerHTML = `<input type="checkbox" value="${f}" checked /> ${f}`;
        box.appendChild(label);
      }
    });
    document.getElementById('upload').addEventListener('submit', async (ev) => {
      ev.preventDefault();
      const out = document.getElementById('out');
      const form = new FormData();
      for (const file of ev.target.files.files) form.append('files', file);
      const picked = [...box.querySelectorAll('input:checked')].map(i => i.value);
      form.append('fields', JSON.stringify(picked));
      out.textContent = 'Processing…';
      const resp = await fetch('/process', { method: 'POST', body: form });
      out.textContent = JSON.stringify(await resp.json(), null, 2);
    });
  </script>
</body>
</html>
"#;

// ── Handlers ──────────────────────────────────────────────────────────────────

/// GET /: static `index.html` when configured, else the built-in page.
pub(super) async fn root(State(state): State<AxumState>) -> Html<String> {
    if let Some(dir) = &state.http.static_dir {
        let path = dir.join("index.html");
        match tokio::fs::read_to_string(&path).await {
            Ok(html) => return Html(html),
            Err(e) => debug!(path = %path.display(), error = %e, "no static index, serving built-in page"),
        }
    }
    Html(ROOT_INDEX_HTML.to_string())
}
