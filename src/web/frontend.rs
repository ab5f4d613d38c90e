//! Embedded HTML/CSS/JS frontend for the verity web dashboard.
//!
//! The whole page is compiled into the binary as a string constant.
//! No external assets, no build tools, no CDN dependencies.

/// The complete single-page dashboard HTML.
pub const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>verity Dashboard</title>
<style>
:root {
  --bg: #0d1117;
  --surface: #161b22;
  --border: #30363d;
  --text: #e6edf3;
  --text-muted: #8b949e;
  --accent: #58a6ff;
  --green: #3fb950;
  --yellow: #d29922;
  --red: #f85149;
  --radius: 8px;
  --font: -apple-system, BlinkMacSystemFont, 'Segoe UI', Helvetica, Arial, sans-serif;
}

* { margin: 0; padding: 0; box-sizing: border-box; }
body {
  background: var(--bg);
  color: var(--text);
  font-family: var(--font);
  font-size: 14px;
  line-height: 1.5;
}

.app { max-width: 1200px; margin: 0 auto; padding: 24px; }

header {
  display: flex;
  align-items: center;
  justify-content: space-between;
  margin-bottom: 24px;
  padding-bottom: 16px;
  border-bottom: 1px solid var(--border);
}
header h1 { font-size: 24px; font-weight: 600; }
.muted { color: var(--text-muted); }

button, select {
  background: var(--surface);
  color: var(--text);
  border: 1px solid var(--border);
  border-radius: var(--radius);
  padding: 6px 12px;
  font-family: var(--font);
  cursor: pointer;
}
button:hover { border-color: var(--accent); }

.cards {
  display: grid;
  grid-template-columns: repeat(auto-fit, minmax(170px, 1fr));
  gap: 12px;
  margin-bottom: 24px;
}
.card, .panel {
  background: var(--surface);
  border: 1px solid var(--border);
  border-radius: var(--radius);
  padding: 16px;
}
.card .label { color: var(--text-muted); font-size: 12px; text-transform: uppercase; }
.card .value { font-size: 26px; font-weight: 600; }
.panel { margin-bottom: 24px; }
.panel h2 { font-size: 16px; margin-bottom: 12px; }
.controls { display: flex; gap: 8px; margin-bottom: 12px; align-items: center; }

svg { width: 100%; height: 220px; }
.tree div { padding: 2px 0; }
.heat { border-collapse: collapse; font-size: 11px; }
.heat td { width: 28px; height: 20px; text-align: center; border: 1px solid var(--bg); }
.heat th { color: var(--text-muted); font-weight: normal; padding: 0 6px; text-align: right; }
.error { color: var(--red); margin-bottom: 12px; }
</style>
</head>
<body>
<div class="app">
  <header>
    <h1>verity</h1>
    <div>
      <span id="who" class="muted"></span>
      <button id="refresh">Refresh</button>
    </div>
  </header>

  <div id="error" class="error"></div>

  <div class="cards">
    <div class="card"><div class="label">Total</div><div class="value" id="total">–</div></div>
    <div class="card"><div class="label">Real</div><div class="value" id="real" style="color:var(--green)">–</div></div>
    <div class="card"><div class="label">Fake</div><div class="value" id="fake" style="color:var(--red)">–</div></div>
    <div class="card"><div class="label">Avg confidence</div><div class="value" id="avg">–</div></div>
    <div class="card"><div class="label">High confidence</div><div class="value" id="high">–</div></div>
    <div class="card"><div class="label">Official sources</div><div class="value" id="official">–</div></div>
  </div>

  <div class="panel">
    <h2>Confidence timeline</h2>
    <div class="controls">
      <select id="label">
        <option value="all">All labels</option>
        <option value="real">Real</option>
        <option value="fake">Fake</option>
      </select>
      <select id="risk">
        <option value="all">All risk levels</option>
        <option value="low">Low</option>
        <option value="medium">Medium</option>
        <option value="high">High</option>
      </select>
      <span id="timeline-info" class="muted"></span>
    </div>
    <svg id="timeline" viewBox="0 0 1000 220" preserveAspectRatio="none"></svg>
  </div>

  <div class="panel">
    <h2>Risk hierarchy</h2>
    <div id="tree" class="tree"></div>
  </div>

  <div class="panel">
    <h2>Mean confidence by day and hour</h2>
    <table id="heat" class="heat"></table>
  </div>
</div>

<script>
const $ = (id) => document.getElementById(id);

async function getJson(path, opts) {
  const resp = await fetch(path, opts);
  const body = await resp.json();
  if (!resp.ok) throw new Error(body.error || resp.statusText);
  return body;
}

function pct(n, total) { return total ? (n / total * 100).toFixed(0) + '%' : '0%'; }

function band(p) {
  if (p >= 85) return 'var(--green)';
  if (p >= 70) return 'var(--yellow)';
  return 'var(--red)';
}

async function loadSession() {
  const s = await getJson('/api/session');
  $('who').textContent = s.authenticated
    ? s.username + (s.is_admin ? ' (admin)' : '') + ' · ' + s.api_base_url
    : 'not logged in, run `verity login`';
  return s;
}

async function loadSummary() {
  const s = await getJson('/api/summary');
  $('total').textContent = s.total_records;
  $('real').textContent = s.real_count + ' (' + pct(s.real_count, s.total_records) + ')';
  $('fake').textContent = s.fake_count + ' (' + pct(s.fake_count, s.total_records) + ')';
  $('avg').textContent = (s.avg_confidence * 100).toFixed(1) + '%';
  $('high').textContent = s.high_confidence_count;
  $('official').textContent = s.with_official_source_count;
}

async function loadTimeline() {
  const q = '?label=' + $('label').value + '&risk=' + $('risk').value;
  const t = await getJson('/api/timeline' + q);
  const svg = $('timeline');
  const n = t.points.length;
  $('timeline-info').textContent = 'showing ' + n + ' of ' + t.filtered_len +
    (t.step > 1 ? ' (every ' + t.step + 'th point)' : '');
  let out = '';
  for (const ref of [70, 85]) {
    const y = 210 - ref * 2;
    out += '<line x1="0" x2="1000" y1="' + y + '" y2="' + y + '" stroke="#30363d" stroke-dasharray="4"/>';
  }
  t.points.forEach((p, i) => {
    const x = n > 1 ? i / (n - 1) * 990 + 5 : 500;
    const y = 210 - p.confidence_pct * 2;
    const color = p.label === 'Real' ? 'var(--green)' : 'var(--red)';
    out += '<circle cx="' + x + '" cy="' + y + '" r="3" fill="' + color + '"/>';
  });
  svg.innerHTML = out;
}

async function loadTree() {
  const h = await getJson('/api/hierarchy');
  const root = h.nodes.find((n) => n.parent === '');
  const total = root ? root.value : 0;
  const render = (parent, depth) => h.nodes
    .filter((n) => n.parent === parent)
    .map((n) => '<div style="padding-left:' + depth * 20 + 'px">' + n.label +
      ' <span class="muted">' + n.value + ' · ' + pct(n.value, total) + '</span></div>' +
      render(n.label, depth + 1))
    .join('');
  $('tree').innerHTML = root
    ? '<div><b>' + root.label + '</b> <span class="muted">' + total + '</span></div>' + render(root.label, 1)
    : '';
}

async function loadHeat() {
  const m = await getJson('/api/heatmap');
  const days = ['Sun', 'Mon', 'Tue', 'Wed', 'Thu', 'Fri', 'Sat'];
  let out = '<tr><th></th>';
  for (let h = 0; h < 24; h++) out += '<th style="text-align:center">' + h + '</th>';
  out += '</tr>';
  m.cells.forEach((row, d) => {
    out += '<tr><th>' + days[d] + '</th>';
    row.forEach((v, h) => {
      out += v === null
        ? '<td></td>'
        : '<td style="background:' + band(v) + '" title="' + m.counts[d][h] + ' predictions">' + v.toFixed(0) + '</td>';
    });
    out += '</tr>';
  });
  $('heat').innerHTML = out;
}

async function loadAll() {
  $('error').textContent = '';
  try {
    const s = await loadSession();
    if (!s.authenticated) return;
    await loadSummary();
    await loadTimeline();
    await loadTree();
    await loadHeat();
  } catch (e) {
    $('error').textContent = e.message;
  }
}

async function refresh() {
  try {
    await getJson('/api/refresh', { method: 'POST' });
  } catch (e) {
    $('error').textContent = 'refresh failed: ' + e.message + ' (showing previous data)';
    return;
  }
  loadAll();
}

$('refresh').addEventListener('click', refresh);
$('label').addEventListener('change', () => loadTimeline().catch((e) => $('error').textContent = e.message));
$('risk').addEventListener('change', () => loadTimeline().catch((e) => $('error').textContent = e.message));

loadAll().then(async () => {
  const s = await getJson('/api/session');
  if (s.authenticated && s.refresh_interval_secs > 0) {
    setInterval(refresh, s.refresh_interval_secs * 1000);
  }
}).catch(() => {});
</script>
</body>
</html>
"##;
