//! HTML template and styling for the single-page shell.
//!
//! The server renders one static page; everything after that goes through
//! the JSON API. Structured documents arrive as span trees and are turned
//! into DOM nodes client-side, so citation markers stay clickable.

// ============================================================================
// CSS Styles
// ============================================================================

pub const STYLE: &str = r#"
:root {
    --bg: #f8fafc;
    --panel: #ffffff;
    --fg: #1e293b;
    --muted: #64748b;
    --border: #e2e8f0;
    --accent: #0d9488;
    --accent-soft: #ccfbf1;
    --cite: #0369a1;
    --cite-bg: #e0f2fe;
    --metric-bg: #fef9c3;
    --warn: #b45309;
    --highlight: #fef08a;
}

* { box-sizing: border-box; margin: 0; padding: 0; }

body {
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, "Helvetica Neue", Arial, sans-serif;
    line-height: 1.6;
    color: var(--fg);
    background: var(--bg);
}

.top-bar {
    position: sticky;
    top: 0;
    background: var(--panel);
    border-bottom: 1px solid var(--border);
    padding: 0.6rem 1rem;
    display: flex;
    gap: 0.75rem;
    align-items: center;
    z-index: 100;
}
.top-bar h1 { font-size: 1.1rem; color: var(--accent); margin-right: 0.5rem; }

.search-box { display: flex; gap: 0.5rem; flex: 1; }
.search-box input {
    flex: 1;
    max-width: 480px;
    padding: 0.45rem 0.75rem;
    border: 1px solid var(--border);
    border-radius: 6px;
    font-size: 0.95rem;
}
button {
    padding: 0.45rem 0.85rem;
    border: 1px solid var(--border);
    border-radius: 6px;
    background: var(--panel);
    color: var(--fg);
    cursor: pointer;
    font-family: inherit;
    font-size: 0.9rem;
}
button.primary { background: var(--accent); border-color: var(--accent); color: #fff; }
button:hover { filter: brightness(0.96); }
button:disabled { opacity: 0.5; cursor: default; }

.layout {
    display: grid;
    grid-template-columns: 1fr 340px;
    gap: 1rem;
    max-width: 1200px;
    margin: 1rem auto;
    padding: 0 1rem;
}

.panel {
    background: var(--panel);
    border: 1px solid var(--border);
    border-radius: 8px;
    padding: 1rem;
    margin-bottom: 1rem;
}
.panel h2 {
    font-size: 0.85rem;
    text-transform: uppercase;
    letter-spacing: 0.05em;
    color: var(--muted);
    margin-bottom: 0.6rem;
    display: flex;
    align-items: center;
    gap: 0.5rem;
}
.panel h2 .toggle { margin-left: auto; border: none; background: none; color: var(--muted); }

.stats-line { font-size: 0.85rem; color: var(--muted); margin-bottom: 0.75rem; }

.tabs { display: flex; gap: 0.25rem; border-bottom: 1px solid var(--border); margin-bottom: 0.75rem; }
.tabs button { border: none; border-radius: 6px 6px 0 0; background: none; color: var(--muted); }
.tabs button.active { color: var(--accent); border-bottom: 2px solid var(--accent); }

.doc h3 { font-size: 1rem; margin: 0.75rem 0 0.25rem; }
.doc ul { margin: 0.25rem 0 0.5rem 1.25rem; }
.doc p { margin: 0.25rem 0; }

.cite {
    display: inline-block;
    padding: 0 0.35em;
    margin: 0 0.1em;
    border-radius: 4px;
    background: var(--cite-bg);
    color: var(--cite);
    font-size: 0.8em;
    font-weight: 600;
    cursor: pointer;
    position: relative;
}
.cite.unresolved { background: var(--border); color: var(--muted); cursor: default; }
.cite .preview {
    display: none;
    position: absolute;
    bottom: 130%;
    left: 0;
    width: 260px;
    background: var(--fg);
    color: #fff;
    font-weight: 400;
    font-size: 0.75rem;
    padding: 0.5rem;
    border-radius: 6px;
    z-index: 50;
}
.cite:hover .preview { display: block; }

.metric {
    background: var(--metric-bg);
    border-radius: 4px;
    padding: 0 0.2em;
    font-variant-numeric: tabular-nums;
}

.paper-card {
    border: 1px solid var(--border);
    border-radius: 8px;
    padding: 0.75rem;
    margin-bottom: 0.75rem;
}
.paper-card.flash { background: var(--highlight); transition: background 0.4s; }
.paper-card .title { font-weight: 600; }
.paper-card .meta { font-size: 0.8rem; color: var(--muted); margin: 0.2rem 0; }
.paper-card .tags span {
    display: inline-block;
    background: var(--accent-soft);
    color: var(--accent);
    border-radius: 10px;
    padding: 0 0.5em;
    font-size: 0.75rem;
    margin-right: 0.3rem;
}
.paper-card .actions { margin-top: 0.5rem; display: flex; gap: 0.4rem; }
.paper-card .actions button { font-size: 0.8rem; padding: 0.25rem 0.6rem; }
.paper-summary { margin-top: 0.5rem; border-top: 1px dashed var(--border); padding-top: 0.5rem; }

.note-card {
    border: 1px solid var(--border);
    border-radius: 8px;
    padding: 0.6rem 0.75rem;
    margin-bottom: 0.6rem;
}
.note-card .note-head { display: flex; align-items: baseline; gap: 0.5rem; }
.note-card .note-head .when { font-size: 0.75rem; color: var(--muted); margin-left: auto; }
.note-card .note-tags span {
    font-size: 0.72rem;
    background: var(--bg);
    border: 1px solid var(--border);
    border-radius: 10px;
    padding: 0 0.5em;
    margin-right: 0.3rem;
}
.tag-filter span {
    display: inline-block;
    font-size: 0.78rem;
    border: 1px solid var(--border);
    border-radius: 10px;
    padding: 0 0.5em;
    margin: 0 0.25rem 0.25rem 0;
    cursor: pointer;
}
.tag-filter span.on { background: var(--accent); color: #fff; border-color: var(--accent); }

.chat-log { max-height: 340px; overflow-y: auto; margin-bottom: 0.6rem; }
.msg { margin-bottom: 0.5rem; }
.msg .who { font-size: 0.72rem; text-transform: uppercase; color: var(--muted); }
.msg.user .bubble { background: var(--accent-soft); }
.msg .bubble {
    background: var(--bg);
    border-radius: 8px;
    padding: 0.4rem 0.6rem;
    font-size: 0.9rem;
}
.chat-input { display: flex; gap: 0.4rem; }
.chat-input input { flex: 1; padding: 0.4rem 0.6rem; border: 1px solid var(--border); border-radius: 6px; }
.focus-strip {
    font-size: 0.78rem;
    color: var(--warn);
    margin-bottom: 0.4rem;
    display: none;
}

.question-chip {
    display: block;
    width: 100%;
    text-align: left;
    margin-bottom: 0.4rem;
    font-size: 0.85rem;
}
.question-chip .cat { color: var(--muted); font-size: 0.72rem; display: block; }

.pending { color: var(--muted); font-style: italic; font-size: 0.85rem; }
.empty-state { color: var(--muted); font-size: 0.9rem; padding: 1rem 0; }
.collapsed-body { display: none; }
.recent a { margin-right: 0.6rem; font-size: 0.85rem; color: var(--accent); cursor: pointer; }
"#;

// ============================================================================
// Page Shell
// ============================================================================

pub fn page() -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>MedSearch</title>
    <style>{STYLE}</style>
</head>
<body>
    <div class="top-bar">
        <h1>MedSearch</h1>
        <div class="search-box">
            <input type="text" id="search-input" placeholder="Search medical literature..."
                   onkeydown="if(event.key==='Enter')runSearch()">
            <button class="primary" onclick="runSearch()">Search</button>
        </div>
        <button onclick="saveProject()">Save Project</button>
    </div>

    <div class="layout">
        <div>
            <div class="panel" id="results-panel">
                <div class="stats-line" id="stats-line">Enter a query to begin.</div>
                <div class="recent" id="recent-queries"></div>
                <div class="tabs">
                    <button id="tab-summary" class="active" onclick="switchTab('summary')">Summary</button>
                    <button id="tab-papers" onclick="switchTab('papers')">Papers</button>
                    <button id="tab-notes" onclick="switchTab('notes')">Notes</button>
                </div>
                <div id="pane-summary">
                    <div id="summary-body" class="doc empty-state">No summary yet.</div>
                </div>
                <div id="pane-papers" style="display:none">
                    <div id="papers-body"></div>
                </div>
                <div id="pane-notes" style="display:none">
                    <div class="chat-input" style="margin-bottom:0.5rem">
                        <input type="text" id="note-search" placeholder="Search notes..." oninput="refreshNotes()">
                        <button onclick="synthesizeNotes()">Synthesize from Summary</button>
                    </div>
                    <div class="tag-filter" id="tag-filter"></div>
                    <div id="notes-body"></div>
                </div>
            </div>

            <div class="panel" id="references-panel">
                <h2>References
                    <button class="toggle" onclick="togglePanel('references')" id="references-toggle">[-]</button>
                </h2>
                <div id="references-body"></div>
            </div>
        </div>

        <div>
            <div class="panel" id="assistant-panel">
                <h2>Research Assistant
                    <button class="toggle" onclick="togglePanel('assistant')" id="assistant-toggle">[-]</button>
                </h2>
                <div id="assistant-body">
                    <div class="focus-strip" id="focus-strip"></div>
                    <div class="chat-log" id="chat-log"></div>
                    <div class="chat-input">
                        <input type="text" id="chat-input" placeholder="Ask about the research..."
                               onkeydown="if(event.key==='Enter')sendChat()">
                        <button class="primary" id="chat-send" onclick="sendChat()">Send</button>
                    </div>
                </div>
            </div>

            <div class="panel" id="discovery-panel">
                <h2>Discovery</h2>
                <div id="discovery-body" class="empty-state">
                    Suggested questions appear here after a search.
                </div>
            </div>
        </div>
    </div>

    <script>{SCRIPT}</script>
</body>
</html>"#
    )
}

// ============================================================================
// Client Script
// ============================================================================

const SCRIPT: &str = r##"
let appState = null;
let activeTab = 'summary';
let noteTagFilter = new Set();

function esc(s) {
    const d = document.createElement('div');
    d.textContent = s == null ? '' : String(s);
    return d.innerHTML;
}

// JS string literal safe to embed in a double-quoted HTML attribute.
function jsArg(s) {
    return esc(JSON.stringify(String(s)));
}

async function api(path, opts) {
    const resp = await fetch(path, opts);
    return resp.json();
}

async function post(path, body) {
    return api(path, {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: body === undefined ? '{}' : JSON.stringify(body),
    });
}

// ---- structured document rendering ----

function renderSpans(spans) {
    let html = '';
    for (const span of spans) {
        if (span.kind === 'text') {
            html += esc(span.text);
        } else if (span.kind === 'bold') {
            html += '<strong>' + renderSpans(span.spans) + '</strong>';
        } else if (span.kind === 'metric') {
            html += '<span class="metric">' + esc(span.text) + '</span>';
        } else if (span.kind === 'citation') {
            if (span.resolved) {
                html += '<span class="cite" onclick="activateCitation(' + span.id + ')">[' + span.id + ']'
                    + '<span class="preview"><b>' + esc(span.resolved.title) + '</b><br>'
                    + esc(span.resolved.authors) + ' &middot; ' + esc(span.resolved.date)
                    + '</span></span>';
            } else {
                html += '<span class="cite unresolved">[' + span.id + ']</span>';
            }
        }
    }
    return html;
}

function renderDocument(doc) {
    if (!doc || !doc.blocks.length) return '';
    let html = '';
    for (const block of doc.blocks) {
        if (block.heading) html += '<h3>' + renderSpans(block.heading) + '</h3>';
        let list = null;
        for (const line of block.items) {
            if (line.is_list_item) {
                if (!list) { html += '<ul>'; list = true; }
                html += '<li>' + renderSpans(line.spans) + '</li>';
            } else {
                if (list) { html += '</ul>'; list = null; }
                html += '<p>' + renderSpans(line.spans) + '</p>';
            }
        }
        if (list) html += '</ul>';
    }
    return html;
}

// ---- citations ----

async function activateCitation(id) {
    const resp = await post('/api/citations/' + id + '/activate');
    const act = resp.activation;
    if (!act || !act.known) return;
    if (act.switch_to_papers) switchTab('papers');
    if (act.expand_references) setPanelCollapsed('references', false);
    if (act.target) {
        const card = document.getElementById(act.target);
        if (card) {
            card.scrollIntoView({ behavior: 'smooth', block: 'center' });
            card.classList.add('flash');
            setTimeout(() => card.classList.remove('flash'), act.highlight_ms);
        }
    }
}

async function registerTargets() {
    if (!appState) return;
    for (const paper of appState.papers) {
        await post('/api/citations/' + paper.id + '/target', { anchor: 'paper-' + paper.id });
    }
}

// ---- search ----

async function runSearch(preset) {
    const input = document.getElementById('search-input');
    if (preset !== undefined) input.value = preset;
    const query = input.value.trim();
    if (!query) return;
    document.getElementById('stats-line').textContent = 'Searching...';
    document.getElementById('summary-body').innerHTML = '<div class="pending">Generating summary...</div>';
    const resp = await post('/api/search', { query });
    if (resp.discarded) return;
    appState = resp.state;
    render();
    await registerTargets();
}

// ---- chat ----

async function sendChat() {
    const input = document.getElementById('chat-input');
    const text = input.value;
    if (!text.trim()) return;
    input.value = '';
    document.getElementById('chat-send').disabled = true;
    const resp = await post('/api/chat', { text });
    document.getElementById('chat-send').disabled = false;
    if (resp.messages) renderChat(resp.messages, appState ? appState.chat.focus_paper : null);
}

async function chatAboutPaper(id) {
    setPanelCollapsed('assistant', false);
    document.getElementById('chat-log').innerHTML = '<div class="pending">Starting discussion...</div>';
    const resp = await post('/api/papers/' + id + '/chat');
    await refreshState();
}

async function clearChatFocus() {
    await post('/api/chat/focus/clear');
    await refreshState();
}

function renderChat(messages, focusPaper) {
    const log = document.getElementById('chat-log');
    log.innerHTML = messages.map(m =>
        '<div class="msg ' + m.role + '">'
        + '<div class="who">' + esc(m.role) + '</div>'
        + '<div class="bubble doc">' + (m.document ? renderDocument(m.document) : esc(m.content)) + '</div>'
        + '</div>'
    ).join('');
    log.scrollTop = log.scrollHeight;
    const strip = document.getElementById('focus-strip');
    if (focusPaper != null) {
        strip.style.display = 'block';
        strip.innerHTML = 'Discussing paper [' + focusPaper + '] '
            + '<a href="#" onclick="clearChatFocus();return false">(back to all results)</a>';
    } else {
        strip.style.display = 'none';
    }
}

// ---- papers ----

function renderPapers() {
    const body = document.getElementById('papers-body');
    if (!appState.papers.length) {
        body.innerHTML = '<div class="empty-state">No papers yet.</div>';
        return;
    }
    body.innerHTML = appState.papers.map(p =>
        '<div class="paper-card" id="paper-' + p.id + '">'
        + '<div class="title">[' + p.id + '] ' + (p.url
            ? '<a href="' + esc(p.url) + '" target="_blank" rel="noopener">' + esc(p.title) + '</a>'
            : esc(p.title)) + '</div>'
        + '<div class="meta">' + esc(p.authors) + ' &middot; ' + esc(p.journal) + ' &middot; '
        + esc(p.date) + ' &middot; ' + p.citation_count + ' citations</div>'
        + '<div class="tags">' + p.tags.map(t => '<span>' + esc(t) + '</span>').join('') + '</div>'
        + '<div>' + esc(p.abstract_text) + '</div>'
        + '<div class="actions">'
        + '<button onclick="paperSummary(' + p.id + ')">Summarize</button>'
        + '<button onclick="chatAboutPaper(' + p.id + ')">Chat with Paper</button>'
        + '<button onclick="bookmarkPaper(' + p.id + ')">Bookmark</button>'
        + '</div>'
        + '<div class="paper-summary doc" id="paper-summary-' + p.id + '" style="display:none"></div>'
        + '</div>'
    ).join('');
}

async function paperSummary(id) {
    const slot = document.getElementById('paper-summary-' + id);
    slot.style.display = 'block';
    slot.innerHTML = '<div class="pending">Summarizing...</div>';
    const resp = await post('/api/papers/' + id + '/summary');
    if (resp.summary) slot.innerHTML = renderDocument(resp.summary);
    else if (resp.pending) slot.innerHTML = '<div class="pending">Still summarizing...</div>';
    else slot.style.display = 'none';
}

async function bookmarkPaper(id) {
    await post('/api/library/' + id);
}

// ---- notes ----

async function refreshNotes() {
    const q = document.getElementById('note-search').value;
    const tags = Array.from(noteTagFilter).join(',');
    const resp = await api('/api/notes?q=' + encodeURIComponent(q) + '&tags=' + encodeURIComponent(tags));
    renderNotes(resp.notes, resp.all_tags);
}

function toggleTag(tag) {
    if (noteTagFilter.has(tag)) noteTagFilter.delete(tag);
    else noteTagFilter.add(tag);
    refreshNotes();
}

function renderNotes(notes, allTags) {
    document.getElementById('tag-filter').innerHTML = allTags.map(t =>
        '<span class="' + (noteTagFilter.has(t) ? 'on' : '') + '" onclick="toggleTag(' + jsArg(t) + ')">'
        + esc(t) + '</span>'
    ).join('');
    const body = document.getElementById('notes-body');
    if (!notes.length) {
        body.innerHTML = '<div class="empty-state">No matching notes.</div>';
        return;
    }
    body.innerHTML = notes.map(n =>
        '<div class="note-card">'
        + '<div class="note-head"><b>' + esc(n.title) + '</b>'
        + '<span class="when">edited ' + esc(n.last_edited) + '</span>'
        + '<button onclick="deleteNote(' + n.id + ')">&times;</button></div>'
        + '<div>' + esc(n.content) + '</div>'
        + '<div class="note-tags">' + n.tags.map(t => '<span>' + esc(t) + '</span>').join('') + '</div>'
        + '</div>'
    ).join('');
}

async function deleteNote(id) {
    await fetch('/api/notes/' + id, { method: 'DELETE' });
    refreshNotes();
}

async function synthesizeNotes() {
    const resp = await post('/api/notes/synthesize');
    if (resp.notes) renderNotes(resp.notes, resp.all_tags);
}

// ---- discovery ----

function renderDiscovery(d) {
    const body = document.getElementById('discovery-body');
    let html = '';
    if (d.active_question) {
        html += '<div><b>' + esc(d.active_question) + '</b></div>';
        if (d.answer_pending) html += '<div class="pending">Answering...</div>';
        else if (d.answer) html += '<div class="doc">' + renderDocument(d.answer) + '</div>';
        if (d.answer && !d.answer_pending) {
            html += '<div style="margin:0.4rem 0">'
                + '<button onclick="saveDiscovery()"' + (d.is_saved ? ' disabled' : '') + '>'
                + (d.is_saved ? 'Saved to notes' : 'Save to notes') + '</button> '
                + '<button onclick="dismissDiscovery()">Dismiss</button></div>';
        }
        if (d.follow_ups_pending) html += '<div class="pending">Finding follow-ups...</div>';
        html += d.follow_ups.map(q =>
            '<button class="question-chip" onclick="askDiscovery(' + jsArg(q.question) + ')">'
            + esc(q.question) + '<span class="cat">' + esc(q.category) + '</span></button>'
        ).join('');
        body.innerHTML = html;
        body.classList.remove('empty-state');
        return;
    }
    const suggested = appState ? appState.suggested_questions : [];
    if (suggested.length) {
        body.innerHTML = suggested.map(q =>
            '<button class="question-chip" onclick="askDiscovery(' + jsArg(q.question) + ')">'
            + esc(q.question) + '<span class="cat">' + esc(q.category) + '</span></button>'
        ).join('');
        body.classList.remove('empty-state');
    } else {
        body.innerHTML = 'Suggested questions appear here after a search.';
        body.classList.add('empty-state');
    }
}

async function askDiscovery(question) {
    document.getElementById('discovery-body').innerHTML =
        '<div><b>' + esc(question) + '</b></div><div class="pending">Answering...</div>';
    const resp = await post('/api/discovery/ask', { question });
    if (resp.discovery) renderDiscovery(resp.discovery);
}

async function saveDiscovery() {
    const resp = await post('/api/discovery/save');
    if (resp.discovery) renderDiscovery(resp.discovery);
    refreshNotes();
}

async function dismissDiscovery() {
    const resp = await post('/api/discovery/dismiss');
    if (resp.discovery) renderDiscovery(resp.discovery);
}

// ---- panels / tabs ----

function switchTab(tab) {
    activeTab = tab;
    for (const t of ['summary', 'papers', 'notes']) {
        document.getElementById('tab-' + t).classList.toggle('active', t === tab);
        document.getElementById('pane-' + t).style.display = t === tab ? '' : 'none';
    }
    if (tab === 'notes') refreshNotes();
}

function setPanelCollapsed(name, collapsed) {
    document.getElementById(name + '-body').style.display = collapsed ? 'none' : '';
    document.getElementById(name + '-toggle').textContent = collapsed ? '[+]' : '[-]';
    post('/api/panels', {
        references_collapsed: name === 'references' ? collapsed : undefined,
        assistant_collapsed: name === 'assistant' ? collapsed : undefined,
    });
}

function togglePanel(name) {
    const collapsed = document.getElementById(name + '-body').style.display !== 'none';
    setPanelCollapsed(name, collapsed);
}

async function saveProject() {
    const name = prompt('Project name:');
    if (!name) return;
    await post('/api/projects', { name });
}

// ---- top-level render ----

function render() {
    if (!appState) return;
    const stats = appState.stats;
    if (stats.query) {
        document.getElementById('stats-line').textContent =
            '"' + stats.query + '" — found ' + stats.found_articles
            + ' articles, filtered to ' + stats.filtered_articles + ' highly relevant';
    }
    document.getElementById('recent-queries').innerHTML = appState.recent_queries.map(q =>
        '<a onclick="runSearch(' + jsArg(q) + ')">' + esc(q) + '</a>'
    ).join('');

    const summaryBody = document.getElementById('summary-body');
    if (appState.summary_pending) {
        summaryBody.innerHTML = '<div class="pending">Generating summary...</div>';
    } else if (appState.summary) {
        summaryBody.classList.remove('empty-state');
        summaryBody.innerHTML = renderDocument(appState.summary);
    } else if (stats.query) {
        summaryBody.innerHTML = 'No results found for this query.';
        summaryBody.classList.add('empty-state');
    }

    renderPapers();
    document.getElementById('references-body').innerHTML = appState.papers.map(p =>
        '<div>[' + p.id + '] ' + esc(p.authors) + ' ' + esc(p.title) + '. <i>' + esc(p.journal)
        + '</i>, ' + esc(p.date) + '.</div>'
    ).join('') || '<div class="empty-state">No references yet.</div>';

    renderChat(appState.chat.messages.map(m => ({ ...m, document: null })), appState.chat.focus_paper);
    renderNotes(appState.notes, appState.all_tags);
    renderDiscovery(appState.discovery);

    setPanelCollapsed('references', appState.panels.references_collapsed);
    setPanelCollapsed('assistant', appState.panels.assistant_collapsed);
}

async function refreshState() {
    appState = await api('/api/state');
    render();
    await registerTargets();
}

refreshState();
"##;
