//! Browser surface: embedded single-page shell + raw TCP server.
//!
//! The page is a thin shell. It posts the form to `/generate` via
//! EventSource and replaces the answer region with each rendered snapshot;
//! all rendering and widget state lives server-side in the render loop.

use std::collections::HashMap;

use colored::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::cli::{resolve_model, Args};
use crate::config::AppConfig;
use crate::providers::Provider;
use crate::session::{self, replay_thread, RenderSession, UiEvent};
use crate::store::{self, StoredThread, ThreadStore};
use crate::{run_generation, TeamStreamer, SYSTEM_PROMPT};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Embedded single-page HTML shell.
pub const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Pokemood</title>
<style>
*{margin:0;padding:0;box-sizing:border-box}
body{background:#0d1117;color:#c9d1d9;font-family:'Segoe UI',system-ui,sans-serif;min-height:100vh;display:flex;flex-direction:column}
header{padding:24px 32px 16px;border-bottom:1px solid #21262d}
header h1{font-size:1.4rem;color:#58a6ff;margin-bottom:4px}
header p{font-size:.85rem;color:#8b949e}
#search{display:flex;gap:12px;padding:16px 32px;flex-wrap:wrap;align-items:end;border-bottom:1px solid #21262d;background:#161b22}
.field{display:flex;flex-direction:column;gap:4px}
.field label{font-size:.75rem;color:#8b949e;text-transform:uppercase;letter-spacing:.5px}
.field input,.field select{background:#0d1117;border:1px solid #30363d;color:#c9d1d9;padding:8px 12px;border-radius:6px;font-family:inherit;font-size:.9rem}
.field input:focus,.field select:focus{outline:none;border-color:#58a6ff}
.field input[type=text]{min-width:320px}
button{border:none;padding:8px 20px;border-radius:6px;font-family:inherit;font-size:.9rem;cursor:pointer;color:#fff;align-self:end}
#go{background:#238636}#go:hover{background:#2ea043}
#share{background:#1f6feb;margin:12px 32px 0;align-self:flex-start}
#answer{flex:1;padding:24px 32px;line-height:1.7;font-size:1rem;overflow-y:auto}
#answer h1,#answer h2,#answer h3{margin:16px 0 8px;color:#e6edf3}
#answer p{margin:8px 0}
#answer ol,#answer ul{margin:8px 0 8px 24px}
#answer .pokemon-card{color:#24292f}
.notice p{color:#8b949e;font-style:italic}
</style>
</head>
<body>
<header>
  <h1>Pokemood</h1>
  <p>Tell us your mood &mdash; get a Pok&eacute;mon team to match</p>
</header>
<form id="search">
  <div class="field">
    <label>Your mood</label>
    <input type="text" id="query" placeholder="e.g. cozy and a little mischievous" autocomplete="off">
  </div>
  <div class="field">
    <label>Provider</label>
    <select id="provider">
      <option value="openai">OpenAI</option>
      <option value="anthropic">Anthropic</option>
      <option value="google">Google</option>
    </select>
  </div>
  <button id="go" type="submit">Generate</button>
</form>
<button id="share" style="display:none">Share this team</button>
<div id="answer"></div>
<script>
const $=s=>document.querySelector(s);
let es=null,currentQuestion='',currentAnswer='';
function consume(url){
  if(es){es.close();es=null}
  es=new EventSource(url);
  es.onmessage=e=>{
    if(e.data==='[DONE]'){es.close();es=null;return}
    let ev;try{ev=JSON.parse(e.data)}catch(_){return}
    if(ev.type==='thread'){$('#query').value=ev.question}
    else if(ev.type==='snapshot'){$('#answer').innerHTML=ev.html}
    else if(ev.type==='complete'){currentQuestion=ev.question;currentAnswer=ev.answer;$('#share').style.display=''}
    else if(ev.type==='error'){$('#answer').innerHTML='<div class="notice"><p>'+ev.message+'</p></div>'}
  };
  es.onerror=()=>{if(es){es.close();es=null}};
}
$('#search').addEventListener('submit',e=>{
  e.preventDefault();
  $('#share').style.display='none';
  const q=$('#query').value;
  consume('/generate?prompt='+encodeURIComponent(q)+'&provider='+$('#provider').value);
});
$('#share').addEventListener('click',async()=>{
  const r=await fetch('/api/store/',{method:'POST',body:JSON.stringify({question:currentQuestion,answer:currentAnswer})});
  const id=await r.text();
  window.location='?'+id;
});
(function init(){
  const params=new URLSearchParams(window.location.search);
  const first=[...params.entries()][0];
  if(first&&/^[a-z0-9_-]+$/i.test(first[0])&&!first[1]){
    consume('/restore?id='+first[0]);
  }
})();
</script>
</body>
</html>"##;

#[derive(Clone)]
struct ServerState {
    config: AppConfig,
    store: ThreadStore,
    client: reqwest::Client,
    default_provider: Provider,
    model_override: Option<String>,
}

/// Simple percent-decoding for URL query parameters.
pub fn url_decode(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut bytes = Vec::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '+' => bytes.push(b' '),
            '%' => {
                let hex: String = chars.by_ref().take(2).collect();
                if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                    bytes.push(byte);
                }
            }
            _ => {
                if !bytes.is_empty() {
                    result.push_str(&String::from_utf8_lossy(&bytes));
                    bytes.clear();
                }
                result.push(c);
            }
        }
    }
    if !bytes.is_empty() {
        result.push_str(&String::from_utf8_lossy(&bytes));
    }
    result
}

/// Parse a query string into key-value pairs.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next().unwrap_or("");
            Some((key.to_string(), url_decode(value)))
        })
        .collect()
}

/// Split a request target into (path, query).
pub fn split_target(target: &str) -> (&str, &str) {
    match target.find('?') {
        Some(idx) => (&target[..idx], &target[idx + 1..]),
        None => (target, ""),
    }
}

/// Blank input short-circuits `/generate`: the returned event is shown and
/// no generation call is made.
pub fn blank_prompt_event(prompt: &str) -> Option<UiEvent> {
    prompt.trim().is_empty().then(|| UiEvent::Snapshot {
        html: session::notice_html(session::EMPTY_PROMPT_MESSAGE),
    })
}

/// Start the web UI server.
pub async fn serve(args: &Args, config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let port = args.resolved_port(&config);
    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;

    eprintln!(
        "{}",
        format!("  Pokemood running at http://localhost:{}", port).bright_green()
    );
    eprintln!("{}", "  Press Ctrl+C to stop.".bright_blue());

    if !args.no_browser {
        open_browser(port);
    }

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(20))
        .build()?;
    let state = ServerState {
        config,
        store: store::new_thread_store(),
        client,
        default_provider: args.provider.clone(),
        model_override: args.model.clone(),
    };

    loop {
        let (socket, _addr) = listener.accept().await?;
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, state).await {
                debug!(error = %e, "connection error");
            }
        });
    }
}

fn open_browser(port: u16) {
    #[cfg(target_os = "windows")]
    {
        let _ = std::process::Command::new("cmd")
            .args(["/C", &format!("start http://localhost:{}", port)])
            .spawn();
    }
    #[cfg(target_os = "macos")]
    {
        let _ = std::process::Command::new("open")
            .arg(format!("http://localhost:{}", port))
            .spawn();
    }
    #[cfg(target_os = "linux")]
    {
        let _ = std::process::Command::new("xdg-open")
            .arg(format!("http://localhost:{}", port))
            .spawn();
    }
}

struct RequestHead {
    method: String,
    target: String,
    content_length: usize,
}

/// Read and parse one HTTP request (head via httparse, body per
/// Content-Length). Returns None when the peer hangs up early.
async fn read_request(socket: &mut TcpStream) -> Result<Option<(RequestHead, Vec<u8>)>, BoxError> {
    let mut buf: Vec<u8> = Vec::with_capacity(4096);
    let mut tmp = [0u8; 4096];

    let (head, head_len) = loop {
        let n = socket.read(&mut tmp).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&tmp[..n]);

        let mut headers = [httparse::EMPTY_HEADER; 32];
        let mut req = httparse::Request::new(&mut headers);
        match req.parse(&buf)? {
            httparse::Status::Complete(head_len) => {
                let content_length = req
                    .headers
                    .iter()
                    .find(|h| h.name.eq_ignore_ascii_case("content-length"))
                    .and_then(|h| std::str::from_utf8(h.value).ok())
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                let head = RequestHead {
                    method: req.method.unwrap_or("GET").to_string(),
                    target: req.path.unwrap_or("/").to_string(),
                    content_length,
                };
                break (head, head_len);
            }
            httparse::Status::Partial => {
                if buf.len() > 64 * 1024 {
                    return Ok(None);
                }
            }
        }
    };

    let mut body = buf[head_len..].to_vec();
    while body.len() < head.content_length {
        let n = socket.read(&mut tmp).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&tmp[..n]);
    }
    body.truncate(head.content_length);
    Ok(Some((head, body)))
}

async fn handle_connection(mut socket: TcpStream, state: ServerState) -> Result<(), BoxError> {
    let Some((head, body)) = read_request(&mut socket).await? else {
        return Ok(());
    };
    let target = head.target.clone();
    let (path, query) = split_target(&target);

    match (head.method.as_str(), path) {
        ("GET", "/") => respond(&mut socket, 200, "text/html; charset=utf-8", INDEX_HTML).await,
        ("GET", "/generate") => handle_generate(socket, state, parse_query(query)).await,
        ("GET", "/restore") => handle_restore(socket, state, parse_query(query)).await,
        ("POST", "/api/store" | "/api/store/") => handle_store_post(&mut socket, &state, &body).await,
        ("GET", p) if p.starts_with("/api/store/") => {
            let id = &p["/api/store/".len()..];
            handle_store_get(&mut socket, &state, id).await
        }
        _ => respond(&mut socket, 404, "text/plain", "Not Found").await,
    }
}

async fn handle_generate(
    mut socket: TcpStream,
    state: ServerState,
    params: HashMap<String, String>,
) -> Result<(), BoxError> {
    write_sse_headers(&mut socket).await?;

    let prompt = params.get("prompt").cloned().unwrap_or_default();
    if let Some(event) = blank_prompt_event(&prompt) {
        write_event(&mut socket, &event).await?;
        return finish_sse(&mut socket).await;
    }

    let provider = params
        .get("provider")
        .and_then(|s| Provider::from_str_loose(s))
        .unwrap_or_else(|| state.default_provider.clone());
    let model = resolve_model(&state.config, &provider, state.model_override.as_deref());

    let (frag_tx, frag_rx) = mpsc::unbounded_channel();
    let mut streamer = match TeamStreamer::new(provider, model, frag_tx) {
        Ok(streamer) => streamer,
        Err(e) => {
            warn!(error = %e, "cannot start generation");
            let event = UiEvent::Error {
                message: session::FAILURE_MESSAGE.to_string(),
            };
            write_event(&mut socket, &event).await?;
            return finish_sse(&mut socket).await;
        }
    };
    streamer.system_prompt = Some(SYSTEM_PROMPT.to_string());

    let loading = UiEvent::Snapshot {
        html: session::notice_html(session::LOADING_MESSAGE),
    };
    write_event(&mut socket, &loading).await?;

    tokio::spawn(run_generation(streamer, prompt.clone()));

    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
    let session_task = tokio::spawn(
        RenderSession::new(
            &prompt,
            state.client.clone(),
            state.config.pokeapi_base.clone(),
            ui_tx,
            true,
        )
        .run(frag_rx),
    );

    while let Some(event) = ui_rx.recv().await {
        if write_event(&mut socket, &event).await.is_err() {
            // Client gone; the session runs to completion on its own
            // (superseded work is never cancelled).
            break;
        }
    }
    let _ = session_task.await;
    finish_sse(&mut socket).await
}

async fn handle_restore(
    mut socket: TcpStream,
    state: ServerState,
    params: HashMap<String, String>,
) -> Result<(), BoxError> {
    write_sse_headers(&mut socket).await?;

    let id = params.get("id").cloned().unwrap_or_default();
    let thread = if store::is_valid_id(&id) {
        store::load_thread(&state.store, &id)
    } else {
        None
    };
    let Some(thread) = thread else {
        debug!(id = %id, "restore for unknown thread id");
        let event = UiEvent::Error {
            message: session::MISSING_THREAD_MESSAGE.to_string(),
        };
        write_event(&mut socket, &event).await?;
        return finish_sse(&mut socket).await;
    };

    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
    let replay_task = tokio::spawn(replay_thread(
        thread,
        state.client.clone(),
        state.config.pokeapi_base.clone(),
        ui_tx,
    ));

    while let Some(event) = ui_rx.recv().await {
        if write_event(&mut socket, &event).await.is_err() {
            break;
        }
    }
    let _ = replay_task.await;
    finish_sse(&mut socket).await
}

async fn handle_store_post(
    socket: &mut TcpStream,
    state: &ServerState,
    body: &[u8],
) -> Result<(), BoxError> {
    match serde_json::from_slice::<StoredThread>(body) {
        Ok(thread) => {
            let id = store::store_thread(&state.store, thread.question, thread.answer);
            debug!(id = %id, "thread stored");
            respond(socket, 200, "text/plain", &id).await
        }
        Err(e) => {
            debug!(error = %e, "malformed store request body");
            respond(socket, 400, "text/plain", "Bad Request").await
        }
    }
}

async fn handle_store_get(
    socket: &mut TcpStream,
    state: &ServerState,
    id: &str,
) -> Result<(), BoxError> {
    if !store::is_valid_id(id) {
        return respond(socket, 404, "text/plain", "Not Found").await;
    }
    match store::load_thread(&state.store, id) {
        Some(thread) => {
            let json = serde_json::to_string(&thread)?;
            respond(socket, 200, "application/json", &json).await
        }
        None => respond(socket, 404, "text/plain", "Not Found").await,
    }
}

async fn respond(
    socket: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &str,
) -> Result<(), BoxError> {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        _ => "Error",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nAccess-Control-Allow-Origin: *\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        content_type,
        body.len(),
        body,
    );
    socket.write_all(response.as_bytes()).await?;
    Ok(())
}

async fn write_sse_headers(socket: &mut TcpStream) -> Result<(), BoxError> {
    socket
        .write_all(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: keep-alive\r\nAccess-Control-Allow-Origin: *\r\n\r\n",
        )
        .await?;
    Ok(())
}

async fn write_event(socket: &mut TcpStream, event: &UiEvent) -> std::io::Result<()> {
    let json = serde_json::to_string(event)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    socket
        .write_all(format!("data: {}\n\n", json).as_bytes())
        .await
}

async fn finish_sse(socket: &mut TcpStream) -> Result<(), BoxError> {
    socket.write_all(b"data: [DONE]\n\n").await?;
    Ok(())
}
