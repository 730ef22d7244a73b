//! WebSocket live reload.

use kiln_tasks::ReloadSink;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// WebSocket endpoint clients connect to.
pub const SOCKET_PATH: &str = "/__livereload";

/// Route serving [`client_script`].
pub const SCRIPT_PATH: &str = "/__livereload.js";

const SCRIPT_TAG: &str = r#"<script src="/__livereload.js"></script>"#;

/// Messages sent to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveReloadMessage {
    /// Full page reload
    Reload,

    /// Re-fetch the stylesheets at these build-relative paths
    Inject { paths: Vec<String> },

    /// Connection established
    Connected,
}

/// Hub for broadcasting live-reload messages to all connected clients.
#[derive(Debug, Clone)]
pub struct LiveReloadHub {
    sender: broadcast::Sender<LiveReloadMessage>,
}

impl LiveReloadHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected clients.
    pub fn send(&self, msg: LiveReloadMessage) {
        // No receivers just means no browser is open
        let _ = self.sender.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveReloadMessage> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LiveReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadSink for LiveReloadHub {
    fn reload(&self) {
        tracing::debug!("Reloading {} client(s)", self.subscriber_count());
        self.send(LiveReloadMessage::Reload);
    }

    fn inject(&self, paths: &[String]) {
        tracing::debug!("Injecting {}", paths.join(", "));
        self.send(LiveReloadMessage::Inject {
            paths: paths.to_vec(),
        });
    }
}

/// Insert the client script tag before `</body>`, or at the end when the
/// page has no body close. Pages that already carry the tag are returned
/// unchanged.
pub fn inject_client(html: &str) -> String {
    if html.contains(SCRIPT_TAG) {
        return html.to_string();
    }

    match html.rfind("</body>").or_else(|| html.rfind("</BODY>")) {
        Some(at) => format!("{}{}\n{}", &html[..at], SCRIPT_TAG, &html[at..]),
        None => format!("{}{}", html, SCRIPT_TAG),
    }
}

/// Browser side of the live-reload connection.
///
/// Connects back to whichever host served the page, so it works for any
/// configured bind address.
pub fn client_script() -> &'static str {
    r#"
(function() {
  'use strict';

  var proto = location.protocol === 'https:' ? 'wss://' : 'ws://';
  var ws = new WebSocket(proto + location.host + '/__livereload');
  var retries = 0;

  function refreshStyles(paths) {
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    var matched = false;

    links.forEach(function(link) {
      var href = link.getAttribute('href');
      if (!href) return;
      var path = href.split('?')[0];
      var bare = path.replace(/^\//, '');
      if (paths.length && paths.indexOf(bare) === -1) return;
      matched = true;
      link.setAttribute('href', path + '?livereload=' + Date.now());
    });

    if (!matched) location.reload();
  }

  ws.onopen = function() {
    console.log('[livereload] Connected');
    retries = 0;
  };

  ws.onmessage = function(event) {
    var msg = JSON.parse(event.data);

    switch (msg.type) {
      case 'reload':
        location.reload();
        break;
      case 'inject':
        refreshStyles(msg.paths || []);
        break;
      case 'connected':
        break;
    }
  };

  ws.onclose = function() {
    if (retries < 10) {
      retries++;
      setTimeout(function() { location.reload(); }, 1000 * retries);
    }
  };
})();
"#
}
